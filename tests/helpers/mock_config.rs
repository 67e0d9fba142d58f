// ==========================================
// Mock 配置实现 - 用于集成测试
// ==========================================

use async_trait::async_trait;
use std::time::Duration;
use warehouse_transfer::config::{
    ConfigResult, EngineConfigReader, PollSchedule, ReconciliationTolerance,
};

/// Mock 配置结构
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub tolerance: ReconciliationTolerance,
    pub poll_schedule: PollSchedule,
    pub rack_slot_prefixes: Vec<String>,
    pub gs1_company_prefix: String,
    pub sscc_extension_digit: u8,
}

impl MockConfig {
    /// 创建默认配置
    pub fn default() -> Self {
        Self {
            tolerance: ReconciliationTolerance::new(0.0, 5.0),
            poll_schedule: PollSchedule::default(),
            rack_slot_prefixes: vec!["R".to_string(), "E".to_string()],
            gs1_company_prefix: "8400000".to_string(),
            sscc_extension_digit: 3,
        }
    }

    /// 自定义容差
    pub fn with_tolerance(absolute: f64, percent: f64) -> Self {
        let mut config = Self::default();
        config.tolerance = ReconciliationTolerance::new(absolute, percent);
        config
    }

    /// 短轮询上限(毫秒)
    pub fn with_ceiling_ms(ceiling_ms: u64) -> Self {
        let mut config = Self::default();
        config.poll_schedule.ceiling = Duration::from_millis(ceiling_ms);
        config
    }
}

#[async_trait]
impl EngineConfigReader for MockConfig {
    async fn get_reconciliation_tolerance(&self) -> ConfigResult<ReconciliationTolerance> {
        Ok(self.tolerance)
    }

    async fn get_poll_schedule(&self) -> ConfigResult<PollSchedule> {
        Ok(self.poll_schedule)
    }

    async fn get_rack_slot_prefixes(&self) -> ConfigResult<Vec<String>> {
        Ok(self.rack_slot_prefixes.clone())
    }

    async fn get_gs1_company_prefix(&self) -> ConfigResult<String> {
        Ok(self.gs1_company_prefix.clone())
    }

    async fn get_sscc_extension_digit(&self) -> ConfigResult<u8> {
        Ok(self.sscc_extension_digit)
    }
}
