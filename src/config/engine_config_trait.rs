// ==========================================
// 仓库移库作业引擎 - 引擎配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口与配置快照(不包含实现)
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// 配置层错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置值非法 (key={key}, value={value}): {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("配置读取失败: {0}")]
    Storage(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// ==========================================
// ReconciliationTolerance - 盘点容差
// ==========================================
/// 短缺容差: max(absolute, planned × percent / 100)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationTolerance {
    pub absolute: f64, // 绝对容差(数量)
    pub percent: f64,  // 相对容差(百分比)
}

impl ReconciliationTolerance {
    pub fn new(absolute: f64, percent: f64) -> Self {
        Self { absolute, percent }
    }

    /// 计划数量对应的允许短缺量
    pub fn allowance(&self, planned: f64) -> f64 {
        self.absolute.max(planned * self.percent / 100.0)
    }
}

impl Default for ReconciliationTolerance {
    fn default() -> Self {
        Self {
            absolute: 0.0,
            percent: 5.0,
        }
    }
}

// ==========================================
// PollSchedule - 开工确认轮询节奏
// ==========================================
/// 前 fast_window 内按 fast_interval 轮询,之后按 slow_interval,到 ceiling 为止
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub fast_interval: Duration,
    pub fast_window: Duration,
    pub slow_interval: Duration,
    pub ceiling: Duration,
}

impl PollSchedule {
    /// 已等待 elapsed 后的下一次轮询间隔
    pub fn interval_at(&self, elapsed: Duration) -> Duration {
        if elapsed < self.fast_window {
            self.fast_interval
        } else {
            self.slow_interval
        }
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            fast_interval: Duration::from_millis(200),
            fast_window: Duration::from_millis(1_000),
            slow_interval: Duration::from_millis(1_000),
            ceiling: Duration::from_millis(10_000),
        }
    }
}

// ==========================================
// WorkflowConfig - 引擎配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    pub tolerance: ReconciliationTolerance,
    pub poll_schedule: PollSchedule,
    /// 需做占用校验的货架货位前缀
    pub rack_slot_prefixes: Vec<String>,
    /// GS1 厂商识别码(SSCC 生成)
    pub gs1_company_prefix: String,
    /// SSCC 扩展位(0-9)
    pub sscc_extension_digit: u8,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            tolerance: ReconciliationTolerance::default(),
            poll_schedule: PollSchedule::default(),
            rack_slot_prefixes: vec!["R".to_string(), "E".to_string()],
            gs1_company_prefix: "8400000".to_string(),
            sscc_extension_digit: 0,
        }
    }
}

// ==========================================
// EngineConfigReader Trait
// ==========================================
// 实现者: ConfigManager(从 config_kv 表读取);测试中的 MockConfigReader
#[async_trait]
pub trait EngineConfigReader: Send + Sync {
    // ===== 盘点配置 =====

    /// 获取盘点短缺容差
    ///
    /// # 默认值
    /// - absolute = 0, percent = 5
    async fn get_reconciliation_tolerance(&self) -> ConfigResult<ReconciliationTolerance>;

    // ===== 开工轮询配置 =====

    /// 获取开工确认轮询节奏
    ///
    /// # 默认值
    /// - 200ms × 1000ms 快速窗口,之后 1000ms,上限 10000ms
    async fn get_poll_schedule(&self) -> ConfigResult<PollSchedule>;

    // ===== 占用校验配置 =====

    /// 获取货架货位前缀
    ///
    /// # 默认值
    /// - ["R", "E"]
    async fn get_rack_slot_prefixes(&self) -> ConfigResult<Vec<String>>;

    // ===== SSCC 配置 =====

    /// 获取 GS1 厂商识别码
    async fn get_gs1_company_prefix(&self) -> ConfigResult<String>;

    /// 获取 SSCC 扩展位
    async fn get_sscc_extension_digit(&self) -> ConfigResult<u8>;

    /// 一次性加载完整配置快照
    async fn load_workflow_config(&self) -> ConfigResult<WorkflowConfig> {
        Ok(WorkflowConfig {
            tolerance: self.get_reconciliation_tolerance().await?,
            poll_schedule: self.get_poll_schedule().await?,
            rack_slot_prefixes: self.get_rack_slot_prefixes().await?,
            gs1_company_prefix: self.get_gs1_company_prefix().await?,
            sscc_extension_digit: self.get_sscc_extension_digit().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerance_allowance_takes_larger_bound() {
        let tolerance = ReconciliationTolerance::new(1.0, 10.0);
        assert_eq!(tolerance.allowance(5.0), 1.0);
        assert_eq!(tolerance.allowance(50.0), 5.0);
    }

    #[test]
    fn test_poll_schedule_switches_to_slow_interval() {
        let schedule = PollSchedule::default();
        assert_eq!(schedule.interval_at(Duration::ZERO), Duration::from_millis(200));
        assert_eq!(
            schedule.interval_at(Duration::from_millis(999)),
            Duration::from_millis(200)
        );
        assert_eq!(
            schedule.interval_at(Duration::from_millis(1_000)),
            Duration::from_millis(1_000)
        );
    }
}
