// ==========================================
// 仓库移库作业引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 约束: 缺失键回落到默认值;存在但格式非法的值报错
// ==========================================

use crate::config::engine_config_trait::{
    ConfigError, ConfigResult, EngineConfigReader, PollSchedule, ReconciliationTolerance,
    WorkflowConfig,
};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path).map_err(|e| ConfigError::Storage(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> ConfigResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| ConfigError::Storage(format!("锁获取失败: {}", e)))
    }

    /// 从 config_kv 表读取配置值(scope_id='global')
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| ConfigError::Storage(e.to_string()))
    }

    /// 写入 global scope 的配置值(UPSERT)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )
        .map_err(|e| ConfigError::Storage(e.to_string()))?;
        Ok(())
    }

    /// 获取所有配置的快照(JSON 格式,启动日志用)
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")
            .map_err(|e| ConfigError::Storage(e.to_string()))?;

        let config_map = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .and_then(|rows| rows.collect::<Result<BTreeMap<_, _>, _>>())
            .map_err(|e| ConfigError::Storage(e.to_string()))?;

        Ok(json!(config_map).to_string())
    }

    /// 读取并解析;缺失 → 默认值,非法 → ConfigError
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn get_non_negative_f64(&self, key: &str, default: f64) -> ConfigResult<f64> {
        let value = self.get_parsed_or_default::<f64>(key, default)?;
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
                reason: "必须为非负数".to_string(),
            });
        }
        Ok(value)
    }

    fn get_duration_ms(&self, key: &str, default_ms: u64) -> ConfigResult<Duration> {
        let ms = self.get_parsed_or_default::<u64>(key, default_ms)?;
        if ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: "0".to_string(),
                reason: "间隔必须大于 0".to_string(),
            });
        }
        Ok(Duration::from_millis(ms))
    }
}

// ==========================================
// EngineConfigReader Trait 实现
// ==========================================
#[async_trait]
impl EngineConfigReader for ConfigManager {
    async fn get_reconciliation_tolerance(&self) -> ConfigResult<ReconciliationTolerance> {
        let defaults = ReconciliationTolerance::default();
        Ok(ReconciliationTolerance {
            absolute: self.get_non_negative_f64(config_keys::TOLERANCE_ABSOLUTE, defaults.absolute)?,
            percent: self.get_non_negative_f64(config_keys::TOLERANCE_PERCENT, defaults.percent)?,
        })
    }

    async fn get_poll_schedule(&self) -> ConfigResult<PollSchedule> {
        let defaults = PollSchedule::default();
        let schedule = PollSchedule {
            fast_interval: self.get_duration_ms(
                config_keys::POLL_FAST_INTERVAL_MS,
                defaults.fast_interval.as_millis() as u64,
            )?,
            fast_window: self.get_duration_ms(
                config_keys::POLL_FAST_WINDOW_MS,
                defaults.fast_window.as_millis() as u64,
            )?,
            slow_interval: self.get_duration_ms(
                config_keys::POLL_SLOW_INTERVAL_MS,
                defaults.slow_interval.as_millis() as u64,
            )?,
            ceiling: self.get_duration_ms(
                config_keys::POLL_CEILING_MS,
                defaults.ceiling.as_millis() as u64,
            )?,
        };
        if schedule.ceiling < schedule.fast_interval {
            return Err(ConfigError::InvalidValue {
                key: config_keys::POLL_CEILING_MS.to_string(),
                value: schedule.ceiling.as_millis().to_string(),
                reason: "上限不能小于快速轮询间隔".to_string(),
            });
        }
        Ok(schedule)
    }

    async fn get_rack_slot_prefixes(&self) -> ConfigResult<Vec<String>> {
        let Some(value) = self.get_config_value(config_keys::RACK_SLOT_PREFIXES)? else {
            return Ok(WorkflowConfig::default().rack_slot_prefixes);
        };

        // 显式配置为空 = 不做占用校验
        Ok(value
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect())
    }

    async fn get_gs1_company_prefix(&self) -> ConfigResult<String> {
        let value = self
            .get_config_value(config_keys::GS1_COMPANY_PREFIX)?
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| WorkflowConfig::default().gs1_company_prefix);

        // SSCC 扩展位(1) + 厂商码 + 序列号 = 17 位,厂商码 6-12 位
        let valid = (6..=12).contains(&value.len()) && value.chars().all(|c| c.is_ascii_digit());
        if !valid {
            return Err(ConfigError::InvalidValue {
                key: config_keys::GS1_COMPANY_PREFIX.to_string(),
                value,
                reason: "厂商识别码必须为 6-12 位数字".to_string(),
            });
        }
        Ok(value)
    }

    async fn get_sscc_extension_digit(&self) -> ConfigResult<u8> {
        let digit = self.get_parsed_or_default::<u8>(
            config_keys::SSCC_EXTENSION_DIGIT,
            WorkflowConfig::default().sscc_extension_digit,
        )?;
        if digit > 9 {
            return Err(ConfigError::InvalidValue {
                key: config_keys::SSCC_EXTENSION_DIGIT.to_string(),
                value: digit.to_string(),
                reason: "扩展位必须为 0-9".to_string(),
            });
        }
        Ok(digit)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 盘点容差
    pub const TOLERANCE_ABSOLUTE: &str = "reconciliation_tolerance_abs";
    pub const TOLERANCE_PERCENT: &str = "reconciliation_tolerance_pct";

    // 开工确认轮询
    pub const POLL_FAST_INTERVAL_MS: &str = "start_poll_fast_interval_ms";
    pub const POLL_FAST_WINDOW_MS: &str = "start_poll_fast_window_ms";
    pub const POLL_SLOW_INTERVAL_MS: &str = "start_poll_slow_interval_ms";
    pub const POLL_CEILING_MS: &str = "start_poll_ceiling_ms";

    // 货位占用校验
    pub const RACK_SLOT_PREFIXES: &str = "rack_slot_prefixes";

    // SSCC
    pub const GS1_COMPANY_PREFIX: &str = "gs1_company_prefix";
    pub const SSCC_EXTENSION_DIGIT: &str = "sscc_extension_digit";
}
