// ==========================================
// 仓库移库作业引擎 - 配置层
// ==========================================
// 职责: 引擎配置读取(容差/轮询节奏/货架前缀/SSCC)
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod engine_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use engine_config_trait::{
    ConfigError, ConfigResult, EngineConfigReader, PollSchedule, ReconciliationTolerance,
    WorkflowConfig,
};
