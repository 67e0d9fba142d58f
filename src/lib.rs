// ==========================================
// 仓库移库作业引擎 - 核心库
// ==========================================
// 技术栈: Rust + Tokio + SQLite
// 系统定位: 手持终端扫码驱动的托盘/移库单/订单行工作流
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建库）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AdjustmentStatus, LineState, OperatorRole, PalletState, SubjectType, TransferState,
};

// 领域实体
pub use domain::{
    ActionLog, ActionType, ExpectedWork, LineDestination, Location, NewPalletLine, OrderLine,
    Pallet, PalletLine, RequestContext, ScanResult, StockAdjustment, StockRecord, Transfer,
};

// 引擎
pub use engine::{
    classify, Classification, EngineError, ErrorKind, LineTracker, PalletLifecycle,
    ReconciliationDecision, ScanResolver, StartLineOutcome, TransferLifecycle,
};

// API
pub use api::{ApiError, WorkflowApi, WorkflowStores};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "仓库移库作业引擎";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
