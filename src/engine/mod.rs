// ==========================================
// 仓库移库作业引擎 - 引擎层
// ==========================================
// 职责: 扫码分类、托盘/移库单/订单行状态机、盘点决策
// 红线: Engine 不拼 SQL,所有持久化经 stores 接口
// 红线: 无进程内共享可变状态,每次调用显式传入 RequestContext
// ==========================================

pub mod classifier;
pub mod error;
pub mod events;
pub mod fifo;
pub mod gs1;
pub mod line_tracker;
pub mod pallet_lifecycle;
pub mod reconciliation;
pub mod scan_resolver;
pub mod transfer_lifecycle;

// 重导出核心引擎
pub use classifier::{classify, Classification, GtinKey};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use events::{
    NoOpEventPublisher, OptionalEventPublisher, WorkflowEvent, WorkflowEventPublisher,
};
pub use fifo::{allocate, sort_fifo, FifoAllocation, FifoPick};
pub use line_tracker::{LineTracker, ReconciliationOutcome, StartLineOutcome};
pub use pallet_lifecycle::{build_sscc, PalletLifecycle};
pub use reconciliation::{decide, ReconciliationDecision};
pub use scan_resolver::ScanResolver;
pub use transfer_lifecycle::TransferLifecycle;
