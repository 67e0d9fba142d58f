// ==========================================
// 仓库移库作业引擎 - 操作日志数据仓储
// ==========================================
// 红线: 所有状态变更必须记录
// 适配: 实现 WorkflowEventPublisher,作业事件落库为审计日志
// ==========================================

mod core;
mod queries;


pub use core::ActionLogRepository;
