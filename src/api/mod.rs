// ==========================================
// 仓库移库作业引擎 - API 层
// ==========================================
// 职责: 提供作业 API 接口,供终端/UI 协作方调用
// ==========================================

pub mod error;
pub mod workflow_api;

// 重导出核心类型
pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use workflow_api::{WorkflowApi, WorkflowStores};
