// ==========================================
// 仓库移库作业引擎 - API层错误类型
// ==========================================
// 职责: 将引擎/仓储错误转换为带稳定错误码的用户可读错误
// 约束: code() 为 UI 协作方使用的机器码,不随文案变化
// ==========================================

use crate::engine::error::{EngineError, ErrorKind};
use crate::repository::error::RepositoryError;
use serde::Serialize;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 扫码错误(重新扫描)
    // ==========================================
    #[error("扫码无效: {0}")]
    InvalidScan(String),

    #[error("库位无效: {0}")]
    InvalidLocation(String),

    // ==========================================
    // 业务前置条件
    // ==========================================
    #[error("托盘已关闭: {0}")]
    PalletClosed(String),

    #[error("已存在待完成移库单: {0}")]
    AlreadyPendingTransfer(String),

    #[error("移库单不是待完成状态: {0}")]
    TransferNotPending(String),

    #[error("无效的状态转换: {entity} {from} → {to}")]
    InvalidStateTransition {
        entity: String,
        from: String,
        to: String,
    },

    #[error("行被拒绝: {0}")]
    LineRejected(String),

    #[error("未指派: {0}")]
    NotAssigned(String),

    #[error("无权限: {0}")]
    Unauthorized(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("乐观锁冲突: {0}")]
    OptimisticLockFailure(String),

    // ==========================================
    // 占用/阻断
    // ==========================================
    #[error("目标货位已被占用: location={location}, pallet={occupant}")]
    LocationOccupied { location: String, occupant: String },

    #[error("盘点阻断: {0}")]
    ReconciliationBlocked(String),

    // ==========================================
    // 基础设施错误
    // ==========================================
    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("导入失败: {0}")]
    ImportError(String),

    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ApiError {
    /// 稳定错误码
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidScan(_) => "INVALID_SCAN",
            ApiError::InvalidLocation(_) => "INVALID_LOCATION",
            ApiError::PalletClosed(_) => "PALLET_CLOSED",
            ApiError::AlreadyPendingTransfer(_) => "ALREADY_PENDING_TRANSFER",
            ApiError::TransferNotPending(_) => "TRANSFER_NOT_PENDING",
            ApiError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            ApiError::LineRejected(_) => "LINE_REJECTED",
            ApiError::NotAssigned(_) => "NOT_ASSIGNED",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::OptimisticLockFailure(_) => "CONCURRENT_MODIFICATION",
            ApiError::LocationOccupied { .. } => "LOCATION_OCCUPIED",
            ApiError::ReconciliationBlocked(_) => "RECONCILIATION_BLOCKED",
            ApiError::ConfigError(_) => "CONFIG_ERROR",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::ImportError(_) => "IMPORT_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// 错误大类(决定 UI 提示方式)
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::InvalidScan(_) | ApiError::InvalidLocation(_) => ErrorKind::Classification,
            ApiError::LocationOccupied { .. } => ErrorKind::OccupancyConflict,
            ApiError::ReconciliationBlocked(_) => ErrorKind::ReconciliationBlock,
            ApiError::ConfigError(_) => ErrorKind::Configuration,
            ApiError::DatabaseError(_) | ApiError::ImportError(_) | ApiError::InternalError(_) => {
                ErrorKind::TransportFailure
            }
            _ => ErrorKind::StateViolation,
        }
    }

    /// 序列化给 UI 的错误体
    pub fn to_response(&self) -> ApiErrorResponse {
        ApiErrorResponse {
            code: self.code(),
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// 错误响应体
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorResponse {
    pub code: &'static str,
    pub kind: ErrorKind,
    pub message: String,
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::Classification(_) => ApiError::InvalidScan(message),
            EngineError::InvalidLocation(_) => ApiError::InvalidLocation(message),
            EngineError::PalletClosed { .. } => ApiError::PalletClosed(message),
            EngineError::AlreadyPendingTransfer { .. } => ApiError::AlreadyPendingTransfer(message),
            EngineError::TransferNotPending { .. } => ApiError::TransferNotPending(message),
            EngineError::InvalidStateTransition { entity, from, to } => {
                ApiError::InvalidStateTransition { entity, from, to }
            }
            EngineError::LineRejected(_) => ApiError::LineRejected(message),
            EngineError::NotAssigned { .. } => ApiError::NotAssigned(message),
            EngineError::Unauthorized(_) => ApiError::Unauthorized(message),
            EngineError::ConcurrentModification(_) => ApiError::OptimisticLockFailure(message),
            EngineError::InvalidQuantity(_) => ApiError::InvalidInput(message),
            EngineError::NotFound { .. } => ApiError::NotFound(message),
            EngineError::LocationOccupied { location, occupant } => {
                ApiError::LocationOccupied { location, occupant }
            }
            EngineError::ReconciliationBlock { .. } | EngineError::LineBlocked { .. } => {
                ApiError::ReconciliationBlocked(message)
            }
            EngineError::Config(_) => ApiError::ConfigError(message),
            EngineError::Repository(repo) => repo.into(),
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure { entity, id, expected } => {
                ApiError::OptimisticLockFailure(format!(
                    "{}(id={})已被其他用户修改(期望版本 {})",
                    entity, id, expected
                ))
            }
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
