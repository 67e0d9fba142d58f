// ==========================================
// 仓库移库作业引擎 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约束: 每个错误只作用于单次操作,没有致命错误
// ==========================================

use crate::config::ConfigError;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 错误大类(UI 据此决定提示方式)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Classification,      // 扫码无法识别/不适用,重新扫描
    StateViolation,      // 前置条件不满足
    OccupancyConflict,   // 目标货位被占用
    ReconciliationBlock, // 盘点阻断,等待主管
    TransportFailure,    // 存储/协作方故障
    Configuration,       // 配置非法
}

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 扫码 =====
    #[error("扫码无效: {0}")]
    Classification(String),

    #[error("库位无效: {0}")]
    InvalidLocation(String),

    // ===== 状态前置条件 =====
    #[error("托盘已关闭: {pallet_id}")]
    PalletClosed { pallet_id: String },

    #[error("已存在待完成移库单: subject={subject}, transfer_id={transfer_id}")]
    AlreadyPendingTransfer { subject: String, transfer_id: String },

    #[error("移库单不是待完成状态: transfer_id={transfer_id}, state={state}")]
    TransferNotPending { transfer_id: String, state: String },

    #[error("无效的状态转换: {entity} {from} → {to}")]
    InvalidStateTransition {
        entity: String,
        from: String,
        to: String,
    },

    #[error("行被拒绝: {0}")]
    LineRejected(String),

    #[error("订单行未指派给当前操作员: line_id={line_id}, operator={operator_id}")]
    NotAssigned { line_id: String, operator_id: String },

    #[error("无权限: {0}")]
    Unauthorized(String),

    #[error("并发修改冲突: {0}")]
    ConcurrentModification(String),

    #[error("数量非法: {0}")]
    InvalidQuantity(String),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ===== 占用冲突 =====
    #[error("目标货位已被占用: location={location}, pallet={occupant}")]
    LocationOccupied { location: String, occupant: String },

    // ===== 盘点阻断 =====
    #[error("盘点盘盈阻断: line_id={line_id}, surplus={surplus}")]
    ReconciliationBlock { line_id: String, surplus: f64 },

    #[error("订单行已阻断,需主管解锁: line_id={line_id}")]
    LineBlocked { line_id: String },

    // ===== 协作方 =====
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl EngineError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        EngineError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Classification(_) | EngineError::InvalidLocation(_) => {
                ErrorKind::Classification
            }
            EngineError::PalletClosed { .. }
            | EngineError::AlreadyPendingTransfer { .. }
            | EngineError::TransferNotPending { .. }
            | EngineError::InvalidStateTransition { .. }
            | EngineError::LineRejected(_)
            | EngineError::NotAssigned { .. }
            | EngineError::Unauthorized(_)
            | EngineError::ConcurrentModification(_)
            | EngineError::InvalidQuantity(_)
            | EngineError::NotFound { .. } => ErrorKind::StateViolation,
            EngineError::LocationOccupied { .. } => ErrorKind::OccupancyConflict,
            EngineError::ReconciliationBlock { .. } | EngineError::LineBlocked { .. } => {
                ErrorKind::ReconciliationBlock
            }
            EngineError::Config(_) => ErrorKind::Configuration,
            EngineError::Repository(_) => ErrorKind::TransportFailure,
        }
    }
}

// 乐观锁冲突/未找到归入状态类,其余存储错误原样透出
impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure { entity, id, expected } => {
                EngineError::ConcurrentModification(format!(
                    "{} id={} 已被修改(期望版本 {})",
                    entity, id, expected
                ))
            }
            RepositoryError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            other => EngineError::Repository(other),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
