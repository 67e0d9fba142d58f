// ==========================================
// 仓库移库作业引擎 - 领域类型定义
// ==========================================
// 职责: 托盘/移库/订单行状态枚举及其数据库字符串映射
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 托盘状态 (Pallet State)
// ==========================================
// 红线: Closed 托盘的行集合冻结,只能通过 reopen 解冻
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PalletState {
    Open,   // 开放(可增删行)
    Closed, // 已关闭(行冻结)
}

impl fmt::Display for PalletState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl PalletState {
    /// 从数据库字符串解析
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "OPEN" => Some(PalletState::Open),
            "CLOSED" => Some(PalletState::Closed),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            PalletState::Open => "OPEN",
            PalletState::Closed => "CLOSED",
        }
    }
}

// ==========================================
// 移库单状态 (Transfer State)
// ==========================================
// 红线: Completed 为终态,无取消状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    Pending,   // 待完成(目的库位未知)
    Completed, // 已完成
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl TransferState {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(TransferState::Pending),
            "COMPLETED" => Some(TransferState::Completed),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            TransferState::Pending => "PENDING",
            TransferState::Completed => "COMPLETED",
        }
    }
}

// ==========================================
// 移库主体类型 (Subject Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectType {
    Pallet,  // 整托移库
    Article, // 物料直移(不经托盘)
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl SubjectType {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PALLET" => Some(SubjectType::Pallet),
            "ARTICLE" => Some(SubjectType::Article),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            SubjectType::Pallet => "PALLET",
            SubjectType::Article => "ARTICLE",
        }
    }
}

// ==========================================
// 订单行状态 (Line State)
// ==========================================
// 状态机: Pendiente → EnProceso → Completada
//         EnProceso → Subdividido (后台拆分,操作员视角终态)
//         Pendiente/EnProceso → Bloqueada → (主管解锁) 原状态
// 命名沿用作业现场的西语状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineState {
    Pendiente,   // 待作业
    EnProceso,   // 作业中
    Subdividido, // 已被后台拆分
    Completada,  // 已完成
    Bloqueada,   // 已阻断(等待主管解锁)
}

impl fmt::Display for LineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl LineState {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDIENTE" => Some(LineState::Pendiente),
            "EN_PROCESO" => Some(LineState::EnProceso),
            "SUBDIVIDIDO" => Some(LineState::Subdividido),
            "COMPLETADA" => Some(LineState::Completada),
            "BLOQUEADA" => Some(LineState::Bloqueada),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            LineState::Pendiente => "PENDIENTE",
            LineState::EnProceso => "EN_PROCESO",
            LineState::Subdividido => "SUBDIVIDIDO",
            LineState::Completada => "COMPLETADA",
            LineState::Bloqueada => "BLOQUEADA",
        }
    }

    /// 操作员视角的终态(不可再推进)
    pub fn is_terminal(&self) -> bool {
        matches!(self, LineState::Subdividido | LineState::Completada)
    }

    /// 是否允许进入 Bloqueada
    pub fn can_block(&self) -> bool {
        matches!(self, LineState::Pendiente | LineState::EnProceso)
    }
}

// ==========================================
// 操作员角色 (Operator Role)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorRole {
    Operator,   // 现场操作员
    Supervisor, // 主管(可解锁/审核)
}

impl fmt::Display for OperatorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorRole::Operator => write!(f, "OPERATOR"),
            OperatorRole::Supervisor => write!(f, "SUPERVISOR"),
        }
    }
}

// ==========================================
// 库存调整状态 (Adjustment Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentStatus {
    Applied,       // 容差内,已直接生效
    PendingReview, // 超容差短缺,等待主管审核
    Approved,      // 主管批准
    Rejected,      // 主管驳回
    Blocked,       // 盘盈阻断
    Released,      // 阻断已被主管解除
}

impl fmt::Display for AdjustmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl AdjustmentStatus {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "APPLIED" => Some(AdjustmentStatus::Applied),
            "PENDING_REVIEW" => Some(AdjustmentStatus::PendingReview),
            "APPROVED" => Some(AdjustmentStatus::Approved),
            "REJECTED" => Some(AdjustmentStatus::Rejected),
            "BLOCKED" => Some(AdjustmentStatus::Blocked),
            "RELEASED" => Some(AdjustmentStatus::Released),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            AdjustmentStatus::Applied => "APPLIED",
            AdjustmentStatus::PendingReview => "PENDING_REVIEW",
            AdjustmentStatus::Approved => "APPROVED",
            AdjustmentStatus::Rejected => "REJECTED",
            AdjustmentStatus::Blocked => "BLOCKED",
            AdjustmentStatus::Released => "RELEASED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_state_db_roundtrip_is_case_insensitive() {
        assert_eq!(LineState::from_db_str("en_proceso"), Some(LineState::EnProceso));
        assert_eq!(LineState::from_db_str("BLOQUEADA"), Some(LineState::Bloqueada));
        assert_eq!(LineState::from_db_str("UNKNOWN"), None);
    }

    #[test]
    fn test_line_state_terminal_and_blockable() {
        assert!(LineState::Completada.is_terminal());
        assert!(LineState::Subdividido.is_terminal());
        assert!(!LineState::Bloqueada.is_terminal());
        assert!(LineState::EnProceso.can_block());
        assert!(!LineState::Completada.can_block());
    }

    #[test]
    fn test_transfer_state_display() {
        assert_eq!(TransferState::Pending.to_string(), "PENDING");
        assert_eq!(SubjectType::Article.to_string(), "ARTICLE");
    }
}
