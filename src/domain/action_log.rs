// ==========================================
// 仓库移库作业引擎 - 操作日志领域模型
// ==========================================
// 红线: 所有状态变更必须记录
// 用途: 审计追踪(谁、在哪台终端、对哪个主体做了什么)
// 对齐: schema.rs action_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,               // 日志 ID
    pub action_type: String,             // 操作类型(存储为字符串)
    pub action_ts: NaiveDateTime,        // 操作时间戳
    pub actor: String,                   // 操作人
    pub device_id: Option<String>,       // 终端设备
    pub subject_type: String,            // 主体类型(PALLET/TRANSFER/ORDER_LINE)
    pub subject_id: String,              // 主体 ID
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,          // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    PalletCreate,       // 新建托盘
    PalletAddLine,      // 托盘加行
    PalletRemoveLine,   // 托盘删行
    PalletClose,        // 关托(生成移库单)
    PalletReopen,       // 重开托盘
    TransferCreate,     // 生成移库单
    TransferComplete,   // 完成移库
    LineStart,          // 订单行开工
    LineComplete,       // 订单行完成
    LineBlock,          // 订单行阻断
    LineUnlock,         // 主管解锁
    AdjustmentRecord,   // 记录库存调整
    AdjustmentReview,   // 主管审核调整
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::PalletCreate => "PALLET_CREATE",
            ActionType::PalletAddLine => "PALLET_ADD_LINE",
            ActionType::PalletRemoveLine => "PALLET_REMOVE_LINE",
            ActionType::PalletClose => "PALLET_CLOSE",
            ActionType::PalletReopen => "PALLET_REOPEN",
            ActionType::TransferCreate => "TRANSFER_CREATE",
            ActionType::TransferComplete => "TRANSFER_COMPLETE",
            ActionType::LineStart => "LINE_START",
            ActionType::LineComplete => "LINE_COMPLETE",
            ActionType::LineBlock => "LINE_BLOCK",
            ActionType::LineUnlock => "LINE_UNLOCK",
            ActionType::AdjustmentRecord => "ADJUSTMENT_RECORD",
            ActionType::AdjustmentReview => "ADJUSTMENT_REVIEW",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
