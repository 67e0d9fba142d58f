// ==========================================
// 仓库移库作业引擎 - 扫码结果领域模型
// ==========================================
// 用途: 每次扫码新生成,不落库
// ==========================================

use crate::domain::location::Location;
use crate::domain::types::PalletState;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 扫码识别出的物料
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedArticle {
    pub code: String,              // 物料编码
    pub description: String,       // 物料描述
    pub lot: Option<String>,       // 批次(AI 10 或目录)
    pub expiry: Option<NaiveDate>, // 有效期(AI 15 或目录)
}

/// 扫码识别出的托盘摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedPallet {
    pub id: String,                     // 托盘 ID
    pub code: String,                   // SSCC 条码
    pub state: PalletState,             // 当前状态
    pub pallet_type: String,            // 托盘类型代码
    pub work_order_ref: Option<String>, // 来源工单
}

/// 扫码结果(语义实体)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanResult {
    /// 库位(slot 为空表示只扫了仓库)
    Location(Location),
    /// 唯一命中的物料
    Article(ScannedArticle),
    /// 多个候选物料,需要操作员选择
    ArticleSet { candidates: Vec<ScannedArticle> },
    /// 托盘
    Pallet(ScannedPallet),
    /// 无法识别
    Invalid { reason: String },
}

impl ScanResult {
    pub fn invalid(reason: impl Into<String>) -> Self {
        ScanResult::Invalid {
            reason: reason.into(),
        }
    }
}
