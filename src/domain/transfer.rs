// ==========================================
// 仓库移库作业引擎 - 移库单领域模型
// ==========================================
// 红线: 同一主体最多一张 Pending 移库单
// 红线: 完成是唯一的变更路径,且为终态
// 对齐: schema.rs transfer 表
// ==========================================

use crate::domain::location::Location;
use crate::domain::types::{SubjectType, TransferState};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

const ARTICLE_KEY_SEPARATOR: char = '|';

/// 物料直移主体键: 物料|批次|起点库位
///
/// 同一库存位置同一时刻最多一张 Pending 直移单
pub fn article_subject_id(article: &str, lot: Option<&str>, origin: &Location) -> String {
    format!(
        "{}{sep}{}{sep}{}",
        article.trim(),
        lot.map(str::trim).unwrap_or(""),
        origin.to_code(),
        sep = ARTICLE_KEY_SEPARATOR
    )
}

/// 移库单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub transfer_id: String,                    // 移库单 ID (UUID)
    pub subject_type: SubjectType,              // 主体类型
    pub subject_id: String,                     // 托盘 ID 或物料库存位置键
    pub quantity: Option<f64>,                  // 物料直移数量(整托为 None)
    pub lot: Option<String>,                    // 物料直移批次
    pub origin_location: Location,              // 起点库位
    pub destination_location: Option<Location>, // 终点库位(完成时写入)
    pub state: TransferState,                   // 状态
    pub created_by: String,                     // 创建人
    pub completed_by: Option<String>,           // 完成人
    pub created_at: NaiveDateTime,              // 创建时间
    pub completed_at: Option<NaiveDateTime>,    // 完成时间
}

impl Transfer {
    pub fn is_pending(&self) -> bool {
        self.state == TransferState::Pending
    }

    /// 物料直移的物料编码
    pub fn article_code(&self) -> Option<&str> {
        match self.subject_type {
            SubjectType::Article => self.subject_id.split(ARTICLE_KEY_SEPARATOR).next(),
            SubjectType::Pallet => None,
        }
    }

    /// 主体键(用于日志与唯一约束说明)
    pub fn subject_key(&self) -> String {
        format!("{}:{}", self.subject_type, self.subject_id)
    }
}
