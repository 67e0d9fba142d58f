// ==========================================
// 仓库移库作业引擎 - 订单行领域模型
// ==========================================
// 红线: 状态单向流转,Bloqueada 只能由主管解锁回到阻断前状态
// 红线: Subdividido 对操作员是终态,引擎不自动处理拆分
// 对齐: schema.rs order_line / stock_adjustment 表
// ==========================================

use crate::domain::location::Location;
use crate::domain::types::{AdjustmentStatus, LineState};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// OrderLine - 订单行(操作员作业项)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_id: String,                       // 行 ID
    pub order_id: String,                      // 所属订单
    pub assigned_operator: String,             // 指派操作员
    pub article: String,                       // 物料编码
    pub lot: Option<String>,                   // 批次
    pub origin_location: Option<Location>,     // 计划取货库位
    pub planned_quantity: f64,                 // 计划数量
    pub moved_quantity: f64,                   // 实际移动数量
    pub state: LineState,                      // 状态
    pub state_before_block: Option<LineState>, // 阻断前状态(解锁时恢复)
    pub linked_transfer_id: Option<String>,    // 关联移库单(回填)
    pub destination_pallet_id: Option<String>, // 目标托盘(等待该托盘移库完成)
    pub parent_line_id: Option<String>,        // 拆分来源行
    pub updated_at: NaiveDateTime,             // 更新时间
    pub version: i64,                          // 乐观锁版本号
}

impl OrderLine {
    pub fn is_assigned_to(&self, operator_id: &str) -> bool {
        self.assigned_operator == operator_id
    }
}

/// 完成订单行时的去向
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineDestination {
    /// 放到托盘上,随托盘移库完成后回填移库单
    Pallet(String),
    /// 直接放到库位(物料直移,立即完成)
    Location(Location),
}

// ==========================================
// StockAdjustment - 库存调整记录
// ==========================================
// 用途: 记录计划数量与实盘数量的差异及处理结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub adjustment_id: String,       // 调整 ID
    pub line_id: String,             // 关联订单行
    pub planned_quantity: f64,       // 计划数量
    pub found_quantity: f64,         // 实盘数量
    pub delta: f64,                  // 差异(found - planned)
    pub status: AdjustmentStatus,    // 处理状态
    pub recorded_by: String,         // 记录人
    pub reviewed_by: Option<String>, // 审核人
    pub created_at: NaiveDateTime,   // 创建时间
    pub reviewed_at: Option<NaiveDateTime>, // 审核时间
}
