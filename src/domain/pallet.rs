// ==========================================
// 仓库移库作业引擎 - 托盘领域模型
// ==========================================
// 红线: Closed 托盘的行集合冻结
// 红线: code 一经分配不可变
// 对齐: schema.rs pallet / pallet_line / pallet_type 表
// ==========================================

use crate::domain::location::Location;
use crate::domain::scan::ScannedPallet;
use crate::domain::types::PalletState;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Pallet - 托盘
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pallet {
    pub pallet_id: String,                  // 系统 ID (UUID)
    pub code: String,                       // SSCC-18 条码
    pub state: PalletState,                 // 状态
    pub pallet_type: String,                // 托盘类型代码(关联 pallet_type)
    pub origin_work_order: Option<String>,  // 来源工单
    pub current_location: Option<Location>, // 当前所在库位
    pub archived: bool,                     // 外部归档标记
    pub lines: Vec<PalletLine>,             // 托盘行(按加入顺序)
    pub created_by: String,                 // 创建人
    pub created_at: NaiveDateTime,          // 创建时间
    pub updated_at: NaiveDateTime,          // 更新时间
    pub version: i64,                       // 乐观锁版本号
}

impl Pallet {
    pub fn is_open(&self) -> bool {
        self.state == PalletState::Open
    }

    pub fn find_line(&self, line_id: &str) -> Option<&PalletLine> {
        self.lines.iter().find(|l| l.line_id == line_id)
    }

    /// 托盘上物料总数量
    pub fn total_quantity(&self) -> f64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// 转换为扫码结果摘要
    pub fn to_scanned(&self) -> ScannedPallet {
        ScannedPallet {
            id: self.pallet_id.clone(),
            code: self.code.clone(),
            state: self.state,
            pallet_type: self.pallet_type.clone(),
            work_order_ref: self.origin_work_order.clone(),
        }
    }
}

// ==========================================
// PalletLine - 托盘行
// ==========================================
// 归属: 仅属于所在托盘,仅在 Open 时可删除
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PalletLine {
    pub line_id: String,           // 行 ID (UUID)
    pub pallet_id: String,         // 所属托盘
    pub seq_no: i32,               // 托盘内顺序号
    pub article: String,           // 物料编码
    pub lot: Option<String>,       // 批次
    pub expiry: Option<NaiveDate>, // 有效期
    pub quantity: f64,             // 数量
    pub origin_location: Location, // 取货库位
}

/// 新增托盘行请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPalletLine {
    pub article: String,
    pub lot: Option<String>,
    pub expiry: Option<NaiveDate>,
    pub quantity: f64,
    pub origin_location: Location,
}

// ==========================================
// PalletType - 托盘类型目录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PalletType {
    pub type_code: String,       // 类型代码(如 EUR)
    pub description: String,     // 描述
    pub max_lines: Option<i32>,  // 最大行数(None = 不限)
}
