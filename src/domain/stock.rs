// ==========================================
// 仓库移库作业引擎 - 库存目录领域模型
// ==========================================
// 用途: StockCatalog 协作方的查询结果
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 库存记录(某库位上某物料/批次的可用量)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub warehouse: String,         // 仓库
    pub slot: String,              // 货位
    pub article: String,           // 物料编码
    pub lot: Option<String>,       // 批次
    pub expiry: Option<NaiveDate>, // 有效期(None 排在 FIFO 最后)
    pub available_qty: f64,        // 可用数量
}

/// 物料目录条目(物料 × 批次)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub code: String,              // 物料编码
    pub description: String,       // 描述
    pub ean: Option<String>,       // EAN-13
    pub lot: Option<String>,       // 批次
    pub expiry: Option<NaiveDate>, // 有效期
}

/// EAN 归一化:仅保留数字并去掉前导零(GTIN-14 补零形式与 EAN-13 视为同一条码)
pub fn normalize_ean(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.trim_start_matches('0').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ean_ignores_padding_and_noise() {
        assert_eq!(normalize_ean("08412345678905"), "8412345678905");
        assert_eq!(normalize_ean(" 8412345 678905 "), "8412345678905");
        assert_eq!(normalize_ean("0000"), "");
    }
}
