// ==========================================
// 仓库移库作业引擎 - FIFO 排序与分配
// ==========================================
// 规则: 有效期升序,无有效期排最后;同有效期保持输入顺序(稳定排序)
// ==========================================

use crate::domain::StockRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 单个货位的拣货量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FifoPick {
    pub record: StockRecord,
    pub quantity: f64,
}

/// 分配结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FifoAllocation {
    pub picks: Vec<FifoPick>,
    /// 库存不足时未分配的余量
    pub unallocated: f64,
}

impl FifoAllocation {
    pub fn is_complete(&self) -> bool {
        self.unallocated <= f64::EPSILON
    }
}

/// FIFO 稳定排序(无有效期排最后)
pub fn sort_fifo(records: &mut [StockRecord]) {
    records.sort_by(|a, b| match (a.expiry, b.expiry) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// 按 FIFO 顺序分配需求量
pub fn allocate(records: &[StockRecord], quantity: f64) -> FifoAllocation {
    let mut ordered = records.to_vec();
    sort_fifo(&mut ordered);

    let mut remaining = quantity.max(0.0);
    let mut picks = Vec::new();
    for record in ordered {
        if remaining <= f64::EPSILON {
            break;
        }
        if record.available_qty <= 0.0 {
            continue;
        }
        let take = record.available_qty.min(remaining);
        remaining -= take;
        picks.push(FifoPick {
            record,
            quantity: take,
        });
    }

    FifoAllocation {
        picks,
        unallocated: remaining,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(slot: &str, expiry: Option<(i32, u32, u32)>, qty: f64) -> StockRecord {
        StockRecord {
            warehouse: "A".to_string(),
            slot: slot.to_string(),
            article: "ART01".to_string(),
            lot: None,
            expiry: expiry.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            available_qty: qty,
        }
    }

    #[test]
    fn test_sort_fifo_nulls_last_and_stable() {
        let mut records = vec![
            rec("N1", None, 1.0),
            rec("LATE", Some((2027, 1, 1)), 1.0),
            rec("N2", None, 1.0),
            rec("EARLY", Some((2026, 1, 1)), 1.0),
        ];
        sort_fifo(&mut records);
        let slots: Vec<&str> = records.iter().map(|r| r.slot.as_str()).collect();
        assert_eq!(slots, vec!["EARLY", "LATE", "N1", "N2"]);
    }

    #[test]
    fn test_allocate_spans_slots_in_fifo_order() {
        let records = vec![
            rec("B", Some((2027, 1, 1)), 10.0),
            rec("A", Some((2026, 1, 1)), 4.0),
        ];
        let allocation = allocate(&records, 6.0);
        assert!(allocation.is_complete());
        assert_eq!(allocation.picks.len(), 2);
        assert_eq!(allocation.picks[0].record.slot, "A");
        assert_eq!(allocation.picks[0].quantity, 4.0);
        assert_eq!(allocation.picks[1].quantity, 2.0);
    }

    #[test]
    fn test_allocate_reports_shortfall() {
        let records = vec![rec("A", None, 3.0), rec("B", None, 0.0)];
        let allocation = allocate(&records, 5.0);
        assert!(!allocation.is_complete());
        assert_eq!(allocation.unallocated, 2.0);
        assert_eq!(allocation.picks.len(), 1);
    }
}
