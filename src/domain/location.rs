// ==========================================
// 仓库移库作业引擎 - 库位值对象
// ==========================================
// 条码格式: "<WAREHOUSE>$<SLOT>" 或 "<WAREHOUSE>$"(仅仓库,库位待补扫)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 仓库与库位的分隔符
pub const LOCATION_SEPARATOR: char = '$';

/// 库位(仓库 + 货位)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub warehouse: String, // 仓库代码
    pub slot: String,      // 货位代码(空串 = 部分库位)
}

impl Location {
    pub fn new(warehouse: impl Into<String>, slot: impl Into<String>) -> Self {
        Self {
            warehouse: warehouse.into(),
            slot: slot.into(),
        }
    }

    /// 是否为部分库位(只扫了仓库)
    pub fn is_partial(&self) -> bool {
        self.slot.is_empty()
    }

    /// 是否为可作为移库起点/终点的完整库位
    pub fn is_complete(&self) -> bool {
        !self.warehouse.is_empty() && !self.slot.is_empty()
    }

    /// 条码/存储格式: WAREHOUSE$SLOT
    pub fn to_code(&self) -> String {
        format!("{}{}{}", self.warehouse, LOCATION_SEPARATOR, self.slot)
    }

    /// 从存储格式还原(只接受恰好一个分隔符)
    pub fn from_code(code: &str) -> Option<Self> {
        let (warehouse, slot) = code.split_once(LOCATION_SEPARATOR)?;
        if slot.contains(LOCATION_SEPARATOR) {
            return None;
        }
        Some(Self::new(warehouse, slot))
    }

    /// 货位前缀是否命中给定前缀集合(大小写不敏感)
    pub fn slot_has_prefix(&self, prefixes: &[String]) -> bool {
        let slot = self.slot.to_uppercase();
        prefixes
            .iter()
            .filter(|p| !p.is_empty())
            .any(|p| slot.starts_with(&p.to_uppercase()))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.warehouse, LOCATION_SEPARATOR, self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        let loc = Location::new("A", "01");
        assert_eq!(loc.to_code(), "A$01");
        assert_eq!(Location::from_code("A$01"), Some(loc));
        assert_eq!(Location::from_code("A$0$1"), None);
    }

    #[test]
    fn test_partial_location() {
        let loc = Location::from_code("ALM1$").unwrap();
        assert!(loc.is_partial());
        assert!(!loc.is_complete());
    }

    #[test]
    fn test_slot_prefix_case_insensitive() {
        let loc = Location::new("B", "r-12-03");
        assert!(loc.slot_has_prefix(&["R".to_string()]));
        assert!(!loc.slot_has_prefix(&["M".to_string(), String::new()]));
    }
}
