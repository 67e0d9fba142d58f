// ==========================================
// 仓库移库作业引擎 - 扫码分类器
// ==========================================
// 职责: 原始扫码串 → 类型化分类(纯函数,无 I/O)
// 规则顺序(先命中先返回):
//   1. WAREHOUSE$        → 部分库位
//   2. WAREHOUSE$SLOT    → 完整库位
//   3. 00 + 18 位数字    → SSCC(先于 GTIN 判断)
//   4. 01 + GTIN         → 物料(可带 AI 15 / AI 10)
//   5. 4-25 位字母数字   → 物料编码
//   6. 其他              → Invalid("unrecognized format")
// ==========================================

use crate::domain::location::{Location, LOCATION_SEPARATOR};
use crate::engine::gs1::{self, GS};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const UNRECOGNIZED_FORMAT: &str = "unrecognized format";

/// 物料编码长度范围
const ARTICLE_CODE_MIN_LEN: usize = 4;
const ARTICLE_CODE_MAX_LEN: usize = 25;
/// AI 10 批次最大长度
const LOT_MAX_LEN: usize = 20;

/// GTIN 查询键
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GtinKey {
    pub ean: String,
    pub lot: Option<String>,
    pub expiry: Option<NaiveDate>,
}

/// 扫码分类结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    /// 库位(不触发查询)
    Location(Location),
    /// 托盘 SSCC(18 位)
    Sscc { sscc: String },
    /// GTIN 物料
    Gtin(GtinKey),
    /// 物料编码
    ArticleCode { code: String },
    Invalid { reason: String },
}

impl Classification {
    fn unrecognized() -> Self {
        Classification::Invalid {
            reason: UNRECOGNIZED_FORMAT.to_string(),
        }
    }

    /// 是否需要查询协作方
    pub fn needs_lookup(&self) -> bool {
        matches!(
            self,
            Classification::Sscc { .. } | Classification::Gtin(_) | Classification::ArticleCode { .. }
        )
    }
}

/// 分类入口
pub fn classify(raw: &str) -> Classification {
    // 库位按原始分段判断,字段各自去空白
    if let Some(location) = classify_location(strip_symbology_identifier(raw)) {
        return Classification::Location(location);
    }

    let input = strip_symbology_identifier(raw.trim());
    if input.is_empty() {
        return Classification::unrecognized();
    }

    // 人工可读形式与带 GS 分隔的元素串按 AI 表结构化解析
    if input.starts_with('(') {
        return gs1::parse_parenthesized(input)
            .and_then(|elements| classify_elements(&elements))
            .unwrap_or_else(Classification::unrecognized);
    }
    if input.contains(GS) {
        return gs1::parse_element_string(input)
            .and_then(|elements| classify_elements(&elements))
            .unwrap_or_else(Classification::unrecognized);
    }

    if let Some(sscc) = classify_sscc(input) {
        return Classification::Sscc { sscc };
    }
    if let Some(key) = classify_gtin(input) {
        return Classification::Gtin(key);
    }
    if is_article_code(input) {
        return Classification::ArticleCode {
            code: input.to_string(),
        };
    }
    Classification::unrecognized()
}

/// 去掉 AIM 符号标识前缀(]C1 / ]d2 / ]Q3 / ]e0 ...)
fn strip_symbology_identifier(input: &str) -> &str {
    let bytes = input.as_bytes();
    if bytes.len() >= 3 && bytes[0] == b']' && bytes[1].is_ascii_alphabetic() && bytes[2].is_ascii_digit() {
        &input[3..]
    } else {
        input
    }
}

fn classify_location(input: &str) -> Option<Location> {
    if input.matches(LOCATION_SEPARATOR).count() != 1 {
        return None;
    }
    let (warehouse, slot) = input.split_once(LOCATION_SEPARATOR)?;
    if warehouse.is_empty() {
        return None;
    }
    let warehouse = warehouse.trim();
    let slot = slot.trim();
    if warehouse.is_empty() && slot.is_empty() {
        return None;
    }
    // slot 为空 = 部分库位(仅仓库);仓库为空白 = 不完整库位,由调用方拒绝
    Some(Location::new(warehouse, slot))
}

fn classify_sscc(input: &str) -> Option<String> {
    let digits = input.strip_prefix("00")?;
    if digits.len() == 18 && digits.chars().all(|c| c.is_ascii_digit()) {
        Some(digits.to_string())
    } else {
        None
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// AI 01 位于开头;载荷为 EAN-13,可带一位补零(14 位)
fn classify_gtin(input: &str) -> Option<GtinKey> {
    let payload = input.strip_prefix("01")?;
    if !payload.is_ascii() {
        return None;
    }

    let padded = (payload.len() >= 14 && payload.starts_with('0') && is_digits(&payload[1..14]))
        .then(|| (&payload[1..14], &payload[14..]));
    let unpadded =
        (payload.len() >= 13 && is_digits(&payload[..13])).then(|| (&payload[..13], &payload[13..]));

    let (ean, remainder) = match (padded, unpadded) {
        (Some(p), Some(u)) => {
            if !gs1::has_valid_check_digit(p.0) && gs1::has_valid_check_digit(u.0) {
                u
            } else {
                p
            }
        }
        (Some(p), None) => p,
        (None, Some(u)) => u,
        (None, None) => return None,
    };

    let (expiry, lot_search_from) = find_expiry(remainder);
    let lot = find_lot(&remainder[lot_search_from..]);

    Some(GtinKey {
        ean: ean.to_string(),
        lot,
        expiry,
    })
}

/// 在剩余串中查找第一个合法的 AI 15 日期
///
/// # 返回
/// - (日期, AI 10 搜索起点)
fn find_expiry(remainder: &str) -> (Option<NaiveDate>, usize) {
    let bytes = remainder.as_bytes();
    let mut idx = 0;
    while idx + 8 <= bytes.len() {
        if &bytes[idx..idx + 2] == b"15" {
            if let Some(date) = gs1::parse_date(&remainder[idx + 2..idx + 8]) {
                return (Some(date), idx + 8);
            }
        }
        idx += 1;
    }
    (None, 0)
}

/// AI 10:字母数字,最长 20 位
fn find_lot(segment: &str) -> Option<String> {
    let start = segment.find("10")? + 2;
    let lot: String = segment[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .take(LOT_MAX_LEN)
        .collect();
    if lot.is_empty() {
        None
    } else {
        Some(lot)
    }
}

fn classify_elements(elements: &[(String, String)]) -> Option<Classification> {
    let value_of = |ai: &str| {
        elements
            .iter()
            .find(|(key, _)| key == ai)
            .map(|(_, value)| value.as_str())
    };

    if elements.first().map(|(ai, _)| ai.as_str()) == Some("00") {
        return Some(Classification::Sscc {
            sscc: elements[0].1.clone(),
        });
    }

    let gtin = value_of("01")?;
    let ean = gtin.strip_prefix('0').unwrap_or(gtin);
    let expiry = value_of("15")
        .and_then(gs1::parse_date)
        .or_else(|| value_of("17").and_then(gs1::parse_date));

    Some(Classification::Gtin(GtinKey {
        ean: ean.to_string(),
        lot: value_of("10").map(str::to_string),
        expiry,
    }))
}

fn is_article_code(input: &str) -> bool {
    (ARTICLE_CODE_MIN_LEN..=ARTICLE_CODE_MAX_LEN).contains(&input.len())
        && input.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gtin(ean: &str, lot: Option<&str>, expiry: Option<NaiveDate>) -> Classification {
        Classification::Gtin(GtinKey {
            ean: ean.to_string(),
            lot: lot.map(str::to_string),
            expiry,
        })
    }

    #[test]
    fn test_location_fields_are_trimmed_and_case_preserved() {
        assert_eq!(
            classify("  aLm01 $ r-02 "),
            Classification::Location(Location::new("aLm01", "r-02"))
        );
    }

    #[test]
    fn test_partial_location() {
        let result = classify("A$");
        assert_eq!(result, Classification::Location(Location::new("A", "")));
        assert!(!result.needs_lookup());
    }

    #[test]
    fn test_two_separators_is_not_a_location() {
        assert_eq!(classify("A$B$C"), Classification::unrecognized());
        assert_eq!(classify("$01"), Classification::unrecognized());
    }

    #[test]
    fn test_blank_warehouse_keeps_fields() {
        let result = classify(" $B");
        assert_eq!(result, Classification::Location(Location::new("", "B")));
        if let Classification::Location(location) = result {
            assert!(!location.is_complete());
        }
        assert_eq!(classify(" $ "), Classification::unrecognized());
    }

    #[test]
    fn test_aim_prefixed_location() {
        assert_eq!(classify("]C1A$R01"), Classification::Location(Location::new("A", "R01")));
    }

    #[test]
    fn test_sscc_wins_over_embedded_gtin() {
        // 载荷中含有 "01" + 14 位数字,仍应识别为 SSCC
        let raw = "00301234560108412345";
        assert_eq!(
            classify(raw),
            Classification::Sscc {
                sscc: "301234560108412345".to_string()
            }
        );
    }

    #[test]
    fn test_gtin_padded_with_expiry_and_lot() {
        let raw = "01084123456789051526123110LOTA1";
        assert_eq!(
            classify(raw),
            gtin("8412345678905", Some("LOTA1"), NaiveDate::from_ymd_opt(2026, 12, 31))
        );
    }

    #[test]
    fn test_gtin_unpadded_when_check_digit_disambiguates() {
        // 未补零的 EAN-13 以 0 开头:0012345678905
        assert_eq!(gtin_ean("010012345678905"), "0012345678905");
        // 补零读法校验位正确时优先补零读法
        assert_eq!(gtin_ean("0108412345678905"), "8412345678905");
    }

    fn gtin_ean(raw: &str) -> String {
        match classify(raw) {
            Classification::Gtin(key) => key.ean,
            other => panic!("expected GTIN, got {:?}", other),
        }
    }

    #[test]
    fn test_gtin_lot_searched_after_expiry() {
        let raw = "01084123456789051527060010B7";
        assert_eq!(
            classify(raw),
            gtin("8412345678905", Some("B7"), NaiveDate::from_ymd_opt(2027, 6, 30))
        );
    }

    #[test]
    fn test_gtin_invalid_expiry_is_skipped() {
        let raw = "010841234567890515261399";
        assert_eq!(classify(raw), gtin("8412345678905", None, None));
    }

    #[test]
    fn test_aim_prefix_and_parenthesized_form() {
        assert_eq!(
            classify("]C10108412345678905"),
            gtin("8412345678905", None, None)
        );
        assert_eq!(
            classify("(01)08412345678905(15)261231(10)L1"),
            gtin("8412345678905", Some("L1"), NaiveDate::from_ymd_opt(2026, 12, 31))
        );
    }

    #[test]
    fn test_gs_separated_element_string() {
        let raw = format!("]C1010841234567890510LOT-9{}15261231", GS);
        assert_eq!(
            classify(&raw),
            gtin("8412345678905", Some("LOT-9"), NaiveDate::from_ymd_opt(2026, 12, 31))
        );

        let sscc = format!("00106141411928374657{}3712", GS);
        assert_eq!(
            classify(&sscc),
            Classification::Sscc {
                sscc: "106141411928374657".to_string()
            }
        );
    }

    #[test]
    fn test_bare_article_code_and_invalid() {
        assert_eq!(
            classify("ART001"),
            Classification::ArticleCode {
                code: "ART001".to_string()
            }
        );
        assert_eq!(classify("AB"), Classification::unrecognized());
        assert_eq!(classify("ART-001"), Classification::unrecognized());
        assert_eq!(classify("   "), Classification::unrecognized());
        assert_eq!(
            classify("ART-001"),
            Classification::Invalid {
                reason: "unrecognized format".to_string()
            }
        );
    }
}
