// ==========================================
// 仓库移库作业引擎 - GS1 条码工具
// ==========================================
// 职责: AI 表、校验位、日期字段、元素串结构化解析
// 约束: 纯函数,无 I/O
// ==========================================

use chrono::NaiveDate;

/// FNC1 / GS 分隔符
pub const GS: char = '\u{1d}';

/// AI 定义:定长或变长(最大长度)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiLength {
    Fixed(usize),
    Variable(usize),
}

/// 支持的应用标识符
pub fn ai_length(ai: &str) -> Option<AiLength> {
    match ai {
        "00" => Some(AiLength::Fixed(18)), // SSCC
        "01" => Some(AiLength::Fixed(14)), // GTIN
        "02" => Some(AiLength::Fixed(14)), // 所含贸易项 GTIN
        "10" => Some(AiLength::Variable(20)), // 批次
        "11" => Some(AiLength::Fixed(6)), // 生产日期
        "13" => Some(AiLength::Fixed(6)), // 包装日期
        "15" => Some(AiLength::Fixed(6)), // 保质期
        "17" => Some(AiLength::Fixed(6)), // 有效期
        "21" => Some(AiLength::Variable(20)), // 序列号
        "37" => Some(AiLength::Variable(8)), // 数量
        _ => None,
    }
}

/// GS1 mod-10 校验位(data 不含校验位)
pub fn check_digit(data: &str) -> Option<u8> {
    let mut sum = 0u32;
    for (idx, c) in data.chars().rev().enumerate() {
        let d = c.to_digit(10)?;
        sum += if idx % 2 == 0 { d * 3 } else { d };
    }
    Some(((10 - sum % 10) % 10) as u8)
}

/// 最后一位是否为正确的 GS1 校验位
pub fn has_valid_check_digit(code: &str) -> bool {
    if code.len() < 2 || !code.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let (data, check) = code.split_at(code.len() - 1);
    match (check_digit(data), check.chars().next().and_then(|c| c.to_digit(10))) {
        (Some(expected), Some(actual)) => u32::from(expected) == actual,
        _ => false,
    }
}

/// YYMMDD → 日期;DD = 00 表示当月最后一天;非法日期返回 None
pub fn parse_date(yymmdd: &str) -> Option<NaiveDate> {
    if yymmdd.len() != 6 || !yymmdd.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year = 2000 + yymmdd[0..2].parse::<i32>().ok()?;
    let month = yymmdd[2..4].parse::<u32>().ok()?;
    let day = yymmdd[4..6].parse::<u32>().ok()?;

    if day == 0 {
        NaiveDate::from_ymd_opt(year, month, 1)?;
        let next_month = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        return next_month.pred_opt();
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// 元素串结构化解析(GS 分隔变长字段)
///
/// # 返回
/// - None: 未知 AI 或字段长度不符
pub fn parse_element_string(input: &str) -> Option<Vec<(String, String)>> {
    let chars: Vec<char> = input.trim_start_matches(GS).chars().collect();
    let mut elements = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        if chars[pos] == GS {
            pos += 1;
            continue;
        }
        if pos + 2 > chars.len() {
            return None;
        }
        let ai: String = chars[pos..pos + 2].iter().collect();
        pos += 2;

        let value: String = match ai_length(&ai)? {
            AiLength::Fixed(len) => {
                if pos + len > chars.len() {
                    return None;
                }
                let value: String = chars[pos..pos + len].iter().collect();
                if !value.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                pos += len;
                value
            }
            AiLength::Variable(max) => {
                let end = chars[pos..]
                    .iter()
                    .position(|c| *c == GS)
                    .map(|offset| pos + offset)
                    .unwrap_or(chars.len());
                if end == pos || end - pos > max {
                    return None;
                }
                let value: String = chars[pos..end].iter().collect();
                pos = end;
                value
            }
        };
        elements.push((ai, value));
    }

    if elements.is_empty() {
        None
    } else {
        Some(elements)
    }
}

/// 人工可读形式 `(01)...(15)...(10)...` 解析
pub fn parse_parenthesized(input: &str) -> Option<Vec<(String, String)>> {
    if !input.starts_with('(') {
        return None;
    }
    let mut elements = Vec::new();
    let mut rest = input;

    while !rest.is_empty() {
        let body = rest.strip_prefix('(')?;
        let close = body.find(')')?;
        let ai = &body[..close];
        let after = &body[close + 1..];
        let next = after.find('(').unwrap_or(after.len());
        let value = after[..next].trim();

        match ai_length(ai)? {
            AiLength::Fixed(len) => {
                if value.len() != len || !value.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
            }
            AiLength::Variable(max) => {
                if value.is_empty() || value.chars().count() > max {
                    return None;
                }
            }
        }
        elements.push((ai.to_string(), value.to_string()));
        rest = &after[next..];
    }

    if elements.is_empty() {
        None
    } else {
        Some(elements)
    }
}
