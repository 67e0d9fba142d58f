// ==========================================
// 仓库移库作业引擎 - 行映射工具
// ==========================================
// 职责: 时间/日期/库位/枚举的数据库文本编解码
// ==========================================

use crate::domain::Location;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Type;

pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 当前时间(UTC,精确到秒,与存储格式一致)
pub fn now_ts() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    NaiveDateTime::parse_from_str(&now.format(TS_FORMAT).to_string(), TS_FORMAT).unwrap_or(now)
}

pub fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub fn fmt_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

pub fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn parse_ts_opt(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<NaiveDateTime>> {
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

/// 日期解析(格式错误视为无日期)
pub fn parse_date_opt(raw: Option<String>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok())
}

pub fn parse_location(idx: usize, raw: &str) -> rusqlite::Result<Location> {
    Location::from_code(raw).ok_or_else(|| conversion_error(idx, format!("无效库位: {}", raw)))
}

pub fn parse_location_opt(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<Location>> {
    raw.map(|s| parse_location(idx, &s)).transpose()
}

/// 枚举解析(未知值直接报错,不静默兜底)
pub fn parse_enum<T>(idx: usize, raw: &str, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| conversion_error(idx, format!("未知枚举值: {}", raw)))
}
