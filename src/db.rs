// ==========================================
// 仓库移库作业引擎 - SQLite 连接初始化与建库
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少多终端并发写入时的偶发 busy 错误
// - 提供幂等建库脚本(参考存储实现)
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开连接、建库,并包装为仓储共享连接
pub fn open_shared_connection(db_path: &str) -> rusqlite::Result<Arc<Mutex<Connection>>> {
    let conn = open_sqlite_connection(db_path)?;
    apply_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 幂等建库
///
/// 关键约束:
/// - ux_transfer_pending_subject: 同一主体最多一张 PENDING 移库单
/// - pallet_line.quantity > 0
pub fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    if let Some(version) = read_schema_version(conn)? {
        if version != CURRENT_SCHEMA_VERSION {
            tracing::warn!(
                "schema_version 不匹配: 数据库={}, 代码期望={}",
                version,
                CURRENT_SCHEMA_VERSION
            );
        }
    }
    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL DEFAULT 'global',
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS pallet_type (
    type_code TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    max_lines INTEGER
);

CREATE TABLE IF NOT EXISTS pallet_sequence (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    last_serial INTEGER NOT NULL
);
INSERT OR IGNORE INTO pallet_sequence (id, last_serial) VALUES (1, 0);

CREATE TABLE IF NOT EXISTS pallet (
    pallet_id TEXT PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    state TEXT NOT NULL,
    pallet_type TEXT NOT NULL REFERENCES pallet_type(type_code),
    origin_work_order TEXT,
    current_location TEXT,
    archived INTEGER NOT NULL DEFAULT 0,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_pallet_location ON pallet(current_location);

CREATE TABLE IF NOT EXISTS pallet_line (
    line_id TEXT PRIMARY KEY,
    pallet_id TEXT NOT NULL REFERENCES pallet(pallet_id) ON DELETE CASCADE,
    seq_no INTEGER NOT NULL,
    article TEXT NOT NULL,
    lot TEXT,
    expiry TEXT,
    quantity REAL NOT NULL CHECK (quantity > 0),
    origin_location TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_pallet_line_pallet ON pallet_line(pallet_id, seq_no);

CREATE TABLE IF NOT EXISTS transfer (
    transfer_id TEXT PRIMARY KEY,
    subject_type TEXT NOT NULL,
    subject_id TEXT NOT NULL,
    quantity REAL,
    lot TEXT,
    origin_location TEXT NOT NULL,
    destination_location TEXT,
    state TEXT NOT NULL,
    created_by TEXT NOT NULL,
    completed_by TEXT,
    created_at TEXT NOT NULL,
    completed_at TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS ux_transfer_pending_subject
    ON transfer(subject_type, subject_id) WHERE state = 'PENDING';

CREATE TABLE IF NOT EXISTS order_line (
    line_id TEXT PRIMARY KEY,
    order_id TEXT NOT NULL,
    assigned_operator TEXT NOT NULL,
    article TEXT NOT NULL,
    lot TEXT,
    origin_location TEXT,
    planned_quantity REAL NOT NULL,
    moved_quantity REAL NOT NULL DEFAULT 0,
    state TEXT NOT NULL,
    state_before_block TEXT,
    linked_transfer_id TEXT REFERENCES transfer(transfer_id),
    destination_pallet_id TEXT,
    parent_line_id TEXT,
    updated_at TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_order_line_order ON order_line(order_id);
CREATE INDEX IF NOT EXISTS idx_order_line_dest_pallet ON order_line(destination_pallet_id);

CREATE TABLE IF NOT EXISTS stock_adjustment (
    adjustment_id TEXT PRIMARY KEY,
    line_id TEXT NOT NULL REFERENCES order_line(line_id),
    planned_quantity REAL NOT NULL,
    found_quantity REAL NOT NULL,
    delta REAL NOT NULL,
    status TEXT NOT NULL,
    recorded_by TEXT NOT NULL,
    reviewed_by TEXT,
    created_at TEXT NOT NULL,
    reviewed_at TEXT
);

CREATE TABLE IF NOT EXISTS article_catalog (
    code TEXT NOT NULL,
    description TEXT NOT NULL,
    ean TEXT,
    ean_normalized TEXT,
    lot TEXT,
    expiry TEXT
);
CREATE INDEX IF NOT EXISTS idx_article_catalog_code ON article_catalog(code);
CREATE INDEX IF NOT EXISTS idx_article_catalog_ean ON article_catalog(ean_normalized);

CREATE TABLE IF NOT EXISTS stock_record (
    warehouse TEXT NOT NULL,
    slot TEXT NOT NULL,
    article TEXT NOT NULL,
    lot TEXT,
    expiry TEXT,
    available_qty REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_stock_record_article ON stock_record(article);

CREATE TABLE IF NOT EXISTS action_log (
    action_id TEXT PRIMARY KEY,
    action_type TEXT NOT NULL,
    action_ts TEXT NOT NULL,
    actor TEXT NOT NULL,
    device_id TEXT,
    subject_type TEXT NOT NULL,
    subject_id TEXT NOT NULL,
    payload_json TEXT,
    detail TEXT
);
CREATE INDEX IF NOT EXISTS idx_action_log_subject ON action_log(subject_type, subject_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_schema_is_idempotent() {
        let conn = open_sqlite_connection(":memory:").unwrap();
        apply_schema(&conn).unwrap();
        apply_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_pending_transfer_unique_per_subject() {
        let conn = open_sqlite_connection(":memory:").unwrap();
        apply_schema(&conn).unwrap();
        let insert = "INSERT INTO transfer (transfer_id, subject_type, subject_id, origin_location, state, created_by, created_at)
                      VALUES (?1, 'PALLET', 'P1', 'A$01', ?2, 'op', '2026-01-01 00:00:00')";
        conn.execute(insert, ["T1", "PENDING"]).unwrap();
        assert!(conn.execute(insert, ["T2", "PENDING"]).is_err());
        conn.execute(insert, ["T3", "COMPLETED"]).unwrap();
    }
}
