// ==========================================
// 仓库移库作业引擎 - 托盘仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 并发: version 乐观锁;行变更附带 state = 'OPEN' 条件
// ==========================================

use crate::domain::{Location, Pallet, PalletLine, PalletState, PalletType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{
    fmt_date, fmt_ts, now_ts, parse_date_opt, parse_enum, parse_location, parse_location_opt,
    parse_ts,
};
use crate::repository::stores::PalletStore;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::sync::{Arc, Mutex};

const PALLET_COLUMNS: &str = "pallet_id, code, state, pallet_type, origin_work_order, current_location,
                              archived, created_by, created_at, updated_at, version";

// ==========================================
// PalletRepository - 托盘仓储
// ==========================================
pub struct PalletRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PalletRepository {
    /// 创建新的 PalletRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 注册托盘类型(目录维护)
    pub fn upsert_pallet_type(&self, pallet_type: &PalletType) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO pallet_type (type_code, description, max_lines) VALUES (?1, ?2, ?3)
               ON CONFLICT(type_code) DO UPDATE SET description = ?2, max_lines = ?3"#,
            params![pallet_type.type_code, pallet_type.description, pallet_type.max_lines],
        )?;
        Ok(())
    }

    /// 外部归档(引擎不调用)
    pub fn archive(&self, pallet_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE pallet SET archived = 1, updated_at = ?2, version = version + 1 WHERE pallet_id = ?1",
            params![pallet_id, fmt_ts(&now_ts())],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("pallet", pallet_id));
        }
        Ok(())
    }

    fn map_pallet_row(row: &rusqlite::Row) -> rusqlite::Result<Pallet> {
        let state: String = row.get(2)?;
        Ok(Pallet {
            pallet_id: row.get(0)?,
            code: row.get(1)?,
            state: parse_enum(2, &state, PalletState::from_db_str)?,
            pallet_type: row.get(3)?,
            origin_work_order: row.get(4)?,
            current_location: parse_location_opt(5, row.get(5)?)?,
            archived: row.get::<_, i64>(6)? != 0,
            lines: Vec::new(),
            created_by: row.get(7)?,
            created_at: parse_ts(8, &row.get::<_, String>(8)?)?,
            updated_at: parse_ts(9, &row.get::<_, String>(9)?)?,
            version: row.get(10)?,
        })
    }

    fn map_line_row(row: &rusqlite::Row) -> rusqlite::Result<PalletLine> {
        Ok(PalletLine {
            line_id: row.get(0)?,
            pallet_id: row.get(1)?,
            seq_no: row.get(2)?,
            article: row.get(3)?,
            lot: row.get(4)?,
            expiry: parse_date_opt(row.get(5)?),
            quantity: row.get(6)?,
            origin_location: parse_location(7, &row.get::<_, String>(7)?)?,
        })
    }

    fn load_lines(conn: &Connection, pallet_id: &str) -> RepositoryResult<Vec<PalletLine>> {
        let mut stmt = conn.prepare(
            r#"SELECT line_id, pallet_id, seq_no, article, lot, expiry, quantity, origin_location
               FROM pallet_line WHERE pallet_id = ?1 ORDER BY seq_no"#,
        )?;
        let lines = stmt
            .query_map(params![pallet_id], Self::map_line_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines)
    }

    fn find_one(&self, where_clause: &str, key: &str) -> RepositoryResult<Option<Pallet>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM pallet WHERE {} = ?1", PALLET_COLUMNS, where_clause);
        let pallet = conn
            .query_row(&sql, params![key], Self::map_pallet_row)
            .optional()?;
        match pallet {
            Some(mut pallet) => {
                pallet.lines = Self::load_lines(&conn, &pallet.pallet_id)?;
                Ok(Some(pallet))
            }
            None => Ok(None),
        }
    }

    /// 版本 +1;仅当版本匹配(且可选 state 条件满足)时成功
    fn bump_version(
        tx: &Transaction,
        pallet_id: &str,
        expected_version: i64,
        require_open: bool,
    ) -> RepositoryResult<i64> {
        let sql = if require_open {
            "UPDATE pallet SET version = version + 1, updated_at = ?3
             WHERE pallet_id = ?1 AND version = ?2 AND state = 'OPEN'"
        } else {
            "UPDATE pallet SET version = version + 1, updated_at = ?3
             WHERE pallet_id = ?1 AND version = ?2"
        };
        let rows = tx.execute(sql, params![pallet_id, expected_version, fmt_ts(&now_ts())])?;
        if rows == 0 {
            return Err(RepositoryError::lock_failure("pallet", pallet_id, expected_version));
        }
        Ok(expected_version + 1)
    }
}

#[async_trait]
impl PalletStore for PalletRepository {
    async fn find_pallet_type(&self, type_code: &str) -> RepositoryResult<Option<PalletType>> {
        let conn = self.get_conn()?;
        let pallet_type = conn
            .query_row(
                "SELECT type_code, description, max_lines FROM pallet_type WHERE type_code = ?1",
                params![type_code],
                |row| {
                    Ok(PalletType {
                        type_code: row.get(0)?,
                        description: row.get(1)?,
                        max_lines: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(pallet_type)
    }

    async fn next_serial(&self) -> RepositoryResult<u64> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE pallet_sequence SET last_serial = last_serial + 1 WHERE id = 1",
            [],
        )?;
        let serial: i64 = tx.query_row(
            "SELECT last_serial FROM pallet_sequence WHERE id = 1",
            [],
            |row| row.get(0),
        )?;
        tx.commit()?;
        u64::try_from(serial).map_err(|e| RepositoryError::InternalError(e.to_string()))
    }

    async fn insert(&self, pallet: &Pallet) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO pallet ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                PALLET_COLUMNS
            ),
            params![
                pallet.pallet_id,
                pallet.code,
                pallet.state.to_db_str(),
                pallet.pallet_type,
                pallet.origin_work_order,
                pallet.current_location.as_ref().map(|l| l.to_code()),
                pallet.archived as i64,
                pallet.created_by,
                fmt_ts(&pallet.created_at),
                fmt_ts(&pallet.updated_at),
                pallet.version,
            ],
        )?;
        for line in &pallet.lines {
            insert_line(&tx, line)?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn find_by_id(&self, pallet_id: &str) -> RepositoryResult<Option<Pallet>> {
        self.find_one("pallet_id", pallet_id)
    }

    async fn find_by_code(&self, code: &str) -> RepositoryResult<Option<Pallet>> {
        self.find_one("code", code)
    }

    async fn add_line(
        &self,
        pallet_id: &str,
        expected_version: i64,
        line: &PalletLine,
    ) -> RepositoryResult<i64> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let version = Self::bump_version(&tx, pallet_id, expected_version, true)?;
        insert_line(&tx, line)?;
        tx.commit()?;
        Ok(version)
    }

    async fn remove_line(
        &self,
        pallet_id: &str,
        expected_version: i64,
        line_id: &str,
    ) -> RepositoryResult<i64> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let version = Self::bump_version(&tx, pallet_id, expected_version, true)?;
        let rows = tx.execute(
            "DELETE FROM pallet_line WHERE pallet_id = ?1 AND line_id = ?2",
            params![pallet_id, line_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("pallet_line", line_id));
        }
        tx.commit()?;
        Ok(version)
    }

    async fn update_state(
        &self,
        pallet_id: &str,
        expected_version: i64,
        state: PalletState,
        location: Option<&Location>,
    ) -> RepositoryResult<i64> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let version = Self::bump_version(&tx, pallet_id, expected_version, false)?;
        tx.execute(
            "UPDATE pallet SET state = ?2, current_location = COALESCE(?3, current_location)
             WHERE pallet_id = ?1",
            params![pallet_id, state.to_db_str(), location.map(|l| l.to_code())],
        )?;
        tx.commit()?;
        Ok(version)
    }

    async fn relocate(&self, pallet_id: &str, location: &Location) -> RepositoryResult<i64> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let rows = tx.execute(
            "UPDATE pallet SET current_location = ?2, updated_at = ?3, version = version + 1
             WHERE pallet_id = ?1",
            params![pallet_id, location.to_code(), fmt_ts(&now_ts())],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("pallet", pallet_id));
        }
        let version: i64 = tx.query_row(
            "SELECT version FROM pallet WHERE pallet_id = ?1",
            params![pallet_id],
            |row| row.get(0),
        )?;
        tx.commit()?;
        Ok(version)
    }

    async fn find_active_at(&self, location: &Location) -> RepositoryResult<Vec<Pallet>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM pallet WHERE current_location = ?1 AND archived = 0 ORDER BY created_at",
            PALLET_COLUMNS
        ))?;
        let pallets = stmt
            .query_map(params![location.to_code()], Self::map_pallet_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pallets)
    }
}

fn insert_line(tx: &Transaction, line: &PalletLine) -> RepositoryResult<()> {
    tx.execute(
        r#"INSERT INTO pallet_line (
               line_id, pallet_id, seq_no, article, lot, expiry, quantity, origin_location
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
        params![
            line.line_id,
            line.pallet_id,
            line.seq_no,
            line.article,
            line.lot,
            line.expiry.as_ref().map(fmt_date),
            line.quantity,
            line.origin_location.to_code(),
        ],
    )?;
    Ok(())
}
