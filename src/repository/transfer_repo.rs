// ==========================================
// 仓库移库作业引擎 - 移库单仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 并发: ux_transfer_pending_subject 部分唯一索引 + 条件完成
// ==========================================

use crate::domain::{Location, SubjectType, Transfer, TransferState};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{
    fmt_ts, parse_enum, parse_location, parse_location_opt, parse_ts, parse_ts_opt,
};
use crate::repository::stores::TransferStore;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const TRANSFER_COLUMNS: &str = "transfer_id, subject_type, subject_id, quantity, lot,
                                origin_location, destination_location, state,
                                created_by, completed_by, created_at, completed_at";

// ==========================================
// TransferRepository - 移库单仓储
// ==========================================
pub struct TransferRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TransferRepository {
    /// 创建新的 TransferRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Transfer> {
        let subject_type: String = row.get(1)?;
        let state: String = row.get(7)?;
        Ok(Transfer {
            transfer_id: row.get(0)?,
            subject_type: parse_enum(1, &subject_type, SubjectType::from_db_str)?,
            subject_id: row.get(2)?,
            quantity: row.get(3)?,
            lot: row.get(4)?,
            origin_location: parse_location(5, &row.get::<_, String>(5)?)?,
            destination_location: parse_location_opt(6, row.get(6)?)?,
            state: parse_enum(7, &state, TransferState::from_db_str)?,
            created_by: row.get(8)?,
            completed_by: row.get(9)?,
            created_at: parse_ts(10, &row.get::<_, String>(10)?)?,
            completed_at: parse_ts_opt(11, row.get(11)?)?,
        })
    }
}

#[async_trait]
impl TransferStore for TransferRepository {
    async fn insert_pending(&self, transfer: &Transfer) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            &format!(
                "INSERT INTO transfer ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, 'PENDING', ?7, NULL, ?8, NULL)",
                TRANSFER_COLUMNS
            ),
            params![
                transfer.transfer_id,
                transfer.subject_type.to_db_str(),
                transfer.subject_id,
                transfer.quantity,
                transfer.lot,
                transfer.origin_location.to_code(),
                transfer.created_by,
                fmt_ts(&transfer.created_at),
            ],
        )?;
        Ok(())
    }

    async fn find_by_id(&self, transfer_id: &str) -> RepositoryResult<Option<Transfer>> {
        let conn = self.get_conn()?;
        let transfer = conn
            .query_row(
                &format!("SELECT {} FROM transfer WHERE transfer_id = ?1", TRANSFER_COLUMNS),
                params![transfer_id],
                Self::map_row,
            )
            .optional()?;
        Ok(transfer)
    }

    async fn find_pending_by_subject(
        &self,
        subject_type: SubjectType,
        subject_id: &str,
    ) -> RepositoryResult<Option<Transfer>> {
        let conn = self.get_conn()?;
        let transfer = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transfer WHERE subject_type = ?1 AND subject_id = ?2 AND state = 'PENDING'",
                    TRANSFER_COLUMNS
                ),
                params![subject_type.to_db_str(), subject_id],
                Self::map_row,
            )
            .optional()?;
        Ok(transfer)
    }

    async fn list_pending(&self) -> RepositoryResult<Vec<Transfer>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transfer WHERE state = 'PENDING' ORDER BY created_at, rowid",
            TRANSFER_COLUMNS
        ))?;
        let transfers = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(transfers)
    }

    async fn mark_completed(
        &self,
        transfer_id: &str,
        destination: &Location,
        completed_by: &str,
        completed_at: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"UPDATE transfer
               SET state = 'COMPLETED', destination_location = ?2, completed_by = ?3, completed_at = ?4
               WHERE transfer_id = ?1 AND state = 'PENDING'"#,
            params![transfer_id, destination.to_code(), completed_by, fmt_ts(&completed_at)],
        )?;
        Ok(rows == 1)
    }
}
