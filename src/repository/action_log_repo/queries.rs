use super::core::ActionLogRepository;
use crate::domain::action_log::ActionLog;
use crate::repository::error::RepositoryResult;
use crate::repository::row_codec::parse_ts;
use rusqlite::{params, Result as SqliteResult, Row};

const LOG_COLUMNS: &str = "action_id, action_type, action_ts, actor, device_id,
                           subject_type, subject_id, payload_json, detail";

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按主体查询日志(按时间升序)
    pub fn find_by_subject(
        &self,
        subject_type: &str,
        subject_id: &str,
    ) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM action_log WHERE subject_type = ?1 AND subject_id = ?2
             ORDER BY action_ts, rowid",
            LOG_COLUMNS
        ))?;
        let logs = stmt
            .query_map(params![subject_type, subject_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 按操作人查询最近日志
    pub fn find_by_actor(&self, actor: &str, limit: i32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM action_log WHERE actor = ?1 ORDER BY action_ts DESC, rowid DESC LIMIT ?2",
            LOG_COLUMNS
        ))?;
        let logs = stmt
            .query_map(params![actor, limit], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 查询最近日志
    pub fn find_recent(&self, limit: i32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM action_log ORDER BY action_ts DESC, rowid DESC LIMIT ?1",
            LOG_COLUMNS
        ))?;
        let logs = stmt
            .query_map(params![limit], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }
}

fn map_row(row: &Row) -> SqliteResult<ActionLog> {
    let payload: Option<String> = row.get(7)?;
    Ok(ActionLog {
        action_id: row.get(0)?,
        action_type: row.get(1)?,
        action_ts: parse_ts(2, &row.get::<_, String>(2)?)?,
        actor: row.get(3)?,
        device_id: row.get(4)?,
        subject_type: row.get(5)?,
        subject_id: row.get(6)?,
        payload_json: payload.and_then(|s| serde_json::from_str(&s).ok()),
        detail: row.get(8)?,
    })
}
