use crate::domain::action_log::ActionLog;
use crate::engine::events::{WorkflowEvent, WorkflowEventPublisher};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{fmt_ts, now_ts};
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    /// 创建新的操作日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入操作日志
    ///
    /// # 返回
    /// - `Ok(action_id)`: 成功插入,返回 action_id
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO action_log (
                action_id, action_type, action_ts, actor, device_id,
                subject_type, subject_id, payload_json, detail
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                log.action_id,
                log.action_type,
                fmt_ts(&log.action_ts),
                log.actor,
                log.device_id,
                log.subject_type,
                log.subject_id,
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.detail,
            ],
        )?;

        Ok(log.action_id.clone())
    }

    /// 作业事件 → 操作日志
    pub fn from_event(event: &WorkflowEvent) -> ActionLog {
        let mut payload = event.payload.clone();
        if let Some(serde_json::Value::Object(map)) = payload.as_mut() {
            map.insert(
                "request_id".to_string(),
                serde_json::Value::String(event.request_id.clone()),
            );
        }
        ActionLog {
            action_id: Uuid::new_v4().to_string(),
            action_type: event.action.as_str().to_string(),
            action_ts: now_ts(),
            actor: event.actor.clone(),
            device_id: event.device_id.clone(),
            subject_type: event.subject_type().to_string(),
            subject_id: event.subject_id.clone(),
            payload_json: payload,
            detail: event.detail.clone(),
        }
    }
}

impl WorkflowEventPublisher for ActionLogRepository {
    fn publish(&self, event: WorkflowEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        let log = Self::from_event(&event);
        Ok(self.insert(&log)?)
    }
}
