// ==========================================
// 仓库移库作业引擎 - 订单行仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: BLOQUEADA 行只能经 supervisor_unlock 解除
// 并发: version 乐观锁
// ==========================================

use crate::domain::{AdjustmentStatus, LineState, OrderLine, StockAdjustment};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{
    fmt_ts, now_ts, parse_enum, parse_location_opt, parse_ts, parse_ts_opt,
};
use crate::repository::stores::OrderStore;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::sync::{Arc, Mutex};

const LINE_COLUMNS: &str = "line_id, order_id, assigned_operator, article, lot, origin_location,
                            planned_quantity, moved_quantity, state, state_before_block,
                            linked_transfer_id, destination_pallet_id, parent_line_id,
                            updated_at, version";

const ADJUSTMENT_COLUMNS: &str = "adjustment_id, line_id, planned_quantity, found_quantity, delta,
                                  status, recorded_by, reviewed_by, created_at, reviewed_at";

// ==========================================
// OrderLineRepository - 订单行仓储
// ==========================================
pub struct OrderLineRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderLineRepository {
    /// 创建新的 OrderLineRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入订单行(订单下发)
    pub fn insert_line(&self, line: &OrderLine) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        insert_line_tx(&tx, line)?;
        tx.commit()?;
        Ok(())
    }

    /// 后台拆分订单行(模拟服务端库存碎片化拆分,引擎从不调用)
    ///
    /// # 返回
    /// - 新生成的子行(PENDIENTE,parent_line_id 指向原行)
    pub fn subdivide(&self, line_id: &str, quantities: &[f64]) -> RepositoryResult<Vec<OrderLine>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let original = tx
            .query_row(
                &format!("SELECT {} FROM order_line WHERE line_id = ?1", LINE_COLUMNS),
                params![line_id],
                map_line_row,
            )
            .optional()?
            .ok_or_else(|| RepositoryError::not_found("order_line", line_id))?;

        if original.state.is_terminal() {
            return Err(RepositoryError::FieldValueError {
                field: "state".to_string(),
                message: format!("终态订单行不可拆分: {}", original.state),
            });
        }

        let now = now_ts();
        tx.execute(
            "UPDATE order_line SET state = 'SUBDIVIDIDO', updated_at = ?2, version = version + 1
             WHERE line_id = ?1",
            params![line_id, fmt_ts(&now)],
        )?;

        let mut children = Vec::with_capacity(quantities.len());
        for (idx, qty) in quantities.iter().enumerate() {
            let child = OrderLine {
                line_id: format!("{}-{}", original.line_id, idx + 1),
                planned_quantity: *qty,
                moved_quantity: 0.0,
                state: LineState::Pendiente,
                state_before_block: None,
                linked_transfer_id: None,
                destination_pallet_id: None,
                parent_line_id: Some(original.line_id.clone()),
                updated_at: now,
                version: 0,
                ..original.clone()
            };
            insert_line_tx(&tx, &child)?;
            children.push(child);
        }

        tx.commit()?;
        Ok(children)
    }

    fn load_line(conn: &Connection, line_id: &str) -> RepositoryResult<Option<OrderLine>> {
        let line = conn
            .query_row(
                &format!("SELECT {} FROM order_line WHERE line_id = ?1", LINE_COLUMNS),
                params![line_id],
                map_line_row,
            )
            .optional()?;
        Ok(line)
    }
}

#[async_trait]
impl OrderStore for OrderLineRepository {
    async fn find_line(&self, line_id: &str) -> RepositoryResult<Option<OrderLine>> {
        let conn = self.get_conn()?;
        Self::load_line(&conn, line_id)
    }

    async fn fetch_order_lines(&self, order_id: &str) -> RepositoryResult<Vec<OrderLine>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM order_line WHERE order_id = ?1 ORDER BY rowid",
            LINE_COLUMNS
        ))?;
        let lines = stmt
            .query_map(params![order_id], map_line_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines)
    }

    async fn signal_begin_work(&self, line_id: &str, operator_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"UPDATE order_line SET state = 'EN_PROCESO', updated_at = ?3, version = version + 1
               WHERE line_id = ?1 AND assigned_operator = ?2 AND state = 'PENDIENTE'"#,
            params![line_id, operator_id, fmt_ts(&now_ts())],
        )?;
        if rows == 0 && Self::load_line(&conn, line_id)?.is_none() {
            return Err(RepositoryError::not_found("order_line", line_id));
        }
        // 已开工/已拆分的行不再变更,由轮询读取权威状态
        Ok(())
    }

    async fn save_line(&self, line: &OrderLine) -> RepositoryResult<OrderLine> {
        let conn = self.get_conn()?;
        let now = now_ts();
        let rows = conn.execute(
            r#"UPDATE order_line SET
                   lot = ?3, origin_location = ?4, planned_quantity = ?5, moved_quantity = ?6,
                   state = ?7, state_before_block = ?8, linked_transfer_id = ?9,
                   destination_pallet_id = ?10, updated_at = ?11, version = version + 1
               WHERE line_id = ?1 AND version = ?2 AND state <> 'BLOQUEADA'"#,
            params![
                line.line_id,
                line.version,
                line.lot,
                line.origin_location.as_ref().map(|l| l.to_code()),
                line.planned_quantity,
                line.moved_quantity,
                line.state.to_db_str(),
                line.state_before_block.map(|s| s.to_db_str()),
                line.linked_transfer_id,
                line.destination_pallet_id,
                fmt_ts(&now),
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::lock_failure("order_line", &line.line_id, line.version));
        }
        Ok(OrderLine {
            updated_at: now,
            version: line.version + 1,
            ..line.clone()
        })
    }

    async fn supervisor_unlock(
        &self,
        line_id: &str,
        supervisor_id: &str,
    ) -> RepositoryResult<OrderLine> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let now = fmt_ts(&now_ts());

        let rows = tx.execute(
            r#"UPDATE order_line SET
                   state = state_before_block, state_before_block = NULL,
                   updated_at = ?2, version = version + 1
               WHERE line_id = ?1 AND state = 'BLOQUEADA' AND state_before_block IS NOT NULL"#,
            params![line_id, now],
        )?;
        if rows == 0 {
            return match Self::load_line(&tx, line_id)? {
                None => Err(RepositoryError::not_found("order_line", line_id)),
                Some(line) => Err(RepositoryError::FieldValueError {
                    field: "state".to_string(),
                    message: format!("订单行未处于 BLOQUEADA: {}", line.state),
                }),
            };
        }

        tx.execute(
            r#"UPDATE stock_adjustment SET status = 'RELEASED', reviewed_by = ?2, reviewed_at = ?3
               WHERE line_id = ?1 AND status = 'BLOCKED'"#,
            params![line_id, supervisor_id, now],
        )?;

        let line = Self::load_line(&tx, line_id)?
            .ok_or_else(|| RepositoryError::not_found("order_line", line_id))?;
        tx.commit()?;
        Ok(line)
    }

    async fn find_awaiting_pallet(&self, pallet_id: &str) -> RepositoryResult<Vec<OrderLine>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM order_line
               WHERE destination_pallet_id = ?1 AND state = 'COMPLETADA' AND linked_transfer_id IS NULL
               ORDER BY rowid"#,
            LINE_COLUMNS
        ))?;
        let lines = stmt
            .query_map(params![pallet_id], map_line_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines)
    }

    async fn insert_adjustment(&self, adjustment: &StockAdjustment) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            &format!(
                "INSERT INTO stock_adjustment ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                ADJUSTMENT_COLUMNS
            ),
            params![
                adjustment.adjustment_id,
                adjustment.line_id,
                adjustment.planned_quantity,
                adjustment.found_quantity,
                adjustment.delta,
                adjustment.status.to_db_str(),
                adjustment.recorded_by,
                adjustment.reviewed_by,
                fmt_ts(&adjustment.created_at),
                adjustment.reviewed_at.as_ref().map(fmt_ts),
            ],
        )?;
        Ok(())
    }

    async fn find_adjustment(
        &self,
        adjustment_id: &str,
    ) -> RepositoryResult<Option<StockAdjustment>> {
        let conn = self.get_conn()?;
        let adjustment = conn
            .query_row(
                &format!(
                    "SELECT {} FROM stock_adjustment WHERE adjustment_id = ?1",
                    ADJUSTMENT_COLUMNS
                ),
                params![adjustment_id],
                map_adjustment_row,
            )
            .optional()?;
        Ok(adjustment)
    }

    async fn update_adjustment(&self, adjustment: &StockAdjustment) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"UPDATE stock_adjustment SET status = ?2, reviewed_by = ?3, reviewed_at = ?4
               WHERE adjustment_id = ?1"#,
            params![
                adjustment.adjustment_id,
                adjustment.status.to_db_str(),
                adjustment.reviewed_by,
                adjustment.reviewed_at.as_ref().map(fmt_ts),
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found(
                "stock_adjustment",
                &adjustment.adjustment_id,
            ));
        }
        Ok(())
    }

    async fn list_adjustments_for_line(
        &self,
        line_id: &str,
    ) -> RepositoryResult<Vec<StockAdjustment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM stock_adjustment WHERE line_id = ?1 ORDER BY created_at, rowid",
            ADJUSTMENT_COLUMNS
        ))?;
        let adjustments = stmt
            .query_map(params![line_id], map_adjustment_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(adjustments)
    }
}

fn insert_line_tx(tx: &Transaction, line: &OrderLine) -> RepositoryResult<()> {
    tx.execute(
        &format!(
            "INSERT INTO order_line ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            LINE_COLUMNS
        ),
        params![
            line.line_id,
            line.order_id,
            line.assigned_operator,
            line.article,
            line.lot,
            line.origin_location.as_ref().map(|l| l.to_code()),
            line.planned_quantity,
            line.moved_quantity,
            line.state.to_db_str(),
            line.state_before_block.map(|s| s.to_db_str()),
            line.linked_transfer_id,
            line.destination_pallet_id,
            line.parent_line_id,
            fmt_ts(&line.updated_at),
            line.version,
        ],
    )?;
    Ok(())
}

fn map_line_row(row: &rusqlite::Row) -> rusqlite::Result<OrderLine> {
    let state: String = row.get(8)?;
    let before_block: Option<String> = row.get(9)?;
    Ok(OrderLine {
        line_id: row.get(0)?,
        order_id: row.get(1)?,
        assigned_operator: row.get(2)?,
        article: row.get(3)?,
        lot: row.get(4)?,
        origin_location: parse_location_opt(5, row.get(5)?)?,
        planned_quantity: row.get(6)?,
        moved_quantity: row.get(7)?,
        state: parse_enum(8, &state, LineState::from_db_str)?,
        state_before_block: before_block
            .map(|s| parse_enum(9, &s, LineState::from_db_str))
            .transpose()?,
        linked_transfer_id: row.get(10)?,
        destination_pallet_id: row.get(11)?,
        parent_line_id: row.get(12)?,
        updated_at: parse_ts(13, &row.get::<_, String>(13)?)?,
        version: row.get(14)?,
    })
}

fn map_adjustment_row(row: &rusqlite::Row) -> rusqlite::Result<StockAdjustment> {
    let status: String = row.get(5)?;
    Ok(StockAdjustment {
        adjustment_id: row.get(0)?,
        line_id: row.get(1)?,
        planned_quantity: row.get(2)?,
        found_quantity: row.get(3)?,
        delta: row.get(4)?,
        status: parse_enum(5, &status, AdjustmentStatus::from_db_str)?,
        recorded_by: row.get(6)?,
        reviewed_by: row.get(7)?,
        created_at: parse_ts(8, &row.get::<_, String>(8)?)?,
        reviewed_at: parse_ts_opt(9, row.get(9)?)?,
    })
}
