// ==========================================
// 仓库移库作业引擎 - 订单行作业跟踪
// ==========================================
// 状态机: Pendiente → EnProceso → Completada
//         EnProceso → Subdividido(后台拆分)
//         Pendiente/EnProceso → Bloqueada → (主管解锁) 原状态
// 红线: 开工确认是唯一的挂起等待,可取消,且不超过上限
// 红线: Bloqueada 只能经 OrderStore::supervisor_unlock 解除
// ==========================================

use crate::config::{PollSchedule, ReconciliationTolerance};
use crate::domain::{
    ActionType, AdjustmentStatus, LineDestination, LineState, OrderLine, RequestContext,
    StockAdjustment, SubjectType, Transfer,
};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{OptionalEventPublisher, WorkflowEvent};
use crate::engine::reconciliation::{decide, ReconciliationDecision};
use crate::engine::transfer_lifecycle::TransferLifecycle;
use crate::repository::row_codec::now_ts;
use crate::repository::stores::{OrderStore, PalletStore};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

const QUANTITY_EPSILON: f64 = 1e-9;

/// 开工确认结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StartLineOutcome {
    /// 后台确认 EnProceso
    Confirmed(OrderLine),
    /// 行已被后台拆分(或从快照中消失),需在替代行上重新开工
    Subdivided {
        original: OrderLine,
        replacements: Vec<OrderLine>,
    },
    /// 调用方取消
    Cancelled,
    /// 上限内无明确信号,按已开工处理
    AssumedInProgress(OrderLine),
}

/// 盘点结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationOutcome {
    pub decision: ReconciliationDecision,
    pub line: OrderLine,
    pub adjustment: Option<StockAdjustment>,
}

// ==========================================
// LineTracker - 订单行作业跟踪
// ==========================================
pub struct LineTracker {
    orders: Arc<dyn OrderStore>,
    pallets: Arc<dyn PalletStore>,
    transfers: Arc<TransferLifecycle>,
    tolerance: ReconciliationTolerance,
    schedule: PollSchedule,
    events: OptionalEventPublisher,
}

impl LineTracker {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        pallets: Arc<dyn PalletStore>,
        transfers: Arc<TransferLifecycle>,
        tolerance: ReconciliationTolerance,
        schedule: PollSchedule,
        events: OptionalEventPublisher,
    ) -> Self {
        Self {
            orders,
            pallets,
            transfers,
            tolerance,
            schedule,
            events,
        }
    }

    async fn load(&self, line_id: &str) -> EngineResult<OrderLine> {
        self.orders
            .find_line(line_id)
            .await?
            .ok_or_else(|| EngineError::not_found("order_line", line_id))
    }

    fn ensure_assigned(ctx: &RequestContext, line: &OrderLine) -> EngineResult<()> {
        if line.is_assigned_to(&ctx.operator_id) {
            Ok(())
        } else {
            Err(EngineError::NotAssigned {
                line_id: line.line_id.clone(),
                operator_id: ctx.operator_id.clone(),
            })
        }
    }

    fn ensure_supervisor(ctx: &RequestContext, action: &str) -> EngineResult<()> {
        if ctx.is_supervisor() {
            Ok(())
        } else {
            Err(EngineError::Unauthorized(format!(
                "{} 需要主管权限: operator={}",
                action, ctx.operator_id
            )))
        }
    }

    // ==========================================
    // 开工确认
    // ==========================================

    /// 开工并等待后台确认
    ///
    /// # 流程
    /// 1. 校验指派与状态,发送开工信号
    /// 2. 按 PollSchedule 轮询订单快照,每次读取受剩余时间约束
    /// 3. EnProceso → Confirmed;Subdividido/消失 → Subdivided;Bloqueada → LineBlocked
    /// 4. 到达上限仍无明确信号 → AssumedInProgress
    #[instrument(skip(self, ctx, cancel), fields(operator = %ctx.operator_id))]
    pub async fn begin_line(
        &self,
        ctx: &RequestContext,
        line_id: &str,
        cancel: &CancellationToken,
    ) -> EngineResult<StartLineOutcome> {
        let line = self.load(line_id).await?;
        Self::ensure_assigned(ctx, &line)?;
        match line.state {
            LineState::Pendiente | LineState::EnProceso => {}
            LineState::Bloqueada => {
                return Err(EngineError::LineBlocked {
                    line_id: line.line_id,
                })
            }
            other => {
                return Err(EngineError::InvalidStateTransition {
                    entity: format!("order_line {}", line.line_id),
                    from: other.to_string(),
                    to: LineState::EnProceso.to_string(),
                })
            }
        }

        self.orders
            .signal_begin_work(&line.line_id, &ctx.operator_id)
            .await?;

        let started = Instant::now();
        let deadline = started + self.schedule.ceiling;
        let mut last_seen = line;
        let mut polls = 0u32;

        loop {
            let fetch = tokio::time::timeout_at(
                deadline,
                self.orders.fetch_order_lines(&last_seen.order_id),
            );
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(line_id = %line_id, polls, "开工确认已取消");
                    return Ok(StartLineOutcome::Cancelled);
                }
                res = fetch => res,
            };
            let snapshot = match fetched {
                Ok(lines) => lines?,
                Err(_) => break,
            };
            polls += 1;
            tracing::debug!(line_id = %line_id, polls, lines = snapshot.len(), "开工轮询");

            if let Some(outcome) = interpret_snapshot(&last_seen, &snapshot)? {
                self.publish_start(ctx, line_id, &outcome);
                return Ok(outcome);
            }
            if let Some(current) = snapshot.iter().find(|l| l.line_id == line_id) {
                last_seen = current.clone();
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let wait = self
                .schedule
                .interval_at(now - started)
                .min(deadline - now);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(line_id = %line_id, polls, "开工确认已取消");
                    return Ok(StartLineOutcome::Cancelled);
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        tracing::warn!(
            line_id = %line_id,
            polls,
            ceiling_ms = self.schedule.ceiling.as_millis() as u64,
            "开工确认超时,按已开工处理"
        );
        let outcome = StartLineOutcome::AssumedInProgress(last_seen);
        self.publish_start(ctx, line_id, &outcome);
        Ok(outcome)
    }

    fn publish_start(&self, ctx: &RequestContext, line_id: &str, outcome: &StartLineOutcome) {
        let (label, replacements) = match outcome {
            StartLineOutcome::Confirmed(_) => ("CONFIRMED", Vec::new()),
            StartLineOutcome::AssumedInProgress(_) => ("ASSUMED_IN_PROGRESS", Vec::new()),
            StartLineOutcome::Subdivided { replacements, .. } => (
                "SUBDIVIDED",
                replacements.iter().map(|l| l.line_id.clone()).collect(),
            ),
            StartLineOutcome::Cancelled => return,
        };
        tracing::info!(line_id = %line_id, outcome = label, "订单行开工");
        self.events.publish(
            WorkflowEvent::new(ActionType::LineStart, line_id, ctx)
                .with_payload(json!({ "outcome": label, "replacements": replacements })),
        );
    }

    // ==========================================
    // 完成
    // ==========================================

    /// 完成订单行
    ///
    /// # 说明
    /// - moved ≠ planned 时按 found = moved 做盘点决策
    /// - 盘盈 → 行阻断,返回 ReconciliationBlock,不完成
    /// - 托盘去向:托盘必须为 Open
    /// - 库位去向:从行的取货库位生成物料直移单并立即完成
    #[instrument(skip(self, ctx), fields(operator = %ctx.operator_id))]
    pub async fn complete_line(
        &self,
        ctx: &RequestContext,
        line_id: &str,
        moved_quantity: f64,
        destination: LineDestination,
    ) -> EngineResult<OrderLine> {
        let mut line = self.load(line_id).await?;
        Self::ensure_assigned(ctx, &line)?;
        if line.state == LineState::Bloqueada {
            return Err(EngineError::LineBlocked {
                line_id: line.line_id,
            });
        }
        if line.state != LineState::EnProceso {
            return Err(EngineError::InvalidStateTransition {
                entity: format!("order_line {}", line.line_id),
                from: line.state.to_string(),
                to: LineState::Completada.to_string(),
            });
        }
        if !moved_quantity.is_finite() || moved_quantity <= 0.0 {
            return Err(EngineError::InvalidQuantity(format!(
                "moved = {}",
                moved_quantity
            )));
        }

        match &destination {
            LineDestination::Pallet(pallet_id) => {
                let pallet = self
                    .pallets
                    .find_by_id(pallet_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("pallet", pallet_id))?;
                if !pallet.is_open() {
                    return Err(EngineError::PalletClosed {
                        pallet_id: pallet.pallet_id,
                    });
                }
            }
            LineDestination::Location(location) => {
                if !location.is_complete() {
                    return Err(EngineError::InvalidLocation(format!(
                        "目的库位必须完整: {}",
                        location
                    )));
                }
                if !line.origin_location.as_ref().is_some_and(|o| o.is_complete()) {
                    return Err(EngineError::InvalidLocation(format!(
                        "订单行 {} 缺少完整的取货库位",
                        line.line_id
                    )));
                }
            }
        }

        // 调整记录在行保存成功后落库
        let before = line.clone();
        let mut adjustment_status = None;
        if (moved_quantity - line.planned_quantity).abs() > QUANTITY_EPSILON {
            match decide(line.planned_quantity, moved_quantity, &self.tolerance)? {
                ReconciliationDecision::Block { surplus } => {
                    self.block_line(ctx, line, moved_quantity).await?;
                    return Err(EngineError::ReconciliationBlock {
                        line_id: line_id.to_string(),
                        surplus,
                    });
                }
                ReconciliationDecision::Escalate { .. } => {
                    adjustment_status = Some(AdjustmentStatus::PendingReview);
                }
                ReconciliationDecision::Accept { .. } => {
                    adjustment_status = Some(AdjustmentStatus::Applied);
                    line.planned_quantity = moved_quantity;
                }
            }
        }

        match destination {
            LineDestination::Pallet(pallet_id) => {
                line.destination_pallet_id = Some(pallet_id);
            }
            LineDestination::Location(location) => {
                let origin = line.origin_location.clone().ok_or_else(|| {
                    EngineError::InvalidLocation(format!("订单行 {} 缺少取货库位", line.line_id))
                })?;
                let created = self
                    .transfers
                    .create_for_article(ctx, &line.article, moved_quantity, line.lot.as_deref(), &origin)
                    .await?;
                let completed = self
                    .transfers
                    .complete(ctx, &created.transfer_id, &location)
                    .await?;
                line.linked_transfer_id = Some(completed.transfer_id);
            }
        }

        line.moved_quantity = moved_quantity;
        line.state = LineState::Completada;
        let saved = self.orders.save_line(&line).await?;
        if let Some(status) = adjustment_status {
            self.record_adjustment(ctx, &before, moved_quantity, status).await?;
        }

        tracing::info!(
            line_id = %saved.line_id,
            moved = saved.moved_quantity,
            destination_pallet = ?saved.destination_pallet_id,
            transfer_id = ?saved.linked_transfer_id,
            "订单行已完成"
        );
        self.events.publish(
            WorkflowEvent::new(ActionType::LineComplete, &saved.line_id, ctx).with_payload(json!({
                "moved_quantity": saved.moved_quantity,
                "destination_pallet_id": saved.destination_pallet_id,
                "linked_transfer_id": saved.linked_transfer_id,
            })),
        );
        Ok(saved)
    }

    // ==========================================
    // 盘点
    // ==========================================

    /// 上报实盘数量
    ///
    /// 盘盈时行进入 Bloqueada,结果中 decision 为 Block
    #[instrument(skip(self, ctx), fields(operator = %ctx.operator_id))]
    pub async fn report_found_quantity(
        &self,
        ctx: &RequestContext,
        line_id: &str,
        found: f64,
    ) -> EngineResult<ReconciliationOutcome> {
        let mut line = self.load(line_id).await?;
        Self::ensure_assigned(ctx, &line)?;
        if line.state == LineState::Bloqueada {
            return Err(EngineError::LineBlocked {
                line_id: line.line_id,
            });
        }
        if line.state.is_terminal() {
            return Err(EngineError::InvalidStateTransition {
                entity: format!("order_line {}", line.line_id),
                from: line.state.to_string(),
                to: line.state.to_string(),
            });
        }

        let decision = decide(line.planned_quantity, found, &self.tolerance)?;
        let outcome = match decision {
            ReconciliationDecision::Accept { .. } if decision.is_no_op() => {
                ReconciliationOutcome {
                    decision,
                    line,
                    adjustment: None,
                }
            }
            ReconciliationDecision::Accept { .. } => {
                let adjustment = self
                    .record_adjustment(ctx, &line, found, AdjustmentStatus::Applied)
                    .await?;
                line.planned_quantity = found;
                let line = self.orders.save_line(&line).await?;
                ReconciliationOutcome {
                    decision,
                    line,
                    adjustment: Some(adjustment),
                }
            }
            ReconciliationDecision::Escalate { .. } => {
                let adjustment = self
                    .record_adjustment(ctx, &line, found, AdjustmentStatus::PendingReview)
                    .await?;
                ReconciliationOutcome {
                    decision,
                    line,
                    adjustment: Some(adjustment),
                }
            }
            ReconciliationDecision::Block { .. } => {
                let (line, adjustment) = self.block_line(ctx, line, found).await?;
                ReconciliationOutcome {
                    decision,
                    line,
                    adjustment: Some(adjustment),
                }
            }
        };

        tracing::info!(line_id = %line_id, ?decision, "盘点决策");
        Ok(outcome)
    }

    async fn record_adjustment(
        &self,
        ctx: &RequestContext,
        line: &OrderLine,
        found: f64,
        status: AdjustmentStatus,
    ) -> EngineResult<StockAdjustment> {
        let adjustment = StockAdjustment {
            adjustment_id: Uuid::new_v4().to_string(),
            line_id: line.line_id.clone(),
            planned_quantity: line.planned_quantity,
            found_quantity: found,
            delta: found - line.planned_quantity,
            status,
            recorded_by: ctx.operator_id.clone(),
            reviewed_by: None,
            created_at: now_ts(),
            reviewed_at: None,
        };
        self.orders.insert_adjustment(&adjustment).await?;

        self.events.publish(
            WorkflowEvent::new(ActionType::AdjustmentRecord, &adjustment.adjustment_id, ctx)
                .with_payload(json!({
                    "line_id": adjustment.line_id,
                    "planned": adjustment.planned_quantity,
                    "found": adjustment.found_quantity,
                    "status": adjustment.status.to_db_str(),
                })),
        );
        Ok(adjustment)
    }

    /// 盘盈阻断:记录 Blocked 调整并将行置为 Bloqueada
    async fn block_line(
        &self,
        ctx: &RequestContext,
        mut line: OrderLine,
        found: f64,
    ) -> EngineResult<(OrderLine, StockAdjustment)> {
        if !line.state.can_block() {
            return Err(EngineError::InvalidStateTransition {
                entity: format!("order_line {}", line.line_id),
                from: line.state.to_string(),
                to: LineState::Bloqueada.to_string(),
            });
        }
        let adjustment = self
            .record_adjustment(ctx, &line, found, AdjustmentStatus::Blocked)
            .await?;
        line.state_before_block = Some(line.state);
        line.state = LineState::Bloqueada;
        let line = self.orders.save_line(&line).await?;

        tracing::warn!(
            line_id = %line.line_id,
            planned = adjustment.planned_quantity,
            found,
            "盘盈阻断,等待主管解锁"
        );
        self.events.publish(
            WorkflowEvent::new(ActionType::LineBlock, &line.line_id, ctx).with_payload(json!({
                "adjustment_id": adjustment.adjustment_id,
                "surplus": adjustment.delta,
            })),
        );
        Ok((line, adjustment))
    }

    // ==========================================
    // 移库回填
    // ==========================================

    /// 托盘移库完成后回填等待该托盘的已完成行
    #[instrument(skip(self, transfer), fields(transfer_id = %transfer.transfer_id))]
    pub async fn on_transfer_completed(&self, transfer: &Transfer) -> EngineResult<Vec<OrderLine>> {
        if transfer.subject_type != SubjectType::Pallet || transfer.is_pending() {
            return Ok(Vec::new());
        }

        let awaiting = self.orders.find_awaiting_pallet(&transfer.subject_id).await?;
        let mut filled = Vec::with_capacity(awaiting.len());
        for mut line in awaiting {
            line.linked_transfer_id = Some(transfer.transfer_id.clone());
            filled.push(self.orders.save_line(&line).await?);
        }

        if !filled.is_empty() {
            tracing::info!(
                pallet_id = %transfer.subject_id,
                lines = filled.len(),
                "订单行已回填移库单"
            );
        }
        Ok(filled)
    }

    // ==========================================
    // 主管操作
    // ==========================================

    #[instrument(skip(self, ctx), fields(operator = %ctx.operator_id))]
    pub async fn supervisor_unlock(
        &self,
        ctx: &RequestContext,
        line_id: &str,
    ) -> EngineResult<OrderLine> {
        Self::ensure_supervisor(ctx, "解锁订单行")?;
        let line = self.load(line_id).await?;
        if line.state != LineState::Bloqueada {
            return Err(EngineError::InvalidStateTransition {
                entity: format!("order_line {}", line.line_id),
                from: line.state.to_string(),
                to: line
                    .state_before_block
                    .unwrap_or(LineState::Pendiente)
                    .to_string(),
            });
        }

        let unlocked = self.orders.supervisor_unlock(line_id, &ctx.operator_id).await?;

        tracing::info!(line_id = %line_id, state = %unlocked.state, "订单行已解锁");
        self.events.publish(
            WorkflowEvent::new(ActionType::LineUnlock, line_id, ctx)
                .with_payload(json!({ "restored_state": unlocked.state.to_db_str() })),
        );
        Ok(unlocked)
    }

    /// 审核超容差短缺调整(批准时 planned := found)
    #[instrument(skip(self, ctx), fields(operator = %ctx.operator_id))]
    pub async fn review_adjustment(
        &self,
        ctx: &RequestContext,
        adjustment_id: &str,
        approve: bool,
    ) -> EngineResult<StockAdjustment> {
        Self::ensure_supervisor(ctx, "审核库存调整")?;
        let mut adjustment = self
            .orders
            .find_adjustment(adjustment_id)
            .await?
            .ok_or_else(|| EngineError::not_found("stock_adjustment", adjustment_id))?;
        if adjustment.status != AdjustmentStatus::PendingReview {
            return Err(EngineError::InvalidStateTransition {
                entity: format!("stock_adjustment {}", adjustment_id),
                from: adjustment.status.to_string(),
                to: if approve {
                    AdjustmentStatus::Approved.to_string()
                } else {
                    AdjustmentStatus::Rejected.to_string()
                },
            });
        }

        if approve {
            let mut line = self.load(&adjustment.line_id).await?;
            if line.state == LineState::Bloqueada {
                return Err(EngineError::LineBlocked {
                    line_id: line.line_id,
                });
            }
            line.planned_quantity = adjustment.found_quantity;
            self.orders.save_line(&line).await?;
        }

        adjustment.status = if approve {
            AdjustmentStatus::Approved
        } else {
            AdjustmentStatus::Rejected
        };
        adjustment.reviewed_by = Some(ctx.operator_id.clone());
        adjustment.reviewed_at = Some(now_ts());
        self.orders.update_adjustment(&adjustment).await?;

        tracing::info!(adjustment_id = %adjustment_id, status = %adjustment.status, "库存调整已审核");
        self.events.publish(
            WorkflowEvent::new(ActionType::AdjustmentReview, adjustment_id, ctx).with_payload(
                json!({
                    "line_id": adjustment.line_id,
                    "status": adjustment.status.to_db_str(),
                }),
            ),
        );
        Ok(adjustment)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub async fn find(&self, line_id: &str) -> EngineResult<Option<OrderLine>> {
        Ok(self.orders.find_line(line_id).await?)
    }

    pub async fn lines_for_order(&self, order_id: &str) -> EngineResult<Vec<OrderLine>> {
        Ok(self.orders.fetch_order_lines(order_id).await?)
    }

    pub async fn adjustments_for_line(&self, line_id: &str) -> EngineResult<Vec<StockAdjustment>> {
        Ok(self.orders.list_adjustments_for_line(line_id).await?)
    }

    /// 订单是否有被阻断的行
    pub async fn is_order_blocked(&self, order_id: &str) -> EngineResult<bool> {
        let lines = self.orders.fetch_order_lines(order_id).await?;
        Ok(lines.iter().any(|l| l.state == LineState::Bloqueada))
    }
}

/// 解读一次订单快照
///
/// # 返回
/// - Ok(Some): 明确结果
/// - Ok(None): 仍为 Pendiente,继续轮询
fn interpret_snapshot(
    last_seen: &OrderLine,
    snapshot: &[OrderLine],
) -> EngineResult<Option<StartLineOutcome>> {
    let replacements = || -> Vec<OrderLine> {
        snapshot
            .iter()
            .filter(|l| l.parent_line_id.as_deref() == Some(last_seen.line_id.as_str()))
            .cloned()
            .collect()
    };

    let Some(current) = snapshot.iter().find(|l| l.line_id == last_seen.line_id) else {
        return Ok(Some(StartLineOutcome::Subdivided {
            original: last_seen.clone(),
            replacements: replacements(),
        }));
    };

    match current.state {
        LineState::EnProceso => Ok(Some(StartLineOutcome::Confirmed(current.clone()))),
        LineState::Subdividido => Ok(Some(StartLineOutcome::Subdivided {
            original: current.clone(),
            replacements: replacements(),
        })),
        LineState::Bloqueada => Err(EngineError::LineBlocked {
            line_id: current.line_id.clone(),
        }),
        LineState::Pendiente => Ok(None),
        LineState::Completada => Err(EngineError::InvalidStateTransition {
            entity: format!("order_line {}", current.line_id),
            from: current.state.to_string(),
            to: LineState::EnProceso.to_string(),
        }),
    }
}
