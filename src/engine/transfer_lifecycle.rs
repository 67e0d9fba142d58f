// ==========================================
// 仓库移库作业引擎 - 移库单生命周期
// ==========================================
// 状态机: Pending → Completed(终态,无取消)
// 红线: 同一主体最多一张 Pending 移库单
// 红线: 货架货位占用冲突时不做任何修改
// ==========================================

use crate::domain::{
    article_subject_id, ActionType, Location, RequestContext, SubjectType, Transfer, TransferState,
};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{OptionalEventPublisher, WorkflowEvent};
use crate::repository::error::RepositoryError;
use crate::repository::row_codec::now_ts;
use crate::repository::stores::{PalletStore, TransferStore};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

// ==========================================
// TransferLifecycle - 移库单生命周期管理
// ==========================================
pub struct TransferLifecycle {
    transfers: Arc<dyn TransferStore>,
    pallets: Arc<dyn PalletStore>,
    rack_slot_prefixes: Vec<String>,
    events: OptionalEventPublisher,
}

impl TransferLifecycle {
    pub fn new(
        transfers: Arc<dyn TransferStore>,
        pallets: Arc<dyn PalletStore>,
        rack_slot_prefixes: Vec<String>,
        events: OptionalEventPublisher,
    ) -> Self {
        Self {
            transfers,
            pallets,
            rack_slot_prefixes,
            events,
        }
    }

    // ==========================================
    // 创建
    // ==========================================

    /// 整托移库单(关托时调用)
    #[instrument(skip(self, ctx), fields(operator = %ctx.operator_id))]
    pub async fn create_for_pallet(
        &self,
        ctx: &RequestContext,
        pallet_id: &str,
        origin: &Location,
    ) -> EngineResult<Transfer> {
        self.create(ctx, SubjectType::Pallet, pallet_id, None, None, origin)
            .await
    }

    /// 物料直移移库单(subject_id = 物料|批次|起点库位)
    #[instrument(skip(self, ctx), fields(operator = %ctx.operator_id))]
    pub async fn create_for_article(
        &self,
        ctx: &RequestContext,
        article: &str,
        quantity: f64,
        lot: Option<&str>,
        origin: &Location,
    ) -> EngineResult<Transfer> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(EngineError::InvalidQuantity(format!("quantity = {}", quantity)));
        }
        let subject_id = article_subject_id(article, lot, origin);
        self.create(
            ctx,
            SubjectType::Article,
            &subject_id,
            Some(quantity),
            lot.map(str::to_string),
            origin,
        )
        .await
    }

    async fn create(
        &self,
        ctx: &RequestContext,
        subject_type: SubjectType,
        subject_id: &str,
        quantity: Option<f64>,
        lot: Option<String>,
        origin: &Location,
    ) -> EngineResult<Transfer> {
        if !origin.is_complete() {
            return Err(EngineError::InvalidLocation(format!(
                "起点库位必须完整: {}",
                origin
            )));
        }

        if let Some(pending) = self
            .transfers
            .find_pending_by_subject(subject_type, subject_id)
            .await?
        {
            return Err(EngineError::AlreadyPendingTransfer {
                subject: pending.subject_key(),
                transfer_id: pending.transfer_id,
            });
        }

        let transfer = Transfer {
            transfer_id: Uuid::new_v4().to_string(),
            subject_type,
            subject_id: subject_id.to_string(),
            quantity,
            lot,
            origin_location: origin.clone(),
            destination_location: None,
            state: TransferState::Pending,
            created_by: ctx.operator_id.clone(),
            completed_by: None,
            created_at: now_ts(),
            completed_at: None,
        };

        match self.transfers.insert_pending(&transfer).await {
            Ok(()) => {}
            // 并发关托:唯一索引兜底
            Err(RepositoryError::UniqueConstraintViolation(_)) => {
                let existing = self
                    .transfers
                    .find_pending_by_subject(subject_type, subject_id)
                    .await?
                    .map(|t| t.transfer_id)
                    .unwrap_or_default();
                return Err(EngineError::AlreadyPendingTransfer {
                    subject: transfer.subject_key(),
                    transfer_id: existing,
                });
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            transfer_id = %transfer.transfer_id,
            subject = %transfer.subject_key(),
            origin = %origin,
            "移库单已创建"
        );
        self.events.publish(
            WorkflowEvent::new(ActionType::TransferCreate, &transfer.transfer_id, ctx).with_payload(
                json!({
                    "subject_type": subject_type.to_db_str(),
                    "subject_id": transfer.subject_id,
                    "article": transfer.article_code(),
                    "origin": origin.to_code(),
                    "quantity": quantity,
                }),
            ),
        );
        Ok(transfer)
    }

    // ==========================================
    // 完成
    // ==========================================

    /// 完成移库单
    ///
    /// # 校验
    /// - 必须为 Pending;目的库位必须完整
    /// - 整托 + 货架货位:目的库位不能有其他未归档托盘
    #[instrument(skip(self, ctx), fields(operator = %ctx.operator_id))]
    pub async fn complete(
        &self,
        ctx: &RequestContext,
        transfer_id: &str,
        destination: &Location,
    ) -> EngineResult<Transfer> {
        let mut transfer = self
            .transfers
            .find_by_id(transfer_id)
            .await?
            .ok_or_else(|| EngineError::not_found("transfer", transfer_id))?;

        if !transfer.is_pending() {
            return Err(EngineError::TransferNotPending {
                transfer_id: transfer_id.to_string(),
                state: transfer.state.to_string(),
            });
        }
        if !destination.is_complete() {
            return Err(EngineError::InvalidLocation(format!(
                "目的库位必须完整: {}",
                destination
            )));
        }

        if transfer.subject_type == SubjectType::Pallet
            && destination.slot_has_prefix(&self.rack_slot_prefixes)
        {
            let occupant = self
                .pallets
                .find_active_at(destination)
                .await?
                .into_iter()
                .find(|p| p.pallet_id != transfer.subject_id);
            if let Some(occupant) = occupant {
                tracing::warn!(
                    transfer_id = %transfer_id,
                    destination = %destination,
                    occupant = %occupant.pallet_id,
                    "目的货位已被占用"
                );
                return Err(EngineError::LocationOccupied {
                    location: destination.to_code(),
                    occupant: occupant.pallet_id,
                });
            }
        }

        let completed_at = now_ts();
        let completed = self
            .transfers
            .mark_completed(transfer_id, destination, &ctx.operator_id, completed_at)
            .await?;
        if !completed {
            return Err(EngineError::TransferNotPending {
                transfer_id: transfer_id.to_string(),
                state: TransferState::Completed.to_string(),
            });
        }

        if transfer.subject_type == SubjectType::Pallet {
            self.pallets.relocate(&transfer.subject_id, destination).await?;
        }

        transfer.state = TransferState::Completed;
        transfer.destination_location = Some(destination.clone());
        transfer.completed_by = Some(ctx.operator_id.clone());
        transfer.completed_at = Some(completed_at);

        tracing::info!(
            transfer_id = %transfer_id,
            subject = %transfer.subject_key(),
            destination = %destination,
            "移库单已完成"
        );
        self.events.publish(
            WorkflowEvent::new(ActionType::TransferComplete, transfer_id, ctx).with_payload(json!({
                "subject_type": transfer.subject_type.to_db_str(),
                "subject_id": transfer.subject_id,
                "destination": destination.to_code(),
            })),
        );
        Ok(transfer)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub async fn find(&self, transfer_id: &str) -> EngineResult<Option<Transfer>> {
        Ok(self.transfers.find_by_id(transfer_id).await?)
    }

    pub async fn pending_for_subject(
        &self,
        subject_type: SubjectType,
        subject_id: &str,
    ) -> EngineResult<Option<Transfer>> {
        Ok(self
            .transfers
            .find_pending_by_subject(subject_type, subject_id)
            .await?)
    }

    pub async fn list_pending(&self) -> EngineResult<Vec<Transfer>> {
        Ok(self.transfers.list_pending().await?)
    }
}
