// ==========================================
// 仓库移库作业引擎 - 托盘生命周期
// ==========================================
// 状态机: Open ⇄ Closed
// 红线: Closed 托盘的行集合冻结
// 红线: 关托生成 Pending 移库单;移库单创建失败时回退到 Open
// 约束: 所有校验为同步前置条件,不重试
// ==========================================

use crate::domain::{
    ActionType, Location, NewPalletLine, Pallet, PalletLine, PalletState, RequestContext,
    SubjectType, Transfer,
};
use crate::config::ConfigError;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{OptionalEventPublisher, WorkflowEvent};
use crate::engine::gs1;
use crate::engine::transfer_lifecycle::TransferLifecycle;
use crate::repository::row_codec::now_ts;
use crate::repository::stores::PalletStore;
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// SSCC 数据位长度(不含校验位)
const SSCC_DATA_LEN: usize = 17;

/// SSCC-18 = 扩展位 + 厂商码 + 序列号(补零) + 校验位
pub fn build_sscc(extension_digit: u8, company_prefix: &str, serial: u64) -> EngineResult<String> {
    let serial_len = SSCC_DATA_LEN
        .checked_sub(1 + company_prefix.len())
        .filter(|len| *len > 0)
        .ok_or_else(|| {
            EngineError::Config(ConfigError::InvalidValue {
                key: "gs1_company_prefix".to_string(),
                value: company_prefix.to_string(),
                reason: "厂商码过长".to_string(),
            })
        })?;

    let serial_str = format!("{:0width$}", serial, width = serial_len);
    if serial_str.len() > serial_len {
        return Err(EngineError::Config(ConfigError::InvalidValue {
            key: "gs1_company_prefix".to_string(),
            value: company_prefix.to_string(),
            reason: format!("SSCC 序列号已耗尽: {}", serial),
        }));
    }

    let data = format!("{}{}{}", extension_digit, company_prefix, serial_str);
    let check = gs1::check_digit(&data).ok_or_else(|| {
        EngineError::Config(ConfigError::InvalidValue {
            key: "gs1_company_prefix".to_string(),
            value: company_prefix.to_string(),
            reason: "厂商码必须为数字".to_string(),
        })
    })?;
    Ok(format!("{}{}", data, check))
}

// ==========================================
// PalletLifecycle - 托盘生命周期管理
// ==========================================
pub struct PalletLifecycle {
    pallets: Arc<dyn PalletStore>,
    transfers: Arc<TransferLifecycle>,
    gs1_company_prefix: String,
    sscc_extension_digit: u8,
    events: OptionalEventPublisher,
}

impl PalletLifecycle {
    pub fn new(
        pallets: Arc<dyn PalletStore>,
        transfers: Arc<TransferLifecycle>,
        gs1_company_prefix: String,
        sscc_extension_digit: u8,
        events: OptionalEventPublisher,
    ) -> Self {
        Self {
            pallets,
            transfers,
            gs1_company_prefix,
            sscc_extension_digit,
            events,
        }
    }

    async fn load(&self, pallet_id: &str) -> EngineResult<Pallet> {
        self.pallets
            .find_by_id(pallet_id)
            .await?
            .ok_or_else(|| EngineError::not_found("pallet", pallet_id))
    }

    fn ensure_open(pallet: &Pallet) -> EngineResult<()> {
        if pallet.is_open() {
            Ok(())
        } else {
            Err(EngineError::PalletClosed {
                pallet_id: pallet.pallet_id.clone(),
            })
        }
    }

    async fn ensure_no_pending(&self, pallet_id: &str) -> EngineResult<()> {
        if let Some(pending) = self
            .transfers
            .pending_for_subject(SubjectType::Pallet, pallet_id)
            .await?
        {
            return Err(EngineError::AlreadyPendingTransfer {
                subject: pending.subject_key(),
                transfer_id: pending.transfer_id,
            });
        }
        Ok(())
    }

    // ==========================================
    // 新建
    // ==========================================

    #[instrument(skip(self, ctx), fields(operator = %ctx.operator_id))]
    pub async fn create(
        &self,
        ctx: &RequestContext,
        pallet_type: &str,
        work_order_ref: Option<&str>,
    ) -> EngineResult<Pallet> {
        let pallet_type = self
            .pallets
            .find_pallet_type(pallet_type)
            .await?
            .ok_or_else(|| EngineError::not_found("pallet_type", pallet_type))?;

        let serial = self.pallets.next_serial().await?;
        let code = build_sscc(self.sscc_extension_digit, &self.gs1_company_prefix, serial)?;
        let now = now_ts();

        let pallet = Pallet {
            pallet_id: Uuid::new_v4().to_string(),
            code,
            state: PalletState::Open,
            pallet_type: pallet_type.type_code,
            origin_work_order: work_order_ref.map(str::to_string),
            current_location: None,
            archived: false,
            lines: Vec::new(),
            created_by: ctx.operator_id.clone(),
            created_at: now,
            updated_at: now,
            version: 0,
        };
        self.pallets.insert(&pallet).await?;

        tracing::info!(pallet_id = %pallet.pallet_id, code = %pallet.code, "托盘已创建");
        self.events.publish(
            WorkflowEvent::new(ActionType::PalletCreate, &pallet.pallet_id, ctx).with_payload(
                json!({
                    "code": pallet.code,
                    "pallet_type": pallet.pallet_type,
                    "work_order_ref": pallet.origin_work_order,
                }),
            ),
        );
        Ok(pallet)
    }

    // ==========================================
    // 行维护(仅 Open)
    // ==========================================

    #[instrument(skip(self, ctx, line), fields(operator = %ctx.operator_id, article = %line.article))]
    pub async fn add_line(
        &self,
        ctx: &RequestContext,
        pallet_id: &str,
        line: NewPalletLine,
    ) -> EngineResult<Pallet> {
        let mut pallet = self.load(pallet_id).await?;
        Self::ensure_open(&pallet)?;

        if !line.quantity.is_finite() || line.quantity <= 0.0 {
            return Err(EngineError::InvalidQuantity(format!(
                "quantity = {}",
                line.quantity
            )));
        }
        if !line.origin_location.is_complete() {
            return Err(EngineError::InvalidLocation(format!(
                "取货库位必须完整: {}",
                line.origin_location
            )));
        }
        if !ctx.expected_work.is_empty()
            && !ctx
                .expected_work
                .iter()
                .any(|w| w.matches(&line.article, line.lot.as_deref()))
        {
            return Err(EngineError::LineRejected(format!(
                "物料 {} 批次 {} 不在当前作业范围内",
                line.article,
                line.lot.as_deref().unwrap_or("-")
            )));
        }

        if let Some(pallet_type) = self.pallets.find_pallet_type(&pallet.pallet_type).await? {
            if let Some(max_lines) = pallet_type.max_lines {
                if pallet.lines.len() >= max_lines.max(0) as usize {
                    return Err(EngineError::LineRejected(format!(
                        "托盘类型 {} 最多 {} 行",
                        pallet_type.type_code, max_lines
                    )));
                }
            }
        }

        let seq_no = pallet.lines.iter().map(|l| l.seq_no).max().unwrap_or(0) + 1;
        let new_line = PalletLine {
            line_id: Uuid::new_v4().to_string(),
            pallet_id: pallet.pallet_id.clone(),
            seq_no,
            article: line.article.trim().to_string(),
            lot: line.lot,
            expiry: line.expiry,
            quantity: line.quantity,
            origin_location: line.origin_location,
        };

        pallet.version = self
            .pallets
            .add_line(&pallet.pallet_id, pallet.version, &new_line)
            .await?;

        tracing::info!(pallet_id = %pallet.pallet_id, line_id = %new_line.line_id, "托盘加行");
        self.events.publish(
            WorkflowEvent::new(ActionType::PalletAddLine, &pallet.pallet_id, ctx).with_payload(
                json!({
                    "line_id": new_line.line_id,
                    "article": new_line.article,
                    "lot": new_line.lot,
                    "quantity": new_line.quantity,
                    "origin": new_line.origin_location.to_code(),
                }),
            ),
        );
        pallet.lines.push(new_line);
        Ok(pallet)
    }

    #[instrument(skip(self, ctx), fields(operator = %ctx.operator_id))]
    pub async fn remove_line(
        &self,
        ctx: &RequestContext,
        pallet_id: &str,
        line_id: &str,
    ) -> EngineResult<Pallet> {
        let mut pallet = self.load(pallet_id).await?;
        Self::ensure_open(&pallet)?;
        if pallet.find_line(line_id).is_none() {
            return Err(EngineError::not_found("pallet_line", line_id));
        }

        pallet.version = self
            .pallets
            .remove_line(&pallet.pallet_id, pallet.version, line_id)
            .await?;
        pallet.lines.retain(|l| l.line_id != line_id);

        tracing::info!(pallet_id = %pallet.pallet_id, line_id = %line_id, "托盘删行");
        self.events.publish(
            WorkflowEvent::new(ActionType::PalletRemoveLine, &pallet.pallet_id, ctx)
                .with_payload(json!({ "line_id": line_id })),
        );
        Ok(pallet)
    }

    // ==========================================
    // 关托 / 重开
    // ==========================================

    /// 关托并生成 Pending 移库单
    ///
    /// # 流程
    /// 1. 已有 Pending 移库单 → AlreadyPendingTransfer
    /// 2. Open 托盘:至少一行;乐观锁翻转为 Closed,current_location = origin
    /// 3. 生成移库单;失败则回退为 Open
    /// 4. 已 Closed 且无 Pending(已移库托盘再次移动)→ 直接生成新移库单
    #[instrument(skip(self, ctx), fields(operator = %ctx.operator_id))]
    pub async fn close(
        &self,
        ctx: &RequestContext,
        pallet_id: &str,
        origin: &Location,
    ) -> EngineResult<Transfer> {
        let pallet = self.load(pallet_id).await?;
        self.ensure_no_pending(&pallet.pallet_id).await?;

        if !origin.is_complete() {
            return Err(EngineError::InvalidLocation(format!(
                "起点库位必须完整: {}",
                origin
            )));
        }

        if !pallet.is_open() {
            return self.close_again(ctx, &pallet, origin).await;
        }

        if pallet.lines.is_empty() {
            return Err(EngineError::InvalidStateTransition {
                entity: format!("pallet {}(无行)", pallet.pallet_id),
                from: PalletState::Open.to_string(),
                to: PalletState::Closed.to_string(),
            });
        }

        let closed_version = self
            .pallets
            .update_state(&pallet.pallet_id, pallet.version, PalletState::Closed, Some(origin))
            .await?;

        let transfer = match self
            .transfers
            .create_for_pallet(ctx, &pallet.pallet_id, origin)
            .await
        {
            Ok(transfer) => transfer,
            Err(e) => {
                tracing::warn!(
                    pallet_id = %pallet.pallet_id,
                    error = %e,
                    "移库单创建失败,托盘回退为 Open"
                );
                if let Err(rollback) = self
                    .pallets
                    .update_state(
                        &pallet.pallet_id,
                        closed_version,
                        PalletState::Open,
                        pallet.current_location.as_ref(),
                    )
                    .await
                {
                    tracing::error!(
                        pallet_id = %pallet.pallet_id,
                        error = %rollback,
                        "托盘回退失败"
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            pallet_id = %pallet.pallet_id,
            transfer_id = %transfer.transfer_id,
            origin = %origin,
            "托盘已关闭"
        );
        self.publish_close(ctx, &pallet, &transfer, false);
        Ok(transfer)
    }

    /// 已移库的 Closed 托盘再次移动:位置对齐到起点后生成新移库单
    async fn close_again(
        &self,
        ctx: &RequestContext,
        pallet: &Pallet,
        origin: &Location,
    ) -> EngineResult<Transfer> {
        let moved = pallet.current_location.as_ref() != Some(origin);
        if moved {
            self.pallets.relocate(&pallet.pallet_id, origin).await?;
        }

        let transfer = match self
            .transfers
            .create_for_pallet(ctx, &pallet.pallet_id, origin)
            .await
        {
            Ok(transfer) => transfer,
            Err(e) => {
                if let Some(previous) = pallet.current_location.as_ref().filter(|_| moved) {
                    tracing::warn!(
                        pallet_id = %pallet.pallet_id,
                        error = %e,
                        "移库单创建失败,托盘位置回退"
                    );
                    if let Err(rollback) = self.pallets.relocate(&pallet.pallet_id, previous).await {
                        tracing::error!(
                            pallet_id = %pallet.pallet_id,
                            error = %rollback,
                            "托盘位置回退失败"
                        );
                    }
                }
                return Err(e);
            }
        };

        tracing::info!(
            pallet_id = %pallet.pallet_id,
            transfer_id = %transfer.transfer_id,
            origin = %origin,
            "已关闭托盘再次移库"
        );
        self.publish_close(ctx, pallet, &transfer, true);
        Ok(transfer)
    }

    fn publish_close(&self, ctx: &RequestContext, pallet: &Pallet, transfer: &Transfer, again: bool) {
        self.events.publish(
            WorkflowEvent::new(ActionType::PalletClose, &pallet.pallet_id, ctx).with_payload(
                json!({
                    "transfer_id": transfer.transfer_id,
                    "origin": transfer.origin_location.to_code(),
                    "lines": pallet.lines.len(),
                    "reclose": again,
                }),
            ),
        );
    }

    #[instrument(skip(self, ctx), fields(operator = %ctx.operator_id))]
    pub async fn reopen(&self, ctx: &RequestContext, pallet_id: &str) -> EngineResult<Pallet> {
        let mut pallet = self.load(pallet_id).await?;
        if pallet.is_open() {
            return Err(EngineError::InvalidStateTransition {
                entity: format!("pallet {}", pallet.pallet_id),
                from: PalletState::Open.to_string(),
                to: PalletState::Open.to_string(),
            });
        }
        self.ensure_no_pending(&pallet.pallet_id).await?;

        pallet.version = self
            .pallets
            .update_state(&pallet.pallet_id, pallet.version, PalletState::Open, None)
            .await?;
        pallet.state = PalletState::Open;

        tracing::info!(pallet_id = %pallet.pallet_id, "托盘已重开");
        self.events
            .publish(WorkflowEvent::new(ActionType::PalletReopen, &pallet.pallet_id, ctx));
        Ok(pallet)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub async fn find(&self, pallet_id: &str) -> EngineResult<Option<Pallet>> {
        Ok(self.pallets.find_by_id(pallet_id).await?)
    }

    pub async fn find_by_code(&self, code: &str) -> EngineResult<Option<Pallet>> {
        Ok(self.pallets.find_by_code(code).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_sscc_layout_and_check_digit() {
        let sscc = build_sscc(1, "0614141", 192837465).unwrap();
        assert_eq!(sscc, "106141411928374657");
        assert_eq!(sscc.len(), 18);
        assert!(gs1::has_valid_check_digit(&sscc));
    }

    #[test]
    fn test_build_sscc_pads_serial() {
        let sscc = build_sscc(0, "8400000", 7).unwrap();
        assert!(sscc.starts_with("08400000000000007"));
        assert_eq!(sscc.len(), 18);
        assert!(gs1::has_valid_check_digit(&sscc));
    }

    #[test]
    fn test_build_sscc_rejects_exhausted_serial() {
        assert!(build_sscc(0, "8400000", 10_000_000_000).is_err());
    }
}
