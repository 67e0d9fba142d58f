// ==========================================
// 仓库移库作业引擎 - 作业 API
// ==========================================
// 职责: 扫码/托盘/移库单/订单行操作的统一入口
// 说明: 组装引擎组件,串联移库完成 → 订单行回填
// 错误: EngineError → ApiError(带稳定错误码)
// ==========================================

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::api::error::{ApiError, ApiResult};
use crate::config::WorkflowConfig;
use crate::domain::{
    LineDestination, Location, NewPalletLine, OrderLine, Pallet, RequestContext, ScanResult,
    StockAdjustment, StockRecord, Transfer,
};
use crate::engine::classifier::{classify, Classification};
use crate::engine::events::OptionalEventPublisher;
use crate::engine::fifo::{allocate, FifoAllocation};
use crate::engine::line_tracker::{LineTracker, ReconciliationOutcome, StartLineOutcome};
use crate::engine::pallet_lifecycle::PalletLifecycle;
use crate::engine::scan_resolver::ScanResolver;
use crate::engine::transfer_lifecycle::TransferLifecycle;
use crate::repository::stores::{OrderStore, PalletStore, StockCatalog, TransferStore};

/// 引擎所需的协作方存储
#[derive(Clone)]
pub struct WorkflowStores {
    pub catalog: Arc<dyn StockCatalog>,
    pub pallets: Arc<dyn PalletStore>,
    pub transfers: Arc<dyn TransferStore>,
    pub orders: Arc<dyn OrderStore>,
}

// ==========================================
// WorkflowApi - 作业 API
// ==========================================
pub struct WorkflowApi {
    catalog: Arc<dyn StockCatalog>,
    scan_resolver: ScanResolver,
    pallet_lifecycle: PalletLifecycle,
    transfer_lifecycle: Arc<TransferLifecycle>,
    line_tracker: LineTracker,
    config: WorkflowConfig,
}

impl WorkflowApi {
    /// 创建新的 WorkflowApi 实例
    ///
    /// # 参数
    /// - stores: 协作方存储
    /// - config: 引擎配置快照(容差/轮询节奏/货架前缀/SSCC)
    /// - events: 作业事件发布者
    pub fn new(stores: WorkflowStores, config: WorkflowConfig, events: OptionalEventPublisher) -> Self {
        let transfer_lifecycle = Arc::new(TransferLifecycle::new(
            stores.transfers.clone(),
            stores.pallets.clone(),
            config.rack_slot_prefixes.clone(),
            events.clone(),
        ));
        let pallet_lifecycle = PalletLifecycle::new(
            stores.pallets.clone(),
            transfer_lifecycle.clone(),
            config.gs1_company_prefix.clone(),
            config.sscc_extension_digit,
            events.clone(),
        );
        let line_tracker = LineTracker::new(
            stores.orders.clone(),
            stores.pallets.clone(),
            transfer_lifecycle.clone(),
            config.tolerance,
            config.poll_schedule,
            events,
        );

        Self {
            catalog: stores.catalog.clone(),
            scan_resolver: ScanResolver::new(stores.catalog, stores.pallets),
            pallet_lifecycle,
            transfer_lifecycle,
            line_tracker,
            config,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    // ==========================================
    // 扫码
    // ==========================================

    /// 扫码解析(无法识别/未找到以 ScanResult::Invalid 返回,不是错误)
    pub async fn scan(&self, raw: &str) -> ApiResult<ScanResult> {
        Ok(self.scan_resolver.resolve(raw).await?)
    }

    /// 扫描库位(非库位条码返回 InvalidScan)
    pub fn scan_location(&self, raw: &str) -> ApiResult<Location> {
        match classify(raw) {
            Classification::Location(location) => Ok(location),
            Classification::Invalid { reason } => Err(ApiError::InvalidScan(reason)),
            _ => Err(ApiError::InvalidScan(format!("不是库位条码: {}", raw.trim()))),
        }
    }

    // ==========================================
    // 托盘
    // ==========================================

    pub async fn create_pallet(
        &self,
        ctx: &RequestContext,
        pallet_type: &str,
        work_order_ref: Option<&str>,
    ) -> ApiResult<Pallet> {
        if pallet_type.trim().is_empty() {
            return Err(ApiError::InvalidInput("托盘类型不能为空".to_string()));
        }
        Ok(self
            .pallet_lifecycle
            .create(ctx, pallet_type.trim(), work_order_ref)
            .await?)
    }

    pub async fn add_pallet_line(
        &self,
        ctx: &RequestContext,
        pallet_id: &str,
        line: NewPalletLine,
    ) -> ApiResult<Pallet> {
        if line.article.trim().is_empty() {
            return Err(ApiError::InvalidInput("物料编码不能为空".to_string()));
        }
        Ok(self.pallet_lifecycle.add_line(ctx, pallet_id, line).await?)
    }

    pub async fn remove_pallet_line(
        &self,
        ctx: &RequestContext,
        pallet_id: &str,
        line_id: &str,
    ) -> ApiResult<Pallet> {
        Ok(self
            .pallet_lifecycle
            .remove_line(ctx, pallet_id, line_id)
            .await?)
    }

    pub async fn close_pallet(
        &self,
        ctx: &RequestContext,
        pallet_id: &str,
        origin: &Location,
    ) -> ApiResult<Transfer> {
        Ok(self.pallet_lifecycle.close(ctx, pallet_id, origin).await?)
    }

    pub async fn reopen_pallet(&self, ctx: &RequestContext, pallet_id: &str) -> ApiResult<Pallet> {
        Ok(self.pallet_lifecycle.reopen(ctx, pallet_id).await?)
    }

    pub async fn get_pallet(&self, pallet_id: &str) -> ApiResult<Pallet> {
        self.pallet_lifecycle
            .find(pallet_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("pallet(id={})不存在", pallet_id)))
    }

    pub async fn get_pallet_by_code(&self, code: &str) -> ApiResult<Option<Pallet>> {
        Ok(self.pallet_lifecycle.find_by_code(code.trim()).await?)
    }

    // ==========================================
    // 移库单
    // ==========================================

    pub async fn create_article_transfer(
        &self,
        ctx: &RequestContext,
        article: &str,
        quantity: f64,
        lot: Option<&str>,
        origin: &Location,
    ) -> ApiResult<Transfer> {
        if article.trim().is_empty() {
            return Err(ApiError::InvalidInput("物料编码不能为空".to_string()));
        }
        Ok(self
            .transfer_lifecycle
            .create_for_article(ctx, article, quantity, lot, origin)
            .await?)
    }

    /// 完成移库单并回填等待该托盘的订单行
    ///
    /// 回填失败不影响已完成的移库单,只记录警告
    pub async fn complete_transfer(
        &self,
        ctx: &RequestContext,
        transfer_id: &str,
        destination: &Location,
    ) -> ApiResult<Transfer> {
        let transfer = self
            .transfer_lifecycle
            .complete(ctx, transfer_id, destination)
            .await?;

        if let Err(e) = self.line_tracker.on_transfer_completed(&transfer).await {
            warn!(
                transfer_id = %transfer.transfer_id,
                error = %e,
                "订单行回填失败(移库单已完成)"
            );
        }
        Ok(transfer)
    }

    pub async fn get_transfer(&self, transfer_id: &str) -> ApiResult<Transfer> {
        self.transfer_lifecycle
            .find(transfer_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("transfer(id={})不存在", transfer_id)))
    }

    pub async fn list_pending_transfers(&self) -> ApiResult<Vec<Transfer>> {
        Ok(self.transfer_lifecycle.list_pending().await?)
    }

    // ==========================================
    // 订单行
    // ==========================================

    pub async fn begin_line(
        &self,
        ctx: &RequestContext,
        line_id: &str,
        cancel: &CancellationToken,
    ) -> ApiResult<StartLineOutcome> {
        Ok(self.line_tracker.begin_line(ctx, line_id, cancel).await?)
    }

    pub async fn complete_line(
        &self,
        ctx: &RequestContext,
        line_id: &str,
        moved_quantity: f64,
        destination: LineDestination,
    ) -> ApiResult<OrderLine> {
        Ok(self
            .line_tracker
            .complete_line(ctx, line_id, moved_quantity, destination)
            .await?)
    }

    pub async fn report_found_quantity(
        &self,
        ctx: &RequestContext,
        line_id: &str,
        found: f64,
    ) -> ApiResult<ReconciliationOutcome> {
        Ok(self
            .line_tracker
            .report_found_quantity(ctx, line_id, found)
            .await?)
    }

    pub async fn supervisor_unlock(&self, ctx: &RequestContext, line_id: &str) -> ApiResult<OrderLine> {
        Ok(self.line_tracker.supervisor_unlock(ctx, line_id).await?)
    }

    pub async fn review_adjustment(
        &self,
        ctx: &RequestContext,
        adjustment_id: &str,
        approve: bool,
    ) -> ApiResult<StockAdjustment> {
        Ok(self
            .line_tracker
            .review_adjustment(ctx, adjustment_id, approve)
            .await?)
    }

    pub async fn get_order_line(&self, line_id: &str) -> ApiResult<OrderLine> {
        self.line_tracker
            .find(line_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("order_line(id={})不存在", line_id)))
    }

    pub async fn list_order_lines(&self, order_id: &str) -> ApiResult<Vec<OrderLine>> {
        Ok(self.line_tracker.lines_for_order(order_id).await?)
    }

    pub async fn list_adjustments(&self, line_id: &str) -> ApiResult<Vec<StockAdjustment>> {
        Ok(self.line_tracker.adjustments_for_line(line_id).await?)
    }

    pub async fn is_order_blocked(&self, order_id: &str) -> ApiResult<bool> {
        Ok(self.line_tracker.is_order_blocked(order_id).await?)
    }

    // ==========================================
    // 库存
    // ==========================================

    /// 库存查询(FIFO 排序)
    pub async fn query_stock(
        &self,
        article: &str,
        lot: Option<&str>,
        location: Option<&Location>,
    ) -> ApiResult<Vec<StockRecord>> {
        Ok(self.catalog.query(article.trim(), lot, location).await?)
    }

    /// 按 FIFO 为需求量分配取货库位
    pub async fn plan_fifo_pick(
        &self,
        article: &str,
        lot: Option<&str>,
        quantity: f64,
    ) -> ApiResult<FifoAllocation> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(ApiError::InvalidInput(format!("数量非法: {}", quantity)));
        }
        let records = self.catalog.query(article.trim(), lot, None).await?;
        Ok(allocate(&records, quantity))
    }
}
