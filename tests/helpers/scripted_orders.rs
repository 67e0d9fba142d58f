// ==========================================
// 脚本化订单存储 - 用于开工轮询测试
// ==========================================
// 行为:
// - fetch_order_lines 依次返回预置快照,用完后回落到 SQLite
// - signal_begin_work 只计数,不改状态(模拟后台异步确认)
// - 其余操作全部委托给 OrderLineRepository
// ==========================================

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use warehouse_transfer::domain::{OrderLine, StockAdjustment};
use warehouse_transfer::repository::{OrderLineRepository, OrderStore, RepositoryResult};

pub struct ScriptedOrderStore {
    inner: Arc<OrderLineRepository>,
    snapshots: Mutex<VecDeque<Vec<OrderLine>>>,
    fetch_delay: Option<Duration>,
    fetches: AtomicUsize,
    signals: AtomicUsize,
}

impl ScriptedOrderStore {
    pub fn new(inner: Arc<OrderLineRepository>) -> Self {
        Self {
            inner,
            snapshots: Mutex::new(VecDeque::new()),
            fetch_delay: None,
            fetches: AtomicUsize::new(0),
            signals: AtomicUsize::new(0),
        }
    }

    /// 预置快照序列
    pub fn with_snapshots(self, snapshots: Vec<Vec<OrderLine>>) -> Self {
        *self.snapshots.lock().unwrap() = snapshots.into();
        self
    }

    /// 每次读取快照前等待(模拟后台响应慢)
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn signal_count(&self) -> usize {
        self.signals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderStore for ScriptedOrderStore {
    async fn find_line(&self, line_id: &str) -> RepositoryResult<Option<OrderLine>> {
        self.inner.find_line(line_id).await
    }

    async fn fetch_order_lines(&self, order_id: &str) -> RepositoryResult<Vec<OrderLine>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.snapshots.lock().unwrap().pop_front();
        match scripted {
            Some(snapshot) => Ok(snapshot),
            None => self.inner.fetch_order_lines(order_id).await,
        }
    }

    async fn signal_begin_work(&self, _line_id: &str, _operator_id: &str) -> RepositoryResult<()> {
        self.signals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn save_line(&self, line: &OrderLine) -> RepositoryResult<OrderLine> {
        self.inner.save_line(line).await
    }

    async fn supervisor_unlock(
        &self,
        line_id: &str,
        supervisor_id: &str,
    ) -> RepositoryResult<OrderLine> {
        self.inner.supervisor_unlock(line_id, supervisor_id).await
    }

    async fn find_awaiting_pallet(&self, pallet_id: &str) -> RepositoryResult<Vec<OrderLine>> {
        self.inner.find_awaiting_pallet(pallet_id).await
    }

    async fn insert_adjustment(&self, adjustment: &StockAdjustment) -> RepositoryResult<()> {
        self.inner.insert_adjustment(adjustment).await
    }

    async fn find_adjustment(
        &self,
        adjustment_id: &str,
    ) -> RepositoryResult<Option<StockAdjustment>> {
        self.inner.find_adjustment(adjustment_id).await
    }

    async fn update_adjustment(&self, adjustment: &StockAdjustment) -> RepositoryResult<()> {
        self.inner.update_adjustment(adjustment).await
    }

    async fn list_adjustments_for_line(
        &self,
        line_id: &str,
    ) -> RepositoryResult<Vec<StockAdjustment>> {
        self.inner.list_adjustments_for_line(line_id).await
    }
}
