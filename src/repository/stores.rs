// ==========================================
// 仓库移库作业引擎 - 协作方存储接口
// ==========================================
// 职责: 定义引擎消费的存储/目录接口(不含实现)
// 红线: 原子性由存储方保证(乐观锁、唯一约束、条件更新)
// 实现者: 本模块同级的 SQLite 仓储;测试中的脚本化替身
// ==========================================

use crate::domain::{
    ArticleRecord, Location, OrderLine, Pallet, PalletLine, PalletState, PalletType,
    StockAdjustment, StockRecord, SubjectType, Transfer,
};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use chrono::NaiveDateTime;

// ==========================================
// StockCatalog - 库存目录查询
// ==========================================
#[async_trait]
pub trait StockCatalog: Send + Sync {
    /// 查询库存记录
    ///
    /// # 排序约定
    /// - 按 expiry 升序,无有效期的记录排在最后(FIFO)
    async fn query(
        &self,
        article: &str,
        lot: Option<&str>,
        location: Option<&Location>,
    ) -> RepositoryResult<Vec<StockRecord>>;

    /// 按 EAN 查找物料目录条目(数字归一化比较)
    async fn find_articles_by_ean(&self, ean: &str) -> RepositoryResult<Vec<ArticleRecord>>;

    /// 按物料编码查找物料目录条目
    async fn find_articles_by_code(&self, code: &str) -> RepositoryResult<Vec<ArticleRecord>>;
}

// ==========================================
// PalletStore - 托盘存储
// ==========================================
// 所有写操作带 expected_version,返回新版本号
#[async_trait]
pub trait PalletStore: Send + Sync {
    async fn find_pallet_type(&self, type_code: &str) -> RepositoryResult<Option<PalletType>>;

    /// 分配下一个 SSCC 序列号
    async fn next_serial(&self) -> RepositoryResult<u64>;

    async fn insert(&self, pallet: &Pallet) -> RepositoryResult<()>;

    async fn find_by_id(&self, pallet_id: &str) -> RepositoryResult<Option<Pallet>>;

    async fn find_by_code(&self, code: &str) -> RepositoryResult<Option<Pallet>>;

    /// 加行(仅 OPEN 且版本匹配时成功)
    async fn add_line(
        &self,
        pallet_id: &str,
        expected_version: i64,
        line: &PalletLine,
    ) -> RepositoryResult<i64>;

    /// 删行(仅 OPEN 且版本匹配时成功)
    async fn remove_line(
        &self,
        pallet_id: &str,
        expected_version: i64,
        line_id: &str,
    ) -> RepositoryResult<i64>;

    /// 更新状态;location 为 Some 时同时更新当前库位
    async fn update_state(
        &self,
        pallet_id: &str,
        expected_version: i64,
        state: PalletState,
        location: Option<&Location>,
    ) -> RepositoryResult<i64>;

    /// 移库完成后更新当前库位
    async fn relocate(&self, pallet_id: &str, location: &Location) -> RepositoryResult<i64>;

    /// 查询当前位于某库位的未归档托盘
    async fn find_active_at(&self, location: &Location) -> RepositoryResult<Vec<Pallet>>;
}

// ==========================================
// TransferStore - 移库单存储
// ==========================================
#[async_trait]
pub trait TransferStore: Send + Sync {
    /// 插入 Pending 移库单(同主体已有 Pending 时违反唯一约束)
    async fn insert_pending(&self, transfer: &Transfer) -> RepositoryResult<()>;

    async fn find_by_id(&self, transfer_id: &str) -> RepositoryResult<Option<Transfer>>;

    async fn find_pending_by_subject(
        &self,
        subject_type: SubjectType,
        subject_id: &str,
    ) -> RepositoryResult<Option<Transfer>>;

    async fn list_pending(&self) -> RepositoryResult<Vec<Transfer>>;

    /// 条件完成(仅 PENDING 时更新)
    ///
    /// # 返回
    /// - Ok(true): 已完成
    /// - Ok(false): 移库单不是 PENDING(已被他人完成)
    async fn mark_completed(
        &self,
        transfer_id: &str,
        destination: &Location,
        completed_by: &str,
        completed_at: NaiveDateTime,
    ) -> RepositoryResult<bool>;
}

// ==========================================
// OrderStore - 订单行存储
// ==========================================
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_line(&self, line_id: &str) -> RepositoryResult<Option<OrderLine>>;

    /// 权威订单快照(开工轮询读取)
    async fn fetch_order_lines(&self, order_id: &str) -> RepositoryResult<Vec<OrderLine>>;

    /// 发出"开始作业"信号(后台可能随后异步拆分该行)
    async fn signal_begin_work(&self, line_id: &str, operator_id: &str) -> RepositoryResult<()>;

    /// 乐观锁保存订单行(以 line.version 为期望版本)
    ///
    /// # 红线
    /// - 当前状态为 BLOQUEADA 的行不能通过此方法修改,只能 supervisor_unlock
    async fn save_line(&self, line: &OrderLine) -> RepositoryResult<OrderLine>;

    /// 主管解锁:BLOQUEADA → state_before_block
    async fn supervisor_unlock(&self, line_id: &str, supervisor_id: &str)
        -> RepositoryResult<OrderLine>;

    /// 已完成且等待某托盘移库回填的行
    async fn find_awaiting_pallet(&self, pallet_id: &str) -> RepositoryResult<Vec<OrderLine>>;

    async fn insert_adjustment(&self, adjustment: &StockAdjustment) -> RepositoryResult<()>;

    async fn find_adjustment(&self, adjustment_id: &str)
        -> RepositoryResult<Option<StockAdjustment>>;

    async fn update_adjustment(&self, adjustment: &StockAdjustment) -> RepositoryResult<()>;

    async fn list_adjustments_for_line(&self, line_id: &str)
        -> RepositoryResult<Vec<StockAdjustment>>;
}
