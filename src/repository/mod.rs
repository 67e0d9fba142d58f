// ==========================================
// 仓库移库作业引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 协作方存储接口(stores) + SQLite 参考实现
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod error;
pub mod order_repo;
pub mod pallet_repo;
pub mod row_codec;
pub mod stock_repo;
pub mod stores;
pub mod transfer_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use order_repo::OrderLineRepository;
pub use pallet_repo::PalletRepository;
pub use stock_repo::StockCatalogRepository;
pub use stores::{OrderStore, PalletStore, StockCatalog, TransferStore};
pub use transfer_repo::TransferRepository;
