// ==========================================
// 仓库移库作业引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、值对象
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod context;
pub mod location;
pub mod order;
pub mod pallet;
pub mod scan;
pub mod stock;
pub mod transfer;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use context::{ExpectedWork, RequestContext};
pub use location::Location;
pub use order::{LineDestination, OrderLine, StockAdjustment};
pub use pallet::{NewPalletLine, Pallet, PalletLine, PalletType};
pub use scan::{ScanResult, ScannedArticle, ScannedPallet};
pub use stock::{normalize_ean, ArticleRecord, StockRecord};
pub use transfer::{article_subject_id, Transfer};
pub use types::{AdjustmentStatus, LineState, OperatorRole, PalletState, SubjectType, TransferState};
