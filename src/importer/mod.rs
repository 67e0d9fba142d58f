// ==========================================
// 仓库移库作业引擎 - 导入层
// ==========================================
// 职责: 外部 CSV 数据导入(物料目录/库存快照)
// ==========================================

// 模块声明
pub mod error;
pub mod stock_importer;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use stock_importer::{parse_articles, parse_stock, ImportSummary, RowIssue, StockCsvImporter};
