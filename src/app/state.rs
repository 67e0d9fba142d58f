// ==========================================
// 仓库移库作业引擎 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 单一共享连接,所有仓储共用 Arc<Mutex<Connection>>
// ==========================================

use std::sync::Arc;

use crate::api::{WorkflowApi, WorkflowStores};
use crate::config::{ConfigManager, EngineConfigReader};
use crate::db::open_shared_connection;
use crate::engine::events::{OptionalEventPublisher, WorkflowEventPublisher};
use crate::repository::{
    ActionLogRepository, OrderLineRepository, PalletRepository, StockCatalogRepository,
    TransferRepository,
};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "WAREHOUSE_TRANSFER_DB_PATH";

/// 应用状态
///
/// 包含作业 API 实例和需要直接访问的仓储
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 作业API
    pub workflow_api: Arc<WorkflowApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 库存目录仓储(导入库存)
    pub stock_repo: Arc<StockCatalogRepository>,

    /// 托盘仓储(托盘类型维护/归档)
    pub pallet_repo: Arc<PalletRepository>,

    /// 订单行仓储(订单下发)
    pub order_repo: Arc<OrderLineRepository>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 1. 打开共享连接并幂等建库
    /// 2. 初始化所有Repository
    /// 3. 加载配置快照,组装作业API(action_log 作为事件发布者)
    pub async fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_shared_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let stock_repo = Arc::new(StockCatalogRepository::new(conn.clone()));
        let pallet_repo = Arc::new(PalletRepository::new(conn.clone()));
        let transfer_repo = Arc::new(TransferRepository::new(conn.clone()));
        let order_repo = Arc::new(OrderLineRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));
        let config_manager = Arc::new(ConfigManager::from_connection(conn));

        // ==========================================
        // 配置快照
        // ==========================================
        let config = config_manager
            .load_workflow_config()
            .await
            .map_err(|e| format!("配置加载失败: {}", e))?;
        tracing::info!(
            tolerance_abs = config.tolerance.absolute,
            tolerance_pct = config.tolerance.percent,
            ceiling_ms = config.poll_schedule.ceiling.as_millis() as u64,
            rack_prefixes = ?config.rack_slot_prefixes,
            "作业配置已加载"
        );

        // ==========================================
        // 作业API
        // ==========================================
        let publisher: Arc<dyn WorkflowEventPublisher> = action_log_repo.clone();
        let stores = WorkflowStores {
            catalog: stock_repo.clone(),
            pallets: pallet_repo.clone(),
            transfers: transfer_repo,
            orders: order_repo.clone(),
        };
        let workflow_api = Arc::new(WorkflowApi::new(
            stores,
            config,
            OptionalEventPublisher::with_publisher(publisher),
        ));

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            workflow_api,
            config_manager,
            stock_repo,
            pallet_repo,
            order_repo,
            action_log_repo,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先环境变量,其次用户数据目录,最后回退到当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./warehouse_transfer.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        let dir = data_dir.join("warehouse-transfer-dev");
        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("warehouse-transfer");

        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("warehouse_transfer.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[tokio::test]
    async fn test_app_state_bootstraps_fresh_database() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("state.db").to_string_lossy().to_string();

        let state = AppState::new(db_path.clone()).await.unwrap();
        assert_eq!(state.db_path, db_path);
        assert_eq!(state.workflow_api.config().rack_slot_prefixes, vec!["R", "E"]);
    }
}
