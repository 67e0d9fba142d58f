// ==========================================
// 仓库移库作业引擎 - 主入口
// ==========================================
// 用法:
//   warehouse-transfer [db_path] [--articles <csv>] [--stock <csv>]
// 行为: 建库 → 可选导入物料目录/库存 → 输出配置快照与待完成移库单
// ==========================================

use std::path::PathBuf;

use anyhow::{bail, Context};
use warehouse_transfer::app::{get_default_db_path, AppState};
use warehouse_transfer::importer::StockCsvImporter;
use warehouse_transfer::logging;

#[derive(Debug, Default)]
struct CliArgs {
    db_path: Option<String>,
    articles_csv: Option<PathBuf>,
    stock_csv: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut parsed = CliArgs::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--articles" => {
                let path = args.next().context("--articles 需要文件路径")?;
                parsed.articles_csv = Some(PathBuf::from(path));
            }
            "--stock" => {
                let path = args.next().context("--stock 需要文件路径")?;
                parsed.stock_csv = Some(PathBuf::from(path));
            }
            other if other.starts_with("--") => bail!("未知参数: {}", other),
            other => parsed.db_path = Some(other.to_string()),
        }
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", warehouse_transfer::APP_NAME);
    tracing::info!("系统版本: {}", warehouse_transfer::VERSION);
    tracing::info!("==================================================");

    let args = parse_args()?;
    let db_path = args.db_path.unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path)
        .await
        .map_err(anyhow::Error::msg)
        .context("无法初始化AppState")?;

    let importer = StockCsvImporter::new(state.stock_repo.clone());
    if let Some(path) = &args.articles_csv {
        let summary = importer
            .import_article_file(path)
            .with_context(|| format!("物料目录导入失败: {}", path.display()))?;
        for issue in &summary.skipped {
            tracing::warn!(row = issue.row, "跳过物料行: {}", issue.message);
        }
    }
    if let Some(path) = &args.stock_csv {
        let summary = importer
            .import_stock_file(path, true)
            .with_context(|| format!("库存导入失败: {}", path.display()))?;
        for issue in &summary.skipped {
            tracing::warn!(row = issue.row, "跳过库存行: {}", issue.message);
        }
    }

    let snapshot = state
        .config_manager
        .get_config_snapshot()
        .context("读取配置快照失败")?;
    tracing::info!("配置快照: {}", snapshot);

    let pending = state
        .workflow_api
        .list_pending_transfers()
        .await
        .map_err(|e| anyhow::anyhow!("[{}] {}", e.code(), e))?;
    tracing::info!("待完成移库单: {}", pending.len());
    for transfer in &pending {
        tracing::info!(
            transfer_id = %transfer.transfer_id,
            subject = %transfer.subject_key(),
            origin = %transfer.origin_location,
            "待完成"
        );
    }

    Ok(())
}
