// ==========================================
// 仓库移库作业引擎 - 库存目录仓储
// ==========================================
// 职责: StockCatalog 的 SQLite 参考实现 + 导入写入
// 排序: expiry 升序,无有效期排最后(FIFO)
// ==========================================

use crate::domain::{normalize_ean, ArticleRecord, Location, StockRecord};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{fmt_date, parse_date_opt};
use crate::repository::stores::StockCatalog;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// StockCatalogRepository - 库存目录仓储
// ==========================================
pub struct StockCatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StockCatalogRepository {
    /// 创建新的 StockCatalogRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 批量写入物料目录条目
    pub fn insert_articles(&self, articles: &[ArticleRecord]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        for article in articles {
            tx.execute(
                r#"INSERT INTO article_catalog (code, description, ean, ean_normalized, lot, expiry)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                params![
                    article.code,
                    article.description,
                    article.ean,
                    article.ean.as_deref().map(normalize_ean),
                    article.lot,
                    article.expiry.as_ref().map(fmt_date),
                ],
            )?;
        }
        tx.commit()?;
        Ok(articles.len())
    }

    /// 批量写入库存记录
    pub fn insert_stock(&self, records: &[StockRecord]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        for record in records {
            tx.execute(
                r#"INSERT INTO stock_record (warehouse, slot, article, lot, expiry, available_qty)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                params![
                    record.warehouse,
                    record.slot,
                    record.article,
                    record.lot,
                    record.expiry.as_ref().map(fmt_date),
                    record.available_qty,
                ],
            )?;
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// 清空库存快照(整表重导入前调用)
    pub fn clear_stock(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        Ok(conn.execute("DELETE FROM stock_record", [])?)
    }

    fn map_article_row(row: &rusqlite::Row) -> rusqlite::Result<ArticleRecord> {
        Ok(ArticleRecord {
            code: row.get(0)?,
            description: row.get(1)?,
            ean: row.get(2)?,
            lot: row.get(3)?,
            expiry: parse_date_opt(row.get(4)?),
        })
    }

    fn find_articles(&self, column: &str, key: &str) -> RepositoryResult<Vec<ArticleRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT code, description, ean, lot, expiry FROM article_catalog
               WHERE {} = ?1
               ORDER BY expiry IS NULL, expiry, rowid"#,
            column
        ))?;
        let articles = stmt
            .query_map(params![key], Self::map_article_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(articles)
    }
}

#[async_trait]
impl StockCatalog for StockCatalogRepository {
    async fn query(
        &self,
        article: &str,
        lot: Option<&str>,
        location: Option<&Location>,
    ) -> RepositoryResult<Vec<StockRecord>> {
        let conn = self.get_conn()?;
        let warehouse = location.map(|l| l.warehouse.as_str());
        let slot = location.filter(|l| l.is_complete()).map(|l| l.slot.as_str());

        let mut stmt = conn.prepare(
            r#"SELECT warehouse, slot, article, lot, expiry, available_qty FROM stock_record
               WHERE article = ?1
                 AND (?2 IS NULL OR UPPER(TRIM(lot)) = UPPER(TRIM(?2)))
                 AND (?3 IS NULL OR warehouse = ?3)
                 AND (?4 IS NULL OR slot = ?4)
               ORDER BY expiry IS NULL, expiry, rowid"#,
        )?;
        let records = stmt
            .query_map(params![article.trim(), lot, warehouse, slot], |row| {
                Ok(StockRecord {
                    warehouse: row.get(0)?,
                    slot: row.get(1)?,
                    article: row.get(2)?,
                    lot: row.get(3)?,
                    expiry: parse_date_opt(row.get(4)?),
                    available_qty: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    async fn find_articles_by_ean(&self, ean: &str) -> RepositoryResult<Vec<ArticleRecord>> {
        let normalized = normalize_ean(ean);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }
        self.find_articles("ean_normalized", &normalized)
    }

    async fn find_articles_by_code(&self, code: &str) -> RepositoryResult<Vec<ArticleRecord>> {
        self.find_articles("code", code.trim())
    }
}
