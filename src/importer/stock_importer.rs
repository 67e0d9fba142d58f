// ==========================================
// 仓库移库作业引擎 - 库存/物料目录 CSV 导入
// ==========================================
// 用途: 为 article_catalog / stock_record 播种数据
// 列:
// - 库存: warehouse, slot, article, lot, expiry, available_qty
// - 物料: code, description, ean, lot, expiry
// 规则: 非法行跳过并记入 RowIssue,不中断整批导入
// ==========================================

use crate::domain::{ArticleRecord, StockRecord};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::StockCatalogRepository;
use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// 被跳过的行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowIssue {
    pub row: usize,
    pub message: String,
}

/// 导入汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: Vec<RowIssue>,
}

#[derive(Debug, Deserialize)]
struct StockRow {
    warehouse: String,
    slot: String,
    article: String,
    #[serde(default)]
    lot: Option<String>,
    #[serde(default)]
    expiry: Option<String>,
    available_qty: f64,
}

#[derive(Debug, Deserialize)]
struct ArticleRow {
    code: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    ean: Option<String>,
    #[serde(default)]
    lot: Option<String>,
    #[serde(default)]
    expiry: Option<String>,
}

// ==========================================
// StockCsvImporter
// ==========================================
pub struct StockCsvImporter {
    repo: Arc<StockCatalogRepository>,
}

impl StockCsvImporter {
    pub fn new(repo: Arc<StockCatalogRepository>) -> Self {
        Self { repo }
    }

    /// 导入库存 CSV
    ///
    /// # 参数
    /// - replace: true 时先清空现有库存记录
    pub fn import_stock_file(&self, path: &Path, replace: bool) -> ImportResult<ImportSummary> {
        let file = open_csv(path)?;
        let (records, skipped) = parse_stock(file)?;
        if replace {
            let cleared = self.repo.clear_stock()?;
            tracing::info!(cleared, "已清空库存记录");
        }
        let imported = self.repo.insert_stock(&records)?;

        tracing::info!(
            file = %path.display(),
            imported,
            skipped = skipped.len(),
            "库存导入完成"
        );
        Ok(ImportSummary { imported, skipped })
    }

    /// 导入物料目录 CSV
    pub fn import_article_file(&self, path: &Path) -> ImportResult<ImportSummary> {
        let file = open_csv(path)?;
        let (records, skipped) = parse_articles(file)?;
        let imported = self.repo.insert_articles(&records)?;

        tracing::info!(
            file = %path.display(),
            imported,
            skipped = skipped.len(),
            "物料目录导入完成"
        );
        Ok(ImportSummary { imported, skipped })
    }
}

fn open_csv(path: &Path) -> ImportResult<File> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => {}
        other => {
            return Err(ImportError::UnsupportedFormat(
                other.unwrap_or("").to_string(),
            ))
        }
    }
    Ok(File::open(path)?)
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(input)
}

/// 解析库存行(行号从 1 开始,不含表头)
pub fn parse_stock<R: Read>(input: R) -> ImportResult<(Vec<StockRecord>, Vec<RowIssue>)> {
    let mut records = Vec::new();
    let mut skipped = Vec::new();

    for (idx, result) in reader(input).deserialize::<StockRow>().enumerate() {
        let row_no = idx + 1;
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                skipped.push(RowIssue {
                    row: row_no,
                    message: e.to_string(),
                });
                continue;
            }
        };
        match stock_record(row_no, row) {
            Ok(record) => records.push(record),
            Err(e) => skipped.push(RowIssue {
                row: row_no,
                message: e.to_string(),
            }),
        }
    }
    Ok((records, skipped))
}

/// 解析物料目录行
pub fn parse_articles<R: Read>(input: R) -> ImportResult<(Vec<ArticleRecord>, Vec<RowIssue>)> {
    let mut records = Vec::new();
    let mut skipped = Vec::new();

    for (idx, result) in reader(input).deserialize::<ArticleRow>().enumerate() {
        let row_no = idx + 1;
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                skipped.push(RowIssue {
                    row: row_no,
                    message: e.to_string(),
                });
                continue;
            }
        };
        if row.code.is_empty() {
            skipped.push(RowIssue {
                row: row_no,
                message: "code 为空".to_string(),
            });
            continue;
        }
        match parse_expiry(row_no, row.expiry) {
            Ok(expiry) => records.push(ArticleRecord {
                code: row.code,
                description: row.description,
                ean: non_empty(row.ean),
                lot: non_empty(row.lot),
                expiry,
            }),
            Err(e) => skipped.push(RowIssue {
                row: row_no,
                message: e.to_string(),
            }),
        }
    }
    Ok((records, skipped))
}

fn stock_record(row_no: usize, row: StockRow) -> ImportResult<StockRecord> {
    for (field, value) in [
        ("warehouse", &row.warehouse),
        ("slot", &row.slot),
        ("article", &row.article),
    ] {
        if value.is_empty() {
            return Err(ImportError::FieldMappingError {
                row: row_no,
                message: format!("{} 为空", field),
            });
        }
    }
    if !row.available_qty.is_finite() || row.available_qty < 0.0 {
        return Err(ImportError::ValueRangeError {
            row: row_no,
            field: "available_qty".to_string(),
            value: row.available_qty,
        });
    }

    Ok(StockRecord {
        warehouse: row.warehouse.to_uppercase(),
        slot: row.slot.to_uppercase(),
        article: row.article,
        lot: non_empty(row.lot),
        expiry: parse_expiry(row_no, row.expiry)?,
        available_qty: row.available_qty,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// 有效期: YYYY-MM-DD 或 YYYYMMDD,空值视为无有效期
fn parse_expiry(row_no: usize, raw: Option<String>) -> ImportResult<Option<NaiveDate>> {
    let Some(raw) = non_empty(raw) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&raw, "%Y%m%d"))
        .map(Some)
        .map_err(|_| ImportError::DateFormatError {
            row: row_no,
            field: "expiry".to_string(),
            value: raw,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_shared_connection;
    use crate::repository::stores::StockCatalog;
    use std::io::Write;

    #[test]
    fn test_parse_stock_skips_bad_rows() {
        let csv = "warehouse,slot,article,lot,expiry,available_qty\n\
                   a,r01,ART01,L1,2026-03-01,10\n\
                   A,R02,ART01,,20260101,5\n\
                   A,,ART01,,,1\n\
                   A,R03,ART01,,2026-13-01,1\n\
                   A,R04,ART01,,,-2\n";
        let (records, skipped) = parse_stock(csv.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].warehouse, "A");
        assert_eq!(records[0].slot, "R01");
        assert_eq!(records[1].lot, None);
        assert_eq!(records[1].expiry, NaiveDate::from_ymd_opt(2026, 1, 1));

        let rows: Vec<usize> = skipped.iter().map(|s| s.row).collect();
        assert_eq!(rows, vec![3, 4, 5]);
    }

    #[test]
    fn test_parse_articles_requires_code() {
        let csv = "code,description,ean,lot,expiry\n\
                   ART01,Agua 1L,8412345678905,L1,\n\
                   ,sin codigo,,,\n";
        let (records, skipped) = parse_articles(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ean.as_deref(), Some("8412345678905"));
        assert_eq!(skipped.len(), 1);
    }

    #[tokio::test]
    async fn test_import_files_into_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let stock_path = dir.path().join("stock.csv");
        let article_path = dir.path().join("articles.csv");
        {
            let mut f = File::create(&stock_path).unwrap();
            writeln!(f, "warehouse,slot,article,lot,expiry,available_qty").unwrap();
            writeln!(f, "A,R02,ART01,,,3").unwrap();
            writeln!(f, "A,R01,ART01,,2026-01-01,4").unwrap();
            let mut f = File::create(&article_path).unwrap();
            writeln!(f, "code,description,ean,lot,expiry").unwrap();
            writeln!(f, "ART01,Agua 1L,8412345678905,,").unwrap();
        }

        let conn = open_shared_connection(dir.path().join("t.db").to_str().unwrap()).unwrap();
        let repo = Arc::new(StockCatalogRepository::new(conn));
        let importer = StockCsvImporter::new(repo.clone());

        assert_eq!(importer.import_article_file(&article_path).unwrap().imported, 1);
        let summary = importer.import_stock_file(&stock_path, true).unwrap();
        assert_eq!(summary.imported, 2);
        assert!(summary.skipped.is_empty());

        let stock = repo.query("ART01", None, None).await.unwrap();
        let slots: Vec<&str> = stock.iter().map(|r| r.slot.as_str()).collect();
        assert_eq!(slots, vec!["R01", "R02"]);
        assert_eq!(repo.find_articles_by_ean("08412345678905").await.unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_non_csv_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stock.xlsx");
        File::create(&path).unwrap();
        assert!(matches!(open_csv(&path), Err(ImportError::UnsupportedFormat(_))));
    }
}
