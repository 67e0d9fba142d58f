// ==========================================
// 仓库移库作业引擎 - 扫码解析器
// ==========================================
// 职责: 分类结果 → ScanResult(查询物料目录/托盘存储)
// 红线: Location 分类从不触发查询;Article/Pallet 分类必定查询
// ==========================================

use crate::domain::{ArticleRecord, ScanResult, ScannedArticle};
use crate::engine::classifier::{classify, Classification, GtinKey};
use crate::engine::error::EngineResult;
use crate::repository::stores::{PalletStore, StockCatalog};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

pub const ARTICLE_NOT_FOUND: &str = "article not found";
pub const PALLET_NOT_FOUND: &str = "pallet not found";

// ==========================================
// ScanResolver - 扫码解析器
// ==========================================
pub struct ScanResolver {
    catalog: Arc<dyn StockCatalog>,
    pallets: Arc<dyn PalletStore>,
}

impl ScanResolver {
    pub fn new(catalog: Arc<dyn StockCatalog>, pallets: Arc<dyn PalletStore>) -> Self {
        Self { catalog, pallets }
    }

    /// 扫码入口:分类 + 查询
    ///
    /// # 返回
    /// - Ok(ScanResult): 含 Invalid(无法识别/未找到不是错误)
    /// - Err: 协作方故障
    #[instrument(skip(self))]
    pub async fn resolve(&self, raw: &str) -> EngineResult<ScanResult> {
        let classification = classify(raw);
        tracing::debug!(?classification, "扫码分类完成");
        self.resolve_classification(classification).await
    }

    pub async fn resolve_classification(
        &self,
        classification: Classification,
    ) -> EngineResult<ScanResult> {
        match classification {
            Classification::Location(location) => Ok(ScanResult::Location(location)),
            Classification::Invalid { reason } => Ok(ScanResult::Invalid { reason }),
            Classification::Sscc { sscc } => {
                let pallet = self.pallets.find_by_code(&sscc).await?;
                Ok(match pallet {
                    Some(pallet) => ScanResult::Pallet(pallet.to_scanned()),
                    None => ScanResult::invalid(PALLET_NOT_FOUND),
                })
            }
            Classification::Gtin(key) => {
                let records = self.catalog.find_articles_by_ean(&key.ean).await?;
                Ok(fan_out(records, &key))
            }
            Classification::ArticleCode { code } => {
                let records = self.catalog.find_articles_by_code(&code).await?;
                let key = GtinKey {
                    ean: String::new(),
                    lot: None,
                    expiry: None,
                };
                Ok(fan_out(records, &key))
            }
        }
    }
}

/// 候选收敛:按批次过滤(过滤为空则保留原列表)→ (code, lot) 去重 → 0/1/多
fn fan_out(records: Vec<ArticleRecord>, key: &GtinKey) -> ScanResult {
    let scan_lot = key.lot.as_deref().map(str::trim).filter(|l| !l.is_empty());
    let records = match scan_lot {
        Some(lot) => {
            let filtered: Vec<ArticleRecord> = records
                .iter()
                .filter(|r| {
                    r.lot
                        .as_deref()
                        .map(|candidate| candidate.trim().eq_ignore_ascii_case(lot))
                        .unwrap_or(false)
                })
                .cloned()
                .collect();
            if filtered.is_empty() {
                records
            } else {
                filtered
            }
        }
        None => records,
    };

    let mut seen = HashSet::new();
    let mut candidates: Vec<ScannedArticle> = records
        .into_iter()
        .filter(|r| seen.insert((r.code.clone(), r.lot.clone())))
        .map(|r| ScannedArticle {
            code: r.code,
            description: r.description,
            lot: r.lot,
            expiry: r.expiry,
        })
        .collect();

    match candidates.len() {
        0 => ScanResult::invalid(ARTICLE_NOT_FOUND),
        1 => {
            let mut article = candidates.remove(0);
            apply_scan_attributes(&mut article, scan_lot, key.expiry);
            ScanResult::Article(article)
        }
        _ => ScanResult::ArticleSet { candidates },
    }
}

/// 扫码携带的批次/有效期优先于目录值
fn apply_scan_attributes(article: &mut ScannedArticle, lot: Option<&str>, expiry: Option<NaiveDate>) {
    if let Some(lot) = lot {
        article.lot = Some(lot.to_string());
    }
    if expiry.is_some() {
        article.expiry = expiry;
    }
}
