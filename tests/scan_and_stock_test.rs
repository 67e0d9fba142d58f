// ==========================================
// 扫码解析与库存查询集成测试
// ==========================================
// 数据: seed_catalog(ART01 两个批次 + ART02,A/B 仓三条库存)
// ==========================================


use chrono::NaiveDate;
use test_helpers::{create_test_env, loc, seed_catalog};
use warehouse_transfer::api::ApiError;
use warehouse_transfer::domain::ScanResult;
use warehouse_transfer::engine::classifier::UNRECOGNIZED_FORMAT;
use warehouse_transfer::engine::scan_resolver::{ARTICLE_NOT_FOUND, PALLET_NOT_FOUND};

#[tokio::test]
async fn test_scan_locations() {
    let env = create_test_env();
    let api = env.api();

    assert_eq!(
        api.scan("A$R01").await.unwrap(),
        ScanResult::Location(loc("A", "R01"))
    );
    assert_eq!(api.scan("  B$  ").await.unwrap(), ScanResult::Location(loc("B", "")));

    assert_eq!(api.scan_location("A$R01").unwrap(), loc("A", "R01"));
    let err = api.scan_location("ART01").unwrap_err();
    assert!(matches!(err, ApiError::InvalidScan(_)));
}

#[tokio::test]
async fn test_scan_gtin_with_lot_and_expiry() {
    let env = create_test_env();
    seed_catalog(&env);
    let api = env.api();

    match api.scan("01084123456789051526093010L2").await.unwrap() {
        ScanResult::Article(article) => {
            assert_eq!(article.code, "ART01");
            assert_eq!(article.lot.as_deref(), Some("L2"));
            assert_eq!(article.expiry, NaiveDate::from_ymd_opt(2026, 9, 30));
        }
        other => panic!("expected Article, got {:?}", other),
    }
}

#[tokio::test]
async fn test_scan_gtin_without_lot_lists_candidates() {
    let env = create_test_env();
    seed_catalog(&env);
    let api = env.api();

    match api.scan("0108412345678905").await.unwrap() {
        ScanResult::ArticleSet { candidates } => {
            let lots: Vec<Option<&str>> = candidates.iter().map(|c| c.lot.as_deref()).collect();
            assert_eq!(lots, vec![Some("L1"), Some("L2")]);
        }
        other => panic!("expected ArticleSet, got {:?}", other),
    }

    // 未知批次回退到全部候选
    assert!(matches!(
        api.scan("010841234567890510L7").await.unwrap(),
        ScanResult::ArticleSet { .. }
    ));
}

#[tokio::test]
async fn test_scan_article_code_and_unknowns() {
    let env = create_test_env();
    seed_catalog(&env);
    let api = env.api();

    match api.scan("ART02").await.unwrap() {
        ScanResult::Article(article) => {
            assert_eq!(article.description, "Zumo naranja");
            assert_eq!(article.lot, None);
        }
        other => panic!("expected Article, got {:?}", other),
    }
    assert_eq!(
        api.scan("0105012345678900").await.unwrap(),
        api.scan("ART02").await.unwrap()
    );

    assert_eq!(api.scan("ZZZ999").await.unwrap(), ScanResult::invalid(ARTICLE_NOT_FOUND));
    assert_eq!(
        api.scan("00084000000000000017").await.unwrap(),
        ScanResult::invalid(PALLET_NOT_FOUND)
    );
    assert_eq!(api.scan("!!").await.unwrap(), ScanResult::invalid(UNRECOGNIZED_FORMAT));
    assert_eq!(api.scan("").await.unwrap(), ScanResult::invalid(UNRECOGNIZED_FORMAT));
}

#[tokio::test]
async fn test_query_stock_in_fifo_order() {
    let env = create_test_env();
    seed_catalog(&env);
    let api = env.api();

    let records = api.query_stock("ART01", None, None).await.unwrap();
    let slots: Vec<String> = records
        .iter()
        .map(|r| format!("{}${}", r.warehouse, r.slot))
        .collect();
    assert_eq!(slots, vec!["A$R01", "A$R02", "B$E01"]);

    let by_lot = api.query_stock("ART01", Some("l2"), None).await.unwrap();
    assert_eq!(by_lot.len(), 1);
    assert_eq!(by_lot[0].slot, "R02");

    let in_slot = api
        .query_stock("ART01", None, Some(&loc("A", "R01")))
        .await
        .unwrap();
    assert_eq!(in_slot.len(), 1);

    let in_warehouse = api
        .query_stock("ART01", None, Some(&loc("A", "")))
        .await
        .unwrap();
    assert_eq!(in_warehouse.len(), 2);

    assert!(api.query_stock("ART99", None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_plan_fifo_pick() {
    let env = create_test_env();
    seed_catalog(&env);
    let api = env.api();

    let plan = api.plan_fifo_pick("ART01", None, 10.0).await.unwrap();
    assert!(plan.is_complete());
    let picks: Vec<(&str, f64)> = plan
        .picks
        .iter()
        .map(|p| (p.record.slot.as_str(), p.quantity))
        .collect();
    assert_eq!(picks, vec![("R01", 5.0), ("R02", 5.0)]);

    let short = api.plan_fifo_pick("ART01", None, 40.0).await.unwrap();
    assert!(!short.is_complete());
    assert_eq!(short.unallocated, 7.0);
    assert_eq!(short.picks.len(), 3);

    let err = api.plan_fifo_pick("ART01", None, 0.0).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}
