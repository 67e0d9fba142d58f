// ==========================================
// 移库单集成测试
// ==========================================
// 覆盖: 完成与重定位 / 重复完成 / 货架占用校验 / 物料直移 / 并发关托
// ==========================================


use test_helpers::{action_types_for, create_test_env, loc, new_line, TestEnv};
use warehouse_transfer::api::{ApiError, WorkflowApi};
use warehouse_transfer::domain::{
    Location, Pallet, PalletState, RequestContext, SubjectType, Transfer, TransferState,
};

/// 建托 → 加一行 → 在 origin 关托
async fn closed_pallet(api: &WorkflowApi, origin: &Location) -> (Pallet, Transfer) {
    let ctx = RequestContext::operator("op1");
    let pallet = api.create_pallet(&ctx, "EUR", None).await.unwrap();
    api.add_pallet_line(&ctx, &pallet.pallet_id, new_line("ART01", None, 3.0))
        .await
        .unwrap();
    let transfer = api.close_pallet(&ctx, &pallet.pallet_id, origin).await.unwrap();
    (pallet, transfer)
}

fn pending_count(env: &TestEnv) -> usize {
    let conn = env.conn.lock().unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM transfer WHERE state = 'PENDING'",
        [],
        |row| row.get::<_, i64>(0),
    )
    .unwrap() as usize
}

#[tokio::test]
async fn test_complete_stamps_and_relocates_pallet() {
    let env = create_test_env();
    let api = env.api();
    let ctx = RequestContext::operator("op2");
    let (pallet, transfer) = closed_pallet(&api, &loc("A", "01")).await;

    let completed = api
        .complete_transfer(&ctx, &transfer.transfer_id, &loc("B", "02"))
        .await
        .unwrap();
    assert_eq!(completed.state, TransferState::Completed);
    assert_eq!(completed.destination_location, Some(loc("B", "02")));
    assert_eq!(completed.completed_by.as_deref(), Some("op2"));
    assert!(completed.completed_at.is_some());

    let stored = api.get_transfer(&transfer.transfer_id).await.unwrap();
    assert_eq!(stored.state, TransferState::Completed);
    assert_eq!(stored.destination_location, Some(loc("B", "02")));

    let moved = api.get_pallet(&pallet.pallet_id).await.unwrap();
    assert_eq!(moved.current_location, Some(loc("B", "02")));
    assert_eq!(moved.state, PalletState::Closed);
    assert!(api.list_pending_transfers().await.unwrap().is_empty());

    assert_eq!(
        action_types_for(&env, "TRANSFER", &transfer.transfer_id),
        vec!["TRANSFER_CREATE", "TRANSFER_COMPLETE"]
    );
}

#[tokio::test]
async fn test_second_completion_is_rejected() {
    let env = create_test_env();
    let api = env.api();
    let ctx = RequestContext::operator("op1");
    let (_, transfer) = closed_pallet(&api, &loc("A", "01")).await;

    api.complete_transfer(&ctx, &transfer.transfer_id, &loc("B", "02"))
        .await
        .unwrap();
    let err = api
        .complete_transfer(&ctx, &transfer.transfer_id, &loc("C", "03"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::TransferNotPending(_)));

    // 第一次完成的结果保持不变
    let stored = api.get_transfer(&transfer.transfer_id).await.unwrap();
    assert_eq!(stored.destination_location, Some(loc("B", "02")));
}

#[tokio::test]
async fn test_complete_requires_complete_destination() {
    let env = create_test_env();
    let api = env.api();
    let ctx = RequestContext::operator("op1");
    let (_, transfer) = closed_pallet(&api, &loc("A", "01")).await;

    let err = api
        .complete_transfer(&ctx, &transfer.transfer_id, &loc("B", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidLocation(_)));
    assert_eq!(
        api.get_transfer(&transfer.transfer_id).await.unwrap().state,
        TransferState::Pending
    );

    let err = api
        .complete_transfer(&ctx, "missing", &loc("B", "02"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_rack_slot_occupied_by_other_pallet() {
    let env = create_test_env();
    let api = env.api();
    let ctx = RequestContext::operator("op1");
    let rack = loc("A", "R01");

    let (first, first_transfer) = closed_pallet(&api, &loc("A", "01")).await;
    api.complete_transfer(&ctx, &first_transfer.transfer_id, &rack)
        .await
        .unwrap();

    let (second, second_transfer) = closed_pallet(&api, &loc("A", "02")).await;
    let err = api
        .complete_transfer(&ctx, &second_transfer.transfer_id, &rack)
        .await
        .unwrap_err();
    match &err {
        ApiError::LocationOccupied { location, occupant } => {
            assert_eq!(location, "A$R01");
            assert_eq!(occupant, &first.pallet_id);
        }
        other => panic!("expected LocationOccupied, got {:?}", other),
    }
    assert_eq!(err.code(), "LOCATION_OCCUPIED");

    // 被拒绝时不做任何修改
    assert_eq!(
        api.get_transfer(&second_transfer.transfer_id).await.unwrap().state,
        TransferState::Pending
    );
    assert_eq!(
        api.get_pallet(&second.pallet_id).await.unwrap().current_location,
        Some(loc("A", "02"))
    );

    // 非货架货位不做占用校验
    let floor = loc("A", "X01");
    let (_, third_transfer) = closed_pallet(&api, &loc("A", "03")).await;
    api.complete_transfer(&ctx, &third_transfer.transfer_id, &floor)
        .await
        .unwrap();
    api.complete_transfer(&ctx, &second_transfer.transfer_id, &floor)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_archived_pallet_frees_rack_slot() {
    let env = create_test_env();
    let api = env.api();
    let ctx = RequestContext::operator("op1");
    let rack = loc("A", "E05");

    let (first, first_transfer) = closed_pallet(&api, &loc("A", "01")).await;
    api.complete_transfer(&ctx, &first_transfer.transfer_id, &rack)
        .await
        .unwrap();
    env.pallets.archive(&first.pallet_id).unwrap();

    let (second, second_transfer) = closed_pallet(&api, &loc("A", "02")).await;
    api.complete_transfer(&ctx, &second_transfer.transfer_id, &rack)
        .await
        .unwrap();
    assert_eq!(
        api.get_pallet(&second.pallet_id).await.unwrap().current_location,
        Some(rack)
    );
}

#[tokio::test]
async fn test_article_transfer_lifecycle() {
    let env = create_test_env();
    let api = env.api();
    let ctx = RequestContext::operator("op1");

    let transfer = api
        .create_article_transfer(&ctx, "ART01", 4.0, Some("L1"), &loc("A", "R01"))
        .await
        .unwrap();
    assert_eq!(transfer.subject_type, SubjectType::Article);
    assert_eq!(transfer.subject_id, "ART01|L1|A$R01");
    assert_eq!(transfer.article_code(), Some("ART01"));
    assert_eq!(transfer.quantity, Some(4.0));
    assert_eq!(transfer.lot.as_deref(), Some("L1"));

    // 同一库存位置只允许一张 Pending 直移单
    let err = api
        .create_article_transfer(&ctx, "ART01", 1.0, Some("L1"), &loc("A", "R01"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::AlreadyPendingTransfer(_)));

    // 其他库位或其他批次互不影响
    let other_slot = api
        .create_article_transfer(&ctx, "ART01", 1.0, Some("L1"), &loc("A", "R02"))
        .await
        .unwrap();
    let other_lot = api
        .create_article_transfer(&ctx, "ART01", 1.0, None, &loc("A", "R01"))
        .await
        .unwrap();
    assert_ne!(other_slot.subject_id, other_lot.subject_id);

    let err = api
        .create_article_transfer(&ctx, "ART02", 0.0, None, &loc("A", "R02"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let completed = api
        .complete_transfer(&ctx, &transfer.transfer_id, &loc("B", "R09"))
        .await
        .unwrap();
    assert_eq!(completed.state, TransferState::Completed);

    // 完成后同一库存位置可再次发起
    api.create_article_transfer(&ctx, "ART01", 2.0, Some("L1"), &loc("A", "R01"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_concurrent_close_creates_one_transfer() {
    let env = create_test_env();
    let api = env.api();
    let ctx_a = RequestContext::operator("op1").with_device("PDA-1");
    let ctx_b = RequestContext::operator("op2").with_device("PDA-2");

    let pallet = api.create_pallet(&ctx_a, "EUR", None).await.unwrap();
    api.add_pallet_line(&ctx_a, &pallet.pallet_id, new_line("ART01", None, 1.0))
        .await
        .unwrap();

    let origin = loc("A", "01");
    let (a, b) = tokio::join!(
        api.close_pallet(&ctx_a, &pallet.pallet_id, &origin),
        api.close_pallet(&ctx_b, &pallet.pallet_id, &origin),
    );

    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1);
    let failure = a.err().or(b.err()).unwrap();
    assert!(matches!(
        failure,
        ApiError::AlreadyPendingTransfer(_) | ApiError::OptimisticLockFailure(_)
    ));
    assert_eq!(pending_count(&env), 1);
}
