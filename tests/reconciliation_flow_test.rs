// ==========================================
// 盘点与订单行完成集成测试
// ==========================================
// 覆盖: 实盘上报(接受/升级/阻断) / 主管解锁与审核 / 完成订单行
// ==========================================


use test_helpers::{action_types_for, create_test_env, loc, new_line, seed_order_line, TestEnv};
use tokio_util::sync::CancellationToken;
use warehouse_transfer::api::{ApiError, WorkflowApi};
use warehouse_transfer::domain::{
    AdjustmentStatus, LineDestination, LineState, RequestContext, SubjectType, TransferState,
};
use warehouse_transfer::engine::ReconciliationDecision;

/// 下发并开工一条计划量为 planned 的订单行
async fn started_line(env: &TestEnv, api: &WorkflowApi, line_id: &str, planned: f64) {
    seed_order_line(env, line_id, "O1", "op1", planned);
    api.begin_line(&RequestContext::operator("op1"), line_id, &CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_found_equal_is_no_op() {
    let env = create_test_env();
    let api = env.api();
    started_line(&env, &api, "L1", 10.0).await;

    let outcome = api
        .report_found_quantity(&RequestContext::operator("op1"), "L1", 10.0)
        .await
        .unwrap();
    assert!(outcome.decision.is_no_op());
    assert!(outcome.adjustment.is_none());
    assert_eq!(outcome.line.planned_quantity, 10.0);
    assert!(api.list_adjustments("L1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_small_shortfall_applied() {
    let env = create_test_env();
    let api = env.api();
    started_line(&env, &api, "L1", 10.0).await;

    // 默认容差 5% → 允许短缺 0.5
    let outcome = api
        .report_found_quantity(&RequestContext::operator("op1"), "L1", 9.6)
        .await
        .unwrap();
    assert!(matches!(outcome.decision, ReconciliationDecision::Accept { .. }));
    let adjustment = outcome.adjustment.unwrap();
    assert_eq!(adjustment.status, AdjustmentStatus::Applied);
    assert!((adjustment.delta + 0.4).abs() < 1e-9);

    let line = api.get_order_line("L1").await.unwrap();
    assert_eq!(line.planned_quantity, 9.6);
    assert_eq!(line.state, LineState::EnProceso);
}

#[tokio::test]
async fn test_large_shortfall_escalates_and_is_reviewed() {
    let env = create_test_env();
    let api = env.api();
    started_line(&env, &api, "L1", 10.0).await;

    let outcome = api
        .report_found_quantity(&RequestContext::operator("op1"), "L1", 4.0)
        .await
        .unwrap();
    assert_eq!(outcome.decision, ReconciliationDecision::Escalate { shortfall: 6.0 });
    let adjustment = outcome.adjustment.unwrap();
    assert_eq!(adjustment.status, AdjustmentStatus::PendingReview);

    // 升级不阻断作业,计划量待审核
    let line = api.get_order_line("L1").await.unwrap();
    assert_eq!(line.planned_quantity, 10.0);
    assert_eq!(line.state, LineState::EnProceso);
    assert!(!api.is_order_blocked("O1").await.unwrap());

    let err = api
        .review_adjustment(&RequestContext::operator("op1"), &adjustment.adjustment_id, true)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));

    let reviewed = api
        .review_adjustment(&RequestContext::supervisor("sup1"), &adjustment.adjustment_id, true)
        .await
        .unwrap();
    assert_eq!(reviewed.status, AdjustmentStatus::Approved);
    assert_eq!(reviewed.reviewed_by.as_deref(), Some("sup1"));
    assert!(reviewed.reviewed_at.is_some());
    assert_eq!(api.get_order_line("L1").await.unwrap().planned_quantity, 4.0);

    // 已审核的调整不能再次审核
    let err = api
        .review_adjustment(&RequestContext::supervisor("sup1"), &adjustment.adjustment_id, false)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn test_rejected_review_keeps_plan() {
    let env = create_test_env();
    let api = env.api();
    started_line(&env, &api, "L1", 10.0).await;

    let adjustment = api
        .report_found_quantity(&RequestContext::operator("op1"), "L1", 2.0)
        .await
        .unwrap()
        .adjustment
        .unwrap();
    let reviewed = api
        .review_adjustment(&RequestContext::supervisor("sup1"), &adjustment.adjustment_id, false)
        .await
        .unwrap();
    assert_eq!(reviewed.status, AdjustmentStatus::Rejected);
    assert_eq!(api.get_order_line("L1").await.unwrap().planned_quantity, 10.0);
}

#[tokio::test]
async fn test_surplus_blocks_until_supervisor_unlock() {
    let env = create_test_env();
    let api = env.api();
    let op = RequestContext::operator("op1");
    started_line(&env, &api, "L1", 10.0).await;

    let outcome = api.report_found_quantity(&op, "L1", 15.0).await.unwrap();
    assert_eq!(outcome.decision, ReconciliationDecision::Block { surplus: 5.0 });
    assert_eq!(outcome.line.state, LineState::Bloqueada);
    assert_eq!(outcome.line.state_before_block, Some(LineState::EnProceso));
    assert_eq!(outcome.adjustment.unwrap().status, AdjustmentStatus::Blocked);
    assert!(api.is_order_blocked("O1").await.unwrap());

    // 阻断期间所有作业操作被拒绝
    let err = api
        .complete_line(&op, "L1", 10.0, LineDestination::Location(loc("B", "X01")))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "RECONCILIATION_BLOCKED");
    let err = api.report_found_quantity(&op, "L1", 10.0).await.unwrap_err();
    assert_eq!(err.code(), "RECONCILIATION_BLOCKED");
    let err = api
        .begin_line(&op, "L1", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "RECONCILIATION_BLOCKED");

    let err = api.supervisor_unlock(&op, "L1").await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));

    let unlocked = api
        .supervisor_unlock(&RequestContext::supervisor("sup1"), "L1")
        .await
        .unwrap();
    assert_eq!(unlocked.state, LineState::EnProceso);
    assert_eq!(unlocked.state_before_block, None);
    assert!(!api.is_order_blocked("O1").await.unwrap());

    let adjustments = api.list_adjustments("L1").await.unwrap();
    assert_eq!(adjustments.len(), 1);
    assert_eq!(adjustments[0].status, AdjustmentStatus::Released);
    assert_eq!(adjustments[0].reviewed_by.as_deref(), Some("sup1"));

    // 解锁后第二次解锁无效
    let err = api
        .supervisor_unlock(&RequestContext::supervisor("sup1"), "L1")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidStateTransition { .. }));

    assert_eq!(
        action_types_for(&env, "ORDER_LINE", "L1"),
        vec!["LINE_START", "LINE_BLOCK", "LINE_UNLOCK"]
    );
}

#[tokio::test]
async fn test_approval_refused_while_blocked() {
    let env = create_test_env();
    let api = env.api();
    let op = RequestContext::operator("op1");
    started_line(&env, &api, "L1", 10.0).await;

    let pending = api
        .report_found_quantity(&op, "L1", 3.0)
        .await
        .unwrap()
        .adjustment
        .unwrap();
    api.report_found_quantity(&op, "L1", 12.0).await.unwrap();

    let err = api
        .review_adjustment(&RequestContext::supervisor("sup1"), &pending.adjustment_id, true)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "RECONCILIATION_BLOCKED");
    assert_eq!(api.get_order_line("L1").await.unwrap().planned_quantity, 10.0);
}

#[tokio::test]
async fn test_complete_line_to_location_creates_completed_transfer() {
    let env = create_test_env();
    let api = env.api();
    let op = RequestContext::operator("op1");
    started_line(&env, &api, "L1", 10.0).await;

    let line = api
        .complete_line(&op, "L1", 10.0, LineDestination::Location(loc("B", "X01")))
        .await
        .unwrap();
    assert_eq!(line.state, LineState::Completada);
    assert_eq!(line.moved_quantity, 10.0);

    let transfer_id = line.linked_transfer_id.clone().unwrap();
    let transfer = api.get_transfer(&transfer_id).await.unwrap();
    assert_eq!(transfer.state, TransferState::Completed);
    assert_eq!(transfer.subject_type, SubjectType::Article);
    assert_eq!(transfer.subject_id, "ART01|L1|A$R01");
    assert_eq!(transfer.quantity, Some(10.0));
    assert_eq!(transfer.origin_location, loc("A", "R01"));
    assert_eq!(transfer.destination_location, Some(loc("B", "X01")));
    assert!(api.list_adjustments("L1").await.unwrap().is_empty());

    // 已完成的行不能再次完成
    let err = api
        .complete_line(&op, "L1", 10.0, LineDestination::Location(loc("B", "X01")))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn test_complete_line_with_tolerated_shortfall() {
    let env = create_test_env();
    let api = env.api();
    started_line(&env, &api, "L1", 10.0).await;

    let line = api
        .complete_line(
            &RequestContext::operator("op1"),
            "L1",
            9.8,
            LineDestination::Location(loc("B", "X01")),
        )
        .await
        .unwrap();
    assert_eq!(line.planned_quantity, 9.8);
    assert_eq!(line.moved_quantity, 9.8);

    let adjustments = api.list_adjustments("L1").await.unwrap();
    assert_eq!(adjustments.len(), 1);
    assert_eq!(adjustments[0].status, AdjustmentStatus::Applied);
}

#[tokio::test]
async fn test_failed_completion_records_no_adjustment() {
    let env = create_test_env();
    let api = env.api();
    started_line(&env, &api, "L1", 10.0).await;

    // 另一操作员已从同一库存位置发起直移
    api.create_article_transfer(
        &RequestContext::operator("op2"),
        "ART01",
        1.0,
        Some("L1"),
        &loc("A", "R01"),
    )
    .await
    .unwrap();

    let err = api
        .complete_line(
            &RequestContext::operator("op1"),
            "L1",
            9.6,
            LineDestination::Location(loc("B", "X01")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::AlreadyPendingTransfer(_)));

    let line = api.get_order_line("L1").await.unwrap();
    assert_eq!(line.state, LineState::EnProceso);
    assert_eq!(line.planned_quantity, 10.0);
    assert!(line.linked_transfer_id.is_none());
    assert!(api.list_adjustments("L1").await.unwrap().is_empty());
    assert_eq!(action_types_for(&env, "ORDER_LINE", "L1"), vec!["LINE_START"]);
}

#[tokio::test]
async fn test_pending_move_elsewhere_does_not_block_completion() {
    let env = create_test_env();
    let api = env.api();
    started_line(&env, &api, "L1", 10.0).await;

    api.create_article_transfer(
        &RequestContext::operator("op2"),
        "ART01",
        3.0,
        None,
        &loc("Z", "R99"),
    )
    .await
    .unwrap();

    let line = api
        .complete_line(
            &RequestContext::operator("op1"),
            "L1",
            9.6,
            LineDestination::Location(loc("B", "X01")),
        )
        .await
        .unwrap();
    assert_eq!(line.state, LineState::Completada);
    assert_eq!(line.planned_quantity, 9.6);

    let adjustments = api.list_adjustments("L1").await.unwrap();
    assert_eq!(adjustments.len(), 1);
    assert_eq!(adjustments[0].status, AdjustmentStatus::Applied);
    assert_eq!(adjustments[0].planned_quantity, 10.0);
    assert_eq!(api.list_pending_transfers().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_complete_line_onto_closed_pallet_rejected() {
    let env = create_test_env();
    let api = env.api();
    let op = RequestContext::operator("op1");
    started_line(&env, &api, "L1", 10.0).await;

    let pallet = api.create_pallet(&op, "EUR", None).await.unwrap();
    api.add_pallet_line(&op, &pallet.pallet_id, new_line("ART01", Some("L1"), 10.0))
        .await
        .unwrap();
    api.close_pallet(&op, &pallet.pallet_id, &loc("A", "01"))
        .await
        .unwrap();

    let err = api
        .complete_line(&op, "L1", 10.0, LineDestination::Pallet(pallet.pallet_id.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PALLET_CLOSED");

    let line = api.get_order_line("L1").await.unwrap();
    assert_eq!(line.state, LineState::EnProceso);
    assert!(line.destination_pallet_id.is_none());
}

#[tokio::test]
async fn test_complete_line_surplus_blocks() {
    let env = create_test_env();
    let api = env.api();
    started_line(&env, &api, "L1", 10.0).await;

    let err = api
        .complete_line(
            &RequestContext::operator("op1"),
            "L1",
            12.0,
            LineDestination::Location(loc("B", "X01")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::ReconciliationBlocked(_)));

    let line = api.get_order_line("L1").await.unwrap();
    assert_eq!(line.state, LineState::Bloqueada);
    assert!(line.linked_transfer_id.is_none());
    assert!(api.list_pending_transfers().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_complete_line_preconditions() {
    let env = create_test_env();
    let api = env.api();
    let op = RequestContext::operator("op1");
    seed_order_line(&env, "L1", "O1", "op1", 10.0);

    // 未开工
    let err = api
        .complete_line(&op, "L1", 10.0, LineDestination::Location(loc("B", "X01")))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidStateTransition { .. }));

    api.begin_line(&op, "L1", &CancellationToken::new()).await.unwrap();

    let err = api
        .complete_line(
            &RequestContext::operator("op2"),
            "L1",
            10.0,
            LineDestination::Location(loc("B", "X01")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotAssigned(_)));

    let err = api
        .complete_line(&op, "L1", 0.0, LineDestination::Location(loc("B", "X01")))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let err = api
        .complete_line(&op, "L1", 10.0, LineDestination::Location(loc("B", "")))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidLocation(_)));

    let err = api
        .complete_line(&op, "L1", 10.0, LineDestination::Pallet("no-such-pallet".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    assert_eq!(api.get_order_line("L1").await.unwrap().state, LineState::EnProceso);
}
