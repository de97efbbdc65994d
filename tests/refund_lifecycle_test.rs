//! Refund lifecycle: request validation, operator approval, provider
//! execution, idempotency collisions, and full-refund side effects.

#![allow(clippy::unwrap_used)]

mod common;

use boxoffice::providers::MockBehavior;
use boxoffice::reconciler::ReconcileOutcome;
use boxoffice::store::SettlementStore;
use boxoffice::types::{Currency, Money, Order, OrderStatus, RefundStatus, TicketStatus, UserId};
use common::TestApp;
use serde_json::json;

async fn paid_order(app: &TestApp) -> Order {
    let tt = app.seed_general(2500, 100).await;
    let order = app.place_order(&tt, 2).await;
    app.pay_order(order.id).await;
    app.store.order(order.id).await.unwrap().unwrap()
}

#[tokio::test]
async fn partial_refund_leaves_order_paid_and_tickets_issued() {
    let app = TestApp::new();
    let order = paid_order(&app).await;

    let refund = app
        .refunds
        .create(
            order.id,
            Money::from_cents(1000),
            &Currency::new("USD"),
            "goodwill".to_string(),
            UserId::new(),
        )
        .await
        .unwrap();
    assert_eq!(refund.status, RefundStatus::Pending);

    let refund = app.refunds.process(refund.id, false).await.unwrap();
    assert_eq!(refund.status, RefundStatus::Processed);
    assert!(refund.processed_at.is_some());
    assert!(refund.provider_ref.is_some());

    let order = app.store.order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    for ticket in app.store.tickets_for_order(order.id).await.unwrap() {
        assert_eq!(ticket.status, TicketStatus::Issued);
    }
}

#[tokio::test]
async fn full_refund_marks_order_refunded_and_voids_tickets() {
    let app = TestApp::new();
    let order = paid_order(&app).await;

    let refund = app
        .refunds
        .create(
            order.id,
            order.total,
            &Currency::new("USD"),
            "event canceled".to_string(),
            UserId::new(),
        )
        .await
        .unwrap();
    app.refunds.process(refund.id, false).await.unwrap();

    let order = app.store.order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Refunded);
    let tickets = app.store.tickets_for_order(order.id).await.unwrap();
    assert_eq!(tickets.len(), 2);
    for ticket in tickets {
        assert_eq!(ticket.status, TicketStatus::Void);
    }
}

#[tokio::test]
async fn refund_cannot_exceed_the_refundable_remainder() {
    let app = TestApp::new();
    let order = paid_order(&app).await;

    let first = app
        .refunds
        .create(
            order.id,
            Money::from_cents(1000),
            &Currency::new("USD"),
            "goodwill".to_string(),
            UserId::new(),
        )
        .await
        .unwrap();
    app.refunds.process(first.id, false).await.unwrap();

    // 5350 total, 1000 already refunded: 5000 no longer fits.
    let err = app
        .refunds
        .create(
            order.id,
            Money::from_cents(5000),
            &Currency::new("USD"),
            "too much".to_string(),
            UserId::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, boxoffice::Error::Validation(_)));
}

#[tokio::test]
async fn two_fitting_refunds_cannot_both_process_past_the_order_total() {
    let app = TestApp::new();
    let order = paid_order(&app).await;

    // Both fit the remainder at creation time; only one may resolve.
    let first = app
        .refunds
        .create(
            order.id,
            order.total,
            &Currency::new("USD"),
            "operator one".to_string(),
            UserId::new(),
        )
        .await
        .unwrap();
    let second = app
        .refunds
        .create(
            order.id,
            order.total,
            &Currency::new("USD"),
            "operator two".to_string(),
            UserId::new(),
        )
        .await
        .unwrap();

    app.refunds.process(first.id, false).await.unwrap();

    let err = app.refunds.process(second.id, false).await.unwrap_err();
    assert!(matches!(err, boxoffice::Error::Conflict(_)));

    let second = app.store.refund(second.id).await.unwrap().unwrap();
    assert_eq!(second.status, RefundStatus::Pending);
    assert_eq!(
        app.store.processed_refund_total(order.id).await.unwrap(),
        order.total
    );
}

#[tokio::test]
async fn refund_webhook_cannot_push_processed_total_past_the_order_total() {
    let app = TestApp::new();
    let order = paid_order(&app).await;
    let payment = app
        .store
        .captured_payment_for_order(order.id)
        .await
        .unwrap()
        .unwrap();

    let first = app
        .refunds
        .create(
            order.id,
            order.total,
            &Currency::new("USD"),
            "full".to_string(),
            UserId::new(),
        )
        .await
        .unwrap();
    let second = app
        .refunds
        .create(
            order.id,
            Money::from_cents(1000),
            &Currency::new("USD"),
            "goodwill".to_string(),
            UserId::new(),
        )
        .await
        .unwrap();
    app.refunds.process(first.id, false).await.unwrap();

    // An externally-reported refund falls back to the remaining pending
    // row, but resolving it would exceed the paid total.
    let body = serde_json::to_vec(&serde_json::json!({
        "type": "refund.succeeded",
        "provider_ref": payment.intent_ref,
        "refund_ref": "mock_re_late",
    }))
    .unwrap();
    let signature = boxoffice::providers::MockProvider::sign(common::WEBHOOK_SECRET, &body);
    let err = app
        .reconciler
        .handle("mock", &signature, &body)
        .await
        .unwrap_err();
    assert!(matches!(err, boxoffice::Error::Conflict(_)));

    let second = app.store.refund(second.id).await.unwrap().unwrap();
    assert_eq!(second.status, RefundStatus::Pending);
    assert_eq!(
        app.store.processed_refund_total(order.id).await.unwrap(),
        order.total
    );
}

#[tokio::test]
async fn refund_validation_rejects_bad_requests() {
    let app = TestApp::new();
    let order = paid_order(&app).await;

    // Currency mismatch.
    let err = app
        .refunds
        .create(
            order.id,
            Money::from_cents(100),
            &Currency::new("EUR"),
            "wrong currency".to_string(),
            UserId::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, boxoffice::Error::Validation(_)));

    // Zero amount.
    let err = app
        .refunds
        .create(
            order.id,
            Money::ZERO,
            &Currency::new("USD"),
            "zero".to_string(),
            UserId::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, boxoffice::Error::Validation(_)));

    // Suspended organization.
    app.store
        .set_organization_suspended(order.organization_id, true)
        .await
        .unwrap();
    let err = app
        .refunds
        .create(
            order.id,
            Money::from_cents(100),
            &Currency::new("USD"),
            "suspended".to_string(),
            UserId::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, boxoffice::Error::Validation(_)));
}

#[tokio::test]
async fn approve_and_reject_only_from_pending() {
    let app = TestApp::new();
    let order = paid_order(&app).await;
    let refund = app
        .refunds
        .create(
            order.id,
            Money::from_cents(500),
            &Currency::new("USD"),
            "review".to_string(),
            UserId::new(),
        )
        .await
        .unwrap();

    let approved = app.refunds.approve(refund.id).await.unwrap();
    assert_eq!(approved.status, RefundStatus::Approved);

    // Already approved: neither transition applies again.
    assert!(matches!(
        app.refunds.approve(refund.id).await,
        Err(boxoffice::Error::Conflict(_))
    ));
    assert!(matches!(
        app.refunds.reject(refund.id, "changed my mind").await,
        Err(boxoffice::Error::Conflict(_))
    ));
}

#[tokio::test]
async fn rejected_refund_records_the_reason_and_stays_out_of_the_pipeline() {
    let app = TestApp::new();
    let order = paid_order(&app).await;
    let refund = app
        .refunds
        .create(
            order.id,
            Money::from_cents(500),
            &Currency::new("USD"),
            "review".to_string(),
            UserId::new(),
        )
        .await
        .unwrap();

    let rejected = app.refunds.reject(refund.id, "not eligible").await.unwrap();
    assert_eq!(rejected.status, RefundStatus::Canceled);
    assert_eq!(rejected.resolution_note.as_deref(), Some("not eligible"));

    assert!(matches!(
        app.refunds.process(refund.id, false).await,
        Err(boxoffice::Error::Conflict(_))
    ));
}

#[tokio::test]
async fn already_refunded_at_provider_counts_as_processed() {
    let app = TestApp::new();
    let order = paid_order(&app).await;
    let refund = app
        .refunds
        .create(
            order.id,
            Money::from_cents(1000),
            &Currency::new("USD"),
            "double click".to_string(),
            UserId::new(),
        )
        .await
        .unwrap();

    app.mock.set_refund(MockBehavior::AlreadyRefunded).await;
    let refund = app.refunds.process(refund.id, false).await.unwrap();
    assert_eq!(refund.status, RefundStatus::Processed);
    assert_eq!(
        refund.resolution_note.as_deref(),
        Some("already refunded at provider")
    );
}

#[tokio::test]
async fn provider_error_leaves_the_refund_unresolved_for_retry() {
    let app = TestApp::new();
    let order = paid_order(&app).await;
    let refund = app
        .refunds
        .create(
            order.id,
            Money::from_cents(1000),
            &Currency::new("USD"),
            "declined".to_string(),
            UserId::new(),
        )
        .await
        .unwrap();

    app.mock
        .set_refund(MockBehavior::Fail {
            code: "insufficient_funds".to_string(),
            message: "balance too low".to_string(),
        })
        .await;
    let err = app.refunds.process(refund.id, false).await.unwrap_err();
    assert!(matches!(err, boxoffice::Error::Provider { .. }));

    // The refund is still unresolved and can be retried.
    let refund = app.store.refund(refund.id).await.unwrap().unwrap();
    assert_eq!(refund.status, RefundStatus::Pending);

    app.mock.set_refund(MockBehavior::Succeed).await;
    let refund = app.refunds.process(refund.id, false).await.unwrap();
    assert_eq!(refund.status, RefundStatus::Processed);
}

#[tokio::test]
async fn refund_pending_at_provider_completes_via_webhook() {
    let app = TestApp::new();
    let order = paid_order(&app).await;
    let refund = app
        .refunds
        .create(
            order.id,
            order.total,
            &Currency::new("USD"),
            "async provider".to_string(),
            UserId::new(),
        )
        .await
        .unwrap();

    app.mock.set_refund(MockBehavior::PendingAtProvider).await;
    let refund = app.refunds.process(refund.id, false).await.unwrap();
    assert_eq!(refund.status, RefundStatus::Approved);
    let provider_ref = refund.provider_ref.clone().unwrap();

    let outcome = app
        .deliver_webhook(&json!({
            "type": "refund.succeeded",
            "provider_ref": "unrelated",
            "refund_ref": provider_ref,
        }))
        .await;
    assert_eq!(outcome, ReconcileOutcome::Applied);

    let refund = app.store.refund(refund.id).await.unwrap().unwrap();
    assert_eq!(refund.status, RefundStatus::Processed);
    let order = app.store.order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Refunded);
}
