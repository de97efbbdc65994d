//! Webhook reconciliation: signature enforcement, unknown references,
//! failure events, refund correlation fallback, and dispute recording.

#![allow(clippy::unwrap_used)]

mod common;

use boxoffice::providers::MockProvider;
use boxoffice::reconciler::ReconcileOutcome;
use boxoffice::store::SettlementStore;
use boxoffice::types::{Currency, Money, OrderStatus, PaymentStatus, RefundStatus, UserId};
use common::{TestApp, WEBHOOK_SECRET};
use serde_json::json;

#[tokio::test]
async fn bad_signature_is_rejected_with_no_state_change() {
    let app = TestApp::new();
    let tt = app.seed_general(2500, 100).await;
    let order = app.place_order(&tt, 1).await;
    let (payment, _) = app
        .orchestrator
        .create_intent(order.id, "mock")
        .await
        .unwrap();

    let body = serde_json::to_vec(&json!({
        "type": "payment.captured",
        "provider_ref": payment.intent_ref,
    }))
    .unwrap();
    let err = app
        .reconciler
        .handle("mock", "deadbeef", &body)
        .await
        .unwrap_err();
    assert!(matches!(err, boxoffice::Error::Authenticity(_)));

    let payment = app.store.payment(payment.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::RequiresAction);
    let order = app.store.order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn tampered_payload_fails_verification() {
    let app = TestApp::new();
    let body = serde_json::to_vec(&json!({"type": "payment.captured"})).unwrap();
    let signature = MockProvider::sign(WEBHOOK_SECRET, &body);
    let err = app
        .reconciler
        .handle("mock", &signature, br#"{"type":"payment.captured","provider_ref":"x"}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, boxoffice::Error::Authenticity(_)));
}

#[tokio::test]
async fn events_for_unknown_references_are_ignored() {
    let app = TestApp::new();
    let outcome = app
        .deliver_webhook(&json!({
            "type": "payment.captured",
            "provider_ref": "mock_int_nobody",
        }))
        .await;
    assert_eq!(outcome, ReconcileOutcome::Ignored);

    let outcome = app
        .deliver_webhook(&json!({
            "type": "refund.succeeded",
            "provider_ref": "mock_int_nobody",
            "refund_ref": "mock_re_nobody",
        }))
        .await;
    assert_eq!(outcome, ReconcileOutcome::Ignored);
}

#[tokio::test]
async fn failure_event_fails_the_payment_but_not_the_order() {
    let app = TestApp::new();
    let tt = app.seed_general(2500, 100).await;
    let order = app.place_order(&tt, 1).await;
    let (payment, _) = app
        .orchestrator
        .create_intent(order.id, "mock")
        .await
        .unwrap();

    let outcome = app
        .deliver_webhook(&json!({
            "type": "payment.failed",
            "provider_ref": payment.intent_ref,
            "code": "card_declined",
            "message": "card declined",
        }))
        .await;
    assert_eq!(outcome, ReconcileOutcome::Applied);

    let payment = app.store.payment(payment.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(payment.failure_code.as_deref(), Some("card_declined"));

    // The order stays pending so the buyer can retry with a new payment.
    let order = app.store.order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn refund_event_falls_back_to_the_newest_unresolved_refund() {
    let app = TestApp::new();
    let tt = app.seed_general(2500, 100).await;
    let order = app.place_order(&tt, 2).await;
    let payment = app.pay_order(order.id).await;

    // The refund never got a provider reference (operator requested it,
    // the provider settled it out of band).
    let refund = app
        .refunds
        .create(
            order.id,
            Money::from_cents(1000),
            &Currency::new("USD"),
            "out of band".to_string(),
            UserId::new(),
        )
        .await
        .unwrap();

    let outcome = app
        .deliver_webhook(&json!({
            "type": "refund.succeeded",
            "provider_ref": payment.intent_ref,
            "refund_ref": "mock_re_external",
        }))
        .await;
    assert_eq!(outcome, ReconcileOutcome::Applied);

    let refund = app.store.refund(refund.id).await.unwrap().unwrap();
    assert_eq!(refund.status, RefundStatus::Processed);
    assert_eq!(refund.provider_ref.as_deref(), Some("mock_re_external"));

    // Replay of the same event matches the now-resolved refund by its
    // provider reference and lands as a duplicate.
    let outcome = app
        .deliver_webhook(&json!({
            "type": "refund.succeeded",
            "provider_ref": payment.intent_ref,
            "refund_ref": "mock_re_external",
        }))
        .await;
    assert_eq!(outcome, ReconcileOutcome::Duplicate);
}

#[tokio::test]
async fn refund_failed_event_resolves_the_refund_as_failed() {
    let app = TestApp::new();
    let tt = app.seed_general(2500, 100).await;
    let order = app.place_order(&tt, 1).await;
    let payment = app.pay_order(order.id).await;
    let refund = app
        .refunds
        .create(
            order.id,
            Money::from_cents(500),
            &Currency::new("USD"),
            "chargeback risk".to_string(),
            UserId::new(),
        )
        .await
        .unwrap();

    let outcome = app
        .deliver_webhook(&json!({
            "type": "refund.failed",
            "provider_ref": payment.intent_ref,
            "refund_ref": "mock_re_failed",
            "message": "refund rejected by issuer",
        }))
        .await;
    assert_eq!(outcome, ReconcileOutcome::Applied);

    let refund = app.store.refund(refund.id).await.unwrap().unwrap();
    assert_eq!(refund.status, RefundStatus::Failed);
    assert_eq!(
        refund.resolution_note.as_deref(),
        Some("refund rejected by issuer")
    );

    // The order keeps its money state.
    let order = app.store.order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}

#[tokio::test]
async fn dispute_events_are_recorded_without_touching_settlement_state() {
    let app = TestApp::new();
    let tt = app.seed_general(2500, 100).await;
    let order = app.place_order(&tt, 1).await;
    let payment = app.pay_order(order.id).await;

    let outcome = app
        .deliver_webhook(&json!({
            "type": "dispute.opened",
            "provider_ref": payment.intent_ref,
            "dispute_ref": "mock_dp_1",
        }))
        .await;
    assert_eq!(outcome, ReconcileOutcome::Applied);
    assert_eq!(app.store.dispute_count().await, 1);

    let outcome = app
        .deliver_webhook(&json!({
            "type": "dispute.closed",
            "provider_ref": payment.intent_ref,
            "dispute_ref": "mock_dp_1",
        }))
        .await;
    assert_eq!(outcome, ReconcileOutcome::Applied);
    assert_eq!(app.store.dispute_count().await, 2);

    let order = app.store.order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}

#[tokio::test]
async fn unrecognized_event_kinds_are_ignored() {
    let app = TestApp::new();
    let outcome = app
        .deliver_webhook(&json!({"type": "payout.created"}))
        .await;
    assert_eq!(outcome, ReconcileOutcome::Ignored);
}

#[tokio::test]
async fn unknown_provider_name_is_a_validation_error() {
    let app = TestApp::new();
    let err = app
        .reconciler
        .handle("acme", "sig", b"{}")
        .await
        .unwrap_err();
    assert!(matches!(err, boxoffice::Error::Validation(_)));
}
