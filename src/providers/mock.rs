//! In-process provider for tests and development.
//!
//! Behavior is scripted per call site: tests set what the next `confirm`
//! or `refund` should do, and webhooks are signed with a shared secret
//! using the same HMAC scheme the real networks use.

use super::{
    hmac_sha256_hex, ConfirmOutcome, ConfirmationInput, PaymentIntent, PaymentProvider,
    ProviderEvent, ProviderRefund, ProviderRefundStatus,
};
use crate::error::{Error, Result};
use crate::types::{Money, Order, Payment};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

/// What the next provider call should do.
#[derive(Clone, Debug, Default)]
pub enum MockBehavior {
    /// Report success.
    #[default]
    Succeed,
    /// Report a clean provider-side decline.
    Fail {
        /// Failure code.
        code: String,
        /// Failure message.
        message: String,
    },
    /// Error out as if the network call failed.
    Error {
        /// Error message.
        message: String,
    },
    /// Refunds only: error with the provider's "already refunded"
    /// idempotency-collision vocabulary.
    AlreadyRefunded,
    /// Refunds only: accept the refund but leave it pending settlement.
    PendingAtProvider,
}

/// Scriptable in-process payment provider.
pub struct MockProvider {
    webhook_secret: String,
    confirm_behavior: Mutex<MockBehavior>,
    refund_behavior: Mutex<MockBehavior>,
}

impl MockProvider {
    /// Creates a provider that succeeds until scripted otherwise.
    #[must_use]
    pub fn new(webhook_secret: String) -> Self {
        Self {
            webhook_secret,
            confirm_behavior: Mutex::new(MockBehavior::Succeed),
            refund_behavior: Mutex::new(MockBehavior::Succeed),
        }
    }

    /// Scripts the next `confirm` outcomes.
    pub async fn set_confirm(&self, behavior: MockBehavior) {
        *self.confirm_behavior.lock().await = behavior;
    }

    /// Scripts the next `refund` outcomes.
    pub async fn set_refund(&self, behavior: MockBehavior) {
        *self.refund_behavior.lock().await = behavior;
    }

    /// Signs a webhook payload the way this provider verifies it.
    #[must_use]
    pub fn sign(secret: &str, payload: &[u8]) -> String {
        hmac_sha256_hex(secret, payload)
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn initialize(&self, order: &Order) -> Result<PaymentIntent> {
        let intent_ref = format!("mock_int_{}", Uuid::new_v4().simple());
        Ok(PaymentIntent {
            buyer_payload: json!({
                "checkout_url": format!("https://pay.mock.invalid/{intent_ref}"),
                "amount": order.total.cents(),
                "currency": order.currency.as_str(),
            }),
            intent_ref,
            charge_ref: None,
        })
    }

    async fn confirm(
        &self,
        payment: &Payment,
        _input: &ConfirmationInput,
    ) -> Result<ConfirmOutcome> {
        match self.confirm_behavior.lock().await.clone() {
            MockBehavior::Succeed => Ok(ConfirmOutcome::Captured {
                captured_at: None,
                charge_ref: Some(format!("mock_ch_{}", payment.intent_ref)),
            }),
            MockBehavior::Fail { code, message } => Ok(ConfirmOutcome::Failed {
                code: Some(code),
                message,
            }),
            MockBehavior::Error { message } => Err(Error::provider("mock", None, message)),
            MockBehavior::AlreadyRefunded | MockBehavior::PendingAtProvider => Err(
                Error::provider("mock", None, "behavior not valid for confirm"),
            ),
        }
    }

    async fn refund(&self, payment: &Payment, amount: Option<Money>) -> Result<ProviderRefund> {
        let amount = amount.unwrap_or(payment.amount);
        let provider_ref = format!("mock_re_{}", Uuid::new_v4().simple());
        match self.refund_behavior.lock().await.clone() {
            MockBehavior::Succeed => Ok(ProviderRefund {
                amount,
                provider_ref,
                status: ProviderRefundStatus::Completed,
            }),
            MockBehavior::PendingAtProvider => Ok(ProviderRefund {
                amount,
                provider_ref,
                status: ProviderRefundStatus::Pending,
            }),
            MockBehavior::Fail { code, message } => Err(Error::provider(
                "mock",
                Some(code),
                message,
            )),
            MockBehavior::Error { message } => Err(Error::provider("mock", None, message)),
            MockBehavior::AlreadyRefunded => Err(Error::provider(
                "mock",
                Some("charge_already_refunded".to_string()),
                "charge has already been refunded",
            )),
        }
    }

    async fn parse_event(&self, signature: &str, payload: &[u8]) -> Result<ProviderEvent> {
        let expected = hmac_sha256_hex(&self.webhook_secret, payload);
        if signature != expected {
            return Err(Error::Authenticity(
                "mock webhook signature mismatch".to_string(),
            ));
        }

        let event: Value = serde_json::from_slice(payload)
            .map_err(|e| Error::Validation(format!("malformed mock webhook payload: {e}")))?;
        let field = |name: &str| {
            event
                .get(name)
                .and_then(Value::as_str)
                .map(ToString::to_string)
        };
        let provider_ref = field("provider_ref").unwrap_or_default();

        let kind = field("type").unwrap_or_default();
        Ok(match kind.as_str() {
            "payment.captured" => ProviderEvent::PaymentCaptured {
                provider_ref,
                captured_at: None,
                charge_ref: field("charge_ref"),
            },
            "payment.failed" => ProviderEvent::PaymentFailed {
                provider_ref,
                code: field("code"),
                message: field("message").unwrap_or_else(|| "payment failed".to_string()),
            },
            "refund.succeeded" => ProviderEvent::RefundSucceeded {
                provider_ref,
                refund_ref: field("refund_ref").unwrap_or_default(),
            },
            "refund.failed" => ProviderEvent::RefundFailed {
                provider_ref,
                refund_ref: field("refund_ref").unwrap_or_default(),
                message: field("message").unwrap_or_else(|| "refund failed".to_string()),
            },
            "dispute.opened" => ProviderEvent::DisputeOpened {
                provider_ref,
                dispute_ref: field("dispute_ref").unwrap_or_default(),
            },
            "dispute.closed" => ProviderEvent::DisputeClosed {
                provider_ref,
                dispute_ref: field("dispute_ref").unwrap_or_default(),
            },
            _ => ProviderEvent::Unrecognized { kind },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_bad_signature() {
        let provider = MockProvider::new("secret".to_string());
        let payload = br#"{"type":"payment.captured","provider_ref":"mock_int_1"}"#;
        let err = provider
            .parse_event("deadbeef", payload)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authenticity(_)));
    }

    #[tokio::test]
    async fn parses_signed_capture_event() {
        let provider = MockProvider::new("secret".to_string());
        let payload = br#"{"type":"payment.captured","provider_ref":"mock_int_1","charge_ref":"mock_ch_1"}"#;
        let signature = MockProvider::sign("secret", payload);
        let event = provider.parse_event(&signature, payload).await.unwrap();
        assert!(matches!(
            event,
            ProviderEvent::PaymentCaptured { provider_ref, charge_ref: Some(charge), .. }
                if provider_ref == "mock_int_1" && charge == "mock_ch_1"
        ));
    }

    #[tokio::test]
    async fn unknown_event_kind_is_unrecognized() {
        let provider = MockProvider::new("secret".to_string());
        let payload = br#"{"type":"payout.created"}"#;
        let signature = MockProvider::sign("secret", payload);
        let event = provider.parse_event(&signature, payload).await.unwrap();
        assert!(matches!(
            event,
            ProviderEvent::Unrecognized { kind } if kind == "payout.created"
        ));
    }

    #[tokio::test]
    async fn already_refunded_script_maps_to_provider_error() {
        let provider = MockProvider::new("secret".to_string());
        provider.set_refund(MockBehavior::AlreadyRefunded).await;
        let payment = Payment::new(
            crate::types::PaymentId::new(),
            crate::types::OrderId::new(),
            "mock".to_string(),
            "mock_int_1".to_string(),
            Money::from_cents(5350),
            crate::types::Currency::new("USD"),
            chrono::Utc::now(),
        );
        let err = provider.refund(&payment, None).await.unwrap_err();
        assert!(err.is_already_refunded());
    }
}
