//! Square adapter.
//!
//! Payment links for checkout, the payments API for confirmation, and the
//! refunds API for money-back. Webhooks are signed with base64 HMAC-SHA256
//! over the registered notification URL concatenated with the raw body.

use super::{
    hmac_sha256_base64, ConfirmOutcome, ConfirmationInput, PaymentIntent, PaymentProvider,
    ProviderEvent, ProviderRefund, ProviderRefundStatus,
};
use crate::config::SquareConfig;
use crate::error::{Error, Result};
use crate::types::{Money, Order, Payment};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

/// Square payment provider.
pub struct SquareProvider {
    config: SquareConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct PaymentLinkEnvelope {
    payment_link: PaymentLink,
}

#[derive(Debug, Deserialize)]
struct PaymentLink {
    url: String,
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct PaymentEnvelope {
    payment: SquarePayment,
}

#[derive(Debug, Deserialize)]
struct SquarePayment {
    id: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundEnvelope {
    refund: SquareRefund,
}

#[derive(Debug, Deserialize)]
struct SquareRefund {
    id: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<String>,
    detail: Option<String>,
}

impl SquareProvider {
    /// Creates the adapter.
    #[must_use]
    pub const fn new(config: SquareConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn wire_error(error: reqwest::Error) -> Error {
        Error::provider("square", None, error.to_string())
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if response.status().is_success() {
            return response.json::<T>().await.map_err(Self::wire_error);
        }
        let status = response.status();
        let envelope = response
            .json::<ErrorEnvelope>()
            .await
            .unwrap_or(ErrorEnvelope { errors: Vec::new() });
        let first = envelope.errors.into_iter().next().unwrap_or(ApiError {
            code: None,
            detail: None,
        });
        Err(Error::provider(
            "square",
            first.code,
            first
                .detail
                .unwrap_or_else(|| format!("request failed with status {status}")),
        ))
    }
}

/// Maps a verified webhook body into the uniform event vocabulary.
fn map_event(event: &Value) -> ProviderEvent {
    let kind = event
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match kind.as_str() {
        "payment.updated" => {
            let payment = event.pointer("/data/object/payment").cloned().unwrap_or(Value::Null);
            let order_id = payment
                .get("order_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let payment_id = payment
                .get("id")
                .and_then(Value::as_str)
                .map(String::from);
            match payment.get("status").and_then(Value::as_str) {
                Some("COMPLETED") => ProviderEvent::PaymentCaptured {
                    provider_ref: order_id,
                    captured_at: None,
                    charge_ref: payment_id,
                },
                Some("FAILED" | "CANCELED") => ProviderEvent::PaymentFailed {
                    provider_ref: order_id,
                    code: payment
                        .get("status")
                        .and_then(Value::as_str)
                        .map(String::from),
                    message: "payment did not complete".to_string(),
                },
                _ => ProviderEvent::Unrecognized { kind },
            }
        }
        "refund.updated" => {
            let refund = event.pointer("/data/object/refund").cloned().unwrap_or(Value::Null);
            let payment_id = refund
                .get("payment_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let refund_id = refund
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            match refund.get("status").and_then(Value::as_str) {
                Some("COMPLETED") => ProviderEvent::RefundSucceeded {
                    provider_ref: payment_id,
                    refund_ref: refund_id,
                },
                Some("REJECTED" | "FAILED") => ProviderEvent::RefundFailed {
                    provider_ref: payment_id,
                    refund_ref: refund_id,
                    message: "refund rejected".to_string(),
                },
                _ => ProviderEvent::Unrecognized { kind },
            }
        }
        "dispute.created" | "dispute.state.updated" => {
            let dispute = event.pointer("/data/object/dispute").cloned().unwrap_or(Value::Null);
            let provider_ref = dispute
                .pointer("/disputed_payment/payment_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let dispute_ref = dispute
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let state = dispute.get("state").and_then(Value::as_str).unwrap_or("");
            if kind == "dispute.created" {
                ProviderEvent::DisputeOpened {
                    provider_ref,
                    dispute_ref,
                }
            } else if matches!(state, "WON" | "LOST" | "ACCEPTED") {
                ProviderEvent::DisputeClosed {
                    provider_ref,
                    dispute_ref,
                }
            } else {
                ProviderEvent::Unrecognized { kind }
            }
        }
        _ => ProviderEvent::Unrecognized { kind },
    }
}

#[async_trait]
impl PaymentProvider for SquareProvider {
    fn name(&self) -> &'static str {
        "square"
    }

    async fn initialize(&self, order: &Order) -> Result<PaymentIntent> {
        let response = self
            .client
            .post(format!(
                "{}/v2/online-checkout/payment-links",
                self.config.base_url
            ))
            .bearer_auth(&self.config.access_token)
            .json(&json!({
                "idempotency_key": order.id.to_string(),
                "quick_pay": {
                    "name": format!("Order {}", order.id),
                    "price_money": {
                        "amount": order.total.cents(),
                        "currency": order.currency.as_str(),
                    },
                    "location_id": self.config.location_id,
                },
            }))
            .send()
            .await
            .map_err(Self::wire_error)?;
        let envelope: PaymentLinkEnvelope = Self::decode(response).await?;

        Ok(PaymentIntent {
            buyer_payload: json!({
                "checkout_url": envelope.payment_link.url,
            }),
            // Square payments carry the checkout order id, which is the
            // stable correlation key between link, confirm, and webhook.
            intent_ref: envelope.payment_link.order_id,
            charge_ref: None,
        })
    }

    async fn confirm(
        &self,
        payment: &Payment,
        input: &ConfirmationInput,
    ) -> Result<ConfirmOutcome> {
        // The buyer-side completion callback carries the Square payment
        // id; without it there is nothing to look up yet.
        let Some(payment_id) = input.detail.as_deref() else {
            return Err(Error::provider(
                "square",
                None,
                format!(
                    "no square payment id supplied for order {}",
                    payment.order_id
                ),
            ));
        };
        let response = self
            .client
            .get(format!("{}/v2/payments/{payment_id}", self.config.base_url))
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(Self::wire_error)?;
        let envelope: PaymentEnvelope = Self::decode(response).await?;

        match envelope.payment.status.as_deref() {
            Some("COMPLETED") => Ok(ConfirmOutcome::Captured {
                captured_at: None,
                charge_ref: Some(envelope.payment.id),
            }),
            Some("FAILED" | "CANCELED") => Ok(ConfirmOutcome::Failed {
                code: envelope.payment.status,
                message: "payment did not complete".to_string(),
            }),
            other => Err(Error::provider(
                "square",
                None,
                format!(
                    "payment {payment_id} not completed: {}",
                    other.unwrap_or("unknown")
                ),
            )),
        }
    }

    async fn refund(&self, payment: &Payment, amount: Option<Money>) -> Result<ProviderRefund> {
        let Some(payment_id) = payment.charge_ref.as_deref() else {
            return Err(Error::Validation(
                "payment has no square payment id to refund".to_string(),
            ));
        };
        let amount = amount.unwrap_or(payment.amount);
        let response = self
            .client
            .post(format!("{}/v2/refunds", self.config.base_url))
            .bearer_auth(&self.config.access_token)
            .json(&json!({
                "idempotency_key": Uuid::new_v4().to_string(),
                "payment_id": payment_id,
                "amount_money": {
                    "amount": amount.cents(),
                    "currency": payment.currency.as_str(),
                },
            }))
            .send()
            .await
            .map_err(Self::wire_error)?;
        let envelope: RefundEnvelope = Self::decode(response).await?;

        let status = match envelope.refund.status.as_deref() {
            Some("COMPLETED") => ProviderRefundStatus::Completed,
            Some("PENDING") => ProviderRefundStatus::Pending,
            _ => ProviderRefundStatus::Failed,
        };
        Ok(ProviderRefund {
            amount,
            provider_ref: envelope.refund.id,
            status,
        })
    }

    async fn parse_event(&self, signature: &str, payload: &[u8]) -> Result<ProviderEvent> {
        let mut signed = self.config.notification_url.clone().into_bytes();
        signed.extend_from_slice(payload);
        let expected = hmac_sha256_base64(&self.config.webhook_signature_key, &signed);
        if signature != expected {
            return Err(Error::Authenticity(
                "square webhook signature mismatch".to_string(),
            ));
        }

        let event: Value = serde_json::from_slice(payload)
            .map_err(|e| Error::Validation(format!("malformed square webhook payload: {e}")))?;
        Ok(map_event(&event))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn provider() -> SquareProvider {
        SquareProvider::new(
            SquareConfig {
                base_url: "https://connect.square.invalid".to_string(),
                access_token: "token".to_string(),
                webhook_signature_key: "sig-key".to_string(),
                notification_url: "https://boxoffice.example/webhooks/square".to_string(),
                location_id: "L1".to_string(),
            },
            reqwest::Client::new(),
        )
    }

    fn sign(payload: &[u8]) -> String {
        let mut signed = b"https://boxoffice.example/webhooks/square".to_vec();
        signed.extend_from_slice(payload);
        hmac_sha256_base64("sig-key", &signed)
    }

    #[tokio::test]
    async fn verifies_url_plus_body_signature() {
        let payload = br#"{"type":"payment.updated","data":{"object":{"payment":{"id":"PAY-1","order_id":"SQORD-1","status":"COMPLETED"}}}}"#;
        let event = provider()
            .parse_event(&sign(payload), payload)
            .await
            .unwrap();
        assert!(matches!(
            event,
            ProviderEvent::PaymentCaptured { provider_ref, charge_ref: Some(charge), .. }
                if provider_ref == "SQORD-1" && charge == "PAY-1"
        ));
    }

    #[tokio::test]
    async fn rejects_signature_for_different_body() {
        let payload = br#"{"type":"payment.updated"}"#;
        let err = provider()
            .parse_event(&sign(br#"{"type":"other"}"#), payload)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authenticity(_)));
    }

    #[test]
    fn maps_refund_rejection() {
        let event = serde_json::json!({
            "type": "refund.updated",
            "data": {"object": {"refund": {
                "id": "RF-1", "payment_id": "PAY-1", "status": "REJECTED",
            }}},
        });
        assert!(matches!(
            map_event(&event),
            ProviderEvent::RefundFailed { refund_ref, .. } if refund_ref == "RF-1"
        ));
    }

    #[test]
    fn in_progress_refund_update_is_unrecognized() {
        let event = serde_json::json!({
            "type": "refund.updated",
            "data": {"object": {"refund": {
                "id": "RF-1", "payment_id": "PAY-1", "status": "PENDING",
            }}},
        });
        assert!(matches!(
            map_event(&event),
            ProviderEvent::Unrecognized { .. }
        ));
    }

    #[test]
    fn dispute_lifecycle_mapping() {
        let created = serde_json::json!({
            "type": "dispute.created",
            "data": {"object": {"dispute": {
                "id": "DSP-1",
                "state": "EVIDENCE_REQUIRED",
                "disputed_payment": {"payment_id": "PAY-1"},
            }}},
        });
        assert!(matches!(
            map_event(&created),
            ProviderEvent::DisputeOpened { dispute_ref, .. } if dispute_ref == "DSP-1"
        ));

        let resolved = serde_json::json!({
            "type": "dispute.state.updated",
            "data": {"object": {"dispute": {
                "id": "DSP-1",
                "state": "WON",
                "disputed_payment": {"payment_id": "PAY-1"},
            }}},
        });
        assert!(matches!(
            map_event(&resolved),
            ProviderEvent::DisputeClosed { .. }
        ));
    }
}
