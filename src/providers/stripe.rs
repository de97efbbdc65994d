//! Stripe adapter.
//!
//! Talks to the payment-intents API with form-encoded requests and
//! verifies webhooks with the `t=...,v1=...` signed-header scheme: the
//! signature is HMAC-SHA256 over `"{t}.{payload}"` and the timestamp must
//! be within a five-minute tolerance window.

use super::{
    hmac_sha256_hex, ConfirmOutcome, ConfirmationInput, PaymentIntent, PaymentProvider,
    ProviderEvent, ProviderRefund, ProviderRefundStatus,
};
use crate::clock::Clock;
use crate::config::StripeConfig;
use crate::error::{Error, Result};
use crate::types::{Money, Order, Payment};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Stripe payment provider.
pub struct StripeProvider {
    config: StripeConfig,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: Option<String>,
    status: String,
    latest_charge: Option<String>,
    last_payment_error: Option<PaymentError>,
}

#[derive(Debug, Deserialize)]
struct PaymentError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<PaymentError>,
}

impl StripeProvider {
    /// Creates the adapter.
    #[must_use]
    pub fn new(config: StripeConfig, client: reqwest::Client, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            client,
            clock,
        }
    }

    fn wire_error(error: reqwest::Error) -> Error {
        Error::provider("stripe", None, error.to_string())
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if response.status().is_success() {
            return response.json::<T>().await.map_err(Self::wire_error);
        }
        let status = response.status();
        let envelope = response
            .json::<ErrorEnvelope>()
            .await
            .unwrap_or(ErrorEnvelope { error: None });
        let detail = envelope.error.unwrap_or(PaymentError {
            code: None,
            message: None,
        });
        Err(Error::provider(
            "stripe",
            detail.code,
            detail
                .message
                .unwrap_or_else(|| format!("request failed with status {status}")),
        ))
    }

    /// Checks the signature header against the raw payload and returns
    /// the verified timestamp-prefixed body's JSON.
    fn verify(&self, signature: &str, payload: &[u8]) -> Result<Value> {
        let mut timestamp: Option<i64> = None;
        let mut candidates: Vec<&str> = Vec::new();
        for part in signature.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let Some(timestamp) = timestamp else {
            return Err(Error::Authenticity(
                "stripe signature header missing timestamp".to_string(),
            ));
        };
        if candidates.is_empty() {
            return Err(Error::Authenticity(
                "stripe signature header missing v1 signature".to_string(),
            ));
        }
        if (self.clock.now().timestamp() - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
            return Err(Error::Authenticity(
                "stripe signature timestamp outside tolerance".to_string(),
            ));
        }

        let mut signed = timestamp.to_string().into_bytes();
        signed.push(b'.');
        signed.extend_from_slice(payload);
        let expected = hmac_sha256_hex(&self.config.webhook_secret, &signed);
        if !candidates.iter().any(|candidate| *candidate == expected) {
            return Err(Error::Authenticity(
                "stripe signature mismatch".to_string(),
            ));
        }

        serde_json::from_slice(payload)
            .map_err(|e| Error::Validation(format!("malformed stripe webhook payload: {e}")))
    }
}

fn object_str(object: &Value, field: &str) -> Option<String> {
    object.get(field).and_then(Value::as_str).map(String::from)
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn initialize(&self, order: &Order) -> Result<PaymentIntent> {
        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.config.base_url))
            .bearer_auth(&self.config.secret_key)
            .form(&[
                ("amount", order.total.cents().to_string()),
                ("currency", order.currency.as_str().to_ascii_lowercase()),
                ("metadata[order_id]", order.id.to_string()),
                ("automatic_payment_methods[enabled]", "true".to_string()),
            ])
            .send()
            .await
            .map_err(Self::wire_error)?;
        let intent: IntentResponse = Self::decode(response).await?;

        Ok(PaymentIntent {
            buyer_payload: serde_json::json!({
                "client_secret": intent.client_secret,
            }),
            intent_ref: intent.id,
            charge_ref: intent.latest_charge,
        })
    }

    async fn confirm(
        &self,
        payment: &Payment,
        input: &ConfirmationInput,
    ) -> Result<ConfirmOutcome> {
        let intent_ref = input.provider_ref.as_deref().unwrap_or(&payment.intent_ref);
        let response = self
            .client
            .get(format!(
                "{}/v1/payment_intents/{intent_ref}",
                self.config.base_url
            ))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(Self::wire_error)?;
        let intent: IntentResponse = Self::decode(response).await?;

        match intent.status.as_str() {
            "succeeded" => Ok(ConfirmOutcome::Captured {
                captured_at: None,
                charge_ref: intent.latest_charge,
            }),
            "canceled" => {
                let detail = intent.last_payment_error.unwrap_or(PaymentError {
                    code: None,
                    message: None,
                });
                Ok(ConfirmOutcome::Failed {
                    code: detail.code,
                    message: detail
                        .message
                        .unwrap_or_else(|| "payment intent canceled".to_string()),
                })
            }
            // requires_* and processing: not done yet, leave the payment
            // in requires_action for a later retry or webhook.
            other => Err(Error::provider(
                "stripe",
                None,
                format!("payment intent {intent_ref} not completed: {other}"),
            )),
        }
    }

    async fn refund(&self, payment: &Payment, amount: Option<Money>) -> Result<ProviderRefund> {
        let mut form = vec![("payment_intent", payment.intent_ref.clone())];
        if let Some(amount) = amount {
            form.push(("amount", amount.cents().to_string()));
        }
        let response = self
            .client
            .post(format!("{}/v1/refunds", self.config.base_url))
            .bearer_auth(&self.config.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(Self::wire_error)?;
        let refund: RefundResponse = Self::decode(response).await?;

        let status = match refund.status.as_str() {
            "succeeded" => ProviderRefundStatus::Completed,
            "pending" | "requires_action" => ProviderRefundStatus::Pending,
            _ => ProviderRefundStatus::Failed,
        };
        Ok(ProviderRefund {
            amount: amount.unwrap_or(payment.amount),
            provider_ref: refund.id,
            status,
        })
    }

    async fn parse_event(&self, signature: &str, payload: &[u8]) -> Result<ProviderEvent> {
        let event = self.verify(signature, payload)?;
        let kind = event
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let object = event
            .pointer("/data/object")
            .cloned()
            .unwrap_or(Value::Null);

        Ok(match kind.as_str() {
            "payment_intent.succeeded" => ProviderEvent::PaymentCaptured {
                provider_ref: object_str(&object, "id").unwrap_or_default(),
                captured_at: None,
                charge_ref: object_str(&object, "latest_charge"),
            },
            "payment_intent.payment_failed" => {
                let detail = object.get("last_payment_error").cloned().unwrap_or(Value::Null);
                ProviderEvent::PaymentFailed {
                    provider_ref: object_str(&object, "id").unwrap_or_default(),
                    code: object_str(&detail, "code"),
                    message: object_str(&detail, "message")
                        .unwrap_or_else(|| "payment failed".to_string()),
                }
            }
            "refund.updated" | "refund.failed" => {
                let provider_ref = object_str(&object, "payment_intent")
                    .or_else(|| object_str(&object, "charge"))
                    .unwrap_or_default();
                let refund_ref = object_str(&object, "id").unwrap_or_default();
                match object_str(&object, "status").as_deref() {
                    Some("succeeded") => ProviderEvent::RefundSucceeded {
                        provider_ref,
                        refund_ref,
                    },
                    Some("failed" | "canceled") => ProviderEvent::RefundFailed {
                        provider_ref,
                        refund_ref,
                        message: object_str(&object, "failure_reason")
                            .unwrap_or_else(|| "refund failed".to_string()),
                    },
                    _ => ProviderEvent::Unrecognized { kind },
                }
            }
            "charge.dispute.created" => ProviderEvent::DisputeOpened {
                provider_ref: object_str(&object, "payment_intent")
                    .or_else(|| object_str(&object, "charge"))
                    .unwrap_or_default(),
                dispute_ref: object_str(&object, "id").unwrap_or_default(),
            },
            "charge.dispute.closed" => ProviderEvent::DisputeClosed {
                provider_ref: object_str(&object, "payment_intent")
                    .or_else(|| object_str(&object, "charge"))
                    .unwrap_or_default(),
                dispute_ref: object_str(&object, "id").unwrap_or_default(),
            },
            _ => ProviderEvent::Unrecognized { kind },
        })
    }
}
