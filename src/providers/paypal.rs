//! `PayPal` adapter.
//!
//! Uses OAuth client-credentials for API auth and the checkout-orders API
//! for capture. Webhook verification goes through PayPal's own
//! verify-webhook-signature endpoint; the transmission headers arrive
//! bundled as a JSON object in the signature argument.

use super::{
    decimal_amount, ConfirmOutcome, ConfirmationInput, PaymentIntent, PaymentProvider,
    ProviderEvent, ProviderRefund, ProviderRefundStatus,
};
use crate::config::PayPalConfig;
use crate::error::{Error, Result};
use crate::types::{Money, Order, Payment};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// `PayPal` payment provider.
pub struct PayPalProvider {
    config: PayPalConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct CheckoutOrder {
    id: String,
    status: Option<String>,
    #[serde(default)]
    links: Vec<Link>,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnit {
    payments: Option<Payments>,
}

#[derive(Debug, Deserialize)]
struct Payments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct Capture {
    id: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    name: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerificationResponse {
    verification_status: String,
}

/// Transmission headers bundled into the webhook signature argument.
#[derive(Debug, Deserialize)]
struct TransmissionHeaders {
    transmission_id: String,
    transmission_time: String,
    transmission_sig: String,
    cert_url: String,
    auth_algo: String,
}

impl PayPalProvider {
    /// Creates the adapter.
    #[must_use]
    pub const fn new(config: PayPalConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn wire_error(error: reqwest::Error) -> Error {
        Error::provider("paypal", None, error.to_string())
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if response.status().is_success() {
            return response.json::<T>().await.map_err(Self::wire_error);
        }
        let status = response.status();
        let detail = response.json::<ApiError>().await.unwrap_or(ApiError {
            name: None,
            message: None,
        });
        Err(Error::provider(
            "paypal",
            detail.name,
            detail
                .message
                .unwrap_or_else(|| format!("request failed with status {status}")),
        ))
    }

    async fn access_token(&self) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.config.base_url))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(Self::wire_error)?;
        let token: TokenResponse = Self::decode(response).await?;
        Ok(token.access_token)
    }
}

fn resource_str(resource: &Value, pointer: &str) -> Option<String> {
    resource.pointer(pointer).and_then(Value::as_str).map(String::from)
}

/// Maps a verified webhook body into the uniform event vocabulary.
fn map_event(event: &Value) -> ProviderEvent {
    let kind = event
        .get("event_type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let resource = event.get("resource").cloned().unwrap_or(Value::Null);
    let order_ref = resource_str(&resource, "/supplementary_data/related_ids/order_id");
    let resource_id = resource_str(&resource, "/id").unwrap_or_default();

    match kind.as_str() {
        "PAYMENT.CAPTURE.COMPLETED" => ProviderEvent::PaymentCaptured {
            provider_ref: order_ref.unwrap_or_else(|| resource_id.clone()),
            captured_at: None,
            charge_ref: Some(resource_id),
        },
        "PAYMENT.CAPTURE.DENIED" => ProviderEvent::PaymentFailed {
            provider_ref: order_ref.unwrap_or_else(|| resource_id.clone()),
            code: Some("CAPTURE_DENIED".to_string()),
            message: "capture denied".to_string(),
        },
        "PAYMENT.CAPTURE.REFUNDED" => ProviderEvent::RefundSucceeded {
            provider_ref: order_ref.unwrap_or_default(),
            refund_ref: resource_id,
        },
        "CUSTOMER.DISPUTE.CREATED" => ProviderEvent::DisputeOpened {
            provider_ref: resource_str(
                &resource,
                "/disputed_transactions/0/seller_transaction_id",
            )
            .unwrap_or_default(),
            dispute_ref: resource_str(&resource, "/dispute_id").unwrap_or(resource_id),
        },
        "CUSTOMER.DISPUTE.RESOLVED" => ProviderEvent::DisputeClosed {
            provider_ref: resource_str(
                &resource,
                "/disputed_transactions/0/seller_transaction_id",
            )
            .unwrap_or_default(),
            dispute_ref: resource_str(&resource, "/dispute_id").unwrap_or(resource_id),
        },
        _ => ProviderEvent::Unrecognized { kind },
    }
}

#[async_trait]
impl PaymentProvider for PayPalProvider {
    fn name(&self) -> &'static str {
        "paypal"
    }

    async fn initialize(&self, order: &Order) -> Result<PaymentIntent> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!("{}/v2/checkout/orders", self.config.base_url))
            .bearer_auth(&token)
            .json(&json!({
                "intent": "CAPTURE",
                "purchase_units": [{
                    "reference_id": order.id.to_string(),
                    "amount": {
                        "currency_code": order.currency.as_str(),
                        "value": decimal_amount(order.total),
                    },
                }],
            }))
            .send()
            .await
            .map_err(Self::wire_error)?;
        let checkout: CheckoutOrder = Self::decode(response).await?;

        let approve_url = checkout
            .links
            .iter()
            .find(|link| link.rel == "approve" || link.rel == "payer-action")
            .map(|link| link.href.clone());
        Ok(PaymentIntent {
            buyer_payload: json!({
                "approve_url": approve_url,
                "paypal_order_id": checkout.id,
            }),
            intent_ref: checkout.id,
            charge_ref: None,
        })
    }

    async fn confirm(
        &self,
        payment: &Payment,
        input: &ConfirmationInput,
    ) -> Result<ConfirmOutcome> {
        let intent_ref = input.provider_ref.as_deref().unwrap_or(&payment.intent_ref);
        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!(
                "{}/v2/checkout/orders/{intent_ref}/capture",
                self.config.base_url
            ))
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body("{}")
            .send()
            .await
            .map_err(Self::wire_error)?;
        let checkout: CheckoutOrder = Self::decode(response).await?;

        let capture = checkout
            .purchase_units
            .first()
            .and_then(|unit| unit.payments.as_ref())
            .and_then(|payments| payments.captures.first());

        if checkout.status.as_deref() == Some("COMPLETED") {
            return Ok(ConfirmOutcome::Captured {
                captured_at: None,
                charge_ref: capture.map(|c| c.id.clone()),
            });
        }
        if let Some(capture) = capture {
            if matches!(capture.status.as_deref(), Some("DECLINED" | "FAILED")) {
                return Ok(ConfirmOutcome::Failed {
                    code: capture.status.clone(),
                    message: "capture declined".to_string(),
                });
            }
        }
        Err(Error::provider(
            "paypal",
            None,
            format!(
                "checkout order {intent_ref} not completed: {}",
                checkout.status.as_deref().unwrap_or("unknown")
            ),
        ))
    }

    async fn refund(&self, payment: &Payment, amount: Option<Money>) -> Result<ProviderRefund> {
        let Some(capture_id) = payment.charge_ref.as_deref() else {
            return Err(Error::Validation(
                "payment has no capture reference to refund".to_string(),
            ));
        };
        let token = self.access_token().await?;
        let body = amount.map_or_else(
            || json!({}),
            |amount| {
                json!({
                    "amount": {
                        "currency_code": payment.currency.as_str(),
                        "value": decimal_amount(amount),
                    },
                })
            },
        );
        let response = self
            .client
            .post(format!(
                "{}/v2/payments/captures/{capture_id}/refund",
                self.config.base_url
            ))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(Self::wire_error)?;
        let refund: RefundResponse = Self::decode(response).await?;

        let status = match refund.status.as_deref() {
            Some("COMPLETED") => ProviderRefundStatus::Completed,
            Some("PENDING") => ProviderRefundStatus::Pending,
            _ => ProviderRefundStatus::Failed,
        };
        Ok(ProviderRefund {
            amount: amount.unwrap_or(payment.amount),
            provider_ref: refund.id,
            status,
        })
    }

    async fn parse_event(&self, signature: &str, payload: &[u8]) -> Result<ProviderEvent> {
        let headers: TransmissionHeaders = serde_json::from_str(signature).map_err(|e| {
            Error::Authenticity(format!("malformed paypal transmission headers: {e}"))
        })?;
        let event: Value = serde_json::from_slice(payload)
            .map_err(|e| Error::Validation(format!("malformed paypal webhook payload: {e}")))?;

        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!(
                "{}/v1/notifications/verify-webhook-signature",
                self.config.base_url
            ))
            .bearer_auth(&token)
            .json(&json!({
                "transmission_id": headers.transmission_id,
                "transmission_time": headers.transmission_time,
                "transmission_sig": headers.transmission_sig,
                "cert_url": headers.cert_url,
                "auth_algo": headers.auth_algo,
                "webhook_id": self.config.webhook_id,
                "webhook_event": event,
            }))
            .send()
            .await
            .map_err(Self::wire_error)?;
        let verification: VerificationResponse = Self::decode(response).await?;
        if verification.verification_status != "SUCCESS" {
            return Err(Error::Authenticity(format!(
                "paypal verification returned {}",
                verification.verification_status
            )));
        }

        Ok(map_event(&event))
    }
}
