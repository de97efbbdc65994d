//! Inbound provider webhook endpoints.
//!
//! One endpoint per provider, all shaped the same: raw body plus the
//! provider's signature header(s) go to the reconciler, and the response
//! is 200 once the event is accepted — including no-ops — so the
//! provider stops retrying. Error statuses are reserved for
//! authentication failures and malformed payloads.

use super::{ApiError, ApiResult};
use crate::error::Error;
use crate::reconciler::ReconcileOutcome;
use crate::server::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use serde_json::json;

/// Webhook acknowledgement body.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    /// Always true once the event was accepted.
    pub received: bool,
    /// What the event did: "applied", "duplicate", or "ignored".
    pub outcome: &'static str,
}

const fn outcome_label(outcome: ReconcileOutcome) -> &'static str {
    match outcome {
        ReconcileOutcome::Applied => "applied",
        ReconcileOutcome::Duplicate => "duplicate",
        ReconcileOutcome::Ignored => "ignored",
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError(Error::Authenticity(format!("missing {name} header"))))
}

/// Extracts the signature material a provider sends with its webhooks.
///
/// `PayPal` spreads verification material across several transmission
/// headers; they are bundled into one JSON object for the adapter. The
/// other providers use a single signature header.
fn signature_for(provider: &str, headers: &HeaderMap) -> Result<String, ApiError> {
    match provider {
        "stripe" => Ok(header(headers, "stripe-signature")?.to_string()),
        "square" => Ok(header(headers, "x-square-hmacsha256-signature")?.to_string()),
        "mock" => Ok(header(headers, "x-mock-signature")?.to_string()),
        "paypal" => {
            let bundle = json!({
                "transmission_id": header(headers, "paypal-transmission-id")?,
                "transmission_time": header(headers, "paypal-transmission-time")?,
                "transmission_sig": header(headers, "paypal-transmission-sig")?,
                "cert_url": header(headers, "paypal-cert-url")?,
                "auth_algo": header(headers, "paypal-auth-algo")?,
            });
            Ok(bundle.to_string())
        }
        other => Err(ApiError(Error::Validation(format!(
            "unknown payment provider: {other}"
        )))),
    }
}

/// Receives one provider webhook delivery.
pub async fn receive(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let signature = signature_for(&provider, &headers)?;
    let outcome = state.reconciler.handle(&provider, &signature, &body).await?;
    Ok(Json(WebhookAck {
        received: true,
        outcome: outcome_label(outcome),
    }))
}
