//! Order and payment endpoints.
//!
//! - POST /api/orders - create an order
//! - GET /api/orders/:id - fetch an order with items
//! - POST /api/orders/:id/cancel - cancel a pending order
//! - POST /api/orders/:id/payments - initiate a payment intent
//! - POST /api/orders/:id/payments/confirm - process/confirm a payment
//! - GET /api/orders/:id/tickets - list issued tickets

use super::{ApiError, ApiResult};
use crate::orders::NewOrder;
use crate::providers::ConfirmationInput;
use crate::server::state::AppState;
use crate::types::{Order, OrderId, OrderItem, Payment, Ticket};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An order with its immutable item snapshot.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    /// The order.
    #[serde(flatten)]
    pub order: Order,
    /// Its items.
    pub items: Vec<OrderItem>,
}

/// Creates an order; free orders come back already paid.
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<NewOrder>,
) -> ApiResult<(StatusCode, Json<OrderResponse>)> {
    let (order, items) = state.orders.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse { order, items })))
}

/// Fetches an order with its items.
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> ApiResult<Json<OrderResponse>> {
    let order = state
        .store
        .order(order_id)
        .await
        .map_err(ApiError)?
        .ok_or_else(|| ApiError(crate::Error::not_found("order", order_id)))?;
    let items = state.store.order_items(order_id).await.map_err(ApiError)?;
    Ok(Json(OrderResponse { order, items }))
}

/// Cancels a pending order.
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.orders.cancel_order(order_id).await?))
}

/// Request to initiate a payment.
#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    /// Provider registry key ("stripe", "paypal", "square", "mock").
    pub provider: String,
}

/// The new payment plus the provider's buyer-facing payload, verbatim.
#[derive(Debug, Serialize)]
pub struct InitiatePaymentResponse {
    /// The payment row.
    pub payment: Payment,
    /// Redirect URL / client secret / checkout link, provider-shaped.
    pub buyer_payload: Value,
}

/// Creates a provider intent and payment row for a pending order.
pub async fn initiate_payment(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    Json(request): Json<InitiatePaymentRequest>,
) -> ApiResult<(StatusCode, Json<InitiatePaymentResponse>)> {
    let (payment, buyer_payload) = state
        .orchestrator
        .create_intent(order_id, &request.provider)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(InitiatePaymentResponse {
            payment,
            buyer_payload,
        }),
    ))
}

/// Request to confirm a payment.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessPaymentRequest {
    /// Provider intent/charge reference selecting a specific payment.
    pub provider_ref: Option<String>,
    /// Provider-specific confirmation detail.
    pub detail: Option<String>,
}

/// Confirms the payment with its provider and applies the outcome.
pub async fn process_payment(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    Json(request): Json<ProcessPaymentRequest>,
) -> ApiResult<Json<Payment>> {
    let input = ConfirmationInput {
        provider_ref: request.provider_ref,
        detail: request.detail,
    };
    Ok(Json(state.orchestrator.confirm(order_id, &input).await?))
}

/// Lists the tickets issued from an order.
pub async fn list_tickets(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> ApiResult<Json<Vec<Ticket>>> {
    Ok(Json(
        state
            .store
            .tickets_for_order(order_id)
            .await
            .map_err(ApiError)?,
    ))
}
