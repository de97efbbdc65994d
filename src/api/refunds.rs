//! Admin refund endpoints.
//!
//! - POST /api/refunds - create a refund request
//! - GET /api/refunds/:id - fetch a refund
//! - POST /api/refunds/:id/approve - approve a pending refund
//! - POST /api/refunds/:id/reject - reject a pending refund
//! - POST /api/refunds/:id/process - execute the refund at the provider

use super::{ApiError, ApiResult};
use crate::server::state::AppState;
use crate::types::{Currency, Money, OrderId, Refund, RefundId, UserId};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

/// Request to create a refund.
#[derive(Debug, Deserialize)]
pub struct CreateRefundRequest {
    /// Order to refund.
    pub order_id: OrderId,
    /// Amount to return, in cents.
    pub amount: Money,
    /// Must match the order's currency.
    pub currency: Currency,
    /// Why the refund was requested.
    pub reason: String,
    /// Operator or system actor creating the request.
    pub created_by: UserId,
}

/// Creates a refund request against a paid order.
pub async fn create_refund(
    State(state): State<AppState>,
    Json(request): Json<CreateRefundRequest>,
) -> ApiResult<(StatusCode, Json<Refund>)> {
    let refund = state
        .refunds
        .create(
            request.order_id,
            request.amount,
            &request.currency,
            request.reason,
            request.created_by,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(refund)))
}

/// Fetches a refund.
pub async fn get_refund(
    State(state): State<AppState>,
    Path(refund_id): Path<RefundId>,
) -> ApiResult<Json<Refund>> {
    let refund = state
        .store
        .refund(refund_id)
        .await
        .map_err(ApiError)?
        .ok_or_else(|| ApiError(crate::Error::not_found("refund", refund_id)))?;
    Ok(Json(refund))
}

/// Approves a pending refund.
pub async fn approve_refund(
    State(state): State<AppState>,
    Path(refund_id): Path<RefundId>,
) -> ApiResult<Json<Refund>> {
    Ok(Json(state.refunds.approve(refund_id).await?))
}

/// Request to reject a refund.
#[derive(Debug, Deserialize)]
pub struct RejectRefundRequest {
    /// Operator's reason, recorded on the refund.
    pub reason: String,
}

/// Rejects a pending refund.
pub async fn reject_refund(
    State(state): State<AppState>,
    Path(refund_id): Path<RefundId>,
    Json(request): Json<RejectRefundRequest>,
) -> ApiResult<Json<Refund>> {
    Ok(Json(
        state.refunds.reject(refund_id, &request.reason).await?,
    ))
}

/// Request to process a refund.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessRefundRequest {
    /// Re-run a refund that is already processed.
    #[serde(default)]
    pub force: bool,
}

/// Executes the refund at the provider and records the outcome.
pub async fn process_refund(
    State(state): State<AppState>,
    Path(refund_id): Path<RefundId>,
    Json(request): Json<ProcessRefundRequest>,
) -> ApiResult<Json<Refund>> {
    Ok(Json(
        state.refunds.process(refund_id, request.force).await?,
    ))
}
