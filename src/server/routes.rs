//! Router configuration for the settlement service.

use super::health::health_check;
use super::state::AppState;
use crate::api::{orders, refunds, webhooks};
use axum::routing::{get, post};
use axum::Router;

/// Builds the complete Axum router: health, order/payment endpoints,
/// admin refund endpoints, and one webhook endpoint per provider.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Orders and payments
        .route("/orders", post(orders::create_order))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        .route("/orders/:id/payments", post(orders::initiate_payment))
        .route(
            "/orders/:id/payments/confirm",
            post(orders::process_payment),
        )
        .route("/orders/:id/tickets", get(orders::list_tickets))
        // Admin refunds
        .route("/refunds", post(refunds::create_refund))
        .route("/refunds/:id", get(refunds::get_refund))
        .route("/refunds/:id/approve", post(refunds::approve_refund))
        .route("/refunds/:id/reject", post(refunds::reject_refund))
        .route("/refunds/:id/process", post(refunds::process_refund));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        // Raw-body endpoints stay outside the JSON api nest
        .route("/webhooks/:provider", post(webhooks::receive))
        .with_state(state)
}
