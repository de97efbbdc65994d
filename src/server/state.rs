//! Application state for the settlement HTTP server.

use crate::clock::Clock;
use crate::config::SettlementConfig;
use crate::issuance::TicketIssuance;
use crate::notifications::SharedNotifier;
use crate::orchestrator::PaymentOrchestrator;
use crate::orders::OrderService;
use crate::providers::ProviderRegistry;
use crate::reconciler::WebhookReconciler;
use crate::refunds::RefundManager;
use crate::store::SharedStore;
use std::sync::Arc;
use std::time::Duration;

/// Shared resources for all HTTP handlers; cloned (cheaply via Arc) per
/// request.
#[derive(Clone)]
pub struct AppState {
    /// Order creation and cancellation.
    pub orders: Arc<OrderService>,
    /// Payment lifecycle.
    pub orchestrator: Arc<PaymentOrchestrator>,
    /// Refund lifecycle.
    pub refunds: Arc<RefundManager>,
    /// Webhook application.
    pub reconciler: Arc<WebhookReconciler>,
    /// Direct reads (order/refund/ticket lookups).
    pub store: SharedStore,
}

impl AppState {
    /// Wires the settlement services over one store, registry, notifier,
    /// and clock.
    #[must_use]
    pub fn build(
        settlement: &SettlementConfig,
        store: SharedStore,
        registry: Arc<ProviderRegistry>,
        notifier: SharedNotifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let issuance = Arc::new(TicketIssuance::new(
            store.clone(),
            notifier.clone(),
            clock.clone(),
        ));
        let orchestrator = Arc::new(PaymentOrchestrator::new(
            store.clone(),
            registry,
            issuance.clone(),
            notifier.clone(),
            clock.clone(),
            Duration::from_secs(settlement.provider_timeout_secs),
        ));
        let refunds = Arc::new(RefundManager::new(
            store.clone(),
            orchestrator.clone(),
            notifier.clone(),
            clock.clone(),
        ));
        let reconciler = Arc::new(WebhookReconciler::new(
            orchestrator.clone(),
            refunds.clone(),
        ));
        let orders = Arc::new(OrderService::new(
            store.clone(),
            issuance,
            notifier,
            clock,
            settlement.tax_rate_bps,
        ));

        Self {
            orders,
            orchestrator,
            refunds,
            reconciler,
            store,
        }
    }
}
