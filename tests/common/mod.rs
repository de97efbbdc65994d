//! Shared in-process harness for integration tests.
//!
//! Wires the full settlement pipeline over the in-memory store, the
//! scriptable mock provider, a recording notifier, and a fixed clock, so
//! every test observes deterministic state without a database or network.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use boxoffice::clock::FixedClock;
use boxoffice::issuance::TicketIssuance;
use boxoffice::notifications::RecordingNotifier;
use boxoffice::orchestrator::PaymentOrchestrator;
use boxoffice::orders::{NewOrder, NewOrderItem, OrderService};
use boxoffice::providers::{ConfirmationInput, MockProvider, ProviderRegistry};
use boxoffice::reconciler::{ReconcileOutcome, WebhookReconciler};
use boxoffice::refunds::RefundManager;
use boxoffice::store::{MemoryStore, SettlementStore};
use boxoffice::types::{
    Currency, EventId, Money, Order, OrderId, OrganizationId, Payment, TicketType, TicketTypeId,
    TicketTypeKind, UserId,
};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Webhook signing secret shared with the mock provider.
pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

/// The whole pipeline, assembled the way the server assembles it.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub mock: Arc<MockProvider>,
    pub notifier: Arc<RecordingNotifier>,
    pub orders: OrderService,
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub refunds: Arc<RefundManager>,
    pub reconciler: WebhookReconciler,
}

impl TestApp {
    /// Builds the pipeline with a 7% tax rate and a fixed clock.
    pub fn new() -> Self {
        let store = MemoryStore::shared();
        let clock = FixedClock::shared(Self::now());
        let notifier = Arc::new(RecordingNotifier::new());
        let mock = Arc::new(MockProvider::new(WEBHOOK_SECRET.to_string()));
        let registry = Arc::new(ProviderRegistry::new().with(mock.clone()));

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
            Duration::from_secs(10),
        ));
        let refunds = Arc::new(RefundManager::new(
            store.clone(),
            orchestrator.clone(),
            notifier.clone(),
            clock.clone(),
        ));
        let reconciler = WebhookReconciler::new(orchestrator.clone(), refunds.clone());
        let orders = OrderService::new(store.clone(), issuance, notifier.clone(), clock, 700);

        Self {
            store,
            mock,
            notifier,
            orders,
            orchestrator,
            refunds,
            reconciler,
        }
    }

    /// The instant every fixed clock in the harness reports.
    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    /// Seeds a general-admission ticket type.
    pub async fn seed_general(&self, price_cents: u64, capacity: u32) -> TicketType {
        let ticket_type = TicketType {
            id: TicketTypeId::new(),
            event_id: EventId::new(),
            organization_id: OrganizationId::new(),
            name: "General Admission".to_string(),
            kind: TicketTypeKind::GeneralAdmission,
            capacity,
            price: Money::from_cents(price_cents),
            currency: Currency::new("USD"),
        };
        self.store.insert_ticket_type(&ticket_type).await.unwrap();
        ticket_type
    }

    /// Creates a pending order for `quantity` tickets of one type.
    pub async fn place_order(&self, ticket_type: &TicketType, quantity: u32) -> Order {
        let (order, _) = self
            .orders
            .create_order(NewOrder {
                buyer_id: UserId::new(),
                items: vec![NewOrderItem {
                    ticket_type_id: ticket_type.id,
                    seat_id: None,
                    quantity,
                }],
                discount: Money::ZERO,
            })
            .await
            .unwrap();
        order
    }

    /// Runs an order through intent creation and synchronous capture.
    pub async fn pay_order(&self, order_id: OrderId) -> Payment {
        self.orchestrator
            .create_intent(order_id, "mock")
            .await
            .unwrap();
        self.orchestrator
            .confirm(order_id, &ConfirmationInput::default())
            .await
            .unwrap()
    }

    /// Signs and delivers a mock-provider webhook payload.
    pub async fn deliver_webhook(&self, payload: &serde_json::Value) -> ReconcileOutcome {
        let body = serde_json::to_vec(payload).unwrap();
        let signature = MockProvider::sign(WEBHOOK_SECRET, &body);
        self.reconciler
            .handle("mock", &signature, &body)
            .await
            .unwrap()
    }
}
