//! Payment orchestrator: owns the payment lifecycle.
//!
//! Per payment the state machine is `requires_action -> captured`
//! (terminal success) or `requires_action -> failed` (terminal; a fresh
//! payment may be created to retry). The capture transition is applied
//! through the store's conditional update so a synchronous confirm racing
//! a webhook produces exactly one winner.

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::issuance::TicketIssuance;
use crate::notifications::{notify, SharedNotifier};
use crate::providers::{
    ConfirmOutcome, ConfirmationInput, ProviderRefund, ProviderRegistry, SharedProvider,
};
use crate::store::SharedStore;
use crate::types::{Money, Order, OrderId, OrderStatus, Payment, PaymentId, PaymentStatus};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Drives payments from intent to capture or failure.
pub struct PaymentOrchestrator {
    store: SharedStore,
    registry: Arc<ProviderRegistry>,
    issuance: Arc<TicketIssuance>,
    notifier: SharedNotifier,
    clock: Arc<dyn Clock>,
    provider_timeout: Duration,
}

impl PaymentOrchestrator {
    /// Creates the orchestrator.
    #[must_use]
    pub fn new(
        store: SharedStore,
        registry: Arc<ProviderRegistry>,
        issuance: Arc<TicketIssuance>,
        notifier: SharedNotifier,
        clock: Arc<dyn Clock>,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            issuance,
            notifier,
            clock,
            provider_timeout,
        }
    }

    /// Bounds an outbound provider call so one slow network cannot stall
    /// the pipeline. A timed-out confirm leaves the payment in
    /// `requires_action` for a later retry or webhook-driven resolution.
    async fn bounded<T>(
        &self,
        provider: &str,
        call: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        tokio::time::timeout(self.provider_timeout, call)
            .await
            .map_err(|_| Error::provider(provider, None, "provider call timed out"))?
    }

    async fn order_for_payment(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .order(order_id)
            .await?
            .ok_or_else(|| Error::not_found("order", order_id))
    }

    /// Creates a provider intent and a new payment row for a pending
    /// order; returns the payment and the provider's buyer-facing payload
    /// verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] unless the order is pending, and
    /// [`Error::Validation`] for free orders or an unknown provider.
    pub async fn create_intent(
        &self,
        order_id: OrderId,
        provider_name: &str,
    ) -> Result<(Payment, Value)> {
        let order = self.order_for_payment(order_id).await?;
        if order.status != OrderStatus::Pending {
            return Err(Error::Conflict(format!(
                "payments can only be initiated for pending orders; order {order_id} is {}",
                order.status.as_str()
            )));
        }
        if order.total.is_zero() {
            return Err(Error::Validation(
                "free orders settle without a payment".to_string(),
            ));
        }

        let provider = self.registry.get(provider_name)?;
        let intent = self
            .bounded(provider_name, provider.initialize(&order))
            .await?;

        let mut payment = Payment::new(
            PaymentId::new(),
            order_id,
            provider.name().to_string(),
            intent.intent_ref,
            order.total,
            order.currency.clone(),
            self.clock.now(),
        );
        payment.charge_ref = intent.charge_ref;
        self.store.insert_payment(&payment).await?;
        info!(%order_id, payment_id = %payment.id, provider = provider.name(), "payment intent created");

        Ok((payment, intent.buyer_payload))
    }

    /// Resolves the target payment for a confirmation: a supplied
    /// provider reference selects its specific payment (retries can leave
    /// several rows per order); otherwise the most recent payment wins.
    async fn resolve_payment(
        &self,
        order_id: OrderId,
        input: &ConfirmationInput,
    ) -> Result<Payment> {
        let payment = match input.provider_ref.as_deref() {
            Some(provider_ref) => {
                self.store
                    .payment_for_order_by_ref(order_id, provider_ref)
                    .await?
            }
            None => self.store.latest_payment_for_order(order_id).await?,
        };
        payment.ok_or_else(|| Error::not_found("payment", order_id))
    }

    /// Confirms a payment with its provider and applies the outcome.
    ///
    /// Re-confirming an already-captured payment is an idempotent no-op
    /// that re-runs ticket issuance as a repair path. A provider error
    /// (including timeout) leaves the payment in `requires_action`.
    ///
    /// # Errors
    ///
    /// Surfaces provider errors unchanged; the caller owns retry policy.
    pub async fn confirm(&self, order_id: OrderId, input: &ConfirmationInput) -> Result<Payment> {
        let payment = self.resolve_payment(order_id, input).await?;
        match payment.status {
            PaymentStatus::Captured => {
                if let Err(issue_error) = self.issuance.ensure_tickets_for_order(order_id).await {
                    error!(%order_id, error = %issue_error, "issuance repair failed");
                }
                return Ok(payment);
            }
            PaymentStatus::Failed => {
                return Err(Error::Conflict(format!(
                    "payment {} already failed; initiate a new payment",
                    payment.id
                )));
            }
            PaymentStatus::RequiresAction => {}
        }

        let provider = self.registry.get(&payment.provider)?;
        let outcome = self
            .bounded(&payment.provider, provider.confirm(&payment, input))
            .await?;

        match outcome {
            ConfirmOutcome::Captured {
                captured_at,
                charge_ref,
            } => {
                let captured_at = captured_at.unwrap_or_else(|| self.clock.now());
                self.apply_capture(&payment, captured_at, charge_ref.as_deref())
                    .await?;
            }
            ConfirmOutcome::Failed { code, message } => {
                let applied = self
                    .store
                    .fail_payment(payment.id, code.as_deref(), &message)
                    .await?;
                if applied {
                    warn!(payment_id = %payment.id, %message, "payment failed");
                }
            }
        }

        self.store
            .payment(payment.id)
            .await?
            .ok_or_else(|| Error::not_found("payment", payment.id))
    }

    /// Applies the capture transition: payment captured and order paid
    /// commit together, then issuance and the confirmation notification
    /// fire. Returns whether this caller won the transition; a racing
    /// confirm or webhook that lost observes `false` and changes nothing.
    ///
    /// Issuance and notification failures are logged, never propagated:
    /// the captured money is already committed and a retried trigger will
    /// repair the tickets.
    pub(crate) async fn apply_capture(
        &self,
        payment: &Payment,
        captured_at: DateTime<Utc>,
        charge_ref: Option<&str>,
    ) -> Result<bool> {
        let applied = self
            .store
            .settle_payment(payment.id, payment.order_id, captured_at, charge_ref)
            .await?;
        if !applied {
            return Ok(false);
        }

        info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            provider = %payment.provider,
            "payment captured"
        );
        notify(
            self.notifier.order_confirmed(payment.order_id),
            "order_confirmed",
        )
        .await;
        if let Err(issue_error) = self
            .issuance
            .ensure_tickets_for_order(payment.order_id)
            .await
        {
            error!(
                order_id = %payment.order_id,
                error = %issue_error,
                "ticket issuance failed after capture; a retried trigger will repair"
            );
        }
        Ok(true)
    }

    /// Asks the provider to refund a captured payment. Owns only the
    /// provider conversation; refund rows belong to the refund lifecycle
    /// manager.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] unless the payment is captured.
    pub async fn refund_captured_payment(
        &self,
        payment_id: PaymentId,
        amount: Option<Money>,
    ) -> Result<ProviderRefund> {
        let payment = self
            .store
            .payment(payment_id)
            .await?
            .ok_or_else(|| Error::not_found("payment", payment_id))?;
        if payment.status != PaymentStatus::Captured {
            return Err(Error::Conflict(format!(
                "only captured payments can be refunded; payment {payment_id} is {}",
                payment.status.as_str()
            )));
        }

        let provider = self.registry.get(&payment.provider)?;
        self.bounded(&payment.provider, provider.refund(&payment, amount))
            .await
    }

    /// Looks up a registered provider (used by the reconciler).
    pub(crate) fn provider(&self, name: &str) -> Result<SharedProvider> {
        self.registry.get(name)
    }

    /// The store this orchestrator mutates (shared with the reconciler).
    pub(crate) fn store(&self) -> &SharedStore {
        &self.store
    }

    /// The clock stamping transitions.
    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::notifications::RecordingNotifier;
    use crate::providers::{MockBehavior, MockProvider};
    use crate::store::{MemoryStore, SettlementStore};
    use crate::types::{
        Currency, EventId, Money, Order, OrderItem, OrderItemId, OrganizationId, TicketTypeId,
        UserId,
    };
    use chrono::{TimeZone, Utc};

    struct Fixture {
        store: Arc<MemoryStore>,
        mock: Arc<MockProvider>,
        orchestrator: PaymentOrchestrator,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::shared();
        let clock = FixedClock::shared(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
        let notifier = Arc::new(RecordingNotifier::new());
        let mock = Arc::new(MockProvider::new("secret".to_string()));
        let registry = Arc::new(ProviderRegistry::new().with(mock.clone()));
        let issuance = Arc::new(TicketIssuance::new(
            store.clone(),
            notifier.clone(),
            clock.clone(),
        ));
        let orchestrator = PaymentOrchestrator::new(
            store.clone(),
            registry,
            issuance,
            notifier,
            clock,
            Duration::from_secs(10),
        );
        Fixture {
            store,
            mock,
            orchestrator,
        }
    }

    async fn pending_order(store: &MemoryStore) -> Order {
        let order = Order {
            id: OrderId::new(),
            buyer_id: UserId::new(),
            organization_id: OrganizationId::new(),
            event_id: EventId::new(),
            status: OrderStatus::Pending,
            subtotal: Money::from_cents(5000),
            fees: Money::ZERO,
            tax: Money::from_cents(350),
            discount: Money::ZERO,
            total: Money::from_cents(5350),
            currency: Currency::new("USD"),
            created_at: Utc::now(),
            paid_at: None,
            canceled_at: None,
        };
        let item = OrderItem {
            id: OrderItemId::new(),
            order_id: order.id,
            ticket_type_id: TicketTypeId::new(),
            seat_id: None,
            quantity: 2,
            unit_price: Money::from_cents(2500),
            unit_fee: Money::ZERO,
        };
        store.insert_order(&order, &[item]).await.unwrap();
        order
    }

    #[tokio::test]
    async fn intent_then_confirm_settles_order_and_issues_tickets() {
        let f = fixture();
        let order = pending_order(&f.store).await;

        let (payment, payload) = f
            .orchestrator
            .create_intent(order.id, "mock")
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::RequiresAction);
        assert!(payload.get("checkout_url").is_some());

        let confirmed = f
            .orchestrator
            .confirm(order.id, &ConfirmationInput::default())
            .await
            .unwrap();
        assert_eq!(confirmed.status, PaymentStatus::Captured);
        assert!(confirmed.charge_ref.is_some());

        let order = f.store.order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert!(order.paid_at.is_some());
        assert_eq!(f.store.tickets_for_order(order.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reconfirm_is_a_noop_with_no_duplicate_tickets() {
        let f = fixture();
        let order = pending_order(&f.store).await;
        f.orchestrator.create_intent(order.id, "mock").await.unwrap();
        f.orchestrator
            .confirm(order.id, &ConfirmationInput::default())
            .await
            .unwrap();

        let again = f
            .orchestrator
            .confirm(order.id, &ConfirmationInput::default())
            .await
            .unwrap();
        assert_eq!(again.status, PaymentStatus::Captured);
        assert_eq!(f.store.tickets_for_order(order.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn declined_confirm_fails_payment_but_not_order() {
        let f = fixture();
        let order = pending_order(&f.store).await;
        f.orchestrator.create_intent(order.id, "mock").await.unwrap();
        f.mock
            .set_confirm(MockBehavior::Fail {
                code: "card_declined".to_string(),
                message: "card declined".to_string(),
            })
            .await;

        let payment = f
            .orchestrator
            .confirm(order.id, &ConfirmationInput::default())
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.failure_code.as_deref(), Some("card_declined"));

        let order = f.store.order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn provider_error_leaves_payment_pending_for_retry() {
        let f = fixture();
        let order = pending_order(&f.store).await;
        let (payment, _) = f
            .orchestrator
            .create_intent(order.id, "mock")
            .await
            .unwrap();
        f.mock
            .set_confirm(MockBehavior::Error {
                message: "connection reset".to_string(),
            })
            .await;

        let err = f
            .orchestrator
            .confirm(order.id, &ConfirmationInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));

        let payment = f.store.payment(payment.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::RequiresAction);

        // Retry after the transient error succeeds.
        f.mock.set_confirm(MockBehavior::Succeed).await;
        let confirmed = f
            .orchestrator
            .confirm(order.id, &ConfirmationInput::default())
            .await
            .unwrap();
        assert_eq!(confirmed.status, PaymentStatus::Captured);
    }

    #[tokio::test]
    async fn retry_creates_a_second_payment_and_ref_selects_it() {
        let f = fixture();
        let order = pending_order(&f.store).await;
        let (first, _) = f
            .orchestrator
            .create_intent(order.id, "mock")
            .await
            .unwrap();
        f.store
            .fail_payment(first.id, Some("card_declined"), "declined")
            .await
            .unwrap();
        let (second, _) = f
            .orchestrator
            .create_intent(order.id, "mock")
            .await
            .unwrap();

        let confirmed = f
            .orchestrator
            .confirm(
                order.id,
                &ConfirmationInput {
                    provider_ref: Some(second.intent_ref.clone()),
                    detail: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(confirmed.id, second.id);
        assert_eq!(confirmed.status, PaymentStatus::Captured);

        // Only one payment captured despite two rows.
        let first = f.store.payment(first.id).await.unwrap().unwrap();
        assert_eq!(first.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn intent_rejected_for_non_pending_and_free_orders() {
        let f = fixture();
        let order = pending_order(&f.store).await;
        f.store
            .mark_order_canceled(order.id, Utc::now())
            .await
            .unwrap();
        assert!(matches!(
            f.orchestrator.create_intent(order.id, "mock").await,
            Err(Error::Conflict(_))
        ));

        let free = Order {
            id: OrderId::new(),
            subtotal: Money::ZERO,
            tax: Money::ZERO,
            total: Money::ZERO,
            status: OrderStatus::Pending,
            canceled_at: None,
            ..order
        };
        f.store.insert_order(&free, &[]).await.unwrap();
        assert!(matches!(
            f.orchestrator.create_intent(free.id, "mock").await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn refund_requires_captured_payment() {
        let f = fixture();
        let order = pending_order(&f.store).await;
        let (payment, _) = f
            .orchestrator
            .create_intent(order.id, "mock")
            .await
            .unwrap();

        assert!(matches!(
            f.orchestrator
                .refund_captured_payment(payment.id, None)
                .await,
            Err(Error::Conflict(_))
        ));

        f.orchestrator
            .confirm(order.id, &ConfirmationInput::default())
            .await
            .unwrap();
        let refund = f
            .orchestrator
            .refund_captured_payment(payment.id, Some(Money::from_cents(1000)))
            .await
            .unwrap();
        assert_eq!(refund.amount, Money::from_cents(1000));
    }
}
