//! Refund lifecycle manager.
//!
//! Owns refund rows end to end: `pending -> approved -> {processed |
//! failed}`, or `pending -> canceled` (rejected); terminal states never
//! re-enter the pipeline. The provider conversation itself goes through
//! the orchestrator, keeping "talk to the network" and "own the record"
//! separate.

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::notifications::{notify, SharedNotifier};
use crate::orchestrator::PaymentOrchestrator;
use crate::providers::ProviderRefundStatus;
use crate::store::SharedStore;
use crate::types::{Currency, Money, Order, OrderId, Refund, RefundId, RefundStatus, UserId};
use std::sync::Arc;
use tracing::{info, warn};

/// How a provider-originated refund event landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefundResolution {
    /// A matching unresolved refund was resolved.
    Applied,
    /// A matching refund was already resolved (duplicate delivery).
    Duplicate,
    /// No matching refund row exists; recorded, never fabricated.
    Unmatched,
}

/// Operator- and system-initiated money-back flow.
pub struct RefundManager {
    store: SharedStore,
    orchestrator: Arc<PaymentOrchestrator>,
    notifier: SharedNotifier,
    clock: Arc<dyn Clock>,
}

impl RefundManager {
    /// Creates the manager.
    #[must_use]
    pub fn new(
        store: SharedStore,
        orchestrator: Arc<PaymentOrchestrator>,
        notifier: SharedNotifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            notifier,
            clock,
        }
    }

    async fn load(&self, refund_id: RefundId) -> Result<Refund> {
        self.store
            .refund(refund_id)
            .await?
            .ok_or_else(|| Error::not_found("refund", refund_id))
    }

    async fn load_order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .order(order_id)
            .await?
            .ok_or_else(|| Error::not_found("order", order_id))
    }

    /// Re-checks the refundable remainder at resolution time. The guard
    /// in [`create`](Self::create) only sees what was processed then; two
    /// refunds that each fit at creation must not both resolve past the
    /// order's paid total.
    async fn guard_refundable_remainder(&self, refund: &Refund) -> Result<()> {
        let order = self.load_order(refund.order_id).await?;
        let processed = self.store.processed_refund_total(refund.order_id).await?;
        let remaining = order.total.saturating_sub(processed);
        if refund.amount.cents() > remaining.cents() {
            return Err(Error::Conflict(format!(
                "refund {} for {} exceeds refundable remainder {remaining}",
                refund.id, refund.amount
            )));
        }
        Ok(())
    }

    /// Creates a refund request against a paid order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] unless the order is paid, and
    /// [`Error::Validation`] for a suspended organization, a currency
    /// mismatch, or an amount exceeding what is still refundable.
    pub async fn create(
        &self,
        order_id: OrderId,
        amount: Money,
        currency: &Currency,
        reason: String,
        created_by: UserId,
    ) -> Result<Refund> {
        let order = self.load_order(order_id).await?;
        if order.status != crate::types::OrderStatus::Paid {
            return Err(Error::Conflict(format!(
                "refunds require a paid order; order {order_id} is {}",
                order.status.as_str()
            )));
        }
        if self
            .store
            .organization_suspended(order.organization_id)
            .await?
        {
            return Err(Error::Validation(
                "organization is suspended; refunds are blocked".to_string(),
            ));
        }
        if currency != &order.currency {
            return Err(Error::Validation(format!(
                "refund currency {currency} does not match order currency {}",
                order.currency
            )));
        }
        if amount.is_zero() {
            return Err(Error::Validation(
                "refund amount must be positive".to_string(),
            ));
        }
        let already_refunded = self.store.processed_refund_total(order_id).await?;
        let remaining = order.total.saturating_sub(already_refunded);
        if amount.cents() > remaining.cents() {
            return Err(Error::Validation(format!(
                "refund amount {amount} exceeds refundable remainder {remaining}"
            )));
        }

        let refund = Refund::new(
            RefundId::new(),
            order_id,
            amount,
            currency.clone(),
            reason,
            created_by,
            self.clock.now(),
        );
        self.store.insert_refund(&refund).await?;
        info!(refund_id = %refund.id, %order_id, %amount, "refund requested");
        Ok(refund)
    }

    /// `pending -> approved`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if the refund is not pending.
    pub async fn approve(&self, refund_id: RefundId) -> Result<Refund> {
        if !self.store.approve_refund(refund_id).await? {
            let refund = self.load(refund_id).await?;
            return Err(Error::Conflict(format!(
                "only pending refunds can be approved; refund {refund_id} is {}",
                refund.status.as_str()
            )));
        }
        notify(
            self.notifier.refund_update(refund_id, RefundStatus::Approved),
            "refund_update",
        )
        .await;
        self.load(refund_id).await
    }

    /// `pending -> canceled` with the operator's reason.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if the refund is not pending.
    pub async fn reject(&self, refund_id: RefundId, reason: &str) -> Result<Refund> {
        if !self.store.cancel_refund(refund_id, Some(reason)).await? {
            let refund = self.load(refund_id).await?;
            return Err(Error::Conflict(format!(
                "only pending refunds can be rejected; refund {refund_id} is {}",
                refund.status.as_str()
            )));
        }
        notify(
            self.notifier.refund_update(refund_id, RefundStatus::Canceled),
            "refund_update",
        )
        .await;
        self.load(refund_id).await
    }

    /// Executes the refund at the provider and records the outcome.
    ///
    /// An "already refunded" provider error is an idempotency collision
    /// (duplicate operator click, retried request) and is reclassified as
    /// success. A provider that accepts the refund but reports it pending
    /// leaves the row `approved` with its provider reference recorded;
    /// the webhook reconciler completes it. A full refund also marks the
    /// order refunded and voids its tickets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] for a resolved refund (unless `force`
    /// re-runs a processed one), an amount no longer covered by the
    /// refundable remainder, or an order without a captured payment;
    /// other provider errors surface unchanged with the refund still
    /// unresolved.
    pub async fn process(&self, refund_id: RefundId, force: bool) -> Result<Refund> {
        let refund = self.load(refund_id).await?;
        match refund.status {
            RefundStatus::Pending | RefundStatus::Approved => {}
            RefundStatus::Processed if force => {}
            RefundStatus::Processed => {
                return Err(Error::Conflict(format!(
                    "refund {refund_id} is already processed"
                )));
            }
            RefundStatus::Canceled | RefundStatus::Failed => {
                return Err(Error::Conflict(format!(
                    "refund {refund_id} is resolved as {}",
                    refund.status.as_str()
                )));
            }
        }

        if !refund.is_resolved() {
            self.guard_refundable_remainder(&refund).await?;
        }

        let payment = self
            .store
            .captured_payment_for_order(refund.order_id)
            .await?
            .ok_or_else(|| {
                Error::Conflict(format!(
                    "order {} has no captured payment to refund",
                    refund.order_id
                ))
            })?;

        match self
            .orchestrator
            .refund_captured_payment(payment.id, Some(refund.amount))
            .await
        {
            Ok(outcome) => match outcome.status {
                ProviderRefundStatus::Completed => {
                    self.mark_processed(&refund, Some(&outcome.provider_ref), None)
                        .await?;
                }
                ProviderRefundStatus::Pending => {
                    // Accepted but not settled: hold at approved with the
                    // provider reference so the webhook can finish it.
                    self.store.approve_refund(refund_id).await?;
                    self.store
                        .set_refund_provider_ref(refund_id, &outcome.provider_ref)
                        .await?;
                    info!(
                        %refund_id,
                        provider_ref = %outcome.provider_ref,
                        "refund pending at provider"
                    );
                }
                ProviderRefundStatus::Failed => {
                    self.store
                        .resolve_refund(
                            refund_id,
                            RefundStatus::Failed,
                            Some(&outcome.provider_ref),
                            None,
                            Some("provider rejected the refund"),
                        )
                        .await?;
                    notify(
                        self.notifier.refund_update(refund_id, RefundStatus::Failed),
                        "refund_update",
                    )
                    .await;
                }
            },
            Err(provider_error) if provider_error.is_already_refunded() => {
                warn!(
                    %refund_id,
                    error = %provider_error,
                    "provider reports refund already exists; treating as processed"
                );
                self.mark_processed(&refund, None, Some("already refunded at provider"))
                    .await?;
            }
            Err(provider_error) => return Err(provider_error),
        }

        self.load(refund_id).await
    }

    /// Applies a provider-originated refund resolution (webhook path).
    /// Correlation is by the provider's refund reference first, falling
    /// back to the newest unresolved refund on the payment's order. A
    /// reference that matches an already-resolved refund is a replayed
    /// delivery and resolves as a duplicate.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure, or [`Error::Conflict`] when
    /// the event would push the processed total past the order's paid
    /// total.
    pub async fn apply_provider_resolution(
        &self,
        provider: &str,
        payment_ref: &str,
        refund_ref: &str,
        succeeded: bool,
        message: Option<&str>,
    ) -> Result<RefundResolution> {
        let mut refund = self.store.refund_by_provider_ref(refund_ref).await?;
        if refund.is_none() {
            if let Some(payment) = self
                .store
                .payment_by_provider_ref(provider, payment_ref)
                .await?
            {
                refund = self
                    .store
                    .newest_pending_refund_for_order(payment.order_id)
                    .await?;
            }
        }
        let Some(refund) = refund else {
            warn!(provider, refund_ref, "refund event matches no refund row");
            return Ok(RefundResolution::Unmatched);
        };
        if refund.is_resolved() {
            return Ok(RefundResolution::Duplicate);
        }

        let applied = if succeeded {
            self.mark_processed(&refund, Some(refund_ref), None).await?
        } else {
            let applied = self
                .store
                .resolve_refund(
                    refund.id,
                    RefundStatus::Failed,
                    Some(refund_ref),
                    None,
                    message,
                )
                .await?;
            if applied {
                notify(
                    self.notifier.refund_update(refund.id, RefundStatus::Failed),
                    "refund_update",
                )
                .await;
            }
            applied
        };

        Ok(if applied {
            RefundResolution::Applied
        } else {
            RefundResolution::Duplicate
        })
    }

    /// Resolves a refund to processed and applies full-refund side
    /// effects when the processed total now covers the order's total.
    async fn mark_processed(
        &self,
        refund: &Refund,
        provider_ref: Option<&str>,
        note: Option<&str>,
    ) -> Result<bool> {
        if !refund.is_resolved() {
            self.guard_refundable_remainder(refund).await?;
        }
        let applied = self
            .store
            .resolve_refund(
                refund.id,
                RefundStatus::Processed,
                provider_ref,
                Some(self.clock.now()),
                note,
            )
            .await?;
        if !applied {
            return Ok(false);
        }
        info!(refund_id = %refund.id, order_id = %refund.order_id, "refund processed");

        let order = self.load_order(refund.order_id).await?;
        let refunded = self.store.processed_refund_total(refund.order_id).await?;
        if refunded == order.total {
            self.store.mark_order_refunded(refund.order_id).await?;
            let voided = self.store.void_tickets_for_order(refund.order_id).await?;
            info!(
                order_id = %refund.order_id,
                voided,
                "full refund: order refunded and tickets voided"
            );
        }

        notify(
            self.notifier
                .refund_update(refund.id, RefundStatus::Processed),
            "refund_update",
        )
        .await;
        Ok(true)
    }
}
