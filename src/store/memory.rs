//! In-memory settlement store for tests and local development.
//!
//! Mirrors the conditional-transition semantics of the Postgres store:
//! every compare-and-swap method checks state and mutates under one write
//! lock, so concurrent confirm/webhook triggers observe the same
//! single-winner behavior the database enforces in production.

use super::SettlementStore;
use crate::error::Result;
use crate::pricing::FeeSnapshot;
use crate::types::{
    DisputeRecord, FeeSchedule, Hold, Money, Order, OrderId, OrderItem, OrderStatus,
    OrgFeeOverride, OrganizationId, Payment, PaymentId, PaymentStatus, Refund, RefundId,
    RefundStatus, SeatId, Ticket, TicketId, TicketStatus, TicketType, TicketTypeId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    ticket_types: HashMap<TicketTypeId, TicketType>,
    fee_schedules: Vec<FeeSchedule>,
    org_overrides: Vec<OrgFeeOverride>,
    suspended_orgs: HashSet<OrganizationId>,
    orders: HashMap<OrderId, Order>,
    order_items: HashMap<OrderId, Vec<OrderItem>>,
    // Insertion-ordered so "latest payment" ties break deterministically.
    payments: Vec<Payment>,
    refunds: Vec<Refund>,
    tickets: Vec<Ticket>,
    holds: Vec<Hold>,
    disputes: Vec<DisputeRecord>,
}

/// In-memory [`SettlementStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arc-wrapped convenience constructor.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of recorded dispute events (test observability).
    pub async fn dispute_count(&self) -> usize {
        self.inner.read().await.disputes.len()
    }
}

#[async_trait]
impl SettlementStore for MemoryStore {
    async fn ticket_type(&self, id: TicketTypeId) -> Result<Option<TicketType>> {
        Ok(self.inner.read().await.ticket_types.get(&id).cloned())
    }

    async fn fee_snapshot(&self, org: OrganizationId, now: DateTime<Utc>) -> Result<FeeSnapshot> {
        let inner = self.inner.read().await;
        let overrides: Vec<FeeSchedule> = inner
            .org_overrides
            .iter()
            .filter(|o| o.organization_id == org && o.is_active(now))
            .filter_map(|o| {
                inner
                    .fee_schedules
                    .iter()
                    .find(|s| s.id == o.fee_schedule_id)
                    .cloned()
            })
            .collect();
        let base = inner
            .fee_schedules
            .iter()
            .filter(|s| s.is_default)
            .cloned()
            .collect();
        Ok(FeeSnapshot { base, overrides })
    }

    async fn organization_suspended(&self, org: OrganizationId) -> Result<bool> {
        Ok(self.inner.read().await.suspended_orgs.contains(&org))
    }

    async fn sold_ticket_count(&self, ticket_type: TicketTypeId) -> Result<u32> {
        let inner = self.inner.read().await;
        let count = inner
            .tickets
            .iter()
            .filter(|t| t.ticket_type_id == ticket_type && t.status.occupies_inventory())
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn active_hold_count(
        &self,
        ticket_type: TicketTypeId,
        now: DateTime<Utc>,
    ) -> Result<u32> {
        let inner = self.inner.read().await;
        Ok(inner
            .holds
            .iter()
            .filter(|h| h.ticket_type_id == ticket_type && h.is_active(now))
            .map(|h| h.quantity)
            .sum())
    }

    async fn seat_unavailable(&self, seat: SeatId, now: DateTime<Utc>) -> Result<bool> {
        let inner = self.inner.read().await;
        let ticketed = inner
            .tickets
            .iter()
            .any(|t| t.seat_id == Some(seat) && t.status.occupies_inventory());
        let held = inner
            .holds
            .iter()
            .any(|h| h.seat_id == Some(seat) && h.is_active(now));
        Ok(ticketed || held)
    }

    async fn insert_order(&self, order: &Order, items: &[OrderItem]) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.orders.insert(order.id, order.clone());
        inner.order_items.insert(order.id, items.to_vec());
        Ok(())
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        Ok(self
            .inner
            .read()
            .await
            .order_items
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_order_paid(&self, id: OrderId, paid_at: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Pending => {
                order.status = OrderStatus::Paid;
                order.paid_at = Some(paid_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_order_canceled(&self, id: OrderId, canceled_at: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Pending => {
                order.status = OrderStatus::Canceled;
                order.canceled_at = Some(canceled_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_order_refunded(&self, id: OrderId) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Paid => {
                order.status = OrderStatus::Refunded;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        self.inner.write().await.payments.push(payment.clone());
        Ok(())
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self
            .inner
            .read()
            .await
            .payments
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn latest_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        Ok(self
            .inner
            .read()
            .await
            .payments
            .iter()
            .rev()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn payment_for_order_by_ref(
        &self,
        order_id: OrderId,
        provider_ref: &str,
    ) -> Result<Option<Payment>> {
        Ok(self
            .inner
            .read()
            .await
            .payments
            .iter()
            .find(|p| {
                p.order_id == order_id
                    && (p.intent_ref == provider_ref
                        || p.charge_ref.as_deref() == Some(provider_ref))
            })
            .cloned())
    }

    async fn payment_by_provider_ref(
        &self,
        provider: &str,
        provider_ref: &str,
    ) -> Result<Option<Payment>> {
        Ok(self
            .inner
            .read()
            .await
            .payments
            .iter()
            .find(|p| {
                p.provider == provider
                    && (p.intent_ref == provider_ref
                        || p.charge_ref.as_deref() == Some(provider_ref))
            })
            .cloned())
    }

    async fn captured_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        Ok(self
            .inner
            .read()
            .await
            .payments
            .iter()
            .find(|p| p.order_id == order_id && p.status == PaymentStatus::Captured)
            .cloned())
    }

    async fn settle_payment(
        &self,
        payment_id: PaymentId,
        order_id: OrderId,
        captured_at: DateTime<Utc>,
        charge_ref: Option<&str>,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(payment) = inner.payments.iter_mut().find(|p| p.id == payment_id) else {
            return Ok(false);
        };
        if payment.status != PaymentStatus::RequiresAction {
            return Ok(false);
        }
        payment.status = PaymentStatus::Captured;
        payment.captured_at = Some(captured_at);
        if let Some(charge) = charge_ref {
            payment.charge_ref = Some(charge.to_string());
        }
        if let Some(order) = inner.orders.get_mut(&order_id) {
            if order.status == OrderStatus::Pending {
                order.status = OrderStatus::Paid;
                order.paid_at = Some(captured_at);
            }
        }
        Ok(true)
    }

    async fn fail_payment(
        &self,
        payment_id: PaymentId,
        code: Option<&str>,
        message: &str,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.payments.iter_mut().find(|p| p.id == payment_id) {
            Some(payment) if payment.status == PaymentStatus::RequiresAction => {
                payment.status = PaymentStatus::Failed;
                payment.failure_code = code.map(ToString::to_string);
                payment.failure_message = Some(message.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_refund(&self, refund: &Refund) -> Result<()> {
        self.inner.write().await.refunds.push(refund.clone());
        Ok(())
    }

    async fn refund(&self, id: RefundId) -> Result<Option<Refund>> {
        Ok(self
            .inner
            .read()
            .await
            .refunds
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn approve_refund(&self, id: RefundId) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.refunds.iter_mut().find(|r| r.id == id) {
            Some(refund) if refund.status == RefundStatus::Pending => {
                refund.status = RefundStatus::Approved;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cancel_refund(&self, id: RefundId, note: Option<&str>) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.refunds.iter_mut().find(|r| r.id == id) {
            Some(refund) if refund.status == RefundStatus::Pending => {
                refund.status = RefundStatus::Canceled;
                refund.resolution_note = note.map(ToString::to_string);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_refund_provider_ref(&self, id: RefundId, provider_ref: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(refund) = inner.refunds.iter_mut().find(|r| r.id == id) {
            refund.provider_ref = Some(provider_ref.to_string());
        }
        Ok(())
    }

    async fn resolve_refund(
        &self,
        id: RefundId,
        outcome: RefundStatus,
        provider_ref: Option<&str>,
        processed_at: Option<DateTime<Utc>>,
        note: Option<&str>,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.refunds.iter_mut().find(|r| r.id == id) {
            Some(refund)
                if matches!(
                    refund.status,
                    RefundStatus::Pending | RefundStatus::Approved
                ) =>
            {
                refund.status = outcome;
                if let Some(provider_ref) = provider_ref {
                    refund.provider_ref = Some(provider_ref.to_string());
                }
                refund.processed_at = processed_at;
                if let Some(note) = note {
                    refund.resolution_note = Some(note.to_string());
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn refund_by_provider_ref(&self, provider_ref: &str) -> Result<Option<Refund>> {
        Ok(self
            .inner
            .read()
            .await
            .refunds
            .iter()
            .find(|r| r.provider_ref.as_deref() == Some(provider_ref))
            .cloned())
    }

    async fn newest_pending_refund_for_order(&self, order_id: OrderId) -> Result<Option<Refund>> {
        Ok(self
            .inner
            .read()
            .await
            .refunds
            .iter()
            .rev()
            .find(|r| r.order_id == order_id && !r.is_resolved())
            .cloned())
    }

    async fn processed_refund_total(&self, order_id: OrderId) -> Result<Money> {
        Ok(self
            .inner
            .read()
            .await
            .refunds
            .iter()
            .filter(|r| r.order_id == order_id && r.status == RefundStatus::Processed)
            .fold(Money::ZERO, |acc, r| acc.saturating_add(r.amount)))
    }

    async fn insert_ticket_if_absent(&self, ticket: &Ticket) -> Result<bool> {
        let mut inner = self.inner.write().await;
        if inner.tickets.iter().any(|t| t.barcode == ticket.barcode) {
            return Ok(false);
        }
        inner.tickets.push(ticket.clone());
        Ok(true)
    }

    async fn set_ticket_code(&self, id: TicketId, qr_code: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(ticket) = inner.tickets.iter_mut().find(|t| t.id == id) {
            ticket.qr_code = Some(qr_code.to_string());
        }
        Ok(())
    }

    async fn tickets_for_order(&self, order_id: OrderId) -> Result<Vec<Ticket>> {
        Ok(self
            .inner
            .read()
            .await
            .tickets
            .iter()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn void_tickets_for_order(&self, order_id: OrderId) -> Result<u32> {
        let mut inner = self.inner.write().await;
        let mut voided = 0;
        for ticket in inner
            .tickets
            .iter_mut()
            .filter(|t| t.order_id == order_id && t.status != TicketStatus::Void)
        {
            ticket.status = TicketStatus::Void;
            voided += 1;
        }
        Ok(voided)
    }

    async fn insert_dispute(&self, record: &DisputeRecord) -> Result<()> {
        self.inner.write().await.disputes.push(record.clone());
        Ok(())
    }

    async fn insert_ticket_type(&self, ticket_type: &TicketType) -> Result<()> {
        self.inner
            .write()
            .await
            .ticket_types
            .insert(ticket_type.id, ticket_type.clone());
        Ok(())
    }

    async fn insert_fee_schedule(&self, schedule: &FeeSchedule) -> Result<()> {
        self.inner.write().await.fee_schedules.push(schedule.clone());
        Ok(())
    }

    async fn insert_org_override(&self, org_override: &OrgFeeOverride) -> Result<()> {
        self.inner
            .write()
            .await
            .org_overrides
            .push(org_override.clone());
        Ok(())
    }

    async fn insert_hold(&self, hold: &Hold) -> Result<()> {
        self.inner.write().await.holds.push(hold.clone());
        Ok(())
    }

    async fn set_organization_suspended(
        &self,
        org: OrganizationId,
        suspended: bool,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        if suspended {
            inner.suspended_orgs.insert(org);
        } else {
            inner.suspended_orgs.remove(&org);
        }
        Ok(())
    }
}
