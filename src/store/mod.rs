//! Persistence seam for the settlement pipeline.
//!
//! The [`SettlementStore`] trait is the single boundary between the
//! services and storage. State transitions that must be idempotent under
//! concurrent triggers (capture, refund resolution) are modeled as
//! conditional methods returning whether the transition applied, so the
//! compare-and-swap lives in the store rather than in racy read-then-write
//! application code.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use crate::error::Result;
use crate::pricing::FeeSnapshot;
use crate::types::{
    DisputeRecord, FeeSchedule, Hold, Order, OrderId, OrderItem, OrgFeeOverride, OrganizationId,
    Payment, PaymentId, Refund, RefundId, RefundStatus, SeatId, Ticket, TicketId, TicketType,
    TicketTypeId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Shared handle to a settlement store.
pub type SharedStore = Arc<dyn SettlementStore>;

/// Storage operations used by the settlement services.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    // ========================================================================
    // Catalog and configuration (read-only from this core's perspective)
    // ========================================================================

    /// Loads a ticket type by id.
    async fn ticket_type(&self, id: TicketTypeId) -> Result<Option<TicketType>>;

    /// Fee schedules and active org overrides in effect at `now`.
    async fn fee_snapshot(&self, org: OrganizationId, now: DateTime<Utc>) -> Result<FeeSnapshot>;

    /// Whether the organization is suspended (blocks refund creation).
    async fn organization_suspended(&self, org: OrganizationId) -> Result<bool>;

    // ========================================================================
    // Inventory
    // ========================================================================

    /// Non-void tickets sold for a ticket type.
    async fn sold_ticket_count(&self, ticket_type: TicketTypeId) -> Result<u32>;

    /// Units held by unexpired holds for a ticket type.
    async fn active_hold_count(&self, ticket_type: TicketTypeId, now: DateTime<Utc>)
        -> Result<u32>;

    /// Whether a seat has a non-void ticket or an unexpired hold.
    async fn seat_unavailable(&self, seat: SeatId, now: DateTime<Utc>) -> Result<bool>;

    // ========================================================================
    // Orders
    // ========================================================================

    /// Persists an order with its items.
    async fn insert_order(&self, order: &Order, items: &[OrderItem]) -> Result<()>;

    /// Loads an order by id.
    async fn order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Loads an order's items.
    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>>;

    /// `pending -> paid`. Returns whether the transition applied.
    async fn mark_order_paid(&self, id: OrderId, paid_at: DateTime<Utc>) -> Result<bool>;

    /// `pending -> canceled`. Returns whether the transition applied.
    async fn mark_order_canceled(&self, id: OrderId, canceled_at: DateTime<Utc>) -> Result<bool>;

    /// `paid -> refunded`. Returns whether the transition applied.
    async fn mark_order_refunded(&self, id: OrderId) -> Result<bool>;

    // ========================================================================
    // Payments
    // ========================================================================

    /// Persists a new payment attempt.
    async fn insert_payment(&self, payment: &Payment) -> Result<()>;

    /// Loads a payment by id.
    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>>;

    /// The most recently created payment for an order.
    async fn latest_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>>;

    /// A specific payment for an order matched by provider intent or
    /// charge reference (supports retries with multiple payment rows).
    async fn payment_for_order_by_ref(
        &self,
        order_id: OrderId,
        provider_ref: &str,
    ) -> Result<Option<Payment>>;

    /// A payment matched by provider name and intent or charge reference.
    async fn payment_by_provider_ref(
        &self,
        provider: &str,
        provider_ref: &str,
    ) -> Result<Option<Payment>>;

    /// The captured payment for an order, if any.
    async fn captured_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>>;

    /// Atomically applies the capture transition: payment
    /// `requires_action -> captured` and order `pending -> paid` commit
    /// together so no torn state is visible to concurrent readers.
    /// Returns whether the payment transition applied (false when a
    /// racing confirm or webhook already captured it).
    async fn settle_payment(
        &self,
        payment_id: PaymentId,
        order_id: OrderId,
        captured_at: DateTime<Utc>,
        charge_ref: Option<&str>,
    ) -> Result<bool>;

    /// `requires_action -> failed` with the provider's code/message.
    /// Returns whether the transition applied.
    async fn fail_payment(
        &self,
        payment_id: PaymentId,
        code: Option<&str>,
        message: &str,
    ) -> Result<bool>;

    // ========================================================================
    // Refunds
    // ========================================================================

    /// Persists a new refund request.
    async fn insert_refund(&self, refund: &Refund) -> Result<()>;

    /// Loads a refund by id.
    async fn refund(&self, id: RefundId) -> Result<Option<Refund>>;

    /// `pending -> approved`. Returns whether the transition applied.
    async fn approve_refund(&self, id: RefundId) -> Result<bool>;

    /// `pending -> canceled` (rejected). Returns whether the transition
    /// applied.
    async fn cancel_refund(&self, id: RefundId, note: Option<&str>) -> Result<bool>;

    /// Records the provider-side refund reference without changing status
    /// (used when the provider reports the refund as still pending).
    async fn set_refund_provider_ref(&self, id: RefundId, provider_ref: &str) -> Result<()>;

    /// Resolves a refund to `processed` or `failed` from `pending` or
    /// `approved`. Returns whether the transition applied; a resolved
    /// refund never re-enters the pipeline.
    async fn resolve_refund(
        &self,
        id: RefundId,
        outcome: RefundStatus,
        provider_ref: Option<&str>,
        processed_at: Option<DateTime<Utc>>,
        note: Option<&str>,
    ) -> Result<bool>;

    /// A refund matched by provider refund reference, regardless of
    /// status; a resolved match lets the reconciler classify replayed
    /// deliveries as duplicates.
    async fn refund_by_provider_ref(&self, provider_ref: &str) -> Result<Option<Refund>>;

    /// The newest unresolved refund for an order (fallback correlation
    /// for externally-reported refund events).
    async fn newest_pending_refund_for_order(&self, order_id: OrderId) -> Result<Option<Refund>>;

    /// Sum of processed refund amounts for an order.
    async fn processed_refund_total(&self, order_id: OrderId) -> Result<crate::types::Money>;

    // ========================================================================
    // Tickets
    // ========================================================================

    /// Inserts a ticket unless one with the same barcode exists. The
    /// barcode uniqueness constraint is enforced here, at the storage
    /// layer. Returns whether the row was newly created.
    async fn insert_ticket_if_absent(&self, ticket: &Ticket) -> Result<bool>;

    /// Sets the presentation QR payload on an issued ticket.
    async fn set_ticket_code(&self, id: TicketId, qr_code: &str) -> Result<()>;

    /// All tickets issued from an order.
    async fn tickets_for_order(&self, order_id: OrderId) -> Result<Vec<Ticket>>;

    /// Voids every non-void ticket on an order; returns how many changed.
    async fn void_tickets_for_order(&self, order_id: OrderId) -> Result<u32>;

    // ========================================================================
    // Disputes
    // ========================================================================

    /// Records a dispute event for downstream review.
    async fn insert_dispute(&self, record: &DisputeRecord) -> Result<()>;

    // ========================================================================
    // Fixtures (catalog management lives outside this core; these exist
    // for bootstrap and tests)
    // ========================================================================

    /// Inserts a ticket type catalog row.
    async fn insert_ticket_type(&self, ticket_type: &TicketType) -> Result<()>;

    /// Inserts a fee schedule.
    async fn insert_fee_schedule(&self, schedule: &FeeSchedule) -> Result<()>;

    /// Inserts an org fee override.
    async fn insert_org_override(&self, org_override: &OrgFeeOverride) -> Result<()>;

    /// Inserts an inventory hold.
    async fn insert_hold(&self, hold: &Hold) -> Result<()>;

    /// Marks an organization suspended or active.
    async fn set_organization_suspended(&self, org: OrganizationId, suspended: bool) -> Result<()>;
}
