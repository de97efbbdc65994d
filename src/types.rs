//! Domain types for the settlement pipeline.
//!
//! Value objects (ids, money, currency) and the persisted entities:
//! orders, order items, payments, refunds, tickets, ticket types, holds,
//! and fee schedules. All money amounts are integer minor-currency units.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Creates a new random `OrderId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `OrderId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an order item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderItemId(Uuid);

impl OrderItemId {
    /// Creates a new random `OrderItemId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `OrderItemId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a payment attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(Uuid);

impl PaymentId {
    /// Creates a new random `PaymentId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `PaymentId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a refund.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefundId(Uuid);

impl RefundId {
    /// Creates a new random `RefundId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `RefundId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RefundId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RefundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an issued ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Creates a new random `TicketId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `TicketId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a ticket type (a priced admission class of one event).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketTypeId(Uuid);

impl TicketTypeId {
    /// Creates a new random `TicketTypeId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `TicketTypeId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TicketTypeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a seat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatId(Uuid);

impl SeatId {
    /// Creates a new random `SeatId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `SeatId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SeatId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an organization (the event producer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganizationId(Uuid);

impl OrganizationId {
    /// Creates a new random `OrganizationId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `OrganizationId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrganizationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user (buyer or operator).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UserId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an inventory hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HoldId(Uuid);

impl HoldId {
    /// Creates a new random `HoldId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `HoldId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for HoldId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HoldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a fee schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeeScheduleId(Uuid);

impl FeeScheduleId {
    /// Creates a new random `FeeScheduleId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `FeeScheduleId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FeeScheduleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FeeScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money (cents-based, no floating point)
// ============================================================================

/// Money in minor currency units ("cents") to avoid floating-point drift.
///
/// Percentage math runs in basis points over `u128` intermediates so no
/// intermediate result can silently overflow or round through a float.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents.
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents.
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts with overflow checking.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Adds two amounts, saturating at `u64::MAX`.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Subtracts two amounts, flooring at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Multiplies by a quantity, saturating at `u64::MAX`.
    #[must_use]
    pub const fn saturating_mul(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(quantity as u64))
    }

    /// Applies a basis-point rate, rounding down.
    ///
    /// `10_000` basis points == 100%.
    #[must_use]
    pub const fn apply_bps(self, bps: u32) -> Self {
        let product = self.0 as u128 * bps as u128;
        let result = product / 10_000;
        if result > u64::MAX as u128 {
            Self(u64::MAX)
        } else {
            Self(result as u64)
        }
    }

    /// Applies a basis-point rate, rounding half up.
    ///
    /// Used for tax so that `$50.00 * 7%` is exactly `350` cents.
    #[must_use]
    pub const fn apply_bps_round(self, bps: u32) -> Self {
        let product = self.0 as u128 * bps as u128;
        let result = (product + 5_000) / 10_000;
        if result > u64::MAX as u128 {
            Self(u64::MAX)
        } else {
            Self(result as u64)
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// ISO 4217 currency code, stored uppercase.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Creates a `Currency` from a code, normalizing to uppercase.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_ascii_uppercase())
    }

    /// Returns the code as a string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status enums
// ============================================================================

/// Order lifecycle status.
///
/// Transitions: `Pending -> {Paid, Canceled}`, `Paid -> Refunded`.
/// A paid order can never be canceled, only refunded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Awaiting payment.
    Pending,
    /// Payment captured; tickets issued (or issuing).
    Paid,
    /// Canceled before payment.
    Canceled,
    /// Fully refunded after payment.
    Refunded,
}

impl OrderStatus {
    /// Stable string form for persistence.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Canceled => "canceled",
            Self::Refunded => "refunded",
        }
    }

    /// Parses the persisted string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "canceled" => Some(Self::Canceled),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }
}

/// Payment lifecycle status.
///
/// Transitions: `RequiresAction -> Captured` (terminal success) or
/// `RequiresAction -> Failed` (terminal; a fresh payment row may retry).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Intent created; awaiting buyer action at the provider.
    RequiresAction,
    /// Funds captured.
    Captured,
    /// Terminal failure reported by the provider.
    Failed,
}

impl PaymentStatus {
    /// Stable string form for persistence.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RequiresAction => "requires_action",
            Self::Captured => "captured",
            Self::Failed => "failed",
        }
    }

    /// Parses the persisted string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requires_action" => Some(Self::RequiresAction),
            "captured" => Some(Self::Captured),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Refund lifecycle status.
///
/// Transitions: `Pending -> Approved -> {Processed, Failed}` or
/// `Pending -> Canceled` (rejected). Terminal on `Processed`, `Failed`,
/// `Canceled`; a resolved refund never re-enters `Pending`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    /// Requested, awaiting operator decision.
    Pending,
    /// Approved, awaiting provider execution.
    Approved,
    /// Rejected by an operator.
    Canceled,
    /// Money returned by the provider.
    Processed,
    /// Provider refused or execution failed.
    Failed,
}

impl RefundStatus {
    /// Stable string form for persistence.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Canceled => "canceled",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }

    /// Parses the persisted string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "canceled" => Some(Self::Canceled),
            "processed" => Some(Self::Processed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Ticket status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Issued and valid.
    Issued,
    /// Transferred to another owner.
    Transferred,
    /// Refunded (historical marker; also voided).
    Refunded,
    /// Scanned at the venue.
    CheckedIn,
    /// Voided; no longer grants admission.
    Void,
}

impl TicketStatus {
    /// Stable string form for persistence.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Transferred => "transferred",
            Self::Refunded => "refunded",
            Self::CheckedIn => "checked_in",
            Self::Void => "void",
        }
    }

    /// Parses the persisted string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "issued" => Some(Self::Issued),
            "transferred" => Some(Self::Transferred),
            "refunded" => Some(Self::Refunded),
            "checked_in" => Some(Self::CheckedIn),
            "void" => Some(Self::Void),
            _ => None,
        }
    }

    /// Whether the ticket still occupies inventory (anything but void).
    #[must_use]
    pub const fn occupies_inventory(&self) -> bool {
        !matches!(self, Self::Void)
    }
}

/// Fee schedule kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeKind {
    /// Platform service fee.
    Platform,
    /// Payment processing fee.
    Processing,
}

impl FeeKind {
    /// Stable string form for persistence.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::Processing => "processing",
        }
    }

    /// Parses the persisted string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "platform" => Some(Self::Platform),
            "processing" => Some(Self::Processing),
            _ => None,
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A buyer's purchase request for one event's tickets.
///
/// Invariant: `total == subtotal + fees + tax - discount`, floored at zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    pub id: OrderId,
    /// Buyer who owns the order.
    pub buyer_id: UserId,
    /// Organization producing the event.
    pub organization_id: OrganizationId,
    /// Event the tickets admit to.
    pub event_id: EventId,
    /// Current order status.
    pub status: OrderStatus,
    /// Sum of item prices.
    pub subtotal: Money,
    /// Platform and processing fees.
    pub fees: Money,
    /// Tax on the discounted subtotal.
    pub tax: Money,
    /// Resolved promotional discount.
    pub discount: Money,
    /// Final amount to collect.
    pub total: Money,
    /// Order currency.
    pub currency: Currency,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
    /// When payment was captured.
    pub paid_at: Option<DateTime<Utc>>,
    /// When the order was canceled.
    pub canceled_at: Option<DateTime<Utc>>,
}

/// One line of an order: a ticket type (optionally a specific seat) and
/// quantity, with price and fee snapshotted at order time.
///
/// Immutable once created; catalog changes never drift an existing order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Unique item identifier.
    pub id: OrderItemId,
    /// Order this item belongs to.
    pub order_id: OrderId,
    /// Ticket type purchased.
    pub ticket_type_id: TicketTypeId,
    /// Specific seat for seated types.
    pub seat_id: Option<SeatId>,
    /// Number of tickets.
    pub quantity: u32,
    /// Per-ticket price at order time.
    pub unit_price: Money,
    /// Per-ticket fixed fee at order time.
    pub unit_fee: Money,
}

/// One attempt to collect money for an order via a specific provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique payment identifier.
    pub id: PaymentId,
    /// Order being paid.
    pub order_id: OrderId,
    /// Provider name (registry key).
    pub provider: String,
    /// Provider-side intent reference.
    pub intent_ref: String,
    /// Provider-side charge/capture reference, once known.
    pub charge_ref: Option<String>,
    /// Current payment status.
    pub status: PaymentStatus,
    /// Amount to collect.
    pub amount: Money,
    /// Payment currency.
    pub currency: Currency,
    /// When funds were captured.
    pub captured_at: Option<DateTime<Utc>>,
    /// Provider failure code, if failed.
    pub failure_code: Option<String>,
    /// Provider failure message, if failed.
    pub failure_message: Option<String>,
    /// When the payment attempt was created.
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a new payment in `RequiresAction`.
    #[must_use]
    pub const fn new(
        id: PaymentId,
        order_id: OrderId,
        provider: String,
        intent_ref: String,
        amount: Money,
        currency: Currency,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_id,
            provider,
            intent_ref,
            charge_ref: None,
            status: PaymentStatus::RequiresAction,
            amount,
            currency,
            captured_at: None,
            failure_code: None,
            failure_message: None,
            created_at,
        }
    }
}

/// A request to return some or all of a captured payment's funds.
///
/// Invariant: the sum of `Processed` refunds for an order never exceeds
/// the order's paid total.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    /// Unique refund identifier.
    pub id: RefundId,
    /// Order being refunded.
    pub order_id: OrderId,
    /// Amount to return.
    pub amount: Money,
    /// Refund currency (must match the order's).
    pub currency: Currency,
    /// Why the refund was requested.
    pub reason: String,
    /// Current refund status.
    pub status: RefundStatus,
    /// Provider-side refund reference, once known.
    pub provider_ref: Option<String>,
    /// When the provider returned the money.
    pub processed_at: Option<DateTime<Utc>>,
    /// Operator or system actor who created the request.
    pub created_by: UserId,
    /// Rejection or failure note.
    pub resolution_note: Option<String>,
    /// When the refund was requested.
    pub created_at: DateTime<Utc>,
}

impl Refund {
    /// Creates a new refund request in `Pending`.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        id: RefundId,
        order_id: OrderId,
        amount: Money,
        currency: Currency,
        reason: String,
        created_by: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_id,
            amount,
            currency,
            reason,
            status: RefundStatus::Pending,
            provider_ref: None,
            processed_at: None,
            created_by,
            resolution_note: None,
            created_at,
        }
    }

    /// Whether the refund has reached a terminal state.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(
            self.status,
            RefundStatus::Processed | RefundStatus::Failed | RefundStatus::Canceled
        )
    }
}

/// An issued, individually identifiable right of admission.
///
/// The barcode is a deterministic function of
/// `(order, ticket type, seat, index)` and is the idempotency key for
/// issuance: re-running issuance can never create a duplicate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique ticket identifier.
    pub id: TicketId,
    /// Order the ticket was issued from.
    pub order_id: OrderId,
    /// Event the ticket admits to.
    pub event_id: EventId,
    /// Ticket type.
    pub ticket_type_id: TicketTypeId,
    /// Specific seat for seated types.
    pub seat_id: Option<SeatId>,
    /// Current owner.
    pub owner_id: UserId,
    /// Current ticket status.
    pub status: TicketStatus,
    /// Deterministic, unique barcode.
    pub barcode: String,
    /// Presentation QR payload, derived from the assigned ticket id.
    pub qr_code: Option<String>,
    /// When the ticket was issued.
    pub issued_at: DateTime<Utc>,
}

/// Admission kind of a ticket type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketTypeKind {
    /// Capacity-bounded general admission.
    GeneralAdmission,
    /// Assigned seating; every order item names a seat.
    Seated,
}

impl TicketTypeKind {
    /// String form for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GeneralAdmission => "general_admission",
            Self::Seated => "seated",
        }
    }

    /// Parse from the storage string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "general_admission" => Some(Self::GeneralAdmission),
            "seated" => Some(Self::Seated),
            _ => None,
        }
    }
}

/// A priced admission class of one event (catalog row, read-only here).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TicketType {
    /// Unique ticket type identifier.
    pub id: TicketTypeId,
    /// Event this type sells admission to.
    pub event_id: EventId,
    /// Organization producing the event.
    pub organization_id: OrganizationId,
    /// Display name ("General Admission", "VIP").
    pub name: String,
    /// Admission kind.
    pub kind: TicketTypeKind,
    /// Capacity for general-admission types.
    pub capacity: u32,
    /// Per-ticket price.
    pub price: Money,
    /// Price currency.
    pub currency: Currency,
}

/// A time-bounded, non-committed reservation of inventory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hold {
    /// Unique hold identifier.
    pub id: HoldId,
    /// Ticket type held.
    pub ticket_type_id: TicketTypeId,
    /// Specific seat held, for seated types.
    pub seat_id: Option<SeatId>,
    /// Units held (general admission).
    pub quantity: u32,
    /// When the hold stops counting against availability.
    pub expires_at: DateTime<Utc>,
}

impl Hold {
    /// Whether the hold is still live at `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// A named fee definition: a percentage of the subtotal plus a fixed
/// per-ticket amount.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Unique schedule identifier.
    pub id: FeeScheduleId,
    /// Display name ("Standard platform fee").
    pub name: String,
    /// Which charge this schedule represents.
    pub kind: FeeKind,
    /// Percentage of the subtotal, in basis points.
    pub percent_bps: u32,
    /// Fixed amount per ticket.
    pub fixed: Money,
    /// Whether this schedule applies platform-wide absent an override.
    pub is_default: bool,
}

/// Pins a specific fee schedule to one organization for a time window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrgFeeOverride {
    /// Organization the override applies to.
    pub organization_id: OrganizationId,
    /// Schedule that replaces the base schedule of the same kind.
    pub fee_schedule_id: FeeScheduleId,
    /// Window start.
    pub starts_at: DateTime<Utc>,
    /// Window end; `None` means open-ended.
    pub ends_at: Option<DateTime<Utc>>,
}

impl OrgFeeOverride {
    /// Whether the override is in effect at `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now >= self.starts_at && self.ends_at.is_none_or(|end| now < end)
    }
}

/// A chargeback-style event recorded for downstream review.
///
/// Disputes never mutate order or payment state in this core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisputeRecord {
    /// Unique record identifier.
    pub id: Uuid,
    /// Provider that reported the dispute.
    pub provider: String,
    /// Provider payment reference the dispute concerns.
    pub provider_ref: String,
    /// Provider dispute reference.
    pub dispute_ref: String,
    /// "opened" or "closed".
    pub kind: String,
    /// When the event was recorded.
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn money_display_formats_cents() {
        assert_eq!(Money::from_cents(5350).to_string(), "$53.50");
        assert_eq!(Money::from_cents(7).to_string(), "$0.07");
    }

    #[test]
    fn money_bps_rounding() {
        // 7% of $50.00 is exactly $3.50
        assert_eq!(
            Money::from_cents(5000).apply_bps_round(700),
            Money::from_cents(350)
        );
        // half-up: 0.5 cents rounds to 1
        assert_eq!(
            Money::from_cents(75).apply_bps_round(100),
            Money::from_cents(1)
        );
        // floor variant rounds down
        assert_eq!(Money::from_cents(75).apply_bps(100), Money::ZERO);
    }

    #[test]
    fn money_saturating_sub_floors_at_zero() {
        let a = Money::from_cents(100);
        let b = Money::from_cents(250);
        assert_eq!(a.saturating_sub(b), Money::ZERO);
    }

    #[test]
    fn currency_normalizes_case() {
        assert_eq!(Currency::new("usd"), Currency::new("USD"));
        assert_eq!(Currency::new("eur").as_str(), "EUR");
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Canceled,
            OrderStatus::Refunded,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        for status in [
            RefundStatus::Pending,
            RefundStatus::Approved,
            RefundStatus::Canceled,
            RefundStatus::Processed,
            RefundStatus::Failed,
        ] {
            assert_eq!(RefundStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("unknown"), None);
    }

    #[test]
    fn override_window_bounds() {
        let now = Utc::now();
        let over = OrgFeeOverride {
            organization_id: OrganizationId::new(),
            fee_schedule_id: FeeScheduleId::new(),
            starts_at: now - chrono::Duration::hours(1),
            ends_at: Some(now + chrono::Duration::hours(1)),
        };
        assert!(over.is_active(now));
        assert!(!over.is_active(now + chrono::Duration::hours(2)));
    }
}
