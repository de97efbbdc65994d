//! Money & fee engine: pure order-total computation.
//!
//! Pricing is deterministic: the fee schedules, overrides, tax rate, and
//! resolved discount are passed in as an explicit snapshot taken at order
//! time, never read from ambient state. All percentage math is integer
//! basis points.

use crate::types::{FeeKind, FeeSchedule, Money};

/// One priced order line as seen by the engine.
#[derive(Clone, Copy, Debug)]
pub struct PricedItem {
    /// Per-ticket price.
    pub unit_price: Money,
    /// Number of tickets.
    pub quantity: u32,
}

/// Fee schedules in effect for one organization at one instant.
///
/// `overrides` holds the already-resolved override schedules whose window
/// covers "now"; an override replaces every base schedule of the same kind.
#[derive(Clone, Debug, Default)]
pub struct FeeSnapshot {
    /// Platform-wide base schedules.
    pub base: Vec<FeeSchedule>,
    /// Active per-organization overrides, resolved to their schedules.
    pub overrides: Vec<FeeSchedule>,
}

impl FeeSnapshot {
    /// Schedules that actually apply: overrides win per kind.
    #[must_use]
    pub fn effective(&self) -> Vec<&FeeSchedule> {
        let overridden_kinds: Vec<FeeKind> = self.overrides.iter().map(|s| s.kind).collect();
        self.overrides
            .iter()
            .chain(
                self.base
                    .iter()
                    .filter(|s| !overridden_kinds.contains(&s.kind)),
            )
            .collect()
    }

    /// Fixed per-ticket fee across the effective schedules, used for the
    /// `unit_fee` snapshot stored on order items.
    #[must_use]
    pub fn fixed_per_ticket(&self) -> Money {
        self.effective()
            .iter()
            .fold(Money::ZERO, |acc, s| acc.saturating_add(s.fixed))
    }
}

/// Immutable output of the engine.
///
/// Invariant: `total == subtotal + fees + tax - discount`, floored at zero;
/// every field is non-negative by construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderTotals {
    /// Sum of item prices.
    pub subtotal: Money,
    /// Platform and processing fees.
    pub fees: Money,
    /// Tax on the discounted subtotal.
    pub tax: Money,
    /// Applied promotional discount.
    pub discount: Money,
    /// Final amount to collect.
    pub total: Money,
}

impl OrderTotals {
    /// Whether the order requires no payment at all.
    ///
    /// Covers both genuinely free orders (zero subtotal) and orders whose
    /// discount swallows the whole total; both take the no-payment path.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.total.is_zero()
    }
}

/// Computes order totals from a pricing snapshot.
///
/// - `subtotal = Σ(unit_price × quantity)`
/// - fees: per effective schedule, `subtotal × percent_bps` (rounded down)
///   plus `fixed × ticket_count`
/// - `tax = (subtotal − discount) × tax_rate_bps`, rounded half up
/// - `total = subtotal + fees + tax − discount`, floored at zero
///
/// A zero subtotal forces fees to zero and skips tax entirely: the order
/// is free no matter what the schedules say.
#[must_use]
pub fn price_order(
    items: &[PricedItem],
    fees: &FeeSnapshot,
    tax_rate_bps: u32,
    discount: Money,
) -> OrderTotals {
    let subtotal = items.iter().fold(Money::ZERO, |acc, item| {
        acc.saturating_add(item.unit_price.saturating_mul(item.quantity))
    });

    if subtotal.is_zero() {
        return OrderTotals {
            subtotal: Money::ZERO,
            fees: Money::ZERO,
            tax: Money::ZERO,
            discount: Money::ZERO,
            total: Money::ZERO,
        };
    }

    let ticket_count: u32 = items.iter().map(|item| item.quantity).sum();
    let fee_total = fees.effective().iter().fold(Money::ZERO, |acc, schedule| {
        acc.saturating_add(subtotal.apply_bps(schedule.percent_bps))
            .saturating_add(schedule.fixed.saturating_mul(ticket_count))
    });

    let taxable = subtotal.saturating_sub(discount);
    let tax = taxable.apply_bps_round(tax_rate_bps);

    let total = subtotal
        .saturating_add(fee_total)
        .saturating_add(tax)
        .saturating_sub(discount);

    OrderTotals {
        subtotal,
        fees: fee_total,
        tax,
        discount,
        total,
    }
}
