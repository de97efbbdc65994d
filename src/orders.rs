//! Order creation and cancellation.
//!
//! Order creation re-validates inventory, snapshots the fee schedules in
//! effect, prices the order with the money engine, and persists order
//! plus items. Free orders (zero total, whether genuinely free or
//! discount-swallowed) skip payment entirely: they are marked paid on the
//! spot and issuance fires synchronously.

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::inventory;
use crate::issuance::TicketIssuance;
use crate::notifications::{notify, SharedNotifier};
use crate::pricing::{price_order, PricedItem};
use crate::store::SharedStore;
use crate::types::{
    Money, Order, OrderId, OrderItem, OrderItemId, OrderStatus, SeatId, TicketTypeId, UserId,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// One requested order line.
#[derive(Clone, Debug, Deserialize)]
pub struct NewOrderItem {
    /// Ticket type to purchase.
    pub ticket_type_id: TicketTypeId,
    /// Specific seat, for seated types.
    pub seat_id: Option<SeatId>,
    /// Number of tickets.
    pub quantity: u32,
}

/// A buyer's order request, with any promo discount already resolved to
/// a cents amount by the (external) promotions collaborator.
#[derive(Clone, Debug, Deserialize)]
pub struct NewOrder {
    /// Buyer placing the order.
    pub buyer_id: UserId,
    /// Requested lines; all must belong to the same event.
    pub items: Vec<NewOrderItem>,
    /// Resolved promotional discount.
    #[serde(default)]
    pub discount: Money,
}

/// Creates and cancels orders.
pub struct OrderService {
    store: SharedStore,
    issuance: Arc<TicketIssuance>,
    notifier: SharedNotifier,
    clock: Arc<dyn Clock>,
    tax_rate_bps: u32,
}

impl OrderService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        store: SharedStore,
        issuance: Arc<TicketIssuance>,
        notifier: SharedNotifier,
        clock: Arc<dyn Clock>,
        tax_rate_bps: u32,
    ) -> Self {
        Self {
            store,
            issuance,
            notifier,
            clock,
            tax_rate_bps,
        }
    }

    /// Validates inventory, prices the request, and persists a pending
    /// order (or an immediately-paid one when the total is zero).
    ///
    /// The availability check here is a re-validation, not a lock: two
    /// buyers racing for the last unit can both pass it. See the
    /// inventory module notes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`], [`Error::SoldOut`], or
    /// [`Error::SeatUnavailable`] for requests that cannot be satisfied.
    pub async fn create_order(&self, request: NewOrder) -> Result<(Order, Vec<OrderItem>)> {
        if request.items.is_empty() {
            return Err(Error::Validation(
                "an order needs at least one item".to_string(),
            ));
        }
        let now = self.clock.now();

        let mut ticket_types = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let ticket_type = self
                .store
                .ticket_type(item.ticket_type_id)
                .await?
                .ok_or_else(|| Error::not_found("ticket type", item.ticket_type_id))?;
            inventory::check_reservation(
                self.store.as_ref(),
                &ticket_type,
                item.seat_id,
                item.quantity,
                now,
            )
            .await?;
            ticket_types.push(ticket_type);
        }

        let first = &ticket_types[0];
        if ticket_types
            .iter()
            .any(|tt| tt.event_id != first.event_id || tt.currency != first.currency)
        {
            return Err(Error::Validation(
                "all items must belong to one event and one currency".to_string(),
            ));
        }

        let fees = self
            .store
            .fee_snapshot(first.organization_id, now)
            .await?;
        let priced: Vec<PricedItem> = request
            .items
            .iter()
            .zip(&ticket_types)
            .map(|(item, tt)| PricedItem {
                unit_price: tt.price,
                quantity: item.quantity,
            })
            .collect();
        let totals = price_order(&priced, &fees, self.tax_rate_bps, request.discount);

        let order = Order {
            id: OrderId::new(),
            buyer_id: request.buyer_id,
            organization_id: first.organization_id,
            event_id: first.event_id,
            status: OrderStatus::Pending,
            subtotal: totals.subtotal,
            fees: totals.fees,
            tax: totals.tax,
            discount: totals.discount,
            total: totals.total,
            currency: first.currency.clone(),
            created_at: now,
            paid_at: None,
            canceled_at: None,
        };
        let unit_fee = fees.fixed_per_ticket();
        let items: Vec<OrderItem> = request
            .items
            .iter()
            .zip(&ticket_types)
            .map(|(item, tt)| OrderItem {
                id: OrderItemId::new(),
                order_id: order.id,
                ticket_type_id: tt.id,
                seat_id: item.seat_id,
                quantity: item.quantity,
                unit_price: tt.price,
                unit_fee,
            })
            .collect();

        self.store.insert_order(&order, &items).await?;
        info!(order_id = %order.id, total = %order.total, "order created");

        if totals.is_free() {
            // No payment record for free orders: paid on the spot,
            // issuance runs synchronously.
            self.store.mark_order_paid(order.id, now).await?;
            notify(self.notifier.order_confirmed(order.id), "order_confirmed").await;
            self.issuance.ensure_tickets_for_order(order.id).await?;
        }

        let order = self
            .store
            .order(order.id)
            .await?
            .ok_or_else(|| Error::not_found("order", order.id))?;
        Ok((order, items))
    }

    /// `pending -> canceled`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] unless the order is pending.
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order> {
        if !self
            .store
            .mark_order_canceled(order_id, self.clock.now())
            .await?
        {
            let order = self
                .store
                .order(order_id)
                .await?
                .ok_or_else(|| Error::not_found("order", order_id))?;
            return Err(Error::Conflict(format!(
                "only pending orders can be canceled; order {order_id} is {}",
                order.status.as_str()
            )));
        }
        info!(%order_id, "order canceled");
        self.store
            .order(order_id)
            .await?
            .ok_or_else(|| Error::not_found("order", order_id))
    }
}
