//! Idempotent ticket issuance.
//!
//! Issuance can be triggered from the synchronous confirm path, the
//! webhook reconciler, or a retried webhook, and must converge to exactly
//! one ticket per `(order item, index)` pair. The barcode is the
//! idempotency key: a deterministic digest of the pair's stable identity,
//! enforced unique at the storage layer.

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::notifications::{notify, SharedNotifier};
use crate::store::SharedStore;
use crate::types::{
    OrderId, OrderStatus, SeatId, Ticket, TicketId, TicketStatus, TicketTypeId,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;

/// Deterministic barcode for one `(order, ticket type, seat, index)` slot:
/// `BX-` plus the first twenty uppercase hex characters of the SHA-256 of
/// the slot identity.
#[must_use]
pub fn barcode(
    order_id: OrderId,
    ticket_type_id: TicketTypeId,
    seat: Option<SeatId>,
    index: u32,
) -> String {
    let seat_part = seat.map_or_else(|| "ga".to_string(), |s| s.to_string());
    let digest = Sha256::digest(
        format!("{order_id}:{ticket_type_id}:{seat_part}:{index}").as_bytes(),
    );
    let hex = hex::encode_upper(digest);
    format!("BX-{}", &hex[..20])
}

/// Presentation QR payload for an issued ticket.
#[must_use]
pub fn qr_payload(ticket_id: TicketId, barcode: &str) -> String {
    format!("boxoffice:v1:{ticket_id}:{barcode}")
}

/// Converts paid orders into ticket rows exactly once.
pub struct TicketIssuance {
    store: SharedStore,
    notifier: SharedNotifier,
    clock: Arc<dyn Clock>,
}

impl TicketIssuance {
    /// Creates the service.
    #[must_use]
    pub fn new(store: SharedStore, notifier: SharedNotifier, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            notifier,
            clock,
        }
    }

    /// Ensures every expected ticket for the order exists; safe to call
    /// any number of times and from racing triggers. Returns the order's
    /// tickets. The "tickets ready" notification goes out only on a call
    /// that newly created at least one ticket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown order and
    /// [`Error::Conflict`] when the order is not paid.
    pub async fn ensure_tickets_for_order(&self, order_id: OrderId) -> Result<Vec<Ticket>> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or_else(|| Error::not_found("order", order_id))?;
        if order.status != OrderStatus::Paid {
            return Err(Error::Conflict(format!(
                "tickets are only issued for paid orders; order {order_id} is {}",
                order.status.as_str()
            )));
        }

        let items = self.store.order_items(order_id).await?;
        let mut created = 0usize;

        for item in &items {
            for index in 0..item.quantity {
                let barcode = barcode(order_id, item.ticket_type_id, item.seat_id, index);
                let ticket = Ticket {
                    id: TicketId::new(),
                    order_id,
                    event_id: order.event_id,
                    ticket_type_id: item.ticket_type_id,
                    seat_id: item.seat_id,
                    owner_id: order.buyer_id,
                    status: TicketStatus::Issued,
                    barcode: barcode.clone(),
                    qr_code: None,
                    issued_at: self.clock.now(),
                };
                if self.store.insert_ticket_if_absent(&ticket).await? {
                    // Two-phase: the QR payload derives from the assigned
                    // ticket id, so it is populated after the row exists.
                    // It is presentation-only and not part of issuance
                    // readiness.
                    self.store
                        .set_ticket_code(ticket.id, &qr_payload(ticket.id, &barcode))
                        .await?;
                    created += 1;
                }
            }
        }

        let tickets = self.store.tickets_for_order(order_id).await?;
        if created > 0 {
            info!(%order_id, created, total = tickets.len(), "tickets issued");
            notify(
                self.notifier.tickets_ready(order_id, tickets.len()),
                "tickets_ready",
            )
            .await;
        }
        Ok(tickets)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::notifications::{RecordingNotifier, SentNotification};
    use crate::store::{MemoryStore, SettlementStore};
    use crate::types::{
        Currency, EventId, Money, Order, OrderItem, OrderItemId, OrganizationId, UserId,
    };
    use chrono::{TimeZone, Utc};

    fn fixture() -> (Arc<MemoryStore>, Arc<RecordingNotifier>, TicketIssuance) {
        let store = MemoryStore::shared();
        let notifier = Arc::new(RecordingNotifier::new());
        let issuance = TicketIssuance::new(
            store.clone(),
            notifier.clone(),
            FixedClock::shared(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()),
        );
        (store, notifier, issuance)
    }

    async fn paid_order(store: &MemoryStore, quantity: u32) -> Order {
        let order = Order {
            id: OrderId::new(),
            buyer_id: UserId::new(),
            organization_id: OrganizationId::new(),
            event_id: EventId::new(),
            status: OrderStatus::Paid,
            subtotal: Money::from_cents(5000),
            fees: Money::ZERO,
            tax: Money::from_cents(350),
            discount: Money::ZERO,
            total: Money::from_cents(5350),
            currency: Currency::new("USD"),
            created_at: Utc::now(),
            paid_at: Some(Utc::now()),
            canceled_at: None,
        };
        let item = OrderItem {
            id: OrderItemId::new(),
            order_id: order.id,
            ticket_type_id: TicketTypeId::new(),
            seat_id: None,
            quantity,
            unit_price: Money::from_cents(2500),
            unit_fee: Money::ZERO,
        };
        store.insert_order(&order, &[item]).await.unwrap();
        order
    }

    #[test]
    fn barcode_is_deterministic_and_slot_unique() {
        let order = OrderId::new();
        let tt = TicketTypeId::new();
        assert_eq!(barcode(order, tt, None, 0), barcode(order, tt, None, 0));
        assert_ne!(barcode(order, tt, None, 0), barcode(order, tt, None, 1));
        let seat = SeatId::new();
        assert_ne!(
            barcode(order, tt, Some(seat), 0),
            barcode(order, tt, None, 0)
        );
        assert!(barcode(order, tt, None, 0).starts_with("BX-"));
        assert_eq!(barcode(order, tt, None, 0).len(), 23);
    }

    #[tokio::test]
    async fn issues_exactly_quantity_tickets_with_qr_codes() {
        let (store, _, issuance) = fixture();
        let order = paid_order(&store, 2).await;

        let tickets = issuance.ensure_tickets_for_order(order.id).await.unwrap();
        assert_eq!(tickets.len(), 2);
        assert_ne!(tickets[0].barcode, tickets[1].barcode);
        for ticket in &tickets {
            assert_eq!(ticket.status, TicketStatus::Issued);
            let qr = ticket.qr_code.as_ref().unwrap();
            assert_eq!(qr, &qr_payload(ticket.id, &ticket.barcode));
        }
    }

    #[tokio::test]
    async fn repeated_runs_converge_and_notify_once() {
        let (store, notifier, issuance) = fixture();
        let order = paid_order(&store, 3).await;

        for _ in 0..4 {
            issuance.ensure_tickets_for_order(order.id).await.unwrap();
        }

        let tickets = store.tickets_for_order(order.id).await.unwrap();
        assert_eq!(tickets.len(), 3);
        let sent = notifier.sent().await;
        assert_eq!(sent, vec![SentNotification::TicketsReady(order.id, 3)]);
    }

    #[tokio::test]
    async fn pending_order_is_rejected() {
        let (store, _, issuance) = fixture();
        let mut order = paid_order(&store, 1).await;
        order.status = OrderStatus::Pending;
        order.paid_at = None;
        let pending = Order {
            id: OrderId::new(),
            ..order
        };
        store.insert_order(&pending, &[]).await.unwrap();

        let err = issuance
            .ensure_tickets_for_order(pending.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }
}
