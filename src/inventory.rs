//! Inventory reservation check.
//!
//! A read-time availability gate, not a lock: two orders racing for the
//! last unit can both pass and both be created. Oversell control beyond
//! this check belongs to holds created upstream of order creation.

use crate::error::{Error, Result};
use crate::store::SettlementStore;
use crate::types::{SeatId, TicketType, TicketTypeKind};
use chrono::{DateTime, Utc};

/// Units still sellable for a general-admission ticket type at `now`:
/// capacity minus non-void tickets minus unexpired holds, floored at zero.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn available_count(
    store: &dyn SettlementStore,
    ticket_type: &TicketType,
    now: DateTime<Utc>,
) -> Result<u32> {
    let sold = store.sold_ticket_count(ticket_type.id).await?;
    let held = store.active_hold_count(ticket_type.id, now).await?;
    Ok(ticket_type
        .capacity
        .saturating_sub(sold)
        .saturating_sub(held))
}

/// Validates that a requested reservation fits current availability.
///
/// General admission: `quantity` must not exceed [`available_count`].
/// Seated: a seat is required, the quantity must be exactly one, and the
/// seat must have neither a non-void ticket nor an unexpired hold.
///
/// # Errors
///
/// Returns [`Error::SoldOut`], [`Error::SeatUnavailable`], or
/// [`Error::Validation`] when the reservation cannot be satisfied.
pub async fn check_reservation(
    store: &dyn SettlementStore,
    ticket_type: &TicketType,
    seat: Option<SeatId>,
    quantity: u32,
    now: DateTime<Utc>,
) -> Result<()> {
    if quantity == 0 {
        return Err(Error::Validation("quantity must be at least 1".to_string()));
    }

    match ticket_type.kind {
        TicketTypeKind::GeneralAdmission => {
            if seat.is_some() {
                return Err(Error::Validation(
                    "general admission items cannot name a seat".to_string(),
                ));
            }
            let available = available_count(store, ticket_type, now).await?;
            if quantity > available {
                return Err(Error::SoldOut {
                    ticket_type: ticket_type.id.to_string(),
                    requested: quantity,
                    available,
                });
            }
        }
        TicketTypeKind::Seated => {
            let Some(seat) = seat else {
                return Err(Error::Validation(
                    "seated items must name a seat".to_string(),
                ));
            };
            if quantity != 1 {
                return Err(Error::Validation(
                    "seated items are one seat per item".to_string(),
                ));
            }
            if store.seat_unavailable(seat, now).await? {
                return Err(Error::SeatUnavailable {
                    seat: seat.to_string(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{
        Currency, EventId, Hold, HoldId, Money, Order, OrderId, OrderStatus, OrganizationId,
        Ticket, TicketId, TicketStatus, TicketTypeId, UserId,
    };
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn ga_type(capacity: u32) -> TicketType {
        TicketType {
            id: TicketTypeId::new(),
            event_id: EventId::new(),
            organization_id: OrganizationId::new(),
            name: "General Admission".to_string(),
            kind: TicketTypeKind::GeneralAdmission,
            capacity,
            price: Money::from_cents(2500),
            currency: Currency::new("usd"),
        }
    }

    fn seated_type() -> TicketType {
        TicketType {
            kind: TicketTypeKind::Seated,
            name: "Reserved".to_string(),
            ..ga_type(0)
        }
    }

    fn order_for(tt: &TicketType) -> Order {
        Order {
            id: OrderId::new(),
            buyer_id: UserId::new(),
            organization_id: tt.organization_id,
            event_id: tt.event_id,
            status: OrderStatus::Paid,
            subtotal: Money::ZERO,
            fees: Money::ZERO,
            tax: Money::ZERO,
            discount: Money::ZERO,
            total: Money::ZERO,
            currency: Currency::new("usd"),
            created_at: now(),
            paid_at: Some(now()),
            canceled_at: None,
        }
    }

    fn ticket(tt: &TicketType, order: &Order, seat: Option<SeatId>, status: TicketStatus) -> Ticket {
        Ticket {
            id: TicketId::new(),
            order_id: order.id,
            event_id: tt.event_id,
            ticket_type_id: tt.id,
            seat_id: seat,
            owner_id: order.buyer_id,
            status,
            barcode: format!("BX-{}", TicketId::new()),
            qr_code: None,
            issued_at: now(),
        }
    }

    #[tokio::test]
    async fn sold_and_held_units_reduce_availability() {
        let store = MemoryStore::new();
        let tt = ga_type(10);
        store.insert_ticket_type(&tt).await.unwrap();
        let order = order_for(&tt);
        store.insert_order(&order, &[]).await.unwrap();
        for _ in 0..3 {
            store
                .insert_ticket_if_absent(&ticket(&tt, &order, None, TicketStatus::Issued))
                .await
                .unwrap();
        }
        store
            .insert_hold(&Hold {
                id: HoldId::new(),
                ticket_type_id: tt.id,
                seat_id: None,
                quantity: 4,
                expires_at: now() + chrono::Duration::minutes(10),
            })
            .await
            .unwrap();

        assert_eq!(available_count(&store, &tt, now()).await.unwrap(), 3);
        assert!(check_reservation(&store, &tt, None, 3, now()).await.is_ok());
        let err = check_reservation(&store, &tt, None, 4, now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::SoldOut {
                requested: 4,
                available: 3,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn expired_holds_and_void_tickets_do_not_count() {
        let store = MemoryStore::new();
        let tt = ga_type(2);
        store.insert_ticket_type(&tt).await.unwrap();
        let order = order_for(&tt);
        store.insert_order(&order, &[]).await.unwrap();
        store
            .insert_ticket_if_absent(&ticket(&tt, &order, None, TicketStatus::Void))
            .await
            .unwrap();
        store
            .insert_hold(&Hold {
                id: HoldId::new(),
                ticket_type_id: tt.id,
                seat_id: None,
                quantity: 2,
                expires_at: now() - chrono::Duration::minutes(1),
            })
            .await
            .unwrap();

        assert_eq!(available_count(&store, &tt, now()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn seated_requires_exactly_one_free_seat() {
        let store = MemoryStore::new();
        let tt = seated_type();
        store.insert_ticket_type(&tt).await.unwrap();
        let seat = SeatId::new();

        // Missing seat and multi-seat quantities are both rejected.
        assert!(matches!(
            check_reservation(&store, &tt, None, 1, now()).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            check_reservation(&store, &tt, Some(seat), 2, now()).await,
            Err(Error::Validation(_))
        ));

        assert!(check_reservation(&store, &tt, Some(seat), 1, now())
            .await
            .is_ok());

        let order = order_for(&tt);
        store.insert_order(&order, &[]).await.unwrap();
        store
            .insert_ticket_if_absent(&ticket(&tt, &order, Some(seat), TicketStatus::Issued))
            .await
            .unwrap();
        assert!(matches!(
            check_reservation(&store, &tt, Some(seat), 1, now()).await,
            Err(Error::SeatUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn held_seat_is_unavailable_until_expiry() {
        let store = MemoryStore::new();
        let tt = seated_type();
        let seat = SeatId::new();
        store
            .insert_hold(&Hold {
                id: HoldId::new(),
                ticket_type_id: tt.id,
                seat_id: Some(seat),
                quantity: 1,
                expires_at: now() + chrono::Duration::minutes(5),
            })
            .await
            .unwrap();

        assert!(matches!(
            check_reservation(&store, &tt, Some(seat), 1, now()).await,
            Err(Error::SeatUnavailable { .. })
        ));
        let later = now() + chrono::Duration::minutes(6);
        assert!(check_reservation(&store, &tt, Some(seat), 1, later)
            .await
            .is_ok());
    }
}
