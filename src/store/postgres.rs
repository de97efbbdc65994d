//! `PostgreSQL`-backed settlement store.
//!
//! All queries are runtime-checked; money is stored as cents in `BIGINT`
//! columns and statuses as their storage string forms. Conditional
//! transitions are `UPDATE ... WHERE status = ...` guards so idempotency
//! under concurrent triggers is enforced by the database, and ticket
//! uniqueness rides on the barcode unique index with
//! `ON CONFLICT DO NOTHING`.

use super::SettlementStore;
use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::pricing::FeeSnapshot;
use crate::types::{
    Currency, DisputeRecord, EventId, FeeKind, FeeSchedule, FeeScheduleId, Hold, Money,
    Order, OrderId, OrderItem, OrderItemId, OrderStatus, OrgFeeOverride, OrganizationId, Payment,
    PaymentId, PaymentStatus, Refund, RefundId, RefundStatus, SeatId, Ticket, TicketId,
    TicketStatus, TicketType, TicketTypeId, TicketTypeKind, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use uuid::Uuid;

/// Settlement store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .connect(&config.url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Creates the schema if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if any DDL statement fails.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("schema.sql"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ============================================================================
// Column conversions
// ============================================================================

fn money_to_db(money: Money) -> i64 {
    i64::try_from(money.cents()).unwrap_or(i64::MAX)
}

fn money_from_db(cents: i64) -> Money {
    Money::from_cents(u64::try_from(cents).unwrap_or(0))
}

fn quantity_to_db(quantity: u32) -> i32 {
    i32::try_from(quantity).unwrap_or(i32::MAX)
}

fn quantity_from_db(quantity: i32) -> u32 {
    u32::try_from(quantity).unwrap_or(0)
}

fn decode<T>(parsed: Option<T>, column: &'static str, raw: &str) -> Result<T> {
    parsed.ok_or_else(|| {
        Error::Database(sqlx::Error::Decode(
            format!("unrecognized {column} value: {raw}").into(),
        ))
    })
}

// ============================================================================
// Row mapping
// ============================================================================

fn order_from_row(row: &PgRow) -> Result<Order> {
    let status_raw: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id")?),
        buyer_id: UserId::from_uuid(row.try_get("buyer_id")?),
        organization_id: OrganizationId::from_uuid(row.try_get("organization_id")?),
        event_id: EventId::from_uuid(row.try_get("event_id")?),
        status: decode(OrderStatus::parse(&status_raw), "order status", &status_raw)?,
        subtotal: money_from_db(row.try_get("subtotal_cents")?),
        fees: money_from_db(row.try_get("fees_cents")?),
        tax: money_from_db(row.try_get("tax_cents")?),
        discount: money_from_db(row.try_get("discount_cents")?),
        total: money_from_db(row.try_get("total_cents")?),
        currency: Currency::new(row.try_get::<String, _>("currency")?),
        created_at: row.try_get("created_at")?,
        paid_at: row.try_get("paid_at")?,
        canceled_at: row.try_get("canceled_at")?,
    })
}

fn order_item_from_row(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        ticket_type_id: TicketTypeId::from_uuid(row.try_get("ticket_type_id")?),
        seat_id: row
            .try_get::<Option<Uuid>, _>("seat_id")?
            .map(SeatId::from_uuid),
        quantity: quantity_from_db(row.try_get("quantity")?),
        unit_price: money_from_db(row.try_get("unit_price_cents")?),
        unit_fee: money_from_db(row.try_get("unit_fee_cents")?),
    })
}

fn payment_from_row(row: &PgRow) -> Result<Payment> {
    let status_raw: String = row.try_get("status")?;
    Ok(Payment {
        id: PaymentId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        provider: row.try_get("provider")?,
        intent_ref: row.try_get("intent_ref")?,
        charge_ref: row.try_get("charge_ref")?,
        status: decode(
            PaymentStatus::parse(&status_raw),
            "payment status",
            &status_raw,
        )?,
        amount: money_from_db(row.try_get("amount_cents")?),
        currency: Currency::new(row.try_get::<String, _>("currency")?),
        captured_at: row.try_get("captured_at")?,
        failure_code: row.try_get("failure_code")?,
        failure_message: row.try_get("failure_message")?,
        created_at: row.try_get("created_at")?,
    })
}

fn refund_from_row(row: &PgRow) -> Result<Refund> {
    let status_raw: String = row.try_get("status")?;
    Ok(Refund {
        id: RefundId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        amount: money_from_db(row.try_get("amount_cents")?),
        currency: Currency::new(row.try_get::<String, _>("currency")?),
        reason: row.try_get("reason")?,
        status: decode(
            RefundStatus::parse(&status_raw),
            "refund status",
            &status_raw,
        )?,
        provider_ref: row.try_get("provider_ref")?,
        processed_at: row.try_get("processed_at")?,
        created_by: UserId::from_uuid(row.try_get("created_by")?),
        resolution_note: row.try_get("resolution_note")?,
        created_at: row.try_get("created_at")?,
    })
}

fn ticket_from_row(row: &PgRow) -> Result<Ticket> {
    let status_raw: String = row.try_get("status")?;
    Ok(Ticket {
        id: TicketId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        event_id: EventId::from_uuid(row.try_get("event_id")?),
        ticket_type_id: TicketTypeId::from_uuid(row.try_get("ticket_type_id")?),
        seat_id: row
            .try_get::<Option<Uuid>, _>("seat_id")?
            .map(SeatId::from_uuid),
        owner_id: UserId::from_uuid(row.try_get("owner_id")?),
        status: decode(
            TicketStatus::parse(&status_raw),
            "ticket status",
            &status_raw,
        )?,
        barcode: row.try_get("barcode")?,
        qr_code: row.try_get("qr_code")?,
        issued_at: row.try_get("issued_at")?,
    })
}

fn ticket_type_from_row(row: &PgRow) -> Result<TicketType> {
    let kind_raw: String = row.try_get("kind")?;
    Ok(TicketType {
        id: TicketTypeId::from_uuid(row.try_get("id")?),
        event_id: EventId::from_uuid(row.try_get("event_id")?),
        organization_id: OrganizationId::from_uuid(row.try_get("organization_id")?),
        name: row.try_get("name")?,
        kind: decode(
            TicketTypeKind::parse(&kind_raw),
            "ticket type kind",
            &kind_raw,
        )?,
        capacity: quantity_from_db(row.try_get("capacity")?),
        price: money_from_db(row.try_get("price_cents")?),
        currency: Currency::new(row.try_get::<String, _>("currency")?),
    })
}

fn fee_schedule_from_row(row: &PgRow) -> Result<FeeSchedule> {
    let kind_raw: String = row.try_get("kind")?;
    Ok(FeeSchedule {
        id: FeeScheduleId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        kind: decode(FeeKind::parse(&kind_raw), "fee kind", &kind_raw)?,
        percent_bps: quantity_from_db(row.try_get("percent_bps")?),
        fixed: money_from_db(row.try_get("fixed_cents")?),
        is_default: row.try_get("is_default")?,
    })
}

#[async_trait]
impl SettlementStore for PostgresStore {
    async fn ticket_type(&self, id: TicketTypeId) -> Result<Option<TicketType>> {
        let row = sqlx::query("SELECT * FROM ticket_types WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(ticket_type_from_row).transpose()
    }

    async fn fee_snapshot(&self, org: OrganizationId, now: DateTime<Utc>) -> Result<FeeSnapshot> {
        let base_rows = sqlx::query("SELECT * FROM fee_schedules WHERE is_default")
            .fetch_all(&self.pool)
            .await?;
        let override_rows = sqlx::query(
            "SELECT s.* FROM org_fee_overrides o \
             JOIN fee_schedules s ON s.id = o.fee_schedule_id \
             WHERE o.organization_id = $1 \
               AND o.starts_at <= $2 \
               AND (o.ends_at IS NULL OR o.ends_at > $2)",
        )
        .bind(org.as_uuid())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(FeeSnapshot {
            base: base_rows
                .iter()
                .map(fee_schedule_from_row)
                .collect::<Result<_>>()?,
            overrides: override_rows
                .iter()
                .map(fee_schedule_from_row)
                .collect::<Result<_>>()?,
        })
    }

    async fn organization_suspended(&self, org: OrganizationId) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM suspended_organizations WHERE organization_id = $1) AS suspended",
        )
        .bind(org.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("suspended")?)
    }

    async fn sold_ticket_count(&self, ticket_type: TicketTypeId) -> Result<u32> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS sold FROM tickets WHERE ticket_type_id = $1 AND status <> 'void'",
        )
        .bind(ticket_type.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        let sold: i64 = row.try_get("sold")?;
        Ok(u32::try_from(sold).unwrap_or(u32::MAX))
    }

    async fn active_hold_count(
        &self,
        ticket_type: TicketTypeId,
        now: DateTime<Utc>,
    ) -> Result<u32> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(quantity), 0) AS held FROM holds \
             WHERE ticket_type_id = $1 AND expires_at > $2",
        )
        .bind(ticket_type.as_uuid())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        let held: i64 = row.try_get("held")?;
        Ok(u32::try_from(held).unwrap_or(u32::MAX))
    }

    async fn seat_unavailable(&self, seat: SeatId, now: DateTime<Utc>) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM tickets WHERE seat_id = $1 AND status <> 'void') \
                 OR EXISTS(SELECT 1 FROM holds WHERE seat_id = $1 AND expires_at > $2) \
                 AS taken",
        )
        .bind(seat.as_uuid())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("taken")?)
    }

    async fn insert_order(&self, order: &Order, items: &[OrderItem]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO orders \
             (id, buyer_id, organization_id, event_id, status, subtotal_cents, fees_cents, \
              tax_cents, discount_cents, total_cents, currency, created_at, paid_at, canceled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(order.id.as_uuid())
        .bind(order.buyer_id.as_uuid())
        .bind(order.organization_id.as_uuid())
        .bind(order.event_id.as_uuid())
        .bind(order.status.as_str())
        .bind(money_to_db(order.subtotal))
        .bind(money_to_db(order.fees))
        .bind(money_to_db(order.tax))
        .bind(money_to_db(order.discount))
        .bind(money_to_db(order.total))
        .bind(order.currency.as_str())
        .bind(order.created_at)
        .bind(order.paid_at)
        .bind(order.canceled_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO order_items \
                 (id, order_id, ticket_type_id, seat_id, quantity, unit_price_cents, unit_fee_cents) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(item.id.as_uuid())
            .bind(item.order_id.as_uuid())
            .bind(item.ticket_type_id.as_uuid())
            .bind(item.seat_id.as_ref().map(SeatId::as_uuid))
            .bind(quantity_to_db(item.quantity))
            .bind(money_to_db(item.unit_price))
            .bind(money_to_db(item.unit_fee))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query("SELECT * FROM order_items WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(order_item_from_row).collect()
    }

    async fn mark_order_paid(&self, id: OrderId, paid_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'paid', paid_at = $2 \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id.as_uuid())
        .bind(paid_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_order_canceled(&self, id: OrderId, canceled_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'canceled', canceled_at = $2 \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id.as_uuid())
        .bind(canceled_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_order_refunded(&self, id: OrderId) -> Result<bool> {
        let result =
            sqlx::query("UPDATE orders SET status = 'refunded' WHERE id = $1 AND status = 'paid'")
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            "INSERT INTO payments \
             (id, order_id, provider, intent_ref, charge_ref, status, amount_cents, currency, \
              captured_at, failure_code, failure_message, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(payment.id.as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(&payment.provider)
        .bind(&payment.intent_ref)
        .bind(payment.charge_ref.as_deref())
        .bind(payment.status.as_str())
        .bind(money_to_db(payment.amount))
        .bind(payment.currency.as_str())
        .bind(payment.captured_at)
        .bind(payment.failure_code.as_deref())
        .bind(payment.failure_message.as_deref())
        .bind(payment.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query("SELECT * FROM payments WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(payment_from_row).transpose()
    }

    async fn latest_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let row = sqlx::query(
            "SELECT * FROM payments WHERE order_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(payment_from_row).transpose()
    }

    async fn payment_for_order_by_ref(
        &self,
        order_id: OrderId,
        provider_ref: &str,
    ) -> Result<Option<Payment>> {
        let row = sqlx::query(
            "SELECT * FROM payments \
             WHERE order_id = $1 AND (intent_ref = $2 OR charge_ref = $2) \
             LIMIT 1",
        )
        .bind(order_id.as_uuid())
        .bind(provider_ref)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(payment_from_row).transpose()
    }

    async fn payment_by_provider_ref(
        &self,
        provider: &str,
        provider_ref: &str,
    ) -> Result<Option<Payment>> {
        let row = sqlx::query(
            "SELECT * FROM payments \
             WHERE provider = $1 AND (intent_ref = $2 OR charge_ref = $2) \
             LIMIT 1",
        )
        .bind(provider)
        .bind(provider_ref)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(payment_from_row).transpose()
    }

    async fn captured_payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let row = sqlx::query(
            "SELECT * FROM payments WHERE order_id = $1 AND status = 'captured' LIMIT 1",
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(payment_from_row).transpose()
    }

    async fn settle_payment(
        &self,
        payment_id: PaymentId,
        order_id: OrderId,
        captured_at: DateTime<Utc>,
        charge_ref: Option<&str>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let captured = sqlx::query(
            "UPDATE payments \
             SET status = 'captured', captured_at = $2, charge_ref = COALESCE($3, charge_ref) \
             WHERE id = $1 AND status = 'requires_action'",
        )
        .bind(payment_id.as_uuid())
        .bind(captured_at)
        .bind(charge_ref)
        .execute(&mut *tx)
        .await?;

        if captured.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "UPDATE orders SET status = 'paid', paid_at = $2 \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(order_id.as_uuid())
        .bind(captured_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn fail_payment(
        &self,
        payment_id: PaymentId,
        code: Option<&str>,
        message: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE payments \
             SET status = 'failed', failure_code = $2, failure_message = $3 \
             WHERE id = $1 AND status = 'requires_action'",
        )
        .bind(payment_id.as_uuid())
        .bind(code)
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_refund(&self, refund: &Refund) -> Result<()> {
        sqlx::query(
            "INSERT INTO refunds \
             (id, order_id, amount_cents, currency, reason, status, provider_ref, processed_at, \
              created_by, resolution_note, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(refund.id.as_uuid())
        .bind(refund.order_id.as_uuid())
        .bind(money_to_db(refund.amount))
        .bind(refund.currency.as_str())
        .bind(&refund.reason)
        .bind(refund.status.as_str())
        .bind(refund.provider_ref.as_deref())
        .bind(refund.processed_at)
        .bind(refund.created_by.as_uuid())
        .bind(refund.resolution_note.as_deref())
        .bind(refund.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn refund(&self, id: RefundId) -> Result<Option<Refund>> {
        let row = sqlx::query("SELECT * FROM refunds WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(refund_from_row).transpose()
    }

    async fn approve_refund(&self, id: RefundId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE refunds SET status = 'approved' WHERE id = $1 AND status = 'pending'",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn cancel_refund(&self, id: RefundId, note: Option<&str>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE refunds SET status = 'canceled', resolution_note = $2 \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id.as_uuid())
        .bind(note)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_refund_provider_ref(&self, id: RefundId, provider_ref: &str) -> Result<()> {
        sqlx::query("UPDATE refunds SET provider_ref = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(provider_ref)
            .execute(&self.pool)
            .await?;
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
        let result = sqlx::query(
            "UPDATE refunds \
             SET status = $2, provider_ref = COALESCE($3, provider_ref), processed_at = $4, \
                 resolution_note = COALESCE($5, resolution_note) \
             WHERE id = $1 AND status IN ('pending', 'approved')",
        )
        .bind(id.as_uuid())
        .bind(outcome.as_str())
        .bind(provider_ref)
        .bind(processed_at)
        .bind(note)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn refund_by_provider_ref(&self, provider_ref: &str) -> Result<Option<Refund>> {
        let row = sqlx::query("SELECT * FROM refunds WHERE provider_ref = $1 LIMIT 1")
            .bind(provider_ref)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(refund_from_row).transpose()
    }

    async fn newest_pending_refund_for_order(&self, order_id: OrderId) -> Result<Option<Refund>> {
        let row = sqlx::query(
            "SELECT * FROM refunds \
             WHERE order_id = $1 AND status IN ('pending', 'approved') \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(refund_from_row).transpose()
    }

    async fn processed_refund_total(&self, order_id: OrderId) -> Result<Money> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount_cents), 0) AS refunded FROM refunds \
             WHERE order_id = $1 AND status = 'processed'",
        )
        .bind(order_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        let refunded: i64 = row.try_get("refunded")?;
        Ok(money_from_db(refunded))
    }

    async fn insert_ticket_if_absent(&self, ticket: &Ticket) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO tickets \
             (id, order_id, event_id, ticket_type_id, seat_id, owner_id, status, barcode, \
              qr_code, issued_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (barcode) DO NOTHING",
        )
        .bind(ticket.id.as_uuid())
        .bind(ticket.order_id.as_uuid())
        .bind(ticket.event_id.as_uuid())
        .bind(ticket.ticket_type_id.as_uuid())
        .bind(ticket.seat_id.as_ref().map(SeatId::as_uuid))
        .bind(ticket.owner_id.as_uuid())
        .bind(ticket.status.as_str())
        .bind(&ticket.barcode)
        .bind(ticket.qr_code.as_deref())
        .bind(ticket.issued_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_ticket_code(&self, id: TicketId, qr_code: &str) -> Result<()> {
        sqlx::query("UPDATE tickets SET qr_code = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(qr_code)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn tickets_for_order(&self, order_id: OrderId) -> Result<Vec<Ticket>> {
        let rows = sqlx::query("SELECT * FROM tickets WHERE order_id = $1 ORDER BY barcode")
            .bind(order_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(ticket_from_row).collect()
    }

    async fn void_tickets_for_order(&self, order_id: OrderId) -> Result<u32> {
        let result = sqlx::query(
            "UPDATE tickets SET status = 'void' WHERE order_id = $1 AND status <> 'void'",
        )
        .bind(order_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(u32::try_from(result.rows_affected()).unwrap_or(u32::MAX))
    }

    async fn insert_dispute(&self, record: &DisputeRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO disputes (id, provider, provider_ref, dispute_ref, kind, recorded_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(record.id)
        .bind(&record.provider)
        .bind(&record.provider_ref)
        .bind(&record.dispute_ref)
        .bind(&record.kind)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_ticket_type(&self, ticket_type: &TicketType) -> Result<()> {
        sqlx::query(
            "INSERT INTO ticket_types \
             (id, event_id, organization_id, name, kind, capacity, price_cents, currency) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(ticket_type.id.as_uuid())
        .bind(ticket_type.event_id.as_uuid())
        .bind(ticket_type.organization_id.as_uuid())
        .bind(&ticket_type.name)
        .bind(ticket_type.kind.as_str())
        .bind(quantity_to_db(ticket_type.capacity))
        .bind(money_to_db(ticket_type.price))
        .bind(ticket_type.currency.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_fee_schedule(&self, schedule: &FeeSchedule) -> Result<()> {
        sqlx::query(
            "INSERT INTO fee_schedules (id, name, kind, percent_bps, fixed_cents, is_default) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(schedule.id.as_uuid())
        .bind(&schedule.name)
        .bind(schedule.kind.as_str())
        .bind(quantity_to_db(schedule.percent_bps))
        .bind(money_to_db(schedule.fixed))
        .bind(schedule.is_default)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_org_override(&self, org_override: &OrgFeeOverride) -> Result<()> {
        sqlx::query(
            "INSERT INTO org_fee_overrides (organization_id, fee_schedule_id, starts_at, ends_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(org_override.organization_id.as_uuid())
        .bind(org_override.fee_schedule_id.as_uuid())
        .bind(org_override.starts_at)
        .bind(org_override.ends_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_hold(&self, hold: &Hold) -> Result<()> {
        sqlx::query(
            "INSERT INTO holds (id, ticket_type_id, seat_id, quantity, expires_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(hold.id.as_uuid())
        .bind(hold.ticket_type_id.as_uuid())
        .bind(hold.seat_id.as_ref().map(SeatId::as_uuid))
        .bind(quantity_to_db(hold.quantity))
        .bind(hold.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_organization_suspended(
        &self,
        org: OrganizationId,
        suspended: bool,
    ) -> Result<()> {
        if suspended {
            sqlx::query(
                "INSERT INTO suspended_organizations (organization_id) VALUES ($1) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(org.as_uuid())
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query("DELETE FROM suspended_organizations WHERE organization_id = $1")
                .bind(org.as_uuid())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}
