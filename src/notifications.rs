//! Outbound buyer notifications.
//!
//! Delivery is best-effort: settlement state never rolls back because an
//! email failed, so callers route failures through [`notify`], which logs
//! and moves on.

use crate::error::Result;
use crate::types::{OrderId, RefundId, RefundStatus};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Shared handle to a notifier.
pub type SharedNotifier = Arc<dyn Notifier>;

/// Buyer-facing notification sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// The order's payment was captured.
    async fn order_confirmed(&self, order_id: OrderId) -> Result<()>;

    /// Tickets were issued for the order.
    async fn tickets_ready(&self, order_id: OrderId, ticket_count: usize) -> Result<()>;

    /// A refund changed status.
    async fn refund_update(&self, refund_id: RefundId, status: RefundStatus) -> Result<()>;
}

/// Awaits a notification future and downgrades failure to a warning.
pub async fn notify(
    sent: impl std::future::Future<Output = Result<()>> + Send,
    what: &'static str,
) {
    if let Err(error) = sent.await {
        warn!(%error, what, "notification delivery failed");
    }
}

/// Notifier that writes to the log stream; the default in environments
/// without a mail integration.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn order_confirmed(&self, order_id: OrderId) -> Result<()> {
        info!(%order_id, "order confirmed");
        Ok(())
    }

    async fn tickets_ready(&self, order_id: OrderId, ticket_count: usize) -> Result<()> {
        info!(%order_id, ticket_count, "tickets ready");
        Ok(())
    }

    async fn refund_update(&self, refund_id: RefundId, status: RefundStatus) -> Result<()> {
        info!(%refund_id, status = status.as_str(), "refund update");
        Ok(())
    }
}

/// One recorded notification (test observability).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SentNotification {
    /// Payment captured for an order.
    OrderConfirmed(OrderId),
    /// Tickets issued for an order.
    TicketsReady(OrderId, usize),
    /// Refund status change.
    RefundUpdate(RefundId, RefundStatus),
}

/// Notifier that records every delivery for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, in order.
    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn order_confirmed(&self, order_id: OrderId) -> Result<()> {
        self.sent
            .lock()
            .await
            .push(SentNotification::OrderConfirmed(order_id));
        Ok(())
    }

    async fn tickets_ready(&self, order_id: OrderId, ticket_count: usize) -> Result<()> {
        self.sent
            .lock()
            .await
            .push(SentNotification::TicketsReady(order_id, ticket_count));
        Ok(())
    }

    async fn refund_update(&self, refund_id: RefundId, status: RefundStatus) -> Result<()> {
        self.sent
            .lock()
            .await
            .push(SentNotification::RefundUpdate(refund_id, status));
        Ok(())
    }
}
