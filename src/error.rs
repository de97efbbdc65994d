//! Error taxonomy for settlement operations.

use thiserror::Error;

/// Result type alias for settlement operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the settlement pipeline.
///
/// Every failure an operation can surface falls into one of these
/// categories; callers decide retry policy. Side-effect failures
/// (notifications) are never represented here — they are logged and
/// swallowed at the call site.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad input: unknown provider, currency mismatch, over-refund amount.
    /// Rejected synchronously; no state change.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown order/payment/refund id. No state change.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind ("order", "payment", "refund", "ticket type").
        entity: &'static str,
        /// Identifier that failed to resolve.
        id: String,
    },

    /// Requested quantity exceeds remaining general-admission capacity.
    #[error("ticket type {ticket_type} sold out: requested {requested}, available {available}")]
    SoldOut {
        /// Ticket type that ran out.
        ticket_type: String,
        /// Units requested.
        requested: u32,
        /// Units still available.
        available: u32,
    },

    /// The specific seat already has a live ticket or hold.
    #[error("seat {seat} is unavailable")]
    SeatUnavailable {
        /// Seat that is taken.
        seat: String,
    },

    /// Network or provider failure during initialize/confirm/refund.
    /// Recoverable; the caller decides whether to retry.
    #[error("provider {provider} error: {message}")]
    Provider {
        /// Provider name.
        provider: String,
        /// Provider-assigned error code, when available.
        code: Option<String>,
        /// Human-readable provider message.
        message: String,
    },

    /// Illegal state transition (double-closing a refund, paying a
    /// canceled order). Where a repeat is safe it is absorbed as a no-op
    /// before reaching this variant.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Webhook signature could not be verified. Always rejected, never
    /// silently accepted.
    #[error("webhook authenticity check failed: {0}")]
    Authenticity(String),

    /// Storage failure.
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl Error {
    /// Shorthand for a provider error.
    #[must_use]
    pub fn provider(
        provider: impl Into<String>,
        code: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            code,
            message: message.into(),
        }
    }

    /// Shorthand for a not-found error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether a provider error message indicates the refund already
    /// exists at the provider (idempotency collision). The refund
    /// lifecycle reclassifies these as success.
    #[must_use]
    pub fn is_already_refunded(&self) -> bool {
        match self {
            Self::Provider { message, code, .. } => {
                let msg = message.to_ascii_lowercase();
                msg.contains("already refunded")
                    || msg.contains("already been refunded")
                    || msg.contains("refund already exists")
                    || code.as_deref() == Some("charge_already_refunded")
                    || code.as_deref() == Some("duplicate_refund")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_refunded_detection() {
        let err = Error::Provider {
            provider: "stripe".into(),
            code: Some("charge_already_refunded".into()),
            message: "Charge ch_1 has already been refunded.".into(),
        };
        assert!(err.is_already_refunded());

        let err = Error::provider("stripe", None, "card_declined");
        assert!(!err.is_already_refunded());

        let err = Error::Validation("nope".into());
        assert!(!err.is_already_refunded());
    }
}
