//! Payment provider adapters.
//!
//! Each external network implements [`PaymentProvider`] once, translating
//! its own request/response shapes and success/failure vocabulary into the
//! uniform contract the orchestrator and reconciler consume. Providers are
//! selected at runtime through the name-keyed [`ProviderRegistry`].

mod mock;
mod paypal;
mod square;
mod stripe;

pub use mock::{MockBehavior, MockProvider};
pub use paypal::PayPalProvider;
pub use square::SquareProvider;
pub use stripe::StripeProvider;

use crate::error::{Error, Result};
use crate::types::{Money, Order, Payment};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// Result of `initialize`: the provider-side intent plus whatever the
/// buyer needs to complete payment (redirect URL, client secret), passed
/// through verbatim.
#[derive(Clone, Debug)]
pub struct PaymentIntent {
    /// Provider-assigned intent reference.
    pub intent_ref: String,
    /// Provider-assigned charge reference, when known at creation.
    pub charge_ref: Option<String>,
    /// Buyer-facing payload returned unmodified to the caller.
    pub buyer_payload: Value,
}

/// Confirmation token from the caller, forwarded to the provider.
#[derive(Clone, Debug, Default)]
pub struct ConfirmationInput {
    /// Provider intent/charge reference selecting a specific payment
    /// (supports retries where an order carries several payment rows).
    pub provider_ref: Option<String>,
    /// Provider-specific confirmation detail (for networks whose
    /// completion callback hands the buyer a separate reference).
    pub detail: Option<String>,
}

/// Result of `confirm`: the provider's verdict in the uniform vocabulary.
#[derive(Clone, Debug)]
pub enum ConfirmOutcome {
    /// Funds were captured.
    Captured {
        /// Capture time per the provider, when reported.
        captured_at: Option<DateTime<Utc>>,
        /// Charge/capture reference, when reported.
        charge_ref: Option<String>,
    },
    /// The provider declined the payment.
    Failed {
        /// Provider failure code.
        code: Option<String>,
        /// Provider failure message.
        message: String,
    },
}

/// Provider-side refund state in the uniform vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderRefundStatus {
    /// The money is on its way back.
    Completed,
    /// The provider accepted the refund but has not settled it.
    Pending,
    /// The provider rejected the refund.
    Failed,
}

/// Result of `refund`.
#[derive(Clone, Debug)]
pub struct ProviderRefund {
    /// Amount refunded.
    pub amount: Money,
    /// Provider-side refund reference.
    pub provider_ref: String,
    /// Refund state at the provider.
    pub status: ProviderRefundStatus,
}

/// An authenticated, provider-originated event in the uniform vocabulary.
#[derive(Clone, Debug)]
pub enum ProviderEvent {
    /// A payment was captured.
    PaymentCaptured {
        /// Intent/charge correlation reference.
        provider_ref: String,
        /// Capture time per the provider, when reported.
        captured_at: Option<DateTime<Utc>>,
        /// Charge/capture reference, when reported.
        charge_ref: Option<String>,
    },
    /// A payment failed.
    PaymentFailed {
        /// Intent/charge correlation reference.
        provider_ref: String,
        /// Provider failure code.
        code: Option<String>,
        /// Provider failure message.
        message: String,
    },
    /// A refund settled at the provider.
    RefundSucceeded {
        /// Payment intent/charge reference the refund belongs to.
        provider_ref: String,
        /// Provider-side refund reference.
        refund_ref: String,
    },
    /// A refund failed at the provider.
    RefundFailed {
        /// Payment intent/charge reference the refund belongs to.
        provider_ref: String,
        /// Provider-side refund reference.
        refund_ref: String,
        /// Provider failure message.
        message: String,
    },
    /// A chargeback was opened.
    DisputeOpened {
        /// Payment reference the dispute concerns.
        provider_ref: String,
        /// Provider-side dispute reference.
        dispute_ref: String,
    },
    /// A chargeback was closed.
    DisputeClosed {
        /// Payment reference the dispute concerns.
        provider_ref: String,
        /// Provider-side dispute reference.
        dispute_ref: String,
    },
    /// Authenticated but not something this pipeline acts on.
    Unrecognized {
        /// Provider event type, for the log.
        kind: String,
    },
}

/// Uniform payment network capability: initialize, confirm, refund, plus
/// authenticated webhook parsing for the reconciler.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Registry key ("stripe", "paypal", "square", "mock").
    fn name(&self) -> &'static str;

    /// Creates a provider-side payment intent for the order total.
    async fn initialize(&self, order: &Order) -> Result<PaymentIntent>;

    /// Asks the provider for the payment's outcome.
    ///
    /// An intent the provider still reports as in-progress is surfaced as
    /// [`Error::Provider`] so the payment stays in `requires_action` for a
    /// later retry or webhook.
    async fn confirm(&self, payment: &Payment, input: &ConfirmationInput)
        -> Result<ConfirmOutcome>;

    /// Requests a refund against a captured payment. `amount` of `None`
    /// means the full captured amount.
    async fn refund(&self, payment: &Payment, amount: Option<Money>) -> Result<ProviderRefund>;

    /// Verifies a webhook's signature and parses it into the uniform
    /// event vocabulary. Verification failure is [`Error::Authenticity`];
    /// no event is ever produced from an unverified payload.
    async fn parse_event(&self, signature: &str, payload: &[u8]) -> Result<ProviderEvent>;
}

/// Shared handle to a provider adapter.
pub type SharedProvider = Arc<dyn PaymentProvider>;

/// Name-keyed set of registered provider adapters.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, SharedProvider>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider under its own name, replacing any previous
    /// registration.
    pub fn register(&mut self, provider: SharedProvider) {
        self.providers.insert(provider.name(), provider);
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, provider: SharedProvider) -> Self {
        self.register(provider);
        self
    }

    /// Looks up a provider by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an unknown provider name.
    pub fn get(&self, name: &str) -> Result<SharedProvider> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Validation(format!("unknown payment provider: {name}")))
    }

    /// Registered provider names.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.providers.keys().copied().collect()
    }
}

// ============================================================================
// Shared signature helpers
// ============================================================================

/// Hex-encoded HMAC-SHA256 of `data` under `secret`.
///
/// HMAC accepts keys of any length, so the empty string on the error arm
/// is unreachable in practice.
#[must_use]
pub(crate) fn hmac_sha256_hex(secret: &str, data: &[u8]) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Base64-encoded HMAC-SHA256 of `data` under `secret`.
#[must_use]
pub(crate) fn hmac_sha256_base64(secret: &str, data: &[u8]) -> String {
    use base64::Engine as _;
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(data);
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Formats cents as a decimal major-unit string ("5350" -> "53.50").
#[must_use]
pub(crate) fn decimal_amount(money: Money) -> String {
    format!("{}.{:02}", money.cents() / 100, money.cents() % 100)
}
