//! Boxoffice settlement service.
//!
//! Turns a priced order into issued tickets through a provider-agnostic
//! payment pipeline:
//!
//! - **Pricing**: cents-based money, fee schedules with organization
//!   overrides, tax and discount application with a fixed rounding
//!   policy.
//! - **Inventory**: reservation checks against capacity, sold tickets,
//!   and active holds; per-seat checks for seated ticket types.
//! - **Payments**: one [`providers::PaymentProvider`] implementation per
//!   processor (Stripe, `PayPal`, Square, plus an in-process mock), and a
//!   [`orchestrator::PaymentOrchestrator`] that drives intent creation,
//!   confirmation, and capture settlement.
//! - **Reconciliation**: signed provider webhooks converge on the same
//!   terminal state as synchronous confirmation, whichever arrives
//!   first.
//! - **Issuance**: deterministic barcodes make ticket creation
//!   idempotent under racing triggers.
//! - **Refunds**: admin-driven lifecycle with approval, provider
//!   execution, and webhook completion for asynchronous providers.
//!
//! State lives behind the [`store::SettlementStore`] trait, with a
//! Postgres implementation for production and an in-memory one for
//! tests.

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod inventory;
pub mod issuance;
pub mod notifications;
pub mod orchestrator;
pub mod orders;
pub mod pricing;
pub mod providers;
pub mod reconciler;
pub mod refunds;
pub mod server;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
