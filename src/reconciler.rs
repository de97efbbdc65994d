//! Webhook reconciler.
//!
//! Providers deliver events late, out of order, duplicated, or not at
//! all, and a webhook can race the buyer's synchronous confirm. Every
//! event is verified before anything else; after that, application is
//! idempotent: transitions apply only if the target is not already in a
//! terminal state, and events that match nothing are logged no-ops so the
//! provider stops retrying.

use crate::error::Result;
use crate::orchestrator::PaymentOrchestrator;
use crate::providers::ProviderEvent;
use crate::refunds::{RefundManager, RefundResolution};
use crate::types::{DisputeRecord, PaymentStatus};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// What handling an authenticated event did to local state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A state transition was applied.
    Applied,
    /// The event was a duplicate of an already-applied transition.
    Duplicate,
    /// The event matched nothing actionable; recorded in the log only.
    Ignored,
}

/// Applies provider-originated events to local payment and refund state.
pub struct WebhookReconciler {
    orchestrator: Arc<PaymentOrchestrator>,
    refunds: Arc<RefundManager>,
}

impl WebhookReconciler {
    /// Creates the reconciler.
    #[must_use]
    pub const fn new(orchestrator: Arc<PaymentOrchestrator>, refunds: Arc<RefundManager>) -> Self {
        Self {
            orchestrator,
            refunds,
        }
    }

    /// Verifies and applies one webhook delivery.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Authenticity`] for an unverifiable
    /// signature and [`crate::Error::Validation`] for a malformed
    /// payload, both with no state change. Unknown references are not
    /// errors: they resolve to [`ReconcileOutcome::Ignored`] so the
    /// provider does not retry forever.
    pub async fn handle(
        &self,
        provider_name: &str,
        signature: &str,
        payload: &[u8],
    ) -> Result<ReconcileOutcome> {
        let provider = self.orchestrator.provider(provider_name)?;
        let event = provider.parse_event(signature, payload).await?;

        match event {
            ProviderEvent::PaymentCaptured {
                provider_ref,
                captured_at,
                charge_ref,
            } => {
                let Some(payment) = self
                    .orchestrator
                    .store()
                    .payment_by_provider_ref(provider_name, &provider_ref)
                    .await?
                else {
                    info!(
                        provider = provider_name,
                        provider_ref, "capture event for unknown payment"
                    );
                    return Ok(ReconcileOutcome::Ignored);
                };
                if payment.status == PaymentStatus::Captured {
                    return Ok(ReconcileOutcome::Duplicate);
                }
                let captured_at =
                    captured_at.unwrap_or_else(|| self.orchestrator.clock().now());
                let applied = self
                    .orchestrator
                    .apply_capture(&payment, captured_at, charge_ref.as_deref())
                    .await?;
                Ok(if applied {
                    ReconcileOutcome::Applied
                } else {
                    ReconcileOutcome::Duplicate
                })
            }

            ProviderEvent::PaymentFailed {
                provider_ref,
                code,
                message,
            } => {
                let Some(payment) = self
                    .orchestrator
                    .store()
                    .payment_by_provider_ref(provider_name, &provider_ref)
                    .await?
                else {
                    info!(
                        provider = provider_name,
                        provider_ref, "failure event for unknown payment"
                    );
                    return Ok(ReconcileOutcome::Ignored);
                };
                // Order status is untouched: the order may be retried
                // with a new payment.
                let applied = self
                    .orchestrator
                    .store()
                    .fail_payment(payment.id, code.as_deref(), &message)
                    .await?;
                if applied {
                    warn!(payment_id = %payment.id, %message, "payment failed via webhook");
                    Ok(ReconcileOutcome::Applied)
                } else {
                    Ok(ReconcileOutcome::Duplicate)
                }
            }

            ProviderEvent::RefundSucceeded {
                provider_ref,
                refund_ref,
            } => {
                let resolution = self
                    .refunds
                    .apply_provider_resolution(provider_name, &provider_ref, &refund_ref, true, None)
                    .await?;
                Ok(resolution.into())
            }

            ProviderEvent::RefundFailed {
                provider_ref,
                refund_ref,
                message,
            } => {
                let resolution = self
                    .refunds
                    .apply_provider_resolution(
                        provider_name,
                        &provider_ref,
                        &refund_ref,
                        false,
                        Some(&message),
                    )
                    .await?;
                Ok(resolution.into())
            }

            ProviderEvent::DisputeOpened {
                provider_ref,
                dispute_ref,
            } => {
                self.record_dispute(provider_name, &provider_ref, &dispute_ref, "opened")
                    .await
            }

            ProviderEvent::DisputeClosed {
                provider_ref,
                dispute_ref,
            } => {
                self.record_dispute(provider_name, &provider_ref, &dispute_ref, "closed")
                    .await
            }

            ProviderEvent::Unrecognized { kind } => {
                info!(provider = provider_name, kind, "unhandled webhook event");
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    /// Disputes are recorded for downstream review; they never mutate
    /// order or payment state here.
    async fn record_dispute(
        &self,
        provider: &str,
        provider_ref: &str,
        dispute_ref: &str,
        kind: &str,
    ) -> Result<ReconcileOutcome> {
        self.orchestrator
            .store()
            .insert_dispute(&DisputeRecord {
                id: Uuid::new_v4(),
                provider: provider.to_string(),
                provider_ref: provider_ref.to_string(),
                dispute_ref: dispute_ref.to_string(),
                kind: kind.to_string(),
                recorded_at: self.orchestrator.clock().now(),
            })
            .await?;
        warn!(provider, provider_ref, dispute_ref, kind, "dispute recorded");
        Ok(ReconcileOutcome::Applied)
    }
}

impl From<RefundResolution> for ReconcileOutcome {
    fn from(resolution: RefundResolution) -> Self {
        match resolution {
            RefundResolution::Applied => Self::Applied,
            RefundResolution::Duplicate => Self::Duplicate,
            RefundResolution::Unmatched => Self::Ignored,
        }
    }
}
