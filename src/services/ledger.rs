use std::sync::Arc;

use crate::errors::store::StoreResult;
use crate::models::PaymentEvent;
use crate::services::store::{CreditApplied, Store};

/// The only payment status that qualifies for credit.
const SUCCEEDED_STATUS: &str = "succeeded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Credit added to the balance, exactly once.
    Applied { amount_cents: i64 },
    /// Nothing mutated: already applied, or the event was ineligible.
    Skipped,
}

/// Applies payment events to user balances exactly once each, despite
/// at-least-once delivery. Ineligible events are logged and dropped;
/// only transaction-layer failures surface as errors, and those are safe
/// to retry because the store re-checks the applied flag.
#[derive(Clone)]
pub struct CreditLedger {
    store: Arc<dyn Store>,
}

impl CreditLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Current balance in minor units. Conversion to a display currency
    /// happens at presentation boundaries only.
    pub async fn balance(&self, uid: &str) -> StoreResult<i64> {
        self.store.credit_balance(uid).await
    }

    pub async fn apply_payment(&self, event: &PaymentEvent) -> StoreResult<ApplyOutcome> {
        if event.id.is_empty() || event.uid.is_empty() {
            tracing::error!("Payment event missing id/uid; dropping");
            return Ok(ApplyOutcome::Skipped);
        }

        if event.status != SUCCEEDED_STATUS {
            tracing::info!(
                "Payment {} status={}; skipping credit",
                event.id,
                event.status
            );
            return Ok(ApplyOutcome::Skipped);
        }

        let amount_cents = match event.amount_minor_units() {
            Some(amount) if amount > 0 => amount,
            _ => {
                tracing::error!("Missing/invalid amount for payment {}; dropping", event.id);
                return Ok(ApplyOutcome::Skipped);
            }
        };

        match self
            .store
            .apply_credit_once(&event.uid, &event.id, amount_cents)
            .await?
        {
            CreditApplied::Applied => {
                tracing::info!(
                    "Payment {} applied: +{} cents to user {}",
                    event.id,
                    amount_cents,
                    event.uid
                );
                Ok(ApplyOutcome::Applied { amount_cents })
            }
            CreditApplied::AlreadyApplied => {
                tracing::info!("Payment {} already applied; skipping", event.id);
                Ok(ApplyOutcome::Skipped)
            }
        }
    }
}
