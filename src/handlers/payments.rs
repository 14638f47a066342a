use axum::{extract::State, http::StatusCode};
use axum::response::Json;

use crate::errors::AppResult;
use crate::models::PaymentEvent;
use crate::services::ApplyOutcome;
use crate::AppState;

/// Receives payment-status-change notifications. Delivery is
/// at-least-once, so this must be safe under redelivery: the ledger
/// applies each payment exactly once. Ineligible events are logged and
/// dropped with a success reply; only store-level failures propagate, as
/// a retryable error, so the delivery mechanism redelivers.
pub async fn payment_event(
    State(state): State<AppState>,
    Json(event): Json<PaymentEvent>,
) -> AppResult<StatusCode> {
    tracing::info!("Payment event {} for user {}", event.id, event.uid);

    match state.ledger.apply_payment(&event).await? {
        ApplyOutcome::Applied { amount_cents } => {
            tracing::info!(
                "Credited {} cents to user {} for payment {}",
                amount_cents,
                event.uid,
                event.id
            );
        }
        ApplyOutcome::Skipped => {
            tracing::info!("Payment event {} skipped", event.id);
        }
    }

    Ok(StatusCode::NO_CONTENT)
}
