use axum::{extract::State, response::Json, Extension};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppResult;
use crate::middleware::AuthUser;
use crate::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct EnsureAccountRequest {
    pub email: Option<String>,
}

/// Idempotent account bootstrap: creates the account document with a
/// zero balance on first call, merges the email on later ones.
pub async fn ensure_account(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    request: Option<Json<EnsureAccountRequest>>,
) -> AppResult<Json<Value>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    let created = state.store.ensure_account(&user.uid, email).await?;

    tracing::info!("Account for {} ensured (created: {})", user.uid, created);
    Ok(Json(json!({
        "ok": true,
        "uid": user.uid,
        "created": created,
    })))
}
