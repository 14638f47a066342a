use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppResult;
use crate::middleware::AuthUser;
use crate::services::Submission;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub molecule_xml: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(rename = "fileName")]
    pub filename: Option<String>,
}

pub async fn submit_job(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<SubmitRequest>,
) -> AppResult<Json<Value>> {
    tracing::info!("Submit request from user {}", user.uid);

    let meta = Submission {
        nickname: request.nickname.clone(),
        filename: request.filename.clone(),
    };
    let submitted = state
        .jobs
        .submit(&user.uid, &request.molecule_xml, meta)
        .await?;

    Ok(Json(json!({
        "ok": true,
        "uid": user.uid,
        "nickname": request.nickname,
        "n_atoms": submitted.n_atoms,
        "jobId": submitted.job_id,
        "filename": request.filename,
    })))
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<String>,
) -> AppResult<Json<Value>> {
    tracing::info!("Cancel request for job {} from user {}", job_id, user.uid);

    let outcome = state.jobs.cancel(&user.uid, &job_id).await?;

    Ok(Json(json!({
        "ok": true,
        "jobId": job_id,
        "skipped": outcome.skipped,
        "status": outcome.status,
        "ack": outcome.ack,
    })))
}

pub async fn job_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<String>,
) -> AppResult<Json<Value>> {
    tracing::debug!("Status request for job {} from user {}", job_id, user.uid);

    let view = state.jobs.refresh_status(&user.uid, &job_id).await?;

    Ok(Json(json!({
        "ok": true,
        "jobId": job_id,
        "status": view.record.status,
        "upstream": view.upstream,
    })))
}
