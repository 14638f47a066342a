use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::BackendConfig;
use crate::errors::backend::{BackendError, BackendResult};

/// Truncation limit for upstream bodies quoted in error messages.
const BODY_SNIP_CHARS: usize = 500;

/// Backend acknowledgement of a submitted job.
#[derive(Debug, Clone)]
pub struct SubmitAck {
    /// Backend-assigned job identifier; job records are keyed by it.
    pub id: String,
    pub raw: Value,
}

/// Opaque request/response exchange with the external compute backend.
/// The trait exists so lifecycle logic can be tested without a network.
#[async_trait]
pub trait ComputeBackend: Send + Sync {
    async fn submit(&self, molecule_xml: &str, uid: &str) -> BackendResult<SubmitAck>;
    async fn cancel(&self, job_id: &str) -> BackendResult<Value>;
    async fn status(&self, job_id: &str) -> BackendResult<Value>;
}

/// The configured endpoint may be a base URL or may already include the
/// run action. Appends /run only when absent.
pub fn normalize_run_url(endpoint: &str) -> String {
    let e = endpoint.trim_end_matches('/');
    if e.is_empty() {
        return String::new();
    }
    if e.ends_with("/run") || e.ends_with("/runsync") {
        return e.to_string();
    }
    format!("{}/run", e)
}

/// Cancel/status URLs hang off the endpoint base: strip a trailing run
/// action first, then append `/{action}/{job_id}`.
pub fn normalize_action_url(endpoint: &str, action: &str, job_id: &str) -> String {
    let mut e = endpoint.trim_end_matches('/');
    if e.ends_with("/run") || e.ends_with("/runsync") {
        e = &e[..e.rfind('/').unwrap_or(0)];
    }
    format!("{}/{}/{}", e, action, job_id)
}

fn snip(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}

pub struct HttpComputeBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpComputeBackend {
    pub fn new(config: &BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_s))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            endpoint: config.endpoint.trim().to_string(),
            api_key: config.api_key.trim().to_string(),
        }
    }

    fn check_configured(&self) -> BackendResult<()> {
        if self.endpoint.is_empty() || self.api_key.is_empty() {
            return Err(BackendError::NotConfigured);
        }
        Ok(())
    }

    async fn exchange(&self, request: reqwest::RequestBuilder) -> BackendResult<Value> {
        // The backend expects the credential as-is, without a Bearer prefix.
        let response = request
            .header(reqwest::header::AUTHORIZATION, self.api_key.as_str())
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(BackendError::UpstreamStatus {
                status: status.as_u16(),
                body: snip(&body, BODY_SNIP_CHARS),
            });
        }

        // Non-JSON success bodies are preserved, truncated, for diagnostics.
        Ok(serde_json::from_str(&body)
            .unwrap_or_else(|_| json!({ "raw": snip(&body, 2000) })))
    }
}

#[async_trait]
impl ComputeBackend for HttpComputeBackend {
    async fn submit(&self, molecule_xml: &str, uid: &str) -> BackendResult<SubmitAck> {
        self.check_configured()?;
        let url = normalize_run_url(&self.endpoint);
        let payload = json!({ "input": { "molecule_xml": molecule_xml, "uid": uid } });

        tracing::debug!("Submitting job to {}", url);
        let raw = self.exchange(self.client.post(&url).json(&payload)).await?;

        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                BackendError::BadReply("submit response carried no job id".to_string())
            })?
            .to_string();

        Ok(SubmitAck { id, raw })
    }

    async fn cancel(&self, job_id: &str) -> BackendResult<Value> {
        self.check_configured()?;
        let url = normalize_action_url(&self.endpoint, "cancel", job_id);
        tracing::debug!("Cancelling job {} via {}", job_id, url);
        self.exchange(self.client.post(&url)).await
    }

    async fn status(&self, job_id: &str) -> BackendResult<Value> {
        self.check_configured()?;
        let url = normalize_action_url(&self.endpoint, "status", job_id);
        tracing::debug!("Fetching status for job {} via {}", job_id, url);
        self.exchange(self.client.get(&url)).await
    }
}
