use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Priority assigned to every terminal status. Lower values sort as more
/// urgent on the dashboard; this field is set here but never interpreted.
pub const TERMINAL_PRIORITY: u8 = 99;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    pub fn priority(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running => 1,
            _ => TERMINAL_PRIORITY,
        }
    }

    /// Whether an observed backend status may replace this one. Terminal
    /// states never change, and a non-terminal record never regresses to
    /// an earlier non-terminal state: a stale IN_QUEUE read must not undo
    /// RUNNING back to QUEUED.
    pub fn may_advance_to(self, observed: JobStatus) -> bool {
        if self.is_terminal() || observed == self {
            return false;
        }
        observed.is_terminal() || observed.priority() > self.priority()
    }

    /// Maps a compute-backend status string onto the local state machine.
    /// Unknown strings are left for a later reconciliation pass.
    pub fn from_backend(status: &str) -> Option<Self> {
        match status {
            "IN_QUEUE" => Some(Self::Queued),
            "IN_PROGRESS" => Some(Self::Running),
            "COMPLETED" => Some(Self::Succeeded),
            "FAILED" | "TIMED_OUT" => Some(Self::Failed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Who cancelled a job, when, and what the backend acknowledged.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CancelInfo {
    pub at: DateTime<Utc>,
    pub by_uid: String,
    pub ack: Value,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobRecord {
    /// Equal to the compute backend's assigned job identifier.
    pub job_id: String,
    pub uid: String,
    pub nickname: String,
    pub filename: Option<String>,
    pub n_atoms: usize,
    pub status: JobStatus,
    pub status_priority: u8,
    pub needs_attention: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancel: Option<CancelInfo>,
}

impl JobRecord {
    /// Fresh record for a job the backend just accepted.
    pub fn queued(
        job_id: &str,
        uid: &str,
        nickname: &str,
        filename: Option<&str>,
        n_atoms: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.to_string(),
            uid: uid.to_string(),
            nickname: nickname.to_string(),
            filename: filename.map(str::to_string),
            n_atoms,
            status: JobStatus::Queued,
            status_priority: JobStatus::Queued.priority(),
            needs_attention: true,
            created_at: now,
            updated_at: now,
            cancel: None,
        }
    }

    /// Merge semantics for upserts: a record written twice for the same
    /// backend id keeps the earlier creation time and any cancellation
    /// detail already on file.
    pub fn merge_from(&mut self, existing: &JobRecord) {
        self.created_at = existing.created_at;
        if self.cancel.is_none() {
            self.cancel = existing.cancel.clone();
        }
    }

    /// Local transition to CANCELLED. A reconciliation pass may later
    /// re-derive the authoritative status from the backend; this write
    /// gives the user immediate feedback.
    pub fn mark_cancelled(&mut self, by_uid: &str, ack: Value) {
        let now = Utc::now();
        self.status = JobStatus::Cancelled;
        self.status_priority = TERMINAL_PRIORITY;
        self.needs_attention = false;
        self.updated_at = now;
        self.cancel = Some(CancelInfo {
            at: now,
            by_uid: by_uid.to_string(),
            ack,
        });
    }

    /// Applies a status observed on the backend's read path.
    pub fn apply_backend_status(&mut self, status: JobStatus) {
        self.status = status;
        self.status_priority = status.priority();
        if status.is_terminal() {
            self.needs_attention = false;
        }
        self.updated_at = Utc::now();
    }
}
