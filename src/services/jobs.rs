use std::sync::Arc;

use serde_json::Value;

use crate::errors::{AppError, AppResult};
use crate::models::{JobRecord, JobStatus};
use crate::services::backend::ComputeBackend;
use crate::services::ledger::CreditLedger;
use crate::services::store::Store;
use crate::validation::validate_molecule_xml;

/// Denormalized submission metadata attached to the job record.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub nickname: String,
    pub filename: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SubmittedJob {
    pub job_id: String,
    pub n_atoms: usize,
}

#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub status: JobStatus,
    /// True when the job was already terminal and nothing was done.
    pub skipped: bool,
    pub ack: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct StatusView {
    pub record: JobRecord,
    pub upstream: Value,
}

/// Job lifecycle: validate, gate on credit, submit upstream, persist,
/// and cancel. Holds no state of its own; safe to run as any number of
/// concurrent instances.
#[derive(Clone)]
pub struct JobService {
    store: Arc<dyn Store>,
    backend: Arc<dyn ComputeBackend>,
    ledger: CreditLedger,
    min_balance_cents: i64,
    max_xml_chars: usize,
}

impl JobService {
    pub fn new(
        store: Arc<dyn Store>,
        backend: Arc<dyn ComputeBackend>,
        ledger: CreditLedger,
        min_balance_cents: i64,
        max_xml_chars: usize,
    ) -> Self {
        Self {
            store,
            backend,
            ledger,
            min_balance_cents,
            max_xml_chars,
        }
    }

    /// Validation and the credit gate run before any mutation; a failed
    /// upstream submit leaves no record either, because records are
    /// created only from the backend's acknowledgement.
    pub async fn submit(
        &self,
        uid: &str,
        molecule_xml: &str,
        meta: Submission,
    ) -> AppResult<SubmittedJob> {
        let balance = self.ledger.balance(uid).await?;
        if balance < self.min_balance_cents {
            tracing::info!("Submission by {} rejected: balance {} cents", uid, balance);
            return Err(AppError::FailedPrecondition(
                "Insufficient credits. You need more credits to submit a job.".into(),
            ));
        }

        let n_atoms = validate_molecule_xml(molecule_xml, self.max_xml_chars)?;

        let ack = self.backend.submit(molecule_xml, uid).await?;
        tracing::debug!("Backend accepted job {}: {}", ack.id, ack.raw);

        let record = JobRecord::queued(
            &ack.id,
            uid,
            &meta.nickname,
            meta.filename.as_deref(),
            n_atoms,
        );
        self.store.upsert_job(&record).await?;

        tracing::info!("Job {} queued for user {} ({} atoms)", ack.id, uid, n_atoms);
        Ok(SubmittedJob {
            job_id: ack.id,
            n_atoms,
        })
    }

    /// Cancellation of an already-terminal job is a benign no-op, not an
    /// error; the outcome says so via `skipped`.
    pub async fn cancel(&self, uid: &str, job_id: &str) -> AppResult<CancelOutcome> {
        let mut record = self.load_owned(uid, job_id).await?;

        if !matches!(record.status, JobStatus::Queued | JobStatus::Running) {
            tracing::info!(
                "Cancel of job {} skipped: already {:?}",
                job_id,
                record.status
            );
            return Ok(CancelOutcome {
                status: record.status,
                skipped: true,
                ack: None,
            });
        }

        let ack = self.backend.cancel(job_id).await?;

        record.mark_cancelled(uid, ack.clone());
        self.store.upsert_job(&record).await?;

        tracing::info!("Job {} cancelled by user {}", job_id, uid);
        Ok(CancelOutcome {
            status: JobStatus::Cancelled,
            skipped: false,
            ack: Some(ack),
        })
    }

    /// Read path: fetch the backend's view of the job and fold it into
    /// the local record. Unknown upstream statuses, and stale reads that
    /// would move the record backwards, leave it untouched.
    pub async fn refresh_status(&self, uid: &str, job_id: &str) -> AppResult<StatusView> {
        let mut record = self.load_owned(uid, job_id).await?;

        let upstream = self.backend.status(job_id).await?;

        let observed = upstream
            .get("status")
            .and_then(Value::as_str)
            .and_then(JobStatus::from_backend);

        if let Some(status) = observed {
            if record.status.may_advance_to(status) {
                record.apply_backend_status(status);
                self.store.upsert_job(&record).await?;
            }
        }

        Ok(StatusView { record, upstream })
    }

    async fn load_owned(&self, uid: &str, job_id: &str) -> AppResult<JobRecord> {
        let record = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Job not found".into()))?;

        if record.uid != uid {
            return Err(AppError::PermissionDenied("Not allowed".into()));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::errors::backend::{BackendError, BackendResult};
    use crate::models::TERMINAL_PRIORITY;
    use crate::services::backend::SubmitAck;
    use crate::services::store::memory::MemoryStore;

    const MOLECULE: &str = "<PC-Compounds>\
        <PC-Atoms_element><PC-Element/><PC-Element/></PC-Atoms_element>\
        <PC-Conformer_x><PC-Conformer_x_E/><PC-Conformer_x_E/></PC-Conformer_x>\
        <PC-Conformer_y><PC-Conformer_y_E/><PC-Conformer_y_E/></PC-Conformer_y>\
        <PC-Conformer_z><PC-Conformer_z_E/><PC-Conformer_z_E/></PC-Conformer_z>\
        </PC-Compounds>";

    #[derive(Default)]
    struct MockBackend {
        submit_calls: AtomicUsize,
        cancel_calls: AtomicUsize,
        status_calls: AtomicUsize,
        fail_unavailable: bool,
        status_reply: Option<serde_json::Value>,
    }

    #[async_trait]
    impl ComputeBackend for MockBackend {
        async fn submit(&self, _molecule_xml: &str, _uid: &str) -> BackendResult<SubmitAck> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_unavailable {
                return Err(BackendError::Unavailable("connect refused".into()));
            }
            Ok(SubmitAck {
                id: "backend-job-1".into(),
                raw: json!({"id": "backend-job-1", "status": "IN_QUEUE"}),
            })
        }

        async fn cancel(&self, job_id: &str) -> BackendResult<serde_json::Value> {
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_unavailable {
                return Err(BackendError::Unavailable("connect refused".into()));
            }
            Ok(json!({"id": job_id, "status": "CANCELLED"}))
        }

        async fn status(&self, job_id: &str) -> BackendResult<serde_json::Value> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .status_reply
                .clone()
                .unwrap_or_else(|| json!({"id": job_id, "status": "IN_QUEUE"})))
        }
    }

    fn service_with(
        store: Arc<MemoryStore>,
        backend: Arc<MockBackend>,
    ) -> JobService {
        let ledger = CreditLedger::new(store.clone());
        JobService::new(store, backend, ledger, 100, 2_000_000)
    }

    #[tokio::test]
    async fn submit_creates_queued_record() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MockBackend::default());
        store.set_balance("u1", 500);
        let service = service_with(store.clone(), backend.clone());

        let meta = Submission {
            nickname: "caffeine".into(),
            filename: Some("caffeine.xml".into()),
        };
        let submitted = service.submit("u1", MOLECULE, meta).await.unwrap();

        assert_eq!(submitted.job_id, "backend-job-1");
        assert_eq!(submitted.n_atoms, 2);

        let record = store.get_job("backend-job-1").await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Queued);
        assert_eq!(record.status_priority, 0);
        assert!(record.needs_attention);
        assert_eq!(record.uid, "u1");
        assert_eq!(record.n_atoms, 2);
        assert_eq!(record.nickname, "caffeine");
    }

    #[tokio::test]
    async fn insufficient_balance_never_reaches_backend() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MockBackend::default());
        store.set_balance("u1", 99);
        let service = service_with(store.clone(), backend.clone());

        let err = service
            .submit("u1", MOLECULE, Submission::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::FailedPrecondition(_)));
        assert_eq!(backend.submit_calls.load(Ordering::SeqCst), 0);
        assert!(store.get_job("backend-job-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_document_never_reaches_backend() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MockBackend::default());
        store.set_balance("u1", 500);
        let service = service_with(store.clone(), backend.clone());

        let err = service
            .submit("u1", "<PC-Compounds/>", Submission::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidArgument(_)));
        assert_eq!(backend.submit_calls.load(Ordering::SeqCst), 0);
        assert!(store.get_job("backend-job-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn backend_failure_leaves_no_record() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MockBackend {
            fail_unavailable: true,
            ..Default::default()
        });
        store.set_balance("u1", 500);
        let service = service_with(store.clone(), backend.clone());

        let err = service
            .submit("u1", MOLECULE, Submission::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Unavailable(_)));
        assert_eq!(backend.submit_calls.load(Ordering::SeqCst), 1);
        assert!(store.get_job("backend-job-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cancel_queued_job_invokes_backend_once() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MockBackend::default());
        store.insert_job(JobRecord::queued("j1", "u1", "caffeine", None, 2));
        let service = service_with(store.clone(), backend.clone());

        let outcome = service.cancel("u1", "j1").await.unwrap();

        assert!(!outcome.skipped);
        assert_eq!(outcome.status, JobStatus::Cancelled);
        assert_eq!(backend.cancel_calls.load(Ordering::SeqCst), 1);

        let record = store.get_job("j1").await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Cancelled);
        assert_eq!(record.status_priority, TERMINAL_PRIORITY);
        assert!(!record.needs_attention);
        assert_eq!(record.cancel.as_ref().unwrap().by_uid, "u1");
    }

    #[tokio::test]
    async fn cancel_terminal_job_is_skipped_without_backend_call() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MockBackend::default());
        let mut record = JobRecord::queued("j1", "u1", "caffeine", None, 2);
        record.apply_backend_status(JobStatus::Succeeded);
        store.insert_job(record);
        let service = service_with(store.clone(), backend.clone());

        let outcome = service.cancel("u1", "j1").await.unwrap();

        assert!(outcome.skipped);
        assert_eq!(outcome.status, JobStatus::Succeeded);
        assert_eq!(backend.cancel_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_by_non_owner_is_denied_and_mutates_nothing() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MockBackend::default());
        store.insert_job(JobRecord::queued("j1", "u1", "caffeine", None, 2));
        let service = service_with(store.clone(), backend.clone());

        let err = service.cancel("u2", "j1").await.unwrap_err();

        assert!(matches!(err, AppError::PermissionDenied(_)));
        assert_eq!(backend.cancel_calls.load(Ordering::SeqCst), 0);
        let record = store.get_job("j1").await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn cancel_unknown_job_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MockBackend::default());
        let service = service_with(store, backend);

        let err = service.cancel("u1", "missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn refresh_status_folds_backend_view_into_record() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MockBackend {
            status_reply: Some(json!({"id": "j1", "status": "COMPLETED"})),
            ..Default::default()
        });
        store.insert_job(JobRecord::queued("j1", "u1", "caffeine", None, 2));
        let service = service_with(store.clone(), backend.clone());

        let view = service.refresh_status("u1", "j1").await.unwrap();

        assert_eq!(view.record.status, JobStatus::Succeeded);
        assert_eq!(view.record.status_priority, TERMINAL_PRIORITY);
        assert!(!view.record.needs_attention);
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 1);

        let record = store.get_job("j1").await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn refresh_status_never_regresses_a_running_job() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MockBackend {
            status_reply: Some(json!({"id": "j1", "status": "IN_QUEUE"})),
            ..Default::default()
        });
        let mut record = JobRecord::queued("j1", "u1", "caffeine", None, 2);
        record.apply_backend_status(JobStatus::Running);
        store.insert_job(record);
        let service = service_with(store.clone(), backend);

        let view = service.refresh_status("u1", "j1").await.unwrap();

        // A stale IN_QUEUE read leaves the RUNNING record as it was.
        assert_eq!(view.record.status, JobStatus::Running);
        let stored = store.get_job("j1").await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Running);
        assert_eq!(stored.status_priority, 1);
    }

    #[tokio::test]
    async fn refresh_status_ignores_unknown_upstream_status() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MockBackend {
            status_reply: Some(json!({"id": "j1", "status": "SOMETHING_NEW"})),
            ..Default::default()
        });
        store.insert_job(JobRecord::queued("j1", "u1", "caffeine", None, 2));
        let service = service_with(store.clone(), backend);

        let view = service.refresh_status("u1", "j1").await.unwrap();
        assert_eq!(view.record.status, JobStatus::Queued);
    }
}
