use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;

use crate::errors::store::{StoreError, StoreResult};
use crate::models::{JobRecord, PaymentMarker, UserAccount};

/// Outcome of the compare-and-swap credit application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditApplied {
    /// Balance increased and the payment marked applied, atomically.
    Applied,
    /// The payment was already applied; nothing was mutated.
    AlreadyApplied,
}

/// Persistence seam for accounts, balances, payment markers and job
/// records. The credit apply step is the one operation that must be a
/// single atomic read-then-write; everything else is plain get/set with
/// merge semantics handled at the record level.
#[async_trait]
pub trait Store: Send + Sync {
    /// Creates the account document if missing, initializing the balance
    /// to zero. Returns true when this call created it.
    async fn ensure_account(&self, uid: &str, email: Option<&str>) -> StoreResult<bool>;

    /// Current balance in minor units; absent accounts read as zero.
    async fn credit_balance(&self, uid: &str) -> StoreResult<i64>;

    /// Atomically: re-read the payment marker, and unless it is already
    /// applied, increment the balance and mark the payment applied. A
    /// concurrent writer touching the marker aborts with
    /// `StoreError::Conflict`, which the delivery layer retries.
    async fn apply_credit_once(
        &self,
        uid: &str,
        payment_id: &str,
        amount_cents: i64,
    ) -> StoreResult<CreditApplied>;

    async fn get_job(&self, job_id: &str) -> StoreResult<Option<JobRecord>>;

    /// Merge-writes the record; invoking twice for the same id must not
    /// duplicate or lose fields (see `JobRecord::merge_from`).
    async fn upsert_job(&self, record: &JobRecord) -> StoreResult<()>;
}

fn account_key(uid: &str) -> String {
    format!("account:{}", uid)
}

fn credits_key(uid: &str) -> String {
    format!("credits:{}", uid)
}

fn payment_key(uid: &str, payment_id: &str) -> String {
    format!("payment:{}:{}", uid, payment_id)
}

fn job_key(job_id: &str) -> String {
    format!("job:{}", job_id)
}

pub struct RedisStore {
    client: Arc<redis::Client>,
}

impl RedisStore {
    pub fn new(client: Arc<redis::Client>) -> Self {
        Self { client }
    }

    async fn connection(&self) -> StoreResult<redis::aio::Connection> {
        Ok(self.client.get_async_connection().await?)
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn ensure_account(&self, uid: &str, email: Option<&str>) -> StoreResult<bool> {
        let account_key = account_key(uid);
        let credits_key = credits_key(uid);
        let mut conn = self.connection().await?;

        redis::cmd("WATCH")
            .arg(&account_key)
            .query_async::<_, ()>(&mut conn)
            .await?;

        let existing: Option<String> = conn.get(&account_key).await?;
        match existing {
            Some(json) => {
                // Merge the email into the existing profile when given.
                let mut account: UserAccount = serde_json::from_str(&json)?;
                if let Some(email) = email {
                    account.email = Some(email.to_string());
                    let mut pipe = redis::pipe();
                    pipe.atomic()
                        .set(&account_key, serde_json::to_string(&account)?)
                        .ignore();
                    let reply: Option<()> = pipe.query_async(&mut conn).await?;
                    if reply.is_none() {
                        return Err(StoreError::Conflict);
                    }
                } else {
                    redis::cmd("UNWATCH").query_async::<_, ()>(&mut conn).await?;
                }
                Ok(false)
            }
            None => {
                let account = UserAccount::new(uid, email);
                let mut pipe = redis::pipe();
                pipe.atomic()
                    .set(&account_key, serde_json::to_string(&account)?)
                    .ignore()
                    .cmd("SETNX")
                    .arg(&credits_key)
                    .arg(0)
                    .ignore();
                let reply: Option<()> = pipe.query_async(&mut conn).await?;
                if reply.is_none() {
                    return Err(StoreError::Conflict);
                }
                Ok(true)
            }
        }
    }

    async fn credit_balance(&self, uid: &str) -> StoreResult<i64> {
        let mut conn = self.connection().await?;
        let balance: Option<i64> = conn.get(credits_key(uid)).await?;
        Ok(balance.unwrap_or(0))
    }

    async fn apply_credit_once(
        &self,
        uid: &str,
        payment_id: &str,
        amount_cents: i64,
    ) -> StoreResult<CreditApplied> {
        let payment_key = payment_key(uid, payment_id);
        let credits_key = credits_key(uid);
        let mut conn = self.connection().await?;

        redis::cmd("WATCH")
            .arg(&payment_key)
            .query_async::<_, ()>(&mut conn)
            .await?;

        // Mandatory re-read inside the transaction boundary: delivery may
        // be concurrent or duplicated, so an outer check is not enough.
        let existing: Option<String> = conn.get(&payment_key).await?;
        if let Some(json) = existing {
            let marker: PaymentMarker = serde_json::from_str(&json)?;
            if marker.applied {
                redis::cmd("UNWATCH").query_async::<_, ()>(&mut conn).await?;
                return Ok(CreditApplied::AlreadyApplied);
            }
        }

        let marker = PaymentMarker {
            id: payment_id.to_string(),
            uid: uid.to_string(),
            applied: true,
            applied_amount_cents: amount_cents,
            applied_at: Utc::now(),
        };

        // Both mutations commit together or not at all.
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("INCRBY")
            .arg(&credits_key)
            .arg(amount_cents)
            .ignore()
            .set(&payment_key, serde_json::to_string(&marker)?)
            .ignore();
        let reply: Option<()> = pipe.query_async(&mut conn).await?;
        if reply.is_none() {
            return Err(StoreError::Conflict);
        }
        Ok(CreditApplied::Applied)
    }

    async fn get_job(&self, job_id: &str) -> StoreResult<Option<JobRecord>> {
        let mut conn = self.connection().await?;
        let json: Option<String> = conn.get(job_key(job_id)).await?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn upsert_job(&self, record: &JobRecord) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let key = job_key(&record.job_id);

        let mut record = record.clone();
        let existing: Option<String> = conn.get(&key).await?;
        if let Some(json) = existing {
            let existing: JobRecord = serde_json::from_str(&json)?;
            record.merge_from(&existing);
        }

        conn.set::<_, _, ()>(&key, serde_json::to_string(&record)?)
            .await?;
        Ok(())
    }
}
