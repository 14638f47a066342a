use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    // Optimistic transaction aborted by a concurrent writer; safe to retry.
    #[error("Transaction conflict")]
    Conflict,
}

pub type StoreResult<T> = Result<T, StoreError>;
