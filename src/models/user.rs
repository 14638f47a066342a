use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account profile document. The credit balance lives in a separate
/// integer key so the store can increment it atomically.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserAccount {
    pub uid: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn new(uid: &str, email: Option<&str>) -> Self {
        Self {
            uid: uid.to_string(),
            email: email.map(str::to_string),
            created_at: Utc::now(),
        }
    }
}
