mod account;
mod jobs;
mod payments;

pub use account::ensure_account;
pub use jobs::{cancel_job, job_status, submit_job};
pub use payments::payment_event;
