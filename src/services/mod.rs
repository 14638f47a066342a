pub mod backend;
pub mod jobs;
pub mod ledger;
pub mod store;

pub use backend::{ComputeBackend, HttpComputeBackend};
pub use jobs::{JobService, Submission};
pub use ledger::{ApplyOutcome, CreditLedger};
pub use store::{RedisStore, Store};
