mod job;
mod payment;
mod user;

pub use job::{CancelInfo, JobRecord, JobStatus, TERMINAL_PRIORITY};
pub use payment::{PaymentEvent, PaymentMarker, AMOUNT_FIELDS};
pub use user::UserAccount;
