// Submission retry policy
pub mod backoff;

pub use backoff::{CooldownSchedule, RetryMode, SubmissionThrottle};
