//! Jobs: discrete units of work with a lifecycle state machine
//!
//! - `job`: the Job record, its state machine, and kind-specific payloads
//! - `store`: process-wide index of live jobs by id, location, and type
//! - `lifecycle`: terminal-transition listener that releases owned claims

pub mod job;
pub mod lifecycle;
pub mod store;

pub use job::{Job, JobPayload, JobState};
pub use store::JobStore;
