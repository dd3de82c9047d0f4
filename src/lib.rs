//! Settlement simulation core library
//!
//! Re-exports the orchestration core and the demo scenario for binaries
//! and tools.

pub mod demo;
pub mod settlement;
