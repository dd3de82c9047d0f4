//! Settlement Job & Resource-Claim Orchestration Core
//!
//! Many semi-independent rooms detect unmet resource needs and translate
//! them into discrete jobs that worker agents later pick up. The shared
//! core keeps producers from creating duplicate or conflicting jobs,
//! tracks partial claims on scarce divisible resources, and resolves
//! requests through callback continuations inside a synchronous,
//! single-threaded simulation tick.
//!
//! # Module Structure
//!
//! - `types`: core ids, coordinates, seasons, priorities
//! - `clock`: simulation clock and season derivation
//! - `map`: tile grid collaborator (floors, plants, navigability)
//! - `dictionaries`: name-keyed definition dictionaries
//! - `messages`: synchronous message bus and typed request messages
//! - `allocation`: item, hauling, and liquid claim primitives
//! - `jobs`: job record, state machine, store, lifecycle listener
//! - `trackers`: read-side entity indices and request resolvers
//! - `rooms`: per-archetype reconciliation behaviours
//! - `session`: wiring, staggered reconciliation ticks, teardown
//! - `persistence`: save/load with name re-resolution

pub mod allocation;
pub mod clock;
pub mod dictionaries;
pub mod jobs;
pub mod map;
pub mod messages;
pub mod persistence;
pub mod rooms;
pub mod session;
pub mod trackers;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types for convenience
pub use clock::SimClock;
pub use dictionaries::Dictionaries;
pub use jobs::{Job, JobPayload, JobState, JobStore};
pub use map::AreaMap;
pub use messages::{Message, MessageBus, MessageKind};
pub use rooms::{Room, RoomBehaviour};
pub use session::{Session, SettlementState};
pub use types::{EntityId, JobId, JobPriority, RoomId, Season, TileCoord};
