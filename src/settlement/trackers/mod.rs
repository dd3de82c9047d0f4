//! Read-side entity indices
//!
//! One tracker per entity kind, each an explicitly constructed service
//! owned by the session state (no ambient globals) with a `reset()` called
//! on session teardown. Trackers both receive world-change notifications
//! (`added`/`removed`) and answer the allocation queries room behaviours
//! issue; `resolvers` wires them to the request messages on the bus.

pub mod creatures;
pub mod furniture;
pub mod items;
pub mod liquids;
pub mod resolvers;

pub use creatures::{CreatureRecord, CreatureTracker};
pub use furniture::{FurnitureRecord, FurnitureState, FurnitureTracker};
pub use items::{ItemRecord, ItemTracker};
pub use liquids::{LiquidContainerRecord, LiquidTracker};
