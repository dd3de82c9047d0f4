//! Rooms and their reconciliation behaviours
//!
//! A room owns a footprint of tiles and exactly one behaviour. Every few
//! simulated seconds the behaviour diffs desired state against actual
//! state and emits job-creation or removal messages; in between it reacts
//! synchronously to job terminal notifications.

pub mod farm;
pub mod graveyard;
pub mod kitchen;
pub mod mushroom;
pub mod room;

pub use farm::{FarmBehaviour, FarmConfig};
pub use graveyard::{GraveyardBehaviour, GraveyardConfig};
pub use kitchen::{CookingSession, KitchenBehaviour, KitchenConfig};
pub use mushroom::{MushroomBehaviour, MushroomConfig};
pub use room::{Room, RoomBehaviour};
