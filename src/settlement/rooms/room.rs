//! Room record and behaviour dispatch
//!
//! Behaviours form a closed sum over the room archetypes so archetype
//! dispatch is an exhaustive `match`. Cloning a behaviour (room split)
//! copies its indices, which hold job ids: live jobs are shared by
//! reference, never duplicated. Merging (rooms recombined) unions the
//! indices without loss.

use std::collections::BTreeSet;

use crate::settlement::jobs::JobState;
use crate::settlement::messages::MessageBus;
use crate::settlement::rooms::farm::FarmBehaviour;
use crate::settlement::rooms::graveyard::GraveyardBehaviour;
use crate::settlement::rooms::kitchen::KitchenBehaviour;
use crate::settlement::rooms::mushroom::MushroomBehaviour;
use crate::settlement::session::SettlementState;
use crate::settlement::types::{JobId, RoomId, TileCoord};

/// A declared room: a footprint plus one behaviour
#[derive(Clone, Debug)]
pub struct Room {
    pub id: RoomId,
    pub tiles: BTreeSet<TileCoord>,
    pub behaviour: RoomBehaviour,
    /// Next reconciliation due time, staggered per room
    pub(crate) next_update_at: f64,
    pub(crate) update_interval: f64,
}

impl Room {
    pub fn contains(&self, coord: TileCoord) -> bool {
        self.tiles.contains(&coord)
    }
}

/// The per-archetype reconciliation state machine
#[derive(Clone, Debug)]
pub enum RoomBehaviour {
    Farm(FarmBehaviour),
    Kitchen(KitchenBehaviour),
    Graveyard(GraveyardBehaviour),
    MushroomProcessing(MushroomBehaviour),
}

impl RoomBehaviour {
    /// Get the archetype name
    pub fn archetype_name(&self) -> &'static str {
        match self {
            RoomBehaviour::Farm(_) => "farm",
            RoomBehaviour::Kitchen(_) => "kitchen",
            RoomBehaviour::Graveyard(_) => "graveyard",
            RoomBehaviour::MushroomProcessing(_) => "mushroom_processing",
        }
    }

    /// One reconciliation pass: prune, detect, act
    pub fn infrequent_update(
        &mut self,
        bus: &MessageBus,
        state: &mut SettlementState,
        room_id: RoomId,
        tiles: &BTreeSet<TileCoord>,
    ) {
        match self {
            RoomBehaviour::Farm(farm) => farm.infrequent_update(bus, state, room_id, tiles),
            RoomBehaviour::Kitchen(kitchen) => {
                kitchen.infrequent_update(bus, state, room_id, tiles)
            }
            RoomBehaviour::Graveyard(graveyard) => {
                graveyard.infrequent_update(bus, state, room_id, tiles)
            }
            RoomBehaviour::MushroomProcessing(mushroom) => {
                mushroom.infrequent_update(bus, state, room_id, tiles)
            }
        }
    }

    /// Synchronous reaction to a job reaching a terminal state, for
    /// bookkeeping that must not be stale even briefly
    pub fn notify_job_state(
        &mut self,
        bus: &MessageBus,
        state: &mut SettlementState,
        job_id: JobId,
        terminal: JobState,
    ) {
        match self {
            RoomBehaviour::Farm(farm) => farm.notify_job_state(bus, state, job_id, terminal),
            RoomBehaviour::Kitchen(kitchen) => {
                kitchen.notify_job_state(bus, state, job_id, terminal)
            }
            RoomBehaviour::Graveyard(graveyard) => {
                graveyard.notify_job_state(bus, state, job_id, terminal)
            }
            RoomBehaviour::MushroomProcessing(mushroom) => {
                mushroom.notify_job_state(bus, state, job_id, terminal)
            }
        }
    }

    /// Union another behaviour's job indices into this one. Merging
    /// different archetypes is a programming error.
    pub fn merge_from(&mut self, other: RoomBehaviour) {
        match (self, other) {
            (RoomBehaviour::Farm(a), RoomBehaviour::Farm(b)) => a.merge_from(b),
            (RoomBehaviour::Kitchen(a), RoomBehaviour::Kitchen(b)) => a.merge_from(b),
            (RoomBehaviour::Graveyard(a), RoomBehaviour::Graveyard(b)) => a.merge_from(b),
            (RoomBehaviour::MushroomProcessing(a), RoomBehaviour::MushroomProcessing(b)) => {
                a.merge_from(b)
            }
            (a, b) => panic!(
                "cannot merge {} behaviour into {} behaviour",
                b.archetype_name(),
                a.archetype_name()
            ),
        }
    }

    /// Drop index entries whose unit no longer falls inside `tiles`
    /// (room split re-indexing)
    pub fn retain_units(&mut self, tiles: &BTreeSet<TileCoord>, state: &SettlementState) {
        match self {
            RoomBehaviour::Farm(farm) => farm.retain_units(tiles),
            RoomBehaviour::Kitchen(kitchen) => kitchen.retain_units(tiles, state),
            RoomBehaviour::Graveyard(graveyard) => graveyard.retain_units(tiles, state),
            RoomBehaviour::MushroomProcessing(mushroom) => mushroom.retain_units(tiles, state),
        }
    }

    /// Ids of all outstanding jobs this behaviour is tracking
    pub fn tracked_job_ids(&self) -> Vec<JobId> {
        let mut ids = match self {
            RoomBehaviour::Farm(farm) => farm.tracked_job_ids(),
            RoomBehaviour::Kitchen(kitchen) => kitchen.tracked_job_ids(),
            RoomBehaviour::Graveyard(graveyard) => graveyard.tracked_job_ids(),
            RoomBehaviour::MushroomProcessing(mushroom) => mushroom.tracked_job_ids(),
        };
        ids.sort();
        ids
    }
}
