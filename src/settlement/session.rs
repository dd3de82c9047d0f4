//! Settlement session
//!
//! Wires the message bus to the state aggregate, registers the lifecycle
//! listener, the request resolvers, and the room notification router, and
//! drives staggered room reconciliation from the clock. One session
//! corresponds to one running game; `reset` is the explicit teardown.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::settlement::clock::SimClock;
use crate::settlement::dictionaries::{Dictionaries, FurnitureTypeId, ItemTypeId, MaterialId};
use crate::settlement::jobs::{lifecycle, JobState, JobStore};
use crate::settlement::map::AreaMap;
use crate::settlement::messages::{Message, MessageBus, MessageKind};
use crate::settlement::rooms::{Room, RoomBehaviour};
use crate::settlement::trackers::{
    resolvers, CreatureRecord, CreatureTracker, FurnitureRecord, FurnitureTracker, ItemRecord,
    ItemTracker, LiquidContainerRecord, LiquidTracker,
};
use crate::settlement::types::{EntityId, RoomId, TileCoord};

/// Bounds of the per-room reconciliation interval in simulated seconds
pub const RECONCILE_INTERVAL_MIN: f64 = 3.0;
pub const RECONCILE_INTERVAL_MAX: f64 = 5.0;

/// Everything a session owns: collaborators, stores, trackers, rooms
#[derive(Clone, Debug)]
pub struct SettlementState {
    pub clock: SimClock,
    pub map: AreaMap,
    pub dictionaries: Dictionaries,
    pub jobs: JobStore,
    pub items: ItemTracker,
    pub creatures: CreatureTracker,
    pub furniture: FurnitureTracker,
    pub liquids: LiquidTracker,
    pub rooms: BTreeMap<RoomId, Room>,
    pub rng: ChaCha8Rng,
    next_room_id: u64,
    next_entity_id: u64,
}

impl SettlementState {
    pub fn new(map: AreaMap, dictionaries: Dictionaries, seed: u64) -> Self {
        SettlementState {
            clock: SimClock::new(),
            map,
            dictionaries,
            jobs: JobStore::new(),
            items: ItemTracker::new(),
            creatures: CreatureTracker::new(),
            furniture: FurnitureTracker::new(),
            liquids: LiquidTracker::new(),
            rooms: BTreeMap::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_room_id: 0,
            next_entity_id: 0,
        }
    }

    pub fn allocate_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        id
    }

    /// Put a new item stack into the world and its tracker
    pub fn spawn_item(
        &mut self,
        item_type: ItemTypeId,
        material: MaterialId,
        quantity: u32,
        location: TileCoord,
    ) -> EntityId {
        let id = self.allocate_entity_id();
        self.items
            .added(ItemRecord::new(id, item_type, material, quantity, location));
        id
    }

    /// Put a new item stack directly inside a tracked container
    pub fn spawn_item_in_container(
        &mut self,
        item_type: ItemTypeId,
        material: MaterialId,
        quantity: u32,
        container: EntityId,
    ) -> EntityId {
        let location = self
            .furniture
            .get(container)
            .map(|f| f.location)
            .unwrap_or_else(|| panic!("spawning into untracked {}", container));
        let id = self.spawn_item(item_type, material, quantity, location);
        self.items.place(id, location, Some(container));
        id
    }

    /// Put a new furniture instance into the world and its tracker
    pub fn spawn_furniture(
        &mut self,
        furniture_type: FurnitureTypeId,
        location: TileCoord,
        workspace: TileCoord,
    ) -> EntityId {
        let id = self.allocate_entity_id();
        self.furniture
            .added(FurnitureRecord::new(id, furniture_type, location, workspace));
        id
    }

    /// Furniture that can hold liquid gets a container record too
    pub fn spawn_liquid_container(
        &mut self,
        furniture_type: FurnitureTypeId,
        location: TileCoord,
        workspace: TileCoord,
        capacity: f32,
    ) -> EntityId {
        let id = self.spawn_furniture(furniture_type, location, workspace);
        self.liquids.added(LiquidContainerRecord::new(id, capacity));
        id
    }

    /// Put a new creature into the world and its tracker
    pub fn spawn_creature(&mut self, species: impl Into<String>, location: TileCoord) -> EntityId {
        let id = self.allocate_entity_id();
        self.creatures
            .added(CreatureRecord::new(id, species, location));
        id
    }

    /// Keep room id issuance ahead of an id restored from a save
    pub(crate) fn bump_room_id(&mut self, id: RoomId) {
        self.next_room_id = self.next_room_id.max(id.0 + 1);
    }

    /// Explicit teardown: drop every job, claim, entity, and room
    pub fn reset(&mut self) {
        self.jobs.reset();
        self.items.reset();
        self.creatures.reset();
        self.furniture.reset();
        self.liquids.reset();
        self.rooms.clear();
    }
}

/// A running settlement: the bus plus the state it dispatches over
pub struct Session {
    pub bus: MessageBus,
    pub state: SettlementState,
}

impl Session {
    pub fn new(map: AreaMap, dictionaries: Dictionaries, seed: u64) -> Self {
        let bus = MessageBus::new();
        // Lifecycle first so rooms always observe post-release state.
        lifecycle::register(&bus);
        resolvers::register(&bus);
        register_room_router(&bus);
        Session {
            bus,
            state: SettlementState::new(map, dictionaries, seed),
        }
    }

    /// Declare a room. Its first reconciliation is staggered so rooms do
    /// not spike the simulation in the same tick.
    pub fn add_room(&mut self, tiles: BTreeSet<TileCoord>, behaviour: RoomBehaviour) -> RoomId {
        let id = RoomId(self.state.next_room_id);
        self.state.next_room_id += 1;
        let interval = self
            .state
            .rng
            .gen_range(RECONCILE_INTERVAL_MIN..RECONCILE_INTERVAL_MAX);
        let first_delay = self.state.rng.gen_range(0.0..interval);
        let now = self.state.clock.current_sim_time();
        self.state.rooms.insert(
            id,
            Room {
                id,
                tiles,
                behaviour,
                next_update_at: now + first_delay,
                update_interval: interval,
            },
        );
        id
    }

    /// Advance the clock and run the reconciliation pass of every room
    /// whose interval elapsed. A room is detached from the registry for
    /// the duration of its own pass.
    pub fn tick(&mut self, elapsed: f64) {
        self.state.clock.advance(elapsed);
        let now = self.state.clock.current_sim_time();
        let due: Vec<RoomId> = self
            .state
            .rooms
            .values()
            .filter(|room| room.next_update_at <= now)
            .map(|room| room.id)
            .collect();
        for room_id in due {
            self.run_reconciliation(room_id, now);
        }
    }

    /// Force one reconciliation pass for a room right now
    pub fn reconcile_room(&mut self, room_id: RoomId) {
        let now = self.state.clock.current_sim_time();
        self.run_reconciliation(room_id, now);
    }

    fn run_reconciliation(&mut self, room_id: RoomId, now: f64) {
        let Some(mut room) = self.state.rooms.remove(&room_id) else {
            return;
        };
        room.behaviour
            .infrequent_update(&self.bus, &mut self.state, room_id, &room.tiles);
        room.next_update_at = now + room.update_interval;
        self.state.rooms.insert(room_id, room);
    }

    /// Recombine two rooms: the kept room absorbs the other's tiles and
    /// its behaviour's job indices, without loss. Both rooms must exist
    /// and share an archetype.
    pub fn merge_rooms(&mut self, keep: RoomId, absorb: RoomId) {
        let absorbed = self
            .state
            .rooms
            .remove(&absorb)
            .unwrap_or_else(|| panic!("merging unknown {}", absorb));
        let room = self
            .state
            .rooms
            .get_mut(&keep)
            .unwrap_or_else(|| panic!("merging into unknown {}", keep));
        room.tiles.extend(absorbed.tiles);
        room.behaviour.merge_from(absorbed.behaviour);
    }

    /// Split tiles off into a new room of the same archetype. The clone
    /// shares live job ids; each side then keeps only the index entries
    /// whose unit still falls inside its footprint, so no job is
    /// duplicated or lost.
    pub fn split_room(&mut self, room_id: RoomId, split_tiles: BTreeSet<TileCoord>) -> RoomId {
        let behaviour = {
            let room = self
                .state
                .rooms
                .get_mut(&room_id)
                .unwrap_or_else(|| panic!("splitting unknown {}", room_id));
            room.tiles.retain(|tile| !split_tiles.contains(tile));
            room.behaviour.clone()
        };
        let new_id = self.add_room(split_tiles, behaviour);

        // Re-index both sides against their reduced footprints.
        for id in [room_id, new_id] {
            let Some(mut room) = self.state.rooms.remove(&id) else {
                continue;
            };
            room.behaviour.retain_units(&room.tiles, &self.state);
            self.state.rooms.insert(id, room);
        }
        new_id
    }

    /// Session teardown
    pub fn reset(&mut self) {
        self.state.reset();
    }
}

fn register_room_router(bus: &MessageBus) {
    for (kind, terminal) in [
        (MessageKind::JobCompleted, JobState::Completed),
        (MessageKind::JobCancelled, JobState::Cancelled),
        (MessageKind::JobRemoved, JobState::Removed),
    ] {
        bus.subscribe(kind, move |bus, state, message| {
            let (Message::JobCompleted { job_id }
            | Message::JobCancelled { job_id }
            | Message::JobRemoved { job_id }) = message
            else {
                panic!("room router received unexpected message");
            };
            let job_id = *job_id;
            let room_ids: Vec<RoomId> = state.rooms.keys().copied().collect();
            for room_id in room_ids {
                let Some(mut room) = state.rooms.remove(&room_id) else {
                    continue;
                };
                room.behaviour
                    .notify_job_state(bus, state, job_id, terminal);
                state.rooms.insert(room_id, room);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::jobs::JobPayload;
    use crate::settlement::rooms::RoomBehaviour;
    use crate::settlement::test_support::{
        deliver_hauling, deliver_liquid_transfer, demo_session, farm_behaviour,
        graveyard_behaviour, kitchen_behaviour, names,
    };
    use crate::settlement::types::Season;

    fn square(x0: usize, y0: usize, side: usize) -> BTreeSet<TileCoord> {
        let mut tiles = BTreeSet::new();
        for x in x0..x0 + side {
            for y in y0..y0 + side {
                tiles.insert(TileCoord::new(x, y));
            }
        }
        tiles
    }

    /// Scenario: an untilled farm with no crop selected produces exactly
    /// one tilling job per tile and nothing else.
    #[test]
    fn test_farm_tilling_scenario() {
        let mut session = demo_session();
        let farm = farm_behaviour(&session.state);
        let tilling = farm.tilling_job_type;
        let room = session.add_room(square(0, 0, 2), RoomBehaviour::Farm(farm));

        session.tick(RECONCILE_INTERVAL_MAX);
        assert_eq!(session.state.jobs.by_type(tilling).len(), 4);
        assert_eq!(session.state.jobs.len(), 4);

        // Completing a tilling job tills the tile; the next pass plants
        // nothing because no crop is selected.
        let job_id = session.state.jobs.by_type(tilling)[0];
        let job = session.state.jobs.get(job_id).unwrap();
        let (tile, payload) = (job.location, job.payload);
        let JobPayload::FloorReplacement { floor_type, material } = payload else {
            panic!("tilling job carries no floor payload");
        };
        session.state.map.set_floor(tile, floor_type, material);
        let bus = &session.bus;
        bus.publish(&mut session.state, Message::JobCompleted { job_id });

        session.reconcile_room(room);
        assert_eq!(session.state.jobs.len(), 3);
    }

    /// Scenario: planting jobs appear once tiles are tilled and a crop in
    /// its planting window is selected, and vanish when the season closes.
    #[test]
    fn test_farm_planting_season_scenario() {
        let mut session = demo_session();
        let mut farm = farm_behaviour(&session.state);
        farm.selected_crop = Some(names::plant_species(&session.state, "barley"));
        let planting = farm.planting_job_type;
        let tiles = square(0, 0, 2);
        let (floor, soil) = (farm.desired_floor_type, farm.desired_floor_material);
        for &tile in &tiles {
            session.state.map.set_floor(tile, floor, soil);
        }
        let room = session.add_room(tiles, RoomBehaviour::Farm(farm));

        session.tick(RECONCILE_INTERVAL_MAX);
        assert_eq!(session.state.jobs.by_type(planting).len(), 4);

        session.state.clock.set_season(Season::Winter);
        session.reconcile_room(room);
        assert!(session.state.jobs.by_type(planting).is_empty());
        assert!(session.state.jobs.is_empty());
    }

    /// Scenario: a recipe needing 2 liquid and 3 items fills both
    /// requirements without redundant jobs, then cooks exactly once.
    #[test]
    fn test_kitchen_scenario() {
        let mut session = demo_session();
        let kitchen = kitchen_behaviour(&session.state);
        let (hauling, transfer, cooking) = (
            kitchen.hauling_job_type,
            kitchen.transfer_job_type,
            kitchen.cooking_job_type,
        );
        let station = session.state.spawn_liquid_container(
            names::furniture_type(&session.state, "cauldron"),
            TileCoord::new(3, 3),
            TileCoord::new(3, 4),
            10.0,
        );
        session.state.spawn_item(
            names::item_type(&session.state, "grain"),
            names::material(&session.state, "oak"),
            5,
            TileCoord::new(0, 0),
        );
        let barrel = session.state.spawn_liquid_container(
            names::furniture_type(&session.state, "barrel"),
            TileCoord::new(7, 7),
            TileCoord::new(7, 6),
            10.0,
        );
        let water = names::material(&session.state, "water");
        session.state.liquids.add_volume(barrel, water, 8.0);

        let room = session.add_room(square(2, 2, 3), RoomBehaviour::Kitchen(kitchen));

        session.reconcile_room(room);
        session.reconcile_room(room);
        assert_eq!(session.state.jobs.by_type(hauling).len(), 1);
        assert_eq!(session.state.jobs.by_type(transfer).len(), 1);

        // En-route jobs count toward the requirement.
        session.reconcile_room(room);
        assert_eq!(session.state.jobs.len(), 2);

        let haul_id = session.state.jobs.by_type(hauling)[0];
        deliver_hauling(&session.bus, &mut session.state, haul_id);
        let transfer_id = session.state.jobs.by_type(transfer)[0];
        deliver_liquid_transfer(&session.bus, &mut session.state, transfer_id);

        session.reconcile_room(room);
        assert_eq!(session.state.jobs.by_type(cooking).len(), 1);
        session.reconcile_room(room);
        assert_eq!(session.state.jobs.by_type(cooking).len(), 1);
        assert_eq!(session.state.jobs.len(), 1);
    }

    /// Scenario: one unclaimed corpse, one reachable container: exactly
    /// one hauling job, with the container reserved inside the pass.
    #[test]
    fn test_graveyard_scenario() {
        let mut session = demo_session();
        let graveyard = graveyard_behaviour(&session.state);
        let hauling = graveyard.hauling_job_type;
        let grave = session.state.spawn_furniture(
            names::furniture_type(&session.state, "sarcophagus"),
            TileCoord::new(5, 5),
            TileCoord::new(5, 6),
        );
        let corpse = session
            .state
            .spawn_creature("dwarf", TileCoord::new(1, 1));
        session.state.creatures.mark_dead(corpse);

        session.add_room(square(4, 4, 3), RoomBehaviour::Graveyard(graveyard));
        session.tick(RECONCILE_INTERVAL_MAX);

        let jobs = session.state.jobs.by_type(hauling);
        assert_eq!(jobs.len(), 1);
        assert_eq!(
            session.state.furniture.get(grave).and_then(|f| f.assigned_to),
            Some(corpse)
        );

        // Completing the haul inters the corpse and retires the burial.
        deliver_hauling(&session.bus, &mut session.state, jobs[0]);
        assert!(session.state.jobs.is_empty());
        assert_eq!(
            session.state.creatures.get(corpse).map(|c| c.location),
            Some(TileCoord::new(5, 5))
        );

        session.tick(RECONCILE_INTERVAL_MAX);
        assert!(session.state.jobs.is_empty());
    }

    #[test]
    fn test_split_room_shares_jobs_without_duplication() {
        let mut session = demo_session();
        let farm = farm_behaviour(&session.state);
        let tilling = farm.tilling_job_type;
        let room = session.add_room(square(0, 0, 2), RoomBehaviour::Farm(farm));
        session.tick(RECONCILE_INTERVAL_MAX);
        assert_eq!(session.state.jobs.len(), 4);

        let split_tiles: BTreeSet<TileCoord> =
            [TileCoord::new(0, 0), TileCoord::new(0, 1)].into_iter().collect();
        let new_room = session.split_room(room, split_tiles);

        // Four live jobs total, each indexed by exactly one side.
        assert_eq!(session.state.jobs.by_type(tilling).len(), 4);
        let old_ids = session.state.rooms[&room].behaviour.tracked_job_ids();
        let new_ids = session.state.rooms[&new_room].behaviour.tracked_job_ids();
        assert_eq!(old_ids.len(), 2);
        assert_eq!(new_ids.len(), 2);
        assert!(old_ids.iter().all(|id| !new_ids.contains(id)));

        // Reconciling both sides creates nothing new.
        session.reconcile_room(room);
        session.reconcile_room(new_room);
        assert_eq!(session.state.jobs.len(), 4);
    }

    #[test]
    fn test_merge_rooms_unions_indices() {
        let mut session = demo_session();
        let farm_a = farm_behaviour(&session.state);
        let tilling = farm_a.tilling_job_type;
        let room_a = session.add_room(square(0, 0, 2), RoomBehaviour::Farm(farm_a));
        let farm_b = farm_behaviour(&session.state);
        let room_b = session.add_room(square(4, 0, 2), RoomBehaviour::Farm(farm_b));

        session.tick(RECONCILE_INTERVAL_MAX);
        assert_eq!(session.state.jobs.by_type(tilling).len(), 8);

        session.merge_rooms(room_a, room_b);
        assert!(session.state.rooms.get(&room_b).is_none());
        let merged = &session.state.rooms[&room_a];
        assert_eq!(merged.tiles.len(), 8);
        assert_eq!(merged.behaviour.tracked_job_ids().len(), 8);

        session.reconcile_room(room_a);
        assert_eq!(session.state.jobs.len(), 8);
    }

    #[test]
    fn test_reset_clears_session_state() {
        let mut session = demo_session();
        let farm = farm_behaviour(&session.state);
        session.add_room(square(0, 0, 2), RoomBehaviour::Farm(farm));
        session.state.spawn_item(
            names::item_type(&session.state, "grain"),
            names::material(&session.state, "oak"),
            5,
            TileCoord::new(0, 0),
        );
        session.tick(RECONCILE_INTERVAL_MAX);
        assert!(!session.state.jobs.is_empty());

        session.reset();
        assert!(session.state.jobs.is_empty());
        assert!(session.state.rooms.is_empty());
        assert!(session.state.items.item_ids().is_empty());
    }
}
