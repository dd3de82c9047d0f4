//! Mushroom processing reconciliation behaviour
//!
//! Raw logs on the footprint get an innoculation job; innoculated logs are
//! hauled into a shock tank, but only while a tank is available. The tank
//! is flipped to assigned synchronously while the hauling job is issued so
//! a second log cannot be routed to the same tank before the first haul
//! completes.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::settlement::allocation::{HaulingAllocation, PositionKind};
use crate::settlement::dictionaries::{
    ConfigError, Dictionaries, ItemTypeId, JobTypeId, ProfessionId,
};
use crate::settlement::jobs::JobState;
use crate::settlement::messages::{HaulingAllocationRequest, Message, MessageBus, SingleShot};
use crate::settlement::session::SettlementState;
use crate::settlement::types::{EntityId, JobId, RoomId, TileCoord};

/// Names a mushroom-processing behaviour is configured with
#[derive(Clone, Copy, Debug)]
pub struct MushroomConfig<'a> {
    pub innoculation_job_type: &'a str,
    pub hauling_job_type: &'a str,
    pub raw_log_item_type: &'a str,
    pub innoculated_log_item_type: &'a str,
    pub tank_tag: &'a str,
    pub profession: Option<&'a str>,
}

/// An outstanding log-to-tank haul
#[derive(Clone, Copy, Debug)]
pub(crate) struct ShockHauling {
    pub job_id: JobId,
    pub log: EntityId,
}

/// Reconciliation state machine for mushroom processing rooms
#[derive(Clone, Debug)]
pub struct MushroomBehaviour {
    pub(crate) innoculation_job_type: JobTypeId,
    pub(crate) hauling_job_type: JobTypeId,
    pub(crate) raw_log_item_type: ItemTypeId,
    pub(crate) innoculated_log_item_type: ItemTypeId,
    pub(crate) tank_tag: String,
    pub(crate) required_profession: Option<ProfessionId>,
    /// One innoculation job per raw log
    pub(crate) innoculations: BTreeMap<EntityId, JobId>,
    /// One haul per reserved tank
    pub(crate) shock_haulings: BTreeMap<EntityId, ShockHauling>,
}

impl MushroomBehaviour {
    /// Resolve the configured names. A missing name is fatal.
    pub fn configure(
        dictionaries: &Dictionaries,
        config: MushroomConfig<'_>,
    ) -> Result<Self, ConfigError> {
        Ok(MushroomBehaviour {
            innoculation_job_type: dictionaries
                .job_types
                .require(config.innoculation_job_type)?,
            hauling_job_type: dictionaries.job_types.require(config.hauling_job_type)?,
            raw_log_item_type: dictionaries.item_types.require(config.raw_log_item_type)?,
            innoculated_log_item_type: dictionaries
                .item_types
                .require(config.innoculated_log_item_type)?,
            tank_tag: config.tank_tag.to_string(),
            required_profession: config
                .profession
                .map(|name| dictionaries.professions.require(name))
                .transpose()?,
            innoculations: BTreeMap::new(),
            shock_haulings: BTreeMap::new(),
        })
    }

    pub fn infrequent_update(
        &mut self,
        bus: &MessageBus,
        state: &mut SettlementState,
        _room_id: RoomId,
        tiles: &BTreeSet<TileCoord>,
    ) {
        self.innoculations.retain(|_, id| state.jobs.contains(*id));
        self.shock_haulings
            .retain(|_, hauling| state.jobs.contains(hauling.job_id));

        self.detect_raw_logs(bus, state, tiles);
        self.detect_shockable_logs(bus, state, tiles);
    }

    fn detect_raw_logs(
        &mut self,
        bus: &MessageBus,
        state: &mut SettlementState,
        tiles: &BTreeSet<TileCoord>,
    ) {
        for log in state.items.unallocated_matching(self.raw_log_item_type, None) {
            if self.innoculations.contains_key(&log) {
                continue;
            }
            let Some(location) = state.items.get(log).map(|i| i.location) else {
                continue;
            };
            if !tiles.contains(&location) {
                continue;
            }
            let job_id = {
                let job = state.jobs.create(self.innoculation_job_type, location);
                job.target_id = Some(log);
                job.required_profession = self.required_profession;
                job.id
            };
            bus.publish(state, Message::JobCreated { job_id });
            self.innoculations.insert(log, job_id);
        }
    }

    fn detect_shockable_logs(
        &mut self,
        bus: &MessageBus,
        state: &mut SettlementState,
        tiles: &BTreeSet<TileCoord>,
    ) {
        for log in state
            .items
            .unallocated_matching(self.innoculated_log_item_type, None)
        {
            if self.shock_haulings.values().any(|h| h.log == log) {
                continue;
            }
            let Some(location) = state.items.get(log).map(|i| i.location) else {
                continue;
            };
            if !tiles.contains(&location) {
                continue;
            }
            // Hauling is only initiated while a tank is available.
            let Some(tank) = self.available_tank(state, tiles) else {
                return;
            };
            self.request_shock_hauling(bus, state, log, tank);
        }
    }

    fn available_tank(
        &self,
        state: &SettlementState,
        tiles: &BTreeSet<TileCoord>,
    ) -> Option<EntityId> {
        state
            .furniture
            .find_by_tag(&state.dictionaries.furniture_types, &self.tank_tag, true)
            .into_iter()
            .filter(|id| !self.shock_haulings.contains_key(id))
            .find(|id| {
                state
                    .furniture
                    .get(*id)
                    .map_or(false, |f| tiles.contains(&f.location))
            })
    }

    fn request_shock_hauling(
        &mut self,
        bus: &MessageBus,
        state: &mut SettlementState,
        log: EntityId,
        tank: EntityId,
    ) {
        let Some((position, workspace)) =
            state.furniture.get(tank).map(|f| (f.location, f.workspace))
        else {
            return;
        };
        let slot: Rc<RefCell<Option<JobId>>> = Rc::new(RefCell::new(None));
        let callback_slot = Rc::clone(&slot);
        let job_type = self.hauling_job_type;
        let profession = self.required_profession;
        bus.publish(
            state,
            Message::RequestHaulingAllocation(HaulingAllocationRequest {
                requester: tank,
                specific_item: Some(log),
                required_item_type: Some(self.innoculated_log_item_type),
                required_material: None,
                quantity: 1,
                target_position: position,
                target_kind: PositionKind::FurnitureSlot,
                target_id: Some(tank),
                callback: SingleShot::new(move |bus, state, result: Option<HaulingAllocation>| {
                    let Some(hauling) = result else { return };
                    // Reserve the tank before the job exists so a nested
                    // query cannot route a second log here.
                    state.furniture.assign(tank, log);
                    let job_id = {
                        let job = state.jobs.create(job_type, hauling.source_position);
                        job.secondary_location = Some(workspace);
                        job.target_id = Some(tank);
                        job.required_profession = profession;
                        job.hauling_allocation = Some(hauling);
                        job.id
                    };
                    bus.publish(state, Message::JobCreated { job_id });
                    *callback_slot.borrow_mut() = Some(job_id);
                }),
            }),
        );
        let resolved = *slot.borrow();
        if let Some(job_id) = resolved {
            self.shock_haulings.insert(tank, ShockHauling { job_id, log });
        }
    }

    pub fn notify_job_state(
        &mut self,
        _bus: &MessageBus,
        state: &mut SettlementState,
        job_id: JobId,
        terminal: JobState,
    ) {
        self.innoculations.retain(|_, id| *id != job_id);

        let Some((tank, hauling)) = self
            .shock_haulings
            .iter()
            .find(|(_, h)| h.job_id == job_id)
            .map(|(t, h)| (*t, *h))
        else {
            return;
        };
        if terminal != JobState::Completed {
            // No log arrived; the tank goes back to available.
            let still_ours = state
                .furniture
                .get(tank)
                .map_or(false, |f| f.assigned_to == Some(hauling.log));
            if still_ours {
                state.furniture.clear_assignment(tank);
            }
        }
        self.shock_haulings.remove(&tank);
    }

    pub fn merge_from(&mut self, other: MushroomBehaviour) {
        self.innoculations.extend(other.innoculations);
        self.shock_haulings.extend(other.shock_haulings);
    }

    pub fn retain_units(&mut self, tiles: &BTreeSet<TileCoord>, state: &SettlementState) {
        self.innoculations.retain(|log, _| {
            state
                .items
                .get(*log)
                .map_or(false, |i| tiles.contains(&i.location))
        });
        self.shock_haulings.retain(|tank, _| {
            state
                .furniture
                .get(*tank)
                .map_or(false, |f| tiles.contains(&f.location))
        });
    }

    pub fn tracked_job_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.innoculations.values().copied().collect();
        ids.extend(self.shock_haulings.values().map(|h| h.job_id));
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::test_support::{empty_state, mushroom_behaviour, names, wired_bus};
    use crate::settlement::trackers::FurnitureState;

    fn footprint() -> BTreeSet<TileCoord> {
        let mut tiles = BTreeSet::new();
        for x in 0..6 {
            for y in 0..6 {
                tiles.insert(TileCoord::new(x, y));
            }
        }
        tiles
    }

    #[test]
    fn test_raw_log_gets_innoculation_job() {
        let bus = wired_bus();
        let mut state = empty_state();
        let mut mushroom = mushroom_behaviour(&state);
        let tiles = footprint();

        let log = state.spawn_item(
            names::item_type(&state, "raw_log"),
            names::material(&state, "oak"),
            1,
            TileCoord::new(1, 1),
        );

        mushroom.infrequent_update(&bus, &mut state, RoomId(0), &tiles);
        let jobs = state.jobs.by_type(mushroom.innoculation_job_type);
        assert_eq!(jobs.len(), 1);
        assert_eq!(state.jobs.get(jobs[0]).unwrap().target_id, Some(log));

        mushroom.infrequent_update(&bus, &mut state, RoomId(0), &tiles);
        assert_eq!(state.jobs.len(), 1);
    }

    #[test]
    fn test_tank_reserved_while_issuing_haul() {
        let bus = wired_bus();
        let mut state = empty_state();
        let mut mushroom = mushroom_behaviour(&state);
        let tiles = footprint();

        let tank = state.spawn_furniture(
            names::furniture_type(&state, "shock_tank"),
            TileCoord::new(4, 4),
            TileCoord::new(4, 5),
        );
        // Two innoculated logs, one tank: only one haul may be issued.
        state.spawn_item(
            names::item_type(&state, "innoculated_log"),
            names::material(&state, "oak"),
            1,
            TileCoord::new(1, 1),
        );
        state.spawn_item(
            names::item_type(&state, "innoculated_log"),
            names::material(&state, "oak"),
            1,
            TileCoord::new(2, 1),
        );

        mushroom.infrequent_update(&bus, &mut state, RoomId(0), &tiles);
        assert_eq!(state.jobs.by_type(mushroom.hauling_job_type).len(), 1);
        assert_eq!(
            state.furniture.get(tank).map(|f| f.state),
            Some(FurnitureState::Assigned)
        );

        // Still only one haul while the tank stays reserved.
        mushroom.infrequent_update(&bus, &mut state, RoomId(0), &tiles);
        assert_eq!(state.jobs.by_type(mushroom.hauling_job_type).len(), 1);
    }

    #[test]
    fn test_no_available_tank_means_no_haul() {
        let bus = wired_bus();
        let mut state = empty_state();
        let mut mushroom = mushroom_behaviour(&state);
        let tiles = footprint();

        state.spawn_item(
            names::item_type(&state, "innoculated_log"),
            names::material(&state, "oak"),
            1,
            TileCoord::new(1, 1),
        );

        mushroom.infrequent_update(&bus, &mut state, RoomId(0), &tiles);
        assert!(state.jobs.is_empty());
    }

    #[test]
    fn test_cancelled_haul_releases_the_tank() {
        let bus = wired_bus();
        let mut state = empty_state();
        let mut mushroom = mushroom_behaviour(&state);
        let tiles = footprint();

        let tank = state.spawn_furniture(
            names::furniture_type(&state, "shock_tank"),
            TileCoord::new(4, 4),
            TileCoord::new(4, 5),
        );
        let log = state.spawn_item(
            names::item_type(&state, "innoculated_log"),
            names::material(&state, "oak"),
            1,
            TileCoord::new(1, 1),
        );

        mushroom.infrequent_update(&bus, &mut state, RoomId(0), &tiles);
        let job_id = state.jobs.by_type(mushroom.hauling_job_type)[0];

        bus.publish(&mut state, Message::JobCancelled { job_id });
        mushroom.notify_job_state(&bus, &mut state, job_id, JobState::Cancelled);

        assert_eq!(
            state.furniture.get(tank).map(|f| f.state),
            Some(FurnitureState::Available)
        );
        assert_eq!(state.items.num_unallocated(log), 1);
        assert!(mushroom.shock_haulings.is_empty());
    }
}
