//! Farm reconciliation behaviour
//!
//! Drives each footprint tile toward tilled floor, then a planted crop of
//! the selected species, then harvest at maturity. Planting jobs for a
//! deselected crop or outside the species' planting window are retracted
//! even when otherwise still valid-looking; a plant of the wrong species
//! triggers a removal request, never a replant on top.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::settlement::dictionaries::{
    ConfigError, Dictionaries, FloorTypeId, JobTypeId, MaterialId, PlantSpeciesId, ProfessionId,
};
use crate::settlement::jobs::{JobPayload, JobState};
use crate::settlement::messages::{
    Message, MessageBus, PlantRemovalRequest, PlantToRemove, SingleShot,
};
use crate::settlement::session::SettlementState;
use crate::settlement::types::{JobId, RoomId, TileCoord};

/// Names a farm behaviour is configured with
#[derive(Clone, Copy, Debug)]
pub struct FarmConfig<'a> {
    pub tilling_job_type: &'a str,
    pub planting_job_type: &'a str,
    pub harvesting_job_type: &'a str,
    pub removal_job_type: &'a str,
    pub profession: Option<&'a str>,
    pub desired_floor_type: &'a str,
    pub desired_floor_material: &'a str,
}

/// Reconciliation state machine for farm rooms
#[derive(Clone, Debug)]
pub struct FarmBehaviour {
    pub(crate) tilling_job_type: JobTypeId,
    pub(crate) planting_job_type: JobTypeId,
    pub(crate) harvesting_job_type: JobTypeId,
    pub(crate) removal_job_type: JobTypeId,
    pub(crate) required_profession: Option<ProfessionId>,
    pub(crate) desired_floor_type: FloorTypeId,
    pub(crate) desired_floor_material: MaterialId,
    /// Crop the player selected for this farm, if any
    pub selected_crop: Option<PlantSpeciesId>,
    /// One outstanding job per tile, for duplicate suppression
    pub(crate) jobs_by_tile: BTreeMap<TileCoord, JobId>,
}

impl FarmBehaviour {
    /// Resolve the configured names. A missing name is fatal.
    pub fn configure(
        dictionaries: &Dictionaries,
        config: FarmConfig<'_>,
    ) -> Result<Self, ConfigError> {
        Ok(FarmBehaviour {
            tilling_job_type: dictionaries.job_types.require(config.tilling_job_type)?,
            planting_job_type: dictionaries.job_types.require(config.planting_job_type)?,
            harvesting_job_type: dictionaries.job_types.require(config.harvesting_job_type)?,
            removal_job_type: dictionaries.job_types.require(config.removal_job_type)?,
            required_profession: config
                .profession
                .map(|name| dictionaries.professions.require(name))
                .transpose()?,
            desired_floor_type: dictionaries.floor_types.require(config.desired_floor_type)?,
            desired_floor_material: dictionaries
                .materials
                .require(config.desired_floor_material)?,
            selected_crop: None,
            jobs_by_tile: BTreeMap::new(),
        })
    }

    pub fn infrequent_update(
        &mut self,
        bus: &MessageBus,
        state: &mut SettlementState,
        room_id: RoomId,
        tiles: &BTreeSet<TileCoord>,
    ) {
        self.prune(bus, state);

        let season = state.clock.current_season();
        for &tile in tiles {
            if self.jobs_by_tile.contains_key(&tile) {
                continue;
            }
            let Some(tile_state) = state.map.tile_at(tile).copied() else {
                log::warn!("{} footprint tile {} is off the map", room_id, tile);
                continue;
            };

            if let Some(plant) = tile_state.plant {
                match self.selected_crop {
                    Some(selected) if plant.species == selected => {
                        if plant.mature {
                            self.create_tile_job(
                                bus,
                                state,
                                tile,
                                self.harvesting_job_type,
                                JobPayload::None,
                            );
                        }
                    }
                    Some(_) => self.request_plant_removal(bus, state, tile),
                    None => {}
                }
            } else if tile_state.floor_type != self.desired_floor_type
                || tile_state.floor_material != self.desired_floor_material
            {
                let payload = JobPayload::FloorReplacement {
                    floor_type: self.desired_floor_type,
                    material: self.desired_floor_material,
                };
                self.create_tile_job(bus, state, tile, self.tilling_job_type, payload);
            } else if let Some(selected) = self.selected_crop {
                if state
                    .dictionaries
                    .plant_species
                    .get(selected)
                    .plantable_in(season)
                {
                    let payload = JobPayload::Planting { species: selected };
                    self.create_tile_job(bus, state, tile, self.planting_job_type, payload);
                }
            }
        }
    }

    /// Drop terminal entries and retract planting jobs invalidated by a
    /// crop change or the planting window closing
    fn prune(&mut self, bus: &MessageBus, state: &mut SettlementState) {
        let season = state.clock.current_season();
        let entries: Vec<(TileCoord, JobId)> =
            self.jobs_by_tile.iter().map(|(t, j)| (*t, *j)).collect();
        for (tile, job_id) in entries {
            let Some(job) = state.jobs.get(job_id) else {
                self.jobs_by_tile.remove(&tile);
                continue;
            };
            if job.job_type != self.planting_job_type {
                continue;
            }
            let JobPayload::Planting { species } = job.payload else {
                panic!("{} planting job carries no planting payload", job_id);
            };
            let still_wanted = self.selected_crop == Some(species)
                && state
                    .dictionaries
                    .plant_species
                    .get(species)
                    .plantable_in(season);
            if !still_wanted {
                bus.publish(state, Message::JobRemoved { job_id });
                self.jobs_by_tile.remove(&tile);
            }
        }
    }

    fn create_tile_job(
        &mut self,
        bus: &MessageBus,
        state: &mut SettlementState,
        tile: TileCoord,
        job_type: JobTypeId,
        payload: JobPayload,
    ) {
        let job_id = {
            let job = state.jobs.create(job_type, tile);
            job.required_profession = self.required_profession;
            job.payload = payload;
            job.id
        };
        bus.publish(state, Message::JobCreated { job_id });
        self.jobs_by_tile.insert(tile, job_id);
    }

    fn request_plant_removal(
        &mut self,
        bus: &MessageBus,
        state: &mut SettlementState,
        tile: TileCoord,
    ) {
        let slot: Rc<RefCell<Option<JobId>>> = Rc::new(RefCell::new(None));
        let callback_slot = Rc::clone(&slot);
        let job_type = self.removal_job_type;
        let profession = self.required_profession;
        bus.publish(
            state,
            Message::RequestPlantRemoval(PlantRemovalRequest {
                location: tile,
                callback: SingleShot::new(move |bus, state, result: Option<PlantToRemove>| {
                    let Some(plant) = result else { return };
                    let job_id = {
                        let job = state.jobs.create(job_type, plant.location);
                        job.required_profession = profession;
                        job.id
                    };
                    bus.publish(state, Message::JobCreated { job_id });
                    *callback_slot.borrow_mut() = Some(job_id);
                }),
            }),
        );
        // Resolved synchronously before publish returned.
        let resolved = *slot.borrow();
        if let Some(job_id) = resolved {
            self.jobs_by_tile.insert(tile, job_id);
        }
    }

    pub fn notify_job_state(
        &mut self,
        _bus: &MessageBus,
        _state: &mut SettlementState,
        job_id: JobId,
        _terminal: JobState,
    ) {
        self.jobs_by_tile.retain(|_, id| *id != job_id);
    }

    pub fn merge_from(&mut self, other: FarmBehaviour) {
        self.jobs_by_tile.extend(other.jobs_by_tile);
        if self.selected_crop.is_none() {
            self.selected_crop = other.selected_crop;
        }
    }

    pub fn retain_units(&mut self, tiles: &BTreeSet<TileCoord>) {
        self.jobs_by_tile.retain(|tile, _| tiles.contains(tile));
    }

    pub fn tracked_job_ids(&self) -> Vec<JobId> {
        self.jobs_by_tile.values().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::test_support::{empty_state, farm_behaviour, names, wired_bus};
    use crate::settlement::types::{RoomId, Season};

    fn footprint() -> BTreeSet<TileCoord> {
        let mut tiles = BTreeSet::new();
        for x in 0..2 {
            for y in 0..2 {
                tiles.insert(TileCoord::new(x, y));
            }
        }
        tiles
    }

    #[test]
    fn test_untilled_tiles_get_one_tilling_job_each() {
        let bus = wired_bus();
        let mut state = empty_state();
        let mut farm = farm_behaviour(&state);
        let tiles = footprint();

        farm.infrequent_update(&bus, &mut state, RoomId(0), &tiles);
        assert_eq!(state.jobs.by_type(farm.tilling_job_type).len(), 4);
        assert!(state.jobs.by_type(farm.planting_job_type).is_empty());

        // Reconciling again with no world change creates nothing new.
        farm.infrequent_update(&bus, &mut state, RoomId(0), &tiles);
        assert_eq!(state.jobs.len(), 4);
    }

    #[test]
    fn test_tilled_tiles_get_planting_jobs_in_season() {
        let bus = wired_bus();
        let mut state = empty_state();
        let mut farm = farm_behaviour(&state);
        let tiles = footprint();
        let barley = names::plant_species(&state, "barley");
        farm.selected_crop = Some(barley);
        for &tile in &tiles {
            state
                .map
                .set_floor(tile, farm.desired_floor_type, farm.desired_floor_material);
        }

        farm.infrequent_update(&bus, &mut state, RoomId(0), &tiles);
        let planting = state.jobs.by_type(farm.planting_job_type);
        assert_eq!(planting.len(), 4);
        for id in &planting {
            assert_eq!(
                state.jobs.get(*id).unwrap().payload,
                JobPayload::Planting { species: barley }
            );
        }
    }

    #[test]
    fn test_out_of_season_planting_jobs_are_retracted() {
        let bus = wired_bus();
        let mut state = empty_state();
        let mut farm = farm_behaviour(&state);
        let tiles = footprint();
        farm.selected_crop = Some(names::plant_species(&state, "barley"));
        for &tile in &tiles {
            state
                .map
                .set_floor(tile, farm.desired_floor_type, farm.desired_floor_material);
        }

        farm.infrequent_update(&bus, &mut state, RoomId(0), &tiles);
        assert_eq!(state.jobs.len(), 4);

        // Barley plants in spring and summer only.
        state.clock.set_season(Season::Winter);
        farm.infrequent_update(&bus, &mut state, RoomId(0), &tiles);
        assert!(state.jobs.is_empty());
        assert!(farm.tracked_job_ids().is_empty());
    }

    #[test]
    fn test_crop_change_retracts_planting_jobs() {
        let bus = wired_bus();
        let mut state = empty_state();
        let mut farm = farm_behaviour(&state);
        let tiles = footprint();
        farm.selected_crop = Some(names::plant_species(&state, "barley"));
        for &tile in &tiles {
            state
                .map
                .set_floor(tile, farm.desired_floor_type, farm.desired_floor_material);
        }
        farm.infrequent_update(&bus, &mut state, RoomId(0), &tiles);
        assert_eq!(state.jobs.by_type(farm.planting_job_type).len(), 4);

        farm.selected_crop = Some(names::plant_species(&state, "nettle"));
        farm.infrequent_update(&bus, &mut state, RoomId(0), &tiles);
        let planting = state.jobs.by_type(farm.planting_job_type);
        assert_eq!(planting.len(), 4);
        for id in &planting {
            assert_eq!(
                state.jobs.get(*id).unwrap().payload,
                JobPayload::Planting {
                    species: names::plant_species(&state, "nettle")
                }
            );
        }
    }

    #[test]
    fn test_wrong_species_triggers_removal_not_replant() {
        let bus = wired_bus();
        let mut state = empty_state();
        let mut farm = farm_behaviour(&state);
        let tiles = footprint();
        farm.selected_crop = Some(names::plant_species(&state, "barley"));
        let weed_tile = TileCoord::new(0, 0);
        state
            .map
            .set_floor(weed_tile, farm.desired_floor_type, farm.desired_floor_material);
        state
            .map
            .set_plant(weed_tile, names::plant_species(&state, "nettle"), false);

        farm.infrequent_update(&bus, &mut state, RoomId(0), &tiles);
        let removal = state.jobs.by_type(farm.removal_job_type);
        assert_eq!(removal.len(), 1);
        assert_eq!(state.jobs.get(removal[0]).unwrap().location, weed_tile);
        // No planting job on the occupied tile.
        assert!(state
            .jobs
            .by_type(farm.planting_job_type)
            .iter()
            .all(|id| state.jobs.get(*id).unwrap().location != weed_tile));
    }

    #[test]
    fn test_mature_selected_crop_gets_harvest_job() {
        let bus = wired_bus();
        let mut state = empty_state();
        let mut farm = farm_behaviour(&state);
        let tiles = footprint();
        let barley = names::plant_species(&state, "barley");
        farm.selected_crop = Some(barley);
        let tile = TileCoord::new(1, 1);
        state
            .map
            .set_floor(tile, farm.desired_floor_type, farm.desired_floor_material);
        state.map.set_plant(tile, barley, true);

        farm.infrequent_update(&bus, &mut state, RoomId(0), &tiles);
        let harvest = state.jobs.by_type(farm.harvesting_job_type);
        assert_eq!(harvest.len(), 1);
        assert_eq!(state.jobs.get(harvest[0]).unwrap().location, tile);
    }
}
