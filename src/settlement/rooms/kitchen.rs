//! Kitchen reconciliation behaviour
//!
//! One cooking session per station on the footprint. Solid and liquid
//! ingredient requirements are tracked independently; jobs already en
//! route count toward a requirement so no redundant second job is created.
//! Cooking starts only once every input is physically present, exactly
//! once per session.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::settlement::allocation::{HaulingAllocation, PositionKind};
use crate::settlement::dictionaries::{
    ConfigError, Dictionaries, ItemTypeId, JobTypeId, MaterialId, ProfessionId, RecipeId,
};
use crate::settlement::jobs::{JobPayload, JobState};
use crate::settlement::messages::{
    HaulingAllocationRequest, LiquidTransfer, LiquidTransferRequest, Message, MessageBus,
    SingleShot,
};
use crate::settlement::session::SettlementState;
use crate::settlement::types::{EntityId, JobId, RoomId, TileCoord};

const VOLUME_EPSILON: f32 = 1e-4;

/// Names a kitchen behaviour is configured with
#[derive(Clone, Copy, Debug)]
pub struct KitchenConfig<'a> {
    pub cooking_job_type: &'a str,
    pub hauling_job_type: &'a str,
    pub transfer_job_type: &'a str,
    pub station_tag: &'a str,
    pub recipe: &'a str,
    pub profession: Option<&'a str>,
}

/// Per-station ingredient and cooking bookkeeping
#[derive(Clone, Debug, Default)]
pub struct CookingSession {
    pub item_jobs: Vec<JobId>,
    pub liquid_jobs: Vec<JobId>,
    pub cooking_job: Option<JobId>,
    pub complete: bool,
}

/// Reconciliation state machine for kitchen rooms
#[derive(Clone, Debug)]
pub struct KitchenBehaviour {
    pub(crate) cooking_job_type: JobTypeId,
    pub(crate) hauling_job_type: JobTypeId,
    pub(crate) transfer_job_type: JobTypeId,
    pub(crate) station_tag: String,
    pub(crate) recipe: RecipeId,
    pub(crate) required_profession: Option<ProfessionId>,
    pub(crate) sessions: BTreeMap<EntityId, CookingSession>,
}

impl KitchenBehaviour {
    /// Resolve the configured names. A missing name is fatal.
    pub fn configure(
        dictionaries: &Dictionaries,
        config: KitchenConfig<'_>,
    ) -> Result<Self, ConfigError> {
        Ok(KitchenBehaviour {
            cooking_job_type: dictionaries.job_types.require(config.cooking_job_type)?,
            hauling_job_type: dictionaries.job_types.require(config.hauling_job_type)?,
            transfer_job_type: dictionaries.job_types.require(config.transfer_job_type)?,
            station_tag: config.station_tag.to_string(),
            recipe: dictionaries.recipes.require(config.recipe)?,
            required_profession: config
                .profession
                .map(|name| dictionaries.professions.require(name))
                .transpose()?,
            sessions: BTreeMap::new(),
        })
    }

    pub fn infrequent_update(
        &mut self,
        bus: &MessageBus,
        state: &mut SettlementState,
        _room_id: RoomId,
        tiles: &BTreeSet<TileCoord>,
    ) {
        let stations: Vec<EntityId> = state
            .furniture
            .find_by_tag(&state.dictionaries.furniture_types, &self.station_tag, false)
            .into_iter()
            .filter(|id| {
                state
                    .furniture
                    .get(*id)
                    .map_or(false, |f| tiles.contains(&f.location) && !f.deconstructing)
            })
            .collect();
        self.sessions.retain(|station, _| stations.contains(station));

        for station in stations {
            self.update_station(bus, state, station);
        }
    }

    /// At most one action per station per pass
    fn update_station(&mut self, bus: &MessageBus, state: &mut SettlementState, station: EntityId) {
        let recipe = state.dictionaries.recipes.get(self.recipe).clone();
        let Some((position, workspace)) = state
            .furniture
            .get(station)
            .map(|f| (f.location, f.workspace))
        else {
            return;
        };

        {
            let session = self.sessions.entry(station).or_default();
            session.item_jobs.retain(|id| state.jobs.contains(*id));
            session.liquid_jobs.retain(|id| state.jobs.contains(*id));
            if let Some(id) = session.cooking_job {
                if !state.jobs.contains(id) && !session.complete {
                    session.cooking_job = None;
                }
            }
            if session.complete {
                // Batch finished; a fresh session starts next pass.
                log::debug!("cooking session at {} complete, resetting", station);
                *session = CookingSession::default();
                return;
            }
        }
        let (item_jobs, liquid_jobs, cooking_job) = {
            let session = &self.sessions[&station];
            (
                session.item_jobs.clone(),
                session.liquid_jobs.clone(),
                session.cooking_job,
            )
        };

        for input in &recipe.item_inputs {
            let staged = state
                .items
                .quantity_in_container(station, input.item_type, input.material);
            let en_route: u32 = item_jobs
                .iter()
                .filter_map(|id| state.jobs.get(*id))
                .filter_map(|job| job.hauling_allocation.as_ref())
                .filter(|hauling| hauling.hauled_item_type == Some(input.item_type))
                .filter_map(|hauling| hauling.item_allocation.as_ref())
                .map(|allocation| allocation.quantity)
                .sum();
            if staged + en_route < input.quantity {
                let shortfall = input.quantity - staged - en_route;
                self.request_ingredient_haul(
                    bus, state, station, position, workspace, input.item_type, input.material,
                    shortfall,
                );
                return;
            }
        }

        if let Some(liquid) = &recipe.liquid_input {
            let staged = state.liquids.volume_of(station, liquid.material);
            let en_route: f32 = liquid_jobs
                .iter()
                .filter_map(|id| state.jobs.get(*id))
                .filter_map(|job| job.liquid_allocation.as_ref())
                .filter(|allocation| allocation.material == liquid.material)
                .map(|allocation| allocation.volume)
                .sum();
            if staged + en_route + VOLUME_EPSILON < liquid.volume {
                let shortfall = liquid.volume - staged - en_route;
                self.request_liquid_transfer(
                    bus,
                    state,
                    station,
                    position,
                    liquid.material,
                    shortfall,
                );
                return;
            }
        }

        if cooking_job.is_none() {
            let items_ready = recipe.item_inputs.iter().all(|input| {
                state
                    .items
                    .quantity_in_container(station, input.item_type, input.material)
                    >= input.quantity
            });
            let liquid_ready = recipe.liquid_input.as_ref().map_or(true, |liquid| {
                state.liquids.volume_of(station, liquid.material) + VOLUME_EPSILON >= liquid.volume
            });
            if items_ready && liquid_ready {
                let job_id = {
                    let job = state.jobs.create(self.cooking_job_type, position);
                    job.secondary_location = Some(workspace);
                    job.target_id = Some(station);
                    job.required_profession = self.required_profession;
                    job.payload = JobPayload::Cooking {
                        recipe: self.recipe,
                    };
                    job.id
                };
                bus.publish(state, Message::JobCreated { job_id });
                if let Some(session) = self.sessions.get_mut(&station) {
                    session.cooking_job = Some(job_id);
                }
            }
        }
    }

    fn request_ingredient_haul(
        &mut self,
        bus: &MessageBus,
        state: &mut SettlementState,
        station: EntityId,
        position: TileCoord,
        workspace: TileCoord,
        item_type: ItemTypeId,
        material: Option<MaterialId>,
        quantity: u32,
    ) {
        let slot: Rc<RefCell<Option<JobId>>> = Rc::new(RefCell::new(None));
        let callback_slot = Rc::clone(&slot);
        let job_type = self.hauling_job_type;
        bus.publish(
            state,
            Message::RequestHaulingAllocation(HaulingAllocationRequest {
                requester: station,
                specific_item: None,
                required_item_type: Some(item_type),
                required_material: material,
                quantity,
                target_position: position,
                target_kind: PositionKind::FurnitureSlot,
                target_id: Some(station),
                callback: SingleShot::new(move |bus, state, result: Option<HaulingAllocation>| {
                    let Some(hauling) = result else { return };
                    let job_id = {
                        let job = state.jobs.create(job_type, hauling.source_position);
                        job.secondary_location = Some(workspace);
                        job.target_id = Some(station);
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
            if let Some(session) = self.sessions.get_mut(&station) {
                session.item_jobs.push(job_id);
            }
        }
    }

    fn request_liquid_transfer(
        &mut self,
        bus: &MessageBus,
        state: &mut SettlementState,
        station: EntityId,
        position: TileCoord,
        material: MaterialId,
        volume: f32,
    ) {
        let slot: Rc<RefCell<Option<JobId>>> = Rc::new(RefCell::new(None));
        let callback_slot = Rc::clone(&slot);
        let job_type = self.transfer_job_type;
        bus.publish(
            state,
            Message::RequestLiquidTransfer(LiquidTransferRequest {
                requester: station,
                material,
                volume,
                target_container: station,
                target_position: position,
                callback: SingleShot::new(move |bus, state, result: Option<LiquidTransfer>| {
                    let Some(transfer) = result else { return };
                    let job_id = {
                        let job = state.jobs.create(job_type, transfer.source_position);
                        job.secondary_location = Some(position);
                        job.target_id = Some(station);
                        job.liquid_allocation = Some(transfer.allocation);
                        job.id
                    };
                    bus.publish(state, Message::JobCreated { job_id });
                    *callback_slot.borrow_mut() = Some(job_id);
                }),
            }),
        );
        let resolved = *slot.borrow();
        if let Some(job_id) = resolved {
            if let Some(session) = self.sessions.get_mut(&station) {
                session.liquid_jobs.push(job_id);
            }
        }
    }

    pub fn notify_job_state(
        &mut self,
        _bus: &MessageBus,
        _state: &mut SettlementState,
        job_id: JobId,
        terminal: JobState,
    ) {
        for session in self.sessions.values_mut() {
            session.item_jobs.retain(|id| *id != job_id);
            session.liquid_jobs.retain(|id| *id != job_id);
            if session.cooking_job == Some(job_id) {
                if terminal == JobState::Completed {
                    session.complete = true;
                } else {
                    session.cooking_job = None;
                }
            }
        }
    }

    pub fn merge_from(&mut self, other: KitchenBehaviour) {
        self.sessions.extend(other.sessions);
    }

    pub fn retain_units(&mut self, tiles: &BTreeSet<TileCoord>, state: &SettlementState) {
        self.sessions.retain(|station, _| {
            state
                .furniture
                .get(*station)
                .map_or(false, |f| tiles.contains(&f.location))
        });
    }

    pub fn tracked_job_ids(&self) -> Vec<JobId> {
        let mut ids = Vec::new();
        for session in self.sessions.values() {
            ids.extend(&session.item_jobs);
            ids.extend(&session.liquid_jobs);
            ids.extend(session.cooking_job);
        }
        ids
    }
}
