//! Graveyard reconciliation behaviour
//!
//! Finds unclaimed corpses anywhere on the map and routes each into an
//! assignable container on the footprint. The container reservation is
//! committed by the resolver before the callback runs, so two corpses can
//! never race for one grave inside a single pass.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::settlement::allocation::{
    AllocationPurpose, HauledEntityKind, HaulingAllocation, PositionKind,
};
use crate::settlement::dictionaries::{ConfigError, Dictionaries, JobTypeId, ProfessionId};
use crate::settlement::jobs::JobState;
use crate::settlement::messages::{
    FurnitureAssignment, FurnitureAssignmentRequest, Message, MessageBus, SingleShot,
};
use crate::settlement::session::SettlementState;
use crate::settlement::types::{EntityId, JobId, RoomId, TileCoord};

/// Names a graveyard behaviour is configured with
#[derive(Clone, Copy, Debug)]
pub struct GraveyardConfig<'a> {
    pub hauling_job_type: &'a str,
    pub grave_tag: &'a str,
    pub profession: Option<&'a str>,
}

/// An outstanding burial: the hauling job and the reserved container
#[derive(Clone, Copy, Debug)]
pub(crate) struct BurialJob {
    pub job_id: JobId,
    pub container: EntityId,
}

/// Reconciliation state machine for graveyard rooms
#[derive(Clone, Debug)]
pub struct GraveyardBehaviour {
    pub(crate) hauling_job_type: JobTypeId,
    pub(crate) grave_tag: String,
    pub(crate) required_profession: Option<ProfessionId>,
    /// One outstanding burial per corpse
    pub(crate) burials: BTreeMap<EntityId, BurialJob>,
}

impl GraveyardBehaviour {
    /// Resolve the configured names. A missing name is fatal.
    pub fn configure(
        dictionaries: &Dictionaries,
        config: GraveyardConfig<'_>,
    ) -> Result<Self, ConfigError> {
        Ok(GraveyardBehaviour {
            hauling_job_type: dictionaries.job_types.require(config.hauling_job_type)?,
            grave_tag: config.grave_tag.to_string(),
            required_profession: config
                .profession
                .map(|name| dictionaries.professions.require(name))
                .transpose()?,
            burials: BTreeMap::new(),
        })
    }

    pub fn infrequent_update(
        &mut self,
        bus: &MessageBus,
        state: &mut SettlementState,
        _room_id: RoomId,
        tiles: &BTreeSet<TileCoord>,
    ) {
        self.burials
            .retain(|_, burial| state.jobs.contains(burial.job_id));

        for corpse in state.creatures.unclaimed_corpses() {
            if self.burials.contains_key(&corpse) {
                continue;
            }
            if self.corpse_already_targeted(state, corpse) {
                continue;
            }
            let Some(corpse_location) = state.creatures.get(corpse).map(|c| c.location) else {
                continue;
            };
            self.request_burial(bus, state, corpse, corpse_location, tiles);
        }
    }

    /// A corpse already the target of a hauling job anywhere on the map is
    /// not eligible
    fn corpse_already_targeted(&self, state: &SettlementState, corpse: EntityId) -> bool {
        state
            .jobs
            .by_type(self.hauling_job_type)
            .iter()
            .filter_map(|id| state.jobs.get(*id))
            .filter_map(|job| job.hauling_allocation.as_ref())
            .any(|hauling| hauling.hauled_entity == corpse)
    }

    fn request_burial(
        &mut self,
        bus: &MessageBus,
        state: &mut SettlementState,
        corpse: EntityId,
        corpse_location: TileCoord,
        tiles: &BTreeSet<TileCoord>,
    ) {
        let slot: Rc<RefCell<Option<BurialJob>>> = Rc::new(RefCell::new(None));
        let callback_slot = Rc::clone(&slot);
        let job_type = self.hauling_job_type;
        let profession = self.required_profession;
        bus.publish(
            state,
            Message::RequestFurnitureAssignment(FurnitureAssignmentRequest {
                required_tag: self.grave_tag.clone(),
                assign_to: corpse,
                near: corpse_location,
                within: Some(tiles.iter().copied().collect()),
                callback: SingleShot::new(move |bus, state, result: Option<FurnitureAssignment>| {
                    let Some(assignment) = result else { return };
                    let claim =
                        state
                            .creatures
                            .allocate(corpse, AllocationPurpose::Burial, assignment.furniture);
                    let hauling = HaulingAllocation {
                        source_position: corpse_location,
                        source_kind: PositionKind::Floor,
                        source_container: None,
                        target_position: assignment.position,
                        target_kind: PositionKind::FurnitureSlot,
                        target_id: Some(assignment.furniture),
                        hauled_entity: corpse,
                        hauled_entity_kind: HauledEntityKind::Creature,
                        hauled_item_type: None,
                        item_allocation: Some(claim),
                    };
                    let job_id = {
                        let job = state.jobs.create(job_type, corpse_location);
                        job.secondary_location = Some(assignment.workspace);
                        job.target_id = Some(assignment.furniture);
                        job.required_profession = profession;
                        job.hauling_allocation = Some(hauling);
                        job.id
                    };
                    bus.publish(state, Message::JobCreated { job_id });
                    *callback_slot.borrow_mut() = Some(BurialJob {
                        job_id,
                        container: assignment.furniture,
                    });
                }),
            }),
        );
        let resolved = *slot.borrow();
        if let Some(burial) = resolved {
            self.burials.insert(corpse, burial);
        }
    }

    pub fn notify_job_state(
        &mut self,
        _bus: &MessageBus,
        state: &mut SettlementState,
        job_id: JobId,
        terminal: JobState,
    ) {
        let Some((corpse, burial)) = self
            .burials
            .iter()
            .find(|(_, b)| b.job_id == job_id)
            .map(|(c, b)| (*c, *b))
        else {
            return;
        };
        if terminal != JobState::Completed {
            // The corpse never arrived; the grave is assignable again.
            let still_ours = state
                .furniture
                .get(burial.container)
                .map_or(false, |f| f.assigned_to == Some(corpse));
            if still_ours {
                state.furniture.clear_assignment(burial.container);
            }
        }
        self.burials.remove(&corpse);
    }

    pub fn merge_from(&mut self, other: GraveyardBehaviour) {
        self.burials.extend(other.burials);
    }

    pub fn retain_units(&mut self, tiles: &BTreeSet<TileCoord>, state: &SettlementState) {
        self.burials.retain(|_, burial| {
            state
                .furniture
                .get(burial.container)
                .map_or(false, |f| tiles.contains(&f.location))
        });
    }

    pub fn tracked_job_ids(&self) -> Vec<JobId> {
        self.burials.values().map(|b| b.job_id).collect()
    }
}
