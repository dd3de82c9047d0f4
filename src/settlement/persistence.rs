//! Save and load of the orchestration core's own state
//!
//! Persisted form follows the export-DTO idiom: jobs store dictionary
//! *names*, re-resolved on load, and rooms store the names they were
//! configured with plus the ids of their outstanding jobs, re-linked on
//! load. The world's entities (items, creatures, furniture, liquids)
//! belong to the outer simulation; a save is applied onto a session whose
//! trackers were already repopulated. Any unresolvable reference fails the
//! whole load; nothing is partially applied.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settlement::allocation::{
    AllocationPurpose, HauledEntityKind, HaulingAllocation, ItemAllocation, LiquidAllocation,
    PositionKind,
};
use crate::settlement::dictionaries::{ConfigError, Dictionaries};
use crate::settlement::jobs::{Job, JobPayload, JobState};
use crate::settlement::rooms::{
    CookingSession, FarmBehaviour, FarmConfig, GraveyardBehaviour, GraveyardConfig,
    KitchenBehaviour, KitchenConfig, MushroomBehaviour, MushroomConfig, Room, RoomBehaviour,
};
use crate::settlement::rooms::graveyard::BurialJob;
use crate::settlement::rooms::mushroom::ShockHauling;
use crate::settlement::session::{Session, SettlementState};
use crate::settlement::types::{AllocationId, EntityId, JobId, JobPriority, RoomId, TileCoord};

/// Fatal load failure; the save is reported as unloadable
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("could not load save: {0}")]
    Config(#[from] ConfigError),
    #[error("could not load save: room references missing job {0}")]
    MissingJob(u64),
    #[error("could not load save: allocation references missing entity {0}")]
    MissingEntity(u64),
    #[error("could not load save: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not load save: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything this core persists
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SettlementSave {
    pub sim_time: f64,
    pub jobs: Vec<JobSave>,
    pub rooms: Vec<RoomSave>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobSave {
    pub id: u64,
    pub job_type: String,
    pub priority: JobPriority,
    pub state: JobState,
    pub location: TileCoord,
    pub secondary_location: Option<TileCoord>,
    pub target_id: Option<u64>,
    pub required_profession: Option<String>,
    pub required_item_type: Option<String>,
    pub required_item_material: Option<String>,
    pub hauling_allocation: Option<HaulingAllocationSave>,
    pub liquid_allocation: Option<LiquidAllocationSave>,
    pub payload: JobPayloadSave,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum JobPayloadSave {
    None,
    Cooking { recipe: String },
    FloorReplacement { floor_type: String, material: String },
    Planting { species: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemAllocationSave {
    pub id: u64,
    pub item: u64,
    pub quantity: u32,
    pub purpose: AllocationPurpose,
    pub owner: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HaulingAllocationSave {
    pub source_position: TileCoord,
    pub source_kind: PositionKind,
    pub source_container: Option<u64>,
    pub target_position: TileCoord,
    pub target_kind: PositionKind,
    pub target_id: Option<u64>,
    pub hauled_entity: u64,
    pub hauled_entity_kind: HauledEntityKind,
    pub hauled_item_type: Option<String>,
    pub item_allocation: Option<ItemAllocationSave>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LiquidAllocationSave {
    pub id: u64,
    pub container: u64,
    pub material: String,
    pub volume: f32,
    pub owner: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomSave {
    pub id: u64,
    pub tiles: Vec<TileCoord>,
    pub update_interval: f64,
    pub behaviour: RoomBehaviourSave,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CookingSessionSave {
    pub station: u64,
    pub item_jobs: Vec<u64>,
    pub liquid_jobs: Vec<u64>,
    pub cooking_job: Option<u64>,
    pub complete: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BurialSave {
    pub corpse: u64,
    pub job_id: u64,
    pub container: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShockHaulingSave {
    pub tank: u64,
    pub job_id: u64,
    pub log: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum RoomBehaviourSave {
    Farm {
        tilling_job_type: String,
        planting_job_type: String,
        harvesting_job_type: String,
        removal_job_type: String,
        profession: Option<String>,
        desired_floor_type: String,
        desired_floor_material: String,
        selected_crop: Option<String>,
        jobs_by_tile: Vec<(TileCoord, u64)>,
    },
    Kitchen {
        cooking_job_type: String,
        hauling_job_type: String,
        transfer_job_type: String,
        station_tag: String,
        recipe: String,
        profession: Option<String>,
        sessions: Vec<CookingSessionSave>,
    },
    Graveyard {
        hauling_job_type: String,
        grave_tag: String,
        profession: Option<String>,
        burials: Vec<BurialSave>,
    },
    MushroomProcessing {
        innoculation_job_type: String,
        hauling_job_type: String,
        raw_log_item_type: String,
        innoculated_log_item_type: String,
        tank_tag: String,
        profession: Option<String>,
        innoculations: Vec<(u64, u64)>,
        shock_haulings: Vec<ShockHaulingSave>,
    },
}

/// Capture the persistable slice of a session
pub fn save_session(session: &Session) -> SettlementSave {
    let state = &session.state;
    let jobs = state
        .jobs
        .job_ids()
        .into_iter()
        .filter_map(|id| state.jobs.get(id))
        .map(|job| save_job(state, job))
        .collect();
    let rooms = state.rooms.values().map(|room| save_room(state, room)).collect();
    SettlementSave {
        sim_time: state.clock.current_sim_time(),
        jobs,
        rooms,
    }
}

fn save_job(state: &SettlementState, job: &Job) -> JobSave {
    let dictionaries = &state.dictionaries;
    JobSave {
        id: job.id.0,
        job_type: dictionaries.job_types.name_of(job.job_type).to_string(),
        priority: job.priority,
        state: job.state(),
        location: job.location,
        secondary_location: job.secondary_location,
        target_id: job.target_id.map(|id| id.0),
        required_profession: job
            .required_profession
            .map(|id| dictionaries.professions.name_of(id).to_string()),
        required_item_type: job
            .required_item_type
            .map(|id| dictionaries.item_types.name_of(id).to_string()),
        required_item_material: job
            .required_item_material
            .map(|id| dictionaries.materials.name_of(id).to_string()),
        hauling_allocation: job
            .hauling_allocation
            .as_ref()
            .map(|hauling| save_hauling(state, hauling)),
        liquid_allocation: job
            .liquid_allocation
            .as_ref()
            .map(|allocation| LiquidAllocationSave {
                id: allocation.id.0,
                container: allocation.container.0,
                material: dictionaries.materials.name_of(allocation.material).to_string(),
                volume: allocation.volume,
                owner: allocation.owner.0,
            }),
        payload: match &job.payload {
            JobPayload::None => JobPayloadSave::None,
            JobPayload::Cooking { recipe } => JobPayloadSave::Cooking {
                recipe: dictionaries.recipes.name_of(*recipe).to_string(),
            },
            JobPayload::FloorReplacement { floor_type, material } => {
                JobPayloadSave::FloorReplacement {
                    floor_type: dictionaries.floor_types.name_of(*floor_type).to_string(),
                    material: dictionaries.materials.name_of(*material).to_string(),
                }
            }
            JobPayload::Planting { species } => JobPayloadSave::Planting {
                species: dictionaries.plant_species.name_of(*species).to_string(),
            },
        },
    }
}

fn save_hauling(state: &SettlementState, hauling: &HaulingAllocation) -> HaulingAllocationSave {
    HaulingAllocationSave {
        source_position: hauling.source_position,
        source_kind: hauling.source_kind,
        source_container: hauling.source_container.map(|id| id.0),
        target_position: hauling.target_position,
        target_kind: hauling.target_kind,
        target_id: hauling.target_id.map(|id| id.0),
        hauled_entity: hauling.hauled_entity.0,
        hauled_entity_kind: hauling.hauled_entity_kind,
        hauled_item_type: hauling
            .hauled_item_type
            .map(|id| state.dictionaries.item_types.name_of(id).to_string()),
        item_allocation: hauling.item_allocation.as_ref().map(|a| ItemAllocationSave {
            id: a.id.0,
            item: a.item.0,
            quantity: a.quantity,
            purpose: a.purpose,
            owner: a.owner.0,
        }),
    }
}

fn save_room(state: &SettlementState, room: &Room) -> RoomSave {
    let dictionaries = &state.dictionaries;
    let behaviour = match &room.behaviour {
        RoomBehaviour::Farm(farm) => RoomBehaviourSave::Farm {
            tilling_job_type: dictionaries.job_types.name_of(farm.tilling_job_type).to_string(),
            planting_job_type: dictionaries
                .job_types
                .name_of(farm.planting_job_type)
                .to_string(),
            harvesting_job_type: dictionaries
                .job_types
                .name_of(farm.harvesting_job_type)
                .to_string(),
            removal_job_type: dictionaries
                .job_types
                .name_of(farm.removal_job_type)
                .to_string(),
            profession: farm
                .required_profession
                .map(|id| dictionaries.professions.name_of(id).to_string()),
            desired_floor_type: dictionaries
                .floor_types
                .name_of(farm.desired_floor_type)
                .to_string(),
            desired_floor_material: dictionaries
                .materials
                .name_of(farm.desired_floor_material)
                .to_string(),
            selected_crop: farm
                .selected_crop
                .map(|id| dictionaries.plant_species.name_of(id).to_string()),
            jobs_by_tile: farm
                .jobs_by_tile
                .iter()
                .map(|(tile, job)| (*tile, job.0))
                .collect(),
        },
        RoomBehaviour::Kitchen(kitchen) => RoomBehaviourSave::Kitchen {
            cooking_job_type: dictionaries
                .job_types
                .name_of(kitchen.cooking_job_type)
                .to_string(),
            hauling_job_type: dictionaries
                .job_types
                .name_of(kitchen.hauling_job_type)
                .to_string(),
            transfer_job_type: dictionaries
                .job_types
                .name_of(kitchen.transfer_job_type)
                .to_string(),
            station_tag: kitchen.station_tag.clone(),
            recipe: dictionaries.recipes.name_of(kitchen.recipe).to_string(),
            profession: kitchen
                .required_profession
                .map(|id| dictionaries.professions.name_of(id).to_string()),
            sessions: kitchen
                .sessions
                .iter()
                .map(|(station, session)| CookingSessionSave {
                    station: station.0,
                    item_jobs: session.item_jobs.iter().map(|id| id.0).collect(),
                    liquid_jobs: session.liquid_jobs.iter().map(|id| id.0).collect(),
                    cooking_job: session.cooking_job.map(|id| id.0),
                    complete: session.complete,
                })
                .collect(),
        },
        RoomBehaviour::Graveyard(graveyard) => RoomBehaviourSave::Graveyard {
            hauling_job_type: dictionaries
                .job_types
                .name_of(graveyard.hauling_job_type)
                .to_string(),
            grave_tag: graveyard.grave_tag.clone(),
            profession: graveyard
                .required_profession
                .map(|id| dictionaries.professions.name_of(id).to_string()),
            burials: graveyard
                .burials
                .iter()
                .map(|(corpse, burial)| BurialSave {
                    corpse: corpse.0,
                    job_id: burial.job_id.0,
                    container: burial.container.0,
                })
                .collect(),
        },
        RoomBehaviour::MushroomProcessing(mushroom) => RoomBehaviourSave::MushroomProcessing {
            innoculation_job_type: dictionaries
                .job_types
                .name_of(mushroom.innoculation_job_type)
                .to_string(),
            hauling_job_type: dictionaries
                .job_types
                .name_of(mushroom.hauling_job_type)
                .to_string(),
            raw_log_item_type: dictionaries
                .item_types
                .name_of(mushroom.raw_log_item_type)
                .to_string(),
            innoculated_log_item_type: dictionaries
                .item_types
                .name_of(mushroom.innoculated_log_item_type)
                .to_string(),
            tank_tag: mushroom.tank_tag.clone(),
            profession: mushroom
                .required_profession
                .map(|id| dictionaries.professions.name_of(id).to_string()),
            innoculations: mushroom
                .innoculations
                .iter()
                .map(|(log, job)| (log.0, job.0))
                .collect(),
            shock_haulings: mushroom
                .shock_haulings
                .iter()
                .map(|(tank, hauling)| ShockHaulingSave {
                    tank: tank.0,
                    job_id: hauling.job_id.0,
                    log: hauling.log.0,
                })
                .collect(),
        },
    };
    RoomSave {
        id: room.id.0,
        tiles: room.tiles.iter().copied().collect(),
        update_interval: room.update_interval,
        behaviour,
    }
}

/// Apply a save onto a session whose trackers the outer simulation has
/// already repopulated. Validates every reference before touching the
/// session, so a corrupt save leaves it untouched.
pub fn apply_save(session: &mut Session, save: &SettlementSave) -> Result<(), SaveError> {
    let state = &mut session.state;

    // Validate and rebuild everything off to the side first.
    let mut jobs = Vec::with_capacity(save.jobs.len());
    for job_save in &save.jobs {
        jobs.push(restore_job(state, job_save)?);
    }
    let loaded_ids: BTreeSet<JobId> = jobs.iter().map(|job| job.id).collect();
    let mut rooms = Vec::with_capacity(save.rooms.len());
    for room_save in &save.rooms {
        rooms.push(restore_room(&state.dictionaries, room_save, &loaded_ids)?);
    }

    // Commit.
    state.clock.advance(save.sim_time - state.clock.current_sim_time());
    for job in jobs {
        if let Some(hauling) = &job.hauling_allocation {
            if let Some(allocation) = &hauling.item_allocation {
                match hauling.hauled_entity_kind {
                    HauledEntityKind::ItemStack => {
                        state.items.restore_allocation(allocation.clone())
                    }
                    HauledEntityKind::Creature => {
                        state.creatures.restore_allocation(allocation.clone())
                    }
                }
            }
        }
        if let Some(allocation) = &job.liquid_allocation {
            state.liquids.restore_allocation(allocation.clone());
        }
        state.jobs.insert_loaded(job);
    }
    let now = state.clock.current_sim_time();
    for mut room in rooms {
        room.next_update_at = now;
        state.bump_room_id(room.id);
        state.rooms.insert(room.id, room);
    }
    Ok(())
}

fn restore_job(state: &SettlementState, save: &JobSave) -> Result<Job, SaveError> {
    let dictionaries = &state.dictionaries;
    let mut job = Job::new(
        JobId(save.id),
        dictionaries.job_types.require(&save.job_type)?,
        save.location,
    );
    job.restore_state(save.state);
    job.priority = save.priority;
    job.secondary_location = save.secondary_location;
    job.target_id = save.target_id.map(EntityId);
    job.required_profession = save
        .required_profession
        .as_deref()
        .map(|name| dictionaries.professions.require(name))
        .transpose()?;
    job.required_item_type = save
        .required_item_type
        .as_deref()
        .map(|name| dictionaries.item_types.require(name))
        .transpose()?;
    job.required_item_material = save
        .required_item_material
        .as_deref()
        .map(|name| dictionaries.materials.require(name))
        .transpose()?;
    job.payload = match &save.payload {
        JobPayloadSave::None => JobPayload::None,
        JobPayloadSave::Cooking { recipe } => JobPayload::Cooking {
            recipe: dictionaries.recipes.require(recipe)?,
        },
        JobPayloadSave::FloorReplacement { floor_type, material } => {
            JobPayload::FloorReplacement {
                floor_type: dictionaries.floor_types.require(floor_type)?,
                material: dictionaries.materials.require(material)?,
            }
        }
        JobPayloadSave::Planting { species } => JobPayload::Planting {
            species: dictionaries.plant_species.require(species)?,
        },
    };
    job.hauling_allocation = save
        .hauling_allocation
        .as_ref()
        .map(|hauling| restore_hauling(state, hauling))
        .transpose()?;
    job.liquid_allocation = save
        .liquid_allocation
        .as_ref()
        .map(|allocation| -> Result<LiquidAllocation, SaveError> {
            let container = EntityId(allocation.container);
            if state.liquids.get(container).is_none() {
                return Err(SaveError::MissingEntity(allocation.container));
            }
            Ok(LiquidAllocation {
                id: AllocationId(allocation.id),
                container,
                material: dictionaries.materials.require(&allocation.material)?,
                volume: allocation.volume,
                owner: EntityId(allocation.owner),
            })
        })
        .transpose()?;
    Ok(job)
}

fn restore_hauling(
    state: &SettlementState,
    save: &HaulingAllocationSave,
) -> Result<HaulingAllocation, SaveError> {
    let hauled_entity = EntityId(save.hauled_entity);
    let tracked = match save.hauled_entity_kind {
        HauledEntityKind::ItemStack => state.items.get(hauled_entity).is_some(),
        HauledEntityKind::Creature => state.creatures.get(hauled_entity).is_some(),
    };
    if !tracked {
        return Err(SaveError::MissingEntity(save.hauled_entity));
    }
    Ok(HaulingAllocation {
        source_position: save.source_position,
        source_kind: save.source_kind,
        source_container: save.source_container.map(EntityId),
        target_position: save.target_position,
        target_kind: save.target_kind,
        target_id: save.target_id.map(EntityId),
        hauled_entity,
        hauled_entity_kind: save.hauled_entity_kind,
        hauled_item_type: save
            .hauled_item_type
            .as_deref()
            .map(|name| state.dictionaries.item_types.require(name))
            .transpose()?,
        item_allocation: save.item_allocation.as_ref().map(|a| ItemAllocation {
            id: AllocationId(a.id),
            item: EntityId(a.item),
            quantity: a.quantity,
            purpose: a.purpose,
            owner: EntityId(a.owner),
        }),
    })
}

fn restore_room(
    dictionaries: &Dictionaries,
    save: &RoomSave,
    loaded_jobs: &BTreeSet<JobId>,
) -> Result<Room, SaveError> {
    let require_job = |id: u64| -> Result<JobId, SaveError> {
        let job_id = JobId(id);
        if loaded_jobs.contains(&job_id) {
            Ok(job_id)
        } else {
            Err(SaveError::MissingJob(id))
        }
    };

    let behaviour = match &save.behaviour {
        RoomBehaviourSave::Farm {
            tilling_job_type,
            planting_job_type,
            harvesting_job_type,
            removal_job_type,
            profession,
            desired_floor_type,
            desired_floor_material,
            selected_crop,
            jobs_by_tile,
        } => {
            let mut farm = FarmBehaviour::configure(
                dictionaries,
                FarmConfig {
                    tilling_job_type,
                    planting_job_type,
                    harvesting_job_type,
                    removal_job_type,
                    profession: profession.as_deref(),
                    desired_floor_type,
                    desired_floor_material,
                },
            )?;
            farm.selected_crop = selected_crop
                .as_deref()
                .map(|name| dictionaries.plant_species.require(name))
                .transpose()?;
            for (tile, job_id) in jobs_by_tile {
                farm.jobs_by_tile.insert(*tile, require_job(*job_id)?);
            }
            RoomBehaviour::Farm(farm)
        }
        RoomBehaviourSave::Kitchen {
            cooking_job_type,
            hauling_job_type,
            transfer_job_type,
            station_tag,
            recipe,
            profession,
            sessions,
        } => {
            let mut kitchen = KitchenBehaviour::configure(
                dictionaries,
                KitchenConfig {
                    cooking_job_type,
                    hauling_job_type,
                    transfer_job_type,
                    station_tag,
                    recipe,
                    profession: profession.as_deref(),
                },
            )?;
            for session in sessions {
                let mut restored = CookingSession {
                    item_jobs: Vec::new(),
                    liquid_jobs: Vec::new(),
                    cooking_job: session.cooking_job.map(require_job).transpose()?,
                    complete: session.complete,
                };
                for id in &session.item_jobs {
                    restored.item_jobs.push(require_job(*id)?);
                }
                for id in &session.liquid_jobs {
                    restored.liquid_jobs.push(require_job(*id)?);
                }
                kitchen.sessions.insert(EntityId(session.station), restored);
            }
            RoomBehaviour::Kitchen(kitchen)
        }
        RoomBehaviourSave::Graveyard {
            hauling_job_type,
            grave_tag,
            profession,
            burials,
        } => {
            let mut graveyard = GraveyardBehaviour::configure(
                dictionaries,
                GraveyardConfig {
                    hauling_job_type,
                    grave_tag,
                    profession: profession.as_deref(),
                },
            )?;
            for burial in burials {
                graveyard.burials.insert(
                    EntityId(burial.corpse),
                    BurialJob {
                        job_id: require_job(burial.job_id)?,
                        container: EntityId(burial.container),
                    },
                );
            }
            RoomBehaviour::Graveyard(graveyard)
        }
        RoomBehaviourSave::MushroomProcessing {
            innoculation_job_type,
            hauling_job_type,
            raw_log_item_type,
            innoculated_log_item_type,
            tank_tag,
            profession,
            innoculations,
            shock_haulings,
        } => {
            let mut mushroom = MushroomBehaviour::configure(
                dictionaries,
                MushroomConfig {
                    innoculation_job_type,
                    hauling_job_type,
                    raw_log_item_type,
                    innoculated_log_item_type,
                    tank_tag,
                    profession: profession.as_deref(),
                },
            )?;
            for (log, job_id) in innoculations {
                mushroom
                    .innoculations
                    .insert(EntityId(*log), require_job(*job_id)?);
            }
            for hauling in shock_haulings {
                mushroom.shock_haulings.insert(
                    EntityId(hauling.tank),
                    ShockHauling {
                        job_id: require_job(hauling.job_id)?,
                        log: EntityId(hauling.log),
                    },
                );
            }
            RoomBehaviour::MushroomProcessing(mushroom)
        }
    };

    Ok(Room {
        id: RoomId(save.id),
        tiles: save.tiles.iter().copied().collect(),
        behaviour,
        next_update_at: 0.0,
        update_interval: save.update_interval,
    })
}

/// Write a save as JSON
pub fn write_save(save: &SettlementSave, path: &Path) -> Result<(), SaveError> {
    let json = serde_json::to_string_pretty(save)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

/// Read a save back from JSON
pub fn read_save(path: &Path) -> Result<SettlementSave, SaveError> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
