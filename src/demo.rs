//! Demo settlement and worker shim
//!
//! Worker goal-planning lives outside the orchestration core; this module
//! stands in for it so the loop can be driven end to end. Each work round
//! claims every open job, applies its world effect, and publishes the
//! terminal notification the rooms react to. Also provides the standard
//! vocabulary and the scripted settlement the binary runs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::settlement::allocation::{HauledEntityKind, PositionKind};
use crate::settlement::dictionaries::{
    Dictionaries, FloorTypeDef, FurnitureTypeDef, ItemTypeDef, JobTypeDef, MaterialDef,
    PlantSpeciesDef, ProfessionDef, RecipeDef, RecipeId, RecipeItemInput, RecipeLiquidInput,
};
use crate::settlement::jobs::{JobPayload, JobState};
use crate::settlement::map::AreaMap;
use crate::settlement::messages::{Message, MessageBus};
use crate::settlement::rooms::{
    FarmBehaviour, FarmConfig, GraveyardBehaviour, GraveyardConfig, KitchenBehaviour,
    KitchenConfig, MushroomBehaviour, MushroomConfig, RoomBehaviour,
};
use crate::settlement::session::{Session, SettlementState};
use crate::settlement::types::{EntityId, JobId, RoomId, Season, TileCoord};

/// The vocabulary the demo settlement is configured with
pub fn standard_dictionaries() -> Dictionaries {
    let mut dictionaries = Dictionaries::new();
    for name in [
        "hauling",
        "tilling",
        "planting",
        "harvesting",
        "plant_removal",
        "cooking",
        "liquid_transfer",
        "innoculation",
    ] {
        dictionaries.job_types.add(JobTypeDef {
            name: name.to_string(),
        });
    }
    for name in ["farmer", "cook", "undertaker", "mushroom_farmer"] {
        dictionaries.professions.add(ProfessionDef {
            name: name.to_string(),
        });
    }
    for name in ["soil", "oak", "water"] {
        dictionaries.materials.add(MaterialDef {
            name: name.to_string(),
        });
    }
    let grain = dictionaries.item_types.add(ItemTypeDef {
        name: "grain".to_string(),
        edible: true,
    });
    dictionaries.item_types.add(ItemTypeDef {
        name: "raw_log".to_string(),
        edible: false,
    });
    dictionaries.item_types.add(ItemTypeDef {
        name: "innoculated_log".to_string(),
        edible: false,
    });
    let stew_portion = dictionaries.item_types.add(ItemTypeDef {
        name: "stew_portion".to_string(),
        edible: true,
    });
    dictionaries.furniture_types.add(FurnitureTypeDef {
        name: "cauldron".to_string(),
        tags: vec!["cooking_station".to_string(), "liquid_container".to_string()],
    });
    dictionaries.furniture_types.add(FurnitureTypeDef {
        name: "barrel".to_string(),
        tags: vec!["liquid_container".to_string()],
    });
    dictionaries.furniture_types.add(FurnitureTypeDef {
        name: "sarcophagus".to_string(),
        tags: vec!["grave".to_string()],
    });
    dictionaries.furniture_types.add(FurnitureTypeDef {
        name: "shock_tank".to_string(),
        tags: vec!["shock_tank".to_string()],
    });
    dictionaries.floor_types.add(FloorTypeDef {
        name: "rough_stone".to_string(),
    });
    dictionaries.floor_types.add(FloorTypeDef {
        name: "tilled_soil".to_string(),
    });
    dictionaries.plant_species.add(PlantSpeciesDef {
        name: "barley".to_string(),
        planting_seasons: vec![Season::Spring, Season::Summer],
    });
    dictionaries.plant_species.add(PlantSpeciesDef {
        name: "nettle".to_string(),
        planting_seasons: vec![Season::Spring, Season::Summer, Season::Autumn],
    });
    let water = dictionaries
        .materials
        .id_by_name("water")
        .expect("water material");
    let oak = dictionaries.materials.id_by_name("oak").expect("oak material");
    dictionaries.recipes.add(RecipeDef {
        name: "stew".to_string(),
        item_inputs: vec![RecipeItemInput {
            item_type: grain,
            material: None,
            quantity: 3,
        }],
        liquid_input: Some(RecipeLiquidInput {
            material: water,
            volume: 2.0,
        }),
        output_item_type: stew_portion,
        output_material: oak,
        output_quantity: 4,
    });
    dictionaries
}

/// A session over a blank stone map with the standard vocabulary
pub fn standard_session(width: usize, height: usize, seed: u64) -> Session {
    let dictionaries = standard_dictionaries();
    let floor = dictionaries
        .floor_types
        .id_by_name("rough_stone")
        .expect("rough_stone floor");
    let soil = dictionaries.materials.id_by_name("soil").expect("soil material");
    Session::new(AreaMap::new(width, height, floor, soil), dictionaries, seed)
}

/// Rooms and notable entities of the scripted settlement
#[derive(Clone, Debug)]
pub struct DemoLayout {
    pub farm: RoomId,
    pub kitchen: RoomId,
    pub graveyard: RoomId,
    pub mushroom_farm: RoomId,
    pub cooking_station: EntityId,
    pub grave: EntityId,
    pub corpse: EntityId,
    pub shock_tank: EntityId,
}

fn square(x0: usize, y0: usize, w: usize, h: usize) -> BTreeSet<TileCoord> {
    let mut tiles = BTreeSet::new();
    for x in x0..x0 + w {
        for y in y0..y0 + h {
            tiles.insert(TileCoord::new(x, y));
        }
    }
    tiles
}

/// Declare the four demo rooms and spawn their starting entities.
/// Expects a map of at least 16x12.
pub fn build_demo_settlement(session: &mut Session) -> DemoLayout {
    let dictionaries = &session.state.dictionaries;
    let mut farm = FarmBehaviour::configure(
        dictionaries,
        FarmConfig {
            tilling_job_type: "tilling",
            planting_job_type: "planting",
            harvesting_job_type: "harvesting",
            removal_job_type: "plant_removal",
            profession: Some("farmer"),
            desired_floor_type: "tilled_soil",
            desired_floor_material: "soil",
        },
    )
    .expect("farm configuration");
    farm.selected_crop = dictionaries.plant_species.id_by_name("barley");
    let kitchen = KitchenBehaviour::configure(
        dictionaries,
        KitchenConfig {
            cooking_job_type: "cooking",
            hauling_job_type: "hauling",
            transfer_job_type: "liquid_transfer",
            station_tag: "cooking_station",
            recipe: "stew",
            profession: Some("cook"),
        },
    )
    .expect("kitchen configuration");
    let graveyard = GraveyardBehaviour::configure(
        dictionaries,
        GraveyardConfig {
            hauling_job_type: "hauling",
            grave_tag: "grave",
            profession: Some("undertaker"),
        },
    )
    .expect("graveyard configuration");
    let mushroom = MushroomBehaviour::configure(
        dictionaries,
        MushroomConfig {
            innoculation_job_type: "innoculation",
            hauling_job_type: "hauling",
            raw_log_item_type: "raw_log",
            innoculated_log_item_type: "innoculated_log",
            tank_tag: "shock_tank",
            profession: Some("mushroom_farmer"),
        },
    )
    .expect("mushroom configuration");

    let state = &mut session.state;
    let cauldron_type = state
        .dictionaries
        .furniture_types
        .id_by_name("cauldron")
        .expect("cauldron type");
    let barrel_type = state
        .dictionaries
        .furniture_types
        .id_by_name("barrel")
        .expect("barrel type");
    let sarcophagus_type = state
        .dictionaries
        .furniture_types
        .id_by_name("sarcophagus")
        .expect("sarcophagus type");
    let tank_type = state
        .dictionaries
        .furniture_types
        .id_by_name("shock_tank")
        .expect("shock tank type");
    let grain = state
        .dictionaries
        .item_types
        .id_by_name("grain")
        .expect("grain type");
    let raw_log = state
        .dictionaries
        .item_types
        .id_by_name("raw_log")
        .expect("raw log type");
    let oak = state.dictionaries.materials.id_by_name("oak").expect("oak");
    let water = state
        .dictionaries
        .materials
        .id_by_name("water")
        .expect("water");

    // Kitchen corner: a cauldron, a water barrel, loose grain.
    let cooking_station = state.spawn_liquid_container(
        cauldron_type,
        TileCoord::new(7, 2),
        TileCoord::new(7, 3),
        10.0,
    );
    let barrel = state.spawn_liquid_container(
        barrel_type,
        TileCoord::new(9, 2),
        TileCoord::new(9, 3),
        20.0,
    );
    state.liquids.add_volume(barrel, water, 12.0);
    state.spawn_item(grain, oak, 8, TileCoord::new(11, 2));

    // Graveyard corner: one grave, one deceased dwarf.
    let grave = state.spawn_furniture(
        sarcophagus_type,
        TileCoord::new(13, 9),
        TileCoord::new(13, 10),
    );
    let corpse = state.spawn_creature("dwarf", TileCoord::new(2, 10));
    state.creatures.mark_dead(corpse);

    // Mushroom corner: a shock tank and a raw log waiting on the floor.
    let shock_tank = state.spawn_furniture(
        tank_type,
        TileCoord::new(9, 9),
        TileCoord::new(9, 10),
    );
    state.spawn_item(raw_log, oak, 1, TileCoord::new(8, 9));

    DemoLayout {
        farm: session.add_room(square(1, 1, 3, 3), RoomBehaviour::Farm(farm)),
        kitchen: session.add_room(square(6, 1, 3, 3), RoomBehaviour::Kitchen(kitchen)),
        graveyard: session.add_room(square(12, 8, 3, 3), RoomBehaviour::Graveyard(graveyard)),
        mushroom_farm: session
            .add_room(square(8, 8, 3, 3), RoomBehaviour::MushroomProcessing(mushroom)),
        cooking_station,
        grave,
        corpse,
        shock_tank,
    }
}

/// Claim and execute every open job once. Returns how many completed.
pub fn work_one_round(session: &mut Session) -> u32 {
    let mut completed = 0;
    let job_ids = session.state.jobs.job_ids();
    for job_id in job_ids {
        let Some(job) = session.state.jobs.get(job_id) else {
            continue;
        };
        if job.state() != JobState::Created {
            continue;
        }
        session.state.jobs.mark_assigned(job_id);
        session.state.jobs.mark_in_progress(job_id);
        execute_job(&session.bus, &mut session.state, job_id);
        completed += 1;
    }
    completed
}

fn execute_job(bus: &MessageBus, state: &mut SettlementState, job_id: JobId) {
    let Some(job) = state.jobs.get(job_id) else {
        return;
    };
    let location = job.location;
    let target = job.target_id;
    let payload = job.payload;
    let has_hauling = job.hauling_allocation.is_some();
    let has_liquid = job.liquid_allocation.is_some();

    match payload {
        JobPayload::FloorReplacement { floor_type, material } => {
            state.map.set_floor(location, floor_type, material);
            bus.publish(state, Message::JobCompleted { job_id });
        }
        JobPayload::Planting { species } => {
            state.map.set_plant(location, species, false);
            bus.publish(state, Message::JobCompleted { job_id });
        }
        JobPayload::Cooking { recipe } => {
            if let Some(station) = target {
                cook(state, recipe, station);
            }
            bus.publish(state, Message::JobCompleted { job_id });
        }
        JobPayload::None if has_hauling => deliver_hauling(bus, state, job_id),
        JobPayload::None if has_liquid => deliver_liquid_transfer(bus, state, job_id),
        JobPayload::None => execute_by_name(bus, state, job_id, location, target),
    }
}

/// Effects keyed by job type name. An unknown name at this point is a
/// runtime decision miss: logged, and the job is cancelled.
fn execute_by_name(
    bus: &MessageBus,
    state: &mut SettlementState,
    job_id: JobId,
    location: TileCoord,
    target: Option<EntityId>,
) {
    let Some(job) = state.jobs.get(job_id) else {
        return;
    };
    let name = state
        .dictionaries
        .job_types
        .name_of(job.job_type)
        .to_string();
    match name.as_str() {
        "harvesting" => {
            state.map.clear_plant(location);
            let produce = state.dictionaries.item_types.id_by_name("grain");
            let material = state.dictionaries.materials.id_by_name("oak");
            match (produce, material) {
                (Some(produce), Some(material)) => {
                    state.spawn_item(produce, material, 2, location);
                }
                _ => log::warn!("no produce item type for harvest at {}", location),
            }
        }
        "plant_removal" => state.map.clear_plant(location),
        "innoculation" => {
            let innoculated = state.dictionaries.item_types.id_by_name("innoculated_log");
            match (target, innoculated) {
                (Some(log), Some(item_type)) => state.items.convert_type(log, item_type),
                _ => log::warn!("innoculation at {} has nothing to convert", location),
            }
        }
        other => {
            log::warn!("no worker effect for job type '{}', cancelling {}", other, job_id);
            bus.publish(state, Message::JobCancelled { job_id });
            return;
        }
    }
    bus.publish(state, Message::JobCompleted { job_id });
}

/// Consume a recipe's staged inputs at a station and produce its output
fn cook(state: &mut SettlementState, recipe: RecipeId, station: EntityId) {
    let recipe = state.dictionaries.recipes.get(recipe).clone();
    for input in &recipe.item_inputs {
        let mut remaining = input.quantity;
        for item in state.items.item_ids() {
            if remaining == 0 {
                break;
            }
            let Some(record) = state.items.get(item) else {
                continue;
            };
            if record.container != Some(station) || record.item_type != input.item_type {
                continue;
            }
            if let Some(required) = input.material {
                if record.material != required {
                    continue;
                }
            }
            let take = remaining.min(record.num_unallocated());
            if take > 0 {
                state.items.reduce_quantity(item, take);
                remaining -= take;
            }
        }
        if remaining > 0 {
            log::warn!("cooking at {} ran short of ingredients", station);
        }
    }
    if let Some(liquid) = &recipe.liquid_input {
        state.liquids.remove_volume(station, liquid.volume);
    }
    let output = state.spawn_item_in_container(
        recipe.output_item_type,
        recipe.output_material,
        recipe.output_quantity,
        station,
    );
    log::debug!("cooked {} into {}", recipe.name, output);
}

/// Act as the worker for a hauling job: move the claimed thing to the
/// target and complete the job.
pub fn deliver_hauling(bus: &MessageBus, state: &mut SettlementState, job_id: JobId) {
    let Some(hauling) = state
        .jobs
        .get_mut(job_id)
        .and_then(|job| job.hauling_allocation.take())
    else {
        log::warn!("{} has no hauling allocation to deliver", job_id);
        return;
    };
    match hauling.hauled_entity_kind {
        HauledEntityKind::ItemStack => {
            if let Some(allocation) = &hauling.item_allocation {
                state.items.release(allocation);
                let Some(record) = state.items.get(hauling.hauled_entity) else {
                    log::warn!("hauled stack {} vanished mid-flight", hauling.hauled_entity);
                    bus.publish(state, Message::JobCancelled { job_id });
                    return;
                };
                let container = hauling
                    .target_id
                    .filter(|_| hauling.target_kind == PositionKind::FurnitureSlot);
                if record.quantity == allocation.quantity {
                    state
                        .items
                        .place(hauling.hauled_entity, hauling.target_position, container);
                } else {
                    let (item_type, material) = (record.item_type, record.material);
                    state
                        .items
                        .reduce_quantity(hauling.hauled_entity, allocation.quantity);
                    let id = state.spawn_item(
                        item_type,
                        material,
                        allocation.quantity,
                        hauling.target_position,
                    );
                    state.items.place(id, hauling.target_position, container);
                }
            }
        }
        HauledEntityKind::Creature => {
            if let Some(allocation) = &hauling.item_allocation {
                state.creatures.release(allocation);
            }
            state
                .creatures
                .set_location(hauling.hauled_entity, hauling.target_position);
        }
    }
    bus.publish(state, Message::JobCompleted { job_id });
}

/// Act as the worker for a liquid transfer job: move the claimed volume
/// into the target container and complete the job.
pub fn deliver_liquid_transfer(bus: &MessageBus, state: &mut SettlementState, job_id: JobId) {
    let Some(allocation) = state
        .jobs
        .get_mut(job_id)
        .and_then(|job| job.liquid_allocation.take())
    else {
        log::warn!("{} has no liquid allocation to deliver", job_id);
        return;
    };
    let Some(target) = state.jobs.get(job_id).and_then(|job| job.target_id) else {
        log::warn!("{} has no transfer target", job_id);
        state.liquids.release(&allocation);
        bus.publish(state, Message::JobCancelled { job_id });
        return;
    };
    state.liquids.commit_transfer(&allocation, target);
    bus.publish(state, Message::JobCompleted { job_id });
}

/// Mature every growing plant on the map
pub fn mature_plants(state: &mut SettlementState) {
    for x in 0..state.map.width() {
        for y in 0..state.map.height() {
            let coord = TileCoord::new(x, y);
            if let Some(tile) = state.map.tile_at(coord) {
                if let Some(plant) = tile.plant {
                    if !plant.mature {
                        state.map.set_plant(coord, plant.species, true);
                    }
                }
            }
        }
    }
}

/// Run summary exported as JSON
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub seed: u64,
    pub ticks: u32,
    pub sim_time: f64,
    pub jobs_completed: u32,
    pub live_jobs: usize,
    pub live_jobs_by_type: Vec<(String, usize)>,
    pub corpse_interred: bool,
}

pub fn run_report(session: &Session, layout: &DemoLayout, seed: u64, ticks: u32, jobs_completed: u32) -> RunReport {
    let state = &session.state;
    let mut by_type: Vec<(String, usize)> = Vec::new();
    for job_id in state.jobs.job_ids() {
        if let Some(job) = state.jobs.get(job_id) {
            let name = state.dictionaries.job_types.name_of(job.job_type).to_string();
            match by_type.iter_mut().find(|(n, _)| *n == name) {
                Some((_, count)) => *count += 1,
                None => by_type.push((name, 1)),
            }
        }
    }
    let corpse_interred = state
        .creatures
        .get(layout.corpse)
        .map(|c| {
            state
                .furniture
                .get(layout.grave)
                .map_or(false, |grave| grave.location == c.location)
        })
        .unwrap_or(false);
    RunReport {
        seed,
        ticks,
        sim_time: state.clock.current_sim_time(),
        jobs_completed,
        live_jobs: state.jobs.len(),
        live_jobs_by_type: by_type,
        corpse_interred,
    }
}
