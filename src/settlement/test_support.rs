//! Shared fixtures for the crate's tests
//!
//! Reuses the demo vocabulary and worker shim so tests drive the same
//! wiring the binary does.

pub use crate::demo::{deliver_hauling, deliver_liquid_transfer};

use crate::settlement::dictionaries::{
    Dictionaries, FurnitureTypeId, ItemTypeId, MaterialId, PlantSpeciesId,
};
use crate::settlement::jobs::lifecycle;
use crate::settlement::map::AreaMap;
use crate::settlement::messages::MessageBus;
use crate::settlement::rooms::{
    FarmBehaviour, FarmConfig, GraveyardBehaviour, GraveyardConfig, KitchenBehaviour,
    KitchenConfig, MushroomBehaviour, MushroomConfig,
};
use crate::settlement::session::{Session, SettlementState};
use crate::settlement::trackers::resolvers;
use crate::settlement::types::{EntityId, TileCoord};

/// The vocabulary every test session is configured with
pub fn test_dictionaries() -> Dictionaries {
    crate::demo::standard_dictionaries()
}

/// A state over an 8x8 stone map with the test vocabulary
pub fn empty_state() -> SettlementState {
    let dictionaries = test_dictionaries();
    let floor = dictionaries
        .floor_types
        .id_by_name("rough_stone")
        .expect("rough_stone floor");
    let soil = dictionaries.materials.id_by_name("soil").expect("soil material");
    SettlementState::new(AreaMap::new(8, 8, floor, soil), dictionaries, 42)
}

/// A bus with the lifecycle listener and all resolvers registered,
/// matching what a session wires up (minus the room router)
pub fn wired_bus() -> MessageBus {
    let bus = MessageBus::new();
    lifecycle::register(&bus);
    resolvers::register(&bus);
    bus
}

/// A full session over the test vocabulary
pub fn demo_session() -> Session {
    let dictionaries = test_dictionaries();
    let floor = dictionaries
        .floor_types
        .id_by_name("rough_stone")
        .expect("rough_stone floor");
    let soil = dictionaries.materials.id_by_name("soil").expect("soil material");
    Session::new(AreaMap::new(8, 8, floor, soil), dictionaries, 42)
}

/// Name lookups that panic on a typo in a test
pub mod names {
    use super::*;

    pub fn item_type(state: &SettlementState, name: &str) -> ItemTypeId {
        state
            .dictionaries
            .item_types
            .id_by_name(name)
            .expect("unknown test item type")
    }

    pub fn material(state: &SettlementState, name: &str) -> MaterialId {
        state
            .dictionaries
            .materials
            .id_by_name(name)
            .expect("unknown test material")
    }

    pub fn furniture_type(state: &SettlementState, name: &str) -> FurnitureTypeId {
        state
            .dictionaries
            .furniture_types
            .id_by_name(name)
            .expect("unknown test furniture type")
    }

    pub fn plant_species(state: &SettlementState, name: &str) -> PlantSpeciesId {
        state
            .dictionaries
            .plant_species
            .id_by_name(name)
            .expect("unknown test plant species")
    }
}

pub fn spawn_stack(
    state: &mut SettlementState,
    item_type: ItemTypeId,
    material: MaterialId,
    quantity: u32,
    location: TileCoord,
) -> EntityId {
    state.spawn_item(item_type, material, quantity, location)
}

pub fn farm_behaviour(state: &SettlementState) -> FarmBehaviour {
    FarmBehaviour::configure(
        &state.dictionaries,
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
    .expect("farm configuration")
}

pub fn kitchen_behaviour(state: &SettlementState) -> KitchenBehaviour {
    KitchenBehaviour::configure(
        &state.dictionaries,
        KitchenConfig {
            cooking_job_type: "cooking",
            hauling_job_type: "hauling",
            transfer_job_type: "liquid_transfer",
            station_tag: "cooking_station",
            recipe: "stew",
            profession: Some("cook"),
        },
    )
    .expect("kitchen configuration")
}

pub fn graveyard_behaviour(state: &SettlementState) -> GraveyardBehaviour {
    GraveyardBehaviour::configure(
        &state.dictionaries,
        GraveyardConfig {
            hauling_job_type: "hauling",
            grave_tag: "grave",
            profession: Some("undertaker"),
        },
    )
    .expect("graveyard configuration")
}

pub fn mushroom_behaviour(state: &SettlementState) -> MushroomBehaviour {
    MushroomBehaviour::configure(
        &state.dictionaries,
        MushroomConfig {
            innoculation_job_type: "innoculation",
            hauling_job_type: "hauling",
            raw_log_item_type: "raw_log",
            innoculated_log_item_type: "innoculated_log",
            tank_tag: "shock_tank",
            profession: Some("mushroom_farmer"),
        },
    )
    .expect("mushroom configuration")
}
