//! Named definition dictionaries
//!
//! Room behaviours are configured against names ("tilling", "cauldron",
//! "vegetable_stew") which are resolved to interned ids exactly once, at
//! configuration time. A missing name at configuration or load time is a
//! fatal error; a missing lookup at runtime decision time is logged by the
//! caller and the action skipped.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settlement::types::Season;

/// Fatal configuration-time resolution failure
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown job type '{0}'")]
    UnknownJobType(String),
    #[error("unknown profession '{0}'")]
    UnknownProfession(String),
    #[error("unknown item type '{0}'")]
    UnknownItemType(String),
    #[error("unknown material '{0}'")]
    UnknownMaterial(String),
    #[error("unknown furniture type '{0}'")]
    UnknownFurnitureType(String),
    #[error("unknown floor type '{0}'")]
    UnknownFloorType(String),
    #[error("unknown plant species '{0}'")]
    UnknownPlantSpecies(String),
    #[error("unknown crafting recipe '{0}'")]
    UnknownRecipe(String),
}

/// Interned id for a job type definition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobTypeId(pub u32);

/// Interned id for a profession definition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfessionId(pub u32);

/// Interned id for an item type definition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemTypeId(pub u32);

/// Interned id for a material definition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialId(pub u32);

/// Interned id for a furniture type definition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FurnitureTypeId(pub u32);

/// Interned id for a floor type definition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FloorTypeId(pub u32);

/// Interned id for a plant species definition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlantSpeciesId(pub u32);

/// Interned id for a crafting recipe definition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecipeId(pub u32);

/// A named job type
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobTypeDef {
    pub name: String,
}

/// A named worker profession
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfessionDef {
    pub name: String,
}

/// A named item type
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemTypeDef {
    pub name: String,
    pub edible: bool,
}

/// A named material
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaterialDef {
    pub name: String,
}

/// A named furniture type with lookup tags
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FurnitureTypeDef {
    pub name: String,
    pub tags: Vec<String>,
}

/// A named floor type
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FloorTypeDef {
    pub name: String,
}

/// A named plant species with its planting window
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlantSpeciesDef {
    pub name: String,
    pub planting_seasons: Vec<Season>,
}

impl PlantSpeciesDef {
    pub fn plantable_in(&self, season: Season) -> bool {
        self.planting_seasons.contains(&season)
    }
}

/// One solid ingredient requirement of a recipe
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecipeItemInput {
    pub item_type: ItemTypeId,
    pub material: Option<MaterialId>,
    pub quantity: u32,
}

/// The liquid requirement of a recipe
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecipeLiquidInput {
    pub material: MaterialId,
    pub volume: f32,
}

/// A named crafting recipe; either ingredient list may be empty
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecipeDef {
    pub name: String,
    pub item_inputs: Vec<RecipeItemInput>,
    pub liquid_input: Option<RecipeLiquidInput>,
    pub output_item_type: ItemTypeId,
    pub output_material: MaterialId,
    pub output_quantity: u32,
}

/// Dictionary of job types
#[derive(Clone, Debug, Default)]
pub struct JobTypeDictionary {
    defs: Vec<JobTypeDef>,
    by_name: HashMap<String, JobTypeId>,
}

impl JobTypeDictionary {
    pub fn add(&mut self, def: JobTypeDef) -> JobTypeId {
        let id = JobTypeId(self.defs.len() as u32);
        self.by_name.insert(def.name.clone(), id);
        self.defs.push(def);
        id
    }

    pub fn get(&self, id: JobTypeId) -> &JobTypeDef {
        &self.defs[id.0 as usize]
    }

    pub fn get_by_name(&self, name: &str) -> Option<&JobTypeDef> {
        self.by_name.get(name).map(|id| self.get(*id))
    }

    pub fn id_by_name(&self, name: &str) -> Option<JobTypeId> {
        self.by_name.get(name).copied()
    }

    /// Resolve a name or fail with a configuration error
    pub fn require(&self, name: &str) -> Result<JobTypeId, ConfigError> {
        self.id_by_name(name)
            .ok_or_else(|| ConfigError::UnknownJobType(name.to_string()))
    }

    pub fn name_of(&self, id: JobTypeId) -> &str {
        &self.get(id).name
    }
}

/// Dictionary of professions
#[derive(Clone, Debug, Default)]
pub struct ProfessionDictionary {
    defs: Vec<ProfessionDef>,
    by_name: HashMap<String, ProfessionId>,
}

impl ProfessionDictionary {
    pub fn add(&mut self, def: ProfessionDef) -> ProfessionId {
        let id = ProfessionId(self.defs.len() as u32);
        self.by_name.insert(def.name.clone(), id);
        self.defs.push(def);
        id
    }

    pub fn get(&self, id: ProfessionId) -> &ProfessionDef {
        &self.defs[id.0 as usize]
    }

    pub fn get_by_name(&self, name: &str) -> Option<&ProfessionDef> {
        self.by_name.get(name).map(|id| self.get(*id))
    }

    pub fn id_by_name(&self, name: &str) -> Option<ProfessionId> {
        self.by_name.get(name).copied()
    }

    pub fn require(&self, name: &str) -> Result<ProfessionId, ConfigError> {
        self.id_by_name(name)
            .ok_or_else(|| ConfigError::UnknownProfession(name.to_string()))
    }

    pub fn name_of(&self, id: ProfessionId) -> &str {
        &self.get(id).name
    }
}

/// Dictionary of item types
#[derive(Clone, Debug, Default)]
pub struct ItemTypeDictionary {
    defs: Vec<ItemTypeDef>,
    by_name: HashMap<String, ItemTypeId>,
}

impl ItemTypeDictionary {
    pub fn add(&mut self, def: ItemTypeDef) -> ItemTypeId {
        let id = ItemTypeId(self.defs.len() as u32);
        self.by_name.insert(def.name.clone(), id);
        self.defs.push(def);
        id
    }

    pub fn get(&self, id: ItemTypeId) -> &ItemTypeDef {
        &self.defs[id.0 as usize]
    }

    pub fn get_by_name(&self, name: &str) -> Option<&ItemTypeDef> {
        self.by_name.get(name).map(|id| self.get(*id))
    }

    pub fn id_by_name(&self, name: &str) -> Option<ItemTypeId> {
        self.by_name.get(name).copied()
    }

    pub fn require(&self, name: &str) -> Result<ItemTypeId, ConfigError> {
        self.id_by_name(name)
            .ok_or_else(|| ConfigError::UnknownItemType(name.to_string()))
    }

    pub fn name_of(&self, id: ItemTypeId) -> &str {
        &self.get(id).name
    }
}

/// Dictionary of materials
#[derive(Clone, Debug, Default)]
pub struct MaterialDictionary {
    defs: Vec<MaterialDef>,
    by_name: HashMap<String, MaterialId>,
}

impl MaterialDictionary {
    pub fn add(&mut self, def: MaterialDef) -> MaterialId {
        let id = MaterialId(self.defs.len() as u32);
        self.by_name.insert(def.name.clone(), id);
        self.defs.push(def);
        id
    }

    pub fn get(&self, id: MaterialId) -> &MaterialDef {
        &self.defs[id.0 as usize]
    }

    pub fn get_by_name(&self, name: &str) -> Option<&MaterialDef> {
        self.by_name.get(name).map(|id| self.get(*id))
    }

    pub fn id_by_name(&self, name: &str) -> Option<MaterialId> {
        self.by_name.get(name).copied()
    }

    pub fn require(&self, name: &str) -> Result<MaterialId, ConfigError> {
        self.id_by_name(name)
            .ok_or_else(|| ConfigError::UnknownMaterial(name.to_string()))
    }

    pub fn name_of(&self, id: MaterialId) -> &str {
        &self.get(id).name
    }
}

/// Dictionary of furniture types
#[derive(Clone, Debug, Default)]
pub struct FurnitureTypeDictionary {
    defs: Vec<FurnitureTypeDef>,
    by_name: HashMap<String, FurnitureTypeId>,
}

impl FurnitureTypeDictionary {
    pub fn add(&mut self, def: FurnitureTypeDef) -> FurnitureTypeId {
        let id = FurnitureTypeId(self.defs.len() as u32);
        self.by_name.insert(def.name.clone(), id);
        self.defs.push(def);
        id
    }

    pub fn get(&self, id: FurnitureTypeId) -> &FurnitureTypeDef {
        &self.defs[id.0 as usize]
    }

    pub fn get_by_name(&self, name: &str) -> Option<&FurnitureTypeDef> {
        self.by_name.get(name).map(|id| self.get(*id))
    }

    pub fn id_by_name(&self, name: &str) -> Option<FurnitureTypeId> {
        self.by_name.get(name).copied()
    }

    pub fn require(&self, name: &str) -> Result<FurnitureTypeId, ConfigError> {
        self.id_by_name(name)
            .ok_or_else(|| ConfigError::UnknownFurnitureType(name.to_string()))
    }

    pub fn name_of(&self, id: FurnitureTypeId) -> &str {
        &self.get(id).name
    }

    /// Whether the definition carries a lookup tag
    pub fn has_tag(&self, id: FurnitureTypeId, tag: &str) -> bool {
        self.get(id).tags.iter().any(|t| t == tag)
    }
}

/// Dictionary of floor types
#[derive(Clone, Debug, Default)]
pub struct FloorTypeDictionary {
    defs: Vec<FloorTypeDef>,
    by_name: HashMap<String, FloorTypeId>,
}

impl FloorTypeDictionary {
    pub fn add(&mut self, def: FloorTypeDef) -> FloorTypeId {
        let id = FloorTypeId(self.defs.len() as u32);
        self.by_name.insert(def.name.clone(), id);
        self.defs.push(def);
        id
    }

    pub fn get(&self, id: FloorTypeId) -> &FloorTypeDef {
        &self.defs[id.0 as usize]
    }

    pub fn get_by_name(&self, name: &str) -> Option<&FloorTypeDef> {
        self.by_name.get(name).map(|id| self.get(*id))
    }

    pub fn id_by_name(&self, name: &str) -> Option<FloorTypeId> {
        self.by_name.get(name).copied()
    }

    pub fn require(&self, name: &str) -> Result<FloorTypeId, ConfigError> {
        self.id_by_name(name)
            .ok_or_else(|| ConfigError::UnknownFloorType(name.to_string()))
    }

    pub fn name_of(&self, id: FloorTypeId) -> &str {
        &self.get(id).name
    }
}

/// Dictionary of plant species
#[derive(Clone, Debug, Default)]
pub struct PlantSpeciesDictionary {
    defs: Vec<PlantSpeciesDef>,
    by_name: HashMap<String, PlantSpeciesId>,
}

impl PlantSpeciesDictionary {
    pub fn add(&mut self, def: PlantSpeciesDef) -> PlantSpeciesId {
        let id = PlantSpeciesId(self.defs.len() as u32);
        self.by_name.insert(def.name.clone(), id);
        self.defs.push(def);
        id
    }

    pub fn get(&self, id: PlantSpeciesId) -> &PlantSpeciesDef {
        &self.defs[id.0 as usize]
    }

    pub fn get_by_name(&self, name: &str) -> Option<&PlantSpeciesDef> {
        self.by_name.get(name).map(|id| self.get(*id))
    }

    pub fn id_by_name(&self, name: &str) -> Option<PlantSpeciesId> {
        self.by_name.get(name).copied()
    }

    pub fn require(&self, name: &str) -> Result<PlantSpeciesId, ConfigError> {
        self.id_by_name(name)
            .ok_or_else(|| ConfigError::UnknownPlantSpecies(name.to_string()))
    }

    pub fn name_of(&self, id: PlantSpeciesId) -> &str {
        &self.get(id).name
    }
}

/// Dictionary of crafting recipes
#[derive(Clone, Debug, Default)]
pub struct RecipeDictionary {
    defs: Vec<RecipeDef>,
    by_name: HashMap<String, RecipeId>,
}

impl RecipeDictionary {
    pub fn add(&mut self, def: RecipeDef) -> RecipeId {
        let id = RecipeId(self.defs.len() as u32);
        self.by_name.insert(def.name.clone(), id);
        self.defs.push(def);
        id
    }

    pub fn get(&self, id: RecipeId) -> &RecipeDef {
        &self.defs[id.0 as usize]
    }

    pub fn get_by_name(&self, name: &str) -> Option<&RecipeDef> {
        self.by_name.get(name).map(|id| self.get(*id))
    }

    pub fn id_by_name(&self, name: &str) -> Option<RecipeId> {
        self.by_name.get(name).copied()
    }

    pub fn require(&self, name: &str) -> Result<RecipeId, ConfigError> {
        self.id_by_name(name)
            .ok_or_else(|| ConfigError::UnknownRecipe(name.to_string()))
    }

    pub fn name_of(&self, id: RecipeId) -> &str {
        &self.get(id).name
    }
}

/// All dictionaries a session is configured with
#[derive(Clone, Debug, Default)]
pub struct Dictionaries {
    pub job_types: JobTypeDictionary,
    pub professions: ProfessionDictionary,
    pub item_types: ItemTypeDictionary,
    pub materials: MaterialDictionary,
    pub furniture_types: FurnitureTypeDictionary,
    pub floor_types: FloorTypeDictionary,
    pub plant_species: PlantSpeciesDictionary,
    pub recipes: RecipeDictionary,
}

impl Dictionaries {
    pub fn new() -> Self {
        Dictionaries::default()
    }
}
