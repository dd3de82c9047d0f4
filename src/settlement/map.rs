//! Settlement area map
//!
//! Grid of tiles with floor state, plant occupants, and navigability. The
//! orchestration core only reads from it; mutation happens from the outer
//! simulation (workers completing jobs).

use serde::{Deserialize, Serialize};

use crate::settlement::dictionaries::{FloorTypeId, MaterialId, PlantSpeciesId};
use crate::settlement::types::TileCoord;

/// A plant growing on a tile
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PlantInstance {
    pub species: PlantSpeciesId,
    pub mature: bool,
}

/// One map tile
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Tile {
    pub floor_type: FloorTypeId,
    pub floor_material: MaterialId,
    pub plant: Option<PlantInstance>,
    pub navigable: bool,
}

/// The settlement's tile grid
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AreaMap {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
}

impl AreaMap {
    /// Create a map with every tile set to the given floor, navigable
    pub fn new(
        width: usize,
        height: usize,
        floor_type: FloorTypeId,
        floor_material: MaterialId,
    ) -> Self {
        let tile = Tile {
            floor_type,
            floor_material,
            plant: None,
            navigable: true,
        };
        AreaMap {
            width,
            height,
            tiles: vec![tile; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, coord: TileCoord) -> Option<usize> {
        if coord.x < self.width && coord.y < self.height {
            Some(coord.y * self.width + coord.x)
        } else {
            None
        }
    }

    pub fn tile_at(&self, coord: TileCoord) -> Option<&Tile> {
        self.index(coord).map(|i| &self.tiles[i])
    }

    pub fn tile_at_mut(&mut self, coord: TileCoord) -> Option<&mut Tile> {
        match self.index(coord) {
            Some(i) => Some(&mut self.tiles[i]),
            None => None,
        }
    }

    /// Whether workers can path through the tile
    pub fn is_navigable(&self, coord: TileCoord) -> bool {
        self.tile_at(coord).map(|t| t.navigable).unwrap_or(false)
    }

    /// Replace the floor of a tile
    pub fn set_floor(&mut self, coord: TileCoord, floor_type: FloorTypeId, material: MaterialId) {
        if let Some(tile) = self.tile_at_mut(coord) {
            tile.floor_type = floor_type;
            tile.floor_material = material;
        }
    }

    /// Place a plant on a tile
    pub fn set_plant(&mut self, coord: TileCoord, species: PlantSpeciesId, mature: bool) {
        if let Some(tile) = self.tile_at_mut(coord) {
            tile.plant = Some(PlantInstance { species, mature });
        }
    }

    /// Remove any plant from a tile
    pub fn clear_plant(&mut self, coord: TileCoord) {
        if let Some(tile) = self.tile_at_mut(coord) {
            tile.plant = None;
        }
    }

    /// Mark a tile blocked or walkable
    pub fn set_navigable(&mut self, coord: TileCoord, navigable: bool) {
        if let Some(tile) = self.tile_at_mut(coord) {
            tile.navigable = navigable;
        }
    }
}
