//! Item stack claims

use serde::{Deserialize, Serialize};

use crate::settlement::types::{AllocationId, EntityId};

/// Why a claim was made against a stack
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllocationPurpose {
    /// Quantity is due to be moved by a hauling job
    DueToBeHauled,
    /// Quantity is held inside a worker or container inventory
    HeldInInventory,
    /// Quantity is reserved as a cooking ingredient
    FoodIngredient,
    /// A corpse reserved for burial
    Burial,
}

impl AllocationPurpose {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            AllocationPurpose::DueToBeHauled => "due to be hauled",
            AllocationPurpose::HeldInInventory => "held in inventory",
            AllocationPurpose::FoodIngredient => "food ingredient",
            AllocationPurpose::Burial => "burial",
        }
    }
}

/// A claim on part or all of one item stack
///
/// The tracker that issued the claim keeps the authoritative copy; the sum
/// of live claim quantities against a stack never exceeds the stack's
/// quantity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemAllocation {
    pub id: AllocationId,
    /// The claimed stack (or corpse, for burial claims)
    pub item: EntityId,
    pub quantity: u32,
    pub purpose: AllocationPurpose,
    /// Entity on whose behalf the claim was made
    pub owner: EntityId,
}
