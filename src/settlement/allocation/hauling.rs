//! Hauling claims: a source/target location pair plus an embedded stack claim

use serde::{Deserialize, Serialize};

use crate::settlement::allocation::item::ItemAllocation;
use crate::settlement::dictionaries::ItemTypeId;
use crate::settlement::types::{EntityId, TileCoord};

/// Whether a hauling endpoint is loose on the floor or a furniture slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionKind {
    Floor,
    FurnitureSlot,
}

/// What kind of entity is being moved
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HauledEntityKind {
    ItemStack,
    Creature,
}

/// A resolved claim describing one move operation
///
/// Created by a request resolver, owned by exactly one job, and released
/// when that job reaches a terminal state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HaulingAllocation {
    pub source_position: TileCoord,
    pub source_kind: PositionKind,
    /// Container the hauled entity currently sits in, if any
    pub source_container: Option<EntityId>,
    pub target_position: TileCoord,
    pub target_kind: PositionKind,
    /// Entity at the target (furniture slot, construction), if any
    pub target_id: Option<EntityId>,
    pub hauled_entity: EntityId,
    pub hauled_entity_kind: HauledEntityKind,
    pub hauled_item_type: Option<ItemTypeId>,
    /// Stack claim backing this move, when the hauled thing is a quantity
    pub item_allocation: Option<ItemAllocation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::allocation::item::AllocationPurpose;
    use crate::settlement::types::AllocationId;

    #[test]
    fn test_hauling_allocation_shape() {
        let allocation = HaulingAllocation {
            source_position: TileCoord::new(1, 1),
            source_kind: PositionKind::Floor,
            source_container: None,
            target_position: TileCoord::new(4, 2),
            target_kind: PositionKind::FurnitureSlot,
            target_id: Some(EntityId(9)),
            hauled_entity: EntityId(3),
            hauled_entity_kind: HauledEntityKind::ItemStack,
            hauled_item_type: Some(ItemTypeId(0)),
            item_allocation: Some(ItemAllocation {
                id: AllocationId(0),
                item: EntityId(3),
                quantity: 2,
                purpose: AllocationPurpose::DueToBeHauled,
                owner: EntityId(9),
            }),
        };
        assert_eq!(allocation.hauled_entity, EntityId(3));
        assert_eq!(allocation.item_allocation.as_ref().map(|a| a.quantity), Some(2));
    }
}
