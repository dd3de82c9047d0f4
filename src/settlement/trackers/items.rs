//! Item stack tracker
//!
//! Authoritative registry of live stack claims. The sum of live claim
//! quantities against a stack never exceeds the stack's quantity;
//! violating that is a programming error and panics.

use std::collections::HashMap;

use crate::settlement::allocation::{AllocationPurpose, ItemAllocation};
use crate::settlement::dictionaries::{Dictionaries, ItemTypeId, MaterialId};
use crate::settlement::types::{AllocationId, EntityId, TileCoord};

/// A tracked item stack
#[derive(Clone, Debug)]
pub struct ItemRecord {
    pub id: EntityId,
    pub item_type: ItemTypeId,
    pub material: MaterialId,
    pub quantity: u32,
    pub location: TileCoord,
    /// Furniture the stack sits inside, if any
    pub container: Option<EntityId>,
    allocations: Vec<ItemAllocation>,
}

impl ItemRecord {
    pub fn new(
        id: EntityId,
        item_type: ItemTypeId,
        material: MaterialId,
        quantity: u32,
        location: TileCoord,
    ) -> Self {
        ItemRecord {
            id,
            item_type,
            material,
            quantity,
            location,
            container: None,
            allocations: Vec::new(),
        }
    }

    /// Total quantity currently claimed
    pub fn allocated(&self) -> u32 {
        self.allocations.iter().map(|a| a.quantity).sum()
    }

    /// Quantity still free to claim
    pub fn num_unallocated(&self) -> u32 {
        self.quantity - self.allocated()
    }

    pub fn allocations(&self) -> &[ItemAllocation] {
        &self.allocations
    }
}

/// Index over all live item stacks
#[derive(Clone, Debug, Default)]
pub struct ItemTracker {
    items: HashMap<EntityId, ItemRecord>,
    next_allocation_id: u64,
}

impl ItemTracker {
    pub fn new() -> Self {
        ItemTracker::default()
    }

    /// A stack entered the world
    pub fn added(&mut self, record: ItemRecord) {
        self.items.insert(record.id, record);
    }

    /// A stack left the world
    pub fn removed(&mut self, id: EntityId) -> Option<ItemRecord> {
        self.items.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&ItemRecord> {
        self.items.get(&id)
    }

    /// All tracked stack ids, ascending (snapshot)
    pub fn item_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.items.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Stacks of a type with free quantity, optionally of one material,
    /// ascending by id (snapshot)
    pub fn unallocated_matching(
        &self,
        item_type: ItemTypeId,
        material: Option<MaterialId>,
    ) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .items
            .values()
            .filter(|item| {
                item.item_type == item_type
                    && item.num_unallocated() > 0
                    && material.map_or(true, |m| item.material == m)
            })
            .map(|item| item.id)
            .collect();
        ids.sort();
        ids
    }

    /// Edible stacks with free quantity (snapshot)
    pub fn unallocated_edible_items(&self, dictionaries: &Dictionaries) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .items
            .values()
            .filter(|item| {
                item.num_unallocated() > 0 && dictionaries.item_types.get(item.item_type).edible
            })
            .map(|item| item.id)
            .collect();
        ids.sort();
        ids
    }

    /// Total quantity of matching stacks physically inside a container
    pub fn quantity_in_container(
        &self,
        container: EntityId,
        item_type: ItemTypeId,
        material: Option<MaterialId>,
    ) -> u32 {
        self.items
            .values()
            .filter(|item| {
                item.container == Some(container)
                    && item.item_type == item_type
                    && material.map_or(true, |m| item.material == m)
            })
            .map(|item| item.quantity)
            .sum()
    }

    pub fn num_unallocated(&self, id: EntityId) -> u32 {
        self.items.get(&id).map(|i| i.num_unallocated()).unwrap_or(0)
    }

    /// Claim quantity against a stack. The claim is committed immediately:
    /// any query issued after this call, in the same tick included, sees
    /// the reduced remainder.
    pub fn allocate(
        &mut self,
        item: EntityId,
        quantity: u32,
        purpose: AllocationPurpose,
        owner: EntityId,
    ) -> ItemAllocation {
        let record = self
            .items
            .get_mut(&item)
            .unwrap_or_else(|| panic!("allocation against untracked {}", item));
        assert!(quantity > 0, "zero-quantity allocation against {}", item);
        assert!(
            quantity <= record.num_unallocated(),
            "double allocation against {}: {} requested, {} unallocated",
            item,
            quantity,
            record.num_unallocated()
        );
        let allocation = ItemAllocation {
            id: AllocationId(self.next_allocation_id),
            item,
            quantity,
            purpose,
            owner,
        };
        self.next_allocation_id += 1;
        record.allocations.push(allocation.clone());
        allocation
    }

    /// Return a claim's quantity to the unallocated pool
    pub fn release(&mut self, allocation: &ItemAllocation) {
        let Some(record) = self.items.get_mut(&allocation.item) else {
            // The stack may have been consumed before its claim was retired.
            log::warn!("release of {} against untracked {}", allocation.id, allocation.item);
            return;
        };
        let before = record.allocations.len();
        record.allocations.retain(|a| a.id != allocation.id);
        if record.allocations.len() == before {
            log::warn!("release of unknown {} against {}", allocation.id, allocation.item);
        }
    }

    /// Re-register a persisted claim on load
    pub(crate) fn restore_allocation(&mut self, allocation: ItemAllocation) {
        let record = self
            .items
            .get_mut(&allocation.item)
            .unwrap_or_else(|| panic!("restored allocation against untracked {}", allocation.item));
        assert!(
            allocation.quantity <= record.num_unallocated(),
            "restored allocation overcommits {}",
            allocation.item
        );
        self.next_allocation_id = self.next_allocation_id.max(allocation.id.0 + 1);
        record.allocations.push(allocation);
    }

    /// Move a stack to a new position, optionally into a container
    pub fn place(&mut self, id: EntityId, location: TileCoord, container: Option<EntityId>) {
        if let Some(record) = self.items.get_mut(&id) {
            record.location = location;
            record.container = container;
        }
    }

    /// Change a stack's item type in place (processing steps)
    pub fn convert_type(&mut self, id: EntityId, item_type: ItemTypeId) {
        if let Some(record) = self.items.get_mut(&id) {
            record.item_type = item_type;
        }
    }

    /// Consume quantity from a stack; removes the stack when it empties.
    /// Consuming below the claimed quantity is a programming error.
    pub fn reduce_quantity(&mut self, id: EntityId, quantity: u32) {
        let Some(record) = self.items.get_mut(&id) else {
            return;
        };
        assert!(
            quantity <= record.num_unallocated(),
            "consuming claimed quantity from {}",
            id
        );
        record.quantity -= quantity;
        if record.quantity == 0 {
            self.items.remove(&id);
        }
    }

    /// Drop all records and claims (session teardown)
    pub fn reset(&mut self) {
        self.items.clear();
    }
}
