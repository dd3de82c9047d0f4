//! Creature tracker
//!
//! Corpses are single-unit resources: one burial claim at a time, so
//! `num_unallocated` reads 0 or 1 and the graveyard eligibility rule reads
//! the same as for item stacks.

use std::collections::HashMap;

use crate::settlement::allocation::{AllocationPurpose, ItemAllocation};
use crate::settlement::types::{AllocationId, EntityId, TileCoord};

/// A tracked creature, alive or dead
#[derive(Clone, Debug)]
pub struct CreatureRecord {
    pub id: EntityId,
    pub species_name: String,
    pub location: TileCoord,
    pub alive: bool,
    claim: Option<ItemAllocation>,
}

impl CreatureRecord {
    pub fn new(id: EntityId, species_name: impl Into<String>, location: TileCoord) -> Self {
        CreatureRecord {
            id,
            species_name: species_name.into(),
            location,
            alive: true,
            claim: None,
        }
    }

    pub fn num_unallocated(&self) -> u32 {
        if self.claim.is_none() {
            1
        } else {
            0
        }
    }

    pub fn claim(&self) -> Option<&ItemAllocation> {
        self.claim.as_ref()
    }
}

/// Index over all live (and dead) creatures
#[derive(Clone, Debug, Default)]
pub struct CreatureTracker {
    creatures: HashMap<EntityId, CreatureRecord>,
    next_allocation_id: u64,
}

impl CreatureTracker {
    pub fn new() -> Self {
        CreatureTracker::default()
    }

    pub fn added(&mut self, record: CreatureRecord) {
        self.creatures.insert(record.id, record);
    }

    pub fn removed(&mut self, id: EntityId) -> Option<CreatureRecord> {
        self.creatures.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&CreatureRecord> {
        self.creatures.get(&id)
    }

    pub fn mark_dead(&mut self, id: EntityId) {
        if let Some(record) = self.creatures.get_mut(&id) {
            record.alive = false;
        }
    }

    pub fn set_location(&mut self, id: EntityId, location: TileCoord) {
        if let Some(record) = self.creatures.get_mut(&id) {
            record.location = location;
        }
    }

    /// Dead, unclaimed creatures, ascending by id (snapshot)
    pub fn unclaimed_corpses(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .creatures
            .values()
            .filter(|c| !c.alive && c.num_unallocated() > 0)
            .map(|c| c.id)
            .collect();
        ids.sort();
        ids
    }

    pub fn num_unallocated(&self, id: EntityId) -> u32 {
        self.creatures
            .get(&id)
            .map(|c| c.num_unallocated())
            .unwrap_or(0)
    }

    /// Claim a creature. Claiming an already-claimed creature is a
    /// programming error.
    pub fn allocate(
        &mut self,
        id: EntityId,
        purpose: AllocationPurpose,
        owner: EntityId,
    ) -> ItemAllocation {
        let record = self
            .creatures
            .get_mut(&id)
            .unwrap_or_else(|| panic!("allocation against untracked {}", id));
        assert!(
            record.claim.is_none(),
            "double allocation against {}",
            id
        );
        let allocation = ItemAllocation {
            id: AllocationId(self.next_allocation_id),
            item: id,
            quantity: 1,
            purpose,
            owner,
        };
        self.next_allocation_id += 1;
        record.claim = Some(allocation.clone());
        allocation
    }

    pub fn release(&mut self, allocation: &ItemAllocation) {
        let Some(record) = self.creatures.get_mut(&allocation.item) else {
            log::warn!("release of {} against untracked {}", allocation.id, allocation.item);
            return;
        };
        match &record.claim {
            Some(claim) if claim.id == allocation.id => record.claim = None,
            _ => log::warn!("release of unknown {} against {}", allocation.id, allocation.item),
        }
    }

    /// Re-register a persisted claim on load
    pub(crate) fn restore_allocation(&mut self, allocation: ItemAllocation) {
        let record = self
            .creatures
            .get_mut(&allocation.item)
            .unwrap_or_else(|| panic!("restored allocation against untracked {}", allocation.item));
        assert!(
            record.claim.is_none(),
            "restored allocation overcommits {}",
            allocation.item
        );
        self.next_allocation_id = self.next_allocation_id.max(allocation.id.0 + 1);
        record.claim = Some(allocation);
    }

    pub fn reset(&mut self) {
        self.creatures.clear();
    }
}
