//! Liquid container tracker
//!
//! Volumes are claimed per (container, material) with the same over-claim
//! rule as item stacks. Comparisons tolerate a small epsilon since volumes
//! are floats.

use std::collections::HashMap;

use crate::settlement::allocation::LiquidAllocation;
use crate::settlement::dictionaries::MaterialId;
use crate::settlement::types::{AllocationId, EntityId};

const VOLUME_EPSILON: f32 = 1e-4;

/// A tracked liquid-holding container (a furniture entity)
#[derive(Clone, Debug)]
pub struct LiquidContainerRecord {
    pub id: EntityId,
    /// Material currently held; `None` when empty
    pub material: Option<MaterialId>,
    pub capacity: f32,
    pub volume: f32,
    allocations: Vec<LiquidAllocation>,
}

impl LiquidContainerRecord {
    pub fn new(id: EntityId, capacity: f32) -> Self {
        LiquidContainerRecord {
            id,
            material: None,
            capacity,
            volume: 0.0,
            allocations: Vec::new(),
        }
    }

    /// Total volume currently claimed
    pub fn allocated(&self) -> f32 {
        self.allocations.iter().map(|a| a.volume).sum()
    }

    /// Volume still free to claim
    pub fn num_unallocated(&self) -> f32 {
        (self.volume - self.allocated()).max(0.0)
    }

    pub fn allocations(&self) -> &[LiquidAllocation] {
        &self.allocations
    }
}

/// Index over all liquid-holding containers
#[derive(Clone, Debug, Default)]
pub struct LiquidTracker {
    containers: HashMap<EntityId, LiquidContainerRecord>,
    next_allocation_id: u64,
}

impl LiquidTracker {
    pub fn new() -> Self {
        LiquidTracker::default()
    }

    pub fn added(&mut self, record: LiquidContainerRecord) {
        self.containers.insert(record.id, record);
    }

    pub fn removed(&mut self, id: EntityId) -> Option<LiquidContainerRecord> {
        self.containers.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&LiquidContainerRecord> {
        self.containers.get(&id)
    }

    /// All container ids, ascending (snapshot)
    pub fn container_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.containers.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Containers holding at least `volume` of unclaimed `material`,
    /// ascending by id (snapshot)
    pub fn sources_with_unallocated(
        &self,
        material: MaterialId,
        volume: f32,
        exclude: Option<EntityId>,
    ) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .containers
            .values()
            .filter(|c| {
                c.material == Some(material)
                    && c.num_unallocated() + VOLUME_EPSILON >= volume
                    && Some(c.id) != exclude
            })
            .map(|c| c.id)
            .collect();
        ids.sort();
        ids
    }

    /// Volume of a material physically present in a container
    pub fn volume_of(&self, id: EntityId, material: MaterialId) -> f32 {
        self.containers
            .get(&id)
            .filter(|c| c.material == Some(material))
            .map(|c| c.volume)
            .unwrap_or(0.0)
    }

    /// Claim a volume. Over-claiming or claiming the wrong material is a
    /// programming error.
    pub fn allocate(
        &mut self,
        container: EntityId,
        material: MaterialId,
        volume: f32,
        owner: EntityId,
    ) -> LiquidAllocation {
        let record = self
            .containers
            .get_mut(&container)
            .unwrap_or_else(|| panic!("allocation against untracked {}", container));
        assert!(
            record.material == Some(material),
            "allocation of wrong material against {}",
            container
        );
        assert!(
            volume > 0.0 && volume <= record.num_unallocated() + VOLUME_EPSILON,
            "double allocation against {}: {} requested, {} unallocated",
            container,
            volume,
            record.num_unallocated()
        );
        let allocation = LiquidAllocation {
            id: AllocationId(self.next_allocation_id),
            container,
            material,
            volume,
            owner,
        };
        self.next_allocation_id += 1;
        record.allocations.push(allocation.clone());
        allocation
    }

    /// Return a claim's volume to the unallocated pool
    pub fn release(&mut self, allocation: &LiquidAllocation) {
        let Some(record) = self.containers.get_mut(&allocation.container) else {
            log::warn!(
                "release of {} against untracked {}",
                allocation.id,
                allocation.container
            );
            return;
        };
        let before = record.allocations.len();
        record.allocations.retain(|a| a.id != allocation.id);
        if record.allocations.len() == before {
            log::warn!(
                "release of unknown {} against {}",
                allocation.id,
                allocation.container
            );
        }
    }

    /// Re-register a persisted claim on load
    pub(crate) fn restore_allocation(&mut self, allocation: LiquidAllocation) {
        let record = self
            .containers
            .get_mut(&allocation.container)
            .unwrap_or_else(|| {
                panic!("restored allocation against untracked {}", allocation.container)
            });
        assert!(
            allocation.volume <= record.num_unallocated() + VOLUME_EPSILON,
            "restored allocation overcommits {}",
            allocation.container
        );
        self.next_allocation_id = self.next_allocation_id.max(allocation.id.0 + 1);
        record.allocations.push(allocation);
    }

    /// Pour liquid into a container, clamped to capacity. Pouring a second
    /// material over a first is a programming error.
    pub fn add_volume(&mut self, id: EntityId, material: MaterialId, volume: f32) {
        let Some(record) = self.containers.get_mut(&id) else {
            return;
        };
        assert!(
            record.material.is_none() || record.material == Some(material),
            "mixing materials in {}",
            id
        );
        record.material = Some(material);
        record.volume = (record.volume + volume).min(record.capacity);
    }

    /// Drain unclaimed volume from a container; clears the material when
    /// the container empties.
    pub fn remove_volume(&mut self, id: EntityId, volume: f32) {
        let Some(record) = self.containers.get_mut(&id) else {
            return;
        };
        assert!(
            volume <= record.num_unallocated() + VOLUME_EPSILON,
            "draining claimed volume from {}",
            id
        );
        record.volume = (record.volume - volume).max(0.0);
        if record.volume <= VOLUME_EPSILON {
            record.volume = 0.0;
            record.material = None;
        }
    }

    /// Execute a transfer a worker completed: the claimed volume leaves the
    /// source along with its claim and arrives in the target.
    pub fn commit_transfer(&mut self, allocation: &LiquidAllocation, target: EntityId) {
        {
            let Some(source) = self.containers.get_mut(&allocation.container) else {
                log::warn!(
                    "transfer commit of {} against untracked {}",
                    allocation.id,
                    allocation.container
                );
                return;
            };
            source.allocations.retain(|a| a.id != allocation.id);
            source.volume = (source.volume - allocation.volume).max(0.0);
            if source.volume <= VOLUME_EPSILON {
                source.volume = 0.0;
                source.material = None;
            }
        }
        self.add_volume(target, allocation.material, allocation.volume);
    }

    pub fn reset(&mut self) {
        self.containers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_with_barrel(volume: f32) -> (LiquidTracker, EntityId) {
        let mut tracker = LiquidTracker::new();
        let id = EntityId(1);
        let mut record = LiquidContainerRecord::new(id, 10.0);
        record.material = Some(MaterialId(0));
        record.volume = volume;
        tracker.added(record);
        (tracker, id)
    }

    #[test]
    fn test_volume_claims() {
        let (mut tracker, id) = tracker_with_barrel(5.0);
        let a = tracker.allocate(id, MaterialId(0), 2.0, EntityId(9));
        assert!(tracker.get(id).unwrap().num_unallocated() - 3.0 < VOLUME_EPSILON);
        tracker.release(&a);
        assert!(tracker.get(id).unwrap().num_unallocated() - 5.0 < VOLUME_EPSILON);
    }

    #[test]
    #[should_panic(expected = "double allocation")]
    fn test_volume_overclaim_panics() {
        let (mut tracker, id) = tracker_with_barrel(5.0);
        tracker.allocate(id, MaterialId(0), 3.0, EntityId(9));
        tracker.allocate(id, MaterialId(0), 3.0, EntityId(10));
    }

    #[test]
    fn test_commit_transfer_moves_volume_and_claim() {
        let (mut tracker, source) = tracker_with_barrel(5.0);
        let target = EntityId(2);
        tracker.added(LiquidContainerRecord::new(target, 10.0));

        let allocation = tracker.allocate(source, MaterialId(0), 2.0, EntityId(9));
        tracker.commit_transfer(&allocation, target);

        assert!((tracker.get(source).unwrap().volume - 3.0).abs() < VOLUME_EPSILON);
        assert!((tracker.get(target).unwrap().volume - 2.0).abs() < VOLUME_EPSILON);
        assert!(tracker.get(source).unwrap().allocations().is_empty());
    }

    #[test]
    fn test_emptied_container_clears_material() {
        let (mut tracker, id) = tracker_with_barrel(2.0);
        tracker.remove_volume(id, 2.0);
        assert_eq!(tracker.get(id).unwrap().material, None);
    }
}
