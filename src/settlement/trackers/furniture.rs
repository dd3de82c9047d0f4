//! Furniture tracker

use std::collections::HashMap;

use crate::settlement::dictionaries::{FurnitureTypeDictionary, FurnitureTypeId};
use crate::settlement::types::{EntityId, TileCoord};

/// Whether a piece of furniture can accept a new assignment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FurnitureState {
    Available,
    Assigned,
}

/// A tracked furniture instance
#[derive(Clone, Debug)]
pub struct FurnitureRecord {
    pub id: EntityId,
    pub furniture_type: FurnitureTypeId,
    pub location: TileCoord,
    /// Adjacent tile a worker stands on to use the furniture
    pub workspace: TileCoord,
    pub state: FurnitureState,
    pub assigned_to: Option<EntityId>,
    pub deconstructing: bool,
}

impl FurnitureRecord {
    pub fn new(
        id: EntityId,
        furniture_type: FurnitureTypeId,
        location: TileCoord,
        workspace: TileCoord,
    ) -> Self {
        FurnitureRecord {
            id,
            furniture_type,
            location,
            workspace,
            state: FurnitureState::Available,
            assigned_to: None,
            deconstructing: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.state == FurnitureState::Available && !self.deconstructing
    }
}

/// Index over all live furniture
#[derive(Clone, Debug, Default)]
pub struct FurnitureTracker {
    furniture: HashMap<EntityId, FurnitureRecord>,
}

impl FurnitureTracker {
    pub fn new() -> Self {
        FurnitureTracker::default()
    }

    pub fn added(&mut self, record: FurnitureRecord) {
        self.furniture.insert(record.id, record);
    }

    pub fn removed(&mut self, id: EntityId) -> Option<FurnitureRecord> {
        self.furniture.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&FurnitureRecord> {
        self.furniture.get(&id)
    }

    /// All tracked furniture ids, ascending (snapshot)
    pub fn furniture_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.furniture.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Furniture whose type carries a tag, ascending by id (snapshot)
    pub fn find_by_tag(
        &self,
        dictionary: &FurnitureTypeDictionary,
        tag: &str,
        unassigned_only: bool,
    ) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .furniture
            .values()
            .filter(|f| dictionary.has_tag(f.furniture_type, tag))
            .filter(|f| !unassigned_only || f.is_available())
            .map(|f| f.id)
            .collect();
        ids.sort();
        ids
    }

    /// Furniture of one type, ascending by id (snapshot)
    pub fn find_by_type(&self, furniture_type: FurnitureTypeId) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .furniture
            .values()
            .filter(|f| f.furniture_type == furniture_type)
            .map(|f| f.id)
            .collect();
        ids.sort();
        ids
    }

    /// Reserve furniture for an entity. Reserving non-available furniture
    /// is a programming error.
    pub fn assign(&mut self, id: EntityId, entity: EntityId) {
        let record = self
            .furniture
            .get_mut(&id)
            .unwrap_or_else(|| panic!("assignment against untracked {}", id));
        assert!(
            record.is_available(),
            "assignment against non-available {}",
            id
        );
        record.state = FurnitureState::Assigned;
        record.assigned_to = Some(entity);
    }

    /// Drop a reservation, flipping the furniture back to available
    pub fn clear_assignment(&mut self, id: EntityId) {
        if let Some(record) = self.furniture.get_mut(&id) {
            record.state = FurnitureState::Available;
            record.assigned_to = None;
        }
    }

    pub fn set_deconstructing(&mut self, id: EntityId, deconstructing: bool) {
        if let Some(record) = self.furniture.get_mut(&id) {
            record.deconstructing = deconstructing;
        }
    }

    pub fn reset(&mut self) {
        self.furniture.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::dictionaries::FurnitureTypeDef;

    fn grave_dictionary() -> (FurnitureTypeDictionary, FurnitureTypeId) {
        let mut dictionary = FurnitureTypeDictionary::default();
        let id = dictionary.add(FurnitureTypeDef {
            name: "sarcophagus".to_string(),
            tags: vec!["grave".to_string()],
        });
        (dictionary, id)
    }

    #[test]
    fn test_find_by_tag_honors_availability() {
        let (dictionary, type_id) = grave_dictionary();
        let mut tracker = FurnitureTracker::new();
        tracker.added(FurnitureRecord::new(
            EntityId(1),
            type_id,
            TileCoord::new(2, 2),
            TileCoord::new(2, 3),
        ));
        tracker.added(FurnitureRecord::new(
            EntityId(2),
            type_id,
            TileCoord::new(4, 2),
            TileCoord::new(4, 3),
        ));

        tracker.assign(EntityId(1), EntityId(7));
        assert_eq!(
            tracker.find_by_tag(&dictionary, "grave", true),
            vec![EntityId(2)]
        );
        assert_eq!(tracker.find_by_tag(&dictionary, "grave", false).len(), 2);
    }

    #[test]
    fn test_deconstructing_is_not_available() {
        let (dictionary, type_id) = grave_dictionary();
        let mut tracker = FurnitureTracker::new();
        tracker.added(FurnitureRecord::new(
            EntityId(1),
            type_id,
            TileCoord::new(2, 2),
            TileCoord::new(2, 3),
        ));
        tracker.set_deconstructing(EntityId(1), true);
        assert!(tracker.find_by_tag(&dictionary, "grave", true).is_empty());
    }

    #[test]
    #[should_panic(expected = "non-available")]
    fn test_double_assignment_panics() {
        let (_, type_id) = grave_dictionary();
        let mut tracker = FurnitureTracker::new();
        tracker.added(FurnitureRecord::new(
            EntityId(1),
            type_id,
            TileCoord::new(2, 2),
            TileCoord::new(2, 3),
        ));
        tracker.assign(EntityId(1), EntityId(7));
        tracker.assign(EntityId(1), EntityId(8));
    }
}
