//! Terminal-transition handling
//!
//! One listener per terminal notification kind. Retiring a job enforces
//! terminal monotonicity, removes the job from the store, and returns every
//! claim it owned to the unallocated pool in the same tick.

use crate::settlement::allocation::HauledEntityKind;
use crate::settlement::jobs::job::JobState;
use crate::settlement::messages::{Message, MessageBus, MessageKind};
use crate::settlement::session::SettlementState;
use crate::settlement::types::JobId;

/// Register the lifecycle listeners. Must run before any listener that
/// reacts to the same notifications, so rooms observe post-release state.
pub fn register(bus: &MessageBus) {
    bus.subscribe(MessageKind::JobCompleted, |_, state, message| {
        let Message::JobCompleted { job_id } = message else {
            panic!("job lifecycle listener received unexpected message");
        };
        retire(state, *job_id, JobState::Completed);
    });
    bus.subscribe(MessageKind::JobCancelled, |_, state, message| {
        let Message::JobCancelled { job_id } = message else {
            panic!("job lifecycle listener received unexpected message");
        };
        retire(state, *job_id, JobState::Cancelled);
    });
    bus.subscribe(MessageKind::JobRemoved, |_, state, message| {
        let Message::JobRemoved { job_id } = message else {
            panic!("job lifecycle listener received unexpected message");
        };
        retire(state, *job_id, JobState::Removed);
    });
}

fn retire(state: &mut SettlementState, job_id: JobId, terminal: JobState) {
    let Some(mut job) = state.jobs.remove(job_id) else {
        // A stale notification for a job another component already retired.
        log::warn!("terminal notification {} for unknown {}", terminal.name(), job_id);
        return;
    };
    job.transition_to(terminal);

    if let Some(hauling) = job.hauling_allocation.take() {
        if let Some(allocation) = hauling.item_allocation {
            match hauling.hauled_entity_kind {
                HauledEntityKind::ItemStack => state.items.release(&allocation),
                HauledEntityKind::Creature => state.creatures.release(&allocation),
            }
        }
    }
    if let Some(allocation) = job.liquid_allocation.take() {
        state.liquids.release(&allocation);
    }
    log::debug!("{} retired as {}", job_id, terminal.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::allocation::{AllocationPurpose, HaulingAllocation, PositionKind};
    use crate::settlement::dictionaries::{ItemTypeId, JobTypeId, MaterialId};
    use crate::settlement::test_support::{empty_state, spawn_stack};
    use crate::settlement::types::{EntityId, TileCoord};

    #[test]
    fn test_completion_releases_item_claim() {
        let bus = MessageBus::new();
        let mut state = empty_state();
        register(&bus);

        let item = spawn_stack(&mut state, ItemTypeId(0), MaterialId(0), 5, TileCoord::new(1, 1));
        let allocation =
            state
                .items
                .allocate(item, 3, AllocationPurpose::DueToBeHauled, EntityId(99));
        assert_eq!(state.items.num_unallocated(item), 2);

        let job_id = {
            let job = state.jobs.create(JobTypeId(0), TileCoord::new(1, 1));
            job.hauling_allocation = Some(HaulingAllocation {
                source_position: TileCoord::new(1, 1),
                source_kind: PositionKind::Floor,
                source_container: None,
                target_position: TileCoord::new(2, 2),
                target_kind: PositionKind::Floor,
                target_id: None,
                hauled_entity: item,
                hauled_entity_kind: HauledEntityKind::ItemStack,
                hauled_item_type: Some(ItemTypeId(0)),
                item_allocation: Some(allocation),
            });
            job.id
        };

        bus.publish(&mut state, Message::JobCompleted { job_id });
        assert!(state.jobs.get(job_id).is_none());
        assert_eq!(state.items.num_unallocated(item), 5);
    }

    #[test]
    fn test_stale_notification_is_ignored() {
        let bus = MessageBus::new();
        let mut state = empty_state();
        register(&bus);

        bus.publish(&mut state, Message::JobCancelled { job_id: JobId(42) });
        assert!(state.jobs.is_empty());
    }
}
