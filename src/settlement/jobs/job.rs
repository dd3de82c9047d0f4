//! Job record and state machine

use serde::{Deserialize, Serialize};

use crate::settlement::allocation::{HaulingAllocation, LiquidAllocation};
use crate::settlement::dictionaries::{
    FloorTypeId, ItemTypeId, JobTypeId, MaterialId, PlantSpeciesId, ProfessionId, RecipeId,
};
use crate::settlement::types::{EntityId, JobId, JobPriority, TileCoord};

/// Lifecycle state of a job
///
/// Transitions only move forward; the three terminal states are absorbing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// Initial state, published immediately on creation
    Created,
    /// A worker has claimed the job
    Assigned,
    InProgress,
    /// Work finished normally
    Completed,
    /// A worker or allocation chain aborted the job mid-flight
    Cancelled,
    /// World conditions made the job moot; discard bookkeeping
    Removed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Cancelled | JobState::Removed
        )
    }

    fn rank(&self) -> u8 {
        match self {
            JobState::Created => 0,
            JobState::Assigned => 1,
            JobState::InProgress => 2,
            JobState::Completed | JobState::Cancelled | JobState::Removed => 3,
        }
    }

    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            JobState::Created => "Created",
            JobState::Assigned => "Assigned",
            JobState::InProgress => "InProgress",
            JobState::Completed => "Completed",
            JobState::Cancelled => "Cancelled",
            JobState::Removed => "Removed",
        }
    }
}

/// Kind-specific job data, keyed by what the job does
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum JobPayload {
    None,
    Cooking {
        recipe: RecipeId,
    },
    FloorReplacement {
        floor_type: FloorTypeId,
        material: MaterialId,
    },
    Planting {
        species: PlantSpeciesId,
    },
}

impl Default for JobPayload {
    fn default() -> Self {
        JobPayload::None
    }
}

/// A discrete unit of work
///
/// A job with a hauling or liquid claim owns it exclusively until the job
/// reaches a terminal state, at which point the claim must be released.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobTypeId,
    pub priority: JobPriority,
    state: JobState,
    pub location: TileCoord,
    pub secondary_location: Option<TileCoord>,
    pub target_id: Option<EntityId>,
    pub required_profession: Option<ProfessionId>,
    pub required_item_type: Option<ItemTypeId>,
    pub required_item_material: Option<MaterialId>,
    pub hauling_allocation: Option<HaulingAllocation>,
    pub liquid_allocation: Option<LiquidAllocation>,
    pub payload: JobPayload,
}

impl Job {
    pub fn new(id: JobId, job_type: JobTypeId, location: TileCoord) -> Self {
        Job {
            id,
            job_type,
            priority: JobPriority::default(),
            state: JobState::Created,
            location,
            secondary_location: None,
            target_id: None,
            required_profession: None,
            required_item_type: None,
            required_item_material: None,
            hauling_allocation: None,
            liquid_allocation: None,
            payload: JobPayload::None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Advance the state machine. Panics on any backward or
    /// out-of-terminal transition; silently continuing would corrupt the
    /// shared bookkeeping every room relies on.
    pub fn transition_to(&mut self, next: JobState) {
        assert!(
            !self.state.is_terminal(),
            "{} cannot leave terminal state {} (to {})",
            self.id,
            self.state.name(),
            next.name()
        );
        assert!(
            next.rank() > self.state.rank(),
            "{} cannot transition backward from {} to {}",
            self.id,
            self.state.name(),
            next.name()
        );
        self.state = next;
    }

    /// Used by load to restore a persisted state without transition checks
    pub(crate) fn restore_state(&mut self, state: JobState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_job() -> Job {
        Job::new(JobId(1), JobTypeId(0), TileCoord::new(2, 2))
    }

    #[test]
    fn test_forward_transitions() {
        let mut job = test_job();
        assert_eq!(job.state(), JobState::Created);
        job.transition_to(JobState::Assigned);
        job.transition_to(JobState::InProgress);
        job.transition_to(JobState::Completed);
        assert!(job.is_terminal());
    }

    #[test]
    fn test_created_straight_to_terminal() {
        let mut job = test_job();
        job.transition_to(JobState::Removed);
        assert!(job.is_terminal());
    }

    #[test]
    #[should_panic(expected = "terminal state")]
    fn test_no_resurrection_after_terminal() {
        let mut job = test_job();
        job.transition_to(JobState::Cancelled);
        job.transition_to(JobState::Assigned);
    }

    #[test]
    #[should_panic(expected = "backward")]
    fn test_no_backward_transition() {
        let mut job = test_job();
        job.transition_to(JobState::InProgress);
        job.transition_to(JobState::Assigned);
    }
}
