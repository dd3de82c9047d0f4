//! Process-wide index of live jobs
//!
//! Queryable by location and by type; backing store for cancellation and
//! duplicate detection. Query methods return id snapshots so callers can
//! mutate or publish while iterating, the house rule the whole core
//! follows.

use std::collections::HashMap;

use crate::settlement::dictionaries::JobTypeId;
use crate::settlement::jobs::job::{Job, JobState};
use crate::settlement::types::{JobId, JobPriority, TileCoord};

/// Index of all live jobs
#[derive(Clone, Debug, Default)]
pub struct JobStore {
    jobs: HashMap<JobId, Job>,
    by_location: HashMap<TileCoord, Vec<JobId>>,
    by_type: HashMap<JobTypeId, Vec<JobId>>,
    next_id: u64,
}

impl JobStore {
    pub fn new() -> Self {
        JobStore::default()
    }

    /// Create a job with the next monotonic id and index it. The caller
    /// fills in optional fields through the returned reference; a job's
    /// location is fixed at creation.
    pub fn create(&mut self, job_type: JobTypeId, location: TileCoord) -> &mut Job {
        let id = JobId(self.next_id);
        self.next_id += 1;
        let job = Job::new(id, job_type, location);
        self.index(&job);
        self.jobs.entry(id).or_insert(job)
    }

    /// Insert a job rebuilt from persisted state, keeping id issuance ahead
    /// of every loaded id.
    pub(crate) fn insert_loaded(&mut self, job: Job) {
        self.next_id = self.next_id.max(job.id.0 + 1);
        self.index(&job);
        self.jobs.insert(job.id, job);
    }

    fn index(&mut self, job: &Job) {
        self.by_location.entry(job.location).or_default().push(job.id);
        self.by_type.entry(job.job_type).or_default().push(job.id);
    }

    /// Remove a job and drop it from both indices
    pub fn remove(&mut self, id: JobId) -> Option<Job> {
        let job = self.jobs.remove(&id)?;
        if let Some(ids) = self.by_location.get_mut(&job.location) {
            ids.retain(|j| *j != id);
            if ids.is_empty() {
                self.by_location.remove(&job.location);
            }
        }
        if let Some(ids) = self.by_type.get_mut(&job.job_type) {
            ids.retain(|j| *j != id);
            if ids.is_empty() {
                self.by_type.remove(&job.job_type);
            }
        }
        Some(job)
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub fn get_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.jobs.get_mut(&id)
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.jobs.contains_key(&id)
    }

    /// Ids of jobs at a tile (snapshot)
    pub fn jobs_at_location(&self, coord: TileCoord) -> Vec<JobId> {
        self.by_location.get(&coord).cloned().unwrap_or_default()
    }

    /// Ids of jobs of a type (snapshot)
    pub fn by_type(&self, job_type: JobTypeId) -> Vec<JobId> {
        self.by_type.get(&job_type).cloned().unwrap_or_default()
    }

    /// All live job ids, ascending (snapshot)
    pub fn job_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.jobs.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Live job ids ordered highest priority first, then oldest first
    pub fn by_priority(&self) -> Vec<JobId> {
        let mut ids = self.job_ids();
        ids.sort_by(|a, b| {
            let pa = self.jobs[a].priority;
            let pb = self.jobs[b].priority;
            pb.cmp(&pa).then(a.cmp(b))
        });
        ids
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Priority is mutable post-creation
    pub fn set_priority(&mut self, id: JobId, priority: JobPriority) {
        if let Some(job) = self.jobs.get_mut(&id) {
            job.priority = priority;
        }
    }

    /// A worker claimed the job. Returns false if the job no longer exists.
    pub fn mark_assigned(&mut self, id: JobId) -> bool {
        match self.jobs.get_mut(&id) {
            Some(job) => {
                job.transition_to(JobState::Assigned);
                true
            }
            None => false,
        }
    }

    /// A worker started executing the job
    pub fn mark_in_progress(&mut self, id: JobId) -> bool {
        match self.jobs.get_mut(&id) {
            Some(job) => {
                job.transition_to(JobState::InProgress);
                true
            }
            None => false,
        }
    }

    /// Drop all jobs and indices (session teardown)
    pub fn reset(&mut self) {
        self.jobs.clear();
        self.by_location.clear();
        self.by_type.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_follow_add_and_remove() {
        let mut store = JobStore::new();
        let coord = TileCoord::new(3, 4);
        let id = store.create(JobTypeId(1), coord).id;

        assert_eq!(store.jobs_at_location(coord), vec![id]);
        assert_eq!(store.by_type(JobTypeId(1)), vec![id]);
        assert!(store.by_type(JobTypeId(2)).is_empty());

        store.remove(id);
        assert!(store.jobs_at_location(coord).is_empty());
        assert!(store.by_type(JobTypeId(1)).is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut store = JobStore::new();
        let a = store.create(JobTypeId(0), TileCoord::new(0, 0)).id;
        let b = store.create(JobTypeId(0), TileCoord::new(1, 0)).id;
        store.remove(a);
        let c = store.create(JobTypeId(0), TileCoord::new(2, 0)).id;
        assert!(b > a);
        assert!(c > b);
    }

    #[test]
    fn test_priority_ordering() {
        let mut store = JobStore::new();
        let a = store.create(JobTypeId(0), TileCoord::new(0, 0)).id;
        let b = store.create(JobTypeId(0), TileCoord::new(1, 0)).id;
        let c = store.create(JobTypeId(0), TileCoord::new(2, 0)).id;
        store.set_priority(b, JobPriority::Highest);
        store.set_priority(c, JobPriority::Low);

        assert_eq!(store.by_priority(), vec![b, a, c]);
    }

    #[test]
    fn test_worker_side_transitions() {
        let mut store = JobStore::new();
        let id = store.create(JobTypeId(0), TileCoord::new(0, 0)).id;
        assert!(store.mark_assigned(id));
        assert!(store.mark_in_progress(id));
        assert!(!store.mark_assigned(JobId(999)));
    }
}
