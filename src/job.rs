//! Job bookkeeping: one record per launched pipeline, in a bounded table.
//!
//! The table is pure data. It is owned by the shell driver and handed to
//! the engine by reference, so every test can run against a fresh one.
//! All mutation happens on the main control path; signal handlers never
//! touch it.

use nix::unistd::Pid;

/// Upper bound on simultaneously tracked jobs.
pub const MAX_JOBS: usize = 16;

/// Whether the shell blocks on the job or returns to the prompt.
/// Fixed at creation; there is no fg/bg promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Foreground,
    Background,
}

/// One launched pipeline: its process group and the members still alive.
#[derive(Debug)]
pub struct Job {
    job_id: u32,
    pgid: Pid,
    /// Fixed slots with explicit live bits: a reaped member goes `None`
    /// in place, members never shift.
    members: Vec<Option<Pid>>,
    added: usize,
    remaining: usize,
    state: JobState,
}

impl Job {
    pub fn job_id(&self) -> u32 {
        self.job_id
    }

    pub fn pgid(&self) -> Pid {
        self.pgid
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Process count fixed at creation: 1 for a simple command, N for an
    /// N-stage pipeline.
    pub fn total_processes(&self) -> usize {
        self.members.len()
    }

    /// Members not yet reaped. The job is deletable exactly when this
    /// reaches zero.
    pub fn remaining_processes(&self) -> usize {
        self.remaining
    }

    pub fn has_pid(&self, pid: Pid) -> bool {
        self.members.contains(&Some(pid))
    }

    /// Live member PIDs, in registration order.
    pub fn pids(&self) -> Vec<Pid> {
        self.members.iter().flatten().copied().collect()
    }

    /// Record a member; fails once `total_processes` have been added.
    pub fn add_pid(&mut self, pid: Pid) -> bool {
        if self.added == self.members.len() {
            return false;
        }
        self.members[self.added] = Some(pid);
        self.added += 1;
        self.remaining += 1;
        true
    }

    /// Drop a reaped member; fails when `pid` is not a live member.
    pub fn remove_pid(&mut self, pid: Pid) -> bool {
        match self.members.iter_mut().find(|slot| **slot == Some(pid)) {
            Some(slot) => {
                *slot = None;
                self.remaining -= 1;
                true
            }
            None => false,
        }
    }
}

/// Bounded collection of live jobs.
#[derive(Debug)]
pub struct JobTable {
    jobs: Vec<Job>,
    next_job_id: u32,
}

impl JobTable {
    pub fn new() -> Self {
        JobTable {
            jobs: Vec::new(),
            next_job_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Insert a new job, claiming the next id. Ids only grow; an id is
    /// never reissued while any live job holds a larger one. Fails when
    /// the table is at [`MAX_JOBS`].
    pub fn allocate(
        &mut self,
        pgid: Pid,
        total_processes: usize,
        state: JobState,
    ) -> Option<&mut Job> {
        if self.jobs.len() >= MAX_JOBS {
            return None;
        }
        debug_assert!(
            state == JobState::Background || self.find_foreground().is_none(),
            "at most one foreground job"
        );
        self.jobs.push(Job {
            job_id: self.next_job_id,
            pgid,
            members: vec![None; total_processes],
            added: 0,
            remaining: 0,
            state,
        });
        self.next_job_id += 1;
        self.jobs.last_mut()
    }

    /// Remove a job. Returns false when the id is already gone; callers
    /// must tolerate that, since reaping can race an explicit delete.
    pub fn delete(&mut self, job_id: u32) -> bool {
        match self.jobs.iter().position(|j| j.job_id == job_id) {
            Some(idx) => {
                self.jobs.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn find_by_id(&self, job_id: u32) -> Option<&Job> {
        self.jobs.iter().find(|j| j.job_id == job_id)
    }

    pub fn find_by_id_mut(&mut self, job_id: u32) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.job_id == job_id)
    }

    pub fn find_by_pid(&self, pid: Pid) -> Option<&Job> {
        self.jobs.iter().find(|j| j.has_pid(pid))
    }

    pub fn find_by_pid_mut(&mut self, pid: Pid) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.has_pid(pid))
    }

    /// At most one job can be foreground at any time.
    pub fn find_foreground(&self) -> Option<&Job> {
        self.jobs.iter().find(|j| j.state == JobState::Foreground)
    }
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(raw: i32) -> Pid {
        Pid::from_raw(raw)
    }

    #[test]
    fn allocate_caps_at_max_jobs() {
        let mut table = JobTable::new();
        for i in 0..MAX_JOBS {
            assert!(table
                .allocate(pid(100 + i as i32), 1, JobState::Background)
                .is_some());
        }
        assert_eq!(table.len(), MAX_JOBS);
        assert!(table.allocate(pid(999), 1, JobState::Background).is_none());
    }

    #[test]
    fn ids_grow_and_are_never_reissued() {
        let mut table = JobTable::new();
        let a = table.allocate(pid(10), 1, JobState::Background).unwrap().job_id();
        let b = table.allocate(pid(20), 1, JobState::Background).unwrap().job_id();
        assert_eq!((a, b), (1, 2));

        assert!(table.delete(a));
        let c = table.allocate(pid(30), 1, JobState::Background).unwrap().job_id();
        assert_eq!(c, 3);

        let live: Vec<u32> = [b, c]
            .iter()
            .filter_map(|&id| table.find_by_id(id).map(|j| j.job_id()))
            .collect();
        assert_eq!(live, vec![2, 3]);
    }

    #[test]
    fn add_pid_respects_capacity() {
        let mut table = JobTable::new();
        let job = table.allocate(pid(10), 2, JobState::Background).unwrap();
        assert!(job.add_pid(pid(10)));
        assert!(job.add_pid(pid(11)));
        assert!(!job.add_pid(pid(12)));
        assert_eq!(job.remaining_processes(), 2);
        assert_eq!(job.total_processes(), 2);
    }

    #[test]
    fn remove_pid_clears_the_slot_once() {
        let mut table = JobTable::new();
        let job = table.allocate(pid(10), 2, JobState::Background).unwrap();
        job.add_pid(pid(10));
        job.add_pid(pid(11));

        assert!(job.remove_pid(pid(11)));
        assert_eq!(job.remaining_processes(), 1);
        assert!(!job.remove_pid(pid(11)));
        assert!(!job.remove_pid(pid(42)));
        assert_eq!(job.pids(), vec![pid(10)]);

        assert!(job.remove_pid(pid(10)));
        assert_eq!(job.remaining_processes(), 0);
    }

    #[test]
    fn delete_is_silently_idempotent() {
        let mut table = JobTable::new();
        let id = table.allocate(pid(10), 1, JobState::Background).unwrap().job_id();
        assert!(table.delete(id));
        assert!(!table.delete(id));
        assert!(!table.delete(77));
    }

    #[test]
    fn find_by_pid_spans_jobs() {
        let mut table = JobTable::new();
        {
            let job = table.allocate(pid(10), 1, JobState::Background).unwrap();
            job.add_pid(pid(10));
        }
        {
            let job = table.allocate(pid(20), 2, JobState::Background).unwrap();
            job.add_pid(pid(20));
            job.add_pid(pid(21));
        }
        assert_eq!(table.find_by_pid(pid(21)).unwrap().pgid(), pid(20));
        assert_eq!(table.find_by_pid_mut(pid(20)).unwrap().pgid(), pid(20));
        assert!(table.find_by_pid(pid(99)).is_none());
    }

    #[test]
    fn at_most_one_foreground_job() {
        let mut table = JobTable::new();
        assert!(table.find_foreground().is_none());
        {
            let job = table.allocate(pid(10), 1, JobState::Foreground).unwrap();
            job.add_pid(pid(10));
        }
        table.allocate(pid(20), 1, JobState::Background);
        assert_eq!(table.find_foreground().unwrap().pgid(), pid(10));
    }
}
