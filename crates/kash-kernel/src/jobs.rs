//! Background job table.
//!
//! Maps the process id of a background pipeline's last stage to the history
//! entry it belongs to. The mapping stores an id rather than a reference
//! because the entry may be evicted before the job is reaped.
//!
//! Every background pid, including earlier stages of a pipeline, goes on the
//! [`WatchList`] shared with the signal dispatcher. Earlier stages are
//! stragglers: they are collected when they exit but never listed.

use std::time::Instant;

use crate::error::{ShellError, ShellResult};
use crate::signal::WatchList;

/// Default ceiling on concurrently tracked jobs.
pub const DEFAULT_JOB_CAPACITY: usize = 1000;

/// A running background pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundJob {
    /// OS process id of the pipeline's last stage.
    pub pid: u32,
    /// Id of the history entry logged for the pipeline.
    pub history_id: u64,
    /// When the pipeline was spawned.
    pub started: Instant,
}

/// Background jobs in launch order.
#[derive(Debug)]
pub struct JobTable {
    jobs: Vec<BackgroundJob>,
    watched: WatchList,
    capacity: usize,
}

impl JobTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            jobs: Vec::new(),
            watched: WatchList::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.jobs.len() >= self.capacity
    }

    /// Track `pid` as a job started now.
    pub fn track(&mut self, pid: u32, history_id: u64) -> ShellResult<()> {
        self.track_since(pid, history_id, Instant::now())
    }

    /// Track `pid` as a job started at `started`.
    pub fn track_since(&mut self, pid: u32, history_id: u64, started: Instant) -> ShellResult<()> {
        if self.is_full() {
            return Err(ShellError::JobTableFull(self.capacity));
        }
        tracing::debug!(pid, history_id, "tracking background job");
        self.watched.insert(pid);
        self.jobs.push(BackgroundJob {
            pid,
            history_id,
            started,
        });
        Ok(())
    }

    /// Watch a non-final stage of a background pipeline so it gets collected.
    pub fn adopt(&mut self, pid: u32) {
        self.watched.insert(pid);
    }

    /// Remove and return the job for `pid`.
    pub fn reap(&mut self, pid: u32) -> Option<BackgroundJob> {
        self.watched.remove(pid);
        let idx = self.jobs.iter().position(|j| j.pid == pid)?;
        Some(self.jobs.remove(idx))
    }

    pub fn is_tracked(&self, pid: u32) -> bool {
        self.jobs.iter().any(|j| j.pid == pid)
    }

    /// `(pid, history_id)` pairs in launch order.
    pub fn list(&self) -> Vec<(u32, u64)> {
        self.jobs.iter().map(|j| (j.pid, j.history_id)).collect()
    }

    /// Every pid that has not been collected yet, in ascending order.
    pub fn watched(&self) -> Vec<u32> {
        self.watched.pids()
    }

    /// Handle on the watch list for the signal dispatcher.
    pub fn watch_list(&self) -> WatchList {
        self.watched.clone()
    }
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new(DEFAULT_JOB_CAPACITY)
    }
}
