//! Bounded in-memory command history.
//!
//! The store keeps the most recent `capacity` entries and evicts the oldest
//! first. Ids are issued from a session-wide counter that never resets, so a
//! `!n` reference can name an id that has already been evicted.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use chrono::Local;

/// Default number of retained entries.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Wall-clock runtime of a logged command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunTime {
    /// Still running (background job not yet reaped).
    Pending,
    /// Finished after this long.
    Final(Duration),
}

impl RunTime {
    pub fn is_pending(&self) -> bool {
        matches!(self, RunTime::Pending)
    }

    /// Seconds as a float, if final.
    pub fn seconds(&self) -> Option<f64> {
        match self {
            RunTime::Pending => None,
            RunTime::Final(d) => Some(d.as_secs_f64()),
        }
    }
}

impl fmt::Display for RunTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunTime::Pending => write!(f, "-"),
            RunTime::Final(d) => write!(f, "{:.2}", d.as_secs_f64()),
        }
    }
}

/// A command about to be logged: text and wall-clock stamp, no id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub command: String,
    /// Local time of day, `HH:MM`.
    pub timestamp: String,
}

impl PendingEntry {
    /// Stamp `command` with the current local time.
    pub fn now(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timestamp: clock_stamp(),
        }
    }
}

/// Current local time formatted as `HH:MM`.
pub fn clock_stamp() -> String {
    Local::now().format("%H:%M").to_string()
}

/// One logged command.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: u64,
    pub command: String,
    pub timestamp: String,
    pub run_time: RunTime,
}

/// FIFO-evicting history log.
#[derive(Debug)]
pub struct HistoryStore {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
    next_id: u64,
}

impl HistoryStore {
    /// Create a store retaining at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of ids issued this session, evicted ones included.
    pub fn issued(&self) -> u64 {
        self.next_id - 1
    }

    /// Log a command with a pending run time, evicting the oldest entry when
    /// full. Returns the assigned id.
    pub fn append(&mut self, pending: PendingEntry) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        if self.entries.len() == self.capacity
            && let Some(evicted) = self.entries.pop_front()
        {
            tracing::trace!(id = evicted.id, "evicting history entry");
        }

        self.entries.push_back(HistoryEntry {
            id,
            command: pending.command,
            timestamp: pending.timestamp,
            run_time: RunTime::Pending,
        });
        id
    }

    /// The newest entry.
    pub fn most_recent(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// The entry with this id, if still retained.
    pub fn by_id(&self, id: u64) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// The newest entry whose command starts with `prefix`.
    pub fn by_prefix_most_recent(&self, prefix: &str) -> Option<&HistoryEntry> {
        self.entries.iter().rev().find(|e| e.command.starts_with(prefix))
    }

    /// Record the final run time of `id`.
    ///
    /// Returns false if the entry was evicted or already finalized; both
    /// leave the store unchanged.
    pub fn finalize_run_time(&mut self, id: u64, run_time: Duration) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) if entry.run_time.is_pending() => {
                entry.run_time = RunTime::Final(run_time);
                true
            }
            Some(_) => {
                tracing::debug!(id, "history entry already finalized");
                false
            }
            None => false,
        }
    }

    /// Copy of the retained entries, oldest first.
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(cmd: &str) -> PendingEntry {
        PendingEntry {
            command: cmd.to_string(),
            timestamp: "12:00".to_string(),
        }
    }

    #[test]
    fn test_append_assigns_sequential_ids() {
        let mut store = HistoryStore::default();
        assert_eq!(store.append(pending("a")), 1);
        assert_eq!(store.append(pending("b")), 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.issued(), 2);
    }

    #[test]
    fn test_eviction_keeps_most_recent() {
        let mut store = HistoryStore::new(100);
        for i in 1..=250 {
            store.append(pending(&format!("cmd {i}")));
        }
        let ids: Vec<u64> = store.snapshot().iter().map(|e| e.id).collect();
        assert_eq!(ids, (151..=250).collect::<Vec<_>>());
        assert!(store.by_id(150).is_none());
        assert_eq!(store.by_id(151).map(|e| e.command.as_str()), Some("cmd 151"));
        assert_eq!(store.issued(), 250);
    }

    #[test]
    fn test_lookups() {
        let mut store = HistoryStore::default();
        assert!(store.most_recent().is_none());
        store.append(pending("echo one"));
        store.append(pending("ls -l"));
        store.append(pending("echo two"));

        assert_eq!(store.most_recent().unwrap().command, "echo two");
        assert_eq!(store.by_prefix_most_recent("echo").unwrap().id, 3);
        assert_eq!(store.by_prefix_most_recent("ls").unwrap().id, 2);
        assert!(store.by_prefix_most_recent("cat").is_none());
        assert!(store.by_id(0).is_none());
    }

    #[test]
    fn test_finalize_once() {
        let mut store = HistoryStore::default();
        let id = store.append(pending("sleep 1"));
        assert!(store.by_id(id).unwrap().run_time.is_pending());

        assert!(store.finalize_run_time(id, Duration::from_millis(1500)));
        assert_eq!(store.by_id(id).unwrap().run_time, RunTime::Final(Duration::from_millis(1500)));

        // Second finalize is ignored.
        assert!(!store.finalize_run_time(id, Duration::from_secs(9)));
        assert_eq!(store.by_id(id).unwrap().run_time.seconds(), Some(1.5));
    }

    #[test]
    fn test_finalize_evicted_is_noop() {
        let mut store = HistoryStore::new(1);
        let old = store.append(pending("first"));
        store.append(pending("second"));
        assert!(!store.finalize_run_time(old, Duration::from_secs(1)));
    }

    #[test]
    fn test_run_time_display() {
        assert_eq!(RunTime::Pending.to_string(), "-");
        assert_eq!(RunTime::Final(Duration::from_millis(1234)).to_string(), "1.23");
    }

    #[test]
    fn test_clock_stamp_shape() {
        let stamp = clock_stamp();
        assert_eq!(stamp.len(), 5);
        assert_eq!(&stamp[2..3], ":");
    }
}
