//! Signal dispatcher.
//!
//! SIGCHLD and SIGINT are received on tokio tasks, never in a raw signal
//! handler. On SIGCHLD the child task polls the [`WatchList`] of background
//! pids and enqueues one timestamped event per pid that terminated. The
//! kernel drains that channel and does all job-table and history mutation
//! itself, on the main thread.
//!
//! Only watched pids are ever waited on here. Foreground children stay with
//! the engine's own blocking wait.

use std::collections::BTreeSet;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tokio::runtime::Handle;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Events delivered from the dispatcher to the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellEvent {
    /// Watched process `pid` terminated and was collected at `at`.
    ChildExited { pid: u32, at: Instant },
    /// The user pressed the interrupt key.
    Interrupt,
}

/// Shared "a foreground pipeline is running" flag.
#[derive(Debug, Clone, Default)]
pub struct ForegroundFlag(Arc<AtomicBool>);

impl ForegroundFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Raise the flag until the returned guard is dropped.
    pub fn raise(&self) -> ForegroundGuard {
        self.0.store(true, Ordering::SeqCst);
        ForegroundGuard(Arc::clone(&self.0))
    }
}

/// Lowers the foreground flag on drop.
#[must_use = "the flag drops back as soon as the guard does"]
#[derive(Debug)]
pub struct ForegroundGuard(Arc<AtomicBool>);

impl Drop for ForegroundGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Background pids still waiting to be collected.
///
/// Shared between the job table, which adds pids, and the dispatcher, which
/// removes them once `waitpid` reports them gone.
#[derive(Debug, Clone, Default)]
pub struct WatchList(Arc<Mutex<BTreeSet<u32>>>);

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<u32>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, pid: u32) {
        self.lock().insert(pid);
    }

    pub fn remove(&self, pid: u32) -> bool {
        self.lock().remove(&pid)
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.lock().contains(&pid)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Watched pids in ascending order.
    pub fn pids(&self) -> Vec<u32> {
        self.lock().iter().copied().collect()
    }

    /// Poll every watched pid without blocking.
    ///
    /// Terminated pids leave the list and are handed to `on_exit` while the
    /// lock is still held, so a pid is reported exactly once.
    pub fn collect_terminated(&self, mut on_exit: impl FnMut(u32)) {
        let mut pids = self.lock();
        let gone: Vec<u32> = pids.iter().copied().filter(|&pid| has_terminated(pid)).collect();
        for pid in gone {
            pids.remove(&pid);
            on_exit(pid);
        }
    }
}

fn has_terminated(pid: u32) -> bool {
    match waitpid(Pid::from_raw(pid as i32), Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => true,
        Ok(_) => false,
        // Already collected elsewhere.
        Err(Errno::ECHILD) => true,
        Err(e) => {
            tracing::warn!(pid, "waitpid failed: {e}");
            false
        }
    }
}

/// Callback that redraws the prompt after an interrupt at an idle prompt.
pub type PromptRefresh = Arc<dyn Fn() + Send + Sync>;

/// Running signal listeners. Dropping the dispatcher stops them.
pub struct SignalDispatcher {
    tasks: Vec<JoinHandle<()>>,
}

impl SignalDispatcher {
    /// Install SIGCHLD and SIGINT listeners on `handle`'s runtime.
    ///
    /// Child exits are matched against `watched`. Once installed, SIGINT no longer terminates the interpreter. Spawned
    /// children get default dispositions back on exec.
    pub fn install(
        handle: &Handle,
        events: UnboundedSender<ShellEvent>,
        watched: WatchList,
        foreground: ForegroundFlag,
        refresh: PromptRefresh,
    ) -> io::Result<Self> {
        let _enter = handle.enter();
        let mut child = signal(SignalKind::child())?;
        let mut interrupt = signal(SignalKind::interrupt())?;

        let child_events = events.clone();
        let child_task = handle.spawn(async move {
            while child.recv().await.is_some() {
                let at = Instant::now();
                let mut closed = false;
                watched.collect_terminated(|pid| {
                    closed |= child_events.send(ShellEvent::ChildExited { pid, at }).is_err();
                });
                if closed {
                    break;
                }
            }
        });

        let interrupt_task = handle.spawn(async move {
            while interrupt.recv().await.is_some() {
                eprintln!();
                if !foreground.is_set() {
                    refresh();
                }
                if events.send(ShellEvent::Interrupt).is_err() {
                    break;
                }
            }
        });

        tracing::debug!("signal dispatcher installed");
        Ok(Self {
            tasks: vec![child_task, interrupt_task],
        })
    }
}

impl Drop for SignalDispatcher {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl std::fmt::Debug for SignalDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalDispatcher")
            .field("tasks", &self.tasks.len())
            .finish()
    }
}
