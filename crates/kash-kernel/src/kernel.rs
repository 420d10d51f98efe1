//! The Kernel: kash's interpreter state and line executor.
//!
//! The kernel owns everything one interpreter session mutates: the working
//! directory, the history store, the background job table, the foreground
//! flag and the receiving end of the signal event channel.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                          Kernel                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐  │
//! │  │ HistoryStore │  │   JobTable   │  │ cwd / Identity │  │
//! │  └──────────────┘  └──────────────┘  └────────────────┘  │
//! │                                                          │
//! │  execute(line): drain → tokenize → expand → build → run  │
//! │  drain_events(): reap jobs, finalize history entries     │
//! └──────────────────────────────────────────────────────────┘
//!                             ▲
//!                             │ ShellEvent channel
//!                     ┌───────┴──────────┐
//!                     │ SignalDispatcher │
//!                     └──────────────────┘
//! ```
//!
//! Nothing here is shared across threads. The dispatcher only holds a
//! sender and a clone of the foreground flag.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::builtins::{self, Builtin, JobListing};
use crate::error::ShellError;
use crate::exec::{self, ExecContext, Launch};
use crate::expand::expand_line;
use crate::history::{HistoryEntry, HistoryStore, PendingEntry, DEFAULT_HISTORY_CAPACITY};
use crate::identity::Identity;
use crate::jobs::{JobTable, DEFAULT_JOB_CAPACITY};
use crate::lexer::tokenize;
use crate::pipeline::Pipeline;
use crate::signal::{ForegroundFlag, ShellEvent, WatchList};

/// Default number of consecutive end-of-input events an interactive session
/// ignores before leaving.
pub const DEFAULT_IGNORE_EOF: u32 = 10;

/// Configuration for kernel initialization.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Name used as the diagnostic prefix.
    pub name: String,

    /// Initial working directory.
    pub cwd: PathBuf,

    /// Retained history entries.
    pub history_capacity: usize,

    /// Ceiling on concurrently tracked background jobs.
    pub job_capacity: usize,

    /// Whether a prompt is shown and end-of-input is tolerated.
    pub interactive: bool,

    /// Consecutive end-of-input events tolerated when interactive.
    pub ignore_eof: u32,
}

fn default_cwd() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"))
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            name: "kash".to_string(),
            cwd: default_cwd(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            job_capacity: DEFAULT_JOB_CAPACITY,
            interactive: false,
            ignore_eof: DEFAULT_IGNORE_EOF,
        }
    }
}

impl KernelConfig {
    /// Config for a terminal session.
    pub fn interactive() -> Self {
        Self {
            interactive: true,
            ..Self::default()
        }
    }

    /// Config for scripts, `-c` and piped input.
    pub fn batch() -> Self {
        Self::default()
    }

    /// Set the diagnostic prefix.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the initial working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_job_capacity(mut self, capacity: usize) -> Self {
        self.job_capacity = capacity;
        self
    }

    pub fn with_ignore_eof(mut self, count: u32) -> Self {
        self.ignore_eof = count;
        self
    }
}

/// What a line turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeKind {
    /// Blank, comment-only or operator-only line. Nothing logged.
    Empty,
    /// A foreground pipeline ran to completion.
    Foreground { id: u64, status: i32 },
    /// A background pipeline was launched.
    Background { id: u64, pid: Option<u32> },
    /// A background pipeline was refused.
    Rejected,
    /// `cd` ran, successfully or not.
    Cd { id: u64 },
    /// `history`: entries as they stood before this line was logged.
    History { id: u64, entries: Vec<HistoryEntry> },
    /// `jobs`: running jobs as they stood before this line was logged.
    Jobs { id: u64, listings: Vec<JobListing> },
    /// `exit`. Not logged.
    Exit,
}

/// Result of executing one line.
#[derive(Debug)]
pub struct Outcome {
    pub kind: OutcomeKind,
    /// Recovered errors, in the order they occurred.
    pub diagnostics: Vec<ShellError>,
}

impl Outcome {
    fn new(kind: OutcomeKind, diagnostics: Vec<ShellError>) -> Self {
        Self { kind, diagnostics }
    }

    pub fn is_exit(&self) -> bool {
        matches!(self.kind, OutcomeKind::Exit)
    }

    /// Exit status for the line: the last foreground stage's status, 1 for
    /// a failed `cd` or refused launch, otherwise 0.
    pub fn status(&self) -> i32 {
        match &self.kind {
            OutcomeKind::Foreground { status, .. } => *status,
            OutcomeKind::Rejected => 1,
            OutcomeKind::Cd { .. } if !self.diagnostics.is_empty() => 1,
            _ => 0,
        }
    }

    /// Diagnostics the user should see.
    pub fn visible_diagnostics(&self) -> impl Iterator<Item = &ShellError> {
        self.diagnostics.iter().filter(|d| !d.is_silent())
    }
}

/// What a drain of the event channel did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    /// History ids of reaped background jobs.
    pub reaped: Vec<u64>,
    /// Interrupts seen since the last drain.
    pub interrupts: usize,
}

/// Interpreter state for one session.
pub struct Kernel {
    config: KernelConfig,
    identity: Identity,
    cwd: PathBuf,
    history: HistoryStore,
    jobs: JobTable,
    foreground: ForegroundFlag,
    events_tx: UnboundedSender<ShellEvent>,
    events_rx: UnboundedReceiver<ShellEvent>,
}

impl Kernel {
    /// Create a kernel with the given configuration and identity.
    pub fn new(config: KernelConfig, identity: Identity) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            cwd: config.cwd.clone(),
            history: HistoryStore::new(config.history_capacity),
            jobs: JobTable::new(config.job_capacity),
            foreground: ForegroundFlag::new(),
            config,
            identity,
            events_tx,
            events_rx,
        }
    }

    /// Create a kernel for a batch session with a detected identity.
    pub fn transient() -> Self {
        Self::new(KernelConfig::batch(), Identity::detect())
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn jobs(&self) -> &JobTable {
        &self.jobs
    }

    /// Number of history ids issued so far, shown in the prompt.
    pub fn line_count(&self) -> u64 {
        self.history.issued()
    }

    /// Sender for the signal dispatcher.
    pub fn event_sender(&self) -> UnboundedSender<ShellEvent> {
        self.events_tx.clone()
    }

    /// Foreground flag shared with the signal dispatcher.
    pub fn foreground_flag(&self) -> ForegroundFlag {
        self.foreground.clone()
    }

    /// Background pids shared with the signal dispatcher.
    pub fn watch_list(&self) -> WatchList {
        self.jobs.watch_list()
    }

    /// Process queued signal events.
    ///
    /// Each child-exit event names the pid the dispatcher collected and when.
    /// A tracked job is reaped and its history entry finalized with the time
    /// from its launch to that event. Watched pids the dispatcher has not
    /// reported (it may not be installed, or the child exited before it was
    /// watched) are polled here and stamped with the current time.
    pub fn drain_events(&mut self) -> DrainReport {
        let mut report = DrainReport::default();
        let mut exits: Vec<(u32, Instant)> = Vec::new();

        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                ShellEvent::ChildExited { pid, at } => exits.push((pid, at)),
                ShellEvent::Interrupt => report.interrupts += 1,
            }
        }

        let now = Instant::now();
        self.jobs.watch_list().collect_terminated(|pid| exits.push((pid, now)));

        for (pid, at) in exits {
            match self.jobs.reap(pid) {
                Some(job) => {
                    let run_time = at.saturating_duration_since(job.started);
                    if !self.history.finalize_run_time(job.history_id, run_time) {
                        tracing::debug!(pid, id = job.history_id, "reaped job with evicted entry");
                    }
                    tracing::debug!(pid, id = job.history_id, ?run_time, "reaped background job");
                    report.reaped.push(job.history_id);
                }
                None => {
                    tracing::debug!(err = %ShellError::UntrackedTermination(pid), "ignored");
                }
            }
        }

        report
    }

    /// Execute one input line.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn execute(&mut self, line: &str) -> Outcome {
        // Jobs that ended while the line was being typed must not be listed.
        self.drain_events();

        let seq = tokenize(line);
        if seq.is_empty() {
            return Outcome::new(OutcomeKind::Empty, Vec::new());
        }

        let (seq, miss) = expand_line(seq, &self.history);
        let mut diagnostics: Vec<ShellError> = miss.into_iter().collect();

        let pipeline = Pipeline::build(&seq.tokens());
        if pipeline.is_empty() {
            return Outcome::new(OutcomeKind::Empty, diagnostics);
        }
        let entry = PendingEntry::now(seq.source());

        if let Some(builtin) = pipeline.sole_program().and_then(Builtin::lookup) {
            let kind = self.execute_builtin(builtin, &pipeline, entry, &mut diagnostics);
            return Outcome::new(kind, diagnostics);
        }

        let report = {
            let mut ctx = ExecContext {
                cwd: &self.cwd,
                history: &mut self.history,
                jobs: &mut self.jobs,
                foreground: &self.foreground,
            };
            exec::run(&pipeline, entry, &mut ctx)
        };
        diagnostics.extend(report.diagnostics);
        self.drain_events();

        let kind = match report.launch {
            Launch::Foreground { id, status } => OutcomeKind::Foreground { id, status },
            Launch::Background { id, pid } => OutcomeKind::Background { id, pid },
            Launch::Rejected => OutcomeKind::Rejected,
        };
        Outcome::new(kind, diagnostics)
    }

    fn execute_builtin(
        &mut self,
        builtin: Builtin,
        pipeline: &Pipeline,
        entry: PendingEntry,
        diagnostics: &mut Vec<ShellError>,
    ) -> OutcomeKind {
        tracing::debug!(builtin = builtin.name(), "running builtin");
        let started = Instant::now();

        let kind = match builtin {
            Builtin::Exit => return OutcomeKind::Exit,
            Builtin::Cd => {
                let arg = pipeline.stages[0].args().first().map(String::as_str);
                match builtins::change_directory(&self.cwd, arg, &self.identity.home) {
                    Ok(dir) => self.cwd = dir,
                    Err(e) => diagnostics.push(e),
                }
                let id = self.history.append(entry);
                OutcomeKind::Cd { id }
            }
            Builtin::Jobs => {
                let listings = builtins::job_listings(&self.jobs, &self.history);
                let id = self.history.append(entry);
                OutcomeKind::Jobs { id, listings }
            }
            Builtin::History => {
                let entries = self.history.snapshot();
                let id = self.history.append(entry);
                OutcomeKind::History { id, entries }
            }
        };

        if let OutcomeKind::Cd { id } | OutcomeKind::Jobs { id, .. } | OutcomeKind::History { id, .. } =
            &kind
        {
            self.history.finalize_run_time(*id, started.elapsed());
        }
        kind
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("name", &self.config.name)
            .field("cwd", &self.cwd)
            .field("history", &self.history.len())
            .field("jobs", &self.jobs.len())
            .finish()
    }
}
