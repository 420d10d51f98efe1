//! kash-kernel: the core of the kash command interpreter.
//!
//! This crate provides:
//!
//! - **Lexer**: Tokenizes input lines using logos
//! - **History**: Bounded, FIFO-evicting command log with session-wide ids
//! - **Expand**: `!!`, `!n` and `!prefix` history references
//! - **Pipeline**: Stages, output redirection and the background marker
//! - **Exec**: Spawns and wires pipeline stages, waits on the foreground
//! - **Jobs**: Background job table
//! - **Signal**: SIGCHLD/SIGINT dispatcher feeding the kernel's event channel
//! - **Builtins**: `cd`, `jobs`, `history`, `exit`
//! - **Kernel**: Session state tying the above together

pub mod builtins;
pub mod error;
pub mod exec;
pub mod expand;
pub mod history;
pub mod identity;
pub mod jobs;
pub mod kernel;
pub mod lexer;
pub mod paths;
pub mod pipeline;
pub mod signal;

pub use builtins::JobListing;
pub use error::{ShellError, ShellResult};
pub use history::{HistoryEntry, HistoryStore, RunTime};
pub use identity::Identity;
pub use kernel::{DrainReport, Kernel, KernelConfig, Outcome, OutcomeKind};
pub use signal::{ForegroundFlag, PromptRefresh, ShellEvent, SignalDispatcher, WatchList};

// Path helpers for front ends
pub use paths::{contract_home, expand_tilde, home_dir};
