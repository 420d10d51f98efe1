//! Error taxonomy for the kash kernel.
//!
//! None of these end the session. The kernel collects them as diagnostics on
//! the per-line [`Outcome`](crate::kernel::Outcome) and the front end prints
//! each one as a single line prefixed with the interpreter's name.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for kernel operations.
pub type ShellResult<T> = Result<T, ShellError>;

/// Recoverable failures observed while resolving or running a line.
#[derive(Debug, Error)]
pub enum ShellError {
    /// No executable with this name could be resolved.
    #[error("{0}: command not found")]
    CommandNotFound(String),

    /// The executable exists but the OS refused to start it.
    #[error("{command}: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    /// `cd` could not enter the requested directory.
    #[error("cd: {path}: {reason}")]
    DirectoryChangeFailed { path: String, reason: String },

    /// A pipe between two stages could not be allocated.
    #[error("pipe: {0}")]
    PipeCreationFailed(#[source] io::Error),

    /// The redirection target could not be created or opened.
    #[error("{}: {source}", path.display())]
    FileOpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A `!` reference did not match any retained history entry.
    #[error("{0}: event not found")]
    HistoryReferenceNotFound(String),

    /// A child terminated that no background job was tracking.
    #[error("untracked child {0} terminated")]
    UntrackedTermination(u32),

    /// Waiting on a foreground stage failed.
    #[error("{command}: failed to wait: {source}")]
    WaitFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The background job table reached its ceiling.
    #[error("too many background jobs (limit {0})")]
    JobTableFull(usize),
}

impl ShellError {
    /// Whether the front end should show this diagnostic to the user.
    ///
    /// Unresolved history references and untracked terminations are
    /// recovered silently.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            ShellError::HistoryReferenceNotFound(_) | ShellError::UntrackedTermination(_)
        )
    }
}
