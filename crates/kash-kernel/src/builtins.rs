//! Built-in commands handled inside the interpreter.
//!
//! Built-ins are only recognized as the sole stage of a pipeline; `cd | cat`
//! runs whatever `cd` resolves to on the search path.

use std::io;
use std::path::{Path, PathBuf};

use nix::errno::Errno;

use crate::error::ShellError;
use crate::history::HistoryStore;
use crate::jobs::JobTable;
use crate::paths::expand_tilde;

/// The in-process commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Cd,
    Jobs,
    History,
    Exit,
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "cd" => Some(Builtin::Cd),
            "jobs" => Some(Builtin::Jobs),
            "history" => Some(Builtin::History),
            "exit" => Some(Builtin::Exit),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Cd => "cd",
            Builtin::Jobs => "jobs",
            Builtin::History => "history",
            Builtin::Exit => "exit",
        }
    }
}

/// Resolve the directory `cd` should enter.
///
/// No argument means home. A leading `~` expands to `home`; relative paths
/// are taken from `cwd`. The result is canonical and known to be a
/// directory.
pub fn change_directory(cwd: &Path, arg: Option<&str>, home: &Path) -> Result<PathBuf, ShellError> {
    let target = match arg {
        None => home.to_path_buf(),
        Some(arg) => cwd.join(expand_tilde(arg, home)),
    };
    let shown = arg.unwrap_or("~").to_string();

    let resolved = target.canonicalize().map_err(|e| ShellError::DirectoryChangeFailed {
        path: shown.clone(),
        reason: describe(&e),
    })?;

    if !resolved.is_dir() {
        return Err(ShellError::DirectoryChangeFailed {
            path: shown,
            reason: Errno::ENOTDIR.desc().to_string(),
        });
    }

    tracing::debug!(cwd = %resolved.display(), "changed directory");
    Ok(resolved)
}

/// Short OS description of an I/O error, without the `(os error N)` suffix.
fn describe(e: &io::Error) -> String {
    match e.raw_os_error() {
        Some(code) => Errno::from_raw(code).desc().to_string(),
        None => e.to_string(),
    }
}

/// One row of the `jobs` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobListing {
    pub history_id: u64,
    pub pid: u32,
    pub command: String,
}

/// Cross-reference running jobs with their history entries.
///
/// Jobs whose entry has been evicted are skipped.
pub fn job_listings(jobs: &JobTable, history: &HistoryStore) -> Vec<JobListing> {
    jobs.list()
        .into_iter()
        .filter_map(|(pid, history_id)| {
            history.by_id(history_id).map(|entry| JobListing {
                history_id,
                pid,
                command: entry.command.clone(),
            })
        })
        .collect()
}
