//! Output formatting for the REPL.
//!
//! Pure string builders for the prompt, the `history` and `jobs` listings and
//! diagnostics. Nothing here touches the terminal.

use std::fmt::Write as _;
use std::path::Path;

use kash_kernel::{contract_home, HistoryEntry, Identity, JobListing, ShellError};

/// Render the interactive prompt.
///
/// `[<count>|<HH:MM>|<user>@<host>:<cwd>]$ ` with the home directory shown
/// as `~`.
pub fn render_prompt(line_count: u64, time: &str, identity: &Identity, cwd: &Path) -> String {
    format!(
        "[{}|{}|{}@{}:{}]$ ",
        line_count,
        time,
        identity.user,
        identity.host,
        contract_home(cwd, &identity.home)
    )
}

/// One line per entry: `[<id>|<HH:MM>|<run time>] <command>`.
pub fn format_history(entries: &[HistoryEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(
            out,
            "[{}|{}|{}] {}",
            entry.id, entry.timestamp, entry.run_time, entry.command
        );
    }
    out
}

/// One line per job: `<history id>|<command>`.
pub fn format_jobs(listings: &[JobListing]) -> String {
    let mut out = String::new();
    for job in listings {
        let _ = writeln!(out, "{}|{}", job.history_id, job.command);
    }
    out
}

/// `-<name>: <message>`
pub fn format_diagnostic(name: &str, err: &ShellError) -> String {
    format!("-{name}: {err}")
}
