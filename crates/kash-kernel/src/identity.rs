//! Who and where the interpreter is running.
//!
//! Gathered once at startup for the prompt and for `cd` with no argument.
//! Every lookup is best effort: a missing user entry or hostname is logged
//! and replaced with a placeholder.

use std::path::PathBuf;

use nix::unistd::{gethostname, getuid, User};

use crate::paths;

const UNKNOWN: &str = "unknown";

/// User name, host name and home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub host: String,
    pub home: PathBuf,
}

impl Identity {
    pub fn new(user: impl Into<String>, host: impl Into<String>, home: impl Into<PathBuf>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            home: home.into(),
        }
    }

    /// Look up the current user, host and home directory.
    pub fn detect() -> Self {
        Self {
            user: detect_user(),
            host: detect_host(),
            home: paths::home_dir(),
        }
    }
}

fn detect_user() -> String {
    match User::from_uid(getuid()) {
        Ok(Some(user)) => user.name,
        Ok(None) => std::env::var("USER").unwrap_or_else(|_| {
            tracing::warn!("no passwd entry for current uid");
            UNKNOWN.to_string()
        }),
        Err(e) => {
            tracing::warn!("user lookup failed: {e}");
            UNKNOWN.to_string()
        }
    }
}

fn detect_host() -> String {
    match gethostname() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            tracing::warn!("gethostname failed: {e}");
            read_hostname()
        }
    }
}

fn read_hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| UNKNOWN.to_string())
}
