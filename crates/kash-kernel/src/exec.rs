//! Process execution engine.
//!
//! A pipeline of N stages gets N-1 pipes, all allocated before anything is
//! spawned. Stages are then spawned left to right. Each stage's `Command`
//! owns the pipe ends it was given and is dropped straight after spawning,
//! which closes the parent's copies; pipes are created close-on-exec so no
//! stage inherits an end meant for another.
//!
//! Foreground pipelines are waited on here and their history entry is
//! finalized before returning. Background pipelines are handed to the job
//! table and finalized later, when the kernel drains child-exit events.

use std::fs::{File, OpenOptions};
use std::io::{self, PipeReader, PipeWriter};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Instant;

use crate::error::ShellError;
use crate::history::{HistoryStore, PendingEntry};
use crate::jobs::JobTable;
use crate::lexer::RedirectMode;
use crate::pipeline::{Pipeline, Redirect};
use crate::signal::ForegroundFlag;

/// Exit status reported for a stage that could not be started.
pub const NOT_FOUND_STATUS: i32 = 127;

/// Permission bits for files created by `>` and `>>`.
pub const REDIRECT_MODE: u32 = 0o644;

/// Shell state the engine reads and mutates while running one pipeline.
pub struct ExecContext<'a> {
    pub cwd: &'a Path,
    pub history: &'a mut HistoryStore,
    pub jobs: &'a mut JobTable,
    pub foreground: &'a ForegroundFlag,
}

/// How a pipeline was launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    /// Ran to completion; `status` is the last stage's exit status.
    Foreground { id: u64, status: i32 },
    /// Left running. `pid` is the tracked last stage, if it started.
    Background { id: u64, pid: Option<u32> },
    /// Not launched and not logged.
    Rejected,
}

/// Result of [`run`]: the launch plus any recovered errors.
#[derive(Debug)]
pub struct ExecReport {
    pub launch: Launch,
    pub diagnostics: Vec<ShellError>,
}

/// A spawned (or failed) stage.
struct StageProcess {
    program: String,
    child: Option<Child>,
}

/// Log `entry` and run `pipeline`.
#[tracing::instrument(level = "debug", skip_all, fields(command = %entry.command, stages = pipeline.len(), background = pipeline.background))]
pub fn run(pipeline: &Pipeline, entry: PendingEntry, ctx: &mut ExecContext<'_>) -> ExecReport {
    let mut diagnostics = Vec::new();

    if pipeline.background && ctx.jobs.is_full() {
        diagnostics.push(ShellError::JobTableFull(ctx.jobs.capacity()));
        return ExecReport {
            launch: Launch::Rejected,
            diagnostics,
        };
    }

    let id = ctx.history.append(entry);

    let launch = if pipeline.background {
        let started = Instant::now();
        let stages = spawn_pipeline(pipeline, ctx.cwd, true, &mut diagnostics);
        launch_background(id, started, stages, ctx, &mut diagnostics)
    } else {
        let guard = ctx.foreground.raise();
        let started = Instant::now();
        let stages = spawn_pipeline(pipeline, ctx.cwd, false, &mut diagnostics);
        let status = wait_all(stages, &mut diagnostics);
        let elapsed = started.elapsed();
        drop(guard);

        ctx.history.finalize_run_time(id, elapsed);
        Launch::Foreground { id, status }
    };

    ExecReport {
        launch,
        diagnostics,
    }
}

fn launch_background(
    id: u64,
    started: Instant,
    mut stages: Vec<StageProcess>,
    ctx: &mut ExecContext<'_>,
    diagnostics: &mut Vec<ShellError>,
) -> Launch {
    let last = stages.pop().and_then(|s| s.child);

    for stage in &stages {
        if let Some(child) = &stage.child {
            ctx.jobs.adopt(child.id());
        }
    }

    let Some(child) = last else {
        // No job to list; earlier stages are still reaped as stragglers.
        tracing::debug!(id, "background pipeline has no last stage");
        ctx.history.finalize_run_time(id, started.elapsed());
        return Launch::Background { id, pid: None };
    };

    let pid = child.id();
    if let Err(e) = ctx.jobs.track_since(pid, id, started) {
        ctx.jobs.adopt(pid);
        diagnostics.push(e);
    }
    Launch::Background { id, pid: Some(pid) }
}

/// Wait for every stage; returns the last stage's status.
fn wait_all(stages: Vec<StageProcess>, diagnostics: &mut Vec<ShellError>) -> i32 {
    let mut status = 0;
    for stage in stages {
        status = match stage.child {
            Some(mut child) => match child.wait() {
                Ok(exit) => exit_code(exit),
                Err(source) => {
                    diagnostics.push(ShellError::WaitFailed {
                        command: stage.program,
                        source,
                    });
                    1
                }
            },
            None => NOT_FOUND_STATUS,
        };
    }
    status
}

/// Allocate the pipes, open the redirect target and spawn every stage.
fn spawn_pipeline(
    pipeline: &Pipeline,
    cwd: &Path,
    background: bool,
    diagnostics: &mut Vec<ShellError>,
) -> Vec<StageProcess> {
    let mut stages = pipeline.stages.as_slice();
    let mut readers: Vec<PipeReader> = Vec::new();
    let mut writers: Vec<PipeWriter> = Vec::new();

    for i in 0..stages.len().saturating_sub(1) {
        match io::pipe() {
            Ok((reader, writer)) => {
                readers.push(reader);
                writers.push(writer);
            }
            Err(e) => {
                diagnostics.push(ShellError::PipeCreationFailed(e));
                stages = &stages[..=i];
                break;
            }
        }
    }
    let truncated = stages.len() < pipeline.stages.len();

    let mut sink = match &pipeline.redirect {
        Some(redirect) if !truncated => match open_redirect(redirect, cwd) {
            Ok(file) => Some(file),
            Err(source) => {
                diagnostics.push(ShellError::FileOpenFailed {
                    path: redirect.target.clone(),
                    source,
                });
                None
            }
        },
        _ => None,
    };

    let last = stages.len().saturating_sub(1);
    let mut readers = readers.into_iter();
    let mut writers = writers.into_iter();
    let mut upstream: Option<PipeReader> = None;
    let mut group_leader: Option<u32> = None;
    let mut spawned = Vec::with_capacity(stages.len());

    for (i, stage) in stages.iter().enumerate() {
        let mut cmd = Command::new(stage.program());
        cmd.args(stage.args()).current_dir(cwd).env("PWD", cwd);

        cmd.stdin(match upstream.take() {
            Some(reader) => Stdio::from(reader),
            None if background => Stdio::null(),
            None => Stdio::inherit(),
        });

        if i < last {
            if let Some(writer) = writers.next() {
                cmd.stdout(Stdio::from(writer));
            }
            upstream = readers.next();
        } else if let Some(file) = sink.take() {
            cmd.stdout(Stdio::from(file));
        }

        if background {
            cmd.process_group(group_leader.map_or(0, |pid| pid as i32));
        }

        let child = match cmd.spawn() {
            Ok(child) => {
                tracing::debug!(pid = child.id(), program = stage.program(), "spawned stage");
                group_leader.get_or_insert(child.id());
                Some(child)
            }
            Err(e) => {
                diagnostics.push(spawn_error(stage.program(), e));
                None
            }
        };
        drop(cmd);

        spawned.push(StageProcess {
            program: stage.program().to_string(),
            child,
        });
    }

    spawned
}

/// Open the redirect target, relative paths resolved against `cwd`.
fn open_redirect(redirect: &Redirect, cwd: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).mode(REDIRECT_MODE);
    match redirect.mode {
        RedirectMode::Truncate => options.truncate(true),
        RedirectMode::Append => options.append(true),
    };
    options.open(cwd.join(&redirect.target))
}

fn spawn_error(program: &str, source: io::Error) -> ShellError {
    if source.kind() == io::ErrorKind::NotFound {
        ShellError::CommandNotFound(program.to_string())
    } else {
        ShellError::SpawnFailed {
            command: program.to_string(),
            source,
        }
    }
}

/// Exit code, or 128 + signal number for a signalled process.
pub fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}
