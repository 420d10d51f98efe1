//! kash REPL: the interactive front end of the kash kernel.
//!
//! It handles:
//! - Prompt rendering and line acquisition (rustyline or plain stdin)
//! - Draining signal events before each prompt
//! - Printing built-in listings and diagnostics

pub mod format;
pub mod reader;

use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::runtime::{Builder, Runtime};

use kash_kernel::history::clock_stamp;
use kash_kernel::{DrainReport, Identity, Kernel, KernelConfig, OutcomeKind, SignalDispatcher};

use crate::format::{format_diagnostic, format_history, format_jobs, render_prompt};
use crate::reader::{EditorReader, LineReader, ReadOutcome, StdinReader};

/// What a processed line produced for the terminal.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Response {
    /// Built-in listing output, if any.
    pub out: Option<String>,
    /// Diagnostic lines for standard error.
    pub err: Vec<String>,
    /// Exit status of the line.
    pub status: i32,
    /// The line was `exit`.
    pub exit: bool,
}

/// REPL configuration and state.
pub struct Repl {
    kernel: Kernel,
    // Declared before the runtime so its tasks are aborted first.
    dispatcher: Option<SignalDispatcher>,
    runtime: Runtime,
    last_prompt: Arc<Mutex<String>>,
}

impl Repl {
    /// Create a REPL for the current terminal (interactive if stdin is one).
    pub fn new() -> Result<Self> {
        let config = if io::stdin().is_terminal() {
            KernelConfig::interactive()
        } else {
            KernelConfig::batch()
        };
        Self::with_config(config)
    }

    /// Create a REPL with a custom kernel configuration.
    pub fn with_config(config: KernelConfig) -> Result<Self> {
        let kernel = Kernel::new(config, Identity::detect());

        // One worker is plenty: it only hosts the signal listeners.
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("kash-signals")
            .enable_all()
            .build()
            .context("Failed to create tokio runtime")?;

        Ok(Self {
            kernel,
            dispatcher: None,
            runtime,
            last_prompt: Arc::new(Mutex::new(String::new())),
        })
    }

    /// Start listening for SIGCHLD and SIGINT.
    pub fn install_signals(&mut self) -> Result<()> {
        let prompt = Arc::clone(&self.last_prompt);
        let refresh = Arc::new(move || {
            if let Ok(text) = prompt.lock() {
                let mut stdout = io::stdout();
                let _ = write!(stdout, "{text}");
                let _ = stdout.flush();
            }
        });

        let dispatcher = SignalDispatcher::install(
            self.runtime.handle(),
            self.kernel.event_sender(),
            self.kernel.watch_list(),
            self.kernel.foreground_flag(),
            refresh,
        )
        .context("Failed to install signal handlers")?;
        self.dispatcher = Some(dispatcher);
        Ok(())
    }

    pub fn signals_installed(&self) -> bool {
        self.dispatcher.is_some()
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// The prompt for the next line.
    pub fn prompt(&self) -> String {
        render_prompt(
            self.kernel.line_count(),
            &clock_stamp(),
            self.kernel.identity(),
            self.kernel.cwd(),
        )
    }

    /// Process queued signal events.
    pub fn drain_events(&mut self) -> DrainReport {
        let report = self.kernel.drain_events();
        if !report.reaped.is_empty() {
            tracing::debug!(reaped = ?report.reaped, "background jobs finished");
        }
        report
    }

    /// Process a single line of input.
    pub fn process_line(&mut self, line: &str) -> Response {
        let outcome = self.kernel.execute(line);
        let name = self.kernel.name().to_string();

        let out = match &outcome.kind {
            OutcomeKind::History { entries, .. } => Some(format_history(entries)),
            OutcomeKind::Jobs { listings, .. } => Some(format_jobs(listings)),
            _ => None,
        };

        Response {
            out,
            err: outcome
                .visible_diagnostics()
                .map(|d| format_diagnostic(&name, d))
                .collect(),
            status: outcome.status(),
            exit: outcome.is_exit(),
        }
    }

    /// Read and execute lines until `exit` or end of input.
    ///
    /// Returns the exit status for the process.
    pub fn run_with(&mut self, reader: &mut dyn LineReader) -> Result<i32> {
        let interactive = self.kernel.config().interactive;
        let ignore_eof = self.kernel.config().ignore_eof;
        let mut eof_count = 0;

        loop {
            self.drain_events();

            let prompt = if interactive { self.prompt() } else { String::new() };
            if let Ok(mut last) = self.last_prompt.lock() {
                last.clone_from(&prompt);
            }

            match reader.read_line(&prompt)? {
                ReadOutcome::Line(line) => {
                    eof_count = 0;
                    let response = self.process_line(&line);
                    emit(&response);
                    if response.exit {
                        return Ok(0);
                    }
                }
                ReadOutcome::Interrupted => {
                    // A SIGINT seen by the dispatcher has already broken the line.
                    if self.drain_events().interrupts == 0 {
                        println!("^C");
                    }
                }
                ReadOutcome::Eof if interactive && eof_count < ignore_eof => {
                    eof_count += 1;
                    println!();
                    eprintln!("Use \"exit\" to leave the shell.");
                }
                ReadOutcome::Eof => {
                    if interactive {
                        println!();
                    }
                    return Ok(0);
                }
            }
        }
    }
}

/// Print a response: listings to stdout, diagnostics to stderr.
fn emit(response: &Response) {
    if let Some(out) = &response.out {
        print!("{out}");
        let _ = io::stdout().flush();
    }
    for line in &response.err {
        eprintln!("{line}");
    }
}

/// Run the REPL on the process's stdin.
pub fn run() -> Result<i32> {
    let mut repl = Repl::new()?;
    repl.install_signals()?;

    if repl.kernel().config().interactive {
        println!("kash v{}", env!("CARGO_PKG_VERSION"));
        let mut reader = EditorReader::new()?;
        repl.run_with(&mut reader)
    } else {
        let stdin = io::stdin();
        let mut reader = StdinReader::new(stdin.lock());
        repl.run_with(&mut reader)
    }
}

/// Execute a single line and return its status.
pub fn run_command(line: &str) -> Result<i32> {
    let mut repl = Repl::with_config(KernelConfig::batch())?;
    repl.install_signals()?;

    let response = repl.process_line(line);
    emit(&response);
    Ok(response.status)
}

/// Execute each line of `source` in order.
pub fn run_source(source: &str) -> Result<i32> {
    let mut repl = Repl::with_config(KernelConfig::batch())?;
    repl.install_signals()?;

    let mut reader = StdinReader::new(source.as_bytes());
    repl.run_with(&mut reader)
}
