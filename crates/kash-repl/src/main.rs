//! kash CLI entry point.
//!
//! Usage:
//!   kash                       # Interactive REPL (or read stdin when piped)
//!   kash -c <command>          # Execute one line and exit
//!   kash script.kash           # Run each line of a file

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var); stderr keeps it out of
    // command output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("-kash: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        None => {
            let status = kash_repl::run()?;
            Ok(exit_code(status))
        }

        Some("--help" | "-h") => {
            print_help();
            Ok(ExitCode::SUCCESS)
        }

        Some("--version" | "-V") => {
            println!("kash {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }

        Some("-c") => {
            let cmd = args.get(2).context("-c requires a command argument")?;
            let status = kash_repl::run_command(cmd)?;
            Ok(exit_code(status))
        }

        Some(path) if !path.starts_with('-') => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read script: {path}"))?;
            let status = kash_repl::run_source(&source)?;
            Ok(exit_code(status))
        }

        Some(unknown) => {
            eprintln!("Unknown option: {unknown}");
            eprintln!("Run 'kash --help' for usage.");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn exit_code(status: i32) -> ExitCode {
    ExitCode::from(u8::try_from(status).unwrap_or(1))
}

fn print_help() {
    println!(
        r#"kash v{}

Usage:
  kash                         Interactive REPL
  kash -c <command>            Execute command and exit
  kash <script>                Run each line of a file

Options:
  -c <command>                 Execute command string and exit
  -h, --help                   Show this help
  -V, --version                Show version

Built-ins:
  cd [dir]                     Change directory (no argument: home)
  jobs                         List running background jobs
  history                      List the last 100 commands
  exit                         Leave the shell

History references:
  !!                           Previous command
  !<n>                         Command number n
  !<prefix>                    Most recent command starting with prefix

Logging goes to stderr and is controlled by RUST_LOG.
"#,
        env!("CARGO_PKG_VERSION")
    );
}
