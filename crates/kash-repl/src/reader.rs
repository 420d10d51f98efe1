//! Line acquisition.
//!
//! The loop reads through [`LineReader`] so the terminal editor and plain
//! buffered input are interchangeable.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;

/// What one read produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A line, without its terminator.
    Line(String),
    /// The user pressed the interrupt key at the prompt.
    Interrupted,
    /// End of input.
    Eof,
}

/// Source of input lines.
pub trait LineReader {
    /// Show `prompt` (if non-empty) and read one line.
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome>;
}

/// Terminal line editor.
pub struct EditorReader {
    editor: Editor<(), DefaultHistory>,
}

impl EditorReader {
    pub fn new() -> Result<Self> {
        let editor = Editor::new().context("Failed to create editor")?;
        Ok(Self { editor })
    }
}

impl LineReader for EditorReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty()
                    && let Err(e) = self.editor.add_history_entry(line.as_str())
                {
                    tracing::warn!("Failed to add history entry: {}", e);
                }
                Ok(ReadOutcome::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(e) => Err(e).context("Failed to read line"),
        }
    }
}

/// Buffered, editor-less input (pipes, scripts, tests).
pub struct StdinReader<R> {
    input: R,
}

impl<R: BufRead> StdinReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl<R: BufRead> LineReader for StdinReader<R> {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        if !prompt.is_empty() {
            let mut stdout = std::io::stdout();
            write!(stdout, "{prompt}").context("Failed to write prompt")?;
            stdout.flush().context("Failed to flush prompt")?;
        }

        let mut line = String::new();
        let n = self
            .input
            .read_line(&mut line)
            .context("Failed to read input")?;
        if n == 0 {
            return Ok(ReadOutcome::Eof);
        }

        let trimmed = line.strip_suffix('\n').unwrap_or(&line);
        let trimmed = trimmed.strip_suffix('\r').unwrap_or(trimmed);
        Ok(ReadOutcome::Line(trimmed.to_string()))
    }
}
