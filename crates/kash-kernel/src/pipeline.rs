//! Pipeline construction.
//!
//! Splits a token sequence on `|` into stages, attaches an output
//! redirection to the last stage, and lifts the background marker onto the
//! whole pipeline.

use std::path::PathBuf;

use crate::lexer::{RedirectMode, Token};

/// One process invocation: its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub argv: Vec<String>,
}

impl Stage {
    /// The program name.
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }

    /// Arguments after the program name.
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }
}

/// Output redirection of the final stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub target: PathBuf,
    pub mode: RedirectMode,
}

/// Stages connected by pipes, derived from one input line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
    pub redirect: Option<Redirect>,
    pub background: bool,
}

impl Pipeline {
    /// Build a pipeline from tokens.
    ///
    /// Empty stages (`a | | b`, a trailing `|`) are dropped. A redirection
    /// operator consumes the following word as its target; a later
    /// redirection replaces an earlier one. An operator with no target is
    /// ignored.
    pub fn build(tokens: &[Token]) -> Self {
        let mut pipeline = Pipeline::default();
        let mut current: Vec<String> = Vec::new();
        let mut iter = tokens.iter().peekable();

        while let Some(token) = iter.next() {
            match token {
                Token::Word(word) => current.push(word.clone()),
                Token::Pipe => {
                    if !current.is_empty() {
                        pipeline.stages.push(Stage {
                            argv: std::mem::take(&mut current),
                        });
                    }
                }
                Token::RedirectOut(mode) => match iter.next_if(|t| matches!(t, Token::Word(_))) {
                    Some(Token::Word(target)) => {
                        pipeline.redirect = Some(Redirect {
                            target: PathBuf::from(target),
                            mode: *mode,
                        });
                    }
                    _ => tracing::debug!("redirection without target"),
                },
                Token::Background => pipeline.background = true,
            }
        }

        if !current.is_empty() {
            pipeline.stages.push(Stage { argv: current });
        }

        pipeline
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// The single stage's program name, if this is a one-stage pipeline.
    pub fn sole_program(&self) -> Option<&str> {
        match self.stages.as_slice() {
            [only] => Some(only.program()),
            _ => None,
        }
    }
}
