//! Error types for terminal operations.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerminalError {
    /// End of input was reached while waiting for a line.
    #[error("input closed")]
    InputClosed,

    /// The pending read was aborted by a routed signal.
    #[error("read interrupted")]
    Interrupted,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("line editor failed: {0}")]
    Editor(#[source] rustyline::error::ReadlineError),
}

impl TerminalError {
    /// Whether the REPL should keep reading after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TerminalError::Interrupted)
    }
}

pub type Result<T> = std::result::Result<T, TerminalError>;
