//! querysh - terminal layer for an interactive query shell
//!
//! querysh hides raw terminal control behind a small capability surface so a
//! REPL can read lines, write output, keep an indexed history, show a
//! transient status line while a statement runs, and copy the whole session
//! to a file.
//!
//! # Features
//!
//! - **Line input**: rustyline editing with emacs or vi keymaps
//! - **History**: every submitted line gets a stable 1-based index
//! - **Status line**: one message at a time on the bottom row, outside the
//!   scroll region
//! - **Spooling**: duplicate all output to a caller-owned sink
//! - **Signals**: interrupt, quit and resize routed to registered handlers
//!
//! # Module Organization
//!
//! ```text
//! src/
//! ├── terminal/   - Terminal trait, console session, in-memory fake
//! ├── history.rs  - HistoryEntry, HistoryLog
//! ├── repl.rs     - Read-eval-print loop and shell commands
//! ├── command.rs  - Subcommand timing wrapper and global options
//! ├── config.rs   - TOML configuration
//! └── error.rs    - TerminalError
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod history;
pub mod repl;
pub mod terminal;

pub use command::{
    Command, CommandContext, CommandLogger, CommandRunner, GlobalOptions, TracingLogger,
};
pub use config::Config;
pub use error::TerminalError;
pub use history::{HistoryEntry, HistoryLog};
pub use repl::{Repl, StatementExecutor};
pub use terminal::{FakeTerminal, Terminal, TerminalSession};
