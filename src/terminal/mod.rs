//! Terminal capability surface for the REPL.
//!
//! This module hides raw terminal control behind the [`Terminal`] trait:
//!
//! - **history**: stable, 1-based indices for every submitted line
//! - **overlay**: one transient status line outside the scroll region
//! - **spool**: optional copy of all output to a caller-owned sink
//! - **signal**: host signals routed to one handler per kind
//! - **console**: `TerminalSession`, the real implementation
//! - **fake**: `FakeTerminal`, an in-memory implementation for tests
//!
//! # Architecture
//!
//! ```text
//! TerminalSession / FakeTerminal
//! ├── HistoryLog     (append / snapshot)
//! ├── StatusOverlay  (set / release token)
//! ├── SpoolTee       (set / unset sink)
//! ├── SignalRouter   (register / dispatch)
//! └── TerminalWriter (device + spool) x2: output, error
//! ```

pub mod console;
pub mod fake;
pub mod output;
pub mod overlay;
pub mod signal;
pub mod spool;

use std::io::{self, Write};
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::history::{HistoryEntry, HistoryLog};

pub use console::TerminalSession;
pub use fake::{FakeInput, FakeTerminal};
pub use output::{SharedBuffer, TerminalWriter};
pub use overlay::{NullPainter, OverlayPainter, StatusOverlay, StatusToken};
pub use signal::{ReadCancel, SignalHandler, SignalKind, SignalRouter};
pub use spool::{SpoolSink, SpoolTee};

/// What the REPL needs from a terminal
pub trait Terminal {
    /// Current display width in columns, queried on every call
    fn width(&self) -> u16;

    /// Normal output channel
    fn writer(&self) -> TerminalWriter;

    /// Block until a line is submitted, input ends, or the read is interrupted
    fn read_line(&mut self) -> Result<String>;

    fn flush(&self) -> io::Result<()>;

    fn clear_screen(&self) -> io::Result<()>;

    /// Snapshot of submitted lines, oldest first
    fn history(&self) -> Vec<HistoryEntry>;

    /// The retained entry with `index`, if any
    fn history_entry(&self, index: u64) -> Option<HistoryEntry>;

    /// Route `kind` to `handler`, replacing any previous handler
    fn handle(&self, kind: SignalKind, handler: SignalHandler);

    /// Remove the handler for `kind`. Unhandled interrupt and quit signals
    /// take their default action.
    fn unhandle(&self, kind: SignalKind);

    /// Handle for aborting a pending `read_line` from a signal handler
    fn read_cancel(&self) -> ReadCancel;

    fn set_spool(&self, sink: SpoolSink);

    fn unset_spool(&self);

    /// Show a status message until the returned token is released
    fn set_status_message(&self, message: &str) -> StatusToken;

    fn release_status(&self, token: StatusToken);

    /// Write to the error channel. Never fails.
    fn print_error(&self, message: &str);

    /// Release the terminal. Calling it again does nothing.
    fn close(&mut self);
}

/// State shared by every terminal implementation
pub(crate) struct SessionParts {
    pub history: HistoryLog,
    pub overlay: Arc<StatusOverlay>,
    pub spool: Arc<SpoolTee>,
    pub router: Arc<SignalRouter>,
    pub cancel: ReadCancel,
    pub out: TerminalWriter,
    pub err: TerminalWriter,
}

impl SessionParts {
    pub fn new(
        out: output::DeviceHandle,
        err: output::DeviceHandle,
        overlay: StatusOverlay,
        history_limit: usize,
    ) -> Self {
        let spool = Arc::new(SpoolTee::new());
        Self {
            history: HistoryLog::with_limit(history_limit),
            overlay: Arc::new(overlay),
            out: TerminalWriter::new(out, spool.clone()),
            err: TerminalWriter::new(err, spool.clone()),
            spool,
            router: Arc::new(SignalRouter::new()),
            cancel: ReadCancel::new(),
        }
    }

    pub fn flush(&self) -> io::Result<()> {
        self.out.clone().flush()?;
        self.err.clone().flush()
    }

    pub fn print_error(&self, message: &str) {
        let mut err = self.err.clone();
        if let Err(e) = err.line(message).and_then(|_| err.flush()) {
            debug!("error channel write failed: {}", e);
        }
    }

    /// Detach handlers and drop the overlay
    pub fn detach(&self) {
        self.router.clear();
        self.overlay.clear();
    }
}
