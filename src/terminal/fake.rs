//! In-memory terminal
//!
//! `FakeTerminal` replays scripted input and captures output in memory. It
//! has no device: the overlay is tracked but never drawn, the width is
//! whatever the test sets.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;

use super::output::{device, SharedBuffer};
use super::{
    NullPainter, ReadCancel, SessionParts, SignalHandler, SignalKind, SignalRouter, SpoolSink,
    StatusOverlay, StatusToken, Terminal, TerminalWriter,
};
use crate::error::{Result, TerminalError};
use crate::history::HistoryEntry;

/// One scripted input event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeInput {
    /// A submitted line
    Line(String),
    /// A signal delivered while the read is pending
    Signal(SignalKind),
}

pub struct FakeTerminal {
    input: VecDeque<FakeInput>,
    width: Arc<AtomicU16>,
    parts: SessionParts,
    out_buffer: SharedBuffer,
    err_buffer: SharedBuffer,
    clears: AtomicUsize,
    closed: bool,
}

impl Default for FakeTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTerminal {
    pub fn new() -> Self {
        let out_buffer = SharedBuffer::new();
        let err_buffer = SharedBuffer::new();
        let parts = SessionParts::new(
            device(out_buffer.clone()),
            device(err_buffer.clone()),
            StatusOverlay::new(NullPainter),
            0,
        );
        Self {
            input: VecDeque::new(),
            width: Arc::new(AtomicU16::new(80)),
            parts,
            out_buffer,
            err_buffer,
            clears: AtomicUsize::new(0),
            closed: false,
        }
    }

    /// Terminal that will submit `lines` in order, then report end of input
    pub fn with_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut term = Self::new();
        for line in lines {
            term.push_line(line);
        }
        term
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.input.push_back(FakeInput::Line(line.into()));
    }

    pub fn push_signal(&mut self, kind: SignalKind) {
        self.input.push_back(FakeInput::Signal(kind));
    }

    pub fn set_width(&self, width: u16) {
        self.width.store(width, Ordering::SeqCst);
    }

    /// Deliver a signal as the host would
    pub fn raise(&self, kind: SignalKind) -> bool {
        self.parts.router.dispatch(kind)
    }

    /// Router handle for delivering signals from another thread or an executor
    pub fn signal_router(&self) -> Arc<SignalRouter> {
        self.parts.router.clone()
    }

    /// Everything written to the output channel
    pub fn output(&self) -> String {
        self.out_buffer.contents()
    }

    /// Everything written to the error channel
    pub fn errors(&self) -> String {
        self.err_buffer.contents()
    }

    pub fn status_message(&self) -> Option<String> {
        self.parts.overlay.message()
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_spooling(&self) -> bool {
        self.parts.spool.is_active()
    }
}

impl Terminal for FakeTerminal {
    fn width(&self) -> u16 {
        self.width.load(Ordering::SeqCst)
    }

    fn writer(&self) -> TerminalWriter {
        self.parts.out.clone()
    }

    fn read_line(&mut self) -> Result<String> {
        if self.closed {
            return Err(TerminalError::InputClosed);
        }
        self.parts.cancel.reset();

        while let Some(event) = self.input.pop_front() {
            match event {
                FakeInput::Line(line) => {
                    self.parts.history.append(line.clone());
                    return Ok(line);
                }
                FakeInput::Signal(kind) => {
                    self.parts.router.dispatch(kind);
                    if self.parts.cancel.take() {
                        return Err(TerminalError::Interrupted);
                    }
                }
            }
        }

        Err(TerminalError::InputClosed)
    }

    fn flush(&self) -> io::Result<()> {
        self.parts.flush()
    }

    fn clear_screen(&self) -> io::Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn history(&self) -> Vec<HistoryEntry> {
        self.parts.history.snapshot()
    }

    fn history_entry(&self, index: u64) -> Option<HistoryEntry> {
        self.parts.history.get(index)
    }

    fn handle(&self, kind: SignalKind, handler: SignalHandler) {
        self.parts.router.register(kind, handler);
    }

    fn unhandle(&self, kind: SignalKind) {
        self.parts.router.unregister(kind);
    }

    fn read_cancel(&self) -> ReadCancel {
        self.parts.cancel.clone()
    }

    fn set_spool(&self, sink: SpoolSink) {
        self.parts.spool.set(sink);
    }

    fn unset_spool(&self) {
        self.parts.spool.unset();
    }

    fn set_status_message(&self, message: &str) -> StatusToken {
        self.parts.overlay.set(message)
    }

    fn release_status(&self, token: StatusToken) {
        self.parts.overlay.release(token);
    }

    fn print_error(&self, message: &str) {
        self.parts.print_error(message);
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.parts.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::AtomicBool;
    use std::thread;

    #[test]
    fn test_read_line_records_history() {
        let mut term = FakeTerminal::with_lines(["SELECT 1;", "SELECT 2;"]);

        assert_eq!(term.read_line().unwrap(), "SELECT 1;");
        assert_eq!(term.read_line().unwrap(), "SELECT 2;");

        let history = term.history();
        assert_eq!(history.len(), 2);
        assert_eq!((history[0].index(), history[0].line()), (1, "SELECT 1;"));
        assert_eq!((history[1].index(), history[1].line()), (2, "SELECT 2;"));
    }

    #[test]
    fn test_long_session_keeps_first_line() {
        let mut term = FakeTerminal::with_lines((1..=1001).map(|i| format!("SELECT {};", i)));
        while term.read_line().is_ok() {}

        let history = term.history();
        assert_eq!(history.len(), 1001);
        assert_eq!(history[0].index(), 1);
        assert_eq!(
            term.history_entry(1).map(|e| e.line().to_string()),
            Some("SELECT 1;".to_string())
        );
        assert_eq!(term.history_entry(1002), None);
    }

    #[test]
    fn test_unhandle_detaches_handler() {
        let term = FakeTerminal::new();
        term.handle(SignalKind::Quit, Arc::new(|_: SignalKind| {}));
        assert!(term.signal_router().is_registered(SignalKind::Quit));

        term.unhandle(SignalKind::Quit);
        assert!(!term.raise(SignalKind::Quit));
    }

    #[test]
    fn test_read_at_end_of_input() {
        let mut term = FakeTerminal::new();
        assert!(matches!(term.read_line(), Err(TerminalError::InputClosed)));
        assert!(term.history().is_empty());
    }

    #[test]
    fn test_interrupt_handler_cancels_pending_read() {
        let mut term = FakeTerminal::new();
        term.push_signal(SignalKind::Interrupt);
        term.push_line("SELECT 1;");

        let cancel = term.read_cancel();
        term.handle(SignalKind::Interrupt, Arc::new(move |_: SignalKind| cancel.cancel()));

        assert!(matches!(term.read_line(), Err(TerminalError::Interrupted)));
        assert!(term.history().is_empty());

        // The next read proceeds normally
        assert_eq!(term.read_line().unwrap(), "SELECT 1;");
        assert_eq!(term.history()[0].index(), 1);
    }

    #[test]
    fn test_signal_without_cancel_keeps_reading() {
        let mut term = FakeTerminal::new();
        term.push_signal(SignalKind::WindowResize);
        term.push_line("SHOW STREAMS;");

        let resized = Arc::new(AtomicBool::new(false));
        let flag = resized.clone();
        term.handle(
            SignalKind::WindowResize,
            Arc::new(move |_: SignalKind| flag.store(true, Ordering::SeqCst)),
        );

        assert_eq!(term.read_line().unwrap(), "SHOW STREAMS;");
        assert!(resized.load(Ordering::SeqCst));
    }

    #[test]
    fn test_cancel_before_read_is_ignored() {
        let mut term = FakeTerminal::with_lines(["SELECT 1;"]);
        term.read_cancel().cancel();
        assert_eq!(term.read_line().unwrap(), "SELECT 1;");
    }

    #[test]
    fn test_width_is_live() {
        let term = FakeTerminal::new();
        assert_eq!(term.width(), 80);
        term.set_width(132);
        assert_eq!(term.width(), 132);
    }

    #[test]
    fn test_spool_switching() {
        let term = FakeTerminal::new();
        let a = SharedBuffer::new();
        let b = SharedBuffer::new();

        term.set_spool(SpoolSink::new(a.clone()));
        term.set_spool(SpoolSink::new(b.clone()));
        writeln!(term.writer(), "first").unwrap();
        term.print_error("oops");

        assert_eq!(a.contents(), "");
        assert_eq!(b.contents(), "first\noops\n");

        term.unset_spool();
        writeln!(term.writer(), "second").unwrap();
        assert_eq!(a.contents(), "");
        assert_eq!(b.contents(), "first\noops\n");
        assert_eq!(term.output(), "first\nsecond\n");
        assert_eq!(term.errors(), "oops\n");
    }

    #[test]
    fn test_status_messages() {
        let term = FakeTerminal::new();
        let a = term.set_status_message("a");
        term.release_status(a);
        assert_eq!(term.status_message(), None);

        let a = term.set_status_message("a");
        let _b = term.set_status_message("b");
        term.release_status(a);
        assert_eq!(term.status_message().as_deref(), Some("b"));
    }

    #[test]
    fn test_operations_from_signal_thread() {
        let term = Arc::new(FakeTerminal::new());
        let remote = term.clone();
        thread::spawn(move || {
            let token = remote.set_status_message("cancelling");
            remote.print_error("interrupted");
            remote.release_status(token);
            let _ = remote.flush();
        })
        .join()
        .unwrap();

        assert_eq!(term.errors(), "interrupted\n");
        assert_eq!(term.status_message(), None);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut term = FakeTerminal::with_lines(["SELECT 1;"]);
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        term.handle(
            SignalKind::Interrupt,
            Arc::new(move |_: SignalKind| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        term.set_status_message("running");

        term.close();
        term.close();

        assert!(term.is_closed());
        assert!(!term.raise(SignalKind::Interrupt));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(term.status_message(), None);
        assert!(matches!(term.read_line(), Err(TerminalError::InputClosed)));
    }
}
