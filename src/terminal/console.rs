//! Console terminal session
//!
//! `TerminalSession` drives the real terminal: rustyline does the line
//! editing, crossterm draws the status line and clears the screen, and on
//! Unix a signal-hook thread feeds host signals into the router.

use std::io::{self, Write};

use crossterm::{
    cursor::{MoveTo, MoveUp, RestorePosition, SavePosition},
    queue,
    style::{Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, info, warn};
use unicode_width::UnicodeWidthStr;

use super::output::{device, DeviceHandle};
use super::overlay::fit_to_width;
use super::{
    NullPainter, OverlayPainter, ReadCancel, SessionParts, SignalHandler, SignalKind,
    SignalRouter, SpoolSink, StatusOverlay, StatusToken, Terminal, TerminalWriter,
};
use crate::config::{Config, EditMode, StatusBarConfig};
use crate::error::{Result, TerminalError};
use crate::history::HistoryEntry;

/// Width reported when the terminal size cannot be queried
const DEFAULT_WIDTH: u16 = 80;

/// Reset the scroll region to the full screen
const RESET_SCROLL_REGION: &str = "\x1b[r";

type SizeFn = fn() -> io::Result<(u16, u16)>;

/// Draws the status line on the bottom row.
///
/// While a message is shown, the scroll region is narrowed to every row but
/// the last, so normal output scrolls above the status line instead of over it.
pub struct ConsolePainter {
    device: DeviceHandle,
    fg: crossterm::style::Color,
    bg: crossterm::style::Color,
    size: SizeFn,
    /// Row count the scroll region was set up for
    reserved: Option<u16>,
}

impl ConsolePainter {
    pub(crate) fn new(device: DeviceHandle, style: &StatusBarConfig) -> Self {
        Self::with_size(device, style, terminal::size)
    }

    pub(crate) fn with_size(device: DeviceHandle, style: &StatusBarConfig, size: SizeFn) -> Self {
        Self {
            device,
            fg: style.fg.to_crossterm(),
            bg: style.bg.to_crossterm(),
            size,
            reserved: None,
        }
    }
}

impl OverlayPainter for ConsolePainter {
    fn paint(&mut self, message: &str) -> io::Result<()> {
        let (cols, rows) = (self.size)()?;
        if rows < 2 {
            return Ok(());
        }
        let text = fit_to_width(message, cols as usize);
        let padding = (cols as usize).saturating_sub(text.width());

        let mut guard = self.device.lock();
        let out = &mut *guard;

        if self.reserved != Some(rows) {
            if self.reserved.is_none() {
                // Scroll once so the bottom row is free
                queue!(out, Print("\n"), MoveUp(1))?;
            }
            queue!(
                out,
                SavePosition,
                Print(format!("\x1b[1;{}r", rows - 1)),
                RestorePosition
            )?;
            self.reserved = Some(rows);
        }

        queue!(
            out,
            SavePosition,
            MoveTo(0, rows - 1),
            Clear(ClearType::CurrentLine),
            SetBackgroundColor(self.bg),
            SetForegroundColor(self.fg),
            Print(text),
            Print(" ".repeat(padding)),
            ResetColor,
            RestorePosition
        )?;
        out.flush()
    }

    fn erase(&mut self) -> io::Result<()> {
        let Some(reserved) = self.reserved.take() else {
            return Ok(());
        };
        let rows = (self.size)().map(|(_, rows)| rows).unwrap_or(reserved);

        let mut guard = self.device.lock();
        let out = &mut *guard;
        queue!(
            out,
            SavePosition,
            Print(RESET_SCROLL_REGION),
            MoveTo(0, rows.saturating_sub(1)),
            Clear(ClearType::CurrentLine),
            RestorePosition
        )?;
        out.flush()
    }
}

/// Interactive terminal backed by the process's console
pub struct TerminalSession {
    editor: DefaultEditor,
    prompt: String,
    parts: SessionParts,
    #[cfg(unix)]
    signals: Option<unix::SignalPump>,
    closed: bool,
}

impl TerminalSession {
    pub fn new(config: &Config) -> Result<Self> {
        let edit_mode = match config.edit_mode {
            EditMode::Emacs => rustyline::EditMode::Emacs,
            EditMode::Vi => rustyline::EditMode::Vi,
        };
        let editor_config = rustyline::Config::builder()
            .edit_mode(edit_mode)
            .auto_add_history(false)
            .build();
        let editor = DefaultEditor::with_config(editor_config).map_err(TerminalError::Editor)?;

        let out = device(io::stdout());
        let err = device(io::stderr());
        let overlay = if config.status_bar.visible {
            StatusOverlay::new(ConsolePainter::new(out.clone(), &config.status_bar))
        } else {
            StatusOverlay::new(NullPainter)
        };
        let parts = SessionParts::new(out, err, overlay, config.history.limit);

        #[cfg(unix)]
        let signals = match unix::SignalPump::start(parts.router.clone(), parts.overlay.clone()) {
            Ok(pump) => Some(pump),
            Err(e) => {
                warn!("Signal delivery unavailable: {}", e);
                None
            }
        };

        info!(
            edit_mode = ?config.edit_mode,
            history_limit = config.history.limit,
            "terminal session opened"
        );

        Ok(Self {
            editor,
            prompt: config.prompt.clone(),
            parts,
            #[cfg(unix)]
            signals,
            closed: false,
        })
    }
}

/// Map the editor's result to a read outcome.
///
/// Ctrl+C typed at the prompt reaches us as `ReadlineError::Interrupted`
/// (raw mode swallows SIGINT), so it is routed to the interrupt handler here.
/// The editor cannot be woken by a cancel request from the signal thread;
/// a request still pending once a full line has been submitted is dropped and
/// the line is kept.
fn editor_outcome(
    result: rustyline::Result<String>,
    router: &SignalRouter,
    cancel: &ReadCancel,
) -> Result<String> {
    match result {
        Ok(line) => {
            if cancel.take() {
                debug!("cancel arrived after the line was submitted; keeping line");
            }
            Ok(line)
        }
        Err(ReadlineError::Eof) => Err(TerminalError::InputClosed),
        Err(ReadlineError::Interrupted) => {
            router.dispatch(SignalKind::Interrupt);
            cancel.reset();
            Err(TerminalError::Interrupted)
        }
        Err(e) => Err(TerminalError::Editor(e)),
    }
}

impl Terminal for TerminalSession {
    fn width(&self) -> u16 {
        terminal::size().map(|(cols, _)| cols).unwrap_or(DEFAULT_WIDTH)
    }

    fn writer(&self) -> TerminalWriter {
        self.parts.out.clone()
    }

    fn read_line(&mut self) -> Result<String> {
        if self.closed {
            return Err(TerminalError::InputClosed);
        }
        self.parts.cancel.reset();

        let result = self.editor.readline(&self.prompt);
        let line = editor_outcome(result, &self.parts.router, &self.parts.cancel)?;

        if let Err(e) = self.editor.add_history_entry(line.as_str()) {
            debug!("editor history rejected line: {}", e);
        }
        let entry = self.parts.history.append(line.clone());
        debug!(index = entry.index(), "line recorded");
        Ok(line)
    }

    fn flush(&self) -> io::Result<()> {
        self.parts.flush()
    }

    fn clear_screen(&self) -> io::Result<()> {
        self.parts
            .out
            .control(|w| queue!(w, Clear(ClearType::All), MoveTo(0, 0)))?;
        self.parts.overlay.repaint();
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
        if self.parts.spool.set(sink).is_some() {
            debug!("spool sink replaced");
        }
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

        #[cfg(unix)]
        {
            // Joins the signal thread
            self.signals.take();
        }

        if let Err(e) = self.parts.flush() {
            debug!("final flush failed: {}", e);
        }
        info!("terminal session closed");
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(unix)]
mod unix {
    use std::io;
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};

    use signal_hook::consts::signal::{SIGINT, SIGQUIT, SIGWINCH};
    use signal_hook::iterator::{Handle, Signals};
    use signal_hook::low_level::emulate_default_handler;
    use tracing::{debug, warn};

    use crate::terminal::{SignalKind, SignalRouter, StatusOverlay};

    /// Forwards host signals to the router from a dedicated thread
    pub(super) struct SignalPump {
        handle: Handle,
        thread: Option<JoinHandle<()>>,
    }

    impl SignalPump {
        pub(super) fn start(
            router: Arc<SignalRouter>,
            overlay: Arc<StatusOverlay>,
        ) -> io::Result<Self> {
            let mut signals = Signals::new([SIGINT, SIGQUIT, SIGWINCH])?;
            let handle = signals.handle();
            let thread = thread::Builder::new()
                .name("querysh-signals".to_string())
                .spawn(move || {
                    for signal in signals.forever() {
                        let kind = match signal {
                            SIGINT => SignalKind::Interrupt,
                            SIGQUIT => SignalKind::Quit,
                            SIGWINCH => SignalKind::WindowResize,
                            _ => continue,
                        };
                        if kind == SignalKind::WindowResize {
                            overlay.repaint();
                        }
                        let handled = router.dispatch(kind);
                        if needs_default_action(kind, handled) {
                            debug!(signal = kind.name(), "no handler, taking default action");
                            if let Err(e) = emulate_default_handler(signal) {
                                warn!("default action for {} failed: {}", kind.name(), e);
                            }
                        }
                    }
                    debug!("signal thread exiting");
                })?;

            Ok(Self {
                handle,
                thread: Some(thread),
            })
        }
    }

    /// Interrupt and quit nobody handles must still stop the process
    pub(super) fn needs_default_action(kind: SignalKind, handled: bool) -> bool {
        !handled && matches!(kind, SignalKind::Interrupt | SignalKind::Quit)
    }

    impl Drop for SignalPump {
        fn drop(&mut self) {
            self.handle.close();
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }
}
