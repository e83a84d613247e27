//! Transient status line
//!
//! At most one status message is visible. Each `set` hands out a fresh
//! [`StatusToken`]; only the holder of the newest token can clear the line,
//! so an old owner closing late never removes someone else's message.

use std::io;

use parking_lot::Mutex;
use tracing::warn;
use unicode_width::UnicodeWidthChar;

/// Identifies one display of a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusToken(u64);

/// Draws the status line on some surface
pub trait OverlayPainter: Send {
    fn paint(&mut self, message: &str) -> io::Result<()>;
    fn erase(&mut self) -> io::Result<()>;
}

/// Painter for sessions without a screen
#[derive(Debug, Default)]
pub struct NullPainter;

impl OverlayPainter for NullPainter {
    fn paint(&mut self, _message: &str) -> io::Result<()> {
        Ok(())
    }

    fn erase(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct OverlayState {
    painter: Box<dyn OverlayPainter>,
    active: Option<(StatusToken, String)>,
    generation: u64,
}

impl OverlayState {
    fn paint(&mut self, message: &str) {
        if let Err(e) = self.painter.paint(message) {
            warn!("status paint failed: {}", e);
        }
    }

    fn erase(&mut self) {
        if let Err(e) = self.painter.erase() {
            warn!("status erase failed: {}", e);
        }
    }
}

/// Single-slot status overlay
pub struct StatusOverlay {
    state: Mutex<OverlayState>,
}

impl StatusOverlay {
    pub fn new(painter: impl OverlayPainter + 'static) -> Self {
        Self {
            state: Mutex::new(OverlayState {
                painter: Box::new(painter),
                active: None,
                generation: 0,
            }),
        }
    }

    /// Show `message`, replacing whatever was displayed
    pub fn set(&self, message: &str) -> StatusToken {
        let mut state = self.state.lock();
        state.generation += 1;
        let token = StatusToken(state.generation);
        state.paint(message);
        state.active = Some((token, message.to_string()));
        token
    }

    /// Clear the overlay if `token` is still current. Returns whether it was.
    pub fn release(&self, token: StatusToken) -> bool {
        let mut state = self.state.lock();
        if state.active.as_ref().map(|(active, _)| *active) != Some(token) {
            return false;
        }
        state.active = None;
        state.erase();
        true
    }

    /// Currently displayed message
    pub fn message(&self) -> Option<String> {
        self.state.lock().active.as_ref().map(|(_, msg)| msg.clone())
    }

    /// Draw the current message again (after a resize)
    pub fn repaint(&self) {
        let mut state = self.state.lock();
        if let Some((_, message)) = state.active.clone() {
            state.paint(&message);
        }
    }

    /// Remove any message and invalidate all tokens
    pub fn clear(&self) {
        let mut state = self.state.lock();
        if state.active.take().is_some() {
            state.erase();
        }
    }
}

/// Cut `text` to at most `width` display columns
pub fn fit_to_width(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        if ch.is_control() {
            continue;
        }
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}
