//! Signal routing
//!
//! Host signals arrive on their own thread. Handlers registered here run on
//! that thread, so they may only hand work back to the REPL through
//! thread-safe values such as [`ReadCancel`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

/// Terminal signals a session can route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Ctrl+C / SIGINT
    Interrupt,
    /// Ctrl+\ / SIGQUIT
    Quit,
    /// SIGWINCH
    WindowResize,
}

impl SignalKind {
    pub fn name(&self) -> &'static str {
        match self {
            SignalKind::Interrupt => "INT",
            SignalKind::Quit => "QUIT",
            SignalKind::WindowResize => "WINCH",
        }
    }
}

pub type SignalHandler = Arc<dyn Fn(SignalKind) + Send + Sync>;

/// One handler per signal kind
#[derive(Default)]
pub struct SignalRouter {
    handlers: RwLock<HashMap<SignalKind, SignalHandler>>,
}

impl SignalRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, returning the handler it replaces
    pub fn register(&self, kind: SignalKind, handler: SignalHandler) -> Option<SignalHandler> {
        self.handlers.write().insert(kind, handler)
    }

    pub fn unregister(&self, kind: SignalKind) -> Option<SignalHandler> {
        self.handlers.write().remove(&kind)
    }

    pub fn is_registered(&self, kind: SignalKind) -> bool {
        self.handlers.read().contains_key(&kind)
    }

    /// Invoke the handler for `kind` on the calling thread.
    ///
    /// Returns false when no handler is registered. The lock is released
    /// before the handler runs so handlers may re-register.
    pub fn dispatch(&self, kind: SignalKind) -> bool {
        let handler = self.handlers.read().get(&kind).cloned();
        match handler {
            Some(handler) => {
                debug!(signal = kind.name(), "dispatching signal");
                handler(kind);
                true
            }
            None => {
                debug!(signal = kind.name(), "no handler for signal");
                false
            }
        }
    }

    /// Detach every handler
    pub fn clear(&self) {
        self.handlers.write().clear();
    }
}

/// Request flag for aborting an in-progress read
#[derive(Clone, Debug, Default)]
pub struct ReadCancel {
    requested: Arc<AtomicBool>,
}

impl ReadCancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the pending read to fail with `Interrupted`
    pub fn cancel(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Forget requests made while no read was pending
    pub(crate) fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }

    /// Consume a pending request
    pub(crate) fn take(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }
}
