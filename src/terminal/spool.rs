//! Output spooling
//!
//! A spool sink receives a copy of everything written to the terminal's
//! output and error channels. The caller creates the sink and keeps a handle
//! to it; the session only borrows it and never closes it.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

/// Shared handle to an externally owned writer
#[derive(Clone)]
pub struct SpoolSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl SpoolSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        self.inner.lock().write_all(buf)
    }

    pub fn flush(&self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

impl fmt::Debug for SpoolSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpoolSink")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}

/// Optional duplication of terminal output
#[derive(Default)]
pub struct SpoolTee {
    sink: Mutex<Option<SpoolSink>>,
}

impl SpoolTee {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start duplicating to `sink`. The previous sink is handed back, not closed.
    pub fn set(&self, sink: SpoolSink) -> Option<SpoolSink> {
        self.sink.lock().replace(sink)
    }

    /// Stop duplicating. The sink is handed back, not closed.
    pub fn unset(&self) -> Option<SpoolSink> {
        self.sink.lock().take()
    }

    pub fn is_active(&self) -> bool {
        self.sink.lock().is_some()
    }

    fn current(&self) -> Option<SpoolSink> {
        self.sink.lock().clone()
    }

    /// Copy `buf` to the active sink. Failures are logged, never returned.
    pub fn tee(&self, buf: &[u8]) {
        if let Some(sink) = self.current() {
            if let Err(e) = sink.write_all(buf) {
                warn!("spool write failed: {}", e);
            }
        }
    }

    pub fn flush(&self) {
        if let Some(sink) = self.current() {
            if let Err(e) = sink.flush() {
                warn!("spool flush failed: {}", e);
            }
        }
    }
}
