//! Output channels
//!
//! Both the normal and the error channel are a device writer plus the
//! session's spool. Control sequences (screen clears, overlay painting) go to
//! the device only.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use super::spool::SpoolTee;

pub(crate) type Device = Box<dyn Write + Send>;

/// Device writer shared between an output channel and screen control
pub(crate) type DeviceHandle = Arc<Mutex<Device>>;

pub(crate) fn device(writer: impl Write + Send + 'static) -> DeviceHandle {
    Arc::new(Mutex::new(Box::new(writer)))
}

/// Handle for writing to one terminal channel
#[derive(Clone)]
pub struct TerminalWriter {
    device: DeviceHandle,
    spool: Arc<SpoolTee>,
}

impl TerminalWriter {
    pub(crate) fn new(device: DeviceHandle, spool: Arc<SpoolTee>) -> Self {
        Self { device, spool }
    }

    /// Write straight to the device, bypassing the spool
    pub(crate) fn control<F>(&self, f: F) -> io::Result<()>
    where
        F: FnOnce(&mut Device) -> io::Result<()>,
    {
        let mut device = self.device.lock();
        f(&mut *device)?;
        device.flush()
    }

    /// Write a line of text
    pub fn line(&mut self, text: &str) -> io::Result<()> {
        self.write_all(text.as_bytes())?;
        self.write_all(b"\n")
    }
}

impl Write for TerminalWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Whole buffer so the device and the spool always see the same bytes
        self.device.lock().write_all(buf)?;
        self.spool.tee(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.device.lock().flush()?;
        self.spool.flush();
        Ok(())
    }
}

/// Cloneable in-memory writer
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    pub fn clear(&self) {
        self.bytes.lock().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
