//! # Printer Transport Layer
//!
//! This module provides communication backends for sending data to printers.
//! Transports move bytes; they know nothing about the command protocol.
//!
//! ## Available Transports
//!
//! - [`usb`]: USB bulk transfer (libusb via `rusb`)
//! - [`bluetooth`]: Bluetooth Classic RFCOMM sockets (Linux/BlueZ)
//! - [`mock`]: Scripted in-memory transport for tests
//!
//! ## Ownership
//!
//! A print job owns exactly one connection for its whole lifetime. Wrap it in
//! a [`Session`] so it is closed exactly once on every exit path:
//!
//! ```no_run
//! use ptlabel::transport::{self, Session, TransportTarget};
//!
//! let target = TransportTarget::Usb { serial: None };
//! let mut session = Session::new(transport::connect(&target)?);
//! session.send(&[0x1B, 0x40])?;
//! session.finish()?;
//! # Ok::<(), ptlabel::error::TransportError>(())
//! ```
//!
//! ## Failure Reporting
//!
//! No retries or reconnection happen here. Errors are returned verbatim and
//! the caller owns retry policy. A read timeout is `Ok(None)`, not an error.

pub mod bluetooth;
pub mod mock;
pub mod usb;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

pub use bluetooth::BluetoothTransport;
pub use mock::MockTransport;
pub use usb::UsbTransport;

/// Byte-level link to a printer.
pub trait Transport {
    /// Write the whole buffer.
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Read up to `max_len` bytes, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when nothing arrived in time.
    fn receive(
        &mut self,
        max_len: usize,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, TransportError>;

    /// Release the link. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), TransportError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).send(data)
    }

    fn receive(
        &mut self,
        max_len: usize,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        (**self).receive(max_len, timeout)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

// ============================================================================
// TARGETS AND DEVICES
// ============================================================================

/// Default RFCOMM channel for the Serial Port Profile
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

/// Which physical link a job uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportTarget {
    /// USB device, optionally selected by serial number
    Usb {
        #[serde(default)]
        serial: Option<String>,
    },
    /// Bluetooth RFCOMM peer
    Bluetooth {
        address: String,
        #[serde(default = "default_channel")]
        channel: u8,
    },
}

fn default_channel() -> u8 {
    DEFAULT_RFCOMM_CHANNEL
}

impl fmt::Display for TransportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportTarget::Usb { serial: Some(s) } => write!(f, "usb:{}", s),
            TransportTarget::Usb { serial: None } => write!(f, "usb"),
            TransportTarget::Bluetooth { address, channel } => {
                write!(f, "bluetooth:{}#{}", address, channel)
            }
        }
    }
}

/// A device found during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceDescriptor {
    Usb {
        product: String,
        serial: Option<String>,
        manufacturer: Option<String>,
        product_id: u16,
    },
    Bluetooth {
        name: String,
        address: String,
    },
}

/// Result of a Bluetooth inquiry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BluetoothScan {
    pub devices: Vec<DeviceDescriptor>,
    /// Index into `devices` of the peer that looks like a P-touch printer
    pub likely_match: Option<usize>,
}

/// Which link to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Usb,
    Bluetooth,
}

/// Enumerate devices on one link kind.
///
/// For Bluetooth, `timeout` is the inquiry duration; the scan never outlives
/// it by more than a short grace period.
pub fn discover(kind: LinkKind, timeout: Duration) -> Result<Vec<DeviceDescriptor>, TransportError> {
    match kind {
        LinkKind::Usb => usb::discover(),
        LinkKind::Bluetooth => bluetooth::discover(timeout).map(|scan| scan.devices),
    }
}

// ============================================================================
// CONNECTION
// ============================================================================

/// An open hardware link, tagged by kind.
pub enum Connection {
    Usb(UsbTransport),
    Bluetooth(BluetoothTransport),
}

/// Open the link described by `target`.
pub fn connect(target: &TransportTarget) -> Result<Connection, TransportError> {
    match target {
        TransportTarget::Usb { serial } => UsbTransport::open(serial.as_deref()).map(Connection::Usb),
        TransportTarget::Bluetooth { address, channel } => {
            BluetoothTransport::connect(address, *channel).map(Connection::Bluetooth)
        }
    }
}

impl Transport for Connection {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        match self {
            Connection::Usb(t) => t.send(data),
            Connection::Bluetooth(t) => t.send(data),
        }
    }

    fn receive(
        &mut self,
        max_len: usize,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        match self {
            Connection::Usb(t) => t.receive(max_len, timeout),
            Connection::Bluetooth(t) => t.receive(max_len, timeout),
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match self {
            Connection::Usb(t) => t.close(),
            Connection::Bluetooth(t) => t.close(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Connection::Usb(t) => t.describe(),
            Connection::Bluetooth(t) => t.describe(),
        }
    }
}

// ============================================================================
// SESSION
// ============================================================================

/// Scoped ownership of a connection.
///
/// The wrapped transport is closed exactly once: by [`Session::finish`], or
/// on drop if the session is abandoned (early return, panic).
pub struct Session<T: Transport> {
    transport: T,
    closed: bool,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            closed: false,
        }
    }

    pub fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.transport.send(data)
    }

    pub fn receive(
        &mut self,
        max_len: usize,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.transport.receive(max_len, timeout)
    }

    pub fn describe(&self) -> String {
        self.transport.describe()
    }

    /// Close the connection now and report the outcome.
    pub fn finish(mut self) -> Result<(), TransportError> {
        self.close_once()
    }

    fn close_once(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        log::debug!("Closing {}", self.transport.describe());
        self.transport.close()
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if let Err(e) = self.close_once() {
            log::warn!("Failed to close {}: {}", self.transport.describe(), e);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
