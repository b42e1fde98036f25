//! # Error Types
//!
//! This module defines error types used throughout the ptlabel library.
//!
//! | Type | Raised by | Effect on a batch |
//! |------|-----------|-------------------|
//! | [`TransportError`] | USB / RFCOMM links | Fatal to the job |
//! | [`ProtocolError`] | Status parsing, driver sequencing | Parse errors degrade to `Unavailable`, the rest abort |
//! | [`RenderError`] | Layout and rasterization | Row-local |
//! | [`PrintError`] | Batch orchestrator | Reporting wrapper with row context |

use thiserror::Error;

/// Link-level failures (device absent, connect/read/write failure).
#[derive(Debug, Error)]
pub enum TransportError {
    /// No device matched the requested target
    #[error("No supported printer found: {0}")]
    NotFound(String),

    /// The transport is not available on this platform
    #[error("Transport not supported: {0}")]
    Unsupported(String),

    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Write failed: {0}")]
    Send(String),

    #[error("Read failed: {0}")]
    Receive(String),

    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// Operation attempted on a closed connection
    #[error("Connection is closed")]
    Closed,
}

/// Protocol-level failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Status reply shorter than the fixed frame length
    #[error("Short status frame: expected {expected} bytes, got {actual}")]
    ShortFrame { expected: usize, actual: usize },

    /// Status reply with an unexpected header
    #[error("Malformed status frame: {0}")]
    MalformedFrame(String),

    /// Command sequence not allowed by the driver state machine
    #[error("Illegal transition: {event} while {state}")]
    IllegalTransition { state: String, event: String },

    /// The printer reported an error condition
    #[error("Printer error: {0}")]
    Device(String),

    /// No completion notification arrived in time
    #[error("Printer did not confirm print completion")]
    CompletionTimeout,

    /// PackBits stream ended inside a packet
    #[error("Corrupt compressed line: {0}")]
    CorruptLine(String),
}

/// Row-local rendering failures.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Value cannot be encoded under the requested symbology
    #[error("Invalid {kind} value '{value}': {reason}")]
    InvalidValue {
        kind: String,
        value: String,
        reason: String,
    },

    /// Content does not fit the available area even at the minimum size
    #[error("Field {field} does not fit: {reason}")]
    DoesNotFit { field: usize, reason: String },

    #[error("Unsupported tape width: {0}mm")]
    UnsupportedTapeWidth(u8),

    /// Label spec without fields
    #[error("Label has no fields")]
    EmptyLabel,

    /// Geometry outside the supported range
    #[error("Invalid label spec: {0}")]
    InvalidSpec(String),

    /// Bitmap taller than the pin window of the tape
    #[error("Bitmap height {height} exceeds {pins} printable pins")]
    BitmapTooTall { height: usize, pins: usize },

    /// The symbol generator failed
    #[error("Symbol generation failed: {0}")]
    Symbol(String),
}

/// Main error type for ptlabel operations
#[derive(Debug, Error)]
pub enum LabelError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Render(#[from] RenderError),

    /// Invalid job or label configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LabelError {
    /// Whether this error means the connection can no longer be used.
    pub fn is_fatal(&self) -> bool {
        match self {
            LabelError::Transport(_) => true,
            LabelError::Protocol(e) => !matches!(
                e,
                ProtocolError::ShortFrame { .. } | ProtocolError::MalformedFrame(_)
            ),
            _ => false,
        }
    }
}

/// A failure attributed to one data row.
#[derive(Debug, Error)]
#[error("Row {row}: {source}")]
pub struct PrintError {
    pub row: usize,
    #[source]
    pub source: LabelError,
}

impl PrintError {
    pub fn new(row: usize, source: impl Into<LabelError>) -> Self {
        Self {
            row,
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(LabelError::from(TransportError::Closed).is_fatal());
        assert!(LabelError::from(ProtocolError::CompletionTimeout).is_fatal());
        assert!(
            !LabelError::from(ProtocolError::ShortFrame {
                expected: 32,
                actual: 3
            })
            .is_fatal()
        );
        assert!(!LabelError::from(RenderError::EmptyLabel).is_fatal());
    }

    #[test]
    fn test_print_error_carries_row() {
        let err = PrintError::new(2, TransportError::Send("pipe".into()));
        assert_eq!(err.row, 2);
        assert_eq!(err.to_string(), "Row 2: Write failed: pipe");
    }
}
