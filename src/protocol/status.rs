//! # Status Frames
//!
//! The printer answers `ESC i S` (and, with notifications enabled, reports
//! job progress on its own) with a fixed 32-byte frame.
//!
//! ## Frame Layout
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0 | Print head mark (0x80) |
//! | 1 | Size (0x20) |
//! | 8 | Error information 1 |
//! | 9 | Error information 2 |
//! | 10 | Media width (mm) |
//! | 11 | Media type |
//! | 15 | Mode |
//! | 17 | Media length |
//! | 18 | Status type |
//! | 19 | Phase type |
//! | 20-21 | Phase number |
//! | 22 | Notification number |
//! | 24 | Tape color |
//! | 25 | Text color |
//!
//! A short or malformed frame is not an error for the job: it simply means
//! no status snapshot is available.

use std::fmt;

use serde::Serialize;

use crate::error::ProtocolError;

/// Length of every status frame
pub const STATUS_FRAME_LEN: usize = 32;

const HEAD_MARK: u8 = 0x80;
const FRAME_SIZE: u8 = 0x20;

mod offset {
    pub const ERROR_1: usize = 8;
    pub const ERROR_2: usize = 9;
    pub const MEDIA_WIDTH: usize = 10;
    pub const MEDIA_TYPE: usize = 11;
    pub const MODE: usize = 15;
    pub const MEDIA_LENGTH: usize = 17;
    pub const STATUS_TYPE: usize = 18;
    pub const PHASE_TYPE: usize = 19;
    pub const PHASE_NUMBER: usize = 20;
    pub const NOTIFICATION: usize = 22;
    pub const TAPE_COLOR: usize = 24;
    pub const TEXT_COLOR: usize = 25;
}

// ============================================================================
// FIELD TYPES
// ============================================================================

/// Loaded media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    NoMedia,
    LaminatedTape,
    NonLaminatedTape,
    HeatShrinkTube,
    IncompatibleTape,
    Unknown(u8),
}

impl MediaType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x00 => Self::NoMedia,
            0x01 => Self::LaminatedTape,
            0x03 => Self::NonLaminatedTape,
            0x11 => Self::HeatShrinkTube,
            0xFF => Self::IncompatibleTape,
            other => Self::Unknown(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::NoMedia => 0x00,
            Self::LaminatedTape => 0x01,
            Self::NonLaminatedTape => 0x03,
            Self::HeatShrinkTube => 0x11,
            Self::IncompatibleTape => 0xFF,
            Self::Unknown(b) => b,
        }
    }
}

/// Why the frame was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusType {
    Reply,
    PrintingCompleted,
    ErrorOccurred,
    TurnedOff,
    Notification,
    PhaseChange,
    Unknown(u8),
}

impl StatusType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x00 => Self::Reply,
            0x01 => Self::PrintingCompleted,
            0x02 => Self::ErrorOccurred,
            0x04 => Self::TurnedOff,
            0x05 => Self::Notification,
            0x06 => Self::PhaseChange,
            other => Self::Unknown(other),
        }
    }
}

/// Combined error bitmap: error information 1 in the low byte, error
/// information 2 in the high byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ErrorFlags(u16);

impl ErrorFlags {
    pub const NO_MEDIA: Self = Self(0x0001);
    pub const CUTTER_JAM: Self = Self(0x0004);
    pub const WEAK_BATTERIES: Self = Self(0x0008);
    pub const HIGH_VOLTAGE_ADAPTER: Self = Self(0x0040);
    pub const WRONG_MEDIA: Self = Self(0x0100);
    pub const COVER_OPEN: Self = Self(0x1000);
    pub const OVERHEATING: Self = Self(0x2000);

    const NAMES: [(Self, &'static str); 7] = [
        (Self::NO_MEDIA, "no media"),
        (Self::CUTTER_JAM, "cutter jam"),
        (Self::WEAK_BATTERIES, "weak batteries"),
        (Self::HIGH_VOLTAGE_ADAPTER, "high-voltage adapter"),
        (Self::WRONG_MEDIA, "wrong media"),
        (Self::COVER_OPEN, "cover open"),
        (Self::OVERHEATING, "overheating"),
    ];

    pub fn from_bytes(error_1: u8, error_2: u8) -> Self {
        Self(error_1 as u16 | (error_2 as u16) << 8)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Human-readable names of the flagged conditions.
    pub fn describe(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl fmt::Display for ErrorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.describe();
        if names.is_empty() {
            if self.is_empty() {
                write!(f, "none")
            } else {
                write!(f, "unknown error 0x{:04X}", self.0)
            }
        } else {
            write!(f, "{}", names.join(" | "))
        }
    }
}

// ============================================================================
// STATUS
// ============================================================================

/// A parsed status frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub media_width_mm: u8,
    pub media_type: MediaType,
    pub errors: ErrorFlags,
    pub status_type: StatusType,
    pub mode: u8,
    pub media_length_mm: u8,
    pub phase_type: u8,
    pub phase_number: u16,
    pub notification: u8,
    pub tape_color: u8,
    pub text_color: u8,
}

impl StatusReport {
    /// Parse a raw frame. Extra trailing bytes are ignored.
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        if raw.len() < STATUS_FRAME_LEN {
            return Err(ProtocolError::ShortFrame {
                expected: STATUS_FRAME_LEN,
                actual: raw.len(),
            });
        }
        if raw[0] != HEAD_MARK || raw[1] != FRAME_SIZE {
            return Err(ProtocolError::MalformedFrame(format!(
                "header {:02X} {:02X}",
                raw[0], raw[1]
            )));
        }

        Ok(Self {
            media_width_mm: raw[offset::MEDIA_WIDTH],
            media_type: MediaType::from_byte(raw[offset::MEDIA_TYPE]),
            errors: ErrorFlags::from_bytes(raw[offset::ERROR_1], raw[offset::ERROR_2]),
            status_type: StatusType::from_byte(raw[offset::STATUS_TYPE]),
            mode: raw[offset::MODE],
            media_length_mm: raw[offset::MEDIA_LENGTH],
            phase_type: raw[offset::PHASE_TYPE],
            phase_number: u16::from_be_bytes([
                raw[offset::PHASE_NUMBER],
                raw[offset::PHASE_NUMBER + 1],
            ]),
            notification: raw[offset::NOTIFICATION],
            tape_color: raw[offset::TAPE_COLOR],
            text_color: raw[offset::TEXT_COLOR],
        })
    }

    /// Media width converted to dots at the print resolution.
    pub fn media_width_dots(&self) -> usize {
        crate::printer::PrinterModel::default().mm_to_dots(self.media_width_mm as f32)
    }
}

/// Status snapshot: a parsed frame, or nothing usable arrived in time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PrinterStatus {
    Available(StatusReport),
    #[default]
    Unavailable,
}

impl PrinterStatus {
    /// Interpret a reply (or its absence), downgrading bad frames to
    /// `Unavailable`.
    pub fn from_reply(reply: Option<&[u8]>) -> Self {
        match reply.map(StatusReport::parse) {
            Some(Ok(report)) => Self::Available(report),
            Some(Err(e)) => {
                log::debug!("Ignoring status reply: {}", e);
                Self::Unavailable
            }
            None => Self::Unavailable,
        }
    }

    pub fn report(&self) -> Option<&StatusReport> {
        match self {
            Self::Available(report) => Some(report),
            Self::Unavailable => None,
        }
    }
}

/// Build a status frame (used by the scripted transport and tests).
pub fn encode_frame(
    status_type: StatusType,
    media_width_mm: u8,
    media_type: MediaType,
    errors: ErrorFlags,
) -> [u8; STATUS_FRAME_LEN] {
    let mut frame = [0u8; STATUS_FRAME_LEN];
    frame[0] = HEAD_MARK;
    frame[1] = FRAME_SIZE;
    frame[2] = b'B';
    frame[3] = b'0';
    frame[offset::ERROR_1] = errors.bits() as u8;
    frame[offset::ERROR_2] = (errors.bits() >> 8) as u8;
    frame[offset::MEDIA_WIDTH] = media_width_mm;
    frame[offset::MEDIA_TYPE] = media_type.to_byte();
    frame[offset::STATUS_TYPE] = match status_type {
        StatusType::Reply => 0x00,
        StatusType::PrintingCompleted => 0x01,
        StatusType::ErrorOccurred => 0x02,
        StatusType::TurnedOff => 0x04,
        StatusType::Notification => 0x05,
        StatusType::PhaseChange => 0x06,
        StatusType::Unknown(b) => b,
    };
    frame
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply() {
        let frame = encode_frame(
            StatusType::Reply,
            12,
            MediaType::LaminatedTape,
            ErrorFlags::default(),
        );
        let report = StatusReport::parse(&frame).unwrap();
        assert_eq!(report.media_width_mm, 12);
        assert_eq!(report.media_type, MediaType::LaminatedTape);
        assert_eq!(report.status_type, StatusType::Reply);
        assert!(report.errors.is_empty());
        assert_eq!(report.media_width_dots(), 85);
    }

    #[test]
    fn test_parse_error_notification() {
        let errors = ErrorFlags::from_bytes(0x01, 0x10);
        let frame = encode_frame(StatusType::ErrorOccurred, 24, MediaType::NoMedia, errors);
        let report = StatusReport::parse(&frame).unwrap();
        assert_eq!(report.status_type, StatusType::ErrorOccurred);
        assert!(report.errors.contains(ErrorFlags::NO_MEDIA));
        assert!(report.errors.contains(ErrorFlags::COVER_OPEN));
        assert!(!report.errors.contains(ErrorFlags::CUTTER_JAM));
        assert_eq!(report.errors.to_string(), "no media | cover open");
    }

    #[test]
    fn test_short_frame_is_unavailable() {
        let frame = encode_frame(StatusType::Reply, 12, MediaType::LaminatedTape, ErrorFlags::default());
        assert!(matches!(
            StatusReport::parse(&frame[..20]),
            Err(ProtocolError::ShortFrame { expected: 32, actual: 20 })
        ));
        assert_eq!(PrinterStatus::from_reply(Some(&frame[..20])), PrinterStatus::Unavailable);
        assert_eq!(PrinterStatus::from_reply(None), PrinterStatus::Unavailable);
    }

    #[test]
    fn test_bad_header_is_unavailable() {
        let mut frame = encode_frame(StatusType::Reply, 12, MediaType::LaminatedTape, ErrorFlags::default());
        frame[0] = 0x00;
        assert!(StatusReport::parse(&frame).is_err());
        assert_eq!(PrinterStatus::from_reply(Some(&frame)), PrinterStatus::Unavailable);
    }

    #[test]
    fn test_unknown_codes_preserved() {
        assert_eq!(MediaType::from_byte(0x42), MediaType::Unknown(0x42));
        assert_eq!(StatusType::from_byte(0x09), StatusType::Unknown(0x09));
        assert_eq!(ErrorFlags::from_bytes(0x02, 0).to_string(), "unknown error 0x0002");
    }
}
