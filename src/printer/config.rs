//! # Printer Configuration
//!
//! This module defines hardware specifications for supported P-touch printers
//! and the tape-width lookup table that maps each tape onto the print head.
//!
//! ## Supported Printers
//!
//! | Model | USB Product ID | Head | Resolution | Interface |
//! |-------|----------------|------|------------|-----------|
//! | PT-E550W | 0x2060 | 128 pins | 180 DPI | USB/Wi-Fi |
//! | PT-P750W | 0x2062 | 128 pins | 180 DPI | USB/Wi-Fi |
//! | PT-P710BT | 0x20AF | 128 pins | 180 DPI | USB/Bluetooth |
//!
//! ## Tape Window
//!
//! Narrow tapes only cover the middle of the head. The unused pins on each
//! side are the tape's margin:
//!
//! ```text
//! pin 0                                                   pin 127
//! ├── margin ──┼────── printable pins ──────┼── margin ──┤
//! ```
//!
//! | Tape | Margin (per side) | Printable pins |
//! |------|-------------------|----------------|
//! | 3.5mm | 52 | 24 |
//! | 6mm | 48 | 32 |
//! | 9mm | 39 | 50 |
//! | 12mm | 29 | 70 |
//! | 18mm | 8 | 112 |
//! | 24mm | 0 | 128 |
//!
//! ## Usage
//!
//! ```
//! use ptlabel::printer::{PrinterModel, TapeWidth};
//!
//! let tape = TapeWidth::Mm12;
//! assert_eq!(tape.printable_pins(), 70);
//! assert_eq!(PrinterModel::P710BT.line_bytes(), 16);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Brother Industries USB vendor ID
pub const USB_VENDOR_BROTHER: u16 = 0x04F9;

/// Pins on the print head of every supported model
pub const HEAD_PINS: usize = 128;

/// Bytes in one raster line (HEAD_PINS / 8)
pub const LINE_BYTES: usize = HEAD_PINS / 8;

/// Print resolution in dots per inch (both axes)
pub const PRINT_DPI: u16 = 180;

/// Shortest label the printers will feed: 25.4mm at 180 DPI
pub const MINIMUM_TAPE_DOTS: usize = 174;

/// # Printer Model
///
/// Static description of one supported device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrinterModel {
    /// Model name
    pub name: &'static str,

    /// USB product ID
    pub product_id: u16,

    /// Number of pins on the head
    pub head_pins: usize,

    /// Resolution in dots per inch
    pub dpi: u16,
}

impl PrinterModel {
    pub const E550W: Self = Self {
        name: "PT-E550W",
        product_id: 0x2060,
        head_pins: HEAD_PINS,
        dpi: PRINT_DPI,
    };

    pub const P750W: Self = Self {
        name: "PT-P750W",
        product_id: 0x2062,
        head_pins: HEAD_PINS,
        dpi: PRINT_DPI,
    };

    pub const P710BT: Self = Self {
        name: "PT-P710BT",
        product_id: 0x20AF,
        head_pins: HEAD_PINS,
        dpi: PRINT_DPI,
    };

    /// All models recognised during USB discovery.
    pub const SUPPORTED: [Self; 3] = [Self::E550W, Self::P750W, Self::P710BT];

    /// Look up a model by its USB product ID.
    pub fn by_product_id(product_id: u16) -> Option<Self> {
        Self::SUPPORTED
            .iter()
            .copied()
            .find(|m| m.product_id == product_id)
    }

    /// Raster line length in bytes
    #[inline]
    pub fn line_bytes(&self) -> usize {
        self.head_pins / 8
    }

    /// Calculate dots per millimeter
    #[inline]
    pub fn dots_per_mm(&self) -> f32 {
        self.dpi as f32 / 25.4
    }

    /// Convert millimeters to dots
    #[inline]
    pub fn mm_to_dots(&self, mm: f32) -> usize {
        (mm * self.dots_per_mm()).round() as usize
    }
}

impl Default for PrinterModel {
    fn default() -> Self {
        Self::P710BT
    }
}

// ============================================================================
// TAPE WIDTHS
// ============================================================================

/// Supported tape cassettes.
///
/// Serialized as the width code the printer reports and expects in print
/// information (`4` for 3.5mm tape).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TapeWidth {
    Mm3_5,
    Mm6,
    Mm9,
    Mm12,
    Mm18,
    Mm24,
}

/// (tape, width code, margin pins per side)
const TAPE_TABLE: [(TapeWidth, u8, usize); 6] = [
    (TapeWidth::Mm3_5, 4, 52),
    (TapeWidth::Mm6, 6, 48),
    (TapeWidth::Mm9, 9, 39),
    (TapeWidth::Mm12, 12, 29),
    (TapeWidth::Mm18, 18, 8),
    (TapeWidth::Mm24, 24, 0),
];

impl TapeWidth {
    /// Every supported tape, narrowest first.
    pub const ALL: [Self; 6] = [
        Self::Mm3_5,
        Self::Mm6,
        Self::Mm9,
        Self::Mm12,
        Self::Mm18,
        Self::Mm24,
    ];

    fn entry(self) -> (TapeWidth, u8, usize) {
        TAPE_TABLE[self as usize]
    }

    /// Width code used on the wire (mm, with 3.5mm tape reported as 4).
    pub fn code(self) -> u8 {
        self.entry().1
    }

    /// Unused pins on each side of the tape window.
    pub fn margin_pins(self) -> usize {
        self.entry().2
    }

    /// Pins that land on the tape.
    pub fn printable_pins(self) -> usize {
        HEAD_PINS - 2 * self.margin_pins()
    }

    /// Look up a tape from its width code.
    pub fn from_code(code: u8) -> Option<Self> {
        TAPE_TABLE
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(tape, _, _)| *tape)
    }
}

impl TryFrom<u8> for TapeWidth {
    type Error = RenderError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(RenderError::UnsupportedTapeWidth(code))
    }
}

impl From<TapeWidth> for u8 {
    fn from(tape: TapeWidth) -> u8 {
        tape.code()
    }
}

impl fmt::Display for TapeWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TapeWidth::Mm3_5 => write!(f, "3.5mm"),
            other => write!(f, "{}mm", other.code()),
        }
    }
}

impl Default for TapeWidth {
    fn default() -> Self {
        Self::Mm24
    }
}

// ============================================================================
// TESTS
// ============================================================================
