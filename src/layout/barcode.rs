//! Symbol generation for barcode and QR fields.
//!
//! Layout never encodes symbologies itself; it asks a [`SymbolSource`] for the
//! module pattern and scales that into dots. [`Barcoders`] is the default
//! source, backed by the `barcoders` and `qrcode` crates.
//!
//! ## Value Rules
//!
//! | Kind | Accepted values |
//! |------|-----------------|
//! | `code128` | Printable ASCII (character set B) |
//! | `code39` | `0-9 A-Z - . $ / + % space`, lowercase is uppercased |
//! | `ean13` | 12 digits, or 13 digits with a correct check digit |
//! | `qr` | Any non-empty text |

use barcoders::sym::code128::Code128;
use barcoders::sym::code39::Code39;
use barcoders::sym::ean13::EAN13;
use qrcode::{EcLevel, QrCode};

use super::FieldKind;
use crate::error::RenderError;

/// Module pattern of an encoded symbol, true = dark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    /// One row of bars, repeated over the full symbol height
    Linear(Vec<bool>),
    /// Square matrix stored row by row
    Matrix { size: usize, modules: Vec<bool> },
}

impl Symbol {
    /// Width in modules.
    pub fn modules_wide(&self) -> usize {
        match self {
            Symbol::Linear(bars) => bars.len(),
            Symbol::Matrix { size, .. } => *size,
        }
    }
}

/// Something that can encode field values as symbols.
pub trait SymbolSource: Sync {
    fn encode(&self, kind: FieldKind, value: &str) -> Result<Symbol, RenderError>;
}

/// Default symbol source.
#[derive(Debug, Clone, Copy, Default)]
pub struct Barcoders;

impl SymbolSource for Barcoders {
    fn encode(&self, kind: FieldKind, value: &str) -> Result<Symbol, RenderError> {
        if value.is_empty() {
            return Err(invalid(kind, value, "value is empty"));
        }

        match kind {
            FieldKind::Code128 => {
                // Character set B covers upper/lowercase, digits and punctuation.
                let barcode = Code128::new(format!("\u{0181}{}", value))
                    .map_err(|e| invalid(kind, value, &format!("{:?}", e)))?;
                Ok(Symbol::Linear(to_bars(&barcode.encode())))
            }
            FieldKind::Code39 => {
                let barcode = Code39::new(value.to_uppercase())
                    .map_err(|e| invalid(kind, value, &format!("{:?}", e)))?;
                Ok(Symbol::Linear(to_bars(&barcode.encode())))
            }
            FieldKind::Ean13 => {
                let digits = ean13_payload(value)?;
                let barcode = EAN13::new(digits)
                    .map_err(|e| invalid(kind, value, &format!("{:?}", e)))?;
                Ok(Symbol::Linear(to_bars(&barcode.encode())))
            }
            FieldKind::Qr => {
                let code = QrCode::with_error_correction_level(value, EcLevel::M)
                    .map_err(|e| RenderError::Symbol(format!("QR code generation failed: {}", e)))?;
                let size = code.width();
                let mut modules = Vec::with_capacity(size * size);
                for y in 0..size {
                    for x in 0..size {
                        modules.push(code[(x, y)] == qrcode::Color::Dark);
                    }
                }
                Ok(Symbol::Matrix { size, modules })
            }
            FieldKind::Text => Err(RenderError::Symbol(
                "text fields are not symbols".to_string(),
            )),
        }
    }
}

fn to_bars(encoded: &[u8]) -> Vec<bool> {
    encoded.iter().map(|&m| m == 1).collect()
}

fn invalid(kind: FieldKind, value: &str, reason: &str) -> RenderError {
    RenderError::InvalidValue {
        kind: kind.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Validate an EAN-13 value and return the 12 data digits.
pub fn ean13_payload(value: &str) -> Result<&str, RenderError> {
    let kind = FieldKind::Ean13;
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid(kind, value, "must contain only digits"));
    }
    match value.len() {
        12 => Ok(value),
        13 => {
            let expected = ean13_check_digit(&value[..12]);
            let actual = value.as_bytes()[12] - b'0';
            if expected == actual {
                Ok(&value[..12])
            } else {
                Err(invalid(
                    kind,
                    value,
                    &format!("check digit is {}, expected {}", actual, expected),
                ))
            }
        }
        n => Err(invalid(kind, value, &format!("needs 12 or 13 digits, got {}", n))),
    }
}

/// Check digit for 12 EAN-13 data digits.
pub fn ean13_check_digit(digits: &str) -> u8 {
    let sum: u32 = digits
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let d = (b - b'0') as u32;
            if i % 2 == 0 { d } else { d * 3 }
        })
        .sum();
    ((10 - sum % 10) % 10) as u8
}
