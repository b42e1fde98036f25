//! # Raster Conversion
//!
//! Turns a rendered label [`Bitmap`] into the column-by-column line records
//! the printer consumes.
//!
//! ## Orientation
//!
//! The head prints across the tape while the tape feeds past it, so one
//! raster line is one *column* of the label bitmap:
//!
//! ```text
//!            label length (bitmap width) ──►  feed direction
//!          ┌─────────────────────────────┐
//! row 0    │█                            │   ◄─ head position `margin`
//!   │      │█                            │
//!   ▼      │█   ...                      │
//! row h-1  │█                            │   ◄─ head position `margin + h - 1`
//!          └─────────────────────────────┘
//!           ▲
//!           raster line 0
//! ```
//!
//! ## Bit Packing
//!
//! Each line covers all 128 head pins in 16 bytes. Head position 0 is the
//! MSB of byte 0, head position 127 the LSB of byte 15. Pins outside the
//! tape window are always zero.
//!
//! ## Compression
//!
//! Lines are PackBits-encoded when that is strictly shorter than the raw
//! 16 bytes; otherwise they stay raw. The decision is per line with no
//! state carried between lines.

pub mod bitmap;
pub mod packbits;

pub use bitmap::{Bitmap, Canvas};

use crate::error::{ProtocolError, RenderError};
use crate::printer::{HEAD_PINS, LINE_BYTES, TapeWidth};

/// One raster line ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterLine {
    payload: Vec<u8>,
    compressed: bool,
    blank: bool,
}

impl RasterLine {
    /// Build a line from its packed pins, compressing only when it pays off.
    pub fn encode(packed: Vec<u8>, compress: bool) -> Self {
        let blank = packed.iter().all(|&b| b == 0);
        if compress {
            let encoded = packbits::encode(&packed);
            if encoded.len() < packed.len() {
                return Self {
                    payload: encoded,
                    compressed: true,
                    blank,
                };
            }
        }
        Self {
            payload: packed,
            compressed: false,
            blank,
        }
    }

    /// Bytes to put on the wire after the line header.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// True if no pin fires on this line.
    pub fn is_blank(&self) -> bool {
        self.blank
    }

    /// Recover the packed pin bytes.
    pub fn decode(&self) -> Result<Vec<u8>, ProtocolError> {
        if self.compressed {
            packbits::decode(&self.payload)
        } else {
            Ok(self.payload.clone())
        }
    }
}

/// Convert a label bitmap into raster lines, one per column.
///
/// The bitmap must not be taller than the tape's printable pins. Shorter
/// bitmaps are centred inside the window.
pub fn rasterize(
    bitmap: &Bitmap,
    tape: TapeWidth,
    compress: bool,
) -> Result<Vec<RasterLine>, RenderError> {
    let pins = tape.printable_pins();
    if bitmap.height() > pins {
        return Err(RenderError::BitmapTooTall {
            height: bitmap.height(),
            pins,
        });
    }

    let offset = tape.margin_pins() + (pins - bitmap.height()) / 2;

    Ok((0..bitmap.width())
        .map(|x| RasterLine::encode(pack_column(bitmap, x, offset), compress))
        .collect())
}

/// Pack column `x` of the bitmap, with bitmap row 0 at head position `offset`.
fn pack_column(bitmap: &Bitmap, x: usize, offset: usize) -> Vec<u8> {
    let mut line = vec![0u8; LINE_BYTES];
    for y in 0..bitmap.height() {
        if bitmap.get(x, y) {
            let pin = offset + y;
            line[pin / 8] |= 0x80 >> (pin % 8);
        }
    }
    line
}

/// Expand packed line bytes into per-pin booleans (head position order).
pub fn head_column(packed: &[u8]) -> Vec<bool> {
    (0..HEAD_PINS)
        .map(|pin| {
            packed
                .get(pin / 8)
                .is_some_and(|byte| byte & (0x80 >> (pin % 8)) != 0)
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn solid(width: usize, height: usize) -> Bitmap {
        let mut canvas = Canvas::new(width, height);
        canvas.fill_rect(0, 0, width, height);
        canvas.freeze()
    }

    #[test]
    fn test_line_length_for_every_width() {
        for tape in TapeWidth::ALL {
            let bitmap = solid(3, tape.printable_pins());
            let lines = rasterize(&bitmap, tape, false).unwrap();
            assert_eq!(lines.len(), 3);
            for line in &lines {
                assert_eq!(line.payload().len(), LINE_BYTES, "{tape}");
            }
            // Stable across calls
            assert_eq!(lines, rasterize(&bitmap, tape, false).unwrap());
        }
    }

    #[test]
    fn test_pin_window_matches_table() {
        for tape in TapeWidth::ALL {
            let bitmap = solid(1, tape.printable_pins());
            let lines = rasterize(&bitmap, tape, false).unwrap();
            let column = head_column(&lines[0].decode().unwrap());
            let margin = tape.margin_pins();
            for (pin, on) in column.iter().enumerate() {
                let inside = pin >= margin && pin < HEAD_PINS - margin;
                assert_eq!(*on, inside, "{tape} pin {pin}");
            }
        }
    }

    #[test]
    fn test_msb_first_from_top_row() {
        // 24mm tape: no margin, row 0 → MSB of byte 0
        let mut canvas = Canvas::new(1, 128);
        canvas.set(0, 0, true);
        canvas.set(0, 9, true);
        canvas.set(0, 127, true);
        let lines = rasterize(&canvas.freeze(), TapeWidth::Mm24, false).unwrap();
        let bytes = lines[0].payload();
        assert_eq!(bytes[0], 0x80);
        assert_eq!(bytes[1], 0x40);
        assert_eq!(bytes[15], 0x01);
    }

    #[test]
    fn test_column_major_order() {
        let mut canvas = Canvas::new(3, 70);
        canvas.set(2, 0, true);
        let lines = rasterize(&canvas.freeze(), TapeWidth::Mm12, false).unwrap();
        assert!(lines[0].is_blank());
        assert!(lines[1].is_blank());
        assert!(!lines[2].is_blank());
        // 12mm margin is 29 pins: byte 3, bit 2 from the top
        assert_eq!(lines[2].payload()[3], 0x04);
    }

    #[test]
    fn test_short_bitmap_is_centred() {
        // 10 rows on 9mm tape (50 pins): 20 pins of padding each side
        let lines = rasterize(&solid(1, 10), TapeWidth::Mm9, false).unwrap();
        let column = head_column(lines[0].payload());
        let first = column.iter().position(|&on| on).unwrap();
        let last = column.iter().rposition(|&on| on).unwrap();
        assert_eq!(first, 39 + 20);
        assert_eq!(last, 39 + 29);
    }

    #[test]
    fn test_tall_bitmap_rejected() {
        let err = rasterize(&solid(1, 33), TapeWidth::Mm6, false).unwrap_err();
        assert!(matches!(err, RenderError::BitmapTooTall { height: 33, pins: 32 }));
    }

    #[test]
    fn test_compression_only_when_shorter() {
        let blank = RasterLine::encode(vec![0; LINE_BYTES], true);
        assert!(blank.is_compressed());
        assert_eq!(blank.payload(), &[0xF1, 0x00]);

        // Alternating bytes: PackBits would need 17 bytes
        let noisy: Vec<u8> = (0..LINE_BYTES as u8).collect();
        let line = RasterLine::encode(noisy.clone(), true);
        assert!(!line.is_compressed());
        assert_eq!(line.payload(), &noisy[..]);

        let off = RasterLine::encode(vec![0; LINE_BYTES], false);
        assert!(!off.is_compressed());
    }

    #[test]
    fn test_tie_favours_raw() {
        // One 3-byte run (2 bytes) + 13-byte literal (14 bytes) = 16
        let mut tie = vec![0xAA, 0xAA, 0xAA];
        tie.extend(1..=13u8);
        assert_eq!(tie.len(), LINE_BYTES);
        assert_eq!(packbits::encode(&tie).len(), LINE_BYTES);
        let encoded = RasterLine::encode(tie.clone(), true);
        assert!(!encoded.is_compressed());
        assert_eq!(encoded.decode().unwrap(), tie);
    }
}
