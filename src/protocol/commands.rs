//! # P-touch Raster Protocol Commands
//!
//! This module implements the raster command set understood by Brother
//! P-touch tape printers (PT-E550W, PT-P750W, PT-P710BT).
//!
//! ## Protocol Overview
//!
//! A print job is a byte stream of commands. Most control commands start with
//! `ESC i` followed by a command letter; raster data and print triggers are
//! single-byte opcodes:
//!
//! - **Control**: invalidate, initialize, status request, mode switches
//! - **Setup**: print information, various/advanced mode, margin, compression
//! - **Data**: one raster line per command (`G`), or a blank line (`Z`)
//! - **Print**: `FF` (print, keep going) or `SUB` (print, feed and cut)
//!
//! ## Byte Order
//!
//! Multi-byte integers use **little-endian** encoding:
//! - `u16` value 0x1234 is sent as bytes `[0x34, 0x12]`
//!
//! ## Reference
//!
//! Based on the Brother "Software Developer's Manual – Raster Command
//! Reference" for the PT-E550W/P750W/P710BT.

// ============================================================================
// ESCAPE SEQUENCE CONSTANTS
// ============================================================================

/// ESC (Escape) - Command prefix byte
pub const ESC: u8 = 0x1B;

/// FF (Form Feed) - Print without feeding
pub const FF: u8 = 0x0C;

/// SUB (Substitute) - Print with feeding
pub const SUB: u8 = 0x1A;

/// Raster graphics transfer opcode (`G`)
pub const RASTER_LINE: u8 = b'G';

/// Zero raster graphics opcode (`Z`)
pub const ZERO_LINE: u8 = b'Z';

/// Length of the invalidate run
pub const INVALIDATE_LEN: usize = 100;

// ============================================================================
// CONTROL COMMANDS
// ============================================================================

/// # Invalidate (NULL × 100)
///
/// A run of zero bytes. If the printer is holding a partially received
/// command from an aborted job, the zeros complete and discard it.
///
/// ## Example
///
/// ```
/// use ptlabel::protocol::commands;
///
/// assert_eq!(commands::invalidate(), vec![0u8; 100]);
/// ```
#[inline]
pub fn invalidate() -> Vec<u8> {
    vec![0; INVALIDATE_LEN]
}

/// # Initialize (ESC @)
///
/// Clears the print buffer and resets settings to their power-on state.
///
/// ## Protocol Details
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC @ |
/// | Hex     | 1B 40 |
///
/// ## Example
///
/// ```
/// use ptlabel::protocol::commands;
///
/// assert_eq!(commands::initialize(), vec![0x1B, 0x40]);
/// ```
#[inline]
pub fn initialize() -> Vec<u8> {
    vec![ESC, b'@']
}

/// # Status Information Request (ESC i S)
///
/// Asks the printer for a 32-byte status frame (see
/// [`status`](crate::protocol::status)).
///
/// ## Protocol Details
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | ESC i S  |
/// | Hex     | 1B 69 53 |
#[inline]
pub fn status_request() -> Vec<u8> {
    vec![ESC, b'i', b'S']
}

/// Command modes selectable with `ESC i a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandMode {
    EscP = 0x00,
    Raster = 0x01,
    PTouchTemplate = 0x03,
}

/// # Switch Dynamic Command Mode (ESC i a n)
///
/// ## Protocol Details
///
/// | Format  | Bytes       |
/// |---------|-------------|
/// | ASCII   | ESC i a n   |
/// | Hex     | 1B 69 61 n  |
///
/// `n = 01` selects raster mode, the only mode this library drives.
#[inline]
pub fn switch_mode(mode: CommandMode) -> Vec<u8> {
    vec![ESC, b'i', b'a', mode as u8]
}

/// # Automatic Status Notification (ESC i ! n)
///
/// `n = 00` makes the printer send status frames on its own when printing
/// completes or an error occurs; `n = 01` turns that off.
#[inline]
pub fn status_notification(enabled: bool) -> Vec<u8> {
    vec![ESC, b'i', b'!', if enabled { 0x00 } else { 0x01 }]
}

// ============================================================================
// PRINT SETUP COMMANDS
// ============================================================================

/// Validity flags for [`print_information`] (`n1`).
pub mod print_info_flags {
    /// Media type field is valid
    pub const KIND: u8 = 0x02;
    /// Media width field is valid
    pub const WIDTH: u8 = 0x04;
    /// Media length field is valid
    pub const LENGTH: u8 = 0x08;
    /// Give priority to print quality
    pub const QUALITY: u8 = 0x40;
    /// Printer recovery always on
    pub const RECOVER: u8 = 0x80;
}

/// Page position in `n9` of print information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PagePosition {
    Starting = 0x00,
    Other = 0x01,
    Last = 0x02,
}

/// Parameters of the print information command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintInformation {
    pub media_type: u8,
    pub width_mm: u8,
    /// 0 for continuous tape
    pub length_mm: u8,
    pub raster_lines: u32,
    pub quality: bool,
    pub page: PagePosition,
}

/// # Print Information (ESC i z n1..n10)
///
/// Describes the media and job to the printer. Sent once, before any raster
/// data.
///
/// ## Protocol Details
///
/// | Byte | Meaning |
/// |------|---------|
/// | n1 | Valid flags (kind, width, quality, recover) |
/// | n2 | Media type |
/// | n3 | Media width (mm) |
/// | n4 | Media length (mm, 0 = continuous) |
/// | n5..n8 | Raster line count, little-endian |
/// | n9 | Page position |
/// | n10 | Fixed 0 |
///
/// ## Example
///
/// ```
/// use ptlabel::protocol::commands::{self, PagePosition, PrintInformation};
///
/// let cmd = commands::print_information(&PrintInformation {
///     media_type: 0x01,
///     width_mm: 12,
///     length_mm: 0,
///     raster_lines: 0,
///     quality: false,
///     page: PagePosition::Starting,
/// });
/// assert_eq!(&cmd[..3], &[0x1B, 0x69, 0x7A]);
/// assert_eq!(cmd.len(), 13);
/// ```
pub fn print_information(info: &PrintInformation) -> Vec<u8> {
    use print_info_flags::*;

    let mut flags = RECOVER | WIDTH;
    if info.media_type != 0 {
        flags |= KIND;
    }
    if info.length_mm != 0 {
        flags |= LENGTH;
    }
    if info.quality {
        flags |= QUALITY;
    }

    let mut cmd = Vec::with_capacity(13);
    cmd.extend_from_slice(&[ESC, b'i', b'z']);
    cmd.push(flags);
    cmd.push(info.media_type);
    cmd.push(info.width_mm);
    cmd.push(info.length_mm);
    cmd.extend_from_slice(&info.raster_lines.to_le_bytes());
    cmd.push(info.page as u8);
    cmd.push(0);
    cmd
}

/// # Various Mode Settings (ESC i M n)
///
/// Bit 6 enables the auto cutter; bit 7 mirrors the print.
#[inline]
pub fn various_mode(auto_cut: bool) -> Vec<u8> {
    vec![ESC, b'i', b'M', if auto_cut { 0x40 } else { 0x00 }]
}

/// # Advanced Mode Settings (ESC i K n)
///
/// Bit 3 set means *no* chain printing: the last label is fed and cut at
/// the end of the job instead of waiting for the next one.
#[inline]
pub fn advanced_mode(chain_printing: bool) -> Vec<u8> {
    vec![ESC, b'i', b'K', if chain_printing { 0x00 } else { 0x08 }]
}

/// # Specify Margin Amount (ESC i d nL nH)
///
/// Feed amount in dots before and after each label.
#[inline]
pub fn margin(dots: u16) -> Vec<u8> {
    let [lo, hi] = u16_le(dots);
    vec![ESC, b'i', b'd', lo, hi]
}

/// # Select Compression Mode (M n)
///
/// `n = 02` enables TIFF (PackBits) compression for raster lines,
/// `n = 00` disables it.
#[inline]
pub fn compression(enabled: bool) -> Vec<u8> {
    vec![b'M', if enabled { 0x02 } else { 0x00 }]
}

// ============================================================================
// RASTER DATA COMMANDS
// ============================================================================

/// # Raster Graphics Transfer (G nL nH d1...dn)
///
/// Transfers one raster line. In compression mode `d1...dn` is a sequence of
/// PackBits packets; otherwise it is the raw 16 line bytes.
///
/// ## Example
///
/// ```
/// use ptlabel::protocol::commands;
///
/// let cmd = commands::raster_line(&[0xF1, 0x00]);
/// assert_eq!(cmd, vec![b'G', 0x02, 0x00, 0xF1, 0x00]);
/// ```
pub fn raster_line(payload: &[u8]) -> Vec<u8> {
    let [lo, hi] = u16_le(payload.len() as u16);
    let mut cmd = Vec::with_capacity(3 + payload.len());
    cmd.push(RASTER_LINE);
    cmd.push(lo);
    cmd.push(hi);
    cmd.extend_from_slice(payload);
    cmd
}

/// # Zero Raster Graphics (Z)
///
/// A blank line. Only valid in compression mode.
#[inline]
pub fn zero_line() -> Vec<u8> {
    vec![ZERO_LINE]
}

// ============================================================================
// PRINT COMMANDS
// ============================================================================

/// # Print Command (FF)
///
/// Prints the buffered label without feeding or cutting. Used between the
/// labels of a continuous job.
#[inline]
pub fn print() -> Vec<u8> {
    vec![FF]
}

/// # Print Command with Feeding (SUB)
///
/// Prints the buffered label, then feeds and cuts.
#[inline]
pub fn print_and_feed() -> Vec<u8> {
    vec![SUB]
}

// ============================================================================
// UTILITY FUNCTIONS
// ============================================================================

/// Convert a u16 to little-endian bytes.
///
/// ## Example
///
/// ```
/// use ptlabel::protocol::commands::u16_le;
///
/// assert_eq!(u16_le(0x1234), [0x34, 0x12]);
/// ```
#[inline]
pub const fn u16_le(value: u16) -> [u8; 2] {
    [value as u8, (value >> 8) as u8]
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_commands() {
        assert_eq!(invalidate().len(), 100);
        assert!(invalidate().iter().all(|&b| b == 0));
        assert_eq!(initialize(), vec![0x1B, 0x40]);
        assert_eq!(status_request(), vec![0x1B, 0x69, 0x53]);
        assert_eq!(switch_mode(CommandMode::Raster), vec![0x1B, 0x69, 0x61, 0x01]);
        assert_eq!(status_notification(true), vec![0x1B, 0x69, 0x21, 0x00]);
    }

    #[test]
    fn test_print_information_layout() {
        let cmd = print_information(&PrintInformation {
            media_type: 0x01,
            width_mm: 24,
            length_mm: 0,
            raster_lines: 0x0102,
            quality: true,
            page: PagePosition::Starting,
        });
        assert_eq!(
            cmd,
            vec![
                0x1B, 0x69, 0x7A, // ESC i z
                0xC6, // recover | quality | width | kind
                0x01, 24, 0, // media type, width, length
                0x02, 0x01, 0x00, 0x00, // raster count
                0x00, 0x00,
            ]
        );
    }

    #[test]
    fn test_print_information_unknown_media() {
        let cmd = print_information(&PrintInformation {
            media_type: 0,
            width_mm: 12,
            length_mm: 0,
            raster_lines: 0,
            quality: false,
            page: PagePosition::Starting,
        });
        assert_eq!(cmd[3], 0x84);
    }

    #[test]
    fn test_mode_commands() {
        assert_eq!(various_mode(true), vec![0x1B, 0x69, 0x4D, 0x40]);
        assert_eq!(advanced_mode(false), vec![0x1B, 0x69, 0x4B, 0x08]);
        assert_eq!(margin(14), vec![0x1B, 0x69, 0x64, 14, 0]);
        assert_eq!(compression(true), vec![0x4D, 0x02]);
        assert_eq!(compression(false), vec![0x4D, 0x00]);
    }

    #[test]
    fn test_raster_commands() {
        let raw = [0xAAu8; 16];
        let cmd = raster_line(&raw);
        assert_eq!(&cmd[..3], &[0x47, 16, 0]);
        assert_eq!(&cmd[3..], &raw);
        assert_eq!(zero_line(), vec![0x5A]);
    }

    #[test]
    fn test_print_commands() {
        assert_eq!(print(), vec![0x0C]);
        assert_eq!(print_and_feed(), vec![0x1A]);
    }

    #[test]
    fn test_u16_le() {
        assert_eq!(u16_le(0x0000), [0x00, 0x00]);
        assert_eq!(u16_le(0x00FF), [0xFF, 0x00]);
        assert_eq!(u16_le(0xFF00), [0x00, 0xFF]);
    }
}
