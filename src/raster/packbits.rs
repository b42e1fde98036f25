//! # PackBits Run-Length Coding
//!
//! The compression scheme behind TIFF compression mode 2, which the printer
//! accepts for raster lines once `M 02` has been sent.
//!
//! ## Packet Format
//!
//! | Header (as i8) | Meaning |
//! |----------------|---------|
//! | 0..=127 | Copy the next `n + 1` bytes literally |
//! | -127..=-1 | Repeat the next byte `1 - n` times |
//! | -128 | No-op (never emitted) |
//!
//! ```text
//! 00 00 00 00 AB CD  →  FD 00 01 AB CD
//! ```

use crate::error::ProtocolError;

/// Longest run or literal a single packet can carry
const MAX_PACKET: usize = 128;

/// Compress `data` into PackBits packets.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / MAX_PACKET + 1);
    let mut i = 0;
    let mut literal_start = 0;

    while i < data.len() {
        let run = run_length(&data[i..]);
        if run >= 2 {
            flush_literal(&mut out, &data[literal_start..i]);
            out.push((257 - run) as u8);
            out.push(data[i]);
            i += run;
            literal_start = i;
        } else {
            i += 1;
            if i - literal_start == MAX_PACKET {
                flush_literal(&mut out, &data[literal_start..i]);
                literal_start = i;
            }
        }
    }
    flush_literal(&mut out, &data[literal_start..]);
    out
}

/// Expand PackBits packets back into raw bytes.
pub fn decode(data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let header = data[i] as i8;
        i += 1;
        match header {
            -128 => {}
            n if n < 0 => {
                let value = *data.get(i).ok_or_else(|| {
                    ProtocolError::CorruptLine(format!("run packet at {} has no value", i - 1))
                })?;
                out.extend(std::iter::repeat_n(value, (1 - n as isize) as usize));
                i += 1;
            }
            n => {
                let len = n as usize + 1;
                let literal = data.get(i..i + len).ok_or_else(|| {
                    ProtocolError::CorruptLine(format!(
                        "literal packet at {} needs {} bytes",
                        i - 1,
                        len
                    ))
                })?;
                out.extend_from_slice(literal);
                i += len;
            }
        }
    }

    Ok(out)
}

/// Frame `data` as literal packets only (no compression).
///
/// Used for lines sent uncompressed while the printer is in compression mode.
pub fn literal(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len().div_ceil(MAX_PACKET));
    for chunk in data.chunks(MAX_PACKET) {
        flush_literal(&mut out, chunk);
    }
    out
}

fn run_length(data: &[u8]) -> usize {
    let first = data[0];
    data.iter()
        .take(MAX_PACKET)
        .take_while(|&&b| b == first)
        .count()
}

fn flush_literal(out: &mut Vec<u8>, literal: &[u8]) {
    if literal.is_empty() {
        return;
    }
    out.push((literal.len() - 1) as u8);
    out.extend_from_slice(literal);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_all_zero_line() {
        let line = [0u8; 16];
        let packed = encode(&line);
        assert_eq!(packed, vec![0xF1, 0x00]);
        assert_eq!(decode(&packed).unwrap(), line);
    }

    #[test]
    fn test_all_one_line() {
        let line = [0xFFu8; 16];
        let packed = encode(&line);
        assert_eq!(packed, vec![0xF1, 0xFF]);
        assert_eq!(decode(&packed).unwrap(), line);
    }

    #[test]
    fn test_mixed_runs_and_literals() {
        let line = [0x00, 0x00, 0x00, 0x00, 0xAB, 0xCD];
        let packed = encode(&line);
        assert_eq!(packed, vec![0xFD, 0x00, 0x01, 0xAB, 0xCD]);
        assert_eq!(decode(&packed).unwrap(), line);
    }

    #[test]
    fn test_randomized_round_trip() {
        let mut rng = StdRng::seed_from_u64(0x5054);
        for _ in 0..500 {
            let len = rng.random_range(1..=300);
            // Bias towards few distinct values so runs actually occur
            let palette: [u8; 3] = [0x00, 0xFF, rng.random()];
            let data: Vec<u8> = (0..len)
                .map(|_| palette[rng.random_range(0..palette.len())])
                .collect();
            assert_eq!(decode(&encode(&data)).unwrap(), data);
        }
    }

    #[test]
    fn test_never_emits_noop_header() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let data: Vec<u8> = (0..400).map(|_| rng.random_range(0..2) * 0xFF).collect();
            let packed = encode(&data);
            let mut i = 0;
            while i < packed.len() {
                let header = packed[i] as i8;
                assert_ne!(header, -128);
                i += if header < 0 { 2 } else { header as usize + 2 };
            }
        }
    }

    #[test]
    fn test_literal_framing() {
        let data: Vec<u8> = (0..16).collect();
        let framed = literal(&data);
        assert_eq!(framed[0], 0x0F);
        assert_eq!(&framed[1..], &data[..]);
        assert_eq!(decode(&framed).unwrap(), data);
    }

    #[test]
    fn test_long_literal_splits() {
        let data: Vec<u8> = (0..200u32).map(|i| (i as u8).wrapping_mul(37)).collect();
        assert_eq!(decode(&literal(&data)).unwrap(), data);
        assert_eq!(decode(&encode(&data)).unwrap(), data);
    }

    #[test]
    fn test_truncated_input() {
        assert!(decode(&[0xF1]).is_err());
        assert!(decode(&[0x03, 0x01, 0x02]).is_err());
    }
}
