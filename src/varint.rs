//! Variable-length integer encoding (LEB128 and sign-magnitude variants)
//!
//! Three wire forms share the same 7-bits-per-byte layout:
//!
//! - positive: plain little-endian base-128, high bit set while more bytes follow
//! - signed: first byte carries a continuation bit, a sign bit and the low six
//!   magnitude bits; the remaining magnitude follows as a positive varint.
//!   A set sign bit with zero magnitude is negative zero.
//! - big: the signed layout continued for as many 7-bit groups as the
//!   magnitude needs

use crate::error::{Error, Result};

/// Maximum bytes needed for a u64 varint (10 bytes)
pub const MAX_VARINT_U64_SIZE: usize = 10;

/// Maximum bytes needed for a signed varint with a u64 magnitude
pub const MAX_VARINT_SIGNED_SIZE: usize = 10;

const CONTINUE: u8 = 0x80;
const SIGN: u8 = 0x40;
const LOW_SIX: u8 = 0x3F;

/// Encode a u64 as varint into the given buffer
///
/// Returns the number of bytes written, or Error::ShortBuffer if insufficient space.
#[inline]
pub fn encode_u64(value: u64, buf: &mut [u8]) -> Result<usize> {
    let mut value = value;
    let mut pos = 0;

    loop {
        if pos >= buf.len() {
            return Err(Error::ShortBuffer);
        }

        if value < 0x80 {
            buf[pos] = value as u8;
            return Ok(pos + 1);
        }

        buf[pos] = (value as u8) | CONTINUE;
        value >>= 7;
        pos += 1;
    }
}

/// Read a u64 varint one byte at a time
///
/// `position` is the stream offset of the first byte and is only used for
/// error reporting.
#[inline]
pub fn read_u64(position: usize, mut next: impl FnMut() -> Result<u8>) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;

    loop {
        let byte = next()?;
        let bits = (byte & 0x7F) as u64;

        if shift >= 64 || (bits << shift) >> shift != bits {
            return Err(Error::InvalidVarint { position });
        }
        result |= bits << shift;

        if byte & CONTINUE == 0 {
            return Ok(result);
        }

        shift += 7;
    }
}

/// Decode a u64 varint from the given buffer
///
/// Returns (value, bytes_consumed) or an error.
#[inline]
pub fn decode_u64(buf: &[u8]) -> Result<(u64, usize)> {
    let mut pos = 0;
    let value = read_u64(0, || next_in(buf, &mut pos))?;
    Ok((value, pos))
}

/// Encode a sign and u64 magnitude into the given buffer
#[inline]
pub fn encode_signed(negative: bool, magnitude: u64, buf: &mut [u8]) -> Result<usize> {
    if buf.is_empty() {
        return Err(Error::ShortBuffer);
    }

    let mut first = (magnitude as u8) & LOW_SIX;
    if negative {
        first |= SIGN;
    }

    let rest = magnitude >> 6;
    if rest == 0 {
        buf[0] = first;
        return Ok(1);
    }

    buf[0] = first | CONTINUE;
    Ok(1 + encode_u64(rest, &mut buf[1..])?)
}

/// Read a signed varint one byte at a time
///
/// Returns (negative, magnitude).
#[inline]
pub fn read_signed(position: usize, mut next: impl FnMut() -> Result<u8>) -> Result<(bool, u64)> {
    let first = next()?;
    let negative = first & SIGN != 0;
    let low = (first & LOW_SIX) as u64;

    if first & CONTINUE == 0 {
        return Ok((negative, low));
    }

    let rest = read_u64(position, next)?;
    if rest >> 58 != 0 {
        return Err(Error::InvalidVarint { position });
    }

    Ok((negative, (rest << 6) | low))
}

/// Decode a signed varint from the given buffer
///
/// Returns (negative, magnitude, bytes_consumed).
#[inline]
pub fn decode_signed(buf: &[u8]) -> Result<(bool, u64, usize)> {
    let mut pos = 0;
    let (negative, magnitude) = read_signed(0, || next_in(buf, &mut pos))?;
    Ok((negative, magnitude, pos))
}

/// Append the big-varint form of a sign and little-endian magnitude
pub fn encode_big(negative: bool, magnitude: &[u8], out: &mut Vec<u8>) {
    let bit_len = bit_length(magnitude);

    let mut first = take_bits(magnitude, 0, 6);
    if negative && bit_len > 0 {
        first |= SIGN;
    }
    if bit_len <= 6 {
        out.push(first);
        return;
    }
    out.push(first | CONTINUE);

    let mut offset = 6;
    while offset < bit_len {
        let group = take_bits(magnitude, offset, 7);
        offset += 7;
        out.push(if offset < bit_len { group | CONTINUE } else { group });
    }
}

/// Read a big varint one byte at a time
///
/// Returns (negative, little-endian magnitude without trailing zero bytes).
pub fn read_big(mut next: impl FnMut() -> Result<u8>) -> Result<(bool, Vec<u8>)> {
    let first = next()?;
    let negative = first & SIGN != 0;

    let mut sink = BitSink::default();
    sink.push(first & LOW_SIX, 6);

    let mut more = first & CONTINUE != 0;
    while more {
        let byte = next()?;
        sink.push(byte & 0x7F, 7);
        more = byte & CONTINUE != 0;
    }

    let magnitude = sink.finish();
    Ok((negative && !magnitude.is_empty(), magnitude))
}

#[inline]
fn next_in(buf: &[u8], pos: &mut usize) -> Result<u8> {
    match buf.get(*pos) {
        Some(&byte) => {
            *pos += 1;
            Ok(byte)
        }
        None => Err(Error::OutOfBounds {
            position: *pos,
            needed: 1,
            len: buf.len(),
        }),
    }
}

/// Number of significant bits in a little-endian magnitude
pub fn bit_length(magnitude: &[u8]) -> usize {
    match magnitude.iter().rposition(|&b| b != 0) {
        Some(top) => top * 8 + (8 - magnitude[top].leading_zeros() as usize),
        None => 0,
    }
}

/// Extract `count` (<= 8) bits starting at bit `offset`
fn take_bits(magnitude: &[u8], offset: usize, count: usize) -> u8 {
    let byte = offset / 8;
    let shift = offset % 8;
    let lo = magnitude.get(byte).copied().unwrap_or(0) as u16;
    let hi = magnitude.get(byte + 1).copied().unwrap_or(0) as u16;
    let window = (lo | (hi << 8)) >> shift;
    (window & ((1u16 << count) - 1)) as u8
}

/// Little-endian bit accumulator used to rebuild big magnitudes
#[derive(Default)]
struct BitSink {
    bytes: Vec<u8>,
    bits: usize,
}

impl BitSink {
    fn push(&mut self, value: u8, count: usize) {
        for i in 0..count {
            let byte = self.bits / 8;
            if byte == self.bytes.len() {
                self.bytes.push(0);
            }
            if value >> i & 1 != 0 {
                self.bytes[byte] |= 1 << (self.bits % 8);
            }
            self.bits += 1;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        while self.bytes.last() == Some(&0) {
            self.bytes.pop();
        }
        self.bytes
    }
}
