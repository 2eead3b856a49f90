//! Byte sinks and sources
//!
//! The encoder writes through a [`Sink`] and the decoder reads through a
//! [`Source`]. The crate ships a growable in-memory buffer, a fixed
//! caller-provided buffer and a slice cursor; chunked file or stream adapters
//! implement the same two traits and host the codec unchanged.

use crate::error::{Error, Result};

/// Destination for encoded bytes
pub trait Sink {
    /// Bytes written so far
    fn position(&self) -> usize;

    /// Bytes that fit before [`Sink::on_capacity_full`] must run
    fn remaining_capacity(&self) -> usize;

    /// Make room for at least `additional` more bytes, or fail
    fn on_capacity_full(&mut self, additional: usize) -> Result<()>;

    /// Append bytes; callers guarantee the capacity
    fn append(&mut self, bytes: &[u8]);

    /// Write one byte
    #[inline]
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write_bytes(&[byte])
    }

    /// Write a run of bytes
    #[inline]
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.remaining_capacity() {
            self.on_capacity_full(bytes.len())?;
            if bytes.len() > self.remaining_capacity() {
                return Err(Error::ShortBuffer);
            }
        }
        self.append(bytes);
        Ok(())
    }
}

/// Origin of bytes to decode
pub trait Source {
    /// Bytes consumed so far
    fn position(&self) -> usize;

    /// Bytes left to read
    fn remaining(&self) -> usize;

    /// Read one byte
    fn read_byte(&mut self) -> Result<u8>;

    /// Read exactly `len` bytes
    fn read_bytes(&mut self, len: usize) -> Result<&[u8]>;

    /// True if the next byte equals `byte` (does not consume)
    fn peek_matches(&self, byte: u8) -> bool;

    /// Read up to and including a zero byte, appending everything before it
    fn read_terminated(&mut self, out: &mut Vec<u8>) -> Result<()> {
        loop {
            match self.read_byte()? {
                0 => return Ok(()),
                byte => out.push(byte),
            }
        }
    }
}

/// Growable in-memory output buffer
///
/// Starts at a small capacity; the first overflow jumps to a larger base
/// capacity, after which capacity doubles until the write fits.
#[derive(Debug)]
pub struct GrowableBuffer {
    bytes: Vec<u8>,
    capacity: usize,
    base_capacity: usize,
}

impl GrowableBuffer {
    /// Create a buffer with the given starting and base capacities
    pub fn new(initial_capacity: usize, base_capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(initial_capacity),
            capacity: initial_capacity,
            base_capacity: base_capacity.max(1),
        }
    }

    /// Current logical capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Written bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Take the written bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Sink for GrowableBuffer {
    #[inline]
    fn position(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    fn remaining_capacity(&self) -> usize {
        self.capacity - self.bytes.len()
    }

    fn on_capacity_full(&mut self, additional: usize) -> Result<()> {
        let needed = self
            .bytes
            .len()
            .checked_add(additional)
            .ok_or(Error::ShortBuffer)?;

        let mut capacity = self.capacity.max(self.base_capacity);
        while capacity < needed {
            capacity = capacity.checked_mul(2).ok_or(Error::ShortBuffer)?;
        }

        log::trace!("[buffer] growing {} -> {} bytes", self.capacity, capacity);
        self.bytes.reserve_exact(capacity - self.bytes.len());
        self.capacity = capacity;
        Ok(())
    }

    #[inline]
    fn append(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }
}

/// Output into a caller-provided fixed buffer
#[derive(Debug)]
pub struct SliceSink<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> SliceSink<'a> {
    /// Wrap a buffer; writing starts at offset zero
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Written prefix of the buffer
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.pos]
    }
}

impl Sink for SliceSink<'_> {
    #[inline]
    fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    fn remaining_capacity(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn on_capacity_full(&mut self, _additional: usize) -> Result<()> {
        Err(Error::ShortBuffer)
    }

    #[inline]
    fn append(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }
}

/// Cursor for reading a byte slice with position tracking
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    /// Buffer being read
    pub buf: &'a [u8],
    /// Current read position
    pub pos: usize,
}

impl<'a> Cursor<'a> {
    /// Cursor at the start of `buf`
    #[inline]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Check if cursor is at end
    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Skip bytes in the cursor
    #[inline]
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    /// Peek at bytes without advancing cursor
    #[inline]
    pub fn peek_bytes(&self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        Ok(&self.buf[self.pos..self.pos + len])
    }

    #[inline]
    fn ensure(&self, needed: usize) -> Result<()> {
        if needed > self.buf.len() - self.pos {
            return Err(Error::OutOfBounds {
                position: self.pos,
                needed,
                len: self.buf.len(),
            });
        }
        Ok(())
    }
}

impl Source for Cursor<'_> {
    #[inline]
    fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    fn read_byte(&mut self) -> Result<u8> {
        self.ensure(1)?;
        let value = self.buf[self.pos];
        self.pos += 1;
        Ok(value)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> Result<&[u8]> {
        self.ensure(len)?;
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    #[inline]
    fn peek_matches(&self, byte: u8) -> bool {
        self.buf.get(self.pos) == Some(&byte)
    }

    fn read_terminated(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let rest = &self.buf[self.pos..];
        match rest.iter().position(|&b| b == 0) {
            Some(end) => {
                out.extend_from_slice(&rest[..end]);
                self.pos += end + 1;
                Ok(())
            }
            None => Err(Error::OutOfBounds {
                position: self.buf.len(),
                needed: 1,
                len: self.buf.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_policy() {
        let mut buf = GrowableBuffer::new(64, 4096);
        buf.write_bytes(&[1; 64]).unwrap();
        assert_eq!(buf.capacity(), 64);

        buf.write_byte(2).unwrap();
        assert_eq!(buf.capacity(), 4096);

        buf.write_bytes(&[3; 5000]).unwrap();
        assert_eq!(buf.capacity(), 8192);
        assert_eq!(buf.position(), 5065);
        assert_eq!(buf.as_slice()[64], 2);
    }

    #[test]
    fn test_slice_sink_short_buffer() {
        let mut storage = [0u8; 4];
        let mut sink = SliceSink::new(&mut storage);
        sink.write_bytes(&[1, 2, 3]).unwrap();
        assert_eq!(sink.write_bytes(&[4, 5]), Err(Error::ShortBuffer));
        sink.write_byte(4).unwrap();
        assert_eq!(sink.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_cursor_operations() {
        let data = [1, 2, 0, 4, 5, 6, 7, 8];
        let mut cursor = Cursor::new(&data);

        assert_eq!(cursor.remaining(), 8);
        assert!(cursor.peek_matches(1));

        let mut text = Vec::new();
        cursor.read_terminated(&mut text).unwrap();
        assert_eq!(text, vec![1, 2]);
        assert_eq!(cursor.position(), 3);

        cursor.skip(1).unwrap();
        assert_eq!(cursor.peek_bytes(2).unwrap(), &[5, 6]);
        assert_eq!(cursor.read_bytes(4).unwrap(), &[5, 6, 7, 8]);
        assert!(cursor.is_at_end());

        assert_eq!(
            cursor.read_byte(),
            Err(Error::OutOfBounds {
                position: 8,
                needed: 1,
                len: 8
            })
        );
    }

    #[test]
    fn test_unterminated_string() {
        let data = [b'a', b'b'];
        let mut cursor = Cursor::new(&data);
        assert!(cursor.read_terminated(&mut Vec::new()).is_err());
    }
}
