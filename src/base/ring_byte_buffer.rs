use std::cmp::min;
use std::io::{Read, Write};

/// A ring byte buffer holding bytes received from the scanner until a delimiter shows up.
///
/// Bytes are appended at the tail by [`read_from`](RingByteBuffer::read_from) and removed from
/// the head by [`take`](RingByteBuffer::take) once a frame boundary is known.
///
/// # Example
///
/// ```rust
/// # use std::io::Write;
/// # use proxscan::base::RingByteBuffer;
/// let mut buffer = RingByteBuffer::with_capacity(16);
/// buffer.write(b"123\n").unwrap();
/// assert_eq!(buffer.position(b'\n'), Some(3));
/// assert_eq!(buffer.take(4), b"123\n".to_vec());
/// assert!(buffer.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RingByteBuffer {
    buf: Vec<u8>,
    head: usize,
    size: usize,
}

impl RingByteBuffer {
    /// Creates a new `RingByteBuffer` with the specified capacity.
    pub fn with_capacity(capacity: usize) -> RingByteBuffer {
        RingByteBuffer {
            buf: vec![0; capacity],
            head: 0,
            size: 0,
        }
    }

    /// Returns the number of bytes currently stored in the buffer.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the buffer contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the total capacity of the buffer in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Returns the amount of free space available in the buffer in bytes.
    pub fn free_space(&self) -> usize {
        self.buf.len() - self.size
    }

    fn tail(&self) -> usize {
        (self.head + self.size) % self.buf.len()
    }

    fn byte_at(&self, offset: usize) -> u8 {
        self.buf[(self.head + offset) % self.buf.len()]
    }

    /// Returns the offset (from the oldest stored byte) of the first occurrence of `delimiter`.
    pub fn position(&self, delimiter: u8) -> Option<usize> {
        (0..self.size).find(|&offset| self.byte_at(offset) == delimiter)
    }

    /// Removes up to `count` bytes from the head of the buffer and returns them in order.
    pub fn take(&mut self, count: usize) -> Vec<u8> {
        let count = min(count, self.size);
        let taken: Vec<u8> = (0..count).map(|offset| self.byte_at(offset)).collect();
        self.head = (self.head + count) % self.buf.len();
        self.size -= count;
        taken
    }

    /// Drops every stored byte.
    pub fn clear(&mut self) {
        self.head = 0;
        self.size = 0;
    }

    fn current_write_slice(&mut self) -> &mut [u8] {
        let tail = self.tail();
        let end = min(self.buf.len(), tail + self.free_space());
        &mut self.buf[tail..end]
    }

    fn mark_bytes_as_written(&mut self, bytes: usize) {
        self.size += min(self.free_space(), bytes);
    }

    /// Performs a single read from `upstream` into the free space at the tail.
    ///
    /// Exactly one call to `upstream.read` is made so a serial port with a read timeout blocks
    /// at most once. Errors (including `TimedOut`) are returned to the caller untouched;
    /// `Ok(0)` means the upstream reached end-of-file, or the buffer is full.
    pub fn read_from(&mut self, upstream: &mut impl Read) -> std::io::Result<usize> {
        if self.free_space() == 0 {
            return Ok(0);
        }
        let read = upstream.read(self.current_write_slice())?;
        self.mark_bytes_as_written(read);
        Ok(read)
    }
}

impl Write for RingByteBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut written = 0;
        while written < buf.len() && self.free_space() > 0 {
            let slice = self.current_write_slice();
            let chunk = min(slice.len(), buf.len() - written);
            slice[..chunk].copy_from_slice(&buf[written..written + chunk]);
            self.mark_bytes_as_written(chunk);
            written += chunk;
        }
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::RingByteBuffer;
    use std::io::{Cursor, Write};

    #[test]
    fn delimiter_search_wraps_around() {
        let mut buffer = RingByteBuffer::with_capacity(6);
        buffer.write_all(b"1234").unwrap();
        assert_eq!(buffer.take(3), b"123".to_vec());
        buffer.write_all(b"5\n7").unwrap();
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.position(b'\n'), Some(2));
        assert_eq!(buffer.take(3), b"45\n".to_vec());
        assert_eq!(buffer.take(10), b"7".to_vec());
        assert!(buffer.is_empty());
    }

    #[test]
    fn read_from_stops_when_full() {
        let mut buffer = RingByteBuffer::with_capacity(4);
        let mut upstream = Cursor::new(b"abcdef".to_vec());
        assert_eq!(buffer.read_from(&mut upstream).unwrap(), 4);
        assert_eq!(buffer.free_space(), 0);
        assert_eq!(buffer.read_from(&mut upstream).unwrap(), 0);
        assert_eq!(buffer.position(b'z'), None);
    }
}
