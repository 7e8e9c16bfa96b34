use crate::base::error::{Error, Result};
use crate::base::ring_byte_buffer::RingByteBuffer;
use crate::base::traits::Transport;
use log::{error, trace};
use std::io;
use std::time::{Duration, Instant};

const DEFAULT_CHANNEL_READ_BUFFER_SIZE: usize = 1024;

/// Channel sends raw bytes to the scanner and collects delimiter-terminated replies from a stream
///
/// # Examples
/// ```ignore
/// let port = serialport::new("/dev/ttyUSB0", 9600)
///     .timeout(Duration::from_secs(1))
///     .open()?;
/// let mut channel = Channel::new(port);
///
/// channel.write(b"1")?;
/// let line = channel.read_until(b'\n', Duration::from_secs(1))?;
/// ```
#[derive(Debug)]
pub struct Channel<T: ?Sized> {
    stream: Box<T>,
    read_buffer: RingByteBuffer,
}

impl<T: ?Sized> Channel<T>
where
    T: io::Read + io::Write,
{
    /// Create a new `Channel` over a stream with the default receive buffer
    pub fn new(stream: Box<T>) -> Channel<T> {
        trace!(
            "Creating new Channel with default buffer size {}",
            DEFAULT_CHANNEL_READ_BUFFER_SIZE
        );
        Channel::with_read_buffer_size(stream, DEFAULT_CHANNEL_READ_BUFFER_SIZE)
    }

    /// Create a new `Channel` with non-default receive buffer capacity
    pub fn with_read_buffer_size(stream: Box<T>, read_buffer_size: usize) -> Channel<T> {
        trace!("Creating new Channel with buffer size {}", read_buffer_size);
        Channel {
            stream,
            read_buffer: RingByteBuffer::with_capacity(read_buffer_size),
        }
    }

    /// Gives access to the underlying stream, e.g. to inspect what a mock port captured.
    pub fn stream(&self) -> &T {
        &self.stream
    }

    /// Pull whatever the stream has into the receive buffer. Returns `false` when nothing arrived
    /// before the stream's own read timeout.
    fn fill(&mut self) -> Result<bool> {
        match self.read_buffer.read_from(&mut self.stream) {
            Ok(0) => {
                error!("Stream returned end-of-file, port is closed");
                Err(Error::PortClosed)
            }
            Ok(bytes_read) => {
                trace!(
                    "Read {} bytes from stream (buffer len: {})",
                    bytes_read,
                    self.read_buffer.len()
                );
                Ok(true)
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                trace!("Stream read timed out");
                Ok(false)
            }
            Err(e) => {
                error!("IO error reading from stream: {}", e);
                Err(e.into())
            }
        }
    }
}

impl<T: ?Sized> Transport for Channel<T>
where
    T: io::Read + io::Write,
{
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        trace!("Channel write: {:02X?}", bytes);
        if let Err(e) = self.stream.write_all(bytes).and_then(|_| self.stream.flush()) {
            error!("IO error during write: {}", e);
            return Err(e.into());
        }
        Ok(())
    }

    fn read_until(&mut self, delimiter: u8, timeout: Duration) -> Result<Vec<u8>> {
        trace!(
            "Channel read_until {:02X} called with timeout {:?}",
            delimiter,
            timeout
        );
        let start = Instant::now();

        loop {
            if let Some(offset) = self.read_buffer.position(delimiter) {
                let frame = self.read_buffer.take(offset + 1);
                trace!("Delimiter found, returning {} bytes", frame.len());
                return Ok(frame);
            }

            if self.read_buffer.free_space() == 0 {
                trace!("Buffer full without delimiter, returning what we have");
                let len = self.read_buffer.len();
                return Ok(self.read_buffer.take(len));
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                let len = self.read_buffer.len();
                trace!("Timeout reached ({:?}), returning {} partial bytes", elapsed, len);
                return Ok(self.read_buffer.take(len));
            }

            self.fill()?;
        }
    }

    fn read_count(&mut self, count: usize, timeout: Duration) -> Result<Vec<u8>> {
        trace!("Channel read_count {} called with timeout {:?}", count, timeout);
        let start = Instant::now();

        loop {
            if self.read_buffer.len() >= count {
                return Ok(self.read_buffer.take(count));
            }
            if self.read_buffer.free_space() == 0 || start.elapsed() >= timeout {
                let len = self.read_buffer.len();
                trace!("Returning {} of {} bytes", len, count);
                return Ok(self.read_buffer.take(len));
            }
            self.fill()?;
        }
    }

    fn discard_input(&mut self) -> Result<()> {
        trace!("Discarding {} buffered bytes", self.read_buffer.len());
        self.read_buffer.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Channel;
    use crate::base::{Error, Transport};
    use crate::testing::MockPort;
    use std::io::ErrorKind;
    use std::time::Duration;

    #[test]
    fn reads_up_to_and_including_delimiter() {
        let mut channel = Channel::new(Box::new(MockPort::new(b"12\n34\n".to_vec())));
        let timeout = Duration::from_millis(10);
        assert_eq!(channel.read_until(b'\n', timeout).unwrap(), b"12\n".to_vec());
        assert_eq!(channel.read_until(b'\n', timeout).unwrap(), b"34\n".to_vec());
    }

    #[test]
    fn exhausted_stream_is_a_closed_port() {
        let mut channel = Channel::new(Box::new(MockPort::new(b"7".to_vec())));
        let err = channel
            .read_until(b'\n', Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, Error::PortClosed));
    }

    #[test]
    fn zero_timeout_returns_partial_bytes() {
        let mut channel = Channel::new(Box::new(MockPort::new(b"9".to_vec())));
        assert!(channel.read_until(b'\n', Duration::ZERO).unwrap().is_empty());
    }

    #[test]
    fn timed_out_reads_are_retried() {
        let port = MockPort::with_reads(vec![
            Ok(b"4".to_vec()),
            Err(ErrorKind::TimedOut),
            Err(ErrorKind::WouldBlock),
            Ok(b"2\n".to_vec()),
        ]);
        let mut channel = Channel::new(Box::new(port));
        let frame = channel.read_until(b'\n', Duration::from_secs(5)).unwrap();
        assert_eq!(frame, b"42\n".to_vec());
    }

    #[test]
    fn counted_reads_ignore_delimiters() {
        let port = MockPort::with_reads(vec![
            Ok(vec![1, b'\n']),
            Err(ErrorKind::TimedOut),
            Ok(vec![3, b'\n', 5]),
        ]);
        let mut channel = Channel::new(Box::new(port));
        let bytes = channel.read_count(4, Duration::from_secs(5)).unwrap();
        assert_eq!(bytes, vec![1, b'\n', 3, b'\n']);
        assert_eq!(channel.read_count(1, Duration::ZERO).unwrap(), vec![5]);
    }

    #[test]
    fn discarded_input_is_gone() {
        let mut channel = Channel::new(Box::new(MockPort::with_reads(vec![
            Ok(b"old\nstale".to_vec()),
            Ok(b"new\n".to_vec()),
        ])));
        let timeout = Duration::from_secs(5);
        assert_eq!(channel.read_until(b'\n', timeout).unwrap(), b"old\n".to_vec());
        channel.discard_input().unwrap();
        assert_eq!(channel.read_until(b'\n', timeout).unwrap(), b"new\n".to_vec());
    }

    #[test]
    fn writes_are_captured() {
        let mut channel = Channel::new(Box::new(MockPort::new(Vec::new())));
        channel.write(b"U").unwrap();
        channel.write(b"$").unwrap();
        assert_eq!(channel.stream().written(), b"U$");
    }
}
