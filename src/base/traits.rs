use crate::base::error::Result;
use std::time::Duration;

/// A byte-oriented duplex channel to the scanner.
///
/// The protocol is strictly half-duplex request/response, so a transport is always owned by a
/// single driver and never shared between concurrent exchanges.
pub trait Transport {
    /// Writes every byte to the device and flushes. A failure is fatal to the current session.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Reads until `delimiter` has been received or `timeout` elapses.
    ///
    /// Returns the bytes read, including the delimiter when it was seen. A timeout is not an
    /// error: whatever arrived so far (possibly nothing) is returned and the caller decides
    /// whether to poll again.
    fn read_until(&mut self, delimiter: u8, timeout: Duration) -> Result<Vec<u8>>;

    /// Reads up to `count` bytes regardless of their values. Like [`read_until`](Self::read_until)
    /// a timeout returns what arrived so far.
    fn read_count(&mut self, count: usize, timeout: Duration) -> Result<Vec<u8>>;

    /// Drops any bytes received but not yet consumed.
    fn discard_input(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<X: Transport + ?Sized> Transport for &mut X {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes)
    }

    fn read_until(&mut self, delimiter: u8, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read_until(delimiter, timeout)
    }

    fn read_count(&mut self, count: usize, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read_count(count, timeout)
    }

    fn discard_input(&mut self) -> Result<()> {
        (**self).discard_input()
    }
}
