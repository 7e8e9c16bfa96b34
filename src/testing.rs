//! Scripted serial port for driving the protocol end-to-end in tests.

use crate::base::Channel;
use crate::config::{ProtocolConfig, TimingConfig};
use crate::link::Link;
use std::collections::VecDeque;
use std::io::{self, Read, Write};

/// One scripted answer to a read: bytes, or an error such as a read timeout.
pub type ScriptedRead = std::result::Result<Vec<u8>, io::ErrorKind>;

/// Serves a fixed script of reads and records every written byte.
///
/// Once the script is exhausted reads return `Ok(0)`, which the channel treats as a closed port,
/// so a test that under-feeds a session fails instead of hanging.
#[derive(Debug, Default)]
pub struct MockPort {
    reads: VecDeque<ScriptedRead>,
    output: Vec<u8>,
}

impl MockPort {
    pub fn new(input: Vec<u8>) -> MockPort {
        MockPort::with_reads(vec![Ok(input)])
    }

    /// Answers successive reads from `reads`, e.g. a chunk, a timeout, then the rest of a frame.
    pub fn with_reads(reads: Vec<ScriptedRead>) -> MockPort {
        MockPort {
            reads: reads.into_iter().collect(),
            output: Vec::new(),
        }
    }

    /// Builds the input script from newline-terminated sensor frames.
    pub fn with_frames<S: AsRef<str>>(frames: &[S]) -> MockPort {
        let mut input = Vec::new();
        for frame in frames {
            input.extend_from_slice(frame.as_ref().as_bytes());
            input.push(b'\n');
        }
        MockPort::new(input)
    }

    pub fn written(&self) -> &[u8] {
        &self.output
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.reads.pop_front() {
                None => return Ok(0),
                Some(Err(kind)) => return Err(kind.into()),
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(mut chunk)) => {
                    let count = chunk.len().min(buf.len());
                    buf[..count].copy_from_slice(&chunk[..count]);
                    if count < chunk.len() {
                        self.reads.push_front(Ok(chunk.split_off(count)));
                    }
                    return Ok(count);
                }
            }
        }
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Routes `log` output through the test harness. Run with `RUST_LOG=trace` to see it.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A zero-delay link over a mock port.
pub fn link(port: MockPort) -> Link<Channel<MockPort>> {
    init_logging();
    Link::new(Channel::new(Box::new(port)), TimingConfig::immediate())
}

/// Protocol configuration with every delay removed.
pub fn config() -> ProtocolConfig {
    ProtocolConfig {
        timing: TimingConfig::immediate(),
        ..ProtocolConfig::current()
    }
}
