//! Command dispatching and response framing over a [`Transport`].
//!
//! The device reads commands one byte at a time and needs a pause after each of them, so every
//! outgoing byte goes through [`Link::send_command`]. Replies are terminator driven: sensor
//! frames and opcode tokens end with `\n`, upload acknowledges end with `\0`.

use crate::base::{Error, Result, Transport};
use crate::config::TimingConfig;
use crate::internals::*;
use log::{error, trace, warn};
use std::thread;
use std::time::Duration;

/// The single owner of the serial link: dispatcher for outgoing commands, framer for replies.
#[derive(Debug)]
pub struct Link<X> {
    transport: X,
    timing: TimingConfig,
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

fn decode_ascii(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| {
        error!("Frame is not ASCII: {:02X?}", e.as_bytes());
        Error::ProtocolError {
            description: "frame is not ASCII".to_owned(),
        }
    })
}

/// Parses angle text typed by the operator (`"90"`, `" 045 "`) into a servo angle.
pub fn parse_angle(text: &str) -> Result<u16> {
    let angle: u16 = text
        .trim()
        .parse()
        .map_err(|_| Error::malformed(format!("invalid angle {:?}", text)))?;
    if angle > MAX_SERVO_ANGLE {
        return Err(Error::malformed(format!(
            "angle {} is outside 0..={}",
            angle, MAX_SERVO_ANGLE
        )));
    }
    Ok(angle)
}

impl<X: Transport> Link<X> {
    pub fn new(transport: X, timing: TimingConfig) -> Link<X> {
        trace!("Creating new Link with timing {:?}", timing);
        Link { transport, timing }
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn transport(&self) -> &X {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut X {
        &mut self.transport
    }

    pub fn into_transport(self) -> X {
        self.transport
    }

    // Dispatcher

    /// Writes one command byte and waits out the device's processing latency.
    pub fn send_command(&mut self, command: u8) -> Result<()> {
        trace!("Sending command {:?}", command as char);
        self.transport.write(&[command])?;
        pause(self.timing.command_pacing);
        Ok(())
    }

    /// Sends every payload byte as its own paced command, then the `$` terminator.
    pub fn send_data(&mut self, payload: &[u8]) -> Result<()> {
        trace!("Sending {} byte payload", payload.len());
        for &byte in payload {
            self.send_command(byte)?;
        }
        self.transport.write(&[PAYLOAD_TERMINATOR])
    }

    /// Sends an angle as a zero-padded three digit payload, e.g. `7` as `"007$"`.
    pub fn send_angle(&mut self, angle: u16) -> Result<()> {
        if angle > MAX_SERVO_ANGLE {
            return Err(Error::malformed(format!(
                "angle {} is outside 0..={}",
                angle, MAX_SERVO_ANGLE
            )));
        }
        let text = format!("{:03}", angle);
        trace!("Sending angle {}", text);
        self.send_data(text.as_bytes())
    }

    /// Sends a one-byte length prefix (byte value = payload length) followed by the payload.
    pub fn send_length_prefixed(&mut self, payload: &[u8]) -> Result<()> {
        let len = u8::try_from(payload.len()).map_err(|_| {
            Error::malformed(format!(
                "payload of {} bytes does not fit a one-byte length prefix",
                payload.len()
            ))
        })?;
        self.send_command(len)?;
        self.send_data(payload)
    }

    // Framer

    fn read_terminated(&mut self, terminator: u8) -> Result<Vec<u8>> {
        let mut frame = Vec::new();
        while frame.last() != Some(&terminator) {
            let chunk = self
                .transport
                .read_until(terminator, self.timing.read_timeout)?;
            if chunk.is_empty() {
                trace!("No data yet, polling again");
            }
            frame.extend(chunk);
        }
        Ok(frame)
    }

    /// Reads exactly `count` raw bytes. Unlike the line readers, a newline byte is data here.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(count);
        while bytes.len() < count {
            let chunk = self
                .transport
                .read_count(count - bytes.len(), self.timing.read_timeout)?;
            if chunk.is_empty() {
                trace!("No data yet, polling again");
            }
            bytes.extend(chunk);
        }
        trace!("Received {} raw bytes {:02X?}", count, bytes);
        Ok(bytes)
    }

    /// Drops whatever the device sent that nobody read.
    pub fn discard_input(&mut self) -> Result<()> {
        self.transport.discard_input()
    }

    /// Reads one newline-terminated frame without decoding it.
    pub fn read_raw_line(&mut self) -> Result<Vec<u8>> {
        let frame = self.read_terminated(FRAME_TERMINATOR)?;
        trace!("Received raw line {:02X?}", frame);
        Ok(frame)
    }

    /// Reads one newline-terminated frame. The newline is kept.
    pub fn read_line(&mut self) -> Result<String> {
        let frame = self.read_terminated(FRAME_TERMINATOR)?;
        let line = decode_ascii(frame)?;
        trace!("Received line {:?}", line);
        Ok(line)
    }

    /// Reads one sensor frame and parses it as a decimal integer.
    pub fn read_value(&mut self) -> Result<i32> {
        let line = self.read_line()?;
        line.trim().parse().map_err(|_| {
            error!("Sensor frame {:?} is not an integer", line);
            Error::ProtocolError {
                description: format!("sensor frame {:?} is not an integer", line),
            }
        })
    }

    /// Reads one null-terminated acknowledge token and returns it without the terminator.
    pub fn read_ack(&mut self) -> Result<String> {
        let mut frame = self.read_terminated(ACK_TERMINATOR)?;
        frame.pop();
        let token = decode_ascii(frame)?;
        trace!("Received ack {:?}", token);
        Ok(token)
    }

    /// Reads until a non-empty reply arrives. The device may idle before answering, and a token
    /// that arrives without its newline before the read timeout is returned as is.
    pub fn read_nonempty_line(&mut self) -> Result<String> {
        pause(self.timing.token_pre_delay);
        loop {
            let chunk = self
                .transport
                .read_until(FRAME_TERMINATOR, self.timing.read_timeout)?;
            let text = decode_ascii(chunk)?;
            if text.trim().is_empty() {
                if !text.is_empty() {
                    warn!("Skipping empty frame {:?}", text);
                }
                continue;
            }
            trace!("Received token {:?}", text);
            return Ok(text);
        }
    }

    /// Waits the configured gap between the two LDR frames of a light sample.
    pub(crate) fn ldr_pair_pause(&self) {
        pause(self.timing.ldr_pair_delay);
    }

    /// Waits the configured delay before a reply the device needs time to produce.
    pub(crate) fn token_pause(&self) {
        pause(self.timing.token_pre_delay);
    }
}

#[cfg(test)]
mod tests {
    use super::parse_angle;
    use crate::base::Error;
    use crate::testing::{self, MockPort};
    use std::io::ErrorKind;

    #[test]
    fn commands_are_single_bytes() {
        let mut link = testing::link(MockPort::default());
        link.send_command(b'1').unwrap();
        link.send_command(b'U').unwrap();
        assert_eq!(link.transport().stream().written(), b"1U");
    }

    #[test]
    fn data_is_terminated_with_dollar() {
        let mut link = testing::link(MockPort::default());
        link.send_data(b"abc").unwrap();
        assert_eq!(link.transport().stream().written(), b"abc$");
    }

    #[test]
    fn angles_are_zero_padded() {
        let mut link = testing::link(MockPort::default());
        link.send_angle(7).unwrap();
        link.send_angle(180).unwrap();
        assert_eq!(link.transport().stream().written(), b"007$180$");
        assert!(matches!(
            link.send_angle(181),
            Err(Error::MalformedInput { .. })
        ));
    }

    #[test]
    fn length_prefix_is_the_byte_count() {
        let mut link = testing::link(MockPort::default());
        link.send_length_prefixed(b"0102\n").unwrap();
        assert_eq!(link.transport().stream().written(), b"\x050102\n$");

        let too_long = vec![b'x'; 256];
        assert!(matches!(
            link.send_length_prefixed(&too_long),
            Err(Error::MalformedInput { .. })
        ));
    }

    #[test]
    fn angle_text_is_validated() {
        assert_eq!(parse_angle(" 90 ").unwrap(), 90);
        assert_eq!(parse_angle("000").unwrap(), 0);
        assert!(matches!(parse_angle("abc"), Err(Error::MalformedInput { .. })));
        assert!(matches!(parse_angle("-5"), Err(Error::MalformedInput { .. })));
        assert!(matches!(parse_angle("200"), Err(Error::MalformedInput { .. })));
    }

    #[test]
    fn lines_keep_their_newline() {
        let mut link = testing::link(MockPort::new(b"123\n".to_vec()));
        assert_eq!(link.read_line().unwrap(), "123\n");
    }

    #[test]
    fn values_are_parsed() {
        let mut link = testing::link(MockPort::new(b"42\n-1\nxx\n".to_vec()));
        assert_eq!(link.read_value().unwrap(), 42);
        assert_eq!(link.read_value().unwrap(), -1);
        assert!(matches!(link.read_value(), Err(Error::ProtocolError { .. })));
    }

    #[test]
    fn frames_split_by_timeouts_are_joined() {
        let port = MockPort::with_reads(vec![
            Ok(b"1".to_vec()),
            Err(ErrorKind::TimedOut),
            Ok(b"2\n".to_vec()),
        ]);
        let mut link = testing::link(port);
        assert_eq!(link.read_value().unwrap(), 12);
    }

    #[test]
    fn raw_bytes_may_contain_newlines() {
        let port = MockPort::with_reads(vec![
            Ok(vec![b'\n', 20]),
            Err(ErrorKind::TimedOut),
            Ok(vec![30, b'\n']),
        ]);
        let mut link = testing::link(port);
        assert_eq!(link.read_bytes(3).unwrap(), vec![b'\n', 20, 30]);
        assert_eq!(link.read_raw_line().unwrap(), b"\n".to_vec());
    }

    #[test]
    fn ack_drops_the_null() {
        let mut link = testing::link(MockPort::new(b"3\0".to_vec()));
        assert_eq!(link.read_ack().unwrap(), "3");
    }

    #[test]
    fn nonempty_line_skips_blank_frames() {
        let mut link = testing::link(MockPort::new(b"\n\n7\n".to_vec()));
        assert_eq!(link.read_nonempty_line().unwrap(), "7\n");
    }

    #[test]
    fn nonempty_line_waits_through_timeouts() {
        let port = MockPort::with_reads(vec![
            Err(ErrorKind::TimedOut),
            Ok(b"\n".to_vec()),
            Err(ErrorKind::WouldBlock),
            Err(ErrorKind::TimedOut),
            Ok(b"8\n".to_vec()),
        ]);
        let mut link = testing::link(port);
        assert_eq!(link.read_nonempty_line().unwrap(), "8\n");
    }
}
