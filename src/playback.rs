//! Follows a script the device replays from one of its upload slots.
//!
//! After the play command the device announces each opcode it executes. Most opcodes only
//! drive the LCD and are reported as they come; `servo_deg` is followed by one
//! (distance, angle) frame pair, `servo_scan` by a full sweep, and `sleep` ends the script.
//! Unlike the script encoder, an opcode the host does not know is an error here.

use crate::base::{Error, Result, Transport};
use crate::config::Sentinel;
use crate::link::Link;
use crate::observer::{ScanEvent, ScanObserver};
use crate::types::{Opcode, ScanResult, TelemeterReading};
use crate::utils::derive_angles;
use log::{error, trace};

/// Everything the device reported while replaying a script.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaybackReport {
    /// Opcodes in execution order, including the final `sleep`.
    pub opcodes: Vec<Opcode>,
    /// Readings taken by `servo_deg`.
    pub positions: Vec<TelemeterReading>,
    /// Sweeps run by `servo_scan`, with angles spread between the reported endpoints.
    pub sweeps: Vec<ScanResult>,
}

fn parse_opcode(token: &str) -> Result<Opcode> {
    let trimmed = token.trim();
    trimmed
        .parse::<u8>()
        .ok()
        .and_then(Opcode::from_code)
        .ok_or_else(|| {
            error!("Device reported unknown opcode {:?}", trimmed);
            Error::UnknownOpcode {
                token: trimmed.to_owned(),
            }
        })
}

fn servo_sweep<X: Transport, O: ScanObserver + ?Sized>(
    link: &mut Link<X>,
    sentinel: Sentinel,
    observer: &mut O,
) -> Result<ScanResult> {
    let start_angle = link.read_value()?;
    let end_angle = link.read_value()?;
    trace!("Playback sweep {} .. {}", start_angle, end_angle);

    let mut distances = Vec::new();
    loop {
        observer.pump();
        let distance = link.read_value()?;
        if sentinel.matches(distance) {
            break;
        }
        distances.push(distance.max(0) as u32);
    }

    let angles = derive_angles(distances.len(), f64::from(start_angle), f64::from(end_angle));
    observer.on_event(&ScanEvent::Sweep {
        distances: distances.clone(),
        angles: angles.clone(),
    });
    Ok(ScanResult {
        start_angle,
        end_angle,
        masked: vec![false; distances.len()],
        distances,
        lights: None,
        angles,
    })
}

/// Sends `play_command` and follows the script until the device goes to sleep.
pub fn play<X: Transport, O: ScanObserver + ?Sized>(
    link: &mut Link<X>,
    play_command: u8,
    sweep_sentinel: Sentinel,
    observer: &mut O,
) -> Result<PlaybackReport> {
    link.send_command(play_command)?;
    let mut report = PlaybackReport::default();

    loop {
        observer.pump();
        let opcode = parse_opcode(&link.read_nonempty_line()?)?;
        trace!("Playing opcode {:?}", opcode);
        report.opcodes.push(opcode);
        observer.on_event(&ScanEvent::Opcode(opcode));

        match opcode {
            Opcode::ServoDeg => {
                let distance = link.read_value()?;
                let angle = link.read_value()?;
                report.positions.push(TelemeterReading { distance, angle });
                observer.on_event(&ScanEvent::ServoPosition { distance, angle });
            }
            Opcode::ServoScan => {
                let sweep = servo_sweep(link, sweep_sentinel, observer)?;
                report.sweeps.push(sweep);
            }
            Opcode::Sleep => break,
            Opcode::IncLcd
            | Opcode::DecLcd
            | Opcode::RraLcd
            | Opcode::SetDelay
            | Opcode::ClearLcd => {}
        }
    }
    Ok(report)
}
