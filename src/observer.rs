//! Per-sample progress reporting.
//!
//! Sessions block on serial reads for the whole sweep. Before every read they call
//! [`ScanObserver::pump`] so a caller with an event loop can keep it turning, and after every
//! interpreted sample they hand an event to [`ScanObserver::on_event`].

use crate::types::{LdrSample, LightClass, Opcode, TelemeterReading};
use std::fmt;

/// Something that happened during a session, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// An object sweep sample. Masked samples are recorded as 0.
    Object { distance: i32, masked: bool },
    /// A light sweep sample.
    Light { sample: LdrSample, class: LightClass },
    /// A combined sweep sample.
    LightObject {
        distance: i32,
        masked: bool,
        sample: LdrSample,
        class: LightClass,
    },
    /// A telemeter reading.
    Telemeter(TelemeterReading),
    /// The device started executing a script opcode.
    Opcode(Opcode),
    /// Result of a playback `servo_deg`.
    ServoPosition { distance: i32, angle: i32 },
    /// Result of a playback `servo_scan`.
    Sweep { distances: Vec<u32>, angles: Vec<f64> },
}

fn light_prefix(f: &mut fmt::Formatter<'_>, sample: &LdrSample) -> fmt::Result {
    write!(
        f,
        "Left LDR value: {:.2} [V] | Right LDR value: {:.2} [V] | Estimate Distance: {} [cm]",
        sample.left, sample.right, sample.light_distance
    )
}

impl fmt::Display for ScanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanEvent::Object { distance, masked } => {
                write!(f, "Distance: {:>3} [cm]", distance)?;
                if *masked {
                    write!(f, " - MASKED")?;
                }
                Ok(())
            }
            ScanEvent::Light { sample, class } => {
                light_prefix(f, sample)?;
                write!(f, " - {}", class)
            }
            ScanEvent::LightObject {
                distance,
                masked,
                sample,
                class,
            } => {
                write!(f, "Measured Distance: {} [cm]", distance)?;
                if *masked {
                    write!(f, " (MASKED)")?;
                }
                write!(
                    f,
                    " | Estimate Light Distance: {} [cm] - {}",
                    sample.light_distance, class
                )
            }
            ScanEvent::Telemeter(reading) => write!(f, "Distance: {:>3} [cm]", reading.distance),
            ScanEvent::Opcode(opcode) => {
                write!(f, "Playing Opcode {}: ({})", opcode.code(), opcode)
            }
            ScanEvent::ServoPosition { distance, angle } => {
                write!(f, "Distance: {} [cm], Angle: {} [deg]", distance, angle)
            }
            ScanEvent::Sweep { distances, angles } => {
                write!(
                    f,
                    "Distance array: {:?} | Degree array: {:?}",
                    distances, angles
                )
            }
        }
    }
}

/// Receives progress from a running session.
pub trait ScanObserver {
    /// Called before every blocking read.
    fn pump(&mut self) {}

    /// Called once per interpreted sample or playback step.
    fn on_event(&mut self, event: &ScanEvent);
}

impl<F: FnMut(&ScanEvent)> ScanObserver for F {
    fn on_event(&mut self, event: &ScanEvent) {
        self(event)
    }
}

/// Discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ScanObserver for NoopObserver {
    fn on_event(&mut self, _event: &ScanEvent) {}
}
