//! Scan session state machines.
//!
//! Every sweep follows the same shape: the trigger command arms the device, the device reports
//! the start and end angle once, then streams samples until a sentinel. The first `warmup`
//! samples are discarded while the sensors settle. What a sample consists of, and how it is
//! judged, depends on the mode.

use crate::base::{Error, Result, Transport};
use crate::calibration::{find_fitting_index, CalibrationCurve, IndexStrategy};
use crate::config::{LightPolicy, ModeConfig, Sentinel};
use crate::internals::{
    LDR_COUNTS_PER_VOLT, MAX_MAX_DISTANCE, MAX_SERVO_ANGLE, MIN_MAX_DISTANCE,
};
use crate::link::Link;
use crate::observer::{ScanEvent, ScanObserver};
use crate::types::{LdrSample, LightClass, ScanResult, TelemeterReading};
use crate::utils::default_sweep_angles;
use log::{error, trace};

/// Where a sweep is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Trigger sent, waiting for the angle frames.
    Armed,
    /// Discarding settle-in samples.
    Warming,
    /// Recording samples.
    Collecting,
    /// Sentinel received.
    Done,
    /// Angles derived, result handed out.
    Rendered,
}

/// Tracks the lifecycle of one sweep and decides which samples count.
#[derive(Debug, Clone)]
pub struct Sweep {
    mode: ModeConfig,
    state: SessionState,
    seen: usize,
}

impl Sweep {
    pub fn new(mode: ModeConfig) -> Sweep {
        Sweep {
            mode,
            state: SessionState::Idle,
            seen: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        trace!("Sweep {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Sends the trigger and reads the two angle frames.
    fn arm<X: Transport>(&mut self, link: &mut Link<X>) -> Result<(i32, i32)> {
        link.send_command(self.mode.trigger)?;
        self.transition(SessionState::Armed);
        let start = link.read_value()?;
        let end = link.read_value()?;
        trace!("Sweep reported angles {} .. {}", start, end);
        self.transition(if self.mode.warmup == 0 {
            SessionState::Collecting
        } else {
            SessionState::Warming
        });
        Ok((start, end))
    }

    fn is_end(&self, value: i32) -> bool {
        self.mode.sentinel.matches(value)
    }

    /// Counts a sample and returns `true` once warm-up is over.
    fn accept(&mut self) -> bool {
        self.seen += 1;
        if self.seen > self.mode.warmup {
            if self.state == SessionState::Warming {
                self.transition(SessionState::Collecting);
            }
            true
        } else {
            trace!("Discarding warm-up sample {}/{}", self.seen, self.mode.warmup);
            false
        }
    }

    fn finish(&mut self) {
        self.transition(SessionState::Done);
    }

    fn render(&mut self, mut result: ScanResult) -> ScanResult {
        result.angles = default_sweep_angles(result.distances.len());
        self.transition(SessionState::Rendered);
        result
    }
}

/// Rejects object thresholds outside what the shell offers.
pub fn validate_max_distance(max_distance: u32) -> Result<u32> {
    if !(MIN_MAX_DISTANCE..=MAX_MAX_DISTANCE).contains(&max_distance) {
        return Err(Error::malformed(format!(
            "max distance {} is outside {}..={}",
            max_distance, MIN_MAX_DISTANCE, MAX_MAX_DISTANCE
        )));
    }
    Ok(max_distance)
}

/// Applies the object masking policy: readings at or beyond `max_distance` are recorded as 0.
/// Returns the recorded value and whether it was masked.
pub fn mask_distance(distance: i32, max_distance: u32) -> (u32, bool) {
    let distance = distance.max(0) as u32;
    if distance >= max_distance {
        (0, true)
    } else {
        (distance, false)
    }
}

/// Classifies a pair of LDR readings.
///
/// Disagreeing or saturated readings are noise; agreeing readings farther than the masking
/// distance are masked; everything else is light.
pub fn classify_light(sample: &LdrSample, policy: &LightPolicy) -> LightClass {
    let agree = (sample.left - sample.right).abs() < policy.epsilon;
    let in_range = sample.left < policy.max_voltage && sample.right < policy.max_voltage;
    if !(agree && in_range) {
        LightClass::Noise
    } else if sample.light_distance > policy.masking_distance {
        LightClass::Masked
    } else {
        LightClass::Light
    }
}

/// Suppresses single-frame light transients: the first sample of a light run records 0, the
/// following ones record their distance. Any non-light sample ends the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightEdgeFilter {
    in_run: bool,
}

impl LightEdgeFilter {
    pub fn record(&mut self, class: LightClass, light_distance: u32) -> u32 {
        match class {
            LightClass::Light => {
                let value = if self.in_run { light_distance } else { 0 };
                self.in_run = true;
                value
            }
            LightClass::Noise | LightClass::Masked => {
                self.in_run = false;
                0
            }
        }
    }
}

/// What the light sessions need to turn LDR counts into distances.
#[derive(Clone, Copy)]
pub struct LightContext<'a> {
    pub curve: &'a CalibrationCurve,
    pub strategy: &'a dyn IndexStrategy,
    pub policy: &'a LightPolicy,
}

enum LdrReading {
    /// First reading exceeded the overflow marker. The second one is not sent.
    Overflow,
    Sample(LdrSample),
}

fn read_ldr_pair<X: Transport>(
    link: &mut Link<X>,
    light: &LightContext<'_>,
    overflow: Sentinel,
) -> Result<LdrReading> {
    let first = link.read_value()?;
    // Checked before warm-up is counted, so an overflow ends a light sweep even while warming.
    if overflow.matches(first) {
        trace!("LDR overflow marker {}", first);
        return Ok(LdrReading::Overflow);
    }
    link.ldr_pair_pause();
    let second = link.read_value()?;

    let left = f64::from(first) / LDR_COUNTS_PER_VOLT;
    let right = f64::from(second) / LDR_COUNTS_PER_VOLT;
    let index = find_fitting_index(light.curve, light.strategy, left, right);
    Ok(LdrReading::Sample(LdrSample {
        left,
        right,
        light_distance: index as u32 + 1,
    }))
}

/// Runs one ultrasonic object sweep.
pub fn object_scan<X: Transport, O: ScanObserver + ?Sized>(
    link: &mut Link<X>,
    mode: ModeConfig,
    max_distance: u32,
    observer: &mut O,
) -> Result<ScanResult> {
    let max_distance = validate_max_distance(max_distance)?;
    let mut sweep = Sweep::new(mode);
    let (start_angle, end_angle) = sweep.arm(link)?;
    let mut result = ScanResult {
        start_angle,
        end_angle,
        ..ScanResult::default()
    };

    loop {
        observer.pump();
        let distance = link.read_value()?;
        if sweep.is_end(distance) {
            break;
        }
        if !sweep.accept() {
            continue;
        }
        let (recorded, masked) = mask_distance(distance, max_distance);
        trace!("Object sample {} -> {} (masked: {})", distance, recorded, masked);
        result.distances.push(recorded);
        result.masked.push(masked);
        observer.on_event(&ScanEvent::Object { distance, masked });
    }
    sweep.finish();
    Ok(sweep.render(result))
}

/// Runs one LDR light source sweep. The sweep ends when the first LDR reading of a sample
/// matches the mode's sentinel.
pub fn light_scan<X: Transport, O: ScanObserver + ?Sized>(
    link: &mut Link<X>,
    mode: ModeConfig,
    light: &LightContext<'_>,
    observer: &mut O,
) -> Result<ScanResult> {
    let mut sweep = Sweep::new(mode);
    let (start_angle, end_angle) = sweep.arm(link)?;
    let mut result = ScanResult {
        start_angle,
        end_angle,
        ..ScanResult::default()
    };
    let mut edge = LightEdgeFilter::default();

    loop {
        observer.pump();
        let sample = match read_ldr_pair(link, light, mode.sentinel)? {
            LdrReading::Overflow => break,
            LdrReading::Sample(sample) => sample,
        };
        if !sweep.accept() {
            continue;
        }
        let class = classify_light(&sample, light.policy);
        let recorded = edge.record(class, sample.light_distance);
        trace!("Light sample {:?} -> {:?}, recorded {}", sample, class, recorded);
        result.distances.push(recorded);
        result.masked.push(class == LightClass::Masked);
        observer.on_event(&ScanEvent::Light { sample, class });
    }
    sweep.finish();
    result.lights = Some(result.distances.clone());
    Ok(sweep.render(result))
}

/// Runs one combined sweep: every sample is a distance frame followed by an LDR pair, judged
/// independently by the object and the light policy.
pub fn light_object_scan<X: Transport, O: ScanObserver + ?Sized>(
    link: &mut Link<X>,
    mode: ModeConfig,
    ldr_overflow: Sentinel,
    max_distance: u32,
    light: &LightContext<'_>,
    observer: &mut O,
) -> Result<ScanResult> {
    let max_distance = validate_max_distance(max_distance)?;
    let mut sweep = Sweep::new(mode);
    let (start_angle, end_angle) = sweep.arm(link)?;
    let mut result = ScanResult {
        start_angle,
        end_angle,
        ..ScanResult::default()
    };
    let mut lights = Vec::new();
    let mut edge = LightEdgeFilter::default();

    loop {
        observer.pump();
        let distance = link.read_value()?;
        if sweep.is_end(distance) {
            break;
        }
        let reading = read_ldr_pair(link, light, ldr_overflow)?;
        if !sweep.accept() {
            continue;
        }

        let (recorded, masked) = mask_distance(distance, max_distance);
        // An overflowing LDR pair reads as a zero sample and goes through the usual rules.
        let sample = match reading {
            LdrReading::Sample(sample) => sample,
            LdrReading::Overflow => LdrSample {
                left: 0.0,
                right: 0.0,
                light_distance: 0,
            },
        };
        let class = classify_light(&sample, light.policy);
        let light_recorded = edge.record(class, sample.light_distance);
        trace!(
            "Combined sample {} -> {} (masked: {}), light {:?} -> {}",
            distance,
            recorded,
            masked,
            class,
            light_recorded
        );
        result.distances.push(recorded);
        result.masked.push(masked);
        lights.push(light_recorded);
        observer.on_event(&ScanEvent::LightObject {
            distance,
            masked,
            sample,
            class,
        });
    }
    sweep.finish();
    result.lights = Some(lights);
    Ok(sweep.render(result))
}

/// Starts the telemeter at `angle`.
pub fn telemeter_start<X: Transport>(link: &mut Link<X>, start: u8, angle: u16) -> Result<()> {
    if angle > MAX_SERVO_ANGLE {
        error!("Telemeter angle {} out of range", angle);
        return Err(Error::malformed(format!(
            "angle {} is outside 0..={}",
            angle, MAX_SERVO_ANGLE
        )));
    }
    link.send_command(start)?;
    link.send_angle(angle)
}

/// Reads one telemeter (distance, angle) frame pair.
pub fn telemeter_poll<X: Transport, O: ScanObserver + ?Sized>(
    link: &mut Link<X>,
    observer: &mut O,
) -> Result<TelemeterReading> {
    observer.pump();
    let distance = link.read_value()?;
    let angle = link.read_value()?;
    let reading = TelemeterReading { distance, angle };
    observer.on_event(&ScanEvent::Telemeter(reading));
    Ok(reading)
}
