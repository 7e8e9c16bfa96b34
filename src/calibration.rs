//! LDR calibration: curve expansion, persistence and distance lookup.
//!
//! The device samples both LDRs against a light source at 10 known distances. The host expands
//! those 10 voltages into a 50 point curve (index 0 closest, index 49 farthest) and, during light
//! scans, maps the average of two live readings to the index of the nearest curve value.

use crate::base::{Error, Result};
use crate::config::IndexStrategyKind;
use crate::internals::{LDR_COUNTS_PER_VOLT, SNAPSHOT_SCALE};
use log::{error, trace};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Number of raw samples in a field calibration.
pub const RAW_SAMPLE_LEN: usize = 10;

/// Number of points in an expanded calibration curve.
pub const CURVE_LEN: usize = 50;

const SUB_STEPS: usize = CURVE_LEN / RAW_SAMPLE_LEN;

/// Ten calibration voltages, closest distance first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCalibration(pub [f64; RAW_SAMPLE_LEN]);

impl RawCalibration {
    pub fn from_slice(values: &[f64]) -> Result<RawCalibration> {
        let values: [f64; RAW_SAMPLE_LEN] = values.try_into().map_err(|_| {
            Error::InvalidCalibration {
                description: format!(
                    "expected {} raw samples, got {}",
                    RAW_SAMPLE_LEN,
                    values.len()
                ),
            }
        })?;
        Ok(RawCalibration(values))
    }

    /// Decodes the startup snapshot: one byte per sample holding the ADC count divided by 4.
    /// Anything after the tenth byte is ignored. Any byte value is a valid sample, including
    /// `0x0A`, so the snapshot must be read by count rather than as a newline-terminated line.
    pub fn from_snapshot(bytes: &[u8]) -> Result<RawCalibration> {
        if bytes.len() < RAW_SAMPLE_LEN {
            error!("Calibration snapshot too short: {:02X?}", bytes);
            return Err(Error::InvalidCalibration {
                description: format!(
                    "snapshot has {} bytes, expected at least {}",
                    bytes.len(),
                    RAW_SAMPLE_LEN
                ),
            });
        }
        let mut values = [0.0; RAW_SAMPLE_LEN];
        for (value, &byte) in values.iter_mut().zip(bytes) {
            *value = SNAPSHOT_SCALE * f64::from(byte) / LDR_COUNTS_PER_VOLT;
        }
        trace!("Decoded calibration snapshot {:?}", values);
        Ok(RawCalibration(values))
    }
}

/// Expands 10 raw samples into the 50 point curve.
///
/// Each of the first 9 segments is linearly interpolated in 5 sub-steps; the last segment
/// repeats the final sample.
pub fn expand(raw: &RawCalibration) -> CalibrationCurve {
    let raw = &raw.0;
    let flat_from = (RAW_SAMPLE_LEN - 1) * SUB_STEPS;
    let values = (0..CURVE_LEN)
        .map(|i| {
            if i < flat_from {
                let bucket = i / SUB_STEPS;
                let fraction = (i % SUB_STEPS) as f64 / SUB_STEPS as f64;
                raw[bucket] + (raw[bucket + 1] - raw[bucket]) * fraction
            } else {
                raw[RAW_SAMPLE_LEN - 1]
            }
        })
        .collect();
    CalibrationCurve { values }
}

/// An expanded calibration curve. Always exactly [`CURVE_LEN`] values.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationCurve {
    values: Vec<f64>,
}

impl CalibrationCurve {
    pub fn from_values(values: Vec<f64>) -> Result<CalibrationCurve> {
        if values.len() != CURVE_LEN {
            return Err(Error::InvalidCalibration {
                description: format!(
                    "curve has {} values, expected {}",
                    values.len(),
                    CURVE_LEN
                ),
            });
        }
        Ok(CalibrationCurve { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Parses the persisted form: one value per line.
    pub fn parse(text: &str) -> Result<CalibrationCurve> {
        let values = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                line.parse::<f64>().map_err(|_| Error::InvalidCalibration {
                    description: format!("{:?} is not a number", line),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        CalibrationCurve::from_values(values)
    }

    /// Renders the persisted form.
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for value in &self.values {
            let _ = writeln!(text, "{}", value);
        }
        text
    }

    pub fn load(path: &Path) -> Result<CalibrationCurve> {
        trace!("Loading calibration curve from {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| {
            error!("Cannot read calibration curve {}: {}", path.display(), e);
            Error::InvalidCalibration {
                description: format!("cannot read {}: {}", path.display(), e),
            }
        })?;
        CalibrationCurve::parse(&text)
    }

    /// Overwrites `path` with this curve.
    pub fn save(&self, path: &Path) -> Result<()> {
        trace!("Saving calibration curve to {}", path.display());
        fs::write(path, self.to_text())?;
        Ok(())
    }
}

/// Maps an average LDR voltage to a curve index.
pub trait IndexStrategy {
    fn find(&self, curve: &CalibrationCurve, average: f64) -> usize;
}

/// Full scan for the value with the smallest absolute difference. Ties go to the lower index.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearScan;

impl IndexStrategy for LinearScan {
    fn find(&self, curve: &CalibrationCurve, average: f64) -> usize {
        let mut best = 0;
        let mut min_diff = f64::INFINITY;
        for (i, value) in curve.values().iter().enumerate() {
            let diff = (value - average).abs();
            if diff < min_diff {
                min_diff = diff;
                best = i;
            }
        }
        best
    }
}

/// Bisection assuming a descending curve.
///
/// Values outside the curve clamp to the first or last index. Inside, the first probe within
/// [`BinarySearch::TOLERANCE`] wins; otherwise the insertion point is returned, which is the
/// upper neighbour even when the lower one is nearer. This is the legacy firmware's lookup and
/// is kept as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinarySearch;

impl BinarySearch {
    /// Volts within which a probe counts as a hit.
    pub const TOLERANCE: f64 = 0.01;
}

impl IndexStrategy for BinarySearch {
    fn find(&self, curve: &CalibrationCurve, average: f64) -> usize {
        let values = curve.values();
        let last = values.len() - 1;
        if average >= values[0] {
            return 0;
        }
        if average <= values[last] {
            return last;
        }

        let (mut lo, mut hi) = (0usize, last);
        while lo <= hi {
            let mid = (lo + hi) / 2;
            let diff = values[mid] - average;
            if diff.abs() <= BinarySearch::TOLERANCE {
                return mid;
            }
            if diff > 0.0 {
                lo = mid + 1;
            } else if mid == 0 {
                break;
            } else {
                hi = mid - 1;
            }
        }
        lo.min(last)
    }
}

impl IndexStrategyKind {
    pub fn strategy(self) -> &'static dyn IndexStrategy {
        match self {
            IndexStrategyKind::LinearScan => &LinearScan,
            IndexStrategyKind::BinarySearch => &BinarySearch,
        }
    }
}

/// Averages two LDR voltages and looks the average up on the curve.
pub fn find_fitting_index(
    curve: &CalibrationCurve,
    strategy: &dyn IndexStrategy,
    ldr1: f64,
    ldr2: f64,
) -> usize {
    let average = (ldr1 + ldr2) / 2.0;
    let index = strategy.find(curve, average);
    trace!("LDR average {:.3} V -> index {}", average, index);
    index
}

/// Location of the persisted calibration curve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    pub const DEFAULT_FILE_NAME: &'static str = "calibration_values.txt";

    pub fn new(path: impl Into<PathBuf>) -> CalibrationStore {
        CalibrationStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Expands a raw sample, overwrites the stored curve with it and returns it.
    pub fn rebuild(&self, raw: &RawCalibration) -> Result<CalibrationCurve> {
        let curve = expand(raw);
        curve.save(&self.path)?;
        Ok(curve)
    }

    pub fn load(&self) -> Result<CalibrationCurve> {
        CalibrationCurve::load(&self.path)
    }
}

impl Default for CalibrationStore {
    fn default() -> CalibrationStore {
        CalibrationStore::new(CalibrationStore::DEFAULT_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn raw() -> RawCalibration {
        RawCalibration([3.0, 2.5, 2.0, 1.6, 1.3, 1.0, 0.8, 0.6, 0.5, 0.4])
    }

    #[test]
    fn expansion_interpolates_and_flattens_the_tail() {
        let input = raw();
        let curve = expand(&input);
        let values = curve.values();
        assert_eq!(values.len(), CURVE_LEN);
        assert_relative_eq!(values[0], input.0[0]);
        assert_relative_eq!(values[2], 3.0 + (2.5 - 3.0) * 2.0 / 5.0);
        assert_relative_eq!(values[5], input.0[1]);
        assert_relative_eq!(values[44], 0.5 + (0.4 - 0.5) * 4.0 / 5.0);
        for value in &values[45..] {
            assert_relative_eq!(*value, input.0[9]);
        }
        assert!(values.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn snapshot_bytes_scale_to_volts() {
        let mut line = vec![73u8, 0, 146, 1, 2, 3, 4, 5, 6, 7];
        line.push(b'\n');
        let raw = RawCalibration::from_snapshot(&line).unwrap();
        assert_relative_eq!(raw.0[0], 1.0);
        assert_relative_eq!(raw.0[1], 0.0);
        assert_relative_eq!(raw.0[2], 2.0);
        assert!(RawCalibration::from_snapshot(&[1, 2, 3]).is_err());
    }

    #[test]
    fn raw_sample_must_have_ten_values() {
        assert!(RawCalibration::from_slice(&[1.0; 10]).is_ok());
        assert!(matches!(
            RawCalibration::from_slice(&[1.0; 9]),
            Err(Error::InvalidCalibration { .. })
        ));
    }

    #[test]
    fn linear_scan_picks_nearest_with_lower_tie() {
        let curve = expand(&raw());
        // between index 5 (2.5) and 6 (2.4), nearer to 5
        assert_eq!(LinearScan.find(&curve, 2.46), 5);
        // nearer to 6
        assert_eq!(LinearScan.find(&curve, 2.43), 6);

        // exact midpoint of two neighbours goes to the lower index
        let steps = CalibrationCurve::from_values((0..50).rev().map(f64::from).collect()).unwrap();
        assert_eq!(LinearScan.find(&steps, 44.5), 4);
        assert_eq!(LinearScan.find(&steps, 44.6), 4);
        assert_eq!(LinearScan.find(&steps, 44.4), 5);
        // the flat tail resolves to its first index
        assert_eq!(LinearScan.find(&curve, 0.4), 45);
        assert_eq!(LinearScan.find(&curve, 10.0), 0);
        assert_eq!(LinearScan.find(&curve, -1.0), 45);
    }

    #[test]
    fn binary_search_clamps_and_may_miss_the_nearest() {
        let curve = expand(&raw());
        assert_eq!(BinarySearch.find(&curve, 10.0), 0);
        assert_eq!(BinarySearch.find(&curve, -1.0), CURVE_LEN - 1);
        // exact hits are found
        assert_eq!(BinarySearch.find(&curve, curve.values()[20]), 20);
        // 2.47 is nearer index 5 (2.5) but bisection lands on the insertion point 6 (2.4)
        assert_eq!(LinearScan.find(&curve, 2.47), 5);
        assert_eq!(BinarySearch.find(&curve, 2.47), 6);
    }

    #[test]
    fn fitting_index_uses_the_average() {
        let curve = expand(&raw());
        let strategy = IndexStrategyKind::LinearScan.strategy();
        assert_eq!(find_fitting_index(&curve, strategy, 3.1, 2.9), 0);
        assert_eq!(find_fitting_index(&curve, strategy, 2.6, 2.4), 5);
    }

    #[test]
    fn curve_persists_one_value_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = CalibrationStore::new(dir.path().join("calibration_values.txt"));
        let curve = store.rebuild(&raw()).unwrap();

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(text.lines().count(), CURVE_LEN);
        assert_eq!(store.load().unwrap(), curve);
    }

    #[test]
    fn curve_must_have_fifty_values() {
        assert!(matches!(
            CalibrationCurve::parse("1.0\n2.0\n"),
            Err(Error::InvalidCalibration { .. })
        ));
        assert!(matches!(
            CalibrationCurve::parse("abc\n"),
            Err(Error::InvalidCalibration { .. })
        ));
    }
}
