use log::trace;

/// First angle of the implied sweep of the default scans, in degrees.
pub const DEFAULT_SWEEP_START: f64 = 5.0;

/// Width of the implied sweep of the default scans, in degrees.
pub const DEFAULT_SWEEP_SPAN: f64 = 180.0;

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Spreads `len` samples evenly from `start` to `end` (both inclusive), rounded to 0.1 degree.
///
/// The device reports only the sweep endpoints, never a per-sample angle. A single sample sits
/// at `start`.
pub fn derive_angles(len: usize, start: f64, end: f64) -> Vec<f64> {
    trace!("Deriving {} angles from {} to {}", len, start, end);
    match len {
        0 => Vec::new(),
        1 => vec![round_to_tenth(start)],
        _ => {
            let step = (end - start) / (len - 1) as f64;
            (0..len)
                .map(|i| round_to_tenth(start + i as f64 * step))
                .collect()
        }
    }
}

/// Angles of a default object/light sweep: a fixed 5 to 185 degree spread.
pub fn default_sweep_angles(len: usize) -> Vec<f64> {
    derive_angles(len, DEFAULT_SWEEP_START, DEFAULT_SWEEP_START + DEFAULT_SWEEP_SPAN)
}
