//! Per-variant protocol configuration.
//!
//! The firmware went through two protocol revisions that disagree on some end-of-scan sentinels
//! and on how the light distance is looked up. Everything that differs lives here instead of in
//! the session code.

use crate::cmds::*;
use crate::internals::*;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Firmware protocol revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProtocolVariant {
    /// Current firmware: sweep sub-scans end with 500, light distance by linear nearest search.
    Current,
    /// Earlier firmware: sweep sub-scans end with 999, light distance by binary search.
    Legacy,
}

/// Marks the end of a homogeneous stream of sensor frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Sentinel {
    /// The stream ends with this exact value.
    Equals(i32),
    /// The stream ends with any value strictly greater than this one.
    Above(i32),
}

impl Sentinel {
    /// Returns `true` if `value` terminates the stream.
    #[inline]
    pub fn matches(&self, value: i32) -> bool {
        match *self {
            Sentinel::Equals(end) => value == end,
            Sentinel::Above(limit) => value > limit,
        }
    }
}

/// How a scan mode is entered, triggered and terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModeConfig {
    /// Mode select command sent when the mode is entered.
    pub mode_command: u8,
    /// Command starting one sweep inside the mode.
    pub trigger: u8,
    /// End-of-scan marker.
    pub sentinel: Sentinel,
    /// Number of leading samples discarded while the sensors settle.
    pub warmup: usize,
}

/// Which nearest-value search turns an LDR average into a calibration index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IndexStrategyKind {
    /// Full scan for the minimum absolute difference.
    LinearScan,
    /// Bisection over a descending curve, clamped at the boundaries.
    BinarySearch,
}

/// Light classification thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LightPolicy {
    /// Two LDR readings further apart than this (volts) are noise.
    pub epsilon: f64,
    /// A reading at or above this voltage is noise.
    pub max_voltage: f64,
    /// Light distances above this index are masked.
    pub masking_distance: u32,
}

impl Default for LightPolicy {
    fn default() -> LightPolicy {
        LightPolicy {
            epsilon: 0.3,
            max_voltage: 3.0,
            masking_distance: 50,
        }
    }
}

/// Delays the firmware needs between bytes and before answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimingConfig {
    /// Pause after each command byte.
    pub command_pacing: Duration,
    /// Timeout of one read attempt. An empty read is retried.
    pub read_timeout: Duration,
    /// Pause before reading opcode tokens and the calibration snapshot.
    pub token_pre_delay: Duration,
    /// Pause between the two LDR frames of a light sample.
    pub ldr_pair_delay: Duration,
}

impl TimingConfig {
    /// No delays at all. For simulated devices and tests.
    pub fn immediate() -> TimingConfig {
        TimingConfig {
            command_pacing: Duration::ZERO,
            read_timeout: Duration::from_millis(5),
            token_pre_delay: Duration::ZERO,
            ldr_pair_delay: Duration::ZERO,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> TimingConfig {
        TimingConfig {
            command_pacing: SCANNER_DEFAULT_COMMAND_PACING,
            read_timeout: SCANNER_DEFAULT_READ_TIMEOUT,
            token_pre_delay: SCANNER_DEFAULT_TOKEN_PRE_DELAY,
            ldr_pair_delay: SCANNER_DEFAULT_LDR_PAIR_DELAY,
        }
    }
}

/// Complete protocol configuration for one firmware revision.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProtocolConfig {
    pub variant: ProtocolVariant,
    /// Ultrasonic object sweep.
    pub object: ModeConfig,
    /// LDR light source sweep. The sentinel applies to the raw first LDR reading.
    pub light: ModeConfig,
    /// Combined sweep. The sentinel applies to the distance frame.
    pub light_object: ModeConfig,
    /// Terminates the angle sweep of playback opcode 7.
    pub sweep_sentinel: Sentinel,
    pub index_strategy: IndexStrategyKind,
    pub light_policy: LightPolicy,
    pub timing: TimingConfig,
}

impl ProtocolConfig {
    /// Configuration of the current firmware.
    pub fn current() -> ProtocolConfig {
        ProtocolConfig {
            variant: ProtocolVariant::Current,
            object: ModeConfig {
                mode_command: CMD_MODE_OBJECT,
                trigger: CMD_OBJECT_SCAN,
                sentinel: Sentinel::Equals(500),
                warmup: 5,
            },
            light: ModeConfig {
                mode_command: CMD_MODE_LIGHT,
                trigger: CMD_LIGHT_SCAN,
                sentinel: Sentinel::Above(1023),
                warmup: 9,
            },
            light_object: ModeConfig {
                mode_command: CMD_MODE_LIGHT_OBJECT,
                trigger: CMD_LIGHT_OBJECT_SCAN,
                sentinel: Sentinel::Equals(9999),
                warmup: 5,
            },
            sweep_sentinel: Sentinel::Equals(500),
            index_strategy: IndexStrategyKind::LinearScan,
            light_policy: LightPolicy::default(),
            timing: TimingConfig::default(),
        }
    }

    /// Configuration of the earlier firmware.
    pub fn legacy() -> ProtocolConfig {
        ProtocolConfig {
            variant: ProtocolVariant::Legacy,
            sweep_sentinel: Sentinel::Equals(999),
            index_strategy: IndexStrategyKind::BinarySearch,
            ..ProtocolConfig::current()
        }
    }

    /// Configuration for a given firmware revision.
    pub fn for_variant(variant: ProtocolVariant) -> ProtocolConfig {
        match variant {
            ProtocolVariant::Current => ProtocolConfig::current(),
            ProtocolVariant::Legacy => ProtocolConfig::legacy(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> ProtocolConfig {
        ProtocolConfig::current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_differ_between_variants() {
        let current = ProtocolConfig::current();
        let legacy = ProtocolConfig::legacy();
        assert!(current.sweep_sentinel.matches(500));
        assert!(!current.sweep_sentinel.matches(999));
        assert!(legacy.sweep_sentinel.matches(999));
        assert!(!legacy.sweep_sentinel.matches(500));
        assert_eq!(current.object, legacy.object);
        assert_eq!(legacy.index_strategy, IndexStrategyKind::BinarySearch);
    }

    #[test]
    fn above_sentinel_is_exclusive() {
        let overflow = Sentinel::Above(1023);
        assert!(!overflow.matches(1023));
        assert!(overflow.matches(1024));
        assert!(overflow.matches(9999));
    }

    #[test]
    fn for_variant_picks_matching_preset() {
        assert_eq!(
            ProtocolConfig::for_variant(ProtocolVariant::Legacy),
            ProtocolConfig::legacy()
        );
        assert_eq!(ProtocolConfig::default(), ProtocolConfig::current());
    }
}
