use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Instructions understood by the device's script interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Opcode {
    IncLcd = 0x01,
    DecLcd = 0x02,
    RraLcd = 0x03,
    SetDelay = 0x04,
    ClearLcd = 0x05,
    ServoDeg = 0x06,
    ServoScan = 0x07,
    Sleep = 0x08,
}

impl Opcode {
    pub const ALL: [Opcode; 8] = [
        Opcode::IncLcd,
        Opcode::DecLcd,
        Opcode::RraLcd,
        Opcode::SetDelay,
        Opcode::ClearLcd,
        Opcode::ServoDeg,
        Opcode::ServoScan,
        Opcode::Sleep,
    ];

    /// The opcode byte.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Mnemonic used in script text.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::IncLcd => "inc_lcd",
            Opcode::DecLcd => "dec_lcd",
            Opcode::RraLcd => "rra_lcd",
            Opcode::SetDelay => "set_delay",
            Opcode::ClearLcd => "clear_lcd",
            Opcode::ServoDeg => "servo_deg",
            Opcode::ServoScan => "servo_scan",
            Opcode::Sleep => "sleep",
        }
    }

    pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
        Opcode::ALL.into_iter().find(|op| op.mnemonic() == mnemonic)
    }

    pub fn from_code(code: u8) -> Option<Opcode> {
        Opcode::ALL.into_iter().find(|op| op.code() == code)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Sleep => write!(f, "msp sleep"),
            op => write!(f, "{}", op.mnemonic()),
        }
    }
}

/// Outcome of the light classification of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LightClass {
    /// Both LDRs agree and the estimated distance is in range.
    Light,
    /// The LDRs disagree or one of them saturated.
    Noise,
    /// The LDRs agree but the light source is beyond the masking distance.
    Masked,
}

impl fmt::Display for LightClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LightClass::Light => write!(f, "LIGHT DETECTED"),
            LightClass::Noise => write!(f, "NOISE"),
            LightClass::Masked => write!(f, "MASKED"),
        }
    }
}

/// Two LDR readings in volts and the calibrated distance derived from them.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LdrSample {
    pub left: f64,
    pub right: f64,
    /// Calibration index + 1, i.e. 1..=50.
    pub light_distance: u32,
}

/// Result of a completed sweep.
///
/// `distances` and `angles` always have the same length. `lights` is present for the light and
/// combined sweeps; for the light-only sweep it equals `distances`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScanResult {
    /// Angles reported by the device when the sweep started.
    pub start_angle: i32,
    pub end_angle: i32,
    pub distances: Vec<u32>,
    pub lights: Option<Vec<u32>>,
    /// Slots zeroed by masking, parallel to `distances`.
    pub masked: Vec<bool>,
    /// Derived angle of every slot, in degrees, rounded to one decimal.
    pub angles: Vec<f64>,
}

impl ScanResult {
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
}

/// One telemeter reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TelemeterReading {
    pub distance: i32,
    pub angle: i32,
}

/// Acknowledge of a finished upload, identifying the slot (1..=10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UploadAck {
    pub slot: usize,
}

impl UploadAck {
    /// Maps the acknowledge token: `'1'..='9'` are slots 1 to 9, `'0'` is slot 10.
    pub fn from_token(token: &str) -> Option<UploadAck> {
        let mut chars = token.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        let digit = c.to_digit(10)? as usize;
        Some(UploadAck {
            slot: if digit == 0 { 10 } else { digit },
        })
    }
}

impl fmt::Display for UploadAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File/Script {} Transferred", self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_table_round_trips() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
            assert_eq!(Opcode::from_code(op.code()), Some(op));
        }
        assert_eq!(Opcode::from_mnemonic("foo"), None);
        assert_eq!(Opcode::from_code(9), None);
        assert_eq!(Opcode::Sleep.to_string(), "msp sleep");
        assert_eq!(Opcode::ServoDeg.to_string(), "servo_deg");
    }

    #[test]
    fn ack_tokens_map_to_slots() {
        assert_eq!(UploadAck::from_token("1"), Some(UploadAck { slot: 1 }));
        assert_eq!(UploadAck::from_token("9"), Some(UploadAck { slot: 9 }));
        assert_eq!(UploadAck::from_token("0"), Some(UploadAck { slot: 10 }));
        assert_eq!(UploadAck::from_token(""), None);
        assert_eq!(UploadAck::from_token("x"), None);
        assert_eq!(UploadAck::from_token("12"), None);
        assert_eq!(
            UploadAck { slot: 10 }.to_string(),
            "File/Script 10 Transferred"
        );
    }
}
