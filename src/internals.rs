use std::time::Duration;

/// Serial link speed.
pub const SCANNER_BAUD_RATE: u32 = 9600;

/// Timeout of a single read attempt on the serial port.
pub const SCANNER_DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause after every command byte. The firmware drops bytes that arrive faster.
pub const SCANNER_DEFAULT_COMMAND_PACING: Duration = Duration::from_millis(50);

/// Pause before reading a playback opcode token or a calibration snapshot.
pub const SCANNER_DEFAULT_TOKEN_PRE_DELAY: Duration = Duration::from_millis(250);

/// Pause between the two LDR readings of one light sample.
pub const SCANNER_DEFAULT_LDR_PAIR_DELAY: Duration = Duration::from_millis(250);

/// Byte closing every paced payload.
pub const PAYLOAD_TERMINATOR: u8 = b'$';

/// Byte closing every sensor frame and opcode token.
pub const FRAME_TERMINATOR: u8 = b'\n';

/// Byte closing every upload acknowledge token.
pub const ACK_TERMINATOR: u8 = b'\0';

/// ADC counts per volt of an LDR reading.
pub const LDR_COUNTS_PER_VOLT: f64 = 292.0;

/// Calibration snapshot bytes carry the ADC value divided by this factor.
pub const SNAPSHOT_SCALE: f64 = 4.0;

/// Highest angle the servo accepts, in degrees.
pub const MAX_SERVO_ANGLE: u16 = 180;

/// Limits of the object masking threshold the shell may set, in centimetres.
pub const MIN_MAX_DISTANCE: u32 = 1;
pub const MAX_MAX_DISTANCE: u32 = 400;
