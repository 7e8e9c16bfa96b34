// Mode select commands. The device stays in the selected mode until `CMD_BACK`.

/// Command returning the device to its idle menu. Always valid, from any mode.
pub const CMD_BACK: u8 = b'0';

/// Command selecting the object detector (ultrasonic sweep) mode.
pub const CMD_MODE_OBJECT: u8 = b'1';

/// Command selecting the telemeter (fixed-angle ultrasonic) mode.
pub const CMD_MODE_TELEMETER: u8 = b'2';

/// Command selecting the light source detector (LDR sweep) mode.
pub const CMD_MODE_LIGHT: u8 = b'3';

/// Command selecting the combined light source and object detector mode.
pub const CMD_MODE_LIGHT_OBJECT: u8 = b'4';

/// Command selecting file/script mode (uploads and playback).
pub const CMD_MODE_FILE: u8 = b'5';

/// Command asking the device for the calibration snapshot stored in its flash.
/// Answered with one newline-terminated line of 10 raw bytes.
pub const CMD_CALIBRATION_SNAPSHOT: u8 = b'6';

/// Command sent once when the host shuts down.
pub const CMD_EXIT: u8 = b'q';

// Actions inside a mode

/// Starts one object sweep. Answered with two angle frames, distance frames and a sentinel.
pub const CMD_OBJECT_SCAN: u8 = b'U';

/// Starts the telemeter at the angle that follows as a `$`-terminated payload.
pub const CMD_TELEMETER_START: u8 = b'V';

/// Stops the telemeter.
pub const CMD_TELEMETER_STOP: u8 = b'W';

/// Asks the device to run the push-button driven LDR field calibration and keep it in flash.
pub const CMD_FIELD_CALIBRATE: u8 = b'X';

/// Starts one light source sweep.
pub const CMD_LIGHT_SCAN: u8 = b'Y';

/// Starts one combined light source and object sweep.
pub const CMD_LIGHT_OBJECT_SCAN: u8 = b'Z';

/// Simulates a press of push button 1 while in file mode.
pub const CMD_PB1: u8 = b'a';

// Upload slots

/// Number of upload slots on the device.
pub const UPLOAD_SLOT_COUNT: usize = 10;

/// Per-slot command pairs: `(upload, play)`, slot 1 first.
pub const UPLOAD_SLOT_COMMANDS: [(u8, u8); UPLOAD_SLOT_COUNT] = [
    (b'A', b'B'),
    (b'C', b'D'),
    (b'E', b'F'),
    (b'G', b'H'),
    (b'I', b'J'),
    (b'K', b'L'),
    (b'M', b'N'),
    (b'O', b'P'),
    (b'Q', b'R'),
    (b'S', b'T'),
];
