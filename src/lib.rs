//! # Proximity Scanner Driver
//!
//! `proxscan` drives the microcontroller-based ultrasonic / light-proximity scanner over its
//! serial protocol. It provides mode selection, object and light sweeps, the telemeter, script
//! upload and playback, and LDR calibration. Rendering results is left to the caller, which
//! receives plain result sequences and per-sample [`ScanEvent`]s.

extern crate hex;
extern crate log;

pub mod base;
pub mod calibration;
pub mod cmds;
pub mod config;
pub mod encoder;
mod internals;
pub mod link;
pub mod observer;
pub mod playback;
pub mod session;
pub mod status;
#[cfg(test)]
mod testing;
pub mod types;
pub mod utils;

pub use crate::base::{Channel, Error, Result, Transport};
pub use crate::calibration::{CalibrationCurve, CalibrationStore, RawCalibration};
pub use crate::config::{ProtocolConfig, ProtocolVariant};
pub use crate::encoder::UploadKind;
pub use crate::internals::SCANNER_BAUD_RATE;
pub use crate::link::Link;
pub use crate::observer::{NoopObserver, ScanEvent, ScanObserver};
pub use crate::playback::PlaybackReport;
pub use crate::status::UploadStatus;
pub use crate::types::{ScanResult, TelemeterReading, UploadAck};

use crate::calibration::RAW_SAMPLE_LEN;
use crate::cmds::*;
use crate::session::LightContext;
use log::{error, trace, warn};
use std::fs;
use std::path::Path;

/// The device modes reachable from its idle menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Object,
    Telemeter,
    Light,
    LightObject,
    File,
}

/// Represents a connection to and control interface for the scanner.
///
/// Owns the serial link exclusively; every exchange is a strict request/response and nothing
/// overlaps. Fatal transport errors are returned as is; the caller should drop the device.
#[derive(Debug)]
pub struct ScannerDevice<X> {
    link: Link<X>,
    config: ProtocolConfig,
    calibration: CalibrationStore,
    curve: Option<CalibrationCurve>,
    status: UploadStatus,
    mode: Mode,
}

/// A scanner on a real serial port.
pub type SerialScanner = ScannerDevice<Channel<dyn serialport::SerialPort>>;

impl SerialScanner {
    /// Opens the serial port at 9600 8-N-1 and clears anything stale in its buffers.
    ///
    /// # Example
    /// ```ignore
    /// # use proxscan::{ProtocolConfig, SerialScanner};
    /// let mut scanner = SerialScanner::open("/dev/ttyUSB0", ProtocolConfig::current())?;
    /// scanner.load_startup_calibration()?;
    /// ```
    pub fn open(path: &str, config: ProtocolConfig) -> Result<SerialScanner> {
        trace!("Opening serial port {}", path);
        let port = serialport::new(path, SCANNER_BAUD_RATE)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(config.timing.read_timeout)
            .open()
            .map_err(|e| {
                error!("Cannot open serial port {}: {}", path, e);
                e
            })?;
        port.clear(serialport::ClearBuffer::All)?;
        Ok(ScannerDevice::new(Channel::new(port), config))
    }
}

impl<T: ?Sized> ScannerDevice<Channel<T>>
where
    T: std::io::Read + std::io::Write,
{
    /// Constructs a `ScannerDevice` directly over a byte stream, e.g. an already opened port.
    pub fn with_stream(stream: Box<T>, config: ProtocolConfig) -> ScannerDevice<Channel<T>> {
        ScannerDevice::new(Channel::new(stream), config)
    }
}

fn slot_commands(slot: usize) -> Result<(u8, u8)> {
    slot.checked_sub(1)
        .and_then(|index| UPLOAD_SLOT_COMMANDS.get(index).copied())
        .ok_or_else(|| {
            Error::malformed(format!(
                "upload slot {} is outside 1..={}",
                slot, UPLOAD_SLOT_COUNT
            ))
        })
}

impl<X: Transport> ScannerDevice<X> {
    /// Constructs a new `ScannerDevice` over any transport, using the default calibration file.
    pub fn new(transport: X, config: ProtocolConfig) -> ScannerDevice<X> {
        trace!("Creating new ScannerDevice ({:?})", config.variant);
        ScannerDevice {
            link: Link::new(transport, config.timing),
            config,
            calibration: CalibrationStore::default(),
            curve: None,
            status: UploadStatus::new(),
            mode: Mode::Idle,
        }
    }

    /// Stores the calibration curve at another location.
    pub fn with_calibration_store(mut self, store: CalibrationStore) -> ScannerDevice<X> {
        self.calibration = store;
        self.curve = None;
        self
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn link(&self) -> &Link<X> {
        &self.link
    }

    /// Handle to the upload acknowledge status, for a polling consumer.
    pub fn upload_status(&self) -> UploadStatus {
        self.status.clone()
    }

    fn mode_command(&self, mode: Mode) -> Option<u8> {
        match mode {
            Mode::Idle => None,
            Mode::Object => Some(self.config.object.mode_command),
            Mode::Telemeter => Some(CMD_MODE_TELEMETER),
            Mode::Light => Some(self.config.light.mode_command),
            Mode::LightObject => Some(self.config.light_object.mode_command),
            Mode::File => Some(CMD_MODE_FILE),
        }
    }

    /// Selects a device mode. Re-selecting the current mode sends nothing.
    pub fn enter_mode(&mut self, mode: Mode) -> Result<()> {
        if mode == self.mode {
            return Ok(());
        }
        if self.mode != Mode::Idle {
            self.back()?;
        }
        if let Some(command) = self.mode_command(mode) {
            trace!("Entering mode {:?}", mode);
            self.link.send_command(command)?;
        }
        self.mode = mode;
        Ok(())
    }

    /// Returns the device to its idle menu. Valid from any state.
    pub fn back(&mut self) -> Result<()> {
        trace!("Back from mode {:?}", self.mode);
        self.mode = Mode::Idle;
        self.link.send_command(CMD_BACK)
    }

    /// Tells the device the host is going away.
    pub fn exit(&mut self) -> Result<()> {
        trace!("Sending exit command");
        self.mode = Mode::Idle;
        self.link.send_command(CMD_EXIT)
    }

    /// The active calibration curve, loaded from the store on first use.
    pub fn calibration_curve(&mut self) -> Result<CalibrationCurve> {
        if let Some(curve) = &self.curve {
            return Ok(curve.clone());
        }
        let curve = self.calibration.load()?;
        self.curve = Some(curve.clone());
        Ok(curve)
    }

    /// Expands a raw sample, persists it and makes it the active curve.
    pub fn apply_calibration(&mut self, raw: &RawCalibration) -> Result<CalibrationCurve> {
        let curve = self.calibration.rebuild(raw)?;
        self.curve = Some(curve.clone());
        Ok(curve)
    }

    /// Reads the calibration snapshot kept in the device's flash and makes it the active curve.
    pub fn load_startup_calibration(&mut self) -> Result<CalibrationCurve> {
        trace!("Requesting calibration snapshot");
        self.link.discard_input()?;
        self.link.send_command(CMD_CALIBRATION_SNAPSHOT)?;
        self.link.token_pause();
        // Sample bytes may themselves be 0x0A, so count them instead of reading a line.
        let bytes = self.link.read_bytes(RAW_SAMPLE_LEN)?;
        let rest = self.link.read_raw_line()?;
        if rest.len() > 1 {
            warn!("Ignoring {} extra bytes after calibration snapshot", rest.len() - 1);
        }
        let raw = RawCalibration::from_snapshot(&bytes)?;
        self.apply_calibration(&raw)
    }

    /// Asks the device to run its push-button field calibration. The samples stay on the
    /// device; the next [`load_startup_calibration`](Self::load_startup_calibration) picks them up.
    pub fn request_field_calibration(&mut self) -> Result<()> {
        trace!("Requesting field calibration");
        self.link.send_command(CMD_FIELD_CALIBRATE)
    }

    /// Runs one object sweep, masking readings at or beyond `max_distance` centimetres.
    pub fn object_scan<O: ScanObserver + ?Sized>(
        &mut self,
        max_distance: u32,
        observer: &mut O,
    ) -> Result<ScanResult> {
        session::validate_max_distance(max_distance)?;
        self.enter_mode(Mode::Object)?;
        session::object_scan(&mut self.link, self.config.object, max_distance, observer)
    }

    /// Runs one light source sweep.
    pub fn light_scan<O: ScanObserver + ?Sized>(&mut self, observer: &mut O) -> Result<ScanResult> {
        let curve = self.calibration_curve()?;
        self.enter_mode(Mode::Light)?;
        let light = LightContext {
            curve: &curve,
            strategy: self.config.index_strategy.strategy(),
            policy: &self.config.light_policy,
        };
        session::light_scan(&mut self.link, self.config.light, &light, observer)
    }

    /// Runs one combined light source and object sweep.
    pub fn light_object_scan<O: ScanObserver + ?Sized>(
        &mut self,
        max_distance: u32,
        observer: &mut O,
    ) -> Result<ScanResult> {
        session::validate_max_distance(max_distance)?;
        let curve = self.calibration_curve()?;
        self.enter_mode(Mode::LightObject)?;
        let light = LightContext {
            curve: &curve,
            strategy: self.config.index_strategy.strategy(),
            policy: &self.config.light_policy,
        };
        session::light_object_scan(
            &mut self.link,
            self.config.light_object,
            self.config.light.sentinel,
            max_distance,
            &light,
            observer,
        )
    }

    /// Points the telemeter at `angle` and starts measuring.
    pub fn telemeter_start(&mut self, angle: u16) -> Result<()> {
        self.enter_mode(Mode::Telemeter)?;
        session::telemeter_start(&mut self.link, CMD_TELEMETER_START, angle)
    }

    /// Points the telemeter at an angle typed by the operator.
    pub fn telemeter_start_text(&mut self, angle: &str) -> Result<()> {
        let angle = link::parse_angle(angle)?;
        self.telemeter_start(angle)
    }

    /// Reads the next telemeter measurement.
    pub fn telemeter_poll<O: ScanObserver + ?Sized>(
        &mut self,
        observer: &mut O,
    ) -> Result<TelemeterReading> {
        session::telemeter_poll(&mut self.link, observer)
    }

    pub fn telemeter_stop(&mut self) -> Result<()> {
        trace!("Stopping telemeter");
        self.link.send_command(CMD_TELEMETER_STOP)
    }

    /// Uploads `text` to `slot` (1..=10) under `name` and waits for the acknowledge.
    pub fn upload_text(
        &mut self,
        slot: usize,
        kind: UploadKind,
        name: &str,
        text: &str,
    ) -> Result<UploadAck> {
        let (upload, _) = slot_commands(slot)?;
        let payload = encoder::upload_payload(kind, text)?;
        if payload.len() > usize::from(u8::MAX) || name.len() > usize::from(u8::MAX) {
            return Err(Error::malformed(format!(
                "upload {:?} ({} bytes) does not fit a one-byte length prefix",
                name,
                payload.len()
            )));
        }
        self.enter_mode(Mode::File)?;

        trace!(
            "Uploading {:?} ({:?}, {} bytes) to slot {}",
            name,
            kind,
            payload.len(),
            slot
        );
        self.link.send_command(upload)?;
        self.link.send_length_prefixed(payload.as_bytes())?;
        self.link.send_length_prefixed(name.as_bytes())?;

        let token = self.link.read_ack()?;
        match UploadAck::from_token(&token) {
            Some(ack) => {
                if ack.slot != slot {
                    warn!("Uploaded to slot {} but device acknowledged slot {}", slot, ack.slot);
                }
                self.status.record(ack);
                Ok(ack)
            }
            None => {
                error!("Unrecognised upload acknowledge {:?}", token);
                Err(Error::ProtocolError {
                    description: format!("unrecognised upload acknowledge {:?}", token),
                })
            }
        }
    }

    /// Uploads the file at `path` to `slot`, named after the file.
    pub fn upload_file(&mut self, slot: usize, kind: UploadKind, path: &Path) -> Result<UploadAck> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::malformed(format!("cannot read {}: {}", path.display(), e))
        })?;
        let name = encoder::upload_name(path);
        self.upload_text(slot, kind, &name, &text)
    }

    /// Plays the script in `slot` and follows it until the device sleeps.
    pub fn play<O: ScanObserver + ?Sized>(
        &mut self,
        slot: usize,
        observer: &mut O,
    ) -> Result<PlaybackReport> {
        let (_, play) = slot_commands(slot)?;
        self.enter_mode(Mode::File)?;
        trace!("Playing slot {}", slot);
        playback::play(&mut self.link, play, self.config.sweep_sentinel, observer)
    }

    /// Simulates push button 1 in file mode.
    pub fn press_pb1(&mut self) -> Result<()> {
        self.enter_mode(Mode::File)?;
        self.link.send_command(CMD_PB1)
    }
}
