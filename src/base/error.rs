use std::error;
use std::fmt;
use std::io;

/// Represents errors that can occur while talking to the scanner.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred on the underlying stream (port unplugged, write failed).
    IoError(io::Error),

    /// The stream reported end-of-file. The port is gone.
    PortClosed,

    /// Caller supplied input the protocol cannot express. Contains a description of the problem.
    MalformedInput { description: String },

    /// The device reported an opcode the playback interpreter does not know.
    UnknownOpcode { token: String },

    /// A frame could not be decoded according to the current protocol. Contains a description of the protocol error.
    ProtocolError { description: String },

    /// A calibration sample or persisted curve has the wrong shape or content.
    InvalidCalibration { description: String },
}

impl Error {
    /// Returns `true` if the error leaves the serial link unusable.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Error::IoError(_) | Error::PortClosed)
    }

    pub(crate) fn malformed(description: impl Into<String>) -> Error {
        Error::MalformedInput {
            description: description.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IoError(err) => write!(f, "io error: {}", err),
            Error::PortClosed => write!(f, "serial port closed"),
            Error::MalformedInput { description } => write!(f, "malformed input: {}", description),
            Error::UnknownOpcode { token } => write!(f, "unknown opcode: {:?}", token),
            Error::ProtocolError { description } => write!(f, "protocol error: {}", description),
            Error::InvalidCalibration { description } => {
                write!(f, "invalid calibration: {}", description)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serialport::Error> for Error {
    fn from(err: serialport::Error) -> Self {
        Error::IoError(err.into())
    }
}

/// A specialized `Result` type for scanner operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::Error;
    use std::io;

    #[test]
    fn transport_failures_are_fatal() {
        assert!(Error::PortClosed.is_transport_failure());
        assert!(Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone")).is_transport_failure());
        assert!(!Error::malformed("angle").is_transport_failure());
        assert!(!Error::UnknownOpcode {
            token: "9".to_owned()
        }
        .is_transport_failure());
    }

    #[test]
    fn display_names_the_problem() {
        assert_eq!(
            Error::malformed("angle 200 out of range").to_string(),
            "malformed input: angle 200 out of range"
        );
        assert_eq!(
            Error::UnknownOpcode {
                token: "9".to_owned()
            }
            .to_string(),
            "unknown opcode: \"9\""
        );
    }
}
