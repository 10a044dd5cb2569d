use std::io;
use thiserror::Error;

/// Custom error types for Reactz
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Round error: {0}")]
    Round(#[from] RoundError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid input: {0}")]
    Input(String),
}

/// Failures raised by a transport adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No device is reachable, or the target peer was never registered
    #[error("no peers reachable")]
    NoPeers,

    #[error("transport timed out")]
    Timeout,

    #[error("payload of {size} bytes exceeds the {max} byte limit")]
    OversizedPayload { size: usize, max: usize },

    /// The adapter has been shut down
    #[error("transport closed")]
    Closed,

    #[error("transport I/O failure: {0}")]
    Io(String),
}

/// Failures raised while encoding a message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },
}

/// Parse failures. The codec turns these into "not a protocol message".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

/// Failures of a rendezvous or match round
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoundError {
    #[error("start signal not received in time")]
    StartNotReceived,

    #[error("host unreachable after {attempts} join attempts")]
    HostUnreachable { attempts: u32 },
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(ProtocolError::MalformedFrame(msg.into()))
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportError::Timeout,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::NotConnected => TransportError::NoPeers,
            _ => TransportError::Io(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::invalid_state("test error");
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(err.to_string(), "Invalid state: test error");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::Other, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));

        let err: Error = TransportError::NoPeers.into();
        assert_eq!(err.to_string(), "Transport error: no peers reachable");
    }

    #[test]
    fn test_io_kinds_map_to_transport_errors() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(TransportError::from(refused), TransportError::NoPeers);

        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(TransportError::from(timed_out), TransportError::Timeout);

        let other = io::Error::new(io::ErrorKind::Other, "boom");
        assert!(matches!(TransportError::from(other), TransportError::Io(_)));
    }
}
