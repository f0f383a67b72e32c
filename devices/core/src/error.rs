//! Errors shared by every layer of the driver.

use std::fmt;

use crate::ContentMask;

/// Protocol stage an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RegisterRead,
    RegisterWrite,
    VariableRead,
    VariableWrite,
    FrameAck,
    FrameDrain,
    FrameParse,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::RegisterRead => "register read",
            Stage::RegisterWrite => "register write",
            Stage::VariableRead => "variable-size read",
            Stage::VariableWrite => "variable-size write",
            Stage::FrameAck => "frame acknowledgement",
            Stage::FrameDrain => "frame drain",
            Stage::FrameParse => "frame parse",
        })
    }
}

/// Errors that can occur while talking to a device
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Byte-level read or write failure
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport stopped delivering bytes before a read completed
    #[error("transport stalled with {missing} of {wanted} bytes outstanding")]
    Stalled { wanted: usize, missing: usize },

    /// The device answered with an acknowledgement code we did not expect
    #[error("{stage}: register {reg:#04x} answered ack {ack}, expected {expected}")]
    UnexpectedAck {
        stage: Stage,
        reg: u8,
        ack: u8,
        expected: u8,
    },

    /// The response size field disagrees with the request
    #[error("{stage}: register {reg:#04x} answered {actual} bytes, expected {expected}")]
    SizeMismatch {
        stage: Stage,
        reg: u8,
        expected: usize,
        actual: usize,
    },

    /// A variable-size register holds more bytes than the caller allowed
    #[error("{stage}: register {reg:#04x} holds {actual} bytes, only {capacity} allowed")]
    Overflow {
        stage: Stage,
        reg: u8,
        capacity: usize,
        actual: usize,
    },

    /// Payload checksum did not match the trailing checksum byte
    #[error("{stage}: checksum mismatch (computed {computed:#04x}, received {received:#04x})")]
    Checksum {
        stage: Stage,
        computed: u8,
        received: u8,
    },

    /// Frame payload is shorter than its sections require
    #[error("malformed frame: {0}")]
    Malformed(&'static str),

    /// Bytes remained after every frame section was decoded
    #[error("frame left {0} bytes undecoded")]
    TrailingBytes(usize),

    /// No complete frame is buffered
    #[error("no frames available")]
    NoFrames,

    /// Requested content the device cannot produce
    #[error("content {requested:?} is not supported (device supports {supported:?})")]
    UnsupportedContent {
        requested: ContentMask,
        supported: ContentMask,
    },

    /// Argument rejected before any I/O
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Pressure or label decoding failed
    #[error("decompression failed: {0}")]
    Decompress(String),

    /// An earlier transport failure left the session unusable
    #[error("session is in an error state, close and reopen the device")]
    Poisoned,
}

impl Error {
    /// Whether the byte stream position is unknown after this error.
    ///
    /// Sessions refuse further I/O after such an error until they are reopened.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Stalled { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_stage_and_register() {
        let err = Error::UnexpectedAck {
            stage: Stage::RegisterRead,
            reg: 0x24,
            ack: 2,
            expected: 1,
        };
        assert_eq!(
            err.to_string(),
            "register read: register 0x24 answered ack 2, expected 1"
        );
    }

    #[test]
    fn only_transport_errors_are_fatal() {
        assert!(Error::Stalled { wanted: 4, missing: 4 }.is_session_fatal());
        assert!(Error::Io(std::io::ErrorKind::BrokenPipe.into()).is_session_fatal());
        assert!(!Error::TrailingBytes(3).is_session_fatal());
        assert!(!Error::Checksum {
            stage: Stage::FrameDrain,
            computed: 1,
            received: 2
        }
        .is_session_fatal());
    }
}
