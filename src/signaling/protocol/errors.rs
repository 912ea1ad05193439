use std::io;

use thiserror::Error;

/// Body parsing / format errors.
#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("unknown message type 0x{0:02x}")]
    UnknownType(u8),
    #[error("message body truncated")]
    Truncated,
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
    #[error("frame body exceeds limit ({len} > {max})")]
    TooLarge { len: usize, max: usize },
    #[error("invalid format: {0}")]
    InvalidFormat(&'static str),
    #[error("string too long ({actual} > {max})")]
    StringTooLong { max: usize, actual: usize },
    #[error("payload too long ({actual} bytes)")]
    PayloadTooLong { actual: usize },
}

/// Frame-level error: transport IO vs protocol.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("protocol: {0}")]
    Proto(#[from] ProtoError),
}

impl FrameError {
    /// True when the peer simply went away (EOF / reset), as opposed to
    /// sending something we could not understand.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            FrameError::Io(e) if matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            )
        )
    }
}
