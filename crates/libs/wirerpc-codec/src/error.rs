use std::fmt::Display;
use std::io;

/// Errors returned by the client and server codecs.
///
/// Per-call failures (`NotSerializable`, `Payload`, `MissingParams`,
/// `DuplicateSequence`, `FrameTooLarge`) leave the connection usable. The rest
/// mean the stream can no longer be trusted, see [`CodecError::is_connection_fatal`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CodecError {
    #[error("value is not serializable: {message}")]
    NotSerializable { message: String },

    #[error("payload does not decode into the destination type: {message}")]
    Payload { message: String },

    #[error("request body missing params")]
    MissingParams,

    #[error("protocol error: {message}")]
    Protocol { message: String },

    #[error("invalid sequence number in response: {seq}")]
    UnknownSequence { seq: u64 },

    #[error("sequence number already pending: {seq}")]
    DuplicateSequence { seq: u64 },

    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { len: usize, max: u32 },

    #[error("connection closed")]
    Closed,

    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Returns `true` when the connection should be torn down after this error.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::Protocol { .. } | Self::UnknownSequence { .. } | Self::Closed | Self::Io(_)
        )
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub(crate) fn not_serializable(err: impl Display) -> Self {
        Self::NotSerializable {
            message: err.to_string(),
        }
    }

    pub(crate) fn payload(err: impl Display) -> Self {
        Self::Payload {
            message: err.to_string(),
        }
    }
}

/// Result alias used throughout the codec.
pub type Result<T, E = CodecError> = std::result::Result<T, E>;
