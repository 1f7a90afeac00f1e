//! Error types
//!
//! Each subsystem has its own error enum so that a failure can be attributed
//! (and contained) where it happened. They all convert into [`Error`].

use thiserror::Error;

use crate::frame::FrameId;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure (file open/write, transport send)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Control-plane protocol error
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Stream multiplexing error
    #[error("media error: {0}")]
    Media(#[from] MediaError),

    /// Frame lifecycle error
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Status registry error
    #[error("status error: {0}")]
    Status(#[from] StatusError),

    /// External collaborator (renderer, encoder, decoder, view source) failure
    #[error("{component} failed: {message}")]
    Collaborator {
        component: &'static str,
        message: String,
    },
}

impl Error {
    /// Build an error reported by an external collaborator
    pub fn collaborator(component: &'static str, message: impl Into<String>) -> Self {
        Error::Collaborator {
            component,
            message: message.into(),
        }
    }
}

/// Wire record and transport contract errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Record could not be parsed
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Payload larger than the transport accepts in one packet
    #[error("payload of {size} bytes exceeds transport limit of {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Transport refused or failed to send
    #[error("transport send failed: {0}")]
    SendFailed(String),
}

/// Elementary stream errors raised by the multiplexer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    /// Declared NAL length beyond the sanity bound
    #[error("NAL unit declares {declared} bytes (limit {limit})")]
    OversizedUnit { declared: usize, limit: usize },
}

/// Frame lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// No frame with this id
    #[error("frame {0} not found")]
    NotFound(FrameId),

    /// No encoder factory registered for the requested kind
    #[error("no encoder registered for {0}")]
    EncoderUnavailable(String),

    /// No renderer registered under this name
    #[error("renderer {0} not registered")]
    RendererUnavailable(String),

    /// Streaming or recording without an encoder attached
    #[error("frame {0} has no encoder in streaming mode")]
    MissingEncoder(FrameId),

    /// Invalid create/update option
    #[error("invalid frame option: {0}")]
    InvalidOption(String),

    /// Stop requested on a frame that is not recording
    #[error("frame {0} is not recording")]
    NotRecording(FrameId),

    /// Local command not understood
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

/// Status/watch registration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    /// Name exceeds the fixed key length
    #[error("status name {name:?} exceeds {limit} bytes")]
    NameTooLong { name: String, limit: usize },

    /// Name already registered
    #[error("status name {0:?} already registered")]
    Duplicate(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let err: Error = MediaError::OversizedUnit {
            declared: 2_000_000,
            limit: 1_048_576,
        }
        .into();
        assert!(matches!(err, Error::Media(MediaError::OversizedUnit { .. })));
        assert_eq!(
            err.to_string(),
            "media error: NAL unit declares 2000000 bytes (limit 1048576)"
        );

        let err: Error = FrameError::NotFound(FrameId(3)).into();
        assert_eq!(err.to_string(), "frame error: frame 3 not found");
    }

    #[test]
    fn test_collaborator_error() {
        let err = Error::collaborator("encoder", "out of buffers");
        assert_eq!(err.to_string(), "encoder failed: out of buffers");
    }
}
