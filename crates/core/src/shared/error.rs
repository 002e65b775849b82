use std::path::PathBuf;

use thiserror::Error;

/// Failure classes the CLI maps to exit codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Capture device could not be opened.
    Device,
    /// Container, codec, converter or stream setup failed.
    Initialization,
    /// A per-frame step failed mid-session; the recording was cut short.
    Encoding,
    /// Output could not be opened or written.
    Io,
    /// A state machine edge was used out of order.
    State,
}

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("failed to open capture device {device}: {reason}")]
    Device { device: String, reason: String },

    #[error("failed to read from capture device: {0}")]
    Capture(String),

    #[error("{stage} setup failed: {reason}")]
    Initialization { stage: &'static str, reason: String },

    #[error("no encoder available for codec {0}")]
    CodecUnavailable(String),

    #[error("failed to open encoder {codec}: {reason}")]
    CodecOpen { codec: String, reason: String },

    #[error("pixel conversion failed: {0}")]
    Conversion(String),

    #[error("encoding failed: {0}")]
    Encoding(String),

    #[error("failed to open {} for writing: {reason}", path.display())]
    OutputOpen { path: PathBuf, reason: String },

    #[error("failed to write output: {0}")]
    Io(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl RecorderError {
    pub fn initialization(stage: &'static str, reason: impl ToString) -> Self {
        Self::Initialization {
            stage,
            reason: reason.to_string(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Device { .. } => ErrorClass::Device,
            Self::Initialization { .. } | Self::CodecUnavailable(_) | Self::CodecOpen { .. } => {
                ErrorClass::Initialization
            }
            Self::Capture(_) | Self::Conversion(_) | Self::Encoding(_) => ErrorClass::Encoding,
            Self::OutputOpen { .. } | Self::Io(_) => ErrorClass::Io,
            Self::InvalidState(_) => ErrorClass::State,
        }
    }

    /// Per-frame failures end the capture loop but still allow the file to
    /// be flushed and finalized.
    pub fn is_recoverable_mid_session(&self) -> bool {
        self.class() == ErrorClass::Encoding
    }

    pub fn exit_code(&self) -> i32 {
        match self.class() {
            ErrorClass::Encoding => 3,
            _ => 2,
        }
    }
}
