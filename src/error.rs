// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::{Path, PathBuf};

/// Crate error type.
///
/// Every variant is terminal for the pipeline: nothing is retried.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A model, class, font or configuration file is missing or malformed.
    #[error("configuration error ({}): {reason}", path.display())]
    Configuration { path: PathBuf, reason: String },

    /// The video source could not be opened or started.
    #[error("video source unavailable ({source_path}): {reason}")]
    SourceUnavailable { source_path: String, reason: String },

    /// A frame read failed after the source was opened.
    #[error("frame read failed: {0}")]
    FrameRead(String),

    /// The forward pass failed or produced tensors we cannot decode.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The display surface rejected a frame.
    #[error("display failed: {0}")]
    Display(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn configuration(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Error::Configuration {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn source_unavailable(source_path: impl Into<String>, reason: impl ToString) -> Self {
        Error::SourceUnavailable {
            source_path: source_path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn inference(reason: impl ToString) -> Self {
        Error::Inference(reason.to_string())
    }

    /// Process exit status for this error.
    ///
    /// 0 is reserved for end of stream and user quit.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Configuration { .. } => 2,
            Error::SourceUnavailable { .. } => 3,
            Error::FrameRead(_) => 4,
            Error::Inference(_) => 5,
            Error::Display(_) => 1,
        }
    }
}
