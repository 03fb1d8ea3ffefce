use thiserror::Error;

/// All errors produced by vadscope-core.
///
/// `Decode` messages are shown to the end user verbatim, so they name what
/// went wrong with the upload rather than the library that noticed.
#[derive(Debug, Error)]
pub enum VadScopeError {
    #[error("could not read audio: {0}")]
    Decode(String),

    #[error("could not serialize audio: {0}")]
    Encode(String),

    #[error("resampler error: {0}")]
    Resample(String),

    #[error("inference error: {0}")]
    Inference(String),

    #[error("ONNX session error: {0}")]
    OnnxSession(String),

    #[error("model file not found: {path}")]
    ModelNotFound { path: std::path::PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VadScopeError {
    /// Whether this error was caused by the uploaded bytes themselves
    /// (as opposed to the detector or the host).
    pub fn is_user_input(&self) -> bool {
        matches!(self, VadScopeError::Decode(_))
    }
}

pub type Result<T> = std::result::Result<T, VadScopeError>;
