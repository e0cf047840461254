use thiserror::Error;

/// All errors produced by unity-core.
#[derive(Debug, Error)]
pub enum UnityError {
    #[error("service unavailable: {0}")]
    Configuration(String),

    #[error("network error: {0}")]
    Transport(String),

    #[error("backend error {code}: {message}")]
    Backend { code: u16, message: String },

    #[error("malformed payload: {0}")]
    Decode(String),

    #[error("backend capacity exceeded: {0}")]
    Capacity(String),

    #[error("capability not available: {0}")]
    Unsupported(String),

    #[error("invalid audio buffer: {0}")]
    InvalidBuffer(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl UnityError {
    /// `true` for errors that allow the one-shot fallback to the next model.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(self, UnityError::Capacity(_) | UnityError::Unsupported(_))
    }

    /// `true` for errors where trying again later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, UnityError::Transport(_) | UnityError::Capacity(_))
    }
}

impl From<base64::DecodeError> for UnityError {
    fn from(e: base64::DecodeError) -> Self {
        UnityError::Decode(format!("invalid base64: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, UnityError>;
