use matlink_abi::MxHandle;
use thiserror::Error;

/// Failure reported by the foreign-array collaborator.
#[derive(Debug, Error)]
pub enum MxError {
    #[error("failed to load library '{path}': {message}")]
    Load { path: String, message: String },

    #[error("function '{name}' not found in '{library}'")]
    MissingSymbol { name: String, library: String },

    /// A matrix API call returned its failure sentinel (null, -1 or nonzero).
    #[error("matrix API function {function} failed")]
    CallFailed { function: &'static str },

    #[error("string passed to {function} contains an interior NUL byte")]
    InvalidString { function: &'static str },

    #[error("{0:?} does not refer to a live array")]
    InvalidHandle(MxHandle),

    #[error("{0}")]
    Unsupported(String),
}

impl MxError {
    pub fn call(function: &'static str) -> Self {
        MxError::CallFailed { function }
    }
}
