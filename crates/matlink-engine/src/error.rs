use matlink_convert::MarshalError;
use matlink_mx::MxError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("MATLAB installation not found: {0}")]
    Discovery(String),

    #[error(transparent)]
    Library(#[from] MxError),

    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error("engine call {function} failed")]
    Call { function: &'static str },

    #[error("engine session is closed")]
    Closed,
}

impl EngineError {
    pub(crate) fn call(function: &'static str) -> Self {
        EngineError::Call { function }
    }
}
