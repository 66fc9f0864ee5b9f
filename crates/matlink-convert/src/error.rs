use matlink_mx::MxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarshalError {
    /// The value has no representation on the other side.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// An allocation or accessor call into the matrix library failed.
    #[error("foreign call failed: {0}")]
    ForeignCallFailed(#[from] MxError),

    /// A cell or struct reported an inconsistent shape, field table or
    /// element size.
    #[error("malformed container: {0}")]
    MalformedContainer(String),
}

impl MarshalError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        MarshalError::MalformedContainer(message.into())
    }
}
