use thiserror::Error;

/// Domain failures raised by the logic layer. Anything else travelling in an
/// `anyhow::Error` is treated as an internal error by the API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LogicError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unavailable(String),
}

impl LogicError {
    pub fn not_found(message: impl Into<String>) -> Self {
        LogicError::NotFound(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        LogicError::Invalid(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        LogicError::Forbidden(message.into())
    }
}
