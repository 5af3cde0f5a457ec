use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("required argument `{name}` was not supplied")]
    InvalidArgument { name: &'static str },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn invalid_argument(name: &'static str) -> Self {
        Self::InvalidArgument { name }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
