use thiserror::Error;

use crate::domain::email::EmailId;
use crate::validation::states::ValidationStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("quote document `{}` is already {status}", email_id.0)]
    AlreadyFinalized { email_id: EmailId, status: ValidationStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("quote document `{0}` was not found")]
    NotFound(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Message safe to hand back to an HTTP caller. Persistence and
    /// integration detail stays in the server logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::Domain(error) => error.to_string(),
            Self::NotFound(_) => self.to_string(),
            Self::Persistence(_) => "The quote store is temporarily unavailable.".to_string(),
            Self::Integration(_) => "An upstream service call failed.".to_string(),
            Self::Configuration(_) => "The service is not configured correctly.".to_string(),
        }
    }
}
