use async_trait::async_trait;
use thiserror::Error;

use mailquote_core::audit::AuditEvent;
use mailquote_core::domain::email::EmailId;
use mailquote_core::domain::quote::ProcessedEmail;
use mailquote_core::validation::ValidationStatus;

pub mod audit;
pub mod memory;
pub mod processed_email;

pub use audit::SqlAuditEventRepository;
pub use memory::{InMemoryAuditEventRepository, InMemoryProcessedEmailRepository};
pub use processed_email::SqlProcessedEmailRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Result of storing a freshly ingested email.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored,
    /// A validated or rejected document already exists and was left untouched.
    KeptFinalized,
}

/// Opaque key-value store of processed emails keyed by email id.
#[async_trait]
pub trait ProcessedEmailRepository: Send + Sync {
    async fn find_by_id(&self, id: &EmailId) -> Result<Option<ProcessedEmail>, RepositoryError>;

    /// Unconditional upsert.
    async fn save(&self, email: ProcessedEmail) -> Result<(), RepositoryError>;

    /// Upsert that never replaces a document in a terminal validation state.
    async fn save_ingested(&self, email: ProcessedEmail) -> Result<IngestOutcome, RepositoryError>;

    /// Quote emails, newest first, optionally restricted to one status.
    async fn list_quotes(
        &self,
        status: Option<ValidationStatus>,
    ) -> Result<Vec<ProcessedEmail>, RepositoryError>;

    async fn count_by_status(&self, status: ValidationStatus) -> Result<u64, RepositoryError>;

    /// Cheap round trip used by health checks.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AuditEventRepository: Send + Sync {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError>;
    async fn list_for_email(&self, id: &EmailId) -> Result<Vec<AuditEvent>, RepositoryError>;
}

pub(crate) fn is_finalized(email: &ProcessedEmail) -> bool {
    email.validation_status().is_some_and(ValidationStatus::is_terminal)
}
