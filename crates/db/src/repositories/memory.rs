use std::collections::HashMap;

use tokio::sync::RwLock;

use mailquote_core::audit::AuditEvent;
use mailquote_core::domain::email::EmailId;
use mailquote_core::domain::quote::ProcessedEmail;
use mailquote_core::validation::ValidationStatus;

use super::{
    is_finalized, AuditEventRepository, IngestOutcome, ProcessedEmailRepository, RepositoryError,
};

#[derive(Default)]
pub struct InMemoryProcessedEmailRepository {
    emails: RwLock<HashMap<String, ProcessedEmail>>,
}

#[async_trait::async_trait]
impl ProcessedEmailRepository for InMemoryProcessedEmailRepository {
    async fn find_by_id(&self, id: &EmailId) -> Result<Option<ProcessedEmail>, RepositoryError> {
        let emails = self.emails.read().await;
        Ok(emails.get(&id.0).cloned())
    }

    async fn save(&self, email: ProcessedEmail) -> Result<(), RepositoryError> {
        let mut emails = self.emails.write().await;
        emails.insert(email.id().0.clone(), email);
        Ok(())
    }

    async fn save_ingested(&self, email: ProcessedEmail) -> Result<IngestOutcome, RepositoryError> {
        let mut emails = self.emails.write().await;
        if emails.get(&email.id().0).is_some_and(is_finalized) {
            return Ok(IngestOutcome::KeptFinalized);
        }
        emails.insert(email.id().0.clone(), email);
        Ok(IngestOutcome::Stored)
    }

    async fn list_quotes(
        &self,
        status: Option<ValidationStatus>,
    ) -> Result<Vec<ProcessedEmail>, RepositoryError> {
        let emails = self.emails.read().await;
        let mut quotes: Vec<ProcessedEmail> = emails
            .values()
            .filter(|email| email.is_quote)
            .filter(|email| status.map_or(true, |wanted| email.validation_status() == Some(wanted)))
            .cloned()
            .collect();
        quotes.sort_by(|left, right| {
            right.email.received_at.cmp(&left.email.received_at).then_with(|| left.id().cmp(right.id()))
        });
        Ok(quotes)
    }

    async fn count_by_status(&self, status: ValidationStatus) -> Result<u64, RepositoryError> {
        let emails = self.emails.read().await;
        Ok(emails.values().filter(|email| email.validation_status() == Some(status)).count() as u64)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAuditEventRepository {
    events: RwLock<Vec<AuditEvent>>,
}

#[async_trait::async_trait]
impl AuditEventRepository for InMemoryAuditEventRepository {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn list_for_email(&self, id: &EmailId) -> Result<Vec<AuditEvent>, RepositoryError> {
        let events = self.events.read().await;
        Ok(events.iter().filter(|event| event.email_id.as_ref() == Some(id)).cloned().collect())
    }
}
