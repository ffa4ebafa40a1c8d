use chrono::{DateTime, Utc};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::email::EmailId;
use crate::domain::quote::ProcessedEmail;
use crate::errors::DomainError;
use crate::validation::states::{TransitionOutcome, ValidationEvent, ValidationStatus};

/// Pure transition table: `pending -> validated | rejected`, nothing leaves a
/// terminal state.
pub fn next_status(
    email_id: &EmailId,
    current: ValidationStatus,
    event: &ValidationEvent,
) -> Result<TransitionOutcome, DomainError> {
    if current.is_terminal() {
        return Err(DomainError::AlreadyFinalized { email_id: email_id.clone(), status: current });
    }

    Ok(TransitionOutcome { from: current, to: event.target(), event: event.clone() })
}

/// Applies `event` to the document owned by `email`. This is the only code path
/// that writes a document's disposition.
pub fn apply_transition(
    email: &mut ProcessedEmail,
    event: &ValidationEvent,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, DomainError> {
    let email_id = email.email.id.clone();
    let Some(document) = email.pre_sap_document.as_mut() else {
        return Err(DomainError::InvariantViolation(format!(
            "email `{email_id}` carries no quote document"
        )));
    };

    let outcome = next_status(&email_id, document.meta.validation_status, event)?;
    document.meta.validation_status = outcome.to;
    document.meta.decided_at = Some(now);
    document.meta.decision_note = event.note().map(str::to_owned);
    Ok(outcome)
}

#[derive(Clone, Debug, Default)]
pub struct ValidationMachine;

impl ValidationMachine {
    pub fn apply(
        &self,
        email: &mut ProcessedEmail,
        event: &ValidationEvent,
    ) -> Result<TransitionOutcome, DomainError> {
        apply_transition(email, event, Utc::now())
    }

    pub fn apply_with_audit<S>(
        &self,
        email: &mut ProcessedEmail,
        event: &ValidationEvent,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, DomainError>
    where
        S: AuditSink + ?Sized,
    {
        let email_id = email.email.id.clone();
        let result = self.apply(email, event);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        Some(email_id),
                        audit.correlation_id.clone(),
                        "quote.validation_applied",
                        AuditCategory::Validation,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", outcome.from.as_str())
                    .with_metadata("to", outcome.to.as_str()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        Some(email_id),
                        audit.correlation_id.clone(),
                        "quote.validation_refused",
                        AuditCategory::Validation,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}
