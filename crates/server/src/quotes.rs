//! Review surface for stored quote documents.
//!
//! - `GET  /quotes`                   quotes only, newest first, `?status=` filter
//! - `GET  /quotes/{id}`              one processed email
//! - `GET  /quotes/{id}/explanation`  "why this price" breakdown
//! - `GET  /quotes/{id}/audit`        validation audit trail
//! - `POST /quotes/{id}/validate`     `{ "note"?: string }`
//! - `POST /quotes/{id}/reject`       `{ "reason"?: string }`

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mailquote_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
    TracingAuditSink,
};
use mailquote_core::domain::email::EmailId;
use mailquote_core::domain::quote::ProcessedEmail;
use mailquote_core::errors::ApplicationError;
use mailquote_core::explanation::PriceExplanation;
use mailquote_core::validation::{
    TransitionOutcome, ValidationEvent, ValidationMachine, ValidationStatus,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_ACTOR: &str = "operator";

#[derive(Debug, Default, Deserialize)]
pub struct QuoteListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ValidateRequest {
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteListResponse {
    pub success: bool,
    pub quotes: Vec<ProcessedEmail>,
    pub count: usize,
    pub pending_count: u64,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub success: bool,
    pub email: ProcessedEmail,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub success: bool,
    pub email: ProcessedEmail,
    pub transition: TransitionOutcome,
}

#[derive(Debug, Serialize)]
pub struct ExplanationResponse {
    pub success: bool,
    pub explanation: PriceExplanation,
}

#[derive(Debug, Serialize)]
pub struct AuditTrailResponse {
    pub success: bool,
    pub events: Vec<AuditEvent>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/quotes", get(list_quotes))
        .route("/quotes/{id}", get(get_quote))
        .route("/quotes/{id}/explanation", get(explain_quote))
        .route("/quotes/{id}/audit", get(audit_trail))
        .route("/quotes/{id}/validate", post(validate_quote))
        .route("/quotes/{id}/reject", post(reject_quote))
}

pub async fn list_quotes(
    State(state): State<AppState>,
    Query(query): Query<QuoteListQuery>,
) -> Result<Response, ApiError> {
    let status = match query.status.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => match raw.parse::<ValidationStatus>() {
            Ok(status) => Some(status),
            Err(message) => return Ok(ApiError::bad_request(message)),
        },
        None => None,
    };

    let quotes = state.emails.list_quotes(status).await?;
    let pending_count = state.emails.count_by_status(ValidationStatus::Pending).await?;
    let count = quotes.len();
    Ok(Json(QuoteListResponse { success: true, quotes, count, pending_count }).into_response())
}

pub async fn get_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let email = load(&state, &EmailId(id)).await?;
    Ok(Json(QuoteResponse { success: true, email }))
}

pub async fn explain_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExplanationResponse>, ApiError> {
    let email = load(&state, &EmailId(id.clone())).await?;
    let document = email.pre_sap_document.as_ref().ok_or_else(|| no_document(&id))?;
    Ok(Json(ExplanationResponse {
        success: true,
        explanation: state.explanations.generate(document),
    }))
}

pub async fn audit_trail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AuditTrailResponse>, ApiError> {
    let email_id = EmailId(id);
    load(&state, &email_id).await?;
    let events = state.audit_log.list_for_email(&email_id).await?;
    Ok(Json(AuditTrailResponse { success: true, events }))
}

pub async fn validate_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: ValidateRequest = match parse_optional_body(&body) {
        Ok(request) => request,
        Err(response) => return Ok(response),
    };
    decide(&state, EmailId(id), ValidationEvent::Validate { note: request.note }, &headers).await
}

pub async fn reject_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: RejectRequest = match parse_optional_body(&body) {
        Ok(request) => request,
        Err(response) => return Ok(response),
    };
    decide(&state, EmailId(id), ValidationEvent::Reject { reason: request.reason }, &headers).await
}

/// Load, transition and save under one lock so two reviewers cannot both
/// finalize the same document.
async fn decide(
    state: &AppState,
    email_id: EmailId,
    event: ValidationEvent,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let audit = audit_context(headers);
    let _guard = state.decisions.lock().await;

    let mut email = load(state, &email_id).await?;
    if email.pre_sap_document.is_none() {
        return Err(no_document(&email_id.0));
    }

    let recorded = InMemoryAuditSink::default();
    let transition = match ValidationMachine.apply_with_audit(&mut email, &event, &recorded, &audit)
    {
        Ok(transition) => transition,
        Err(refused) => {
            record_audit(state, recorded.events()).await;
            return Err(refused.into());
        }
    };

    // The applied event is only recorded once the new status is stored.
    if let Err(save_error) = state.emails.save(email.clone()).await {
        error!(
            event_name = "server.quote_save_failed",
            email_id = %email_id,
            correlation_id = %audit.correlation_id,
            error = %save_error,
            "quote disposition was not stored"
        );
        let failed = AuditEvent::new(
            Some(email_id.clone()),
            audit.correlation_id.clone(),
            "quote.validation_save_failed",
            AuditCategory::Persistence,
            audit.actor.clone(),
            AuditOutcome::Failed,
        )
        .with_metadata("from", transition.from.as_str())
        .with_metadata("to", transition.to.as_str())
        .with_metadata("error", save_error.to_string());
        record_audit(state, vec![failed]).await;
        return Err(ApiError::from(save_error));
    }
    record_audit(state, recorded.events()).await;

    info!(
        event_name = "server.quote_decided",
        email_id = %email_id,
        correlation_id = %audit.correlation_id,
        from = transition.from.as_str(),
        to = transition.to.as_str(),
        "quote disposition recorded"
    );
    Ok(Json(DecisionResponse { success: true, email, transition }).into_response())
}

async fn record_audit(state: &AppState, events: Vec<AuditEvent>) {
    for event in events {
        TracingAuditSink.emit(event.clone());
        if let Err(error) = state.audit_log.append(event).await {
            error!(
                event_name = "server.audit_append_failed",
                error = %error,
                "audit event was not persisted"
            );
        }
    }
}

async fn load(state: &AppState, email_id: &EmailId) -> Result<ProcessedEmail, ApiError> {
    state
        .emails
        .find_by_id(email_id)
        .await?
        .ok_or_else(|| ApplicationError::NotFound(email_id.0.clone()).into())
}

fn no_document(email_id: &str) -> ApiError {
    ApplicationError::NotFound(email_id.to_string()).into()
}

fn audit_context(headers: &HeaderMap) -> AuditContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    };
    AuditContext::new(
        header("x-correlation-id").unwrap_or_else(|| Uuid::new_v4().to_string()),
        header("x-actor").unwrap_or_else(|| DEFAULT_ACTOR.to_string()),
    )
}

/// An empty body means "no note"; anything else must be a JSON object.
fn parse_optional_body<T>(body: &Bytes) -> Result<T, Response>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|error| ApiError::bad_request(format!("invalid request body: {error}")))
}
