//! `fetch-emails` and `test-connection`, the two operator-facing mailbox
//! endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use mailquote_core::domain::connection::ConnectionTestResult;
use mailquote_core::domain::email::FetchedEmail;
use mailquote_db::IngestOutcome;
use serde::Serialize;
use tracing::{error, info};

use crate::error::ErrorEnvelope;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct FetchEmailsResponse {
    pub success: bool,
    pub emails: Vec<FetchedEmail>,
    pub count: usize,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/fetch-emails", get(fetch_emails).post(fetch_emails))
        .route("/test-connection", get(test_connection).post(test_connection))
}

pub async fn fetch_emails(State(state): State<AppState>) -> Response {
    let credentials = match state.graph.credentials() {
        Ok(credentials) => credentials,
        Err(error) => {
            error!(event_name = "server.fetch_emails.credentials_missing", error = %error);
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorEnvelope::new(error.to_string())))
                .into_response();
        }
    };

    let fetched = match state.ingestor.fetch_emails(&credentials).await {
        Ok(fetched) => fetched,
        Err(error) => {
            error!(
                event_name = "server.fetch_emails.failed",
                status = error.status(),
                error = %error,
                "mailbox ingestion aborted"
            );
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorEnvelope::new(error.to_string())))
                .into_response();
        }
    };

    store_processed(&state, &fetched).await;

    let count = fetched.len();
    (StatusCode::OK, Json(FetchEmailsResponse { success: true, emails: fetched, count }))
        .into_response()
}

/// Store failures stay in the logs: the caller still gets the fetched batch.
async fn store_processed(state: &AppState, fetched: &[FetchedEmail]) {
    let mut quotes = 0usize;
    let mut kept_finalized = 0usize;

    for processed in state.pipeline.process_batch(fetched) {
        let email_id = processed.id().clone();
        if processed.is_quote {
            quotes += 1;
        }
        match state.emails.save_ingested(processed).await {
            Ok(IngestOutcome::Stored) => {}
            Ok(IngestOutcome::KeptFinalized) => kept_finalized += 1,
            Err(error) => error!(
                event_name = "server.fetch_emails.store_failed",
                email_id = %email_id,
                error = %error,
                "processed email was not stored"
            ),
        }
    }

    info!(
        event_name = "server.fetch_emails.processed",
        count = fetched.len(),
        quotes,
        kept_finalized,
        "processed fetched emails"
    );
}

pub async fn test_connection(State(state): State<AppState>) -> Response {
    let prober = state.prober.clone();
    let graph = state.graph.clone();
    let outcome = tokio::spawn(async move { prober.probe(&graph).await }).await;

    match outcome {
        Ok(result) => {
            let status = if result.success { StatusCode::OK } else { StatusCode::BAD_REQUEST };
            (status, Json(result)).into_response()
        }
        Err(join_error) => {
            error!(
                event_name = "server.test_connection.crashed",
                error = %join_error,
                "connection probe did not complete"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ConnectionTestResult::internal_failure("Connection test failed unexpectedly")),
            )
                .into_response()
        }
    }
}
