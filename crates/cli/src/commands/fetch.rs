use std::sync::Arc;

use mailquote_core::config::{AppConfig, LoadOptions};
use mailquote_core::domain::email::FetchedEmail;
use mailquote_core::QuotePipeline;
use mailquote_db::{
    connect_from_config, migrations, IngestOutcome, ProcessedEmailRepository,
    SqlProcessedEmailRepository,
};
use mailquote_graph::{build_http_client, mailbox_client, token_provider, MailboxIngestor};
use serde::Serialize;
use tracing::warn;

use crate::commands::{runtime, CommandResult};

#[derive(Debug, Serialize)]
struct FetchEnvelope {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    emails: Option<Vec<FetchedEmail>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    store: Option<StoreSummary>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreSummary {
    quotes: usize,
    stored: usize,
    kept_finalized: usize,
    failed: usize,
}

impl FetchEnvelope {
    fn failed(error: impl Into<String>) -> Self {
        Self { success: false, emails: None, count: None, error: Some(error.into()), store: None }
    }
}

/// One ingestion run. Prints the `fetch-emails` body; with `store`, the batch
/// is also classified, priced and saved like the server does.
pub fn run(options: LoadOptions, store: bool) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "fetch",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let credentials = match config.graph.credentials() {
        Ok(credentials) => credentials,
        Err(error) => {
            return CommandResult::report("fetch", &FetchEnvelope::failed(error.to_string()), 1);
        }
    };
    let client = match build_http_client(&config.graph) {
        Ok(client) => client,
        Err(error) => return CommandResult::failure("fetch", "client_setup", error.to_string(), 3),
    };
    let ingestor = MailboxIngestor::new(
        Arc::new(token_provider(client.clone(), &config.graph)),
        Arc::new(mailbox_client(client, &config.graph)),
        config.graph.attachment_concurrency,
    );
    let runtime = match runtime("fetch") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let fetched = match runtime.block_on(ingestor.fetch_emails(&credentials)) {
        Ok(fetched) => fetched,
        Err(error) => {
            return CommandResult::report("fetch", &FetchEnvelope::failed(error.to_string()), 1);
        }
    };

    let summary = if store {
        match runtime.block_on(store_batch(&config, &fetched)) {
            Ok(summary) => Some(summary),
            Err((error_class, message, exit_code)) => {
                return CommandResult::failure("fetch", error_class, message, exit_code);
            }
        }
    } else {
        None
    };

    let count = fetched.len();
    let envelope = FetchEnvelope {
        success: true,
        emails: Some(fetched),
        count: Some(count),
        error: None,
        store: summary,
    };
    CommandResult::report("fetch", &envelope, 0)
}

async fn store_batch(
    config: &AppConfig,
    fetched: &[FetchedEmail],
) -> Result<StoreSummary, (&'static str, String, u8)> {
    let pool = connect_from_config(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string(), 5u8))?;

    let repository = SqlProcessedEmailRepository::new(pool.clone());
    let mut summary = StoreSummary::default();
    for processed in QuotePipeline::from_config(config).process_batch(fetched) {
        let email_id = processed.id().clone();
        if processed.is_quote {
            summary.quotes += 1;
        }
        match repository.save_ingested(processed).await {
            Ok(IngestOutcome::Stored) => summary.stored += 1,
            Ok(IngestOutcome::KeptFinalized) => summary.kept_finalized += 1,
            Err(error) => {
                summary.failed += 1;
                warn!(
                    event_name = "cli.fetch.store_failed",
                    email_id = %email_id,
                    error = %error,
                    "processed email was not stored"
                );
            }
        }
    }

    pool.close().await;
    Ok(summary)
}
