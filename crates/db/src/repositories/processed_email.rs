use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use tracing::debug;

use mailquote_core::domain::email::EmailId;
use mailquote_core::domain::quote::ProcessedEmail;
use mailquote_core::validation::ValidationStatus;

use super::{IngestOutcome, ProcessedEmailRepository, RepositoryError};
use crate::DbPool;

/// Documents are stored as one JSON payload per email. The status and
/// received timestamp are copied into columns for filtering and ordering.
pub struct SqlProcessedEmailRepository {
    pool: DbPool,
}

impl SqlProcessedEmailRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

struct EmailRow {
    email_id: String,
    is_quote: bool,
    validation_status: Option<&'static str>,
    received_at: String,
    payload_json: String,
}

impl EmailRow {
    fn encode(email: &ProcessedEmail) -> Result<Self, RepositoryError> {
        let payload_json = serde_json::to_string(email)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        Ok(Self {
            email_id: email.id().0.clone(),
            is_quote: email.is_quote,
            validation_status: email.validation_status().map(ValidationStatus::as_str),
            received_at: sortable_timestamp(email.email.received_at),
            payload_json,
        })
    }
}

/// Fixed-width UTC rendering so text ordering matches time ordering.
fn sortable_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_email(row: &sqlx::sqlite::SqliteRow) -> Result<ProcessedEmail, RepositoryError> {
    let payload: String =
        row.try_get("payload_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    serde_json::from_str(&payload).map_err(|e| RepositoryError::Decode(e.to_string()))
}

#[async_trait::async_trait]
impl ProcessedEmailRepository for SqlProcessedEmailRepository {
    async fn find_by_id(&self, id: &EmailId) -> Result<Option<ProcessedEmail>, RepositoryError> {
        let row = sqlx::query("SELECT payload_json FROM processed_email WHERE email_id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_email).transpose()
    }

    async fn save(&self, email: ProcessedEmail) -> Result<(), RepositoryError> {
        let row = EmailRow::encode(&email)?;
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO processed_email
                (email_id, is_quote, validation_status, received_at, payload_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(email_id) DO UPDATE SET
                is_quote = excluded.is_quote,
                validation_status = excluded.validation_status,
                received_at = excluded.received_at,
                payload_json = excluded.payload_json,
                updated_at = excluded.updated_at",
        )
        .bind(&row.email_id)
        .bind(row.is_quote)
        .bind(row.validation_status)
        .bind(&row.received_at)
        .bind(&row.payload_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_ingested(&self, email: ProcessedEmail) -> Result<IngestOutcome, RepositoryError> {
        let row = EmailRow::encode(&email)?;
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO processed_email
                (email_id, is_quote, validation_status, received_at, payload_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(email_id) DO UPDATE SET
                is_quote = excluded.is_quote,
                validation_status = excluded.validation_status,
                received_at = excluded.received_at,
                payload_json = excluded.payload_json,
                updated_at = excluded.updated_at
             WHERE processed_email.validation_status IS NULL
                OR processed_email.validation_status = 'pending'",
        )
        .bind(&row.email_id)
        .bind(row.is_quote)
        .bind(row.validation_status)
        .bind(&row.received_at)
        .bind(&row.payload_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(
                event_name = "db.ingest_kept_finalized",
                email_id = %row.email_id,
                "stored document is finalized; ingest left it untouched"
            );
            return Ok(IngestOutcome::KeptFinalized);
        }
        Ok(IngestOutcome::Stored)
    }

    async fn list_quotes(
        &self,
        status: Option<ValidationStatus>,
    ) -> Result<Vec<ProcessedEmail>, RepositoryError> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT payload_json FROM processed_email
                     WHERE is_quote = 1 AND validation_status = ?
                     ORDER BY received_at DESC, email_id ASC",
                )
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT payload_json FROM processed_email
                     WHERE is_quote = 1
                     ORDER BY received_at DESC, email_id ASC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(row_to_email).collect()
    }

    async fn count_by_status(&self, status: ValidationStatus) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query(
            "SELECT COUNT(*) AS count FROM processed_email WHERE validation_status = ?",
        )
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?
        .try_get("count")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        u64::try_from(count).map_err(|e| RepositoryError::Decode(e.to_string()))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use mailquote_core::domain::email::{Attachment, EmailId, EmailMessage, MessageBody, Sender};
    use mailquote_core::domain::partner::BusinessPartner;
    use mailquote_core::domain::quote::{
        ArticleLine, PriceSource, PricingBreakdown, ProcessedEmail, QuoteDocument, QuoteMeta,
    };
    use mailquote_core::validation::{ValidationEvent, ValidationMachine, ValidationStatus};

    use super::SqlProcessedEmailRepository;
    use crate::repositories::{IngestOutcome, ProcessedEmailRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_email(id: &str, received_minutes_ago: i64, is_quote: bool) -> ProcessedEmail {
        let base = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).single().expect("valid timestamp");
        let sender =
            Sender { name: "Jean Martin".to_string(), address: "j.martin@acme.fr".to_string() };
        let document = is_quote.then(|| QuoteDocument {
            business_partner: BusinessPartner {
                card_name: "ACME Industries".to_string(),
                country: "France".to_string(),
                partner_type: "Industrie".to_string(),
                known: true,
            },
            lines: vec![ArticleLine {
                reference: "MOT-5KW-001".to_string(),
                designation: "Moteur industriel 5kW".to_string(),
                quantity: 10,
                unit_price: Decimal::new(125_000, 2),
                price_source: PriceSource::ErpTariff,
            }],
            unresolved: Vec::new(),
            pricing: PricingBreakdown::zero("EUR"),
            meta: QuoteMeta::pending(false, base),
        });
        ProcessedEmail {
            email: EmailMessage {
                id: EmailId(id.to_string()),
                subject: "Demande de devis".to_string(),
                sender,
                received_at: base - Duration::minutes(received_minutes_ago),
                body_preview: "Bonjour".to_string(),
                body: MessageBody::default(),
                has_attachments: true,
                is_read: false,
            },
            attachments: vec![Attachment {
                id: "att-1".to_string(),
                name: "catalogue.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                size_bytes: 2048,
                content_bytes: None,
            }],
            is_quote,
            pre_sap_document: document,
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trips_the_document() {
        let repo = SqlProcessedEmailRepository::new(setup().await);
        let email = sample_email("AAMk-1", 0, true);

        repo.save(email.clone()).await.expect("save");
        let found = repo.find_by_id(&EmailId("AAMk-1".to_string())).await.expect("find");

        assert_eq!(found, Some(email));
        assert!(repo.find_by_id(&EmailId("missing".to_string())).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn save_ingested_keeps_validated_documents() {
        let repo = SqlProcessedEmailRepository::new(setup().await);
        let mut validated = sample_email("AAMk-1", 0, true);
        ValidationMachine
            .apply(&mut validated, &ValidationEvent::Validate { note: Some("ok".to_string()) })
            .expect("transition");
        repo.save(validated.clone()).await.expect("save");

        let mut refetched = sample_email("AAMk-1", 0, true);
        refetched.email.subject = "RE: Demande de devis".to_string();
        let outcome = repo.save_ingested(refetched).await.expect("ingest");

        assert_eq!(outcome, IngestOutcome::KeptFinalized);
        let stored = repo
            .find_by_id(&EmailId("AAMk-1".to_string()))
            .await
            .expect("find")
            .expect("stored email");
        assert_eq!(stored, validated);
    }

    #[tokio::test]
    async fn save_ingested_replaces_pending_and_non_quote_rows() {
        let repo = SqlProcessedEmailRepository::new(setup().await);
        assert_eq!(
            repo.save_ingested(sample_email("AAMk-1", 0, true)).await.expect("ingest"),
            IngestOutcome::Stored
        );
        assert_eq!(
            repo.save_ingested(sample_email("AAMk-2", 0, false)).await.expect("ingest"),
            IngestOutcome::Stored
        );

        let mut refreshed = sample_email("AAMk-1", 0, true);
        refreshed.email.is_read = true;
        assert_eq!(
            repo.save_ingested(refreshed).await.expect("ingest"),
            IngestOutcome::Stored
        );
        assert_eq!(
            repo.save_ingested(sample_email("AAMk-2", 0, true)).await.expect("ingest"),
            IngestOutcome::Stored
        );

        let stored = repo
            .find_by_id(&EmailId("AAMk-1".to_string()))
            .await
            .expect("find")
            .expect("stored email");
        assert!(stored.email.is_read);
    }

    #[tokio::test]
    async fn list_quotes_orders_newest_first_and_filters() {
        let repo = SqlProcessedEmailRepository::new(setup().await);
        let mut rejected = sample_email("oldest", 120, true);
        ValidationMachine
            .apply(&mut rejected, &ValidationEvent::Reject { reason: None })
            .expect("transition");
        for email in [
            rejected,
            sample_email("newest", 1, true),
            sample_email("middle", 30, true),
            sample_email("newsletter", 0, false),
        ] {
            repo.save(email).await.expect("save");
        }

        let all = repo.list_quotes(None).await.expect("list");
        let ids: Vec<&str> = all.iter().map(|email| email.id().0.as_str()).collect();
        assert_eq!(ids, vec!["newest", "middle", "oldest"]);

        let pending = repo.list_quotes(Some(ValidationStatus::Pending)).await.expect("list");
        assert_eq!(pending.len(), 2);
        assert_eq!(repo.count_by_status(ValidationStatus::Pending).await.expect("count"), 2);
        assert_eq!(repo.count_by_status(ValidationStatus::Rejected).await.expect("count"), 1);
        assert_eq!(repo.count_by_status(ValidationStatus::Validated).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn ping_succeeds_on_live_pool() {
        let repo = SqlProcessedEmailRepository::new(setup().await);
        repo.ping().await.expect("ping");
    }
}
