use std::sync::Arc;

use mailquote_core::config::{AppConfig, GraphConfig};
use mailquote_core::{ExplanationGenerator, QuotePipeline};
use mailquote_db::{AuditEventRepository, ProcessedEmailRepository};
use mailquote_graph::{
    build_http_client, mailbox_client, token_provider, CachingTokenProvider, ConnectionProber,
    GraphError, MailboxIngestor,
};
use tokio::sync::Mutex;

/// Everything a request handler needs, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub graph: Arc<GraphConfig>,
    pub ingestor: MailboxIngestor,
    pub prober: ConnectionProber,
    pub pipeline: QuotePipeline,
    pub emails: Arc<dyn ProcessedEmailRepository>,
    pub audit_log: Arc<dyn AuditEventRepository>,
    pub explanations: Arc<ExplanationGenerator>,
    /// Serializes load, transition and save of quote dispositions.
    pub decisions: Arc<Mutex<()>>,
}

impl AppState {
    /// Ingestion shares one cached token; the prober always runs a fresh grant.
    pub fn from_config(
        config: &AppConfig,
        emails: Arc<dyn ProcessedEmailRepository>,
        audit_log: Arc<dyn AuditEventRepository>,
    ) -> Result<Self, GraphError> {
        let client = build_http_client(&config.graph)?;
        let mailbox = Arc::new(mailbox_client(client.clone(), &config.graph));
        let grant = token_provider(client, &config.graph);

        let ingestor = MailboxIngestor::new(
            Arc::new(CachingTokenProvider::new(grant.clone())),
            mailbox.clone(),
            config.graph.attachment_concurrency,
        );
        let prober = ConnectionProber::new(Arc::new(grant), mailbox);

        let pipeline = QuotePipeline::from_config(config);

        Ok(Self {
            graph: Arc::new(config.graph.clone()),
            ingestor,
            prober,
            pipeline,
            emails,
            audit_log,
            explanations: Arc::new(ExplanationGenerator::default()),
            decisions: Arc::new(Mutex::new(())),
        })
    }
}
