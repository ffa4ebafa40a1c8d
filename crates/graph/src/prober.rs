use std::sync::Arc;

use mailquote_core::config::GraphConfig;
use mailquote_core::domain::connection::{ConnectionStep, ConnectionTestResult};
use tracing::info;

use crate::mailbox::MailboxClient;
use crate::token::TokenProvider;

/// Operator diagnostic: credentials, token, mailbox identity, in that order,
/// stopping at the first failing step. No retries.
#[derive(Clone)]
pub struct ConnectionProber {
    tokens: Arc<dyn TokenProvider>,
    mailbox: Arc<dyn MailboxClient>,
}

impl ConnectionProber {
    /// `tokens` should not be a cache: every probe must exercise the grant.
    pub fn new(tokens: Arc<dyn TokenProvider>, mailbox: Arc<dyn MailboxClient>) -> Self {
        Self { tokens, mailbox }
    }

    pub async fn probe(&self, config: &GraphConfig) -> ConnectionTestResult {
        let mut result = ConnectionTestResult::started(config.credential_presence());

        let credentials = match config.credentials() {
            Ok(credentials) => credentials,
            Err(error) => return finish(result.fail(error.to_string())),
        };

        result.step = ConnectionStep::AcquiringToken;
        let token = match self.tokens.acquire_token(&credentials).await {
            Ok(token) => token,
            Err(error) => return finish(result.fail(error.to_string())),
        };
        result.details.token_acquired = true;

        result.step = ConnectionStep::TestingMailbox;
        let info = match self.mailbox.mailbox_identity(&token, &credentials.mailbox_address).await
        {
            Ok(info) => info,
            Err(error) => return finish(result.fail(error.to_string())),
        };
        result.details.mailbox_accessible = true;

        result.step = ConnectionStep::Complete;
        result.success = true;
        result.mailbox_info = Some(info);
        finish(result)
    }
}

fn finish(result: ConnectionTestResult) -> ConnectionTestResult {
    info!(
        event_name = "graph.connection_probed",
        success = result.success,
        step = ?result.step,
        error = result.error.as_deref().unwrap_or(""),
        "connection probe finished"
    );
    result
}
