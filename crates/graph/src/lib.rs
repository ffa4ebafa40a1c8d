pub mod error;
pub mod ingest;
pub mod mailbox;
pub mod prober;
pub mod token;

use std::time::Duration;

use mailquote_core::config::GraphConfig;
use reqwest::Client;

pub use error::GraphError;
pub use ingest::{fetch_all_attachments, MailboxIngestor};
pub use mailbox::{GraphMailboxClient, MailboxClient};
pub use prober::ConnectionProber;
pub use token::{
    AccessToken, CachingTokenProvider, ClientCredentialsTokenProvider, TokenProvider,
};

/// HTTP client with the configured per-request timeout.
pub fn build_http_client(config: &GraphConfig) -> Result<Client, GraphError> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(concat!("mailquote/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|error| GraphError::Setup(error.to_string()))
}

pub fn mailbox_client(client: Client, config: &GraphConfig) -> GraphMailboxClient {
    GraphMailboxClient::new(
        client,
        config.api_base_url.clone(),
        config.page_size,
        config.max_messages,
    )
}

pub fn token_provider(client: Client, config: &GraphConfig) -> ClientCredentialsTokenProvider {
    ClientCredentialsTokenProvider::new(client, config.authority_url.clone())
}
