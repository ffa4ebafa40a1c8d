use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use mailquote_core::config::{
    resolve_config_path, AppConfig, LoadOptions, ENV_CLIENT_ID, ENV_CLIENT_SECRET,
    ENV_MAILBOX_ADDRESS, ENV_TENANT_ID,
};
use toml::Value;

use crate::commands::CommandResult;

struct Entry {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn entry(key: &'static str, value: String, env_keys: &'static [&'static str]) -> Entry {
    Entry { key, value, env_keys }
}

struct ConfigFile {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file = ConfigFile::detect(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let graph = &config.graph;
    let secret = if graph.client_secret.is_some() { "<redacted>" } else { "<unset>" };
    let entries = vec![
        entry("graph.tenant_id", optional(graph.tenant_id.as_deref()), &[ENV_TENANT_ID]),
        entry("graph.client_id", optional(graph.client_id.as_deref()), &[ENV_CLIENT_ID]),
        entry("graph.client_secret", secret.to_string(), &[ENV_CLIENT_SECRET]),
        entry("graph.mailbox_address", optional(graph.mailbox_address.as_deref()), &[
            ENV_MAILBOX_ADDRESS,
        ]),
        entry(
            "graph.authority_url",
            graph.authority_url.clone(),
            &["MAILQUOTE_GRAPH_AUTHORITY_URL"],
        ),
        entry("graph.api_base_url", graph.api_base_url.clone(), &["MAILQUOTE_GRAPH_API_BASE_URL"]),
        entry(
            "graph.request_timeout_secs",
            graph.request_timeout_secs.to_string(),
            &["MAILQUOTE_GRAPH_TIMEOUT_SECS"],
        ),
        entry("graph.page_size", graph.page_size.to_string(), &["MAILQUOTE_GRAPH_PAGE_SIZE"]),
        entry(
            "graph.max_messages",
            graph.max_messages.to_string(),
            &["MAILQUOTE_GRAPH_MAX_MESSAGES"],
        ),
        entry(
            "graph.attachment_concurrency",
            graph.attachment_concurrency.to_string(),
            &["MAILQUOTE_GRAPH_ATTACHMENT_CONCURRENCY"],
        ),
        entry("database.url", config.database.url.clone(), &["MAILQUOTE_DATABASE_URL"]),
        entry(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["MAILQUOTE_DATABASE_MAX_CONNECTIONS"],
        ),
        entry(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["MAILQUOTE_DATABASE_TIMEOUT_SECS"],
        ),
        entry("server.bind_address", config.server.bind_address.clone(), &[
            "MAILQUOTE_SERVER_BIND_ADDRESS",
        ]),
        entry("server.port", config.server.port.to_string(), &["MAILQUOTE_SERVER_PORT"]),
        entry("logging.level", config.logging.level.clone(), &[
            "MAILQUOTE_LOGGING_LEVEL",
            "MAILQUOTE_LOG_LEVEL",
        ]),
        entry("logging.format", format!("{:?}", config.logging.format), &[
            "MAILQUOTE_LOGGING_FORMAT",
            "MAILQUOTE_LOG_FORMAT",
        ]),
        entry("pricing.currency", config.pricing.currency.clone(), &["MAILQUOTE_PRICING_CURRENCY"]),
        entry(
            "pricing.default_margin_pct",
            config.pricing.default_margin_pct.to_string(),
            &["MAILQUOTE_PRICING_DEFAULT_MARGIN_PCT"],
        ),
        entry("pricing.margin_rules", count(config.pricing.margin_rules.len(), "rule"), &[]),
        entry("pricing.transport", count(config.pricing.transport.len(), "rule"), &[]),
        entry(
            "pricing.historical_discounts",
            count(config.pricing.historical_discounts.len(), "rule"),
            &[],
        ),
        entry("erp.partners", count(config.erp.partners.len(), "record"), &[]),
        entry("erp.items", count(config.erp.items.len(), "record"), &[]),
        entry("erp.tariffs", count(config.erp.tariffs.len(), "record"), &[]),
        entry("erp.catalog_prices", count(config.erp.catalog_prices.len(), "record"), &[]),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in entries {
        lines.push(render_line(
            entry.key,
            &entry.value,
            config_file.source_of(entry.key, entry.env_keys),
        ));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

impl ConfigFile {
    fn detect(explicit: Option<&Path>) -> Self {
        let path = resolve_config_path(explicit);
        let doc = path
            .as_deref()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|raw| raw.parse::<Value>().ok());
        Self { path, doc }
    }

    fn source_of(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn optional(value: Option<&str>) -> String {
    value.filter(|value| !value.trim().is_empty()).unwrap_or("<unset>").to_string()
}

fn count(len: usize, noun: &str) -> String {
    if len == 1 {
        format!("1 {noun}")
    } else {
        format!("{len} {noun}s")
    }
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
