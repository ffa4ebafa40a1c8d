use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_TENANT_ID: &str = "MS_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "MS_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "MS_CLIENT_SECRET";
pub const ENV_MAILBOX_ADDRESS: &str = "MS_MAILBOX_ADDRESS";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub graph: GraphConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub pricing: PricingConfig,
    pub erp: ErpConfig,
}

/// Mailbox access settings. Credential fields stay optional here so that the
/// connection prober can report which of them are absent; pipeline code goes
/// through [`GraphConfig::credentials`].
#[derive(Clone, Debug)]
pub struct GraphConfig {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub mailbox_address: Option<String>,
    pub authority_url: String,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub page_size: u32,
    pub max_messages: u32,
    pub attachment_concurrency: usize,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub currency: String,
    pub default_margin_pct: Decimal,
    #[serde(default)]
    pub margin_rules: Vec<MarginRule>,
    #[serde(default)]
    pub transport: Vec<TransportRule>,
    #[serde(default)]
    pub historical_discounts: Vec<HistoricalDiscountRule>,
}

/// Margin percentage for one client category (`segment/country`). A country
/// of `*` matches every country of the segment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginRule {
    pub segment: String,
    pub country: String,
    pub margin_pct: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportRule {
    pub country: String,
    pub label: String,
    #[serde(default)]
    pub flat_amount: Option<Decimal>,
    #[serde(default)]
    pub percent: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalDiscountRule {
    pub card_name: String,
    pub percent: Decimal,
    #[serde(default)]
    pub reference_prefix: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// Declarative stand-in for the ERP lookups: partner directory, item master,
/// client tariffs and catalog list prices.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ErpConfig {
    #[serde(default)]
    pub partners: Vec<PartnerRecord>,
    #[serde(default)]
    pub items: Vec<ItemRecord>,
    #[serde(default)]
    pub tariffs: Vec<TariffRecord>,
    #[serde(default)]
    pub catalog_prices: Vec<CatalogPriceRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerRecord {
    pub domain: String,
    pub card_name: String,
    pub country: String,
    pub segment: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub reference: String,
    pub designation: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffRecord {
    pub card_name: String,
    pub reference: String,
    pub unit_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPriceRecord {
    pub reference: String,
    pub list_price: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Validated mailbox credentials. Built only through [`GraphConfig::credentials`].
#[derive(Clone, Debug)]
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub mailbox_address: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CredentialPresence {
    pub tenant_id: bool,
    pub client_id: bool,
    pub client_secret: bool,
    pub mailbox_address: bool,
}

impl CredentialPresence {
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (self.tenant_id, ENV_TENANT_ID),
            (self.client_id, ENV_CLIENT_ID),
            (self.client_secret, ENV_CLIENT_SECRET),
            (self.mailbox_address, ENV_MAILBOX_ADDRESS),
        ]
        .into_iter()
        .filter(|(present, _)| !present)
        .map(|(_, name)| name)
        .collect()
    }

    pub fn all_present(&self) -> bool {
        self.tenant_id && self.client_id && self.client_secret && self.mailbox_address
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Missing credentials: {}", .fields.join(", "))]
    Missing { fields: Vec<&'static str> },
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub mailbox_address: Option<String>,
    pub authority_url: Option<String>,
    pub api_base_url: Option<String>,
    pub database_url: Option<String>,
    pub server_port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            graph: GraphConfig {
                tenant_id: None,
                client_id: None,
                client_secret: None,
                mailbox_address: None,
                authority_url: "https://login.microsoftonline.com".to_string(),
                api_base_url: "https://graph.microsoft.com/v1.0".to_string(),
                request_timeout_secs: 30,
                page_size: 50,
                max_messages: 50,
                attachment_concurrency: 10,
            },
            database: DatabaseConfig {
                url: "sqlite://mailquote.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            pricing: PricingConfig {
                currency: "EUR".to_string(),
                default_margin_pct: Decimal::new(18, 0),
                margin_rules: Vec::new(),
                transport: Vec::new(),
                historical_discounts: Vec::new(),
            },
            erp: ErpConfig::default(),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl GraphConfig {
    pub fn credential_presence(&self) -> CredentialPresence {
        CredentialPresence {
            tenant_id: present(self.tenant_id.as_deref()),
            client_id: present(self.client_id.as_deref()),
            client_secret: present(self.client_secret.as_ref().map(|s| s.expose_secret())),
            mailbox_address: present(self.mailbox_address.as_deref()),
        }
    }

    pub fn credentials(&self) -> Result<Credentials, CredentialError> {
        let presence = self.credential_presence();
        if !presence.all_present() {
            return Err(CredentialError::Missing { fields: presence.missing() });
        }

        match (&self.tenant_id, &self.client_id, &self.client_secret, &self.mailbox_address) {
            (Some(tenant_id), Some(client_id), Some(client_secret), Some(mailbox_address)) => {
                Ok(Credentials {
                    tenant_id: tenant_id.trim().to_string(),
                    client_id: client_id.trim().to_string(),
                    client_secret: client_secret.clone(),
                    mailbox_address: mailbox_address.trim().to_string(),
                })
            }
            _ => Err(CredentialError::Missing { fields: presence.missing() }),
        }
    }
}

fn present(value: Option<&str>) -> bool {
    value.map(|value| !value.trim().is_empty()).unwrap_or(false)
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("mailquote.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(graph) = patch.graph {
            if let Some(tenant_id) = graph.tenant_id {
                self.graph.tenant_id = Some(tenant_id);
            }
            if let Some(client_id) = graph.client_id {
                self.graph.client_id = Some(client_id);
            }
            if let Some(client_secret) = graph.client_secret {
                self.graph.client_secret = Some(secret_value(client_secret));
            }
            if let Some(mailbox_address) = graph.mailbox_address {
                self.graph.mailbox_address = Some(mailbox_address);
            }
            if let Some(authority_url) = graph.authority_url {
                self.graph.authority_url = authority_url;
            }
            if let Some(api_base_url) = graph.api_base_url {
                self.graph.api_base_url = api_base_url;
            }
            if let Some(request_timeout_secs) = graph.request_timeout_secs {
                self.graph.request_timeout_secs = request_timeout_secs;
            }
            if let Some(page_size) = graph.page_size {
                self.graph.page_size = page_size;
            }
            if let Some(max_messages) = graph.max_messages {
                self.graph.max_messages = max_messages;
            }
            if let Some(attachment_concurrency) = graph.attachment_concurrency {
                self.graph.attachment_concurrency = attachment_concurrency;
            }
        }

        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(currency) = pricing.currency {
                self.pricing.currency = currency;
            }
            if let Some(default_margin_pct) = pricing.default_margin_pct {
                self.pricing.default_margin_pct = default_margin_pct;
            }
            if let Some(margin_rules) = pricing.margin_rules {
                self.pricing.margin_rules = margin_rules;
            }
            if let Some(transport) = pricing.transport {
                self.pricing.transport = transport;
            }
            if let Some(historical_discounts) = pricing.historical_discounts {
                self.pricing.historical_discounts = historical_discounts;
            }
        }

        if let Some(erp) = patch.erp {
            self.erp = erp;
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env(ENV_TENANT_ID) {
            self.graph.tenant_id = Some(value);
        }
        if let Some(value) = read_env(ENV_CLIENT_ID) {
            self.graph.client_id = Some(value);
        }
        if let Some(value) = read_env(ENV_CLIENT_SECRET) {
            self.graph.client_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env(ENV_MAILBOX_ADDRESS) {
            self.graph.mailbox_address = Some(value);
        }
        if let Some(value) = read_env("MAILQUOTE_GRAPH_AUTHORITY_URL") {
            self.graph.authority_url = value;
        }
        if let Some(value) = read_env("MAILQUOTE_GRAPH_API_BASE_URL") {
            self.graph.api_base_url = value;
        }
        if let Some(value) = read_env("MAILQUOTE_GRAPH_TIMEOUT_SECS") {
            self.graph.request_timeout_secs = parse_u64("MAILQUOTE_GRAPH_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("MAILQUOTE_GRAPH_PAGE_SIZE") {
            self.graph.page_size = parse_u32("MAILQUOTE_GRAPH_PAGE_SIZE", &value)?;
        }
        if let Some(value) = read_env("MAILQUOTE_GRAPH_MAX_MESSAGES") {
            self.graph.max_messages = parse_u32("MAILQUOTE_GRAPH_MAX_MESSAGES", &value)?;
        }
        if let Some(value) = read_env("MAILQUOTE_GRAPH_ATTACHMENT_CONCURRENCY") {
            self.graph.attachment_concurrency =
                parse_u32("MAILQUOTE_GRAPH_ATTACHMENT_CONCURRENCY", &value)? as usize;
        }

        if let Some(value) = read_env("MAILQUOTE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("MAILQUOTE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("MAILQUOTE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("MAILQUOTE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("MAILQUOTE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("MAILQUOTE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("MAILQUOTE_SERVER_PORT") {
            self.server.port = parse_u16("MAILQUOTE_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("MAILQUOTE_PRICING_CURRENCY") {
            self.pricing.currency = value;
        }
        if let Some(value) = read_env("MAILQUOTE_PRICING_DEFAULT_MARGIN_PCT") {
            self.pricing.default_margin_pct =
                parse_decimal("MAILQUOTE_PRICING_DEFAULT_MARGIN_PCT", &value)?;
        }

        let log_level =
            read_env("MAILQUOTE_LOGGING_LEVEL").or_else(|| read_env("MAILQUOTE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("MAILQUOTE_LOGGING_FORMAT").or_else(|| read_env("MAILQUOTE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(tenant_id) = overrides.tenant_id {
            self.graph.tenant_id = Some(tenant_id);
        }
        if let Some(client_id) = overrides.client_id {
            self.graph.client_id = Some(client_id);
        }
        if let Some(client_secret) = overrides.client_secret {
            self.graph.client_secret = Some(secret_value(client_secret));
        }
        if let Some(mailbox_address) = overrides.mailbox_address {
            self.graph.mailbox_address = Some(mailbox_address);
        }
        if let Some(authority_url) = overrides.authority_url {
            self.graph.authority_url = authority_url;
        }
        if let Some(api_base_url) = overrides.api_base_url {
            self.graph.api_base_url = api_base_url;
        }
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_graph(&self.graph)?;
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        validate_pricing(&self.pricing)?;
        Ok(())
    }
}

/// Explicit path if it exists, else `mailquote.toml`, else `config/mailquote.toml`.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("mailquote.toml"), PathBuf::from("config/mailquote.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_graph(graph: &GraphConfig) -> Result<(), ConfigError> {
    for (key, url) in
        [("graph.authority_url", &graph.authority_url), ("graph.api_base_url", &graph.api_base_url)]
    {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "{key} must start with http:// or https://"
            )));
        }
    }

    if graph.request_timeout_secs == 0 || graph.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "graph.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if graph.page_size == 0 || graph.page_size > 1000 {
        return Err(ConfigError::Validation(
            "graph.page_size must be in range 1..=1000".to_string(),
        ));
    }

    if graph.max_messages == 0 {
        return Err(ConfigError::Validation(
            "graph.max_messages must be greater than zero".to_string(),
        ));
    }

    if graph.attachment_concurrency == 0 || graph.attachment_concurrency > 64 {
        return Err(ConfigError::Validation(
            "graph.attachment_concurrency must be in range 1..=64".to_string(),
        ));
    }

    Ok(())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address is required".to_string()));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    if pricing.currency.trim().len() != 3 {
        return Err(ConfigError::Validation(
            "pricing.currency must be a three-letter currency code".to_string(),
        ));
    }

    if pricing.default_margin_pct < Decimal::ZERO {
        return Err(ConfigError::Validation(
            "pricing.default_margin_pct cannot be negative".to_string(),
        ));
    }

    let mut categories = HashSet::new();
    for rule in &pricing.margin_rules {
        if rule.margin_pct < Decimal::ZERO {
            return Err(ConfigError::Validation(format!(
                "pricing.margin_rules `{}/{}` has a negative margin",
                rule.segment, rule.country
            )));
        }
        let key = (rule.segment.trim().to_lowercase(), rule.country.trim().to_lowercase());
        if !categories.insert(key) {
            return Err(ConfigError::Validation(format!(
                "pricing.margin_rules declares `{}/{}` more than once",
                rule.segment, rule.country
            )));
        }
    }

    for rule in &pricing.transport {
        if rule.flat_amount.is_some() == rule.percent.is_some() {
            return Err(ConfigError::Validation(format!(
                "pricing.transport `{}` must set exactly one of flat_amount or percent",
                rule.country
            )));
        }
    }

    for rule in &pricing.historical_discounts {
        if rule.percent < Decimal::ZERO || rule.percent > Decimal::ONE_HUNDRED {
            return Err(ConfigError::Validation(format!(
                "pricing.historical_discounts `{}` percent must be in range 0..=100",
                rule.card_name
            )));
        }
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value.trim().parse::<Decimal>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    graph: Option<GraphPatch>,
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
    pricing: Option<PricingPatch>,
    erp: Option<ErpConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphPatch {
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    mailbox_address: Option<String>,
    authority_url: Option<String>,
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    page_size: Option<u32>,
    max_messages: Option<u32>,
    attachment_concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    currency: Option<String>,
    default_margin_pct: Option<Decimal>,
    margin_rules: Option<Vec<MarginRule>>,
    transport: Option<Vec<TransportRule>>,
    historical_discounts: Option<Vec<HistoricalDiscountRule>>,
}
