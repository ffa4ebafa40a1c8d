use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use mailquote_cli::commands::{config, doctor, fetch, probe};
use mailquote_core::config::LoadOptions;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TENANT: &str = "tenant-1";
const MAILBOX: &str = "devis@example.com";

#[test]
fn config_redacts_client_secret_and_attributes_env_source() {
    with_env(
        &[
            ("MS_TENANT_ID", TENANT),
            ("MS_CLIENT_SECRET", "super-secret-value"),
            ("MAILQUOTE_LOG_LEVEL", "debug"),
        ],
        || {
            let result = config::run(LoadOptions::default());
            assert_eq!(result.exit_code, 0);

            assert!(!result.output.contains("super-secret-value"), "secret must not be printed");
            assert!(result
                .output
                .contains("- graph.client_secret = <redacted> (source: env (MS_CLIENT_SECRET))"));
            assert!(result.output.contains("- graph.tenant_id = tenant-1 (source: env (MS_TENANT_ID))"));
            assert!(result.output.contains("- graph.client_id = <unset> (source: default)"));
            assert!(result
                .output
                .contains("- logging.level = debug (source: env (MAILQUOTE_LOG_LEVEL))"));
        },
    );
}

#[test]
fn config_attributes_file_values_to_the_file() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("mailquote.toml");
        fs::write(
            &path,
            r#"
[pricing]
currency = "CHF"

[[pricing.margin_rules]]
segment = "Industrie"
country = "France"
margin_pct = 18
"#,
        )
        .expect("write config");

        let result = config::run(LoadOptions {
            config_path: Some(path.clone()),
            require_file: true,
            ..LoadOptions::default()
        });
        assert_eq!(result.exit_code, 0);

        let file_source = format!("(source: file ({}))", path.display());
        assert!(result.output.contains(&format!("- pricing.currency = CHF {file_source}")));
        assert!(result.output.contains(&format!("- pricing.margin_rules = 1 rule {file_source}")));
        assert!(result.output.contains("- erp.partners = 0 records (source: default)"));
    });
}

#[test]
fn config_reports_validation_failure() {
    with_env(&[("MAILQUOTE_DATABASE_URL", "postgres://localhost/mailquote")], || {
        let result = config::run(LoadOptions::default());
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn probe_without_credentials_stops_at_the_credential_step() {
    with_env(&[], || {
        let result = probe::run(LoadOptions::default());
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["success"], false);
        assert_eq!(payload["step"], "checking_credentials");
        assert_eq!(
            payload["error"],
            "Missing credentials: MS_TENANT_ID, MS_CLIENT_ID, MS_CLIENT_SECRET, MS_MAILBOX_ADDRESS"
        );
        assert_eq!(payload["details"]["tokenAcquired"], false);
    });
}

#[test]
fn probe_reports_mailbox_identity_on_success() {
    let runtime = Runtime::new().expect("runtime");
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("/v1.0/users/{MAILBOX}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "displayName": "Service Devis",
                "mail": MAILBOX
            })))
            .mount(&server)
            .await;
        server
    });

    with_graph_env(&server.uri(), || {
        let result = probe::run(LoadOptions::default());
        assert_eq!(result.exit_code, 0, "probe output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["success"], true);
        assert_eq!(payload["step"], "complete");
        assert_eq!(payload["details"]["mailboxAccessible"], true);
        assert_eq!(payload["mailboxInfo"]["displayName"], "Service Devis");
    });
}

#[test]
fn probe_reports_token_rejection() {
    let runtime = Runtime::new().expect("runtime");
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/{TENANT}/oauth2/v2.0/token")))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        server
    });

    with_graph_env(&server.uri(), || {
        let result = probe::run(LoadOptions::default());
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["step"], "acquiring_token");
        assert_eq!(payload["details"]["clientSecret"], true);
        assert_eq!(payload["details"]["tokenAcquired"], false);
    });
}

#[test]
fn doctor_json_flags_missing_credentials_and_skips_the_probe() {
    with_env(&[("MAILQUOTE_DATABASE_URL", "sqlite::memory:")], || {
        let result = doctor::run(LoadOptions::default(), true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        let statuses: Vec<(String, String)> = payload["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .map(|check| {
                (
                    check["name"].as_str().unwrap_or_default().to_string(),
                    check["status"].as_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("config_validation".to_string(), "pass".to_string()),
                ("mailbox_credentials".to_string(), "fail".to_string()),
                ("database_connectivity".to_string(), "pass".to_string()),
                ("mailbox_connection".to_string(), "skipped".to_string()),
            ]
        );
    });
}

#[test]
fn doctor_human_output_passes_with_reachable_mailbox() {
    let runtime = Runtime::new().expect("runtime");
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("/v1.0/users/{MAILBOX}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "displayName": "Service Devis",
                "mail": MAILBOX
            })))
            .mount(&server)
            .await;
        server
    });

    with_graph_env(&server.uri(), || {
        let result = doctor::run(LoadOptions::default(), false);
        assert_eq!(result.exit_code, 0, "doctor output: {}", result.output);

        assert_eq!(first_line(&result.output), "doctor: all readiness checks passed");
        assert!(result
            .output
            .contains("- [ok] mailbox_connection: token acquired and `devis@example.com` is readable"));
    });
}

#[test]
fn doctor_skips_everything_when_config_is_invalid() {
    with_env(&[("MAILQUOTE_SERVER_PORT", "not-a-port")], || {
        let result = doctor::run(LoadOptions::default(), false);
        assert_eq!(result.exit_code, 1);

        assert_eq!(first_line(&result.output), "doctor: one or more readiness checks failed");
        assert!(result.output.contains("- [fail] config_validation:"));
        assert!(result
            .output
            .contains("- [skip] database_connectivity: skipped because configuration did not load"));
    });
}

#[test]
fn fetch_without_credentials_prints_error_envelope() {
    with_env(&[], || {
        let result = fetch::run(LoadOptions::default(), false);
        assert_eq!(result.exit_code, 1);

        assert_eq!(
            parse_payload(&result.output),
            json!({
                "success": false,
                "error": "Missing credentials: MS_TENANT_ID, MS_CLIENT_ID, MS_CLIENT_SECRET, MS_MAILBOX_ADDRESS"
            })
        );
    });
}

#[test]
fn fetch_with_store_persists_the_processed_batch() {
    let runtime = Runtime::new().expect("runtime");
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("/v1.0/users/{MAILBOX}/messages")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    graph_message("m1", "Demande de devis moteurs"),
                    graph_message("m2", "Actualités du mois")
                ]
            })))
            .mount(&server)
            .await;
        server
    });

    with_graph_env(&server.uri(), || {
        let result = fetch::run(LoadOptions::default(), true);
        assert_eq!(result.exit_code, 0, "fetch output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["success"], true);
        assert_eq!(payload["count"], 2);
        assert_eq!(payload["emails"][0]["id"], "m1");
        assert_eq!(payload["emails"][1]["attachments"], json!([]));
        assert_eq!(payload["store"], json!({ "quotes": 1, "stored": 2, "keptFinalized": 0, "failed": 0 }));
    });
}

#[test]
fn fetch_reports_listing_failure_without_storing() {
    let runtime = Runtime::new().expect("runtime");
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("/v1.0/users/{MAILBOX}/messages")))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        server
    });

    with_graph_env(&server.uri(), || {
        let result = fetch::run(LoadOptions::default(), true);
        assert_eq!(result.exit_code, 1);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["success"], false);
        assert!(payload.get("emails").is_none());
    });
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/{TENANT}/oauth2/v2.0/token")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "graph-token"
        })))
        .mount(server)
        .await;
}

fn graph_message(id: &str, subject: &str) -> Value {
    json!({
        "id": id,
        "subject": subject,
        "from": { "emailAddress": { "name": "Achats ACME", "address": "achats@acme-industries.fr" } },
        "receivedDateTime": "2026-03-02T09:15:00Z",
        "bodyPreview": "Bonjour",
        "body": { "contentType": "html", "content": "<p>MOT-5KW-001 x10</p>" },
        "hasAttachments": false,
        "isRead": false
    })
}

fn graph_env(server_uri: &str) -> Vec<(&'static str, String)> {
    vec![
        ("MS_TENANT_ID", TENANT.to_string()),
        ("MS_CLIENT_ID", "client-1".to_string()),
        ("MS_CLIENT_SECRET", "s3cret".to_string()),
        ("MS_MAILBOX_ADDRESS", MAILBOX.to_string()),
        ("MAILQUOTE_GRAPH_AUTHORITY_URL", server_uri.to_string()),
        ("MAILQUOTE_GRAPH_API_BASE_URL", format!("{server_uri}/v1.0")),
        ("MAILQUOTE_GRAPH_TIMEOUT_SECS", "2".to_string()),
        ("MAILQUOTE_DATABASE_URL", "sqlite::memory:".to_string()),
    ]
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn first_line(output: &str) -> &str {
    output.lines().next().unwrap_or_default()
}

fn with_graph_env(server_uri: &str, test_fn: impl FnOnce()) {
    let vars = graph_env(server_uri);
    let vars: Vec<(&str, &str)> = vars.iter().map(|(key, value)| (*key, value.as_str())).collect();
    with_env(&vars, test_fn);
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let keys = [
        "MS_TENANT_ID",
        "MS_CLIENT_ID",
        "MS_CLIENT_SECRET",
        "MS_MAILBOX_ADDRESS",
        "MAILQUOTE_GRAPH_AUTHORITY_URL",
        "MAILQUOTE_GRAPH_API_BASE_URL",
        "MAILQUOTE_GRAPH_TIMEOUT_SECS",
        "MAILQUOTE_GRAPH_PAGE_SIZE",
        "MAILQUOTE_GRAPH_MAX_MESSAGES",
        "MAILQUOTE_GRAPH_ATTACHMENT_CONCURRENCY",
        "MAILQUOTE_DATABASE_URL",
        "MAILQUOTE_DATABASE_MAX_CONNECTIONS",
        "MAILQUOTE_DATABASE_TIMEOUT_SECS",
        "MAILQUOTE_SERVER_BIND_ADDRESS",
        "MAILQUOTE_SERVER_PORT",
        "MAILQUOTE_PRICING_CURRENCY",
        "MAILQUOTE_PRICING_DEFAULT_MARGIN_PCT",
        "MAILQUOTE_LOGGING_LEVEL",
        "MAILQUOTE_LOGGING_FORMAT",
        "MAILQUOTE_LOG_LEVEL",
        "MAILQUOTE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(test_fn));

    for (key, value) in previous_values {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }

    if let Err(panic) = outcome {
        std::panic::resume_unwind(panic);
    }
}
