use mailquote_core::config::CredentialError;
use serde::Deserialize;
use thiserror::Error;

const LOGGED_BODY_MAX_LEN: usize = 200;

/// Failure kinds at the identity/mailbox boundary. `status` is `None` when the
/// call timed out or never reached the server.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error("{message}")]
    TokenAcquisitionFailed { status: Option<u16>, message: String },
    #[error("{message}")]
    MailboxFetchFailed { status: Option<u16>, message: String },
    #[error("{message}")]
    AttachmentFetchFailed { message_id: String, status: Option<u16>, message: String },
    #[error("{message}")]
    MailboxLookupFailed { status: Option<u16>, message: String },
    #[error("graph client setup failed: {0}")]
    Setup(String),
}

impl GraphError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::TokenAcquisitionFailed { status, .. }
            | Self::MailboxFetchFailed { status, .. }
            | Self::AttachmentFetchFailed { status, .. }
            | Self::MailboxLookupFailed { status, .. } => *status,
            Self::Credentials(_) | Self::Setup(_) => None,
        }
    }

    /// Whether the whole ingestion run must stop.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::AttachmentFetchFailed { .. })
    }
}

#[derive(Deserialize)]
struct IdentityErrorBody {
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct GraphErrorEnvelope {
    error: Option<GraphErrorBody>,
}

#[derive(Deserialize)]
struct GraphErrorBody {
    message: Option<String>,
}

/// `error_description` of an identity endpoint error body.
pub(crate) fn identity_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<IdentityErrorBody>(body)
        .ok()?
        .error_description
        .filter(|message| !message.trim().is_empty())
}

/// `error.message` of a Graph error body.
pub(crate) fn graph_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<GraphErrorEnvelope>(body)
        .ok()?
        .error?
        .message
        .filter(|message| !message.trim().is_empty())
}

pub(crate) fn redact_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= LOGGED_BODY_MAX_LEN {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(LOGGED_BODY_MAX_LEN).collect();
    format!("{head}... [truncated]")
}

/// Short description of a transport failure, used in place of a status code.
pub(crate) fn transport_reason(error: &reqwest::Error) -> &'static str {
    if error.is_timeout() {
        "timeout"
    } else if error.is_connect() {
        "connection failed"
    } else {
        "request failed"
    }
}

#[cfg(test)]
mod tests {
    use mailquote_core::config::CredentialError;

    use super::{graph_error_message, identity_error_message, redact_body, GraphError};

    #[test]
    fn identity_errors_surface_their_description() {
        let body = r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret provided."}"#;

        assert_eq!(
            identity_error_message(body).as_deref(),
            Some("AADSTS7000215: Invalid client secret provided.")
        );
        assert_eq!(identity_error_message("<html>bad gateway</html>"), None);
        assert_eq!(identity_error_message(r#"{"error_description":"  "}"#), None);
    }

    #[test]
    fn graph_errors_surface_the_nested_message() {
        let body = r#"{"error":{"code":"ErrorAccessDenied","message":"Access is denied."}}"#;

        assert_eq!(graph_error_message(body).as_deref(), Some("Access is denied."));
        assert_eq!(graph_error_message(r#"{"value":[]}"#), None);
    }

    #[test]
    fn long_bodies_are_truncated_for_logs() {
        let body = "x".repeat(500);
        let redacted = redact_body(&body);

        assert!(redacted.len() < 250);
        assert!(redacted.ends_with("[truncated]"));
    }

    #[test]
    fn only_attachment_failures_are_contained() {
        let attachment = GraphError::AttachmentFetchFailed {
            message_id: "AAMk-1".to_string(),
            status: Some(500),
            message: "Failed to fetch attachments: 500".to_string(),
        };
        let missing = GraphError::from(CredentialError::Missing { fields: vec!["MS_TENANT_ID"] });

        assert!(!attachment.is_fatal());
        assert_eq!(attachment.status(), Some(500));
        assert!(missing.is_fatal());
        assert_eq!(missing.to_string(), "Missing credentials: MS_TENANT_ID");
    }
}
