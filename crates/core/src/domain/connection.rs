use serde::{Deserialize, Serialize};

use crate::config::CredentialPresence;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStep {
    CheckingCredentials,
    AcquiringToken,
    TestingMailbox,
    Complete,
    /// Reported only when the probe itself crashed.
    Error,
}

impl ConnectionStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckingCredentials => "checking_credentials",
            Self::AcquiringToken => "acquiring_token",
            Self::TestingMailbox => "testing_mailbox",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetails {
    pub tenant_id: bool,
    pub client_id: bool,
    pub client_secret: bool,
    pub mailbox_address: bool,
    pub token_acquired: bool,
    pub mailbox_accessible: bool,
}

impl From<CredentialPresence> for ConnectionDetails {
    fn from(presence: CredentialPresence) -> Self {
        Self {
            tenant_id: presence.tenant_id,
            client_id: presence.client_id,
            client_secret: presence.client_secret,
            mailbox_address: presence.mailbox_address,
            token_acquired: false,
            mailbox_accessible: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxInfo {
    pub display_name: String,
    pub mail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResult {
    pub success: bool,
    pub step: ConnectionStep,
    pub details: ConnectionDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mailbox_info: Option<MailboxInfo>,
}

impl ConnectionTestResult {
    pub fn started(presence: CredentialPresence) -> Self {
        Self {
            success: false,
            step: ConnectionStep::CheckingCredentials,
            details: presence.into(),
            error: None,
            mailbox_info: None,
        }
    }

    /// Shape returned when the probe could not run at all: every detail false.
    pub fn internal_failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            step: ConnectionStep::Error,
            details: ConnectionDetails::default(),
            error: Some(message.into()),
            mailbox_info: None,
        }
    }

    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(message.into());
        self
    }
}
