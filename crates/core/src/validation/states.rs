use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pending,
    Validated,
    Rejected,
}

impl ValidationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Validated | Self::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validated => "validated",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ValidationStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "validated" => Ok(Self::Validated),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown validation status `{other}`")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ValidationEvent {
    Validate { note: Option<String> },
    Reject { reason: Option<String> },
}

impl ValidationEvent {
    pub fn target(&self) -> ValidationStatus {
        match self {
            Self::Validate { .. } => ValidationStatus::Validated,
            Self::Reject { .. } => ValidationStatus::Rejected,
        }
    }

    pub fn note(&self) -> Option<&str> {
        match self {
            Self::Validate { note } => note.as_deref(),
            Self::Reject { reason } => reason.as_deref(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: ValidationStatus,
    pub to: ValidationStatus,
    pub event: ValidationEvent,
}
