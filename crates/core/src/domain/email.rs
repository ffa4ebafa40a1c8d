use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailId(pub String);

impl std::fmt::Display for EmailId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
}

impl Sender {
    /// Lower-cased domain part of the address, if any.
    pub fn domain(&self) -> Option<String> {
        self.address
            .rsplit_once('@')
            .map(|(_, domain)| domain.trim().to_ascii_lowercase())
            .filter(|domain| !domain.is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub content: String,
}

impl MessageBody {
    pub fn is_html(&self) -> bool {
        self.content_type.eq_ignore_ascii_case("html")
    }
}

/// Snapshot of one mailbox message. Serialized in the mailbox API's own shape
/// (`from.emailAddress`, `receivedDateTime`) so callers get the wire format back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub id: EmailId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subject: String,
    #[serde(rename = "from", default, with = "recipient_wire")]
    pub sender: Sender,
    #[serde(rename = "receivedDateTime")]
    pub received_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body_preview: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: MessageBody,
    #[serde(default)]
    pub has_attachments: bool,
    #[serde(default)]
    pub is_read: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(rename = "size", default)]
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_bytes: Option<String>,
}

impl Attachment {
    pub fn without_content(&self) -> Self {
        Self { content_bytes: None, ..self.clone() }
    }

    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.trim().to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

/// A listed message together with its attachments. `attachment_error` is set
/// when the attachment call failed and `attachments` was degraded to empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedEmail {
    #[serde(flatten)]
    pub message: EmailMessage,
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_error: Option<String>,
}

mod recipient_wire {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Sender;

    #[derive(Serialize, Deserialize)]
    struct Recipient {
        #[serde(rename = "emailAddress", default)]
        email_address: Sender,
    }

    pub fn serialize<S>(sender: &Sender, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Recipient { email_address: sender.clone() }.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Sender, D::Error>
    where
        D: Deserializer<'de>,
    {
        let recipient = Option::<Recipient>::deserialize(deserializer)?;
        Ok(recipient.map(|r| r.email_address).unwrap_or_default())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{EmailMessage, FetchedEmail};

    fn graph_message() -> serde_json::Value {
        json!({
            "id": "AAMkAGI2",
            "subject": "Demande de devis moteurs",
            "from": { "emailAddress": { "name": "Jean Martin", "address": "j.martin@acme.fr" } },
            "receivedDateTime": "2026-01-12T09:30:00Z",
            "bodyPreview": "Bonjour, merci de nous faire une offre",
            "body": { "contentType": "text", "content": "Bonjour" },
            "hasAttachments": true,
            "isRead": false
        })
    }

    #[test]
    fn decodes_mailbox_wire_shape() {
        let message: EmailMessage =
            serde_json::from_value(graph_message()).expect("message decodes");

        assert_eq!(message.id.0, "AAMkAGI2");
        assert_eq!(message.sender.address, "j.martin@acme.fr");
        assert_eq!(message.sender.domain().as_deref(), Some("acme.fr"));
        assert!(message.has_attachments);
    }

    #[test]
    fn null_subject_and_missing_sender_default() {
        let mut raw = graph_message();
        raw["subject"] = serde_json::Value::Null;
        raw["from"] = serde_json::Value::Null;

        let message: EmailMessage = serde_json::from_value(raw).expect("message decodes");

        assert_eq!(message.subject, "");
        assert_eq!(message.sender.address, "");
        assert_eq!(message.sender.domain(), None);
    }

    #[test]
    fn fetched_email_serializes_flat_with_attachments() {
        let message: EmailMessage =
            serde_json::from_value(graph_message()).expect("message decodes");
        let fetched = FetchedEmail { message, attachments: Vec::new(), attachment_error: None };

        let value = serde_json::to_value(&fetched).expect("serializes");

        assert_eq!(value["id"], "AAMkAGI2");
        assert_eq!(value["from"]["emailAddress"]["name"], "Jean Martin");
        assert_eq!(value["attachments"], json!([]));
        assert!(value.get("attachmentError").is_none());
    }
}
