use async_trait::async_trait;
use mailquote_core::domain::connection::MailboxInfo;
use mailquote_core::domain::email::{Attachment, EmailId, EmailMessage};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::error::{graph_error_message, redact_body, transport_reason, GraphError};
use crate::token::AccessToken;

pub const MESSAGE_SELECT_FIELDS: &str =
    "id,subject,from,receivedDateTime,bodyPreview,body,hasAttachments,isRead";
const UNKNOWN_DISPLAY_NAME: &str = "Unknown";

#[async_trait]
pub trait MailboxClient: Send + Sync {
    /// Newest first, at most the configured number of messages.
    async fn list_messages(
        &self,
        token: &AccessToken,
        mailbox: &str,
    ) -> Result<Vec<EmailMessage>, GraphError>;

    async fn fetch_attachments(
        &self,
        token: &AccessToken,
        mailbox: &str,
        message_id: &EmailId,
    ) -> Result<Vec<Attachment>, GraphError>;

    /// The mailbox's user resource, used by connection diagnostics.
    async fn mailbox_identity(
        &self,
        token: &AccessToken,
        mailbox: &str,
    ) -> Result<MailboxInfo, GraphError>;
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserResource {
    display_name: Option<String>,
    mail: Option<String>,
}

#[derive(Clone, Debug)]
pub struct GraphMailboxClient {
    client: Client,
    api_base_url: String,
    page_size: u32,
    max_messages: u32,
}

impl GraphMailboxClient {
    pub fn new(
        client: Client,
        api_base_url: impl Into<String>,
        page_size: u32,
        max_messages: u32,
    ) -> Self {
        Self {
            client,
            api_base_url: api_base_url.into(),
            page_size: page_size.max(1),
            max_messages: max_messages.max(1),
        }
    }

    fn user_url(&self, mailbox: &str, rest: &[&str]) -> Result<Url, GraphError> {
        let mut url = Url::parse(&self.api_base_url)
            .map_err(|error| GraphError::Setup(format!("invalid api base url: {error}")))?;
        url.path_segments_mut()
            .map_err(|()| GraphError::Setup("api base url cannot be a base".to_string()))?
            .pop_if_empty()
            .push("users")
            .push(mailbox)
            .extend(rest);
        Ok(url)
    }

    fn first_page_url(&self, mailbox: &str) -> Result<Url, GraphError> {
        let mut url = self.user_url(mailbox, &["messages"])?;
        let top = self.page_size.min(self.max_messages);
        url.set_query(Some(&format!(
            "$top={top}&$orderby=receivedDateTime%20desc&$select={MESSAGE_SELECT_FIELDS}"
        )));
        Ok(url)
    }

    async fn get(&self, token: &AccessToken, url: Url) -> Result<Response, reqwest::Error> {
        self.client
            .get(url)
            .bearer_auth(token.secret())
            .header("accept", "application/json")
            .send()
            .await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, (StatusCode, String)> {
    let status = response.status();
    let body = response.text().await.map_err(|error| (status, error.to_string()))?;
    if !status.is_success() {
        return Err((status, body));
    }
    serde_json::from_str(&body).map_err(|error| (status, format!("malformed response: {error}")))
}

#[async_trait]
impl MailboxClient for GraphMailboxClient {
    async fn list_messages(
        &self,
        token: &AccessToken,
        mailbox: &str,
    ) -> Result<Vec<EmailMessage>, GraphError> {
        let limit = self.max_messages as usize;
        let mut messages: Vec<EmailMessage> = Vec::new();
        let mut next = Some(self.first_page_url(mailbox)?);

        while let Some(url) = next.take() {
            let response = self.get(token, url).await.map_err(|error| {
                error!(
                    event_name = "graph.messages_request_failed",
                    mailbox,
                    error = %error,
                    "message listing did not complete"
                );
                GraphError::MailboxFetchFailed {
                    status: None,
                    message: format!("Failed to fetch emails: {}", transport_reason(&error)),
                }
            })?;

            let page: Page<EmailMessage> = read_json(response).await.map_err(|(status, body)| {
                error!(
                    event_name = "graph.messages_rejected",
                    mailbox,
                    status = status.as_u16(),
                    body = %redact_body(&body),
                    "message listing failed"
                );
                GraphError::MailboxFetchFailed {
                    status: Some(status.as_u16()),
                    message: format!("Failed to fetch emails: {}", status.as_u16()),
                }
            })?;

            messages.extend(page.value);
            if messages.len() >= limit {
                messages.truncate(limit);
                break;
            }

            next = match page.next_link {
                Some(link) => Some(Url::parse(&link).map_err(|error| {
                    GraphError::MailboxFetchFailed {
                        status: None,
                        message: format!("Failed to fetch emails: invalid next link ({error})"),
                    }
                })?),
                None => None,
            };
        }

        debug!(
            event_name = "graph.messages_listed",
            mailbox,
            count = messages.len(),
            "listed messages"
        );
        Ok(messages)
    }

    async fn fetch_attachments(
        &self,
        token: &AccessToken,
        mailbox: &str,
        message_id: &EmailId,
    ) -> Result<Vec<Attachment>, GraphError> {
        let url = self.user_url(mailbox, &["messages", message_id.0.as_str(), "attachments"])?;

        let response = self.get(token, url).await.map_err(|error| {
            warn!(
                event_name = "graph.attachments_request_failed",
                email_id = %message_id,
                error = %error,
                "attachment request did not complete"
            );
            GraphError::AttachmentFetchFailed {
                message_id: message_id.0.clone(),
                status: None,
                message: format!("Failed to fetch attachments: {}", transport_reason(&error)),
            }
        })?;

        let page: Page<Attachment> = read_json(response).await.map_err(|(status, body)| {
            warn!(
                event_name = "graph.attachments_rejected",
                email_id = %message_id,
                status = status.as_u16(),
                body = %redact_body(&body),
                "attachment listing failed"
            );
            GraphError::AttachmentFetchFailed {
                message_id: message_id.0.clone(),
                status: Some(status.as_u16()),
                message: graph_error_message(&body)
                    .unwrap_or_else(|| format!("Failed to fetch attachments: {}", status.as_u16())),
            }
        })?;

        Ok(page.value)
    }

    async fn mailbox_identity(
        &self,
        token: &AccessToken,
        mailbox: &str,
    ) -> Result<MailboxInfo, GraphError> {
        let url = self.user_url(mailbox, &[])?;

        let response = self.get(token, url).await.map_err(|error| {
            error!(
                event_name = "graph.mailbox_lookup_request_failed",
                mailbox,
                error = %error,
                "mailbox identity lookup did not complete"
            );
            GraphError::MailboxLookupFailed {
                status: None,
                message: format!("Mailbox access failed ({})", transport_reason(&error)),
            }
        })?;

        let user: UserResource = read_json(response).await.map_err(|(status, body)| {
            error!(
                event_name = "graph.mailbox_lookup_rejected",
                mailbox,
                status = status.as_u16(),
                body = %redact_body(&body),
                "mailbox identity lookup failed"
            );
            GraphError::MailboxLookupFailed {
                status: Some(status.as_u16()),
                message: graph_error_message(&body)
                    .unwrap_or_else(|| format!("Mailbox access failed ({})", status.as_u16())),
            }
        })?;

        Ok(MailboxInfo {
            display_name: user
                .display_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_DISPLAY_NAME.to_string()),
            mail: user
                .mail
                .filter(|mail| !mail.trim().is_empty())
                .unwrap_or_else(|| mailbox.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Client;

    use super::GraphMailboxClient;

    #[test]
    fn mailbox_is_a_single_path_segment() {
        let client =
            GraphMailboxClient::new(Client::new(), "https://graph.microsoft.com/v1.0/", 50, 50);

        let url = client.user_url("devis/odd#box@example.com", &["messages"]).expect("url");

        assert_eq!(
            url.as_str(),
            "https://graph.microsoft.com/v1.0/users/devis%2Fodd%23box@example.com/messages"
        );
    }

    #[test]
    fn first_page_requests_newest_first_with_selected_fields() {
        let client =
            GraphMailboxClient::new(Client::new(), "https://graph.microsoft.com/v1.0", 50, 20);

        let url = client.first_page_url("devis@example.com").expect("url");

        assert_eq!(
            url.query(),
            Some("$top=20&$orderby=receivedDateTime%20desc&$select=id,subject,from,receivedDateTime,bodyPreview,body,hasAttachments,isRead")
        );
    }
}
