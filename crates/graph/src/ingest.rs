use std::sync::Arc;

use mailquote_core::config::Credentials;
use mailquote_core::domain::email::{Attachment, EmailMessage, FetchedEmail};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::GraphError;
use crate::mailbox::MailboxClient;
use crate::token::{AccessToken, TokenProvider};

/// Token, listing, then attachments for the messages that have some.
#[derive(Clone)]
pub struct MailboxIngestor {
    tokens: Arc<dyn TokenProvider>,
    mailbox: Arc<dyn MailboxClient>,
    attachment_concurrency: usize,
}

impl MailboxIngestor {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        mailbox: Arc<dyn MailboxClient>,
        attachment_concurrency: usize,
    ) -> Self {
        Self { tokens, mailbox, attachment_concurrency: attachment_concurrency.max(1) }
    }

    /// Token and listing failures abort the run. Attachment failures stay on
    /// the message they belong to.
    pub async fn fetch_emails(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<FetchedEmail>, GraphError> {
        let token = self.tokens.acquire_token(credentials).await?;
        let messages =
            self.mailbox.list_messages(&token, &credentials.mailbox_address).await?;
        let fetched = fetch_all_attachments(
            self.mailbox.clone(),
            token,
            credentials.mailbox_address.clone(),
            messages,
            self.attachment_concurrency,
        )
        .await;

        info!(
            event_name = "graph.ingestion_completed",
            mailbox = %credentials.mailbox_address,
            count = fetched.len(),
            attachment_failures =
                fetched.iter().filter(|email| email.attachment_error.is_some()).count(),
            "fetched mailbox messages"
        );
        Ok(fetched)
    }
}

/// Bounded fan-out over the messages with attachments. Output order matches
/// `messages`; a failed or aborted fetch degrades to an empty list plus an
/// inline error and never cancels the other fetches.
pub async fn fetch_all_attachments(
    mailbox: Arc<dyn MailboxClient>,
    token: AccessToken,
    mailbox_address: String,
    messages: Vec<EmailMessage>,
    concurrency: usize,
) -> Vec<FetchedEmail> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut results: Vec<Option<Result<Vec<Attachment>, GraphError>>> =
        messages.iter().map(|_| None).collect();
    let mut tasks = JoinSet::new();

    for (index, message) in messages.iter().enumerate() {
        if !message.has_attachments {
            results[index] = Some(Ok(Vec::new()));
            continue;
        }

        let semaphore = semaphore.clone();
        let mailbox = mailbox.clone();
        let token = token.clone();
        let mailbox_address = mailbox_address.clone();
        let message_id = message.id.clone();
        tasks.spawn(async move {
            let outcome = match semaphore.acquire_owned().await {
                Ok(_permit) => {
                    mailbox.fetch_attachments(&token, &mailbox_address, &message_id).await
                }
                Err(_) => Err(GraphError::AttachmentFetchFailed {
                    message_id: message_id.0.clone(),
                    status: None,
                    message: "attachment fetch cancelled".to_string(),
                }),
            };
            (index, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => results[index] = Some(outcome),
            Err(error) => warn!(
                event_name = "graph.attachment_task_failed",
                error = %error,
                "attachment task did not complete"
            ),
        }
    }

    messages
        .into_iter()
        .zip(results)
        .map(|(message, outcome)| match outcome {
            Some(Ok(attachments)) => {
                FetchedEmail { message, attachments, attachment_error: None }
            }
            Some(Err(error)) => {
                warn!(
                    event_name = "graph.attachments_degraded",
                    email_id = %message.id,
                    status = error.status(),
                    error = %error,
                    "continuing without attachments"
                );
                FetchedEmail {
                    message,
                    attachments: Vec::new(),
                    attachment_error: Some(error.to_string()),
                }
            }
            None => FetchedEmail {
                message,
                attachments: Vec::new(),
                attachment_error: Some("attachment fetch did not complete".to_string()),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use mailquote_core::domain::connection::MailboxInfo;
    use mailquote_core::domain::email::{
        Attachment, EmailId, EmailMessage, MessageBody, Sender,
    };

    use super::fetch_all_attachments;
    use crate::error::GraphError;
    use crate::mailbox::MailboxClient;
    use crate::token::AccessToken;

    /// Counts attachment calls that are running at the same time.
    #[derive(Default)]
    struct CountingMailbox {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MailboxClient for CountingMailbox {
        async fn list_messages(
            &self,
            _token: &AccessToken,
            _mailbox: &str,
        ) -> Result<Vec<EmailMessage>, GraphError> {
            Ok(Vec::new())
        }

        async fn fetch_attachments(
            &self,
            _token: &AccessToken,
            _mailbox: &str,
            message_id: &EmailId,
        ) -> Result<Vec<Attachment>, GraphError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(40)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            Ok(vec![Attachment {
                id: format!("att-{}", message_id.0),
                name: "plan.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                size_bytes: 12,
                content_bytes: None,
            }])
        }

        async fn mailbox_identity(
            &self,
            _token: &AccessToken,
            _mailbox: &str,
        ) -> Result<MailboxInfo, GraphError> {
            Err(GraphError::MailboxLookupFailed { status: None, message: "unused".to_string() })
        }
    }

    fn message(id: &str, has_attachments: bool) -> EmailMessage {
        EmailMessage {
            id: EmailId(id.to_string()),
            subject: format!("Demande de devis {id}"),
            sender: Sender::default(),
            received_at: Utc::now(),
            body_preview: String::new(),
            body: MessageBody::default(),
            has_attachments,
            is_read: false,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn attachment_calls_never_exceed_the_concurrency_cap() {
        let mailbox = Arc::new(CountingMailbox::default());
        let mut messages: Vec<EmailMessage> =
            (1..=6).map(|n| message(&format!("m{n}"), true)).collect();
        messages.push(message("m7", false));
        let token = AccessToken::new("graph-token", Utc::now() + chrono::Duration::hours(1));

        let fetched = fetch_all_attachments(
            mailbox.clone(),
            token,
            "devis@example.com".to_string(),
            messages,
            2,
        )
        .await;

        assert_eq!(mailbox.calls.load(Ordering::SeqCst), 6);
        assert_eq!(mailbox.peak.load(Ordering::SeqCst), 2);
        let ids: Vec<&str> = fetched.iter().map(|email| email.message.id.0.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3", "m4", "m5", "m6", "m7"]);
        assert_eq!(fetched[0].attachments[0].id, "att-m1");
        assert!(fetched[6].attachments.is_empty());
        assert!(fetched.iter().all(|email| email.attachment_error.is_none()));
    }
}
