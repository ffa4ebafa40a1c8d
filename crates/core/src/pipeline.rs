use std::sync::Arc;

use crate::classifier::{KeywordQuoteClassifier, QuoteClassifier};
use crate::config::AppConfig;
use crate::domain::email::FetchedEmail;
use crate::domain::partner::{BusinessPartner, PartnerDirectory};
use crate::domain::quote::ProcessedEmail;
use crate::erp::ErpDirectory;
use crate::pricing::policy::PricingPolicy;
use crate::pricing::{DeterministicPricingEngine, PricingEngine};

/// Classify, then price the quotes. Each call is independent of every other
/// message.
#[derive(Clone)]
pub struct QuotePipeline {
    classifier: Arc<dyn QuoteClassifier>,
    partners: Arc<dyn PartnerDirectory>,
    pricing: Arc<dyn PricingEngine>,
}

impl QuotePipeline {
    pub fn new(
        classifier: Arc<dyn QuoteClassifier>,
        partners: Arc<dyn PartnerDirectory>,
        pricing: Arc<dyn PricingEngine>,
    ) -> Self {
        Self { classifier, partners, pricing }
    }

    /// Keyword classifier plus deterministic pricing over the configured ERP
    /// data. Partners and prices come from the same directory.
    pub fn from_config(config: &AppConfig) -> Self {
        let erp = Arc::new(ErpDirectory::from_config(&config.erp));
        let pricing =
            DeterministicPricingEngine::from_erp(erp.clone(), PricingPolicy::from(&config.pricing));
        Self::new(Arc::new(KeywordQuoteClassifier::default()), erp, Arc::new(pricing))
    }

    pub fn process_email(&self, fetched: &FetchedEmail) -> ProcessedEmail {
        let message = &fetched.message;
        let attachments: Vec<_> =
            fetched.attachments.iter().map(|attachment| attachment.without_content()).collect();
        let is_quote = self.classifier.classify(message);

        let pre_sap_document = is_quote.then(|| {
            let partner = self
                .partners
                .resolve(&message.sender)
                .unwrap_or_else(|| BusinessPartner::prospect(&message.sender));
            self.pricing.price_quote(message, &partner, &fetched.attachments)
        });

        tracing::debug!(
            event_name = "pipeline.email_processed",
            email_id = %message.id,
            is_quote,
            priced_lines = pre_sap_document.as_ref().map(|document| document.lines.len()).unwrap_or(0),
            "processed email"
        );

        ProcessedEmail { email: message.clone(), attachments, is_quote, pre_sap_document }
    }

    pub fn process_batch(&self, fetched: &[FetchedEmail]) -> Vec<ProcessedEmail> {
        fetched.iter().map(|email| self.process_email(email)).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::QuotePipeline;
    use crate::classifier::KeywordQuoteClassifier;
    use crate::config::{AppConfig, ErpConfig, PartnerRecord, PricingConfig, TariffRecord};
    use crate::domain::email::{Attachment, EmailId, EmailMessage, FetchedEmail, MessageBody, Sender};
    use crate::erp::ErpDirectory;
    use crate::pricing::policy::PricingPolicy;
    use crate::pricing::DeterministicPricingEngine;
    use crate::validation::states::ValidationStatus;

    fn pipeline() -> QuotePipeline {
        let erp = Arc::new(ErpDirectory::from_config(&ErpConfig {
            partners: vec![PartnerRecord {
                domain: "acme-industries.fr".to_string(),
                card_name: "ACME Industries".to_string(),
                country: "France".to_string(),
                segment: "Industrie".to_string(),
            }],
            items: Vec::new(),
            tariffs: vec![TariffRecord {
                card_name: "ACME Industries".to_string(),
                reference: "MOT-5KW-001".to_string(),
                unit_price: Decimal::new(1250, 0),
            }],
            catalog_prices: Vec::new(),
        }));
        let pricing_config = PricingConfig {
            currency: "EUR".to_string(),
            default_margin_pct: Decimal::new(18, 0),
            margin_rules: Vec::new(),
            transport: Vec::new(),
            historical_discounts: Vec::new(),
        };
        let engine =
            DeterministicPricingEngine::from_erp(erp.clone(), PricingPolicy::from(&pricing_config));

        QuotePipeline::new(Arc::new(KeywordQuoteClassifier::default()), erp, Arc::new(engine))
    }

    fn fetched(subject: &str, address: &str, body: &str) -> FetchedEmail {
        FetchedEmail {
            message: EmailMessage {
                id: EmailId(format!("id-{subject}")),
                subject: subject.to_string(),
                sender: Sender { name: String::new(), address: address.to_string() },
                received_at: Utc::now(),
                body_preview: String::new(),
                body: MessageBody { content_type: "text".to_string(), content: body.to_string() },
                has_attachments: true,
                is_read: false,
            },
            attachments: vec![Attachment {
                id: "att-1".to_string(),
                name: "plan.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                size_bytes: 12,
                content_bytes: Some("JVBERi0=".to_string()),
            }],
            attachment_error: None,
        }
    }

    #[test]
    fn quotes_get_a_pending_priced_document() {
        let processed = pipeline().process_email(&fetched(
            "Demande de devis",
            "achats@acme-industries.fr",
            "MOT-5KW-001 x10",
        ));

        assert!(processed.is_quote);
        let document = processed.pre_sap_document.as_ref().expect("quote document");
        assert_eq!(document.business_partner.card_name, "ACME Industries");
        assert_eq!(document.pricing.total, Decimal::new(1_475_000, 2));
        assert_eq!(processed.validation_status(), Some(ValidationStatus::Pending));
        assert!(processed.attachments[0].content_bytes.is_none());
    }

    #[test]
    fn unknown_senders_are_priced_as_prospects() {
        let processed = pipeline().process_email(&fetched(
            "Request for quote",
            "buyer@unknown.example",
            "MOT-5KW-001 x10",
        ));

        let document = processed.pre_sap_document.expect("quote document");
        assert!(!document.business_partner.known);
        assert!(document.lines.is_empty());
        assert!(document.meta.requires_manual_review);
    }

    #[test]
    fn configured_pipeline_prices_from_the_configured_tariffs() {
        let mut config = AppConfig::default();
        config.erp.partners = vec![PartnerRecord {
            domain: "acme-industries.fr".to_string(),
            card_name: "ACME Industries".to_string(),
            country: "France".to_string(),
            segment: "Industrie".to_string(),
        }];
        config.erp.tariffs = vec![TariffRecord {
            card_name: "ACME Industries".to_string(),
            reference: "MOT-5KW-001".to_string(),
            unit_price: Decimal::new(1250, 0),
        }];

        let processed = QuotePipeline::from_config(&config).process_email(&fetched(
            "Demande de devis",
            "achats@acme-industries.fr",
            "MOT-5KW-001 x2",
        ));

        let document = processed.pre_sap_document.expect("quote document");
        assert_eq!(document.business_partner.card_name, "ACME Industries");
        assert_eq!(document.lines.len(), 1);
        assert_eq!(document.lines[0].quantity, 2);
        assert_eq!(document.pricing.total, Decimal::new(295_000, 2));
    }

    #[test]
    fn non_quotes_carry_no_document() {
        let batch = pipeline().process_batch(&[
            fetched("Newsletter", "news@acme-industries.fr", "Nos nouveautés"),
            fetched("Devis", "achats@acme-industries.fr", ""),
        ]);

        assert_eq!(batch.len(), 2);
        assert!(!batch[0].is_quote);
        assert!(batch[0].pre_sap_document.is_none());
        assert!(batch[1].is_quote);
    }
}
