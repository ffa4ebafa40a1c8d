pub mod extraction;
pub mod policy;
pub mod sources;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::email::{Attachment, EmailMessage};
use crate::domain::partner::BusinessPartner;
use crate::domain::quote::{
    ArticleLine, PriceSource, PricingBreakdown, QuoteDocument, QuoteMeta, UnresolvedLine,
};
use crate::text::body_text;

use self::extraction::{extract_candidates, ArticleCandidate};
use self::policy::{percent_of, round_currency, PricingPolicy};
use self::sources::{detect_catalog, CatalogLookup, ItemMaster, PriceBook};

pub trait PricingEngine: Send + Sync {
    fn price_quote(
        &self,
        message: &EmailMessage,
        partner: &BusinessPartner,
        attachments: &[Attachment],
    ) -> QuoteDocument;
}

pub struct DeterministicPricingEngine {
    price_book: Arc<dyn PriceBook>,
    catalog: Arc<dyn CatalogLookup>,
    items: Arc<dyn ItemMaster>,
    policy: PricingPolicy,
}

impl DeterministicPricingEngine {
    pub fn new(
        price_book: Arc<dyn PriceBook>,
        catalog: Arc<dyn CatalogLookup>,
        items: Arc<dyn ItemMaster>,
        policy: PricingPolicy,
    ) -> Self {
        Self { price_book, catalog, items, policy }
    }

    /// Uses one ERP stand-in for tariffs, catalog prices and designations.
    pub fn from_erp<E>(erp: Arc<E>, policy: PricingPolicy) -> Self
    where
        E: PriceBook + CatalogLookup + ItemMaster + 'static,
    {
        Self::new(erp.clone(), erp.clone(), erp, policy)
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    pub fn price_candidates(
        &self,
        candidates: &[ArticleCandidate],
        partner: &BusinessPartner,
        attachments: &[Attachment],
        now: DateTime<Utc>,
    ) -> QuoteDocument {
        let catalog = detect_catalog(attachments);
        let mut lines = Vec::new();
        let mut unresolved = Vec::new();

        for candidate in candidates {
            let designation = self
                .items
                .designation(&candidate.reference)
                .or_else(|| candidate.designation.clone())
                .unwrap_or_else(|| candidate.reference.clone());

            let tariff = self
                .price_book
                .client_tariff(&partner.card_name, &candidate.reference)
                .map(|price| (price, PriceSource::ErpTariff));
            let resolved = tariff.or_else(|| {
                let attached = catalog?;
                self.catalog.list_price(&candidate.reference).map(|price| {
                    (price, PriceSource::AttachedCatalog { attachment_name: attached.name.clone() })
                })
            });

            match resolved {
                Some((unit_price, price_source)) => lines.push(ArticleLine {
                    reference: candidate.reference.clone(),
                    designation,
                    quantity: candidate.quantity,
                    unit_price,
                    price_source,
                }),
                None => unresolved.push(UnresolvedLine {
                    reference: candidate.reference.clone(),
                    designation,
                    quantity: candidate.quantity,
                    reason: unresolved_reason(&partner.card_name, catalog),
                }),
            }
        }

        let requires_manual_review = lines.is_empty() || !unresolved.is_empty() || !partner.known;
        let pricing = if lines.is_empty() {
            PricingBreakdown::zero(self.policy.currency.clone())
        } else {
            self.breakdown(partner, &lines)
        };

        tracing::debug!(
            event_name = "pricing.quote_priced",
            card_name = %partner.card_name,
            lines = lines.len(),
            unresolved = unresolved.len(),
            total = %pricing.total,
            "priced quote document"
        );

        QuoteDocument {
            business_partner: partner.clone(),
            lines,
            unresolved,
            pricing,
            meta: QuoteMeta::pending(requires_manual_review, now),
        }
    }

    fn breakdown(&self, partner: &BusinessPartner, lines: &[ArticleLine]) -> PricingBreakdown {
        let subtotal = round_currency(lines.iter().map(ArticleLine::line_total).sum::<Decimal>());
        let margin = self.policy.margin_for(partner);
        let margin_amount = percent_of(subtotal, margin.percent);
        let adjustments = self.policy.adjustments(partner, lines, subtotal, margin.percent);
        let total = subtotal
            + margin_amount
            + adjustments.iter().map(|adjustment| adjustment.amount).sum::<Decimal>();

        PricingBreakdown {
            currency: self.policy.currency.clone(),
            subtotal,
            margin_percent: margin.percent,
            margin_amount,
            margin_category: margin.category,
            adjustments,
            total,
        }
    }
}

impl PricingEngine for DeterministicPricingEngine {
    fn price_quote(
        &self,
        message: &EmailMessage,
        partner: &BusinessPartner,
        attachments: &[Attachment],
    ) -> QuoteDocument {
        let mut text = body_text(&message.body);
        if text.trim().is_empty() {
            text = message.body_preview.clone();
        }
        let candidates = extract_candidates(&text);
        self.price_candidates(&candidates, partner, attachments, Utc::now())
    }
}

fn unresolved_reason(card_name: &str, catalog: Option<&Attachment>) -> String {
    match catalog {
        Some(attachment) => format!(
            "no ERP tariff for {card_name} and no list price in attached catalog {}",
            attachment.name
        ),
        None => format!("no ERP tariff for {card_name} and no catalog attached"),
    }
}
