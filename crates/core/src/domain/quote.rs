use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::email::{Attachment, EmailId, EmailMessage};
use crate::domain::partner::BusinessPartner;
use crate::validation::states::ValidationStatus;

/// Where a line's unit price was taken from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceSource {
    /// Client-specific tariff held by the ERP.
    ErpTariff,
    /// List price of a catalog attached to the request.
    AttachedCatalog { attachment_name: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleLine {
    pub reference: String,
    pub designation: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub price_source: PriceSource,
}

impl ArticleLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A detected line for which no price source produced a price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedLine {
    pub reference: String,
    pub designation: String,
    pub quantity: u32,
    pub reason: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    Transport,
    HistoricalDiscount,
}

/// One itemized change applied after the margin. `amount` is signed:
/// discounts are negative.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAdjustment {
    pub kind: AdjustmentKind,
    pub label: String,
    pub basis: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<Decimal>,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingBreakdown {
    pub currency: String,
    pub subtotal: Decimal,
    pub margin_percent: Decimal,
    pub margin_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_category: Option<String>,
    pub adjustments: Vec<PriceAdjustment>,
    pub total: Decimal,
}

impl PricingBreakdown {
    pub fn zero(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            subtotal: Decimal::ZERO,
            margin_percent: Decimal::ZERO,
            margin_amount: Decimal::ZERO,
            margin_category: None,
            adjustments: Vec::new(),
            total: Decimal::ZERO,
        }
    }

    pub fn adjustments_total(&self) -> Decimal {
        self.adjustments.iter().map(|adjustment| adjustment.amount).sum()
    }

    /// `total - subtotal` must equal the margin amount plus every adjustment.
    pub fn is_balanced(&self) -> bool {
        self.total - self.subtotal == self.margin_amount + self.adjustments_total()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteMeta {
    pub(crate) validation_status: ValidationStatus,
    pub requires_manual_review: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) decided_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) decision_note: Option<String>,
}

impl QuoteMeta {
    pub fn pending(requires_manual_review: bool, created_at: DateTime<Utc>) -> Self {
        Self {
            validation_status: ValidationStatus::Pending,
            requires_manual_review,
            created_at,
            decided_at: None,
            decision_note: None,
        }
    }

    pub fn validation_status(&self) -> ValidationStatus {
        self.validation_status
    }

    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        self.decided_at
    }

    pub fn decision_note(&self) -> Option<&str> {
        self.decision_note.as_deref()
    }
}

/// Pre-priced document awaiting human validation before ERP entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteDocument {
    pub business_partner: BusinessPartner,
    pub lines: Vec<ArticleLine>,
    #[serde(default)]
    pub unresolved: Vec<UnresolvedLine>,
    pub pricing: PricingBreakdown,
    pub meta: QuoteMeta,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedEmail {
    pub email: EmailMessage,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub is_quote: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_sap_document: Option<QuoteDocument>,
}

impl ProcessedEmail {
    pub fn id(&self) -> &EmailId {
        &self.email.id
    }

    pub fn validation_status(&self) -> Option<ValidationStatus> {
        self.pre_sap_document.as_ref().map(|document| document.meta.validation_status())
    }
}
