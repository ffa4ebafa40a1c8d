pub mod audit;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod erp;
pub mod errors;
pub mod explanation;
pub mod pipeline;
pub mod pricing;
pub mod text;
pub mod validation;

pub use classifier::{KeywordQuoteClassifier, QuoteClassifier};
pub use config::{AppConfig, CredentialError, Credentials, LoadOptions};
pub use domain::connection::{ConnectionDetails, ConnectionStep, ConnectionTestResult, MailboxInfo};
pub use domain::email::{Attachment, EmailId, EmailMessage, FetchedEmail, Sender};
pub use domain::partner::{BusinessPartner, PartnerDirectory};
pub use domain::quote::{
    ArticleLine, PriceAdjustment, PriceSource, PricingBreakdown, ProcessedEmail, QuoteDocument,
};
pub use erp::ErpDirectory;
pub use errors::{ApplicationError, DomainError};
pub use explanation::{ExplanationGenerator, PriceExplanation};
pub use pipeline::QuotePipeline;
pub use pricing::{DeterministicPricingEngine, PricingEngine};
pub use validation::{ValidationEvent, ValidationMachine, ValidationStatus};
