use rust_decimal::Decimal;

use crate::domain::email::Attachment;

const CATALOG_EXTENSIONS: &[&str] = &["pdf", "xls", "xlsx", "xlsm", "ods", "csv"];
const CATALOG_CONTENT_TYPES: &[&str] = &["pdf", "spreadsheet", "excel", "csv"];

/// Client-specific tariffs held by the ERP.
pub trait PriceBook: Send + Sync {
    fn client_tariff(&self, card_name: &str, reference: &str) -> Option<Decimal>;
}

/// List prices of the catalog a client attached. Attachment content is not
/// parsed; prices come from the catalog registered under the same references.
pub trait CatalogLookup: Send + Sync {
    fn list_price(&self, reference: &str) -> Option<Decimal>;
}

pub trait ItemMaster: Send + Sync {
    fn designation(&self, reference: &str) -> Option<String>;
}

pub fn is_catalog_attachment(attachment: &Attachment) -> bool {
    let content_type = attachment.content_type.to_ascii_lowercase();
    if CATALOG_CONTENT_TYPES.iter().any(|marker| content_type.contains(marker)) {
        return true;
    }
    attachment.extension().is_some_and(|ext| CATALOG_EXTENSIONS.contains(&ext.as_str()))
}

/// First attachment usable as a price catalog, in attachment order.
pub fn detect_catalog(attachments: &[Attachment]) -> Option<&Attachment> {
    attachments.iter().find(|attachment| is_catalog_attachment(attachment))
}
