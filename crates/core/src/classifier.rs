use crate::domain::email::EmailMessage;
use crate::text::{body_text, word_stream};

/// Purchase-request vocabulary, French and English. Matched on whole words
/// after accent folding.
pub const DEFAULT_QUOTE_TERMS: &[&str] = &[
    "devis",
    "demande de prix",
    "demande de cotation",
    "cotation",
    "offre de prix",
    "proposition de prix",
    "chiffrage",
    "tarif",
    "tarifs",
    "quote",
    "quotation",
    "request for quote",
    "request for quotation",
    "rfq",
    "price request",
    "pricing request",
    "price quote",
];

pub trait QuoteClassifier: Send + Sync {
    /// Total: an unrecognizable message is simply not a quote.
    fn classify(&self, message: &EmailMessage) -> bool;
}

#[derive(Clone, Debug)]
pub struct KeywordQuoteClassifier {
    terms: Vec<String>,
}

impl Default for KeywordQuoteClassifier {
    fn default() -> Self {
        Self::with_terms(DEFAULT_QUOTE_TERMS.iter().copied())
    }
}

impl KeywordQuoteClassifier {
    pub fn with_terms<I, T>(terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|term| word_stream(term.as_ref()))
            .filter(|term| !term.trim().is_empty())
            .collect();
        Self { terms }
    }

    /// First vocabulary term found in `text`, in folded form.
    pub fn matched_term(&self, text: &str) -> Option<&str> {
        let haystack = word_stream(text);
        self.terms.iter().find(|term| haystack.contains(term.as_str())).map(|term| term.trim())
    }
}

impl QuoteClassifier for KeywordQuoteClassifier {
    fn classify(&self, message: &EmailMessage) -> bool {
        if self.matched_term(&message.subject).is_some() {
            return true;
        }
        if self.matched_term(&message.body_preview).is_some() {
            return true;
        }
        self.matched_term(&body_text(&message.body)).is_some()
    }
}
