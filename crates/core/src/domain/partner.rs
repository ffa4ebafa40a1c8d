use serde::{Deserialize, Serialize};

use crate::domain::email::Sender;

pub const PROSPECT_SEGMENT: &str = "Prospect";
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Client record as held by the ERP. Referenced by quote documents, never owned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessPartner {
    pub card_name: String,
    pub country: String,
    #[serde(rename = "type")]
    pub partner_type: String,
    #[serde(default)]
    pub known: bool,
}

impl BusinessPartner {
    /// Placeholder partner for a sender the ERP does not know.
    pub fn prospect(sender: &Sender) -> Self {
        let card_name = if sender.name.trim().is_empty() {
            sender.address.trim().to_string()
        } else {
            sender.name.trim().to_string()
        };

        Self {
            card_name,
            country: UNKNOWN_COUNTRY.to_string(),
            partner_type: PROSPECT_SEGMENT.to_string(),
            known: false,
        }
    }

    pub fn category(&self) -> ClientCategory {
        ClientCategory { segment: self.partner_type.clone(), country: self.country.clone() }
    }
}

/// Key of the margin rule table, rendered as `segment/country`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientCategory {
    pub segment: String,
    pub country: String,
}

impl std::fmt::Display for ClientCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.segment, self.country)
    }
}

pub trait PartnerDirectory: Send + Sync {
    fn resolve(&self, sender: &Sender) -> Option<BusinessPartner>;
}

#[cfg(test)]
mod tests {
    use super::{BusinessPartner, PROSPECT_SEGMENT};
    use crate::domain::email::Sender;

    #[test]
    fn prospect_uses_sender_name_then_address() {
        let named = BusinessPartner::prospect(&Sender {
            name: "Jean Martin".to_string(),
            address: "jm@unknown.example".to_string(),
        });
        assert_eq!(named.card_name, "Jean Martin");
        assert_eq!(named.partner_type, PROSPECT_SEGMENT);
        assert!(!named.known);

        let anonymous = BusinessPartner::prospect(&Sender {
            name: String::new(),
            address: "buyer@unknown.example".to_string(),
        });
        assert_eq!(anonymous.card_name, "buyer@unknown.example");
    }

    #[test]
    fn category_renders_segment_and_country() {
        let partner = BusinessPartner {
            card_name: "ACME Industries".to_string(),
            country: "France".to_string(),
            partner_type: "Industry".to_string(),
            known: true,
        };

        assert_eq!(partner.category().to_string(), "Industry/France");
    }
}
