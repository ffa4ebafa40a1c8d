use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::config::ErpConfig;
use crate::domain::email::Sender;
use crate::domain::partner::{BusinessPartner, PartnerDirectory};
use crate::pricing::sources::{CatalogLookup, ItemMaster, PriceBook};

/// Read-only ERP view built from configuration. Lookups are case-insensitive on
/// sender domain and card name; references match exactly.
#[derive(Clone, Debug, Default)]
pub struct ErpDirectory {
    partners_by_domain: HashMap<String, BusinessPartner>,
    designations: HashMap<String, String>,
    tariffs: HashMap<(String, String), Decimal>,
    list_prices: HashMap<String, Decimal>,
}

impl ErpDirectory {
    pub fn from_config(config: &ErpConfig) -> Self {
        let partners_by_domain = config
            .partners
            .iter()
            .map(|record| {
                (
                    record.domain.trim().to_ascii_lowercase(),
                    BusinessPartner {
                        card_name: record.card_name.clone(),
                        country: record.country.clone(),
                        partner_type: record.segment.clone(),
                        known: true,
                    },
                )
            })
            .collect();
        let designations = config
            .items
            .iter()
            .map(|item| (item.reference.clone(), item.designation.clone()))
            .collect();
        let tariffs = config
            .tariffs
            .iter()
            .map(|tariff| {
                ((tariff.card_name.to_lowercase(), tariff.reference.clone()), tariff.unit_price)
            })
            .collect();
        let list_prices = config
            .catalog_prices
            .iter()
            .map(|price| (price.reference.clone(), price.list_price))
            .collect();

        Self { partners_by_domain, designations, tariffs, list_prices }
    }

    pub fn partner_count(&self) -> usize {
        self.partners_by_domain.len()
    }
}

impl PartnerDirectory for ErpDirectory {
    fn resolve(&self, sender: &Sender) -> Option<BusinessPartner> {
        let domain = sender.domain()?;
        self.partners_by_domain.get(&domain).cloned()
    }
}

impl PriceBook for ErpDirectory {
    fn client_tariff(&self, card_name: &str, reference: &str) -> Option<Decimal> {
        self.tariffs.get(&(card_name.to_lowercase(), reference.to_string())).copied()
    }
}

impl CatalogLookup for ErpDirectory {
    fn list_price(&self, reference: &str) -> Option<Decimal> {
        self.list_prices.get(reference).copied()
    }
}

impl ItemMaster for ErpDirectory {
    fn designation(&self, reference: &str) -> Option<String> {
        self.designations.get(reference).cloned()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::ErpDirectory;
    use crate::config::{CatalogPriceRecord, ErpConfig, ItemRecord, PartnerRecord, TariffRecord};
    use crate::domain::email::Sender;
    use crate::domain::partner::PartnerDirectory;
    use crate::pricing::sources::{CatalogLookup, ItemMaster, PriceBook};

    fn directory() -> ErpDirectory {
        ErpDirectory::from_config(&ErpConfig {
            partners: vec![PartnerRecord {
                domain: "Acme-Industries.fr".to_string(),
                card_name: "ACME Industries".to_string(),
                country: "France".to_string(),
                segment: "Industrie".to_string(),
            }],
            items: vec![ItemRecord {
                reference: "MOT-5KW-001".to_string(),
                designation: "Moteur industriel 5kW".to_string(),
            }],
            tariffs: vec![TariffRecord {
                card_name: "ACME Industries".to_string(),
                reference: "MOT-5KW-001".to_string(),
                unit_price: Decimal::new(1250, 0),
            }],
            catalog_prices: vec![CatalogPriceRecord {
                reference: "PMP-HYD-A01".to_string(),
                list_price: Decimal::new(890, 0),
            }],
        })
    }

    #[test]
    fn partners_resolve_by_sender_domain() {
        let directory = directory();
        let sender = Sender {
            name: "Service achats".to_string(),
            address: "achats@ACME-industries.fr".to_string(),
        };

        let partner = directory.resolve(&sender).expect("known partner");
        assert_eq!(partner.card_name, "ACME Industries");
        assert_eq!(partner.category().to_string(), "Industrie/France");
        assert!(partner.known);

        let stranger =
            Sender { name: String::new(), address: "someone@elsewhere.example".to_string() };
        assert!(directory.resolve(&stranger).is_none());
    }

    #[test]
    fn price_lookups_use_their_own_tables() {
        let directory = directory();

        assert_eq!(
            directory.client_tariff("acme industries", "MOT-5KW-001"),
            Some(Decimal::new(1250, 0))
        );
        assert_eq!(directory.client_tariff("ACME Industries", "PMP-HYD-A01"), None);
        assert_eq!(directory.list_price("PMP-HYD-A01"), Some(Decimal::new(890, 0)));
        assert_eq!(directory.designation("MOT-5KW-001").as_deref(), Some("Moteur industriel 5kW"));
        assert_eq!(directory.partner_count(), 1);
    }
}
