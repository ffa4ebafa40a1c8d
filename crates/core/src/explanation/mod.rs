//! "Why this price" narrative.
//!
//! Built only from the data stored on a quote document: the price source of
//! every line, the margin rule that applied and each itemized adjustment.

use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::quote::{AdjustmentKind, PriceSource, QuoteDocument};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationTopic {
    PriceSources,
    Margin,
    Adjustment,
    Unresolved,
    Total,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationItem {
    pub topic: ExplanationTopic,
    pub title: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceExplanation {
    pub title: String,
    pub currency: String,
    pub total: Decimal,
    pub items: Vec<ExplanationItem>,
}

/// Templates use `{{name}}` placeholders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationTemplates {
    pub title: String,
    pub erp_sources: String,
    pub catalog_sources: String,
    pub mixed_sources: String,
    pub margin_rule: String,
    pub margin_default: String,
    pub transport: String,
    pub discount: String,
    pub unresolved: String,
    pub total: String,
}

impl Default for ExplanationTemplates {
    fn default() -> Self {
        Self {
            title: "Pourquoi ce prix ?".to_string(),
            erp_sources: "Prix récupérés depuis l'ERP (tarif client {{card_name}}).".to_string(),
            catalog_sources: "Prix issus du catalogue joint {{catalogs}}.".to_string(),
            mixed_sources: "Prix récupérés depuis l'ERP (tarif client {{card_name}}) et catalogue joint {{catalogs}} pour les références non tarifées.".to_string(),
            margin_rule: "Marge de {{margin_pct}}% appliquée (catégorie client : {{category}}), soit {{margin_amount}} {{currency}}.".to_string(),
            margin_default: "Marge par défaut de {{margin_pct}}% appliquée, aucune règle pour la catégorie {{category}}, soit {{margin_amount}} {{currency}}.".to_string(),
            transport: "{{label}} : {{amount}} {{currency}}.".to_string(),
            discount: "{{label}} de {{percent}}% sur {{basis}} {{currency}} : {{amount}} {{currency}}.".to_string(),
            unresolved: "{{count}} référence(s) sans prix ({{references}}) : validation manuelle requise.".to_string(),
            total: "Total : {{subtotal}} + marge {{margin_amount}} + ajustements {{adjustments}} = {{total}} {{currency}}.".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExplanationGenerator {
    templates: ExplanationTemplates,
}

impl ExplanationGenerator {
    pub fn new(templates: ExplanationTemplates) -> Self {
        Self { templates }
    }

    pub fn generate(&self, document: &QuoteDocument) -> PriceExplanation {
        let pricing = &document.pricing;
        let partner = &document.business_partner;

        let mut variables = HashMap::from([
            ("card_name".to_string(), partner.card_name.clone()),
            ("category".to_string(), partner.category().to_string()),
            ("currency".to_string(), pricing.currency.clone()),
            ("subtotal".to_string(), pricing.subtotal.to_string()),
            ("margin_pct".to_string(), pricing.margin_percent.normalize().to_string()),
            ("margin_amount".to_string(), pricing.margin_amount.to_string()),
            ("adjustments".to_string(), pricing.adjustments_total().to_string()),
            ("total".to_string(), pricing.total.to_string()),
        ]);
        if let Some(category) = &pricing.margin_category {
            variables.insert("category".to_string(), category.clone());
        }

        let mut items = Vec::new();

        if let Some(template) = self.sources_template(document, &mut variables) {
            items.push(ExplanationItem {
                topic: ExplanationTopic::PriceSources,
                title: "Source des prix".to_string(),
                detail: substitute_variables(template, &variables),
                amount: Some(pricing.subtotal),
            });

            let margin_template = if pricing.margin_category.is_some() {
                &self.templates.margin_rule
            } else {
                &self.templates.margin_default
            };
            items.push(ExplanationItem {
                topic: ExplanationTopic::Margin,
                title: "Marge appliquée".to_string(),
                detail: substitute_variables(margin_template, &variables),
                amount: Some(pricing.margin_amount),
            });
        }

        for adjustment in &pricing.adjustments {
            let mut local = variables.clone();
            local.insert("label".to_string(), adjustment.label.clone());
            local.insert("amount".to_string(), adjustment.amount.to_string());
            local.insert("basis".to_string(), adjustment.basis.to_string());
            if let Some(percent) = adjustment.percent {
                local.insert("percent".to_string(), percent.normalize().to_string());
            }
            let template = match adjustment.kind {
                AdjustmentKind::Transport => &self.templates.transport,
                AdjustmentKind::HistoricalDiscount => &self.templates.discount,
            };
            items.push(ExplanationItem {
                topic: ExplanationTopic::Adjustment,
                title: adjustment.label.clone(),
                detail: substitute_variables(template, &local),
                amount: Some(adjustment.amount),
            });
        }

        if !document.unresolved.is_empty() {
            let references = document
                .unresolved
                .iter()
                .map(|line| line.reference.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let mut local = variables.clone();
            local.insert("count".to_string(), document.unresolved.len().to_string());
            local.insert("references".to_string(), references);
            items.push(ExplanationItem {
                topic: ExplanationTopic::Unresolved,
                title: "Prix manquants".to_string(),
                detail: substitute_variables(&self.templates.unresolved, &local),
                amount: None,
            });
        }

        items.push(ExplanationItem {
            topic: ExplanationTopic::Total,
            title: "Total".to_string(),
            detail: substitute_variables(&self.templates.total, &variables),
            amount: Some(pricing.total),
        });

        PriceExplanation {
            title: self.templates.title.clone(),
            currency: pricing.currency.clone(),
            total: pricing.total,
            items,
        }
    }

    fn sources_template(
        &self,
        document: &QuoteDocument,
        variables: &mut HashMap<String, String>,
    ) -> Option<&str> {
        let uses_erp =
            document.lines.iter().any(|line| line.price_source == PriceSource::ErpTariff);
        let catalogs: BTreeSet<&str> = document
            .lines
            .iter()
            .filter_map(|line| match &line.price_source {
                PriceSource::AttachedCatalog { attachment_name } => Some(attachment_name.as_str()),
                PriceSource::ErpTariff => None,
            })
            .collect();
        variables.insert(
            "catalogs".to_string(),
            catalogs.iter().copied().collect::<Vec<_>>().join(", "),
        );

        match (uses_erp, catalogs.is_empty()) {
            (true, true) => Some(&self.templates.erp_sources),
            (true, false) => Some(&self.templates.mixed_sources),
            (false, false) => Some(&self.templates.catalog_sources),
            (false, true) => None,
        }
    }
}

fn substitute_variables(template: &str, variables: &HashMap<String, String>) -> String {
    let mut output = template.to_string();
    for (key, value) in variables {
        output = output.replace(&format!("{{{{{key}}}}}"), value);
    }
    output
}
