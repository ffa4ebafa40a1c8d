use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::{HistoricalDiscountRule, MarginRule, PricingConfig, TransportRule};
use crate::domain::partner::BusinessPartner;
use crate::domain::quote::{AdjustmentKind, ArticleLine, PriceAdjustment};

pub const ANY_COUNTRY: &str = "*";

/// Half away from zero, two decimals.
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn percent_of(value: Decimal, percent: Decimal) -> Decimal {
    round_currency(value * percent / Decimal::ONE_HUNDRED)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedMargin {
    pub percent: Decimal,
    /// `segment/country` of the matching rule; `None` when the default applied.
    pub category: Option<String>,
}

/// Declarative margin and adjustment rules keyed by client category.
#[derive(Clone, Debug, Default)]
pub struct PricingPolicy {
    pub currency: String,
    pub default_margin_pct: Decimal,
    pub margin_rules: Vec<MarginRule>,
    pub transport: Vec<TransportRule>,
    pub historical_discounts: Vec<HistoricalDiscountRule>,
}

impl From<&PricingConfig> for PricingPolicy {
    fn from(config: &PricingConfig) -> Self {
        Self {
            currency: config.currency.clone(),
            default_margin_pct: config.default_margin_pct,
            margin_rules: config.margin_rules.clone(),
            transport: config.transport.clone(),
            historical_discounts: config.historical_discounts.clone(),
        }
    }
}

impl PricingPolicy {
    /// Exact segment and country first, then the segment's `*` rule, then the
    /// default margin.
    pub fn margin_for(&self, partner: &BusinessPartner) -> AppliedMargin {
        let exact = self.margin_rules.iter().find(|rule| {
            rule.segment.eq_ignore_ascii_case(&partner.partner_type)
                && rule.country.eq_ignore_ascii_case(&partner.country)
        });
        let wildcard = || {
            self.margin_rules.iter().find(|rule| {
                rule.segment.eq_ignore_ascii_case(&partner.partner_type)
                    && rule.country == ANY_COUNTRY
            })
        };

        match exact.or_else(wildcard) {
            Some(rule) => AppliedMargin {
                percent: rule.margin_pct,
                category: Some(format!("{}/{}", rule.segment, rule.country)),
            },
            None => AppliedMargin { percent: self.default_margin_pct, category: None },
        }
    }

    pub fn adjustments(
        &self,
        partner: &BusinessPartner,
        lines: &[ArticleLine],
        subtotal: Decimal,
        margin_percent: Decimal,
    ) -> Vec<PriceAdjustment> {
        let mut adjustments = Vec::new();
        if let Some(transport) = self.transport_adjustment(partner, subtotal) {
            adjustments.push(transport);
        }
        adjustments.extend(self.discount_adjustments(partner, lines, margin_percent));
        adjustments
    }

    fn transport_adjustment(
        &self,
        partner: &BusinessPartner,
        subtotal: Decimal,
    ) -> Option<PriceAdjustment> {
        let rule = self
            .transport
            .iter()
            .find(|rule| rule.country.eq_ignore_ascii_case(&partner.country))?;

        let (percent, amount) = match (rule.flat_amount, rule.percent) {
            (Some(flat), _) => (None, round_currency(flat)),
            (None, Some(percent)) => (Some(percent), percent_of(subtotal, percent)),
            (None, None) => return None,
        };

        Some(PriceAdjustment {
            kind: AdjustmentKind::Transport,
            label: rule.label.clone(),
            basis: subtotal,
            percent,
            amount,
        })
    }

    fn discount_adjustments(
        &self,
        partner: &BusinessPartner,
        lines: &[ArticleLine],
        margin_percent: Decimal,
    ) -> Vec<PriceAdjustment> {
        let uplift = Decimal::ONE + margin_percent / Decimal::ONE_HUNDRED;

        self.historical_discounts
            .iter()
            .filter(|rule| rule.card_name.eq_ignore_ascii_case(&partner.card_name))
            .filter_map(|rule| {
                let matching: Decimal = lines
                    .iter()
                    .filter(|line| match &rule.reference_prefix {
                        Some(prefix) => line.reference.starts_with(prefix.as_str()),
                        None => true,
                    })
                    .map(ArticleLine::line_total)
                    .sum();
                if matching.is_zero() {
                    return None;
                }

                let basis = round_currency(matching * uplift);
                let label = rule.label.clone().unwrap_or_else(|| match &rule.reference_prefix {
                    Some(prefix) => format!("Remise historique {prefix}"),
                    None => "Remise historique".to_string(),
                });

                Some(PriceAdjustment {
                    kind: AdjustmentKind::HistoricalDiscount,
                    label,
                    basis,
                    percent: Some(rule.percent),
                    amount: -percent_of(basis, rule.percent),
                })
            })
            .collect()
    }
}
