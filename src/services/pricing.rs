//! Price breakdown for a product, a variation selection and a quantity
//!
//! The breakdown is a per-unit figure: quantity only drives the bulk tier
//! discount. Steps run in a fixed order because display and discount
//! stacking depend on it:
//!
//! 1. base price (discount price when set, else list price)
//! 2. variation modifiers, summed additively
//! 3. per-unit subtotal
//! 4. quantity tier discount
//! 5. promotional discounts, all active ones summed
//! 6. discounted subtotal
//! 7. tax lines, each on the discounted subtotal, never compounded
//! 8. shipping estimates and the chosen method
//! 9. final price, floored at zero

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::{Product, Selection, VariationType};
use crate::domain::value_objects::{round_money, CurrencyCode, DataSource, Quantity};
use crate::{Result, StorefrontError};

pub const STANDARD_SHIPPING: &str = "Standard Shipping";

// =============================================================================
// Configuration
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRule { pub name: String, pub rate: Decimal }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingMethod {
    pub name: String,
    pub cost: Decimal,
    pub carrier: String,
    pub estimated_days_min: u32,
    pub estimated_days_max: u32,
}

/// Flat-rate standard shipping (free at or above the threshold) plus any
/// number of fixed-price alternatives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    pub free_shipping_threshold: Decimal,
    pub flat_fee: Decimal,
    pub standard_carrier: String,
    pub standard_days_min: u32,
    pub standard_days_max: u32,
    pub extra_methods: Vec<ShippingMethod>,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Decimal::new(50, 0),
            flat_fee: Decimal::new(799, 2),
            standard_carrier: "USPS".to_string(),
            standard_days_min: 5,
            standard_days_max: 7,
            extra_methods: vec![ShippingMethod {
                name: "Express Shipping".to_string(),
                cost: Decimal::new(1999, 2),
                carrier: "UPS".to_string(),
                estimated_days_min: 1,
                estimated_days_max: 2,
            }],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub currency: CurrencyCode,
    pub quantity_tier_size: u32,
    pub quantity_tier_discount: Decimal,
    pub tax_rules: Vec<TaxRule>,
    pub shipping: ShippingPolicy,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::usd(),
            quantity_tier_size: 5,
            quantity_tier_discount: Decimal::new(2, 0),
            tax_rules: vec![TaxRule { name: "Sales Tax".to_string(), rate: Decimal::new(85, 3) }],
            shipping: ShippingPolicy::default(),
        }
    }
}

// =============================================================================
// Inputs and Breakdown
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion { pub promotion_id: String, pub name: String, pub discount: Decimal }

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PricingContext {
    pub promotions: Vec<Promotion>,
    pub promotions_source: DataSource,
    /// Shipping method that counts toward the total; standard when unset.
    pub shipping_method: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VariationModifierLine { pub variation_type: VariationType, pub value: String, pub modifier: Decimal, pub reason: String }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuantityDiscountLine { pub quantity_threshold: u32, pub tiers: u32, pub discount: Decimal, pub reason: String }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ShippingEstimate {
    pub method: String,
    pub cost: Decimal,
    pub carrier: String,
    pub estimated_days_min: u32,
    pub estimated_days_max: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TaxLine { pub name: String, pub rate: Decimal, pub amount: Decimal }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub base_price: Decimal,
    pub variation_modifiers: Vec<VariationModifierLine>,
    pub quantity_discounts: Vec<QuantityDiscountLine>,
    pub promotional_discounts: Vec<Promotion>,
    pub shipping_estimates: Vec<ShippingEstimate>,
    pub shipping_method: String,
    pub tax_lines: Vec<TaxLine>,
    pub subtotal: Decimal,
    pub total_discount: Decimal,
    pub discounted_subtotal: Decimal,
    pub total_tax: Decimal,
    pub total_shipping: Decimal,
    pub final_price: Decimal,
    pub currency: CurrencyCode,
    /// Set when the computed final price was negative and floored at zero.
    pub clamped: bool,
    pub promotions_source: DataSource,
}

impl PriceBreakdown {
    /// Re-expresses every amount in another currency at `rate`.
    pub fn convert(&self, rate: Decimal, to: CurrencyCode) -> PriceBreakdown {
        let at = |v: Decimal| round_money(v * rate);
        PriceBreakdown {
            base_price: at(self.base_price),
            variation_modifiers: self.variation_modifiers.iter().map(|l| VariationModifierLine { modifier: at(l.modifier), ..l.clone() }).collect(),
            quantity_discounts: self.quantity_discounts.iter().map(|l| QuantityDiscountLine { discount: at(l.discount), ..l.clone() }).collect(),
            promotional_discounts: self.promotional_discounts.iter().map(|p| Promotion { discount: at(p.discount), ..p.clone() }).collect(),
            shipping_estimates: self.shipping_estimates.iter().map(|s| ShippingEstimate { cost: at(s.cost), ..s.clone() }).collect(),
            shipping_method: self.shipping_method.clone(),
            tax_lines: self.tax_lines.iter().map(|t| TaxLine { amount: at(t.amount), ..t.clone() }).collect(),
            subtotal: at(self.subtotal),
            total_discount: at(self.total_discount),
            discounted_subtotal: at(self.discounted_subtotal),
            total_tax: at(self.total_tax),
            total_shipping: at(self.total_shipping),
            final_price: at(self.final_price),
            currency: to,
            clamped: self.clamped,
            promotions_source: self.promotions_source,
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

#[derive(Clone, Debug, Default)]
pub struct PricingEngine { config: PricingConfig }

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self { Self { config } }

    pub fn price(&self, product: &Product, selection: &Selection, quantity: u32, context: &PricingContext) -> Result<PriceBreakdown> {
        let quantity = Quantity::new(quantity).map_err(|e| StorefrontError::validation(e.to_string()))?;
        // tier discounts and shipping fees are store-currency amounts
        if product.currency() != &self.config.currency {
            return Err(StorefrontError::validation(format!(
                "Product {} is priced in {}, store prices in {}", product.id(), product.currency(), self.config.currency
            )));
        }

        let base_price = product.base_price();

        let selected = selection.selected_options(product.variations()).map_err(|e| StorefrontError::validation(e.to_string()))?;
        let variation_modifiers: Vec<VariationModifierLine> = selected.iter()
            .filter(|(_, o)| !o.price_modifier.is_zero())
            .map(|(g, o)| VariationModifierLine {
                variation_type: g.variation_type,
                value: o.value.clone(),
                modifier: o.price_modifier,
                reason: format!("{}: {}", g.name, o.label),
            })
            .collect();

        let subtotal = base_price + variation_modifiers.iter().map(|l| l.modifier).sum::<Decimal>();

        let quantity_discounts = self.quantity_discount(quantity).into_iter().collect::<Vec<_>>();
        let promotional_discounts = context.promotions.clone();
        let total_discount = quantity_discounts.iter().map(|d| d.discount).sum::<Decimal>()
            + promotional_discounts.iter().map(|p| p.discount).sum::<Decimal>();

        let discounted_subtotal = subtotal - total_discount;

        // a negative discounted subtotal is already a configuration error; it is not taxed
        let taxable = discounted_subtotal.max(Decimal::ZERO);
        let tax_lines: Vec<TaxLine> = self.config.tax_rules.iter()
            .map(|rule| TaxLine { name: rule.name.clone(), rate: rule.rate, amount: round_money(rule.rate * taxable) })
            .collect();
        let total_tax = tax_lines.iter().map(|t| t.amount).sum::<Decimal>();

        let shipping_estimates = self.shipping_estimates(subtotal);
        let chosen = match &context.shipping_method {
            None => &shipping_estimates[0],
            Some(name) => shipping_estimates.iter().find(|s| s.method.eq_ignore_ascii_case(name))
                .ok_or_else(|| StorefrontError::validation(format!("Unknown shipping method '{}'", name)))?,
        };
        let total_shipping = chosen.cost;
        let shipping_method = chosen.method.clone();

        let mut final_price = round_money(discounted_subtotal + total_tax + total_shipping);
        let clamped = final_price < Decimal::ZERO;
        if clamped {
            tracing::warn!(product_id = product.id(), %final_price, %total_discount, "negative final price floored at zero");
            final_price = Decimal::ZERO;
        }

        tracing::debug!(product_id = product.id(), quantity = quantity.value(), %subtotal, %final_price, "priced selection");

        Ok(PriceBreakdown {
            base_price,
            variation_modifiers,
            quantity_discounts,
            promotional_discounts,
            shipping_estimates,
            shipping_method,
            tax_lines,
            subtotal,
            total_discount,
            discounted_subtotal,
            total_tax,
            total_shipping,
            final_price,
            currency: product.currency().clone(),
            clamped,
            promotions_source: context.promotions_source,
        })
    }

    fn quantity_discount(&self, quantity: Quantity) -> Option<QuantityDiscountLine> {
        let tiers = quantity.complete_tiers(self.config.quantity_tier_size);
        if tiers == 0 || self.config.quantity_tier_discount.is_zero() { return None; }
        let threshold = tiers * self.config.quantity_tier_size;
        Some(QuantityDiscountLine {
            quantity_threshold: threshold,
            tiers,
            discount: self.config.quantity_tier_discount * Decimal::from(tiers),
            reason: format!("Bulk discount ({}+ units)", threshold),
        })
    }

    /// Standard shipping first, then the configured alternatives.
    fn shipping_estimates(&self, subtotal: Decimal) -> Vec<ShippingEstimate> {
        let policy = &self.config.shipping;
        let standard_cost = if subtotal >= policy.free_shipping_threshold { Decimal::ZERO } else { policy.flat_fee };
        let mut estimates = vec![ShippingEstimate {
            method: STANDARD_SHIPPING.to_string(),
            cost: standard_cost,
            carrier: policy.standard_carrier.clone(),
            estimated_days_min: policy.standard_days_min,
            estimated_days_max: policy.standard_days_max,
        }];
        estimates.extend(policy.extra_methods.iter().map(|m| ShippingEstimate {
            method: m.name.clone(),
            cost: m.cost,
            carrier: m.carrier.clone(),
            estimated_days_min: m.estimated_days_min,
            estimated_days_max: m.estimated_days_max,
        }));
        estimates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{RawVariationRow, SelectionEntry};
    use crate::services::variation_catalog::{group_rows, normalize};

    fn scrub_top() -> Product {
        let groups = normalize("scrub1", group_rows([
            RawVariationRow { variation_type: Some(VariationType::Size), variation_value: "M".into(), stock_quantity: Some(5), ..Default::default() },
            RawVariationRow { variation_type: Some(VariationType::Size), variation_value: "2X".into(), stock_quantity: Some(5), price_modifier: Some(Decimal::new(300, 2)), ..Default::default() },
        ]));
        Product::new("scrub1", "Scrub Top", Decimal::new(4599, 2)).with_variations(groups)
    }

    fn size(product: &Product, value: &str) -> Selection {
        Selection::for_groups(product.variations(), [SelectionEntry { variation_type: VariationType::Size, option_id: value.into() }]).unwrap()
    }

    #[test]
    fn test_single_unit_scenario() {
        let p = scrub_top();
        let b = PricingEngine::default().price(&p, &size(&p, "2X"), 1, &PricingContext::default()).unwrap();
        assert_eq!(b.base_price, Decimal::new(4599, 2));
        assert_eq!(b.variation_modifiers.len(), 1);
        assert_eq!(b.variation_modifiers[0].reason, "Size: 2X");
        assert_eq!(b.subtotal, Decimal::new(4899, 2));
        assert!(b.quantity_discounts.is_empty());
        assert_eq!(b.total_tax, Decimal::new(416, 2));
        assert_eq!(b.total_shipping, Decimal::new(799, 2));
        assert_eq!(b.shipping_method, STANDARD_SHIPPING);
        assert_eq!(b.final_price, Decimal::new(6114, 2));
        assert!(!b.clamped);
    }

    #[test]
    fn test_ten_units_take_two_tiers() {
        let p = scrub_top();
        let b = PricingEngine::default().price(&p, &size(&p, "2X"), 10, &PricingContext::default()).unwrap();
        assert_eq!(b.quantity_discounts.len(), 1);
        assert_eq!(b.quantity_discounts[0].quantity_threshold, 10);
        assert_eq!(b.quantity_discounts[0].discount, Decimal::new(4, 0));
        assert_eq!(b.total_discount, Decimal::new(4, 0));
        assert_eq!(b.subtotal - b.discounted_subtotal, Decimal::new(4, 0));
        assert_eq!(b.discounted_subtotal, Decimal::new(4499, 2));
    }

    #[test]
    fn test_quantity_discount_is_step_function() {
        let p = scrub_top();
        let engine = PricingEngine::default();
        let discounts: Vec<Decimal> = [4, 5, 9, 10, 14].iter()
            .map(|q| engine.price(&p, &size(&p, "M"), *q, &PricingContext::default()).unwrap().total_discount)
            .collect();
        assert_eq!(discounts, [0, 2, 2, 4, 4].map(Decimal::from).to_vec());
    }

    #[test]
    fn test_price_is_deterministic() {
        let p = scrub_top();
        let ctx = PricingContext { promotions: vec![Promotion { promotion_id: "spring".into(), name: "Spring".into(), discount: Decimal::new(5, 0) }], ..Default::default() };
        let engine = PricingEngine::default();
        let a = engine.price(&p, &size(&p, "2X"), 7, &ctx).unwrap();
        let b = engine.price(&p, &size(&p, "2X"), 7, &ctx).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_promotions_stack_and_taxes_do_not_compound() {
        let p = scrub_top();
        let config = PricingConfig {
            tax_rules: vec![
                TaxRule { name: "State".into(), rate: Decimal::new(5, 2) },
                TaxRule { name: "City".into(), rate: Decimal::new(2, 2) },
            ],
            ..Default::default()
        };
        let ctx = PricingContext {
            promotions: vec![
                Promotion { promotion_id: "a".into(), name: "A".into(), discount: Decimal::new(5, 0) },
                Promotion { promotion_id: "b".into(), name: "B".into(), discount: Decimal::new(95, 2) },
            ],
            ..Default::default()
        };
        let b = PricingEngine::new(config).price(&p, &size(&p, "M"), 1, &ctx).unwrap();
        assert_eq!(b.total_discount, Decimal::new(595, 2));
        assert_eq!(b.discounted_subtotal, Decimal::new(4004, 2));
        assert_eq!(b.tax_lines[0].amount, Decimal::new(2, 0));
        assert_eq!(b.tax_lines[1].amount, Decimal::new(80, 2));
        assert_eq!(b.total_tax, Decimal::new(280, 2));
    }

    #[test]
    fn test_free_shipping_and_method_choice() {
        let p = Product::new("bag", "Bag", Decimal::new(60, 0));
        let engine = PricingEngine::default();
        let standard = engine.price(&p, &Selection::default(), 1, &PricingContext::default()).unwrap();
        assert_eq!(standard.total_shipping, Decimal::ZERO);
        assert_eq!(standard.shipping_estimates.len(), 2);

        let ctx = PricingContext { shipping_method: Some("express shipping".into()), ..Default::default() };
        let express = engine.price(&p, &Selection::default(), 1, &ctx).unwrap();
        assert_eq!(express.total_shipping, Decimal::new(1999, 2));

        let ctx = PricingContext { shipping_method: Some("Teleport".into()), ..Default::default() };
        assert!(matches!(engine.price(&p, &Selection::default(), 1, &ctx), Err(StorefrontError::Validation(_))));
    }

    #[test]
    fn test_discount_price_is_the_base() {
        let p = Product::new("bag", "Bag", Decimal::new(60, 0)).with_discount_price(Decimal::new(45, 0));
        let b = PricingEngine::default().price(&p, &Selection::default(), 1, &PricingContext::default()).unwrap();
        assert_eq!(b.base_price, Decimal::new(45, 0));
        assert_eq!(b.total_shipping, Decimal::new(799, 2));
    }

    #[test]
    fn test_excess_discount_clamps_to_zero() {
        let p = Product::new("sock", "Sock", Decimal::new(3, 0));
        let config = PricingConfig { shipping: ShippingPolicy { flat_fee: Decimal::ZERO, ..Default::default() }, ..Default::default() };
        let ctx = PricingContext { promotions: vec![Promotion { promotion_id: "x".into(), name: "Too generous".into(), discount: Decimal::new(10, 0) }], ..Default::default() };
        let b = PricingEngine::new(config).price(&p, &Selection::default(), 1, &ctx).unwrap();
        assert!(b.clamped);
        assert_eq!(b.final_price, Decimal::ZERO);
        assert_eq!(b.total_tax, Decimal::ZERO);
    }

    #[test]
    fn test_breakdown_uses_product_currency() {
        let ngn = CurrencyCode::new("NGN").unwrap();
        let p = Product::new("ankara1", "Ankara Wrap", Decimal::new(100, 0)).with_currency(ngn.clone());

        let err = PricingEngine::default().price(&p, &Selection::default(), 1, &PricingContext::default()).unwrap_err();
        assert!(matches!(err, StorefrontError::Validation(_)));

        let engine = PricingEngine::new(PricingConfig { currency: ngn.clone(), ..Default::default() });
        let b = engine.price(&p, &Selection::default(), 1, &PricingContext::default()).unwrap();
        assert_eq!(b.currency, ngn);
        assert_eq!(b.final_price, Decimal::new(10850, 2));
    }

    #[test]
    fn test_zero_quantity_is_rejected() {
        let p = scrub_top();
        let err = PricingEngine::default().price(&p, &size(&p, "M"), 0, &PricingContext::default()).unwrap_err();
        assert!(matches!(err, StorefrontError::Validation(_)));
    }

    #[test]
    fn test_convert_breakdown() {
        let p = scrub_top();
        let b = PricingEngine::default().price(&p, &size(&p, "2X"), 1, &PricingContext::default()).unwrap();
        let eur = b.convert(Decimal::new(5, 1), CurrencyCode::new("EUR").unwrap());
        assert_eq!(eur.currency.as_str(), "EUR");
        assert_eq!(eur.subtotal, Decimal::new(2450, 2));
        assert_eq!(eur.final_price, Decimal::new(3057, 2));
    }
}
