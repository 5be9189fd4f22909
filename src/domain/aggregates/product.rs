//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::variation::VariationGroup;
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::CurrencyCode;

#[derive(Clone, Debug, Serialize)]
pub struct Product {
    id: String,
    name: String,
    price: Decimal,
    discount_price: Option<Decimal>,
    compare_at_price: Option<Decimal>,
    currency: CurrencyCode,
    is_active: bool,
    stock: StockFields,
    variations: Vec<VariationGroup>,
    images: Vec<ProductImage>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage { pub id: String, pub file_id: Option<String>, pub url: Option<String>, pub alt_text: Option<String>, pub variation_id: Option<String>, pub position: i32 }

/// Product document as stored in the `products` collection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductRecord {
    pub name: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    pub compare_at_price: Option<Decimal>,
    pub currency: Option<CurrencyCode>,
    pub is_active: Option<bool>,
    #[serde(flatten)]
    pub stock: StockFields,
}

/// Image document as stored in the `product_images` collection.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageRecord {
    pub product_id: Option<String>,
    pub file_id: Option<String>,
    pub url: Option<String>,
    pub alt_text: Option<String>,
    pub variation_id: Option<String>,
    pub sort_order: Option<i32>,
}

impl ImageRecord {
    pub fn into_image(self, id: String) -> ProductImage {
        ProductImage { id, file_id: self.file_id, url: self.url, alt_text: self.alt_text, variation_id: self.variation_id, position: self.sort_order.unwrap_or(0) }
    }
}

// =============================================================================
// Field Resolution
// =============================================================================

/// Raw stock and cost fields. Legacy documents populate different subsets,
/// so every derived value resolves through the priority lists below:
///
/// | value          | priority                                          |
/// |----------------|---------------------------------------------------|
/// | current stock  | `units` → `stock_quantity` → 0                    |
/// | reserved stock | `reserved_stock` → 0                              |
/// | reorder point  | `low_stock_threshold` → `min_order_quantity` → 5  |
/// | unit cost      | `cost_per_item` → product price → 0               |
/// | max stock      | `max_stock` → 1000                                |
/// | min stock      | `min_stock` → 0                                   |
///
/// Negative stored counts clamp to zero.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockFields {
    pub units: Option<i64>,
    pub stock_quantity: Option<i64>,
    pub reserved_stock: Option<i64>,
    pub low_stock_threshold: Option<i64>,
    pub min_order_quantity: Option<i64>,
    pub max_stock: Option<i64>,
    pub min_stock: Option<i64>,
    pub cost_per_item: Option<Decimal>,
}

impl StockFields {
    pub const DEFAULT_REORDER_POINT: u32 = 5;
    pub const DEFAULT_MAX_STOCK: u32 = 1000;
    pub const DEFAULT_MIN_STOCK: u32 = 0;

    pub fn current_stock(&self) -> u32 { clamp_count(self.units.or(self.stock_quantity).unwrap_or(0)) }
    pub fn reserved_stock(&self) -> u32 { clamp_count(self.reserved_stock.unwrap_or(0)) }
    pub fn reorder_point(&self) -> u32 {
        self.low_stock_threshold.or(self.min_order_quantity).map(clamp_count).unwrap_or(Self::DEFAULT_REORDER_POINT)
    }
    pub fn max_stock(&self) -> u32 { self.max_stock.map(clamp_count).unwrap_or(Self::DEFAULT_MAX_STOCK) }
    pub fn min_stock(&self) -> u32 { self.min_stock.map(clamp_count).unwrap_or(Self::DEFAULT_MIN_STOCK) }
    pub fn unit_cost(&self, price: Decimal) -> Decimal { self.cost_per_item.unwrap_or(price) }
}

fn clamp_count(value: i64) -> u32 { u32::try_from(value.max(0)).unwrap_or(u32::MAX) }

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(), name: name.into(), price, discount_price: None, compare_at_price: None,
            currency: CurrencyCode::usd(), is_active: true, stock: StockFields::default(),
            variations: vec![], images: vec![], created_at: now, updated_at: now, events: vec![],
        }
    }

    pub fn from_record(id: impl Into<String>, record: ProductRecord, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(), name: record.name, price: record.price, discount_price: record.discount_price,
            compare_at_price: record.compare_at_price, currency: record.currency.unwrap_or_default(),
            is_active: record.is_active.unwrap_or(true), stock: record.stock,
            variations: vec![], images: vec![], created_at, updated_at, events: vec![],
        }
    }

    pub fn with_discount_price(mut self, discount_price: Decimal) -> Self { self.discount_price = Some(discount_price); self }
    pub fn with_stock(mut self, stock: StockFields) -> Self { self.stock = stock; self }
    pub fn with_currency(mut self, currency: CurrencyCode) -> Self { self.currency = currency; self }
    pub fn with_variations(mut self, variations: Vec<VariationGroup>) -> Self { self.variations = variations; self }
    pub fn with_images(mut self, images: Vec<ProductImage>) -> Self { self.images = images; self }
    pub fn with_active(mut self, is_active: bool) -> Self { self.is_active = is_active; self }

    pub fn id(&self) -> &str { &self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn price(&self) -> Decimal { self.price }
    pub fn discount_price(&self) -> Option<Decimal> { self.discount_price }
    pub fn compare_at_price(&self) -> Option<Decimal> { self.compare_at_price }
    pub fn currency(&self) -> &CurrencyCode { &self.currency }
    pub fn is_active(&self) -> bool { self.is_active }
    pub fn stock(&self) -> &StockFields { &self.stock }
    pub fn variations(&self) -> &[VariationGroup] { &self.variations }
    pub fn images(&self) -> &[ProductImage] { &self.images }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    /// The discount price when one is set above zero, otherwise the list price.
    pub fn base_price(&self) -> Decimal {
        self.discount_price.filter(|d| *d > Decimal::ZERO).unwrap_or(self.price)
    }

    pub fn is_on_sale(&self) -> bool { self.discount_price.is_some_and(|d| d > Decimal::ZERO) }

    /// Soft delete: historical order lines keep referencing the product.
    pub fn deactivate(&mut self) -> Result<(), ProductError> {
        if !self.is_active { return Err(ProductError::AlreadyInactive); }
        self.is_active = false;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Deactivated { product_id: self.id.clone() }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum ProductError { AlreadyInactive }
impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::AlreadyInactive => write!(f, "Product already inactive") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_price_prefers_positive_discount() {
        let p = Product::new("P1", "Tee", Decimal::new(4599, 2));
        assert_eq!(p.base_price(), Decimal::new(4599, 2));
        assert!(!p.clone().with_discount_price(Decimal::ZERO).is_on_sale());
        assert_eq!(p.clone().with_discount_price(Decimal::ZERO).base_price(), Decimal::new(4599, 2));
        assert_eq!(p.with_discount_price(Decimal::new(3999, 2)).base_price(), Decimal::new(3999, 2));
    }

    #[test]
    fn test_stock_field_resolution() {
        let empty = StockFields::default();
        assert_eq!(empty.current_stock(), 0);
        assert_eq!(empty.reorder_point(), 5);
        assert_eq!(empty.max_stock(), 1000);
        assert_eq!(empty.unit_cost(Decimal::new(10, 0)), Decimal::new(10, 0));

        let legacy = StockFields { units: Some(12), stock_quantity: Some(40), min_order_quantity: Some(3), ..Default::default() };
        assert_eq!(legacy.current_stock(), 12);
        assert_eq!(legacy.reorder_point(), 3);

        let newer = StockFields { stock_quantity: Some(-4), low_stock_threshold: Some(8), min_order_quantity: Some(3), cost_per_item: Some(Decimal::new(250, 2)), ..Default::default() };
        assert_eq!(newer.current_stock(), 0);
        assert_eq!(newer.reorder_point(), 8);
        assert_eq!(newer.unit_cost(Decimal::new(10, 0)), Decimal::new(250, 2));
    }

    #[test]
    fn test_record_decodes_legacy_document() {
        let doc = serde_json::json!({ "name": "Scrub Top", "price": 45.99, "units": 7, "is_active": false });
        let record: ProductRecord = serde_json::from_value(doc).unwrap();
        let p = Product::from_record("p9", record, Utc::now(), Utc::now());
        assert_eq!(p.price(), Decimal::new(4599, 2));
        assert_eq!(p.stock().current_stock(), 7);
        assert!(!p.is_active());
        assert_eq!(p.currency().as_str(), "USD");
    }

    #[test]
    fn test_deactivate_raises_event_once() {
        let mut p = Product::new("P1", "Tee", Decimal::new(10, 0));
        p.deactivate().unwrap();
        assert_eq!(p.deactivate(), Err(ProductError::AlreadyInactive));
        let events = p.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], DomainEvent::Product(ProductEvent::Deactivated { product_id }) if product_id == "P1"));
    }
}
