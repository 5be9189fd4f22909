//! Historical order lines, read-only from the storefront core

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A line of a placed order. `quantity` and `price` are optional because
/// older documents were written without them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: String,
    pub product_id: String,
    pub quantity: Option<u32>,
    pub price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// Order line document as stored in the `order_items` collection.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderLineRecord {
    pub product_id: String,
    pub quantity: Option<u32>,
    pub price: Option<Decimal>,
}

impl OrderLineRecord {
    pub fn into_line(self, id: String, created_at: DateTime<Utc>) -> OrderLine {
        OrderLine { id, product_id: self.product_id, quantity: self.quantity, price: self.price, created_at }
    }
}

impl OrderLine {
    pub fn units(&self) -> u32 { self.quantity.unwrap_or(0) }

    /// Falls back to the product's current price when the line has none recorded.
    pub fn revenue(&self, fallback_unit_price: Decimal) -> Decimal {
        Decimal::from(self.units()) * self.price.unwrap_or(fallback_unit_price)
    }
}
