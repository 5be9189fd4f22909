//! Value Objects for the storefront core

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monetary values are rounded to cents, half away from zero.
pub const DECIMAL_PLACES: u32 = 2;

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// SKU (Stock Keeping Unit) value object. Kept exactly as given apart from
/// surrounding whitespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(SkuError::Empty); }
        Ok(Self(value))
    }

    /// Product id followed by one segment per selected option, hyphen-joined.
    pub fn synthesize<'a>(product_id: &'a str, segments: impl IntoIterator<Item = &'a str>) -> Result<Self, SkuError> {
        let mut parts = vec![product_id.trim()];
        parts.extend(segments.into_iter().map(str::trim).filter(|s| !s.is_empty()));
        Self::new(parts.join("-"))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum SkuError { Empty }
impl std::error::Error for SkuError {}
impl fmt::Display for SkuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "SKU empty") }
}

/// ISO-4217 style currency code: three ASCII letters, stored uppercase.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(value: &str) -> Result<Self, CurrencyCodeError> {
        let value = value.trim();
        if value.len() != 3 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CurrencyCodeError(value.to_string()));
        }
        Ok(Self(value.to_ascii_uppercase()))
    }
    pub fn usd() -> Self { Self("USD".to_string()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl Default for CurrencyCode { fn default() -> Self { Self::usd() } }

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyCodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(&value) }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self { code.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct CurrencyCodeError(pub String);
impl std::error::Error for CurrencyCodeError {}
impl fmt::Display for CurrencyCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Invalid currency code '{}'", self.0) }
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: CurrencyCode }

impl Money {
    pub fn new(amount: Decimal, currency: CurrencyCode) -> Self { Self { amount, currency } }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &CurrencyCode { &self.currency }
    /// Amount at `rate`, rounded to cents.
    pub fn convert(&self, rate: Decimal, to: CurrencyCode) -> Money { Money::new(round_money(self.amount * rate), to) }
}

/// Order quantity; always at least one unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 { return Err(QuantityError::Zero); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
    /// Number of complete tiers of `tier_size` units.
    pub fn complete_tiers(&self, tier_size: u32) -> u32 {
        if tier_size == 0 { 0 } else { self.0 / tier_size }
    }
}

#[derive(Debug, Clone)] pub enum QuantityError { Zero }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Quantity must be at least 1") }
}

/// Whether a result came from live data or from a degraded fallback path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    #[default]
    Live,
    Fallback,
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_sku() { let sku = Sku::new(" prod-001 ").unwrap(); assert_eq!(sku.as_str(), "prod-001"); }
    #[test]
    fn test_sku_synthesize() {
        let sku = Sku::synthesize("shirt42", ["nvy", " ", "Extra Large"]).unwrap();
        assert_eq!(sku.as_str(), "shirt42-nvy-Extra Large");
        assert_eq!(Sku::synthesize("", []).unwrap_err(), SkuError::Empty);
    }
    #[test]
    fn test_currency_code() {
        assert_eq!(CurrencyCode::new("eur").unwrap().as_str(), "EUR");
        assert!(CurrencyCode::new("EURO").is_err());
        assert!(CurrencyCode::new("U$D").is_err());
    }
    #[test]
    fn test_money_convert_rounds_half_away_from_zero() {
        let price = Money::new(Decimal::new(1005, 2), CurrencyCode::usd());
        let eur = price.convert(Decimal::new(5, 1), CurrencyCode::new("EUR").unwrap());
        assert_eq!(eur.amount(), Decimal::new(503, 2));
        assert_eq!(eur.currency().as_str(), "EUR");
    }
    #[test]
    fn test_quantity_tiers() {
        assert!(Quantity::new(0).is_err());
        let tiers: Vec<u32> = [4, 5, 9, 10, 14].iter().map(|q| Quantity::new(*q).unwrap().complete_tiers(5)).collect();
        assert_eq!(tiers, vec![0, 1, 1, 2, 2]);
    }
    #[test]
    fn test_round_money() {
        assert_eq!(round_money(Decimal::new(416415, 5)), Decimal::new(416, 2));
        assert_eq!(round_money(Decimal::new(1005, 3)), Decimal::new(101, 2));
    }
}
