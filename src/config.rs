//! Service configuration from the environment
//!
//! `main` loads `.env` through dotenvy first; everything is then read from
//! process variables. Parsing goes through a lookup function so tests can
//! supply their own values.

use rust_decimal::Decimal;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::domain::value_objects::CurrencyCode;
use crate::services::currency::RetryPolicy;
use crate::services::pricing::{PricingConfig, TaxRule};

pub const DEFAULT_PORT: u16 = 8083;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid { key: &'static str, value: String, reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateProviderSettings { pub name: String, pub base_url: String }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrencySettings {
    pub providers: Vec<RateProviderSettings>,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub nats_url: Option<String>,
    pub pricing: PricingConfig,
    pub currency: CurrencySettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut pricing = PricingConfig::default();
        if let Some(code) = get("STORE_CURRENCY") {
            pricing.currency = CurrencyCode::new(&code).map_err(|e| invalid("STORE_CURRENCY", &code, e))?;
        }
        let tax_rate: Decimal = parse(&get, "PRICING_TAX_RATE", Decimal::new(85, 3))?;
        if tax_rate < Decimal::ZERO {
            return Err(invalid("PRICING_TAX_RATE", &tax_rate.to_string(), "must not be negative"));
        }
        pricing.tax_rules = if tax_rate.is_zero() { vec![] } else { vec![TaxRule { name: "Sales Tax".to_string(), rate: tax_rate }] };
        pricing.quantity_tier_size = parse(&get, "PRICING_TIER_SIZE", pricing.quantity_tier_size)?;
        pricing.quantity_tier_discount = parse(&get, "PRICING_TIER_DISCOUNT", pricing.quantity_tier_discount)?;
        pricing.shipping.free_shipping_threshold = parse(&get, "PRICING_FREE_SHIPPING_THRESHOLD", pricing.shipping.free_shipping_threshold)?;
        pricing.shipping.flat_fee = parse(&get, "PRICING_FLAT_SHIPPING", pricing.shipping.flat_fee)?;

        let defaults = RetryPolicy::default();
        let max_attempts: u32 = parse(&get, "CURRENCY_MAX_ATTEMPTS", defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(invalid("CURRENCY_MAX_ATTEMPTS", "0", "at least one attempt is required"));
        }
        let retry = RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(parse(&get, "CURRENCY_RETRY_BASE_MS", defaults.base_delay.as_millis() as u64)?),
            max_delay: Duration::from_millis(parse(&get, "CURRENCY_RETRY_MAX_MS", defaults.max_delay.as_millis() as u64)?),
        };
        let currency = CurrencySettings {
            providers: get("CURRENCY_PROVIDERS").map(|raw| parse_providers(&raw)).transpose()?.unwrap_or_default(),
            retry,
            timeout: Duration::from_secs(parse(&get, "CURRENCY_TIMEOUT_SECS", 5)?),
        };

        Ok(Self {
            port: parse(&get, "PORT", DEFAULT_PORT)?,
            database_url: get("DATABASE_URL"),
            database_max_connections: parse(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            nats_url: get("NATS_URL"),
            pricing,
            currency,
        })
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Display) -> ConfigError {
    ConfigError::Invalid { key, value: value.to_string(), reason: reason.to_string() }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e| invalid(key, &raw, e)),
        None => Ok(default),
    }
}

/// `name=url` pairs separated by commas, in priority order.
fn parse_providers(raw: &str) -> Result<Vec<RateProviderSettings>, ConfigError> {
    raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()).map(|entry| {
        match entry.split_once('=') {
            Some((name, url)) if !name.trim().is_empty() && url.trim().starts_with("http") => {
                Ok(RateProviderSettings { name: name.trim().to_string(), base_url: url.trim().to_string() })
            }
            _ => Err(invalid("CURRENCY_PROVIDERS", entry, "expected name=http(s)://url")),
        }
    }).collect()
}
