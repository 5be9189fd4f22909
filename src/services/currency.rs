//! Currency conversion with a provider fallback chain
//!
//! Providers are tried in priority order. A provider that rejects the pair
//! is skipped at once; one that is unreachable or failing is retried with
//! exponential backoff. When every provider has given up, a static USD-based
//! table answers and the result is tagged `Fallback`.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::domain::value_objects::{CurrencyCode, DataSource, Money};
use crate::{Result, StorefrontError};

/// Cross rates are kept to this many decimal places.
pub const RATE_PRECISION: u32 = 6;

/// Units of each currency per US dollar.
const USD_RATES: [(&str, i64, u32); 9] = [
    ("USD", 1, 0),
    ("EUR", 92, 2),
    ("GBP", 79, 2),
    ("CAD", 136, 2),
    ("AUD", 153, 2),
    ("JPY", 14950, 2),
    ("INR", 8320, 2),
    ("MXN", 1710, 2),
    ("NGN", 1550, 0),
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateError {
    #[error("{provider} does not support {from}->{to}")]
    NotSupported { provider: String, from: String, to: String },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid rate response: {0}")]
    Invalid(String),
}

impl RateError {
    pub fn is_retryable(&self) -> bool { matches!(self, Self::Unavailable(_)) }
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> std::result::Result<Decimal, RateError>;
}

// =============================================================================
// HTTP Provider
// =============================================================================

#[derive(Debug, Deserialize)]
struct RatesResponse { rates: HashMap<String, Decimal> }

/// Exchange-rate API answering `GET {base}/latest?base=USD&symbols=EUR`
/// with `{"rates": {"EUR": 0.92}}`.
pub struct HttpRateProvider {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpRateProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorefrontError::Upstream(format!("HTTP client: {}", e)))?;
        Ok(Self { name: name.into(), base_url: base_url.into(), client })
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    fn name(&self) -> &str { &self.name }

    async fn rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> std::result::Result<Decimal, RateError> {
        let url = format!("{}/latest?base={}&symbols={}", self.base_url.trim_end_matches('/'), from, to);
        let resp = self.client.get(&url).send().await.map_err(|e| RateError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status.is_client_error() {
            return Err(RateError::NotSupported { provider: self.name.clone(), from: from.to_string(), to: to.to_string() });
        }
        if !status.is_success() {
            return Err(RateError::Unavailable(format!("{} answered {}", self.name, status)));
        }

        let body: RatesResponse = resp.json().await.map_err(|e| RateError::Invalid(e.to_string()))?;
        body.rates.get(to.as_str()).copied()
            .filter(|r| *r > Decimal::ZERO)
            .ok_or_else(|| RateError::Invalid(format!("{} returned no rate for {}", self.name, to)))
    }
}

// =============================================================================
// Converter
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(200), max_delay: Duration::from_secs(5) }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt)).min(self.max_delay)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Conversion {
    pub original: Money,
    pub amount: Money,
    pub rate: Decimal,
    pub source: DataSource,
    pub provider: String,
}

#[derive(Clone, Default)]
pub struct CurrencyConverter {
    providers: Vec<Arc<dyn RateProvider>>,
    retry: RetryPolicy,
}

impl CurrencyConverter {
    pub fn new(providers: Vec<Arc<dyn RateProvider>>, retry: RetryPolicy) -> Self { Self { providers, retry } }

    #[tracing::instrument(skip(self))]
    pub async fn convert(&self, amount: Decimal, from: &str, to: &str) -> Result<Conversion> {
        if amount < Decimal::ZERO {
            return Err(StorefrontError::validation("Amount must not be negative"));
        }
        let from = CurrencyCode::new(from).map_err(|e| StorefrontError::validation(e.to_string()))?;
        let to = CurrencyCode::new(to).map_err(|e| StorefrontError::validation(e.to_string()))?;
        let original = Money::new(amount, from.clone());

        if from == to {
            return Ok(Conversion { amount: original.clone(), original, rate: Decimal::ONE, source: DataSource::Live, provider: "identity".to_string() });
        }

        for provider in &self.providers {
            match self.fetch_rate(provider.as_ref(), &from, &to).await {
                Ok(rate) => {
                    tracing::debug!(provider = provider.name(), %rate, "rate fetched");
                    return Ok(Conversion { amount: original.convert(rate, to), original, rate, source: DataSource::Live, provider: provider.name().to_string() });
                }
                Err(e) => tracing::warn!(provider = provider.name(), error = %e, "rate provider failed, trying next"),
            }
        }

        let rate = fallback_rate(&from, &to)
            .ok_or_else(|| StorefrontError::validation(format!("Unsupported currency pair {}->{}", from, to)))?;
        tracing::warn!(%from, %to, %rate, "all rate providers failed, using static table");
        Ok(Conversion { amount: original.convert(rate, to), original, rate, source: DataSource::Fallback, provider: "static".to_string() })
    }

    async fn fetch_rate(&self, provider: &dyn RateProvider, from: &CurrencyCode, to: &CurrencyCode) -> std::result::Result<Decimal, RateError> {
        let mut attempt = 0;
        loop {
            match provider.rate(from, to).await {
                Ok(rate) => return Ok(rate),
                Err(e) if e.is_retryable() && attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(provider = provider.name(), attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "Retrying rate fetch: {e}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Cross rate through USD from the static table.
pub fn fallback_rate(from: &CurrencyCode, to: &CurrencyCode) -> Option<Decimal> {
    let per_usd = |code: &CurrencyCode| USD_RATES.iter()
        .find(|(c, _, _)| *c == code.as_str())
        .map(|(_, mantissa, scale)| Decimal::new(*mantissa, *scale));
    let (from_rate, to_rate) = (per_usd(from)?, per_usd(to)?);
    Some((to_rate / from_rate).round_dp(RATE_PRECISION))
}
