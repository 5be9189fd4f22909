//! Sales analytics over a product's historical order lines
//!
//! Today, month and year start at calendar boundaries (UTC midnight, 1st of month, Jan 1). The week is
//! a rolling 7×24h window ending now.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::OrderLine;
use crate::domain::value_objects::DataSource;

/// The sales-per-day average always divides by this many days.
pub const AVERAGE_WINDOW_DAYS: i64 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesVelocity {
    Fast,
    Medium,
    Slow,
    Stagnant,
}

impl SalesVelocity {
    pub const FAST_PER_DAY: f64 = 10.0;
    pub const MEDIUM_PER_DAY: f64 = 3.0;
    pub const SLOW_PER_DAY: f64 = 0.5;

    /// Thresholds are inclusive lower bounds.
    pub fn classify(average_per_day: f64) -> Self {
        if average_per_day >= Self::FAST_PER_DAY {
            Self::Fast
        } else if average_per_day >= Self::MEDIUM_PER_DAY {
            Self::Medium
        } else if average_per_day >= Self::SLOW_PER_DAY {
            Self::Slow
        } else {
            Self::Stagnant
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RevenueTotals {
    pub total: Decimal,
    pub today: Decimal,
    pub week: Decimal,
    pub month: Decimal,
    pub year: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SalesAnalytics {
    pub product_id: String,
    pub total_sold: u64,
    pub sold_today: u64,
    pub sold_this_week: u64,
    pub sold_this_month: u64,
    pub sold_this_year: u64,
    pub last_sale_date: Option<DateTime<Utc>>,
    pub average_sales_per_day: f64,
    pub sales_velocity: SalesVelocity,
    pub revenue: RevenueTotals,
    pub source: DataSource,
}

impl SalesAnalytics {
    /// No sales, stagnant. Also the degraded answer when order lines cannot be read.
    pub fn empty(product_id: impl Into<String>, source: DataSource) -> Self {
        Self {
            product_id: product_id.into(),
            total_sold: 0,
            sold_today: 0,
            sold_this_week: 0,
            sold_this_month: 0,
            sold_this_year: 0,
            last_sale_date: None,
            average_sales_per_day: 0.0,
            sales_velocity: SalesVelocity::Stagnant,
            revenue: RevenueTotals::default(),
            source,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SalesWindows {
    pub today: DateTime<Utc>,
    pub week: DateTime<Utc>,
    pub month: DateTime<Utc>,
    pub year: DateTime<Utc>,
    pub trailing: DateTime<Utc>,
}

impl SalesWindows {
    pub fn anchored_at(now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let first_of_month = today.with_day(1).unwrap_or(today);
        let first_of_year = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(first_of_month);
        Self {
            today: midnight(today),
            week: now - Duration::days(7),
            month: midnight(first_of_month),
            year: midnight(first_of_year),
            trailing: now - Duration::days(AVERAGE_WINDOW_DAYS),
        }
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

pub fn aggregate(product_id: &str, unit_price: Decimal, lines: &[OrderLine], now: DateTime<Utc>) -> SalesAnalytics {
    let mut analytics = SalesAnalytics::empty(product_id, DataSource::Live);
    if lines.is_empty() {
        return analytics;
    }

    let windows = SalesWindows::anchored_at(now);
    let mut trailing_units: u64 = 0;

    for line in lines {
        let units = u64::from(line.units());
        let revenue = line.revenue(unit_price);

        analytics.total_sold += units;
        analytics.revenue.total += revenue;
        if line.created_at >= windows.today {
            analytics.sold_today += units;
            analytics.revenue.today += revenue;
        }
        if line.created_at >= windows.week {
            analytics.sold_this_week += units;
            analytics.revenue.week += revenue;
        }
        if line.created_at >= windows.month {
            analytics.sold_this_month += units;
            analytics.revenue.month += revenue;
        }
        if line.created_at >= windows.year {
            analytics.sold_this_year += units;
            analytics.revenue.year += revenue;
        }
        if line.created_at >= windows.trailing {
            trailing_units += units;
        }
        if analytics.last_sale_date.map_or(true, |last| line.created_at > last) {
            analytics.last_sale_date = Some(line.created_at);
        }
    }

    analytics.average_sales_per_day = trailing_units as f64 / AVERAGE_WINDOW_DAYS as f64;
    analytics.sales_velocity = SalesVelocity::classify(analytics.average_sales_per_day);
    tracing::debug!(product_id, total_sold = analytics.total_sold, velocity = ?analytics.sales_velocity, "aggregated sales");
    analytics
}
