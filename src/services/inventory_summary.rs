//! Inventory details per product and stock statistics across the catalog

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregates::Product;
use crate::domain::events::{DomainEvent, InventoryEvent};
use crate::services::sales_analytics::SalesAnalytics;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InventoryDetails {
    pub current_stock: u32,
    pub reserved_stock: u32,
    pub available_stock: u32,
    pub reorder_point: u32,
    pub max_stock: u32,
    pub min_stock: u32,
    pub stock_value: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    pub fn of(stock: u32, reorder_point: u32) -> Self {
        if stock == 0 {
            Self::OutOfStock
        } else if stock <= reorder_point {
            Self::LowStock
        } else {
            Self::InStock
        }
    }
}

pub fn build(product: &Product) -> InventoryDetails {
    let stock = product.stock();
    let current_stock = stock.current_stock();
    let reserved_stock = stock.reserved_stock();
    InventoryDetails {
        current_stock,
        reserved_stock,
        available_stock: current_stock.saturating_sub(reserved_stock),
        reorder_point: stock.reorder_point(),
        max_stock: stock.max_stock(),
        min_stock: stock.min_stock(),
        stock_value: Decimal::from(current_stock) * stock.unit_cost(product.price()),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EnhancedProductStats {
    pub total_products: usize,
    pub active_products: usize,
    pub inactive_products: usize,
    pub on_sale: usize,
    pub low_stock: usize,
    pub out_of_stock: usize,
    pub total_stock_value: Decimal,
    pub critical_alerts: usize,
}

pub fn build_fleet_stats(products: &[Product]) -> EnhancedProductStats {
    let mut stats = EnhancedProductStats { total_products: products.len(), ..Default::default() };
    for product in products {
        if product.is_active() { stats.active_products += 1 } else { stats.inactive_products += 1 }
        if product.is_on_sale() { stats.on_sale += 1 }

        let details = build(product);
        match StockStatus::of(details.current_stock, details.reorder_point) {
            StockStatus::LowStock => stats.low_stock += 1,
            StockStatus::OutOfStock => stats.out_of_stock += 1,
            StockStatus::InStock => {}
        }
        stats.total_stock_value += details.stock_value;
    }
    stats.critical_alerts = stats.low_stock + stats.out_of_stock;
    stats
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductInventoryOverview {
    pub product_id: String,
    pub name: String,
    pub inventory: InventoryDetails,
    pub stock_status: StockStatus,
    pub analytics: SalesAnalytics,
    /// Days the available stock lasts at the trailing average sales rate.
    pub days_of_cover: Option<f64>,
}

pub fn overview(product: &Product, analytics: SalesAnalytics) -> ProductInventoryOverview {
    let inventory = build(product);
    let days_of_cover = (analytics.average_sales_per_day > 0.0)
        .then(|| f64::from(inventory.available_stock) / analytics.average_sales_per_day);
    ProductInventoryOverview {
        product_id: product.id().to_string(),
        name: product.name().to_string(),
        stock_status: StockStatus::of(inventory.current_stock, inventory.reorder_point),
        inventory,
        analytics,
        days_of_cover,
    }
}

/// One low-stock or out-of-stock event per active product that needs attention.
pub fn stock_events(products: &[Product]) -> Vec<DomainEvent> {
    products.iter().filter(|p| p.is_active()).filter_map(|p| {
        let details = build(p);
        match StockStatus::of(details.current_stock, details.reorder_point) {
            StockStatus::OutOfStock => Some(DomainEvent::Inventory(InventoryEvent::OutOfStock { product_id: p.id().to_string() })),
            StockStatus::LowStock => Some(DomainEvent::Inventory(InventoryEvent::LowStock {
                product_id: p.id().to_string(),
                available: details.available_stock,
                reorder_point: details.reorder_point,
            })),
            StockStatus::InStock => None,
        }
    }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::StockFields;
    use crate::domain::value_objects::DataSource;

    fn product(id: &str, price: i64, stock: StockFields) -> Product {
        Product::new(id, id.to_uppercase(), Decimal::new(price, 0)).with_stock(stock)
    }

    #[test]
    fn test_details_resolve_fields() {
        let p = product("p1", 20, StockFields { units: Some(12), stock_quantity: Some(99), reserved_stock: Some(2), cost_per_item: Some(Decimal::new(750, 2)), ..Default::default() });
        let d = build(&p);
        assert_eq!(d.current_stock, 12);
        assert_eq!(d.available_stock, 10);
        assert_eq!(d.reorder_point, 5);
        assert_eq!(d.stock_value, Decimal::new(90, 0));
    }

    #[test]
    fn test_available_stock_never_negative() {
        let p = product("p1", 20, StockFields { stock_quantity: Some(3), reserved_stock: Some(8), ..Default::default() });
        let d = build(&p);
        assert_eq!(d.available_stock, 0);
        assert_eq!(d.stock_value, Decimal::new(60, 0));
    }

    #[test]
    fn test_fleet_stats() {
        let products = vec![
            product("healthy", 10, StockFields { stock_quantity: Some(50), ..Default::default() }),
            product("low", 10, StockFields { stock_quantity: Some(5), ..Default::default() }).with_discount_price(Decimal::new(8, 0)),
            product("custom-threshold", 10, StockFields { stock_quantity: Some(9), low_stock_threshold: Some(10), ..Default::default() }),
            product("empty", 10, StockFields::default()).with_active(false),
        ];
        let stats = build_fleet_stats(&products);
        assert_eq!(stats.total_products, 4);
        assert_eq!(stats.active_products, 3);
        assert_eq!(stats.inactive_products, 1);
        assert_eq!(stats.on_sale, 1);
        assert_eq!(stats.low_stock, 2);
        assert_eq!(stats.out_of_stock, 1);
        assert_eq!(stats.critical_alerts, 3);
        assert_eq!(stats.total_stock_value, Decimal::new(640, 0));
    }

    #[test]
    fn test_stock_events_skip_inactive() {
        let products = vec![
            product("low", 10, StockFields { stock_quantity: Some(2), ..Default::default() }),
            product("gone", 10, StockFields::default()),
            product("retired", 10, StockFields::default()).with_active(false),
        ];
        let events = stock_events(&products);
        assert_eq!(events, vec![
            DomainEvent::Inventory(InventoryEvent::LowStock { product_id: "low".into(), available: 2, reorder_point: 5 }),
            DomainEvent::Inventory(InventoryEvent::OutOfStock { product_id: "gone".into() }),
        ]);
    }

    #[test]
    fn test_overview_days_of_cover() {
        let p = product("p1", 10, StockFields { stock_quantity: Some(30), reserved_stock: Some(10), ..Default::default() });
        let mut analytics = SalesAnalytics::empty("p1", DataSource::Live);
        assert_eq!(overview(&p, analytics.clone()).days_of_cover, None);
        analytics.average_sales_per_day = 4.0;
        let o = overview(&p, analytics);
        assert_eq!(o.days_of_cover, Some(5.0));
        assert_eq!(o.stock_status, StockStatus::InStock);
    }
}
