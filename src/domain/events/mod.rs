//! Domain events
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Inventory(InventoryEvent),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    Deactivated { product_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InventoryEvent {
    LowStock { product_id: String, available: u32, reorder_point: u32 },
    OutOfStock { product_id: String },
}

impl DomainEvent {
    /// Messaging subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Product(ProductEvent::Deactivated { .. }) => "storefront.product.deactivated",
            Self::Inventory(InventoryEvent::LowStock { .. }) => "storefront.inventory.low_stock",
            Self::Inventory(InventoryEvent::OutOfStock { .. }) => "storefront.inventory.out_of_stock",
        }
    }
}
