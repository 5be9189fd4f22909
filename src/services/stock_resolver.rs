//! Stock resolution for a variation selection
//!
//! Combination stock (how many red XL shirts exist) is not tracked, so a
//! selection is only as available as its scarcest selected option.

use serde::Serialize;

use crate::domain::aggregates::{Product, Selection, SelectionError};
use crate::domain::value_objects::Sku;

pub const INCOMPLETE_SELECTION_REASON: &str = "Please select all required options";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StockInfo {
    pub is_available: bool,
    pub stock_count: u32,
    pub sku: Option<Sku>,
    pub reason: Option<String>,
}

impl StockInfo {
    fn unavailable(reason: impl Into<String>) -> Self {
        Self { is_available: false, stock_count: 0, sku: None, reason: Some(reason.into()) }
    }
}

pub fn resolve(product: &Product, selection: &Selection) -> Result<StockInfo, SelectionError> {
    let groups = product.variations();
    if !selection.is_complete(groups) {
        return Ok(StockInfo::unavailable(INCOMPLETE_SELECTION_REASON));
    }

    let selected = selection.selected_options(groups)?;
    let unavailable: Vec<&str> = selected.iter().filter(|(_, o)| !o.available).map(|(_, o)| o.label.as_str()).collect();
    if !unavailable.is_empty() {
        return Ok(StockInfo::unavailable(format!("Out of stock: {}", unavailable.join(", "))));
    }

    let stock_count = selected.iter().map(|(_, o)| o.stock_quantity).min()
        .unwrap_or_else(|| product.stock().current_stock());

    // SKU segments follow group declaration order, not selection order
    let segments = groups.iter().filter_map(|g| {
        selection.get(g.variation_type).and_then(|id| g.option(id)).map(|o| o.sku_segment())
    });
    let sku = match Sku::synthesize(product.id(), segments) {
        Ok(sku) => Some(sku),
        Err(e) => {
            tracing::warn!(product_id = product.id(), error = %e, "could not synthesize SKU");
            None
        }
    };

    let info = StockInfo {
        is_available: stock_count > 0,
        stock_count,
        sku,
        reason: (stock_count == 0).then(|| "Out of stock".to_string()),
    };
    tracing::debug!(product_id = product.id(), stock_count, available = info.is_available, "resolved stock");
    Ok(info)
}
