//! Aggregates module
pub mod order;
pub mod product;
pub mod variation;

pub use order::{OrderLine, OrderLineRecord};
pub use product::{ImageRecord, Product, ProductError, ProductImage, ProductRecord, StockFields};
pub use variation::{RawVariationGroup, RawVariationRow, Selection, SelectionEntry, SelectionError, VariationGroup, VariationOption, VariationType};
