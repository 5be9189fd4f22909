//! Variation groups, options and selections

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariationType {
    Color,
    Size,
    Style,
    Material,
}

impl VariationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Size => "size",
            Self::Style => "style",
            Self::Material => "material",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Color => "Color",
            Self::Size => "Size",
            Self::Style => "Style",
            Self::Material => "Material",
        }
    }
}

impl fmt::Display for VariationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationGroup {
    pub id: String,
    pub name: String,
    pub variation_type: VariationType,
    pub required: bool,
    pub options: Vec<VariationOption>,
}

impl VariationGroup {
    pub fn option(&self, option_id: &str) -> Option<&VariationOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    /// Resolves either an option id or a raw value (case-insensitive).
    fn lookup(&self, key: &str) -> Option<&VariationOption> {
        self.option(key).or_else(|| self.options.iter().find(|o| o.value.eq_ignore_ascii_case(key)))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationOption {
    pub id: String,
    pub value: String,
    pub label: String,
    pub stock_quantity: u32,
    pub price_modifier: Decimal,
    pub image_id: Option<String>,
    pub sku_suffix: Option<String>,
    pub sort_order: i32,
    pub available: bool,
}

impl VariationOption {
    pub fn sku_segment(&self) -> &str {
        self.sku_suffix.as_deref().filter(|s| !s.trim().is_empty()).unwrap_or(&self.value)
    }
}

/// A variation row as stored in the `product_variations` collection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawVariationRow {
    pub id: Option<String>,
    pub product_id: Option<String>,
    pub variation_type: Option<VariationType>,
    pub variation_value: String,
    pub display_name: Option<String>,
    pub stock_quantity: Option<i64>,
    pub price_modifier: Option<Decimal>,
    pub image_id: Option<String>,
    pub sku_suffix: Option<String>,
    pub sort_order: Option<i32>,
    pub is_required: Option<bool>,
}

/// Variation rows already grouped by type, before normalization.
#[derive(Clone, Debug, PartialEq)]
pub struct RawVariationGroup {
    pub id: Option<String>,
    pub name: Option<String>,
    pub variation_type: VariationType,
    pub required: Option<bool>,
    pub options: Vec<RawVariationRow>,
}

impl From<&VariationGroup> for RawVariationGroup {
    fn from(group: &VariationGroup) -> Self {
        Self {
            id: Some(group.id.clone()),
            name: Some(group.name.clone()),
            variation_type: group.variation_type,
            required: Some(group.required),
            options: group.options.iter().map(|o| RawVariationRow {
                id: Some(o.id.clone()),
                product_id: None,
                variation_type: Some(group.variation_type),
                variation_value: o.value.clone(),
                display_name: Some(o.label.clone()),
                stock_quantity: Some(i64::from(o.stock_quantity)),
                price_modifier: Some(o.price_modifier),
                image_id: o.image_id.clone(),
                sku_suffix: o.sku_suffix.clone(),
                sort_order: Some(o.sort_order),
                is_required: Some(group.required),
            }).collect(),
        }
    }
}

// =============================================================================
// Selection
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub variation_type: VariationType,
    pub option_id: String,
}

/// One chosen option per variation type, in the order the shopper picked them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    entries: Vec<SelectionEntry>,
}

impl Selection {
    pub fn for_groups(groups: &[VariationGroup], entries: impl IntoIterator<Item = SelectionEntry>) -> Result<Self, SelectionError> {
        let mut selection = Self::default();
        for entry in entries {
            selection.select(groups, entry.variation_type, &entry.option_id)?;
        }
        Ok(selection)
    }

    /// Selecting a type twice replaces the earlier choice in place.
    pub fn select(&mut self, groups: &[VariationGroup], variation_type: VariationType, key: &str) -> Result<(), SelectionError> {
        let group = groups.iter().find(|g| g.variation_type == variation_type).ok_or(SelectionError::UnknownGroup(variation_type))?;
        let option = group.lookup(key).ok_or_else(|| SelectionError::UnknownOption { variation_type, option_id: key.to_string() })?;
        match self.entries.iter_mut().find(|e| e.variation_type == variation_type) {
            Some(existing) => existing.option_id = option.id.clone(),
            None => self.entries.push(SelectionEntry { variation_type, option_id: option.id.clone() }),
        }
        Ok(())
    }

    pub fn get(&self, variation_type: VariationType) -> Option<&str> {
        self.entries.iter().find(|e| e.variation_type == variation_type).map(|e| e.option_id.as_str())
    }

    pub fn entries(&self) -> &[SelectionEntry] { &self.entries }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn is_complete(&self, groups: &[VariationGroup]) -> bool {
        groups.iter().filter(|g| g.required).all(|g| self.get(g.variation_type).is_some())
    }

    /// Selected options in selection order.
    pub fn selected_options<'g>(&self, groups: &'g [VariationGroup]) -> Result<Vec<(&'g VariationGroup, &'g VariationOption)>, SelectionError> {
        self.entries.iter().map(|e| {
            let group = groups.iter().find(|g| g.variation_type == e.variation_type).ok_or(SelectionError::UnknownGroup(e.variation_type))?;
            let option = group.option(&e.option_id).ok_or_else(|| SelectionError::UnknownOption { variation_type: e.variation_type, option_id: e.option_id.clone() })?;
            Ok((group, option))
        }).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    UnknownGroup(VariationType),
    UnknownOption { variation_type: VariationType, option_id: String },
}
impl std::error::Error for SelectionError {}
impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownGroup(t) => write!(f, "Product has no {} variations", t),
            Self::UnknownOption { variation_type, option_id } => write!(f, "Unknown {} option '{}'", variation_type, option_id),
        }
    }
}
