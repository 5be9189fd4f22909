//! Variation catalog: raw variation rows into selectable groups

use rust_decimal::Decimal;

use crate::domain::aggregates::{RawVariationGroup, RawVariationRow, VariationGroup, VariationOption, VariationType};

/// Groups flat variation rows by `variation_type`, keeping source order.
/// Rows without a type are skipped.
pub fn group_rows(rows: impl IntoIterator<Item = RawVariationRow>) -> Vec<RawVariationGroup> {
    let mut groups: Vec<RawVariationGroup> = Vec::new();
    for row in rows {
        let Some(variation_type) = row.variation_type else {
            tracing::debug!(value = %row.variation_value, "skipping variation row without a type");
            continue;
        };
        let required = row.is_required;
        match groups.iter_mut().find(|g| g.variation_type == variation_type) {
            Some(group) => {
                group.required = group.required.or(required);
                group.options.push(row);
            }
            None => groups.push(RawVariationGroup { id: None, name: None, variation_type, required, options: vec![row] }),
        }
    }
    groups
}

/// Normalizes raw groups into one `VariationGroup` per type, in
/// `VariationType` declaration order. Raw groups that share a type are merged;
/// the first one supplies id, name and the required flag.
pub fn normalize(product_id: &str, raw_groups: impl IntoIterator<Item = RawVariationGroup>) -> Vec<VariationGroup> {
    let mut merged: Vec<RawVariationGroup> = Vec::new();
    for raw in raw_groups {
        match merged.iter_mut().find(|g| g.variation_type == raw.variation_type) {
            Some(existing) => {
                existing.id = existing.id.take().or(raw.id);
                existing.name = existing.name.take().or(raw.name);
                existing.required = existing.required.or(raw.required);
                existing.options.extend(raw.options);
            }
            None => merged.push(raw),
        }
    }
    merged.sort_by_key(|g| g.variation_type);

    merged.into_iter().map(|raw| normalize_group(product_id, raw)).collect()
}

fn normalize_group(product_id: &str, raw: RawVariationGroup) -> VariationGroup {
    let variation_type = raw.variation_type;
    let mut options: Vec<VariationOption> = raw.options.into_iter().map(|row| normalize_option(variation_type, row)).collect();
    // stable: rows without a sort order keep their source order after the ordered ones
    options.sort_by_key(|o| o.sort_order);

    VariationGroup {
        id: raw.id.unwrap_or_else(|| format!("{}-{}", variation_type, product_id)),
        name: raw.name.unwrap_or_else(|| variation_type.display_name().to_string()),
        variation_type,
        required: raw.required.unwrap_or(true),
        options,
    }
}

fn normalize_option(variation_type: VariationType, row: RawVariationRow) -> VariationOption {
    let stock_quantity = u32::try_from(row.stock_quantity.unwrap_or(0).max(0)).unwrap_or(u32::MAX);
    let id = row.id.unwrap_or_else(|| default_option_id(variation_type, &row.variation_value));
    VariationOption {
        id,
        label: row.display_name.filter(|d| !d.trim().is_empty()).unwrap_or_else(|| row.variation_value.clone()),
        value: row.variation_value,
        stock_quantity,
        price_modifier: row.price_modifier.unwrap_or(Decimal::ZERO),
        image_id: row.image_id,
        sku_suffix: row.sku_suffix,
        sort_order: row.sort_order.unwrap_or(i32::MAX),
        available: stock_quantity > 0,
    }
}

fn default_option_id(variation_type: VariationType, value: &str) -> String {
    format!("{}-{}", variation_type, value.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join("-"))
}
