use crate::{join::LineWithUser, types::ProductId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductFeatures {
    pub product_id: ProductId,
    pub total_purchase_count: u64,
    /// Mean of the reordered flag over every prior line, first purchases included.
    pub reorder_rate: f64,
}

pub fn aggregate_products(prior_with_user: &[LineWithUser]) -> BTreeMap<ProductId, ProductFeatures> {
    let mut counts: BTreeMap<ProductId, (u64, u64)> = BTreeMap::new();
    for row in prior_with_user {
        let entry = counts.entry(row.product_id).or_default();
        entry.0 += 1;
        if row.reordered {
            entry.1 += 1;
        }
    }

    let table: BTreeMap<ProductId, ProductFeatures> = counts
        .into_iter()
        .map(|(product_id, (total, reordered))| {
            (
                product_id,
                ProductFeatures {
                    product_id,
                    total_purchase_count: total,
                    reorder_rate: reordered as f64 / total as f64,
                },
            )
        })
        .collect();

    log::info!("features: products={}", table.len());
    table
}
