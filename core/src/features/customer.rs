use crate::{
    join::LineWithUser,
    records::Order,
    types::{ProductId, UserId},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerFeatures {
    pub user_id: UserId,
    /// Prior order lines only.
    pub total_line_count: u64,
    pub unique_product_count: u64,
    /// Orders across the prior and train sets.
    pub total_order_count: u64,
    /// Mean of the non-null order gaps. None when the user has no gap at all.
    pub avg_days_between_orders: Option<f64>,
}

#[derive(Default)]
struct OrderStats {
    orders: u64,
    gap_sum: f64,
    gap_count: u64,
}

/// One row per user appearing in `prior_with_user`.
///
/// `history_orders` should be the user's prior and train orders; the train
/// order counts towards the order history but its lines are never purchases.
pub fn aggregate_customers<'a, I>(
    prior_with_user: &[LineWithUser],
    history_orders: I,
) -> BTreeMap<UserId, CustomerFeatures>
where
    I: IntoIterator<Item = &'a Order>,
{
    let mut lines: BTreeMap<UserId, (u64, HashSet<ProductId>)> = BTreeMap::new();
    for row in prior_with_user {
        let entry = lines.entry(row.user_id).or_default();
        entry.0 += 1;
        entry.1.insert(row.product_id);
    }

    let mut stats: BTreeMap<UserId, OrderStats> = BTreeMap::new();
    for order in history_orders {
        let s = stats.entry(order.user_id).or_default();
        s.orders += 1;
        if let Some(days) = order.days_since_prior_order {
            s.gap_sum += days;
            s.gap_count += 1;
        }
    }

    let table: BTreeMap<UserId, CustomerFeatures> = lines
        .into_iter()
        .map(|(user_id, (line_count, products))| {
            let s = stats.get(&user_id);
            let features = CustomerFeatures {
                user_id,
                total_line_count: line_count,
                unique_product_count: products.len() as u64,
                total_order_count: s.map(|s| s.orders).unwrap_or(0),
                avg_days_between_orders: s
                    .filter(|s| s.gap_count > 0)
                    .map(|s| s.gap_sum / s.gap_count as f64),
            };
            (user_id, features)
        })
        .collect();

    let undefined_gap = table
        .values()
        .filter(|c| c.avg_days_between_orders.is_none())
        .count();
    log::info!(
        "features: customers={} undefined avg_days_between_orders={undefined_gap}",
        table.len()
    );
    table
}
