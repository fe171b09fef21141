//! Customer × product aggregator.
//!
//! Two grouped passes over prior_with_timing, keyed by (user, product):
//!   (a) every line: count, mean reordered, max order_number, mean cart slot
//!   (b) reordered lines only: summed order gap / reordered line count
//!
//! (b) is left-merged into (a) and the reorder-cycle sentinel is applied
//! in the same step. No consumer ever sees an undefined cycle.

use crate::{
    join::LineWithTiming,
    types::{PairKey, ProductId, UserId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerProductFeatures {
    pub user_id: UserId,
    pub product_id: ProductId,
    /// Always >= 1: a pair only exists because it was bought in a prior order.
    pub co_occurrence_count: u64,
    pub reorder_ratio: f64,
    pub last_order_number: u32,
    pub avg_cart_position: f64,
    /// Observed mean gap over reordered lines, or the sentinel.
    pub avg_days_between_reorder: f64,
    /// False when avg_days_between_reorder holds the sentinel.
    pub reorder_cycle_observed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CustomerProductTable {
    rows: BTreeMap<PairKey, CustomerProductFeatures>,
    pub imputed_count: usize,
    pub sentinel: f64,
}

impl CustomerProductTable {
    pub fn get(&self, key: &PairKey) -> Option<&CustomerProductFeatures> {
        self.rows.get(key)
    }

    pub fn contains(&self, key: &PairKey) -> bool {
        self.rows.contains_key(key)
    }

    /// Pair keys in (user, product) order.
    pub fn keys(&self) -> impl Iterator<Item = &PairKey> {
        self.rows.keys()
    }

    pub fn rows(&self) -> impl Iterator<Item = &CustomerProductFeatures> {
        self.rows.values()
    }

    /// Every pair with history for one user, in product order.
    pub fn pairs_for_user(&self, user_id: UserId) -> impl Iterator<Item = &PairKey> {
        self.rows
            .range((user_id, ProductId::MIN)..=(user_id, ProductId::MAX))
            .map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Default)]
struct PrimaryAcc {
    count: u64,
    reordered: u64,
    last_order_number: Option<u32>,
    cart_sum: u64,
}

#[derive(Default)]
struct ReorderAcc {
    days_sum: f64,
    count: u64,
}

struct Aggregated {
    user_id: UserId,
    product_id: ProductId,
    co_occurrence_count: u64,
    reorder_ratio: f64,
    last_order_number: u32,
    avg_cart_position: f64,
    avg_days_between_reorder: Option<f64>,
}

pub fn aggregate_customer_products(
    prior_with_timing: &[LineWithTiming],
    sentinel: f64,
) -> CustomerProductTable {
    let mut primary: BTreeMap<PairKey, PrimaryAcc> = BTreeMap::new();
    let mut reorders: BTreeMap<PairKey, ReorderAcc> = BTreeMap::new();

    for row in prior_with_timing {
        let key = (row.user_id, row.product_id);

        let acc = primary.entry(key).or_default();
        acc.count += 1;
        acc.cart_sum += row.add_to_cart_order as u64;
        if row.reordered {
            acc.reordered += 1;
        }
        if let Some(n) = row.order_number {
            acc.last_order_number = Some(acc.last_order_number.map_or(n, |cur| cur.max(n)));
        }

        if row.reordered {
            let r = reorders.entry(key).or_default();
            // Null gaps add nothing to the sum but still count as a reordered line.
            r.days_sum += row.days_since_prior_order.unwrap_or(0.0);
            r.count += 1;
        }
    }

    let merged = primary.into_iter().map(|((user_id, product_id), acc)| {
        let avg_days_between_reorder = reorders
            .get(&(user_id, product_id))
            .map(|r| r.days_sum / r.count as f64);
        Aggregated {
            user_id,
            product_id,
            co_occurrence_count: acc.count,
            reorder_ratio: acc.reordered as f64 / acc.count as f64,
            last_order_number: acc.last_order_number.unwrap_or(0),
            avg_cart_position: acc.cart_sum as f64 / acc.count as f64,
            avg_days_between_reorder,
        }
    });

    let table = impute_reorder_cycle(merged, sentinel);
    log::info!(
        "features: customer_product pairs={} sentinel_imputed={} (sentinel={})",
        table.len(),
        table.imputed_count,
        sentinel,
    );
    table
}

/// The one place an undefined reorder cycle becomes the sentinel.
fn impute_reorder_cycle<I>(rows: I, sentinel: f64) -> CustomerProductTable
where
    I: Iterator<Item = Aggregated>,
{
    let mut imputed_count = 0;
    let rows = rows
        .map(|a| {
            let (avg_days_between_reorder, reorder_cycle_observed) = match a.avg_days_between_reorder {
                Some(days) => (days, true),
                None => {
                    imputed_count += 1;
                    (sentinel, false)
                }
            };
            (
                (a.user_id, a.product_id),
                CustomerProductFeatures {
                    user_id: a.user_id,
                    product_id: a.product_id,
                    co_occurrence_count: a.co_occurrence_count,
                    reorder_ratio: a.reorder_ratio,
                    last_order_number: a.last_order_number,
                    avg_cart_position: a.avg_cart_position,
                    avg_days_between_reorder,
                    reorder_cycle_observed,
                },
            )
        })
        .collect();

    CustomerProductTable {
        rows,
        imputed_count,
        sentinel,
    }
}
