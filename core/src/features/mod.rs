//! Feature aggregators and the three-table feature join.
//!
//! Each aggregator is a pure function over a joined working table and
//! returns a keyed table. The join below is the single place where
//! absent values become 0.0, so every 0-filled field can be traced back
//! to a FillReport counter.

pub mod customer;
pub mod customer_product;
pub mod product;

pub use customer::{aggregate_customers, CustomerFeatures};
pub use customer_product::{
    aggregate_customer_products, CustomerProductFeatures, CustomerProductTable,
};
pub use product::{aggregate_products, ProductFeatures};

use crate::types::{PairKey, ProductId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every numeric column a training or scoring row carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    CustomerTotalLines,
    CustomerUniqueProducts,
    CustomerTotalOrders,
    CustomerAvgDaysBetweenOrders,
    ProductTotalPurchases,
    ProductReorderRate,
    CoOccurrenceCount,
    ReorderRatio,
    LastOrderNumber,
    AvgCartPosition,
    AvgDaysBetweenReorder,
}

impl Feature {
    /// Classifier inputs, in column order.
    pub const MODEL_INPUTS: [Feature; 4] = [
        Feature::CoOccurrenceCount,
        Feature::AvgDaysBetweenReorder,
        Feature::ProductReorderRate,
        Feature::CustomerAvgDaysBetweenOrders,
    ];

    pub const ALL: [Feature; 11] = [
        Feature::CustomerTotalLines,
        Feature::CustomerUniqueProducts,
        Feature::CustomerTotalOrders,
        Feature::CustomerAvgDaysBetweenOrders,
        Feature::ProductTotalPurchases,
        Feature::ProductReorderRate,
        Feature::CoOccurrenceCount,
        Feature::ReorderRatio,
        Feature::LastOrderNumber,
        Feature::AvgCartPosition,
        Feature::AvgDaysBetweenReorder,
    ];

    pub fn from_name(name: &str) -> Option<Feature> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CustomerTotalLines => "customer_total_lines",
            Self::CustomerUniqueProducts => "customer_unique_products",
            Self::CustomerTotalOrders => "customer_total_orders",
            Self::CustomerAvgDaysBetweenOrders => "customer_avg_days_between_orders",
            Self::ProductTotalPurchases => "product_total_purchases",
            Self::ProductReorderRate => "product_reorder_rate",
            Self::CoOccurrenceCount => "co_occurrence_count",
            Self::ReorderRatio => "reorder_ratio",
            Self::LastOrderNumber => "last_order_number",
            Self::AvgCartPosition => "avg_cart_position",
            Self::AvgDaysBetweenReorder => "avg_days_between_reorder",
        }
    }
}

/// Flat numeric row for one (user, product) pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeatureVector {
    pub customer_total_lines: f64,
    pub customer_unique_products: f64,
    pub customer_total_orders: f64,
    pub customer_avg_days_between_orders: f64,
    pub product_total_purchases: f64,
    pub product_reorder_rate: f64,
    pub co_occurrence_count: f64,
    pub reorder_ratio: f64,
    pub last_order_number: f64,
    pub avg_cart_position: f64,
    pub avg_days_between_reorder: f64,
}

impl FeatureVector {
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::CustomerTotalLines => self.customer_total_lines,
            Feature::CustomerUniqueProducts => self.customer_unique_products,
            Feature::CustomerTotalOrders => self.customer_total_orders,
            Feature::CustomerAvgDaysBetweenOrders => self.customer_avg_days_between_orders,
            Feature::ProductTotalPurchases => self.product_total_purchases,
            Feature::ProductReorderRate => self.product_reorder_rate,
            Feature::CoOccurrenceCount => self.co_occurrence_count,
            Feature::ReorderRatio => self.reorder_ratio,
            Feature::LastOrderNumber => self.last_order_number,
            Feature::AvgCartPosition => self.avg_cart_position,
            Feature::AvgDaysBetweenReorder => self.avg_days_between_reorder,
        }
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        let slot = match feature {
            Feature::CustomerTotalLines => &mut self.customer_total_lines,
            Feature::CustomerUniqueProducts => &mut self.customer_unique_products,
            Feature::CustomerTotalOrders => &mut self.customer_total_orders,
            Feature::CustomerAvgDaysBetweenOrders => &mut self.customer_avg_days_between_orders,
            Feature::ProductTotalPurchases => &mut self.product_total_purchases,
            Feature::ProductReorderRate => &mut self.product_reorder_rate,
            Feature::CoOccurrenceCount => &mut self.co_occurrence_count,
            Feature::ReorderRatio => &mut self.reorder_ratio,
            Feature::LastOrderNumber => &mut self.last_order_number,
            Feature::AvgCartPosition => &mut self.avg_cart_position,
            Feature::AvgDaysBetweenReorder => &mut self.avg_days_between_reorder,
        };
        *slot = value;
    }

    pub fn model_inputs(&self) -> [f64; 4] {
        Feature::MODEL_INPUTS.map(|f| self.get(f))
    }
}

/// Counts of fields that were filled with 0.0 during the feature join.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FillReport {
    pub rows: usize,
    pub customer_missing: usize,
    pub product_missing: usize,
    /// No prior co-occurrence for the pair.
    pub pair_missing: usize,
    /// Customer present but with no observed order gap.
    pub customer_gap_undefined: usize,
}

/// The three aggregated tables, reused as-is by training and scoring.
#[derive(Debug, Clone)]
pub struct FeatureTables {
    pub customers: BTreeMap<UserId, CustomerFeatures>,
    pub products: BTreeMap<ProductId, ProductFeatures>,
    pub pairs: CustomerProductTable,
}

impl FeatureTables {
    /// Left-join all three tables onto `keys`, filling anything absent with 0.0.
    pub fn join<'a, I>(&self, keys: I) -> (Vec<FeatureVector>, FillReport)
    where
        I: IntoIterator<Item = &'a PairKey>,
    {
        let mut report = FillReport::default();
        let rows: Vec<FeatureVector> = keys
            .into_iter()
            .map(|key| self.vector_for(key, &mut report))
            .collect();
        (rows, report)
    }

    fn vector_for(&self, &(user_id, product_id): &PairKey, report: &mut FillReport) -> FeatureVector {
        let mut v = FeatureVector::default();
        report.rows += 1;

        match self.customers.get(&user_id) {
            Some(c) => {
                v.customer_total_lines = c.total_line_count as f64;
                v.customer_unique_products = c.unique_product_count as f64;
                v.customer_total_orders = c.total_order_count as f64;
                match c.avg_days_between_orders {
                    Some(days) => v.customer_avg_days_between_orders = days,
                    None => report.customer_gap_undefined += 1,
                }
            }
            None => report.customer_missing += 1,
        }

        match self.products.get(&product_id) {
            Some(p) => {
                v.product_total_purchases = p.total_purchase_count as f64;
                v.product_reorder_rate = p.reorder_rate;
            }
            None => report.product_missing += 1,
        }

        match self.pairs.get(&(user_id, product_id)) {
            Some(cp) => {
                v.co_occurrence_count = cp.co_occurrence_count as f64;
                v.reorder_ratio = cp.reorder_ratio;
                v.last_order_number = cp.last_order_number as f64;
                v.avg_cart_position = cp.avg_cart_position;
                v.avg_days_between_reorder = cp.avg_days_between_reorder;
            }
            None => report.pair_missing += 1,
        }

        v
    }
}
