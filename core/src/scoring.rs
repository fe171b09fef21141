//! Scoring and targeting.
//!
//! Reuses the training-time feature tables and the frozen CapModel as-is.
//! Nothing is re-aggregated here.

use crate::{
    capping::{CapModel, CappingReport},
    error::PipelineResult,
    features::{FeatureTables, FillReport},
    model::BinaryClassifier,
    records::{EvalSet, RecordStore},
    types::{OrderId, PairKey, ProductId, UserId},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, io::Write};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoringCandidate {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub product_id: ProductId,
}

impl ScoringCandidate {
    pub fn key(&self) -> PairKey {
        (self.user_id, self.product_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetingEntry {
    pub order_id: OrderId,
    pub user_id: UserId,
    /// 1-based position within the order, by descending probability.
    pub rank: u32,
    pub product_id: ProductId,
    pub product_name: String,
    pub probability: f64,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderTargets {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub entries: Vec<TargetingEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoringReport {
    pub candidates: usize,
    pub orders: usize,
    pub selected: usize,
    pub threshold: f64,
    pub unknown_products: usize,
    pub fill: FillReport,
    pub capping: CappingReport,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TargetingList {
    pub orders: Vec<OrderTargets>,
    pub report: ScoringReport,
}

impl TargetingList {
    pub fn entries(&self) -> impl Iterator<Item = &TargetingEntry> {
        self.orders.iter().flat_map(|o| o.entries.iter())
    }

    pub fn selected(&self) -> impl Iterator<Item = &TargetingEntry> {
        self.entries().filter(|e| e.selected)
    }
}

/// Every product a user has bought before, for each of that user's open
/// (test) orders.
pub fn scoring_population(records: &RecordStore, tables: &FeatureTables) -> Vec<ScoringCandidate> {
    let candidates: Vec<ScoringCandidate> = records
        .orders_in(&[EvalSet::Test])
        .flat_map(move |order| {
            tables
                .pairs
                .pairs_for_user(order.user_id)
                .map(move |&(user_id, product_id)| ScoringCandidate {
                    order_id: order.order_id,
                    user_id,
                    product_id,
                })
        })
        .collect();
    log::info!("scoring: population candidates={}", candidates.len());
    candidates
}

/// Feature-join, cap, score, threshold, and rank `candidates`.
pub fn assemble_targeting<C: BinaryClassifier + ?Sized>(
    candidates: &[ScoringCandidate],
    tables: &FeatureTables,
    caps: &CapModel,
    classifier: &C,
    threshold: f64,
    records: &RecordStore,
) -> PipelineResult<TargetingList> {
    let keys: Vec<PairKey> = candidates.iter().map(|c| c.key()).collect();
    let (vectors, fill) = tables.join(&keys);
    let (capped, capping) = caps.apply(&vectors);

    let mut unknown_products = 0;
    let mut grouped: BTreeMap<OrderId, OrderTargets> = BTreeMap::new();
    for (candidate, features) in candidates.iter().zip(&capped) {
        let probability = classifier.predict_proba(&features.model_inputs())?;
        let product_name = match records.product(candidate.product_id) {
            Some(p) => p.product_name.clone(),
            None => {
                unknown_products += 1;
                String::new()
            }
        };
        grouped
            .entry(candidate.order_id)
            .or_insert_with(|| OrderTargets {
                order_id: candidate.order_id,
                user_id: candidate.user_id,
                entries: Vec::new(),
            })
            .entries
            .push(TargetingEntry {
                order_id: candidate.order_id,
                user_id: candidate.user_id,
                rank: 0,
                product_id: candidate.product_id,
                product_name,
                probability,
                selected: probability >= threshold,
            });
    }

    let mut orders: Vec<OrderTargets> = grouped.into_values().collect();
    for order in &mut orders {
        order.entries.sort_by(|a, b| {
            b.probability
                .total_cmp(&a.probability)
                .then(a.product_id.cmp(&b.product_id))
        });
        for (i, entry) in order.entries.iter_mut().enumerate() {
            entry.rank = i as u32 + 1;
        }
    }

    let selected = orders
        .iter()
        .flat_map(|o| o.entries.iter())
        .filter(|e| e.selected)
        .count();
    if unknown_products > 0 {
        log::warn!("scoring: {unknown_products} candidates reference unknown products");
    }
    log::info!(
        "scoring: orders={} candidates={} selected={} threshold={threshold:.2}",
        orders.len(),
        candidates.len(),
        selected,
    );

    Ok(TargetingList {
        report: ScoringReport {
            candidates: candidates.len(),
            orders: orders.len(),
            selected,
            threshold,
            unknown_products,
            fill,
            capping,
        },
        orders,
    })
}

const CSV_HEADER: [&str; 7] = [
    "order_id",
    "user_id",
    "rank",
    "product_id",
    "product_name",
    "probability",
    "selected",
];

/// One exported targeting row. Booleans go out as 0/1.
#[derive(Debug, Serialize)]
struct TargetingRow<'a> {
    order_id: OrderId,
    user_id: UserId,
    rank: u32,
    product_id: ProductId,
    product_name: &'a str,
    probability: String,
    selected: u8,
}

/// Write the targeting list with a header row. The caller owns flushing.
///
/// `writer` is expected to have headers enabled (the csv default); the
/// header is derived from the first serialized row.
pub fn write_targeting_csv<W: Write>(
    list: &TargetingList,
    writer: &mut csv::Writer<W>,
) -> PipelineResult<()> {
    if list.entries().next().is_none() {
        writer.write_record(CSV_HEADER)?;
        return Ok(());
    }
    for e in list.entries() {
        writer.serialize(TargetingRow {
            order_id: e.order_id,
            user_id: e.user_id,
            rank: e.rank,
            product_id: e.product_id,
            product_name: &e.product_name,
            probability: format!("{:.6}", e.probability),
            selected: u8::from(e.selected),
        })?;
    }
    Ok(())
}
