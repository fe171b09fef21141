//! Label construction and negative sampling.
//!
//! STAGES (each returns a new immutable value):
//!   1. positive_set     distinct (user, product) pairs in the train orders
//!   2. negative_pool    pairs with prior history that are not positive
//!   3. sample_negatives draw without replacement from the pool
//!
//! The training table is positives followed by the drawn negatives,
//! with features joined through FeatureTables::join.

use crate::{
    features::{CustomerProductTable, FeatureTables, FeatureVector, FillReport},
    join::LineWithUser,
    rng::IndexSource,
    types::{PairKey, ProductId, UserId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingExample {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub label: u8,
    pub features: FeatureVector,
}

impl TrainingExample {
    pub fn key(&self) -> PairKey {
        (self.user_id, self.product_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SamplingReport {
    pub positives: usize,
    pub pool_size: usize,
    pub requested_negatives: usize,
    pub drawn_negatives: usize,
    /// drawn_negatives / positives. 0 when there are no positives.
    pub achieved_ratio: f64,
    pub shortfall: usize,
}

#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub examples: Vec<TrainingExample>,
    pub sampling: SamplingReport,
    pub fill: FillReport,
}

impl TrainingSet {
    pub fn positives(&self) -> impl Iterator<Item = &TrainingExample> {
        self.examples.iter().filter(|e| e.label == 1)
    }

    pub fn negatives(&self) -> impl Iterator<Item = &TrainingExample> {
        self.examples.iter().filter(|e| e.label == 0)
    }
}

/// Distinct pairs present in the train orders. Label is presence, not count.
pub fn positive_set(train_with_user: &[LineWithUser]) -> BTreeSet<PairKey> {
    train_with_user
        .iter()
        .map(|row| (row.user_id, row.product_id))
        .collect()
}

/// Pairs with prior history that did not show up in the train orders.
pub fn negative_pool(pairs: &CustomerProductTable, positives: &BTreeSet<PairKey>) -> Vec<PairKey> {
    pairs
        .keys()
        .filter(|key| !positives.contains(*key))
        .copied()
        .collect()
}

/// Draw `min(n, pool.len())` pairs without replacement (partial Fisher-Yates).
pub fn sample_negatives<R: IndexSource + ?Sized>(
    pool: &[PairKey],
    n: usize,
    rng: &mut R,
) -> Vec<PairKey> {
    let take = n.min(pool.len());
    let mut scratch = pool.to_vec();
    for i in 0..take {
        let j = i + rng.next_index_below(scratch.len() - i);
        scratch.swap(i, j);
    }
    scratch.truncate(take);
    scratch
}

/// Negatives requested for a given positive count.
pub fn requested_negatives(positives: usize, negative_ratio: f64) -> usize {
    (positives as f64 * negative_ratio).round() as usize
}

/// Assemble the labelled training table from the train orders and the
/// aggregated feature tables.
pub fn build_training_set<R: IndexSource + ?Sized>(
    train_with_user: &[LineWithUser],
    tables: &FeatureTables,
    negative_ratio: f64,
    rng: &mut R,
) -> TrainingSet {
    let positives = positive_set(train_with_user);
    let pool = negative_pool(&tables.pairs, &positives);
    let requested = requested_negatives(positives.len(), negative_ratio);
    let negatives = sample_negatives(&pool, requested, rng);

    let sampling = SamplingReport {
        positives: positives.len(),
        pool_size: pool.len(),
        requested_negatives: requested,
        drawn_negatives: negatives.len(),
        achieved_ratio: if positives.is_empty() {
            0.0
        } else {
            negatives.len() as f64 / positives.len() as f64
        },
        shortfall: requested - negatives.len(),
    };

    if sampling.shortfall > 0 {
        log::warn!(
            "sampling: negative pool too small, requested={} drawn={} achieved_ratio={:.3}",
            sampling.requested_negatives,
            sampling.drawn_negatives,
            sampling.achieved_ratio,
        );
    } else {
        log::info!(
            "sampling: positives={} negatives={} pool={}",
            sampling.positives,
            sampling.drawn_negatives,
            sampling.pool_size,
        );
    }

    let labelled: Vec<(PairKey, u8)> = positives
        .iter()
        .map(|k| (*k, 1u8))
        .chain(negatives.iter().map(|k| (*k, 0u8)))
        .collect();

    let (vectors, fill) = tables.join(labelled.iter().map(|(k, _)| k));
    if fill.pair_missing > 0 {
        log::info!(
            "sampling: {} training rows have no prior co-occurrence, filled with 0",
            fill.pair_missing
        );
    }

    let examples = labelled
        .into_iter()
        .zip(vectors)
        .map(|((key, label), features)| TrainingExample {
            user_id: key.0,
            product_id: key.1,
            label,
            features,
        })
        .collect();

    TrainingSet {
        examples,
        sampling,
        fill,
    }
}
