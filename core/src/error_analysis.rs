//! Misclassification breakdown by product and category.

use crate::{
    records::RecordStore,
    sampling::TrainingExample,
    types::{ProductId, UserId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const UNKNOWN_NAME: &str = "unknown";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorCase {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub product_name: String,
    pub category_name: String,
    pub probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryCount {
    pub category_name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorAnalysis {
    pub threshold: f64,
    /// Most confident mistakes first.
    pub false_positives: Vec<ErrorCase>,
    /// Least confident misses first.
    pub false_negatives: Vec<ErrorCase>,
    pub top_false_positive_categories: Vec<CategoryCount>,
    pub top_false_negative_categories: Vec<CategoryCount>,
}

pub fn analyze_errors(
    examples: &[TrainingExample],
    probs: &[f64],
    threshold: f64,
    records: &RecordStore,
    top_n: usize,
) -> ErrorAnalysis {
    let mut false_positives = Vec::new();
    let mut false_negatives = Vec::new();

    for (example, &p) in examples.iter().zip(probs) {
        let predicted = p >= threshold;
        let actual = example.label == 1;
        if predicted == actual {
            continue;
        }
        let case = ErrorCase {
            user_id: example.user_id,
            product_id: example.product_id,
            product_name: records
                .product(example.product_id)
                .map(|prod| prod.product_name.clone())
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            category_name: records
                .category_of(example.product_id)
                .map(|c| c.category_name.clone())
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            probability: p,
        };
        if predicted {
            false_positives.push(case);
        } else {
            false_negatives.push(case);
        }
    }

    false_positives.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    false_negatives.sort_by(|a, b| a.probability.total_cmp(&b.probability));

    let analysis = ErrorAnalysis {
        threshold,
        top_false_positive_categories: top_categories(&false_positives, top_n),
        top_false_negative_categories: top_categories(&false_negatives, top_n),
        false_positives,
        false_negatives,
    };

    log::info!(
        "error_analysis: false_positives={} false_negatives={} at threshold={threshold:.2}",
        analysis.false_positives.len(),
        analysis.false_negatives.len(),
    );
    analysis
}

/// Categories by descending count; names break ties alphabetically.
fn top_categories(cases: &[ErrorCase], top_n: usize) -> Vec<CategoryCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for case in cases {
        *counts.entry(case.category_name.as_str()).or_default() += 1;
    }
    let mut ranked: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(name, count)| CategoryCount {
            category_name: name.to_string(),
            count,
        })
        .collect();
    // Stable sort keeps the BTreeMap's alphabetical order within equal counts.
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(top_n);
    ranked
}
