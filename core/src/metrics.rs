//! Holdout evaluation: confusion matrix, ROC AUC, threshold sweep.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    /// Predict positive when probability >= threshold.
    pub fn at_threshold(probs: &[f64], labels: &[u8], threshold: f64) -> Self {
        let mut m = Self::default();
        for (&p, &y) in probs.iter().zip(labels) {
            match (p >= threshold, y == 1) {
                (true, true) => m.true_positive += 1,
                (true, false) => m.false_positive += 1,
                (false, false) => m.true_negative += 1,
                (false, true) => m.false_negative += 1,
            }
        }
        m
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total())
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Area under the ROC curve via the rank-sum statistic.
/// Tied scores share their average rank. None when a class is absent.
pub fn roc_auc(probs: &[f64], labels: &[u8]) -> Option<f64> {
    let n = probs.len().min(labels.len());
    let positives = labels[..n].iter().filter(|&&y| y == 1).count();
    let negatives = n - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| probs[a].total_cmp(&probs[b]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && probs[order[j + 1]] == probs[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; the tie group i..=j shares their mean.
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if labels[idx] == 1 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    let u = rank_sum_pos - p * (p + 1.0) / 2.0;
    Some(u / (p * negatives as f64))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdPoint {
    pub threshold: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub predicted_positive: usize,
}

pub fn threshold_sweep(probs: &[f64], labels: &[u8], grid: &[f64]) -> Vec<ThresholdPoint> {
    grid.iter()
        .map(|&threshold| {
            let m = ConfusionMatrix::at_threshold(probs, labels, threshold);
            ThresholdPoint {
                threshold,
                precision: m.precision(),
                recall: m.recall(),
                f1: m.f1(),
                predicted_positive: m.true_positive + m.false_positive,
            }
        })
        .collect()
}

/// Highest-F1 point; the lower threshold wins a tie.
pub fn best_threshold_by_f1(sweep: &[ThresholdPoint]) -> Option<&ThresholdPoint> {
    sweep.iter().fold(None, |best: Option<&ThresholdPoint>, p| match best {
        Some(b) if b.f1 > p.f1 || (b.f1 == p.f1 && b.threshold <= p.threshold) => Some(b),
        _ => Some(p),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evaluation {
    pub rows: usize,
    pub threshold: f64,
    pub confusion: ConfusionMatrix,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub accuracy: f64,
    pub roc_auc: Option<f64>,
    pub sweep: Vec<ThresholdPoint>,
    pub best_f1_threshold: Option<f64>,
}

pub fn evaluate(probs: &[f64], labels: &[u8], threshold: f64, grid: &[f64]) -> Evaluation {
    let confusion = ConfusionMatrix::at_threshold(probs, labels, threshold);
    let sweep = threshold_sweep(probs, labels, grid);
    let best_f1_threshold = best_threshold_by_f1(&sweep).map(|p| p.threshold);
    Evaluation {
        rows: probs.len(),
        threshold,
        confusion,
        precision: confusion.precision(),
        recall: confusion.recall(),
        f1: confusion.f1(),
        accuracy: confusion.accuracy(),
        roc_auc: roc_auc(probs, labels),
        sweep,
        best_f1_threshold,
    }
}
