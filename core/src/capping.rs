//! One-sided IQR capping.
//!
//! Bounds are fitted once on the training rows and frozen in a CapModel.
//! The same CapModel is applied verbatim to holdout and scoring rows.
//! Values above Q3 + k * IQR become exactly that bound; nothing is
//! raised from below.

use crate::{
    error::{PipelineError, PipelineResult},
    features::{Feature, FeatureVector},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapBound {
    pub feature: Feature,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub upper_bound: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapModel {
    pub multiplier: f64,
    pub bounds: Vec<CapBound>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureCapReport {
    pub feature: Feature,
    pub upper_bound: f64,
    pub affected_rows: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CappingReport {
    pub rows: usize,
    pub features: Vec<FeatureCapReport>,
}

impl CappingReport {
    pub fn affected(&self, feature: Feature) -> usize {
        self.features
            .iter()
            .find(|f| f.feature == feature)
            .map(|f| f.affected_rows)
            .unwrap_or(0)
    }
}

impl CapModel {
    /// Fit one bound per feature from the current rows.
    pub fn fit<'a, I>(rows: I, features: &[Feature], multiplier: f64) -> PipelineResult<Self>
    where
        I: IntoIterator<Item = &'a FeatureVector>,
    {
        let rows: Vec<&FeatureVector> = rows.into_iter().collect();
        if rows.is_empty() {
            return Err(PipelineError::EmptyTrainingSet);
        }

        let mut bounds = Vec::with_capacity(features.len());
        for &feature in features {
            let mut values: Vec<f64> = rows.iter().map(|r| r.get(feature)).collect();
            values.sort_by(f64::total_cmp);
            let q1 = quantile_sorted(&values, 0.25);
            let q3 = quantile_sorted(&values, 0.75);
            let iqr = q3 - q1;
            let upper_bound = q3 + multiplier * iqr;
            log::debug!(
                "capping: {} q1={q1:.4} q3={q3:.4} iqr={iqr:.4} upper={upper_bound:.4}",
                feature.name()
            );
            bounds.push(CapBound {
                feature,
                q1,
                q3,
                iqr,
                upper_bound,
            });
        }

        Ok(Self { multiplier, bounds })
    }

    pub fn bound(&self, feature: Feature) -> Option<&CapBound> {
        self.bounds.iter().find(|b| b.feature == feature)
    }

    /// Return capped copies of `rows` and a per-feature count of changes.
    pub fn apply(&self, rows: &[FeatureVector]) -> (Vec<FeatureVector>, CappingReport) {
        let mut counts = vec![0usize; self.bounds.len()];
        let capped: Vec<FeatureVector> = rows
            .iter()
            .map(|row| {
                let mut out = row.clone();
                for (bound, count) in self.bounds.iter().zip(counts.iter_mut()) {
                    if out.get(bound.feature) > bound.upper_bound {
                        out.set(bound.feature, bound.upper_bound);
                        *count += 1;
                    }
                }
                out
            })
            .collect();

        let report = CappingReport {
            rows: rows.len(),
            features: self
                .bounds
                .iter()
                .zip(counts)
                .map(|(b, affected_rows)| FeatureCapReport {
                    feature: b.feature,
                    upper_bound: b.upper_bound,
                    affected_rows,
                })
                .collect(),
        };
        (capped, report)
    }
}

/// Linear interpolation between order statistics (h = (n - 1) * q).
/// `sorted` must be non-empty and ascending.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    let frac = h - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_matches_linear_interpolation() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile_sorted(&v, 0.0), 1.0);
        assert_eq!(quantile_sorted(&v, 0.5), 3.0);
        assert_eq!(quantile_sorted(&v, 1.0), 5.0);
        assert_eq!(quantile_sorted(&v, 0.25), 2.0);

        let even = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile_sorted(&even, 0.25) - 1.75).abs() < 1e-12);
        assert!((quantile_sorted(&even, 0.75) - 3.25).abs() < 1e-12);
    }

    #[test]
    fn single_value_quantile() {
        assert_eq!(quantile_sorted(&[7.0], 0.25), 7.0);
        assert_eq!(quantile_sorted(&[7.0], 0.75), 7.0);
    }
}
