//! Classifier seam.
//!
//! The pipeline only talks to BinaryClassifier. LogisticRegression is the
//! reference implementation used by the runner; any other model can be
//! dropped in as long as it consumes the four model inputs.

use crate::{
    config::ModelConfig,
    error::{PipelineError, PipelineResult},
};
use serde::{Deserialize, Serialize};

pub const N_INPUTS: usize = 4;

pub trait BinaryClassifier {
    /// Stable name for reports.
    fn name(&self) -> &'static str;

    fn fit(&mut self, x: &[[f64; N_INPUTS]], y: &[u8]) -> PipelineResult<()>;

    /// Probability of the positive class.
    fn predict_proba(&self, x: &[f64; N_INPUTS]) -> PipelineResult<f64>;
}

/// Batch gradient-descent logistic regression on standardised inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    config: ModelConfig,
    weights: [f64; N_INPUTS],
    bias: f64,
    means: [f64; N_INPUTS],
    scales: [f64; N_INPUTS],
    fitted: bool,
}

impl LogisticRegression {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            weights: [0.0; N_INPUTS],
            bias: 0.0,
            means: [0.0; N_INPUTS],
            scales: [1.0; N_INPUTS],
            fitted: false,
        }
    }

    /// Weights in standardised units.
    pub fn weights(&self) -> &[f64; N_INPUTS] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    fn standardise(&self, x: &[f64; N_INPUTS]) -> [f64; N_INPUTS] {
        let mut z = [0.0; N_INPUTS];
        for i in 0..N_INPUTS {
            z[i] = (x[i] - self.means[i]) / self.scales[i];
        }
        z
    }

    fn logit(&self, z: &[f64; N_INPUTS]) -> f64 {
        self.weights
            .iter()
            .zip(z.iter())
            .map(|(w, v)| w * v)
            .sum::<f64>()
            + self.bias
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl BinaryClassifier for LogisticRegression {
    fn name(&self) -> &'static str {
        "logistic_regression"
    }

    fn fit(&mut self, x: &[[f64; N_INPUTS]], y: &[u8]) -> PipelineResult<()> {
        if x.is_empty() {
            return Err(PipelineError::EmptyTrainingSet);
        }
        if x.len() != y.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: x.len(),
                actual: y.len(),
            });
        }

        let n = x.len() as f64;
        for i in 0..N_INPUTS {
            let mean = x.iter().map(|r| r[i]).sum::<f64>() / n;
            let var = x.iter().map(|r| (r[i] - mean).powi(2)).sum::<f64>() / n;
            self.means[i] = mean;
            // Constant columns stay unscaled.
            self.scales[i] = if var > 1e-12 { var.sqrt() } else { 1.0 };
        }

        let z: Vec<[f64; N_INPUTS]> = x.iter().map(|r| self.standardise(r)).collect();
        self.weights = [0.0; N_INPUTS];
        self.bias = 0.0;

        let lr = self.config.learning_rate;
        let l2 = self.config.l2;
        for _ in 0..self.config.epochs {
            let mut grad_w = [0.0; N_INPUTS];
            let mut grad_b = 0.0;
            for (row, &label) in z.iter().zip(y) {
                let err = sigmoid(self.logit(row)) - label as f64;
                for i in 0..N_INPUTS {
                    grad_w[i] += err * row[i];
                }
                grad_b += err;
            }
            for i in 0..N_INPUTS {
                self.weights[i] -= lr * (grad_w[i] / n + l2 * self.weights[i]);
            }
            self.bias -= lr * grad_b / n;
        }

        self.fitted = true;
        log::info!(
            "model: {} fitted rows={} weights={:?} bias={:.4}",
            self.name(),
            x.len(),
            self.weights,
            self.bias,
        );
        Ok(())
    }

    fn predict_proba(&self, x: &[f64; N_INPUTS]) -> PipelineResult<f64> {
        if !self.fitted {
            return Err(PipelineError::ModelNotFitted);
        }
        Ok(sigmoid(self.logit(&self.standardise(x))))
    }
}
