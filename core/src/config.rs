use crate::features::Feature;
use serde::{Deserialize, Serialize};

/// Hyperparameters for the reference logistic-regression classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 500,
            l2: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Master seed. Every random stage derives its stream from this.
    pub seed: u64,
    /// Negatives drawn per positive example.
    pub negative_ratio: f64,
    pub decision_threshold: f64,
    /// Stand-in for avg_days_between_reorder when a pair was never reordered.
    pub reorder_cycle_sentinel: f64,
    /// IQR multiplier for the upper capping bound.
    pub cap_multiplier: f64,
    pub capped_features: Vec<Feature>,
    /// Share of the training table held out for evaluation.
    pub holdout_fraction: f64,
    pub threshold_grid: Vec<f64>,
    pub error_analysis_top_n: usize,
    pub model: ModelConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: 22,
            negative_ratio: 1.0,
            decision_threshold: 0.40,
            reorder_cycle_sentinel: 30.0,
            cap_multiplier: 1.5,
            capped_features: Feature::MODEL_INPUTS.to_vec(),
            holdout_fraction: 0.2,
            threshold_grid: (2..=18).map(|i| i as f64 * 0.05).collect(),
            error_analysis_top_n: 10,
            model: ModelConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file. Missing fields fall back to defaults.
    /// In tests, use PipelineConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with a small holdout and a short training schedule.
    pub fn default_test() -> Self {
        Self {
            holdout_fraction: 0.25,
            model: ModelConfig {
                learning_rate: 0.5,
                epochs: 200,
                l2: 0.0,
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.negative_ratio > 0.0) {
            anyhow::bail!("negative_ratio must be > 0, got {}", self.negative_ratio);
        }
        if !(self.decision_threshold > 0.0 && self.decision_threshold < 1.0) {
            anyhow::bail!(
                "decision_threshold must be in (0, 1), got {}",
                self.decision_threshold
            );
        }
        if !(self.cap_multiplier >= 0.0) {
            anyhow::bail!("cap_multiplier must be >= 0, got {}", self.cap_multiplier);
        }
        if !(0.0..1.0).contains(&self.holdout_fraction) {
            anyhow::bail!(
                "holdout_fraction must be in [0, 1), got {}",
                self.holdout_fraction
            );
        }
        if !self.reorder_cycle_sentinel.is_finite() {
            anyhow::bail!("reorder_cycle_sentinel must be finite");
        }
        if self.capped_features.is_empty() {
            anyhow::bail!("capped_features must name at least one feature");
        }
        if let Some(t) = self
            .threshold_grid
            .iter()
            .find(|t| !(t.is_finite() && **t > 0.0 && **t < 1.0))
        {
            anyhow::bail!("threshold_grid values must be in (0, 1), got {t}");
        }
        if self.model.epochs == 0 || !(self.model.learning_rate > 0.0) {
            anyhow::bail!("model needs epochs > 0 and learning_rate > 0");
        }
        Ok(())
    }
}
