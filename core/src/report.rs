//! Stage reports: one event per pipeline stage boundary.
//!
//! RULE: every data-quality observation (drops, fills, shortfalls,
//! capped rows) is reported at the stage where it happens, so a 0-filled
//! training row can always be traced to its cause.
//! Variants are appended, never removed or reordered.

use crate::{
    capping::{CapBound, CappingReport},
    features::FillReport,
    join::JoinReport,
    metrics::Evaluation,
    sampling::SamplingReport,
    scoring::ScoringReport,
    types::RunId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageReport {
    RunStarted {
        run_id: RunId,
        seed: u64,
    },
    Joined {
        report: JoinReport,
    },
    CustomersAggregated {
        customers: usize,
        undefined_avg_days: usize,
    },
    ProductsAggregated {
        products: usize,
    },
    PairsAggregated {
        pairs: usize,
        sentinel_imputed: usize,
        sentinel: f64,
    },
    Sampled {
        sampling: SamplingReport,
        fill: FillReport,
    },
    Split {
        train_rows: usize,
        holdout_rows: usize,
    },
    CapsFitted {
        multiplier: f64,
        bounds: Vec<CapBound>,
    },
    Capped {
        partition: String,
        report: CappingReport,
    },
    ModelFitted {
        model: String,
        rows: usize,
    },
    Evaluated {
        evaluation: Evaluation,
    },
    ErrorsAnalyzed {
        false_positives: usize,
        false_negatives: usize,
    },
    Scored {
        report: ScoringReport,
    },
    RunCompleted {
        run_id: RunId,
    },
}

impl StageReport {
    /// Stable name for the stage column.
    pub fn stage_name(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::Joined { .. } => "joined",
            Self::CustomersAggregated { .. } => "customers_aggregated",
            Self::ProductsAggregated { .. } => "products_aggregated",
            Self::PairsAggregated { .. } => "pairs_aggregated",
            Self::Sampled { .. } => "sampled",
            Self::Split { .. } => "split",
            Self::CapsFitted { .. } => "caps_fitted",
            Self::Capped { .. } => "capped",
            Self::ModelFitted { .. } => "model_fitted",
            Self::Evaluated { .. } => "evaluated",
            Self::ErrorsAnalyzed { .. } => "errors_analyzed",
            Self::Scored { .. } => "scored",
            Self::RunCompleted { .. } => "run_completed",
        }
    }
}

/// A persisted stage report row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageReportEntry {
    pub run_id: RunId,
    pub seq: u32,
    pub stage: String,
    pub payload: String,
}

impl StageReportEntry {
    pub fn from_report(run_id: &str, seq: u32, report: &StageReport) -> serde_json::Result<Self> {
        Ok(Self {
            run_id: run_id.to_string(),
            seq,
            stage: report.stage_name().to_string(),
            payload: serde_json::to_string(report)?,
        })
    }

    pub fn decode(&self) -> serde_json::Result<StageReport> {
        serde_json::from_str(&self.payload)
    }
}
