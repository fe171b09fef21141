//! The batch pipeline: raw records in, targeting list out.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Join           prior/train lines annotated with user and timing
//!   2. Aggregate      customer, product, customer×product tables
//!   3. Sample         positives + seeded negative draw, features joined
//!   4. Split          seeded train / holdout partition
//!   5. Cap            bounds fitted on the train partition, then frozen
//!   6. Fit            classifier on the capped train partition
//!   7. Evaluate       holdout metrics and error analysis
//!   8. Score          test-order population ranked per order
//!
//! RULES:
//!   - Each stage takes its inputs as arguments and returns a new value.
//!   - All randomness flows through the RngBank.
//!   - Every stage emits exactly one StageReport (Capped emits per partition).

use crate::{
    capping::CapModel,
    config::PipelineConfig,
    error::{PipelineError, PipelineResult},
    error_analysis::{analyze_errors, ErrorAnalysis},
    features::{
        aggregate_customer_products, aggregate_customers, aggregate_products, FeatureTables,
        FeatureVector,
    },
    join::{join_records, JoinedTables},
    metrics::{evaluate, Evaluation},
    model::{BinaryClassifier, N_INPUTS},
    records::{EvalSet, RecordStore},
    report::{StageReport, StageReportEntry},
    rng::{RngBank, StageSlot},
    sampling::{build_training_set, TrainingExample, TrainingSet},
    scoring::{assemble_targeting, scoring_population, TargetingList},
    split::split_holdout,
    store::ReorderStore,
    types::RunId,
};

/// Everything a run produced, stage by stage.
#[derive(Debug)]
pub struct PipelineRun {
    pub run_id: RunId,
    pub joined: JoinedTables,
    pub tables: FeatureTables,
    pub training: TrainingSet,
    /// Capped train partition.
    pub train: Vec<TrainingExample>,
    /// Capped holdout partition.
    pub holdout: Vec<TrainingExample>,
    pub caps: CapModel,
    pub evaluation: Option<Evaluation>,
    pub errors: Option<ErrorAnalysis>,
    pub targeting: TargetingList,
    pub reports: Vec<StageReport>,
}

/// A fresh run id: `run-<seed>-<uuid>`.
pub fn new_run_id(seed: u64) -> RunId {
    format!("run-{seed}-{}", uuid::Uuid::new_v4())
}

pub struct ReorderPipeline<'s> {
    pub run_id: RunId,
    pub config: PipelineConfig,
    rng_bank: RngBank,
    store: Option<&'s ReorderStore>,
    reports: Vec<StageReport>,
}

impl<'s> ReorderPipeline<'s> {
    pub fn new(run_id: RunId, config: PipelineConfig) -> Self {
        Self {
            rng_bank: RngBank::new(config.seed),
            run_id,
            config,
            store: None,
            reports: Vec::new(),
        }
    }

    /// Persist stage reports, capping bounds and the targeting list.
    /// The run row must already exist in the store.
    pub fn with_store(mut self, store: &'s ReorderStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Join and aggregate. Shared by training and scoring.
    pub fn build_features(&mut self, records: &RecordStore) -> PipelineResult<(JoinedTables, FeatureTables)> {
        let joined = join_records(records);
        self.emit(StageReport::Joined {
            report: joined.report.clone(),
        })?;

        let customers = aggregate_customers(
            &joined.prior_with_user,
            records.orders_in(&[EvalSet::Prior, EvalSet::Train]),
        );
        self.emit(StageReport::CustomersAggregated {
            customers: customers.len(),
            undefined_avg_days: customers
                .values()
                .filter(|c| c.avg_days_between_orders.is_none())
                .count(),
        })?;

        let products = aggregate_products(&joined.prior_with_user);
        self.emit(StageReport::ProductsAggregated {
            products: products.len(),
        })?;

        let pairs = aggregate_customer_products(
            &joined.prior_with_timing,
            self.config.reorder_cycle_sentinel,
        );
        self.emit(StageReport::PairsAggregated {
            pairs: pairs.len(),
            sentinel_imputed: pairs.imputed_count,
            sentinel: pairs.sentinel,
        })?;

        Ok((
            joined,
            FeatureTables {
                customers,
                products,
                pairs,
            },
        ))
    }

    /// Run every stage in order.
    pub fn run<C: BinaryClassifier + ?Sized>(
        mut self,
        records: &RecordStore,
        classifier: &mut C,
    ) -> PipelineResult<PipelineRun> {
        self.emit(StageReport::RunStarted {
            run_id: self.run_id.clone(),
            seed: self.config.seed,
        })?;

        let (joined, tables) = self.build_features(records)?;

        let mut sampling_rng = self.rng_bank.for_stage(StageSlot::NegativeSampling);
        let training = build_training_set(
            &joined.train_with_user,
            &tables,
            self.config.negative_ratio,
            &mut sampling_rng,
        );
        self.emit(StageReport::Sampled {
            sampling: training.sampling.clone(),
            fill: training.fill.clone(),
        })?;
        if training.examples.is_empty() {
            return Err(PipelineError::EmptyTrainingSet);
        }

        let mut split_rng = self.rng_bank.for_stage(StageSlot::HoldoutSplit);
        let (train_raw, holdout_raw) =
            split_holdout(&training.examples, self.config.holdout_fraction, &mut split_rng);
        self.emit(StageReport::Split {
            train_rows: train_raw.len(),
            holdout_rows: holdout_raw.len(),
        })?;

        let caps = CapModel::fit(
            train_raw.iter().map(|e| &e.features),
            &self.config.capped_features,
            self.config.cap_multiplier,
        )?;
        self.emit(StageReport::CapsFitted {
            multiplier: caps.multiplier,
            bounds: caps.bounds.clone(),
        })?;
        let train = self.cap_partition("train", &caps, train_raw)?;
        let holdout = self.cap_partition("holdout", &caps, holdout_raw)?;

        let x: Vec<[f64; N_INPUTS]> = train.iter().map(|e| e.features.model_inputs()).collect();
        let y: Vec<u8> = train.iter().map(|e| e.label).collect();
        classifier.fit(&x, &y)?;
        self.emit(StageReport::ModelFitted {
            model: classifier.name().to_string(),
            rows: x.len(),
        })?;

        let (evaluation, errors) = if holdout.is_empty() {
            log::warn!("pipeline: holdout is empty, skipping evaluation");
            (None, None)
        } else {
            let probs = holdout
                .iter()
                .map(|e| classifier.predict_proba(&e.features.model_inputs()))
                .collect::<PipelineResult<Vec<f64>>>()?;
            let labels: Vec<u8> = holdout.iter().map(|e| e.label).collect();
            let evaluation = evaluate(
                &probs,
                &labels,
                self.config.decision_threshold,
                &self.config.threshold_grid,
            );
            self.emit(StageReport::Evaluated {
                evaluation: evaluation.clone(),
            })?;

            let errors = analyze_errors(
                &holdout,
                &probs,
                self.config.decision_threshold,
                records,
                self.config.error_analysis_top_n,
            );
            self.emit(StageReport::ErrorsAnalyzed {
                false_positives: errors.false_positives.len(),
                false_negatives: errors.false_negatives.len(),
            })?;
            (Some(evaluation), Some(errors))
        };

        let candidates = scoring_population(records, &tables);
        let targeting = assemble_targeting(
            &candidates,
            &tables,
            &caps,
            &*classifier,
            self.config.decision_threshold,
            records,
        )?;
        self.emit(StageReport::Scored {
            report: targeting.report.clone(),
        })?;

        if let Some(store) = self.store {
            store.save_capping_bounds(&self.run_id, &caps)?;
            store.save_targeting(&self.run_id, &targeting)?;
        }

        self.emit(StageReport::RunCompleted {
            run_id: self.run_id.clone(),
        })?;

        Ok(PipelineRun {
            run_id: self.run_id,
            joined,
            tables,
            training,
            train,
            holdout,
            caps,
            evaluation,
            errors,
            targeting,
            reports: self.reports,
        })
    }

    fn cap_partition(
        &mut self,
        partition: &str,
        caps: &CapModel,
        rows: Vec<TrainingExample>,
    ) -> PipelineResult<Vec<TrainingExample>> {
        let vectors: Vec<FeatureVector> = rows.iter().map(|e| e.features.clone()).collect();
        let (capped, report) = caps.apply(&vectors);
        for f in &report.features {
            log::info!(
                "capping: {partition} {} upper={:.4} affected={}",
                f.feature.name(),
                f.upper_bound,
                f.affected_rows,
            );
        }
        self.emit(StageReport::Capped {
            partition: partition.to_string(),
            report,
        })?;
        Ok(rows
            .into_iter()
            .zip(capped)
            .map(|(example, features)| TrainingExample { features, ..example })
            .collect())
    }

    fn emit(&mut self, report: StageReport) -> PipelineResult<()> {
        log::debug!("pipeline: stage={} run={}", report.stage_name(), self.run_id);
        if let Some(store) = self.store {
            let entry = StageReportEntry::from_report(&self.run_id, self.reports.len() as u32, &report)?;
            store.append_stage_report(&entry)?;
        }
        self.reports.push(report);
        Ok(())
    }
}
