//! reorder-runner: headless batch run of the repeat-order pipeline.
//!
//! Usage:
//!   reorder-runner --db history.db
//!   reorder-runner --db history.db --config pipeline.json --seed 22 --threshold 0.4 --out targets.csv
//!   reorder-runner --db history.db --json

use anyhow::Result;
use reorder_core::{
    config::PipelineConfig,
    metrics::Evaluation,
    model::LogisticRegression,
    pipeline::{new_run_id, PipelineRun, ReorderPipeline},
    scoring::write_targeting_csv,
    store::ReorderStore,
};
use std::env;

/// Machine-readable run summary, printed with --json.
#[derive(serde::Serialize)]
struct RunSummary<'a> {
    run_id: &'a str,
    seed: u64,
    elapsed_ms: i64,
    positives: usize,
    negatives: usize,
    train_rows: usize,
    holdout_rows: usize,
    evaluation: Option<&'a Evaluation>,
    scored_orders: usize,
    selected: usize,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = arg_value(&args, "--db").unwrap_or("reorder.db");
    let out = arg_value(&args, "--out");
    let json = args.iter().any(|a| a == "--json");

    let mut config = match arg_value(&args, "--config") {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    config.seed = parse_arg(&args, "--seed", config.seed);
    config.decision_threshold = parse_arg(&args, "--threshold", config.decision_threshold);
    config.validate()?;
    let seed = config.seed;

    if !json {
        println!("reorder-runner");
        println!("  db:         {db}");
        println!("  seed:       {}", config.seed);
        println!("  threshold:  {:.2}", config.decision_threshold);
        println!("  neg ratio:  {:.2}", config.negative_ratio);
        println!("  sentinel:   {}", config.reorder_cycle_sentinel);
        println!();
    }

    let store = ReorderStore::open(db)?;
    store.migrate()?;
    let records = store.load_records()?;
    log::info!(
        "runner: {} orders loaded from {}",
        records.order_count(),
        store.path().unwrap_or(":memory:"),
    );

    let started = chrono::Utc::now();
    let run_id = new_run_id(seed);
    store.insert_run(&run_id, seed, env!("CARGO_PKG_VERSION"))?;

    let mut classifier = LogisticRegression::new(config.model.clone());
    let run = ReorderPipeline::new(run_id, config)
        .with_store(&store)
        .run(&records, &mut classifier)?;
    let elapsed_ms = (chrono::Utc::now() - started).num_milliseconds();
    log::info!("runner: pipeline finished in {elapsed_ms} ms");

    if let Some(path) = out {
        let mut writer = csv::Writer::from_path(path)?;
        write_targeting_csv(&run.targeting, &mut writer)?;
        writer.flush()?;
        log::info!("runner: targeting list written to {path}");
    }

    if json {
        let summary = RunSummary {
            run_id: &run.run_id,
            seed,
            elapsed_ms,
            positives: run.training.sampling.positives,
            negatives: run.training.sampling.drawn_negatives,
            train_rows: run.train.len(),
            holdout_rows: run.holdout.len(),
            evaluation: run.evaluation.as_ref(),
            scored_orders: run.targeting.report.orders,
            selected: run.targeting.report.selected,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&run, &store)?;
    }
    Ok(())
}

fn print_summary(run: &PipelineRun, store: &ReorderStore) -> Result<()> {
    let s = &run.training.sampling;

    println!("=== RUN SUMMARY ===");
    println!("  run_id:           {}", run.run_id);
    println!("  customers:        {}", run.tables.customers.len());
    println!("  products:         {}", run.tables.products.len());
    println!("  pairs:            {}", run.tables.pairs.len());
    println!("  sentinel imputed: {}", run.tables.pairs.imputed_count);
    println!("  positives:        {}", s.positives);
    println!("  negatives:        {} (pool {}, ratio {:.3})", s.drawn_negatives, s.pool_size, s.achieved_ratio);
    println!("  train / holdout:  {} / {}", run.train.len(), run.holdout.len());

    println!();
    println!("=== CAPPING BOUNDS ===");
    for b in &run.caps.bounds {
        println!(
            "  {:<34} q1={:>8.3} q3={:>8.3} upper={:>8.3}",
            b.feature.name(),
            b.q1,
            b.q3,
            b.upper_bound
        );
    }

    println!();
    println!("=== HOLDOUT EVALUATION ===");
    match &run.evaluation {
        None => println!("  (no holdout rows)"),
        Some(e) => {
            println!("  rows:       {}", e.rows);
            println!("  precision:  {:.3}", e.precision);
            println!("  recall:     {:.3}", e.recall);
            println!("  f1:         {:.3}", e.f1);
            println!("  accuracy:   {:.3}", e.accuracy);
            match e.roc_auc {
                Some(auc) => println!("  roc auc:    {auc:.3}"),
                None => println!("  roc auc:    n/a"),
            }
            if let Some(t) = e.best_f1_threshold {
                println!("  best-F1 threshold on grid: {t:.2}");
            }
        }
    }

    if let Some(errors) = &run.errors {
        println!();
        println!("=== ERROR ANALYSIS ===");
        println!("  false positives: {}", errors.false_positives.len());
        for c in &errors.top_false_positive_categories {
            println!("    {:<30} {}", c.category_name, c.count);
        }
        println!("  false negatives: {}", errors.false_negatives.len());
        for c in &errors.top_false_negative_categories {
            println!("    {:<30} {}", c.category_name, c.count);
        }
    }

    println!();
    println!("=== TARGETING ===");
    println!("  orders:     {}", run.targeting.report.orders);
    println!("  candidates: {}", run.targeting.report.candidates);
    println!("  selected:   {}", store.selected_count(&run.run_id)?);
    Ok(())
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
