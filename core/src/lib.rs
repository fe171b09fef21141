//! Repeat-order prediction: feature engineering, label construction and
//! negative sampling over a retail order history, plus the capping,
//! evaluation and targeting stages that consume the resulting table.

pub mod capping;
pub mod config;
pub mod error;
pub mod error_analysis;
pub mod features;
pub mod join;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod records;
pub mod report;
pub mod rng;
pub mod sampling;
pub mod scoring;
pub mod split;
pub mod store;
pub mod types;
