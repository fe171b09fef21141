//! Join engine: raw order lines → denormalised working tables.
//!
//! JOIN POLICY:
//!   - prior_with_user / train_with_user are INNER joins. A line whose
//!     order is unknown, or whose order sits in a different eval_set,
//!     is dropped and counted.
//!   - prior_with_timing is a LEFT join on top of prior_with_user. Every
//!     prior line survives; a failed timing lookup yields None fields
//!     and is counted. Because prior_with_user already resolved each
//!     order, a miss here means the record store changed underneath us.

use crate::{
    records::{EvalSet, OrderLine, RecordStore},
    types::{OrderId, ProductId, UserId},
};
use serde::{Deserialize, Serialize};

/// An order line annotated with its order's customer.
#[derive(Debug, Clone, PartialEq)]
pub struct LineWithUser {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub add_to_cart_order: u32,
    pub reordered: bool,
}

/// A prior line further annotated with its order's timing.
#[derive(Debug, Clone, PartialEq)]
pub struct LineWithTiming {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub add_to_cart_order: u32,
    pub reordered: bool,
    pub order_number: Option<u32>,
    pub days_since_prior_order: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InnerJoinStats {
    pub input_lines: usize,
    pub kept: usize,
    pub unknown_order: usize,
    pub wrong_eval_set: usize,
}

impl InnerJoinStats {
    pub fn dropped(&self) -> usize {
        self.unknown_order + self.wrong_eval_set
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinReport {
    pub prior: InnerJoinStats,
    pub train: InnerJoinStats,
    pub timing_rows: usize,
    pub timing_missing: usize,
    pub null_days_since_prior: usize,
}

#[derive(Debug, Clone)]
pub struct JoinedTables {
    pub prior_with_user: Vec<LineWithUser>,
    pub train_with_user: Vec<LineWithUser>,
    pub prior_with_timing: Vec<LineWithTiming>,
    pub report: JoinReport,
}

/// Build all three working tables from the record store.
pub fn join_records(records: &RecordStore) -> JoinedTables {
    let (prior_with_user, prior) = with_user(records, records.prior_lines(), EvalSet::Prior);
    let (train_with_user, train) = with_user(records, records.train_lines(), EvalSet::Train);
    let prior_with_timing = with_timing(records, &prior_with_user);

    let timing_missing = prior_with_timing
        .iter()
        .filter(|r| r.order_number.is_none())
        .count();
    let null_days_since_prior = prior_with_timing
        .iter()
        .filter(|r| r.days_since_prior_order.is_none())
        .count();

    let report = JoinReport {
        prior,
        train,
        timing_rows: prior_with_timing.len(),
        timing_missing,
        null_days_since_prior,
    };

    log_inner("prior_with_user", &report.prior);
    log_inner("train_with_user", &report.train);
    if report.timing_missing > 0 {
        log::warn!(
            "join: prior_with_timing rows={} without order timing={}",
            report.timing_rows,
            report.timing_missing,
        );
    }
    log::debug!(
        "join: prior_with_timing rows={} null days_since_prior_order={}",
        report.timing_rows,
        report.null_days_since_prior,
    );

    JoinedTables {
        prior_with_user,
        train_with_user,
        prior_with_timing,
        report,
    }
}

/// Inner join of `lines` to orders restricted to `eval_set`.
pub fn with_user(
    records: &RecordStore,
    lines: &[OrderLine],
    eval_set: EvalSet,
) -> (Vec<LineWithUser>, InnerJoinStats) {
    let mut stats = InnerJoinStats {
        input_lines: lines.len(),
        ..Default::default()
    };
    let mut out = Vec::with_capacity(lines.len());

    for line in lines {
        match records.order(line.order_id) {
            None => stats.unknown_order += 1,
            Some(order) if order.eval_set != eval_set => stats.wrong_eval_set += 1,
            Some(order) => out.push(LineWithUser {
                order_id: line.order_id,
                product_id: line.product_id,
                user_id: order.user_id,
                add_to_cart_order: line.add_to_cart_order,
                reordered: line.reordered,
            }),
        }
    }

    stats.kept = out.len();
    (out, stats)
}

/// Left join of already user-annotated lines to their order's timing.
pub fn with_timing(records: &RecordStore, lines: &[LineWithUser]) -> Vec<LineWithTiming> {
    lines
        .iter()
        .map(|line| {
            let order = records.order(line.order_id);
            LineWithTiming {
                order_id: line.order_id,
                product_id: line.product_id,
                user_id: line.user_id,
                add_to_cart_order: line.add_to_cart_order,
                reordered: line.reordered,
                order_number: order.map(|o| o.order_number),
                days_since_prior_order: order.and_then(|o| o.days_since_prior_order),
            }
        })
        .collect()
}

fn log_inner(table: &str, stats: &InnerJoinStats) {
    if stats.dropped() > 0 {
        log::warn!(
            "join: {table} kept={} dropped unknown_order={} wrong_eval_set={}",
            stats.kept,
            stats.unknown_order,
            stats.wrong_eval_set,
        );
    } else {
        log::info!("join: {table} kept={}", stats.kept);
    }
}
