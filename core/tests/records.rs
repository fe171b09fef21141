use reorder_core::{
    error::PipelineError,
    join::join_records,
    records::{Category, EvalSet, Order, OrderLine, Product, RecordStore},
    sampling::positive_set,
};
use std::collections::BTreeSet;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn order(order_id: u64, order_number: u32, days: Option<f64>) -> Order {
    Order {
        order_id,
        user_id: 1,
        eval_set: EvalSet::Prior,
        order_number,
        days_since_prior_order: days,
    }
}

fn line(order_id: u64, add_to_cart_order: u32) -> OrderLine {
    OrderLine {
        order_id,
        product_id: 1,
        add_to_cart_order,
        reordered: false,
    }
}

fn product(product_id: u64, category_id: u64) -> Product {
    Product {
        product_id,
        product_name: format!("p{product_id}"),
        category_id,
    }
}

fn category(category_id: u64) -> Category {
    Category {
        category_id,
        category_name: format!("c{category_id}"),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn duplicate_order_id_is_rejected() {
    let err = RecordStore::new(
        vec![order(1, 1, None), order(1, 2, Some(3.0))],
        vec![],
        vec![],
        vec![],
        vec![],
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::DuplicateKey { ref table, .. } if table == "orders"));
}

#[test]
fn duplicate_product_id_is_rejected() {
    let err = RecordStore::new(
        vec![],
        vec![],
        vec![],
        vec![product(4, 1), product(4, 1)],
        vec![category(1)],
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::DuplicateKey { ref table, .. } if table == "products"));
}

#[test]
fn order_number_starts_at_one() {
    let err = RecordStore::new(vec![order(1, 0, None)], vec![], vec![], vec![], vec![]).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidValue { ref field, .. } if field == "order_number"));
}

#[test]
fn negative_gap_is_rejected() {
    let err =
        RecordStore::new(vec![order(1, 2, Some(-1.0))], vec![], vec![], vec![], vec![]).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::InvalidValue { ref field, .. } if field == "days_since_prior_order"
    ));
}

#[test]
fn cart_position_starts_at_one() {
    let err = RecordStore::new(
        vec![order(1, 1, None)],
        vec![line(1, 0)],
        vec![],
        vec![],
        vec![],
    )
    .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::InvalidValue { ref table, .. } if table == "order_products_prior"
    ));
}

/// A prior line pointing at a train order is a referential gap, not a
/// load failure: the prior join drops and counts it.
#[test]
fn line_on_other_eval_set_order_is_dropped_by_join() {
    let mut train_order = order(2, 2, Some(5.0));
    train_order.eval_set = EvalSet::Train;
    let records = RecordStore::new(
        vec![order(1, 1, None), train_order],
        vec![
            OrderLine { product_id: 10, ..line(1, 1) },
            OrderLine { product_id: 11, ..line(2, 1) },
        ],
        vec![OrderLine { product_id: 10, ..line(2, 1) }],
        vec![],
        vec![],
    )
    .unwrap();

    let joined = join_records(&records);
    assert_eq!(joined.report.prior.kept, 1);
    assert_eq!(joined.report.prior.wrong_eval_set, 1);
    assert_eq!(joined.report.train.kept, 1);
    assert_eq!(positive_set(&joined.train_with_user), BTreeSet::from([(1, 10)]));
}

/// A product whose category is missing is kept; only its category lookup
/// comes back empty.
#[test]
fn dangling_category_is_tolerated() {
    let records = RecordStore::new(
        vec![],
        vec![],
        vec![],
        vec![product(1, 1), product(2, 7)],
        vec![category(1)],
    )
    .unwrap();
    assert_eq!(records.category_of(1).unwrap().category_name, "c1");
    assert!(records.product(2).is_some());
    assert!(records.category_of(2).is_none());
}

#[test]
fn orders_filter_by_eval_set() {
    let mut test_order = order(2, 3, Some(4.0));
    test_order.eval_set = EvalSet::Test;
    let records = RecordStore::new(
        vec![order(1, 1, None), test_order],
        vec![],
        vec![],
        vec![],
        vec![],
    )
    .unwrap();

    let test_ids: Vec<u64> = records.orders_in(&[EvalSet::Test]).map(|o| o.order_id).collect();
    assert_eq!(test_ids, vec![2]);
    assert_eq!(records.orders().count(), 2);
    assert_eq!(EvalSet::parse("train"), Some(EvalSet::Train));
    assert_eq!(EvalSet::parse("holdout"), None);
}
