use reorder_core::{
    features::{
        aggregate_customer_products, aggregate_customers, aggregate_products, FeatureTables,
        FeatureVector,
    },
    join::join_records,
    records::{Category, EvalSet, Order, OrderLine, Product, RecordStore},
    sampling::positive_set,
};

const SENTINEL: f64 = 30.0;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn order(order_id: u64, user_id: u64, eval_set: EvalSet, order_number: u32, days: Option<f64>) -> Order {
    Order {
        order_id,
        user_id,
        eval_set,
        order_number,
        days_since_prior_order: days,
    }
}

fn line(order_id: u64, product_id: u64, add_to_cart_order: u32, reordered: bool) -> OrderLine {
    OrderLine {
        order_id,
        product_id,
        add_to_cart_order,
        reordered,
    }
}

fn catalogue(ids: &[u64]) -> (Vec<Product>, Vec<Category>) {
    let products = ids
        .iter()
        .map(|&id| Product {
            product_id: id,
            product_name: format!("product-{id}"),
            category_id: 1,
        })
        .collect();
    let categories = vec![Category {
        category_id: 1,
        category_name: "pantry".into(),
    }];
    (products, categories)
}

fn build_tables(records: &RecordStore) -> FeatureTables {
    let joined = join_records(records);
    FeatureTables {
        customers: aggregate_customers(
            &joined.prior_with_user,
            records.orders_in(&[EvalSet::Prior, EvalSet::Train]),
        ),
        products: aggregate_products(&joined.prior_with_user),
        pairs: aggregate_customer_products(&joined.prior_with_timing, SENTINEL),
    }
}

/// One user, two prior orders of product 10 (first fresh, then reordered
/// after 8 days), and a train order containing product 10 again.
fn single_reorder_history() -> RecordStore {
    let (products, categories) = catalogue(&[10]);
    RecordStore::new(
        vec![
            order(1, 7, EvalSet::Prior, 1, None),
            order(2, 7, EvalSet::Prior, 2, Some(8.0)),
            order(3, 7, EvalSet::Train, 3, Some(5.0)),
        ],
        vec![line(1, 10, 1, false), line(2, 10, 1, true)],
        vec![line(3, 10, 1, true)],
        products,
        categories,
    )
    .unwrap()
}

/// Three users with overlapping baskets, a few reorders and one user whose
/// only order has no gap.
fn mixed_history() -> RecordStore {
    let (products, categories) = catalogue(&[1, 2, 3, 4, 5]);
    RecordStore::new(
        vec![
            order(10, 1, EvalSet::Prior, 1, None),
            order(11, 1, EvalSet::Prior, 2, Some(4.0)),
            order(12, 1, EvalSet::Prior, 3, Some(6.0)),
            order(13, 1, EvalSet::Train, 4, Some(3.0)),
            order(20, 2, EvalSet::Prior, 1, None),
            order(21, 2, EvalSet::Prior, 2, Some(14.0)),
            order(22, 2, EvalSet::Test, 3, Some(9.0)),
            order(30, 3, EvalSet::Prior, 1, None),
        ],
        vec![
            line(10, 1, 1, false),
            line(10, 2, 2, false),
            line(11, 1, 1, true),
            line(11, 3, 2, false),
            line(12, 1, 2, true),
            line(12, 2, 1, true),
            line(12, 4, 3, false),
            line(20, 2, 1, false),
            line(20, 5, 2, false),
            line(21, 5, 1, true),
            line(30, 3, 1, false),
        ],
        vec![line(13, 1, 1, true), line(13, 5, 2, false)],
        products,
        categories,
    )
    .unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Two prior purchases of product 10, the second a reorder 8 days later.
/// The pair's reorder cycle only averages the reordered line's gap.
#[test]
fn reorder_cycle_uses_only_reordered_lines() {
    let records = single_reorder_history();
    let joined = join_records(&records);
    let tables = build_tables(&records);

    assert!(positive_set(&joined.train_with_user).contains(&(7, 10)));

    let row = tables.pairs.get(&(7, 10)).expect("pair row for (7, 10)");
    assert_eq!(row.co_occurrence_count, 2);
    assert!((row.reorder_ratio - 0.5).abs() < 1e-12);
    assert!((row.avg_days_between_reorder - 8.0).abs() < 1e-12);
    assert!(row.reorder_cycle_observed);
    assert_eq!(row.last_order_number, 2);
    assert!((row.avg_cart_position - 1.0).abs() < 1e-12);
    assert_eq!(tables.pairs.imputed_count, 0);
}

/// Customer history counts prior lines only, but orders and gaps from both
/// the prior and train sets.
#[test]
fn customer_history_spans_prior_and_train_orders() {
    let records = single_reorder_history();
    let tables = build_tables(&records);

    let c = tables.customers.get(&7).expect("customer 7");
    assert_eq!(c.total_line_count, 2);
    assert_eq!(c.unique_product_count, 1);
    assert_eq!(c.total_order_count, 3);
    let avg = c.avg_days_between_orders.expect("two observed gaps");
    assert!((avg - 6.5).abs() < 1e-12, "avg gap {avg}");
}

/// Product reorder rate counts first purchases in the denominator.
#[test]
fn product_reorder_rate_includes_first_purchases() {
    let tables = build_tables(&mixed_history());

    let p1 = tables.products.get(&1).unwrap();
    assert_eq!(p1.total_purchase_count, 3);
    assert!((p1.reorder_rate - 2.0 / 3.0).abs() < 1e-12);

    let p4 = tables.products.get(&4).unwrap();
    assert_eq!(p4.total_purchase_count, 1);
    assert_eq!(p4.reorder_rate, 0.0);
}

/// Every ratio the aggregators produce lies in [0, 1].
#[test]
fn ratio_fields_stay_in_unit_interval() {
    let tables = build_tables(&mixed_history());

    for p in tables.products.values() {
        assert!((0.0..=1.0).contains(&p.reorder_rate), "product {} rate {}", p.product_id, p.reorder_rate);
    }
    for row in tables.pairs.rows() {
        assert!(
            (0.0..=1.0).contains(&row.reorder_ratio),
            "pair ({}, {}) ratio {}",
            row.user_id,
            row.product_id,
            row.reorder_ratio
        );
    }
}

/// No pair is left with an undefined reorder cycle: either an observed
/// mean or exactly the sentinel.
#[test]
fn every_pair_has_a_reorder_cycle() {
    let tables = build_tables(&mixed_history());

    let mut imputed = 0;
    for row in tables.pairs.rows() {
        assert!(row.avg_days_between_reorder.is_finite());
        if !row.reorder_cycle_observed {
            assert_eq!(row.avg_days_between_reorder, SENTINEL);
            imputed += 1;
        }
    }
    assert_eq!(imputed, tables.pairs.imputed_count);
    assert!(imputed > 0, "fixture must contain never-reordered pairs");

    // (1, 1): reordered after 4 then 6 days.
    let row = tables.pairs.get(&(1, 1)).unwrap();
    assert!((row.avg_days_between_reorder - 5.0).abs() < 1e-12);
    // (1, 3): bought once.
    assert_eq!(tables.pairs.get(&(1, 3)).unwrap().avg_days_between_reorder, SENTINEL);
}

/// A pair only exists because it was bought at least once.
#[test]
fn pair_rows_have_positive_co_occurrence() {
    let tables = build_tables(&mixed_history());
    assert_eq!(tables.pairs.len(), 7);
    for row in tables.pairs.rows() {
        assert!(row.co_occurrence_count >= 1);
    }
}

/// A reordered line whose order has no gap still counts towards the
/// reorder cycle, contributing 0 days.
#[test]
fn null_gap_on_reordered_line_still_counts() {
    let (products, categories) = catalogue(&[42]);
    let records = RecordStore::new(
        vec![
            order(1, 5, EvalSet::Prior, 1, None),
            order(2, 5, EvalSet::Prior, 2, Some(10.0)),
        ],
        vec![line(1, 42, 1, true), line(2, 42, 1, true)],
        vec![],
        products,
        categories,
    )
    .unwrap();
    let tables = build_tables(&records);

    let row = tables.pairs.get(&(5, 42)).unwrap();
    assert!((row.avg_days_between_reorder - 5.0).abs() < 1e-12);
}

/// A user with a single gapless order gets no average gap, and the feature
/// join fills it with 0 and counts the fill.
#[test]
fn undefined_customer_gap_is_filled_and_counted() {
    let tables = build_tables(&mixed_history());

    assert_eq!(tables.customers.get(&3).unwrap().avg_days_between_orders, None);

    let (rows, fill) = tables.join(&[(3, 3)]);
    assert_eq!(rows[0].customer_avg_days_between_orders, 0.0);
    assert_eq!(rows[0].co_occurrence_count, 1.0);
    assert_eq!(fill.rows, 1);
    assert_eq!(fill.customer_gap_undefined, 1);
    assert_eq!(fill.customer_missing, 0);
}

/// Keys with no history at all come back zero-filled, one fill per table.
#[test]
fn join_fills_missing_keys_with_zero() {
    let tables = build_tables(&mixed_history());

    let (rows, fill) = tables.join(&[(99, 98)]);
    assert_eq!(rows[0], FeatureVector::default());
    assert_eq!(fill.customer_missing, 1);
    assert_eq!(fill.product_missing, 1);
    assert_eq!(fill.pair_missing, 1);
}

/// Customers are only built for users with prior lines.
#[test]
fn customers_require_prior_lines() {
    let (products, categories) = catalogue(&[1]);
    let records = RecordStore::new(
        vec![
            order(1, 1, EvalSet::Prior, 1, None),
            order(2, 2, EvalSet::Train, 1, None),
        ],
        vec![line(1, 1, 1, false)],
        vec![line(2, 1, 1, false)],
        products,
        categories,
    )
    .unwrap();
    let tables = build_tables(&records);

    assert!(tables.customers.contains_key(&1));
    assert!(!tables.customers.contains_key(&2));
}
