use reorder_core::{
    features::{
        aggregate_customer_products, aggregate_customers, aggregate_products, FeatureTables,
    },
    join::{join_records, JoinedTables},
    records::{Category, EvalSet, Order, OrderLine, Product, RecordStore},
    rng::{IndexSource, RngBank, StageSlot},
    sampling::{
        build_training_set, negative_pool, positive_set, requested_negatives, sample_negatives,
    },
    types::PairKey,
};
use std::collections::BTreeSet;

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Always picks the last remaining slot.
struct PickLast;

impl IndexSource for PickLast {
    fn next_index_below(&mut self, n: usize) -> usize {
        n - 1
    }
}

/// Always picks the first remaining slot, i.e. leaves the pool in order.
struct PickFirst;

impl IndexSource for PickFirst {
    fn next_index_below(&mut self, _n: usize) -> usize {
        0
    }
}

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

fn records(orders: Vec<Order>, prior: Vec<OrderLine>, train: Vec<OrderLine>) -> RecordStore {
    let mut ids: BTreeSet<u64> = prior.iter().map(|l| l.product_id).collect();
    ids.extend(train.iter().map(|l| l.product_id));
    let products = ids
        .into_iter()
        .map(|id| Product {
            product_id: id,
            product_name: format!("product-{id}"),
            category_id: 1,
        })
        .collect();
    let categories = vec![Category {
        category_id: 1,
        category_name: "produce".into(),
    }];
    RecordStore::new(orders, prior, train, products, categories).unwrap()
}

fn build(records: &RecordStore) -> (JoinedTables, FeatureTables) {
    let joined = join_records(records);
    let tables = FeatureTables {
        customers: aggregate_customers(
            &joined.prior_with_user,
            records.orders_in(&[EvalSet::Prior, EvalSet::Train]),
        ),
        products: aggregate_products(&joined.prior_with_user),
        pairs: aggregate_customer_products(&joined.prior_with_timing, 30.0),
    };
    (joined, tables)
}

/// User 1 bought products 1..=3 before and buys 4..=8 in the train order:
/// five positives, three pool pairs.
fn short_pool() -> RecordStore {
    records(
        vec![
            order(1, 1, EvalSet::Prior, 1, None),
            order(2, 1, EvalSet::Train, 2, Some(6.0)),
        ],
        vec![line(1, 1, 1, false), line(1, 2, 2, false), line(1, 3, 3, false)],
        (4..=8).map(|p| line(2, p, (p - 3) as u32, false)).collect(),
    )
}

/// Four users with wide prior baskets and small train baskets, so the pool
/// is much larger than the positive set.
fn wide_pool() -> RecordStore {
    let mut orders = Vec::new();
    let mut prior = Vec::new();
    let mut train = Vec::new();
    for user in 1..=4u64 {
        let prior_order = user * 10;
        let train_order = user * 10 + 1;
        orders.push(order(prior_order, user, EvalSet::Prior, 1, None));
        orders.push(order(train_order, user, EvalSet::Train, 2, Some(7.0)));
        for p in 1..=10u64 {
            prior.push(line(prior_order, p, p as u32, false));
        }
        train.push(line(train_order, user, 1, true));
        train.push(line(train_order, 20 + user, 2, false));
    }
    records(orders, prior, train)
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// A user who bought product 20 once and then ordered only product 30:
/// (user, 20) is a negative candidate carrying the sentinel cycle.
#[test]
fn never_reordered_pair_enters_pool_with_sentinel() {
    let records = records(
        vec![
            order(1, 3, EvalSet::Prior, 1, None),
            order(2, 3, EvalSet::Train, 2, Some(7.0)),
        ],
        vec![line(1, 20, 1, false)],
        vec![line(2, 30, 1, false)],
    );
    let (joined, tables) = build(&records);

    let positives = positive_set(&joined.train_with_user);
    let pool = negative_pool(&tables.pairs, &positives);
    assert_eq!(pool, vec![(3, 20)]);

    let pair = tables.pairs.get(&(3, 20)).unwrap();
    assert_eq!(pair.avg_days_between_reorder, 30.0);
    assert!(!pair.reorder_cycle_observed);

    let mut rng = RngBank::new(22).for_stage(StageSlot::NegativeSampling);
    let set = build_training_set(&joined.train_with_user, &tables, 1.0, &mut rng);
    assert_eq!(set.examples.len(), 2);

    let negative = set.negatives().next().unwrap();
    assert_eq!(negative.key(), (3, 20));
    assert_eq!(negative.features.avg_days_between_reorder, 30.0);

    // (3, 30) has no history: its pair features are zero-filled.
    let positive = set.positives().next().unwrap();
    assert_eq!(positive.key(), (3, 30));
    assert_eq!(positive.features.co_occurrence_count, 0.0);
    assert_eq!(set.fill.pair_missing, 1);
}

/// Adding the same product twice to one train order still yields a single
/// positive row: labels record presence, not quantity.
#[test]
fn repeated_train_line_is_one_positive() {
    let records = records(
        vec![
            order(1, 1, EvalSet::Prior, 1, None),
            order(2, 1, EvalSet::Train, 2, Some(4.0)),
        ],
        vec![line(1, 10, 1, false), line(1, 11, 2, false)],
        vec![line(2, 10, 1, true), line(2, 10, 2, true)],
    );
    let (joined, tables) = build(&records);
    assert_eq!(joined.train_with_user.len(), 2);

    let positives = positive_set(&joined.train_with_user);
    assert_eq!(positives, BTreeSet::from([(1, 10)]));

    let mut rng = RngBank::new(22).for_stage(StageSlot::NegativeSampling);
    let set = build_training_set(&joined.train_with_user, &tables, 1.0, &mut rng);
    assert_eq!(set.positives().count(), 1);
    assert_eq!(set.sampling.positives, 1);
    assert_eq!(set.negatives().map(|e| e.key()).collect::<Vec<_>>(), vec![(1, 11)]);
}

/// Five positives but only three candidates: every candidate is drawn once,
/// nothing fails, and the table has 8 rows rather than 10.
#[test]
fn short_pool_draws_every_candidate_once() {
    let records = short_pool();
    let (joined, tables) = build(&records);
    let mut rng = RngBank::new(22).for_stage(StageSlot::NegativeSampling);

    let set = build_training_set(&joined.train_with_user, &tables, 1.0, &mut rng);

    assert_eq!(set.examples.len(), 8);
    assert_eq!(set.positives().count(), 5);
    assert_eq!(set.negatives().count(), 3);
    assert_eq!(set.sampling.requested_negatives, 5);
    assert_eq!(set.sampling.drawn_negatives, 3);
    assert_eq!(set.sampling.shortfall, 2);
    assert!((set.sampling.achieved_ratio - 0.6).abs() < 1e-12);

    let negatives: BTreeSet<PairKey> = set.negatives().map(|e| e.key()).collect();
    assert_eq!(negatives, BTreeSet::from([(1, 1), (1, 2), (1, 3)]));
}

/// Positive and negative partitions never share a key.
#[test]
fn positives_and_negatives_are_disjoint() {
    let records = wide_pool();
    let (joined, tables) = build(&records);
    let mut rng = RngBank::new(22).for_stage(StageSlot::NegativeSampling);

    let set = build_training_set(&joined.train_with_user, &tables, 1.0, &mut rng);

    let positives: BTreeSet<PairKey> = set.positives().map(|e| e.key()).collect();
    let negatives: Vec<PairKey> = set.negatives().map(|e| e.key()).collect();
    let unique_negatives: BTreeSet<PairKey> = negatives.iter().copied().collect();

    assert_eq!(positives.len(), 8);
    assert_eq!(negatives.len(), 8, "pool is large enough for a full draw");
    assert_eq!(unique_negatives.len(), negatives.len(), "negatives drawn with replacement");
    assert!(positives.is_disjoint(&unique_negatives));
    assert_eq!(set.examples.len(), 2 * positives.len());

    // Positives come first, in key order.
    let leading: Vec<PairKey> = set.examples[..8].iter().map(|e| e.key()).collect();
    assert_eq!(leading, positives.into_iter().collect::<Vec<_>>());
}

/// The same seed draws the same negatives; the draw depends only on the seed.
#[test]
fn same_seed_same_negatives() {
    let records = wide_pool();
    let (joined, tables) = build(&records);

    let draw = |seed: u64| {
        let mut rng = RngBank::new(seed).for_stage(StageSlot::NegativeSampling);
        build_training_set(&joined.train_with_user, &tables, 1.0, &mut rng)
            .negatives()
            .map(|e| e.key())
            .collect::<Vec<_>>()
    };

    assert_eq!(draw(22), draw(22));
}

/// Partial Fisher-Yates with a scripted index source.
#[test]
fn sampler_follows_the_index_source() {
    let pool: Vec<PairKey> = vec![(1, 1), (1, 2), (1, 3), (1, 4)];

    assert_eq!(sample_negatives(&pool, 2, &mut PickFirst), vec![(1, 1), (1, 2)]);
    // [a b c d] -> swap(0,3) -> [d b c a] -> swap(1,3) -> [d a c b]
    assert_eq!(sample_negatives(&pool, 2, &mut PickLast), vec![(1, 4), (1, 1)]);
}

#[test]
fn sampler_handles_zero_and_oversized_requests() {
    let pool: Vec<PairKey> = vec![(2, 5), (2, 6), (2, 7)];

    assert!(sample_negatives(&pool, 0, &mut PickLast).is_empty());

    let all = sample_negatives(&pool, 10, &mut PickLast);
    assert_eq!(all.len(), 3);
    let unique: BTreeSet<PairKey> = all.into_iter().collect();
    assert_eq!(unique.len(), 3);

    assert!(sample_negatives(&[], 4, &mut PickFirst).is_empty());
}

#[test]
fn requested_count_rounds_ratio() {
    assert_eq!(requested_negatives(5, 1.0), 5);
    assert_eq!(requested_negatives(3, 0.5), 2);
    assert_eq!(requested_negatives(4, 2.0), 8);
    assert_eq!(requested_negatives(0, 1.0), 0);
}
