//! Seeded train / holdout split of the labelled table.

use crate::rng::IndexSource;

/// Shuffle `rows` and peel off `floor(fraction * n)` of them as the holdout.
/// Returns (train, holdout); both keep the shuffled order.
pub fn split_holdout<T: Clone, R: IndexSource + ?Sized>(
    rows: &[T],
    fraction: f64,
    rng: &mut R,
) -> (Vec<T>, Vec<T>) {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    // Fisher-Yates, front to back.
    for i in 0..order.len() {
        let j = i + rng.next_index_below(order.len() - i);
        order.swap(i, j);
    }

    let holdout_len = ((rows.len() as f64) * fraction.clamp(0.0, 1.0)).floor() as usize;
    let (holdout_idx, train_idx) = order.split_at(holdout_len);

    let pick = |idx: &[usize]| idx.iter().map(|&i| rows[i].clone()).collect::<Vec<T>>();
    (pick(train_idx), pick(holdout_idx))
}
