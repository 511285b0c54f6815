//! Stratified train/test splitting
//!
//! The test set takes `ceil(test_size * n)` rows. Each class contributes in
//! proportion to its size (largest-remainder rounding), but never fewer
//! than one row to either side, so every class appears in both subsets.

use crate::errors::SplitError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Row indices of each subset, ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StratifiedSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split `labels` into stratified train/test index sets
pub fn stratified_split(
    labels: &[String],
    test_size: f64,
    seed: u64,
) -> Result<StratifiedSplit, SplitError> {
    let n = labels.len();
    if n == 0 {
        return Err(SplitError::Empty);
    }
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(SplitError::InvalidTestSize(test_size));
    }

    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        groups.entry(label.as_str()).or_default().push(i);
    }

    if let Some((label, members)) = groups.iter().find(|(_, members)| members.len() < 2) {
        return Err(SplitError::ClassTooSmall {
            label: label.to_string(),
            count: members.len(),
        });
    }

    let n_test = ((test_size * n as f64).ceil() as usize).min(n);
    let n_train = n - n_test;
    let n_classes = groups.len();
    for (subset, size) in [("test", n_test), ("train", n_train)] {
        if size < n_classes {
            return Err(SplitError::SubsetTooSmall {
                subset,
                size,
                classes: n_classes,
            });
        }
    }

    let sizes: Vec<usize> = groups.values().map(Vec::len).collect();
    let allocation = allocate_test_counts(&sizes, n, n_test);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);

    for (members, take) in groups.into_values().zip(allocation) {
        let mut members = members;
        members.shuffle(&mut rng);
        test.extend_from_slice(&members[..take]);
        train.extend_from_slice(&members[take..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(StratifiedSplit { train, test })
}

/// Per-class test counts summing to `n_test`, each within `[1, size - 1]`.
///
/// Callers guarantee every size is >= 2 and `classes <= n_test <= n - classes`.
fn allocate_test_counts(sizes: &[usize], n: usize, n_test: usize) -> Vec<usize> {
    // Exact share of class c is n_test * size / n; remainders are kept as
    // numerators over n so comparisons stay in integers.
    let mut counts: Vec<usize> = sizes
        .iter()
        .map(|&size| (n_test * size / n).clamp(1, size - 1))
        .collect();
    let remainder =
        |c: usize, counts: &[usize]| (n_test * sizes[c]) as i64 - (counts[c] * n) as i64;

    let mut total: usize = counts.iter().sum();
    while total < n_test {
        let next = (0..sizes.len())
            .filter(|&c| counts[c] < sizes[c] - 1)
            .max_by(|&a, &b| remainder(a, &counts).cmp(&remainder(b, &counts)).then(b.cmp(&a)));
        match next {
            Some(c) => {
                counts[c] += 1;
                total += 1;
            }
            None => break,
        }
    }
    while total > n_test {
        let next = (0..sizes.len())
            .filter(|&c| counts[c] > 1)
            .min_by(|&a, &b| remainder(a, &counts).cmp(&remainder(b, &counts)).then(a.cmp(&b)));
        match next {
            Some(c) => {
                counts[c] -= 1;
                total -= 1;
            }
            None => break,
        }
    }

    counts
}
