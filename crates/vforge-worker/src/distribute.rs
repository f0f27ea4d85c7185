//! Proportional, shuffled assignment of variants to batch items.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Assign one of `variants` to each of `n` items.
///
/// Every variant is used `n / k` or `n / k + 1` times (the first `n % k`
/// variants take the extra item), then the order is shuffled with `rng`.
/// With no variants, or no items, every item gets `V::default()`.
pub fn distribute<V, R>(variants: &[V], n: usize, rng: &mut R) -> Vec<V>
where
    V: Clone + Default,
    R: Rng + ?Sized,
{
    if variants.is_empty() || n == 0 {
        return vec![V::default(); n];
    }

    let k = variants.len();
    let base = n / k;
    let remainder = n % k;

    let mut assigned = Vec::with_capacity(n);
    for (i, variant) in variants.iter().enumerate() {
        let count = if i < remainder { base + 1 } else { base };
        assigned.extend(std::iter::repeat(variant.clone()).take(count));
    }

    assigned.shuffle(rng);
    assigned
}

/// [`distribute`] with a reproducible order for a given seed, or a
/// thread-local RNG when no seed is given.
pub fn distribute_seeded<V>(variants: &[V], n: usize, seed: Option<u64>) -> Vec<V>
where
    V: Clone + Default,
{
    match seed {
        Some(seed) => distribute(variants, n, &mut StdRng::seed_from_u64(seed)),
        None => distribute(variants, n, &mut rand::rng()),
    }
}

/// Per-variant item counts, keyed by the variant's display name.
pub fn variant_counts<V: Display>(assigned: &[V]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for variant in assigned {
        *counts.entry(variant.to_string()).or_insert(0) += 1;
    }
    counts
}
