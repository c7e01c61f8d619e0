//! Deterministic utilities for reproducible encoder fitting
//!
//! A seeded LCG drives the shuffle, so the same CSV and seed always give the
//! same folds on every platform.

use std::num::Wrapping;

/// Linear Congruential Generator for deterministic pseudo-randomness
/// Uses constants from Numerical Recipes (glibc)
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: Wrapping<i64>,
}

impl LcgRng {
    const MULTIPLIER: i64 = 1103515245;
    const INCREMENT: i64 = 12345;
    const MODULUS: i64 = 1 << 31;

    pub fn new(seed: i64) -> Self {
        Self {
            state: Wrapping(seed.wrapping_abs() % Self::MODULUS),
        }
    }

    /// Next value in [0, MODULUS)
    pub fn next_i64(&mut self) -> i64 {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
        self.state.0 & (Self::MODULUS - 1)
    }

    /// Next value in [0, max); 0 when `max` is empty.
    pub fn next_range(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        (self.next_i64() as u64 % max as u64) as usize
    }

    /// Fisher-Yates shuffle
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_range(i + 1);
            items.swap(i, j);
        }
    }
}

/// One train/validation split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// K-fold splits over `n` rows after a seeded shuffle.
///
/// The first `n % k` folds take one extra row, so fold sizes match
/// scikit-learn's `KFold`. Returns no folds when `k < 2` or `k > n`.
pub fn kfold(n: usize, k: usize, seed: i64) -> Vec<Fold> {
    if k < 2 || k > n {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..n).collect();
    LcgRng::new(seed).shuffle(&mut order);

    let base = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let end = start + size;
        let mut validation = order[start..end].to_vec();
        let mut train: Vec<usize> = order[..start].iter().chain(&order[end..]).copied().collect();
        validation.sort_unstable();
        train.sort_unstable();
        folds.push(Fold { train, validation });
        start = end;
    }
    folds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcg_determinism() {
        let mut rng1 = LcgRng::new(42);
        let mut rng2 = LcgRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_i64(), rng2.next_i64());
        }
    }

    #[test]
    fn test_lcg_range() {
        let mut rng = LcgRng::new(-42);
        for _ in 0..100 {
            assert!(rng.next_range(10) < 10);
        }
        assert_eq!(rng.next_range(0), 0);
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut items: Vec<u32> = (0..50).collect();
        LcgRng::new(7).shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
        assert_ne!(items, sorted);
    }

    #[test]
    fn test_kfold_sizes() {
        let folds = kfold(12, 5, 42);
        let sizes: Vec<usize> = folds.iter().map(|f| f.validation.len()).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2, 2]);

        let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.validation.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..12).collect::<Vec<_>>());

        for fold in &folds {
            assert_eq!(fold.train.len() + fold.validation.len(), 12);
            assert!(fold.validation.iter().all(|i| !fold.train.contains(i)));
        }
    }

    #[test]
    fn test_kfold_degenerate() {
        assert!(kfold(1, 1, 42).is_empty());
        assert!(kfold(3, 5, 42).is_empty());
        assert_eq!(kfold(8, 4, 42), kfold(8, 4, 42));
    }
}
