//! Deterministic uniform sampling without replacement.
//!
//! Draws are made by rejection from a seeded [`StdRng`], so a given
//! `(sample_size, population_size, seed)` triple always produces the same
//! [`SampleIndexSet`] for a fixed `rand` major version.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Errors from sampling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SampleError {
    #[error("cannot sample {sample_size} items from a population of {population_size}")]
    InvalidSampleSize {
        sample_size: usize,
        population_size: usize,
    },

    #[error("invalid seed {0:?}: expected two unsigned integers such as \"420,69\"")]
    InvalidSeed(String),
}

/// A two-word generator seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Seed(pub u64, pub u64);

impl Seed {
    /// Seed used for the published issue and comment datasets.
    pub const DATASET: Seed = Seed(420, 69);

    /// Expand to the 32-byte seed of [`StdRng`]: both words little-endian,
    /// written twice.
    pub fn to_bytes(self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        for (i, word) in [self.0, self.1, self.0, self.1].into_iter().enumerate() {
            bytes[i * 8..(i + 1) * 8].copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    pub fn rng(self) -> StdRng {
        StdRng::from_seed(self.to_bytes())
    }
}

impl Default for Seed {
    fn default() -> Self {
        Self::DATASET
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.0, self.1)
    }
}

impl FromStr for Seed {
    type Err = SampleError;

    /// Parse `"a,b"` (whitespace around either word is ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SampleError::InvalidSeed(s.to_string());
        let (a, b) = s.split_once(',').ok_or_else(invalid)?;
        let a = a.trim().parse().map_err(|_| invalid())?;
        let b = b.trim().parse().map_err(|_| invalid())?;
        Ok(Seed(a, b))
    }
}

/// Sorted, duplicate-free population indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleIndexSet {
    indices: Vec<usize>,
}

impl SampleIndexSet {
    pub fn as_slice(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    /// Keep the rows of `population` whose position is in the set.
    ///
    /// Consumes the stream in a single forward pass and stops reading as soon
    /// as the largest index has been yielded.
    pub fn select<I>(&self, population: I) -> Selected<'_, I::IntoIter>
    where
        I: IntoIterator,
    {
        Selected {
            wanted: &self.indices,
            rows: population.into_iter(),
            position: 0,
        }
    }
}

impl IntoIterator for SampleIndexSet {
    type Item = usize;
    type IntoIter = std::vec::IntoIter<usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.indices.into_iter()
    }
}

/// Iterator returned by [`SampleIndexSet::select`].
pub struct Selected<'a, I> {
    wanted: &'a [usize],
    rows: I,
    position: usize,
}

impl<I: Iterator> Iterator for Selected<'_, I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        let (&target, rest) = self.wanted.split_first()?;
        let skip = target - self.position;
        let row = self.rows.nth(skip)?;
        self.position = target + 1;
        self.wanted = rest;
        Some(row)
    }
}

/// Draw `sample_size` distinct indices from `[0, population_size)`.
///
/// Fails with [`SampleError::InvalidSampleSize`] when the sample is larger
/// than the population; the request is never silently clamped.
pub fn sample(
    sample_size: usize,
    population_size: usize,
    seed: Seed,
) -> Result<SampleIndexSet, SampleError> {
    if sample_size > population_size {
        return Err(SampleError::InvalidSampleSize {
            sample_size,
            population_size,
        });
    }

    let mut rng = seed.rng();
    let mut seen = HashSet::with_capacity(sample_size);
    let mut indices = Vec::with_capacity(sample_size);

    while indices.len() < sample_size {
        let index = rng.random_range(0..population_size);
        if seen.insert(index) {
            indices.push(index);
        }
    }

    indices.sort_unstable();
    Ok(SampleIndexSet { indices })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sample_is_reproducible_for_seed_one_one() {
        let first = sample(3, 10, Seed(1, 1)).expect("sample");
        let second = sample(3, 10, Seed(1, 1)).expect("sample");
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn different_seeds_usually_differ() {
        let a = sample(50, 10_000, Seed(1, 1)).expect("sample");
        let b = sample(50, 10_000, Seed(2, 1)).expect("sample");
        assert_ne!(a, b);
    }

    #[test]
    fn oversized_sample_fails_fast() {
        assert_eq!(
            sample(11, 10, Seed(1, 1)),
            Err(SampleError::InvalidSampleSize {
                sample_size: 11,
                population_size: 10
            })
        );
    }

    #[test]
    fn full_and_empty_samples() {
        let full = sample(10, 10, Seed::default()).expect("sample");
        assert_eq!(full.as_slice(), (0..10).collect::<Vec<_>>().as_slice());

        let empty = sample(0, 0, Seed::default()).expect("sample");
        assert!(empty.is_empty());
    }

    #[test]
    fn select_yields_sampled_rows_in_order() {
        let set = SampleIndexSet {
            indices: vec![0, 3, 4, 9],
        };
        let rows: Vec<char> = set.select("abcdefghijkl".chars()).collect();
        assert_eq!(rows, vec!['a', 'd', 'e', 'j']);
        assert!(set.contains(4));
        assert!(!set.contains(5));
    }

    #[test]
    fn select_stops_reading_after_last_index() {
        let set = SampleIndexSet {
            indices: vec![1, 2],
        };
        let mut read = 0;
        let rows: Vec<u32> = set
            .select((0..100).inspect(|_| read += 1))
            .collect();
        assert_eq!(rows, vec![1, 2]);
        assert_eq!(read, 3);
    }

    #[test]
    fn select_on_short_population_yields_what_exists() {
        let set = SampleIndexSet {
            indices: vec![1, 8],
        };
        let rows: Vec<u32> = set.select(0..5).collect();
        assert_eq!(rows, vec![1]);
    }

    #[test]
    fn seed_parses_and_displays() {
        let seed: Seed = " 420, 69".parse().expect("seed");
        assert_eq!(seed, Seed(420, 69));
        assert_eq!(seed.to_string(), "420,69");
        assert!("420".parse::<Seed>().is_err());
        assert!("a,b".parse::<Seed>().is_err());
    }

    proptest! {
        #[test]
        fn sample_is_sorted_distinct_and_in_range(
            population in 1usize..2_000,
            fraction in 0.0f64..=1.0,
            a in any::<u64>(),
            b in any::<u64>(),
        ) {
            let size = ((population as f64) * fraction) as usize;
            let set = sample(size, population, Seed(a, b)).expect("valid sample");
            prop_assert_eq!(set.len(), size);
            prop_assert!(set.as_slice().windows(2).all(|w| w[0] < w[1]));
            prop_assert!(set.as_slice().iter().all(|&i| i < population));
        }

        #[test]
        fn sample_is_deterministic(
            population in 1usize..5_000,
            size in 0usize..100,
            a in any::<u64>(),
            b in any::<u64>(),
        ) {
            let size = size.min(population);
            prop_assert_eq!(
                sample(size, population, Seed(a, b)),
                sample(size, population, Seed(a, b))
            );
        }
    }
}
