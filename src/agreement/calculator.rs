//! Pairwise agreement accumulation.
//!
//! For every row and every distinct label `cat` occurring `count` times in a
//! row of length `len`:
//!
//! - `agreement[cat] += C(count, 2)`: annotator pairs that both applied `cat`
//! - `potential[cat] += count * len - C(count + 1, 2)`: annotator pairs where
//!   at least one applied `cat`
//!
//! The rate for a category is `agreement / potential` summed over all rows.
//! Both sums are additive per key, so rows can be sharded and merged freely.

use super::error::{AgreementError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use tracing::{debug, trace};

/// Number of unordered pairs among `n` items.
fn choose2(n: u64) -> u64 {
    n * n.saturating_sub(1) / 2
}

/// Pair counts accumulated for a single category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCounts {
    /// Annotator pairs where both applied the category.
    pub agreement: u64,
    /// Annotator pairs where at least one applied the category.
    pub potential: u64,
    /// Total number of times the category was applied.
    pub occurrences: u64,
    /// Number of rows containing the category at least once.
    pub items: u64,
}

impl PairCounts {
    /// Add the contribution of one row where the category appears `count`
    /// times among `row_len` labels.
    fn record(&mut self, count: u64, row_len: u64) {
        debug_assert!(count >= 1 && count <= row_len);
        self.agreement += choose2(count);
        self.potential += count * row_len - choose2(count + 1);
        self.occurrences += count;
        self.items += 1;
    }

    fn absorb(&mut self, other: &PairCounts) {
        self.agreement += other.agreement;
        self.potential += other.potential;
        self.occurrences += other.occurrences;
        self.items += other.items;
    }

    /// The agreement rate, or `Rate::Undefined` when no pair ever involved
    /// the category (every occurrence sat in a single-label row).
    pub fn rate(&self) -> Rate {
        if self.potential == 0 {
            Rate::Undefined
        } else {
            Rate::Defined(self.agreement as f64 / self.potential as f64)
        }
    }
}

/// Agreement rate of one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rate {
    /// `agreement / potential`, always within `[0, 1]`.
    Defined(f64),
    /// Zero potential pairs; serialized as `null`.
    Undefined,
}

impl Rate {
    pub fn value(self) -> Option<f64> {
        match self {
            Rate::Defined(v) => Some(v),
            Rate::Undefined => None,
        }
    }

    pub fn is_defined(self) -> bool {
        matches!(self, Rate::Defined(_))
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Forward so callers can pick precision with `{:.3}`.
            Rate::Defined(v) => fmt::Display::fmt(v, f),
            Rate::Undefined => f.write_str("undefined"),
        }
    }
}

/// What to do with categories whose rate is undefined.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum UndefinedPolicy {
    /// Keep the category and mark its rate as undefined
    #[default]
    Report,
    /// Drop the category from the result
    Omit,
}

impl fmt::Display for UndefinedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndefinedPolicy::Report => write!(f, "report"),
            UndefinedPolicy::Omit => write!(f, "omit"),
        }
    }
}

/// Accumulates pair counts row by row.
///
/// The calculator owns its accumulators; two calculators fed disjoint rows
/// can be combined with [`AgreementCalculator::merge`].
#[derive(Debug, Clone)]
pub struct AgreementCalculator<K> {
    counts: HashMap<K, PairCounts>,
    rows: u64,
}

impl<K: Eq + Hash + Clone> Default for AgreementCalculator<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> AgreementCalculator<K> {
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
            rows: 0,
        }
    }

    /// Add one row: the labels all annotators applied to a single item.
    ///
    /// Label order inside the row is irrelevant. Empty rows are counted but
    /// contribute nothing.
    pub fn add_row<'a, I>(&mut self, row: I)
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        let mut multiplicity: HashMap<&K, u64> = HashMap::new();
        let mut row_len = 0u64;

        for label in row {
            *multiplicity.entry(label).or_default() += 1;
            row_len += 1;
        }

        self.rows += 1;

        for (label, count) in multiplicity {
            self.counts
                .entry(label.clone())
                .or_default()
                .record(count, row_len);
        }
    }

    /// Combine with a calculator that saw a disjoint set of rows.
    pub fn merge(mut self, other: Self) -> Self {
        for (label, counts) in other.counts {
            self.counts.entry(label).or_default().absorb(&counts);
        }
        self.rows += other.rows;
        self
    }

    /// Pair counts accumulated so far, keyed by category.
    pub fn counts(&self) -> &HashMap<K, PairCounts> {
        &self.counts
    }

    /// Number of rows added so far, including empty ones.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn finish(self) -> AgreementResult<K> {
        AgreementResult {
            categories: self.counts,
            rows: self.rows,
        }
    }
}

/// Per-category outcome of an agreement computation.
#[derive(Debug, Clone)]
pub struct AgreementResult<K> {
    categories: HashMap<K, PairCounts>,
    rows: u64,
}

impl<K: Eq + Hash> PartialEq for AgreementResult<K> {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows && self.categories == other.categories
    }
}

impl<K: Eq + Hash + Clone> AgreementResult<K> {
    /// Pair counts for a category, if it was observed.
    pub fn get(&self, category: &K) -> Option<&PairCounts> {
        self.categories.get(category)
    }

    /// Rate for a category, if it was observed.
    pub fn rate(&self, category: &K) -> Option<Rate> {
        self.categories.get(category).map(PairCounts::rate)
    }

    /// Rates for every category in the result, undefined ones included.
    pub fn rates(&self) -> HashMap<K, Rate> {
        self.categories
            .iter()
            .map(|(k, c)| (k.clone(), c.rate()))
            .collect()
    }

    /// Rates for categories with at least one potential pair.
    pub fn defined_rates(&self) -> HashMap<K, f64> {
        self.categories
            .iter()
            .filter_map(|(k, c)| c.rate().value().map(|v| (k.clone(), v)))
            .collect()
    }

    /// Categories whose rate is undefined.
    pub fn undefined_categories(&self) -> Vec<&K> {
        self.categories
            .iter()
            .filter(|(_, c)| c.potential == 0)
            .map(|(k, _)| k)
            .collect()
    }

    /// Apply an undefined-rate policy.
    pub fn with_policy(mut self, policy: UndefinedPolicy) -> Self {
        if policy == UndefinedPolicy::Omit {
            let before = self.categories.len();
            self.categories.retain(|_, c| c.potential > 0);
            debug!(
                "Omitted {} categories with undefined rate",
                before - self.categories.len()
            );
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &PairCounts)> {
        self.categories.iter()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Number of rows the result was computed from.
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

/// Compute per-category agreement over all rows in a single pass.
pub fn compute_agreement<K, R>(rows: &[R]) -> AgreementResult<K>
where
    K: Eq + Hash + Clone,
    R: AsRef<[K]>,
{
    let mut calculator = AgreementCalculator::new();
    for row in rows {
        calculator.add_row(row.as_ref());
    }
    debug!(
        "Accumulated {} rows into {} categories",
        calculator.rows(),
        calculator.counts().len()
    );
    calculator.finish()
}

/// Compute per-category agreement on the current rayon pool, splitting the
/// rows into shards of `shard_rows` and merging the shard accumulators.
///
/// Produces exactly the same counts as [`compute_agreement`].
pub fn compute_agreement_parallel<K, R>(rows: &[R], shard_rows: usize) -> Result<AgreementResult<K>>
where
    K: Eq + Hash + Clone + Send + Sync,
    R: AsRef<[K]> + Sync,
{
    if shard_rows == 0 {
        return Err(AgreementError::InvalidShardSize);
    }

    let merged = rows
        .par_chunks(shard_rows)
        .map(|shard| {
            let mut calculator = AgreementCalculator::new();
            for row in shard {
                calculator.add_row(row.as_ref());
            }
            trace!("Shard of {} rows done", shard.len());
            calculator
        })
        .reduce(AgreementCalculator::<K>::new, AgreementCalculator::merge);

    debug!(
        "Merged {} rows into {} categories",
        merged.rows(),
        merged.counts().len()
    );
    Ok(merged.finish())
}

/// Compute per-category agreement using `threads` workers.
///
/// One thread (or none) runs the sequential path; otherwise a dedicated
/// rayon pool is built and rows are split into roughly four shards per
/// worker.
pub fn compute_agreement_with_threads<K, R>(rows: &[R], threads: usize) -> Result<AgreementResult<K>>
where
    K: Eq + Hash + Clone + Send + Sync,
    R: AsRef<[K]> + Sync,
{
    if threads <= 1 || rows.len() < 2 {
        return Ok(compute_agreement(rows));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| AgreementError::WorkerPool(e.to_string()))?;

    let shard_rows = (rows.len() / (threads * 4)).max(1);
    debug!("Using {} workers, {} rows per shard", threads, shard_rows);

    pool.install(|| compute_agreement_parallel(rows, shard_rows))
}
