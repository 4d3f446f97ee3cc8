//! RFM score binning: raw measures to discrete 1-5 scores.
//!
//! Recency uses fixed calendar cutoffs (quarterly intervals work well for
//! fashion e-commerce purchase cycles). Frequency and monetary cutoffs are
//! quantile-derived from a reference population, so they adapt to the data
//! instead of being hard-coded.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::data::CustomerRfm;

/// Quantile levels that split frequency/monetary into five buckets.
pub const QUANTILE_LEVELS: [f64; 4] = [0.2, 0.4, 0.6, 0.8];

/// Default recency cutoffs in days: quarterly breaks up to one year.
pub const DEFAULT_RECENCY_CUTOFFS: [i64; 4] = [90, 180, 270, 365];

/// Minimum distinct values required per dimension for quantiles to be defined.
const MIN_DISTINCT_VALUES: usize = 5;

/// Score breakpoints for all three RFM dimensions.
///
/// Breakpoints are explicit data so tests can supply deterministic fixtures
/// and callers can score against a population different from the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBins {
    /// Recency cutoffs in days, ascending. Fewer days = higher score.
    pub recency_days: [i64; 4],
    /// Frequency breakpoints, ascending. Higher frequency = higher score.
    pub frequency: [f64; 4],
    /// Monetary breakpoints, ascending. Higher spend = higher score.
    pub monetary: [f64; 4],
}

/// A customer with its raw RFM measures and derived 1-5 scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCustomer {
    pub customer_id: i64,
    pub recency_days: i64,
    pub frequency: i64,
    pub monetary: f64,
    pub r_score: u8,
    pub f_score: u8,
    pub m_score: u8,
}

impl ScoredCustomer {
    /// Score triple as integers, for distance computations.
    pub fn score_vector(&self) -> [i64; 3] {
        [self.r_score as i64, self.f_score as i64, self.m_score as i64]
    }
}

impl ScoreBins {
    /// Derive breakpoints from a reference population.
    ///
    /// Recency keeps the fixed calendar cutoffs; frequency and monetary
    /// breakpoints are the 20/40/60/80th percentiles of the population.
    /// Errors when a dimension has fewer than 5 distinct values, since the
    /// quantile split is undefined there.
    pub fn from_population(population: &[CustomerRfm]) -> crate::Result<Self> {
        let frequency: Vec<f64> = population.iter().map(|c| c.frequency as f64).collect();
        let monetary: Vec<f64> = population.iter().map(|c| c.monetary).collect();

        let bins = ScoreBins {
            recency_days: DEFAULT_RECENCY_CUTOFFS,
            frequency: quantile_breakpoints(&frequency, "frequency")?,
            monetary: quantile_breakpoints(&monetary, "monetary")?,
        };

        debug!(
            "derived score bins: frequency={:?}, monetary={:?}",
            bins.frequency, bins.monetary
        );

        Ok(bins)
    }

    /// Score a single customer against these breakpoints.
    pub fn score(&self, customer: &CustomerRfm) -> ScoredCustomer {
        ScoredCustomer {
            customer_id: customer.customer_id,
            recency_days: customer.recency_days,
            frequency: customer.frequency,
            monetary: customer.monetary,
            r_score: self.recency_score(customer.recency_days),
            f_score: quantile_score(customer.frequency as f64, &self.frequency),
            m_score: quantile_score(customer.monetary, &self.monetary),
        }
    }

    /// Score every customer in the slice, preserving order.
    pub fn score_all(&self, customers: &[CustomerRfm]) -> Vec<ScoredCustomer> {
        customers.iter().map(|c| self.score(c)).collect()
    }

    /// Recency score: most recent purchases get 5, oldest get 1.
    ///
    /// Boundary semantics: `[0, c1) -> 5`, `[c1, c2] -> 4`, `(c2, c3] -> 3`,
    /// `(c3, c4] -> 2`, `(c4, inf) -> 1`. A customer exactly at the first
    /// cutoff rounds down to 4.
    fn recency_score(&self, days: i64) -> u8 {
        let [c1, c2, c3, c4] = self.recency_days;
        if days < c1 {
            5
        } else if days <= c2 {
            4
        } else if days <= c3 {
            3
        } else if days <= c4 {
            2
        } else {
            1
        }
    }
}

/// Score a value against ascending quantile breakpoints.
///
/// A value exactly on an interior breakpoint takes the higher score; the top
/// breakpoint itself still belongs to score 4, only values strictly above it
/// reach 5.
fn quantile_score(value: f64, breaks: &[f64; 4]) -> u8 {
    if value < breaks[0] {
        1
    } else if value < breaks[1] {
        2
    } else if value < breaks[2] {
        3
    } else if value <= breaks[3] {
        4
    } else {
        5
    }
}

/// Compute the 20/40/60/80th percentiles of `values` with linear interpolation.
fn quantile_breakpoints(values: &[f64], dimension: &str) -> crate::Result<[f64; 4]> {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut distinct = 0usize;
    for (i, v) in sorted.iter().enumerate() {
        if i == 0 || *v != sorted[i - 1] {
            distinct += 1;
        }
    }
    if distinct < MIN_DISTINCT_VALUES {
        anyhow::bail!(
            "cannot derive quantile breakpoints for {}: {} distinct values found, at least {} required",
            dimension,
            distinct,
            MIN_DISTINCT_VALUES
        );
    }

    let mut breaks = [0.0; 4];
    for (i, q) in QUANTILE_LEVELS.iter().enumerate() {
        breaks[i] = quantile(&sorted, *q);
    }
    Ok(breaks)
}

/// Linear-interpolation quantile over a sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
