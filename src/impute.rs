//! Constrained nearest-neighbor imputation for unprofiled customers.
//!
//! A plain k-NN over score space can hand a high-spend customer to a
//! low-spend segment because it happens to sit close in an unrelated
//! dimension. The imputer therefore restricts each customer's candidate pool
//! to the segments eligible for its meta-group and only searches inside that
//! pool. When the pool is empty the customer stays explicitly unresolved
//! instead of silently falling back to the full population.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::meta::{MetaGroup, MetaGroupConfig};
use crate::score::ScoredCustomer;
use crate::segment::{ClassifiedCustomer, Segment};

/// Distance over integer score triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Squared Euclidean distance. Same neighbor ordering as Euclidean, but
    /// stays in integer arithmetic.
    Euclidean,
    /// Sum of absolute score differences.
    Manhattan,
}

impl DistanceMetric {
    pub fn between(self, a: [i64; 3], b: [i64; 3]) -> i64 {
        match self {
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum(),
            DistanceMetric::Manhattan => {
                a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
            }
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean" => Ok(DistanceMetric::Euclidean),
            "manhattan" => Ok(DistanceMetric::Manhattan),
            other => anyhow::bail!("unknown distance metric '{}' (expected 'euclidean' or 'manhattan')", other),
        }
    }
}

/// Imputer parameters. `k = 1` copies the single nearest label; `k > 1`
/// majority-votes over the k nearest neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImputeParams {
    pub k: usize,
    pub metric: DistanceMetric,
}

impl Default for ImputeParams {
    fn default() -> Self {
        ImputeParams {
            k: 1,
            metric: DistanceMetric::Euclidean,
        }
    }
}

impl ImputeParams {
    pub fn validate(&self) -> crate::Result<()> {
        if self.k == 0 {
            anyhow::bail!("neighbor count k must be at least 1");
        }
        Ok(())
    }
}

/// How a customer received its final segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentAssignment {
    /// Matched a rule in the classifier table directly.
    Matched(Segment),
    /// Copied from the nearest eligible classified neighbor(s).
    Imputed(Segment),
    /// No classified customer exists in the eligible segments; left
    /// unresolved rather than matched outside the meta-group.
    Unresolved,
}

impl SegmentAssignment {
    pub fn segment(self) -> Option<Segment> {
        match self {
            SegmentAssignment::Matched(s) | SegmentAssignment::Imputed(s) => Some(s),
            SegmentAssignment::Unresolved => None,
        }
    }

    pub fn is_imputed(self) -> bool {
        matches!(self, SegmentAssignment::Imputed(_))
    }

    /// Output label: the segment name, or the explicit unresolved marker.
    pub fn label(self) -> &'static str {
        match self {
            SegmentAssignment::Matched(s) | SegmentAssignment::Imputed(s) => s.name(),
            SegmentAssignment::Unresolved => "Unresolved",
        }
    }
}

/// Final per-customer output row.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalCustomer {
    pub customer_id: i64,
    pub r_score: u8,
    pub f_score: u8,
    pub m_score: u8,
    pub assignment: SegmentAssignment,
}

impl FinalCustomer {
    pub fn from_scored(scored: &ScoredCustomer, assignment: SegmentAssignment) -> Self {
        FinalCustomer {
            customer_id: scored.customer_id,
            r_score: scored.r_score,
            f_score: scored.f_score,
            m_score: scored.m_score,
            assignment,
        }
    }
}

/// A classified pool member, pre-projected for neighbor search.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    scores: [i64; 3],
    customer_id: i64,
    segment: Segment,
}

/// Impute a segment for every unprofiled customer.
///
/// For each `(customer, meta-group)` pair the candidate pool is the subset of
/// `pool` whose segment is eligible for that meta-group. Neighbors are ranked
/// by `(distance, customer_id)` so equidistant candidates resolve to the
/// lowest id, independent of input order. With `k > 1` the most frequent
/// segment among the k nearest wins; a tied vote goes to the tied segment
/// whose closest representative ranks first.
pub fn impute(
    unclassified: &[(ScoredCustomer, MetaGroup)],
    pool: &[ClassifiedCustomer],
    meta: &MetaGroupConfig,
    params: &ImputeParams,
) -> Vec<FinalCustomer> {
    let pools = split_pool(pool, meta);

    unclassified
        .iter()
        .map(|(scored, group)| {
            let candidates = &pools[pool_index(*group)];
            let assignment = match nearest_segment(scored, candidates, params) {
                Some(segment) => SegmentAssignment::Imputed(segment),
                None => SegmentAssignment::Unresolved,
            };
            FinalCustomer::from_scored(scored, assignment)
        })
        .collect()
}

fn pool_index(group: MetaGroup) -> usize {
    match group {
        MetaGroup::Dormant => 0,
        MetaGroup::New => 1,
        MetaGroup::Frequent => 2,
    }
}

/// Split the classified pool into the three per-group candidate lists.
fn split_pool(pool: &[ClassifiedCustomer], meta: &MetaGroupConfig) -> [Vec<Candidate>; 3] {
    let mut pools: [Vec<Candidate>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for member in pool {
        let segment = match member.segment {
            Some(segment) => segment,
            None => continue,
        };
        let candidate = Candidate {
            scores: member.scored.score_vector(),
            customer_id: member.scored.customer_id,
            segment,
        };
        for group in MetaGroup::ALL {
            if meta.targets(group).contains(&segment) {
                pools[pool_index(group)].push(candidate);
            }
        }
    }
    pools
}

/// Nearest-neighbor vote inside one candidate pool. `None` when the pool is
/// empty.
fn nearest_segment(
    scored: &ScoredCustomer,
    candidates: &[Candidate],
    params: &ImputeParams,
) -> Option<Segment> {
    if candidates.is_empty() {
        return None;
    }

    let origin = scored.score_vector();
    let mut neighbors: Vec<(i64, i64, Segment)> = candidates
        .iter()
        .map(|c| (params.metric.between(origin, c.scores), c.customer_id, c.segment))
        .collect();
    neighbors.sort_by_key(|&(distance, customer_id, _)| (distance, customer_id));
    neighbors.truncate(params.k);

    let mut votes: HashMap<Segment, usize> = HashMap::new();
    for &(_, _, segment) in &neighbors {
        *votes.entry(segment).or_insert(0) += 1;
    }
    let max_votes = votes.values().copied().max().unwrap_or(0);

    // Neighbors are already in (distance, id) order, so the first holder of
    // the winning vote count is the deterministic tie-break.
    neighbors
        .iter()
        .find(|(_, _, segment)| votes[segment] == max_votes)
        .map(|&(_, _, segment)| segment)
}
