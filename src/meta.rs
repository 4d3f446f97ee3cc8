//! Coarse behavioral meta-groups for customers left without a profile.
//!
//! The fine rule table leaves roughly half of a realistic population
//! unmatched. Before imputation, each unmatched customer is assigned to
//! exactly one of three coarse buckets; the bucket limits which segments the
//! imputer may copy from, so a high-spend customer can never be folded into
//! a low-spend segment by raw score proximity.

use serde::{Deserialize, Serialize};

use crate::score::ScoredCustomer;
use crate::segment::Segment;

/// Coarse behavioral bucket for an unprofiled customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetaGroup {
    /// Has not purchased in a long time.
    Dormant,
    /// Purchased recently but only a few times.
    New,
    /// Buys with mid-to-high recency and frequency.
    Frequent,
}

impl MetaGroup {
    pub const ALL: [MetaGroup; 3] = [MetaGroup::Dormant, MetaGroup::New, MetaGroup::Frequent];

    pub fn name(&self) -> &'static str {
        match self {
            MetaGroup::Dormant => "Dormant",
            MetaGroup::New => "New",
            MetaGroup::Frequent => "Frequent",
        }
    }
}

/// Thresholds and imputation target sets for the meta-group partition.
///
/// The two thresholds define a total, disjoint partition of score space:
/// `r_score <= dormant_max_recency` is Dormant, otherwise
/// `f_score <= new_max_frequency` is New, everything else is Frequent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaGroupConfig {
    pub dormant_max_recency: u8,
    pub new_max_frequency: u8,
    pub dormant_targets: Vec<Segment>,
    pub new_targets: Vec<Segment>,
    pub frequent_targets: Vec<Segment>,
}

impl Default for MetaGroupConfig {
    fn default() -> Self {
        MetaGroupConfig {
            dormant_max_recency: 2,
            new_max_frequency: 2,
            dormant_targets: vec![Segment::DonJuan, Segment::BreakUps, Segment::ExLovers],
            new_targets: vec![
                Segment::PotentialLovers,
                Segment::Apprentice,
                Segment::NewPassions,
                Segment::Flirting,
            ],
            frequent_targets: vec![Segment::Soulmates, Segment::Lovers, Segment::PlatonicFriends],
        }
    }
}

impl MetaGroupConfig {
    /// Segments the imputer may copy labels from for the given group.
    pub fn targets(&self, group: MetaGroup) -> &[Segment] {
        match group {
            MetaGroup::Dormant => &self.dormant_targets,
            MetaGroup::New => &self.new_targets,
            MetaGroup::Frequent => &self.frequent_targets,
        }
    }

    /// Assign a score pair to its meta-group. Total over all score triples
    /// and disjoint by construction.
    pub fn assign(&self, r_score: u8, f_score: u8) -> MetaGroup {
        if r_score <= self.dormant_max_recency {
            MetaGroup::Dormant
        } else if f_score <= self.new_max_frequency {
            MetaGroup::New
        } else {
            MetaGroup::Frequent
        }
    }

    /// Fail fast on a partition that could misroute or strand customers.
    pub fn validate(&self) -> crate::Result<()> {
        for (name, threshold) in [
            ("dormant_max_recency", self.dormant_max_recency),
            ("new_max_frequency", self.new_max_frequency),
        ] {
            if !(1..=4).contains(&threshold) {
                anyhow::bail!(
                    "meta-group threshold {} must be within 1-4, got {}",
                    name,
                    threshold
                );
            }
        }

        for group in MetaGroup::ALL {
            if self.targets(group).is_empty() {
                anyhow::bail!("meta-group {} has an empty imputation target set", group.name());
            }
        }

        // Overlapping target sets would make the partition ambiguous.
        for (i, a) in MetaGroup::ALL.iter().enumerate() {
            for b in MetaGroup::ALL.iter().skip(i + 1) {
                for segment in self.targets(*a) {
                    if self.targets(*b).contains(segment) {
                        anyhow::bail!(
                            "segment '{}' appears in target sets of both {} and {}",
                            segment,
                            a.name(),
                            b.name()
                        );
                    }
                }
            }
        }

        Ok(())
    }
}

/// Pair every unprofiled customer with its meta-group.
pub fn partition(
    unclassified: Vec<ScoredCustomer>,
    config: &MetaGroupConfig,
) -> Vec<(ScoredCustomer, MetaGroup)> {
    unclassified
        .into_iter()
        .map(|scored| {
            let group = config.assign(scored.r_score, scored.f_score);
            (scored, group)
        })
        .collect()
}
