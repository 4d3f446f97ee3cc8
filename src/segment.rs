//! Segment rule table and first-match classifier.
//!
//! The rule table follows the OmniConvert-style customer archetypes. Rules
//! may overlap in score space and deliberately do not cover all 125 score
//! triples; evaluation order is part of the configuration, and customers
//! matching no rule are left without a profile for the imputation stage.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::score::ScoredCustomer;

/// The eleven named marketing segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    Soulmates,
    Lovers,
    #[serde(rename = "Potential Lovers")]
    PotentialLovers,
    #[serde(rename = "New Passions")]
    NewPassions,
    Flirting,
    Apprentice,
    #[serde(rename = "Platonic Friends")]
    PlatonicFriends,
    #[serde(rename = "About to Dump You")]
    AboutToDumpYou,
    #[serde(rename = "Ex Lovers")]
    ExLovers,
    #[serde(rename = "Don Juan")]
    DonJuan,
    #[serde(rename = "Break-Ups")]
    BreakUps,
}

impl Segment {
    pub const ALL: [Segment; 11] = [
        Segment::Soulmates,
        Segment::Lovers,
        Segment::PotentialLovers,
        Segment::NewPassions,
        Segment::Flirting,
        Segment::Apprentice,
        Segment::PlatonicFriends,
        Segment::AboutToDumpYou,
        Segment::ExLovers,
        Segment::DonJuan,
        Segment::BreakUps,
    ];

    /// Human-readable segment name, as used in reports and CSV output.
    pub fn name(&self) -> &'static str {
        match self {
            Segment::Soulmates => "Soulmates",
            Segment::Lovers => "Lovers",
            Segment::PotentialLovers => "Potential Lovers",
            Segment::NewPassions => "New Passions",
            Segment::Flirting => "Flirting",
            Segment::Apprentice => "Apprentice",
            Segment::PlatonicFriends => "Platonic Friends",
            Segment::AboutToDumpYou => "About to Dump You",
            Segment::ExLovers => "Ex Lovers",
            Segment::DonJuan => "Don Juan",
            Segment::BreakUps => "Break-Ups",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the classifier table: a segment plus three inclusive score
/// ranges `(min, max)` over the R/F/M scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRule {
    pub segment: Segment,
    pub recency: (u8, u8),
    pub frequency: (u8, u8),
    pub monetary: (u8, u8),
}

impl SegmentRule {
    fn new(segment: Segment, recency: (u8, u8), frequency: (u8, u8), monetary: (u8, u8)) -> Self {
        SegmentRule {
            segment,
            recency,
            frequency,
            monetary,
        }
    }

    /// Whether all three score ranges contain the customer's scores.
    pub fn matches(&self, scored: &ScoredCustomer) -> bool {
        contains(self.recency, scored.r_score)
            && contains(self.frequency, scored.f_score)
            && contains(self.monetary, scored.m_score)
    }
}

fn contains(range: (u8, u8), value: u8) -> bool {
    range.0 <= value && value <= range.1
}

/// The default rule table, in evaluation order.
///
/// Potential Lovers precedes New Passions so that an R5/F1/M5 customer lands
/// on the more specific profile; the two rules overlap at M=5.
pub fn default_rules() -> Vec<SegmentRule> {
    vec![
        SegmentRule::new(Segment::Soulmates, (5, 5), (5, 5), (5, 5)),
        SegmentRule::new(Segment::Lovers, (4, 5), (3, 5), (3, 5)),
        SegmentRule::new(Segment::PotentialLovers, (5, 5), (1, 1), (5, 5)),
        SegmentRule::new(Segment::NewPassions, (5, 5), (1, 1), (4, 5)),
        SegmentRule::new(Segment::Flirting, (4, 4), (1, 1), (4, 4)),
        SegmentRule::new(Segment::Apprentice, (4, 5), (1, 1), (1, 1)),
        SegmentRule::new(Segment::PlatonicFriends, (3, 4), (3, 3), (3, 4)),
        SegmentRule::new(Segment::AboutToDumpYou, (2, 3), (1, 5), (1, 5)),
        SegmentRule::new(Segment::ExLovers, (1, 1), (5, 5), (5, 5)),
        SegmentRule::new(Segment::DonJuan, (1, 1), (1, 1), (5, 5)),
        SegmentRule::new(Segment::BreakUps, (1, 1), (2, 2), (1, 1)),
    ]
}

/// Validate a rule table before any customer is processed.
pub fn validate_rules(rules: &[SegmentRule]) -> crate::Result<()> {
    if rules.is_empty() {
        anyhow::bail!("segment rule table is empty");
    }
    for rule in rules {
        for (dimension, range) in [
            ("recency", rule.recency),
            ("frequency", rule.frequency),
            ("monetary", rule.monetary),
        ] {
            if range.0 < 1 || range.1 > 5 || range.0 > range.1 {
                anyhow::bail!(
                    "rule for segment '{}' has invalid {} score range {}-{} (must be within 1-5, min <= max)",
                    rule.segment,
                    dimension,
                    range.0,
                    range.1
                );
            }
        }
    }
    Ok(())
}

/// A scored customer with its rule-table outcome. `None` means no rule
/// matched ("No Profile").
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedCustomer {
    pub scored: ScoredCustomer,
    pub segment: Option<Segment>,
}

/// First rule whose three ranges all contain the customer's scores.
pub fn classify_one(scored: &ScoredCustomer, rules: &[SegmentRule]) -> Option<Segment> {
    rules.iter().find(|rule| rule.matches(scored)).map(|rule| rule.segment)
}

/// Classify every customer against the rule table, preserving order.
///
/// Classification is per-row and order-independent: shuffling the input only
/// shuffles the output.
pub fn classify(scored: &[ScoredCustomer], rules: &[SegmentRule]) -> Vec<ClassifiedCustomer> {
    scored
        .iter()
        .map(|s| ClassifiedCustomer {
            scored: s.clone(),
            segment: classify_one(s, rules),
        })
        .collect()
}
