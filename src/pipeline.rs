//! Batch segmentation pipeline.
//!
//! Data flows strictly forward: raw RFM -> scores -> rule match ->
//! (if unmatched) meta-group -> constrained neighbor search -> final label.
//! Each stage produces a new table; a run is deterministic and idempotent
//! over an unchanged input.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::data::CustomerRfm;
use crate::impute::{impute, FinalCustomer, SegmentAssignment};
use crate::meta::partition;
use crate::score::ScoreBins;
use crate::segment::classify;

/// Run the full segmentation over one customer table, deriving the quantile
/// breakpoints from the same table.
pub fn run(customers: &[CustomerRfm], config: &EngineConfig) -> crate::Result<Vec<FinalCustomer>> {
    run_with_quantile_source(customers, customers, config)
}

/// Run the full segmentation with a separate quantile-source population.
///
/// Output preserves the input row order. Unresolved imputations are reported
/// in the output rows; they never abort the run.
pub fn run_with_quantile_source(
    customers: &[CustomerRfm],
    quantile_source: &[CustomerRfm],
    config: &EngineConfig,
) -> crate::Result<Vec<FinalCustomer>> {
    config.validate()?;
    validate_input(customers)?;

    if customers.is_empty() {
        return Ok(Vec::new());
    }

    // Stage 1: scores.
    let bins = ScoreBins::from_population(quantile_source)?;
    let scored = bins.score_all(customers);

    // Stage 2: rule table.
    let classified = classify(&scored, &config.rules);
    let (matched, unmatched): (Vec<_>, Vec<_>) =
        classified.into_iter().partition(|c| c.segment.is_some());
    info!(
        "{} of {} customers matched a segment rule directly",
        matched.len(),
        customers.len()
    );

    // Stage 3: meta-groups for the leftovers.
    let unprofiled: Vec<_> = unmatched.into_iter().map(|c| c.scored).collect();
    let with_groups = partition(unprofiled, &config.meta);
    debug!("{} customers routed to meta-groups for imputation", with_groups.len());

    // Stage 4: constrained neighbor imputation.
    let imputed = impute(&with_groups, &matched, &config.meta, &config.impute);
    let unresolved = imputed
        .iter()
        .filter(|c| c.assignment == SegmentAssignment::Unresolved)
        .count();
    if unresolved > 0 {
        warn!(
            "{} customers left unresolved: their meta-group has no classified members",
            unresolved
        );
    }

    // Reassemble in input order.
    let mut by_id: HashMap<i64, FinalCustomer> = HashMap::with_capacity(customers.len());
    for c in &matched {
        let segment = match c.segment {
            Some(segment) => segment,
            None => continue,
        };
        by_id.insert(
            c.scored.customer_id,
            FinalCustomer::from_scored(&c.scored, SegmentAssignment::Matched(segment)),
        );
    }
    for c in imputed {
        by_id.insert(c.customer_id, c);
    }

    let mut output = Vec::with_capacity(customers.len());
    for customer in customers {
        match by_id.remove(&customer.customer_id) {
            Some(final_customer) => output.push(final_customer),
            None => anyhow::bail!(
                "internal error: customer {} lost during segmentation",
                customer.customer_id
            ),
        }
    }
    Ok(output)
}

/// Input contract checks: unique ids, non-negative measures.
fn validate_input(customers: &[CustomerRfm]) -> crate::Result<()> {
    let mut seen = HashSet::with_capacity(customers.len());
    for c in customers {
        if !seen.insert(c.customer_id) {
            anyhow::bail!("duplicate customer_id {} in input", c.customer_id);
        }
        if c.recency_days < 0 || c.frequency < 0 || c.monetary < 0.0 || !c.monetary.is_finite() {
            anyhow::bail!(
                "customer {} has invalid RFM measures (recency_days={}, frequency={}, monetary={})",
                c.customer_id,
                c.recency_days,
                c.frequency,
                c.monetary
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segment;

    fn customer(id: i64, recency_days: i64, frequency: i64, monetary: f64) -> CustomerRfm {
        CustomerRfm {
            customer_id: id,
            recency_days,
            frequency,
            monetary,
        }
    }

    /// Ten customers whose quantile breakpoints work out to
    /// frequency [2.8, 4.6, 6.4, 8.2] and monetary [280, 460, 640, 820].
    fn fixture() -> Vec<CustomerRfm> {
        vec![
            customer(1, 30, 10, 1000.0),  // (5,5,5) Soulmates
            customer(2, 400, 1, 900.0),   // (1,1,5) Don Juan
            customer(3, 100, 2, 100.0),   // (4,1,1) Apprentice
            customer(4, 200, 5, 500.0),   // (3,3,3) Platonic Friends
            customer(5, 30, 9, 800.0),    // (5,5,4) Lovers
            customer(6, 500, 3, 200.0),   // (1,2,1) Break-Ups
            customer(7, 95, 4, 300.0),    // (4,2,2) no profile -> New
            customer(8, 10, 6, 400.0),    // (5,3,2) no profile -> Frequent
            customer(9, 300, 7, 600.0),   // (2,4,3) About to Dump You
            customer(10, 600, 8, 700.0),  // (1,4,4) no profile -> Dormant
        ]
    }

    fn segment_of(output: &[FinalCustomer], id: i64) -> Option<Segment> {
        output
            .iter()
            .find(|c| c.customer_id == id)
            .and_then(|c| c.assignment.segment())
    }

    #[test]
    fn test_full_run_assigns_every_customer() {
        let config = EngineConfig::default();
        let output = run(&fixture(), &config).unwrap();

        assert_eq!(output.len(), 10);
        for c in &output {
            assert_ne!(c.assignment, SegmentAssignment::Unresolved);
            assert!((1..=5).contains(&c.r_score));
            assert!((1..=5).contains(&c.f_score));
            assert!((1..=5).contains(&c.m_score));
        }
    }

    #[test]
    fn test_direct_rule_matches() {
        let config = EngineConfig::default();
        let output = run(&fixture(), &config).unwrap();

        assert_eq!(segment_of(&output, 1), Some(Segment::Soulmates));
        assert_eq!(segment_of(&output, 2), Some(Segment::DonJuan));
        assert_eq!(segment_of(&output, 3), Some(Segment::Apprentice));
        assert_eq!(segment_of(&output, 4), Some(Segment::PlatonicFriends));
        assert_eq!(segment_of(&output, 5), Some(Segment::Lovers));
        assert_eq!(segment_of(&output, 6), Some(Segment::BreakUps));
        assert_eq!(segment_of(&output, 9), Some(Segment::AboutToDumpYou));
    }

    #[test]
    fn test_imputed_customers_stay_in_their_meta_group() {
        let config = EngineConfig::default();
        let output = run(&fixture(), &config).unwrap();

        // Customer 7 is New: only New targets are legal.
        assert_eq!(segment_of(&output, 7), Some(Segment::Apprentice));
        // Customer 8 is Frequent: nearest Frequent-eligible member is the
        // Platonic Friends customer.
        assert_eq!(segment_of(&output, 8), Some(Segment::PlatonicFriends));
        // Customer 10 is Dormant: the Don Juan customer is the nearest of
        // the Dormant-eligible members.
        assert_eq!(segment_of(&output, 10), Some(Segment::DonJuan));

        for id in [7, 8, 10] {
            let c = output.iter().find(|c| c.customer_id == id).unwrap();
            assert!(c.assignment.is_imputed());
        }
        for id in [1, 2, 3, 4, 5, 6, 9] {
            let c = output.iter().find(|c| c.customer_id == id).unwrap();
            assert!(!c.assignment.is_imputed());
        }
    }

    #[test]
    fn test_output_preserves_input_order() {
        let config = EngineConfig::default();
        let mut input = fixture();
        input.reverse();
        let output = run(&input, &config).unwrap();

        let input_ids: Vec<i64> = input.iter().map(|c| c.customer_id).collect();
        let output_ids: Vec<i64> = output.iter().map(|c| c.customer_id).collect();
        assert_eq!(input_ids, output_ids);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let config = EngineConfig::default();
        let first = run(&fixture(), &config).unwrap();
        let second = run(&fixture(), &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_row_order_does_not_change_assignments() {
        let config = EngineConfig::default();
        let forward = run(&fixture(), &config).unwrap();
        let mut reversed_input = fixture();
        reversed_input.reverse();
        let backward = run(&reversed_input, &config).unwrap();

        for c in &forward {
            let other = backward
                .iter()
                .find(|b| b.customer_id == c.customer_id)
                .unwrap();
            assert_eq!(c.assignment, other.assignment);
        }
    }

    #[test]
    fn test_separate_quantile_source() {
        let config = EngineConfig::default();
        let population = fixture();
        let subset = vec![population[0].clone(), population[1].clone()];

        // Scoring two customers against the full population's quantiles
        // must match their scores from the full run.
        let output = run_with_quantile_source(&subset, &population, &config).unwrap();
        let full = run(&population, &config).unwrap();

        for c in &output {
            let reference = full.iter().find(|f| f.customer_id == c.customer_id).unwrap();
            assert_eq!(
                (c.r_score, c.f_score, c.m_score),
                (reference.r_score, reference.f_score, reference.m_score)
            );
        }
    }

    #[test]
    fn test_unresolved_does_not_abort_run() {
        let config = EngineConfig::default();
        // Every customer is Dormant-leaning and none matches a Dormant
        // target rule, so imputation has an empty pool for them.
        let input = vec![
            customer(1, 30, 10, 1000.0), // (5,5,5) Soulmates
            customer(2, 30, 9, 900.0),   // (5,5,5) Soulmates
            customer(3, 500, 5, 500.0),  // dormant, no profile
            customer(4, 600, 6, 600.0),  // dormant, no profile
            customer(5, 90, 7, 700.0),
            customer(6, 30, 8, 100.0),
            customer(7, 30, 1, 200.0),
            customer(8, 30, 2, 300.0),
            customer(9, 30, 3, 400.0),
            customer(10, 30, 4, 800.0),
        ];

        let output = run(&input, &config).unwrap();
        assert_eq!(output.len(), 10);
        let unresolved: Vec<i64> = output
            .iter()
            .filter(|c| c.assignment == SegmentAssignment::Unresolved)
            .map(|c| c.customer_id)
            .collect();
        assert!(unresolved.contains(&3));
        assert!(unresolved.contains(&4));
    }

    #[test]
    fn test_duplicate_ids_fail_fast() {
        let config = EngineConfig::default();
        let mut input = fixture();
        input[1].customer_id = 1;
        assert!(run(&input, &config).is_err());
    }

    #[test]
    fn test_negative_measures_fail_fast() {
        let config = EngineConfig::default();
        let mut input = fixture();
        input[0].monetary = -1.0;
        assert!(run(&input, &config).is_err());
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        let config = EngineConfig::default();
        let output = run(&[], &config).unwrap();
        assert!(output.is_empty());
    }
}
