//! SegmentForge: customer segmentation engine built on RFM scoring
//!
//! Converts per-customer RFM (Recency, Frequency, Monetary) measures into
//! discrete 1-5 scores, matches score triples against an ordered table of
//! named marketing segments, and recovers labels for unmatched customers
//! with a meta-group constrained nearest-neighbor step.

pub mod cli;
pub mod config;
pub mod data;
pub mod impute;
pub mod meta;
pub mod pipeline;
pub mod score;
pub mod segment;

// Re-export public items for easier access
pub use cli::Args;
pub use config::EngineConfig;
pub use data::{load_customers, write_segments, CustomerRfm};
pub use impute::{DistanceMetric, FinalCustomer, ImputeParams, SegmentAssignment};
pub use meta::{partition, MetaGroup, MetaGroupConfig};
pub use pipeline::{run, run_with_quantile_source};
pub use score::{ScoreBins, ScoredCustomer};
pub use segment::{classify, default_rules, ClassifiedCustomer, Segment, SegmentRule};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
