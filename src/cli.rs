//! Command-line interface definitions and argument parsing

use clap::Parser;

use crate::impute::DistanceMetric;

/// Customer segmentation CLI using RFM scores and constrained neighbor imputation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file (customer_id, recency_days, frequency, monetary)
    #[arg(short, long, default_value = "customers.csv")]
    pub input: String,

    /// Output path for the segmented customer CSV
    #[arg(short, long, default_value = "segments.csv")]
    pub output: String,

    /// Optional JSON config file (rule table, meta-group thresholds, imputer)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Number of neighbors for imputation (overrides the config file)
    #[arg(short = 'k', long)]
    pub neighbors: Option<usize>,

    /// Distance metric for imputation: euclidean or manhattan (overrides the config file)
    #[arg(short, long)]
    pub metric: Option<String>,

    /// Optional CSV of the population used to derive quantile breakpoints
    /// (defaults to the input itself)
    #[arg(long)]
    pub quantile_source: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse the metric flag, if given.
    pub fn parse_metric(&self) -> crate::Result<Option<DistanceMetric>> {
        match &self.metric {
            Some(name) => Ok(Some(name.parse()?)),
            None => Ok(None),
        }
    }
}
