//! SegmentForge: Customer Segmentation CLI using RFM scoring
//!
//! This is the main entrypoint that orchestrates data loading, scoring,
//! rule classification, constrained imputation, and output writing.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use segmentforge::{
    load_customers, pipeline, write_segments, Args, EngineConfig, FinalCustomer, SegmentAssignment,
};

fn main() -> Result<()> {
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();

    if args.verbose {
        println!("SegmentForge - Customer Segmentation using RFM scores");
        println!("=====================================================\n");
    }

    run_full_pipeline(&args)
}

/// Run the full segmentation pipeline
fn run_full_pipeline(args: &Args) -> Result<()> {
    println!("=== Segmentation Pipeline ===\n");

    let start_time = Instant::now();

    // Step 1: Load and validate the customer table
    if args.verbose {
        println!("Step 1: Loading customer data");
        println!("  Input file: {}", args.input);
    }

    let data_start = Instant::now();
    let customers = load_customers(&args.input)?;
    let quantile_source = match &args.quantile_source {
        Some(path) => Some(load_customers(path)?),
        None => None,
    };
    let data_time = data_start.elapsed();

    println!("✓ Data loaded: {} customers", customers.len());
    if args.verbose {
        println!("  Loading time: {:.2}s", data_time.as_secs_f64());
        if let Some(source) = &quantile_source {
            println!("  Quantile source: {} customers", source.len());
        }
    }

    // Step 2: Assemble configuration
    let config = build_config(args)?;
    if args.verbose {
        println!("\nStep 2: Configuration");
        println!("  Segment rules: {}", config.rules.len());
        println!("  Neighbors (k): {}", config.impute.k);
        println!("  Distance metric: {:?}", config.impute.metric);
    }

    // Step 3: Run the engine
    let engine_start = Instant::now();
    let output = match &quantile_source {
        Some(source) => pipeline::run_with_quantile_source(&customers, source, &config)?,
        None => pipeline::run(&customers, &config)?,
    };
    let engine_time = engine_start.elapsed();

    println!("✓ Segmentation complete");
    if args.verbose {
        println!("  Engine time: {:.2}s", engine_time.as_secs_f64());
    }

    // Step 4: Print segment statistics
    print_statistics(&output);

    // Step 5: Write the output table
    let write_start = Instant::now();
    write_segments(&args.output, &output)?;
    let write_time = write_start.elapsed();

    println!("\n✓ Segments written to: {}", args.output);
    if args.verbose {
        println!("  Write time: {:.2}s", write_time.as_secs_f64());
    }

    let total_time = start_time.elapsed();
    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", total_time.as_secs_f64());

    Ok(())
}

/// Load the config file if given and apply CLI overrides.
fn build_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(Path::new(path))?,
        None => EngineConfig::default(),
    };
    if let Some(k) = args.neighbors {
        config.impute.k = k;
    }
    if let Some(metric) = args.parse_metric()? {
        config.impute.metric = metric;
    }
    config.validate()?;
    Ok(config)
}

/// Print segment distribution and assignment-source counts.
fn print_statistics(output: &[FinalCustomer]) {
    let total = output.len().max(1);

    println!("\n=== Segment Distribution ===");
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for customer in output {
        *counts.entry(customer.assignment.label()).or_insert(0) += 1;
    }
    let mut rows: Vec<(&str, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    for (label, count) in rows {
        let percentage = (count as f64 / total as f64) * 100.0;
        println!("{label}: {count} customers ({percentage:.1}%)");
    }

    let matched = output
        .iter()
        .filter(|c| matches!(c.assignment, SegmentAssignment::Matched(_)))
        .count();
    let imputed = output.iter().filter(|c| c.assignment.is_imputed()).count();
    let unresolved = output
        .iter()
        .filter(|c| c.assignment == SegmentAssignment::Unresolved)
        .count();

    println!("\nDirect rule matches: {matched}");
    println!("Imputed via nearest eligible neighbor: {imputed}");
    if unresolved > 0 {
        println!("Unresolved (empty eligible pool): {unresolved}");
    }
}
