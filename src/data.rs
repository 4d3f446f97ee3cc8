//! Customer table loading and result writing using Polars
//!
//! The engine itself works on in-memory rows; this module is the CSV
//! boundary for the CLI. Loading validates the input contract up front:
//! required columns present, no missing or non-numeric cells, no negative
//! measures, no duplicate customer ids.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use anyhow::Context;
use polars::prelude::*;

use crate::impute::FinalCustomer;

/// One customer's raw RFM measures, the engine's input row.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRfm {
    pub customer_id: i64,
    /// Days since last purchase.
    pub recency_days: i64,
    /// Number of purchases observed.
    pub frequency: i64,
    /// Total amount spent.
    pub monetary: f64,
}

/// Load a customer RFM table from CSV.
///
/// Expects `customer_id, recency_days, frequency, monetary` columns.
pub fn load_customers(path: &str) -> crate::Result<Vec<CustomerRfm>> {
    let df = CsvReader::from_path(path)
        .with_context(|| format!("failed to open input file: {path}"))?
        .has_header(true)
        .finish()
        .with_context(|| format!("failed to parse CSV: {path}"))?;

    customers_from_dataframe(&df).with_context(|| format!("invalid customer table: {path}"))
}

/// Convert a customer DataFrame into validated engine rows.
pub fn customers_from_dataframe(df: &DataFrame) -> crate::Result<Vec<CustomerRfm>> {
    let ids = int_column(df, "customer_id")?;
    let recency = int_column(df, "recency_days")?;
    let frequency = int_column(df, "frequency")?;
    let monetary = float_column(df, "monetary")?;

    let mut seen = HashSet::with_capacity(ids.len());
    let mut customers = Vec::with_capacity(ids.len());

    for i in 0..ids.len() {
        let id = ids[i];
        if !seen.insert(id) {
            anyhow::bail!("duplicate customer_id {} in input", id);
        }
        if recency[i] < 0 || frequency[i] < 0 || monetary[i] < 0.0 {
            anyhow::bail!(
                "customer {} has negative RFM measures (recency_days={}, frequency={}, monetary={})",
                id,
                recency[i],
                frequency[i],
                monetary[i]
            );
        }
        if !monetary[i].is_finite() {
            anyhow::bail!("customer {} has a non-finite monetary value", id);
        }
        customers.push(CustomerRfm {
            customer_id: id,
            recency_days: recency[i],
            frequency: frequency[i],
            monetary: monetary[i],
        });
    }

    Ok(customers)
}

/// Write the segmentation result table to CSV.
///
/// Columns: `customer_id, r_score, f_score, m_score, segment, imputed` with
/// `segment = "Unresolved"` for customers that could not be imputed.
pub fn write_segments(path: &str, customers: &[FinalCustomer]) -> crate::Result<()> {
    let mut df = segments_dataframe(customers)?;
    let mut file =
        File::create(path).with_context(|| format!("failed to create output file: {path}"))?;
    CsvWriter::new(&mut file)
        .has_header(true)
        .finish(&mut df)
        .with_context(|| format!("failed to write CSV: {path}"))?;
    Ok(())
}

/// Build the output DataFrame for the result rows.
pub fn segments_dataframe(customers: &[FinalCustomer]) -> crate::Result<DataFrame> {
    let ids: Vec<i64> = customers.iter().map(|c| c.customer_id).collect();
    let r_scores: Vec<i64> = customers.iter().map(|c| c.r_score as i64).collect();
    let f_scores: Vec<i64> = customers.iter().map(|c| c.f_score as i64).collect();
    let m_scores: Vec<i64> = customers.iter().map(|c| c.m_score as i64).collect();
    let segments: Vec<&str> = customers.iter().map(|c| c.assignment.label()).collect();
    let imputed: Vec<bool> = customers.iter().map(|c| c.assignment.is_imputed()).collect();

    let df = df!(
        "customer_id" => ids,
        "r_score" => r_scores,
        "f_score" => f_scores,
        "m_score" => m_scores,
        "segment" => segments,
        "imputed" => imputed
    )?;
    Ok(df)
}

fn int_column(df: &DataFrame, name: &str) -> crate::Result<Vec<i64>> {
    let series = df
        .column(name)
        .with_context(|| format!("missing required column '{name}'"))?;
    let cast = series
        .cast(&DataType::Int64)
        .with_context(|| format!("column '{name}' is not numeric"))?;
    let values = cast.i64()?;
    if values.null_count() > 0 {
        anyhow::bail!(
            "column '{}' contains {} missing or non-numeric values",
            name,
            values.null_count()
        );
    }
    Ok(values.into_no_null_iter().collect())
}

fn float_column(df: &DataFrame, name: &str) -> crate::Result<Vec<f64>> {
    let series = df
        .column(name)
        .with_context(|| format!("missing required column '{name}'"))?;
    let cast = series
        .cast(&DataType::Float64)
        .with_context(|| format!("column '{name}' is not numeric"))?;
    let values = cast.f64()?;
    if values.null_count() > 0 {
        anyhow::bail!(
            "column '{}' contains {} missing or non-numeric values",
            name,
            values.null_count()
        );
    }
    Ok(values.into_no_null_iter().collect())
}

/// Read a segmentation output CSV back. Used by tooling and tests; the
/// engine itself never consumes its own output.
pub fn load_segments_dataframe(path: &Path) -> crate::Result<DataFrame> {
    let df = CsvReader::from_path(path)
        .with_context(|| format!("failed to open segments file: {}", path.display()))?
        .has_header(true)
        .finish()
        .with_context(|| format!("failed to parse segments CSV: {}", path.display()))?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impute::SegmentAssignment;
    use crate::segment::Segment;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv(rows: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "customer_id,recency_days,frequency,monetary").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        file
    }

    #[test]
    fn test_load_customers() {
        let file = create_test_csv(&["1,30,10,1000.0", "2,400,1,900.5", "3,100,2,100.0"]);
        let customers = load_customers(file.path().to_str().unwrap()).unwrap();

        assert_eq!(customers.len(), 3);
        assert_eq!(customers[0].customer_id, 1);
        assert_eq!(customers[1].recency_days, 400);
        assert_eq!(customers[2].monetary, 100.0);
    }

    #[test]
    fn test_duplicate_customer_id_rejected() {
        let file = create_test_csv(&["1,30,10,1000.0", "1,400,1,900.0"]);
        let err = load_customers(file.path().to_str().unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate customer_id"));
    }

    #[test]
    fn test_negative_measures_rejected() {
        let file = create_test_csv(&["1,-5,10,1000.0"]);
        let err = load_customers(file.path().to_str().unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("negative"));
    }

    #[test]
    fn test_missing_column_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "customer_id,recency_days,frequency").unwrap();
        writeln!(file, "1,30,10").unwrap();

        let err = load_customers(file.path().to_str().unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("monetary"));
    }

    #[test]
    fn test_missing_values_rejected() {
        let file = create_test_csv(&["1,30,10,1000.0", "2,,1,900.0"]);
        assert!(load_customers(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_segments_dataframe_shape() {
        let customers = vec![
            FinalCustomer {
                customer_id: 1,
                r_score: 5,
                f_score: 5,
                m_score: 5,
                assignment: SegmentAssignment::Matched(Segment::Soulmates),
            },
            FinalCustomer {
                customer_id: 2,
                r_score: 1,
                f_score: 3,
                m_score: 3,
                assignment: SegmentAssignment::Unresolved,
            },
        ];

        let df = segments_dataframe(&customers).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 6);

        let segments = df.column("segment").unwrap();
        assert_eq!(segments.str_value(0).unwrap(), "Soulmates");
        assert_eq!(segments.str_value(1).unwrap(), "Unresolved");
    }
}
