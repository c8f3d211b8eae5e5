//! Sales dataset loading.
//!
//! Reads the source CSV into immutable [`SalesRecord`]s and derives
//! the time and demographic attributes the statistics builder groups
//! by: year-quarter labels and age-group buckets.

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::path::Path;

use crate::error::PipelineError;

/// Age-group buckets used for demographic slices. Records outside the
/// 18-70 range fall into no bucket and are excluded from age-group
/// summaries only.
pub const AGE_GROUPS: [&str; 4] = ["18-25", "26-35", "36-50", "51-70"];

/// One sales transaction, loaded once from the source dataset.
#[derive(Debug, Clone)]
pub struct SalesRecord {
    pub date: NaiveDate,
    pub product: String,
    pub region: String,
    pub sales: f64,
    pub customer_age: u32,
    pub customer_gender: String,
    pub satisfaction: f64,
}

impl SalesRecord {
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn quarter(&self) -> u32 {
        (self.date.month() - 1) / 3 + 1
    }

    /// Year-quarter label, e.g. `"2022-Q2"`.
    pub fn year_quarter(&self) -> String {
        format!("{}-Q{}", self.year(), self.quarter())
    }

    /// Age bucket for demographic slices, or `None` outside 18-70.
    pub fn age_group(&self) -> Option<&'static str> {
        match self.customer_age {
            18..=25 => Some("18-25"),
            26..=35 => Some("26-35"),
            36..=50 => Some("36-50"),
            51..=70 => Some("51-70"),
            _ => None,
        }
    }
}

/// Raw CSV row shape. Header names match the source dataset.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Product")]
    product: String,
    #[serde(rename = "Region")]
    region: String,
    #[serde(rename = "Sales")]
    sales: f64,
    #[serde(rename = "Customer_Age")]
    customer_age: u32,
    #[serde(rename = "Customer_Gender")]
    customer_gender: String,
    #[serde(rename = "Customer_Satisfaction")]
    satisfaction: f64,
}

/// Load all sales records from a CSV file.
///
/// Fails with [`PipelineError::DataLoad`] when the file is missing,
/// a row is malformed, a sale amount is negative, or the dataset is
/// empty — the statistics builder has nothing meaningful to do with a
/// partial read, so the whole load fails closed.
pub fn load_sales(path: &Path) -> Result<Vec<SalesRecord>, PipelineError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        PipelineError::data_load(format!("cannot open {}: {}", path.display(), e))
    })?;

    let mut records = Vec::new();

    for (i, row) in reader.deserialize::<RawRecord>().enumerate() {
        let line = i + 2; // header is line 1
        let raw = row.map_err(|e| {
            PipelineError::data_load(format!("{} line {}: {}", path.display(), line, e))
        })?;

        let date = NaiveDate::parse_from_str(&raw.date, "%Y-%m-%d").map_err(|e| {
            PipelineError::data_load(format!(
                "{} line {}: bad date '{}': {}",
                path.display(),
                line,
                raw.date,
                e
            ))
        })?;

        if raw.sales < 0.0 {
            return Err(PipelineError::data_load(format!(
                "{} line {}: negative sale amount {}",
                path.display(),
                line,
                raw.sales
            )));
        }

        records.push(SalesRecord {
            date,
            product: raw.product,
            region: raw.region,
            sales: raw.sales,
            customer_age: raw.customer_age,
            customer_gender: raw.customer_gender,
            satisfaction: raw.satisfaction,
        });
    }

    if records.is_empty() {
        return Err(PipelineError::data_load(format!(
            "{}: dataset contains no rows",
            path.display()
        )));
    }

    Ok(records)
}
