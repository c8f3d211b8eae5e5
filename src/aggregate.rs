//! Statistics builder: aggregates sales records into summary slices.
//!
//! One [`SliceSummary`] is produced per time period, product, region,
//! and age group, plus a single overall summary. Each is rendered into
//! a narrative document whose text is the retrievable unit of the
//! knowledge base. Slice iteration follows first-appearance order of
//! the source rows, so rebuilding from unchanged data yields
//! byte-identical narratives and ids.

use chrono::NaiveDate;

use crate::dataset::{SalesRecord, AGE_GROUPS};
use crate::error::PipelineError;
use crate::models::{SliceKey, SliceKind, SummaryDocument};

/// Sum/count aggregate for one group within a slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Breakdown {
    pub sum: f64,
    pub count: u64,
}

impl Breakdown {
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Aggregated statistics for one slice of the dataset.
#[derive(Debug, Clone)]
pub struct SliceSummary {
    pub slice: SliceKey,
    pub total_records: u64,
    pub total_sales: f64,
    pub average_sale: f64,
    pub average_satisfaction: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub by_product: Vec<(String, Breakdown)>,
    pub by_region: Vec<(String, Breakdown)>,
    pub by_gender: Vec<(String, Breakdown)>,
}

/// Group sale amounts by a key, preserving first-appearance order.
fn group_sales<'a, F>(records: &[&'a SalesRecord], key: F) -> Vec<(String, Breakdown)>
where
    F: Fn(&'a SalesRecord) -> &'a str,
{
    let mut groups: Vec<(String, Breakdown)> = Vec::new();
    for record in records {
        let k = key(record);
        match groups.iter_mut().find(|(name, _)| name == k) {
            Some((_, b)) => {
                b.sum += record.sales;
                b.count += 1;
            }
            None => groups.push((
                k.to_string(),
                Breakdown {
                    sum: record.sales,
                    count: 1,
                },
            )),
        }
    }
    groups
}

/// Distinct key values in first-appearance order.
fn distinct<'a, F>(records: &'a [SalesRecord], key: F) -> Vec<String>
where
    F: Fn(&'a SalesRecord) -> String,
{
    let mut values: Vec<String> = Vec::new();
    for record in records {
        let v = key(record);
        if !values.contains(&v) {
            values.push(v);
        }
    }
    values
}

/// Aggregate one set of records into a slice summary.
///
/// Panics if `records` is empty; callers slice out of a dataset that
/// `load_sales` already guaranteed non-empty.
pub fn summarize_slice(slice: SliceKey, records: &[&SalesRecord]) -> SliceSummary {
    let total_records = records.len() as u64;
    let total_sales: f64 = records.iter().map(|r| r.sales).sum();
    let total_satisfaction: f64 = records.iter().map(|r| r.satisfaction).sum();
    let n = total_records as f64;

    let start_date = records.iter().map(|r| r.date).min().expect("non-empty slice");
    let end_date = records.iter().map(|r| r.date).max().expect("non-empty slice");

    SliceSummary {
        slice,
        total_records,
        total_sales,
        average_sale: total_sales / n,
        average_satisfaction: total_satisfaction / n,
        start_date,
        end_date,
        by_product: group_sales(records, |r| r.product.as_str()),
        by_region: group_sales(records, |r| r.region.as_str()),
        by_gender: group_sales(records, |r| r.customer_gender.as_str()),
    }
}

/// Build summaries for every slice: per year-quarter, per product, per
/// region, per age group, and one overall.
pub fn build_summaries(records: &[SalesRecord]) -> Vec<SliceSummary> {
    let mut summaries = Vec::new();

    for yq in distinct(records, |r| r.year_quarter()) {
        let chunk: Vec<&SalesRecord> =
            records.iter().filter(|r| r.year_quarter() == yq).collect();
        summaries.push(summarize_slice(
            SliceKey::new(SliceKind::TimePeriod, yq),
            &chunk,
        ));
    }

    for product in distinct(records, |r| r.product.clone()) {
        let chunk: Vec<&SalesRecord> =
            records.iter().filter(|r| r.product == product).collect();
        summaries.push(summarize_slice(
            SliceKey::new(SliceKind::Product, product),
            &chunk,
        ));
    }

    for region in distinct(records, |r| r.region.clone()) {
        let chunk: Vec<&SalesRecord> = records.iter().filter(|r| r.region == region).collect();
        summaries.push(summarize_slice(
            SliceKey::new(SliceKind::Region, region),
            &chunk,
        ));
    }

    for group in AGE_GROUPS {
        let chunk: Vec<&SalesRecord> = records
            .iter()
            .filter(|r| r.age_group() == Some(group))
            .collect();
        if chunk.is_empty() {
            continue;
        }
        summaries.push(summarize_slice(
            SliceKey::new(SliceKind::AgeGroup, group),
            &chunk,
        ));
    }

    let all: Vec<&SalesRecord> = records.iter().collect();
    summaries.push(summarize_slice(
        SliceKey::new(SliceKind::Overall, "all_data"),
        &all,
    ));

    summaries
}

fn heading(slice: &SliceKey) -> String {
    match slice.kind {
        SliceKind::TimePeriod | SliceKind::Product => {
            format!("Sales Summary for {}", slice.value)
        }
        SliceKind::Region => format!("Sales Summary for {} Region", slice.value),
        SliceKind::AgeGroup => format!("Sales Summary for Age Group {}", slice.value),
        SliceKind::Overall => "Overall Sales Summary".to_string(),
    }
}

fn push_breakdown(text: &mut String, title: &str, groups: &[(String, Breakdown)]) {
    text.push_str(&format!("\n{}:\n", title));
    for (name, b) in groups {
        text.push_str(&format!(
            "- {}: ${:.2} total, {} sales, ${:.2} average\n",
            name,
            b.sum,
            b.count,
            b.mean()
        ));
    }
}

/// Render a slice summary into its narrative document text.
///
/// Breakdown sections depend on the slice kind: a product summary does
/// not repeat the per-product breakdown (it would be a single row), a
/// time-period summary omits gender, and so on.
pub fn render_narrative(s: &SliceSummary) -> String {
    let mut text = String::new();
    text.push_str(&format!("{}\n", heading(&s.slice)));
    text.push_str(&format!("Total Records: {}\n", s.total_records));
    text.push_str(&format!("Total Sales: ${:.2}\n", s.total_sales));
    text.push_str(&format!("Average Sale: ${:.2}\n", s.average_sale));
    text.push_str(&format!(
        "Average Customer Satisfaction: {:.2}\n",
        s.average_satisfaction
    ));
    text.push_str(&format!(
        "Date Range: {} to {}\n",
        s.start_date.format("%Y-%m-%d"),
        s.end_date.format("%Y-%m-%d")
    ));

    match s.slice.kind {
        SliceKind::TimePeriod => {
            push_breakdown(&mut text, "Sales by Product", &s.by_product);
            push_breakdown(&mut text, "Sales by Region", &s.by_region);
        }
        SliceKind::Product => {
            push_breakdown(&mut text, "Sales by Region", &s.by_region);
            push_breakdown(&mut text, "Sales by Gender", &s.by_gender);
        }
        SliceKind::Region => {
            push_breakdown(&mut text, "Sales by Product", &s.by_product);
            push_breakdown(&mut text, "Sales by Gender", &s.by_gender);
        }
        SliceKind::AgeGroup | SliceKind::Overall => {
            push_breakdown(&mut text, "Sales by Product", &s.by_product);
            push_breakdown(&mut text, "Sales by Region", &s.by_region);
            push_breakdown(&mut text, "Sales by Gender", &s.by_gender);
        }
    }

    text
}

/// Turn slice summaries into knowledge-base documents. Every document
/// requests a chart, so each carries its slice id as the chart
/// identifier.
pub fn documents_from_summaries(summaries: &[SliceSummary]) -> Vec<SummaryDocument> {
    summaries
        .iter()
        .map(|summary| {
            let id = summary.slice.id();
            SummaryDocument {
                id: id.clone(),
                narrative: render_narrative(summary),
                chart_id: Some(id),
                slice: summary.slice.clone(),
            }
        })
        .collect()
}

/// Build the full set of summary documents for the knowledge base.
pub fn build_documents(records: &[SalesRecord]) -> Result<Vec<SummaryDocument>, PipelineError> {
    if records.is_empty() {
        return Err(PipelineError::data_load("no sales records to summarize"));
    }

    Ok(documents_from_summaries(&build_summaries(records)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(
        date: &str,
        product: &str,
        region: &str,
        sales: f64,
        age: u32,
        gender: &str,
        satisfaction: f64,
    ) -> SalesRecord {
        SalesRecord {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            product: product.to_string(),
            region: region.to_string(),
            sales,
            customer_age: age,
            customer_gender: gender.to_string(),
            satisfaction,
        }
    }

    #[test]
    fn breakdown_mean() {
        let b = Breakdown { sum: 30.0, count: 4 };
        assert!((b.mean() - 7.5).abs() < 1e-9);
        let empty = Breakdown { sum: 0.0, count: 0 };
        assert_eq!(empty.mean(), 0.0);
    }

    #[test]
    fn group_sales_preserves_first_appearance_order() {
        let records = vec![
            record("2022-01-01", "B", "North", 10.0, 30, "Male", 4.0),
            record("2022-01-02", "A", "South", 20.0, 30, "Male", 4.0),
            record("2022-01-03", "B", "North", 5.0, 30, "Male", 4.0),
        ];
        let refs: Vec<&SalesRecord> = records.iter().collect();
        let groups = group_sales(&refs, |r| r.product.as_str());
        assert_eq!(groups[0].0, "B");
        assert_eq!(groups[0].1.sum, 15.0);
        assert_eq!(groups[0].1.count, 2);
        assert_eq!(groups[1].0, "A");
    }

    #[test]
    fn document_set_covers_all_dimensions_plus_overall() {
        let records = vec![
            record("2022-02-01", "Widget A", "North", 100.0, 22, "Female", 4.0),
            record("2022-05-01", "Widget B", "South", 200.0, 40, "Male", 3.5),
        ];
        let docs = build_documents(&records).unwrap();
        // 2 quarters + 2 products + 2 regions + 2 age groups + overall
        assert_eq!(docs.len(), 9);
        assert_eq!(docs.last().unwrap().id, "overall_summary");
        for doc in &docs {
            assert_eq!(doc.chart_id.as_deref(), Some(doc.id.as_str()));
        }
    }

    #[test]
    fn age_group_narrative_carries_exact_totals() {
        // 367 transactions for ages 18-25 summing to exactly 210030.
        let mut records: Vec<SalesRecord> = (0..366)
            .map(|i| {
                record(
                    "2022-03-01",
                    "Widget A",
                    "North",
                    572.0,
                    18 + (i % 8) as u32,
                    if i % 2 == 0 { "Female" } else { "Male" },
                    4.0,
                )
            })
            .collect();
        records.push(record("2022-03-02", "Widget B", "South", 678.0, 25, "Female", 4.0));
        // One out-of-bucket record that must not leak into the slice.
        records.push(record("2022-03-03", "Widget A", "North", 999.0, 45, "Male", 4.0));

        let docs = build_documents(&records).unwrap();
        let doc = docs.iter().find(|d| d.id == "age_group_18-25").unwrap();
        assert!(doc.narrative.contains("Total Records: 367"));
        assert!(doc.narrative.contains("Total Sales: $210030.00"));
    }

    #[test]
    fn product_quarter_narrative_carries_exact_totals_and_average() {
        // Widget A in 2022 Q2: 23 transactions totaling 14158.
        let mut records: Vec<SalesRecord> = (0..22)
            .map(|i| {
                record(
                    &format!("2022-04-{:02}", (i % 28) + 1),
                    "Widget A",
                    "North",
                    615.0,
                    30,
                    "Female",
                    4.0,
                )
            })
            .collect();
        records.push(record("2022-06-30", "Widget A", "South", 628.0, 30, "Male", 4.0));
        // Noise outside the slice.
        records.push(record("2022-07-01", "Widget A", "North", 50.0, 30, "Male", 4.0));
        records.push(record("2022-05-01", "Widget B", "North", 75.0, 30, "Male", 4.0));

        let summaries = build_summaries(&records);
        let q2 = summaries
            .iter()
            .find(|s| s.slice == SliceKey::new(SliceKind::TimePeriod, "2022-Q2"))
            .unwrap();
        let widget_a = q2
            .by_product
            .iter()
            .find(|(name, _)| name == "Widget A")
            .unwrap();
        assert_eq!(widget_a.1.count, 23);
        assert!((widget_a.1.sum - 14158.0).abs() < 1e-9);
        assert!((widget_a.1.mean() - 615.57).abs() < 0.005);

        let narrative = render_narrative(q2);
        assert!(narrative.contains("- Widget A: $14158.00 total, 23 sales, $615.57 average"));
    }

    #[test]
    fn narrative_sections_depend_on_slice_kind() {
        let records = vec![
            record("2022-02-01", "Widget A", "North", 100.0, 22, "Female", 4.0),
            record("2022-02-02", "Widget B", "South", 200.0, 40, "Male", 3.5),
        ];
        let summaries = build_summaries(&records);

        let product = summaries
            .iter()
            .find(|s| s.slice.kind == SliceKind::Product)
            .unwrap();
        let text = render_narrative(product);
        assert!(text.contains("Sales by Region"));
        assert!(text.contains("Sales by Gender"));
        assert!(!text.contains("Sales by Product"));

        let time = summaries
            .iter()
            .find(|s| s.slice.kind == SliceKind::TimePeriod)
            .unwrap();
        let text = render_narrative(time);
        assert!(text.contains("Sales by Product"));
        assert!(!text.contains("Sales by Gender"));

        let overall = summaries.last().unwrap();
        let text = render_narrative(overall);
        assert!(text.starts_with("Overall Sales Summary"));
        assert!(text.contains("Sales by Product"));
        assert!(text.contains("Sales by Region"));
        assert!(text.contains("Sales by Gender"));
    }

    #[test]
    fn rebuild_from_unchanged_data_is_byte_identical() {
        let records = vec![
            record("2022-02-01", "Widget A", "North", 100.0, 22, "Female", 4.0),
            record("2022-05-01", "Widget B", "South", 200.0, 40, "Male", 3.5),
            record("2022-05-02", "Widget A", "East", 300.0, 60, "Female", 5.0),
        ];
        let first = build_documents(&records).unwrap();
        let second = build_documents(&records).unwrap();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.narrative, b.narrative);
            assert_eq!(a.chart_id, b.chart_id);
        }
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let err = build_documents(&[]).unwrap_err();
        assert!(matches!(err, PipelineError::DataLoad(_)));
    }
}
