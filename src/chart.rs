//! Chart artifact rendering.
//!
//! One SVG bar chart per summary document, written to the configured
//! charts directory and addressed by the slice id. Downstream
//! components only ever pass the identifier around; resolving it back
//! to a file is the presentation layer's job via [`chart_path`].

use anyhow::{anyhow, Context, Result};
use plotters::prelude::*;
use std::path::{Path, PathBuf};

use crate::aggregate::SliceSummary;
use crate::models::SliceKind;

/// Resolve a chart identifier to its artifact path.
pub fn chart_path(charts_dir: &Path, chart_id: &str) -> PathBuf {
    charts_dir.join(format!("{}.svg", chart_id))
}

/// Render the chart for one slice summary and return its identifier.
///
/// The primary breakdown of the slice is plotted: product summaries
/// show sales by region, everything else shows sales by product.
pub fn render_chart(summary: &SliceSummary, charts_dir: &Path) -> Result<String> {
    std::fs::create_dir_all(charts_dir)
        .with_context(|| format!("Failed to create charts dir: {}", charts_dir.display()))?;

    let (series_title, groups) = match summary.slice.kind {
        SliceKind::Product => ("Total Sales by Region", &summary.by_region),
        _ => ("Total Sales by Product", &summary.by_product),
    };

    let caption = match summary.slice.kind {
        SliceKind::Overall => series_title.to_string(),
        _ => format!("{} — {}", series_title, summary.slice.value),
    };

    let labels: Vec<String> = groups.iter().map(|(name, _)| name.clone()).collect();
    let values: Vec<f64> = groups.iter().map(|(_, b)| b.sum).collect();

    let chart_id = summary.slice.id();
    let path = chart_path(charts_dir, &chart_id);

    draw_bars(&path, &caption, &labels, &values)
        .map_err(|e| anyhow!("failed to render chart {}: {}", path.display(), e))?;

    Ok(chart_id)
}

// plotters errors borrow the backend type; stringify at the boundary.
fn draw_bars(
    path: &Path,
    caption: &str,
    labels: &[String],
    values: &[f64],
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let max = values.iter().cloned().fold(0.0f64, f64::max).max(1.0);

    let root = SVGBackend::new(path, (900, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 28))
        .margin(16)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(
            (0i32..labels.len() as i32).into_segmented(),
            0f64..max * 1.1,
        )?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Total sales")
        .x_label_formatter(&|seg| match seg {
            SegmentValue::CenterOf(i) => labels
                .get(*i as usize)
                .cloned()
                .unwrap_or_default(),
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(values.iter().enumerate().map(|(i, v)| {
        Rectangle::new(
            [
                (SegmentValue::Exact(i as i32), 0.0),
                (SegmentValue::Exact(i as i32 + 1), *v),
            ],
            BLUE.mix(0.6).filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::build_summaries;
    use crate::dataset::SalesRecord;
    use chrono::NaiveDate;

    fn record(product: &str, region: &str, sales: f64) -> SalesRecord {
        SalesRecord {
            date: NaiveDate::from_ymd_opt(2022, 4, 1).unwrap(),
            product: product.to_string(),
            region: region.to_string(),
            sales,
            customer_age: 30,
            customer_gender: "Female".to_string(),
            satisfaction: 4.0,
        }
    }

    #[test]
    fn renders_one_artifact_per_summary() {
        let tmp = tempfile::TempDir::new().unwrap();
        let records = vec![
            record("Widget A", "North", 100.0),
            record("Widget B", "South", 250.0),
        ];

        for summary in build_summaries(&records) {
            let chart_id = render_chart(&summary, tmp.path()).unwrap();
            assert_eq!(chart_id, summary.slice.id());
            let path = chart_path(tmp.path(), &chart_id);
            assert!(path.exists(), "missing chart artifact {}", path.display());
            let bytes = std::fs::read(&path).unwrap();
            assert!(!bytes.is_empty());
        }
    }

    #[test]
    fn chart_path_uses_svg_extension() {
        let path = chart_path(Path::new("kb/charts"), "product_Widget_A");
        assert_eq!(path, PathBuf::from("kb/charts/product_Widget_A.svg"));
    }
}
