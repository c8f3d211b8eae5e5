//! The `summarize` command: build the offline knowledge base.
//!
//! Loads the sales CSV, computes one summary per slice, renders a bar
//! chart per slice, and writes the narrative documents to a JSON file
//! for the `index` command to pick up. Re-running replaces the outputs
//! wholesale; nothing is merged.

use anyhow::{Context, Result};

use crate::aggregate::{self, SliceSummary};
use crate::chart;
use crate::config::Config;
use crate::dataset;

pub fn run_summarize(config: &Config) -> Result<()> {
    let records = dataset::load_sales(&config.dataset.csv_path)?;
    let summaries = aggregate::build_summaries(&records);
    let documents = aggregate::documents_from_summaries(&summaries);

    let mut charts_rendered = 0usize;
    let mut charts_failed = 0usize;
    for summary in &summaries {
        match chart::render_chart(summary, &config.dataset.charts_dir) {
            Ok(_) => charts_rendered += 1,
            Err(e) => {
                eprintln!(
                    "Warning: chart for {} failed: {}",
                    summary.slice.id(),
                    e
                );
                charts_failed += 1;
            }
        }
    }

    if let Some(parent) = config.dataset.documents_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("failed to create directory {}", parent.display())
        })?;
    }
    let json = serde_json::to_string_pretty(&documents)?;
    std::fs::write(&config.dataset.documents_path, json).with_context(|| {
        format!(
            "failed to write {}",
            config.dataset.documents_path.display()
        )
    })?;

    println!("summarize");
    println!("  records:   {}", records.len());
    println!("  documents: {}", documents.len());
    print_kind_breakdown(&summaries);
    println!(
        "  charts:    {} rendered, {} failed",
        charts_rendered, charts_failed
    );
    println!(
        "  wrote:     {}",
        config.dataset.documents_path.display()
    );
    Ok(())
}

fn print_kind_breakdown(summaries: &[SliceSummary]) {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for summary in summaries {
        let kind = summary.slice.kind.as_str();
        match counts.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, n)) => *n += 1,
            None => counts.push((kind, 1)),
        }
    }
    for (kind, n) in counts {
        println!("    {:<13} {}", kind, n);
    }
}
