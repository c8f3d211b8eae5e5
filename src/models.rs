//! Core data models for the sales-insight pipeline.
//!
//! These types flow from the statistics builder through the document
//! index into retrieval and answer composition.

use serde::{Deserialize, Serialize};

/// The grouping dimension a summary document describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceKind {
    TimePeriod,
    Product,
    Region,
    AgeGroup,
    Overall,
}

impl SliceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SliceKind::TimePeriod => "time_period",
            SliceKind::Product => "product",
            SliceKind::Region => "region",
            SliceKind::AgeGroup => "age_group",
            SliceKind::Overall => "overall",
        }
    }

    pub fn parse(s: &str) -> Option<SliceKind> {
        match s {
            "time_period" => Some(SliceKind::TimePeriod),
            "product" => Some(SliceKind::Product),
            "region" => Some(SliceKind::Region),
            "age_group" => Some(SliceKind::AgeGroup),
            "overall" => Some(SliceKind::Overall),
            _ => None,
        }
    }
}

/// Grouping dimension plus its value, e.g. `product = "Widget A"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceKey {
    pub kind: SliceKind,
    pub value: String,
}

impl SliceKey {
    pub fn new(kind: SliceKind, value: impl Into<String>) -> Self {
        SliceKey {
            kind,
            value: value.into(),
        }
    }

    /// Stable identifier for this slice, used as the document id and
    /// the chart artifact id. Spaces are replaced so ids are safe as
    /// file stems.
    pub fn id(&self) -> String {
        match self.kind {
            SliceKind::TimePeriod => format!("time_{}", self.value),
            SliceKind::Product => format!("product_{}", self.value.replace(' ', "_")),
            SliceKind::Region => format!("region_{}", self.value.replace(' ', "_")),
            SliceKind::AgeGroup => format!("age_group_{}", self.value),
            SliceKind::Overall => "overall_summary".to_string(),
        }
    }
}

/// One statistical slice of the sales data: the entire retrievable
/// knowledge base is a set of these. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryDocument {
    pub id: String,
    pub slice: SliceKey,
    /// Free-text narrative describing totals, averages, and counts.
    pub narrative: String,
    /// Identifier of the chart artifact depicting this slice, if one
    /// was rendered.
    pub chart_id: Option<String>,
}

/// A summary document paired with its retrieval relevance score.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: SummaryDocument,
    pub score: f32,
}

/// One (question, answer) exchange within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}
