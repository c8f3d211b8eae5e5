//! # BI Assistant
//!
//! A retrieval-augmented question-answering pipeline over a sales
//! dataset. An offline build turns the source CSV into statistical
//! summary documents and bar charts, embeds the documents into a
//! SQLite-backed vector index, and a serving path answers natural
//! language questions by retrieving the most relevant summaries and
//! handing them to a hosted chat model together with recent
//! conversation history.
//!
//! ## Pipeline
//!
//! | Stage | Module | Description |
//! |-------|--------|-------------|
//! | Load | [`dataset`] | Parse and validate the sales CSV |
//! | Summarize | [`aggregate`] | Per-slice statistics and narratives |
//! | Charts | [`chart`] | One SVG bar chart per summary |
//! | Index | [`embedding`], [`migrate`] | Embed narratives into SQLite |
//! | Retrieve | [`retriever`] | Cosine top-k over the loaded index |
//! | Compose | [`compose`], [`memory`] | Grounded prompt, model call, history |
//! | Evaluate | [`eval`] | LLM-judged accuracy over a JSONL dataset |

pub mod aggregate;
pub mod chart;
pub mod chat_cmd;
pub mod compose;
pub mod config;
pub mod dataset;
pub mod db;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod generation;
pub mod index_cmd;
pub mod memory;
pub mod migrate;
pub mod models;
pub mod retriever;
pub mod stats_cmd;
pub mod summarize_cmd;
