//! # BI Assistant CLI (`bia`)
//!
//! The `bia` binary drives the sales-data question-answering pipeline:
//! knowledge-base builds, interactive question answering, and batch
//! evaluation.
//!
//! ## Usage
//!
//! ```bash
//! bia --config ./config/bia.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bia init` | Create the SQLite database and run schema migrations |
//! | `bia summarize` | Build summary documents and charts from the sales CSV |
//! | `bia index` | Embed summary documents into the vector index |
//! | `bia ask "<question>"` | Answer a single question |
//! | `bia chat` | Interactive multi-turn session with memory |
//! | `bia eval` | Judge generated answers against a reference dataset |
//! | `bia stats` | Show knowledge-base counts and index state |
//!
//! ## Examples
//!
//! ```bash
//! # Build the knowledge base end to end
//! bia init
//! bia summarize
//! bia index
//!
//! # Ask about the data
//! bia ask "What were total sales for Widget A in 2022-Q2?"
//!
//! # Multi-turn session
//! bia chat
//!
//! # Measure answer accuracy
//! bia eval --dataset data/eval.jsonl --report eval_report.json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use bi_assistant::{chat_cmd, config, eval, index_cmd, migrate, stats_cmd, summarize_cmd};

/// BI Assistant CLI — retrieval-augmented question answering over a
/// sales dataset.
///
/// All commands accept a `--config` flag pointing to a TOML
/// configuration file. See `config/bia.example.toml` for a full
/// example.
#[derive(Parser)]
#[command(
    name = "bia",
    about = "BI Assistant — retrieval-augmented question answering over sales data",
    version,
    long_about = "BI Assistant pre-computes statistical summaries and charts from a sales CSV, \
    embeds the summary narratives into a SQLite-backed vector index, and answers natural \
    language questions by retrieving relevant summaries and composing a grounded prompt for a \
    hosted chat model. Includes an LLM-judged batch evaluator."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/bia.toml`. Dataset, database, embedding,
    /// generation, retrieval, and evaluation settings are read from it.
    #[arg(long, global = true, default_value = "./config/bia.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (summary_documents, document_vectors, kb_meta). Idempotent.
    Init,

    /// Build summary documents and charts from the sales CSV.
    ///
    /// Computes one statistical summary per time period, product,
    /// region, and age group plus an overall summary, renders a bar
    /// chart for each, and writes the narratives to the documents JSON
    /// file. Re-running replaces previous outputs.
    Summarize,

    /// Embed summary documents into the vector index.
    ///
    /// Reads the documents JSON produced by `summarize`, replaces the
    /// indexed rows wholesale, and embeds every narrative with the
    /// configured provider. The index only becomes servable once every
    /// document has a vector.
    Index,

    /// Answer a single question.
    ///
    /// Retrieves the most relevant summaries, composes a grounded
    /// prompt, and prints the model's answer plus the path of the
    /// top-ranked summary's chart when one exists.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Interactive multi-turn session.
    ///
    /// Reads questions from stdin and keeps conversation history for
    /// follow-ups. `:reset` clears the history, `:quit` exits.
    Chat,

    /// Evaluate generated answers against a reference dataset.
    ///
    /// Runs each (query, answer) pair from a JSONL file through the
    /// full serving path in a fresh session and asks a judge model to
    /// grade the result. Prints per-example verdicts and the overall
    /// accuracy.
    Eval {
        /// JSONL file of {"query": ..., "answer": ...} examples.
        /// Overrides [evaluation] dataset_path from config.
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Write the full report (verdicts, generated answers) as JSON
        /// to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show knowledge-base counts and index state.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Summarize => {
            summarize_cmd::run_summarize(&cfg)?;
        }
        Commands::Index => {
            index_cmd::run_index(&cfg).await?;
        }
        Commands::Ask { question } => {
            chat_cmd::run_ask(&cfg, &question).await?;
        }
        Commands::Chat => {
            chat_cmd::run_chat(&cfg).await?;
        }
        Commands::Eval { dataset, report } => {
            eval::run_eval(&cfg, dataset, report).await?;
        }
        Commands::Stats => {
            stats_cmd::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
