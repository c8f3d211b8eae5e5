//! The `eval` command: batch evaluation with an LLM judge.
//!
//! Replays a JSONL dataset of (query, reference answer) pairs through
//! the same retrieval and generation path as interactive serving, each
//! example in a fresh session, then asks a judge model to grade the
//! generated answer against the reference. The judge must put CORRECT
//! or INCORRECT on the first line of its reply; anything else is a
//! judge failure. A failed example is marked incorrect with an error
//! note and the run continues.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::compose;
use crate::config::Config;
use crate::db;
use crate::embedding::OpenAiEmbedder;
use crate::error::PipelineError;
use crate::generation::{ChatModel, OpenAiChat};
use crate::memory::Session;
use crate::retriever::Index;

const JUDGE_SYSTEM_PROMPT: &str = "\
You are grading the answer of a sales data assistant against a reference answer.
The generated answer is CORRECT if its factual claims and numbers agree with the \
reference answer. Wording differences do not matter. Missing, contradicting, or \
invented facts make it INCORRECT.
Reply with exactly CORRECT or INCORRECT on the first line, then a one-sentence \
justification on the next line.";

#[derive(Debug, Deserialize)]
pub struct EvalExample {
    pub query: String,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect,
}

#[derive(Debug, Serialize)]
pub struct ExampleResult {
    pub query: String,
    pub reference: String,
    pub generated: Option<String>,
    pub verdict: Verdict,
    /// Set when the example failed (generation or judge error); such
    /// examples are always marked incorrect.
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EvalReport {
    pub total: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub failed: usize,
    pub accuracy: f64,
    pub results: Vec<ExampleResult>,
}

/// Parse the judge's reply. The first line must be CORRECT or
/// INCORRECT; INCORRECT is checked first since it contains the other
/// as a substring.
pub fn parse_verdict(reply: &str) -> Result<Verdict, PipelineError> {
    let first_line = reply.lines().next().unwrap_or("").trim();
    if first_line.starts_with("INCORRECT") {
        Ok(Verdict::Incorrect)
    } else if first_line.starts_with("CORRECT") {
        Ok(Verdict::Correct)
    } else {
        Err(PipelineError::JudgeFailed(format!(
            "judge reply did not start with CORRECT or INCORRECT: {:?}",
            first_line
        )))
    }
}

fn judge_user_prompt(query: &str, reference: &str, generated: &str) -> String {
    format!(
        "Question:\n{}\n\nReference answer:\n{}\n\nGenerated answer:\n{}\n",
        query, reference, generated
    )
}

pub fn load_examples(path: &Path) -> Result<Vec<EvalExample>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open evaluation dataset {}", path.display()))?;
    let reader = std::io::BufReader::new(file);

    let mut examples = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let example: EvalExample = serde_json::from_str(&line)
            .with_context(|| format!("{}: bad JSONL on line {}", path.display(), i + 1))?;
        if example.query.trim().is_empty() {
            bail!("{}: empty query on line {}", path.display(), i + 1);
        }
        examples.push(example);
    }

    if examples.is_empty() {
        bail!("evaluation dataset {} is empty", path.display());
    }
    Ok(examples)
}

fn build_report(results: Vec<ExampleResult>) -> EvalReport {
    let total = results.len();
    let correct = results
        .iter()
        .filter(|r| r.verdict == Verdict::Correct)
        .count();
    let incorrect = results
        .iter()
        .filter(|r| r.verdict == Verdict::Incorrect)
        .count();
    let failed = results.iter().filter(|r| r.error.is_some()).count();
    let accuracy = if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    };
    EvalReport {
        total,
        correct,
        incorrect,
        failed,
        accuracy,
        results,
    }
}

pub async fn run_eval(
    config: &Config,
    dataset_override: Option<PathBuf>,
    report_path: Option<PathBuf>,
) -> Result<()> {
    let dataset_path = match dataset_override.or_else(|| config.evaluation.dataset_path.clone()) {
        Some(p) => p,
        None => bail!(
            "No evaluation dataset. Pass --dataset or set [evaluation] dataset_path in config."
        ),
    };
    let examples = load_examples(&dataset_path)?;

    let pool = db::connect_readonly(config).await?;
    let index = Index::load(&pool, config).await?;
    let embedder = OpenAiEmbedder::from_config(&config.embedding)?;
    let answerer = OpenAiChat::from_config(&config.generation)?;
    let judge = match &config.evaluation.judge_model {
        Some(model) => OpenAiChat::from_config(&config.generation)?.with_model(model.clone()),
        None => OpenAiChat::from_config(&config.generation)?,
    };

    println!("eval");
    println!("  dataset:  {}", dataset_path.display());
    println!("  examples: {}", examples.len());
    println!("  judge:    {}", judge.model());
    println!();

    let mut results = Vec::with_capacity(examples.len());
    for (i, example) in examples.iter().enumerate() {
        // Each example gets a fresh session; history never leaks
        // between examples.
        let mut session = Session::new();
        let result = grade_example(
            &index,
            &embedder,
            &answerer,
            &judge,
            config,
            &mut session,
            example,
        )
        .await;

        match (&result.verdict, &result.error) {
            (Verdict::Correct, _) => println!("  [{}] correct: {}", i + 1, example.query),
            (Verdict::Incorrect, None) => {
                println!("  [{}] INCORRECT: {}", i + 1, example.query)
            }
            (Verdict::Incorrect, Some(note)) => {
                println!("  [{}] INCORRECT (error): {} ({})", i + 1, example.query, note)
            }
        }
        results.push(result);
    }

    let report = build_report(results);
    println!();
    println!(
        "  accuracy: {}/{} ({:.1}%)",
        report.correct,
        report.total,
        report.accuracy * 100.0
    );
    println!("  incorrect: {}", report.incorrect);
    println!("  failed:    {}", report.failed);

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        println!("  report:    {}", path.display());
    }

    pool.close().await;
    Ok(())
}

async fn grade_example(
    index: &Index,
    embedder: &OpenAiEmbedder,
    answerer: &OpenAiChat,
    judge: &OpenAiChat,
    config: &Config,
    session: &mut Session,
    example: &EvalExample,
) -> ExampleResult {
    let generated = match compose::answer_question(
        index,
        embedder,
        answerer,
        &config.retrieval,
        session,
        &example.query,
    )
    .await
    {
        Ok(answer) => answer.text,
        Err(e) => {
            return ExampleResult {
                query: example.query.clone(),
                reference: example.answer.clone(),
                generated: None,
                verdict: Verdict::Incorrect,
                error: Some(e.to_string()),
            }
        }
    };

    let prompt = judge_user_prompt(&example.query, &example.answer, &generated);
    let verdict = match judge.complete(JUDGE_SYSTEM_PROMPT, &prompt).await {
        Ok(reply) => parse_verdict(&reply),
        Err(e) => Err(PipelineError::JudgeFailed(e.to_string())),
    };

    match verdict {
        Ok(v) => ExampleResult {
            query: example.query.clone(),
            reference: example.answer.clone(),
            generated: Some(generated),
            verdict: v,
            error: None,
        },
        Err(e) => ExampleResult {
            query: example.query.clone(),
            reference: example.answer.clone(),
            generated: Some(generated),
            verdict: Verdict::Incorrect,
            error: Some(e.to_string()),
        },
    }
}
