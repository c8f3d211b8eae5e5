//! The `ask` and `chat` commands: interactive question answering.
//!
//! `ask` answers a single question in a throwaway session. `chat` is a
//! line-oriented REPL over stdin with in-process conversation memory:
//! `:reset` clears the history, `:quit` exits. A failed generation is
//! printed and the loop keeps going with the history untouched; an
//! unavailable knowledge base ends the session since no later turn can
//! succeed without a rebuild.

use std::io::{BufRead, Write};

use anyhow::Result;

use crate::chart;
use crate::compose::{self, Answer};
use crate::config::Config;
use crate::db;
use crate::embedding::OpenAiEmbedder;
use crate::error::PipelineError;
use crate::generation::OpenAiChat;
use crate::memory::Session;
use crate::retriever::Index;

struct Serving {
    pool: sqlx::SqlitePool,
    index: Index,
    embedder: OpenAiEmbedder,
    model: OpenAiChat,
}

async fn open_serving(config: &Config) -> Result<Serving> {
    let pool = db::connect_readonly(config).await?;
    let index = Index::load(&pool, config).await?;
    let embedder = OpenAiEmbedder::from_config(&config.embedding)?;
    let model = OpenAiChat::from_config(&config.generation)?;
    Ok(Serving {
        pool,
        index,
        embedder,
        model,
    })
}

fn print_answer(config: &Config, answer: &Answer) {
    println!("{}", answer.text);
    if let Some(id) = &answer.chart_id {
        let path = chart::chart_path(&config.dataset.charts_dir, id);
        if path.exists() {
            println!();
            println!("  chart: {}", path.display());
        }
    }
}

pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        anyhow::bail!("question is empty");
    }

    let serving = open_serving(config).await?;
    let mut session = Session::new();

    let answer = compose::answer_question(
        &serving.index,
        &serving.embedder,
        &serving.model,
        &config.retrieval,
        &mut session,
        question,
    )
    .await?;

    print_answer(config, &answer);
    serving.pool.close().await;
    Ok(())
}

pub async fn run_chat(config: &Config) -> Result<()> {
    let serving = open_serving(config).await?;
    let mut session = Session::new();

    let interactive = atty::is(atty::Stream::Stdin);
    if interactive {
        println!(
            "Sales assistant ready ({} documents). :reset clears history, :quit exits.",
            serving.index.len()
        );
    }

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut lines = stdin.lock().lines();

    loop {
        if interactive {
            print!("> ");
            stdout.flush()?;
        }

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let question = line.trim();

        match question {
            "" => continue,
            ":quit" | ":exit" => break,
            ":reset" => {
                session.reset();
                if interactive {
                    println!("history cleared");
                }
                continue;
            }
            _ => {}
        }

        let outcome = compose::answer_question(
            &serving.index,
            &serving.embedder,
            &serving.model,
            &config.retrieval,
            &mut session,
            question,
        )
        .await;

        match outcome {
            Ok(answer) => print_answer(config, &answer),
            Err(PipelineError::GenerationFailed(msg)) => {
                eprintln!("Error: answer generation failed: {}. Try again.", msg);
            }
            Err(e) => return Err(e.into()),
        }
    }

    serving.pool.close().await;
    Ok(())
}
