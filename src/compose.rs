//! Answer composition.
//!
//! Builds the grounded prompt (instructions, retrieved narratives in
//! relevance order, bounded conversation history, question), delegates
//! generation to the chat model, selects the chart of the top-ranked
//! document, and appends the completed turn to the session memory —
//! only after generation succeeds, so a failed call never pollutes
//! the history.
//!
//! The composer does not verify numeric claims in the generated text
//! against the retrieved documents; factual fidelity is judged
//! empirically by the evaluator.

use std::num::NonZeroUsize;

use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::generation::ChatModel;
use crate::memory::Session;
use crate::models::{ConversationTurn, ScoredDocument};
use crate::retriever::Index;

/// System instructions for grounded answering.
pub const SYSTEM_PROMPT: &str = "\
You are a helpful assistant that provides accurate information about sales data \
based on the given context.
Answer the question based only on the provided context.
If the context is incomplete or vague, do your best to respond using the available information.
If the question refers to previous questions or responses, use the chat history to understand \
what the user is referring to.
If a full answer isn't possible, clearly state what's missing and politely ask the user for \
clarification.
Do not invent or assume facts that are not explicitly present in the context.
Keep responses brief and focused (no more than 300 words).";

/// Fixed response when retrieval finds nothing; no model call is made
/// so the pipeline cannot dress up an ungrounded guess as an answer.
pub const NO_DATA_ANSWER: &str = "\
I could not find any matching data in the sales knowledge base for that question. \
Try asking about the products, regions, time periods, or customer age groups \
covered by the data.";

/// A composed answer plus the chart to display alongside it, if any.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub chart_id: Option<String>,
}

/// Assemble the user prompt: history oldest first, retrieved
/// narratives most relevant first, then the question.
pub fn build_user_prompt(
    question: &str,
    retrieved: &[ScoredDocument],
    history: &[ConversationTurn],
) -> String {
    let mut prompt = String::from("Chat History:\n");
    for turn in history {
        prompt.push_str(&format!(
            "User: {}\n\nAssistant: {}\n\n",
            turn.question, turn.answer
        ));
    }

    prompt.push_str("Context:\n");
    for scored in retrieved {
        prompt.push_str(&scored.document.narrative);
        prompt.push('\n');
    }

    prompt.push_str(&format!("\nQuestion:\n{}\n", question));
    prompt
}

/// Compose an answer from retrieved documents and session history.
///
/// On success the (question, answer) turn is appended to the session
/// memory exactly once. On [`PipelineError::GenerationFailed`] the
/// memory is untouched and the caller may retry the turn.
pub async fn compose(
    question: &str,
    retrieved: &[ScoredDocument],
    session: &mut Session,
    model: &dyn ChatModel,
    max_history_turns: usize,
) -> Result<Answer, PipelineError> {
    if retrieved.is_empty() {
        let answer = Answer {
            text: NO_DATA_ANSWER.to_string(),
            chart_id: None,
        };
        session.memory_mut().append(ConversationTurn {
            question: question.to_string(),
            answer: answer.text.clone(),
        });
        return Ok(answer);
    }

    let history = session.memory().recent(max_history_turns).to_vec();
    let user_prompt = build_user_prompt(question, retrieved, &history);

    let text = model.complete(SYSTEM_PROMPT, &user_prompt).await?;

    let chart_id = retrieved[0].document.chart_id.clone();
    session.memory_mut().append(ConversationTurn {
        question: question.to_string(),
        answer: text.clone(),
    });

    Ok(Answer { text, chart_id })
}

/// Run one question through the full serving path: retrieve, compose,
/// record the turn.
pub async fn answer_question(
    index: &Index,
    embedder: &dyn Embedder,
    model: &dyn ChatModel,
    retrieval: &RetrievalConfig,
    session: &mut Session,
    question: &str,
) -> Result<Answer, PipelineError> {
    let k = NonZeroUsize::new(retrieval.top_k).unwrap_or(NonZeroUsize::MIN);
    let retrieved = index.retrieve(embedder, question, k).await?;
    compose(
        question,
        &retrieved,
        session,
        model,
        retrieval.max_history_turns,
    )
    .await
}
