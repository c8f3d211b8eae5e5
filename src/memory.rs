//! Session-scoped conversation memory.
//!
//! An append-only log of (question, answer) turns, owned by a
//! [`Session`] value — never a process-wide global. The log grows
//! unbounded within a session; `recent(n)` truncates only the view
//! handed to prompt construction, never the log itself. Nothing here
//! is persisted across sessions.

use crate::models::ConversationTurn;

#[derive(Debug, Default)]
pub struct ConversationMemory {
    turns: Vec<ConversationTurn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed exchange. Called only after successful
    /// answer generation.
    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// The last `n` turns, oldest first. Returns fewer when the log is
    /// shorter; never reorders.
    pub fn recent(&self, n: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// One interactive session: owns its conversation memory.
#[derive(Debug, Default)]
pub struct Session {
    memory: ConversationMemory,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut ConversationMemory {
        &mut self.memory
    }

    /// Explicit user reset: drop all turns, keep the session alive.
    pub fn reset(&mut self) {
        self.memory.clear();
    }
}
