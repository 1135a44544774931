//! In-memory conversation log for one interactive session

/// One user-utterance / assistant-reply pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    /// Transcript of what the user said
    pub user_text: String,
    /// Reply shown and spoken back
    pub assistant_text: String,
}

/// Ordered turns, oldest first; append-only for the life of a session
#[derive(Debug, Default)]
pub struct ConversationLog {
    turns: Vec<ConversationTurn>,
}

impl ConversationLog {
    /// Create an empty log
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Append a completed turn and return it
    pub fn append(&mut self, user_text: String, assistant_text: String) -> &ConversationTurn {
        self.turns.push(ConversationTurn {
            user_text,
            assistant_text,
        });
        tracing::debug!(turns = self.turns.len(), "turn appended");
        &self.turns[self.turns.len() - 1]
    }

    /// All turns in conversation order
    #[must_use]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Number of completed turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turn has completed yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
