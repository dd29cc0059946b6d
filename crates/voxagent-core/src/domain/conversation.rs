//! Conversation domain types.
//!
//! A conversation is an ordered, append-only sequence of role-tagged turns.
//! [`History`] keeps a bounded window of the most recent turns so that the
//! context sent to the language model never grows without limit.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Default maximum number of non-system turns retained in [`History`].
pub const DEFAULT_MAX_HISTORY_TURNS: usize = 10;

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Parse a role from its wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }

    /// Wire representation used by chat-completion APIs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One role-tagged unit of conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Bounded conversation history.
///
/// An optional system turn is pinned at the front; it does not count against
/// `max_turns` and is never trimmed. After every append the remaining turns
/// are trimmed from the front so that at most `max_turns` are kept and the
/// retained turns are always the most recent ones, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    system: Option<ConversationTurn>,
    turns: VecDeque<ConversationTurn>,
    max_turns: usize,
}

impl History {
    /// Create an empty history that keeps at most `max_turns` turns.
    ///
    /// A limit of zero is clamped to one so that the most recent turn is
    /// always observable.
    #[must_use]
    pub fn new(max_turns: usize) -> Self {
        let max_turns = max_turns.max(1);
        Self {
            system: None,
            turns: VecDeque::with_capacity(max_turns + 1),
            max_turns,
        }
    }

    /// Create a history with a pinned system turn.
    #[must_use]
    pub fn with_system(max_turns: usize, prompt: impl Into<String>) -> Self {
        let mut history = Self::new(max_turns);
        history.system = Some(ConversationTurn::system(prompt));
        history
    }

    /// Append a turn and trim to the configured maximum.
    ///
    /// Returns the turn trimmed from the front, if any; pass it to
    /// [`undo_push`](Self::undo_push) to take the append back. A `System`
    /// turn replaces the pinned system prefix instead of entering the
    /// trimmed window.
    pub fn push(&mut self, turn: ConversationTurn) -> Option<ConversationTurn> {
        if turn.role == Role::System {
            self.system = Some(turn);
            return None;
        }
        self.turns.push_back(turn);
        let mut evicted = None;
        while self.turns.len() > self.max_turns {
            evicted = self.turns.pop_front();
        }
        evicted
    }

    /// Take back the most recent [`push`](Self::push), restoring the turn
    /// it evicted at the front.
    ///
    /// Returns the removed turn.
    pub fn undo_push(&mut self, evicted: Option<ConversationTurn>) -> Option<ConversationTurn> {
        let removed = self.turns.pop_back();
        if let Some(turn) = evicted {
            self.turns.push_front(turn);
        }
        removed
    }

    /// Remove and return the most recent turn.
    pub fn pop(&mut self) -> Option<ConversationTurn> {
        self.turns.pop_back()
    }

    /// The most recent turn, if any.
    #[must_use]
    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.back()
    }

    /// The pinned system turn, if any.
    #[must_use]
    pub const fn system(&self) -> Option<&ConversationTurn> {
        self.system.as_ref()
    }

    /// The last `k` non-system turns, oldest first.
    pub fn recent(&self, k: usize) -> impl Iterator<Item = &ConversationTurn> {
        let skip = self.turns.len().saturating_sub(k);
        self.turns.iter().skip(skip)
    }

    /// All non-system turns, oldest first.
    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    /// Number of non-system turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[must_use]
    pub const fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Drop every non-system turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY_TURNS)
    }
}
