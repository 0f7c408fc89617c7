//! Transcript Store
//!
//! The append-only record of a single conversation. Every utterance, whether it
//! comes from the human, one of the two providers, or the application itself,
//! is stored as a [`Turn`] in the order it was appended. The store is the source
//! for both the visual log and the prompt context window.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two fixed LLM providers the conversation alternates between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    ChatGpt,
    Gemini,
}

impl ProviderId {
    /// The provider that speaks after this one.
    pub fn other(self) -> Self {
        match self {
            ProviderId::ChatGpt => ProviderId::Gemini,
            ProviderId::Gemini => ProviderId::ChatGpt,
        }
    }

    /// Human-readable name used in logs and notices.
    pub fn display_name(self) -> &'static str {
        match self {
            ProviderId::ChatGpt => "ChatGPT",
            ProviderId::Gemini => "Gemini",
        }
    }

    /// The environment variable that carries this provider's credential.
    pub fn env_var(self) -> &'static str {
        match self {
            ProviderId::ChatGpt => "OPENAI_API_KEY",
            ProviderId::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderId::ChatGpt => write!(f, "chatgpt"),
            ProviderId::Gemini => write!(f, "gemini"),
        }
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    ChatGpt,
    Gemini,
    /// Application notices (errors, pause/resume, start). Never sent to a model.
    System,
}

impl Speaker {
    /// Whether this speaker takes part in the conversation proper.
    pub fn is_conversational(self) -> bool {
        !matches!(self, Speaker::System)
    }

    /// The provider behind this speaker, if any.
    pub fn provider(self) -> Option<ProviderId> {
        match self {
            Speaker::ChatGpt => Some(ProviderId::ChatGpt),
            Speaker::Gemini => Some(ProviderId::Gemini),
            Speaker::User | Speaker::System => None,
        }
    }
}

impl From<ProviderId> for Speaker {
    fn from(provider: ProviderId) -> Self {
        match provider {
            ProviderId::ChatGpt => Speaker::ChatGpt,
            ProviderId::Gemini => Speaker::Gemini,
        }
    }
}

/// One immutable utterance in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Turn {
    pub role: Speaker,
    pub content: String,
    /// Creation time in epoch milliseconds. Never decreases along a transcript.
    pub t: i64,
}

/// A turn as it crosses the boundary: the role and text without a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HistoryEntry {
    pub role: Speaker,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(role: Speaker, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&Turn> for HistoryEntry {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// Ordered, append-only sequence of turns held in memory for one session.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn and returns it. This is the only mutator.
    pub fn append(&mut self, role: Speaker, content: impl Into<String>) -> &Turn {
        let now = chrono::Utc::now().timestamp_millis();
        let t = self.turns.last().map_or(now, |last| now.max(last.t));
        self.turns.push(Turn {
            role,
            content: content.into(),
            t,
        });
        &self.turns[self.turns.len() - 1]
    }

    /// Appends an application notice.
    pub fn notice(&mut self, content: impl Into<String>) -> &Turn {
        self.append(Speaker::System, content)
    }

    /// The last `k` conversational turns in chronological order. System notices
    /// are skipped and do not count towards `k`.
    pub fn recent_window(&self, k: usize) -> Vec<&Turn> {
        let mut window: Vec<&Turn> = self
            .turns
            .iter()
            .rev()
            .filter(|turn| turn.role.is_conversational())
            .take(k)
            .collect();
        window.reverse();
        window
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }
}
