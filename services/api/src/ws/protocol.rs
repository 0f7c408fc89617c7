//! Defines the WebSocket message protocol between the presentation client and the server.

use duologue_core::{Capabilities, Phase, ProviderId, SessionEvent, Turn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from the client to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts (or restarts) the conversation on a theme.
    Start { theme: String },
    /// The theme field's current value.
    SetTheme { theme: String },
    /// The theme field gained (`true`) or lost (`false`) focus.
    ThemeEditing { active: bool },
    TogglePause,
    /// A keystroke in the message input.
    Typing,
    /// The message input lost focus or was cleared.
    TypingStopped,
    /// A message from the human participant.
    UserMessage { text: String },
}

/// Messages sent from the server to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the session and provides its initial state.
    Initialized {
        session_id: Uuid,
        capabilities: Capabilities,
        turns: Vec<Turn>,
    },
    /// A turn was appended to the transcript.
    Turn { turn: Turn },
    /// A provider is about to be asked.
    Thinking { speaker: ProviderId },
    ThinkingCleared,
    Phase { phase: Phase },
    /// Reports a protocol error to the client.
    Error { message: String },
}

impl From<SessionEvent> for ServerMessage {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::TurnAppended(turn) => ServerMessage::Turn { turn },
            SessionEvent::Thinking { speaker } => ServerMessage::Thinking { speaker },
            SessionEvent::ThinkingCleared => ServerMessage::ThinkingCleared,
            SessionEvent::PhaseChanged(phase) => ServerMessage::Phase { phase },
        }
    }
}
