//! Prompt Builder
//!
//! Composes the instruction block sent to a provider for its next turn. The
//! output is a pure function of the theme, the history and the target speaker.

use crate::transcript::{HistoryEntry, ProviderId, Speaker};

const UNSET_THEME: &str = "(unset)";

const GROUND_RULES: &[&str] = &[
    "You are a participant in a natural conversation.",
    "Always keep the conversation on the current theme.",
    "If the theme changes midway, switch topics smoothly without breaking the flow.",
    "Keep your reply short (one or two sentences).",
    "Do not quote the other participants or call them by name.",
    "State your own opinions and thoughts directly.",
    "Continue the conversation naturally.",
    "Do not repeat topics; bring a new perspective or a related subject.",
    "Broaden the discussion and explore the theme from several angles.",
    "Say something that does not overlap with the previous remarks.",
];

/// Provider-specific framing layered on top of the ground rules.
#[derive(Debug, Clone, Copy)]
pub struct Persona {
    pub provider: ProviderId,
    /// Sent as a separate system message when the provider supports one.
    pub system_instruction: Option<&'static str>,
    /// Appended after the prompt body.
    pub closing_reminder: Option<&'static str>,
}

impl Persona {
    pub fn for_provider(provider: ProviderId) -> Self {
        match provider {
            ProviderId::ChatGpt => Self {
                provider,
                system_instruction: Some(
                    "You are a participant in a natural conversation. Do not quote the other \
                     participants or call them by name; state your own opinion directly. Do not \
                     repeat topics, offer new perspectives or related subjects, and keep replies \
                     concise and natural.",
                ),
                closing_reminder: None,
            },
            ProviderId::Gemini => Self {
                provider,
                system_instruction: None,
                closing_reminder: Some(
                    "Important: do not quote the other participants or call them by name; state \
                     your own opinion directly. Do not repeat topics, offer new perspectives or \
                     related subjects.",
                ),
            },
        }
    }

    fn rules(&self) -> Vec<String> {
        vec![
            format!("You are speaking as {}.", self.provider.display_name()),
            "Do not quote your partner or address your partner by name.".to_string(),
            "State your own opinion directly.".to_string(),
            "Never open with a speaker label such as \"Partner:\" or phrases like \"as my partner said\"."
                .to_string(),
            "Actively offer new perspectives and related subjects.".to_string(),
            "Broaden the discussion and explore the theme from several angles.".to_string(),
        ]
    }
}

/// Builds provider prompts from a bounded window of recent turns.
#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder {
    /// Number of conversational turns rendered as context.
    pub window: usize,
    /// Number of conversational turns summarised in the "recent topics" reminder.
    pub topic_window: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            window: 6,
            topic_window: 4,
        }
    }
}

impl PromptBuilder {
    pub fn with_window(window: usize) -> Self {
        Self {
            window,
            ..Self::default()
        }
    }

    /// Composes the full prompt for `speaker`'s next turn.
    ///
    /// Role labels are relative to the target so the other provider's name is
    /// never rendered: the target's own turns are `You`, the other provider's are
    /// `Partner` and human turns are `User`.
    pub fn build(&self, theme: &str, history: &[HistoryEntry], speaker: ProviderId) -> String {
        let theme = theme.trim();
        let theme_line = format!(
            "Current theme: {}",
            if theme.is_empty() { UNSET_THEME } else { theme }
        );
        let persona = Persona::for_provider(speaker);

        let conversational: Vec<&HistoryEntry> = history
            .iter()
            .filter(|entry| entry.role.is_conversational())
            .collect();

        let recent_history = tail(&conversational, self.window)
            .iter()
            .map(|entry| format!("{}: {}", label_for(entry.role, speaker), entry.content))
            .collect::<Vec<_>>()
            .join("\n");

        let recent_topics = tail(&conversational, self.topic_window)
            .iter()
            .map(|entry| entry.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let mut sections = vec![
            theme_line,
            String::new(),
            "<Ground rules>".to_string(),
            GROUND_RULES.join("\n"),
            String::new(),
            "<Your role>".to_string(),
            persona.rules().join("\n"),
            String::new(),
            "<Recent conversation>".to_string(),
            recent_history,
            String::new(),
            "<Notes>".to_string(),
            format!("Recent topics: {}", recent_topics),
            "Offer a new perspective or related subject that does not overlap with the topics above."
                .to_string(),
            String::new(),
            "<Your next remark (offer a new perspective or related subject)>".to_string(),
        ];

        if let Some(reminder) = persona.closing_reminder {
            sections.push(String::new());
            sections.push(reminder.to_string());
        }

        sections.join("\n")
    }
}

fn tail<T>(items: &[T], k: usize) -> &[T] {
    &items[items.len().saturating_sub(k)..]
}

fn label_for(role: Speaker, target: ProviderId) -> &'static str {
    match role.provider() {
        Some(provider) if provider == target => "You",
        Some(_) => "Partner",
        None => "User",
    }
}
