//! Turn Scheduler
//!
//! Decides who speaks next and when. One scheduler owns one conversation: it
//! runs as a single task that holds the [`SessionState`], reacts to
//! [`SchedulerCommand`]s from the presentation layer and to its own deadlines,
//! and reports everything it does as [`SessionEvent`]s.
//!
//! At most one provider call is outstanding at any time. The call future is
//! polled by the same loop that handles commands, so pausing or typing is
//! registered immediately while a call runs, but never cancels it.

use crate::{
    boundary::{AskTurnRequest, AskTurnResponse},
    error::SchedulerClosed,
    timer::Deadline,
    transcript::{HistoryEntry, ProviderId, Speaker, Transcript, Turn},
};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info, warn};

pub const WELCOME_NOTICE: &str = "Enter a theme and press start (or hit Enter in the theme field). \
     Use pause to hold the conversation at any time.";
pub const EMPTY_THEME_NOTICE: &str = "Enter a theme before starting the conversation.";
pub const PAUSED_NOTICE: &str = "Conversation paused.";
pub const RESUMED_NOTICE: &str = "Conversation resumed.";

/// Executes one provider turn on the scheduler's behalf.
#[async_trait]
pub trait TurnExecutor: Send + Sync {
    async fn ask_turn(&self, request: AskTurnRequest) -> AskTurnResponse;
}

/// Pacing constants for one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Minimum gap between a completed call and the next one.
    pub min_interval: Duration,
    /// How long the "thinking" indication shows before a call is dispatched.
    pub thinking_delay: Duration,
    /// Delay before the next turn after resume, a human message or the input losing focus.
    pub resume_delay: Duration,
    /// Quiet period after the last keystroke before typing counts as finished.
    pub typing_quiet: Duration,
    /// Delay before the next turn once typing has finished.
    pub typing_resume_delay: Duration,
    /// Pause automatically when no turn has been added for this long.
    pub inactivity_timeout: Duration,
    /// Number of conversational turns sent as context.
    pub history_window: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(800),
            thinking_delay: Duration::from_millis(2000),
            resume_delay: Duration::from_millis(300),
            typing_quiet: Duration::from_millis(1000),
            typing_resume_delay: Duration::from_millis(500),
            inactivity_timeout: Duration::from_secs(30),
            history_window: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Scheduled,
    InFlight,
    Paused,
    SuspendedByTyping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    User,
    Inactivity,
}

/// The full scheduling state of one conversation.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub theme: String,
    pub next_speaker: ProviderId,
    /// The provider that most recently completed a turn, successfully or not.
    pub last_speaker: Option<ProviderId>,
    pub running: bool,
    pub paused: Option<PauseReason>,
    pub in_flight: bool,
    pub user_typing: bool,
    pub editing_theme: bool,
    pub transcript: Transcript,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            theme: String::new(),
            next_speaker: ProviderId::ChatGpt,
            last_speaker: None,
            running: false,
            paused: None,
            in_flight: false,
            user_typing: false,
            editing_theme: false,
            transcript: Transcript::new(),
        }
    }
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        if !self.running {
            Phase::Idle
        } else if self.in_flight {
            Phase::InFlight
        } else if self.paused.is_some() {
            Phase::Paused
        } else if self.user_typing {
            Phase::SuspendedByTyping
        } else {
            Phase::Scheduled
        }
    }

    /// Whether a new provider call may start right now.
    pub fn may_fire(&self) -> bool {
        self.running
            && self.paused.is_none()
            && !self.user_typing
            && !self.editing_theme
            && !self.in_flight
    }

    fn may_reschedule(&self) -> bool {
        self.running && self.paused.is_none() && !self.user_typing && !self.in_flight
    }
}

/// A point-in-time copy of the session for the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub theme: String,
    pub next_speaker: ProviderId,
    pub last_speaker: Option<ProviderId>,
    pub paused: Option<PauseReason>,
    pub turns: Vec<Turn>,
}

/// Everything the scheduler reports to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    TurnAppended(Turn),
    /// A provider is about to be asked; show the thinking indication.
    Thinking { speaker: ProviderId },
    ThinkingCleared,
    PhaseChanged(Phase),
}

#[derive(Debug)]
pub enum SchedulerCommand {
    Start { theme: String },
    SetTheme { theme: String },
    ThemeEditing { active: bool },
    TogglePause,
    UserTyping,
    /// The input lost focus or was cleared.
    UserIdle,
    Submit { text: String },
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Cloneable sender side of a running scheduler.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    async fn send(&self, command: SchedulerCommand) -> Result<(), SchedulerClosed> {
        self.tx.send(command).await.map_err(|_| SchedulerClosed)
    }

    pub async fn start(&self, theme: impl Into<String>) -> Result<(), SchedulerClosed> {
        self.send(SchedulerCommand::Start {
            theme: theme.into(),
        })
        .await
    }

    pub async fn set_theme(&self, theme: impl Into<String>) -> Result<(), SchedulerClosed> {
        self.send(SchedulerCommand::SetTheme {
            theme: theme.into(),
        })
        .await
    }

    pub async fn theme_editing(&self, active: bool) -> Result<(), SchedulerClosed> {
        self.send(SchedulerCommand::ThemeEditing { active }).await
    }

    pub async fn toggle_pause(&self) -> Result<(), SchedulerClosed> {
        self.send(SchedulerCommand::TogglePause).await
    }

    pub async fn user_typing(&self) -> Result<(), SchedulerClosed> {
        self.send(SchedulerCommand::UserTyping).await
    }

    pub async fn user_idle(&self) -> Result<(), SchedulerClosed> {
        self.send(SchedulerCommand::UserIdle).await
    }

    pub async fn submit(&self, text: impl Into<String>) -> Result<(), SchedulerClosed> {
        self.send(SchedulerCommand::Submit { text: text.into() })
            .await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SchedulerClosed> {
        let (tx, rx) = oneshot::channel();
        self.send(SchedulerCommand::Snapshot(tx)).await?;
        rx.await.map_err(|_| SchedulerClosed)
    }
}

struct InFlight {
    provider: ProviderId,
    call: BoxFuture<'static, AskTurnResponse>,
}

enum Wake {
    Command(Option<SchedulerCommand>),
    Completed(ProviderId, AskTurnResponse),
    TurnDue,
    ThinkingDone,
    TypingQuiet,
    Inactive,
}

pub struct TurnScheduler {
    config: SchedulerConfig,
    executor: Arc<dyn TurnExecutor>,
    state: SessionState,
    events: mpsc::UnboundedSender<SessionEvent>,
    next_turn: Deadline,
    thinking: Deadline,
    typing_quiet: Deadline,
    inactivity: Deadline,
    in_flight: Option<InFlight>,
    last_completed: Option<Instant>,
    published_phase: Phase,
}

impl TurnScheduler {
    pub fn new(
        config: SchedulerConfig,
        executor: Arc<dyn TurnExecutor>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let mut scheduler = Self {
            config,
            executor,
            state: SessionState::default(),
            events,
            next_turn: Deadline::default(),
            thinking: Deadline::default(),
            typing_quiet: Deadline::default(),
            inactivity: Deadline::default(),
            in_flight: None,
            last_completed: None,
            published_phase: Phase::Idle,
        };
        scheduler.notice(WELCOME_NOTICE);
        scheduler
    }

    /// Spawns a scheduler task and returns its handle, its event stream and the
    /// task itself. The task ends when every handle has been dropped.
    pub fn spawn(
        config: SchedulerConfig,
        executor: Arc<dyn TurnExecutor>,
    ) -> (
        SchedulerHandle,
        mpsc::UnboundedReceiver<SessionEvent>,
        JoinHandle<()>,
    ) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let scheduler = Self::new(config, executor, event_tx);
        let task = tokio::spawn(scheduler.run(command_rx));
        (SchedulerHandle { tx: command_tx }, event_rx, task)
    }

    /// The scheduler's main loop.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SchedulerCommand>) {
        info!("Turn scheduler started.");
        loop {
            let wake = tokio::select! {
                command = commands.recv() => Wake::Command(command),
                (provider, response) = completion(&mut self.in_flight) => Wake::Completed(provider, response),
                _ = self.next_turn.elapsed() => Wake::TurnDue,
                _ = self.thinking.elapsed() => Wake::ThinkingDone,
                _ = self.typing_quiet.elapsed() => Wake::TypingQuiet,
                _ = self.inactivity.elapsed() => Wake::Inactive,
            };

            match wake {
                Wake::Command(None) => break,
                Wake::Command(Some(command)) => self.handle_command(command),
                Wake::Completed(provider, response) => self.on_completed(provider, response),
                Wake::TurnDue => self.on_turn_due(),
                Wake::ThinkingDone => self.on_thinking_done(),
                Wake::TypingQuiet => self.on_typing_quiet(),
                Wake::Inactive => self.on_inactive(),
            }
            self.publish_phase();
        }
        info!("Turn scheduler stopped.");
    }

    fn handle_command(&mut self, command: SchedulerCommand) {
        match command {
            SchedulerCommand::Start { theme } => self.start(theme),
            SchedulerCommand::SetTheme { theme } => {
                debug!(%theme, "Theme updated.");
                self.state.theme = theme;
            }
            SchedulerCommand::ThemeEditing { active } => self.theme_editing(active),
            SchedulerCommand::TogglePause => self.toggle_pause(),
            SchedulerCommand::UserTyping => self.user_typing(),
            SchedulerCommand::UserIdle => self.user_idle(),
            SchedulerCommand::Submit { text } => self.submit(text),
            SchedulerCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn start(&mut self, theme: String) {
        let theme = theme.trim().to_string();
        if theme.is_empty() {
            self.notice(EMPTY_THEME_NOTICE);
            return;
        }

        info!(%theme, "Conversation started.");
        self.notice(format!("Starting the conversation on \"{theme}\"."));
        self.state.theme = theme;
        self.state.running = true;
        self.state.paused = None;
        self.state.last_speaker = None;
        self.state.next_speaker = ProviderId::ChatGpt;
        self.inactivity.arm(self.config.inactivity_timeout);
        self.reschedule(Duration::ZERO);
    }

    fn toggle_pause(&mut self) {
        if !self.state.running {
            debug!("Pause toggled before start; ignoring.");
            return;
        }
        if self.state.paused.is_some() {
            self.resume();
        } else {
            self.pause(PauseReason::User);
        }
    }

    fn pause(&mut self, reason: PauseReason) {
        info!(?reason, "Conversation paused.");
        self.state.paused = Some(reason);
        self.next_turn.cancel();
        self.inactivity.cancel();
        self.clear_thinking();
        match reason {
            PauseReason::User => self.notice(PAUSED_NOTICE),
            PauseReason::Inactivity => self.notice(format!(
                "Conversation paused after {}s without new turns.",
                self.config.inactivity_timeout.as_secs()
            )),
        }
    }

    fn resume(&mut self) {
        info!("Conversation resumed.");
        self.state.paused = None;
        if let Some(last) = self.state.last_speaker {
            self.state.next_speaker = last.other();
        }
        self.notice(RESUMED_NOTICE);
        self.inactivity.arm(self.config.inactivity_timeout);
        if self.state.may_reschedule() {
            self.reschedule(self.config.resume_delay);
        }
    }

    fn user_typing(&mut self) {
        self.state.user_typing = true;
        self.typing_quiet.arm(self.config.typing_quiet);
        self.next_turn.cancel();
        self.clear_thinking();
    }

    fn user_idle(&mut self) {
        if !self.state.user_typing {
            return;
        }
        self.state.user_typing = false;
        self.typing_quiet.cancel();
        if self.state.may_reschedule() {
            self.reschedule(self.config.resume_delay);
        }
    }

    fn theme_editing(&mut self, active: bool) {
        self.state.editing_theme = active;
        if active {
            self.next_turn.cancel();
            self.clear_thinking();
        } else if self.state.may_reschedule() {
            self.reschedule(self.config.resume_delay);
        }
    }

    fn submit(&mut self, text: String) {
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }
        self.append(Speaker::User, text);

        self.state.user_typing = false;
        self.typing_quiet.cancel();
        if self.state.paused.take().is_some() {
            info!("Conversation resumed by a human message.");
            self.notice(RESUMED_NOTICE);
        }
        if self.state.running {
            self.inactivity.arm(self.config.inactivity_timeout);
            if self.state.may_reschedule() {
                self.reschedule(self.config.resume_delay);
            }
        }
    }

    fn on_turn_due(&mut self) {
        self.next_turn.cancel();
        if !self.state.may_fire() || self.thinking.is_armed() {
            debug!(phase = ?self.state.phase(), "Turn slot skipped.");
            return;
        }
        let speaker = self.state.next_speaker;
        self.emit(SessionEvent::Thinking { speaker });
        self.thinking.arm(self.config.thinking_delay);
    }

    fn on_thinking_done(&mut self) {
        self.thinking.cancel();
        if !self.state.may_fire() {
            debug!(phase = ?self.state.phase(), "Dispatch abandoned.");
            self.emit(SessionEvent::ThinkingCleared);
            return;
        }
        self.dispatch();
    }

    fn dispatch(&mut self) {
        let provider = self.state.next_speaker;
        let request = AskTurnRequest {
            provider,
            theme: self.state.theme.trim().to_string(),
            history: self
                .state
                .transcript
                .recent_window(self.config.history_window)
                .into_iter()
                .map(HistoryEntry::from)
                .collect(),
        };
        info!(%provider, history_len = request.history.len(), "Dispatching provider turn.");

        let executor = Arc::clone(&self.executor);
        self.state.in_flight = true;
        self.in_flight = Some(InFlight {
            provider,
            call: Box::pin(async move { executor.ask_turn(request).await }),
        });
    }

    /// Results are appended even if a pause arrived while the call ran; the
    /// request has already been spent.
    fn on_completed(&mut self, provider: ProviderId, response: AskTurnResponse) {
        self.in_flight = None;
        self.state.in_flight = false;
        self.emit(SessionEvent::ThinkingCleared);

        match response {
            AskTurnResponse {
                ok: true,
                text: Some(text),
                ..
            } if !text.trim().is_empty() => {
                self.append(provider.into(), text);
                if self.state.running && self.state.paused.is_none() {
                    self.inactivity.arm(self.config.inactivity_timeout);
                }
            }
            response => {
                let error = response
                    .error
                    .unwrap_or_else(|| "Unknown error".to_string());
                warn!(%provider, %error, "Provider turn failed; moving on.");
                self.notice(format!("[{provider}] error: {error}"));
            }
        }

        self.state.last_speaker = Some(provider);
        self.state.next_speaker = provider.other();
        self.last_completed = Some(Instant::now());
        if self.state.may_reschedule() {
            self.next_turn.arm(self.config.min_interval);
        }
    }

    /// Arms the next turn after `delay`, but never sooner than `min_interval`
    /// after the previous call completed.
    fn reschedule(&mut self, delay: Duration) {
        let floor = self.last_completed.map_or(Duration::ZERO, |at| {
            self.config.min_interval.saturating_sub(at.elapsed())
        });
        self.next_turn.arm(delay.max(floor));
    }

    fn on_typing_quiet(&mut self) {
        self.typing_quiet.cancel();
        self.state.user_typing = false;
        if self.state.may_reschedule() {
            self.reschedule(self.config.typing_resume_delay);
        }
    }

    fn on_inactive(&mut self) {
        self.inactivity.cancel();
        if self.state.running && self.state.paused.is_none() {
            self.pause(PauseReason::Inactivity);
        }
    }

    fn clear_thinking(&mut self) {
        if self.thinking.is_armed() {
            self.thinking.cancel();
            self.emit(SessionEvent::ThinkingCleared);
        }
    }

    fn append(&mut self, speaker: Speaker, text: String) {
        let turn = self.state.transcript.append(speaker, text).clone();
        self.emit(SessionEvent::TurnAppended(turn));
    }

    fn notice(&mut self, text: impl Into<String>) {
        self.append(Speaker::System, text.into());
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("Session event dropped: receiver closed.");
        }
    }

    fn publish_phase(&mut self) {
        let phase = self.state.phase();
        if phase != self.published_phase {
            self.published_phase = phase;
            self.emit(SessionEvent::PhaseChanged(phase));
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.state.phase(),
            theme: self.state.theme.clone(),
            next_speaker: self.state.next_speaker,
            last_speaker: self.state.last_speaker,
            paused: self.state.paused,
            turns: self.state.transcript.turns().to_vec(),
        }
    }
}

async fn completion(slot: &mut Option<InFlight>) -> (ProviderId, AskTurnResponse) {
    match slot {
        Some(in_flight) => {
            let provider = in_flight.provider;
            (provider, (&mut in_flight.call).await)
        }
        None => std::future::pending().await,
    }
}
