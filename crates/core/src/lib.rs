pub mod boundary;
pub mod error;
pub mod llm_client;
pub mod prompt;
pub mod provider;
pub mod scheduler;
pub mod timer;
pub mod transcript;

pub use boundary::{AskTurnRequest, AskTurnResponse, Boundary, Capabilities};
pub use error::{ProviderError, SchedulerClosed};
pub use scheduler::{
    Phase, SchedulerConfig, SchedulerHandle, SessionEvent, SessionSnapshot, TurnExecutor,
    TurnScheduler,
};
pub use transcript::{HistoryEntry, ProviderId, Speaker, Transcript, Turn};
