use std::time::Duration;
use tokio::time::{Instant, sleep_until};

/// A cancellable, resettable one-shot deadline.
///
/// Arming an armed deadline moves it, which gives debounce semantics for free:
/// re-arm on every activity and the deadline only elapses after a quiet period.
#[derive(Debug, Default, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn arm(&mut self, after: Duration) {
        self.at = Some(Instant::now() + after);
    }

    pub fn cancel(&mut self) {
        self.at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    /// Resolves once the deadline passes. Never resolves while unarmed.
    ///
    /// The deadline stays armed after it elapses; callers `cancel` it when they
    /// act on it.
    pub async fn elapsed(&self) {
        match self.at {
            Some(at) => sleep_until(at).await,
            None => std::future::pending().await,
        }
    }
}
