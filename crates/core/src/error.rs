use crate::transcript::ProviderId;

/// Failures a provider call can end in.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The provider's credential was absent at startup; no call was attempted.
    #[error("{} is not set (.env).", provider.env_var())]
    NotConfigured { provider: ProviderId },
    #[error("rate limit reached: {0}")]
    RateLimited(String),
    #[error("quota exhausted: {0}")]
    QuotaExceeded(String),
    #[error("{0}")]
    Remote(String),
    #[error("Unknown error")]
    EmptyResponse,
}

impl ProviderError {
    /// Errors that a retry could plausibly fix.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::NotConfigured { .. })
    }
}

/// The scheduler task has stopped and no longer accepts commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("the turn scheduler has stopped")]
pub struct SchedulerClosed;
