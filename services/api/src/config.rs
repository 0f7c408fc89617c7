use duologue_core::{
    SchedulerConfig,
    llm_client::{DEFAULT_GEMINI_MODEL, DEFAULT_OPENAI_MODEL, SamplingParams},
    provider::FailurePolicy,
};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_model: String,
    pub gemini_model: String,
    pub sampling: SamplingParams,
    pub failure_policy: FailurePolicy,
    pub scheduler: SchedulerConfig,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Missing credentials are not an error: the affected provider simply
    /// reports itself as unavailable.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let openai_api_key = credential("OPENAI_API_KEY");
        let gemini_api_key = credential("GEMINI_API_KEY");

        let openai_model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string());
        let gemini_model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string());

        let defaults = SamplingParams::default();
        let sampling = SamplingParams {
            temperature: parse_var("TEMPERATURE", defaults.temperature)?,
            max_tokens: parse_var("MAX_TOKENS", defaults.max_tokens)?,
        };

        let policy_str =
            std::env::var("FAILURE_POLICY").unwrap_or_else(|_| "apologize".to_string());
        let failure_policy = match policy_str.to_lowercase().as_str() {
            "apologize" => FailurePolicy::Apologize,
            "retry" => FailurePolicy::retry(),
            other => {
                return Err(ConfigError::InvalidValue(
                    "FAILURE_POLICY".to_string(),
                    format!("'{}' is not one of 'apologize' or 'retry'", other),
                ));
            }
        };

        let pacing = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            min_interval: parse_millis("MIN_INTERVAL_MS", pacing.min_interval)?,
            thinking_delay: parse_millis("THINKING_DELAY_MS", pacing.thinking_delay)?,
            typing_quiet: parse_millis("TYPING_QUIET_MS", pacing.typing_quiet)?,
            inactivity_timeout: parse_millis("INACTIVITY_TIMEOUT_MS", pacing.inactivity_timeout)?,
            history_window: parse_var("HISTORY_WINDOW", pacing.history_window)?,
            ..pacing
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            openai_api_key,
            gemini_api_key,
            openai_model,
            gemini_model,
            sampling,
            failure_policy,
            scheduler,
            log_level,
        })
    }
}

/// Reads a credential, treating an empty value as absent.
fn credential(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_millis(name: &str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Ok(_) => parse_var::<u64>(name, 0).map(Duration::from_millis),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    fn clear_env_vars() {
        unsafe {
            for var in [
                "BIND_ADDRESS",
                "OPENAI_API_KEY",
                "GEMINI_API_KEY",
                "OPENAI_MODEL",
                "GEMINI_MODEL",
                "TEMPERATURE",
                "MAX_TOKENS",
                "FAILURE_POLICY",
                "MIN_INTERVAL_MS",
                "THINKING_DELAY_MS",
                "TYPING_QUIET_MS",
                "INACTIVITY_TIMEOUT_MS",
                "HISTORY_WINDOW",
                "RUST_LOG",
            ] {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_config_error_display() {
        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        clear_env_vars();

        let config = Config::from_env().expect("Config should load without credentials");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.openai_api_key, None);
        assert_eq!(config.gemini_api_key, None);
        assert_eq!(config.openai_model, "gpt-3.5-turbo");
        assert_eq!(config.gemini_model, "gemini-1.5-flash");
        assert_eq!(config.sampling, SamplingParams::default());
        assert_eq!(config.failure_policy, FailurePolicy::Apologize);
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
            env::set_var("OPENAI_API_KEY", "test-openai-key");
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
            env::set_var("OPENAI_MODEL", "gpt-4o-mini");
            env::set_var("TEMPERATURE", "0.9");
            env::set_var("MAX_TOKENS", "200");
            env::set_var("FAILURE_POLICY", "retry");
            env::set_var("MIN_INTERVAL_MS", "1500");
            env::set_var("INACTIVITY_TIMEOUT_MS", "60000");
            env::set_var("HISTORY_WINDOW", "10");
            env::set_var("RUST_LOG", "debug");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.openai_api_key, Some("test-openai-key".to_string()));
        assert_eq!(config.gemini_api_key, Some("test-gemini-key".to_string()));
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.sampling.max_tokens, 200);
        assert!((config.sampling.temperature - 0.9).abs() < f32::EPSILON);
        assert_eq!(config.failure_policy, FailurePolicy::retry());
        assert_eq!(config.scheduler.min_interval, Duration::from_millis(1500));
        assert_eq!(config.scheduler.inactivity_timeout, Duration::from_secs(60));
        assert_eq!(config.scheduler.history_window, 10);
        assert_eq!(
            config.scheduler.thinking_delay,
            SchedulerConfig::default().thinking_delay
        );
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    #[serial]
    fn test_empty_credential_counts_as_missing() {
        clear_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "   ");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.openai_api_key, None);
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_policy_and_numbers() {
        clear_env_vars();
        unsafe {
            env::set_var("FAILURE_POLICY", "shrug");
        }
        match Config::from_env().unwrap_err() {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "FAILURE_POLICY"),
            _ => panic!("Expected InvalidValue for FAILURE_POLICY"),
        }

        clear_env_vars();
        unsafe {
            env::set_var("MIN_INTERVAL_MS", "soon");
        }
        match Config::from_env().unwrap_err() {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "MIN_INTERVAL_MS"),
            _ => panic!("Expected InvalidValue for MIN_INTERVAL_MS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }
}
