use interview_core::session::SessionLimits;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// The OpenAI-compatible completion backends the service can talk to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Groq,
}

impl Provider {
    pub fn api_base(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::Groq => "https://api.groq.com/openai/v1",
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub chat_model: String,
    pub log_level: Level,
    pub prompts_path: Option<PathBuf>,
    pub limits: SessionLimits,
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
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

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let provider_str = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "groq".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "openai" => Provider::OpenAI,
            "groq" => Provider::Groq,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LLM_PROVIDER".to_string(),
                    format!("'{}' is not one of 'openai', 'groq'", other),
                ));
            }
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let groq_api_key = std::env::var("GROQ_API_KEY").ok();

        let chat_model = std::env::var("CHAT_MODEL")
            .unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH").ok().map(PathBuf::from);

        let defaults = SessionLimits::default();
        let limits = SessionLimits {
            max_questions: parse_var("MAX_QUESTIONS", defaults.max_questions)?,
            max_duration: Duration::from_secs(
                60 * parse_var("MAX_DURATION_MINUTES", defaults.max_duration.as_secs() / 60)?,
            ),
            min_call_interval: Duration::from_millis(parse_var(
                "MIN_CALL_INTERVAL_MS",
                defaults.min_call_interval.as_millis() as u64,
            )?),
            call_timeout: Duration::from_secs(parse_var(
                "MODEL_CALL_TIMEOUT_SECS",
                defaults.call_timeout.as_secs(),
            )?),
            ..defaults
        };
        if limits.max_questions == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_QUESTIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        match provider {
            Provider::OpenAI => {
                if openai_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                    ));
                }
            }
            Provider::Groq => {
                if groq_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "GROQ_API_KEY must be set for 'groq' provider".to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            bind_address,
            database_url,
            provider,
            openai_api_key,
            groq_api_key,
            chat_model,
            log_level,
            prompts_path,
            limits,
        })
    }

    /// The API key for the configured provider.
    pub fn api_key(&self) -> Option<&str> {
        match self.provider {
            Provider::OpenAI => self.openai_api_key.as_deref(),
            Provider::Groq => self.groq_api_key.as_deref(),
        }
    }
}
