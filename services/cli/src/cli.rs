//! Command-line argument parsing for the terminal interview.

use clap::{Parser, ValueEnum};
use interview_core::{
    language::{Language, Level},
    session::{DEFAULT_CALL_TIMEOUT, SessionConfig, SessionLimits},
};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Openai,
    Groq,
}

impl Provider {
    pub fn api_base(&self) -> &'static str {
        match self {
            Provider::Openai => "https://api.openai.com/v1",
            Provider::Groq => "https://api.groq.com/openai/v1",
        }
    }

    /// The environment variable holding this provider's key.
    pub fn key_var(&self) -> &'static str {
        match self {
            Provider::Openai => "OPENAI_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
        }
    }
}

/// Run a mock job interview in the terminal. Each stdin line is one answer;
/// end of input finishes the interview and prints the feedback.
#[derive(Parser, Debug)]
#[command(name = "interview")]
#[command(about = "Terminal interview with an AI interviewer", long_about = None)]
pub struct Cli {
    /// The role being interviewed for
    #[arg(long)]
    pub role: String,

    /// Seniority: junior, mid, senior, lead or architect
    #[arg(long, default_value = "mid")]
    pub level: Level,

    /// Interview language code (tr, en, es, fr, de)
    #[arg(long, default_value = "en")]
    pub language: String,

    #[arg(long, value_enum, env = "LLM_PROVIDER", default_value = "groq")]
    pub provider: Provider,

    #[arg(long, env = "CHAT_MODEL", default_value = "llama-3.3-70b-versatile")]
    pub model: String,

    /// API key (overrides $OPENAI_API_KEY / $GROQ_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Directory of `*.md` prompt overrides
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts: Option<std::path::PathBuf>,

    #[arg(long, env = "MAX_QUESTIONS", default_value_t = 8, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_questions: u64,

    #[arg(long, env = "MAX_DURATION_MINUTES", default_value_t = 20)]
    pub max_minutes: u64,

    #[arg(long, env = "MIN_CALL_INTERVAL_MS", default_value_t = 2000)]
    pub min_interval_ms: u64,

    /// Per-call model timeout in seconds
    #[arg(long, env = "MODEL_CALL_TIMEOUT_SECS", default_value_t = DEFAULT_CALL_TIMEOUT.as_secs(), value_parser = clap::value_parser!(u64).range(1..))]
    pub call_timeout_secs: u64,

    /// Print the transcript as JSON when the interview ends
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    pub fn limits(&self) -> SessionLimits {
        SessionLimits {
            max_questions: self.max_questions as usize,
            max_duration: Duration::from_secs(self.max_minutes * 60),
            min_call_interval: Duration::from_millis(self.min_interval_ms),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            ..SessionLimits::default()
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(
            self.role.trim(),
            self.level,
            Language::from_code(&self.language),
        )
        .with_limits(self.limits())
    }

    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(self.provider.key_var()).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["interview", "--role", "Backend Engineer"]).unwrap();
        assert_eq!(cli.level, Level::Mid);
        assert!(!cli.json);
        if std::env::var_os("MODEL_CALL_TIMEOUT_SECS").is_none() {
            assert_eq!(cli.limits().call_timeout, DEFAULT_CALL_TIMEOUT);
        }

        let config = cli.session_config();
        assert_eq!(config.role, "Backend Engineer");
        assert_eq!(config.language, Language::En);
    }

    #[test]
    fn test_limits_from_flags() {
        let cli = Cli::try_parse_from([
            "interview",
            "--role",
            "SRE",
            "--level",
            "senior",
            "--language",
            "tr",
            "--max-questions",
            "5",
            "--max-minutes",
            "10",
            "--min-interval-ms",
            "500",
            "--call-timeout-secs",
            "30",
        ])
        .unwrap();

        let config = cli.session_config();
        assert_eq!(config.level, Level::Senior);
        assert_eq!(config.language, Language::Tr);
        assert_eq!(config.limits.max_questions, 5);
        assert_eq!(config.limits.max_duration, Duration::from_secs(600));
        assert_eq!(config.limits.min_call_interval, Duration::from_millis(500));
        assert_eq!(config.limits.call_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Cli::try_parse_from(["interview", "--role", "SRE", "--level", "intern"]).is_err());
        assert!(Cli::try_parse_from(["interview", "--role", "SRE", "--max-questions", "0"]).is_err());
        assert!(
            Cli::try_parse_from(["interview", "--role", "SRE", "--call-timeout-secs", "0"]).is_err()
        );
        assert!(Cli::try_parse_from(["interview"]).is_err());
    }

    #[test]
    fn test_unknown_language_falls_back_to_english() {
        let cli = Cli::try_parse_from(["interview", "--role", "SRE", "--language", "xx"]).unwrap();
        assert_eq!(cli.session_config().language, Language::En);
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let cli =
            Cli::try_parse_from(["interview", "--role", "SRE", "--api-key", "sk-test"]).unwrap();
        assert_eq!(cli.resolve_api_key().as_deref(), Some("sk-test"));
    }
}
