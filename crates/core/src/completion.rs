use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_MAX_QUESTIONS: usize = 8;
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(20 * 60);

/// Why a session stopped taking questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// The model said the interview is over.
    ModelSignaled,
    /// The interviewer turn limit was reached.
    QuestionLimit,
    /// The wall-clock limit was reached.
    TimeLimit,
    /// The client asked to end the session.
    Ended,
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CompletionReason::ModelSignaled => "model_signaled",
            CompletionReason::QuestionLimit => "question_limit",
            CompletionReason::TimeLimit => "time_limit",
            CompletionReason::Ended => "ended",
        };
        f.write_str(label)
    }
}

/// Decides after every parsed interviewer turn whether the interview is over.
///
/// The model's own signal is not trusted alone: the turn count and elapsed
/// time are hard bounds that end the session regardless of what it says.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionPolicy {
    pub max_questions: usize,
    pub max_duration: Duration,
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self {
            max_questions: DEFAULT_MAX_QUESTIONS,
            max_duration: DEFAULT_MAX_DURATION,
        }
    }
}

impl CompletionPolicy {
    pub fn evaluate(
        &self,
        model_signaled: bool,
        question_count: usize,
        elapsed: Duration,
    ) -> Option<CompletionReason> {
        if model_signaled {
            Some(CompletionReason::ModelSignaled)
        } else if question_count >= self.max_questions {
            Some(CompletionReason::QuestionLimit)
        } else if elapsed >= self.max_duration {
            Some(CompletionReason::TimeLimit)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continues_below_every_bound() {
        let policy = CompletionPolicy::default();
        assert_eq!(policy.evaluate(false, 7, Duration::from_secs(19 * 60)), None);
    }

    #[test]
    fn test_model_signal_completes() {
        let policy = CompletionPolicy::default();
        assert_eq!(
            policy.evaluate(true, 2, Duration::from_secs(30)),
            Some(CompletionReason::ModelSignaled)
        );
    }

    #[test]
    fn test_question_limit_completes_regardless_of_model() {
        let policy = CompletionPolicy::default();
        for count in [8, 9, 20] {
            assert_eq!(
                policy.evaluate(false, count, Duration::ZERO),
                Some(CompletionReason::QuestionLimit)
            );
        }
    }

    #[test]
    fn test_duration_limit_completes_regardless_of_model() {
        let policy = CompletionPolicy::default();
        assert_eq!(
            policy.evaluate(false, 1, Duration::from_secs(20 * 60)),
            Some(CompletionReason::TimeLimit)
        );
        assert_eq!(
            policy.evaluate(false, 1, Duration::from_secs(3600)),
            Some(CompletionReason::TimeLimit)
        );
    }

    #[test]
    fn test_reason_display_matches_serde() {
        let json = serde_json::to_string(&CompletionReason::QuestionLimit).unwrap();
        assert_eq!(json, format!("\"{}\"", CompletionReason::QuestionLimit));
    }
}
