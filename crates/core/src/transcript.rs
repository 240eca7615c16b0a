use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The candidate.
    User,
    /// The interviewer.
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    /// The speaker label used when rendering a conversation into a prompt.
    pub fn speaker(&self) -> &'static str {
        match self {
            MessageRole::User => "Candidate",
            MessageRole::Assistant => "Interviewer",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single utterance in the interview, as it was accepted by the session.
///
/// Messages are append-only: once pushed onto a transcript they are never
/// mutated, and their order is the order in which they were produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Returns the most recent `size` messages of a transcript.
pub fn window(transcript: &[TranscriptMessage], size: usize) -> &[TranscriptMessage] {
    let start = transcript.len().saturating_sub(size);
    &transcript[start..]
}

/// Renders messages as `Candidate: ...` / `Interviewer: ...` lines.
pub fn render_conversation(messages: &[TranscriptMessage], separator: &str) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.speaker(), m.content))
        .collect::<Vec<_>>()
        .join(separator)
}

/// Number of interviewer turns, the greeting included.
pub fn question_count(transcript: &[TranscriptMessage]) -> usize {
    transcript
        .iter()
        .filter(|m| m.role == MessageRole::Assistant)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<TranscriptMessage> {
        vec![
            TranscriptMessage::assistant("Hello! Are you ready?"),
            TranscriptMessage::user("Yes"),
            TranscriptMessage::assistant("What is a mutex?"),
            TranscriptMessage::user("A lock."),
        ]
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MessageRole::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&MessageRole::Assistant).unwrap(),
            "\"assistant\""
        );
        assert_eq!(format!("{}", MessageRole::Assistant), "assistant");
    }

    #[test]
    fn test_window_keeps_most_recent_messages() {
        let transcript = sample();
        let recent = window(&transcript, 2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "What is a mutex?");
        assert_eq!(window(&transcript, 10).len(), 4);
        assert!(window(&[], 6).is_empty());
    }

    #[test]
    fn test_render_conversation_labels_speakers() {
        let rendered = render_conversation(&sample()[2..], "\n");
        assert_eq!(rendered, "Interviewer: What is a mutex?\nCandidate: A lock.");
    }

    #[test]
    fn test_question_count_includes_greeting() {
        assert_eq!(question_count(&sample()), 2);
    }
}
