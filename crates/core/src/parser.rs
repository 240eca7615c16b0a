//! Turns raw model text into an interviewer reply.
//!
//! The model is asked for `{"question": ..., "isComplete": ...}` but may wrap
//! it in a code fence, truncate it, or answer in prose. Parsing tries a
//! strict JSON decode first and then an ordered list of extraction
//! strategies, each a pure `&str -> Option<String>`. It never fails: if
//! nothing yields a question, the language's apology is returned.

use crate::language::Language;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// The structured result of one interviewer turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewerReply {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(rename = "isComplete", default)]
    pub is_complete: bool,
}

/// How a reply was recovered from the raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    /// Strict JSON decode of the cleaned text.
    Structured,
    /// One of the extraction strategies, by name.
    Extracted(&'static str),
    /// Nothing could be recovered; the reply is the localized apology.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub reply: InterviewerReply,
    pub source: ReplySource,
}

impl ParsedReply {
    pub fn is_fallback(&self) -> bool {
        self.source == ReplySource::Fallback
    }
}

/// A named, independently testable way of pulling a question out of text.
pub struct ExtractionStrategy {
    pub name: &'static str,
    pub extract: fn(&str) -> Option<String>,
}

static QUOTED_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""question"\s*:\s*"([^"]+)""#).unwrap());
static ESCAPED_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""question"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());
static NON_ASCII_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""question"\s*:\s*"([^"]*[^\x00-\x7F][^"]*)"#).unwrap());
static UNQUOTED_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)question["\s:]+([^"}\n,]+)"#).unwrap());
static QUESTION_SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\p{Lu}[^}]{20,200}\?)").unwrap());

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn extract_quoted_field(text: &str) -> Option<String> {
    first_capture(&QUOTED_FIELD, text)
}

pub fn extract_escaped_field(text: &str) -> Option<String> {
    first_capture(&ESCAPED_FIELD, text)
}

/// Matches a quoted value containing at least one non-ASCII character, and
/// tolerates a missing closing quote from a truncated response.
pub fn extract_non_ascii_field(text: &str) -> Option<String> {
    first_capture(&NON_ASCII_FIELD, text)
}

pub fn extract_unquoted_field(text: &str) -> Option<String> {
    first_capture(&UNQUOTED_FIELD, text)
}

pub fn extract_question_sentence(text: &str) -> Option<String> {
    first_capture(&QUESTION_SENTENCE, text)
}

/// Extraction strategies in order of preference.
pub const STRATEGIES: [ExtractionStrategy; 5] = [
    ExtractionStrategy {
        name: "quoted_field",
        extract: extract_quoted_field,
    },
    ExtractionStrategy {
        name: "escaped_field",
        extract: extract_escaped_field,
    },
    ExtractionStrategy {
        name: "non_ascii_field",
        extract: extract_non_ascii_field,
    },
    ExtractionStrategy {
        name: "unquoted_field",
        extract: extract_unquoted_field,
    },
    ExtractionStrategy {
        name: "question_sentence",
        extract: extract_question_sentence,
    },
];

/// Removes a leading ```` ``` ```` or ```` ```json ```` fence and a trailing
/// ```` ``` ````.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Replaces `\n`, `\"`, `\'` and `\\` escape sequences in a single pass.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[derive(Deserialize)]
struct RawReply {
    question: Option<String>,
    feedback: Option<String>,
    #[serde(rename = "isComplete", alias = "is_complete")]
    is_complete: Option<bool>,
}

fn parse_structured(text: &str) -> Option<InterviewerReply> {
    let raw: RawReply = serde_json::from_str(text).ok()?;
    let question = raw.question?.trim().to_string();
    if question.is_empty() {
        return None;
    }
    Some(InterviewerReply {
        question,
        feedback: raw.feedback.filter(|f| !f.trim().is_empty()),
        is_complete: raw.is_complete.unwrap_or(false),
    })
}

/// Like `parse`, but reports which path produced the reply.
pub fn parse_detailed(raw: &str, language: Language) -> ParsedReply {
    let cleaned = strip_code_fence(raw);

    if let Some(reply) = parse_structured(cleaned) {
        return ParsedReply {
            reply,
            source: ReplySource::Structured,
        };
    }

    for strategy in &STRATEGIES {
        let Some(found) = (strategy.extract)(cleaned) else {
            continue;
        };
        let question = unescape(found.trim()).trim().to_string();
        if !question.chars().any(char::is_alphanumeric) {
            continue;
        }
        tracing::debug!(strategy = strategy.name, "Recovered question from malformed output");
        return ParsedReply {
            reply: InterviewerReply {
                question,
                feedback: None,
                is_complete: false,
            },
            source: ReplySource::Extracted(strategy.name),
        };
    }

    tracing::warn!(raw_len = raw.len(), "Could not recover a question from model output");
    ParsedReply {
        reply: InterviewerReply {
            question: language.apology().to_string(),
            feedback: None,
            is_complete: false,
        },
        source: ReplySource::Fallback,
    }
}

/// Parses raw model text into a reply. Never fails and never returns an
/// empty question.
pub fn parse(raw: &str, language: Language) -> InterviewerReply {
    parse_detailed(raw, language).reply
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_json_is_parsed_with_completion_flag() {
        let parsed = parse_detailed(
            r#"{"question":"Thank you. That concludes our technical discussion.","isComplete":true}"#,
            Language::En,
        );
        assert_eq!(parsed.source, ReplySource::Structured);
        assert!(parsed.reply.is_complete);
        assert!(parsed.reply.question.starts_with("Thank you"));
    }

    #[test]
    fn test_optional_feedback_is_kept() {
        let reply = parse(
            r#"{"question":"¿Qué es un índice?","feedback":"Buena base","isComplete":false}"#,
            Language::Es,
        );
        assert_eq!(reply.feedback.as_deref(), Some("Buena base"));
        assert!(!reply.is_complete);
    }

    #[test]
    fn test_code_fences_are_stripped() {
        let raw = "```json\n{\"question\":\"What is ownership?\",\"isComplete\":false}\n```";
        let parsed = parse_detailed(raw, Language::En);
        assert_eq!(parsed.source, ReplySource::Structured);
        assert_eq!(parsed.reply.question, "What is ownership?");

        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {}  "), "{}");
    }

    #[test]
    fn test_truncated_json_falls_back_to_quoted_field() {
        let raw = r#"{"question":"How does a B-tree stay balanced?","isCompl"#;
        let parsed = parse_detailed(raw, Language::En);
        assert_eq!(parsed.source, ReplySource::Extracted("quoted_field"));
        assert_eq!(parsed.reply.question, "How does a B-tree stay balanced?");
        assert!(!parsed.reply.is_complete);
    }

    #[test]
    fn test_escaped_quotes_are_recovered_and_unescaped() {
        let raw = r#"{"question": "What does \"move\" mean?\nExplain.", trailing garbage"#;
        assert_eq!(extract_quoted_field(raw).as_deref(), Some(r"What does \"));
        let escaped = extract_escaped_field(raw).unwrap();
        assert_eq!(unescape(&escaped), "What does \"move\" mean?\nExplain.");
    }

    #[test]
    fn test_non_ascii_strategy_tolerates_missing_closing_quote() {
        let raw = r#"{"question": "Bir işlemin ACID özellikleri nelerdir?"#;
        assert_eq!(
            extract_non_ascii_field(raw).as_deref(),
            Some("Bir işlemin ACID özellikleri nelerdir?")
        );
        let parsed = parse_detailed(raw, Language::Tr);
        assert_eq!(parsed.source, ReplySource::Extracted("non_ascii_field"));
    }

    #[test]
    fn test_unquoted_field_is_recovered() {
        let raw = "question: Describe the CAP theorem\nisComplete: false";
        assert_eq!(
            extract_unquoted_field(raw).as_deref(),
            Some("Describe the CAP theorem")
        );
        let parsed = parse_detailed(raw, Language::En);
        assert_eq!(parsed.source, ReplySource::Extracted("unquoted_field"));
    }

    #[test]
    fn test_plain_prose_question_is_recovered() {
        let raw = "Sure! Here is my next one. Can you explain how garbage collection works in Java?";
        let parsed = parse_detailed(raw, Language::En);
        assert_eq!(parsed.source, ReplySource::Extracted("question_sentence"));
        assert!(parsed.reply.question.ends_with('?'));
    }

    #[test]
    fn test_unrecoverable_input_yields_localized_apology() {
        for (raw, language) in [
            ("", Language::En),
            ("ok", Language::De),
            ("{}", Language::Fr),
            (r#"{"question":""}"#, Language::Tr),
        ] {
            let parsed = parse_detailed(raw, language);
            assert!(parsed.is_fallback(), "expected fallback for {raw:?}");
            assert_eq!(parsed.reply.question, language.apology());
            assert!(!parsed.reply.is_complete);
        }
    }

    #[test]
    fn test_parse_always_yields_a_question() {
        let inputs = [
            "",
            "   ",
            "null",
            "[1, 2, 3]",
            "```",
            "```json",
            r#"{"isComplete": true}"#,
            r#"{"question": 42}"#,
            "\\",
            "question:",
            "🙂🙂🙂",
        ];
        for raw in inputs {
            let reply = parse(raw, Language::En);
            assert!(!reply.question.trim().is_empty(), "empty question for {raw:?}");
        }
    }

    #[test]
    fn test_unescape_handles_trailing_backslash_and_unknown_sequences() {
        assert_eq!(unescape(r"a\\b"), r"a\b");
        assert_eq!(unescape(r"tab\tstays"), r"tab\tstays");
        assert_eq!(unescape("end\\"), "end\\");
        assert_eq!(unescape(r"it\'s"), "it's");
    }
}
