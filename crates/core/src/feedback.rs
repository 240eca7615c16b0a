//! Post-session assessment.
//!
//! The full transcript is sent to the model for a multi-axis assessment. The
//! model's overall score is then capped at 10 points above a heuristic score
//! derived from how many answers were some form of "I don't know".

use crate::{
    language::{Language, Level, is_negative_answer},
    llm_client::{CompletionOptions, LLMClient},
    parser::strip_code_fence,
    prompts::{FEEDBACK_USER_PROMPT, PromptLibrary},
    transcript::{MessageRole, TranscriptMessage, question_count, render_conversation},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// How far the model's score may exceed the heuristic score.
pub const MODEL_SCORE_ALLOWANCE: u8 = 10;

const TECHNICAL_FRACTION: f64 = 0.9;
const COMMUNICATION_FRACTION: f64 = 0.95;
const PROBLEM_SOLVING_FRACTION: f64 = 0.85;

/// The final assessment of an interview. Produced once, never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub overall_score: u8,
    pub technical_score: u8,
    pub communication_score: u8,
    pub problem_solving_score: u8,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub opportunities: Vec<String>,
    pub threats: Vec<String>,
    pub recommendations: Vec<String>,
    pub overall_assessment: String,
    pub swot_analysis: String,
}

impl Feedback {
    /// Substituted when the assessment call or its parse fails.
    pub fn neutral() -> Self {
        Self {
            overall_score: 75,
            technical_score: 75,
            communication_score: 80,
            problem_solving_score: 70,
            strengths: vec![
                "Good technical knowledge".to_string(),
                "Clear communication".to_string(),
            ],
            weaknesses: vec!["Could go deeper on some topics".to_string()],
            opportunities: vec![
                "Further skill development".to_string(),
                "Advanced certifications".to_string(),
            ],
            threats: vec![
                "Competition in the field".to_string(),
                "Rapid technology changes".to_string(),
            ],
            recommendations: vec![
                "Practice system design".to_string(),
                "Study advanced patterns".to_string(),
            ],
            overall_assessment: "Solid candidate with room for growth.".to_string(),
            swot_analysis:
                "Candidate shows strong fundamentals but needs deeper technical expertise."
                    .to_string(),
        }
    }
}

/// Reads a score field. Numbers and numeric strings count; zero, null and
/// anything else count as not reported.
fn score_field(assessment: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = match assessment.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (value.is_finite() && value != 0.0).then_some(value)
}

/// Reads a list field, keeping only its string items.
fn list_field(assessment: &Map<String, Value>, key: &str) -> Vec<String> {
    assessment
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn text_field(assessment: &Map<String, Value>, key: &str, default: &str) -> String {
    assessment
        .get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .unwrap_or(default)
        .to_string()
}

fn to_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

/// Share of interviewer turns that were not answered with "I don't know",
/// as a 0-100 score.
pub fn heuristic_score(transcript: &[TranscriptMessage]) -> u8 {
    let turns = question_count(transcript);
    if turns == 0 {
        return 0;
    }
    let negative = transcript
        .iter()
        .filter(|m| m.role == MessageRole::User && is_negative_answer(&m.content))
        .count();
    let answered = turns.saturating_sub(negative);
    to_score(100.0 * answered as f64 / turns as f64)
}

/// Caps a model-reported overall score against the heuristic score. An
/// unreported score falls back to the heuristic.
pub fn clamp_overall(model_score: Option<f64>, heuristic: u8) -> u8 {
    let ceiling = heuristic.saturating_add(MODEL_SCORE_ALLOWANCE).min(100);
    let reported = model_score.map(to_score).unwrap_or(heuristic);
    reported.min(ceiling)
}

/// Parses the model's assessment and calibrates it against the transcript.
/// Returns `None` only if the text is not a JSON object; malformed fields
/// are treated as missing.
pub fn calibrate(raw: &str, transcript: &[TranscriptMessage]) -> Option<Feedback> {
    let value: Value = serde_json::from_str(strip_code_fence(raw)).ok()?;
    let assessment = value.as_object()?;
    let heuristic = heuristic_score(transcript);
    let overall = clamp_overall(score_field(assessment, "overall_score"), heuristic);
    let subscore = |key: &str, fraction: f64| {
        score_field(assessment, key)
            .map(to_score)
            .unwrap_or_else(|| to_score(overall as f64 * fraction))
    };

    Some(Feedback {
        overall_score: overall,
        technical_score: subscore("technical_score", TECHNICAL_FRACTION),
        communication_score: subscore("communication_score", COMMUNICATION_FRACTION),
        problem_solving_score: subscore("problem_solving_score", PROBLEM_SOLVING_FRACTION),
        strengths: list_field(assessment, "strengths"),
        weaknesses: list_field(assessment, "weaknesses"),
        opportunities: list_field(assessment, "opportunities"),
        threats: list_field(assessment, "threats"),
        recommendations: list_field(assessment, "recommendations"),
        overall_assessment: text_field(assessment, "overall_assessment", "Assessment completed."),
        swot_analysis: text_field(assessment, "swot_analysis", "SWOT analysis completed."),
    })
}

/// Produces the final `Feedback` for a finished session.
pub struct FeedbackCalibrator {
    llm: Arc<dyn LLMClient>,
    prompts: Arc<PromptLibrary>,
    call_timeout: Duration,
}

impl FeedbackCalibrator {
    pub fn new(llm: Arc<dyn LLMClient>, prompts: Arc<PromptLibrary>, call_timeout: Duration) -> Self {
        Self {
            llm,
            prompts,
            call_timeout,
        }
    }

    /// Assesses the transcript. Never fails: any model or parse failure
    /// yields `Feedback::neutral()`.
    #[instrument(name = "calibrate_feedback", skip_all, fields(messages = transcript.len()))]
    pub async fn assess(
        &self,
        transcript: &[TranscriptMessage],
        role: &str,
        level: Level,
        language: Language,
    ) -> Feedback {
        let conversation = render_conversation(transcript, "\n\n");
        let system_prompt = self.prompts.feedback_prompt(language, role, level, &conversation);
        let options = CompletionOptions::assessment();
        let call = self
            .llm
            .complete(&system_prompt, FEEDBACK_USER_PROMPT, &options);

        let raw = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(error = ?e, "Assessment call failed, using neutral feedback");
                return Feedback::neutral();
            }
            Err(_) => {
                warn!(timeout = ?self.call_timeout, "Assessment call timed out, using neutral feedback");
                return Feedback::neutral();
            }
        };

        match calibrate(&raw, transcript) {
            Some(feedback) => {
                info!(
                    overall_score = feedback.overall_score,
                    heuristic_score = heuristic_score(transcript),
                    "Feedback calibrated"
                );
                feedback
            }
            None => {
                warn!("Assessment output was not a JSON object, using neutral feedback");
                Feedback::neutral()
            }
        }
    }
}
