pub mod cache;
pub mod completion;
pub mod feedback;
pub mod governor;
pub mod language;
pub mod llm_client;
pub mod parser;
pub mod persistence;
pub mod prompts;
pub mod runtime;
pub mod session;
pub mod transcript;

use completion::CompletionReason;
use feedback::Feedback;
use language::Language;
use session::TurnPhase;
use transcript::TranscriptMessage;

/// Represents commands that the core logic issues to an external runtime.
///
/// This enum is the primary API for decoupling the session's decision-making
/// from the runtime's execution of side effects (like speaking text or
/// publishing the final assessment).
#[derive(Debug, Clone)]
pub enum Command {
    /// A message was appended to the transcript.
    TranscriptAppended(TranscriptMessage),
    /// Command the runtime to speak the given text to the candidate.
    SpeakText { text: String, language: Language },
    /// The session moved to a new phase.
    PhaseChanged(TurnPhase),
    /// The interview is over and its feedback is final.
    SessionComplete {
        feedback: Feedback,
        reason: CompletionReason,
    },
}
