//! Defines the WebSocket message protocol between the browser client and the API server.

use interview_core::{
    Command,
    completion::CompletionReason,
    feedback::Feedback,
    language::{Language, Level},
    runtime::SessionInput,
    session::TurnPhase,
    transcript::TranscriptMessage,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Attaches the connection to a created session. This must be the first message.
    Init { session_id: Uuid },
    /// A final utterance from the browser's speech recognition.
    UserUtterance { text: String },
    /// The browser started speaking an interviewer line.
    SpeechStarted,
    /// The browser finished speaking an interviewer line.
    SpeechEnded,
    /// A demeanor observation from the client, or `null` to clear it.
    EmotionalContext { context: Option<String> },
    /// Ends the interview early and requests feedback.
    End,
}

impl ClientMessage {
    /// The session input this message maps to. `Init` has none.
    pub fn into_input(self) -> Option<SessionInput> {
        match self {
            ClientMessage::Init { .. } => None,
            ClientMessage::UserUtterance { text } => Some(SessionInput::Utterance(text)),
            ClientMessage::SpeechStarted => Some(SessionInput::SpeechStarted),
            ClientMessage::SpeechEnded => Some(SessionInput::SpeechEnded),
            ClientMessage::EmotionalContext { context } => {
                Some(SessionInput::EmotionalContext(context))
            }
            ClientMessage::End => Some(SessionInput::End),
        }
    }
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the connection is attached to a running interview.
    Initialized {
        session_id: Uuid,
        job_role: String,
        job_level: Level,
        language: Language,
    },
    /// A message was appended to the transcript.
    TranscriptMessage { message: TranscriptMessage },
    /// Text the client should speak aloud. `speech_tag` is the BCP-47 voice
    /// locale for the browser's speech synthesis.
    Speak {
        text: String,
        language: Language,
        speech_tag: &'static str,
    },
    /// The interview moved to a new phase.
    PhaseChanged { phase: TurnPhase },
    /// The interview is over.
    SessionComplete {
        feedback: Feedback,
        reason: CompletionReason,
    },
    /// Reports an error to the client.
    Error { message: String },
}

impl From<Command> for ServerMessage {
    fn from(command: Command) -> Self {
        match command {
            Command::TranscriptAppended(message) => ServerMessage::TranscriptMessage { message },
            Command::SpeakText { text, language } => ServerMessage::Speak {
                text,
                language,
                speech_tag: language.speech_tag(),
            },
            Command::PhaseChanged(phase) => ServerMessage::PhaseChanged { phase },
            Command::SessionComplete { feedback, reason } => {
                ServerMessage::SessionComplete { feedback, reason }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_client_frames_deserialize() {
        let id = Uuid::new_v4();
        let init: ClientMessage =
            serde_json::from_value(json!({"type": "init", "session_id": id})).unwrap();
        assert_eq!(init, ClientMessage::Init { session_id: id });

        let utterance: ClientMessage =
            serde_json::from_str(r#"{"type":"user_utterance","text":"I use Postgres"}"#).unwrap();
        assert_eq!(
            utterance.into_input(),
            Some(SessionInput::Utterance("I use Postgres".to_string()))
        );

        let end: ClientMessage = serde_json::from_str(r#"{"type":"end"}"#).unwrap();
        assert_eq!(end.into_input(), Some(SessionInput::End));

        let cleared: ClientMessage =
            serde_json::from_str(r#"{"type":"emotional_context","context":null}"#).unwrap();
        assert_eq!(cleared.into_input(), Some(SessionInput::EmotionalContext(None)));
    }

    #[test]
    fn test_unknown_client_frame_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"user_message","text":"hi"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"init"}"#).is_err());
    }

    #[test]
    fn test_init_has_no_session_input() {
        let init = ClientMessage::Init {
            session_id: Uuid::nil(),
        };
        assert_eq!(init.into_input(), None);
    }

    #[test]
    fn test_commands_map_to_tagged_server_frames() {
        let speak: Value = serde_json::to_value(ServerMessage::from(Command::SpeakText {
            text: "Merhaba!".to_string(),
            language: Language::Tr,
        }))
        .unwrap();
        assert_eq!(
            speak,
            json!({"type": "speak", "text": "Merhaba!", "language": "tr", "speech_tag": "tr-TR"})
        );

        let phase: Value =
            serde_json::to_value(ServerMessage::from(Command::PhaseChanged(TurnPhase::AwaitingInput)))
                .unwrap();
        assert_eq!(phase, json!({"type": "phase_changed", "phase": "awaiting_input"}));

        let message: Value = serde_json::to_value(ServerMessage::from(Command::TranscriptAppended(
            TranscriptMessage::user("Hello"),
        )))
        .unwrap();
        assert_eq!(message["type"], "transcript_message");
        assert_eq!(message["message"]["role"], "user");
        assert_eq!(message["message"]["content"], "Hello");
    }

    #[test]
    fn test_session_complete_frame_carries_feedback_and_reason() {
        let frame: Value = serde_json::to_value(ServerMessage::from(Command::SessionComplete {
            feedback: Feedback::neutral(),
            reason: CompletionReason::QuestionLimit,
        }))
        .unwrap();
        assert_eq!(frame["type"], "session_complete");
        assert_eq!(frame["reason"], "question_limit");
        assert_eq!(frame["feedback"]["overall_score"], 75);
    }
}
