//! The per-interview state machine.
//!
//! `InterviewSession` owns the transcript, the response cache and the
//! call-rate governor for exactly one interview. It performs no I/O of its
//! own: model calls are described as `TurnStep`s for the driver in
//! [`crate::runtime`] to execute, and every observable effect is issued as a
//! [`Command`] on the session's command channel.

use crate::{
    Command,
    cache::ResponseCache,
    completion::{CompletionPolicy, CompletionReason, DEFAULT_MAX_DURATION, DEFAULT_MAX_QUESTIONS},
    feedback::{Feedback, FeedbackCalibrator},
    governor::{Admission, CallRateGovernor, DEFAULT_MIN_INTERVAL, PendingRequest},
    language::{Language, Level},
    llm_client::{CompletionOptions, LLMClient},
    parser::parse_detailed,
    persistence::{PersistenceWriter, SessionStore},
    prompts::PromptLibrary,
    transcript::{self, TranscriptMessage, render_conversation},
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub const DEFAULT_CONTEXT_WINDOW: usize = 6;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Every bound a session enforces.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionLimits {
    pub max_questions: usize,
    pub max_duration: Duration,
    pub min_call_interval: Duration,
    /// Number of trailing transcript messages sent to the model.
    pub context_window: usize,
    pub call_timeout: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_questions: DEFAULT_MAX_QUESTIONS,
            max_duration: DEFAULT_MAX_DURATION,
            min_call_interval: DEFAULT_MIN_INTERVAL,
            context_window: DEFAULT_CONTEXT_WINDOW,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl SessionLimits {
    pub fn completion_policy(&self) -> CompletionPolicy {
        CompletionPolicy {
            max_questions: self.max_questions,
            max_duration: self.max_duration,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub role: String,
    pub level: Level,
    pub language: Language,
    pub limits: SessionLimits,
    /// A one-line observation about the candidate's demeanor, if available.
    pub emotional_context: Option<String>,
}

impl SessionConfig {
    pub fn new(role: impl Into<String>, level: Level, language: Language) -> Self {
        Self {
            role: role.into(),
            level,
            language,
            limits: SessionLimits::default(),
            emotional_context: None,
        }
    }

    pub fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Where the session is in its turn loop.
///
/// Speaking is tracked separately: it runs concurrently with
/// `AwaitingInput` and never blocks the next turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Initializing,
    AwaitingInput,
    Processing,
    Completing,
    Complete,
}

impl TurnPhase {
    /// Whether the session has stopped taking utterances.
    pub fn is_finished(&self) -> bool {
        matches!(self, TurnPhase::Completing | TurnPhase::Complete)
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TurnPhase::Initializing => "initializing",
            TurnPhase::AwaitingInput => "awaiting_input",
            TurnPhase::Processing => "processing",
            TurnPhase::Completing => "completing",
            TurnPhase::Complete => "complete",
        };
        f.write_str(label)
    }
}

/// The mutable state of one interview.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub transcript: Vec<TranscriptMessage>,
    pub phase: TurnPhase,
    pub speaking: bool,
    pub started_at: Instant,
}

impl SessionState {
    fn new() -> Self {
        Self {
            transcript: Vec::new(),
            phase: TurnPhase::Initializing,
            speaking: false,
            started_at: Instant::now(),
        }
    }

    pub fn question_count(&self) -> usize {
        transcript::question_count(&self.transcript)
    }
}

/// A model call the driver must make on the session's behalf.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCall {
    pub system_prompt: String,
    pub user_prompt: String,
    pub options: CompletionOptions,
}

/// What the driver has to do to finish the turn that just began.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnStep {
    /// Make this call and hand its result to `finish_turn`.
    Call(ModelCall),
    /// A cached response answers the turn; hand it to `finish_turn` directly.
    Cached(String),
}

/// Outcome of submitting an utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Empty or whitespace-only.
    Ignored,
    /// The session is no longer taking input.
    Discarded,
    /// Waiting behind `position` earlier utterances or the rate floor.
    Queued { position: usize },
    /// Accepted into processing immediately.
    Dispatch(TurnStep),
}

#[derive(Debug)]
struct ActiveTurn {
    window: Vec<TranscriptMessage>,
    from_cache: bool,
}

pub struct InterviewSession {
    id: Uuid,
    config: SessionConfig,
    state: SessionState,
    governor: CallRateGovernor,
    cache: ResponseCache,
    policy: CompletionPolicy,
    active_turn: Option<ActiveTurn>,
    llm: Arc<dyn LLMClient>,
    prompts: Arc<PromptLibrary>,
    commands: mpsc::UnboundedSender<Command>,
    writer: PersistenceWriter,
}

impl InterviewSession {
    /// Creates a session in `Initializing`. Must be called inside a tokio
    /// runtime: the persistence writer is spawned here.
    pub fn new(
        id: Uuid,
        config: SessionConfig,
        llm: Arc<dyn LLMClient>,
        store: Arc<dyn SessionStore>,
        prompts: Arc<PromptLibrary>,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Self {
        let governor = CallRateGovernor::new(config.limits.min_call_interval);
        let policy = config.limits.completion_policy();
        Self {
            id,
            state: SessionState::new(),
            governor,
            cache: ResponseCache::default(),
            policy,
            active_turn: None,
            llm,
            prompts,
            commands,
            writer: PersistenceWriter::spawn(store, id),
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> TurnPhase {
        self.state.phase
    }

    pub fn transcript(&self) -> &[TranscriptMessage] {
        &self.state.transcript
    }

    pub fn question_count(&self) -> usize {
        self.state.question_count()
    }

    pub fn pending(&self) -> usize {
        self.governor.pending()
    }

    pub fn last_call_at(&self) -> Option<Instant> {
        self.governor.last_call_at()
    }

    pub fn llm(&self) -> Arc<dyn LLMClient> {
        self.llm.clone()
    }

    /// The instant at which the wall-clock limit ends the interview.
    pub fn deadline(&self) -> Instant {
        self.state.started_at + self.config.limits.max_duration
    }

    pub fn set_emotional_context(&mut self, context: Option<String>) {
        self.config.emotional_context = context;
    }

    fn emit(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!(session_id = %self.id, "Command receiver dropped");
        }
    }

    fn set_phase(&mut self, phase: TurnPhase) {
        if self.state.phase == phase {
            return;
        }
        debug!(session_id = %self.id, from = %self.state.phase, to = %phase, "Phase transition");
        self.state.phase = phase;
        self.emit(Command::PhaseChanged(phase));
    }

    fn append(&mut self, message: TranscriptMessage) {
        self.state.transcript.push(message.clone());
        self.writer.save_transcript(&self.state.transcript);
        self.emit(Command::TranscriptAppended(message));
    }

    fn speak(&self, text: String) {
        self.emit(Command::SpeakText {
            text,
            language: self.config.language,
        });
    }

    /// Seeds the transcript with the greeting and opens the session for input.
    pub fn start(&mut self) {
        if self.state.phase != TurnPhase::Initializing {
            return;
        }
        info!(
            session_id = %self.id,
            role = %self.config.role,
            level = %self.config.level,
            language = self.config.language.code(),
            "Interview started"
        );
        let greeting = self.config.language.greeting(&self.config.role);
        self.append(TranscriptMessage::assistant(greeting.clone()));
        self.speak(greeting);
        self.set_phase(TurnPhase::AwaitingInput);
    }

    /// Offers a candidate utterance to the session.
    pub fn submit(&mut self, content: impl Into<String>, now: Instant) -> Submission {
        let content = content.into();
        let content = content.trim();
        if content.is_empty() {
            return Submission::Ignored;
        }
        let request = PendingRequest {
            content: content.to_string(),
            received_at: now,
        };

        match self.state.phase {
            TurnPhase::Completing | TurnPhase::Complete => {
                debug!(session_id = %self.id, "Discarding utterance after completion");
                Submission::Discarded
            }
            TurnPhase::Initializing | TurnPhase::Processing => {
                self.governor.enqueue(request);
                Submission::Queued {
                    position: self.governor.pending() - 1,
                }
            }
            TurnPhase::AwaitingInput if self.state.speaking => {
                debug!(session_id = %self.id, "Utterance arrived while the interviewer was speaking");
                self.admit(request, now)
            }
            TurnPhase::AwaitingInput => self.admit(request, now),
        }
    }

    fn admit(&mut self, request: PendingRequest, now: Instant) -> Submission {
        match self.governor.admit(request, now) {
            Admission::ProceedNow(request) => Submission::Dispatch(self.begin_turn(request)),
            Admission::Queued { position } => Submission::Queued { position },
        }
    }

    /// Releases the oldest queued utterance if the session is waiting for
    /// input and the governor allows a call at `now`.
    pub fn next_turn(&mut self, now: Instant) -> Option<TurnStep> {
        if self.state.phase != TurnPhase::AwaitingInput {
            return None;
        }
        let request = self.governor.poll_ready(now)?;
        Some(self.begin_turn(request))
    }

    /// When `next_turn` should be tried again, if anything is waiting.
    pub fn ready_at(&self) -> Option<Instant> {
        if self.state.phase != TurnPhase::AwaitingInput {
            return None;
        }
        self.governor.ready_at()
    }

    fn begin_turn(&mut self, request: PendingRequest) -> TurnStep {
        self.set_phase(TurnPhase::Processing);
        self.append(TranscriptMessage::user(request.content));

        let window =
            transcript::window(&self.state.transcript, self.config.limits.context_window).to_vec();
        let role = self.config.role.as_str();
        let level = self.config.level;
        let language = self.config.language;

        if window.len() >= 2 {
            if let Some(raw) = self.cache.lookup(&window, role, level) {
                if !parse_detailed(&raw, language).is_fallback() {
                    debug!(session_id = %self.id, "Answering turn from response cache");
                    self.active_turn = Some(ActiveTurn {
                        window,
                        from_cache: true,
                    });
                    return TurnStep::Cached(raw);
                }
                debug!(session_id = %self.id, "Cached response did not parse, treating as miss");
            }
        }

        let conversation = render_conversation(&window, "\n");
        let call = ModelCall {
            system_prompt: self.prompts.interviewer_prompt(
                language,
                role,
                level,
                &conversation,
                self.config.emotional_context.as_deref(),
            ),
            user_prompt: self
                .prompts
                .turn_user_prompt(language, role, level, !window.is_empty()),
            options: CompletionOptions::interviewer(),
        };
        self.active_turn = Some(ActiveTurn {
            window,
            from_cache: false,
        });
        TurnStep::Call(call)
    }

    /// Applies the result of the current turn. Returns the completion reason
    /// if the interview is over.
    #[instrument(skip_all, fields(session_id = %self.id, question_count = self.state.question_count()))]
    pub fn finish_turn(&mut self, result: Result<String>, now: Instant) -> Option<CompletionReason> {
        self.governor.finish();
        let Some(turn) = self.active_turn.take() else {
            warn!("Turn result arrived with no active turn");
            return None;
        };
        if self.state.phase != TurnPhase::Processing {
            return None;
        }

        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = ?e, "Model call failed, asking the candidate to repeat");
                self.degrade();
                return None;
            }
        };
        let parsed = parse_detailed(&raw, self.config.language);
        if parsed.is_fallback() {
            warn!("Model output was unrecoverable, asking the candidate to repeat");
            self.degrade();
            return None;
        }
        if !turn.from_cache {
            self.cache
                .store(&turn.window, &self.config.role, self.config.level, &raw);
        }

        let question = parsed.reply.question;
        self.append(TranscriptMessage::assistant(question.clone()));
        self.speak(question);

        let elapsed = now.saturating_duration_since(self.state.started_at);
        let reason = self
            .policy
            .evaluate(parsed.reply.is_complete, self.question_count(), elapsed);
        match reason {
            Some(reason) => {
                info!(%reason, question_count = self.question_count(), "Interview reached completion");
                Some(reason)
            }
            None => {
                self.set_phase(TurnPhase::AwaitingInput);
                None
            }
        }
    }

    fn degrade(&mut self) {
        self.speak(self.config.language.apology().to_string());
        self.set_phase(TurnPhase::AwaitingInput);
    }

    /// Stops the conversation and drains queued utterances. Any in-flight
    /// turn is abandoned. Returns `false` if completion already began.
    pub fn begin_completion(&mut self, reason: CompletionReason) -> bool {
        if self.state.phase.is_finished() {
            return false;
        }
        if self.active_turn.take().is_some() {
            self.governor.finish();
        }
        let dropped = self.governor.drain();
        info!(session_id = %self.id, %reason, dropped = dropped.len(), "Completing interview");
        self.set_phase(TurnPhase::Completing);
        true
    }

    /// The earliest instant the calibration call may start.
    pub fn next_call_slot(&self) -> Option<Instant> {
        self.governor.next_slot()
    }

    /// Takes the governor slot for the calibration call.
    pub fn begin_calibration(&mut self, now: Instant) -> bool {
        self.governor.try_begin(now)
    }

    /// Runs the feedback calibrator over the full transcript.
    pub async fn assess(&self) -> Feedback {
        let calibrator = FeedbackCalibrator::new(
            self.llm.clone(),
            self.prompts.clone(),
            self.config.limits.call_timeout,
        );
        calibrator
            .assess(
                &self.state.transcript,
                &self.config.role,
                self.config.level,
                self.config.language,
            )
            .await
    }

    /// Records the final feedback and makes the session terminal.
    pub fn finish(&mut self, feedback: Feedback, reason: CompletionReason) {
        self.governor.finish();
        self.writer
            .save_feedback(&self.state.transcript, &feedback);
        self.set_phase(TurnPhase::Complete);
        info!(
            session_id = %self.id,
            overall_score = feedback.overall_score,
            %reason,
            "Interview complete"
        );
        self.emit(Command::SessionComplete { feedback, reason });
    }

    pub fn on_speech_started(&mut self) {
        self.state.speaking = true;
    }

    pub fn on_speech_ended(&mut self) {
        self.state.speaking = false;
    }

    /// Flushes pending saves and returns the final state.
    pub async fn close(self) -> SessionState {
        self.writer.close().await;
        self.state
    }
}
