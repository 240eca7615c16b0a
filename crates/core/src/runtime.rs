//! Drives an `InterviewSession` as a single tokio task.
//!
//! The driver multiplexes three event sources in one `select!` loop: session
//! inputs, the in-flight model call, and timers (the governor's next release
//! and the wall-clock deadline). Only this task touches the session, so every
//! transition happens on one logical thread of control.

use crate::{
    completion::CompletionReason,
    feedback::Feedback,
    llm_client::LLMClient,
    session::{InterviewSession, ModelCall, Submission, TurnStep},
    transcript::TranscriptMessage,
};
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::{
    sync::{RwLock, mpsc},
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Events fed into a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    /// A final utterance from speech recognition.
    Utterance(String),
    SpeechStarted,
    SpeechEnded,
    /// A new demeanor observation, or `None` to clear it.
    EmotionalContext(Option<String>),
    /// End the interview now and produce feedback.
    End,
}

/// The cloneable input side of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    tx: mpsc::UnboundedSender<SessionInput>,
}

impl SessionHandle {
    /// Creates a handle and the input receiver a driver will consume.
    pub fn channel(id: Uuid) -> (Self, mpsc::UnboundedReceiver<SessionInput>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn send(&self, input: SessionInput) -> Result<()> {
        self.tx
            .send(input)
            .map_err(|_| anyhow!("session {} is no longer running", self.id))
    }

    pub fn submit_utterance(&self, text: impl Into<String>) -> Result<()> {
        self.send(SessionInput::Utterance(text.into()))
    }

    pub fn speech_started(&self) -> Result<()> {
        self.send(SessionInput::SpeechStarted)
    }

    pub fn speech_ended(&self) -> Result<()> {
        self.send(SessionInput::SpeechEnded)
    }

    pub fn end(&self) -> Result<()> {
        self.send(SessionInput::End)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// What a session leaves behind when its driver exits.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub transcript: Vec<TranscriptMessage>,
    pub feedback: Feedback,
    pub reason: CompletionReason,
}

type InFlight = Pin<Box<dyn Future<Output = Result<String>> + Send>>;

fn dispatch(llm: Arc<dyn LLMClient>, call: ModelCall, limit: Duration) -> InFlight {
    Box::pin(async move {
        let request = llm.complete(&call.system_prompt, &call.user_prompt, &call.options);
        match tokio::time::timeout(limit, request).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!("model call timed out after {limit:?}")),
        }
    })
}

async fn in_flight_result(in_flight: &mut Option<InFlight>) -> Result<String> {
    match in_flight.as_mut() {
        Some(call) => call.await,
        None => std::future::pending().await,
    }
}

/// Starts a turn step. Cached steps finish synchronously; calls become the
/// new in-flight future.
fn launch(
    session: &mut InterviewSession,
    step: TurnStep,
    in_flight: &mut Option<InFlight>,
) -> Option<CompletionReason> {
    match step {
        TurnStep::Call(call) => {
            *in_flight = Some(dispatch(
                session.llm(),
                call,
                session.config().limits.call_timeout,
            ));
            None
        }
        TurnStep::Cached(raw) => session.finish_turn(Ok(raw), Instant::now()),
    }
}

/// Runs the session to completion and returns its report.
pub async fn run(
    mut session: InterviewSession,
    mut inputs: mpsc::UnboundedReceiver<SessionInput>,
) -> SessionReport {
    let span = info_span!("interview_session", session_id = %session.id());
    async move {
        session.start();
        let deadline = session.deadline();
        let mut in_flight: Option<InFlight> = None;

        let reason = loop {
            if in_flight.is_none() {
                let mut completed = None;
                while let Some(step) = session.next_turn(Instant::now()) {
                    completed = launch(&mut session, step, &mut in_flight);
                    if completed.is_some() || in_flight.is_some() {
                        break;
                    }
                }
                if let Some(reason) = completed {
                    break reason;
                }
            }

            let wake = session.ready_at();
            tokio::select! {
                result = in_flight_result(&mut in_flight) => {
                    in_flight = None;
                    if let Some(reason) = session.finish_turn(result, Instant::now()) {
                        break reason;
                    }
                }
                input = inputs.recv() => match input {
                    Some(SessionInput::Utterance(text)) => {
                        match session.submit(text, Instant::now()) {
                            Submission::Dispatch(step) => {
                                if let Some(reason) = launch(&mut session, step, &mut in_flight) {
                                    break reason;
                                }
                            }
                            Submission::Queued { position } => {
                                debug!(position, "Utterance queued");
                            }
                            Submission::Ignored | Submission::Discarded => {}
                        }
                    }
                    Some(SessionInput::SpeechStarted) => session.on_speech_started(),
                    Some(SessionInput::SpeechEnded) => session.on_speech_ended(),
                    Some(SessionInput::EmotionalContext(context)) => {
                        session.set_emotional_context(context);
                    }
                    Some(SessionInput::End) => break CompletionReason::Ended,
                    None => {
                        info!("All session handles dropped, ending interview");
                        break CompletionReason::Ended;
                    }
                },
                _ = sleep_until(wake.unwrap_or(deadline)), if wake.is_some() => {}
                _ = sleep_until(deadline) => break CompletionReason::TimeLimit,
            }
        };

        // Dropping the future cancels any call still in flight.
        drop(in_flight);
        session.begin_completion(reason);

        if let Some(slot) = session.next_call_slot() {
            sleep_until(slot).await;
        }
        if !session.begin_calibration(Instant::now()) {
            warn!("Calibration call started without a free governor slot");
        }
        let feedback = session.assess().await;
        session.finish(feedback.clone(), reason);

        let session_id = session.id();
        let state = session.close().await;
        SessionReport {
            session_id,
            transcript: state.transcript,
            feedback,
            reason,
        }
    }
    .instrument(span)
    .await
}

/// Spawns the session driver and returns the handle that feeds it.
pub fn spawn_session(session: InterviewSession) -> (SessionHandle, JoinHandle<SessionReport>) {
    let (handle, rx) = SessionHandle::channel(session.id());
    let task = tokio::spawn(run(session, rx));
    (handle, task)
}

/// Running sessions of one process, by id. Each session owns its own cache
/// and governor; the registry only routes inputs.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, handle: SessionHandle) {
        self.sessions.write().await.insert(handle.id(), handle);
    }

    /// Registers the handle unless its id is already live. The check and
    /// the insert happen under one write lock.
    pub async fn try_insert(&self, handle: SessionHandle) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&handle.id()) {
            return false;
        }
        sessions.insert(handle.id(), handle);
        true
    }

    pub async fn get(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_reports_stopped_session() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle {
            id: Uuid::new_v4(),
            tx,
        };
        assert!(handle.submit_utterance("hello").is_ok());
        drop(rx);
        assert!(handle.is_closed());
        assert!(handle.end().is_err());
    }

    #[tokio::test]
    async fn test_registry_routes_by_id() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        registry.insert(SessionHandle { id, tx }).await;

        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.get(id).await.map(|h| h.id()), Some(id));
        assert!(registry.get(Uuid::new_v4()).await.is_none());
        assert!(registry.remove(id).await.is_some());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_try_insert_rejects_live_id() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        let (first, _first_rx) = SessionHandle::channel(id);
        let (second, _second_rx) = SessionHandle::channel(id);

        assert!(registry.try_insert(first).await);
        assert!(!registry.try_insert(second).await);
        assert_eq!(registry.len().await, 1);

        registry.remove(id).await;
        let (third, _third_rx) = SessionHandle::channel(id);
        assert!(registry.try_insert(third).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_attach_admits_one() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let (handle, rx) = SessionHandle::channel(id);
                    (registry.try_insert(handle).await, rx)
                })
            })
            .collect();

        let mut admitted = 0;
        for attempt in attempts {
            let (inserted, _rx) = attempt.await.unwrap();
            if inserted {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(registry.len().await, 1);
    }
}
