//! Persistence collaborator and the per-session writer that feeds it.
//!
//! Saves are fire-and-forget from the session's point of view: they are
//! queued on a channel and applied in order by a background task. Failures
//! are logged and never retried.

use crate::{feedback::Feedback, transcript::TranscriptMessage};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save_transcript(&self, session_id: Uuid, transcript: &[TranscriptMessage])
    -> Result<()>;

    async fn save_feedback(
        &self,
        session_id: Uuid,
        transcript: &[TranscriptMessage],
        feedback: &Feedback,
    ) -> Result<()>;
}

/// What an in-memory store holds for one session.
#[derive(Debug, Clone, Default)]
pub struct StoredSession {
    pub transcript: Vec<TranscriptMessage>,
    pub feedback: Option<Feedback>,
    pub transcript_saves: usize,
}

/// A `SessionStore` that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<Uuid, StoredSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: Uuid) -> Option<StoredSession> {
        self.sessions
            .lock()
            .ok()
            .and_then(|sessions| sessions.get(&session_id).cloned())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save_transcript(
        &self,
        session_id: Uuid,
        transcript: &[TranscriptMessage],
    ) -> Result<()> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        let entry = sessions.entry(session_id).or_default();
        entry.transcript = transcript.to_vec();
        entry.transcript_saves += 1;
        Ok(())
    }

    async fn save_feedback(
        &self,
        session_id: Uuid,
        transcript: &[TranscriptMessage],
        feedback: &Feedback,
    ) -> Result<()> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        let entry = sessions.entry(session_id).or_default();
        entry.transcript = transcript.to_vec();
        entry.feedback = Some(feedback.clone());
        Ok(())
    }
}

#[derive(Debug)]
enum PersistOp {
    Transcript(Vec<TranscriptMessage>),
    Feedback {
        transcript: Vec<TranscriptMessage>,
        feedback: Feedback,
    },
}

/// Applies saves for one session in submission order on a background task.
pub struct PersistenceWriter {
    tx: mpsc::UnboundedSender<PersistOp>,
    handle: JoinHandle<()>,
}

impl PersistenceWriter {
    pub fn spawn(store: Arc<dyn SessionStore>, session_id: Uuid) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PersistOp>();
        let handle = tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                let result = match &op {
                    PersistOp::Transcript(transcript) => {
                        store.save_transcript(session_id, transcript).await
                    }
                    PersistOp::Feedback {
                        transcript,
                        feedback,
                    } => store.save_feedback(session_id, transcript, feedback).await,
                };
                if let Err(e) = result {
                    warn!(%session_id, error = ?e, "Failed to persist session state");
                }
            }
            debug!(%session_id, "Persistence writer finished");
        });
        Self { tx, handle }
    }

    pub fn save_transcript(&self, transcript: &[TranscriptMessage]) {
        self.send(PersistOp::Transcript(transcript.to_vec()));
    }

    pub fn save_feedback(&self, transcript: &[TranscriptMessage], feedback: &Feedback) {
        self.send(PersistOp::Feedback {
            transcript: transcript.to_vec(),
            feedback: feedback.clone(),
        });
    }

    fn send(&self, op: PersistOp) {
        if self.tx.send(op).is_err() {
            warn!("Persistence writer is gone; dropping save");
        }
    }

    /// Waits until every queued save has been attempted.
    pub async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            warn!(error = ?e, "Persistence writer task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use mockall::Sequence;

    #[tokio::test]
    async fn test_writer_applies_saves_in_order() {
        let store = Arc::new(MemoryStore::new());
        let session_id = Uuid::new_v4();
        let writer = PersistenceWriter::spawn(store.clone(), session_id);

        let mut transcript = vec![TranscriptMessage::assistant("Hello!")];
        writer.save_transcript(&transcript);
        transcript.push(TranscriptMessage::user("Hi"));
        writer.save_transcript(&transcript);
        writer.save_feedback(&transcript, &Feedback::neutral());
        writer.close().await;

        let stored = store.get(session_id).unwrap();
        assert_eq!(stored.transcript.len(), 2);
        assert_eq!(stored.transcript_saves, 2);
        assert_eq!(stored.feedback, Some(Feedback::neutral()));
    }

    #[tokio::test]
    async fn test_failed_save_does_not_stop_later_saves() {
        let mut store = MockSessionStore::new();
        let mut seq = Sequence::new();
        store
            .expect_save_transcript()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(anyhow!("database unavailable")));
        store
            .expect_save_transcript()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        store
            .expect_save_feedback()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        let writer = PersistenceWriter::spawn(Arc::new(store), Uuid::new_v4());
        let transcript = vec![TranscriptMessage::assistant("Hello!")];
        writer.save_transcript(&transcript);
        writer.save_transcript(&transcript);
        writer.save_feedback(&transcript, &Feedback::neutral());
        writer.close().await;
    }
}
