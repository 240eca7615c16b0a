//! Per-session cache of interviewer responses.
//!
//! Entries are keyed by a fingerprint of the last messages of the context
//! window plus the role and level, so a repeated short exchange is answered
//! without a model call. Timestamps never enter the fingerprint.

use crate::language::Level;
use crate::transcript::TranscriptMessage;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// How many trailing messages of the window participate in the fingerprint.
pub const FINGERPRINT_MESSAGES: usize = 2;
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone)]
struct CacheEntry {
    response: String,
    inserted_at: Instant,
}

#[derive(Debug)]
pub struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
    capacity: usize,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Computes the cache key for a context window.
pub fn fingerprint(history: &[TranscriptMessage], role: &str, level: Level) -> String {
    let start = history.len().saturating_sub(FINGERPRINT_MESSAGES);
    let mut hasher = Sha256::new();
    hasher.update(normalize(role).as_bytes());
    hasher.update([0u8]);
    hasher.update(level.as_str().as_bytes());
    for message in &history[start..] {
        hasher.update([0u8]);
        hasher.update(message.role.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(normalize(&message.content).as_bytes());
    }
    hex::encode(hasher.finalize())
}

impl ResponseCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Returns the stored response for this context, if one is still fresh.
    pub fn lookup(
        &mut self,
        history: &[TranscriptMessage],
        role: &str,
        level: Level,
    ) -> Option<String> {
        let key = fingerprint(history, role, level);
        let entry = self.entries.get(&key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            debug!(key = %key, "Evicting expired cache entry");
            self.entries.remove(&key);
            return None;
        }
        Some(entry.response.clone())
    }

    /// Stores a response for this context, evicting the oldest entry when full.
    pub fn store(&mut self, history: &[TranscriptMessage], role: &str, level: Level, response: &str) {
        let key = fingerprint(history, role, level);
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(
            key,
            CacheEntry {
                response: response.to_string(),
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
