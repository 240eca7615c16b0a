//! Call-rate governor for outbound model calls.
//!
//! Enforces a minimum interval between the starts of consecutive calls and
//! keeps at most one call in flight. Requests that cannot start immediately
//! wait in a FIFO queue and are released in arrival order.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(2000);

/// A candidate utterance waiting for governor clearance.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub content: String,
    pub received_at: Instant,
}

impl PendingRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            received_at: Instant::now(),
        }
    }
}

/// Outcome of offering a request to the governor.
#[derive(Debug, PartialEq)]
pub enum Admission {
    /// The request may be dispatched now; the call slot is taken.
    ProceedNow(PendingRequest),
    /// The request was queued behind `position` others.
    Queued { position: usize },
}

#[derive(Debug)]
pub struct CallRateGovernor {
    min_interval: Duration,
    last_call_at: Option<Instant>,
    in_flight: bool,
    queue: VecDeque<PendingRequest>,
}

impl Default for CallRateGovernor {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl CallRateGovernor {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call_at: None,
            in_flight: false,
            queue: VecDeque::new(),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn last_call_at(&self) -> Option<Instant> {
        self.last_call_at
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Earliest instant at which a new call may start, ignoring in-flight state.
    pub fn next_slot(&self) -> Option<Instant> {
        self.last_call_at.map(|at| at + self.min_interval)
    }

    fn slot_open(&self, now: Instant) -> bool {
        !self.in_flight && self.next_slot().is_none_or(|slot| now >= slot)
    }

    fn begin_call(&mut self, now: Instant) {
        self.last_call_at = Some(now);
        self.in_flight = true;
    }

    /// Offers a request. It proceeds only if nothing is queued ahead of it,
    /// no call is in flight, and the minimum interval has elapsed.
    pub fn admit(&mut self, request: PendingRequest, now: Instant) -> Admission {
        if self.queue.is_empty() && self.slot_open(now) {
            self.begin_call(now);
            return Admission::ProceedNow(request);
        }
        self.queue.push_back(request);
        let position = self.queue.len() - 1;
        debug!(position, "Request queued by rate governor");
        Admission::Queued { position }
    }

    /// Queues a request without attempting to dispatch it.
    pub fn enqueue(&mut self, request: PendingRequest) {
        self.queue.push_back(request);
    }

    /// Releases the oldest queued request if the call slot is open.
    pub fn poll_ready(&mut self, now: Instant) -> Option<PendingRequest> {
        if self.queue.is_empty() || !self.slot_open(now) {
            return None;
        }
        let request = self.queue.pop_front()?;
        self.begin_call(now);
        Some(request)
    }

    /// Takes the call slot for a call that did not come from the queue.
    /// Returns `false` if the slot is not open at `now`.
    pub fn try_begin(&mut self, now: Instant) -> bool {
        if !self.slot_open(now) {
            return false;
        }
        self.begin_call(now);
        true
    }

    /// Marks the in-flight call as finished.
    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    /// When the next queued request can be released, if any are waiting and
    /// nothing is in flight.
    pub fn ready_at(&self) -> Option<Instant> {
        if self.queue.is_empty() || self.in_flight {
            return None;
        }
        Some(self.next_slot().unwrap_or_else(Instant::now))
    }

    /// Removes every queued request without dispatching it.
    pub fn drain(&mut self) -> Vec<PendingRequest> {
        self.queue.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_request_proceeds_immediately() {
        let mut governor = CallRateGovernor::default();
        let now = Instant::now();
        match governor.admit(PendingRequest::new("hello"), now) {
            Admission::ProceedNow(request) => assert_eq!(request.content, "hello"),
            other => panic!("expected ProceedNow, got {other:?}"),
        }
        assert!(governor.is_in_flight());
        assert_eq!(governor.last_call_at(), Some(now));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_within_interval_is_queued() {
        let mut governor = CallRateGovernor::default();
        let start = Instant::now();
        governor.admit(PendingRequest::new("one"), start);
        governor.finish();

        let admission = governor.admit(PendingRequest::new("two"), start + Duration::from_millis(500));
        assert_eq!(admission, Admission::Queued { position: 0 });
        assert_eq!(governor.ready_at(), Some(start + DEFAULT_MIN_INTERVAL));
        assert!(governor.poll_ready(start + Duration::from_millis(1999)).is_none());

        let released = governor
            .poll_ready(start + DEFAULT_MIN_INTERVAL)
            .expect("request should be released once the interval lapses");
        assert_eq!(released.content, "two");
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_call_blocks_release() {
        let mut governor = CallRateGovernor::default();
        let start = Instant::now();
        governor.admit(PendingRequest::new("one"), start);
        governor.admit(PendingRequest::new("two"), start);

        let later = start + Duration::from_secs(10);
        assert!(governor.poll_ready(later).is_none());
        assert_eq!(governor.ready_at(), None);
        governor.finish();
        assert_eq!(governor.poll_ready(later).unwrap().content, "two");
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_releases_in_fifo_order_with_spacing() {
        let mut governor = CallRateGovernor::default();
        let start = Instant::now();
        governor.admit(PendingRequest::new("a"), start);
        for (i, text) in ["b", "c", "d"].into_iter().enumerate() {
            assert_eq!(
                governor.admit(PendingRequest::new(text), start),
                Admission::Queued { position: i }
            );
        }

        let mut released = Vec::new();
        let mut starts = vec![start];
        governor.finish();
        while governor.pending() > 0 {
            let now = governor.ready_at().unwrap();
            let request = governor.poll_ready(now).unwrap();
            released.push(request.content);
            starts.push(now);
            governor.finish();
        }
        assert_eq!(released, vec!["b", "c", "d"]);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= DEFAULT_MIN_INTERVAL);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_request_never_jumps_the_queue() {
        let mut governor = CallRateGovernor::default();
        let start = Instant::now();
        governor.admit(PendingRequest::new("a"), start);
        governor.admit(PendingRequest::new("b"), start);
        governor.finish();

        // The slot is open, but "b" is still waiting.
        let admission = governor.admit(PendingRequest::new("c"), start + Duration::from_secs(5));
        assert_eq!(admission, Admission::Queued { position: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_discards_queued_requests() {
        let mut governor = CallRateGovernor::default();
        let start = Instant::now();
        governor.admit(PendingRequest::new("a"), start);
        governor.admit(PendingRequest::new("b"), start);
        governor.admit(PendingRequest::new("c"), start);
        let drained = governor.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(governor.pending(), 0);
        assert_eq!(governor.ready_at(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_begin_respects_interval() {
        let mut governor = CallRateGovernor::new(Duration::from_secs(2));
        let start = Instant::now();
        assert!(governor.try_begin(start));
        governor.finish();
        assert!(!governor.try_begin(start + Duration::from_secs(1)));
        assert!(governor.try_begin(start + Duration::from_secs(2)));
    }
}
