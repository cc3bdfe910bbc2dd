//! Selection Protocol Handler - outbound queries
//!
//! Asks the current selection owner for content, trying an ordered list of
//! candidate formats with a bounded wait per attempt. The reply travels
//! from the event listener to the waiting caller over a channel; the
//! timeout is the only cancellation - a caller that gives up simply stops
//! listening, and a reply arriving afterwards is discarded by the listener.
//!
//! Per query the phases are `AwaitingReply -> Resolved` or `-> Exhausted`
//! (every candidate timed out). The first reply wins, even an empty one;
//! no candidate is retried. At most one query is in flight per session,
//! enforced structurally: queries are only issued while the clipboard
//! [`Lock`](crate::Lock) is held.
//!
//! The most recent resolved reply is remembered so the common
//! length-then-content call pair costs one round trip; the cache is dropped
//! at the start of a distinct query and on lock release.

use crossbeam_channel::{bounded, RecvTimeoutError};
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::session::SessionState;
use crate::transport::{RequestTarget, SelectionReply, SelectionTransport};

/// Phase of one outbound query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueryPhase {
    AwaitingReply,
    Resolved,
    Exhausted,
}

/// Lower bound on the per-candidate wait, whatever the configured budget
const MIN_CANDIDATE_WAIT: Duration = Duration::from_millis(25);

/// Split the total query budget evenly across the candidate list
pub(crate) fn per_candidate_wait(budget: Duration, candidates: usize) -> Duration {
    let share = budget / candidates.max(1) as u32;
    share.max(MIN_CANDIDATE_WAIT)
}

pub(crate) struct OutboundQuery<'a> {
    transport: &'a dyn SelectionTransport,
    state: &'a Mutex<SessionState>,
    budget: Duration,
}

impl<'a> OutboundQuery<'a> {
    pub(crate) fn new(
        transport: &'a dyn SelectionTransport,
        state: &'a Mutex<SessionState>,
        budget: Duration,
    ) -> Self {
        Self {
            transport,
            state,
            budget,
        }
    }

    /// Run one query over the candidate list.
    ///
    /// Returns the first reply, or `None` once every candidate has been
    /// tried without an answer.
    pub(crate) fn run(&self, candidates: &[RequestTarget]) -> Option<SelectionReply> {
        // Reuse the remembered reply when this query asks for the same
        // thing again (the length-then-content pattern); otherwise a new
        // distinct query starts and the old reply is dropped.
        {
            let mut state = self.state.lock();
            if let Some(cached) = state.cached_reply.as_ref() {
                if candidates.contains(&cached.target) {
                    trace!("reusing cached selection reply for {:?}", cached.target);
                    return Some(cached.clone());
                }
            }
            state.cached_reply = None;
        }

        if candidates.is_empty() {
            return None;
        }

        let wait = per_candidate_wait(self.budget, candidates.len());
        let (reply_tx, reply_rx) = bounded(1);
        self.state.lock().pending_reply = Some(reply_tx);

        let mut phase = QueryPhase::AwaitingReply;
        let mut resolved = None;

        for target in candidates {
            if let Err(e) = self.transport.request_content(*target) {
                warn!("content request for {:?} failed: {}", target, e);
                continue;
            }
            match reply_rx.recv_timeout(wait) {
                Ok(reply) => {
                    phase = QueryPhase::Resolved;
                    resolved = Some(reply);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {
                    debug!(
                        "no reply for {:?} within {:?}, advancing to next candidate",
                        target, wait
                    );
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("reply channel closed mid-query");
                    break;
                }
            }
        }

        let mut state = self.state.lock();
        state.pending_reply = None;
        if resolved.is_none() && phase == QueryPhase::AwaitingReply {
            phase = QueryPhase::Exhausted;
        }
        debug!(
            "query finished in {:?} after {} candidate(s)",
            phase,
            candidates.len()
        );
        match resolved {
            Some(reply) => {
                state.cached_reply = Some(reply.clone());
                Some(reply)
            }
            None => None,
        }
    }
}
