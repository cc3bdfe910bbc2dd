//! Event Listener
//!
//! One dedicated background thread per session drains incoming protocol
//! events from the display connection and dispatches them. The thread
//! blocks on the transport with a bounded tick so its stop flag is honored;
//! on shutdown it is signaled and joined before the connection is dropped.
//!
//! Every event is handled under the shared session mutex, one at a time, in
//! arrival order:
//!
//! - ownership revoked: empty the data store
//! - content requested: answer from the data store, or stay silent for a
//!   format we do not offer (the peer's bounded wait handles it)
//! - reply received: hand it to the waiting query, or discard it if the
//!   caller already gave up

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;
use crate::session::SessionState;
use crate::transport::{
    ContentRequest, ReplyPayload, RequestTarget, SelectionEvent, SelectionTransport,
};

pub(crate) struct EventListener {
    handle: Option<thread::JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl EventListener {
    /// Spawn the listener thread for one session
    pub(crate) fn spawn(
        transport: Arc<dyn SelectionTransport>,
        state: Arc<Mutex<SessionState>>,
        poll_interval: Duration,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("clipbus-listener".into())
            .spawn(move || {
                debug!("selection event listener started");
                while !flag.load(Ordering::Relaxed) {
                    match transport.next_event(poll_interval) {
                        Ok(Some(event)) => dispatch(&*transport, &state, event),
                        Ok(None) => {} // idle tick, re-check the stop flag
                        Err(e) => {
                            warn!("event listener stopping on transport error: {}", e);
                            break;
                        }
                    }
                }
                debug!("selection event listener exiting");
            })?;

        Ok(Self {
            handle: Some(handle),
            stop,
        })
    }

    /// Signal the thread and wait for it to finish
    pub(crate) fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("event listener thread panicked during shutdown");
            }
        }
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// Handle one incoming event under the session mutex
pub(crate) fn dispatch(
    transport: &dyn SelectionTransport,
    state: &Mutex<SessionState>,
    event: SelectionEvent,
) {
    match event {
        SelectionEvent::OwnershipRevoked => {
            debug!("selection ownership revoked by a peer, dropping local offer");
            state.lock().store.clear();
        }
        SelectionEvent::ContentRequested(request) => {
            handle_content_request(transport, state, request);
        }
        SelectionEvent::ReplyReceived(reply) => {
            let state = state.lock();
            match state.pending_reply.as_ref() {
                Some(tx) => {
                    // A full slot means the query already resolved; either
                    // way the first reply wins.
                    let _ = tx.try_send(reply);
                }
                None => debug!("discarding selection reply with no query waiting"),
            }
        }
    }
}

fn handle_content_request(
    transport: &dyn SelectionTransport,
    state: &Mutex<SessionState>,
    request: ContentRequest,
) {
    let state = state.lock();
    let payload = match request.target {
        RequestTarget::Formats => Some(ReplyPayload::Formats(state.store.formats())),
        RequestTarget::Content(format) => state
            .store
            .get(format)
            .map(|bytes| ReplyPayload::Content(bytes.clone())),
    };

    match payload {
        Some(payload) => {
            debug!(
                "answering {} for {:?}",
                request.requester, request.target
            );
            if let Err(e) = transport.send_reply(&request, payload) {
                warn!("failed to answer {}: {}", request.requester, e);
            }
        }
        // Unknown format: no reply at all, the requester must time out.
        None => debug!(
            "ignoring request from {} for {:?} we do not offer",
            request.requester, request.target
        ),
    }
}
