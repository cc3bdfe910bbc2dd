//! In-Process Display Server
//!
//! [`MemoryDisplay`] emulates the shared display server that a selection
//! protocol runs against: an atom table, a selection-owner registry, and one
//! FIFO event queue per connected client. [`MemoryConnection`] is a client
//! connection implementing [`SelectionTransport`].
//!
//! This is the portable baseline transport. It gives every session in the
//! process the real protocol semantics - asynchronous ownership hand-off,
//! peers that may simply never answer, strict per-client event ordering -
//! without a windowing system, which also makes it the vehicle for
//! multi-session tests standing in for independent processes.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{ClipboardError, Result};
use crate::transport::{
    ClientId, ContentRequest, FormatId, ReplyPayload, RequestTarget, SelectionEvent,
    SelectionReply, SelectionTransport,
};

/// Shared display server state
#[derive(Debug)]
struct DisplayState {
    /// Interned format names. Identifier 0 is reserved for "no content".
    atoms: HashMap<String, FormatId>,
    next_atom: u32,
    next_client: u32,
    /// Current owner of the clipboard selection
    owner: Option<ClientId>,
    /// Event queue heads, one per connected client
    clients: HashMap<ClientId, Sender<SelectionEvent>>,
}

/// In-process emulation of a selection-based display server
#[derive(Debug)]
pub struct MemoryDisplay {
    state: Mutex<DisplayState>,
}

impl MemoryDisplay {
    /// Create a fresh display with no clients and no selection owner
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(DisplayState {
                atoms: HashMap::new(),
                next_atom: 1,
                next_client: 1,
                owner: None,
                clients: HashMap::new(),
            }),
        })
    }

    /// The process-wide display used by the default clipboard context
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<MemoryDisplay>> = OnceLock::new();
        GLOBAL.get_or_init(MemoryDisplay::new).clone()
    }

    /// Connect a new client
    pub fn connect(self: &Arc<Self>) -> Arc<MemoryConnection> {
        let (tx, rx) = unbounded();
        let id = {
            let mut state = self.state.lock();
            let id = ClientId(state.next_client);
            state.next_client += 1;
            state.clients.insert(id, tx);
            id
        };
        debug!("{} connected to memory display", id);
        Arc::new(MemoryConnection {
            display: Arc::clone(self),
            id,
            events: rx,
        })
    }

    /// Number of currently connected clients
    pub fn client_count(&self) -> usize {
        self.state.lock().clients.len()
    }

    fn deliver(state: &DisplayState, to: ClientId, event: SelectionEvent) {
        if let Some(tx) = state.clients.get(&to) {
            // The queue is unbounded; a send only fails if the client is
            // mid-disconnect, which we treat the same as not connected.
            let _ = tx.send(event);
        } else {
            trace!("dropping event for disconnected {}", to);
        }
    }
}

/// One client connection to a [`MemoryDisplay`]
#[derive(Debug)]
pub struct MemoryConnection {
    display: Arc<MemoryDisplay>,
    id: ClientId,
    events: Receiver<SelectionEvent>,
}

impl SelectionTransport for MemoryConnection {
    fn client_id(&self) -> ClientId {
        self.id
    }

    fn intern(&self, name: &str) -> Result<FormatId> {
        let mut state = self.display.state.lock();
        if let Some(&id) = state.atoms.get(name) {
            return Ok(id);
        }
        let id = FormatId(state.next_atom);
        state.next_atom += 1;
        state.atoms.insert(name.to_owned(), id);
        trace!("interned {:?} as {}", name, id);
        Ok(id)
    }

    fn intern_batch(&self, names: &[&str]) -> Result<Vec<FormatId>> {
        // One critical section stands in for pipelined round trips.
        let mut state = self.display.state.lock();
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let id = match state.atoms.get(*name) {
                Some(&id) => id,
                None => {
                    let id = FormatId(state.next_atom);
                    state.next_atom += 1;
                    state.atoms.insert((*name).to_owned(), id);
                    id
                }
            };
            ids.push(id);
        }
        Ok(ids)
    }

    fn selection_owner(&self) -> Result<Option<ClientId>> {
        Ok(self.display.state.lock().owner)
    }

    fn claim_ownership(&self) -> Result<bool> {
        let mut state = self.display.state.lock();
        match state.owner {
            Some(prev) if prev == self.id => {}
            Some(prev) => {
                debug!("{} takes selection ownership from {}", self.id, prev);
                MemoryDisplay::deliver(&state, prev, SelectionEvent::OwnershipRevoked);
            }
            None => debug!("{} takes selection ownership", self.id),
        }
        state.owner = Some(self.id);
        Ok(true)
    }

    fn request_content(&self, target: RequestTarget) -> Result<()> {
        let state = self.display.state.lock();
        match state.owner {
            Some(owner) => {
                MemoryDisplay::deliver(
                    &state,
                    owner,
                    SelectionEvent::ContentRequested(ContentRequest {
                        requester: self.id,
                        target,
                    }),
                );
                Ok(())
            }
            // No owner: nothing will ever answer. The caller's bounded wait
            // handles it the same way as a silent owner.
            None => Ok(()),
        }
    }

    fn send_reply(&self, request: &ContentRequest, payload: ReplyPayload) -> Result<()> {
        let state = self.display.state.lock();
        MemoryDisplay::deliver(
            &state,
            request.requester,
            SelectionEvent::ReplyReceived(SelectionReply {
                target: request.target,
                payload,
            }),
        );
        Ok(())
    }

    fn next_event(&self, timeout: Duration) -> Result<Option<SelectionEvent>> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(ClipboardError::Transport("display connection closed".into()))
            }
        }
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        let mut state = self.display.state.lock();
        state.clients.remove(&self.id);
        if state.owner == Some(self.id) {
            state.owner = None;
        }
        debug!("{} disconnected from memory display", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_stable_across_clients() {
        let display = MemoryDisplay::new();
        let a = display.connect();
        let b = display.connect();

        let id_a = a.intern("application/x-custom").unwrap();
        let id_b = b.intern("application/x-custom").unwrap();
        assert_eq!(id_a, id_b);

        let other = a.intern("text/plain").unwrap();
        assert_ne!(id_a, other);
        assert_ne!(other, FormatId::EMPTY);
    }

    #[test]
    fn test_intern_batch_matches_single_interning() {
        let display = MemoryDisplay::new();
        let conn = display.connect();

        let single = conn.intern("UTF8_STRING").unwrap();
        let batch = conn.intern_batch(&["UTF8_STRING", "TEXT"]).unwrap();
        assert_eq!(batch[0], single);
        assert_eq!(batch.len(), 2);
        assert_ne!(batch[0], batch[1]);
    }

    #[test]
    fn test_ownership_revocation_event() {
        let display = MemoryDisplay::new();
        let a = display.connect();
        let b = display.connect();

        assert!(a.claim_ownership().unwrap());
        assert_eq!(a.selection_owner().unwrap(), Some(a.client_id()));

        assert!(b.claim_ownership().unwrap());
        assert_eq!(b.selection_owner().unwrap(), Some(b.client_id()));

        // The previous owner gets exactly one revocation event
        match a.next_event(Duration::from_millis(100)).unwrap() {
            Some(SelectionEvent::OwnershipRevoked) => {}
            other => panic!("expected OwnershipRevoked, got {:?}", other),
        }
        assert!(a.next_event(Duration::from_millis(10)).unwrap().is_none());
    }

    #[test]
    fn test_reclaiming_own_selection_sends_no_event() {
        let display = MemoryDisplay::new();
        let a = display.connect();

        assert!(a.claim_ownership().unwrap());
        assert!(a.claim_ownership().unwrap());
        assert!(a.next_event(Duration::from_millis(10)).unwrap().is_none());
    }

    #[test]
    fn test_request_and_reply_routing() {
        let display = MemoryDisplay::new();
        let owner = display.connect();
        let asker = display.connect();

        owner.claim_ownership().unwrap();
        let format = asker.intern("text/plain").unwrap();
        asker
            .request_content(RequestTarget::Content(format))
            .unwrap();

        // Request lands on the owner's queue
        let request = match owner.next_event(Duration::from_millis(100)).unwrap() {
            Some(SelectionEvent::ContentRequested(req)) => req,
            other => panic!("expected ContentRequested, got {:?}", other),
        };
        assert_eq!(request.requester, asker.client_id());
        assert_eq!(request.target, RequestTarget::Content(format));

        // Reply lands back on the requester's queue
        owner
            .send_reply(&request, ReplyPayload::Content(bytes::Bytes::from_static(b"hi")))
            .unwrap();
        match asker.next_event(Duration::from_millis(100)).unwrap() {
            Some(SelectionEvent::ReplyReceived(reply)) => {
                assert_eq!(reply.target, RequestTarget::Content(format));
                match reply.payload {
                    ReplyPayload::Content(bytes) => assert_eq!(&bytes[..], b"hi"),
                    other => panic!("expected content payload, got {:?}", other),
                }
            }
            other => panic!("expected ReplyReceived, got {:?}", other),
        }
    }

    #[test]
    fn test_request_with_no_owner_is_silent() {
        let display = MemoryDisplay::new();
        let conn = display.connect();
        let format = conn.intern("text/plain").unwrap();

        conn.request_content(RequestTarget::Content(format)).unwrap();
        assert!(conn.next_event(Duration::from_millis(20)).unwrap().is_none());
    }

    #[test]
    fn test_disconnect_releases_ownership() {
        let display = MemoryDisplay::new();
        let a = display.connect();
        a.claim_ownership().unwrap();
        assert_eq!(display.client_count(), 1);

        drop(a);
        assert_eq!(display.client_count(), 0);

        let b = display.connect();
        assert_eq!(b.selection_owner().unwrap(), None);
    }

    #[test]
    fn test_events_arrive_in_order() {
        let display = MemoryDisplay::new();
        let owner = display.connect();
        let asker = display.connect();

        owner.claim_ownership().unwrap();
        let f1 = asker.intern("a").unwrap();
        let f2 = asker.intern("b").unwrap();
        asker.request_content(RequestTarget::Content(f1)).unwrap();
        asker.request_content(RequestTarget::Content(f2)).unwrap();

        for expected in [f1, f2] {
            match owner.next_event(Duration::from_millis(100)).unwrap() {
                Some(SelectionEvent::ContentRequested(req)) => {
                    assert_eq!(req.target, RequestTarget::Content(expected));
                }
                other => panic!("expected ContentRequested, got {:?}", other),
            }
        }
    }
}
