//! Selection Transport
//!
//! The seam between the clipboard machinery and the window system. A
//! [`SelectionTransport`] is one client connection to the shared display
//! server: it can intern format names, claim or inspect selection ownership,
//! ask the current owner for content, answer a peer's request, and deliver
//! incoming protocol events.
//!
//! Events arrive as a closed tagged-variant type ([`SelectionEvent`]) and
//! are matched exhaustively by the listener - there are exactly three
//! reactions in this protocol:
//!
//! - [`SelectionEvent::OwnershipRevoked`] - a peer took the selection
//! - [`SelectionEvent::ContentRequested`] - a peer wants our content
//! - [`SelectionEvent::ReplyReceived`] - an answer to our outbound query
//!
//! The in-process reference implementation lives in [`memory`]; real
//! windowing backends implement the same trait.

use bytes::Bytes;
use std::fmt;
use std::time::Duration;

use crate::error::Result;

pub mod memory;

pub use memory::{MemoryConnection, MemoryDisplay};

/// Opaque identifier for a content format (an interned atom).
///
/// Stable for the lifetime of one display connection; not guaranteed stable
/// across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormatId(pub(crate) u32);

impl FormatId {
    /// The reserved "no content" format
    pub const EMPTY: FormatId = FormatId(0);

    /// Raw identifier value
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "format#{}", self.0)
    }
}

/// Identity of one client connection on the display server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub(crate) u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// What a content request is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTarget {
    /// The list of formats the owner currently offers
    Formats,
    /// The content bytes for one specific format
    Content(FormatId),
}

/// Payload of a selection reply
#[derive(Debug, Clone)]
pub enum ReplyPayload {
    /// Content bytes for a requested format
    Content(Bytes),
    /// The owner's offered format list
    Formats(Vec<FormatId>),
}

/// A peer's request for our selection content
#[derive(Debug, Clone)]
pub struct ContentRequest {
    /// The requesting client; replies are routed back to it
    pub requester: ClientId,
    /// What is being asked for
    pub target: RequestTarget,
}

/// The answer to one of our outbound content requests
#[derive(Debug, Clone)]
pub struct SelectionReply {
    /// The target the reply answers
    pub target: RequestTarget,
    /// The reply payload
    pub payload: ReplyPayload,
}

/// Incoming protocol events, dispatched by the event listener
#[derive(Debug, Clone)]
pub enum SelectionEvent {
    /// Another client asserted selection ownership; our offer is void
    OwnershipRevoked,
    /// A peer is asking us, the current owner, for content
    ContentRequested(ContentRequest),
    /// A reply to our outbound query arrived
    ReplyReceived(SelectionReply),
}

/// One client connection to a selection-based display server.
///
/// All methods may be called from multiple threads; implementations
/// serialize access internally. `next_event` is only ever called from the
/// session's event listener thread.
pub trait SelectionTransport: Send + Sync {
    /// Identity of this connection on the server
    fn client_id(&self) -> ClientId;

    /// Resolve a format name to its identifier, registering it on first use.
    ///
    /// This is a server round trip on a cache miss.
    fn intern(&self, name: &str) -> Result<FormatId>;

    /// Resolve several names at once.
    ///
    /// Implementations should issue the round trips as independent
    /// outstanding requests and collect the replies together, rather than
    /// serializing them. The default just loops.
    fn intern_batch(&self, names: &[&str]) -> Result<Vec<FormatId>> {
        names.iter().map(|name| self.intern(name)).collect()
    }

    /// Current owner of the clipboard selection, if any
    fn selection_owner(&self) -> Result<Option<ClientId>>;

    /// Assert ownership of the clipboard selection.
    ///
    /// Returns `false` if another owner won a race for the selection.
    fn claim_ownership(&self) -> Result<bool>;

    /// Ask the current owner for content.
    ///
    /// Fire-and-forget: the answer, if the owner produces one, arrives later
    /// as [`SelectionEvent::ReplyReceived`]. An owner that does not offer
    /// the target stays silent and the requester must time out.
    fn request_content(&self, target: RequestTarget) -> Result<()>;

    /// Answer a peer's content request
    fn send_reply(&self, request: &ContentRequest, payload: ReplyPayload) -> Result<()>;

    /// Block for the next incoming event, up to `timeout`.
    ///
    /// Returns `Ok(None)` on an idle tick. Implementations without a
    /// blocking wait may poll and sleep internally, bounded by `timeout`.
    fn next_event(&self, timeout: Duration) -> Result<Option<SelectionEvent>>;
}
