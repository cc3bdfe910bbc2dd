//! Session Manager
//!
//! [`Clipboard`] is the explicit process-wide context object: it owns the
//! display connection, the shared session state, and the background event
//! listener, and it hands out the scoped [`Lock`](crate::Lock) through
//! which callers operate. One context per logical clipboard session; the
//! convenience functions in the crate root create a default context
//! lazily on first use.
//!
//! Operations either serve from the local data store (when this process
//! owns the selection) or delegate to the outbound query path, blocking
//! the caller up to the configured budget while the listener waits for the
//! owner's reply.

use bytes::Bytes;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::atoms::{AtomCache, IMAGE_FORMAT_NAME, TEXT_FORMAT_NAMES};
use crate::config::ClipboardConfig;
use crate::error::{ClipboardError, Result};
use crate::listener::EventListener;
use crate::lock::Lock;
use crate::query::OutboundQuery;
use crate::store::DataStore;
use crate::transport::{
    FormatId, ReplyPayload, RequestTarget, SelectionReply, SelectionTransport,
};

/// Shared mutable session state, guarded by one mutex.
///
/// Callers hold the lock for the duration of one operation, the event
/// listener for the duration of one event; intervals are short and
/// non-reentrant.
pub(crate) struct SessionState {
    pub(crate) store: DataStore,
    pub(crate) atoms: AtomCache,
    /// Reply slot for the one in-flight outbound query, if any
    pub(crate) pending_reply: Option<Sender<SelectionReply>>,
    /// Most recent resolved reply, kept for the length-then-content pattern
    pub(crate) cached_reply: Option<SelectionReply>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            store: DataStore::new(),
            atoms: AtomCache::new(),
            pending_reply: None,
            cached_reply: None,
        }
    }
}

/// Where the selection currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OwnerView {
    /// This session owns it and serves from its data store
    Ours,
    /// An independent peer owns it; content comes via outbound query
    Peer,
    /// Nobody owns it; there is nothing to fetch
    Absent,
}

pub(crate) struct Session {
    transport: Arc<dyn SelectionTransport>,
    state: Arc<Mutex<SessionState>>,
    /// Intra-process gate mirroring the "open clipboard" semantics:
    /// try-acquire only, never queued
    gate: Mutex<()>,
    listener: Mutex<Option<EventListener>>,
    query_timeout_ms: AtomicU64,
    max_data_size: usize,
}

impl Session {
    pub(crate) fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms.load(Ordering::Relaxed))
    }

    pub(crate) fn set_query_timeout(&self, timeout: Duration) {
        self.query_timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    /// Where the selection currently lives, from this session's view
    fn owner_view(&self) -> Result<OwnerView> {
        Ok(match self.transport.selection_owner()? {
            Some(owner) if owner == self.transport.client_id() => OwnerView::Ours,
            Some(_) => OwnerView::Peer,
            None => OwnerView::Absent,
        })
    }

    fn text_atoms(&self) -> Result<Vec<FormatId>> {
        let mut state = self.state.lock();
        state.atoms.intern_batch(&*self.transport, &TEXT_FORMAT_NAMES)
    }

    pub(crate) fn text_format(&self) -> Result<FormatId> {
        let mut state = self.state.lock();
        state.atoms.intern(&*self.transport, TEXT_FORMAT_NAMES[0])
    }

    pub(crate) fn image_format(&self) -> Result<FormatId> {
        let mut state = self.state.lock();
        state.atoms.intern(&*self.transport, IMAGE_FORMAT_NAME)
    }

    pub(crate) fn register_format(&self, name: &str) -> Result<FormatId> {
        let mut state = self.state.lock();
        state.atoms.intern(&*self.transport, name)
    }

    /// Ranked lookup candidates for a format: the full alias list for text,
    /// the format itself for everything else.
    fn candidates_for(&self, format: FormatId) -> Result<Vec<FormatId>> {
        let text = self.text_atoms()?;
        if text.contains(&format) {
            Ok(text)
        } else {
            Ok(vec![format])
        }
    }

    pub(crate) fn clear(&self) {
        self.state.lock().store.clear();
    }

    pub(crate) fn set_data(&self, format: FormatId, payload: &[u8]) -> Result<()> {
        if payload.len() > self.max_data_size {
            return Err(ClipboardError::DataSizeExceeded(
                payload.len(),
                self.max_data_size,
            ));
        }
        // Assert ownership first; only a successful claim publishes data.
        if !self.transport.claim_ownership()? {
            return Err(ClipboardError::OwnershipDenied);
        }

        let bytes = Bytes::copy_from_slice(payload);
        let mut state = self.state.lock();
        let text_aliases = state
            .atoms
            .intern_batch(&*self.transport, &TEXT_FORMAT_NAMES)?;
        if text_aliases.contains(&format) {
            debug!(
                "offering {} byte(s) under {} text aliases",
                bytes.len(),
                text_aliases.len()
            );
            state.store.insert_aliased(&text_aliases, bytes);
        } else {
            debug!("offering {} byte(s) as {}", bytes.len(), format);
            state.store.insert(format, bytes);
        }
        Ok(())
    }

    pub(crate) fn get_data(&self, format: FormatId) -> Option<Bytes> {
        let candidates = self.candidates_for(format).ok()?;
        match self.owner_view().ok()? {
            OwnerView::Ours => {
                let state = self.state.lock();
                candidates.iter().find_map(|f| state.store.get(*f).cloned())
            }
            OwnerView::Peer => {
                match self.query_content(&candidates)?.payload {
                    ReplyPayload::Content(bytes) => Some(bytes),
                    ReplyPayload::Formats(_) => None,
                }
            }
            OwnerView::Absent => None,
        }
    }

    pub(crate) fn get_data_length(&self, format: FormatId) -> Option<usize> {
        let candidates = self.candidates_for(format).ok()?;
        match self.owner_view().ok()? {
            OwnerView::Ours => {
                let state = self.state.lock();
                candidates
                    .iter()
                    .find_map(|f| state.store.get(*f).map(Bytes::len))
            }
            OwnerView::Peer => {
                match self.query_content(&candidates)?.payload {
                    ReplyPayload::Content(bytes) => Some(bytes.len()),
                    ReplyPayload::Formats(_) => None,
                }
            }
            OwnerView::Absent => None,
        }
    }

    /// Whether the clipboard can produce content in `format`.
    ///
    /// When a peer owns the selection and `format` is a text alias, this
    /// answers `true` without a verifying round trip - a deliberate
    /// latency/accuracy trade-off, not a guarantee. Other formats are
    /// checked against the owner's offered list with a bounded query.
    pub(crate) fn is_convertible(&self, format: FormatId) -> bool {
        let Ok(candidates) = self.candidates_for(format) else {
            return false;
        };
        match self.owner_view() {
            Ok(OwnerView::Ours) => {
                let state = self.state.lock();
                candidates.iter().any(|f| state.store.contains(*f))
            }
            Ok(OwnerView::Peer) => {
                if candidates.len() > 1 {
                    // Text alias with a peer owner: assumed convertible
                    // without a verifying round trip.
                    true
                } else {
                    self.available_formats()
                        .map(|formats| formats.contains(&format))
                        .unwrap_or(false)
                }
            }
            _ => false,
        }
    }

    /// Ask the current owner which formats it offers
    pub(crate) fn available_formats(&self) -> Option<Vec<FormatId>> {
        match self.owner_view().ok()? {
            OwnerView::Ours => Some(self.state.lock().store.formats()),
            OwnerView::Peer => match self.query(&[RequestTarget::Formats])?.payload {
                ReplyPayload::Formats(formats) => Some(formats),
                ReplyPayload::Content(_) => None,
            },
            OwnerView::Absent => None,
        }
    }

    pub(crate) fn drop_cached_reply(&self) {
        self.state.lock().cached_reply = None;
    }

    fn query_content(&self, candidates: &[FormatId]) -> Option<SelectionReply> {
        let targets: Vec<RequestTarget> = candidates
            .iter()
            .map(|f| RequestTarget::Content(*f))
            .collect();
        self.query(&targets)
    }

    fn query(&self, targets: &[RequestTarget]) -> Option<SelectionReply> {
        OutboundQuery::new(&*self.transport, &self.state, self.query_timeout()).run(targets)
    }
}

/// A clipboard session: the process's connection to the shared selection.
///
/// Create one with [`Clipboard::connect`] over a transport, then acquire a
/// [`Lock`] with [`Clipboard::try_lock`] to read or write. The background
/// event listener keeps answering peer requests for as long as the context
/// lives, whether or not a lock is held.
pub struct Clipboard {
    session: Session,
}

impl Clipboard {
    /// Connect with default configuration
    pub fn connect(transport: Arc<dyn SelectionTransport>) -> Result<Self> {
        Self::with_config(transport, ClipboardConfig::default())
    }

    /// Connect with explicit configuration.
    ///
    /// Establishes the coordination identity on the display and starts the
    /// event listener; both persist until [`Clipboard::shutdown`] or drop.
    pub fn with_config(
        transport: Arc<dyn SelectionTransport>,
        config: ClipboardConfig,
    ) -> Result<Self> {
        config.validate()?;
        let state = Arc::new(Mutex::new(SessionState::new()));
        let listener = EventListener::spawn(
            Arc::clone(&transport),
            Arc::clone(&state),
            config.poll_interval(),
        )?;
        info!("clipboard session established as {}", transport.client_id());

        Ok(Self {
            session: Session {
                transport,
                state,
                gate: Mutex::new(()),
                listener: Mutex::new(Some(listener)),
                query_timeout_ms: AtomicU64::new(config.query_timeout_ms),
                max_data_size: config.max_data_size,
            },
        })
    }

    /// Try to acquire the clipboard lock without blocking.
    ///
    /// Returns `None` immediately when another logical session in this
    /// process holds it - "clipboard busy", never a queue.
    pub fn try_lock(&self) -> Option<Lock<'_>> {
        self.session
            .gate
            .try_lock()
            .map(|guard| Lock::new(&self.session, guard))
    }

    /// Intern a custom format name
    pub fn register_format(&self, name: &str) -> Option<FormatId> {
        self.session.register_format(name).ok()
    }

    /// The canonical text format identifier
    pub fn text_format(&self) -> Option<FormatId> {
        self.session.text_format().ok()
    }

    /// The image format identifier (PNG payloads)
    pub fn image_format(&self) -> Option<FormatId> {
        self.session.image_format().ok()
    }

    /// Current outbound-query time budget
    pub fn query_timeout(&self) -> Duration {
        self.session.query_timeout()
    }

    /// Change the outbound-query time budget at runtime
    pub fn set_query_timeout(&self, timeout: Duration) {
        self.session.set_query_timeout(timeout);
    }

    /// Stop and join the event listener, then release the connection.
    ///
    /// The listener is always joined before the connection is dropped;
    /// `Drop` runs the same sequence.
    pub fn shutdown(&self) {
        if let Some(mut listener) = self.session.listener.lock().take() {
            debug!("shutting down clipboard session");
            listener.stop_and_join();
        }
    }
}

impl Drop for Clipboard {
    fn drop(&mut self) {
        self.shutdown();
    }
}
