//! # clipbus
//!
//! Cross-application clipboard exchange over a selection-based
//! window-system protocol.
//!
//! The hard part of a selection clipboard is that content lives with the
//! process that copied it: reading means negotiating with an independent
//! peer that shares no memory with you and answers on its own schedule, or
//! never. This crate implements that negotiation - a persistent background
//! listener, bounded waits for remote replies, safe hand-off of ownership,
//! and serialized local access - over a pluggable transport.
//!
//! # Architecture
//!
//! ```text
//! caller                  Clipboard (context)              display server
//! ━━━━━━                  ━━━━━━━━━━━━━━━━━━━              ━━━━━━━━━━━━━━
//! try_lock ─────────────> session gate (try-acquire)
//! set_data ─────────────> claim ownership ───────────────> owner registry
//!                         publish into data store
//! get_data ─────────────> owner? serve locally
//!                         peer?  outbound query ─────────> current owner
//!                             bounded wait  <── reply ──── (their listener)
//!                                  ▲
//!                         event listener thread <───────── events, FIFO
//!                         (revocation / requests / replies)
//! ```
//!
//! Every session runs one background listener thread that answers peer
//! requests from the local data store, empties it when a peer revokes
//! ownership, and hands query replies to the waiting caller. The
//! [`SelectionTransport`] trait is the seam to the window system;
//! [`MemoryDisplay`] is the built-in in-process implementation of the
//! display-server side, used by the default context and by tests.
//!
//! # Quick Start
//!
//! ```
//! use clipbus::{Clipboard, MemoryDisplay};
//!
//! let display = MemoryDisplay::new();
//! let clipboard = Clipboard::connect(display.connect()).unwrap();
//!
//! let mut lock = clipboard.try_lock().unwrap();
//! assert!(lock.set_text("Hello World"));
//! assert_eq!(lock.get_text().as_deref(), Some("Hello World"));
//! ```
//!
//! The free functions ([`set_text`], [`get_text`], [`has`], ...) operate on
//! a process-wide default context over [`MemoryDisplay::global`], created
//! lazily on first use. If that context cannot be established the failure
//! is reported once through the error handler as [`ErrorCode::CannotLock`]
//! and every later convenience call fails.
//!
//! # Feature Flags
//!
//! - `image` (default) - PNG codec for [`set_image`]/[`get_image`]; without
//!   it the image calls fail and report [`ErrorCode::ImageNotSupported`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod image;
pub mod transport;

mod atoms;
mod listener;
mod lock;
mod query;
mod session;
mod store;

pub use config::ClipboardConfig;
pub use error::{
    get_error_handler, set_error_handler, ClipboardError, ErrorCode, ErrorHandler, Result,
};
pub use lock::Lock;
pub use session::Clipboard;
pub use transport::{
    ClientId, ContentRequest, FormatId, MemoryConnection, MemoryDisplay, ReplyPayload,
    RequestTarget, SelectionEvent, SelectionReply, SelectionTransport,
};

pub use crate::image::{Image, ImageSpec};

use std::sync::OnceLock;
use std::time::Duration;
use tracing::warn;

static DEFAULT_CONTEXT: OnceLock<Option<Clipboard>> = OnceLock::new();

/// The lazily created process-wide context, or `None` if it could not be
/// established (reported once as [`ErrorCode::CannotLock`]).
fn default_context() -> Option<&'static Clipboard> {
    DEFAULT_CONTEXT
        .get_or_init(|| match Clipboard::connect(MemoryDisplay::global().connect()) {
            Ok(clipboard) => Some(clipboard),
            Err(e) => {
                warn!("default clipboard context unavailable: {}", e);
                error::report(ErrorCode::CannotLock);
                None
            }
        })
        .as_ref()
}

/// Acquire the default context's lock, run one operation, release
fn with_lock<T>(op: impl FnOnce(&mut Lock<'_>) -> T) -> Option<T> {
    let clipboard = default_context()?;
    let mut lock = clipboard.try_lock()?;
    Some(op(&mut lock))
}

/// Intern a custom format name on the default context
pub fn register_format(name: &str) -> Option<FormatId> {
    default_context()?.register_format(name)
}

/// The reserved "no content" format
pub fn empty_format() -> FormatId {
    FormatId::EMPTY
}

/// The canonical text format of the default context
pub fn text_format() -> Option<FormatId> {
    default_context()?.text_format()
}

/// The image format of the default context (PNG payloads)
pub fn image_format() -> Option<FormatId> {
    default_context()?.image_format()
}

/// Whether the clipboard currently has content in `format`
pub fn has(format: FormatId) -> bool {
    with_lock(|lock| lock.is_convertible(format)).unwrap_or(false)
}

/// Clear the clipboard content
pub fn clear() -> bool {
    with_lock(|lock| lock.clear()).unwrap_or(false)
}

/// Put a UTF-8 string on the clipboard
pub fn set_text(text: &str) -> bool {
    with_lock(|lock| lock.set_text(text)).unwrap_or(false)
}

/// Read the clipboard as a UTF-8 string
pub fn get_text() -> Option<String> {
    with_lock(|lock| lock.get_text())?
}

/// Put an image on the clipboard (offered as PNG)
pub fn set_image(image: &Image) -> bool {
    with_lock(|lock| lock.set_image(image)).unwrap_or(false)
}

/// Read the clipboard as a decoded image
pub fn get_image() -> Option<Image> {
    with_lock(|lock| lock.get_image())?
}

/// Read only the dimensions and layout of the clipboard image
pub fn get_image_spec() -> Option<ImageSpec> {
    with_lock(|lock| lock.get_image_spec())?
}

/// Change the default context's outbound-query time budget
pub fn set_query_timeout(timeout: Duration) -> bool {
    match default_context() {
        Some(clipboard) => {
            clipboard.set_query_timeout(timeout);
            true
        }
        None => false,
    }
}

/// The default context's outbound-query time budget
pub fn query_timeout() -> Option<Duration> {
    Some(default_context()?.query_timeout())
}
