//! Clipboard Error Types
//!
//! Two layers of error reporting:
//!
//! - [`ClipboardError`] - internal error enum used by the transport trait and
//!   the session machinery. Operations on the public surface recover these
//!   into booleans or `Option` returns.
//! - [`ErrorCode`] + the process-wide error-handler hook - the only
//!   asynchronous notification path. [`ErrorCode::CannotLock`] is reported
//!   exactly once, when the default context fails to establish its display
//!   connection; [`ErrorCode::ImageNotSupported`] when the image codec path
//!   is unavailable or rejects a payload.

use parking_lot::RwLock;
use thiserror::Error;
use tracing::warn;

/// Result type for clipboard operations
pub type Result<T> = std::result::Result<T, ClipboardError>;

/// Clipboard library error types
#[derive(Error, Debug)]
pub enum ClipboardError {
    /// Transport-level failure (connection gone, routing error)
    #[error("transport error: {0}")]
    Transport(String),

    /// No display connection is available
    #[error("not connected to a display server")]
    Disconnected,

    /// Selection ownership could not be acquired
    #[error("selection ownership could not be acquired")]
    OwnershipDenied,

    /// Outbound query ran out of candidates without any reply
    #[error("no reply from selection owner after {0} candidate(s)")]
    QueryExhausted(usize),

    /// Data size exceeds limit
    #[error("data size {0} exceeds maximum allowed {1}")]
    DataSizeExceeded(usize, usize),

    /// Image decode error
    #[error("image decode error: {0}")]
    ImageDecode(String),

    /// Image encode error
    #[error("image encode error: {0}")]
    ImageEncode(String),

    /// Image support is not compiled in or unavailable
    #[error("image support not available")]
    ImageNotSupported,

    /// Pixel buffer does not match its descriptor
    #[error("invalid image buffer: {0}")]
    InvalidImage(String),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error codes delivered through the process-wide error-handler hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The clipboard session could not be established
    CannotLock,
    /// The image codec path is unavailable on this build
    ImageNotSupported,
}

/// Process-wide error-handler callback
pub type ErrorHandler = fn(ErrorCode);

static ERROR_HANDLER: RwLock<Option<ErrorHandler>> = RwLock::new(None);

/// Install (or remove, with `None`) the process-wide error handler
pub fn set_error_handler(handler: Option<ErrorHandler>) {
    *ERROR_HANDLER.write() = handler;
}

/// Get the currently installed error handler, if any
pub fn get_error_handler() -> Option<ErrorHandler> {
    *ERROR_HANDLER.read()
}

/// Report an error code through the installed handler
pub(crate) fn report(code: ErrorCode) {
    warn!("clipboard error reported: {:?}", code);
    if let Some(handler) = get_error_handler() {
        handler(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    fn count_calls(_code: ErrorCode) {
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_handler_install_and_get() {
        set_error_handler(Some(count_calls));
        assert_eq!(get_error_handler(), Some(count_calls as ErrorHandler));

        let before = CALLS.load(Ordering::SeqCst);
        report(ErrorCode::ImageNotSupported);
        assert_eq!(CALLS.load(Ordering::SeqCst), before + 1);

        set_error_handler(None);
        assert!(get_error_handler().is_none());

        // Reporting with no handler installed is a no-op
        report(ErrorCode::CannotLock);
        assert_eq!(CALLS.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn test_error_display() {
        let err = ClipboardError::DataSizeExceeded(20, 16);
        assert_eq!(err.to_string(), "data size 20 exceeds maximum allowed 16");

        let err = ClipboardError::QueryExhausted(5);
        assert!(err.to_string().contains("5 candidate"));
    }
}
