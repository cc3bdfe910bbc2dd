//! Clipboard Lock
//!
//! A scoped, try-acquire handle over the session. Mirrors the "open
//! clipboard" semantics of synchronous platform APIs, implemented as an
//! in-process mutex over the shared session state: non-blocking,
//! non-reentrant, released on drop.
//!
//! All failures surface as `false` or `None`; the session recovers errors
//! locally and never panics the caller.

use bytes::Bytes;
use parking_lot::MutexGuard;
use tracing::debug;

use crate::image::{Image, ImageSpec};
use crate::session::Session;
use crate::transport::FormatId;

#[cfg(not(feature = "image"))]
use crate::error::ErrorCode;

/// Exclusive access to the clipboard session.
///
/// Acquired with [`Clipboard::try_lock`](crate::Clipboard::try_lock);
/// dropping it releases the session for the next caller and forgets the
/// cached query reply.
pub struct Lock<'a> {
    session: &'a Session,
    _guard: MutexGuard<'a, ()>,
}

impl<'a> Lock<'a> {
    pub(crate) fn new(session: &'a Session, guard: MutexGuard<'a, ()>) -> Self {
        Self {
            session,
            _guard: guard,
        }
    }

    /// Empty the local offer.
    ///
    /// Does not revoke ownership with peers; ownership is asserted lazily
    /// by the next [`set_data`](Lock::set_data).
    pub fn clear(&mut self) -> bool {
        self.session.clear();
        true
    }

    /// Whether the clipboard can produce content in `format`
    pub fn is_convertible(&self, format: FormatId) -> bool {
        self.session.is_convertible(format)
    }

    /// Assert selection ownership and offer `payload` under `format`.
    ///
    /// A text-format payload is offered under every known text alias.
    /// Returns `false` if ownership could not be asserted or the payload
    /// exceeds the configured size limit.
    pub fn set_data(&mut self, format: FormatId, payload: &[u8]) -> bool {
        match self.session.set_data(format, payload) {
            Ok(()) => true,
            Err(e) => {
                debug!("set_data failed: {}", e);
                false
            }
        }
    }

    /// Fetch content in `format`, from the local offer when this process
    /// owns the selection, otherwise from the owner with a bounded wait
    pub fn get_data(&self, format: FormatId) -> Option<Bytes> {
        self.session.get_data(format)
    }

    /// Length of the content in `format`, without copying it out
    pub fn get_data_length(&self, format: FormatId) -> Option<usize> {
        self.session.get_data_length(format)
    }

    /// The format identifiers the current owner offers
    pub fn available_formats(&self) -> Option<Vec<FormatId>> {
        self.session.available_formats()
    }

    /// Replace the clipboard content with a UTF-8 string
    pub fn set_text(&mut self, text: &str) -> bool {
        let Ok(format) = self.session.text_format() else {
            return false;
        };
        self.session.clear();
        self.set_data(format, text.as_bytes())
    }

    /// Fetch the clipboard content as a UTF-8 string
    pub fn get_text(&self) -> Option<String> {
        let format = self.session.text_format().ok()?;
        let bytes = self.session.get_data(format)?;
        String::from_utf8(bytes.to_vec()).ok()
    }

    /// Replace the clipboard content with an image (offered as PNG)
    #[cfg(feature = "image")]
    pub fn set_image(&mut self, image: &Image) -> bool {
        let Ok(format) = self.session.image_format() else {
            return false;
        };
        let encoded = match crate::image::codec::encode_png(image) {
            Ok(encoded) => encoded,
            Err(e) => {
                debug!("image encode failed: {}", e);
                return false;
            }
        };
        self.session.clear();
        self.set_data(format, &encoded)
    }

    /// Image support not compiled in: reports
    /// [`ErrorCode::ImageNotSupported`] and fails
    #[cfg(not(feature = "image"))]
    pub fn set_image(&mut self, image: &Image) -> bool {
        let _ = image;
        crate::error::report(ErrorCode::ImageNotSupported);
        false
    }

    /// Fetch the clipboard content as a decoded image
    #[cfg(feature = "image")]
    pub fn get_image(&self) -> Option<Image> {
        let format = self.session.image_format().ok()?;
        let bytes = self.session.get_data(format)?;
        match crate::image::codec::decode_png(&bytes) {
            Ok(image) => Some(image),
            Err(e) => {
                debug!("image decode failed: {}", e);
                None
            }
        }
    }

    /// Image support not compiled in: reports
    /// [`ErrorCode::ImageNotSupported`] and fails
    #[cfg(not(feature = "image"))]
    pub fn get_image(&self) -> Option<Image> {
        crate::error::report(ErrorCode::ImageNotSupported);
        None
    }

    /// Fetch only the dimensions and pixel layout of the clipboard image
    #[cfg(feature = "image")]
    pub fn get_image_spec(&self) -> Option<ImageSpec> {
        let format = self.session.image_format().ok()?;
        let bytes = self.session.get_data(format)?;
        crate::image::codec::decode_spec(&bytes).ok()
    }

    /// Image support not compiled in: reports
    /// [`ErrorCode::ImageNotSupported`] and fails
    #[cfg(not(feature = "image"))]
    pub fn get_image_spec(&self) -> Option<ImageSpec> {
        crate::error::report(ErrorCode::ImageNotSupported);
        None
    }
}

impl Drop for Lock<'_> {
    fn drop(&mut self) {
        // The cached reply is scoped to one lock session; the gate guard
        // releases after this.
        self.session.drop_cached_reply();
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ClipboardConfig;
    use crate::session::Clipboard;
    use crate::transport::MemoryDisplay;
    use crate::transport::SelectionTransport;
    use std::time::Duration;

    #[test]
    fn test_text_round_trips() {
        let display = MemoryDisplay::new();
        let clipboard = Clipboard::connect(display.connect()).unwrap();
        let mut lock = clipboard.try_lock().unwrap();

        for text in ["", "Hello World", "caf\u{e9} \u{1f4cb} \u{4e2d}\u{6587}"] {
            assert!(lock.set_text(text), "set_text({:?})", text);
            assert_eq!(lock.get_text().as_deref(), Some(text));
            assert_eq!(
                lock.get_data_length(clipboard.text_format().unwrap()),
                Some(text.len())
            );
        }
    }

    #[test]
    fn test_set_text_replaces_previous_offer() {
        let display = MemoryDisplay::new();
        let clipboard = Clipboard::connect(display.connect()).unwrap();
        let custom = clipboard.register_format("application/x-old").unwrap();
        let mut lock = clipboard.try_lock().unwrap();

        assert!(lock.set_data(custom, b"old"));
        assert!(lock.set_text("new"));
        // The old custom entry went away with the clear inside set_text
        assert!(lock.get_data(custom).is_none());
    }

    #[test]
    fn test_clear_keeps_lock_usable() {
        let display = MemoryDisplay::new();
        let clipboard = Clipboard::connect(display.connect()).unwrap();
        let mut lock = clipboard.try_lock().unwrap();

        assert!(lock.set_text("something"));
        assert!(lock.clear());
        assert!(lock.get_text().is_none());
        assert!(lock.set_text("again"));
        assert_eq!(lock.get_text().as_deref(), Some("again"));
    }

    #[test]
    fn test_timeout_bound_against_silent_owner() {
        let display = MemoryDisplay::new();
        let config = ClipboardConfig {
            query_timeout_ms: 200,
            ..Default::default()
        };
        let clipboard = Clipboard::with_config(display.connect(), config).unwrap();
        let format = clipboard.register_format("application/x-wanted").unwrap();

        // A raw connection claims the selection but runs no listener, so it
        // never answers: the bounded wait is all that ends the query.
        let silent_owner = display.connect();
        silent_owner.claim_ownership().unwrap();

        let lock = clipboard.try_lock().unwrap();
        let start = std::time::Instant::now();
        assert!(lock.get_data(format).is_none());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(25));
        assert!(
            elapsed < Duration::from_secs(2),
            "query did not respect its bound: {:?}",
            elapsed
        );
    }

    #[cfg(feature = "image")]
    #[test]
    fn test_image_round_trip() {
        use crate::image::{Image, ImageSpec};

        let display = MemoryDisplay::new();
        let clipboard = Clipboard::connect(display.connect()).unwrap();
        let mut lock = clipboard.try_lock().unwrap();

        // 2x2 RGBA image with distinct corner colors
        let pixels: Vec<u8> = vec![
            255, 0, 0, 255, // red
            0, 255, 0, 255, // green
            0, 0, 255, 255, // blue
            255, 255, 255, 128, // translucent white
        ];
        let image = Image::new(ImageSpec::rgba8888(2, 2), pixels.clone()).unwrap();

        assert!(lock.set_image(&image));

        let spec = lock.get_image_spec().unwrap();
        assert_eq!((spec.width, spec.height), (2, 2));
        assert_eq!(spec.bits_per_pixel, 32);

        let decoded = lock.get_image().unwrap();
        assert_eq!(decoded.spec(), &ImageSpec::rgba8888(2, 2));
        assert_eq!(decoded.pixels().as_ref(), pixels.as_slice());
    }
}
