//! Atom/Format Cache
//!
//! Format-name lookup requires a round trip to the display server, so
//! resolved identifiers are memoized for the lifetime of the connection.
//! The cache is append-only and guarded by the same mutex as the rest of
//! the session state.

use std::collections::HashMap;
use tracing::trace;

use crate::error::Result;
use crate::transport::{FormatId, SelectionTransport};

/// Known text-format aliases, most specific encoding first.
///
/// A text payload is published under every one of these so legacy peers can
/// request whichever they understand; outbound text queries try them in
/// this order.
pub(crate) const TEXT_FORMAT_NAMES: [&str; 5] = [
    "UTF8_STRING",
    "text/plain;charset=utf-8",
    "STRING",
    "TEXT",
    "text/plain",
];

/// Format name used for image payloads (PNG-encoded)
pub(crate) const IMAGE_FORMAT_NAME: &str = "image/png";

/// Memoized format-name to identifier mapping
#[derive(Debug, Default)]
pub(crate) struct AtomCache {
    by_name: HashMap<String, FormatId>,
}

impl AtomCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Resolve one name, hitting the server only on a cache miss
    pub(crate) fn intern(
        &mut self,
        transport: &dyn SelectionTransport,
        name: &str,
    ) -> Result<FormatId> {
        if let Some(&id) = self.by_name.get(name) {
            return Ok(id);
        }
        let id = transport.intern(name)?;
        trace!("cached {:?} as {}", name, id);
        self.by_name.insert(name.to_owned(), id);
        Ok(id)
    }

    /// Resolve several names, batching the misses into one concurrent
    /// transport request so first use of a long alias list does not pay a
    /// serialized round trip per name.
    pub(crate) fn intern_batch(
        &mut self,
        transport: &dyn SelectionTransport,
        names: &[&str],
    ) -> Result<Vec<FormatId>> {
        let misses: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| !self.by_name.contains_key(*name))
            .collect();

        if !misses.is_empty() {
            let resolved = transport.intern_batch(&misses)?;
            for (name, id) in misses.iter().zip(resolved) {
                self.by_name.insert((*name).to_owned(), id);
            }
        }

        Ok(names
            .iter()
            .map(|name| self.by_name[*name])
            .collect())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.by_name.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryDisplay;

    #[test]
    fn test_intern_memoizes() {
        let display = MemoryDisplay::new();
        let conn = display.connect();
        let mut cache = AtomCache::new();

        let first = cache.intern(&*conn, "UTF8_STRING").unwrap();
        let second = cache.intern(&*conn, "UTF8_STRING").unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_intern_batch_fills_only_misses() {
        let display = MemoryDisplay::new();
        let conn = display.connect();
        let mut cache = AtomCache::new();

        let utf8 = cache.intern(&*conn, "UTF8_STRING").unwrap();
        let ids = cache.intern_batch(&*conn, &TEXT_FORMAT_NAMES).unwrap();

        assert_eq!(ids.len(), TEXT_FORMAT_NAMES.len());
        assert_eq!(ids[0], utf8);
        assert_eq!(cache.len(), TEXT_FORMAT_NAMES.len());

        // All aliases are distinct identifiers
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_text_alias_order_prefers_utf8() {
        assert_eq!(TEXT_FORMAT_NAMES[0], "UTF8_STRING");
    }
}
