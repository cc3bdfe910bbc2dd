//! Data Store
//!
//! The content this process currently offers as selection owner: a mapping
//! from format identifier to an immutable, reference-counted byte buffer.
//! Several identifiers may alias one buffer (a text payload is published
//! under every known text-format alias). The store is populated only while
//! this process owns the selection and is emptied the moment a peer revokes
//! ownership.

use bytes::Bytes;
use std::collections::HashMap;

use crate::transport::FormatId;

#[derive(Debug, Default)]
pub(crate) struct DataStore {
    entries: HashMap<FormatId, Bytes>,
}

impl DataStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn insert(&mut self, format: FormatId, payload: Bytes) {
        self.entries.insert(format, payload);
    }

    /// Publish one payload under several format identifiers.
    ///
    /// The buffer is shared, not copied; every alias holds a handle to the
    /// same bytes.
    pub(crate) fn insert_aliased(&mut self, formats: &[FormatId], payload: Bytes) {
        for &format in formats {
            self.entries.insert(format, payload.clone());
        }
    }

    pub(crate) fn get(&self, format: FormatId) -> Option<&Bytes> {
        self.entries.get(&format)
    }

    pub(crate) fn contains(&self, format: FormatId) -> bool {
        self.entries.contains_key(&format)
    }

    /// Offered format identifiers, in stable order
    pub(crate) fn formats(&self) -> Vec<FormatId> {
        let mut formats: Vec<FormatId> = self.entries.keys().copied().collect();
        formats.sort();
        formats
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut store = DataStore::new();
        let format = FormatId(7);

        assert!(store.is_empty());
        store.insert(format, Bytes::from_static(b"payload"));
        assert!(store.contains(format));
        assert_eq!(store.get(format).unwrap().as_ref(), b"payload");
        assert!(!store.contains(FormatId(8)));
    }

    #[test]
    fn test_aliased_entries_share_one_buffer() {
        let mut store = DataStore::new();
        let aliases = [FormatId(1), FormatId(2), FormatId(3)];
        let payload = Bytes::from(vec![1u8, 2, 3, 4]);

        store.insert_aliased(&aliases, payload.clone());
        for alias in aliases {
            let stored = store.get(alias).unwrap();
            assert_eq!(stored, &payload);
            // Same backing allocation, not a copy
            assert_eq!(stored.as_ptr(), payload.as_ptr());
        }
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut store = DataStore::new();
        store.insert(FormatId(1), Bytes::from_static(b"a"));
        store.insert(FormatId(2), Bytes::from_static(b"b"));

        store.clear();
        assert!(store.is_empty());
        assert!(store.formats().is_empty());
    }

    #[test]
    fn test_formats_are_sorted() {
        let mut store = DataStore::new();
        store.insert(FormatId(9), Bytes::from_static(b"a"));
        store.insert(FormatId(3), Bytes::from_static(b"b"));
        store.insert(FormatId(5), Bytes::from_static(b"c"));

        assert_eq!(store.formats(), vec![FormatId(3), FormatId(5), FormatId(9)]);
    }
}
