//! SEDIMENT - Hash Index
//! In-memory mapping from key to the on-disk location of its most
//! recent record. Fully reconstructible by replaying all segments in
//! ascending (segment id, offset) order.

use std::collections::HashMap;

use crate::types::{Key, SegmentRef};

/// Last-write-wins key -> location map.
#[derive(Debug, Default)]
pub struct HashIndex {
    entries: HashMap<Key, SegmentRef>,
}

impl HashIndex {
    /// Create a new, empty index.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Point a key at a new location, replacing any prior mapping.
    pub fn insert(&mut self, key: Key, location: SegmentRef) {
        self.entries.insert(key, location);
    }

    /// Look up the location of a key's most recent record.
    pub fn get(&self, key: &[u8]) -> Option<SegmentRef> {
        self.entries.get(key).copied()
    }

    /// Number of distinct keys in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the index holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
