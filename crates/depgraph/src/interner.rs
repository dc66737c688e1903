//! Interned string table
//!
//! All names, paths-as-names, and fingerprints used inside the graphs in
//! this crate are interned string ids. The table is append-only during a
//! build and is itself part of the serialized graph, so ids are stable
//! only within one persisted graph.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// An interned string id. Equality is `O(1)`; ids are dense and assigned
/// in intern order starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StringId(u32);

impl StringId {
    /// The empty string always interns to index 0 (mirrors the SFDG
    /// string pool's reserved slot 0 in spec §4.D).
    pub const EMPTY: StringId = StringId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Process-private, append-only bidirectional `string <-> id` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StringTable {
    strings: Vec<String>,
    #[serde(skip)]
    lookup: HashMap<String, StringId>,
}

impl StringTable {
    /// Create a new table, pre-seeded with the empty string at index 0.
    pub fn new() -> Self {
        let mut table = Self {
            strings: Vec::new(),
            lookup: HashMap::new(),
        };
        table.intern("");
        table
    }

    /// Intern `s`, returning its (possibly newly assigned) id.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.lookup.get(s) {
            return id;
        }
        let id = StringId(self.strings.len() as u32);
        self.strings.push(s.to_string());
        self.lookup.insert(s.to_string(), id);
        id
    }

    /// Look up the string for an id. Panics if `id` was not produced by
    /// this table (a programmer error, not a recoverable condition).
    pub fn lookup(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    /// Look up the id for a string if it has already been interned,
    /// without mutating the table.
    pub fn get(&self, s: &str) -> Option<StringId> {
        self.lookup.get(s).copied()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Every interned string, in intern (and therefore id) order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }

    /// Construct the id for a known-valid raw index. Callers (the binary
    /// format reader) must have already checked `idx < self.len()`.
    pub fn id_at(&self, idx: usize) -> StringId {
        StringId(idx as u32)
    }

    /// Rebuild the reverse lookup map after deserializing; `serde(skip)`
    /// leaves `lookup` empty on the deserialized value.
    pub fn rebuild_lookup(&mut self) {
        self.lookup = self
            .strings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), StringId(i as u32)))
            .collect();
    }
}

/// Deserializing via `serde` bypasses `new`, so the reverse map must be
/// rebuilt explicitly. Crates embedding a `StringTable` inside a larger
/// serialized structure (the MDG priors) call this after deserialization.
pub fn finish_deserialize(table: &mut StringTable) {
    table.rebuild_lookup();
}
