//! Output-file-map
//!
//! Maps `(input, artifact-kind) -> output path`, with a distinguished
//! "module-wide" entry keyed by the empty string. Absence of the
//! module-wide entry disables incremental mode (spec §4.I pre-flight
//! gate #1).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Recognized artifact kinds (spec §6). Kept as an open string rather than
/// a closed enum: the frontend may introduce new kinds this crate doesn't
/// need to special-case, and the map format itself is untyped JSON-like
/// text produced by an external tool.
pub type ArtifactKind = String;

/// The distinguished key for the module-wide entry.
pub const MODULE_WIDE_KEY: &str = "";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputFileMap {
    // BTreeMap for deterministic iteration/serialization order.
    entries: BTreeMap<String, BTreeMap<ArtifactKind, PathBuf>>,
}

impl OutputFileMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, input: impl Into<String>, kind: impl Into<ArtifactKind>, path: PathBuf) {
        self.entries
            .entry(input.into())
            .or_default()
            .insert(kind.into(), path);
    }

    pub fn set_module_wide(&mut self, kind: impl Into<ArtifactKind>, path: PathBuf) {
        self.set(MODULE_WIDE_KEY, kind, path);
    }

    /// Output path for `(input, kind)`, or `None` if not mapped.
    pub fn entry(&self, input: &str, kind: &str) -> Option<&Path> {
        self.entries.get(input)?.get(kind).map(PathBuf::as_path)
    }

    /// The module-wide entry for `kind` — used for e.g.
    /// `swift-dependencies`, which names the module-wide SFDG output.
    pub fn module_wide(&self, kind: &str) -> Option<&Path> {
        self.entry(MODULE_WIDE_KEY, kind)
    }

    /// Whether the module-wide entry is present at all. Incremental mode
    /// requires at least one module-wide artifact kind to be mapped.
    pub fn has_module_wide_entry(&self) -> bool {
        self.entries
            .get(MODULE_WIDE_KEY)
            .is_some_and(|kinds| !kinds.is_empty())
    }

    pub fn inputs(&self) -> impl Iterator<Item = &str> {
        self.entries
            .keys()
            .filter(|k| k.as_str() != MODULE_WIDE_KEY)
            .map(String::as_str)
    }

    /// All output paths mapped for `input`, across every artifact kind.
    pub fn outputs_for(&self, input: &str) -> impl Iterator<Item = &Path> {
        self.entries
            .get(input)
            .into_iter()
            .flat_map(|kinds| kinds.values())
            .map(PathBuf::as_path)
    }
}
