//! Source-file dependency graph (SFDG)
//!
//! Per-compilation-unit node/edge graph produced by the frontend. This
//! module owns the in-memory representation; `format` owns the binary
//! reader/writer (spec §4.D).

pub mod format;

use crate::interner::{StringId, StringTable};
use crate::key::{Aspect, DependencyKey, Designator};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Definition,
    Use,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SfdgNode {
    pub sequence: u32,
    pub key: DependencyKey,
    pub fingerprint: Option<StringId>,
    pub defs_i_depend_upon: Vec<u32>,
    pub role: Role,
}

/// A complete per-source dependency graph: the node list plus the string
/// table its `StringId`s are indices into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sfdg {
    pub strings: StringTable,
    pub nodes: Vec<SfdgNode>,
}

impl Sfdg {
    pub fn new(strings: StringTable) -> Self {
        Self {
            strings,
            nodes: Vec::new(),
        }
    }

    pub fn node_by_sequence(&self, seq: u32) -> Option<&SfdgNode> {
        self.nodes.get(seq as usize)
    }

    /// The `SourceFileProvide` node for `name` and `aspect`, if present.
    pub fn source_file_provide(&self, name: StringId, aspect: Aspect) -> Option<&SfdgNode> {
        self.nodes.iter().find(|n| {
            n.key.aspect == aspect && matches!(n.key.designator, Designator::SourceFileProvide { name: n_name } if n_name == name)
        })
    }

    pub fn definitions(&self) -> impl Iterator<Item = &SfdgNode> {
        self.nodes.iter().filter(|n| n.role == Role::Definition)
    }

    pub fn uses(&self) -> impl Iterator<Item = &SfdgNode> {
        self.nodes.iter().filter(|n| n.role == Role::Use)
    }

    /// Recompute every use node's `defs_i_depend_upon` from scratch: a use
    /// with designator `d` and aspect `a` depends on every definition with
    /// designator `d` and aspect `a.opposite()` (spec §4.D reader step).
    pub fn resolve(&mut self) {
        let defs: Vec<(DependencyKey, u32)> = self
            .nodes
            .iter()
            .filter(|n| n.role == Role::Definition)
            .map(|n| (n.key, n.sequence))
            .collect();

        for node in &mut self.nodes {
            if node.role != Role::Use {
                continue;
            }
            let opposite = node.key.with_aspect(node.key.aspect.opposite());
            let mut deps: Vec<u32> = defs
                .iter()
                .filter(|(k, _)| *k == opposite)
                .map(|(_, seq)| *seq)
                .collect();
            deps.sort_unstable();
            node.defs_i_depend_upon = deps;
        }
    }

    /// Verify the SFDG-level invariants from spec §3:
    /// - every index in `defs_i_depend_upon` is a valid sequence
    /// - sequences 0 and 1 are the two aspects of the `SourceFileProvide`
    ///   whose name matches `file_name`
    /// - "provides" implies `Definition`, "depends" implies `Use`
    ///   (enforced structurally by construction, re-checked here)
    pub fn verify(&self, file_name: StringId) -> Result<(), crate::error::Error> {
        for node in &self.nodes {
            for &dep in &node.defs_i_depend_upon {
                if self.nodes.get(dep as usize).is_none() {
                    return Err(crate::error::Error::InvariantViolation(format!(
                        "sequence {} referenced by node {} is out of range",
                        dep, node.sequence
                    )));
                }
            }
        }

        let has = |aspect: Aspect| {
            self.nodes.iter().any(|n| {
                n.aspect_and_name_match(aspect, file_name)
            })
        };
        if !has(Aspect::Interface) || !has(Aspect::Implementation) {
            return Err(crate::error::Error::InvariantViolation(
                "missing interface or implementation SourceFileProvide node".to_string(),
            ));
        }

        let seq0 = self.nodes.first();
        let seq1 = self.nodes.get(1);
        let ok = matches!(
            (seq0, seq1),
            (Some(a), Some(b))
                if a.sequence == 0 && b.sequence == 1
                && a.aspect_and_name_match(Aspect::Interface, file_name)
                && b.aspect_and_name_match(Aspect::Implementation, file_name)
        );
        if !ok {
            return Err(crate::error::Error::InvariantViolation(
                "sequences 0 and 1 must be the SourceFileProvide interface/implementation pair"
                    .to_string(),
            ));
        }

        Ok(())
    }

    pub fn canonical_name(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }
}

impl SfdgNode {
    fn aspect_and_name_match(&self, aspect: Aspect, name: StringId) -> bool {
        self.key.aspect == aspect
            && matches!(self.key.designator, Designator::SourceFileProvide { name: n } if n == name)
    }
}

/// Builder for constructing SFDGs programmatically — used by tests and by
/// any future in-process frontend fixtures, since hand-writing the byte
/// stream for every test would be unreadable (supplemental to the
/// distilled spec, per SPEC_FULL.md §2.D).
pub struct Builder {
    strings: StringTable,
    nodes: Vec<SfdgNode>,
    file_name: StringId,
}

impl Builder {
    pub fn new(file_name: &str) -> Self {
        let mut strings = StringTable::new();
        let file_name_id = strings.intern(file_name);
        let mut builder = Self {
            strings,
            nodes: Vec::new(),
            file_name: file_name_id,
        };
        builder.push_source_file_provide();
        builder
    }

    fn push_source_file_provide(&mut self) {
        for aspect in [Aspect::Interface, Aspect::Implementation] {
            let seq = self.nodes.len() as u32;
            self.nodes.push(SfdgNode {
                sequence: seq,
                key: DependencyKey::source_file_provide(aspect, self.file_name),
                fingerprint: None,
                defs_i_depend_upon: Vec::new(),
                role: Role::Definition,
            });
        }
    }

    pub fn intern(&mut self, s: &str) -> StringId {
        self.strings.intern(s)
    }

    pub fn provides(&mut self, aspect: Aspect, designator: Designator, fingerprint: Option<&str>) -> &mut Self {
        let fingerprint = fingerprint.map(|f| self.strings.intern(f));
        let seq = self.nodes.len() as u32;
        self.nodes.push(SfdgNode {
            sequence: seq,
            key: DependencyKey::new(aspect, designator),
            fingerprint,
            defs_i_depend_upon: Vec::new(),
            role: Role::Definition,
        });
        self
    }

    pub fn depends(&mut self, aspect: Aspect, designator: Designator) -> &mut Self {
        let seq = self.nodes.len() as u32;
        self.nodes.push(SfdgNode {
            sequence: seq,
            key: DependencyKey::new(aspect, designator),
            fingerprint: None,
            defs_i_depend_upon: Vec::new(),
            role: Role::Use,
        });
        self
    }

    pub fn build(mut self) -> Sfdg {
        let mut sfdg = Sfdg {
            strings: self.strings,
            nodes: std::mem::take(&mut self.nodes),
        };
        sfdg.resolve();
        sfdg
    }

    pub fn file_name_id(&self) -> StringId {
        self.file_name
    }
}
