//! Module dependency graph (MDG)
//!
//! The process-wide fine-grained graph composed from per-source SFDGs.
//! Owns all its nodes and the interned string table they reference
//! (spec §3 "Lifetimes & ownership").
//!
//! Edges are stored as `{nodes, uses_of, defs_of}` keyed by `NodeId`
//! rather than heap-linked nodes, per the design note in spec §9.

pub mod priors;

use crate::error::{Error, Result};
use crate::interner::{StringId, StringTable};
use crate::key::{Aspect, DependencyKey, Designator};
use crate::sfdg::{Role, Sfdg};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Opaque source identity. Per spec §9's note to keep bidirectional
/// mappings explicit, a `DependencySource` is simply the interned
/// canonical name of the source file — `StringTable` already *is* the
/// bidirectional `id <-> string` table, so no second table is needed.
pub type DependencySource = StringId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MdgNode {
    pub key: DependencyKey,
    pub fingerprint: Option<StringId>,
    pub defining_source: Option<DependencySource>,
}

#[derive(Debug, Default)]
pub struct IntegrationReport {
    pub disappeared: BTreeSet<DependencyKey>,
    pub changed: BTreeSet<DependencyKey>,
    pub added: BTreeSet<DependencyKey>,
    /// Sources (other than the one just integrated) whose MDG nodes were
    /// reached by the invalidation frontier.
    pub invalidated_sources: BTreeSet<DependencySource>,
    /// External-dependency keys touched (added or changed) by this
    /// integration.
    pub changed_externals: BTreeSet<DependencyKey>,
}

#[derive(Debug, Default)]
pub struct Mdg {
    strings: StringTable,
    nodes: Vec<Option<MdgNode>>,
    by_identity: HashMap<(Option<DependencySource>, DependencyKey), NodeId>,
    /// Definition nodes only, keyed by the source that provides them.
    definers: HashMap<DependencyKey, BTreeMap<DependencySource, NodeId>>,
    /// Expat (no defining source) definition nodes — only ever created
    /// for `ExternalDepend` designators (spec §3 invariant).
    expat_definers: HashMap<DependencyKey, NodeId>,
    uses_of: HashMap<NodeId, Vec<NodeId>>,
    defs_of: HashMap<NodeId, Vec<NodeId>>,
    /// Use-nodes whose definer hasn't been integrated yet.
    pending_uses: HashMap<DependencyKey, BTreeSet<NodeId>>,
    /// Dirty keys recorded by the most recent `integrate` call for each
    /// source, so `collect_inputs_requiring_compilation` can be queried
    /// repeatedly (idempotently) without re-running integration.
    last_dirty: HashMap<DependencySource, BTreeSet<DependencyKey>>,
}

impl Mdg {
    pub fn new() -> Self {
        Self {
            strings: StringTable::new(),
            ..Default::default()
        }
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    pub fn strings_mut(&mut self) -> &mut StringTable {
        &mut self.strings
    }

    pub fn node(&self, id: NodeId) -> &MdgNode {
        self.nodes[id.0 as usize]
            .as_ref()
            .expect("NodeId referenced a removed node")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut MdgNode {
        self.nodes[id.0 as usize]
            .as_mut()
            .expect("NodeId referenced a removed node")
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &MdgNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeId(i as u32), n)))
    }

    fn insert_node(&mut self, node: MdgNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.by_identity.insert((node.defining_source, node.key), id);
        self.nodes.push(Some(node));
        id
    }

    fn remove_node(&mut self, id: NodeId) {
        if let Some(node) = self.nodes[id.0 as usize].take() {
            self.by_identity.remove(&(node.defining_source, node.key));
        }
        self.uses_of.remove(&id);
        self.defs_of.remove(&id);
        for uses in self.uses_of.values_mut() {
            uses.retain(|u| *u != id);
        }
        for defs in self.defs_of.values_mut() {
            defs.retain(|d| *d != id);
        }
    }

    fn add_edge(&mut self, def: NodeId, use_: NodeId) {
        let uses = self.uses_of.entry(def).or_default();
        if !uses.contains(&use_) {
            uses.push(use_);
        }
        let defs = self.defs_of.entry(use_).or_default();
        if !defs.contains(&def) {
            defs.push(def);
        }
    }

    /// Uses of a definition node, in sorted order for deterministic
    /// iteration (spec §4.E "tie-breaks").
    pub fn uses_of_sorted(&self, def: NodeId) -> Vec<NodeId> {
        let mut v = self.uses_of.get(&def).cloned().unwrap_or_default();
        v.sort();
        v
    }

    fn translate_key(&mut self, sfdg: &Sfdg, key: DependencyKey) -> DependencyKey {
        let mut translate = |id: StringId| self.strings.intern(sfdg.strings.lookup(id));
        let designator = match key.designator {
            Designator::SourceFileProvide { name } => Designator::SourceFileProvide {
                name: translate(name),
            },
            Designator::TopLevel { name } => Designator::TopLevel { name: translate(name) },
            Designator::Nominal { context } => Designator::Nominal {
                context: translate(context),
            },
            Designator::PotentialMember { context } => Designator::PotentialMember {
                context: translate(context),
            },
            Designator::Member { context, name } => Designator::Member {
                context: translate(context),
                name: translate(name),
            },
            Designator::DynamicLookup { name } => Designator::DynamicLookup { name: translate(name) },
            Designator::ExternalDepend { path } => Designator::ExternalDepend {
                path: translate(path),
            },
        };
        DependencyKey::new(key.aspect, designator)
    }

    /// Integrate a freshly-compiled source's SFDG into the graph. See
    /// spec §4.E for the five-step algorithm; the implementation notes in
    /// DESIGN.md record the concrete choices made where the prose leaves
    /// the cross-file edge wiring underspecified (pending-use resolution,
    /// expat nodes reserved for `ExternalDepend`, and the frontier
    /// crossing rule).
    pub fn integrate(&mut self, sfdg: &Sfdg, source: DependencySource) -> IntegrationReport {
        let mut new_definitions: BTreeMap<DependencyKey, Option<StringId>> = BTreeMap::new();
        let mut new_uses: BTreeSet<DependencyKey> = BTreeSet::new();
        for node in &sfdg.nodes {
            let key = self.translate_key(sfdg, node.key);
            let fp = node.fingerprint.map(|id| self.strings.intern(sfdg.strings.lookup(id)));
            match node.role {
                Role::Definition => {
                    new_definitions.insert(key, fp);
                }
                Role::Use => {
                    new_uses.insert(key);
                }
            }
        }

        let mut disappeared = BTreeSet::new();
        let mut changed = BTreeSet::new();
        let mut added = BTreeSet::new();

        // Step 1: prune this source's stale definitions.
        let existing_keys: Vec<DependencyKey> = self
            .definers
            .iter()
            .filter_map(|(k, m)| m.get(&source).map(|_| *k))
            .collect();
        for key in existing_keys {
            if !new_definitions.contains_key(&key) {
                if let Some(id) = self.definers.get_mut(&key).and_then(|m| m.remove(&source)) {
                    self.remove_node(id);
                }
                disappeared.insert(key);
            }
        }

        // Step 2: add/update this source's definitions.
        for (key, fp) in new_definitions.clone() {
            let existing = self.definers.get(&key).and_then(|m| m.get(&source)).copied();
            match existing {
                Some(id) => {
                    let current_fp = self.node(id).fingerprint;
                    if current_fp != fp || current_fp.is_none() {
                        changed.insert(key);
                        self.node_mut(id).fingerprint = fp;
                    }
                }
                None => {
                    let id = self.insert_node(MdgNode {
                        key,
                        fingerprint: fp,
                        defining_source: Some(source),
                    });
                    self.definers.entry(key).or_default().insert(source, id);
                    added.insert(key);
                    if let Some(pending) = self.pending_uses.remove(&key) {
                        for use_id in pending {
                            self.add_edge(id, use_id);
                        }
                    }
                }
            }
        }

        // Step 3: ensure use-nodes and their definer edges.
        for key in &new_uses {
            let use_id = match self.by_identity.get(&(Some(source), *key)).copied() {
                Some(id) => id,
                None => self.insert_node(MdgNode {
                    key: *key,
                    fingerprint: None,
                    defining_source: Some(source),
                }),
            };

            let definer = self
                .definers
                .get(key)
                .and_then(|m| m.get(&source).copied().or_else(|| m.values().next().copied()));

            match definer {
                Some(def_id) => self.add_edge(def_id, use_id),
                None if key.designator.is_external() => {
                    let expat_id = if let Some(id) = self.expat_definers.get(key) {
                        *id
                    } else {
                        let id = self.insert_node(MdgNode {
                            key: *key,
                            fingerprint: None,
                            defining_source: None,
                        });
                        self.expat_definers.insert(*key, id);
                        id
                    };
                    self.add_edge(expat_id, use_id);
                }
                None => {
                    self.pending_uses.entry(*key).or_default().insert(use_id);
                }
            }
        }

        // Step 4: invalidation frontier.
        let mut dirty: BTreeSet<DependencyKey> =
            disappeared.iter().chain(changed.iter()).copied().collect();
        for (key, fp) in &new_definitions {
            if key.aspect == Aspect::Interface && fp.is_none() {
                dirty.insert(*key);
                dirty.insert(key.with_aspect(Aspect::Implementation));
            }
        }

        let invalidated_sources = self.frontier_sources(source, &dirty);

        self.last_dirty.insert(source, dirty.clone());

        let changed_externals = changed
            .iter()
            .chain(added.iter())
            .filter(|k| k.designator.is_external())
            .copied()
            .collect();

        IntegrationReport {
            disappeared,
            changed,
            added,
            invalidated_sources,
            changed_externals,
        }
    }

    /// Walk the invalidation frontier from a set of dirty keys owned by
    /// `source`, returning the sources (other than `source`) whose MDG
    /// nodes were reached. Crosses interface-aspect edges only; never
    /// crosses an implementation-aspect edge out of the defining source
    /// (spec §4.E step 4).
    fn frontier_sources(
        &self,
        source: DependencySource,
        dirty: &BTreeSet<DependencyKey>,
    ) -> BTreeSet<DependencySource> {
        let mut frontier_nodes: BTreeSet<NodeId> = BTreeSet::new();
        let mut seen_keys: BTreeSet<DependencyKey> = dirty.clone();
        let mut queue: Vec<DependencyKey> = dirty.iter().copied().collect();

        while let Some(key) = queue.pop() {
            let def_id = self
                .definers
                .get(&key)
                .and_then(|m| m.get(&source).copied())
                .or_else(|| self.expat_definers.get(&key).copied());
            let Some(def_id) = def_id else { continue };
            frontier_nodes.insert(def_id);

            if key.aspect != Aspect::Interface {
                continue;
            }
            for use_id in self.uses_of_sorted(def_id) {
                frontier_nodes.insert(use_id);
                let use_node = self.node(use_id);
                let use_key = use_node.key;
                let same_source = use_node.defining_source == Some(source);
                if (use_key.aspect == Aspect::Interface || same_source) && seen_keys.insert(use_key) {
                    queue.push(use_key);
                }
            }
        }

        frontier_nodes
            .iter()
            .filter_map(|id| self.node(*id).defining_source)
            .filter(|s| *s != source)
            .collect()
    }

    /// All sources using any interface-aspect definition `source` currently
    /// provides, computed from the graph as it stands rather than from a
    /// preceding integration's dirty set (spec §4.I
    /// `-driver-always-rebuild-dependents`: "follow the MDG, not waiting
    /// for SFDGs").
    pub fn dependents_of(&self, source: DependencySource) -> BTreeSet<DependencySource> {
        let dirty: BTreeSet<DependencyKey> = self
            .definers
            .iter()
            .filter_map(|(k, m)| (k.aspect == Aspect::Interface && m.contains_key(&source)).then_some(*k))
            .collect();
        self.frontier_sources(source, &dirty)
    }

    /// Returns the transitively reachable sources whose providers changed
    /// when `compiled` was last integrated, minus `compiled` itself.
    /// Idempotent: purely reads `last_dirty`, never mutates (spec §8).
    pub fn collect_inputs_requiring_compilation(
        &self,
        compiled: DependencySource,
    ) -> BTreeSet<DependencySource> {
        match self.last_dirty.get(&compiled) {
            Some(dirty) => self.frontier_sources(compiled, dirty),
            None => BTreeSet::new(),
        }
    }

    /// Re-probe every `ExternalDepend` node whose path matches `path` and
    /// return the sources that use it (spec §4.E "External-change
    /// invalidation").
    pub fn invalidate_for_external_change(&self, path: StringId) -> BTreeSet<DependencySource> {
        let mut sources = BTreeSet::new();
        for aspect in [Aspect::Interface, Aspect::Implementation] {
            let key = DependencyKey::new(aspect, Designator::ExternalDepend { path });
            let def_id = self
                .expat_definers
                .get(&key)
                .copied()
                .or_else(|| self.definers.get(&key).and_then(|m| m.values().next().copied()));
            let Some(def_id) = def_id else { continue };
            for use_id in self.uses_of_sorted(def_id) {
                if let Some(s) = self.node(use_id).defining_source {
                    sources.insert(s);
                }
            }
        }
        sources
    }

    /// Check the invariants listed in spec §3. Intended for debug builds
    /// and tests.
    pub fn verify(&self) -> Result<()> {
        // Exactly one node per (defining_source, key).
        let mut seen: std::collections::HashSet<(Option<DependencySource>, DependencyKey)> =
            std::collections::HashSet::new();
        for (_, node) in self.nodes() {
            if !seen.insert((node.defining_source, node.key)) {
                return Err(Error::InvariantViolation(format!(
                    "duplicate node for (source={:?}, key={:?})",
                    node.defining_source, node.key
                )));
            }
        }

        // Interface/implementation pairing for each source's definitions.
        for (key, by_source) in &self.definers {
            if key.aspect != Aspect::Interface {
                continue;
            }
            for source in by_source.keys() {
                let impl_key = key.with_aspect(Aspect::Implementation);
                let has_impl = self
                    .definers
                    .get(&impl_key)
                    .is_some_and(|m| m.contains_key(source));
                if !has_impl {
                    return Err(Error::InvariantViolation(format!(
                        "source {source:?} provides interface {key:?} without a matching implementation"
                    )));
                }
            }
        }

        // Expat definers are external-only.
        for (key, def_id) in &self.expat_definers {
            if !key.designator.is_external() {
                return Err(Error::InvariantViolation(format!(
                    "expat node {def_id:?} has non-external designator {key:?}"
                )));
            }
            if self.node(*def_id).defining_source.is_some() {
                return Err(Error::InvariantViolation(
                    "expat definer unexpectedly has a defining_source".to_string(),
                ));
            }
        }

        // SourceFileProvide designator's name always matches its own
        // defining source.
        for (_, node) in self.nodes() {
            if let Designator::SourceFileProvide { name } = node.key.designator {
                if node.defining_source != Some(name) {
                    return Err(Error::InvariantViolation(format!(
                        "SourceFileProvide name {name:?} does not match defining_source {:?}",
                        node.defining_source
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Designator;
    use crate::sfdg::Builder;

    fn source_id(mdg: &mut Mdg, name: &str) -> DependencySource {
        mdg.strings_mut().intern(name)
    }

    #[test]
    fn integrating_empty_graph_adds_source_file_nodes() {
        let mut mdg = Mdg::new();
        let s = source_id(&mut mdg, "main.swift");
        let sfdg = Builder::new("main.swift").build();
        let report = mdg.integrate(&sfdg, s);
        assert!(report.added.len() >= 2);
        assert!(mdg.verify().is_ok());
    }

    #[test]
    fn cross_file_use_is_invalidated_when_provider_disappears() {
        let mut mdg = Mdg::new();
        let main = source_id(&mut mdg, "main.swift");
        let other = source_id(&mut mdg, "other.swift");

        let mut mb = Builder::new("main.swift");
        let foo = mb.intern("foo");
        mb.provides(Aspect::Interface, Designator::TopLevel { name: foo }, Some("fp1"));
        mb.provides(Aspect::Implementation, Designator::TopLevel { name: foo }, Some("fp1-impl"));
        let main_sfdg = mb.build();
        mdg.integrate(&main_sfdg, main);

        let mut ob = Builder::new("other.swift");
        let foo2 = ob.intern("foo");
        ob.depends(Aspect::Interface, Designator::TopLevel { name: foo2 });
        let other_sfdg = ob.build();
        mdg.integrate(&other_sfdg, other);

        // Changing main's fingerprint for `foo` should invalidate `other`.
        let mut mb2 = Builder::new("main.swift");
        let foo3 = mb2.intern("foo");
        mb2.provides(Aspect::Interface, Designator::TopLevel { name: foo3 }, Some("fp2"));
        mb2.provides(Aspect::Implementation, Designator::TopLevel { name: foo3 }, Some("fp2-impl"));
        let main_sfdg2 = mb2.build();
        let report = mdg.integrate(&main_sfdg2, main);

        assert!(report.changed.iter().any(|k| matches!(k.designator, Designator::TopLevel { .. })));
        let affected = mdg.collect_inputs_requiring_compilation(main);
        assert!(affected.contains(&other));
    }

    #[test]
    fn collect_inputs_requiring_compilation_is_idempotent() {
        let mut mdg = Mdg::new();
        let main = source_id(&mut mdg, "main.swift");
        let sfdg = Builder::new("main.swift").build();
        mdg.integrate(&sfdg, main);

        let first = mdg.collect_inputs_requiring_compilation(main);
        let second = mdg.collect_inputs_requiring_compilation(main);
        assert_eq!(first, second);
    }

    #[test]
    fn dependents_of_finds_users_without_a_prior_integration() {
        let mut mdg = Mdg::new();
        let main = source_id(&mut mdg, "main.swift");
        let other = source_id(&mut mdg, "other.swift");

        let mut mb = Builder::new("main.swift");
        let foo = mb.intern("foo");
        mb.provides(Aspect::Interface, Designator::TopLevel { name: foo }, Some("fp1"));
        mb.provides(Aspect::Implementation, Designator::TopLevel { name: foo }, Some("fp1-impl"));
        mdg.integrate(&mb.build(), main);

        let mut ob = Builder::new("other.swift");
        let foo2 = ob.intern("foo");
        ob.depends(Aspect::Interface, Designator::TopLevel { name: foo2 });
        mdg.integrate(&ob.build(), other);

        assert!(mdg.dependents_of(main).contains(&other));
    }

    #[test]
    fn external_dependency_change_invalidates_its_users() {
        let mut mdg = Mdg::new();
        let other = source_id(&mut mdg, "other.swift");

        let mut ob = Builder::new("other.swift");
        let local_path = ob.intern("/path/to/Mod.swiftmodule");
        ob.depends(Aspect::Interface, Designator::ExternalDepend { path: local_path });
        let sfdg = ob.build();
        mdg.integrate(&sfdg, other);

        let path = mdg
            .strings()
            .get("/path/to/Mod.swiftmodule")
            .expect("path interned during integration");
        let affected = mdg.invalidate_for_external_change(path);
        assert!(affected.contains(&other));
    }
}
