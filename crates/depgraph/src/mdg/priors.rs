//! On-disk MDG state ("priors") carried between incremental builds
//! (spec §4.E "Serialization").
//!
//! `HashMap`s keyed by non-string types don't round-trip cleanly through
//! `serde_json`, so priors are represented as plain vectors of pairs and
//! rebuilt into the live `Mdg` indices on load.

use super::{DependencySource, Mdg, MdgNode, NodeId};
use crate::error::{Error, Result};
use crate::interner::StringTable;
use crate::key::DependencyKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

const PRIORS_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct Priors {
    version: u32,
    /// The compiler identification string in effect when this graph was
    /// written (spec §4.E serialization tuple: "compiler_version"). A
    /// mismatch against the compiler currently running means the graph
    /// may describe semantics that compiler no longer has — discarded as
    /// a cold start, never treated as merely a format skew (spec §8:
    /// "MDG priors with a different `compiler_version` are discarded
    /// with a remark, and the next build is cold").
    compiler_version: String,
    strings: StringTable,
    nodes: Vec<(NodeId, MdgNode)>,
    edges: Vec<(NodeId, NodeId)>,
    definers: Vec<(DependencyKey, Vec<(DependencySource, NodeId)>)>,
    expat_definers: Vec<(DependencyKey, NodeId)>,
    last_dirty: Vec<(DependencySource, Vec<DependencyKey>)>,
}

impl Mdg {
    pub fn to_priors(&self, compiler_version: impl Into<String>) -> Priors {
        let nodes = self.nodes().map(|(id, n)| (id, n.clone())).collect();
        let mut edges = Vec::new();
        for (&def, uses) in &self.uses_of {
            for &use_id in uses {
                edges.push((def, use_id));
            }
        }
        edges.sort();

        let definers = self
            .definers
            .iter()
            .map(|(k, m)| (*k, m.iter().map(|(s, id)| (*s, *id)).collect()))
            .collect();

        let expat_definers = self.expat_definers.iter().map(|(k, id)| (*k, *id)).collect();

        let last_dirty = self
            .last_dirty
            .iter()
            .map(|(s, keys)| (*s, keys.iter().copied().collect()))
            .collect();

        Priors {
            version: PRIORS_VERSION,
            compiler_version: compiler_version.into(),
            strings: self.strings.clone(),
            nodes,
            edges,
            definers,
            expat_definers,
            last_dirty,
        }
    }

    /// Restore a previously-serialized graph, rejecting it if the
    /// serialization format version or the compiler that wrote it
    /// doesn't match what's running now (spec §4.E, §8).
    pub fn from_priors(priors: Priors, current_compiler_version: &str) -> Result<Self> {
        if priors.version != PRIORS_VERSION {
            return Err(Error::PriorsVersionMismatch {
                expected: PRIORS_VERSION,
                found: priors.version,
            });
        }
        if priors.compiler_version != current_compiler_version {
            return Err(Error::PriorsCompilerVersionMismatch {
                expected: current_compiler_version.to_string(),
                found: priors.compiler_version,
            });
        }

        let mut strings = priors.strings;
        crate::interner::finish_deserialize(&mut strings);

        let max_id = priors.nodes.iter().map(|(id, _)| id.0).max().map(|m| m + 1).unwrap_or(0);
        let mut nodes: Vec<Option<MdgNode>> = vec![None; max_id as usize];
        let mut by_identity = HashMap::new();
        for (id, node) in priors.nodes {
            by_identity.insert((node.defining_source, node.key), id);
            nodes[id.0 as usize] = Some(node);
        }

        let mut uses_of: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut defs_of: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for (def, use_) in priors.edges {
            uses_of.entry(def).or_default().push(use_);
            defs_of.entry(use_).or_default().push(def);
        }

        let definers = priors
            .definers
            .into_iter()
            .map(|(k, v)| (k, v.into_iter().collect::<BTreeMap<_, _>>()))
            .collect();

        let expat_definers = priors.expat_definers.into_iter().collect();

        let last_dirty = priors
            .last_dirty
            .into_iter()
            .map(|(s, keys)| (s, keys.into_iter().collect()))
            .collect();

        Ok(Mdg {
            strings,
            nodes,
            by_identity,
            definers,
            expat_definers,
            uses_of,
            defs_of,
            pending_uses: HashMap::new(),
            last_dirty,
        })
    }

    pub fn write_to_file(&self, path: &Path, compiler_version: impl Into<String>) -> Result<()> {
        let priors = self.to_priors(compiler_version);
        let json = serde_json::to_vec_pretty(&priors)
            .map_err(|e| Error::MalformedBlock {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        std::fs::write(path, json).map_err(|e| Error::io(path, e))
    }

    pub fn read_from_file(path: &Path, current_compiler_version: &str) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        let priors: Priors = serde_json::from_slice(&bytes).map_err(|e| Error::MalformedBlock {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Mdg::from_priors(priors, current_compiler_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{Aspect, Designator};
    use crate::sfdg::Builder;

    #[test]
    fn priors_round_trip_preserves_edges_and_dirty_state() {
        let mut mdg = Mdg::new();
        let main = mdg.strings_mut().intern("main.swift");
        let other = mdg.strings_mut().intern("other.swift");

        let mut mb = Builder::new("main.swift");
        let foo = mb.intern("foo");
        mb.provides(Aspect::Interface, Designator::TopLevel { name: foo }, Some("fp1"));
        mb.provides(Aspect::Implementation, Designator::TopLevel { name: foo }, Some("fp1-impl"));
        mdg.integrate(&mb.build(), main);

        let mut ob = Builder::new("other.swift");
        let foo2 = ob.intern("foo");
        ob.depends(Aspect::Interface, Designator::TopLevel { name: foo2 });
        mdg.integrate(&ob.build(), other);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("priors.json");
        mdg.write_to_file(&path, "swift-5.10").unwrap();
        let restored = Mdg::read_from_file(&path, "swift-5.10").unwrap();

        assert_eq!(restored.len(), mdg.len());
        assert!(restored.verify().is_ok());
        assert_eq!(
            restored.collect_inputs_requiring_compilation(main),
            mdg.collect_inputs_requiring_compilation(main)
        );
    }

    #[test]
    fn rejects_future_priors_version() {
        let mdg = Mdg::new();
        let mut priors = mdg.to_priors("swift-5.10");
        priors.version = PRIORS_VERSION + 1;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("priors.json");
        std::fs::write(&path, serde_json::to_vec(&priors).unwrap()).unwrap();
        assert!(Mdg::read_from_file(&path, "swift-5.10").is_err());
    }

    #[test]
    fn rejects_priors_from_a_different_compiler_version() {
        let mdg = Mdg::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("priors.json");
        mdg.write_to_file(&path, "swift-5.10").unwrap();

        let result = Mdg::read_from_file(&path, "swift-5.11");
        assert!(matches!(
            result,
            Err(Error::PriorsCompilerVersionMismatch { .. })
        ));
    }
}
