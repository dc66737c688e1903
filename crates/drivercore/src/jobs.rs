//! Job value types the planner emits: a plan of compile, module-build,
//! link, and autolink-extract jobs, shaped as builder-style value structs.

use crate::imdg::ModuleId;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileJob {
    pub input: PathBuf,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleBuildKind {
    SwiftInterface {
        interface_path: PathBuf,
        compiled_candidates: Vec<PathBuf>,
        module_file_args: BTreeMap<String, PathBuf>,
    },
    ClangModuleMap {
        module_map_path: PathBuf,
        module_file_args: BTreeMap<String, PathBuf>,
    },
    PrebuiltExternal {
        is_framework: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleBuildJob {
    pub module: ModuleId,
    pub kind: ModuleBuildKind,
    pub args: Vec<String>,
    pub output_cache_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkJob {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutolinkExtractJob {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
}

/// A full plan: the compile job list always contains one entry per input,
/// even on a null build (spec §4.I "null-build compatibility" — the
/// planner never returns an empty compile list; skippability is a
/// separate classification the executor consults).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub module_builds: Vec<ModuleBuildJob>,
    pub compiles: Vec<CompileJob>,
    /// Inputs whose compile job the executor may skip based on its own
    /// up-to-date check.
    pub skippable: BTreeSet<PathBuf>,
    pub link: Option<LinkJob>,
    pub autolink_extract: Option<AutolinkExtractJob>,
}

impl Plan {
    /// Whether any job in this plan is not marked skippable.
    pub fn has_work(&self) -> bool {
        self.compiles.iter().any(|c| !self.skippable.contains(&c.input)) || !self.module_builds.is_empty()
    }
}
