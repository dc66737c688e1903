//! Inter-module dependency graph (IMDG) — a snapshot of cross-module
//! dependencies obtained from the scanner (spec §3, §4.G/H). Read-only
//! once returned to the planner.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModuleId {
    Swift(String),
    Clang(String),
    SwiftPrebuiltExternal(String),
    SwiftPlaceholder(String),
}

impl ModuleId {
    pub fn name(&self) -> &str {
        match self {
            ModuleId::Swift(n)
            | ModuleId::Clang(n)
            | ModuleId::SwiftPrebuiltExternal(n)
            | ModuleId::SwiftPlaceholder(n) => n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwiftModuleDetails {
    pub interface_path: PathBuf,
    pub compiled_candidates: Vec<PathBuf>,
    pub module_cache_key: Option<String>,
    pub command_line: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClangModuleDetails {
    pub module_map_path: PathBuf,
    pub module_cache_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrebuiltModuleDetails {
    pub is_framework: bool,
    pub module_cache_key: Option<String>,
}

/// Sum type over module detail kinds, exhaustively matched at every use
/// site per the design note in spec §9 ("dynamic dispatch on
/// module/detail kinds" replaced with a tagged variant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleDetails {
    Swift(SwiftModuleDetails),
    Clang(ClangModuleDetails),
    Prebuilt(PrebuiltModuleDetails),
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub module_path: PathBuf,
    pub source_files: Vec<PathBuf>,
    pub direct_dependencies: BTreeSet<ModuleId>,
    pub details: ModuleDetails,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Imdg {
    pub main_module_id: Option<ModuleId>,
    pub modules: BTreeMap<ModuleId, ModuleInfo>,
}

impl Imdg {
    pub fn new(main_module_id: ModuleId) -> Self {
        Self {
            main_module_id: Some(main_module_id),
            modules: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, id: ModuleId, info: ModuleInfo) {
        self.modules.insert(id, info);
    }

    /// Every module transitively reachable from `root` via
    /// `direct_dependencies`, not including `root` itself (spec §8:
    /// "no module is in its own direct set").
    pub fn closure(&self, root: &ModuleId) -> BTreeSet<ModuleId> {
        let mut visited: BTreeSet<ModuleId> = BTreeSet::new();
        let mut stack = vec![root.clone()];
        while let Some(id) = stack.pop() {
            let Some(info) = self.modules.get(&id) else { continue };
            for dep in &info.direct_dependencies {
                if visited.insert(dep.clone()) {
                    stack.push(dep.clone());
                }
            }
        }
        visited
    }

    /// The closure of every module reachable from `main_module_id`.
    pub fn reachable_from_main(&self) -> BTreeSet<ModuleId> {
        match &self.main_module_id {
            Some(main) => {
                let mut reachable = self.closure(main);
                reachable.insert(main.clone());
                reachable
            }
            None => BTreeSet::new(),
        }
    }

    /// Full reachability map, `module -> closure(module)`, used by the
    /// explicit-module build planner and by tests asserting the §8
    /// invariant `closure(m) ⊇ direct(m)`.
    pub fn reachability_map(&self) -> HashMap<ModuleId, BTreeSet<ModuleId>> {
        self.modules
            .keys()
            .map(|id| (id.clone(), self.closure(id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swift(name: &str, deps: &[&str]) -> ModuleInfo {
        ModuleInfo {
            module_path: PathBuf::from(format!("{name}.swiftmodule")),
            source_files: vec![],
            direct_dependencies: deps.iter().map(|d| ModuleId::Swift(d.to_string())).collect(),
            details: ModuleDetails::Swift(SwiftModuleDetails {
                interface_path: PathBuf::from(format!("{name}.swiftinterface")),
                compiled_candidates: vec![],
                module_cache_key: None,
                command_line: vec![],
            }),
        }
    }

    #[test]
    fn closure_excludes_the_module_itself() {
        let mut imdg = Imdg::new(ModuleId::Swift("Main".into()));
        imdg.insert(ModuleId::Swift("Main".into()), swift("Main", &["A"]));
        imdg.insert(ModuleId::Swift("A".into()), swift("A", &[]));

        let closure = imdg.closure(&ModuleId::Swift("Main".into()));
        assert!(!closure.contains(&ModuleId::Swift("Main".into())));
        assert!(closure.contains(&ModuleId::Swift("A".into())));
    }

    #[test]
    fn closure_is_superset_of_direct_dependencies() {
        let mut imdg = Imdg::new(ModuleId::Swift("Main".into()));
        imdg.insert(ModuleId::Swift("Main".into()), swift("Main", &["A", "B"]));
        imdg.insert(ModuleId::Swift("A".into()), swift("A", &["B"]));
        imdg.insert(ModuleId::Swift("B".into()), swift("B", &[]));

        for (id, closure) in imdg.reachability_map() {
            let direct = &imdg.modules[&id].direct_dependencies;
            assert!(closure.is_superset(direct), "{id:?}: {closure:?} vs {direct:?}");
        }
    }

    #[test]
    fn explicit_module_rebuild_scenario_closure() {
        // G is a leaf; H, J, T, Y transitively depend on it (spec §8
        // scenario 6).
        let mut imdg = Imdg::new(ModuleId::Swift("Main".into()));
        imdg.insert(ModuleId::Swift("G".into()), swift("G", &[]));
        imdg.insert(ModuleId::Swift("H".into()), swift("H", &["G"]));
        imdg.insert(ModuleId::Swift("J".into()), swift("J", &["H"]));
        imdg.insert(ModuleId::Swift("T".into()), swift("T", &["J"]));
        imdg.insert(ModuleId::Swift("Y".into()), swift("Y", &["T"]));

        let touched = ModuleId::Swift("G".into());
        let map = imdg.reachability_map();
        let affected: BTreeSet<ModuleId> = map
            .iter()
            .filter(|(id, closure)| **id == touched || closure.contains(&touched))
            .map(|(id, _)| id.clone())
            .collect();

        let expected: BTreeSet<ModuleId> = ["G", "H", "J", "T", "Y"]
            .iter()
            .map(|n| ModuleId::Swift(n.to_string()))
            .collect();
        assert_eq!(affected, expected);
    }
}
