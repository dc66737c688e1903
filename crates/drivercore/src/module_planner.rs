//! Explicit module build planner (spec §4.G/H): for every invalidated,
//! non-main module reachable from `main_module_id`, emits a job
//! describing how to build its artifact.

use crate::cas::CasClient;
use crate::error::{Error, Result};
use crate::imdg::{Imdg, ModuleDetails, ModuleId};
use crate::jobs::{ModuleBuildJob, ModuleBuildKind};
use depgraph::vpath::{FileInfo, VirtualPath};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct ModulePlannerConfig {
    pub deterministic_build: bool,
    pub cache_enabled: bool,
    /// `from -> to` rewrite table (spec §4.H "scanner prefix-mapping").
    pub prefix_map: Vec<(PathBuf, PathBuf)>,
    /// Whitelisted even though it isn't rewritten under the mapped roots.
    pub cas_root: Option<PathBuf>,
}

/// Rewrite `path` under the configured prefix map, leaving it untouched
/// if no prefix matches.
pub fn rewrite_path(path: &Path, config: &ModulePlannerConfig) -> PathBuf {
    for (from, to) in &config.prefix_map {
        if let Ok(suffix) = path.strip_prefix(from) {
            return to.join(suffix);
        }
    }
    path.to_path_buf()
}

/// Verify that no path under a mapped root leaks into `paths` unmapped,
/// except the CAS storage root, which is whitelisted (spec §4.H).
pub fn verify_no_unmapped_leak(paths: &[PathBuf], config: &ModulePlannerConfig) -> Result<()> {
    for path in paths {
        for (from, _) in &config.prefix_map {
            if path.starts_with(from) {
                let is_cas_root = config
                    .cas_root
                    .as_ref()
                    .is_some_and(|root| path.starts_with(root));
                if !is_cas_root {
                    return Err(Error::Scanner(format!(
                        "path {} starts with mapped root {} but was not rewritten",
                        path.display(),
                        from.display()
                    )));
                }
            }
        }
    }
    Ok(())
}

fn cache_key_for(name: &str, deps: &BTreeMap<String, PathBuf>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    for (dep_name, dep_path) in deps {
        hasher.update(dep_name.as_bytes());
        hasher.update(dep_path.to_string_lossy().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

fn interface_input(details: &ModuleDetails) -> Option<&Path> {
    match details {
        ModuleDetails::Swift(d) => Some(d.interface_path.as_path()),
        ModuleDetails::Clang(d) => Some(d.module_map_path.as_path()),
        ModuleDetails::Prebuilt(_) | ModuleDetails::Placeholder => None,
    }
}

fn cache_key(details: &ModuleDetails) -> Option<&str> {
    match details {
        ModuleDetails::Swift(d) => d.module_cache_key.as_deref(),
        ModuleDetails::Clang(d) => d.module_cache_key.as_deref(),
        ModuleDetails::Prebuilt(d) => d.module_cache_key.as_deref(),
        ModuleDetails::Placeholder => None,
    }
}

/// From the set of modules reachable from the main module, find the ones
/// that must be rebuilt this wave: a required module's output is missing
/// from the CAS (cached mode), missing from disk, or older than its
/// interface input (spec §4.I "Additional first-wave triggers" — explicit
/// module mode).
pub fn modules_needing_rebuild(
    imdg: &Imdg,
    reachable: &BTreeSet<ModuleId>,
    file_info: &dyn FileInfo,
    cas: Option<&dyn CasClient>,
) -> BTreeSet<ModuleId> {
    let mut stale = BTreeSet::new();

    for id in reachable {
        let Some(info) = imdg.modules.get(id) else { continue };

        if let (Some(cas), Some(key)) = (cas, cache_key(&info.details)) {
            if cas.query(&key.to_string()).is_none() {
                stale.insert(id.clone());
                continue;
            }
        }

        let output = VirtualPath::Absolute(info.module_path.clone());
        let output_meta = match file_info.stat(&output) {
            Ok(meta) => meta,
            Err(_) => {
                stale.insert(id.clone());
                continue;
            }
        };

        if let Some(interface_path) = interface_input(&info.details) {
            let interface = VirtualPath::Absolute(interface_path.to_path_buf());
            if let Ok(interface_meta) = file_info.stat(&interface) {
                if output_meta.modified < interface_meta.modified {
                    stale.insert(id.clone());
                }
            }
        }
    }

    stale
}

/// Emit module-build jobs for every id in `invalidated`, in sorted order.
/// Per SPEC_FULL.md's Open Question 2 decision, a `Placeholder` module
/// reachable from `main_module_id` is a hard error, not a job to skip.
pub fn plan_module_builds(
    imdg: &Imdg,
    invalidated: &std::collections::BTreeSet<ModuleId>,
    config: &ModulePlannerConfig,
) -> Result<Vec<ModuleBuildJob>> {
    let reachable = imdg.reachable_from_main();
    let mut jobs = Vec::new();

    for id in invalidated {
        let Some(info) = imdg.modules.get(id) else { continue };

        if matches!(info.details, ModuleDetails::Placeholder) && reachable.contains(id) {
            return Err(Error::UnexpectedPlaceholder(id.clone()));
        }

        let module_file_args: BTreeMap<String, PathBuf> = imdg
            .closure(id)
            .iter()
            .filter_map(|dep| imdg.modules.get(dep).map(|dep_info| (dep.name().to_string(), rewrite_path(&dep_info.module_path, config))))
            .collect();

        let (kind, mut args) = match &info.details {
            ModuleDetails::Swift(details) => {
                let mut args = vec![
                    "compile-module-from-interface".to_string(),
                    rewrite_path(&details.interface_path, config).display().to_string(),
                    "-disable-implicit-swift-modules".to_string(),
                ];
                for candidate in &details.compiled_candidates {
                    args.push(rewrite_path(candidate, config).display().to_string());
                }
                for (name, path) in &module_file_args {
                    args.push(format!("-module-file={name}={}", path.display()));
                }
                (
                    ModuleBuildKind::SwiftInterface {
                        interface_path: details.interface_path.clone(),
                        compiled_candidates: details.compiled_candidates.clone(),
                        module_file_args: module_file_args.clone(),
                    },
                    args,
                )
            }
            ModuleDetails::Clang(details) => {
                let mut args = vec![
                    "generate-pcm".to_string(),
                    rewrite_path(&details.module_map_path, config).display().to_string(),
                    "-fno-implicit-modules".to_string(),
                ];
                for (name, path) in &module_file_args {
                    args.push(format!("-fmodule-file={name}={}", path.display()));
                    args.push(format!("-fmodule-map-file={}", path.display()));
                }
                (
                    ModuleBuildKind::ClangModuleMap {
                        module_map_path: details.module_map_path.clone(),
                        module_file_args: module_file_args.clone(),
                    },
                    args,
                )
            }
            ModuleDetails::Prebuilt(details) => (
                ModuleBuildKind::PrebuiltExternal {
                    is_framework: details.is_framework,
                },
                Vec::new(),
            ),
            ModuleDetails::Placeholder => continue,
        };

        if config.deterministic_build && config.cache_enabled {
            args.push("-enable-deterministic-check".to_string());
            args.push("-always-compile-output-files".to_string());
            args.push("-cache-disable-replay".to_string());
        }

        let output_cache_key = if config.cache_enabled {
            Some(cache_key_for(id.name(), &module_file_args))
        } else {
            None
        };

        if config.cache_enabled {
            if let Some(key) = &output_cache_key {
                args.push(format!("-swift-module-file-cache-key={}={key}", id.name()));
            }
        }

        jobs.push(ModuleBuildJob {
            module: id.clone(),
            kind,
            args,
            output_cache_key,
        });
    }

    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imdg::{ClangModuleDetails, ModuleInfo, SwiftModuleDetails};
    use std::collections::BTreeSet;

    fn swift_module(name: &str, deps: &[&str]) -> ModuleInfo {
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
    fn swift_module_job_disables_implicit_modules() {
        let mut imdg = Imdg::new(ModuleId::Swift("Main".into()));
        imdg.insert(ModuleId::Swift("Main".into()), swift_module("Main", &["A"]));
        imdg.insert(ModuleId::Swift("A".into()), swift_module("A", &[]));

        let invalidated: BTreeSet<ModuleId> = [ModuleId::Swift("A".into())].into_iter().collect();
        let jobs = plan_module_builds(&imdg, &invalidated, &ModulePlannerConfig::default()).unwrap();

        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].args.contains(&"-disable-implicit-swift-modules".to_string()));
    }

    #[test]
    fn module_file_args_include_a_two_hop_transitive_dependency() {
        // A -> B -> C: building A must materialize C, even though A's
        // own `direct_dependencies` only names B (spec §4.G/H "each
        // transitive dependency").
        let mut imdg = Imdg::new(ModuleId::Swift("Main".into()));
        imdg.insert(ModuleId::Swift("A".into()), swift_module("A", &["B"]));
        imdg.insert(ModuleId::Swift("B".into()), swift_module("B", &["C"]));
        imdg.insert(ModuleId::Swift("C".into()), swift_module("C", &[]));

        let invalidated: BTreeSet<ModuleId> = [ModuleId::Swift("A".into())].into_iter().collect();
        let jobs = plan_module_builds(&imdg, &invalidated, &ModulePlannerConfig::default()).unwrap();

        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].args.iter().any(|a| a == "-module-file=B=B.swiftmodule"));
        assert!(jobs[0].args.iter().any(|a| a == "-module-file=C=C.swiftmodule"));
    }

    #[test]
    fn deterministic_build_mode_adds_cache_flags() {
        let mut imdg = Imdg::new(ModuleId::Swift("Main".into()));
        imdg.insert(ModuleId::Swift("A".into()), swift_module("A", &[]));

        let invalidated: BTreeSet<ModuleId> = [ModuleId::Swift("A".into())].into_iter().collect();
        let config = ModulePlannerConfig {
            deterministic_build: true,
            cache_enabled: true,
            ..Default::default()
        };
        let jobs = plan_module_builds(&imdg, &invalidated, &config).unwrap();
        assert!(jobs[0].args.contains(&"-enable-deterministic-check".to_string()));
        assert!(jobs[0].output_cache_key.is_some());
    }

    #[test]
    fn placeholder_reachable_from_main_is_an_error() {
        let mut imdg = Imdg::new(ModuleId::Swift("Main".into()));
        imdg.insert(
            ModuleId::Swift("Main".into()),
            ModuleInfo {
                module_path: PathBuf::from("Main.swiftmodule"),
                source_files: vec![],
                direct_dependencies: [ModuleId::SwiftPlaceholder("Ghost".into())].into_iter().collect(),
                details: ModuleDetails::Swift(SwiftModuleDetails {
                    interface_path: PathBuf::from("Main.swiftinterface"),
                    compiled_candidates: vec![],
                    module_cache_key: None,
                    command_line: vec![],
                }),
            },
        );
        imdg.insert(
            ModuleId::SwiftPlaceholder("Ghost".into()),
            ModuleInfo {
                module_path: PathBuf::from("Ghost.swiftmodule"),
                source_files: vec![],
                direct_dependencies: BTreeSet::new(),
                details: ModuleDetails::Placeholder,
            },
        );

        let invalidated: BTreeSet<ModuleId> = [ModuleId::SwiftPlaceholder("Ghost".into())].into_iter().collect();
        let result = plan_module_builds(&imdg, &invalidated, &ModulePlannerConfig::default());
        assert!(matches!(result, Err(Error::UnexpectedPlaceholder(_))));
    }

    #[test]
    fn clang_module_job_uses_generate_pcm() {
        let mut imdg = Imdg::new(ModuleId::Swift("Main".into()));
        imdg.insert(
            ModuleId::Clang("CFoo".into()),
            ModuleInfo {
                module_path: PathBuf::from("CFoo.pcm"),
                source_files: vec![],
                direct_dependencies: BTreeSet::new(),
                details: ModuleDetails::Clang(ClangModuleDetails {
                    module_map_path: PathBuf::from("CFoo/module.modulemap"),
                    module_cache_key: None,
                }),
            },
        );
        let invalidated: BTreeSet<ModuleId> = [ModuleId::Clang("CFoo".into())].into_iter().collect();
        let jobs = plan_module_builds(&imdg, &invalidated, &ModulePlannerConfig::default()).unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].args.contains(&"generate-pcm".to_string()));
    }

    #[test]
    fn scanner_prefix_map_rewrites_paths() {
        let config = ModulePlannerConfig {
            prefix_map: vec![(PathBuf::from("/build"), PathBuf::from("/remote"))],
            ..Default::default()
        };
        let rewritten = rewrite_path(Path::new("/build/Foo.swiftmodule"), &config);
        assert_eq!(rewritten, PathBuf::from("/remote/Foo.swiftmodule"));
    }

    #[test]
    fn unmapped_leak_under_a_mapped_root_is_rejected_unless_cas_root() {
        let config = ModulePlannerConfig {
            prefix_map: vec![(PathBuf::from("/build"), PathBuf::from("/remote"))],
            cas_root: Some(PathBuf::from("/build/cas")),
            ..Default::default()
        };
        assert!(verify_no_unmapped_leak(&[PathBuf::from("/build/cas/abc")], &config).is_ok());
        assert!(verify_no_unmapped_leak(&[PathBuf::from("/build/Foo.swiftmodule")], &config).is_err());
    }
}
