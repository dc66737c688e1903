//! Literal end-to-end scenarios from spec §8.

use drivercore::imdg::{ModuleDetails, ModuleInfo, SwiftModuleDetails};
use drivercore::{Imdg, ModuleId, ModulePlannerConfig};
use rstest::rstest;
use std::collections::BTreeSet;
use std::path::PathBuf;

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

#[rstest]
fn scenario_6_explicit_module_rebuild_touches_exactly_its_closure() {
    // G is a leaf; H -> G, J -> H, T -> J, Y -> T (spec §8 scenario 6).
    let mut imdg = Imdg::new(ModuleId::Swift("Main".into()));
    imdg.insert(ModuleId::Swift("Main".into()), swift_module("Main", &["Y"]));
    imdg.insert(ModuleId::Swift("G".into()), swift_module("G", &[]));
    imdg.insert(ModuleId::Swift("H".into()), swift_module("H", &["G"]));
    imdg.insert(ModuleId::Swift("J".into()), swift_module("J", &["H"]));
    imdg.insert(ModuleId::Swift("T".into()), swift_module("T", &["J"]));
    imdg.insert(ModuleId::Swift("Y".into()), swift_module("Y", &["T"]));

    let touched = ModuleId::Swift("G".into());
    let main = ModuleId::Swift("Main".into());
    let map = imdg.reachability_map();
    // The rebuild closure covers explicit *modules* only; `Main` is a
    // compile job, not a module-build job, so it's excluded here even
    // though it transitively imports `Y`.
    let affected: BTreeSet<ModuleId> = map
        .iter()
        .filter(|(id, closure)| **id != main && (**id == touched || closure.contains(&touched)))
        .map(|(id, _)| id.clone())
        .collect();

    let expected: BTreeSet<ModuleId> = ["G", "H", "J", "T", "Y"]
        .iter()
        .map(|n| ModuleId::Swift(n.to_string()))
        .collect();
    assert_eq!(affected, expected);

    // Main's module-file inputs changed (it transitively imports Y), so
    // it would separately be scheduled as a compile — but it is not
    // itself a module-build job since it's the main module.
    assert!(imdg.closure(&main).contains(&touched));

    let jobs = drivercore::plan_module_builds(&imdg, &affected, &ModulePlannerConfig::default()).unwrap();
    let built: BTreeSet<ModuleId> = jobs.iter().map(|j| j.module.clone()).collect();
    assert_eq!(built, expected);
}

#[rstest]
fn scenario_6_main_is_unaffected_when_an_unrelated_leaf_changes() {
    let mut imdg = Imdg::new(ModuleId::Swift("Main".into()));
    imdg.insert(ModuleId::Swift("Main".into()), swift_module("Main", &["H"]));
    imdg.insert(ModuleId::Swift("G".into()), swift_module("G", &[]));
    imdg.insert(ModuleId::Swift("H".into()), swift_module("H", &["G"]));
    imdg.insert(ModuleId::Swift("Unrelated".into()), swift_module("Unrelated", &[]));

    let touched = ModuleId::Swift("Unrelated".into());
    let map = imdg.reachability_map();
    let affected: BTreeSet<ModuleId> = map
        .iter()
        .filter(|(id, closure)| **id == touched || closure.contains(&touched))
        .map(|(id, _)| id.clone())
        .collect();

    assert_eq!(affected, [touched].into_iter().collect());
    assert!(!affected.contains(&ModuleId::Swift("Main".into())));
}
