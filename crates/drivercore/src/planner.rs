//! Incremental planner (spec §4.I) — the core scheduler. Runs the
//! pre-flight gates, classifies inputs, emits the first wave, and absorbs
//! post-compile SFDG integrations into further waves. Grounded in
//! `atlas-build::incremental::IncrementalEngine::plan`'s three-phase
//! structure (fingerprint/classify, propagate, classify-into-plan),
//! generalized from a single pass to the wave loop spec §4.I describes.

use crate::build_record::{BuildRecord, InputStatus, TimePoint};
use crate::cas::CasClient;
use crate::error::Result;
use crate::imdg::Imdg;
use crate::jobs::{CompileJob, LinkJob, Plan};
use crate::module_planner::{self, ModulePlannerConfig};
use crate::reporter::Reporter;
use depgraph::output_map::OutputFileMap;
use depgraph::sfdg::Sfdg;
use depgraph::vpath::FileInfo;
use depgraph::{DependencySource, Mdg};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct InputFile {
    pub path: PathBuf,
    pub mtime: TimePoint,
}

/// Flags classified as *semantic* per spec §6's option table are hashed
/// verbatim, in order; *non-semantic* flags are dropped before hashing so
/// reordering or adding them never perturbs `args_hash`.
const NON_SEMANTIC_FLAGS: &[&str] = &[
    "-driver-show-incremental",
    "-driver-show-job-lifecycle",
    "-driver-emit-fine-grained-dependency-dot-file-after-every-import",
    "-driver-verify-fine-grained-dependency-graph-after-every-import",
];

fn normalize_args(args: &[String]) -> Vec<&str> {
    args.iter()
        .map(String::as_str)
        .filter(|a| !NON_SEMANTIC_FLAGS.contains(a))
        .collect()
}

/// Hash the semantic subset of `args`, in order — mirrors
/// `FingerprintConfig::hash`'s sha2 pattern.
pub fn hash_args(args: &[String]) -> String {
    let mut hasher = Sha256::new();
    for arg in normalize_args(args) {
        hasher.update(arg.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Default)]
pub struct PlannerConfig {
    pub always_rebuild_dependents: bool,
    pub whole_module_optimization: bool,
    pub explicit_module_build: bool,
    pub module_planner: ModulePlannerConfig,
}

/// Everything the planner needs for one driver invocation. Grouped into a
/// struct per the design note in spec §9: accept the MDG, build record,
/// and IMDG as parameters rather than reading them from ambient state.
pub struct PlanContext<'a> {
    pub inputs: &'a [InputFile],
    pub output_file_map: &'a OutputFileMap,
    pub build_record: Option<&'a BuildRecord>,
    /// The result of reading and version-checking the priors file, if one
    /// exists. `Some(Err(_))` models gate 6 (version mismatch: discard and
    /// continue cold); `None` models no priors file at all.
    pub mdg_priors: Option<std::result::Result<Mdg, depgraph::Error>>,
    pub current_args: &'a [String],
    pub imdg: Option<&'a Imdg>,
    /// Callback used to check whether a given output path exists on disk;
    /// injected so tests never need a real filesystem.
    pub output_exists: &'a dyn Fn(&Path) -> bool,
    /// Used for the explicit-module staleness check (module output vs.
    /// interface mtime); injected for the same reason as `output_exists`.
    pub file_info: &'a dyn FileInfo,
    /// CAS handle for the cached-mode "module output missing from the
    /// CAS" first-wave trigger (spec §4.I). `None` when caching is
    /// disabled for this build.
    pub cas: Option<&'a dyn CasClient>,
    pub config: &'a PlannerConfig,
}

/// Planner state that persists across the wave loop of a single build.
pub struct IncrementalPlanner {
    mdg: Mdg,
    reporter: Reporter,
    incremental: bool,
    queued: BTreeSet<PathBuf>,
    skippable: BTreeSet<PathBuf>,
    any_compiled: bool,
    args_hash: String,
}

impl IncrementalPlanner {
    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn is_incremental(&self) -> bool {
        self.incremental
    }

    pub fn mdg(&self) -> &Mdg {
        &self.mdg
    }

    pub fn args_hash(&self) -> &str {
        &self.args_hash
    }

    /// Integrate a completed compile's SFDG, returning additional inputs
    /// that must now be scheduled (spec §4.I "after each compile").
    /// A graph invariant violation discards the MDG and disables
    /// incremental mode for the remainder of the build (spec §4.I
    /// failure modes) — the caller should then treat every remaining,
    /// not-yet-compiled input as needing a build.
    pub fn record_compile(&mut self, path: &Path, sfdg: &Sfdg) -> BTreeSet<PathBuf> {
        self.any_compiled = true;
        self.skippable.remove(path);

        let source: DependencySource = self.mdg.strings_mut().intern(&path.to_string_lossy());
        let report = self.mdg.integrate(sfdg, source);

        if let Err(e) = self.mdg.verify() {
            self.reporter.invariant_violation(&e.to_string());
            self.incremental = false;
            return BTreeSet::new();
        }

        let mut newly_queued = BTreeSet::new();
        for dependent in &report.invalidated_sources {
            let dependent_path = PathBuf::from(self.mdg.strings().lookup(*dependent));
            if self.queued.insert(dependent_path.clone()) {
                self.reporter.fingerprint_changed(&dependent_path.display().to_string());
                newly_queued.insert(dependent_path);
            }
        }
        newly_queued
    }

    /// SFDG for a just-compiled input could not be read: treat the compile
    /// as though it rewrote the world (spec §4.I failure modes) — every
    /// other, not-yet-queued input is scheduled.
    pub fn record_unreadable_sfdg(&mut self, path: &Path, all_inputs: &[InputFile]) -> BTreeSet<PathBuf> {
        self.any_compiled = true;
        self.skippable.remove(path);
        self.reporter
            .priors_discarded(&format!("could not read dependency graph for {}", path.display()));
        let mut newly_queued = BTreeSet::new();
        for input in all_inputs {
            if input.path != path && self.queued.insert(input.path.clone()) {
                newly_queued.insert(input.path.clone());
            }
        }
        newly_queued
    }

    /// Post-compile scheduling: link and autolink-extract run whenever at
    /// least one compile ran; otherwise, if every post-compile output
    /// already exists, they're skipped with the "oldest output is
    /// current" remark (spec §4.I).
    pub fn post_compile(
        &mut self,
        link: LinkJob,
        post_compile_outputs_current: bool,
    ) -> Option<LinkJob> {
        if self.any_compiled {
            Some(link)
        } else if post_compile_outputs_current {
            self.reporter.oldest_output_current();
            None
        } else {
            Some(link)
        }
    }
}

/// Run the pre-flight gates and classification, returning a planner ready
/// to hand out the first wave.
pub fn plan_build(ctx: PlanContext) -> Result<(IncrementalPlanner, Vec<PathBuf>)> {
    let mut reporter = Reporter::new();
    let args_hash = hash_args(ctx.current_args);
    let mut incremental = true;

    if !ctx.output_file_map.has_module_wide_entry() {
        reporter.disabled_incremental("no module-wide entry in the output file map");
        incremental = false;
    }
    if ctx.config.whole_module_optimization {
        reporter.disabled_incremental("whole-module-optimization is enabled");
        incremental = false;
    }
    match ctx.build_record {
        Some(record) if record.args_hash != args_hash => {
            reporter.different_arguments();
            reporter.disabled_incremental("arguments changed since the previous build");
            incremental = false;
        }
        None => {
            reporter.disabled_incremental("no build record from a previous build");
            incremental = false;
        }
        _ => {}
    }

    let current_paths: HashSet<PathBuf> = ctx.inputs.iter().map(|i| i.path.clone()).collect();
    if let Some(record) = ctx.build_record {
        if !record.diff(&current_paths).removed.is_empty() {
            reporter.disabled_incremental("an input from the previous build is missing from this one");
            incremental = false;
        }
    }

    let mut mdg = match ctx.mdg_priors {
        Some(Ok(mdg)) => mdg,
        Some(Err(_)) => {
            reporter.priors_discarded("incompatible priors version");
            Mdg::new()
        }
        None => Mdg::new(),
    };

    let mut queued: BTreeSet<PathBuf> = BTreeSet::new();
    let mut skippable: BTreeSet<PathBuf> = BTreeSet::new();

    if !incremental {
        mdg = Mdg::new();
        for input in ctx.inputs {
            queued.insert(input.path.clone());
        }
    } else {
        let record = ctx.build_record.expect("incremental requires a build record");
        for input in ctx.inputs {
            let key = input.path.to_string_lossy().to_string();
            match record.inputs.get(&input.path) {
                None => {
                    reporter.scheduling_new(&input.path);
                    queued.insert(input.path.clone());
                }
                Some(info) => {
                    let possibly_changed = input.mtime >= record.start_time;
                    let triggered_by_status = matches!(
                        info.status,
                        InputStatus::NeedsCascadingBuild | InputStatus::NeedsNonCascadingBuild
                    );
                    let outputs_missing = !ctx
                        .output_file_map
                        .outputs_for(&key)
                        .all(|p| (ctx.output_exists)(p));

                    if possibly_changed || triggered_by_status || outputs_missing {
                        reporter.queuing_initial(&input.path);
                        queued.insert(input.path.clone());
                    } else {
                        skippable.insert(input.path.clone());
                    }
                }
            }
        }

        if ctx.config.always_rebuild_dependents {
            let mut frontier: Vec<PathBuf> = queued.iter().cloned().collect();
            while let Some(path) = frontier.pop() {
                let Some(source) = mdg.strings().get(&path.to_string_lossy()) else { continue };
                for dependent in mdg.dependents_of(source) {
                    let dependent_path = PathBuf::from(mdg.strings().lookup(dependent));
                    if queued.insert(dependent_path.clone()) {
                        skippable.remove(&dependent_path);
                        frontier.push(dependent_path);
                    }
                }
            }
        }
    }

    let initial_queue: Vec<PathBuf> = queued.iter().cloned().collect();

    let planner = IncrementalPlanner {
        mdg,
        reporter,
        incremental,
        queued,
        skippable,
        any_compiled: false,
        args_hash,
    };

    Ok((planner, initial_queue))
}

/// Build the compile-job list and module-build list for the first wave in
/// one call, since `plan_build` already computed the classification.
///
/// The module-build set is the per-module staleness check (spec §4.I
/// "Additional first-wave triggers": CAS cache miss, missing output, or an
/// output older than its interface input) intersected with everything
/// reachable from the main module — not "rebuild everything reachable"
/// whenever any compile input is queued.
pub fn first_wave(
    planner: &IncrementalPlanner,
    imdg: Option<&Imdg>,
    file_info: &dyn FileInfo,
    cas: Option<&dyn CasClient>,
    config: &PlannerConfig,
) -> Result<Plan> {
    let module_builds = match imdg {
        Some(imdg) if config.explicit_module_build => {
            let reachable = imdg.reachable_from_main();
            let invalidated = if planner.incremental {
                module_planner::modules_needing_rebuild(imdg, &reachable, file_info, cas)
            } else {
                reachable
            };
            module_planner::plan_module_builds(imdg, &invalidated, &config.module_planner)?
        }
        _ => Vec::new(),
    };

    let compiles: Vec<CompileJob> = planner
        .queued
        .iter()
        .chain(planner.skippable.iter())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|p| CompileJob {
            input: p.clone(),
            args: Vec::new(),
        })
        .collect();

    Ok(Plan {
        module_builds,
        compiles,
        skippable: planner.skippable.clone(),
        link: None,
        autolink_extract: None,
    })
}
