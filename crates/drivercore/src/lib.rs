//! Explicit-module build coordination and incremental planning, built on
//! top of `depgraph`'s dependency graphs.

pub mod build_record;
pub mod cas;
pub mod error;
pub mod imdg;
pub mod jobs;
pub mod module_planner;
pub mod planner;
pub mod reporter;
pub mod stats;

pub use build_record::{BuildRecord, BuildRecordDiff, InputInfo, InputStatus, TimePoint};
pub use cas::{CasClient, CasKey, Compilation, InMemoryCas};
pub use error::{Error, Result};
pub use imdg::{Imdg, ModuleDetails, ModuleId, ModuleInfo};
pub use jobs::{AutolinkExtractJob, CompileJob, LinkJob, ModuleBuildJob, ModuleBuildKind, Plan};
pub use module_planner::{ModulePlannerConfig, modules_needing_rebuild, plan_module_builds};
pub use planner::{first_wave, hash_args, plan_build, IncrementalPlanner, InputFile, PlanContext, PlannerConfig};
pub use reporter::{Remark, RemarkEvent, Reporter};
pub use stats::PlannerStats;
