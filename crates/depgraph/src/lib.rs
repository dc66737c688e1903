//! Fine-grained source- and module-level dependency graphs for
//! incremental compilation.
//!
//! `sfdg` holds the per-source-file graph produced by a single
//! compilation; `mdg` holds the process-wide graph formed by integrating
//! every source's SFDG, and drives invalidation.

pub mod error;
pub mod interner;
pub mod key;
pub mod mdg;
pub mod output_map;
pub mod sfdg;
pub mod sync;
pub mod vpath;

pub use error::{Error, Result};
pub use interner::{StringId, StringTable};
pub use key::{Aspect, DependencyKey, Designator};
pub use mdg::{DependencySource, IntegrationReport, Mdg, MdgNode, NodeId};
pub use output_map::{ArtifactKind, OutputFileMap};
pub use sfdg::{Role, Sfdg, SfdgNode};
pub use sync::SyncMdg;
pub use vpath::{FakeFileInfo, FileInfo, FileMeta, RealFileInfo, VirtualPath};
