//! Dependency keys
//!
//! `DependencyKey = (aspect, designator)` identifies a node in both the
//! SFDG and the MDG. See spec §3.

use crate::interner::StringId;
use serde::{Deserialize, Serialize};

/// Whether a change to this node must propagate across compilation-unit
/// boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Aspect {
    Interface,
    Implementation,
}

impl Aspect {
    pub fn opposite(self) -> Aspect {
        match self {
            Aspect::Interface => Aspect::Implementation,
            Aspect::Implementation => Aspect::Interface,
        }
    }
}

/// The tagged variant identifying what kind of definition or use a node
/// represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Designator {
    /// Identifies the compilation unit itself.
    SourceFileProvide { name: StringId },
    TopLevel { name: StringId },
    Nominal { context: StringId },
    PotentialMember { context: StringId },
    Member { context: StringId, name: StringId },
    DynamicLookup { name: StringId },
    /// A binary module or similar external artifact.
    ExternalDepend { path: StringId },
}

impl Designator {
    /// Short tag name, used by the reporter and the binary format to
    /// name the record family this designator belongs to.
    pub fn tag(&self) -> &'static str {
        match self {
            Designator::SourceFileProvide { .. } => "source-file",
            Designator::TopLevel { .. } => "top-level",
            Designator::Nominal { .. } => "nominal",
            Designator::PotentialMember { .. } => "potential-member",
            Designator::Member { .. } => "member",
            Designator::DynamicLookup { .. } => "dynamic-lookup",
            Designator::ExternalDepend { .. } => "external-depend",
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Designator::ExternalDepend { .. })
    }
}

/// `(aspect, designator)`. Totally ordered so iteration over keyed
/// collections is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DependencyKey {
    pub aspect: Aspect,
    pub designator: Designator,
}

impl DependencyKey {
    pub fn new(aspect: Aspect, designator: Designator) -> Self {
        Self { aspect, designator }
    }

    pub fn source_file_provide(aspect: Aspect, name: StringId) -> Self {
        Self::new(aspect, Designator::SourceFileProvide { name })
    }

    pub fn with_aspect(self, aspect: Aspect) -> Self {
        Self { aspect, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::StringTable;

    #[test]
    fn keys_order_by_aspect_then_designator() {
        let mut t = StringTable::new();
        let foo = t.intern("foo");
        let k1 = DependencyKey::new(Aspect::Interface, Designator::TopLevel { name: foo });
        let k2 = DependencyKey::new(Aspect::Implementation, Designator::TopLevel { name: foo });
        assert!(k1 < k2);
    }

    #[test]
    fn equal_keys_compare_equal() {
        let mut t = StringTable::new();
        let foo = t.intern("foo");
        let k1 = DependencyKey::new(Aspect::Interface, Designator::TopLevel { name: foo });
        let k2 = DependencyKey::new(Aspect::Interface, Designator::TopLevel { name: foo });
        assert_eq!(k1, k2);
    }

    #[test]
    fn opposite_aspect_round_trips() {
        assert_eq!(Aspect::Interface.opposite(), Aspect::Implementation);
        assert_eq!(Aspect::Implementation.opposite(), Aspect::Interface);
    }
}
