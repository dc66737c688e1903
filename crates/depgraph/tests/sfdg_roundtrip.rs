//! Round-trip property test for the SFDG binary format (spec §8: "For any
//! valid SFDG `g`, `read(write(g)) = g` up to node/edge multiset
//! isomorphism").

use depgraph::key::{Aspect, Designator};
use depgraph::sfdg::format::{read, write};
use depgraph::sfdg::Builder;
use proptest::prelude::*;
use std::path::PathBuf;

fn arb_aspect() -> impl Strategy<Value = Aspect> {
    prop_oneof![Just(Aspect::Interface), Just(Aspect::Implementation)]
}

fn arb_name() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_]{0,12}"
}

#[derive(Debug, Clone)]
enum Entry {
    Provide { aspect: Aspect, name: String, fingerprint: Option<String> },
    Depend { aspect: Aspect, name: String },
}

fn arb_entry() -> impl Strategy<Value = Entry> {
    prop_oneof![
        (arb_aspect(), arb_name(), proptest::option::of(arb_name())).prop_map(
            |(aspect, name, fingerprint)| Entry::Provide { aspect, name, fingerprint }
        ),
        (arb_aspect(), arb_name()).prop_map(|(aspect, name)| Entry::Depend { aspect, name }),
    ]
}

proptest! {
    #[test]
    fn round_trip_preserves_node_and_fingerprint_count(entries in proptest::collection::vec(arb_entry(), 0..20)) {
        let mut builder = Builder::new("Roundtrip.swift");
        for entry in &entries {
            match entry {
                Entry::Provide { aspect, name, fingerprint } => {
                    let id = builder.intern(name);
                    builder.provides(*aspect, Designator::TopLevel { name: id }, fingerprint.as_deref());
                }
                Entry::Depend { aspect, name } => {
                    let id = builder.intern(name);
                    builder.depends(*aspect, Designator::TopLevel { name: id });
                }
            }
        }
        let sfdg = builder.build();

        let bytes = write(&sfdg);
        let back = read(&bytes, PathBuf::from("<memory>")).unwrap();

        prop_assert_eq!(back.nodes.len(), sfdg.nodes.len());

        let mut original_keys: Vec<_> = sfdg.nodes.iter().map(|n| n.key).collect();
        let mut restored_keys: Vec<_> = back.nodes.iter().map(|n| n.key).collect();
        original_keys.sort();
        restored_keys.sort();
        prop_assert_eq!(original_keys, restored_keys);

        let original_fps: usize = sfdg.nodes.iter().filter(|n| n.fingerprint.is_some()).count();
        let restored_fps: usize = back.nodes.iter().filter(|n| n.fingerprint.is_some()).count();
        prop_assert_eq!(original_fps, restored_fps);
    }
}
