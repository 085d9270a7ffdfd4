//! A small tree survives the codec with its fields and lookups intact.

use crate::e2e_tests::helpers::*;
use crate::types::{LookupPair, Value};

#[test]
fn test_goblin_lookup_after_roundtrip() {
    let decoded = roundtrip(&goblin());
    let root = decoded.root();

    let node = decoded.sapling(root).unwrap();
    assert_eq!(node.get("name"), Some(&Value::String("Goblin".to_string())));
    assert_eq!(node.get("hp"), Some(&Value::Int(7)));

    let claw = decoded.get_branch(root, "name", "Claw").unwrap().unwrap();
    let branch = decoded.sapling(claw).unwrap();
    assert_eq!(branch.get("hp"), Some(&Value::Int(0)));
    assert!(branch.is_ready());
    assert_eq!(branch.lookup(), Some(&LookupPair::new("name", "Claw")));
}

#[test]
fn test_goblin_roundtrip_is_structurally_equal() {
    let tree = goblin();
    let decoded = roundtrip(&tree);
    assert_eq!(decoded, tree);
    assert_eq!(decoded.to_bytes().unwrap(), tree.to_bytes().unwrap());
}

#[test]
fn test_goblin_missing_branch() {
    let decoded = roundtrip(&goblin());
    let root = decoded.root();
    assert!(!decoded.has_branch(root, "name", "Fang").unwrap());
    assert!(decoded.require_branch(root, "name", "Fang").is_err());
}

#[test]
fn test_goblin_render() {
    let rendered = goblin().to_string();
    assert_eq!(
        rendered,
        "#0 name=\"Goblin\" hp=7\n  #1 [name=Claw] name=\"Claw\" hp=0\n"
    );
}
