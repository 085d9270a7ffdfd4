//! Serialization is refused while any branch is unready.

use crate::e2e_tests::helpers::*;
use crate::error::TreeError;
use crate::tree::TreeFactory;

#[test]
fn test_unready_grandchild_blocks_whole_tree() {
    let mut tree = goblin();
    let root = tree.root();
    let claw = tree.require_branch(root, "name", "Claw").unwrap();
    let nail = tree.grow_branch(claw).unwrap();

    let mut out = Vec::new();
    let err = tree.write_to_stream(&mut out).unwrap_err();
    assert!(matches!(err, TreeError::BranchNotReady { child, .. } if child == nail));
    assert!(out.is_empty());

    tree.branch_ready(claw, nail).unwrap();
    assert!(tree.write_to_stream(Vec::new()).is_ok());
}

#[test]
fn test_unready_branch_outside_subtree_does_not_block_subtree() {
    let mut tree = goblin();
    let root = tree.root();
    let claw = tree.require_branch(root, "name", "Claw").unwrap();
    tree.grow_branch(root).unwrap();

    assert!(tree.to_bytes().is_err());
    let bytes = tree.write_sapling(claw, Vec::new()).unwrap();
    let decoded = TreeFactory::default().read(bytes.as_slice()).unwrap();
    assert_eq!(decoded.node_count(), 1);
}

#[test]
fn test_root_alone_needs_no_readiness() {
    let tree = TreeFactory::default().plant();
    let decoded = roundtrip(&tree);
    assert_eq!(decoded.node_count(), 1);
    assert_eq!(decoded, tree);
}
