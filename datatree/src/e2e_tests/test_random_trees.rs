//! Seeded random trees survive the codec unchanged.

use crate::e2e_tests::helpers::*;

#[test]
fn test_random_trees_roundtrip() {
    for seed in 0..32 {
        let tree = TreeGen::new(seed).tree(64);
        let decoded = roundtrip(&tree);
        assert_eq!(decoded, tree, "seed {seed}");
        assert_eq!(decoded.node_count(), tree.node_count(), "seed {seed}");
    }
}

#[test]
fn test_same_seed_same_bytes() {
    let first = TreeGen::new(7).tree(40).to_bytes().unwrap();
    let second = TreeGen::new(7).tree(40).to_bytes().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_random_tree_lookups_survive() {
    let tree = TreeGen::new(99).tree(50);
    let decoded = roundtrip(&tree);
    let ours = tree.subtree(tree.root()).unwrap();
    let theirs = decoded.subtree(decoded.root()).unwrap();
    assert_eq!(ours.len(), theirs.len());

    for (id, decoded_id) in ours.into_iter().zip(theirs) {
        let Some(parent) = decoded.sapling(decoded_id).unwrap().parent() else {
            continue;
        };
        let pair = tree.sapling(id).unwrap().lookup().unwrap();
        let found = decoded
            .get_branch(parent, &pair.key, pair.value.as_str())
            .unwrap();
        assert_eq!(found, Some(decoded_id));
    }
}
