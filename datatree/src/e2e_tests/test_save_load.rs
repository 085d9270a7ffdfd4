//! Trees saved to disk load back identically.

use tempfile::tempdir;

use crate::e2e_tests::helpers::*;
use crate::file::FileError;
use crate::tree::TreeFactory;

#[test]
fn test_save_and_load_random_tree() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("random.kdt");
    let tree = TreeGen::new(3).tree(80);

    tree.save(&path).unwrap();
    let loaded = TreeFactory::default().load(&path).unwrap();
    assert_eq!(loaded, tree);
}

#[test]
fn test_flipped_byte_is_detected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("goblin.kdt");
    goblin().save(&path).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0x40;
    std::fs::write(&path, &bytes).unwrap();

    let err = TreeFactory::default().load(&path).unwrap_err();
    assert!(matches!(err, FileError::ChecksumMismatch { .. }));
}
