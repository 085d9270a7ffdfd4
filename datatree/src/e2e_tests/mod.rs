//! End-to-end tests at the tree level.
//!
//! Each test file covers one scenario: build a tree through the public
//! API, push it through the codec or the file envelope, and check what
//! comes back out.

#![cfg(test)]

mod helpers;

mod test_goblin_roundtrip;
mod test_random_trees;
mod test_readiness;
mod test_save_load;
mod test_workbook_import;
