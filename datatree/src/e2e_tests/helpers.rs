//! Common helpers for end-to-end tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::schema::DeclareFields;
use crate::tree::{DataTree, SaplingId, TreeFactory};
use crate::types::Value;

/// A goblin root with one ready branch, Claw, registered under `name`.
pub fn goblin() -> DataTree {
    let mut tree = TreeFactory::default().plant();
    let root = tree.root();
    let node = tree.sapling_mut(root).unwrap();
    node.add_key("name").unwrap();
    node.schema_mut().add_int("hp").unwrap();
    node.set_string("name", "Goblin").unwrap();
    node.set_int("hp", 7).unwrap();

    let header = tree.create_branch_header(root).unwrap();
    header.add_string("name").unwrap();
    header.add_int("hp").unwrap();

    let claw = tree.grow_branch(root).unwrap();
    let branch = tree.sapling_mut(claw).unwrap();
    branch.set_string("name", "Claw").unwrap();
    branch.set_int("hp", 0).unwrap();
    tree.branch_ready(root, claw).unwrap();
    tree
}

/// Encode a tree and decode it with the default configuration.
pub fn roundtrip(tree: &DataTree) -> DataTree {
    let bytes = tree.to_bytes().unwrap();
    TreeFactory::default().read(bytes.as_slice()).unwrap()
}

/// Deterministic random trees for a seed.
pub struct TreeGen {
    rng: StdRng,
    next_name: u32,
}

impl TreeGen {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            next_name: 0,
        }
    }

    /// A tree of at most `max_nodes` saplings, every branch ready.
    pub fn tree(&mut self, max_nodes: usize) -> DataTree {
        let mut tree = TreeFactory::default().plant();
        let root = tree.root();
        tree.sapling_mut(root).unwrap().add_key("id").unwrap();
        self.fill(&mut tree, root);

        let mut open = vec![root];
        while tree.node_count() < max_nodes {
            let Some(parent) = open.pop() else { break };
            let fanout = self.rng.random_range(0..4usize);
            for _ in 0..fanout {
                let child = tree.grow_branch(parent).unwrap();
                tree.sapling_mut(child).unwrap().add_key("id").unwrap();
                self.fill(&mut tree, child);
                open.insert(0, child);
            }
        }
        ready_all(&mut tree);
        tree
    }

    fn fill(&mut self, tree: &mut DataTree, id: SaplingId) {
        self.next_name += 1;
        let node = tree.sapling_mut(id).unwrap();
        node.set_hash("id", &format!("n{}", self.next_name)).unwrap();
        let count = self.rng.random_range(0..5u32);
        for index in 0..count {
            let value = match self.rng.random_range(0..5u8) {
                0 => Value::Hash(format!("h{}", self.rng.random_range(0..100u32))),
                1 => Value::Int(self.rng.random()),
                2 => Value::Float(self.rng.random_range(-1000.0..1000.0)),
                3 => Value::Bool(self.rng.random()),
                _ => Value::String("x".repeat(self.rng.random_range(0..20usize))),
            };
            node.set(&format!("f{index}"), value).unwrap();
        }
    }
}

/// Mark every branch ready, parents before children.
pub fn ready_all(tree: &mut DataTree) {
    for id in tree.subtree(tree.root()).unwrap() {
        if let Some(parent) = tree.sapling(id).unwrap().parent() {
            tree.branch_ready(parent, id).unwrap();
        }
    }
}
