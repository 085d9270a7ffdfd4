//! The data tree arena.
//!
//! A [`DataTree`] exclusively owns every sapling in it. Callers refer to
//! saplings through [`SaplingId`] handles, which never own anything:
//! copying or dropping a handle has no effect on the node, and nodes live
//! until the tree is dropped.
//!
//! # Single writer
//!
//! Mutation requires `&mut DataTree`. Populating branches from several
//! threads needs external synchronization around the whole tree.

use std::io::{Read, Write};
use std::path::Path;

use crate::codec::{self, DecodeError, TreeEncoder};
use crate::config::{ConfigError, TreeConfig};
use crate::error::TreeError;
use crate::file::{self, FileError};
use crate::sapling::Sapling;
use crate::schema::{ChildSchema, SelfSchema};
use crate::types::Value;

/// Non-owning handle to a sapling inside a [`DataTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SaplingId(usize);

impl SaplingId {
    /// The root of every tree.
    pub const ROOT: Self = Self(0);

    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SaplingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A hierarchical, schema-typed record tree.
#[derive(Debug)]
pub struct DataTree {
    nodes: Vec<Sapling>,
    config: TreeConfig,
}

impl DataTree {
    /// Create a tree holding an empty root sapling.
    #[must_use]
    pub fn new(config: TreeConfig) -> Self {
        Self {
            nodes: vec![Sapling::new(SelfSchema::new(), None, config)],
            config,
        }
    }

    #[must_use]
    pub const fn root(&self) -> SaplingId {
        SaplingId::ROOT
    }

    #[must_use]
    pub const fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Number of saplings, root included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn get(&self, id: SaplingId) -> Option<&Sapling> {
        self.nodes.get(id.index())
    }

    pub fn sapling(&self, id: SaplingId) -> Result<&Sapling, TreeError> {
        self.nodes
            .get(id.index())
            .ok_or(TreeError::UnknownSapling(id))
    }

    pub fn sapling_mut(&mut self, id: SaplingId) -> Result<&mut Sapling, TreeError> {
        self.nodes
            .get_mut(id.index())
            .ok_or(TreeError::UnknownSapling(id))
    }

    /// Header describing the records grown beneath `owner`.
    ///
    /// Created on first call; later calls return the same header. The
    /// header freezes when the first branch is grown from it.
    pub fn create_branch_header(&mut self, owner: SaplingId) -> Result<&mut ChildSchema, TreeError> {
        let sapling = self.sapling_mut(owner)?;
        Ok(sapling.child_schema.get_or_insert_with(ChildSchema::new))
    }

    /// Grow a new, not yet ready branch beneath `parent`.
    ///
    /// The branch starts without values or children. Its schema is a copy
    /// of the parent's branch header, if one was created.
    pub fn grow_branch(&mut self, parent: SaplingId) -> Result<SaplingId, TreeError> {
        let id = SaplingId::from_index(self.nodes.len());
        let strict = self.config.strict_schema;
        let owner = self.sapling_mut(parent)?;
        let schema = match owner.child_schema.as_mut() {
            Some(header) => {
                if strict {
                    header.freeze();
                }
                header.instantiate()
            }
            None => SelfSchema::new(),
        };
        owner.children.push(id);
        owner.mark_written();

        self.nodes.push(Sapling::new(schema, Some(parent), self.config));
        tracing::debug!("grew branch {id} beneath {parent}");
        Ok(id)
    }

    /// Signal that `child` is fully populated.
    ///
    /// Registers the child under the first key field of `parent` it holds
    /// a value for. Completeness against the header is not checked.
    pub fn branch_ready(&mut self, parent: SaplingId, child: SaplingId) -> Result<(), TreeError> {
        let owner = self.sapling(parent)?;
        let branch = self.sapling(child)?;
        if !owner.children.contains(&child) {
            return Err(TreeError::NotAChild { parent, child });
        }
        if branch.ready {
            return Err(TreeError::BranchAlreadyReady(child));
        }
        let lookup = branch.lookup_pair_for(owner.schema().as_schema().keys());

        let branch = self.sapling_mut(child)?;
        match &lookup {
            Some(pair) => tracing::debug!("branch {child} ready as {pair}"),
            None => tracing::debug!("branch {child} ready"),
        }
        branch.ready = true;
        branch.lookup = lookup;
        Ok(())
    }

    /// Whether some branch of `parent` holds `key` equal to `value`.
    pub fn has_branch(
        &self,
        parent: SaplingId,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<bool, TreeError> {
        Ok(self.get_branch(parent, key, value)?.is_some())
    }

    /// The first branch of `parent`, in growth order, holding `key` equal
    /// to `value`.
    pub fn get_branch(
        &self,
        parent: SaplingId,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<Option<SaplingId>, TreeError> {
        let value = value.into();
        let owner = self.sapling(parent)?;
        Ok(owner.children.iter().copied().find(|child| {
            self.get(*child)
                .and_then(|branch| branch.get(key))
                .is_some_and(|held| held.lookup_eq(&value))
        }))
    }

    /// Like [`get_branch`](Self::get_branch), but a miss is an error.
    pub fn require_branch(
        &self,
        parent: SaplingId,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<SaplingId, TreeError> {
        let value = value.into();
        let text = value.to_lookup_string();
        self.get_branch(parent, key, value)?
            .ok_or_else(|| TreeError::BranchNotFound {
                key: key.to_string(),
                value: text,
            })
    }

    /// `id` and all its descendants, depth-first pre-order.
    pub fn subtree(&self, id: SaplingId) -> Result<Vec<SaplingId>, TreeError> {
        self.sapling(id)?;
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            order.push(next);
            if let Some(node) = self.get(next) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        Ok(order)
    }

    /// Serialize the whole tree and hand the writer back.
    pub fn write_to_stream<W: Write>(&self, writer: W) -> Result<W, TreeError> {
        self.write_sapling(self.root(), writer)
    }

    /// Serialize `id` and its subtree and hand the writer back.
    ///
    /// # Errors
    ///
    /// `BranchNotReady` if any branch in the subtree was never marked
    /// ready; nothing is written in that case. `StreamWrite` if the writer
    /// fails.
    pub fn write_sapling<W: Write>(&self, id: SaplingId, writer: W) -> Result<W, TreeError> {
        let mut encoder = TreeEncoder::new(self, writer);
        encoder.encode(id)?;
        encoder.finish()
    }

    /// Serialize the whole tree into a byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TreeError> {
        self.write_to_stream(Vec::new())
    }

    /// Save the tree in a checksummed file envelope.
    pub fn save(&self, path: &Path) -> Result<(), FileError> {
        file::write_file(self, path)
    }

    /// Wrap a decoded root. Used by the decoder only.
    pub(crate) fn with_root(root: Sapling, config: TreeConfig) -> Self {
        Self {
            nodes: vec![root],
            config,
        }
    }

    /// Append a decoded sapling beneath its recorded parent.
    pub(crate) fn push_decoded(&mut self, sapling: Sapling) -> SaplingId {
        let id = SaplingId::from_index(self.nodes.len());
        if let Some(owner) = sapling.parent.and_then(|parent| self.nodes.get_mut(parent.index())) {
            owner.children.push(id);
            owner.mark_written();
        }
        self.nodes.push(sapling);
        id
    }

    pub(crate) fn get_mut(&mut self, id: SaplingId) -> Option<&mut Sapling> {
        self.nodes.get_mut(id.index())
    }

    fn subtree_eq(&self, mine: SaplingId, other: &Self, theirs: SaplingId) -> bool {
        let mut stack = vec![(mine, theirs)];
        while let Some((a, b)) = stack.pop() {
            let (Some(left), Some(right)) = (self.get(a), other.get(b)) else {
                return false;
            };
            if !fields_match(left, right)
                || left.lookup() != right.lookup()
                || left.children.len() != right.children.len()
            {
                return false;
            }
            stack.extend(
                left.children
                    .iter()
                    .copied()
                    .zip(right.children.iter().copied()),
            );
        }
        true
    }
}

/// Written fields in the same order with bitwise-equal values.
fn fields_match(left: &Sapling, right: &Sapling) -> bool {
    let mut ours = left.fields();
    let mut theirs = right.fields();
    loop {
        match (ours.next(), theirs.next()) {
            (None, None) => return true,
            (Some((a, x)), Some((b, y))) if a == b && x.same(y) => {}
            _ => return false,
        }
    }
}

/// Structural equality: written fields in order, lookup pairs and child
/// order. Pending declarations and handle values are ignored.
impl PartialEq for DataTree {
    fn eq(&self, other: &Self) -> bool {
        self.subtree_eq(self.root(), other, other.root())
    }
}

impl std::fmt::Display for DataTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut stack = vec![(self.root(), 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.get(id) else {
                continue;
            };
            write!(f, "{:indent$}{id}", "", indent = depth * 2)?;
            if let Some(pair) = node.lookup() {
                write!(f, " [{pair}]")?;
            }
            for (name, value) in node.fields() {
                write!(f, " {name}={value}")?;
            }
            writeln!(f)?;
            stack.extend(node.children.iter().rev().map(|child| (*child, depth + 1)));
        }
        Ok(())
    }
}

/// Plants trees and reads them back with one configuration.
///
/// Construct one at startup and pass it by reference to whatever needs to
/// create or load trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeFactory {
    config: TreeConfig,
}

impl TreeFactory {
    #[must_use]
    pub const fn new(config: TreeConfig) -> Self {
        Self { config }
    }

    /// Create a factory configured from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(TreeConfig::from_env()?))
    }

    #[must_use]
    pub const fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Create a new tree with an empty root.
    #[must_use]
    pub fn plant(&self) -> DataTree {
        DataTree::new(self.config)
    }

    /// Decode a tree from a stream produced by `write_to_stream`.
    pub fn read<R: Read>(&self, reader: R) -> Result<DataTree, DecodeError> {
        codec::decode_tree(reader, self.config)
    }

    /// Load a tree saved with [`DataTree::save`].
    pub fn load(&self, path: &Path) -> Result<DataTree, FileError> {
        file::read_file(path, self.config)
    }
}
