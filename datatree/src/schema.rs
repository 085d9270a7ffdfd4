//! Field schemas.
//!
//! A [`Schema`] is an ordered list of field declarations. Two typed views
//! wrap it: [`SelfSchema`] describes the fields of the sapling that owns it,
//! [`ChildSchema`] describes the records grown beneath a sapling. Both
//! declare fields through [`DeclareFields`], and `Sapling::add_key` uses the
//! same path, so every entry point validates names the same way.
//!
//! # Freezing
//!
//! A schema can be frozen. After that, explicit declarations fail with
//! `SchemaFrozen`. Auto-declaration on write is a separate policy and may
//! still append to a frozen `SelfSchema`.

use crate::error::TreeError;
use crate::types::ValueKind;

/// One declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    /// `None` until the first write fixes the kind of a key declared
    /// without one.
    pub kind: Option<ValueKind>,
    /// Key fields name the lookup key under which branches are registered.
    pub key: bool,
}

/// Ordered, name-unique field declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldDecl>,
    frozen: bool,
}

impl Schema {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fields: Vec::new(),
            frozen: false,
        }
    }

    /// Append an explicit declaration.
    ///
    /// Returns the index of the new field.
    pub fn declare(
        &mut self,
        name: &str,
        kind: Option<ValueKind>,
        key: bool,
    ) -> Result<usize, TreeError> {
        if self.frozen {
            return Err(TreeError::SchemaFrozen(name.to_string()));
        }
        self.append(name, kind, key)
    }

    /// Append a declaration produced by a write, bypassing the freeze.
    pub(crate) fn auto_declare(&mut self, name: &str, kind: ValueKind) -> Result<usize, TreeError> {
        self.append(name, Some(kind), false)
    }

    fn append(
        &mut self,
        name: &str,
        kind: Option<ValueKind>,
        key: bool,
    ) -> Result<usize, TreeError> {
        if self.position(name).is_some() {
            return Err(TreeError::DuplicateField(name.to_string()));
        }
        self.fields.push(FieldDecl {
            name: name.to_string(),
            kind,
            key,
        });
        Ok(self.fields.len() - 1)
    }

    /// Fix the kind of a field declared without one.
    pub(crate) fn pin_kind(&mut self, index: usize, kind: ValueKind) {
        if let Some(field) = self.fields.get_mut(index) {
            field.kind.get_or_insert(kind);
        }
    }

    /// Mark an existing field as a key, or declare a kind-less key.
    ///
    /// Used by the decoder to restore key declarations; ignores the freeze.
    pub(crate) fn ensure_key(&mut self, name: &str) {
        match self.position(name) {
            Some(index) => self.fields[index].key = true,
            None => self.fields.push(FieldDecl {
                name: name.to_string(),
                kind: None,
                key: true,
            }),
        }
    }

    /// Index of the field with the given name.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Declarations in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    /// Names of the key fields in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter(|f| f.key).map(|f| f.name.as_str())
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub(crate) const fn freeze(&mut self) {
        self.frozen = true;
    }
}

/// Schema builder shared by [`SelfSchema`] and [`ChildSchema`].
pub trait DeclareFields {
    fn schema_mut(&mut self) -> &mut Schema;

    fn add_hash(&mut self, name: &str) -> Result<(), TreeError> {
        self.add_field(name, ValueKind::Hash)
    }

    fn add_int(&mut self, name: &str) -> Result<(), TreeError> {
        self.add_field(name, ValueKind::Int)
    }

    fn add_float(&mut self, name: &str) -> Result<(), TreeError> {
        self.add_field(name, ValueKind::Float)
    }

    fn add_bool(&mut self, name: &str) -> Result<(), TreeError> {
        self.add_field(name, ValueKind::Bool)
    }

    fn add_string(&mut self, name: &str) -> Result<(), TreeError> {
        self.add_field(name, ValueKind::String)
    }

    fn add_field(&mut self, name: &str, kind: ValueKind) -> Result<(), TreeError> {
        self.schema_mut().declare(name, Some(kind), false)?;
        Ok(())
    }
}

/// The shape of a sapling's own fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelfSchema(Schema);

impl SelfSchema {
    #[must_use]
    pub const fn new() -> Self {
        Self(Schema::new())
    }

    #[must_use]
    pub const fn as_schema(&self) -> &Schema {
        &self.0
    }
}

impl DeclareFields for SelfSchema {
    fn schema_mut(&mut self) -> &mut Schema {
        &mut self.0
    }
}

/// The shape of the records grown beneath a sapling.
///
/// Created by `DataTree::create_branch_header`. Every branch grown after
/// that starts with a copy of it as its own schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildSchema(Schema);

impl ChildSchema {
    #[must_use]
    pub const fn new() -> Self {
        Self(Schema::new())
    }

    #[must_use]
    pub const fn as_schema(&self) -> &Schema {
        &self.0
    }

    /// Build the self schema of a freshly grown branch.
    #[must_use]
    pub fn instantiate(&self) -> SelfSchema {
        SelfSchema(Schema {
            fields: self.0.fields.to_vec(),
            frozen: false,
        })
    }

    pub(crate) const fn freeze(&mut self) {
        self.0.freeze();
    }
}

impl DeclareFields for ChildSchema {
    fn schema_mut(&mut self) -> &mut Schema {
        &mut self.0
    }
}
