//! Sapling records.
//!
//! A sapling is one node of a data tree: a schema-typed set of scalar
//! fields plus the handles of the branches grown beneath it. Saplings are
//! owned by their [`DataTree`](crate::DataTree); structural operations
//! (growing, readiness, lookup) go through the tree, field writes go
//! through `DataTree::sapling_mut`.

use crate::config::TreeConfig;
use crate::error::TreeError;
use crate::schema::{ChildSchema, DeclareFields, SelfSchema};
use crate::tree::SaplingId;
use crate::types::{LookupPair, Value};

/// One node of a data tree.
#[derive(Debug)]
pub struct Sapling {
    pub(crate) schema: SelfSchema,
    /// Parallel to `schema`; `None` for declared fields never written.
    pub(crate) values: Vec<Option<Value>>,
    pub(crate) child_schema: Option<ChildSchema>,
    pub(crate) children: Vec<SaplingId>,
    pub(crate) parent: Option<SaplingId>,
    pub(crate) ready: bool,
    pub(crate) lookup: Option<LookupPair>,
    policy: TreeConfig,
}

impl Sapling {
    pub(crate) const fn new(
        schema: SelfSchema,
        parent: Option<SaplingId>,
        policy: TreeConfig,
    ) -> Self {
        Self {
            schema,
            values: Vec::new(),
            child_schema: None,
            children: Vec::new(),
            parent,
            ready: false,
            lookup: None,
            policy,
        }
    }

    pub fn set_hash(&mut self, key: &str, value: &str) -> Result<(), TreeError> {
        self.set(key, Value::Hash(value.to_string()))
    }

    pub fn set_int(&mut self, key: &str, value: i32) -> Result<(), TreeError> {
        self.set(key, Value::Int(value))
    }

    pub fn set_float(&mut self, key: &str, value: f32) -> Result<(), TreeError> {
        self.set(key, Value::Float(value))
    }

    pub fn set_bool(&mut self, key: &str, value: bool) -> Result<(), TreeError> {
        self.set(key, Value::Bool(value))
    }

    pub fn set_string(&mut self, key: &str, value: &str) -> Result<(), TreeError> {
        self.set(key, Value::String(value.to_string()))
    }

    /// Write a field.
    ///
    /// # Errors
    ///
    /// - `TypeMismatch` if the field was declared or first written with
    ///   another kind
    /// - `UnknownField` if the field is undeclared and auto-declaration is off
    /// - `ValueTooLong` if the name or text exceeds `max_string_len`
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), TreeError> {
        let max = self.policy.max_string_len;
        let text_len = value.as_text().map_or(0, str::len);
        if key.len() > max || text_len > max {
            return Err(TreeError::ValueTooLong {
                field: key.to_string(),
                len: key.len().max(text_len),
                max,
            });
        }

        let schema = self.schema.schema_mut();
        let index = match schema.position(key) {
            Some(index) => {
                match schema.fields()[index].kind {
                    Some(declared) if declared != value.kind() => {
                        return Err(TreeError::TypeMismatch {
                            field: key.to_string(),
                            declared,
                            actual: value.kind(),
                        });
                    }
                    Some(_) => {}
                    None => schema.pin_kind(index, value.kind()),
                }
                index
            }
            None if self.policy.auto_declare => schema.auto_declare(key, value.kind())?,
            None => return Err(TreeError::UnknownField(key.to_string())),
        };

        if self.values.len() < schema.len() {
            self.values.resize(schema.len(), None);
        }
        tracing::trace!("set {key} = {value}");
        self.values[index] = Some(value);
        self.mark_written();
        Ok(())
    }

    /// Declare a key field on this sapling's own schema.
    ///
    /// The kind is fixed by the first write. Branches of this sapling are
    /// registered under the first key they hold a value for.
    pub fn add_key(&mut self, key: &str) -> Result<(), TreeError> {
        self.schema.schema_mut().declare(key, None, true)?;
        Ok(())
    }

    /// Builder for this sapling's own fields.
    pub const fn schema_mut(&mut self) -> &mut SelfSchema {
        &mut self.schema
    }

    /// Freeze the own schema once the sapling holds data.
    pub(crate) fn mark_written(&mut self) {
        if self.policy.strict_schema {
            self.schema.schema_mut().freeze();
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        let index = self.schema.as_schema().position(key)?;
        self.values.get(index)?.as_ref()
    }

    /// Written fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema
            .as_schema()
            .fields()
            .iter()
            .zip(self.values.iter())
            .filter_map(|(decl, value)| value.as_ref().map(|v| (decl.name.as_str(), v)))
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// The first of `keys` this sapling holds a value for.
    pub(crate) fn lookup_pair_for<'a>(
        &self,
        mut keys: impl Iterator<Item = &'a str>,
    ) -> Option<LookupPair> {
        keys.find_map(|key| {
            self.get(key)
                .map(|value| LookupPair::new(key, value.to_lookup_string()))
        })
    }

    #[must_use]
    pub const fn schema(&self) -> &SelfSchema {
        &self.schema
    }

    #[must_use]
    pub fn children(&self) -> &[SaplingId] {
        &self.children
    }

    #[must_use]
    pub const fn parent(&self) -> Option<SaplingId> {
        self.parent
    }

    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// The pair the parent registered this branch under.
    #[must_use]
    pub const fn lookup(&self) -> Option<&LookupPair> {
        self.lookup.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueKind;

    fn sapling(policy: TreeConfig) -> Sapling {
        Sapling::new(SelfSchema::new(), None, policy)
    }

    #[test]
    fn test_auto_declare_on_write() {
        let mut node = sapling(TreeConfig::default());
        node.set_string("name", "Goblin").unwrap();
        node.set_int("hp", 7).unwrap();
        assert_eq!(node.get("name"), Some(&Value::String("Goblin".to_string())));
        assert_eq!(node.get("hp"), Some(&Value::Int(7)));
        assert_eq!(node.field_count(), 2);
    }

    #[test]
    fn test_unknown_field_without_auto_declare() {
        let mut node = sapling(TreeConfig {
            auto_declare: false,
            ..TreeConfig::default()
        });
        assert!(matches!(
            node.set_int("hp", 1),
            Err(TreeError::UnknownField(name)) if name == "hp"
        ));
    }

    #[test]
    fn test_type_mismatch_keeps_old_value() {
        let mut node = sapling(TreeConfig::default());
        node.set_int("hp", 7).unwrap();
        let result = node.set_float("hp", 7.5);
        assert!(matches!(
            result,
            Err(TreeError::TypeMismatch {
                declared: ValueKind::Int,
                actual: ValueKind::Float,
                ..
            })
        ));
        assert_eq!(node.get("hp"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_overwrite_same_kind() {
        let mut node = sapling(TreeConfig::default());
        node.set_int("hp", 7).unwrap();
        node.set_int("hp", 3).unwrap();
        assert_eq!(node.get("hp"), Some(&Value::Int(3)));
        assert_eq!(node.field_count(), 1);
    }

    #[test]
    fn test_key_kind_pinned_by_first_write() {
        let mut node = sapling(TreeConfig::default());
        node.add_key("id").unwrap();
        assert_eq!(node.get("id"), None);
        node.set_hash("id", "goblin").unwrap();
        assert!(matches!(
            node.set_int("id", 1),
            Err(TreeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_add_key_shares_duplicate_validation() {
        let mut node = sapling(TreeConfig::default());
        node.schema_mut().add_hash("id").unwrap();
        assert!(matches!(
            node.add_key("id"),
            Err(TreeError::DuplicateField(_))
        ));
    }

    #[test]
    fn test_strict_schema_freezes_on_first_write() {
        let mut node = sapling(TreeConfig::default());
        node.schema_mut().add_string("name").unwrap();
        node.set_string("name", "Goblin").unwrap();
        assert!(matches!(
            node.schema_mut().add_int("hp"),
            Err(TreeError::SchemaFrozen(_))
        ));
        assert!(matches!(node.add_key("id"), Err(TreeError::SchemaFrozen(_))));
        // Writes still auto-declare.
        node.set_int("hp", 7).unwrap();
    }

    #[test]
    fn test_relaxed_schema_stays_open() {
        let mut node = sapling(TreeConfig {
            strict_schema: false,
            ..TreeConfig::default()
        });
        node.set_string("name", "Goblin").unwrap();
        node.add_key("id").unwrap();
        node.schema_mut().add_int("hp").unwrap();
    }

    #[test]
    fn test_fields_in_declaration_order() {
        let mut node = sapling(TreeConfig::default());
        node.schema_mut().add_string("name").unwrap();
        node.schema_mut().add_int("hp").unwrap();
        node.set_int("hp", 7).unwrap();
        node.set_string("name", "Goblin").unwrap();
        let names: Vec<&str> = node.fields().map(|(name, _)| name).collect();
        assert_eq!(names, ["name", "hp"]);
    }

    #[test]
    fn test_value_too_long() {
        let mut node = sapling(TreeConfig {
            max_string_len: 4,
            ..TreeConfig::default()
        });
        node.set_string("name", "Gob").unwrap();
        assert!(matches!(
            node.set_string("name", "Goblin"),
            Err(TreeError::ValueTooLong { len: 6, max: 4, .. })
        ));
    }
}
