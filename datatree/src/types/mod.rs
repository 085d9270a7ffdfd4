//! Scalar types shared by saplings, the codec and the importer.

mod value;

pub use value::{Value, ValueKind};

/// The (key, value) pair under which a parent registered one of its branches.
///
/// The value is kept in its rendered text form, which is what the wire
/// format stores next to each child record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupPair {
    pub key: String,
    pub value: String,
}

impl LookupPair {
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for LookupPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}
