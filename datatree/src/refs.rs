//! Cross-branch reference validation.
//!
//! A reference column stores values that must name an existing branch of
//! another sheet. Sheets are branches of a catalog sapling registered under
//! a sheet key; the referenced branch is looked up by `key` within the
//! target sheet.

use crate::error::TreeError;
use crate::tree::{DataTree, SaplingId};

/// The values collected from one reference column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefCheck {
    /// Name of the referenced sheet.
    pub sheet: String,
    /// Field of the referenced sheet's records that must match.
    pub key: String,
    /// Referenced values, in the order they were read.
    pub values: Vec<String>,
}

impl RefCheck {
    #[must_use]
    pub fn new(sheet: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            sheet: sheet.into(),
            key: key.into(),
            values: Vec::new(),
        }
    }
}

/// A reference that does not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DanglingRef {
    /// The referenced sheet does not exist.
    MissingSheet { sheet: String },
    /// The sheet exists but holds no branch with `key == value`.
    MissingValue {
        sheet: String,
        key: String,
        value: String,
    },
}

impl std::fmt::Display for DanglingRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSheet { sheet } => write!(f, "missing sheet ref: {sheet}"),
            Self::MissingValue { sheet, key, value } => {
                write!(f, "missing ref. Sheet: {sheet} Key: {key} Value: {value}")
            }
        }
    }
}

/// Resolve every check against the sheets beneath `catalog`.
///
/// Dangling references are logged and returned; they do not fail the call.
pub fn check_refs(
    tree: &DataTree,
    catalog: SaplingId,
    sheet_key: &str,
    checks: &[RefCheck],
) -> Result<Vec<DanglingRef>, TreeError> {
    let mut dangling = Vec::new();
    for check in checks {
        let Some(sheet) = tree.get_branch(catalog, sheet_key, check.sheet.as_str())? else {
            tracing::warn!("missing sheet ref: {}", check.sheet);
            dangling.push(DanglingRef::MissingSheet {
                sheet: check.sheet.to_string(),
            });
            continue;
        };
        for value in &check.values {
            if !tree.has_branch(sheet, &check.key, value.as_str())? {
                let missing = DanglingRef::MissingValue {
                    sheet: check.sheet.to_string(),
                    key: check.key.to_string(),
                    value: value.to_string(),
                };
                tracing::warn!("{missing}");
                dangling.push(missing);
            }
        }
    }
    Ok(dangling)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeFactory;

    fn catalog() -> DataTree {
        let mut tree = TreeFactory::default().plant();
        let root = tree.root();
        tree.sapling_mut(root).unwrap().add_key("sheetName").unwrap();
        let items = tree.grow_branch(root).unwrap();
        tree.sapling_mut(items)
            .unwrap()
            .set_hash("sheetName", "Items")
            .unwrap();
        for id in ["sword", "shield"] {
            let row = tree.grow_branch(items).unwrap();
            tree.sapling_mut(row).unwrap().set_hash("id", id).unwrap();
            tree.branch_ready(items, row).unwrap();
        }
        tree.branch_ready(root, items).unwrap();
        tree
    }

    #[test]
    fn test_all_refs_resolve() {
        let tree = catalog();
        let mut check = RefCheck::new("Items", "id");
        check.values = vec!["sword".to_string(), "shield".to_string()];
        let dangling = check_refs(&tree, tree.root(), "sheetName", &[check]).unwrap();
        assert!(dangling.is_empty());
    }

    #[test]
    fn test_missing_value_reported() {
        let tree = catalog();
        let mut check = RefCheck::new("Items", "id");
        check.values = vec!["sword".to_string(), "bow".to_string()];
        let dangling = check_refs(&tree, tree.root(), "sheetName", &[check]).unwrap();
        assert_eq!(
            dangling,
            vec![DanglingRef::MissingValue {
                sheet: "Items".to_string(),
                key: "id".to_string(),
                value: "bow".to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_sheet_reported() {
        let tree = catalog();
        let mut check = RefCheck::new("Spells", "id");
        check.values = vec!["fireball".to_string()];
        let dangling = check_refs(&tree, tree.root(), "sheetName", &[check]).unwrap();
        assert_eq!(
            dangling,
            vec![DanglingRef::MissingSheet {
                sheet: "Spells".to_string()
            }]
        );
        assert_eq!(dangling[0].to_string(), "missing sheet ref: Spells");
    }
}
