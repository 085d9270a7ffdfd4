//! A workbook import builds sheet branches and reports dangling refs.

use crate::e2e_tests::helpers::*;
use crate::refs::DanglingRef;
use crate::tree::TreeFactory;
use crate::types::Value;
use crate::workbook::{WorkbookError, import, parse_workbook};

const WORKBOOK: &str = r#"{
  "sheets": [
    {
      "name": "Items",
      "columns": [
        { "name": "id", "type": "Key" },
        { "name": "price", "type": "Int" },
        { "name": "weight", "type": "Float" }
      ],
      "rows": [
        ["sword", 12, 3.5],
        ["shield", 8, 6.0]
      ]
    },
    {
      "name": "Monsters",
      "columns": [
        { "name": "id", "type": "Key" },
        { "name": "boss", "type": "Bool" },
        { "name": "drop", "type": "Ref(Items,id)" },
        { "name": "tags", "type": "[\"String\"]" },
        { "name": "loot", "type": "[{\"item\": \"Hash\", \"qty\": \"Int\"}]" },
        { "name": "pos", "type": "{\"x\": \"Float\", \"y\": \"Float\"}" },
        { "name": "note", "type": "Decimal" }
      ],
      "rows": [
        ["goblin", false, "sword", ["small", "green"], [{"item": "sword", "qty": 2}], {"x": 1.0, "y": 2.0}, 1],
        ["dragon", "yes", "crown", "[\"huge\"]", [], "{\"x\": 5.0}"]
      ]
    }
  ]
}"#;

#[test]
fn test_import_builds_sheets_and_rows() {
    let book = parse_workbook(WORKBOOK).unwrap();
    let imported = import(&TreeFactory::default(), &book).unwrap();
    let tree = &imported.tree;
    let root = tree.root();

    let items = tree.require_branch(root, "sheetName", "Items").unwrap();
    let sword = tree.require_branch(items, "id", "sword").unwrap();
    let node = tree.sapling(sword).unwrap();
    assert_eq!(node.get("price"), Some(&Value::Int(12)));
    assert_eq!(node.get("weight"), Some(&Value::Float(3.5)));

    let monsters = tree.require_branch(root, "sheetName", "Monsters").unwrap();
    let dragon = tree.require_branch(monsters, "id", "dragon").unwrap();
    assert_eq!(tree.sapling(dragon).unwrap().get("boss"), Some(&Value::Bool(true)));
    assert_eq!(tree.sapling(dragon).unwrap().get("note"), None);
}

#[test]
fn test_import_twigs() {
    let book = parse_workbook(WORKBOOK).unwrap();
    let tree = import(&TreeFactory::default(), &book).unwrap().tree;
    let root = tree.root();
    let monsters = tree.require_branch(root, "sheetName", "Monsters").unwrap();
    let goblin_row = tree.require_branch(monsters, "id", "goblin").unwrap();

    let tags = tree.require_branch(goblin_row, "branchName", "tags").unwrap();
    let leaves = tree.sapling(tags).unwrap().children();
    assert_eq!(leaves.len(), 2);
    assert!(tree.has_branch(tags, "value", "green").unwrap());

    let loot = tree.require_branch(goblin_row, "branchName", "loot").unwrap();
    let entry = tree.require_branch(loot, "item", "sword").unwrap();
    assert_eq!(tree.sapling(entry).unwrap().get("qty"), Some(&Value::Int(2)));

    let pos = tree.require_branch(goblin_row, "branchName", "pos").unwrap();
    assert_eq!(tree.sapling(pos).unwrap().get("y"), Some(&Value::Float(2.0)));
}

#[test]
fn test_import_reports_dangling_refs() {
    let book = parse_workbook(WORKBOOK).unwrap();
    let imported = import(&TreeFactory::default(), &book).unwrap();
    assert_eq!(
        imported.dangling,
        vec![DanglingRef::MissingValue {
            sheet: "Items".to_string(),
            key: "id".to_string(),
            value: "crown".to_string(),
        }]
    );
}

#[test]
fn test_imported_tree_roundtrips() {
    let book = parse_workbook(WORKBOOK).unwrap();
    let tree = import(&TreeFactory::default(), &book).unwrap().tree;
    assert_eq!(roundtrip(&tree), tree);
}

#[test]
fn test_missing_sheet_ref() {
    let json = r#"{"sheets": [{
        "name": "Quests",
        "columns": [{"name": "id", "type": "Key"}, {"name": "reward", "type": "Ref(Rewards,id)"}],
        "rows": [["q1", "gold"]]
    }]}"#;
    let book = parse_workbook(json).unwrap();
    let imported = import(&TreeFactory::default(), &book).unwrap();
    assert_eq!(
        imported.dangling,
        vec![DanglingRef::MissingSheet {
            sheet: "Rewards".to_string()
        }]
    );
}

#[test]
fn test_invalid_cell_is_an_error() {
    let json = r#"{"sheets": [{
        "name": "Items",
        "columns": [{"name": "id", "type": "Key"}, {"name": "price", "type": "Int"}],
        "rows": [["sword", "cheap"]]
    }]}"#;
    let book = parse_workbook(json).unwrap();
    let err = import(&TreeFactory::default(), &book).unwrap_err();
    assert!(matches!(err, WorkbookError::InvalidCell { ref column, .. } if column == "price"));
}

#[test]
fn test_malformed_workbook_json() {
    assert!(matches!(
        parse_workbook("{\"sheets\": 3}"),
        Err(WorkbookError::Json(_))
    ));
}
