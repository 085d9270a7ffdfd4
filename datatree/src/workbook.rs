//! Workbook import.
//!
//! Builds a tree from a JSON workbook export: one branch per sheet,
//! registered under `sheetName`, and one record per row beneath it. Column
//! types come from the sheet's `columns` list:
//!
//! - `Key`, `Hash`, `Int`, `Float`, `Bool`, `String` (or lower case)
//! - `Ref(Sheet,key)`: stored as a hash, checked against `Sheet` afterwards
//! - `[type]` or `[{"field": "type", ...}]`: a list twig beneath the row
//! - `{"field": "type", ...}`: a tree twig beneath the row
//!
//! Twigs are registered under `branchName`, which holds the column name.

use serde::Deserialize;
use serde_json::Value as Cell;

use crate::constants::{BRANCH_NAME_KEY, LIST_VALUE_FIELD, SHEET_NAME_KEY};
use crate::error::TreeError;
use crate::refs::{self, DanglingRef, RefCheck};
use crate::schema::{DeclareFields, SelfSchema};
use crate::tree::{DataTree, SaplingId, TreeFactory};
use crate::types::Value;

/// A workbook export.
#[derive(Debug, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Errors that can occur while importing a workbook.
#[derive(Debug)]
pub enum WorkbookError {
    /// The workbook or an embedded cell is not valid JSON.
    Json(serde_json::Error),
    /// Building the tree failed.
    Tree(TreeError),
    /// A cell cannot be stored in its column's type.
    InvalidCell {
        sheet: String,
        column: String,
        message: String,
    },
}

impl std::fmt::Display for WorkbookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(e) => write!(f, "invalid workbook JSON: {e}"),
            Self::Tree(e) => write!(f, "tree error: {e}"),
            Self::InvalidCell {
                sheet,
                column,
                message,
            } => write!(f, "invalid cell in sheet {sheet} column {column}: {message}"),
        }
    }
}

impl std::error::Error for WorkbookError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            Self::Tree(e) => Some(e),
            Self::InvalidCell { .. } => None,
        }
    }
}

impl From<serde_json::Error> for WorkbookError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<TreeError> for WorkbookError {
    fn from(e: TreeError) -> Self {
        Self::Tree(e)
    }
}

/// Scalar column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scalar {
    Key,
    Hash,
    Int,
    Float,
    Bool,
    String,
}

impl Scalar {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "Key" | "key" => Some(Self::Key),
            "Hash" | "hash" => Some(Self::Hash),
            "Int" | "int" => Some(Self::Int),
            "Float" | "float" => Some(Self::Float),
            "Bool" | "bool" => Some(Self::Bool),
            "String" | "string" => Some(Self::String),
            _ => None,
        }
    }

    fn declare(self, header: &mut impl DeclareFields, name: &str) -> Result<(), TreeError> {
        match self {
            Self::Key | Self::Hash => header.add_hash(name),
            Self::Int => header.add_int(name),
            Self::Float => header.add_float(name),
            Self::Bool => header.add_bool(name),
            Self::String => header.add_string(name),
        }
    }
}

/// A record header embedded in a column type: ordered (field, type) pairs.
type RecordHeader = Vec<(String, Scalar)>;

#[derive(Debug, Clone, PartialEq)]
enum ListOf {
    Scalar(Scalar),
    Record(RecordHeader),
}

#[derive(Debug, Clone, PartialEq)]
enum ColumnType {
    Scalar(Scalar),
    Ref { sheet: String, key: String },
    List(ListOf),
    Tree(RecordHeader),
}

impl ColumnType {
    /// Parse a column type. Unknown types are logged and yield `None`.
    fn parse(type_name: &str) -> Option<Self> {
        if let Some(inner) = type_name
            .strip_prefix("Ref(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let mut parts = inner.split(',').map(str::trim);
            if let (Some(sheet), Some(key)) = (parts.next(), parts.next()) {
                return Some(Self::Ref {
                    sheet: sheet.to_string(),
                    key: key.to_string(),
                });
            }
            tracing::warn!("malformed ref type: {type_name}");
            return None;
        }

        if type_name.starts_with('[') {
            let parsed: Result<Vec<Cell>, _> = serde_json::from_str(type_name);
            return match parsed.ok().and_then(|items| items.into_iter().next()) {
                Some(Cell::String(name)) => Scalar::parse(&name).map(|s| Self::List(ListOf::Scalar(s))),
                Some(Cell::Object(map)) => Some(Self::List(ListOf::Record(record_header(&map)))),
                _ => {
                    tracing::warn!("malformed list type: {type_name}");
                    None
                }
            };
        }

        if type_name.starts_with('{') {
            return match serde_json::from_str::<serde_json::Map<String, Cell>>(type_name) {
                Ok(map) => Some(Self::Tree(record_header(&map))),
                Err(_) => {
                    tracing::warn!("malformed tree type: {type_name}");
                    None
                }
            };
        }

        let parsed = Scalar::parse(type_name).map(Self::Scalar);
        if parsed.is_none() {
            tracing::warn!("unrecognized header type: {type_name}");
        }
        parsed
    }

    const fn is_twig(&self) -> bool {
        matches!(self, Self::List(_) | Self::Tree(_))
    }
}

fn record_header(map: &serde_json::Map<String, Cell>) -> RecordHeader {
    map.iter()
        .filter_map(|(field, ty)| {
            let scalar = ty.as_str().and_then(Scalar::parse);
            if scalar.is_none() {
                tracing::warn!("subtree field {field} has unsupported type {ty}");
            }
            scalar.map(|s| (field.to_string(), s))
        })
        .collect()
}

/// Result of a workbook import.
#[derive(Debug)]
pub struct Import {
    pub tree: DataTree,
    /// References that did not resolve. The tree is still complete.
    pub dangling: Vec<DanglingRef>,
}

/// Parse a workbook from JSON text.
pub fn parse_workbook(json: &str) -> Result<Workbook, WorkbookError> {
    Ok(serde_json::from_str(json)?)
}

/// Build a tree from a workbook and validate its references.
pub fn import(factory: &TreeFactory, workbook: &Workbook) -> Result<Import, WorkbookError> {
    let mut tree = factory.plant();
    let root = tree.root();
    tree.sapling_mut(root)?.add_key(SHEET_NAME_KEY)?;

    let mut checks = Vec::new();
    for sheet in &workbook.sheets {
        let columns: Vec<(&Column, Option<ColumnType>)> = sheet
            .columns
            .iter()
            .map(|column| (column, ColumnType::parse(&column.type_name)))
            .collect();
        let mut importer = SheetImporter {
            tree: &mut tree,
            sheet,
            checks: Vec::new(),
        };
        importer.grow(root, &columns)?;
        checks.append(&mut importer.checks);
    }

    let dangling = refs::check_refs(&tree, root, SHEET_NAME_KEY, &checks)?;
    Ok(Import { tree, dangling })
}

struct SheetImporter<'a> {
    tree: &'a mut DataTree,
    sheet: &'a Sheet,
    checks: Vec<RefCheck>,
}

type Columns<'a> = [(&'a Column, Option<ColumnType>)];

impl SheetImporter<'_> {
    fn grow(&mut self, root: SaplingId, columns: &Columns<'_>) -> Result<(), WorkbookError> {
        let sheet = self.sheet;
        let main = self.tree.grow_branch(root)?;
        let branch = self.tree.sapling_mut(main)?;
        for (column, ty) in columns {
            if *ty == Some(ColumnType::Scalar(Scalar::Key)) {
                branch.add_key(&column.name)?;
            }
        }
        declare_hash_once(branch.schema_mut(), SHEET_NAME_KEY)?;
        branch.set_hash(SHEET_NAME_KEY, &sheet.name)?;
        self.tree.branch_ready(root, main)?;

        let header = self.tree.create_branch_header(main)?;
        for (column, ty) in columns {
            match ty {
                Some(ColumnType::Scalar(scalar)) => scalar.declare(header, &column.name)?,
                Some(ColumnType::Ref { sheet, key }) => {
                    header.add_hash(&column.name)?;
                    self.checks.push(RefCheck::new(sheet.as_str(), key.as_str()));
                }
                Some(ColumnType::List(_) | ColumnType::Tree(_)) | None => {}
            }
        }

        let has_twigs = columns
            .iter()
            .any(|(_, ty)| ty.as_ref().is_some_and(ColumnType::is_twig));
        for cells in &sheet.rows {
            let row = self.tree.grow_branch(main)?;
            if has_twigs {
                self.tree.sapling_mut(row)?.add_key(BRANCH_NAME_KEY)?;
            }
            self.fill_row(row, columns, cells)?;
            self.tree.branch_ready(main, row)?;
        }
        tracing::info!(
            "imported sheet {} with {} rows",
            sheet.name,
            sheet.rows.len()
        );
        Ok(())
    }

    fn fill_row(
        &mut self,
        row: SaplingId,
        columns: &Columns<'_>,
        cells: &[Cell],
    ) -> Result<(), WorkbookError> {
        // Ref columns map to this sheet's checks in column order.
        let mut check_index = 0;
        for (index, (column, ty)) in columns.iter().enumerate() {
            let cell = cells.get(index).unwrap_or(&Cell::Null);
            match ty {
                Some(ColumnType::Scalar(scalar)) => {
                    self.set_cell(row, *scalar, &column.name, cell)?;
                }
                Some(ColumnType::Ref { .. }) => {
                    if self.set_cell(row, Scalar::Hash, &column.name, cell)? {
                        let held = self.tree.sapling(row)?.get(&column.name);
                        if let (Some(Value::Hash(text)), Some(check)) =
                            (held, self.checks.get_mut(check_index))
                        {
                            check.values.push(text.to_string());
                        }
                    }
                    check_index += 1;
                }
                Some(ColumnType::Tree(header)) => {
                    let blob = self.parse_blob(&column.name, cell)?;
                    let twig = self.grow_twig(row, &column.name, header)?;
                    if let Some(Cell::Object(map)) = &blob {
                        self.fill_record(twig, header, map)?;
                    }
                    self.tree.branch_ready(row, twig)?;
                }
                Some(ColumnType::List(of)) => {
                    let blob = self.parse_blob(&column.name, cell)?;
                    let twig = self.grow_twig(row, &column.name, &[])?;
                    let leaf_header = self.tree.create_branch_header(twig)?;
                    match of {
                        ListOf::Scalar(scalar) => scalar.declare(leaf_header, LIST_VALUE_FIELD)?,
                        ListOf::Record(header) => {
                            for (field, scalar) in header {
                                scalar.declare(leaf_header, field)?;
                            }
                        }
                    }
                    let items = match blob {
                        Some(Cell::Array(items)) => items,
                        Some(_) | None => Vec::new(),
                    };
                    for item in &items {
                        let leaf = self.tree.grow_branch(twig)?;
                        match (of, item) {
                            (ListOf::Scalar(scalar), _) => {
                                self.set_cell(leaf, *scalar, LIST_VALUE_FIELD, item)?;
                            }
                            (ListOf::Record(header), Cell::Object(map)) => {
                                self.fill_record(leaf, header, map)?;
                            }
                            (ListOf::Record(_), _) => {
                                return Err(self.invalid(&column.name, "list element is not an object"));
                            }
                        }
                        self.tree.branch_ready(twig, leaf)?;
                    }
                    self.tree.branch_ready(row, twig)?;
                }
                None => {}
            }
        }
        Ok(())
    }

    fn grow_twig(
        &mut self,
        row: SaplingId,
        name: &str,
        header: &[(String, Scalar)],
    ) -> Result<SaplingId, WorkbookError> {
        let twig = self.tree.grow_branch(row)?;
        let branch = self.tree.sapling_mut(twig)?;
        declare_hash_once(branch.schema_mut(), BRANCH_NAME_KEY)?;
        for (field, scalar) in header {
            if field != BRANCH_NAME_KEY {
                scalar.declare(branch.schema_mut(), field)?;
            }
        }
        branch.set_hash(BRANCH_NAME_KEY, name)?;
        Ok(twig)
    }

    fn fill_record(
        &mut self,
        id: SaplingId,
        header: &RecordHeader,
        map: &serde_json::Map<String, Cell>,
    ) -> Result<(), WorkbookError> {
        for (field, scalar) in header {
            if let Some(cell) = map.get(field) {
                self.set_cell(id, *scalar, field, cell)?;
            }
        }
        Ok(())
    }

    /// Twig cells hold JSON directly or as text.
    fn parse_blob(&self, column: &str, cell: &Cell) -> Result<Option<Cell>, WorkbookError> {
        match cell {
            Cell::Null => {
                tracing::warn!("empty subtree in sheet {} column {column}", self.sheet.name);
                Ok(None)
            }
            Cell::String(text) => serde_json::from_str(text)
                .map(Some)
                .map_err(|e| self.invalid(column, &e.to_string())),
            other => Ok(Some(other.clone())),
        }
    }

    /// Store one cell. Returns whether a value was written.
    fn set_cell(
        &mut self,
        id: SaplingId,
        scalar: Scalar,
        field: &str,
        cell: &Cell,
    ) -> Result<bool, WorkbookError> {
        let value = match scalar {
            Scalar::Key | Scalar::Hash => match cell_text(cell) {
                Some(text) => Value::Hash(text),
                None => {
                    tracing::warn!("empty hash in sheet {} column {field}", self.sheet.name);
                    return Ok(false);
                }
            },
            Scalar::String => Value::String(cell_text(cell).unwrap_or_default()),
            Scalar::Int => Value::Int(self.cell_int(field, cell)?),
            Scalar::Float => match cell {
                Cell::Null => Value::Float(0.0),
                #[allow(clippy::cast_possible_truncation)]
                Cell::Number(n) => Value::Float(n.as_f64().unwrap_or_default() as f32),
                _ => return Err(self.invalid(field, "expected a number")),
            },
            Scalar::Bool => Value::Bool(self.cell_bool(field, cell)),
        };
        self.tree.sapling_mut(id)?.set(field, value)?;
        Ok(true)
    }

    fn cell_int(&self, field: &str, cell: &Cell) -> Result<i32, WorkbookError> {
        let Cell::Number(n) = cell else {
            return match cell {
                Cell::Null => Ok(0),
                _ => Err(self.invalid(field, "expected a number")),
            };
        };
        if let Some(i) = n.as_i64() {
            return i32::try_from(i).map_err(|_| self.invalid(field, "integer out of range"));
        }
        let f = n.as_f64().unwrap_or_default();
        tracing::warn!("integer cell has unexpected value {f}");
        if f.is_finite() && f >= f64::from(i32::MIN) && f <= f64::from(i32::MAX) {
            #[allow(clippy::cast_possible_truncation)]
            let truncated = f as i32;
            Ok(truncated)
        } else {
            Err(self.invalid(field, "integer out of range"))
        }
    }

    #[allow(clippy::float_cmp)]
    fn cell_bool(&self, field: &str, cell: &Cell) -> bool {
        match cell {
            Cell::Bool(b) => *b,
            Cell::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Cell::String(s) => match s.as_str() {
                "true" | "TRUE" => true,
                "false" | "FALSE" | "" => false,
                other => {
                    tracing::warn!(
                        "boolean cell in sheet {} column {field} has unexpected string {other}, treated as 'true'",
                        self.sheet.name
                    );
                    true
                }
            },
            Cell::Null | Cell::Array(_) | Cell::Object(_) => false,
        }
    }

    fn invalid(&self, column: &str, message: &str) -> WorkbookError {
        WorkbookError::InvalidCell {
            sheet: self.sheet.name.to_string(),
            column: column.to_string(),
            message: message.to_string(),
        }
    }
}

/// Declare `name` as a hash unless the schema already has it.
fn declare_hash_once(schema: &mut SelfSchema, name: &str) -> Result<(), TreeError> {
    if schema.as_schema().get(name).is_some() {
        return Ok(());
    }
    schema.add_hash(name)
}

/// Text of a hash or string cell. Numbers and booleans are rendered.
fn cell_text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::String(s) => Some(s.to_string()),
        Cell::Number(n) => Some(n.to_string()),
        Cell::Bool(b) => Some(b.to_string()),
        Cell::Null | Cell::Array(_) | Cell::Object(_) => None,
    }
}
