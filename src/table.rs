//! Tabular payload formats and conversion to the canonical columnar form

use crate::error::{EqualizerError, Result};
use crate::spec::TableSpec;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A row keyed by column name, in declared column order.
pub type Row = IndexMap<String, Value>;

/// Top-level shape of a tabular JSON payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// A JSON array of row objects
    Row,
    /// A JSON object mapping column names to arrays of values
    Columnar,
    /// Anything else
    Neither,
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Row => write!(f, "row"),
            Self::Columnar => write!(f, "columnar"),
            Self::Neither => write!(f, "neither"),
        }
    }
}

pub fn detect_format(raw: &serde_json::Value) -> TableFormat {
    match raw {
        serde_json::Value::Array(_) => TableFormat::Row,
        serde_json::Value::Object(_) => TableFormat::Columnar,
        _ => TableFormat::Neither,
    }
}

/// Zero rows in either accepted format. Payloads of any other shape are not empty.
pub fn is_empty(raw: &serde_json::Value) -> bool {
    match raw {
        serde_json::Value::Array(rows) => rows.is_empty(),
        serde_json::Value::Object(columns) => columns.values().all(|values| match values {
            serde_json::Value::Array(values) => values.is_empty(),
            _ => false,
        }),
        _ => false,
    }
}

pub(crate) fn json_kind(raw: &serde_json::Value) -> &'static str {
    match raw {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Canonical table: column name to one value per row, aligned by index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnarTable {
    columns: IndexMap<String, Vec<Value>>,
}

impl ColumnarTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<Value>) {
        self.columns.insert(name.into(), values);
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows, after checking every column holds the same number of entries.
    pub fn row_count(&self) -> Result<usize> {
        let mut columns = self.columns.iter();
        let row_count = match columns.next() {
            Some((_, values)) => values.len(),
            None => return Ok(0),
        };
        for (name, values) in columns {
            if values.len() != row_count {
                return Err(EqualizerError::malformed_table(format!(
                    "column '{}' has {} rows, expected {}",
                    name,
                    values.len(),
                    row_count
                )));
            }
        }
        Ok(row_count)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.values().all(Vec::is_empty)
    }

    /// Check every non-null value of every declared column against its type.
    pub fn validate_against(&self, spec: &TableSpec) -> Result<()> {
        for column in &spec.columns {
            if let Some(values) = self.columns.get(&column.name) {
                for (row, value) in values.iter().enumerate() {
                    column.check_value(row, value)?;
                }
            }
        }
        Ok(())
    }

    /// Gather `indices` into a new table with the spec's columns in declared order.
    pub fn project(&self, spec: &TableSpec, indices: &[usize]) -> ColumnarTable {
        let mut projected = ColumnarTable::new();
        for column in &spec.columns {
            let values = match self.columns.get(&column.name) {
                Some(source) => indices
                    .iter()
                    .map(|&i| source.get(i).cloned().unwrap_or(Value::Null))
                    .collect(),
                None => vec![Value::Null; indices.len()],
            };
            projected.insert_column(column.name.clone(), values);
        }
        projected
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .columns
            .iter()
            .map(|(name, values)| {
                (
                    name.clone(),
                    serde_json::Value::Array(values.iter().map(Value::to_json).collect()),
                )
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Narrow one JSON cell, reporting nested values against the column they sit in.
fn cell_value(spec: &TableSpec, column: &str, row: usize, raw: &serde_json::Value) -> Result<Value> {
    if let Some(value) = Value::from_json(raw) {
        return Ok(match spec.get_column(column) {
            Some(declared) => declared.widen(value),
            None => value,
        });
    }
    if spec.is_key_column(column) {
        return Err(EqualizerError::UnsupportedKeyValueType {
            row,
            column: column.to_string(),
            value: json_kind(raw).to_string(),
        });
    }
    match spec.get_column(column) {
        Some(declared) => Err(EqualizerError::TypeMismatch {
            row,
            column: column.to_string(),
            expected: declared.column_type,
            value: json_kind(raw).to_string(),
        }),
        None => Err(EqualizerError::malformed_table(format!(
            "column '{}' holds a nested {} at row {}",
            column,
            json_kind(raw),
            row
        ))),
    }
}

/// Convert a raw payload of the given format into canonical columnar form.
///
/// Row payloads are type-checked cell by cell as they are transposed. Columnar
/// payloads are only shape-checked here; callers validate them with
/// [`ColumnarTable::validate_against`].
pub fn to_canonical(spec: &TableSpec, raw: &serde_json::Value, format: TableFormat) -> Result<ColumnarTable> {
    match format {
        TableFormat::Row => rows_to_columns(spec, raw),
        TableFormat::Columnar => json_to_columns(spec, raw),
        TableFormat::Neither => Err(EqualizerError::UnrecognizedFormat {
            side: spec.name.clone(),
            found: json_kind(raw).to_string(),
        }),
    }
}

fn rows_to_columns(spec: &TableSpec, raw: &serde_json::Value) -> Result<ColumnarTable> {
    let rows = raw
        .as_array()
        .ok_or_else(|| EqualizerError::malformed_table("data is not in row format"))?;
    let row_count = rows.len();

    // declared columns in order of first appearance across rows
    let mut order: Vec<&str> = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let fields = row
            .as_object()
            .ok_or_else(|| EqualizerError::malformed_table(format!("row {} is not an object", i)))?;
        for field in fields.keys() {
            if spec.get_column(field).is_some() && !order.contains(&field.as_str()) {
                order.push(field.as_str());
            }
        }
    }
    for column in spec.column_names() {
        if !order.contains(&column) {
            order.push(column);
        }
    }

    let mut columns: IndexMap<String, Vec<Value>> = order
        .iter()
        .map(|name| (name.to_string(), vec![Value::Null; row_count]))
        .collect();

    for (i, row) in rows.iter().enumerate() {
        // checked above
        let Some(fields) = row.as_object() else { continue };
        for (field, raw_value) in fields {
            let Some(column) = spec.get_column(field) else {
                continue;
            };
            let value = cell_value(spec, field, i, raw_value)?;
            column.check_value(i, &value)?;
            if let Some(slots) = columns.get_mut(field.as_str()) {
                slots[i] = value;
            }
        }
    }

    Ok(ColumnarTable { columns })
}

fn json_to_columns(spec: &TableSpec, raw: &serde_json::Value) -> Result<ColumnarTable> {
    let object = raw
        .as_object()
        .ok_or_else(|| EqualizerError::malformed_table("data is not in column format"))?;

    let mut table = ColumnarTable::new();
    for (name, values) in object {
        if spec.get_column(name).is_none() {
            log::debug!("ignoring undeclared column '{}' of table '{}'", name, spec.name);
            continue;
        }
        let values = values.as_array().ok_or_else(|| {
            EqualizerError::malformed_table(format!(
                "data is not in column format: column '{}' is not an array",
                name
            ))
        })?;
        let cells = values
            .iter()
            .enumerate()
            .map(|(row, raw_value)| cell_value(spec, name, row, raw_value))
            .collect::<Result<Vec<_>>>()?;
        table.insert_column(name.clone(), cells);
    }

    let row_count = table.row_count()?;
    for column in &spec.columns {
        if table.column(&column.name).is_some() {
            continue;
        }
        if spec.is_key_column(&column.name) {
            return Err(EqualizerError::malformed_table(format!(
                "key column '{}' is missing from the data of table '{}'",
                column.name, spec.name
            )));
        }
        table.insert_column(column.name.clone(), vec![Value::Null; row_count]);
    }

    Ok(table)
}

/// Inverse of the row conversion: one object per row covering every declared column.
pub fn from_canonical(spec: &TableSpec, table: &ColumnarTable) -> Result<Vec<Row>> {
    let row_count = table.row_count()?;
    let columns: Vec<(&str, Option<&[Value]>)> = spec
        .column_names()
        .map(|name| (name, table.column(name)))
        .collect();

    let rows = (0..row_count)
        .map(|i| {
            columns
                .iter()
                .map(|(name, values)| {
                    let value = values
                        .and_then(|values| values.get(i))
                        .cloned()
                        .unwrap_or(Value::Null);
                    (name.to_string(), value)
                })
                .collect()
        })
        .collect();
    Ok(rows)
}

/// A reconciliation output table in one of the two wire encodings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TableData {
    Rows(Vec<Row>),
    Columns(ColumnarTable),
}

impl TableData {
    /// Encode a canonical table in `format`. `Neither` falls back to columnar.
    pub fn encode(spec: &TableSpec, table: ColumnarTable, format: TableFormat) -> Result<Self> {
        match format {
            TableFormat::Row => Ok(Self::Rows(from_canonical(spec, &table)?)),
            TableFormat::Columnar | TableFormat::Neither => Ok(Self::Columns(table)),
        }
    }

    /// An empty table in `format` shaped after `spec`.
    pub fn empty(spec: &TableSpec, format: TableFormat) -> Self {
        match format {
            TableFormat::Row => Self::Rows(Vec::new()),
            TableFormat::Columnar | TableFormat::Neither => Self::Columns(spec.new_empty_table()),
        }
    }

    pub fn format(&self) -> TableFormat {
        match self {
            Self::Rows(_) => TableFormat::Row,
            Self::Columns(_) => TableFormat::Columnar,
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            Self::Rows(rows) => rows.len(),
            Self::Columns(table) => table
                .columns
                .values()
                .next()
                .map(Vec::len)
                .unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Rows(rows) => serde_json::Value::Array(
                rows.iter()
                    .map(|row| {
                        serde_json::Value::Object(
                            row.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
                        )
                    })
                    .collect(),
            ),
            Self::Columns(table) => table.to_json(),
        }
    }
}
