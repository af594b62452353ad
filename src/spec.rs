//! Table and column specifications

use crate::error::{CompatibilityError, EqualizerError, Result};
use crate::table::ColumnarTable;
use crate::value::Value;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Declared type of a column. Dates are carried as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    #[serde(rename = "DATETIME")]
    DateTime,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "STRING",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
            Self::DateTime => "DATETIME",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    /// Widen an integral number read into a FLOAT column to a float, so `5` and `5.0` hash and compare alike.
    pub fn widen(&self, value: Value) -> Value {
        match (self.column_type, value) {
            (ColumnType::Float, Value::Int(i)) => Value::Float(i as f64),
            (_, value) => value,
        }
    }

    /// Whether a non-null value has a kind this column accepts.
    pub fn is_valid_value(&self, value: &Value) -> bool {
        match (self.column_type, value) {
            (ColumnType::String | ColumnType::Date | ColumnType::DateTime, Value::Str(_)) => true,
            (ColumnType::Integer, Value::Int(_)) => true,
            (ColumnType::Float, Value::Float(_)) => true,
            (ColumnType::Boolean, Value::Bool(_)) => true,
            _ => false,
        }
    }

    /// Accepts nulls; fails with `TypeMismatch` for any other non-conforming value.
    pub fn check_value(&self, row: usize, value: &Value) -> Result<()> {
        if value.is_null() || self.is_valid_value(value) {
            Ok(())
        } else {
            Err(EqualizerError::TypeMismatch {
                row,
                column: self.name.clone(),
                expected: self.column_type,
                value: value.to_string(),
            })
        }
    }
}

/// Schema of one side of a reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    pub key_columns: Vec<String>,
    #[serde(
        default,
        deserialize_with = "empty_string_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub change_control_column: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

impl TableSpec {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnSpec>,
        key_columns: Vec<&str>,
        change_control_column: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            key_columns: key_columns.into_iter().map(String::from).collect(),
            change_control_column: change_control_column.map(String::from),
        }
    }

    /// Parse a spec payload, tolerating a leading UTF-8 byte order mark.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let spec: TableSpec = serde_json::from_slice(bytes)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_json_bytes(&bytes).map_err(|e| match e {
            EqualizerError::Json(err) => EqualizerError::config(format!(
                "Cannot parse table spec {}: {}",
                path.display(),
                err
            )),
            other => other,
        })
    }

    /// Structural checks performed once when a spec is loaded.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(EqualizerError::invalid_spec("", "table name cannot be empty"));
        }
        if self.columns.is_empty() {
            return Err(EqualizerError::invalid_spec(
                &self.name,
                "spec must have at least one column",
            ));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if column.name.is_empty() {
                return Err(EqualizerError::invalid_spec(&self.name, "column name cannot be empty"));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(EqualizerError::invalid_spec(
                    &self.name,
                    format!("duplicate column '{}'", column.name),
                ));
            }
        }

        if self.key_columns.is_empty() {
            return Err(EqualizerError::invalid_spec(
                &self.name,
                "spec must have at least one key column",
            ));
        }
        for key in &self.key_columns {
            if self.get_column(key).is_none() {
                return Err(EqualizerError::invalid_spec(
                    &self.name,
                    format!("key column '{}' is not a declared column", key),
                ));
            }
        }

        if let Some(cc) = &self.change_control_column {
            if self.get_column(cc).is_none() {
                return Err(EqualizerError::invalid_spec(
                    &self.name,
                    format!("change control column '{}' is not a declared column", cc),
                ));
            }
        }

        Ok(())
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn is_key_column(&self, name: &str) -> bool {
        self.key_columns.iter().any(|k| k == name)
    }

    /// Key column specs in key order.
    pub fn key_column_specs(&self) -> std::result::Result<Vec<&ColumnSpec>, CompatibilityError> {
        self.key_columns
            .iter()
            .map(|key| {
                self.get_column(key)
                    .ok_or_else(|| CompatibilityError::UnknownKeyColumn {
                        table: self.name.clone(),
                        column: key.clone(),
                    })
            })
            .collect()
    }

    /// The change control column spec, if one is declared.
    pub fn change_control_spec(
        &self,
    ) -> std::result::Result<Option<&ColumnSpec>, CompatibilityError> {
        match &self.change_control_column {
            None => Ok(None),
            Some(name) => self.get_column(name).map(Some).ok_or_else(|| {
                CompatibilityError::UnknownChangeControlColumn {
                    table: self.name.clone(),
                    column: name.clone(),
                }
            }),
        }
    }

    /// Check whether rows of `self` (source) can be reconciled against rows of `other` (target).
    ///
    /// Key columns are compared by position, not by name.
    pub fn equalizable(&self, other: &TableSpec) -> std::result::Result<(), CompatibilityError> {
        if self.key_columns.len() != other.key_columns.len() {
            return Err(CompatibilityError::KeyColumnCount {
                source_count: self.key_columns.len(),
                target_count: other.key_columns.len(),
            });
        }

        let my_keys = self.key_column_specs()?;
        let other_keys = other.key_column_specs()?;
        for (position, (mine, theirs)) in my_keys.iter().zip(other_keys.iter()).enumerate() {
            if mine.column_type != theirs.column_type {
                return Err(CompatibilityError::KeyColumnType {
                    position,
                    source_column: mine.name.clone(),
                    target_column: theirs.name.clone(),
                    source_type: mine.column_type,
                    target_type: theirs.column_type,
                });
            }
        }

        match (self.change_control_spec()?, other.change_control_spec()?) {
            (None, None) => Ok(()),
            (Some(mine), Some(theirs)) => {
                if mine.column_type != theirs.column_type {
                    Err(CompatibilityError::ChangeControlType {
                        source_type: mine.column_type,
                        target_type: theirs.column_type,
                    })
                } else {
                    Ok(())
                }
            }
            _ => Err(CompatibilityError::ChangeControlPresence {
                source_column: self.change_control_column.clone(),
                target_column: other.change_control_column.clone(),
            }),
        }
    }

    pub fn is_equalizable(&self, other: &TableSpec) -> bool {
        self.equalizable(other).is_ok()
    }

    /// One empty column per declared column, in declared order.
    pub fn new_empty_table(&self) -> ColumnarTable {
        let mut table = ColumnarTable::new();
        for column in &self.columns {
            table.insert_column(column.name.clone(), Vec::new());
        }
        table
    }
}

/// Source and target specs of one reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecPair {
    pub source: TableSpec,
    pub target: TableSpec,
}

impl SpecPair {
    pub fn new(source: TableSpec, target: TableSpec) -> Self {
        Self { source, target }
    }

    pub fn from_files(source: &Path, target: &Path) -> Result<Self> {
        Ok(Self {
            source: TableSpec::from_file(source)?,
            target: TableSpec::from_file(target)?,
        })
    }

    pub fn equalizable(&self) -> std::result::Result<(), CompatibilityError> {
        self.source.equalizable(&self.target)
    }
}
