//! Error types for equalizer operations

use crate::spec::ColumnType;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EqualizerError>;

#[derive(Error, Debug)]
pub enum EqualizerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Source and target tables are not equalizable: {0}")]
    IncompatibleSchemas(#[from] CompatibilityError),

    #[error("Source and target data are both empty, nothing to reconcile")]
    NoDataToReconcile,

    #[error("Unrecognized {side} data format: expected a JSON array of rows or a JSON object of columns, got {found}")]
    UnrecognizedFormat { side: String, found: String },

    #[error("Malformed table: {message}")]
    MalformedTable { message: String },

    #[error("Value {value} at row {row} does not conform to column '{column}' of type {expected}")]
    TypeMismatch {
        row: usize,
        column: String,
        expected: ColumnType,
        value: String,
    },

    #[error("Unsupported value {value} in key column '{column}' at row {row}")]
    UnsupportedKeyValueType {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Cannot compute a row key hash from an empty key tuple")]
    EmptyDigest,

    #[error("Change control column '{column}' has type {column_type}, which has no ordering")]
    UnsupportedChangeControlType {
        column: String,
        column_type: ColumnType,
    },

    #[error("Internal invariant violated: {message}")]
    InternalInvariant { message: String },

    #[error("Invalid table spec '{name}': {message}")]
    InvalidSpec { name: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Lock error on {}: {}", .path.display(), .message)]
    Lock { path: PathBuf, message: String },

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl EqualizerError {
    pub fn malformed_table(msg: impl Into<String>) -> Self {
        Self::MalformedTable {
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalInvariant {
            message: msg.into(),
        }
    }

    pub fn invalid_spec(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidSpec {
            name: name.into(),
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn lock(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Lock {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// True for failures that indicate a bug in the engine rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::InternalInvariant { .. })
    }

    /// HTTP-style status a service layer should report for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InternalInvariant { .. }
            | Self::Io(_)
            | Self::WalkDir(_)
            | Self::Lock { .. }
            | Self::Generic(_) => 500,
            _ => 400,
        }
    }
}

/// The equalizability rule two table specs failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompatibilityError {
    #[error("key column count does not match: {source_count} != {target_count}")]
    KeyColumnCount {
        source_count: usize,
        target_count: usize,
    },

    #[error("key column '{column}' is not declared in table '{table}'")]
    UnknownKeyColumn { table: String, column: String },

    #[error("key column type does not match at position {position} ('{source_column}' vs '{target_column}'): {source_type} != {target_type}")]
    KeyColumnType {
        position: usize,
        source_column: String,
        target_column: String,
        source_type: ColumnType,
        target_type: ColumnType,
    },

    #[error("change control column presence does not match: {source_column:?} vs {target_column:?}")]
    ChangeControlPresence {
        source_column: Option<String>,
        target_column: Option<String>,
    },

    #[error("change control column '{column}' is not declared in table '{table}'")]
    UnknownChangeControlColumn { table: String, column: String },

    #[error("change control column type does not match: {source_type} != {target_type}")]
    ChangeControlType {
        source_type: ColumnType,
        target_type: ColumnType,
    },
}
