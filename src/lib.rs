//! # equalizer
//!
//! Batch table reconciliation: given a source table, a target table and a
//! spec for each, compute the rows to insert, update and delete in the target
//! so that it matches the source, plus the rows that are already equal.

pub mod cli;
pub mod commands;
pub mod dirlock;
pub mod error;
pub mod hash;
pub mod output;
pub mod partition;
pub mod progress;
pub mod reconcile;
pub mod spec;
pub mod table;
pub mod value;
pub mod workspace;

pub use error::{CompatibilityError, EqualizerError, Result};
pub use reconcile::{reconcile, ReconcileOptions, ReconcileResult, Reconciler};
pub use spec::{ColumnSpec, ColumnType, SpecPair, TableSpec};
pub use table::{ColumnarTable, TableData, TableFormat};
pub use value::Value;
pub use workspace::WorkDir;
