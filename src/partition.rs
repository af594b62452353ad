//! Hash partitioning and per-partition row matching

use crate::error::{EqualizerError, Result};
use crate::hash::RowKeyHasher;
use crate::spec::{ColumnSpec, ColumnType, TableSpec};
use crate::table::ColumnarTable;
use crate::value::Value;
use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use serde::Serialize;

/// Row-key hash to the indices of the rows sharing it, in first-seen order.
pub type PartitionMap = IndexMap<u64, Vec<usize>>;

/// A spec column paired with its values in a canonical table.
#[derive(Debug, Clone, Copy)]
struct BoundColumn<'a> {
    spec: &'a ColumnSpec,
    values: &'a [Value],
}

impl<'a> BoundColumn<'a> {
    fn bind(spec: &'a ColumnSpec, table: &'a ColumnarTable, table_name: &str) -> Result<Self> {
        let values = table.column(&spec.name).ok_or_else(|| {
            EqualizerError::malformed_table(format!(
                "column '{}' is missing from the data of table '{}'",
                spec.name, table_name
            ))
        })?;
        Ok(Self { spec, values })
    }

    /// Read a value, checking it against the declared type.
    fn get(&self, row: usize) -> Result<&'a Value> {
        let value = self.values.get(row).ok_or_else(|| {
            EqualizerError::malformed_table(format!(
                "row index {} out of bounds for column '{}' ({} rows)",
                row,
                self.spec.name,
                self.values.len()
            ))
        })?;
        self.spec.check_value(row, value)?;
        Ok(value)
    }
}

/// Key columns of one table, resolved once and read per row.
#[derive(Debug, Clone)]
pub struct KeyColumns<'a> {
    columns: Vec<BoundColumn<'a>>,
}

impl<'a> KeyColumns<'a> {
    pub fn resolve(spec: &'a TableSpec, table: &'a ColumnarTable) -> Result<Self> {
        let columns = spec
            .key_column_specs()?
            .into_iter()
            .map(|column| BoundColumn::bind(column, table, &spec.name))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_type(&self, position: usize) -> Option<ColumnType> {
        self.columns.get(position).map(|c| c.spec.column_type)
    }

    pub fn value(&self, position: usize, row: usize) -> Result<&'a Value> {
        let column = self.columns.get(position).ok_or_else(|| {
            EqualizerError::internal(format!("key position {} out of range", position))
        })?;
        column.get(row)
    }

    pub fn hash_row(&self, hasher: &mut RowKeyHasher, row: usize) -> Result<u64> {
        hasher.reset();
        for column in &self.columns {
            hasher.update(column.get(row)?);
        }
        hasher.digest()
    }
}

/// Bucket every row of `table` by the hash of its key tuple.
pub fn build_partition_map(spec: &TableSpec, table: &ColumnarTable) -> Result<PartitionMap> {
    build_partition_map_with(spec, table, false)
}

/// Like [`build_partition_map`], optionally hashing rows on the rayon pool.
/// Bucket contents and order are the same either way.
pub fn build_partition_map_with(
    spec: &TableSpec,
    table: &ColumnarTable,
    parallel: bool,
) -> Result<PartitionMap> {
    let row_count = table.row_count()?;
    let keys = KeyColumns::resolve(spec, table)?;

    let hashes: Vec<u64> = if parallel {
        (0..row_count)
            .into_par_iter()
            .map_init(RowKeyHasher::new, |hasher, row| keys.hash_row(hasher, row))
            .collect::<Result<Vec<_>>>()?
    } else {
        let mut hasher = RowKeyHasher::new();
        (0..row_count)
            .map(|row| keys.hash_row(&mut hasher, row))
            .collect::<Result<Vec<_>>>()?
    };

    let mut partitions = PartitionMap::new();
    for (row, hash) in hashes.into_iter().enumerate() {
        partitions.entry(hash).or_default().push(row);
    }
    Ok(partitions)
}

/// Union of both maps' hashes: source hashes first, then target-only ones.
pub fn merge_hashes(source: &PartitionMap, target: &PartitionMap) -> Vec<u64> {
    let mut merged: IndexSet<u64> = source.keys().copied().collect();
    merged.extend(target.keys().copied());
    merged.into_iter().collect()
}

/// Classified row indices. Insert/update/equalized index the source table, delete the target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionOutcome {
    pub insert: Vec<usize>,
    pub update: Vec<usize>,
    pub delete: Vec<usize>,
    pub equalized: Vec<usize>,
}

impl PartitionOutcome {
    pub fn append(&mut self, mut other: PartitionOutcome) {
        self.insert.append(&mut other.insert);
        self.update.append(&mut other.update);
        self.delete.append(&mut other.delete);
        self.equalized.append(&mut other.equalized);
    }

    pub fn total(&self) -> usize {
        self.insert.len() + self.update.len() + self.delete.len() + self.equalized.len()
    }
}

/// Compares rows of a source and a target table that share a partition.
pub struct PartitionMatcher<'a> {
    source_keys: KeyColumns<'a>,
    target_keys: KeyColumns<'a>,
    source_change_control: Option<BoundColumn<'a>>,
    target_change_control: Option<BoundColumn<'a>>,
}

impl<'a> PartitionMatcher<'a> {
    pub fn new(
        source_spec: &'a TableSpec,
        target_spec: &'a TableSpec,
        source_table: &'a ColumnarTable,
        target_table: &'a ColumnarTable,
    ) -> Result<Self> {
        let source_keys = KeyColumns::resolve(source_spec, source_table)?;
        let target_keys = KeyColumns::resolve(target_spec, target_table)?;
        if source_keys.len() != target_keys.len() {
            return Err(EqualizerError::internal(format!(
                "key arity differs between '{}' and '{}'",
                source_spec.name, target_spec.name
            )));
        }

        let source_change_control = source_spec
            .change_control_spec()?
            .map(|column| BoundColumn::bind(column, source_table, &source_spec.name))
            .transpose()?;
        let target_change_control = target_spec
            .change_control_spec()?
            .map(|column| BoundColumn::bind(column, target_table, &target_spec.name))
            .transpose()?;

        Ok(Self {
            source_keys,
            target_keys,
            source_change_control,
            target_change_control,
        })
    }

    /// Exact key equality: same declared type, same runtime kind and same value at every position.
    pub fn same_key(&self, source_row: usize, target_row: usize) -> Result<bool> {
        for position in 0..self.source_keys.len() {
            if self.source_keys.column_type(position) != self.target_keys.column_type(position) {
                return Ok(false);
            }
            let source_value = self.source_keys.value(position, source_row)?;
            let target_value = self.target_keys.value(position, target_row)?;
            if !source_value.same_as(target_value) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether the source row is more recent than the matched target row.
    ///
    /// Without change control on either side every match counts as newer.
    /// Nulls order before any value.
    pub fn newer_than(&self, source_row: usize, target_row: usize) -> Result<bool> {
        let (source, target) = match (&self.source_change_control, &self.target_change_control) {
            (None, None) => return Ok(true),
            (Some(source), Some(target)) => (source, target),
            _ => {
                return Err(EqualizerError::internal(
                    "change control column declared on only one side",
                ))
            }
        };

        if source.spec.column_type != target.spec.column_type {
            return Err(EqualizerError::internal(format!(
                "change control column types differ: {} != {}",
                source.spec.column_type, target.spec.column_type
            )));
        }
        if source.spec.column_type == ColumnType::Boolean {
            return Err(EqualizerError::UnsupportedChangeControlType {
                column: source.spec.name.clone(),
                column_type: source.spec.column_type,
            });
        }

        let source_value = source.get(source_row)?;
        let target_value = target.get(target_row)?;
        match (source_value, target_value) {
            (Value::Null, _) => Ok(false),
            (_, Value::Null) => Ok(true),
            (Value::Str(a), Value::Str(b)) => Ok(a > b),
            (Value::Int(a), Value::Int(b)) => Ok(a > b),
            (Value::Float(a), Value::Float(b)) => Ok(a > b),
            (a, b) => Err(EqualizerError::internal(format!(
                "cannot order change control values {} and {}",
                a, b
            ))),
        }
    }

    /// Classify the rows of one partition.
    ///
    /// A source row is classified once, by the first target row it matches;
    /// every target row it matches is consumed.
    pub fn match_partition(
        &self,
        source_indices: &[usize],
        target_indices: &[usize],
    ) -> Result<PartitionOutcome> {
        let mut outcome = PartitionOutcome::default();
        let mut consumed = vec![false; target_indices.len()];

        for &source_row in source_indices {
            let mut newer = None;
            for (slot, &target_row) in target_indices.iter().enumerate() {
                if !self.same_key(source_row, target_row)? {
                    continue;
                }
                consumed[slot] = true;
                if newer.is_none() {
                    newer = Some(self.newer_than(source_row, target_row)?);
                }
            }
            match newer {
                Some(true) => outcome.update.push(source_row),
                Some(false) => outcome.equalized.push(source_row),
                None => outcome.insert.push(source_row),
            }
        }

        outcome.delete.extend(
            target_indices
                .iter()
                .zip(consumed)
                .filter(|(_, used)| !used)
                .map(|(&target_row, _)| target_row),
        );

        Ok(outcome)
    }
}
