//! One reconciliation pass over a source and a target table

use crate::error::{EqualizerError, Result};
use crate::partition::{build_partition_map_with, merge_hashes, PartitionMatcher, PartitionOutcome};
use crate::spec::{ColumnType, TableSpec};
use crate::table::{detect_format, is_empty, json_kind, to_canonical, ColumnarTable, TableData, TableFormat};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Partition count below which matching stays on the calling thread
pub const DEFAULT_MIN_PARALLEL_PARTITIONS: usize = 1024;

/// Tuning knobs. They never change which rows land in which output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    pub parallel: bool,
    pub min_parallel_partitions: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            min_parallel_partitions: DEFAULT_MIN_PARALLEL_PARTITIONS,
        }
    }
}

impl ReconcileOptions {
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }
}

/// The four output tables of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileResult {
    pub insert: TableData,
    pub update: TableData,
    pub delete: TableData,
    pub equalized: TableData,
}

impl ReconcileResult {
    pub fn counts(&self) -> ReconcileCounts {
        ReconcileCounts {
            insert: self.insert.row_count(),
            update: self.update.row_count(),
            delete: self.delete.row_count(),
            equalized: self.equalized.row_count(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileCounts {
    pub insert: usize,
    pub update: usize,
    pub delete: usize,
    pub equalized: usize,
}

impl ReconcileCounts {
    pub fn has_changes(&self) -> bool {
        self.insert > 0 || self.update > 0 || self.delete > 0
    }
}

/// Reconcile with default options.
pub fn reconcile(
    source_spec: &TableSpec,
    target_spec: &TableSpec,
    source_raw: &serde_json::Value,
    target_raw: &serde_json::Value,
) -> Result<ReconcileResult> {
    Reconciler::new(source_spec, target_spec).reconcile(source_raw, target_raw)
}

pub struct Reconciler<'a> {
    source_spec: &'a TableSpec,
    target_spec: &'a TableSpec,
    options: ReconcileOptions,
}

impl<'a> Reconciler<'a> {
    pub fn new(source_spec: &'a TableSpec, target_spec: &'a TableSpec) -> Self {
        Self {
            source_spec,
            target_spec,
            options: ReconcileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Compute the inserts, updates, deletes and equalized rows that bring the target in line with the source.
    pub fn reconcile(
        &self,
        source_raw: &serde_json::Value,
        target_raw: &serde_json::Value,
    ) -> Result<ReconcileResult> {
        log::info!(
            "checking that '{}' and '{}' are equalizable",
            self.source_spec.name,
            self.target_spec.name
        );
        check_specs(self.source_spec, self.target_spec)?;

        let source_empty = is_empty(source_raw);
        let target_empty = is_empty(target_raw);
        if source_empty && target_empty {
            return Err(EqualizerError::NoDataToReconcile);
        }

        let source_format = detect_side_format("source", source_raw)?;
        let target_format = detect_side_format("target", target_raw)?;
        log::debug!("source format: {}, target format: {}", source_format, target_format);

        if target_empty {
            log::info!("target data is empty, every source row is an insert");
            let source = normalize(self.source_spec, source_raw, source_format)?;
            let all_rows: Vec<usize> = (0..source.row_count()?).collect();
            return Ok(ReconcileResult {
                insert: TableData::encode(
                    self.source_spec,
                    source.project(self.source_spec, &all_rows),
                    source_format,
                )?,
                update: TableData::empty(self.source_spec, target_format),
                delete: TableData::empty(self.target_spec, target_format),
                equalized: TableData::empty(self.source_spec, target_format),
            });
        }

        if source_empty {
            log::info!("source data is empty, every target row is a delete");
            let target = normalize(self.target_spec, target_raw, target_format)?;
            let all_rows: Vec<usize> = (0..target.row_count()?).collect();
            return Ok(ReconcileResult {
                insert: TableData::empty(self.source_spec, source_format),
                update: TableData::empty(self.source_spec, source_format),
                delete: TableData::encode(
                    self.target_spec,
                    target.project(self.target_spec, &all_rows),
                    target_format,
                )?,
                equalized: TableData::empty(self.source_spec, source_format),
            });
        }

        log::info!("converting source and target data to columnar form");
        let source = normalize(self.source_spec, source_raw, source_format)?;
        let target = normalize(self.target_spec, target_raw, target_format)?;

        let outcome = self.classify(&source, &target)?;
        log::info!(
            "classified {} inserts, {} updates, {} deletes, {} equalized",
            outcome.insert.len(),
            outcome.update.len(),
            outcome.delete.len(),
            outcome.equalized.len()
        );

        Ok(ReconcileResult {
            insert: TableData::encode(
                self.source_spec,
                source.project(self.source_spec, &outcome.insert),
                source_format,
            )?,
            update: TableData::encode(
                self.source_spec,
                source.project(self.source_spec, &outcome.update),
                source_format,
            )?,
            delete: TableData::encode(
                self.target_spec,
                target.project(self.target_spec, &outcome.delete),
                target_format,
            )?,
            equalized: TableData::encode(
                self.source_spec,
                source.project(self.source_spec, &outcome.equalized),
                source_format,
            )?,
        })
    }

    /// Partition both canonical tables by key hash and match partition by partition.
    pub fn classify(&self, source: &ColumnarTable, target: &ColumnarTable) -> Result<PartitionOutcome> {
        log::info!("computing partition map for source data");
        let source_map = build_partition_map_with(self.source_spec, source, self.options.parallel)?;
        log::info!("computing partition map for target data");
        let target_map = build_partition_map_with(self.target_spec, target, self.options.parallel)?;

        let merged = merge_hashes(&source_map, &target_map);
        log::info!(
            "processing {} partitions ({} source, {} target)",
            merged.len(),
            source_map.len(),
            target_map.len()
        );

        let matcher = PartitionMatcher::new(self.source_spec, self.target_spec, source, target)?;
        let match_one = |hash: &u64| -> Result<PartitionOutcome> {
            let source_indices = source_map.get(hash).map(Vec::as_slice).unwrap_or(&[]);
            let target_indices = target_map.get(hash).map(Vec::as_slice).unwrap_or(&[]);
            let outcome = matcher.match_partition(source_indices, target_indices)?;
            log::trace!(
                "partition {}: source {:?}, target {:?} -> {:?}",
                hash,
                source_indices,
                target_indices,
                outcome
            );
            Ok(outcome)
        };

        let outcomes: Vec<PartitionOutcome> =
            if self.options.parallel && merged.len() >= self.options.min_parallel_partitions {
                log::debug!("matching partitions on {} threads", rayon::current_num_threads());
                merged.par_iter().map(match_one).collect::<Result<Vec<_>>>()?
            } else {
                merged.iter().map(match_one).collect::<Result<Vec<_>>>()?
            };

        let mut total = PartitionOutcome::default();
        for outcome in outcomes {
            total.append(outcome);
        }
        Ok(total)
    }
}

/// Schema checks done once per run, before any data is read.
pub fn check_specs(source_spec: &TableSpec, target_spec: &TableSpec) -> Result<()> {
    source_spec.equalizable(target_spec)?;
    if let Some(column) = source_spec.change_control_spec()? {
        if column.column_type == ColumnType::Boolean {
            return Err(EqualizerError::UnsupportedChangeControlType {
                column: column.name.clone(),
                column_type: column.column_type,
            });
        }
    }
    Ok(())
}

fn detect_side_format(side: &str, raw: &serde_json::Value) -> Result<TableFormat> {
    match detect_format(raw) {
        TableFormat::Neither => Err(EqualizerError::UnrecognizedFormat {
            side: side.to_string(),
            found: json_kind(raw).to_string(),
        }),
        format => Ok(format),
    }
}

/// Canonical, row-count-consistent and type-checked form of one side.
fn normalize(spec: &TableSpec, raw: &serde_json::Value, format: TableFormat) -> Result<ColumnarTable> {
    let table = to_canonical(spec, raw, format)?;
    table.row_count()?;
    if format == TableFormat::Columnar {
        table.validate_against(spec)?;
    }
    Ok(table)
}
