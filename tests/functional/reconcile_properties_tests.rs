//! Properties every reconciliation must satisfy, checked over generated tables

use crate::common::{assertions, sample_data};
use equalizer::partition::{PartitionMatcher, PartitionOutcome};
use equalizer::table::{to_canonical, TableFormat};
use equalizer::{reconcile, EqualizerError, ReconcileOptions, Reconciler, TableSpec};
use serde_json::json;
use std::collections::BTreeSet;

/// Small deterministic generator so failures reproduce
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

/// Rows for `sample_data::composite_spec` with a narrow key domain, so keys
/// repeat within and across sides, plus the odd null key component.
fn generated_rows(seed: u64, count: usize) -> serde_json::Value {
    let mut rng = Lcg(seed);
    let regions = ["eu", "us", "apac"];
    let rows: Vec<serde_json::Value> = (0..count)
        .map(|_| {
            let region = match rng.below(10) {
                0 => serde_json::Value::Null,
                r => json!(regions[(r % 3) as usize]),
            };
            let version = match rng.below(8) {
                0 => serde_json::Value::Null,
                v => json!(v),
            };
            json!({
                "region": region,
                "id": rng.below(15),
                "version": version,
                "amount": rng.below(1000) as f64 / 10.0,
            })
        })
        .collect();
    serde_json::Value::Array(rows)
}

fn sorted(indices: &[usize]) -> Vec<usize> {
    let mut indices = indices.to_vec();
    indices.sort_unstable();
    indices
}

fn assert_same_classification(a: &PartitionOutcome, b: &PartitionOutcome) {
    assert_eq!(sorted(&a.insert), sorted(&b.insert));
    assert_eq!(sorted(&a.update), sorted(&b.update));
    assert_eq!(sorted(&a.delete), sorted(&b.delete));
    assert_eq!(sorted(&a.equalized), sorted(&b.equalized));
}

fn classify_both_ways(
    spec: &TableSpec,
    source_raw: &serde_json::Value,
    target_raw: &serde_json::Value,
) -> (PartitionOutcome, PartitionOutcome, usize, usize) {
    let source = to_canonical(spec, source_raw, TableFormat::Row).unwrap();
    let target = to_canonical(spec, target_raw, TableFormat::Row).unwrap();
    let source_rows = source.row_count().unwrap();
    let target_rows = target.row_count().unwrap();

    let partitioned = Reconciler::new(spec, spec)
        .with_options(ReconcileOptions {
            parallel: true,
            min_parallel_partitions: 1,
        })
        .classify(&source, &target)
        .unwrap();

    let matcher = PartitionMatcher::new(spec, spec, &source, &target).unwrap();
    let all_source: Vec<usize> = (0..source_rows).collect();
    let all_target: Vec<usize> = (0..target_rows).collect();
    let full_scan = matcher.match_partition(&all_source, &all_target).unwrap();

    (partitioned, full_scan, source_rows, target_rows)
}

#[test]
fn test_partitioned_matches_full_scan() {
    let spec = sample_data::composite_spec("sales");
    for seed in 1..=8u64 {
        let source_raw = generated_rows(seed, 60);
        let target_raw = generated_rows(seed * 7919, 45);
        let (partitioned, full_scan, _, _) = classify_both_ways(&spec, &source_raw, &target_raw);
        assert_same_classification(&partitioned, &full_scan);
    }
}

#[test]
fn test_coverage() {
    let spec = sample_data::composite_spec("sales");
    for seed in 1..=8u64 {
        let source_raw = generated_rows(seed, 50);
        let target_raw = generated_rows(seed + 100, 50);
        let (outcome, _, source_rows, target_rows) =
            classify_both_ways(&spec, &source_raw, &target_raw);

        let mut source_seen: Vec<usize> = outcome
            .insert
            .iter()
            .chain(&outcome.update)
            .chain(&outcome.equalized)
            .copied()
            .collect();
        source_seen.sort_unstable();
        assert_eq!(source_seen, (0..source_rows).collect::<Vec<_>>());

        let deleted: BTreeSet<usize> = outcome.delete.iter().copied().collect();
        assert_eq!(deleted.len(), outcome.delete.len());

        // every target row either shares a key with some source row or is deleted, never both
        let source = to_canonical(&spec, &source_raw, TableFormat::Row).unwrap();
        let target = to_canonical(&spec, &target_raw, TableFormat::Row).unwrap();
        let matcher = PartitionMatcher::new(&spec, &spec, &source, &target).unwrap();
        let matched: BTreeSet<usize> = (0..target_rows)
            .filter(|&t| (0..source_rows).any(|s| matcher.same_key(s, t).unwrap()))
            .collect();
        assert!(matched.is_disjoint(&deleted));
        let covered: Vec<usize> = matched.union(&deleted).copied().collect();
        assert_eq!(covered, (0..target_rows).collect::<Vec<_>>());
    }
}

#[test]
fn test_sequential_and_parallel_outputs_agree() {
    let spec = sample_data::composite_spec("sales");
    let source_raw = generated_rows(42, 400);
    let target_raw = generated_rows(43, 400);

    let sequential = Reconciler::new(&spec, &spec)
        .with_options(ReconcileOptions::sequential())
        .reconcile(&source_raw, &target_raw)
        .unwrap();
    let parallel = Reconciler::new(&spec, &spec)
        .with_options(ReconcileOptions {
            parallel: true,
            min_parallel_partitions: 1,
        })
        .reconcile(&source_raw, &target_raw)
        .unwrap();

    assert_eq!(sequential, parallel);
}

#[test]
fn test_empty_target_inserts_everything() {
    let source_spec = sample_data::customer_source_spec();
    let target_spec = sample_data::customer_target_spec();

    for target in [json!([]), json!({}), json!({"id": [], "updated_at": []})] {
        for source in [
            sample_data::customer_source_rows(),
            sample_data::customer_source_columns(),
        ] {
            let result = reconcile(&source_spec, &target_spec, &source, &target).unwrap();
            assert_eq!(
                assertions::id_set(&result.insert.to_json()),
                BTreeSet::from([1, 2, 3])
            );
            assert!(result.update.is_empty());
            assert!(result.delete.is_empty());
            assert!(result.equalized.is_empty());

            // the inserts are the source data itself; only the empty tables follow the target
            let source_format = if source.is_array() {
                TableFormat::Row
            } else {
                TableFormat::Columnar
            };
            let empty_format = if target.is_array() {
                TableFormat::Row
            } else {
                TableFormat::Columnar
            };
            assert_eq!(result.insert.format(), source_format);
            assert_eq!(result.update.format(), empty_format);
            assert_eq!(result.delete.format(), empty_format);
            assert_eq!(result.equalized.format(), empty_format);
        }
    }
}

#[test]
fn test_empty_source_deletes_everything() {
    let source_spec = sample_data::customer_source_spec();
    let target_spec = sample_data::customer_target_spec();

    for source in [json!([]), json!({})] {
        for target in [
            sample_data::customer_target_rows(),
            sample_data::customer_target_columns(),
        ] {
            let result = reconcile(&source_spec, &target_spec, &source, &target).unwrap();
            assert_eq!(
                assertions::id_set(&result.delete.to_json()),
                BTreeSet::from([1, 2, 4])
            );
            assert!(result.insert.is_empty());
            assert!(result.update.is_empty());
            assert!(result.equalized.is_empty());

            let target_format = if target.is_array() {
                TableFormat::Row
            } else {
                TableFormat::Columnar
            };
            let empty_format = if source.is_array() {
                TableFormat::Row
            } else {
                TableFormat::Columnar
            };
            assert_eq!(result.delete.format(), target_format);
            assert_eq!(result.insert.format(), empty_format);
            assert_eq!(result.update.format(), empty_format);
            assert_eq!(result.equalized.format(), empty_format);
        }
    }
}

#[test]
fn test_no_change_control_never_equalizes() {
    let source_spec = sample_data::plain_spec("source");
    let target_spec = sample_data::plain_spec("target");
    let rows = json!([
        {"id": 1, "name": "a"},
        {"id": 2, "name": "b"},
        {"id": 3, "name": "c"}
    ]);

    let result = reconcile(&source_spec, &target_spec, &rows, &rows).unwrap();
    assert_eq!(assertions::id_set(&result.update.to_json()), BTreeSet::from([1, 2, 3]));
    assert!(result.equalized.is_empty());
    assert!(result.insert.is_empty());
    assert!(result.delete.is_empty());
}

#[test]
fn test_customer_scenario_all_format_combinations() {
    let source_spec = sample_data::customer_source_spec();
    let target_spec = sample_data::customer_target_spec();

    for source in [
        sample_data::customer_source_rows(),
        sample_data::customer_source_columns(),
    ] {
        for target in [
            sample_data::customer_target_rows(),
            sample_data::customer_target_columns(),
        ] {
            let result = reconcile(&source_spec, &target_spec, &source, &target).unwrap();
            assert_eq!(assertions::id_set(&result.equalized.to_json()), BTreeSet::from([1]));
            assert_eq!(assertions::id_set(&result.update.to_json()), BTreeSet::from([2]));
            assert_eq!(assertions::id_set(&result.insert.to_json()), BTreeSet::from([3]));
            assert_eq!(assertions::id_set(&result.delete.to_json()), BTreeSet::from([4]));

            // owning side keeps its encoding
            assert_eq!(result.insert.format().to_string(), if source.is_array() { "row" } else { "columnar" });
            assert_eq!(result.delete.format().to_string(), if target.is_array() { "row" } else { "columnar" });

            let names = assertions::column_values(&result.update.to_json(), "name");
            assert_eq!(names, vec![json!("Bob")]);
        }
    }
}

#[test]
fn test_boolean_change_control_fails() {
    let spec: TableSpec = serde_json::from_value(json!({
        "name": "flags",
        "columns": [
            {"name": "id", "type": "INTEGER"},
            {"name": "active", "type": "BOOLEAN"}
        ],
        "key_columns": ["id"],
        "change_control_column": "active"
    }))
    .unwrap();
    let rows = json!([{"id": 1, "active": true}]);

    for (source, target) in [(&rows, &rows), (&rows, &json!([])), (&json!([]), &rows)] {
        let err = reconcile(&spec, &spec, source, target).unwrap_err();
        assert!(matches!(err, EqualizerError::UnsupportedChangeControlType { .. }));
    }
}
