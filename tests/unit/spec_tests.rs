//! Unit tests for loading and comparing table specs

use crate::common::{sample_data, TestFixture};
use equalizer::{CompatibilityError, EqualizerError, SpecPair, TableSpec};

#[test]
fn test_load_spec_from_file() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture
        .create_json(
            "spec.json",
            &serde_json::json!({
                "name": "orders",
                "columns": [
                    {"name": "id", "type": "INTEGER"},
                    {"name": "placed", "type": "DATETIME"},
                    {"name": "paid", "type": "BOOLEAN"}
                ],
                "key_columns": ["id"],
                "change_control_column": "placed"
            }),
        )
        .unwrap();

    let spec = TableSpec::from_file(&path).unwrap();
    assert_eq!(spec.name, "orders");
    assert_eq!(spec.column_names().collect::<Vec<_>>(), vec!["id", "placed", "paid"]);
    assert_eq!(spec.change_control_column.as_deref(), Some("placed"));
}

#[test]
fn test_spec_file_with_bom_and_empty_change_control() {
    let fixture = TestFixture::new().unwrap();
    let mut content = b"\xef\xbb\xbf".to_vec();
    content.extend_from_slice(
        br#"{"name": "t", "columns": [{"name": "id", "type": "STRING"}], "key_columns": ["id"], "change_control_column": ""}"#,
    );
    let path = fixture.create_raw("spec.json", &content).unwrap();

    let spec = TableSpec::from_file(&path).unwrap();
    assert!(spec.change_control_column.is_none());
}

#[test]
fn test_spec_round_trips_through_file() {
    let fixture = TestFixture::new().unwrap();
    let spec = sample_data::composite_spec("sales");
    let path = fixture.create_spec("spec.json", &spec).unwrap();
    assert_eq!(TableSpec::from_file(&path).unwrap(), spec);
}

#[test]
fn test_unparseable_spec_is_config_error() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture.create_raw("spec.json", b"{ not json").unwrap();
    assert!(matches!(
        TableSpec::from_file(&path),
        Err(EqualizerError::Config { .. })
    ));
}

#[test]
fn test_unknown_column_type_rejected() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture
        .create_json(
            "spec.json",
            &serde_json::json!({
                "name": "t",
                "columns": [{"name": "id", "type": "UUID"}],
                "key_columns": ["id"]
            }),
        )
        .unwrap();
    assert!(TableSpec::from_file(&path).is_err());
}

#[test]
fn test_key_column_must_be_declared() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture
        .create_json(
            "spec.json",
            &serde_json::json!({
                "name": "t",
                "columns": [{"name": "id", "type": "INTEGER"}],
                "key_columns": ["code"]
            }),
        )
        .unwrap();
    assert!(matches!(
        TableSpec::from_file(&path),
        Err(EqualizerError::InvalidSpec { .. })
    ));
}

#[test]
fn test_key_columns_compared_by_position() {
    let source = sample_data::composite_spec("a");
    let mut target = sample_data::composite_spec("b");
    for column in &mut target.columns {
        if column.name == "region" {
            column.name = "area".to_string();
        }
    }
    target.key_columns = vec!["area".to_string(), "id".to_string()];
    assert!(source.is_equalizable(&target));

    target.key_columns.reverse();
    assert!(matches!(
        source.equalizable(&target),
        Err(CompatibilityError::KeyColumnType { position: 0, .. })
    ));
}

#[test]
fn test_change_control_presence_must_match() {
    let source = sample_data::customer_source_spec();
    let target = sample_data::plain_spec("target");
    assert!(matches!(
        source.equalizable(&target),
        Err(CompatibilityError::ChangeControlPresence { .. })
    ));
    assert!(matches!(
        target.equalizable(&source),
        Err(CompatibilityError::ChangeControlPresence { .. })
    ));
}

#[test]
fn test_spec_pair_from_files() {
    let fixture = TestFixture::new().unwrap();
    let source = fixture
        .create_spec("source_spec.json", &sample_data::customer_source_spec())
        .unwrap();
    let target = fixture
        .create_spec("target_spec.json", &sample_data::customer_target_spec())
        .unwrap();

    let pair = SpecPair::from_files(&source, &target).unwrap();
    assert_eq!(pair.source.name, "customers_source");
    assert_eq!(pair.target.name, "customers_target");
    assert!(pair.equalizable().is_ok());
}
