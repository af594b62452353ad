//! Filesystem edge cases for batch runs

use crate::common::{sample_data, CliTestRunner};
use equalizer::workspace::{INSERT_DATA_FILE, UPDATE_DATA_FILE};
use equalizer::EqualizerError;

#[test]
fn test_data_files_with_bom() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture
        .create_spec("source_spec.json", &sample_data::customer_source_spec())
        .unwrap();
    fixture
        .create_spec("target_spec.json", &sample_data::customer_target_spec())
        .unwrap();

    let mut source = b"\xef\xbb\xbf".to_vec();
    source.extend_from_slice(sample_data::customer_source_rows().to_string().as_bytes());
    fixture.create_raw("source_data.json", &source).unwrap();
    let mut target = b"\xef\xbb\xbf".to_vec();
    target.extend_from_slice(sample_data::customer_target_rows().to_string().as_bytes());
    fixture.create_raw("target_data.json", &target).unwrap();

    runner.run_batch(&[]).unwrap();
    assert!(fixture.processed_file(UPDATE_DATA_FILE).exists());
}

#[test]
fn test_corrupted_data_file() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture
        .create_run_inputs(
            &sample_data::customer_source_spec(),
            &sample_data::customer_target_spec(),
            &sample_data::customer_source_rows(),
            &sample_data::customer_target_rows(),
        )
        .unwrap();
    fixture
        .create_raw("target_data.json", b"\x00\x01invalid\xff")
        .unwrap();

    let err = runner.run_batch(&[]).unwrap_err();
    assert!(matches!(err, EqualizerError::InvalidInput { .. }));
    assert!(fixture.error_file("target_data.json").exists());
    assert!(!fixture.processed_file(INSERT_DATA_FILE).exists());
}

#[test]
fn test_subdirectories_are_not_moved() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture
        .create_run_inputs(
            &sample_data::customer_source_spec(),
            &sample_data::customer_target_spec(),
            &sample_data::customer_source_rows(),
            &sample_data::customer_target_rows(),
        )
        .unwrap();
    let archive = fixture.root().join("archive");
    std::fs::create_dir(&archive).unwrap();
    std::fs::write(archive.join("old.json"), "[]").unwrap();

    runner.run_batch(&[]).unwrap();
    assert!(archive.join("old.json").exists());
}

#[test]
fn test_second_run_reuses_output_dirs() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    for _ in 0..2 {
        fixture
            .create_run_inputs(
                &sample_data::customer_source_spec(),
                &sample_data::customer_target_spec(),
                &sample_data::customer_source_rows(),
                &sample_data::customer_target_rows(),
            )
            .unwrap();
        runner.run_batch(&[]).unwrap();
    }
    assert!(fixture.processed_file("source_data.json").exists());
    assert!(!fixture.root().join("source_data.json").exists());
}

#[test]
fn test_missing_work_dir() {
    let runner = CliTestRunner::new().unwrap();
    let missing = runner.fixture().root().join("nope");
    let err = runner
        .run_batch(&["--work-dir", missing.to_str().unwrap()])
        .unwrap_err();
    assert!(matches!(err, EqualizerError::InvalidInput { .. }));
}
