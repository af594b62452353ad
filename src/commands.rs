//! Command implementations for equalizer CLI

use crate::cli::Commands;
use crate::dirlock::DirLock;
use crate::error::{EqualizerError, Result};
use crate::output::{JsonFormatter, PrettyPrinter, RunReport};
use crate::progress::ProgressReporter;
use crate::reconcile::{check_specs, ReconcileCounts, ReconcileOptions, Reconciler};
use crate::spec::SpecPair;
use crate::table::detect_format;
use crate::workspace::{
    read_json_file, write_json_file, WorkDir, DELETE_DATA_FILE, EQUALIZED_DATA_FILE,
    INSERT_DATA_FILE, RUN_REPORT_FILE, UPDATE_DATA_FILE,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Execute a command
pub fn execute_command(command: Commands, work_dir: Option<&Path>) -> Result<()> {
    match command {
        Commands::Run {
            source_spec,
            target_spec,
            source_data,
            target_data,
            pretty,
            no_parallel,
            json,
        } => {
            let inputs = RunInputs {
                source_spec,
                target_spec,
                source_data,
                target_data,
            };
            run_command(work_dir, &inputs, pretty, no_parallel, json)
        }
        Commands::Check {
            source_spec,
            target_spec,
            json,
        } => check_command(&source_spec, &target_spec, json),
        Commands::Lock {
            dir,
            name,
            wait,
            timeout,
            unlock,
        } => {
            let dir = dir.as_deref().or(work_dir);
            lock_command(dir, &name, wait, timeout, unlock)
        }
    }
}

/// The four files a run reads
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub source_spec: PathBuf,
    pub target_spec: PathBuf,
    pub source_data: PathBuf,
    pub target_data: PathBuf,
}

impl RunInputs {
    fn resolve(&self, work_dir: &WorkDir) -> Result<RunInputs> {
        Ok(RunInputs {
            source_spec: work_dir.require_input(&self.source_spec)?,
            target_spec: work_dir.require_input(&self.target_spec)?,
            source_data: work_dir.require_input(&self.source_data)?,
            target_data: work_dir.require_input(&self.target_data)?,
        })
    }
}

/// Reconcile one batch and file its inputs under the processed or error directory
fn run_command(
    work_dir: Option<&Path>,
    inputs: &RunInputs,
    pretty: bool,
    no_parallel: bool,
    json: bool,
) -> Result<()> {
    let current_dir = std::env::current_dir()?;
    let root = work_dir.unwrap_or(&current_dir);
    let work_dir = WorkDir::open(root)?;
    let inputs = inputs.resolve(&work_dir)?;
    work_dir.create_dirs()?;

    let pretty = pretty || work_dir.config.pretty;
    let mut options = work_dir.config.reconcile_options();
    if no_parallel {
        options.parallel = false;
    }

    let mut report = RunReport::start();
    log::info!("starting run {} in {}", report.run_id, work_dir.root.display());
    let mut progress = if json {
        ProgressReporter::new_minimal()
    } else {
        ProgressReporter::new_for_run()
    };

    let outcome = execute_run(&work_dir, &inputs, options, pretty, &mut report, &mut progress)
        .and_then(|counts| {
            report.finish(counts, work_dir.processed_dir.clone());
            write_json_file(&work_dir.output_path(RUN_REPORT_FILE), &report, pretty)?;
            work_dir.move_files_to(&work_dir.processed_dir)?;
            Ok(())
        });

    match outcome {
        Ok(()) => {
            progress.finish_write("Results written");
            if json {
                println!("{}", JsonFormatter::format(&report)?);
            } else {
                PrettyPrinter::print_run_summary(&report);
            }
            Ok(())
        }
        Err(e) => {
            progress.abandon();
            log::error!("run {} failed: {}", report.run_id, e);
            report.fail(&e, work_dir.error_dir.clone());

            // a finished report may already sit next to the outputs
            let stale_report = work_dir.output_path(RUN_REPORT_FILE);
            if stale_report.is_file() {
                if let Err(remove_err) = std::fs::remove_file(&stale_report) {
                    log::warn!("could not remove {}: {}", stale_report.display(), remove_err);
                }
            }
            if let Err(move_err) = work_dir.move_files_to(&work_dir.error_dir) {
                log::warn!("could not move inputs to error dir: {}", move_err);
            }
            if let Err(write_err) =
                write_json_file(&work_dir.error_dir.join(RUN_REPORT_FILE), &report, pretty)
            {
                log::warn!("could not write run report: {}", write_err);
            }
            Err(e)
        }
    }
}

fn execute_run(
    work_dir: &WorkDir,
    inputs: &RunInputs,
    options: ReconcileOptions,
    pretty: bool,
    report: &mut RunReport,
    progress: &mut ProgressReporter,
) -> Result<ReconcileCounts> {
    let specs = SpecPair::from_files(&inputs.source_spec, &inputs.target_spec)?;
    report.source_table = Some(specs.source.name.clone());
    report.target_table = Some(specs.target.name.clone());

    let source_raw = read_json_file(&inputs.source_data)?;
    let target_raw = read_json_file(&inputs.target_data)?;
    report.set_formats(detect_format(&source_raw), detect_format(&target_raw));
    progress.finish_load("Specs and data loaded");

    let result = Reconciler::new(&specs.source, &specs.target)
        .with_options(options)
        .reconcile(&source_raw, &target_raw)?;
    let counts = result.counts();
    progress.finish_reconcile("Tables reconciled");

    let outputs = [
        (INSERT_DATA_FILE, &result.insert),
        (UPDATE_DATA_FILE, &result.update),
        (DELETE_DATA_FILE, &result.delete),
        (EQUALIZED_DATA_FILE, &result.equalized),
    ];
    for (file_name, data) in outputs {
        let path = work_dir.output_path(file_name);
        write_json_file(&path, data, pretty)?;
        log::debug!("wrote {} rows to {}", data.row_count(), path.display());
    }

    Ok(counts)
}

/// Report whether two specs are equalizable
fn check_command(source_spec: &Path, target_spec: &Path, json: bool) -> Result<()> {
    let specs = SpecPair::from_files(source_spec, target_spec)?;
    let (source, target) = (&specs.source, &specs.target);

    let outcome = check_specs(source, target);
    let problem = outcome.as_ref().err().map(|e| e.to_string());
    if json {
        println!(
            "{}",
            JsonFormatter::format_check_result(&source.name, &target.name, problem.as_deref())?
        );
    } else {
        PrettyPrinter::print_check_result(&source.name, &target.name, problem.as_deref());
    }
    outcome
}

fn lock_command(dir: Option<&Path>, name: &str, wait: bool, timeout: u64, unlock: bool) -> Result<()> {
    let current_dir = std::env::current_dir()?;
    let dir = dir.unwrap_or(&current_dir);
    let lock = DirLock::new(dir, name)?;

    if unlock {
        if lock.unlock()? {
            println!("🔓 Released lock {}", lock.lock_path().display());
        } else {
            println!("No lock to release at {}", lock.lock_path().display());
        }
        return Ok(());
    }

    if wait {
        lock.wait_lock(Duration::from_secs(timeout))?;
    } else if !lock.try_lock()? {
        return Err(EqualizerError::lock(lock.lock_path(), "lock is already held"));
    }
    println!("🔒 Acquired lock {}", lock.lock_path().display());
    Ok(())
}
