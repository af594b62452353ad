//! Output formatting utilities

use crate::error::{EqualizerError, Result};
use crate::reconcile::ReconcileCounts;
use crate::table::TableFormat;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// Record of one batch run, written next to its outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub source_table: Option<String>,
    pub target_table: Option<String>,
    pub source_format: Option<String>,
    pub target_format: Option<String>,
    pub counts: Option<ReconcileCounts>,
    pub error: Option<String>,
    pub status_code: Option<u16>,
    pub output_dir: Option<PathBuf>,
}

impl RunReport {
    pub fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Running,
            source_table: None,
            target_table: None,
            source_format: None,
            target_format: None,
            counts: None,
            error: None,
            status_code: None,
            output_dir: None,
        }
    }

    pub fn set_formats(&mut self, source: TableFormat, target: TableFormat) {
        self.source_format = Some(source.to_string());
        self.target_format = Some(target.to_string());
    }

    pub fn finish(&mut self, counts: ReconcileCounts, output_dir: PathBuf) {
        self.finished_at = Some(Utc::now());
        self.status = RunStatus::Finished;
        self.counts = Some(counts);
        self.output_dir = Some(output_dir);
    }

    pub fn fail(&mut self, error: &EqualizerError, output_dir: PathBuf) {
        self.finished_at = Some(Utc::now());
        self.status = RunStatus::Failed;
        self.error = Some(error.to_string());
        self.status_code = Some(error.status_code());
        self.output_dir = Some(output_dir);
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds())
    }
}

/// Pretty printer for equalizer output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print the summary of a finished run
    pub fn print_run_summary(report: &RunReport) {
        println!("⚖️  Equalizer run {}", report.run_id);
        println!(
            "├─ Tables: {} → {}",
            report.source_table.as_deref().unwrap_or("?"),
            report.target_table.as_deref().unwrap_or("?")
        );
        if let (Some(source), Some(target)) = (&report.source_format, &report.target_format) {
            println!("├─ Formats: {} / {}", source, target);
        }
        if let Some(counts) = &report.counts {
            println!("├─ ➕ Insert: {}", counts.insert);
            println!("├─ ✏️  Update: {}", counts.update);
            println!("├─ ➖ Delete: {}", counts.delete);
            println!("├─ ✅ Equalized: {}", counts.equalized);
        }
        if let Some(ms) = report.duration_ms() {
            println!("├─ Duration: {} ms", ms);
        }
        match &report.output_dir {
            Some(dir) => println!("└─ Output: {}", dir.display()),
            None => println!("└─ Output: none"),
        }
    }

    /// Print the outcome of a schema compatibility check
    pub fn print_check_result(source: &str, target: &str, problem: Option<&str>) {
        println!("🔍 Checking '{}' against '{}'", source, target);
        match problem {
            None => println!("└─ ✅ Specs are equalizable"),
            Some(message) => println!("└─ ❌ {}", message),
        }
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }

    pub fn format_check_result(source: &str, target: &str, problem: Option<&str>) -> Result<String> {
        let json = serde_json::json!({
            "source": source,
            "target": target,
            "equalizable": problem.is_none(),
            "error": problem,
        });
        Self::format(&json)
    }
}
