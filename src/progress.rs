//! Progress reporting utilities

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner-per-phase reporter for batch runs
#[derive(Debug)]
pub struct ProgressReporter {
    pub load_pb: Option<ProgressBar>,
    pub reconcile_pb: Option<ProgressBar>,
    pub write_pb: Option<ProgressBar>,
    show_progress: bool,
}

impl ProgressReporter {
    /// Create progress reporter for a run; later phases are created lazily
    pub fn new_for_run() -> Self {
        Self {
            load_pb: Some(create_spinner("Loading specs and data...")),
            reconcile_pb: None,
            write_pb: None,
            show_progress: true,
        }
    }

    /// Create minimal progress reporter (no progress bars)
    pub fn new_minimal() -> Self {
        Self {
            load_pb: None,
            reconcile_pb: None,
            write_pb: None,
            show_progress: false,
        }
    }

    pub fn finish_load(&mut self, message: &str) {
        if let Some(pb) = self.load_pb.take() {
            pb.finish_with_message(message.to_string());
        }
        if self.show_progress && self.reconcile_pb.is_none() {
            self.reconcile_pb = Some(create_spinner("Reconciling tables..."));
        }
    }

    pub fn finish_reconcile(&mut self, message: &str) {
        if let Some(pb) = self.reconcile_pb.take() {
            pb.finish_with_message(message.to_string());
        }
        if self.show_progress && self.write_pb.is_none() {
            self.write_pb = Some(create_spinner("Writing results..."));
        }
    }

    pub fn finish_write(&mut self, message: &str) {
        if let Some(pb) = self.write_pb.take() {
            pb.finish_with_message(message.to_string());
        }
    }

    /// Clear whatever phase is still running, e.g. after a failure
    pub fn abandon(&mut self) {
        for pb in [
            self.load_pb.take(),
            self.reconcile_pb.take(),
            self.write_pb.take(),
        ]
        .into_iter()
        .flatten()
        {
            pb.finish_and_clear();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.abandon();
    }
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
