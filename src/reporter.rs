use disk_janitor::engine::RunSummary;
use disk_janitor::scanner::Decision;
use disk_janitor::RunReporter;
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::Cell;
use std::path::Path;
use std::time::Duration;

/// CLI reporter: a spinner showing the current location and files checked.
pub struct CliReporter {
    bar: ProgressBar,
    checked: Cell<usize>,
}

impl CliReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        Self {
            bar,
            checked: Cell::new(0),
        }
    }
}

impl RunReporter for CliReporter {
    fn on_run_start(&self) {
        self.bar.set_message("Checking system resources...");
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_location_start(&self, location: &Path) {
        self.bar
            .set_message(format!("Scanning {}...", location.display()));
    }

    fn on_decision(&self, _path: &Path, _decision: &Decision) {
        let checked = self.checked.get() + 1;
        self.checked.set(checked);
        self.bar.set_message(format!("{} files checked", checked));
    }

    fn on_run_complete(&self, _summary: &RunSummary) {
        self.bar.finish_and_clear();
    }
}
