use crate::engine::RunSummary;
use crate::resource::GateDecision;
use crate::scanner::Decision;
use std::path::Path;

/// Trait for observing a collection run.
///
/// The CLI implements it with indicatif; tests record decisions through it.
/// All methods have default no-op implementations.
pub trait RunReporter {
    fn on_run_start(&self) {}
    fn on_gate(&self, _decision: &GateDecision) {}
    fn on_location_start(&self, _location: &Path) {}
    fn on_decision(&self, _path: &Path, _decision: &Decision) {}
    fn on_run_complete(&self, _summary: &RunSummary) {}
}

/// No-op reporter for silent operation.
pub struct SilentReporter;

impl RunReporter for SilentReporter {}
