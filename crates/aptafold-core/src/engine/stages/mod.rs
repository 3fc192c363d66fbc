pub mod complex;
pub mod folding;
pub mod sampling;
pub mod secondary;

use super::context::RunContext;
use super::error::PipelineError;
use std::time::Duration;

/// What a stage reports besides its artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct StageDiagnostics {
    pub stage: &'static str,
    pub elapsed: Duration,
    pub notes: Vec<String>,
    /// Simulated nanoseconds per wall-clock day, for stages that integrate dynamics.
    pub throughput_ns_per_day: Option<f64>,
}

impl StageDiagnostics {
    pub fn new(stage: &'static str, elapsed: Duration) -> Self {
        Self {
            stage,
            elapsed,
            notes: Vec::new(),
            throughput_ns_per_day: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_throughput(mut self, ns_per_day: f64) -> Self {
        self.throughput_ns_per_day = Some(ns_per_day);
        self
    }
}

#[derive(Debug, Clone)]
pub struct StageOutput<T> {
    pub artifacts: T,
    pub diagnostics: StageDiagnostics,
}

/// A pipeline stage wrapping one external engine.
///
/// Inputs and outputs name their artifacts explicitly, so a single stage can be driven against
/// any directory without the rest of the pipeline. Adapters never swallow errors: a required
/// prior artifact that is absent yields [`PipelineError::MissingInput`], and a failing or
/// misbehaving engine yields [`PipelineError::EngineFailure`].
pub trait StageAdapter {
    type Input;
    type Output;

    fn name(&self) -> &'static str;

    fn execute(
        &self,
        input: &Self::Input,
        ctx: &RunContext,
    ) -> Result<StageOutput<Self::Output>, PipelineError>;
}
