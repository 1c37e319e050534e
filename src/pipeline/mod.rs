//! The pipeline: an ordered chain of byte-buffer stages (spec §3, §4.7).
//!
//! The per-stage `Instant`-based timing and first-failure short-circuit are
//! grounded on `tmineno-pipeit`'s `pipeline.rs` pass runner (`run_pipeline`,
//! `finish_pass`): that runner times each step with `Instant::now()` and
//! aborts on the first error, surfacing which step failed. Here the chain
//! operates over byte buffers rather than compiler artifacts, and deadline
//! checks replace that runner's diagnostic-level error check (spec §5).

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::{NexusError, NexusResult};

/// A stage's transform: reads the current buffer and its `user_data`,
/// produces the next buffer, or fails.
pub type StageFn = Box<dyn Fn(&[u8], &Value) -> NexusResult<Vec<u8>> + Send + Sync>;

pub struct Stage {
    pub name: String,
    func: StageFn,
    pub user_data: Value,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage").field("name", &self.name).field("user_data", &self.user_data).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Single,
    Multi,
    /// Multi-pass when `stage_count > 3`, single-pass otherwise (spec §4.7).
    Auto,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Pre-allocation size for the pipeline's intermediate buffers. Treated
    /// as a capacity hint rather than a hard cap: a stage producing more
    /// bytes than this is never truncated, since silently dropping pipeline
    /// data would be a correctness bug, not a resource limit (an Open
    /// Question in the core's design notes resolved this way — see
    /// `DESIGN.md`).
    pub buffer_size: usize,
    pub max_iterations: usize,
    pub mode: ExecutionMode,
    pub deadline: Option<Duration>,
}

impl PipelineConfig {
    pub fn new(buffer_size: usize, max_iterations: usize, mode: ExecutionMode) -> Self {
        PipelineConfig { buffer_size, max_iterations, mode, deadline: None }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub last_iterations: usize,
    pub last_time_ms: u128,
}

/// The per-pipeline analysis slot the `dependency-analysis` built-in pass
/// populates (spec §4.8) for `optimizer` to consult. Stages in this core
/// carry no declared inter-stage dependencies of their own, so the analysis
/// is simple: it just records the stage count it observed and whether
/// reordering/combining is safe to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineAnalysis {
    pub stage_count: usize,
    pub reorder_safe: bool,
}

/// An ordered chain of stages (spec §3). Stage names are unique within a
/// pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    stages: Vec<Stage>,
    stats: PipelineStats,
    optimized: bool,
    /// Written by an analysis pass (`&Pipeline`), read by a later
    /// transformation/optimization pass (`&mut Pipeline`); a `Mutex` gives
    /// the analysis pass the interior mutability it needs without letting it
    /// touch `stages` itself (spec §4.8: "analysis passes must not mutate
    /// the pipeline structure").
    analysis: Mutex<Option<PipelineAnalysis>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Pipeline {
            config,
            stages: Vec::new(),
            stats: PipelineStats::default(),
            optimized: false,
            analysis: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn is_optimized(&self) -> bool {
        self.optimized
    }

    /// Used by the pass manager's optimizer after a successful reorder/merge
    /// pass; never called by pipeline users directly.
    pub(crate) fn set_optimized(&mut self, optimized: bool) {
        self.optimized = optimized;
    }

    /// Populates the analysis slot. Called by the `dependency-analysis`
    /// built-in pass; takes `&self` since analysis passes only ever see a
    /// shared reference to the pipeline.
    pub fn set_analysis(&self, analysis: PipelineAnalysis) {
        *self.analysis.lock().expect("pipeline analysis lock poisoned") = Some(analysis);
    }

    /// The most recently populated analysis, if any pass has run.
    pub fn analysis(&self) -> Option<PipelineAnalysis> {
        *self.analysis.lock().expect("pipeline analysis lock poisoned")
    }

    /// Appends a stage and marks the pipeline un-optimized (spec §4.7).
    /// Fails with `DuplicateId` if `name` is already taken.
    pub fn add_stage(
        &mut self,
        name: impl Into<String>,
        func: StageFn,
        user_data: Value,
    ) -> NexusResult<()> {
        let name = name.into();
        if self.stages.iter().any(|s| s.name == name) {
            return Err(NexusError::DuplicateId { scope: "pipeline stage".into(), id: name });
        }
        self.stages.push(Stage { name, func, user_data });
        self.optimized = false;
        *self.analysis.lock().expect("pipeline analysis lock poisoned") = None;
        Ok(())
    }

    pub fn get_stats(&self) -> PipelineStats {
        self.stats
    }

    fn effective_mode(&self) -> ExecutionMode {
        match self.config.mode {
            ExecutionMode::Auto => {
                if self.stages.len() > 3 {
                    ExecutionMode::Multi
                } else {
                    ExecutionMode::Single
                }
            },
            other => other,
        }
    }

    /// Runs the chain, dispatching by `config.mode` (resolving `Auto` per
    /// spec §4.7). Updates `get_stats()` on return, success or failure.
    pub fn execute(&mut self, input: &[u8]) -> NexusResult<Vec<u8>> {
        let started = Instant::now();
        let result = match self.effective_mode() {
            ExecutionMode::Single => self.run_single_pass(input, started).map(|out| (out, 1)),
            ExecutionMode::Multi => self.run_multi_pass(input, started),
            ExecutionMode::Auto => unreachable!("effective_mode never returns Auto"),
        };
        self.stats.last_time_ms = started.elapsed().as_millis();
        match result {
            Ok((output, iterations)) => {
                self.stats.last_iterations = iterations;
                Ok(output)
            },
            Err(e) => Err(e),
        }
    }

    fn check_deadline(&self, started: Instant, last_stage: &str, last_iteration: usize) -> NexusResult<()> {
        if let Some(deadline) = self.config.deadline {
            if started.elapsed() >= deadline {
                return Err(NexusError::Cancelled { last_stage: last_stage.to_owned(), last_iteration });
            }
        }
        Ok(())
    }

    fn run_single_pass(&self, input: &[u8], started: Instant) -> NexusResult<Vec<u8>> {
        let mut buffer = Vec::with_capacity(self.config.buffer_size.max(input.len()));
        buffer.extend_from_slice(input);
        for stage in &self.stages {
            buffer = (stage.func)(&buffer, &stage.user_data)
                .map_err(|e| NexusError::PassFailed { pass: stage.name.clone(), message: e.to_string() })?;
            self.check_deadline(started, &stage.name, 0)?;
        }
        Ok(buffer)
    }

    /// Multi-pass to convergence: re-runs the full stage chain each
    /// iteration, comparing the result against that iteration's input.
    /// Terminates at convergence or `max_iterations`, whichever comes first
    /// (spec §4.7; hitting the cap is a non-fatal warning the caller can
    /// read off `get_stats().last_iterations == max_iterations`).
    fn run_multi_pass(&self, input: &[u8], started: Instant) -> NexusResult<(Vec<u8>, usize)> {
        let mut source = Vec::with_capacity(self.config.buffer_size.max(input.len()));
        source.extend_from_slice(input);
        let max_iterations = self.config.max_iterations.max(1);

        for iteration in 1..=max_iterations {
            let mut target = source.clone();
            for stage in &self.stages {
                target = (stage.func)(&target, &stage.user_data)
                    .map_err(|e| NexusError::PassFailed { pass: stage.name.clone(), message: e.to_string() })?;
            }
            let last_stage_name = self.stages.last().map(|s| s.name.as_str()).unwrap_or("");
            self.check_deadline(started, last_stage_name, iteration)?;

            let converged = target == source;
            if converged || iteration == max_iterations {
                return Ok((target, iteration));
            }
            source = target;
        }
        unreachable!("loop always returns by max_iterations")
    }
}

fn uppercase_ascii(input: &[u8], _user_data: &Value) -> NexusResult<Vec<u8>> {
    Ok(input.iter().map(|b| b.to_ascii_uppercase()).collect())
}

fn reverse_bytes(input: &[u8], _user_data: &Value) -> NexusResult<Vec<u8>> {
    let mut out = input.to_vec();
    out.reverse();
    Ok(out)
}

/// Small built-in stage constructors used by tests and simple pipelines; not
/// part of the spec's named built-ins (those are passes, see
/// `crate::passes::builtin`) but convenient stand-ins for the scenario in
/// spec §8 ("two stages `upper` ... and `reverse`").
pub fn stage_uppercase() -> StageFn {
    Box::new(uppercase_ascii)
}

pub fn stage_reverse() -> StageFn {
    Box::new(reverse_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_stage_pipeline(mode: ExecutionMode, max_iterations: usize) -> Pipeline {
        let mut pipeline = Pipeline::new(PipelineConfig::new(1024, max_iterations, mode));
        pipeline.add_stage("upper", stage_uppercase(), Value::Null).unwrap();
        pipeline.add_stage("reverse", stage_reverse(), Value::Null).unwrap();
        pipeline
    }

    #[test]
    fn duplicate_stage_name_rejected_and_marks_unoptimized() {
        let mut pipeline = two_stage_pipeline(ExecutionMode::Single, 4);
        assert!(!pipeline.is_optimized());
        let err = pipeline.add_stage("upper", stage_uppercase(), Value::Null).unwrap_err();
        assert!(matches!(err, NexusError::DuplicateId { .. }));
    }

    #[test]
    fn single_pass_chains_stages_in_order() {
        let mut pipeline = two_stage_pipeline(ExecutionMode::Single, 4);
        let output = pipeline.execute(b"abcd").unwrap();
        assert_eq!(output, b"DCBA");
        assert_eq!(pipeline.get_stats().last_iterations, 1);
    }

    #[test]
    fn multi_pass_oscillates_without_converging_until_max_iterations() {
        let mut pipeline = two_stage_pipeline(ExecutionMode::Multi, 4);
        let output = pipeline.execute(b"abcd").unwrap();
        // upper is not invertible, so the chain settles into a two-cycle
        // between "DCBA" and "ABCD" rather than returning to "abcd": iteration
        // 1 -> "DCBA", iteration 2 -> "ABCD", iteration 3 -> "DCBA", iteration
        // 4 -> "ABCD". It never converges and runs to the cap.
        assert_eq!(pipeline.get_stats().last_iterations, 4);
        assert_eq!(output, b"ABCD");
    }

    #[test]
    fn auto_mode_picks_single_pass_at_or_below_three_stages() {
        let mut pipeline = two_stage_pipeline(ExecutionMode::Auto, 4);
        let output = pipeline.execute(b"abcd").unwrap();
        assert_eq!(output, b"DCBA");
        assert_eq!(pipeline.get_stats().last_iterations, 1);
    }

    #[test]
    fn auto_mode_picks_multi_pass_above_three_stages() {
        let mut pipeline = Pipeline::new(PipelineConfig::new(1024, 4, ExecutionMode::Auto));
        for i in 0..4 {
            pipeline.add_stage(format!("noop{}", i), Box::new(|b: &[u8], _: &Value| Ok(b.to_vec())), Value::Null).unwrap();
        }
        pipeline.execute(b"abcd").unwrap();
        // a no-op chain converges on its first iteration.
        assert_eq!(pipeline.get_stats().last_iterations, 1);
    }

    #[test]
    fn stage_failure_surfaces_stage_name() {
        let mut pipeline = Pipeline::new(PipelineConfig::new(64, 1, ExecutionMode::Single));
        pipeline
            .add_stage("always_fails", Box::new(|_: &[u8], _: &Value| {
                Err(NexusError::Internal("boom".into()))
            }), Value::Null)
            .unwrap();
        let err = pipeline.execute(b"x").unwrap_err();
        match err {
            NexusError::PassFailed { pass, .. } => assert_eq!(pass, "always_fails"),
            other => panic!("expected PassFailed, got {:?}", other),
        }
    }

    #[test]
    fn deadline_reached_cancels_with_last_stage_context() {
        let mut pipeline = two_stage_pipeline(ExecutionMode::Single, 1);
        let mut config = pipeline.config().clone();
        config.deadline = Some(Duration::from_secs(0));
        pipeline = Pipeline::new(config);
        pipeline.add_stage("upper", stage_uppercase(), Value::Null).unwrap();
        let err = pipeline.execute(b"abcd").unwrap_err();
        assert!(matches!(err, NexusError::Cancelled { .. }));
    }
}
