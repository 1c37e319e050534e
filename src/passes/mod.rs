//! The pass manager: phase-ordered execution over a pipeline (spec §3, §4.8).
//!
//! Grounded on `tmineno-pipeit`'s `pass.rs`/`pipeline.rs` pair: that crate
//! gives each pass a `PassId`, a `PassDescriptor`, and drives them through
//! `required_passes()`/`run_pipeline()`'s `match`-dispatch with per-pass
//! error propagation naming the failing pass. Here passes are grouped into
//! three fixed phases instead of an arbitrary dependency DAG (spec §4.8:
//! "all analysis passes run before any transformation pass, which runs
//! before any optimization pass, regardless of insertion order"), but the
//! shape — a descriptor, a dispatch loop, a failure that carries the pass's
//! name — is the same.

pub mod builtin;

use crate::error::{NexusError, NexusResult};
use crate::pipeline::Pipeline;

/// The three fixed execution phases (spec §4.8). Declaration order doubles
/// as phase order via the derived `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PassKind {
    Analysis,
    Transformation,
    Optimization,
}

/// An analysis pass only observes the pipeline; it must not add, remove, or
/// reorder stages (spec §4.8 contract). Enforced here by type: analysis
/// actions only ever receive a shared reference.
type AnalyzeFn = Box<dyn Fn(&Pipeline) -> NexusResult<()> + Send + Sync>;
type MutateFn = Box<dyn Fn(&mut Pipeline) -> NexusResult<()> + Send + Sync>;

enum Action {
    Analyze(AnalyzeFn),
    Transform(MutateFn),
    Optimize(MutateFn),
}

pub struct Pass {
    pub name: String,
    action: Action,
}

impl Pass {
    pub fn analysis(name: impl Into<String>, func: AnalyzeFn) -> Self {
        Pass { name: name.into(), action: Action::Analyze(func) }
    }

    pub fn transformation(name: impl Into<String>, func: MutateFn) -> Self {
        Pass { name: name.into(), action: Action::Transform(func) }
    }

    pub fn optimization(name: impl Into<String>, func: MutateFn) -> Self {
        Pass { name: name.into(), action: Action::Optimize(func) }
    }

    pub fn kind(&self) -> PassKind {
        match self.action {
            Action::Analyze(_) => PassKind::Analysis,
            Action::Transform(_) => PassKind::Transformation,
            Action::Optimize(_) => PassKind::Optimization,
        }
    }

    fn run(&self, pipeline: &mut Pipeline) -> NexusResult<()> {
        let result = match &self.action {
            Action::Analyze(f) => f(&*pipeline),
            Action::Transform(f) => f(pipeline),
            Action::Optimize(f) => f(pipeline),
        };
        result.map_err(|e| NexusError::PassFailed { pass: self.name.clone(), message: e.to_string() })
    }
}

/// Holds an unordered list of passes and runs them phase-by-phase,
/// regardless of insertion order (spec §8 scenario 5).
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Pass>,
}

impl PassManager {
    pub fn new() -> Self {
        PassManager { passes: Vec::new() }
    }

    pub fn add_pass(&mut self, pass: Pass) {
        self.passes.push(pass);
    }

    /// The order passes will execute in, without running them: a dry-run
    /// planning view over the fixed phase ordering.
    pub fn plan(&self) -> Vec<(String, PassKind)> {
        self.ordered().into_iter().map(|p| (p.name.clone(), p.kind())).collect()
    }

    /// Runs every pass in phase order (analysis, then transformation, then
    /// optimization; insertion order preserved within a phase). Returns the
    /// names of passes that ran, in execution order. Aborts on the first
    /// failing pass, propagating `PassFailed { pass, .. }` for that pass.
    pub fn run(&self, pipeline: &mut Pipeline) -> NexusResult<Vec<String>> {
        let mut executed = Vec::with_capacity(self.passes.len());
        for pass in self.ordered() {
            pass.run(pipeline)?;
            executed.push(pass.name.clone());
        }
        Ok(executed)
    }

    fn ordered(&self) -> Vec<&Pass> {
        let mut order: Vec<&Pass> = self.passes.iter().collect();
        order.sort_by_key(|p| p.kind());
        order
    }
}
