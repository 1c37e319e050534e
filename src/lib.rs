//! NexusLink: a dynamic component linker and build-orchestration core.
//!
//! Three subsystems, independently usable: versioned symbol resolution
//! (`version`, `symbol`, `registry`, `component`, `graph`, `resolver`), DFA
//! minimization (`automaton`), and pipeline/pass scheduling (`pipeline`,
//! `passes`). `error` carries the shared result and error taxonomy; `lazy`
//! is a small shared utility used where construction is deferred.

pub mod automaton;
pub mod component;
pub mod error;
pub mod graph;
pub mod lazy;
pub mod passes;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod symbol;
pub mod version;

pub use automaton::minimize::{MinimizationLevel, MinimizationMetrics};
pub use automaton::{Dfa, DfaDoc, InputSymbol, State};
pub use component::{Component, DependencyRef, ExportSpec, ImportSpec};
pub use error::{NexusError, NexusResult};
pub use graph::DependencyGraph;
pub use lazy::LazyBinding;
pub use passes::{Pass, PassKind, PassManager};
pub use pipeline::{ExecutionMode, Pipeline, PipelineAnalysis, PipelineConfig, PipelineStats};
pub use registry::{Registry, Tier};
pub use resolver::{graph_for, Conflict, PolicyDecision, Resolver};
pub use symbol::{Symbol, SymbolKind};
pub use version::{Constraint, Version};
