//! Named built-in passes (spec §4.8), grounded on the same three roles
//! `tmineno-pipeit`'s `ALL_PASSES` enumerates for its own pipeline: an
//! analysis step that only inspects state, a transformation step that
//! reshapes it, and an optimization step that runs last.

use log::{debug, warn};

use crate::error::{NexusError, NexusResult};
use crate::pipeline::{Pipeline, PipelineAnalysis};

use super::Pass;

/// Analysis: populates the pipeline's per-run analysis slot (spec §4.8:
/// "dependency-analysis (populates a per-pipeline analysis slot)"). Stages in
/// this core declare no dependencies on one another, so the analysis is
/// simple: it records the observed stage count and that reordering/combining
/// is safe, for `optimizer` to consult.
pub fn dependency_analysis() -> Pass {
    Pass::analysis("dependency-analysis", Box::new(|pipeline: &Pipeline| -> NexusResult<()> {
        let stage_count = pipeline.stages().len();
        pipeline.set_analysis(PipelineAnalysis { stage_count, reorder_safe: true });
        debug!("dependency-analysis: {} stages, reorder_safe=true", stage_count);
        Ok(())
    }))
}

/// Analysis: checks stage-name uniqueness and the pipeline's configured
/// execution constraints (spec §4.8: "validator (checks stage-name
/// uniqueness and configured constraints)"). Stage uniqueness is already
/// enforced at `add_stage` time, so this exists as a standing invariant check
/// for pipelines assembled by other means (e.g. deserialized from persisted
/// state); the configured-constraints check rejects a zero buffer size or
/// iteration cap, either of which would otherwise make `execute` silently
/// useless.
pub fn validator() -> Pass {
    Pass::analysis("validator", Box::new(|pipeline: &Pipeline| -> NexusResult<()> {
        let mut seen = std::collections::HashSet::new();
        for stage in pipeline.stages() {
            if !seen.insert(stage.name.as_str()) {
                return Err(NexusError::DuplicateId {
                    scope: "pipeline stage".into(),
                    id: stage.name.clone(),
                });
            }
        }

        let config = pipeline.config();
        if config.buffer_size == 0 {
            return Err(NexusError::InvalidInput {
                segment: "buffer_size".into(),
                message: "pipeline buffer_size must be non-zero".into(),
            });
        }
        if config.max_iterations == 0 {
            return Err(NexusError::InvalidInput {
                segment: "max_iterations".into(),
                message: "pipeline max_iterations must be non-zero".into(),
            });
        }

        if pipeline.stages().is_empty() {
            warn!("validator: pipeline has no stages");
        }
        Ok(())
    }))
}

/// Optimization: marks the pipeline optimized, provided `dependency-analysis`
/// declared it safe (spec §4.8: "optimizer (performs stage reordering and
/// combining when declared safe by the analysis pass)"). A real
/// fusion/reorder strategy would act on `pipeline.stages()` here; this core
/// ships the hook and the bookkeeping, not a specific fusion strategy (spec
/// Non-goals exclude prescribing one).
pub fn optimizer() -> Pass {
    Pass::optimization("optimizer", Box::new(|pipeline: &mut Pipeline| -> NexusResult<()> {
        let safe = pipeline.analysis().map(|a| a.reorder_safe).unwrap_or(false);
        if safe {
            pipeline.set_optimized(true);
        }
        Ok(())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::PassManager;
    use crate::pipeline::{stage_uppercase, ExecutionMode, PipelineConfig};
    use serde_json::Value;

    #[test]
    fn builtin_trio_runs_in_phase_order_and_optimizes() {
        let mut manager = PassManager::new();
        manager.add_pass(optimizer());
        manager.add_pass(validator());
        manager.add_pass(dependency_analysis());

        let mut pipeline = Pipeline::new(PipelineConfig::new(64, 1, ExecutionMode::Single));
        pipeline.add_stage("upper", stage_uppercase(), Value::Null).unwrap();

        let executed = manager.run(&mut pipeline).unwrap();
        assert_eq!(executed, vec!["dependency-analysis", "validator", "optimizer"]);
        assert!(pipeline.is_optimized());
    }

    #[test]
    fn validator_rejects_zero_buffer_size() {
        let mut manager = PassManager::new();
        manager.add_pass(validator());

        let mut pipeline = Pipeline::new(PipelineConfig::new(0, 1, ExecutionMode::Single));
        pipeline.add_stage("upper", stage_uppercase(), Value::Null).unwrap();

        let err = manager.run(&mut pipeline).unwrap_err();
        assert!(matches!(err, NexusError::PassFailed { .. }));
    }

    #[test]
    fn optimizer_only_marks_optimized_when_analysis_ran_first() {
        let mut manager = PassManager::new();
        manager.add_pass(optimizer());

        let mut pipeline = Pipeline::new(PipelineConfig::new(64, 1, ExecutionMode::Single));
        manager.run(&mut pipeline).unwrap();
        assert!(!pipeline.is_optimized());
    }
}
