//! The versioned symbol resolver (spec §4.5) and its external policy hook
//! (spec §6).

use indexmap::IndexMap;

use crate::component::Component;
use crate::error::{NexusError, NexusResult};
use crate::graph::DependencyGraph;
use crate::registry::{Registry, Tier};
use crate::symbol::{Symbol, SymbolKind};
use crate::version::Constraint;

/// One simultaneously-reachable-version conflict (spec §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub name: String,
    pub versions: Vec<String>,
    pub providers: Vec<String>,
}

/// The outcome of the external range-state policy callback (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allowed,
    RequiresValidation,
    Denied,
}

type PolicyFn = dyn Fn(&str, &str, bool) -> PolicyDecision + Send + Sync;

/// Resolves symbol queries against a registry and dependency graph.
///
/// Performs no I/O and never blocks (spec §5): every method here is a pure
/// function of the registry/graph state at the time of the call, aside from
/// the `ref_count` bump and imported-tier cache insert `resolve` performs as
/// its one side effect.
pub struct Resolver<'a> {
    registry: &'a Registry,
    graph: &'a DependencyGraph,
    policy: Option<Box<PolicyFn>>,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a Registry, graph: &'a DependencyGraph) -> Self {
        Resolver { registry, graph, policy: None }
    }

    pub fn with_policy<F>(mut self, policy: F) -> Self
    where
        F: Fn(&str, &str, bool) -> PolicyDecision + Send + Sync + 'static,
    {
        self.policy = Some(Box::new(policy));
        self
    }

    /// Consults the configured policy callback, falling back to the default
    /// partial-order policy (spec §6) when none was supplied: allowed iff
    /// `source == target`, or (when not strict) `source` is strictly newer in
    /// the fixed order `experimental < stable < legacy`, with `legacy`
    /// terminal (no outgoing transition from `legacy`, even non-strict).
    pub fn check_policy(&self, source_state: &str, target_state: &str, strict: bool) -> PolicyDecision {
        if let Some(policy) = &self.policy {
            return policy(source_state, target_state, strict);
        }
        default_policy(source_state, target_state, strict)
    }

    /// The core query (spec §4.5, steps 1-7).
    pub fn resolve(
        &self,
        name: &str,
        constraint: Option<&Constraint>,
        requester: &str,
    ) -> NexusResult<Symbol> {
        self.resolve_with_kind(name, constraint, None, requester)
    }

    /// As [`Resolver::resolve`], additionally rejecting candidates whose kind
    /// doesn't match `expected_kind`.
    pub fn resolve_typed(
        &self,
        name: &str,
        constraint: Option<&Constraint>,
        expected_kind: SymbolKind,
        requester: &str,
    ) -> NexusResult<Symbol> {
        self.resolve_with_kind(name, constraint, Some(expected_kind), requester)
    }

    fn resolve_with_kind(
        &self,
        name: &str,
        constraint: Option<&Constraint>,
        expected_kind: Option<SymbolKind>,
        requester: &str,
    ) -> NexusResult<Symbol> {
        if let Some(found) = self.best_candidate(Tier::Exported, name, constraint, requester, true) {
            return self.finalize(found, name, constraint, expected_kind, requester);
        }
        if let Some(found) = self.best_candidate(Tier::Global, name, constraint, requester, false) {
            return self.finalize(found, name, constraint, expected_kind, requester);
        }
        Err(NexusError::Unresolved {
            name: name.to_owned(),
            constraint: constraint.map(|c| c.to_string()),
            requester: requester.to_owned(),
        })
    }

    fn finalize(
        &self,
        candidate: Symbol,
        name: &str,
        constraint: Option<&Constraint>,
        expected_kind: Option<SymbolKind>,
        requester: &str,
    ) -> NexusResult<Symbol> {
        if let Some(expected) = expected_kind {
            if candidate.kind != expected {
                return Err(NexusError::KindMismatch { name: name.to_owned(), expected, found: candidate.kind });
            }
        }
        // step 5: bump ref_count, ensure an imported-tier cache entry exists.
        let tier = if self.registry.find_all(Tier::Exported, name).iter().any(|s| {
            s.version == candidate.version && s.component_id == candidate.component_id
        }) {
            Tier::Exported
        } else {
            Tier::Global
        };
        self.registry.bump_ref_count(tier, name, &candidate.version, &candidate.component_id);
        if self.registry.find_imported(name, requester).is_none() {
            let cached = candidate.clone().with_imported_for(requester);
            // Best effort: a concurrent resolver may have raced us to the same
            // cache slot; either outcome leaves a valid cache entry in place.
            let _ = self.registry.add(Tier::Imported, cached);
        }
        let _ = constraint;
        Ok(candidate)
    }

    /// Steps 1-4: enumerate, filter, score, and pick the winning candidate in
    /// `tier`. `apply_edge_filter` is `false` for the global-tier fallback
    /// (step 6: "edge constraints do not apply to globals").
    fn best_candidate(
        &self,
        tier: Tier,
        name: &str,
        constraint: Option<&Constraint>,
        requester: &str,
        apply_edge_filter: bool,
    ) -> Option<Symbol> {
        let all = self.registry.find_all(tier, name);
        let mut best: Option<(Symbol, i64, usize)> = None;

        for (insertion_index, symbol) in all.into_iter().enumerate() {
            if let Some(c) = constraint {
                if !c.satisfies(&symbol.version) {
                    continue;
                }
            }

            let is_direct = self.graph.is_direct_dependency(requester, &symbol.component_id);
            if apply_edge_filter {
                if let Some(edge_constraint) = self.graph.edge_constraint(requester, &symbol.component_id) {
                    if !edge_constraint.satisfies(&symbol.version) {
                        continue;
                    }
                }
            }

            let effective_priority = symbol.priority + if is_direct { 1000 } else { 0 };

            let replace = match &best {
                None => true,
                Some((current, current_priority, current_index)) => {
                    effective_priority
                        .cmp(current_priority)
                        .then_with(|| symbol.version.cmp(&current.version))
                        .then_with(|| current_index.cmp(&insertion_index))
                        == std::cmp::Ordering::Greater
                },
            };
            if replace {
                best = Some((symbol, effective_priority, insertion_index));
            }
        }

        best.map(|(symbol, _, _)| symbol)
    }

    /// A symbol name for which the exported tier holds two or more distinct
    /// versions simultaneously reachable through `requester`'s dependency
    /// closure (spec §4.5).
    pub fn detect_conflicts(&self, requester: &str) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        for name in self.registry.names(Tier::Exported) {
            let symbols = self.registry.find_all(Tier::Exported, &name);
            let mut by_version: IndexMap<String, String> = IndexMap::new();
            for symbol in &symbols {
                let reachable = symbol.component_id == requester
                    || self.graph.is_reachable(requester, &symbol.component_id);
                if reachable {
                    by_version.entry(symbol.version.to_string()).or_insert_with(|| symbol.component_id.clone());
                }
            }
            if by_version.len() > 1 {
                conflicts.push(Conflict {
                    name,
                    versions: by_version.keys().cloned().collect(),
                    providers: by_version.values().cloned().collect(),
                });
            }
        }
        conflicts
    }
}

fn policy_rank(state: &str) -> Option<u8> {
    match state {
        "experimental" => Some(0),
        "stable" => Some(1),
        "legacy" => Some(2),
        _ => None,
    }
}

fn default_policy(source: &str, target: &str, strict: bool) -> PolicyDecision {
    if source == target {
        return PolicyDecision::Allowed;
    }
    if source == "legacy" {
        return PolicyDecision::Denied;
    }
    if strict {
        return PolicyDecision::Denied;
    }
    match (policy_rank(source), policy_rank(target)) {
        (Some(s), Some(t)) if s > t => PolicyDecision::Allowed,
        _ => PolicyDecision::Denied,
    }
}

/// Convenience used by metadata-driven callers: builds a resolver-ready
/// [`DependencyGraph`] for `root` against `available`, a thin wrapper kept
/// here so call sites don't need to import `graph::DependencyGraph`
/// separately just to drive a resolve.
pub fn graph_for(root: &Component, available: &[Component]) -> DependencyGraph {
    DependencyGraph::build(root, available)
}
