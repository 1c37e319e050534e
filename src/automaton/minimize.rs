//! Hopcroft partition-refinement minimization and boolean reduction
//! (spec §4.6).

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use super::{Dfa, InputSymbol, State};

/// Minimization depth, in increasing order of work performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MinimizationLevel {
    /// Return an unchanged clone.
    None,
    /// Drop states unreachable from the initial state; no equivalence
    /// merging.
    Basic,
    /// Full Hopcroft partition refinement.
    Standard,
    /// Hopcroft, then merge alphabet symbols indistinguishable on every
    /// state.
    Aggressive,
}

/// Per-run minimization metrics (spec §4.6). `original_bytes`/
/// `minimized_bytes` describe the underlying component file and are supplied
/// by the caller — the automaton itself carries no byte size of its own.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MinimizationMetrics {
    pub original_states: usize,
    pub minimized_states: usize,
    pub original_bytes: u64,
    pub minimized_bytes: u64,
    pub elapsed_ms: u128,
    pub boolean_reduction: bool,
}

impl Dfa {
    /// Minimizes at `level`, returning the fresh automaton and the metrics
    /// for this run. The input automaton is never mutated (spec §5).
    pub fn minimize(&self, level: MinimizationLevel, byte_sizes: Option<(u64, u64)>) -> (Dfa, MinimizationMetrics) {
        let start = Instant::now();
        let original_states = self.states.len();

        // `Standard`/`Aggressive` run Hopcroft over the state set exactly as
        // given (spec §4.6: "STANDARD = full Hopcroft"), without first
        // reachability-pruning — only `Basic` does that. An automaton built
        // with disconnected components still partitions correctly; Hopcroft
        // doesn't require single-rootedness.
        let result = match level {
            MinimizationLevel::None => self.clone(),
            MinimizationLevel::Basic => remove_unreachable(self),
            MinimizationLevel::Standard => hopcroft(self),
            MinimizationLevel::Aggressive => boolean_reduce(&hopcroft(self)),
        };

        let elapsed_ms = start.elapsed().as_millis();
        let (original_bytes, minimized_bytes) = byte_sizes.unwrap_or((0, 0));
        let metrics = MinimizationMetrics {
            original_states,
            minimized_states: result.states.len(),
            original_bytes,
            minimized_bytes,
            elapsed_ms,
            boolean_reduction: level == MinimizationLevel::Aggressive,
        };
        (result, metrics)
    }
}

fn remove_unreachable(dfa: &Dfa) -> Dfa {
    let reachable = dfa.reachable_states();
    let mut out = Dfa::default();
    out.initial = dfa.initial;
    for state in &dfa.states {
        if !reachable.contains(&state.id) {
            continue;
        }
        if state.is_final {
            out.finals.insert(state.id);
        }
        out.index.insert(state.id, out.states.len());
        out.states.push(State {
            id: state.id,
            is_final: state.is_final,
            transitions: state.transitions.iter().filter(|(_, t)| reachable.contains(t)).cloned().collect(),
        });
    }
    out
}

/// Spec §4.6 steps 1-4, implemented literally over set-valued blocks.
fn hopcroft(dfa: &Dfa) -> Dfa {
    let all_ids: BTreeSet<u32> = dfa.states.iter().map(|s| s.id).collect();
    if all_ids.is_empty() {
        return dfa.clone();
    }

    let finals: BTreeSet<u32> = dfa.finals.iter().cloned().filter(|id| all_ids.contains(id)).collect();
    let non_finals: BTreeSet<u32> = all_ids.difference(&finals).cloned().collect();

    let mut partition: Vec<BTreeSet<u32>> = Vec::new();
    if !finals.is_empty() {
        partition.push(finals.clone());
    }
    if !non_finals.is_empty() {
        partition.push(non_finals.clone());
    }

    let mut worklist: Vec<BTreeSet<u32>> = Vec::new();
    match (finals.is_empty(), non_finals.is_empty()) {
        (false, false) => {
            if finals.len() <= non_finals.len() {
                worklist.push(finals.clone());
            } else {
                worklist.push(non_finals.clone());
            }
        },
        (false, true) => worklist.push(finals.clone()),
        (true, false) => worklist.push(non_finals.clone()),
        (true, true) => {},
    }

    let alphabet = dfa.alphabet();

    while let Some(a) = worklist.pop() {
        for symbol in &alphabet {
            let x: BTreeSet<u32> = dfa
                .states
                .iter()
                .filter(|s| s.transitions.iter().any(|(sym, target)| sym == symbol && a.contains(target)))
                .map(|s| s.id)
                .collect();
            if x.is_empty() {
                continue;
            }

            let mut next_partition = Vec::with_capacity(partition.len() + 1);
            for y in &partition {
                let inter: BTreeSet<u32> = y.intersection(&x).cloned().collect();
                let diff: BTreeSet<u32> = y.difference(&x).cloned().collect();
                if !inter.is_empty() && !diff.is_empty() {
                    if let Some(pos) = worklist.iter().position(|w| w == y) {
                        worklist.remove(pos);
                        worklist.push(inter.clone());
                        worklist.push(diff.clone());
                    } else if inter.len() <= diff.len() {
                        worklist.push(inter.clone());
                    } else {
                        worklist.push(diff.clone());
                    }
                    next_partition.push(inter);
                    next_partition.push(diff);
                } else {
                    next_partition.push(y.clone());
                }
            }
            partition = next_partition;
        }
    }

    build_from_partition(dfa, partition)
}

fn build_from_partition(dfa: &Dfa, mut partition: Vec<BTreeSet<u32>>) -> Dfa {
    partition.sort_by_key(|block| *block.iter().next().expect("blocks are never empty"));

    let block_of = |state_id: u32| -> u32 {
        partition.iter().position(|b| b.contains(&state_id)).expect("every state belongs to some block") as u32
    };

    let mut out = Dfa::default();
    for (new_id, block) in partition.iter().enumerate() {
        let new_id = new_id as u32;
        let representative = *block.iter().next().expect("blocks are never empty");
        let rep_state = dfa.states.iter().find(|s| s.id == representative).expect("representative state exists");
        let is_final = block.iter().any(|id| dfa.finals.contains(id));

        let transitions: Vec<(InputSymbol, u32)> =
            rep_state.transitions.iter().map(|(symbol, target)| (symbol.clone(), block_of(*target))).collect();

        out.index.insert(new_id, out.states.len());
        if is_final {
            out.finals.insert(new_id);
        }
        out.states.push(State { id: new_id, is_final, transitions });
    }

    let initial_id = dfa.initial.expect("non-empty automaton always has an initial state");
    out.initial = Some(block_of(initial_id));
    out
}

/// Merges alphabet symbols that carry every state to the same target (or
/// leave it undefined) into one canonical symbol, joined with `|` (spec
/// §4.6, aggressive level). Language acceptance is unaffected since the
/// merged symbols were already indistinguishable.
fn boolean_reduce(dfa: &Dfa) -> Dfa {
    let alphabet: Vec<InputSymbol> = dfa.alphabet().into_iter().collect();
    if alphabet.is_empty() {
        return dfa.clone();
    }

    let state_ids: Vec<u32> = dfa.states.iter().map(|s| s.id).collect();
    let mut groups: HashMap<Vec<Option<u32>>, Vec<InputSymbol>> = HashMap::new();
    for symbol in &alphabet {
        let signature: Vec<Option<u32>> = state_ids.iter().map(|id| dfa.step(*id, symbol)).collect();
        groups.entry(signature).or_default().push(symbol.clone());
    }

    let mut canonical_of: HashMap<InputSymbol, InputSymbol> = HashMap::new();
    for symbols in groups.values() {
        let mut sorted = symbols.clone();
        sorted.sort();
        let canonical = sorted.join("|");
        for s in &sorted {
            canonical_of.insert(s.clone(), canonical.clone());
        }
    }

    let mut out = dfa.clone();
    for state in out.states.iter_mut() {
        let mut seen = BTreeSet::new();
        let mut merged = Vec::new();
        for (symbol, target) in &state.transitions {
            let canonical = canonical_of.get(symbol).cloned().unwrap_or_else(|| symbol.clone());
            if seen.insert(canonical.clone()) {
                merged.push((canonical, *target));
            }
        }
        state.transitions = merged;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds the ten-state automaton from the core's scenario catalogue: two
    /// equivalent paths `q0-a->q1-b->q2-c->q8` / `q3-a->q4-b->q5-c->q8`
    /// (both accepting via q8), plus an unrelated `q6-a->q7-d->q9` (accepting
    /// via q9).
    fn scenario_dfa() -> Dfa {
        let mut dfa = Dfa::create();
        for id in 0..10u32 {
            dfa.add_state(id, id == 8 || id == 9).unwrap();
        }
        dfa.add_transition(0, 1, "a").unwrap();
        dfa.add_transition(1, 2, "b").unwrap();
        dfa.add_transition(2, 8, "c").unwrap();
        dfa.add_transition(3, 4, "a").unwrap();
        dfa.add_transition(4, 5, "b").unwrap();
        dfa.add_transition(5, 8, "c").unwrap();
        dfa.add_transition(6, 7, "a").unwrap();
        dfa.add_transition(7, 9, "d").unwrap();
        dfa
    }

    #[test]
    fn none_level_returns_an_unchanged_clone() {
        let dfa = scenario_dfa();
        let (minimized, metrics) = dfa.minimize(MinimizationLevel::None, None);
        assert_eq!(minimized.states().len(), dfa.states().len());
        assert_eq!(metrics.original_states, metrics.minimized_states);
    }

    #[test]
    fn basic_level_drops_only_unreachable_states() {
        let mut dfa = Dfa::create();
        dfa.add_state(0, false).unwrap();
        dfa.add_state(1, true).unwrap();
        dfa.add_state(2, false).unwrap(); // never wired to anything
        dfa.add_transition(0, 1, "a").unwrap();

        let (minimized, _) = dfa.minimize(MinimizationLevel::Basic, None);
        assert_eq!(minimized.states().len(), 2);
        assert!(minimized.states().iter().all(|s| s.id != 2));
        assert!(minimized.accepts(&["a".to_string()]));
    }

    #[test]
    fn standard_minimization_merges_equivalent_path_prefixes() {
        let dfa = scenario_dfa();
        let (minimized, metrics) = dfa.minimize(MinimizationLevel::Standard, None);
        // q0~q3, q1~q4, q2~q5, q8~q9 all merge (each pair leads to
        // equivalent futures); q6 and q7 each remain singleton blocks since
        // their single outgoing symbol ('a', 'd' respectively) doesn't match
        // the merged-prefix blocks' outgoing symbols.
        assert_eq!(minimized.states().len(), 6);
        assert!(minimized.states().len() < dfa.states().len());
        assert_eq!(metrics.original_states, 10);
        assert_eq!(metrics.minimized_states, 6);
    }

    #[test]
    fn minimization_preserves_accepted_language() {
        let dfa = scenario_dfa();
        let (minimized, _) = dfa.minimize(MinimizationLevel::Standard, None);
        let accepting: Vec<InputSymbol> = vec!["a".into(), "b".into(), "c".into()];
        let rejecting: Vec<InputSymbol> = vec!["a".into(), "b".into()];
        let other_accepting: Vec<InputSymbol> = vec!["a".into(), "d".into()];
        assert_eq!(dfa.accepts(&accepting), minimized.accepts(&accepting));
        assert_eq!(dfa.accepts(&rejecting), minimized.accepts(&rejecting));
        assert_eq!(dfa.accepts(&other_accepting), minimized.accepts(&other_accepting));
        assert!(minimized.accepts(&accepting));
        assert!(minimized.accepts(&other_accepting));
        assert!(!minimized.accepts(&rejecting));
    }

    #[test]
    fn minimization_is_idempotent_in_state_count() {
        let dfa = scenario_dfa();
        let (once, _) = dfa.minimize(MinimizationLevel::Standard, None);
        let (twice, _) = once.minimize(MinimizationLevel::Standard, None);
        assert_eq!(once.states().len(), twice.states().len());
    }

    #[test]
    fn aggressive_level_merges_indistinguishable_symbols() {
        // Two symbols that always lead to the same target from every state
        // are indistinguishable and should collapse into one label.
        let mut dfa = Dfa::create();
        dfa.add_state(0, false).unwrap();
        dfa.add_state(1, true).unwrap();
        dfa.add_transition(0, 1, "x").unwrap();
        dfa.add_transition(0, 1, "y").unwrap();

        let (minimized, metrics) = dfa.minimize(MinimizationLevel::Aggressive, None);
        assert!(metrics.boolean_reduction);
        let alphabet = minimized.alphabet();
        assert_eq!(alphabet.len(), 1);
        assert!(dfa.accepts(&["x".to_string()]));
        assert!(minimized.accepts(&alphabet.into_iter().collect::<Vec<_>>()));
    }

    #[test]
    fn metrics_report_caller_supplied_byte_sizes() {
        let dfa = scenario_dfa();
        let (_, metrics) = dfa.minimize(MinimizationLevel::Standard, Some((4096, 1024)));
        assert_eq!(metrics.original_bytes, 4096);
        assert_eq!(metrics.minimized_bytes, 1024);
    }
}
