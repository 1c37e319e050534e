//! The automaton engine: DFA representation and operations (spec §3, §4.6).
//!
//! No repo in the reference pack works with finite automata, so this module
//! and [`minimize`](minimize) are built directly from the numbered algorithm
//! in the core's design notes rather than adapted from an existing file; the
//! surrounding style (explicit `NexusResult` returns, no panics on malformed
//! input) still follows the rest of this crate.

pub mod minimize;

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{NexusError, NexusResult};

/// An automaton's alphabet symbol. Kept as an owned string rather than `char`
/// so multi-character symbols (as used by component transition labels) are
/// representable without a wrapper type.
pub type InputSymbol = String;

/// One DFA state: an id, whether it's final, and its outgoing transitions in
/// insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub id: u32,
    pub is_final: bool,
    pub transitions: Vec<(InputSymbol, u32)>,
}

/// A deterministic finite automaton (spec §3): states carry stable ids,
/// transitions are indices rather than pointers, and at most one outgoing
/// transition exists per `(state, input_symbol)` pair.
#[derive(Debug, Clone, Default)]
pub struct Dfa {
    states: Vec<State>,
    index: HashMap<u32, usize>,
    initial: Option<u32>,
    finals: BTreeSet<u32>,
}

impl Dfa {
    pub fn create() -> Self {
        Dfa::default()
    }

    /// Adds a state. The first state added becomes the initial state.
    pub fn add_state(&mut self, id: u32, is_final: bool) -> NexusResult<()> {
        if self.index.contains_key(&id) {
            return Err(NexusError::DuplicateId { scope: "automaton state".into(), id: id.to_string() });
        }
        if self.initial.is_none() {
            self.initial = Some(id);
        }
        if is_final {
            self.finals.insert(id);
        }
        self.index.insert(id, self.states.len());
        self.states.push(State { id, is_final, transitions: Vec::new() });
        Ok(())
    }

    /// Adds a transition. Fails if either state is unknown, or if `from_id`
    /// already has an outgoing transition on `symbol` (spec §3 invariant: at
    /// most one outgoing transition per `(state, input_symbol)`).
    pub fn add_transition(&mut self, from_id: u32, to_id: u32, symbol: impl Into<InputSymbol>) -> NexusResult<()> {
        let symbol = symbol.into();
        if !self.index.contains_key(&to_id) {
            return Err(NexusError::UnknownReference { kind: "automaton state".into(), id: to_id.to_string() });
        }
        let from_idx = *self
            .index
            .get(&from_id)
            .ok_or_else(|| NexusError::UnknownReference { kind: "automaton state".into(), id: from_id.to_string() })?;
        if self.states[from_idx].transitions.iter().any(|(s, _)| s == &symbol) {
            return Err(NexusError::DuplicateId {
                scope: "automaton transition".into(),
                id: format!("{}--{}-->", from_id, symbol),
            });
        }
        self.states[from_idx].transitions.push((symbol, to_id));
        Ok(())
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn initial(&self) -> Option<u32> {
        self.initial
    }

    pub fn finals(&self) -> &BTreeSet<u32> {
        &self.finals
    }

    fn state(&self, id: u32) -> Option<&State> {
        self.index.get(&id).map(|&i| &self.states[i])
    }

    pub fn step(&self, from: u32, symbol: &str) -> Option<u32> {
        self.state(from)?.transitions.iter().find(|(s, _)| s == symbol).map(|(_, t)| *t)
    }

    /// Runs the automaton over `input` from the initial state; `false` if
    /// there's no initial state or the run falls off an undefined transition.
    pub fn accepts(&self, input: &[InputSymbol]) -> bool {
        let mut current = match self.initial {
            Some(s) => s,
            None => return false,
        };
        for symbol in input {
            match self.step(current, symbol) {
                Some(next) => current = next,
                None => return false,
            }
        }
        self.finals.contains(&current)
    }

    /// The distinct input symbols used by any transition.
    pub fn alphabet(&self) -> BTreeSet<InputSymbol> {
        self.states.iter().flat_map(|s| s.transitions.iter().map(|(sym, _)| sym.clone())).collect()
    }

    /// States reachable from the initial state, inclusive.
    pub fn reachable_states(&self) -> BTreeSet<u32> {
        let mut seen = BTreeSet::new();
        let mut stack = Vec::new();
        if let Some(init) = self.initial {
            stack.push(init);
            seen.insert(init);
        }
        while let Some(id) = stack.pop() {
            if let Some(state) = self.state(id) {
                for (_, target) in &state.transitions {
                    if seen.insert(*target) {
                        stack.push(*target);
                    }
                }
            }
        }
        seen
    }

    /// Renders the automaton in the same directed-graph textual form the
    /// dependency graph exports (spec §6), one node per state and one edge
    /// per transition labeled with its input symbol.
    pub fn export_dot(&self) -> String {
        let mut out = String::from("digraph automaton {\n");
        for state in &self.states {
            let shape = if state.is_final { "doublecircle" } else { "circle" };
            out.push_str(&format!("    \"{}\" [shape={}];\n", state.id, shape));
        }
        for state in &self.states {
            for (symbol, target) in &state.transitions {
                out.push_str(&format!("    \"{}\" -> \"{}\" [label=\"{}\"];\n", state.id, target, symbol));
            }
        }
        out.push_str("}\n");
        out
    }

    /// Reads an automaton from the small JSON document form used by the CLI's
    /// `minimize` command: `{states: [{id, is_final, transitions: [[symbol,
    /// target]]}]}`, states listed in construction order so the first entry
    /// becomes the initial state (spec §4.6's `add_state` contract, carried
    /// over to the interchange form since the DFA itself has no separate
    /// persistence format of its own — spec.md's Non-goals permit only the
    /// metadata interchange format, so this mirrors it rather than adding a
    /// second one).
    pub fn load<R: std::io::Read>(reader: R) -> NexusResult<Dfa> {
        let doc: DfaDoc = serde_json::from_reader(reader)
            .map_err(|e| NexusError::InvalidInput { segment: "automaton document".into(), message: e.to_string() })?;
        let mut dfa = Dfa::create();
        for state in &doc.states {
            dfa.add_state(state.id, state.is_final)?;
        }
        for state in &doc.states {
            for (symbol, target) in &state.transitions {
                dfa.add_transition(state.id, *target, symbol.clone())?;
            }
        }
        Ok(dfa)
    }

    pub fn save<W: std::io::Write>(&self, writer: W) -> NexusResult<()> {
        let doc = DfaDoc { states: self.states.clone() };
        serde_json::to_writer_pretty(writer, &doc).map_err(|e| NexusError::Internal(e.to_string()))
    }
}

/// The on-disk shape for [`Dfa::load`]/[`Dfa::save`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DfaDoc {
    pub states: Vec<State>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_dfa() -> Dfa {
        let mut dfa = Dfa::create();
        dfa.add_state(0, false).unwrap();
        dfa.add_state(1, false).unwrap();
        dfa.add_state(2, true).unwrap();
        dfa.add_transition(0, 1, "a").unwrap();
        dfa.add_transition(1, 2, "b").unwrap();
        dfa
    }

    #[test]
    fn first_added_state_becomes_initial() {
        let dfa = small_dfa();
        assert_eq!(dfa.initial(), Some(0));
    }

    #[test]
    fn duplicate_state_id_rejected() {
        let mut dfa = Dfa::create();
        dfa.add_state(0, false).unwrap();
        let err = dfa.add_state(0, true).unwrap_err();
        assert!(matches!(err, NexusError::DuplicateId { .. }));
    }

    #[test]
    fn transition_to_unknown_state_rejected() {
        let mut dfa = Dfa::create();
        dfa.add_state(0, false).unwrap();
        let err = dfa.add_transition(0, 99, "a").unwrap_err();
        assert!(matches!(err, NexusError::UnknownReference { .. }));
    }

    #[test]
    fn duplicate_outgoing_symbol_rejected() {
        let mut dfa = Dfa::create();
        dfa.add_state(0, false).unwrap();
        dfa.add_state(1, false).unwrap();
        dfa.add_state(2, false).unwrap();
        dfa.add_transition(0, 1, "a").unwrap();
        let err = dfa.add_transition(0, 2, "a").unwrap_err();
        assert!(matches!(err, NexusError::DuplicateId { .. }));
    }

    #[test]
    fn accepts_runs_the_automaton_from_initial_state() {
        let dfa = small_dfa();
        assert!(dfa.accepts(&["a".to_string(), "b".to_string()]));
        assert!(!dfa.accepts(&["a".to_string()]));
        assert!(!dfa.accepts(&["b".to_string()]));
    }

    #[test]
    fn reachable_states_excludes_unconnected_state() {
        let mut dfa = small_dfa();
        dfa.add_state(3, false).unwrap();
        let reachable = dfa.reachable_states();
        assert!(reachable.contains(&0));
        assert!(reachable.contains(&1));
        assert!(reachable.contains(&2));
        assert!(!reachable.contains(&3));
    }

    #[test]
    fn save_then_load_roundtrips_states_and_initial_state() {
        let dfa = small_dfa();
        let mut buf = Vec::new();
        dfa.save(&mut buf).unwrap();
        let reloaded = Dfa::load(buf.as_slice()).unwrap();
        assert_eq!(reloaded.initial(), dfa.initial());
        assert_eq!(reloaded.finals(), dfa.finals());
        assert!(reloaded.accepts(&["a".to_string(), "b".to_string()]));
    }
}
