//! The three-tier symbol registry (spec §3, §4.2).
//!
//! All three tiers share one lock, as spec §5 requires ("the registry's three
//! tiers share one lock"): readers (`find_all`, `stats`) take a shared read
//! guard, writers (`add`, `remove`, `copy`) take the exclusive write guard for
//! the duration of the whole operation so a failed write leaves no partial
//! mutation behind. This is the same "single writer lock guarding a shared
//! resource" shape `cargo-unleash` assumes for its `Workspace`/`Config`
//! (accessed read-mostly through `ws.config().shell()` from many commands);
//! here it's made explicit with `std::sync::RwLock` rather than borrowed from
//! `cargo`'s own internals, since this crate owns its data model outright.

use std::collections::HashMap;
use std::sync::RwLock;

use indexmap::IndexMap;

use crate::error::{NexusError, NexusResult};
use crate::symbol::{Symbol, SymbolKind};

/// Which of the three tables a symbol lives in (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Always-visible runtime symbols (host primitives).
    Global,
    /// Contributed by loaded components. Authoritative.
    Exported,
    /// Per-consumer resolution cache. Never authoritative; populated only by
    /// the resolver (spec §4.5 step 5).
    Imported,
}

#[derive(Default)]
struct Tiers {
    global: IndexMap<String, Vec<Symbol>>,
    exported: IndexMap<String, Vec<Symbol>>,
    imported: IndexMap<String, Vec<Symbol>>,
}

impl Tiers {
    fn table(&self, tier: Tier) -> &IndexMap<String, Vec<Symbol>> {
        match tier {
            Tier::Global => &self.global,
            Tier::Exported => &self.exported,
            Tier::Imported => &self.imported,
        }
    }

    fn table_mut(&mut self, tier: Tier) -> &mut IndexMap<String, Vec<Symbol>> {
        match tier {
            Tier::Global => &mut self.global,
            Tier::Exported => &mut self.exported,
            Tier::Imported => &mut self.imported,
        }
    }
}

/// Per-tier snapshot used by `stats` (spec §4.2).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub counts_by_kind: HashMap<SymbolKind, usize>,
    pub capacity: usize,
    pub size: usize,
    pub most_referenced: Option<String>,
}

/// The shared, lockable symbol table.
#[derive(Default)]
pub struct Registry {
    tiers: RwLock<Tiers>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { tiers: RwLock::new(Tiers::default()) }
    }

    /// Inserts a symbol instance. Fails with `DuplicateId` if
    /// `(name, version, component_id)` — plus, for the imported tier, the
    /// caching requester recorded in `imported_for` — already exists in this
    /// tier. Per spec §7, a failed write leaves no partial mutation.
    pub fn add(&self, tier: Tier, symbol: Symbol) -> NexusResult<()> {
        let mut guard = self.tiers.write().expect("registry lock poisoned");
        let table = guard.table_mut(tier);
        let bucket = table.entry(symbol.name.clone()).or_insert_with(Vec::new);
        let duplicate = bucket.iter().any(|existing| {
            existing.version == symbol.version
                && existing.component_id == symbol.component_id
                && existing.imported_for == symbol.imported_for
        });
        if duplicate {
            return Err(NexusError::DuplicateId {
                scope: format!("{:?} tier symbol", tier),
                id: format!("{}@{}::{}", symbol.name, symbol.version, symbol.component_id),
            });
        }
        bucket.push(symbol);
        Ok(())
    }

    /// All distinct names present in `tier`, in insertion order.
    pub fn names(&self, tier: Tier) -> Vec<String> {
        let guard = self.tiers.read().expect("registry lock poisoned");
        guard.table(tier).keys().cloned().collect()
    }

    /// All symbol instances for `name` in `tier`, in insertion-stable order.
    pub fn find_all(&self, tier: Tier, name: &str) -> Vec<Symbol> {
        let guard = self.tiers.read().expect("registry lock poisoned");
        guard.table(tier).get(name).cloned().unwrap_or_default()
    }

    /// Returns the cached import for `(name, requester)`, if one exists.
    pub fn find_imported(&self, name: &str, requester: &str) -> Option<Symbol> {
        let guard = self.tiers.read().expect("registry lock poisoned");
        guard
            .imported
            .get(name)
            .and_then(|bucket| bucket.iter().find(|s| s.imported_for.as_deref() == Some(requester)))
            .cloned()
    }

    /// Bulk-copies entries from `src` to `dst`, preserving `ref_count`.
    /// Entries whose providing component doesn't match `filter` (when given)
    /// are skipped; entries that would duplicate an existing destination
    /// entry are skipped rather than erroring, so repeated bulk copies are
    /// idempotent. Returns the number of entries actually copied.
    pub fn copy(&self, src: Tier, dst: Tier, filter: Option<&str>) -> usize {
        let mut guard = self.tiers.write().expect("registry lock poisoned");
        let to_copy: Vec<Symbol> = guard
            .table(src)
            .values()
            .flatten()
            .filter(|s| filter.map(|f| s.component_id == f).unwrap_or(true))
            .cloned()
            .collect();

        let mut copied = 0usize;
        for symbol in to_copy {
            let bucket = guard.table_mut(dst).entry(symbol.name.clone()).or_insert_with(Vec::new);
            let duplicate = bucket.iter().any(|existing| {
                existing.version == symbol.version
                    && existing.component_id == symbol.component_id
                    && existing.imported_for == symbol.imported_for
            });
            if !duplicate {
                bucket.push(symbol);
                copied += 1;
            }
        }
        copied
    }

    /// Removes the first matching entry for `name` in `tier` (insertion
    /// order). Returns `false` if no entry matched.
    pub fn remove(&self, tier: Tier, name: &str) -> bool {
        let mut guard = self.tiers.write().expect("registry lock poisoned");
        let table = guard.table_mut(tier);
        match table.get_mut(name) {
            Some(bucket) if !bucket.is_empty() => {
                bucket.remove(0);
                if bucket.is_empty() {
                    table.shift_remove(name);
                }
                true
            },
            _ => false,
        }
    }

    /// Increments `ref_count` for the identified symbol in-place. Used by the
    /// resolver when a query is satisfied (spec §4.5 step 5).
    pub fn bump_ref_count(&self, tier: Tier, name: &str, version: &crate::version::Version, component_id: &str) {
        let mut guard = self.tiers.write().expect("registry lock poisoned");
        if let Some(bucket) = guard.table_mut(tier).get_mut(name) {
            if let Some(symbol) =
                bucket.iter_mut().find(|s| &s.version == version && s.component_id == component_id)
            {
                symbol.ref_count += 1;
            }
        }
    }

    /// Counts by kind, capacity, size, and the most-referenced name in `tier`.
    pub fn stats(&self, tier: Tier) -> RegistryStats {
        let guard = self.tiers.read().expect("registry lock poisoned");
        let table = guard.table(tier);

        let mut counts_by_kind = HashMap::new();
        let mut size = 0usize;
        let mut totals: HashMap<&str, u64> = HashMap::new();

        for (name, bucket) in table.iter() {
            size += bucket.len();
            let mut total_refs = 0u64;
            for symbol in bucket {
                *counts_by_kind.entry(symbol.kind).or_insert(0usize) += 1;
                total_refs += symbol.ref_count;
            }
            totals.insert(name.as_str(), total_refs);
        }

        let most_referenced = totals
            .into_iter()
            .max_by_key(|(_, refs)| *refs)
            .filter(|(_, refs)| *refs > 0)
            .map(|(name, _)| name.to_owned());

        RegistryStats { counts_by_kind, capacity: table.capacity(), size, most_referenced }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    fn sym(name: &str, v: (u64, u64, u64), provider: &str) -> Symbol {
        Symbol::new(name, Version::new(v.0, v.1, v.2), SymbolKind::Function, provider)
    }

    #[test]
    fn add_rejects_duplicate_identity() {
        let reg = Registry::new();
        reg.add(Tier::Exported, sym("calculate", (1, 0, 0), "math_v1")).unwrap();
        let err = reg.add(Tier::Exported, sym("calculate", (1, 0, 0), "math_v1")).unwrap_err();
        assert!(matches!(err, NexusError::DuplicateId { .. }));
    }

    #[test]
    fn exported_add_never_updates_imported() {
        let reg = Registry::new();
        reg.add(Tier::Exported, sym("calculate", (1, 0, 0), "math_v1")).unwrap();
        assert!(reg.find_all(Tier::Imported, "calculate").is_empty());
    }

    #[test]
    fn find_all_is_insertion_stable() {
        let reg = Registry::new();
        reg.add(Tier::Exported, sym("calculate", (1, 0, 0), "math_v1")).unwrap();
        reg.add(Tier::Exported, sym("calculate", (2, 0, 0), "math_v2")).unwrap();
        let found = reg.find_all(Tier::Exported, "calculate");
        assert_eq!(found[0].component_id, "math_v1");
        assert_eq!(found[1].component_id, "math_v2");
    }

    #[test]
    fn copy_preserves_ref_count_and_is_idempotent() {
        let reg = Registry::new();
        let mut s = sym("calculate", (1, 0, 0), "math_v1");
        s.ref_count = 7;
        reg.add(Tier::Exported, s).unwrap();
        assert_eq!(reg.copy(Tier::Exported, Tier::Global, None), 1);
        assert_eq!(reg.find_all(Tier::Global, "calculate")[0].ref_count, 7);
        // second copy is a no-op: duplicate is skipped, not an error
        assert_eq!(reg.copy(Tier::Exported, Tier::Global, None), 0);
    }

    #[test]
    fn remove_pops_first_matching_entry() {
        let reg = Registry::new();
        reg.add(Tier::Exported, sym("calculate", (1, 0, 0), "math_v1")).unwrap();
        reg.add(Tier::Exported, sym("calculate", (2, 0, 0), "math_v2")).unwrap();
        assert!(reg.remove(Tier::Exported, "calculate"));
        assert_eq!(reg.find_all(Tier::Exported, "calculate")[0].component_id, "math_v2");
        assert!(!reg.remove(Tier::Exported, "unknown"));
    }

    #[test]
    fn stats_report_counts_and_most_referenced() {
        let reg = Registry::new();
        let mut a = sym("calculate", (1, 0, 0), "math_v1");
        a.ref_count = 3;
        let mut b = sym("calculate", (2, 0, 0), "math_v2");
        b.ref_count = 9;
        reg.add(Tier::Exported, a).unwrap();
        reg.add(Tier::Exported, b).unwrap();
        let stats = reg.stats(Tier::Exported);
        assert_eq!(stats.size, 2);
        assert_eq!(stats.most_referenced.as_deref(), Some("calculate"));
    }
}
