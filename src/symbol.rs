//! The symbol value type (spec §3).

use serde::{Deserialize, Serialize};

use crate::version::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Function,
    Variable,
    Type,
    Constant,
}

impl SymbolKind {
    /// Maps to the wire tag used by the metadata interchange format (spec §6:
    /// `kind: 0|1|2|3`).
    pub fn from_wire(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(SymbolKind::Function),
            1 => Some(SymbolKind::Variable),
            2 => Some(SymbolKind::Type),
            3 => Some(SymbolKind::Constant),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            SymbolKind::Function => 0,
            SymbolKind::Variable => 1,
            SymbolKind::Type => 2,
            SymbolKind::Constant => 3,
        }
    }
}

impl Default for SymbolKind {
    fn default() -> Self {
        SymbolKind::Function
    }
}

/// A single versioned symbol instance contributed by a component.
///
/// `(name, version, component_id)` uniquely identifies an instance within a
/// registry tier (spec §3); `ref_count` is mutated only by the resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub version: Version,
    pub kind: SymbolKind,
    pub component_id: String,
    pub address: u64,
    pub priority: i64,
    pub ref_count: u64,
    /// Set only on entries living in the registry's imported tier: the id of
    /// the component this cached binding was resolved for. `None` for
    /// global/exported entries, which are provider-authoritative and not
    /// per-consumer.
    pub imported_for: Option<String>,
}

impl Symbol {
    pub fn new(
        name: impl Into<String>,
        version: Version,
        kind: SymbolKind,
        component_id: impl Into<String>,
    ) -> Self {
        Symbol {
            name: name.into(),
            version,
            kind,
            component_id: component_id.into(),
            address: 0,
            priority: 0,
            ref_count: 0,
            imported_for: None,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_address(mut self, address: u64) -> Self {
        self.address = address;
        self
    }

    pub fn with_imported_for(mut self, requester: impl Into<String>) -> Self {
        self.imported_for = Some(requester.into());
        self
    }

    /// The identity tuple used for uniqueness and equality within a tier.
    pub fn identity(&self) -> (&str, &Version, &str) {
        (&self.name, &self.version, &self.component_id)
    }
}
