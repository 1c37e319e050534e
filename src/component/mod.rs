//! Component metadata model (spec §3, §4.3).

mod metadata;

pub use metadata::{MetadataDoc, DependencyDoc, SymbolDoc};

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{NexusError, NexusResult};
use crate::symbol::SymbolKind;
use crate::version::{Constraint, Version};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSpec {
    pub name: String,
    pub version: Version,
    pub kind: SymbolKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSpec {
    pub name: String,
    pub kind: SymbolKind,
    pub constraint: Constraint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyRef {
    pub target_id: String,
    pub constraint: Constraint,
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Metrics {
    pub footprint: u64,
    pub avg_load_ms: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub count: u64,
    pub last_used: u64,
    pub loaded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub version: Version,
    pub description: String,
    pub exports: Vec<ExportSpec>,
    pub imports: Vec<ImportSpec>,
    pub dependencies: Vec<DependencyRef>,
    pub metrics: Metrics,
    pub usage: Usage,
}

impl Component {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Component {
            id: id.into(),
            version,
            description: String::new(),
            exports: Vec::new(),
            imports: Vec::new(),
            dependencies: Vec::new(),
            metrics: Metrics::default(),
            usage: Usage::default(),
        }
    }

    /// Reads a structured document, accepting both the legacy bare-name
    /// export form and the enriched `{name, version, kind}` form (spec §4.3,
    /// §6). A missing export/import version defaults to the component's own
    /// version; a missing kind defaults to `function`.
    pub fn load<R: std::io::Read>(reader: R) -> NexusResult<Component> {
        let doc: MetadataDoc = serde_json::from_reader(reader).map_err(|e| NexusError::InvalidInput {
            segment: "metadata document".into(),
            message: e.to_string(),
        })?;
        doc.into_component()
    }

    /// Writes the enriched form.
    pub fn save<W: std::io::Write>(&self, writer: W) -> NexusResult<()> {
        let doc = MetadataDoc::from_component(self);
        serde_json::to_writer_pretty(writer, &doc).map_err(|e| NexusError::Internal(e.to_string()))
    }

    pub fn add_dependency(&mut self, target_id: impl Into<String>, constraint: Constraint, optional: bool) {
        self.dependencies.push(DependencyRef { target_id: target_id.into(), constraint, optional });
    }

    pub fn add_export(&mut self, name: impl Into<String>, version: Version, kind: SymbolKind) {
        self.exports.push(ExportSpec { name: name.into(), version, kind });
    }

    pub fn add_import(&mut self, name: impl Into<String>, constraint: Constraint, kind: SymbolKind) {
        self.imports.push(ImportSpec { name: name.into(), kind, constraint });
    }

    /// Increments the usage counter and stamps `last_used` with the current
    /// wall-clock time (seconds since epoch).
    pub fn track_usage(&mut self) {
        self.usage.count += 1;
        self.usage.last_used = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.usage.loaded = true;
    }

    pub fn usage_summary(&self) -> Usage {
        self.usage
    }

    /// Every non-optional dependency must have some available component
    /// whose version satisfies the constraint (spec §3, §4.3).
    pub fn check_dependencies(&self, available: &[Component]) -> NexusResult<()> {
        for dep in &self.dependencies {
            if dep.optional {
                continue;
            }
            let satisfied = available
                .iter()
                .any(|c| c.id == dep.target_id && dep.constraint.satisfies(&c.version));
            if !satisfied {
                return Err(NexusError::UnknownReference {
                    kind: "dependency target".into(),
                    id: dep.target_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Picks the best candidate among `available` for `(id, constraint)`:
    /// scores by constraint-match tightness, then descending version; an
    /// exact-version match beats a mere constraint match (spec §4.3).
    pub fn resolve_component<'a>(
        id: &str,
        constraint: &Constraint,
        available: &'a [Component],
    ) -> Option<&'a Component> {
        available
            .iter()
            .filter(|c| c.id == id && constraint.satisfies(&c.version))
            .max_by(|a, b| {
                let a_exact = matches!(constraint, Constraint::Exact(v) if v == &a.version);
                let b_exact = matches!(constraint, Constraint::Exact(v) if v == &b.version);
                a_exact.cmp(&b_exact).then_with(|| a.version.cmp(&b.version))
            })
    }
}
