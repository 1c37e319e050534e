//! The bit-level stable metadata interchange format (spec §6).
//!
//! Accepts both the enriched symbol form (`{name, version, kind}`) and the
//! legacy bare-string form (`exported_symbols: ["foo", "bar"]`) on input;
//! always emits the enriched form on output, exactly as spec §4.3 requires
//! ("`load` accepts both forms; `save` writes the enriched form").

use serde::{Deserialize, Serialize};

use super::{Component, DependencyRef, ExportSpec, ImportSpec, Metrics, Usage};
use crate::error::{NexusError, NexusResult};
use crate::symbol::SymbolKind;
use crate::version::{Constraint, Version};

/// One exported or imported symbol entry, accepting either wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SymbolDoc {
    /// The legacy form: a bare name, nothing else known.
    Legacy(String),
    /// The enriched form. `version` is interpreted as an exact version for
    /// exports and as a constraint string for imports; `kind` is the wire
    /// tag `0|1|2|3` (spec §6).
    Enriched {
        name: String,
        #[serde(default)]
        version: Option<String>,
        #[serde(default)]
        kind: Option<u8>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyDoc {
    pub id: String,
    pub version_req: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataDoc {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<DependencyDoc>,
    #[serde(default)]
    pub exported_symbols: Vec<SymbolDoc>,
    #[serde(default)]
    pub imported_symbols: Vec<SymbolDoc>,
    #[serde(default)]
    pub memory_footprint: u64,
    #[serde(default)]
    pub avg_load_time_ms: f64,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub last_used: u64,
}

impl MetadataDoc {
    pub fn into_component(self) -> NexusResult<Component> {
        let version = Version::parse(&self.version)?;

        let exports = self
            .exported_symbols
            .into_iter()
            .map(|doc| symbol_doc_to_export(doc, &version))
            .collect::<NexusResult<Vec<_>>>()?;

        let imports = self
            .imported_symbols
            .into_iter()
            .map(|doc| symbol_doc_to_import(doc, &version))
            .collect::<NexusResult<Vec<_>>>()?;

        let dependencies = self
            .dependencies
            .into_iter()
            .map(|d| {
                Ok(DependencyRef {
                    target_id: d.id,
                    constraint: Constraint::parse(&d.version_req)?,
                    optional: d.optional,
                })
            })
            .collect::<NexusResult<Vec<_>>>()?;

        Ok(Component {
            id: self.id,
            version,
            description: self.description,
            exports,
            imports,
            dependencies,
            metrics: Metrics { footprint: self.memory_footprint, avg_load_ms: self.avg_load_time_ms },
            usage: Usage { count: self.usage_count, last_used: self.last_used, loaded: false },
        })
    }

    pub fn from_component(component: &Component) -> Self {
        MetadataDoc {
            id: component.id.clone(),
            version: component.version.to_string(),
            description: component.description.clone(),
            dependencies: component
                .dependencies
                .iter()
                .map(|d| DependencyDoc {
                    id: d.target_id.clone(),
                    version_req: d.constraint.to_string(),
                    optional: d.optional,
                    resolved_version: None,
                })
                .collect(),
            exported_symbols: component
                .exports
                .iter()
                .map(|e| SymbolDoc::Enriched {
                    name: e.name.clone(),
                    version: Some(e.version.to_string()),
                    kind: Some(e.kind.to_wire()),
                })
                .collect(),
            imported_symbols: component
                .imports
                .iter()
                .map(|i| SymbolDoc::Enriched {
                    name: i.name.clone(),
                    version: Some(i.constraint.to_string()),
                    kind: Some(i.kind.to_wire()),
                })
                .collect(),
            memory_footprint: component.metrics.footprint,
            avg_load_time_ms: component.metrics.avg_load_ms,
            usage_count: component.usage.count,
            last_used: component.usage.last_used,
        }
    }
}

fn symbol_doc_to_export(doc: SymbolDoc, component_version: &Version) -> NexusResult<ExportSpec> {
    let (name, version_str, kind_tag) = split_symbol_doc(doc);
    let version = match version_str {
        Some(v) => Version::parse(&v)?,
        None => component_version.clone(),
    };
    let kind = decode_kind(kind_tag)?;
    Ok(ExportSpec { name, version, kind })
}

fn symbol_doc_to_import(doc: SymbolDoc, component_version: &Version) -> NexusResult<ImportSpec> {
    let (name, constraint_str, kind_tag) = split_symbol_doc(doc);
    let constraint = match constraint_str {
        Some(c) => Constraint::parse(&c)?,
        None => Constraint::Exact(component_version.clone()),
    };
    let kind = decode_kind(kind_tag)?;
    Ok(ImportSpec { name, kind, constraint })
}

fn split_symbol_doc(doc: SymbolDoc) -> (String, Option<String>, Option<u8>) {
    match doc {
        SymbolDoc::Legacy(name) => (name, None, None),
        SymbolDoc::Enriched { name, version, kind } => (name, version, kind),
    }
}

fn decode_kind(tag: Option<u8>) -> NexusResult<SymbolKind> {
    match tag {
        None => Ok(SymbolKind::Function),
        Some(t) => SymbolKind::from_wire(t).ok_or_else(|| NexusError::InvalidInput {
            segment: "kind".into(),
            message: format!("unknown symbol kind tag `{}`", t),
        }),
    }
}
