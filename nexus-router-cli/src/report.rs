//! Scan and check reports.

use crate::error::CliResult;
use colored::Colorize;
use nexus_router::{
    Conflict, DiscoveryResult, DiscoveryWarning, HandlerRef, ProcedureCollection, ProcedureKind,
    Severity, ShadowedRoute, compile,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Everything a scan found, plus the conflicts compiling it would report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub root: PathBuf,
    pub scanned_files: Vec<PathBuf>,
    pub collections: Vec<CollectionSummary>,
    pub warnings: Vec<DiscoveryWarning>,
    pub conflicts: Vec<Conflict>,
    /// REST routes that compile but can never be matched.
    pub shadowed_routes: Vec<ShadowedRoute>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    pub namespace: String,
    pub source: String,
    pub procedures: Vec<ProcedureSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureSummary {
    /// Dotted RPC path.
    pub path: String,
    pub kind: ProcedureKind,
    /// `GET /users/:id`, if the procedure has a REST route.
    pub route: Option<String>,
    /// Handler path relative to the scan root.
    pub handler: String,
    pub validated: bool,
    pub input: String,
    pub output: String,
}

impl ScanReport {
    /// Summarize `result` and compile its collections to find conflicts.
    pub fn new(root: &Path, result: &DiscoveryResult) -> Self {
        let router = compile(result.collections.iter().cloned());

        Self {
            root: root.to_path_buf(),
            scanned_files: result.scanned_files.clone(),
            collections: result.collections.iter().map(summarize).collect(),
            warnings: result.warnings.clone(),
            conflicts: router.conflicts().to_vec(),
            shadowed_routes: router.shadowed_routes().to_vec(),
        }
    }

    pub fn procedure_count(&self) -> usize {
        self.collections.iter().map(|c| c.procedures.len()).sum()
    }

    pub fn is_rejected(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn to_json(&self) -> CliResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human readable rendering, colored when the terminal allows it.
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "Scanned {} file(s) under {}\n",
            self.scanned_files.len().to_string().green(),
            self.root.display()
        );

        for collection in &self.collections {
            out.push_str(&format!(
                "\n{} {}\n",
                collection.namespace.cyan().bold(),
                format!("({})", collection.source).dimmed()
            ));
            for procedure in &collection.procedures {
                let route = procedure
                    .route
                    .as_deref()
                    .map(|r| format!("  {}", r.yellow()))
                    .unwrap_or_default();
                let validated = if procedure.validated {
                    format!("  {}", "validated".dimmed())
                } else {
                    String::new()
                };
                out.push_str(&format!(
                    "  {:<8} {}{}{}\n",
                    procedure.kind.to_string(),
                    procedure.path,
                    route,
                    validated
                ));
            }
        }

        if !self.warnings.is_empty() {
            out.push_str(&format!(
                "\n{} {} warning(s):\n",
                "Warning:".yellow(),
                self.warnings.len()
            ));
            for warning in &self.warnings {
                let label = match warning.severity {
                    Severity::Error => "error".red(),
                    Severity::Warning => "warning".yellow(),
                };
                out.push_str(&format!("  {} {}\n", label, warning));
            }
        }

        if !self.shadowed_routes.is_empty() {
            out.push_str(&format!(
                "\n{} {} unreachable route(s):\n",
                "Warning:".yellow(),
                self.shadowed_routes.len()
            ));
            for shadowed in &self.shadowed_routes {
                out.push_str(&format!("  - {}\n", shadowed));
            }
        }

        if !self.conflicts.is_empty() {
            out.push_str(&format!(
                "\n{} {} conflict(s):\n",
                "Error:".red().bold(),
                self.conflicts.len()
            ));
            for conflict in &self.conflicts {
                out.push_str(&format!("  - {}\n", conflict));
            }
        }

        out.push_str(&format!(
            "\n{} collection(s), {} procedure(s)\n",
            self.collections.len().to_string().green(),
            self.procedure_count().to_string().green()
        ));
        out
    }
}

fn summarize(collection: &ProcedureCollection<HandlerRef>) -> CollectionSummary {
    CollectionSummary {
        namespace: collection.namespace.clone(),
        source: collection.source.clone(),
        procedures: collection
            .procedures
            .iter()
            .map(|procedure| ProcedureSummary {
                path: procedure.path(),
                kind: procedure.kind,
                route: procedure.rest_key().map(|key| key.to_string()),
                handler: procedure.handler.rust_path(""),
                validated: procedure.handler.validated,
                input: procedure.input.to_string(),
                output: procedure.output.to_string(),
            })
            .collect(),
    }
}
