//! Loading candidate files and extracting tagged exports.
//!
//! A file is "loaded" by parsing it with `syn`. Loading never executes code:
//! collections are recognised by their explicit `#[procedures]` tag, and
//! `#[query]`/`#[mutation]` markers found anywhere else are near misses.

use super::HandlerRef;
use super::validate::validate;
use crate::InvalidExport;
use crate::procedure::ProcedureCollection;
use std::path::{Component, Path, PathBuf};
use syn::{Attribute, Item};

/// Collection marker attribute.
pub const COLLECTION_MARKER: &str = "procedures";
/// Query procedure marker attribute.
pub const QUERY_MARKER: &str = "query";
/// Mutation procedure marker attribute.
pub const MUTATION_MARKER: &str = "mutation";

/// What a tagged export looks like before validation.
#[derive(Debug)]
pub enum ExportShape {
    /// An item carrying `#[procedures]`.
    Tagged { attr: Attribute, item: Item },
    /// A `#[query]`/`#[mutation]` item outside any tagged module.
    StrayMarker { marker: String, item: Item },
}

/// One export found in a source file.
#[derive(Debug)]
pub struct RawExport {
    /// File path relative to the scan root.
    pub file: PathBuf,
    /// Rust module path of the file relative to the scan root.
    pub file_module: Vec<String>,
    /// Plain inline modules enclosing the export inside the file.
    pub enclosing: Vec<String>,
    /// Identifier of the exported item.
    pub name: String,
    pub shape: ExportShape,
}

impl RawExport {
    /// Source label used in diagnostics: `relative/file.rs#export`.
    pub fn source_label(&self) -> String {
        let file = self
            .file
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let mut export = self.enclosing.clone();
        export.push(self.name.clone());
        format!("{}#{}", file, export.join("::"))
    }
}

/// Per-export outcome of loading one file.
pub type ExportOutcome = Result<ProcedureCollection<HandlerRef>, InvalidExport>;

/// Read, parse and validate every export of `root/relative`.
///
/// The error string is the `fileLoadError` cause.
pub fn load_file(root: &Path, relative: &Path) -> Result<Vec<ExportOutcome>, String> {
    let path = root.join(relative);
    let content =
        std::fs::read_to_string(&path).map_err(|e| format!("failed to read file: {}", e))?;
    // Spans carry no line/column without proc-macro2's `span-locations`.
    let file =
        syn::parse_file(&content).map_err(|e| format!("failed to parse: {}", e))?;

    let file_module = module_path_of(relative);
    let mut exports = Vec::new();
    collect_exports(
        &file.items,
        relative,
        &file_module,
        &mut Vec::new(),
        &mut exports,
    );

    Ok(exports.iter().map(validate).collect())
}

fn collect_exports(
    items: &[Item],
    file: &Path,
    file_module: &[String],
    enclosing: &mut Vec<String>,
    out: &mut Vec<RawExport>,
) {
    for item in items {
        let attrs = item_attrs(item);

        if let Some(attr) = attrs.iter().find(|a| is_marker(a, COLLECTION_MARKER)) {
            out.push(RawExport {
                file: file.to_path_buf(),
                file_module: file_module.to_vec(),
                enclosing: enclosing.clone(),
                name: item_name(item),
                shape: ExportShape::Tagged {
                    attr: attr.clone(),
                    item: item.clone(),
                },
            });
            continue;
        }

        if let Some(marker) = procedure_marker(attrs) {
            out.push(RawExport {
                file: file.to_path_buf(),
                file_module: file_module.to_vec(),
                enclosing: enclosing.clone(),
                name: item_name(item),
                shape: ExportShape::StrayMarker {
                    marker: marker.to_string(),
                    item: item.clone(),
                },
            });
            continue;
        }

        if let Item::Mod(module) = item
            && let Some((_, content)) = &module.content
        {
            enclosing.push(module.ident.to_string());
            collect_exports(content, file, file_module, enclosing, out);
            enclosing.pop();
        }
    }
}

/// Whether `attr` is `#[name]` or `#[some::path::name]`.
pub(crate) fn is_marker(attr: &Attribute, name: &str) -> bool {
    attr.path()
        .segments
        .last()
        .is_some_and(|segment| segment.ident == name)
}

/// The procedure marker on an item, if any.
pub(crate) fn procedure_marker(attrs: &[Attribute]) -> Option<&'static str> {
    attrs.iter().find_map(|attr| {
        if is_marker(attr, QUERY_MARKER) {
            Some(QUERY_MARKER)
        } else if is_marker(attr, MUTATION_MARKER) {
            Some(MUTATION_MARKER)
        } else {
            None
        }
    })
}

pub(crate) fn item_attrs(item: &Item) -> &[Attribute] {
    match item {
        Item::Const(i) => &i.attrs,
        Item::Enum(i) => &i.attrs,
        Item::Fn(i) => &i.attrs,
        Item::Impl(i) => &i.attrs,
        Item::Mod(i) => &i.attrs,
        Item::Static(i) => &i.attrs,
        Item::Struct(i) => &i.attrs,
        Item::Trait(i) => &i.attrs,
        Item::Type(i) => &i.attrs,
        Item::Union(i) => &i.attrs,
        Item::Use(i) => &i.attrs,
        _ => &[],
    }
}

pub(crate) fn item_name(item: &Item) -> String {
    let ident = match item {
        Item::Const(i) => Some(&i.ident),
        Item::Enum(i) => Some(&i.ident),
        Item::Fn(i) => Some(&i.sig.ident),
        Item::Mod(i) => Some(&i.ident),
        Item::Static(i) => Some(&i.ident),
        Item::Struct(i) => Some(&i.ident),
        Item::Trait(i) => Some(&i.ident),
        Item::Type(i) => Some(&i.ident),
        Item::Union(i) => Some(&i.ident),
        _ => None,
    };
    ident.map_or_else(|| "<item>".to_string(), ToString::to_string)
}

/// Module path of a file relative to the crate's module root.
///
/// `users.rs` → `["users"]`, `api/mod.rs` → `["api"]`, `lib.rs` → `[]`.
pub fn module_path_of(relative: &Path) -> Vec<String> {
    let mut parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if let Some(last) = parts.pop() {
        let stem = last.strip_suffix(".rs").unwrap_or(&last).to_string();
        let is_root = parts.is_empty() && (stem == "lib" || stem == "main");
        if stem != "mod" && !is_root {
            parts.push(stem);
        }
    }
    parts
}
