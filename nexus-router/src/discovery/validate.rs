//! Collection validation.
//!
//! Turns one [`RawExport`] into a [`ProcedureCollection`] of [`HandlerRef`]s,
//! or explains why the export is not a usable collection. Pure: no IO, no
//! logging, the same export always yields the same answer.

use super::HandlerRef;
use super::loader::{
    COLLECTION_MARKER, ExportShape, RawExport, is_marker, item_attrs, item_name, procedure_marker,
};
use crate::InvalidExport;
use crate::builder::is_valid_namespace;
use crate::path::{PathPattern, is_identifier};
use crate::procedure::{
    HttpMethod, ProcedureCollection, ProcedureDef, ProcedureKind, SchemaRef, TransportMeta,
};
use quote::ToTokens;
use std::collections::HashSet;
use std::sync::Arc;
use syn::ext::IdentExt;
use syn::{
    Attribute, FnArg, GenericArgument, Item, ItemFn, ItemMod, LitStr, Meta, PathArguments,
    ReturnType, Type, Visibility,
};

/// Validate one export.
///
/// Rules, in order: the tagged item must be an inline module; every marked
/// item must be a well-formed procedure; procedure names must be unique
/// within the collection.
pub fn validate(export: &RawExport) -> Result<ProcedureCollection<HandlerRef>, InvalidExport> {
    let invalid = |reason: String| InvalidExport::new(export.name.clone(), reason);

    let (attr, item) = match &export.shape {
        ExportShape::StrayMarker { marker, .. } => {
            return Err(invalid(format!(
                "#[{}] marker outside a #[{}] module",
                marker, COLLECTION_MARKER
            )));
        }
        ExportShape::Tagged { attr, item } => (attr, item),
    };

    // (a) shape of the tagged item
    let Item::Mod(module) = item else {
        return Err(invalid(format!(
            "#[{}] must be placed on an inline module",
            COLLECTION_MARKER
        )));
    };
    let Some((_, items)) = &module.content else {
        return Err(invalid(format!(
            "#[{}] module must be declared inline, found `mod {};`",
            COLLECTION_MARKER, module.ident
        )));
    };
    if !is_crate_visible(&module.vis) {
        return Err(invalid(format!(
            "#[{}] module `{}` must be `pub` or `pub(crate)`",
            COLLECTION_MARKER, module.ident
        )));
    }

    let namespace = collection_namespace(attr, module).map_err(&invalid)?;

    let mut module_path = export.enclosing.clone();
    module_path.push(module.ident.unraw().to_string());

    // (b) every marked item
    let mut procedures = Vec::new();
    for inner in items {
        if let Item::Mod(nested) = inner
            && contains_markers(nested)
        {
            return Err(invalid(format!(
                "procedures must be declared directly in the #[{}] module, found some in `{}`",
                COLLECTION_MARKER, nested.ident
            )));
        }

        let Some(marker) = procedure_marker(item_attrs(inner)) else {
            continue;
        };
        let Item::Fn(function) = inner else {
            return Err(invalid(format!(
                "#[{}] item `{}` is not a function",
                marker,
                item_name(inner)
            )));
        };
        let kind = if marker == "query" {
            ProcedureKind::Query
        } else {
            ProcedureKind::Mutation
        };
        let procedure = procedure_def(
            function,
            marker,
            kind,
            &namespace,
            &export.file_module,
            &module_path,
        )
        .map_err(&invalid)?;
        procedures.push(procedure);
    }

    if procedures.is_empty() {
        return Err(invalid("collection has no procedures".to_string()));
    }

    // (c) unique names
    let mut seen = HashSet::new();
    for procedure in &procedures {
        if !seen.insert(procedure.name.clone()) {
            return Err(invalid(format!(
                "duplicate procedure name '{}'",
                procedure.name
            )));
        }
    }

    Ok(ProcedureCollection {
        namespace,
        source: export.source_label(),
        procedures: procedures.into_iter().map(Arc::new).collect(),
    })
}

fn contains_markers(module: &ItemMod) -> bool {
    module.content.as_ref().is_some_and(|(_, items)| {
        items.iter().any(|item| {
            procedure_marker(item_attrs(item)).is_some()
                || matches!(item, Item::Mod(nested) if contains_markers(nested))
        })
    })
}

fn collection_namespace(attr: &Attribute, module: &ItemMod) -> Result<String, String> {
    let mut namespace = None;

    if !matches!(attr.meta, Meta::Path(_)) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("namespace") {
                if namespace.is_some() {
                    return Err(meta.error("duplicate `namespace` argument"));
                }
                namespace = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error(format!(
                    "unknown #[{}] argument `{}`",
                    COLLECTION_MARKER,
                    meta.path.to_token_stream()
                )))
            }
        })
        .map_err(|e| e.to_string())?;
    }

    let namespace = namespace.unwrap_or_else(|| module.ident.unraw().to_string());
    if !is_valid_namespace(&namespace) {
        return Err(format!("'{}' is not a valid namespace", namespace));
    }
    Ok(namespace)
}

#[derive(Default)]
struct ProcedureArgs {
    name: Option<String>,
    rest: Option<(HttpMethod, String)>,
    validate: bool,
}

fn procedure_args(attr: &Attribute, marker: &str) -> Result<ProcedureArgs, String> {
    let mut args = ProcedureArgs::default();
    if matches!(attr.meta, Meta::Path(_)) {
        return Ok(args);
    }

    attr.parse_nested_meta(|meta| {
        let key = meta.path.to_token_stream().to_string();
        if meta.path.is_ident("name") {
            if args.name.is_some() {
                return Err(meta.error("duplicate `name` argument"));
            }
            args.name = Some(meta.value()?.parse::<LitStr>()?.value());
        } else if meta.path.is_ident("validate") {
            if args.validate {
                return Err(meta.error("duplicate `validate` flag"));
            }
            args.validate = true;
        } else if let Ok(method) = key.parse::<HttpMethod>()
            && key == key.to_ascii_lowercase()
        {
            if args.rest.is_some() {
                return Err(meta.error("only one HTTP route may be declared"));
            }
            args.rest = Some((method, meta.value()?.parse::<LitStr>()?.value()));
        } else {
            return Err(meta.error(format!("unknown #[{}] argument `{}`", marker, key)));
        }
        Ok(())
    })
    .map_err(|e| e.to_string())?;

    Ok(args)
}

fn procedure_def(
    function: &ItemFn,
    marker: &str,
    kind: ProcedureKind,
    namespace: &str,
    file_module: &[String],
    module_path: &[String],
) -> Result<ProcedureDef<HandlerRef>, String> {
    let ident = function.sig.ident.unraw().to_string();
    let attr = function
        .attrs
        .iter()
        .find(|a| is_marker(a, marker))
        .ok_or_else(|| format!("procedure `{}` lost its #[{}] marker", ident, marker))?;
    let args = procedure_args(attr, marker).map_err(|e| format!("procedure `{}`: {}", ident, e))?;

    let sig = &function.sig;
    if sig.asyncness.is_none() {
        return Err(format!("procedure `{}` must be an async fn", ident));
    }
    if sig.inputs.iter().any(|arg| matches!(arg, FnArg::Receiver(_))) {
        return Err(format!("procedure `{}` must not take self", ident));
    }
    if sig.inputs.len() != 2 {
        return Err(format!(
            "procedure `{}` must take (context, input), found {} parameter(s)",
            ident,
            sig.inputs.len()
        ));
    }
    if !is_crate_visible(&function.vis) {
        return Err(format!(
            "procedure `{}` must be `pub` or `pub(crate)`",
            ident
        ));
    }

    let name = args.name.unwrap_or_else(|| ident.clone());
    if !is_identifier(&name) {
        return Err(format!("'{}' is not a valid procedure name", name));
    }

    let transport = match args.rest {
        None => None,
        Some((method, raw)) => {
            let path = PathPattern::parse(&raw)
                .map_err(|e| format!("procedure `{}`: {}", ident, e))?;
            Some(TransportMeta::new(method, path))
        }
    };

    let input = match sig.inputs.iter().nth(1) {
        Some(FnArg::Typed(arg)) => SchemaRef::new(type_text(&arg.ty)),
        _ => SchemaRef::unit(),
    };
    let output = match &sig.output {
        ReturnType::Default => SchemaRef::unit(),
        ReturnType::Type(_, ty) => SchemaRef::new(type_text(result_ok_type(ty).unwrap_or(ty))),
    };

    Ok(ProcedureDef {
        namespace: namespace.to_string(),
        name,
        kind,
        input,
        output,
        handler: HandlerRef {
            file_module: file_module.to_vec(),
            module_path: module_path.to_vec(),
            function: ident,
            validated: args.validate,
        },
        transport,
    })
}

/// Registration code is generated outside the collection module, so
/// everything it names has to be reachable from the crate root.
fn is_crate_visible(vis: &Visibility) -> bool {
    match vis {
        Visibility::Public(_) => true,
        Visibility::Restricted(restricted) => restricted.path.is_ident("crate"),
        Visibility::Inherited => false,
    }
}

/// `T` of `RpcResult<T>` / `Result<T, E>`.
fn result_ok_type(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let last = path.path.segments.last()?;
    if last.ident != "RpcResult" && last.ident != "Result" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &last.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}

/// Compact source text of a type, e.g. `Vec<Option<u8>>`.
fn type_text(ty: &Type) -> String {
    ty.to_token_stream()
        .to_string()
        .replace(" :: ", "::")
        .replace(":: ", "::")
        .replace(" <", "<")
        .replace("< ", "<")
        .replace(" >", ">")
        .replace(" ,", ",")
        .replace("& ", "&")
}
