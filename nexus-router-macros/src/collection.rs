//! Compile-time checks for `#[procedures]` modules.
//!
//! Mirrors the discovery validator so that a module that compiles is also a
//! module discovery accepts. All problems in a module are reported together.

use proc_macro2::TokenStream;
use quote::ToTokens;
use std::collections::HashSet;
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::spanned::Spanned;
use syn::{Attribute, FnArg, Item, ItemFn, ItemMod, LitStr, Meta, Visibility};

const MARKERS: [&str; 2] = ["query", "mutation"];
const METHODS: [&str; 5] = ["get", "post", "put", "patch", "delete"];

pub(crate) fn expand(args: TokenStream, mut module: ItemMod) -> syn::Result<TokenStream> {
    let namespace = parse_namespace(args)?
        .unwrap_or_else(|| module.ident.unraw().to_string());
    if !namespace.split('.').all(is_identifier) {
        return Err(syn::Error::new_spanned(
            &module.ident,
            format!("'{}' is not a valid namespace", namespace),
        ));
    }

    let ident = module.ident.clone();
    let Some((_, items)) = module.content.as_mut() else {
        return Err(syn::Error::new_spanned(
            &module,
            format!("#[procedures] module must be declared inline, found `mod {};`", ident),
        ));
    };

    let mut errors = Errors::default();
    if !is_crate_visible(&module.vis) {
        errors.push(syn::Error::new_spanned(
            &ident,
            "#[procedures] module must be `pub` or `pub(crate)`",
        ));
    }
    let mut names = HashSet::new();
    let mut count = 0usize;

    for item in items.iter_mut() {
        match item {
            Item::Fn(function) => {
                let Some(index) = function.attrs.iter().position(is_marker) else {
                    continue;
                };
                let attr = function.attrs.remove(index);
                count += 1;
                match check_procedure(&attr, function) {
                    Ok(name) => {
                        if !names.insert(name.clone()) {
                            errors.push(syn::Error::new_spanned(
                                &function.sig.ident,
                                format!("duplicate procedure name '{}'", name),
                            ));
                        }
                    }
                    Err(err) => errors.push(err),
                }
            }
            Item::Mod(nested) if contains_markers(nested) => {
                errors.push(syn::Error::new_spanned(
                    &nested.ident,
                    "procedures must be declared directly in the #[procedures] module",
                ));
            }
            other => {
                if let Some(attr) = item_attrs(other).iter().find(|a| is_marker(a)) {
                    errors.push(syn::Error::new_spanned(
                        attr,
                        "procedure markers can only be placed on functions",
                    ));
                }
            }
        }
    }

    if count == 0 {
        errors.push(syn::Error::new_spanned(
            &ident,
            "#[procedures] module has no procedures",
        ));
    }

    errors.finish()?;
    Ok(module.into_token_stream())
}

#[derive(Default)]
struct Errors(Option<syn::Error>);

impl Errors {
    fn push(&mut self, error: syn::Error) {
        match &mut self.0 {
            Some(existing) => existing.combine(error),
            None => self.0 = Some(error),
        }
    }

    fn finish(self) -> syn::Result<()> {
        self.0.map_or(Ok(()), Err)
    }
}

fn parse_namespace(args: TokenStream) -> syn::Result<Option<String>> {
    let mut namespace = None;
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("namespace") {
            if namespace.is_some() {
                return Err(meta.error("duplicate `namespace` argument"));
            }
            namespace = Some(meta.value()?.parse::<LitStr>()?.value());
            Ok(())
        } else {
            Err(meta.error(format!(
                "unknown #[procedures] argument `{}`",
                meta.path.to_token_stream()
            )))
        }
    });
    syn::parse::Parser::parse2(parser, args)?;
    Ok(namespace)
}

/// Check one marked function, returning its procedure name.
fn check_procedure(attr: &Attribute, function: &ItemFn) -> syn::Result<String> {
    let marker = attr
        .path()
        .segments
        .last()
        .map(|s| s.ident.to_string())
        .unwrap_or_default();
    let sig = &function.sig;

    if sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(sig.fn_token, "procedures must be async fns"));
    }
    if let Some(receiver) = sig.inputs.iter().find(|a| matches!(a, FnArg::Receiver(_))) {
        return Err(syn::Error::new_spanned(receiver, "procedures must not take self"));
    }
    if sig.inputs.len() != 2 {
        return Err(syn::Error::new(
            sig.inputs.span(),
            format!(
                "procedures take (context, input), found {} parameter(s)",
                sig.inputs.len()
            ),
        ));
    }
    if !is_crate_visible(&function.vis) {
        return Err(syn::Error::new_spanned(
            &sig.ident,
            "procedures must be `pub` or `pub(crate)`",
        ));
    }

    let mut name = None;
    if !matches!(attr.meta, Meta::Path(_)) {
        let mut route = false;
        let mut validate = false;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                if name.is_some() {
                    return Err(meta.error("duplicate `name` argument"));
                }
                name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("validate") {
                if validate {
                    return Err(meta.error("duplicate `validate` flag"));
                }
                validate = true;
            } else if METHODS.iter().any(|m| meta.path.is_ident(m)) {
                if route {
                    return Err(meta.error("only one HTTP route may be declared"));
                }
                route = true;
                check_path(&meta)?;
            } else {
                return Err(meta.error(format!(
                    "unknown #[{}] argument `{}`",
                    marker,
                    meta.path.to_token_stream()
                )));
            }
            Ok(())
        })?;
    }

    let name = name.unwrap_or_else(|| sig.ident.unraw().to_string());
    if !is_identifier(&name) {
        return Err(syn::Error::new_spanned(
            attr,
            format!("'{}' is not a valid procedure name", name),
        ));
    }
    Ok(name)
}

fn check_path(meta: &ParseNestedMeta) -> syn::Result<()> {
    let lit = meta.value()?.parse::<LitStr>()?;
    let path = lit.value();
    let Some(rest) = path.strip_prefix('/') else {
        return Err(syn::Error::new_spanned(&lit, "path must start with '/'"));
    };

    let mut params = HashSet::new();
    let trimmed = rest.strip_suffix('/').unwrap_or(rest);
    if trimmed.is_empty() {
        return match rest {
            "" => Ok(()),
            _ => Err(syn::Error::new_spanned(&lit, "path contains an empty segment")),
        };
    }
    let rest = trimmed;
    for segment in rest.split('/') {
        if segment.is_empty() {
            return Err(syn::Error::new_spanned(&lit, "path contains an empty segment"));
        }
        if let Some(param) = segment.strip_prefix(':') {
            if !is_identifier(param) {
                return Err(syn::Error::new_spanned(
                    &lit,
                    format!("invalid path parameter ':{}'", param),
                ));
            }
            if !params.insert(param) {
                return Err(syn::Error::new_spanned(
                    &lit,
                    format!("duplicate path parameter ':{}'", param),
                ));
            }
        } else if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '~' | '-'))
        {
            return Err(syn::Error::new_spanned(
                &lit,
                format!("invalid path segment '{}'", segment),
            ));
        }
    }
    Ok(())
}

fn is_crate_visible(vis: &Visibility) -> bool {
    match vis {
        Visibility::Public(_) => true,
        Visibility::Restricted(restricted) => restricted.path.is_ident("crate"),
        Visibility::Inherited => false,
    }
}

fn is_marker(attr: &Attribute) -> bool {
    attr.path()
        .segments
        .last()
        .is_some_and(|s| MARKERS.iter().any(|m| s.ident == m))
}

fn contains_markers(module: &ItemMod) -> bool {
    module.content.as_ref().is_some_and(|(_, items)| {
        items.iter().any(|item| {
            item_attrs(item).iter().any(is_marker)
                || matches!(item, Item::Mod(nested) if contains_markers(nested))
        })
    })
}

fn item_attrs(item: &Item) -> &[Attribute] {
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
        Item::Use(i) => &i.attrs,
        _ => &[],
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::quote;

    fn run(args: TokenStream, module: TokenStream) -> syn::Result<TokenStream> {
        expand(args, syn::parse2(module).unwrap())
    }

    #[test]
    fn strips_markers_and_keeps_everything_else() {
        let out = run(
            quote!(),
            quote! {
                pub mod users {
                    use super::*;

                    #[query(get = "/users/:id")]
                    pub async fn get_user(ctx: Context<App>, input: u32) -> RpcResult<u32> {
                        Ok(input)
                    }

                    fn helper() {}
                }
            },
        )
        .unwrap()
        .to_string();

        assert!(!out.contains("query"));
        assert!(out.contains("get_user"));
        assert!(out.contains("helper"));
    }

    #[test]
    fn rejects_sync_functions_and_wrong_arity() {
        let err = run(
            quote!(),
            quote! {
                pub mod users {
                    #[query]
                    pub fn a(ctx: Context<App>, input: u32) -> RpcResult<u32> { Ok(input) }
                    #[mutation]
                    pub async fn b(input: u32) -> RpcResult<u32> { Ok(input) }
                }
            },
        )
        .unwrap_err();

        let messages: Vec<String> = err.into_iter().map(|e| e.to_string()).collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("async"));
        assert!(messages[1].contains("found 1 parameter"));
    }

    #[test]
    fn rejects_duplicate_names_and_bad_routes() {
        let err = run(
            quote!(),
            quote! {
                pub mod users {
                    #[query]
                    pub async fn get(ctx: Context<App>, input: u32) -> RpcResult<u32> { Ok(input) }
                    #[query(name = "get")]
                    pub async fn other(ctx: Context<App>, input: u32) -> RpcResult<u32> { Ok(input) }
                    #[query(get = "users")]
                    pub async fn third(ctx: Context<App>, input: u32) -> RpcResult<u32> { Ok(input) }
                }
            },
        )
        .unwrap_err();

        let messages: Vec<String> = err.into_iter().map(|e| e.to_string()).collect();
        assert!(messages.iter().any(|m| m.contains("duplicate procedure name 'get'")));
        assert!(messages.iter().any(|m| m.contains("must start with '/'")));
    }

    #[test]
    fn namespace_argument_is_checked() {
        let module = quote! {
            pub mod users {
                #[query]
                pub async fn get(ctx: Context<App>, input: u32) -> RpcResult<u32> { Ok(input) }
            }
        };
        assert!(run(quote!(namespace = "admin.users"), module.clone()).is_ok());
        assert!(run(quote!(namespace = "admin users"), module.clone()).is_err());
        assert!(run(quote!(prefix = "x"), module).is_err());
    }

    #[test]
    fn empty_and_external_modules_are_rejected() {
        assert!(run(quote!(), quote!(mod users {})).is_err());
        assert!(run(quote!(), quote!(mod users;)).is_err());
    }

    #[test]
    fn path_checks_match_router_rules() {
        let module = |path: &str| {
            let lit = LitStr::new(path, proc_macro2::Span::call_site());
            quote! {
                pub mod users {
                    #[query(get = #lit)]
                    pub async fn get(ctx: Context<App>, input: u32) -> RpcResult<u32> { Ok(input) }
                }
            }
        };
        assert!(run(quote!(), module("/")).is_ok());
        assert!(run(quote!(), module("/users/:id/")).is_ok());
        assert!(run(quote!(), module("/users//x")).is_err());
        assert!(run(quote!(), module("//")).is_err());
        assert!(run(quote!(), module("/users/:id/:id")).is_err());
        assert!(run(quote!(), module("/users/:1d")).is_err());
    }

    #[test]
    fn private_modules_and_functions_are_rejected() {
        let err = run(
            quote!(),
            quote! {
                mod users {
                    #[query]
                    async fn me(ctx: Context<App>, input: u32) -> RpcResult<u32> { Ok(input) }
                }
            },
        )
        .unwrap_err();

        let messages: Vec<String> = err.into_iter().map(|e| e.to_string()).collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("module must be `pub`"));
        assert!(messages[1].contains("procedures must be `pub`"));

        assert!(run(
            quote!(),
            quote! {
                pub(crate) mod users {
                    #[query]
                    pub(crate) async fn me(ctx: Context<App>, input: u32) -> RpcResult<u32> { Ok(input) }
                }
            },
        )
        .is_ok());
    }
}
