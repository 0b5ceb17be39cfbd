//! # nexus-router-macros
//!
//! Attribute macros that tag procedure collections for discovery.
//!
//! `#[procedures]` marks an inline module as a collection. Inside it,
//! `#[query]` and `#[mutation]` mark the procedures. The macros generate no
//! code: they check the collection's shape at compile time, strip the inner
//! markers and hand the module back unchanged. Registration happens through
//! the static table emitted by `nexus-router generate`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nexus_router::prelude::*;
//!
//! #[procedures(namespace = "users")]
//! pub mod users {
//!     use super::*;
//!
//!     #[query(get = "/users/:id")]
//!     pub async fn get_user(ctx: Context<App>, input: GetUser) -> RpcResult<User> {
//!         todo!()
//!     }
//!
//!     #[mutation(name = "create", post = "/users", validate)]
//!     pub async fn create_user(ctx: Context<App>, input: NewUser) -> RpcResult<User> {
//!         todo!()
//!     }
//! }
//! ```
//!
//! ## Attributes
//!
//! ### Collection
//!
//! - `#[procedures]` - Namespace is the module name
//! - `#[procedures(namespace = "a.b")]` - Explicit, dot-separated namespace
//!
//! ### Procedure
//!
//! - `#[query]` / `#[mutation]` - RPC-only procedure named after the function
//! - `name = "..."` - Procedure name override
//! - `get | post | put | patch | delete = "/path/:param"` - REST route
//! - `validate` - Run the input's `Validate` impl before the handler

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::ItemMod;

mod collection;

/// Mark an inline module as a procedure collection.
#[proc_macro_attribute]
pub fn procedures(args: TokenStream, item: TokenStream) -> TokenStream {
    let module = syn::parse_macro_input!(item as ItemMod);

    match collection::expand(args.into(), module) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.into_compile_error().into(),
    }
}

/// Mark a query procedure. Only valid inside a `#[procedures]` module.
#[proc_macro_attribute]
pub fn query(_args: TokenStream, item: TokenStream) -> TokenStream {
    stray_marker("query", item)
}

/// Mark a mutation procedure. Only valid inside a `#[procedures]` module.
#[proc_macro_attribute]
pub fn mutation(_args: TokenStream, item: TokenStream) -> TokenStream {
    stray_marker("mutation", item)
}

/// Markers inside a collection are stripped by `#[procedures]`, so reaching
/// this means the marker sits outside one.
fn stray_marker(marker: &str, item: TokenStream) -> TokenStream {
    let item = proc_macro2::TokenStream::from(item);
    let error = syn::Error::new(
        Span::call_site(),
        format!(
            "#[{}] must be placed on a function directly inside a #[procedures] module",
            marker
        ),
    )
    .into_compile_error();

    quote! {
        #error
        #item
    }
    .into()
}
