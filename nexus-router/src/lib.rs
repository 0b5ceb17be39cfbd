//! # Nexus Router
//!
//! Discovery, compilation and dispatch of typed procedures over REST and RPC.
//!
//! ## Overview
//!
//! Procedures are grouped into namespaced *collections*. A collection is
//! declared once and served on both transports:
//! - **Discovery** walks a source tree and finds modules tagged
//!   `#[procedures]`, validating each without executing anything
//! - **Compilation** merges collections into two lookup tables, RPC keyed by
//!   `namespace.name` and REST keyed by method and path, and reports every
//!   duplicate key as a conflict
//! - **Adapters** mount an accepted router on a transport, sharing context
//!   construction, middleware and error mapping
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐   ┌──────────────────┐   ┌──────────────────────────┐
//! │ source tree    │──▶│ discovery::scan  │──▶│ ProcedureCollection<     │
//! │ #[procedures]  │   │ (syn, walkdir)   │   │   HandlerRef>            │
//! └────────────────┘   └──────────────────┘   └────────────┬─────────────┘
//!                                                          │ nexus-router generate
//!                                                          ▼
//! ┌────────────────┐   ┌──────────────────┐   ┌──────────────────────────┐
//! │ RpcAdapter     │◀──│ CompiledRouter   │◀──│ CollectionBuilder        │
//! │ RestAdapter    │   │ (compile)        │   │   -> BoxedHandler<Ctx>   │
//! └────────────────┘   └──────────────────┘   └──────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ### 1. Declare a Collection
//!
//! ```rust,ignore
//! use nexus_router::prelude::*;
//!
//! #[procedures]
//! pub mod users {
//!     use super::*;
//!
//!     #[query(get = "/users/:id")]
//!     pub async fn get_user(ctx: Context<AppContext>, input: GetUser) -> RpcResult<User> {
//!         ctx.db.find(input.id).ok_or_else(|| RpcError::not_found("User not found"))
//!     }
//!
//!     #[mutation(post = "/users", validate)]
//!     pub async fn create_user(ctx: Context<AppContext>, input: NewUser) -> RpcResult<User> {
//!         ctx.db.insert(input)
//!     }
//! }
//! ```
//!
//! ### 2. Register and Compile
//!
//! `nexus-router generate` emits this registration for every discovered
//! collection; it can also be written by hand:
//!
//! ```rust,ignore
//! let users = CollectionBuilder::<AppContext>::new("users")
//!     .procedure("get_user").get("/users/:id").query(users::get_user)
//!     .procedure("create_user").post("/users").validated().mutation(users::create_user)
//!     .build()?;
//!
//! let router = Arc::new(compile([users]));
//! router.ensure_accepted()?;
//! ```
//!
//! ### 3. Mount the Adapters
//!
//! ```rust,ignore
//! let dispatcher = Arc::new(
//!     Dispatcher::new(context_factory(|req: RawRequest| async move {
//!         Ok(AppContext::for_user(req.header("x-user")))
//!     }))
//!     .middleware(logging),
//! );
//!
//! let rpc = RpcAdapter::new(router.clone(), dispatcher.clone())?;
//! let rest = RestAdapter::new(router, dispatcher)?;
//!
//! rpc.call("users.get_user", json!({"id": 1}), headers).await;
//! rest.handle(RestRequest::new(HttpMethod::Get, "/users/1")).await;
//! ```
//!
//! ## Module Structure
//!
//! - [`discovery`] - Source tree scanning and export validation
//! - [`compile`] / [`CompiledRouter`] - Route tables and conflict detection
//! - [`CollectionBuilder`] - Runtime registration of typed handlers
//! - [`adapter`] - REST and RPC adapters
//! - [`middleware`] - Onion-model middleware
//! - [`validation`] - Input validation
//! - [`RpcError`] - Error types and codes

pub mod adapter;
mod builder;
mod compiler;
mod config;
mod context;
pub mod discovery;
mod error;
mod handler;
mod input;
pub mod middleware;
mod path;
pub mod procedure;
pub mod validation;

#[cfg(test)]
mod tests;

// Public API
pub use adapter::{
    Dispatcher, RestAdapter, RestRequest, RestResponse, RpcAdapter, RpcResponse, TransportError,
    map_error,
};
pub use builder::{CollectionBuilder, ProcedureChain, ValidatedProcedureChain};
pub use compiler::{
    CompiledRouter, Conflict, ConflictKey, ConflictSite, RestMatch, RouteEntry, RouterRejected,
    ShadowedRoute, compile,
};
pub use config::{AdapterConfig, ConfigValidationError};
pub use context::{
    Context, ContextFactory, EmptyContext, RawRequest, Transport, context_factory, shared_context,
};
pub use discovery::{
    CancellationSignal, DiscoveryOptions, DiscoveryResult, DiscoveryWarning, FileFilter,
    HandlerRef, OnInvalidExport, Severity,
};
pub use error::{
    DiscoveryError, DiscoveryErrorKind, InvalidExport, RpcError, RpcErrorCode, RpcResult,
};
pub use handler::{BoxedHandler, Handler, into_boxed, into_boxed_validated};
pub use middleware::{MiddlewareFn, Next, Request, Response, from_fn};
pub use path::{PathPattern, PathPatternError};
pub use procedure::{
    HttpMethod, ProcedureCollection, ProcedureDef, ProcedureKind, RestKey, RpcKey, SchemaRef,
    TransportMeta,
};
pub use validation::{FieldError, Validate, ValidationResult, ValidationRules};

#[cfg(feature = "macros")]
pub use nexus_router_macros::{mutation, procedures, query};

/// Prelude for convenient imports
///
/// ```rust,ignore
/// use nexus_router::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Building
        CollectionBuilder,
        // Compilation
        CompiledRouter,
        // Context
        Context,
        ContextFactory,
        // Adapters
        Dispatcher,
        EmptyContext,
        // Validation
        FieldError,
        HttpMethod,
        // Middleware
        Next,
        RawRequest,
        Request,
        Response,
        RestAdapter,
        RestRequest,
        RpcAdapter,
        // Errors
        RpcError,
        RpcErrorCode,
        RpcResult,
        Validate,
        ValidationResult,
        ValidationRules,
        compile,
        context_factory,
        shared_context,
    };

    #[cfg(feature = "macros")]
    pub use crate::{mutation, procedures, query};
}
