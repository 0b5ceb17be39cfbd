//! Context types for dependency injection
//!
//! Handlers receive a [`Context<T>`] built per call by the host application's
//! [`ContextFactory`] from the transport-neutral [`RawRequest`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

use crate::RpcResult;

/// Context wrapper providing access to application state
///
/// The context is cloned for each request, so use `Arc` for shared state.
#[derive(Clone)]
pub struct Context<T: Clone + Send + Sync + 'static> {
    inner: Arc<T>,
}

impl<T: Clone + Send + Sync + 'static> Context<T> {
    /// Create a new context wrapping the given value
    pub fn new(ctx: T) -> Self {
        Self {
            inner: Arc::new(ctx),
        }
    }

    /// Get a reference to the inner context
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Get the Arc for sharing
    pub fn arc(&self) -> Arc<T> {
        self.inner.clone()
    }
}

impl<T: Clone + Send + Sync + 'static> std::ops::Deref for Context<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T: Clone + Send + Sync + 'static + Default> Default for Context<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Empty context for collections that don't need state
#[derive(Clone, Default, Debug)]
pub struct EmptyContext;

/// Transport a call arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// REST route dispatch
    Rest,
    /// RPC call dispatch
    Rpc,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rest => write!(f, "rest"),
            Self::Rpc => write!(f, "rpc"),
        }
    }
}

/// Transport-neutral view of an incoming request, handed to the context factory.
#[derive(Debug, Clone)]
pub struct RawRequest {
    /// Per-call identifier (UUID v7, time ordered)
    pub id: Uuid,
    /// Transport the call arrived on
    pub transport: Transport,
    /// Request headers, names lowercased
    pub headers: HashMap<String, String>,
}

impl RawRequest {
    /// Create a raw request with a fresh id.
    pub fn new(transport: Transport, headers: HashMap<String, String>) -> Self {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
        Self {
            id: Uuid::now_v7(),
            transport,
            headers,
        }
    }

    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Callback supplied by the hosting application to build per-call context.
pub type ContextFactory<Ctx> = Arc<
    dyn Fn(RawRequest) -> Pin<Box<dyn Future<Output = RpcResult<Ctx>> + Send>> + Send + Sync,
>;

/// Wrap an async function as a [`ContextFactory`].
///
/// # Example
/// ```rust,ignore
/// let factory = context_factory(|req: RawRequest| async move {
///     Ok(AppContext { user: req.header("x-user").map(str::to_owned) })
/// });
/// ```
pub fn context_factory<Ctx, F, Fut>(f: F) -> ContextFactory<Ctx>
where
    F: Fn(RawRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RpcResult<Ctx>> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// Factory that hands every call a clone of the same value.
pub fn shared_context<Ctx>(ctx: Ctx) -> ContextFactory<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
{
    Arc::new(move |_req| {
        let ctx = ctx.clone();
        Box::pin(async move { Ok(ctx) })
    })
}
