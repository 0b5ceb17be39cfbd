//! Middleware for dispatched calls
//!
//! Middleware wraps procedure execution in an onion: given `[m1, m2, m3]` and
//! handler `h`, a call runs `m1 → m2 → m3 → h → m3 → m2 → m1`. Middleware can
//! be installed globally on a [`Dispatcher`](crate::adapter::Dispatcher) or per
//! procedure through the collection builder; global middleware always runs
//! outside procedure middleware.

use crate::procedure::ProcedureKind;
use crate::{Context, RpcResult};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Request information passed to middleware
#[derive(Clone, Debug)]
pub struct Request {
    /// Dotted RPC path of the procedure (e.g. `users.get_user`), whichever
    /// transport the call arrived on
    pub path: String,
    pub kind: ProcedureKind,
    /// Input as JSON, after REST parameter merging
    pub input: serde_json::Value,
}

impl Request {
    /// Namespace part of the path.
    pub fn namespace(&self) -> &str {
        self.path
            .rsplit_once('.')
            .map(|(namespace, _)| namespace)
            .unwrap_or_default()
    }

    /// Procedure name part of the path.
    pub fn procedure(&self) -> &str {
        self.path
            .rsplit_once('.')
            .map(|(_, name)| name)
            .unwrap_or(&self.path)
    }
}

/// Response type (JSON value)
pub type Response = serde_json::Value;

/// Next function in the middleware chain
pub type Next<Ctx> = Arc<
    dyn Fn(Context<Ctx>, Request) -> Pin<Box<dyn Future<Output = RpcResult<Response>> + Send>>
        + Send
        + Sync,
>;

/// Middleware function type
pub type MiddlewareFn<Ctx> = Arc<
    dyn Fn(
            Context<Ctx>,
            Request,
            Next<Ctx>,
        ) -> Pin<Box<dyn Future<Output = RpcResult<Response>> + Send>>
        + Send
        + Sync,
>;

/// Create middleware from an async function
///
/// # Example
/// ```rust,ignore
/// let timing = from_fn(|ctx, req: Request, next: Next<AppContext>| async move {
///     let started = std::time::Instant::now();
///     let result = next(ctx, req.clone()).await;
///     tracing::info!(path = %req.path, elapsed = ?started.elapsed(), "call finished");
///     result
/// });
/// ```
pub fn from_fn<Ctx, F, Fut>(f: F) -> MiddlewareFn<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
    F: Fn(Context<Ctx>, Request, Next<Ctx>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RpcResult<Response>> + Send + 'static,
{
    Arc::new(move |ctx, req, next| Box::pin(f(ctx, req, next)))
}

/// Compose middleware around a final handler.
///
/// The first middleware in `middleware` is the outermost layer.
pub fn build_middleware_chain<Ctx: Clone + Send + Sync + 'static>(
    middleware: Vec<MiddlewareFn<Ctx>>,
    final_handler: Next<Ctx>,
) -> Next<Ctx> {
    middleware
        .into_iter()
        .rev()
        .fold(final_handler, |next, mw| {
            Arc::new(move |ctx, req| {
                let mw = mw.clone();
                let next = next.clone();
                Box::pin(async move { (mw)(ctx, req, next).await })
            })
        })
}
