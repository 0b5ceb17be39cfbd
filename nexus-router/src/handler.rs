//! Handler traits and type erasure
//!
//! Typed handlers are erased into [`BoxedHandler`]s at registration time. The
//! boxed form owns the whole input/output contract: JSON decode, optional
//! [`Validate`] check, the call itself and JSON encode. Adapters only ever see
//! `serde_json::Value`, so REST and RPC cannot diverge on how a procedure's
//! schemas are applied.

use crate::input::decode_input;
use crate::validation::Validate;
use crate::{Context, RpcError, RpcResult};
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{trace, warn};

/// Type-erased procedure handler.
pub type BoxedHandler<Ctx> = Arc<
    dyn Fn(
            Context<Ctx>,
            serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = RpcResult<serde_json::Value>> + Send>>
        + Send
        + Sync,
>;

/// Trait for handler functions
///
/// Automatically implemented for async functions with the signature:
/// `async fn(Context<Ctx>, Input) -> RpcResult<Output>`
pub trait Handler<Ctx, Input, Output>: Clone + Send + Sync + 'static
where
    Ctx: Clone + Send + Sync + 'static,
    Input: DeserializeOwned + Send + 'static,
    Output: Serialize + Send + 'static,
{
    /// The future type returned by the handler
    type Future: Future<Output = RpcResult<Output>> + Send;

    /// Call the handler with context and input
    fn call(&self, ctx: Context<Ctx>, input: Input) -> Self::Future;
}

impl<Ctx, Input, Output, F, Fut> Handler<Ctx, Input, Output> for F
where
    Ctx: Clone + Send + Sync + 'static,
    Input: DeserializeOwned + Send + 'static,
    Output: Serialize + Send + 'static,
    F: Fn(Context<Ctx>, Input) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = RpcResult<Output>> + Send + 'static,
{
    type Future = Fut;

    fn call(&self, ctx: Context<Ctx>, input: Input) -> Self::Future {
        (self)(ctx, input)
    }
}

fn decode<Input: DeserializeOwned>(value: serde_json::Value) -> RpcResult<Input> {
    decode_input(value).map_err(|e| {
        warn!(error = %e, "handler input failed to decode");
        RpcError::validation(format!("Invalid input: {}", e))
    })
}

fn encode<Output: Serialize>(output: Output) -> RpcResult<serde_json::Value> {
    serde_json::to_value(output).map_err(|e| {
        warn!(error = %e, "handler output failed to encode");
        RpcError::internal("Failed to encode procedure output").with_cause(e.to_string())
    })
}

/// Erase a handler without input validation.
pub fn into_boxed<Ctx, Input, Output, H>(handler: H) -> BoxedHandler<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
    Input: DeserializeOwned + Send + 'static,
    Output: Serialize + Send + 'static,
    H: Handler<Ctx, Input, Output>,
{
    Arc::new(move |ctx, input_value| {
        let handler = handler.clone();
        Box::pin(async move {
            let input: Input = decode(input_value)?;
            trace!("executing handler");
            let output = handler.call(ctx, input).await.inspect_err(|e| {
                warn!(error_code = %e.code, error_message = %e.message, "handler failed");
            })?;
            encode(output)
        })
    })
}

/// Erase a handler, checking [`Validate`] on the decoded input first.
///
/// A failing check returns `VALIDATION_ERROR` with
/// `details = {"errors": [FieldError, ..]}` and the handler is not called.
pub fn into_boxed_validated<Ctx, Input, Output, H>(handler: H) -> BoxedHandler<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
    Input: DeserializeOwned + Validate + Send + 'static,
    Output: Serialize + Send + 'static,
    H: Handler<Ctx, Input, Output>,
{
    Arc::new(move |ctx, input_value| {
        let handler = handler.clone();
        Box::pin(async move {
            let input: Input = decode(input_value)?;

            let result = input.validate();
            if !result.is_valid() {
                warn!(
                    error_count = result.errors.len(),
                    fields = ?result.fields(),
                    "handler input validation failed"
                );
                return Err(RpcError::validation("Input validation failed")
                    .with_details(serde_json::json!({ "errors": result.errors })));
            }

            trace!("executing validated handler");
            let output = handler.call(ctx, input).await.inspect_err(|e| {
                warn!(error_code = %e.code, error_message = %e.message, "validated handler failed");
            })?;
            encode(output)
        })
    })
}
