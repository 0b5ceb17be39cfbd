//! Transport adapters
//!
//! Adapters mount an accepted [`CompiledRouter`](crate::CompiledRouter) on a
//! transport. They own no business logic: each call builds a context with the
//! host's [`ContextFactory`], runs the global middleware chain around the
//! procedure's boxed handler, and maps failures through [`map_error`].
//!
//! [`RpcAdapter`] addresses procedures by `namespace.name`; [`RestAdapter`]
//! matches method and path against the REST table. Because the boxed handler
//! carries the decode/validate/encode contract and both adapters share the
//! same [`Dispatcher`] and error mapping, a given failure looks the same on
//! both transports.

mod rest;
mod rpc;

pub use rest::{RestAdapter, RestRequest, RestResponse};
pub use rpc::{RpcAdapter, RpcResponse};

use crate::config::{AdapterConfig, ConfigValidationError};
use crate::context::{ContextFactory, RawRequest, Transport};
use crate::handler::BoxedHandler;
use crate::middleware::{MiddlewareFn, Next, Request, Response, build_middleware_chain};
use crate::procedure::ProcedureDef;
use crate::{Context, RpcError, RpcErrorCode, RpcResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Transport-neutral error representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportError {
    pub code: RpcErrorCode,
    /// Status the REST adapter answers with; informational for RPC.
    pub http_status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// The one mapping from dispatch errors to transport errors.
pub fn map_error(error: &RpcError) -> TransportError {
    TransportError {
        code: error.code,
        http_status: error.code.http_status(),
        message: error.message.clone(),
        details: error.details.clone(),
    }
}

/// Shared invocation core of both adapters.
pub struct Dispatcher<Ctx: Clone + Send + Sync + 'static> {
    context_factory: ContextFactory<Ctx>,
    middleware: Vec<MiddlewareFn<Ctx>>,
    config: AdapterConfig,
}

impl<Ctx: Clone + Send + Sync + 'static> Dispatcher<Ctx> {
    pub fn new(context_factory: ContextFactory<Ctx>) -> Self {
        Self {
            context_factory,
            middleware: Vec::new(),
            config: AdapterConfig::default(),
        }
    }

    /// Replace the configuration after validating it.
    pub fn with_config(mut self, config: AdapterConfig) -> Result<Self, ConfigValidationError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Add global middleware; it runs outside every procedure's own middleware.
    #[must_use = "This method returns a new Dispatcher and does not modify self"]
    pub fn middleware<F, Fut>(mut self, middleware: F) -> Self
    where
        F: Fn(Context<Ctx>, Request, Next<Ctx>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RpcResult<Response>> + Send + 'static,
    {
        self.middleware.push(Arc::new(move |ctx, req, next| {
            Box::pin(middleware(ctx, req, next))
        }));
        self
    }

    #[must_use = "This method returns a new Dispatcher and does not modify self"]
    pub fn middleware_fn(mut self, middleware: MiddlewareFn<Ctx>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Pre-build the middleware chain for one procedure.
    pub(crate) fn chain_for(&self, procedure: &ProcedureDef<BoxedHandler<Ctx>>) -> Next<Ctx> {
        let handler = procedure.handler.clone();
        let final_handler: Next<Ctx> = Arc::new(move |ctx, req| {
            let handler = handler.clone();
            Box::pin(async move { (handler)(ctx, req.input).await })
        });
        build_middleware_chain(self.middleware.clone(), final_handler)
    }

    /// Run one call: size check, context construction, middleware, handler.
    pub(crate) async fn invoke(
        &self,
        chain: &Next<Ctx>,
        procedure: &ProcedureDef<BoxedHandler<Ctx>>,
        transport: Transport,
        headers: HashMap<String, String>,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        let path = procedure.path();

        let input_size = input.to_string().len();
        if input_size > self.config.max_input_size {
            debug!(
                path = %path,
                input_size,
                max_size = self.config.max_input_size,
                "input exceeds size limit"
            );
            return Err(self.error_boundary(RpcError::payload_too_large(format!(
                "Input size {} bytes exceeds maximum {} bytes",
                input_size, self.config.max_input_size
            ))));
        }

        let raw = RawRequest::new(transport, headers);
        let request_id = raw.id;
        trace!(%request_id, %transport, path = %path, kind = %procedure.kind, "dispatching call");

        let ctx = (self.context_factory)(raw)
            .await
            .map_err(|e| self.error_boundary(e))?;

        let request = Request {
            path: path.clone(),
            kind: procedure.kind,
            input,
        };
        let result = (chain)(Context::new(ctx), request).await;

        match result {
            Ok(value) => {
                trace!(%request_id, path = %path, "call succeeded");
                Ok(value)
            }
            Err(error) => {
                debug!(
                    %request_id,
                    path = %path,
                    code = %error.code,
                    "call failed"
                );
                Err(self.error_boundary(error))
            }
        }
    }

    /// Sanitize (unless configured not to) and map an error.
    pub(crate) fn error_boundary(&self, error: RpcError) -> TransportError {
        if error.code.is_server_error() {
            warn!(code = %error.code, message = %error.message, cause = ?error.cause, "server error");
        }
        let error = if self.config.expose_internal_errors {
            error
        } else {
            error.sanitize()
        };
        map_error(&error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_error_carries_status_and_details() {
        let error = RpcError::not_found("no such user").with_details(serde_json::json!({"id": 4}));
        let mapped = map_error(&error);
        assert_eq!(mapped.code, RpcErrorCode::NotFound);
        assert_eq!(mapped.http_status, 404);
        assert_eq!(mapped.message, "no such user");
        assert_eq!(mapped.details, Some(serde_json::json!({"id": 4})));
    }

    #[test]
    fn boundary_sanitizes_internal_errors_by_default() {
        let dispatcher = Dispatcher::new(crate::shared_context(()));
        let mapped = dispatcher.error_boundary(
            RpcError::internal("db password is hunter2").with_details(serde_json::json!({"x": 1})),
        );
        assert_eq!(mapped.http_status, 500);
        assert_eq!(mapped.message, "An internal error occurred");
        assert!(mapped.details.is_none());

        let dispatcher = Dispatcher::new(crate::shared_context(()))
            .with_config(AdapterConfig::new().with_expose_internal_errors(true))
            .unwrap();
        let mapped = dispatcher.error_boundary(RpcError::internal("boom"));
        assert_eq!(mapped.message, "boom");
    }

    #[test]
    fn with_config_rejects_invalid_config() {
        let result = Dispatcher::new(crate::shared_context(()))
            .with_config(AdapterConfig::new().with_max_input_size(0));
        assert!(result.is_err());
    }
}
