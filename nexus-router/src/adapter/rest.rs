//! REST adapter: procedures addressed by HTTP method and path.
//!
//! The procedure input is built from the request body, the query string and
//! the path parameters, in increasing precedence. Parameter values are passed
//! on as JSON strings; the procedure's typed decode reads them as numbers or
//! booleans only where its input type expects one.

use super::{Dispatcher, TransportError};
use crate::compiler::{CompiledRouter, RouterRejected};
use crate::context::Transport;
use crate::handler::BoxedHandler;
use crate::middleware::Next;
use crate::procedure::{HttpMethod, RestKey};
use crate::RpcError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A transport-neutral HTTP request.
#[derive(Debug, Clone)]
pub struct RestRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
    pub headers: HashMap<String, String>,
}

impl RestRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: HashMap::new(),
            body: None,
            headers: HashMap::new(),
        }
    }

    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Status and JSON body of a REST reply.
///
/// Errors are rendered as `{"error": TransportError}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl RestResponse {
    fn ok(body: serde_json::Value) -> Self {
        Self { status: 200, body }
    }

    fn error(error: TransportError) -> Self {
        Self {
            status: error.http_status,
            body: serde_json::json!({ "error": error }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The transport error carried by a failed response.
    pub fn error_body(&self) -> Option<TransportError> {
        self.body
            .get("error")
            .and_then(|error| serde_json::from_value(error.clone()).ok())
    }
}

/// Serves an accepted router's REST table.
pub struct RestAdapter<Ctx: Clone + Send + Sync + 'static> {
    router: Arc<CompiledRouter<BoxedHandler<Ctx>>>,
    dispatcher: Arc<Dispatcher<Ctx>>,
    chains: HashMap<RestKey, Next<Ctx>>,
}

impl<Ctx: Clone + Send + Sync + 'static> RestAdapter<Ctx> {
    /// Mount `router`. A rejected router cannot be mounted.
    pub fn new(
        router: Arc<CompiledRouter<BoxedHandler<Ctx>>>,
        dispatcher: impl Into<Arc<Dispatcher<Ctx>>>,
    ) -> Result<Self, RouterRejected> {
        router.ensure_accepted()?;
        let dispatcher = dispatcher.into();
        let chains = router
            .rest_table()
            .iter()
            .map(|(key, entry)| (key.clone(), dispatcher.chain_for(&entry.procedure)))
            .collect();
        info!(routes = router.rest_table().len(), "rest adapter mounted");
        Ok(Self {
            router,
            dispatcher,
            chains,
        })
    }

    /// Mounted routes as `METHOD /path`, in compile order.
    pub fn routes(&self) -> Vec<String> {
        self.router.rest_table().keys().map(ToString::to_string).collect()
    }

    pub async fn handle(&self, request: RestRequest) -> RestResponse {
        let RestRequest {
            method,
            path,
            query,
            body,
            headers,
        } = request;

        let Some(found) = self.router.match_rest(method, &path) else {
            let allowed = self.router.allowed_methods(&path);
            if allowed.is_empty() {
                debug!(%method, path = %path, "no route");
                return self.fail(RpcError::procedure_not_found(&path));
            }
            debug!(%method, path = %path, ?allowed, "method not allowed");
            return self.fail(
                RpcError::method_not_allowed(method, &path)
                    .with_details(serde_json::json!({ "allowed": allowed })),
            );
        };

        let procedure = &found.entry.procedure;
        let Some(chain) = procedure
            .rest_key()
            .and_then(|key| self.chains.get(&key))
        else {
            return self.fail(RpcError::procedure_not_found(&path));
        };

        let input = match merge_input(body, query, found.params) {
            Ok(input) => input,
            Err(error) => return self.fail(error),
        };

        match self
            .dispatcher
            .invoke(chain, procedure, Transport::Rest, headers, input)
            .await
        {
            Ok(result) => RestResponse::ok(result),
            Err(error) => RestResponse::error(error),
        }
    }

    fn fail(&self, error: RpcError) -> RestResponse {
        RestResponse::error(self.dispatcher.error_boundary(error))
    }
}

/// Merge body, query and path parameters into one input value.
fn merge_input(
    body: Option<serde_json::Value>,
    query: HashMap<String, String>,
    params: HashMap<String, String>,
) -> Result<serde_json::Value, RpcError> {
    let body = body.unwrap_or(serde_json::Value::Null);
    if query.is_empty() && params.is_empty() {
        return Ok(body);
    }

    let mut input = match body {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => serde_json::Map::new(),
        _ => {
            return Err(RpcError::bad_request(
                "Request body must be a JSON object when the route has parameters",
            ));
        }
    };

    // Values stay strings; the handler's typed decode reads them as numbers
    // or booleans where the input type asks for one.
    let mut query: Vec<_> = query.into_iter().collect();
    query.sort();
    for (name, value) in query.into_iter().chain(params) {
        input.insert(name, serde_json::Value::String(value));
    }
    Ok(serde_json::Value::Object(input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CollectionBuilder, Context, RpcErrorCode, RpcResult, compile, shared_context};
    use serde_json::json;

    #[derive(Deserialize)]
    struct GetUser {
        id: u64,
    }

    async fn get_user(_ctx: Context<()>, input: GetUser) -> RpcResult<serde_json::Value> {
        Ok(json!({ "id": input.id }))
    }

    #[derive(Deserialize)]
    struct Code {
        code: String,
    }

    async fn code(_ctx: Context<()>, input: Code) -> RpcResult<String> {
        Ok(input.code)
    }

    async fn raw(_ctx: Context<()>, input: serde_json::Value) -> RpcResult<serde_json::Value> {
        Ok(input)
    }

    fn adapter() -> RestAdapter<()> {
        let users = CollectionBuilder::new("users")
            .procedure("get")
            .get("/users/:id")
            .query(get_user)
            .procedure("me")
            .get("/users/me")
            .query(|_ctx: Context<()>, _input: ()| async { Ok("me") })
            .procedure("update")
            .put("/users/:id")
            .mutation(raw)
            .procedure("echo")
            .post("/echo")
            .mutation(raw)
            .procedure("code")
            .get("/codes/:code")
            .query(code)
            .build()
            .unwrap();
        let router = Arc::new(compile([users]));
        RestAdapter::new(router, Dispatcher::new(shared_context(()))).unwrap()
    }

    #[tokio::test]
    async fn path_params_decode_into_typed_input() {
        let response = adapter()
            .handle(RestRequest::new(HttpMethod::Get, "/users/42"))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({"id": 42}));
    }

    #[tokio::test]
    async fn path_params_keep_their_text_for_string_fields() {
        let response = adapter()
            .handle(RestRequest::new(HttpMethod::Get, "/codes/02134"))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!("02134"));
    }

    #[tokio::test]
    async fn ids_above_i64_decode_as_u64() {
        let response = adapter()
            .handle(RestRequest::new(HttpMethod::Get, "/users/18446744073709551615"))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({"id": u64::MAX}));
    }

    #[tokio::test]
    async fn literal_route_beats_parameter_route() {
        let response = adapter()
            .handle(RestRequest::new(HttpMethod::Get, "/users/me"))
            .await;
        assert_eq!(response.body, json!("me"));
    }

    #[tokio::test]
    async fn path_params_override_query_and_body() {
        let response = adapter()
            .handle(
                RestRequest::new(HttpMethod::Put, "/users/7")
                    .query("id", "1")
                    .query("verbose", "true")
                    .body(json!({"id": 0, "name": "ada"})),
            )
            .await;
        assert_eq!(
            response.body,
            json!({"id": "7", "name": "ada", "verbose": "true"})
        );
    }

    #[tokio::test]
    async fn non_object_body_passes_through_without_params() {
        let response = adapter()
            .handle(RestRequest::new(HttpMethod::Post, "/echo").body(json!([1, 2])))
            .await;
        assert_eq!(response.body, json!([1, 2]));

        let response = adapter()
            .handle(
                RestRequest::new(HttpMethod::Put, "/users/7").body(json!([1, 2])),
            )
            .await;
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn unknown_path_and_wrong_method() {
        let adapter = adapter();

        let response = adapter
            .handle(RestRequest::new(HttpMethod::Get, "/nowhere"))
            .await;
        assert_eq!(response.status, 404);
        assert_eq!(
            response.error_body().unwrap().code,
            RpcErrorCode::ProcedureNotFound
        );

        let response = adapter
            .handle(RestRequest::new(HttpMethod::Delete, "/users/7"))
            .await;
        assert_eq!(response.status, 405);
        assert_eq!(
            response.error_body().unwrap().details,
            Some(json!({"allowed": ["GET", "PUT"]}))
        );
    }

    #[tokio::test]
    async fn decode_failure_is_a_validation_error() {
        let response = adapter()
            .handle(RestRequest::new(HttpMethod::Get, "/users/abc"))
            .await;
        assert_eq!(response.status, 422);
        assert_eq!(
            response.error_body().unwrap().code,
            RpcErrorCode::ValidationError
        );
    }
}
