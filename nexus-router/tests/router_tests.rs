//! Integration tests for runtime collections served over both transports
//!
//! These tests verify that a compiled router behaves the same behind the RPC
//! and REST adapters: one validation contract, one error mapping and one
//! middleware stack.

use nexus_router::prelude::*;
use nexus_router::{AdapterConfig, RawRequest, RpcErrorCode, ValidationRules, context_factory, from_fn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// =============================================================================
// Test Context and Handlers
// =============================================================================

#[derive(Clone, Default)]
struct AppContext {
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetUser {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct CreateUser {
    name: String,
}

impl Validate for CreateUser {
    fn validate(&self) -> ValidationResult {
        ValidationRules::new()
            .required("name", &self.name)
            .max_length("name", &self.name, 16)
            .build()
    }
}

#[derive(Debug, Deserialize)]
struct ByName {
    name: String,
}

#[derive(Debug, Serialize)]
struct User {
    id: u64,
    name: String,
}

async fn get_user(_ctx: Context<AppContext>, input: GetUser) -> RpcResult<User> {
    if input.id == 0 {
        return Err(RpcError::not_found("User not found"));
    }
    Ok(User {
        id: input.id,
        name: format!("user-{}", input.id),
    })
}

async fn create_user(ctx: Context<AppContext>, input: CreateUser) -> RpcResult<User> {
    let Some(_) = &ctx.user else {
        return Err(RpcError::unauthorized("Sign in first"));
    };
    Ok(User {
        id: 7,
        name: input.name,
    })
}

async fn by_name(_ctx: Context<AppContext>, input: ByName) -> RpcResult<String> {
    Ok(input.name)
}

async fn crash(_ctx: Context<AppContext>, _input: ()) -> RpcResult<()> {
    Err(RpcError::internal("database password is hunter2"))
}

fn router() -> Arc<CompiledRouter<nexus_router::BoxedHandler<AppContext>>> {
    let users = CollectionBuilder::<AppContext>::new("users")
        .source("tests#users")
        .procedure("get")
        .get("/users/:id")
        .query(get_user)
        .procedure("create")
        .post("/users")
        .validated()
        .mutation(create_user)
        .query("crash", crash)
        .procedure("by_name")
        .get("/users/by-name/:name")
        .query(by_name)
        .build()
        .unwrap();
    Arc::new(compile([users]))
}

fn dispatcher() -> Dispatcher<AppContext> {
    Dispatcher::new(context_factory(|req: RawRequest| async move {
        Ok(AppContext {
            user: req.header("x-user").map(str::to_owned),
        })
    }))
}

fn signed_in() -> HashMap<String, String> {
    HashMap::from([("X-User".to_string(), "ada".to_string())])
}

// =============================================================================
// Shared contract
// =============================================================================

#[tokio::test]
async fn same_procedure_over_both_transports() {
    let rpc = RpcAdapter::new(router(), dispatcher()).unwrap();
    let rest = RestAdapter::new(router(), dispatcher()).unwrap();

    let via_rpc = rpc
        .call("users.get", json!({"id": 5}), HashMap::new())
        .await
        .into_result()
        .unwrap();
    let via_rest = rest
        .handle(RestRequest::new(HttpMethod::Get, "/users/5"))
        .await;

    assert_eq!(via_rest.status, 200);
    assert_eq!(via_rpc, via_rest.body);
    assert_eq!(via_rpc, json!({"id": 5, "name": "user-5"}));
}

#[tokio::test]
async fn string_path_params_decode_the_same_on_both_transports() {
    let rpc = RpcAdapter::new(router(), dispatcher()).unwrap();
    let rest = RestAdapter::new(router(), dispatcher()).unwrap();

    let via_rpc = rpc
        .call("users.by_name", json!({"name": "02134"}), HashMap::new())
        .await
        .into_result()
        .unwrap();
    let via_rest = rest
        .handle(RestRequest::new(HttpMethod::Get, "/users/by-name/02134"))
        .await;

    assert_eq!(via_rest.status, 200);
    assert_eq!(via_rpc, json!("02134"));
    assert_eq!(via_rest.body, via_rpc);
}

#[tokio::test]
async fn numeric_strings_decode_the_same_on_both_transports() {
    let rpc = RpcAdapter::new(router(), dispatcher()).unwrap();
    let rest = RestAdapter::new(router(), dispatcher()).unwrap();

    let via_rpc = rpc
        .call("users.get", json!({"id": "5"}), HashMap::new())
        .await
        .into_result()
        .unwrap();
    let via_rest = rest
        .handle(RestRequest::new(HttpMethod::Get, "/users/5").query("id", "9"))
        .await;
    assert_eq!(via_rpc, json!({"id": 5, "name": "user-5"}));
    assert_eq!(via_rest.body, via_rpc);

    let rpc_error = rpc
        .call("users.get", json!({"id": "five"}), HashMap::new())
        .await
        .into_result()
        .unwrap_err();
    let rest_error = rest
        .handle(RestRequest::new(HttpMethod::Get, "/users/five"))
        .await
        .error_body()
        .unwrap();
    assert_eq!(rpc_error.code, RpcErrorCode::ValidationError);
    assert_eq!(rest_error, rpc_error);
}

#[tokio::test]
async fn validation_failure_maps_identically() {
    let rpc = RpcAdapter::new(router(), dispatcher()).unwrap();
    let rest = RestAdapter::new(router(), dispatcher()).unwrap();

    let rpc_error = rpc
        .call("users.create", json!({"name": ""}), signed_in())
        .await
        .into_result()
        .unwrap_err();

    let mut request = RestRequest::new(HttpMethod::Post, "/users").body(json!({"name": ""}));
    for (name, value) in signed_in() {
        request = request.header(name, value);
    }
    let response = rest.handle(request).await;

    assert_eq!(rpc_error.code, RpcErrorCode::ValidationError);
    assert_eq!(rpc_error.http_status, 422);
    assert_eq!(response.status, 422);
    assert_eq!(response.error_body(), Some(rpc_error.clone()));
    assert_eq!(rpc_error.details.unwrap()["errors"][0]["field"], "name");
}

#[tokio::test]
async fn context_factory_sees_headers() {
    let rpc = RpcAdapter::new(router(), dispatcher()).unwrap();

    let anonymous = rpc
        .call("users.create", json!({"name": "Ada"}), HashMap::new())
        .await
        .into_result()
        .unwrap_err();
    assert_eq!(anonymous.code, RpcErrorCode::Unauthorized);
    assert_eq!(anonymous.http_status, 401);

    let created = rpc
        .call("users.create", json!({"name": "Ada"}), signed_in())
        .await
        .into_result()
        .unwrap();
    assert_eq!(created["name"], "Ada");
}

#[tokio::test]
async fn internal_errors_are_sanitized_unless_exposed() {
    let rpc = RpcAdapter::new(router(), dispatcher()).unwrap();
    let hidden = rpc
        .call("users.crash", json!(null), HashMap::new())
        .await
        .into_result()
        .unwrap_err();
    assert_eq!(hidden.code, RpcErrorCode::InternalError);
    assert!(!hidden.message.contains("hunter2"));

    let exposed_dispatcher = dispatcher()
        .with_config(AdapterConfig::new().with_expose_internal_errors(true))
        .unwrap();
    let rpc = RpcAdapter::new(router(), exposed_dispatcher).unwrap();
    let exposed = rpc
        .call("users.crash", json!(null), HashMap::new())
        .await
        .into_result()
        .unwrap_err();
    assert!(exposed.message.contains("hunter2"));
}

#[tokio::test]
async fn oversized_input_is_rejected_before_dispatch() {
    let dispatcher = dispatcher()
        .with_config(AdapterConfig::new().with_max_input_size(16))
        .unwrap();
    let rest = RestAdapter::new(router(), dispatcher).unwrap();

    let response = rest
        .handle(
            RestRequest::new(HttpMethod::Post, "/users")
                .header("x-user", "ada")
                .body(json!({"name": "a very long name indeed"})),
        )
        .await;
    assert_eq!(response.status, 413);
}

// =============================================================================
// Middleware
// =============================================================================

#[tokio::test]
async fn global_middleware_wraps_both_transports() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let dispatcher = dispatcher().middleware_fn(from_fn(
        move |ctx, req: Request, next: Next<AppContext>| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(req.path.clone());
                next(ctx, req).await
            }
        },
    ));
    let dispatcher = Arc::new(dispatcher);

    let rpc = RpcAdapter::new(router(), dispatcher.clone()).unwrap();
    let rest = RestAdapter::new(router(), dispatcher).unwrap();

    rpc.call("users.get", json!({"id": 1}), HashMap::new()).await;
    rest.handle(RestRequest::new(HttpMethod::Get, "/users/2")).await;

    assert_eq!(*seen.lock().unwrap(), ["users.get", "users.get"]);
}

#[tokio::test]
async fn middleware_can_short_circuit() {
    let dispatcher = dispatcher().middleware(|ctx: Context<AppContext>, req: Request, next: Next<AppContext>| async move {
        if req.procedure() == "crash" {
            return Err(RpcError::forbidden("crash is disabled"));
        }
        next(ctx, req).await
    });
    let rpc = RpcAdapter::new(router(), dispatcher).unwrap();

    let error = rpc
        .call("users.crash", json!(null), HashMap::new())
        .await
        .into_result()
        .unwrap_err();
    assert_eq!(error.code, RpcErrorCode::Forbidden);
    assert_eq!(error.http_status, 403);
}

// =============================================================================
// Mounting
// =============================================================================

#[tokio::test]
async fn rejected_router_cannot_be_mounted() {
    let build = |source: &str| {
        CollectionBuilder::<AppContext>::new("users")
            .source(source)
            .query("get", get_user)
            .build()
            .unwrap()
    };
    let router = Arc::new(compile([build("a"), build("b")]));

    let err = RpcAdapter::new(router.clone(), dispatcher()).err().unwrap();
    assert_eq!(err.conflicts.len(), 1);
    assert!(RestAdapter::new(router, dispatcher()).is_err());
}

#[tokio::test]
async fn unknown_procedure_lists_available_ones() {
    let rpc = RpcAdapter::new(router(), dispatcher()).unwrap();
    let error = rpc
        .call("users.delete", json!(null), HashMap::new())
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(error.code, RpcErrorCode::ProcedureNotFound);
    assert_eq!(error.http_status, 404);
    let available = error.details.unwrap()["available_procedures"].clone();
    assert_eq!(available, json!(["users.get", "users.create", "users.crash", "users.by_name"]));
}
