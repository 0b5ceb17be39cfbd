//! Runtime collection registration
//!
//! [`CollectionBuilder`] is the explicit registration path for procedure
//! collections: application code (or code emitted by `nexus-router generate`)
//! builds each collection during start-up and hands the results to
//! [`compile`](crate::compile).
//!
//! ```rust,ignore
//! let users = CollectionBuilder::<AppContext>::new("users")
//!     .source("src/procedures/users.rs")
//!     .procedure("get_user")
//!         .get("/users/:id")
//!         .query(get_user)
//!     .procedure("create_user")
//!         .post("/users")
//!         .validated()
//!         .mutation(create_user)
//!     .query("list_users", list_users)
//!     .build()?;
//! ```
//!
//! Problems such as a malformed path pattern are remembered while chaining and
//! reported by [`CollectionBuilder::build`] as an [`InvalidExport`], the same
//! error the discovery validator produces for a bad source module.

use crate::handler::{BoxedHandler, into_boxed, into_boxed_validated};
use crate::middleware::{MiddlewareFn, Next, Request, Response, build_middleware_chain};
use crate::path::{PathPattern, is_identifier};
use crate::procedure::{
    HttpMethod, ProcedureCollection, ProcedureDef, ProcedureKind, SchemaRef, TransportMeta,
};
use crate::validation::Validate;
use crate::{Context, InvalidExport, RpcResult};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Whether `namespace` is a dot-separated list of identifiers.
pub(crate) fn is_valid_namespace(namespace: &str) -> bool {
    !namespace.is_empty() && namespace.split('.').all(is_identifier)
}

/// Fluent builder for one [`ProcedureCollection`] of runtime handlers.
pub struct CollectionBuilder<Ctx: Clone + Send + Sync + 'static> {
    namespace: String,
    source: Option<String>,
    procedures: Vec<ProcedureDef<BoxedHandler<Ctx>>>,
    problems: Vec<String>,
}

impl<Ctx: Clone + Send + Sync + 'static> CollectionBuilder<Ctx> {
    /// Start a collection addressed under `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            source: None,
            procedures: Vec::new(),
            problems: Vec::new(),
        }
    }

    /// Label used for this collection in conflict diagnostics.
    ///
    /// Defaults to the namespace.
    #[must_use = "This method returns a new CollectionBuilder and does not modify self"]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Start configuring a procedure.
    #[must_use = "This method returns a ProcedureChain that must be finished with query or mutation"]
    pub fn procedure(self, name: impl Into<String>) -> ProcedureChain<Ctx> {
        ProcedureChain {
            builder: self,
            name: name.into(),
            rest: None,
            middleware: Vec::new(),
        }
    }

    /// Register an RPC-only query.
    #[must_use = "This method returns a new CollectionBuilder and does not modify self"]
    pub fn query<H, Fut, Input, Output>(self, name: impl Into<String>, handler: H) -> Self
    where
        H: Fn(Context<Ctx>, Input) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = RpcResult<Output>> + Send + 'static,
        Input: DeserializeOwned + Send + 'static,
        Output: Serialize + Send + 'static,
    {
        self.procedure(name).query(handler)
    }

    /// Register an RPC-only mutation.
    #[must_use = "This method returns a new CollectionBuilder and does not modify self"]
    pub fn mutation<H, Fut, Input, Output>(self, name: impl Into<String>, handler: H) -> Self
    where
        H: Fn(Context<Ctx>, Input) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = RpcResult<Output>> + Send + 'static,
        Input: DeserializeOwned + Send + 'static,
        Output: Serialize + Send + 'static,
    {
        self.procedure(name).mutation(handler)
    }

    /// Finish the collection.
    ///
    /// Fails when the namespace or a procedure name is not an identifier, a
    /// REST path does not parse, the collection is empty, or two procedures
    /// share a name.
    pub fn build(self) -> Result<ProcedureCollection<BoxedHandler<Ctx>>, InvalidExport> {
        let namespace = self.namespace;
        let invalid = |reason: String| InvalidExport::new(namespace.clone(), reason);

        if !is_valid_namespace(&namespace) {
            return Err(invalid(format!("'{}' is not a valid namespace", namespace)));
        }
        if let Some(problem) = self.problems.into_iter().next() {
            return Err(invalid(problem));
        }
        if self.procedures.is_empty() {
            return Err(invalid("collection has no procedures".to_string()));
        }

        let mut seen = HashSet::new();
        for procedure in &self.procedures {
            if !seen.insert(procedure.name.as_str()) {
                return Err(invalid(format!(
                    "duplicate procedure name '{}'",
                    procedure.name
                )));
            }
        }

        let source = self.source.unwrap_or_else(|| namespace.clone());
        debug!(
            namespace = %namespace,
            source = %source,
            procedures = self.procedures.len(),
            "built procedure collection"
        );

        Ok(ProcedureCollection {
            namespace,
            source,
            procedures: self.procedures.into_iter().map(Arc::new).collect(),
        })
    }
}

/// Configuration for one procedure, finished by `query` or `mutation`.
pub struct ProcedureChain<Ctx: Clone + Send + Sync + 'static> {
    builder: CollectionBuilder<Ctx>,
    name: String,
    rest: Option<(HttpMethod, String)>,
    middleware: Vec<MiddlewareFn<Ctx>>,
}

impl<Ctx: Clone + Send + Sync + 'static> ProcedureChain<Ctx> {
    /// Expose the procedure over REST as well as RPC.
    #[must_use = "This method returns a new ProcedureChain and does not modify self"]
    pub fn rest(mut self, method: HttpMethod, path: impl Into<String>) -> Self {
        self.rest = Some((method, path.into()));
        self
    }

    #[must_use = "This method returns a new ProcedureChain and does not modify self"]
    pub fn get(self, path: impl Into<String>) -> Self {
        self.rest(HttpMethod::Get, path)
    }

    #[must_use = "This method returns a new ProcedureChain and does not modify self"]
    pub fn post(self, path: impl Into<String>) -> Self {
        self.rest(HttpMethod::Post, path)
    }

    #[must_use = "This method returns a new ProcedureChain and does not modify self"]
    pub fn put(self, path: impl Into<String>) -> Self {
        self.rest(HttpMethod::Put, path)
    }

    #[must_use = "This method returns a new ProcedureChain and does not modify self"]
    pub fn patch(self, path: impl Into<String>) -> Self {
        self.rest(HttpMethod::Patch, path)
    }

    #[must_use = "This method returns a new ProcedureChain and does not modify self"]
    pub fn delete(self, path: impl Into<String>) -> Self {
        self.rest(HttpMethod::Delete, path)
    }

    /// Add middleware to this procedure.
    ///
    /// Middleware is executed in registration order (first registered = outermost),
    /// inside any dispatcher-wide middleware.
    #[must_use = "This method returns a new ProcedureChain and does not modify self"]
    pub fn use_middleware<F, Fut>(mut self, middleware: F) -> Self
    where
        F: Fn(Context<Ctx>, Request, Next<Ctx>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RpcResult<Response>> + Send + 'static,
    {
        self.middleware.push(Arc::new(move |ctx, req, next| {
            Box::pin(middleware(ctx, req, next))
        }));
        self
    }

    /// Add a middleware function (already wrapped as MiddlewareFn).
    #[must_use = "This method returns a new ProcedureChain and does not modify self"]
    pub fn use_middleware_fn(mut self, middleware: MiddlewareFn<Ctx>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Check the decoded input with [`Validate`] before calling the handler.
    #[must_use = "This method returns a ValidatedProcedureChain that must be finished with query or mutation"]
    pub fn validated(self) -> ValidatedProcedureChain<Ctx> {
        ValidatedProcedureChain { chain: self }
    }

    /// Register the procedure as a query.
    #[must_use = "This method returns the CollectionBuilder and does not modify self"]
    pub fn query<H, Fut, Input, Output>(self, handler: H) -> CollectionBuilder<Ctx>
    where
        H: Fn(Context<Ctx>, Input) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = RpcResult<Output>> + Send + 'static,
        Input: DeserializeOwned + Send + 'static,
        Output: Serialize + Send + 'static,
    {
        let handler = into_boxed::<Ctx, Input, Output, H>(handler);
        self.finish::<Input, Output>(ProcedureKind::Query, handler)
    }

    /// Register the procedure as a mutation.
    #[must_use = "This method returns the CollectionBuilder and does not modify self"]
    pub fn mutation<H, Fut, Input, Output>(self, handler: H) -> CollectionBuilder<Ctx>
    where
        H: Fn(Context<Ctx>, Input) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = RpcResult<Output>> + Send + 'static,
        Input: DeserializeOwned + Send + 'static,
        Output: Serialize + Send + 'static,
    {
        let handler = into_boxed::<Ctx, Input, Output, H>(handler);
        self.finish::<Input, Output>(ProcedureKind::Mutation, handler)
    }

    fn finish<Input, Output>(
        self,
        kind: ProcedureKind,
        handler: BoxedHandler<Ctx>,
    ) -> CollectionBuilder<Ctx> {
        let mut builder = self.builder;

        if !is_identifier(&self.name) {
            builder
                .problems
                .push(format!("'{}' is not a valid procedure name", self.name));
            return builder;
        }

        let transport = match self.rest {
            None => None,
            Some((method, raw)) => match PathPattern::parse(&raw) {
                Ok(path) => Some(TransportMeta::new(method, path)),
                Err(e) => {
                    builder
                        .problems
                        .push(format!("procedure '{}': {}", self.name, e));
                    return builder;
                }
            },
        };

        let path = format!("{}.{}", builder.namespace, self.name);
        let handler = wrap_with_middleware(handler, self.middleware, path, kind);

        builder.procedures.push(ProcedureDef {
            namespace: builder.namespace.clone(),
            name: self.name,
            kind,
            input: SchemaRef::of::<Input>(),
            output: SchemaRef::of::<Output>(),
            handler,
            transport,
        });
        builder
    }
}

/// A procedure chain whose input is validated before the handler runs.
pub struct ValidatedProcedureChain<Ctx: Clone + Send + Sync + 'static> {
    chain: ProcedureChain<Ctx>,
}

impl<Ctx: Clone + Send + Sync + 'static> ValidatedProcedureChain<Ctx> {
    #[must_use = "This method returns a new ValidatedProcedureChain and does not modify self"]
    pub fn use_middleware_fn(mut self, middleware: MiddlewareFn<Ctx>) -> Self {
        self.chain.middleware.push(middleware);
        self
    }

    /// Register the procedure as a validated query.
    #[must_use = "This method returns the CollectionBuilder and does not modify self"]
    pub fn query<H, Fut, Input, Output>(self, handler: H) -> CollectionBuilder<Ctx>
    where
        H: Fn(Context<Ctx>, Input) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = RpcResult<Output>> + Send + 'static,
        Input: DeserializeOwned + Validate + Send + 'static,
        Output: Serialize + Send + 'static,
    {
        let handler = into_boxed_validated::<Ctx, Input, Output, H>(handler);
        self.chain.finish::<Input, Output>(ProcedureKind::Query, handler)
    }

    /// Register the procedure as a validated mutation.
    #[must_use = "This method returns the CollectionBuilder and does not modify self"]
    pub fn mutation<H, Fut, Input, Output>(self, handler: H) -> CollectionBuilder<Ctx>
    where
        H: Fn(Context<Ctx>, Input) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = RpcResult<Output>> + Send + 'static,
        Input: DeserializeOwned + Validate + Send + 'static,
        Output: Serialize + Send + 'static,
    {
        let handler = into_boxed_validated::<Ctx, Input, Output, H>(handler);
        self.chain
            .finish::<Input, Output>(ProcedureKind::Mutation, handler)
    }
}

/// Bake per-procedure middleware into the boxed handler.
fn wrap_with_middleware<Ctx: Clone + Send + Sync + 'static>(
    core_handler: BoxedHandler<Ctx>,
    middleware: Vec<MiddlewareFn<Ctx>>,
    path: String,
    kind: ProcedureKind,
) -> BoxedHandler<Ctx> {
    if middleware.is_empty() {
        return core_handler;
    }

    let handler_as_next: Next<Ctx> = Arc::new(move |ctx, req| {
        let handler = core_handler.clone();
        Box::pin(async move { (handler)(ctx, req.input).await })
    });
    let chain = build_middleware_chain(middleware, handler_as_next);

    Arc::new(move |ctx, input| {
        let chain = chain.clone();
        let req = Request {
            path: path.clone(),
            kind,
            input,
        };
        Box::pin(async move { (chain)(ctx, req).await })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{ValidationResult, ValidationRules};
    use crate::{RpcError, RpcErrorCode};
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Id {
        id: u32,
    }

    #[derive(Deserialize)]
    struct NewUser {
        name: String,
    }

    impl Validate for NewUser {
        fn validate(&self) -> ValidationResult {
            ValidationRules::new().required("name", &self.name).build()
        }
    }

    async fn get_user(_ctx: Context<()>, input: Id) -> RpcResult<u32> {
        Ok(input.id)
    }

    async fn list_users(_ctx: Context<()>, _input: ()) -> RpcResult<Vec<u32>> {
        Ok(vec![1, 2])
    }

    async fn create_user(_ctx: Context<()>, input: NewUser) -> RpcResult<String> {
        Ok(input.name)
    }

    #[test]
    fn build_preserves_order_and_metadata() {
        let collection = CollectionBuilder::<()>::new("users")
            .source("users.rs#users")
            .procedure("get_user")
            .get("/users/:id")
            .query(get_user)
            .query("list_users", list_users)
            .procedure("create_user")
            .post("/users")
            .validated()
            .mutation(create_user)
            .build()
            .unwrap();

        assert_eq!(collection.namespace, "users");
        assert_eq!(collection.source, "users.rs#users");
        assert_eq!(
            collection.names(),
            vec!["get_user", "list_users", "create_user"]
        );

        let get = collection.get("get_user").unwrap();
        assert_eq!(get.kind, ProcedureKind::Query);
        assert_eq!(get.rest_key().unwrap().to_string(), "GET /users/:id");
        assert!(get.input.name().ends_with("Id"));
        assert_eq!(get.output.name(), "u32");

        assert!(collection.get("list_users").unwrap().transport.is_none());
        assert_eq!(
            collection.get("create_user").unwrap().kind,
            ProcedureKind::Mutation
        );
    }

    #[test]
    fn source_defaults_to_namespace() {
        let collection = CollectionBuilder::<()>::new("health")
            .query("ping", list_users)
            .build()
            .unwrap();
        assert_eq!(collection.source, "health");
    }

    #[test]
    fn duplicate_names_reject_the_whole_collection() {
        let err = CollectionBuilder::<()>::new("users")
            .query("get_user", get_user)
            .mutation("get_user", get_user)
            .build()
            .err()
            .unwrap();
        assert_eq!(err.export, "users");
        assert!(err.reason.contains("duplicate procedure name 'get_user'"));
    }

    #[test]
    fn bad_paths_and_names_are_reported_on_build() {
        let err = CollectionBuilder::<()>::new("users")
            .procedure("get_user")
            .get("users/:id")
            .query(get_user)
            .build()
            .err()
            .unwrap();
        assert!(err.reason.contains("must start with '/'"));

        let err = CollectionBuilder::<()>::new("users")
            .query("get-user", get_user)
            .build()
            .err()
            .unwrap();
        assert!(err.reason.contains("not a valid procedure name"));

        let err = CollectionBuilder::<()>::new("bad ns")
            .query("get_user", get_user)
            .build()
            .err()
            .unwrap();
        assert!(err.reason.contains("not a valid namespace"));
    }

    #[test]
    fn empty_collection_is_invalid() {
        let err = CollectionBuilder::<()>::new("users").build().err().unwrap();
        assert!(err.reason.contains("no procedures"));
    }

    #[test]
    fn dotted_namespaces_are_accepted() {
        assert!(is_valid_namespace("admin.users"));
        assert!(!is_valid_namespace("admin..users"));
        assert!(!is_valid_namespace(""));
    }

    #[tokio::test]
    async fn procedure_middleware_sees_the_rpc_path() {
        let collection = CollectionBuilder::<()>::new("users")
            .procedure("get_user")
            .use_middleware(|ctx, req: Request, next: Next<()>| async move {
                if req.path != "users.get_user" || req.procedure() != "get_user" {
                    return Err(RpcError::internal("wrong path"));
                }
                next(ctx, req).await
            })
            .query(get_user)
            .build()
            .unwrap();

        let handler = &collection.procedures[0].handler;
        let out = handler(Context::new(()), serde_json::json!({"id": 7}))
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!(7));
    }

    #[tokio::test]
    async fn validated_procedure_rejects_bad_input() {
        let collection = CollectionBuilder::<()>::new("users")
            .procedure("create_user")
            .validated()
            .mutation(create_user)
            .build()
            .unwrap();

        let handler = &collection.procedures[0].handler;
        let err = handler(Context::new(()), serde_json::json!({"name": ""}))
            .await
            .unwrap_err();
        assert_eq!(err.code, RpcErrorCode::ValidationError);
    }
}
