//! Procedure definitions and collections
//!
//! A [`ProcedureDef`] is the atomic unit the router compiler works on: a named
//! operation with opaque input/output schema references, a handler, and
//! optional REST metadata. It is generic over the handler type so that the
//! same model carries discovered handler *references* (see
//! [`HandlerRef`](crate::discovery::HandlerRef)) and runtime handlers
//! ([`BoxedHandler`](crate::handler::BoxedHandler)). The core only stores and
//! forwards handlers; it never calls them.

use crate::path::PathPattern;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Kind of procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcedureKind {
    /// Read-only operation
    Query,
    /// Write operation
    Mutation,
}

impl fmt::Display for ProcedureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Mutation => write!(f, "mutation"),
        }
    }
}

/// HTTP method of a REST route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// All supported methods.
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
    ];

    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Whether requests with this method carry their input in the body.
    pub fn has_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unsupported HTTP method '{}'", s))
    }
}

/// REST projection of a procedure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransportMeta {
    pub method: HttpMethod,
    pub path: PathPattern,
}

impl TransportMeta {
    pub fn new(method: HttpMethod, path: PathPattern) -> Self {
        Self { method, path }
    }
}

/// Opaque reference to a validation schema.
///
/// The router never looks inside; adapters and tooling only forward or print it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaRef(String);

impl SchemaRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Schema reference named after a Rust type.
    pub fn of<T: ?Sized>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    /// The unit schema, used when a procedure takes or returns nothing.
    pub fn unit() -> Self {
        Self("()".to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// RPC addressing key: `(namespace, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RpcKey {
    pub namespace: String,
    pub name: String,
}

impl RpcKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse a dotted `namespace.name` call path.
    ///
    /// The namespace is everything before the last dot.
    pub fn parse(path: &str) -> Option<Self> {
        let (namespace, name) = path.rsplit_once('.')?;
        if namespace.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(namespace, name))
    }
}

impl fmt::Display for RpcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// REST addressing key: `(method, path pattern)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RestKey {
    pub method: HttpMethod,
    pub path: PathPattern,
}

impl RestKey {
    pub fn new(method: HttpMethod, path: PathPattern) -> Self {
        Self { method, path }
    }
}

impl fmt::Display for RestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A named, independently invocable operation.
#[derive(Debug, Clone)]
pub struct ProcedureDef<H> {
    /// Owning collection's namespace.
    pub namespace: String,
    /// Name, unique within the namespace.
    pub name: String,
    pub kind: ProcedureKind,
    pub input: SchemaRef,
    pub output: SchemaRef,
    /// Forwarded to adapters, never invoked by the core.
    pub handler: H,
    /// REST metadata; `None` means RPC-only.
    pub transport: Option<TransportMeta>,
}

impl<H> ProcedureDef<H> {
    pub fn rpc_key(&self) -> RpcKey {
        RpcKey::new(&self.namespace, &self.name)
    }

    pub fn rest_key(&self) -> Option<RestKey> {
        self.transport
            .as_ref()
            .map(|meta| RestKey::new(meta.method, meta.path.clone()))
    }

    /// Dotted RPC path, e.g. `users.get_user`.
    pub fn path(&self) -> String {
        self.rpc_key().to_string()
    }
}

/// A named group of procedures, in declaration order.
#[derive(Debug, Clone)]
pub struct ProcedureCollection<H> {
    pub namespace: String,
    /// Where the collection came from (`users.rs#users`, or a caller label).
    pub source: String,
    pub procedures: Vec<Arc<ProcedureDef<H>>>,
}

impl<H> ProcedureCollection<H> {
    pub fn new(namespace: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            source: source.into(),
            procedures: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ProcedureDef<H>>> {
        self.procedures.iter().find(|p| p.name == name)
    }

    /// Procedure names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.procedures.iter().map(|p| p.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, transport: Option<TransportMeta>) -> ProcedureDef<()> {
        ProcedureDef {
            namespace: "users".into(),
            name: name.into(),
            kind: ProcedureKind::Query,
            input: SchemaRef::unit(),
            output: SchemaRef::new("User"),
            handler: (),
            transport,
        }
    }

    #[test]
    fn keys_render_for_diagnostics() {
        let meta = TransportMeta::new(HttpMethod::Get, "/users/:id".parse().unwrap());
        let proc = def("get_user", Some(meta));

        assert_eq!(proc.rpc_key().to_string(), "users.get_user");
        assert_eq!(proc.rest_key().unwrap().to_string(), "GET /users/:id");
        assert_eq!(proc.path(), "users.get_user");
        assert!(def("list", None).rest_key().is_none());
    }

    #[test]
    fn rpc_key_parse_splits_on_last_dot() {
        let key = RpcKey::parse("admin.users.get").unwrap();
        assert_eq!(key.namespace, "admin.users");
        assert_eq!(key.name, "get");
        assert!(RpcKey::parse("nodot").is_none());
        assert!(RpcKey::parse(".get").is_none());
        assert!(RpcKey::parse("users.").is_none());
    }

    #[test]
    fn http_method_parses_case_insensitively() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("DELETE".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
        assert!("TRACE".parse::<HttpMethod>().is_err());
        assert!(HttpMethod::Post.has_body());
        assert!(!HttpMethod::Get.has_body());
    }

    #[test]
    fn collection_preserves_declaration_order() {
        let mut collection = ProcedureCollection::new("users", "users.rs#users");
        collection.procedures.push(Arc::new(def("b", None)));
        collection.procedures.push(Arc::new(def("a", None)));

        assert_eq!(collection.names(), vec!["b", "a"]);
        assert_eq!(collection.len(), 2);
        assert!(collection.get("a").is_some());
        assert!(collection.get("c").is_none());
    }
}
