//! Router compilation
//!
//! [`compile`] merges procedure collections into one addressable namespace and
//! derives two tables from it: the RPC table keyed by `(namespace, name)` and
//! the REST table keyed by `(method, path)`. Both tables hold the same
//! `Arc<ProcedureDef<H>>`, so a procedure cannot drift between transports.
//!
//! Collisions never overwrite: the first definition keeps the key and every
//! later one is recorded as a [`Conflict`]. A router with conflicts is
//! *rejected*; its tables are advisory and adapters refuse to mount it.
//!
//! ```rust,ignore
//! let router = compile(collections);
//! router.ensure_accepted()?;          // RouterRejected lists every conflict
//! let entry = router.rpc("users", "get_user");
//! ```

use crate::path::PathPattern;
use crate::procedure::{HttpMethod, ProcedureCollection, ProcedureDef, RestKey, RpcKey};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A table slot: the procedure plus where it came from.
#[derive(Debug)]
pub struct RouteEntry<H> {
    pub procedure: Arc<ProcedureDef<H>>,
    /// Source label of the owning collection.
    pub source: String,
    /// Position of the procedure in compile order.
    pub ordinal: usize,
}

impl<H> Clone for RouteEntry<H> {
    fn clone(&self) -> Self {
        Self {
            procedure: Arc::clone(&self.procedure),
            source: self.source.clone(),
            ordinal: self.ordinal,
        }
    }
}

/// The key two definitions collided on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "table", rename_all = "lowercase")]
pub enum ConflictKey {
    Rpc(RpcKey),
    Rest(RestKey),
}

impl fmt::Display for ConflictKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc(key) => write!(f, "rpc {}", key),
            Self::Rest(key) => write!(f, "rest {}", key),
        }
    }
}

/// One side of a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictSite {
    pub namespace: String,
    pub name: String,
    pub source: String,
}

impl fmt::Display for ConflictSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} ({})", self.namespace, self.name, self.source)
    }
}

/// Collisions between one pair of definitions.
///
/// `first` holds the keys in the tables; `second` was not inserted for any of
/// `keys`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub keys: Vec<ConflictKey>,
    pub first: ConflictSite,
    pub second: ConflictSite,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.keys.iter().map(ToString::to_string).collect();
        write!(
            f,
            "{}: {} conflicts with {}",
            keys.join(", "),
            self.second,
            self.first
        )
    }
}

/// Returned by [`CompiledRouter::ensure_accepted`] for a rejected router.
#[derive(Debug, Clone, Error)]
#[error("router rejected: {} conflict(s){}", .conflicts.len(), list_conflicts(.conflicts))]
pub struct RouterRejected {
    pub conflicts: Vec<Conflict>,
}

fn list_conflicts(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(|conflict| format!("\n  - {}", conflict))
        .collect()
}

/// A REST route no request can reach: an earlier route under the same method
/// has the same shape with different parameter names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowedRoute {
    pub route: RestKey,
    pub shadowed_by: RestKey,
}

impl fmt::Display for ShadowedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is shadowed by {}", self.route, self.shadowed_by)
    }
}

/// Result of matching a concrete request path against the REST table.
#[derive(Debug)]
pub struct RestMatch<'a, H> {
    pub entry: &'a RouteEntry<H>,
    pub params: HashMap<String, String>,
}

/// Immutable output of [`compile`].
#[derive(Debug)]
pub struct CompiledRouter<H> {
    rpc_table: IndexMap<RpcKey, RouteEntry<H>>,
    rest_table: IndexMap<RestKey, RouteEntry<H>>,
    conflicts: Vec<Conflict>,
    shadowed: Vec<ShadowedRoute>,
}

impl<H> CompiledRouter<H> {
    pub fn rpc_table(&self) -> &IndexMap<RpcKey, RouteEntry<H>> {
        &self.rpc_table
    }

    pub fn rest_table(&self) -> &IndexMap<RestKey, RouteEntry<H>> {
        &self.rest_table
    }

    /// Conflicts in detection order.
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn is_rejected(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Accepted but unreachable REST routes, in compile order.
    pub fn shadowed_routes(&self) -> &[ShadowedRoute] {
        &self.shadowed
    }

    pub fn ensure_accepted(&self) -> Result<(), RouterRejected> {
        if self.is_rejected() {
            Err(RouterRejected {
                conflicts: self.conflicts.clone(),
            })
        } else {
            Ok(())
        }
    }

    pub fn rpc(&self, namespace: &str, name: &str) -> Option<&RouteEntry<H>> {
        self.rpc_table.get(&RpcKey::new(namespace, name))
    }

    /// Look up a dotted `namespace.name` path.
    pub fn rpc_path(&self, path: &str) -> Option<&RouteEntry<H>> {
        RpcKey::parse(path).and_then(|key| self.rpc_table.get(&key))
    }

    /// Exact lookup by method and pattern.
    pub fn rest(&self, method: HttpMethod, path: &PathPattern) -> Option<&RouteEntry<H>> {
        self.rest_table.get(&RestKey::new(method, path.clone()))
    }

    /// Find the route serving a concrete request path.
    ///
    /// Among matching patterns the one with most literal segments wins; ties go
    /// to the earlier procedure in compile order.
    pub fn match_rest(&self, method: HttpMethod, path: &str) -> Option<RestMatch<'_, H>> {
        let mut best: Option<(usize, RestMatch<'_, H>)> = None;
        for (key, entry) in &self.rest_table {
            if key.method != method {
                continue;
            }
            let Some(params) = key.path.matches(path) else {
                continue;
            };
            let specificity = key.path.specificity();
            let better = match &best {
                None => true,
                Some((current, found)) => {
                    specificity > *current
                        || (specificity == *current && entry.ordinal < found.entry.ordinal)
                }
            };
            if better {
                best = Some((specificity, RestMatch { entry, params }));
            }
        }
        best.map(|(_, found)| found)
    }

    /// Methods that have some route matching `path`, in method order.
    pub fn allowed_methods(&self, path: &str) -> Vec<HttpMethod> {
        let mut methods: Vec<HttpMethod> = self
            .rest_table
            .keys()
            .filter(|key| key.path.matches(path).is_some())
            .map(|key| key.method)
            .collect();
        methods.sort();
        methods.dedup();
        methods
    }

    /// Procedures addressable over RPC, in compile order.
    pub fn procedures(&self) -> impl Iterator<Item = &Arc<ProcedureDef<H>>> {
        self.rpc_table.values().map(|entry| &entry.procedure)
    }

    pub fn is_empty(&self) -> bool {
        self.rpc_table.is_empty() && self.rest_table.is_empty()
    }
}

#[derive(Default)]
struct ConflictLog {
    conflicts: Vec<Conflict>,
    by_pair: HashMap<(usize, usize), usize>,
}

impl ConflictLog {
    fn record<H>(&mut self, key: ConflictKey, first: &RouteEntry<H>, second: &RouteEntry<H>) {
        warn!(
            key = %key,
            first = %first.source,
            second = %second.source,
            "routing conflict"
        );
        let pair = (first.ordinal, second.ordinal);
        if let Some(&index) = self.by_pair.get(&pair) {
            self.conflicts[index].keys.push(key);
            return;
        }
        self.by_pair.insert(pair, self.conflicts.len());
        self.conflicts.push(Conflict {
            keys: vec![key],
            first: site(first),
            second: site(second),
        });
    }
}

fn site<H>(entry: &RouteEntry<H>) -> ConflictSite {
    ConflictSite {
        namespace: entry.procedure.namespace.clone(),
        name: entry.procedure.name.clone(),
        source: entry.source.clone(),
    }
}

/// Merge collections into a [`CompiledRouter`].
///
/// Pure and single pass. An empty input compiles to an empty, accepted router.
pub fn compile<H, I>(collections: I) -> CompiledRouter<H>
where
    I: IntoIterator<Item = ProcedureCollection<H>>,
{
    let mut rpc_table: IndexMap<RpcKey, RouteEntry<H>> = IndexMap::new();
    let mut rest_table: IndexMap<RestKey, RouteEntry<H>> = IndexMap::new();
    let mut log = ConflictLog::default();
    let mut shapes: HashMap<(HttpMethod, String), RestKey> = HashMap::new();
    let mut shadowed = Vec::new();
    let mut ordinal = 0usize;
    let mut collection_count = 0usize;

    for collection in collections {
        collection_count += 1;
        debug!(
            namespace = %collection.namespace,
            source = %collection.source,
            procedures = collection.procedures.len(),
            "compiling collection"
        );

        for procedure in collection.procedures {
            let entry = RouteEntry {
                procedure,
                source: collection.source.clone(),
                ordinal,
            };
            ordinal += 1;

            let rpc_key = entry.procedure.rpc_key();
            match rpc_table.get(&rpc_key) {
                Some(existing) => log.record(ConflictKey::Rpc(rpc_key), existing, &entry),
                None => {
                    rpc_table.insert(rpc_key, entry.clone());
                }
            }

            if let Some(rest_key) = entry.procedure.rest_key() {
                match rest_table.get(&rest_key) {
                    Some(existing) => log.record(ConflictKey::Rest(rest_key), existing, &entry),
                    None => {
                        let shape = (rest_key.method, rest_key.path.shape());
                        match shapes.get(&shape) {
                            Some(earlier) => {
                                warn!(
                                    route = %rest_key,
                                    shadowed_by = %earlier,
                                    "rest route is unreachable"
                                );
                                shadowed.push(ShadowedRoute {
                                    route: rest_key.clone(),
                                    shadowed_by: earlier.clone(),
                                });
                            }
                            None => {
                                shapes.insert(shape, rest_key.clone());
                            }
                        }
                        rest_table.insert(rest_key, entry);
                    }
                }
            }
        }
    }

    info!(
        collections = collection_count,
        rpc_routes = rpc_table.len(),
        rest_routes = rest_table.len(),
        conflicts = log.conflicts.len(),
        shadowed = shadowed.len(),
        "router compiled"
    );

    CompiledRouter {
        rpc_table,
        rest_table,
        conflicts: log.conflicts,
        shadowed,
    }
}
