//! RPC adapter: procedures addressed by `namespace.name`.

use super::{Dispatcher, TransportError};
use crate::compiler::{CompiledRouter, RouterRejected};
use crate::context::Transport;
use crate::handler::BoxedHandler;
use crate::middleware::Next;
use crate::procedure::RpcKey;
use crate::RpcError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Envelope returned by [`RpcAdapter::call`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcResponse {
    Ok { result: serde_json::Value },
    Err { error: TransportError },
}

impl RpcResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn into_result(self) -> Result<serde_json::Value, TransportError> {
        match self {
            Self::Ok { result } => Ok(result),
            Self::Err { error } => Err(error),
        }
    }
}

/// Serves an accepted router's RPC table.
pub struct RpcAdapter<Ctx: Clone + Send + Sync + 'static> {
    router: Arc<CompiledRouter<BoxedHandler<Ctx>>>,
    dispatcher: Arc<Dispatcher<Ctx>>,
    chains: HashMap<RpcKey, Next<Ctx>>,
}

impl<Ctx: Clone + Send + Sync + 'static> RpcAdapter<Ctx> {
    /// Mount `router`. A rejected router cannot be mounted.
    pub fn new(
        router: Arc<CompiledRouter<BoxedHandler<Ctx>>>,
        dispatcher: impl Into<Arc<Dispatcher<Ctx>>>,
    ) -> Result<Self, RouterRejected> {
        router.ensure_accepted()?;
        let dispatcher = dispatcher.into();
        let chains = router
            .rpc_table()
            .iter()
            .map(|(key, entry)| (key.clone(), dispatcher.chain_for(&entry.procedure)))
            .collect();
        info!(procedures = router.rpc_table().len(), "rpc adapter mounted");
        Ok(Self {
            router,
            dispatcher,
            chains,
        })
    }

    /// Dotted paths of every addressable procedure, in compile order.
    pub fn procedures(&self) -> Vec<String> {
        self.router.rpc_table().keys().map(ToString::to_string).collect()
    }

    pub fn router(&self) -> &CompiledRouter<BoxedHandler<Ctx>> {
        &self.router
    }

    /// Invoke the procedure at `path` (`namespace.name`).
    pub async fn call(
        &self,
        path: &str,
        input: serde_json::Value,
        headers: HashMap<String, String>,
    ) -> RpcResponse {
        let found = RpcKey::parse(path).and_then(|key| {
            let entry = self.router.rpc_table().get(&key)?;
            let chain = self.chains.get(&key)?;
            Some((entry, chain))
        });

        let Some((entry, chain)) = found else {
            debug!(path = %path, "rpc procedure not found");
            let error = RpcError::procedure_not_found(path)
                .with_details(serde_json::json!({ "available_procedures": self.procedures() }));
            return RpcResponse::Err {
                error: self.dispatcher.error_boundary(error),
            };
        };

        match self
            .dispatcher
            .invoke(chain, &entry.procedure, Transport::Rpc, headers, input)
            .await
        {
            Ok(result) => RpcResponse::Ok { result },
            Err(error) => RpcResponse::Err { error },
        }
    }
}
