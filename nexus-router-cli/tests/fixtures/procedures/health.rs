//! Test fixture: an RPC-only collection.

use nexus_router::prelude::*;

#[procedures]
pub mod health {
    use super::*;

    #[query]
    pub async fn ping(_ctx: Context<AppContext>, _input: ()) -> RpcResult<String> {
        Ok("pong".to_string())
    }
}
