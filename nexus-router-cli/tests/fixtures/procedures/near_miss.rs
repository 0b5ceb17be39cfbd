//! Test fixture: a procedure marker outside any collection.

use nexus_router::prelude::*;

#[query]
pub async fn orphan(_ctx: Context<AppContext>, _input: ()) -> RpcResult<()> {
    Ok(())
}
