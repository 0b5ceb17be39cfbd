//! Test fixture: explicit namespace in a directory module.

use nexus_router::prelude::*;

#[procedures(namespace = "admin.audit")]
pub mod audit {
    use super::*;

    #[mutation(delete = "/admin/audit/:entry")]
    pub async fn purge(ctx: Context<AppContext>, input: Purge) -> RpcResult<u64> {
        ctx.audit.purge(input)
    }
}
