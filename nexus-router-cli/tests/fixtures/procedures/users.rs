//! Test fixture: a collection with REST routes and a validated mutation.

use nexus_router::prelude::*;

#[procedures]
pub mod users {
    use super::*;

    #[query(get = "/users/:id")]
    pub async fn get_user(ctx: Context<AppContext>, input: GetUser) -> RpcResult<User> {
        ctx.db.find(input.id)
    }

    #[mutation(name = "create", post = "/users", validate)]
    pub async fn create_user(ctx: Context<AppContext>, input: CreateUser) -> RpcResult<User> {
        ctx.db.insert(input)
    }

    fn helper() {}
}
