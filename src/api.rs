use crate::{SharedData, logging};
use axum::Router;
use std::sync::Arc;

pub mod auth;
pub mod calendar;
pub mod swagger_main;
pub mod todo;
pub mod user;

#[cfg(test)]
pub mod test_util;

/// Assembles every route group, the swagger UI and the request tracing layer into one router
pub fn build_router(shared_data: Arc<SharedData>) -> Router {
    let routes = Router::new()
        .merge(auth::auth_routes())
        .merge(user::user_routes())
        .merge(todo::todo_routes())
        .merge(calendar::calendar_routes())
        .merge(swagger_main::build_documentation())
        .with_state(shared_data);

    logging::attach_tracing_http(routes)
}
