use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// User management. Mounted under `/admin` behind the same authentication layer as the
/// authenticated routes; the `getUsers` / `manageUsers` rights only exist on the admin role,
/// so a `user` caller gets 403 from every endpoint here.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route(
            "/users/{id}",
            get(handlers::get_user)
                .patch(handlers::update_user)
                .delete(handlers::delete_user),
        )
}
