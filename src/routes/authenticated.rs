use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Authenticated Router Module
///
/// Core claims-desk features. Every handler takes an `AuthUser`, so the request is rejected
/// with 401 before the handler runs if authentication fails. Rights are checked per handler:
/// reads need `getEmails` / `getPolicies`, writes `manageEmails` / `managePolicies`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Emails ---
        .route(
            "/emails",
            post(handlers::create_email).get(handlers::list_emails),
        )
        .route(
            "/emails/{id}",
            get(handlers::get_email)
                .patch(handlers::update_email)
                .delete(handlers::delete_email),
        )
        .route("/emails/{id}/read", patch(handlers::mark_email_read))
        // POST /emails/attachments/presigned
        // Short-lived (10 minute) upload URL for an attachment; the file bypasses this server.
        .route(
            "/emails/attachments/presigned",
            post(handlers::get_presigned_url),
        )
        // --- Policies ---
        .route(
            "/policies",
            post(handlers::create_policy).get(handlers::list_policies),
        )
        .route(
            "/policies/{id}",
            get(handlers::get_policy)
                .patch(handlers::update_policy)
                .delete(handlers::delete_policy),
        )
        // GET /dashboard
        // Aggregated email and user counts. Admin only (`viewDashboard`).
        .route("/dashboard", get(handlers::get_dashboard))
}
