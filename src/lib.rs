use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pagination;
pub mod query;
pub mod repository;
pub mod roles;
pub mod services;
pub mod storage;
pub mod validation;

pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{ServiceError, StoreError};
pub use repository::{DocumentStore, MemoryStore, PostgresStore, StoreState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document served at `/api-docs/openapi.json` and rendered by the Swagger UI.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_email, handlers::list_emails, handlers::get_email,
        handlers::update_email, handlers::mark_email_read, handlers::delete_email,
        handlers::get_presigned_url,
        handlers::create_policy, handlers::list_policies, handlers::get_policy,
        handlers::update_policy, handlers::delete_policy,
        handlers::get_dashboard,
        handlers::create_user, handlers::list_users, handlers::get_user,
        handlers::update_user, handlers::delete_user,
    ),
    components(
        schemas(
            models::Email, models::CreateEmailRequest, models::UpdateEmailRequest,
            models::Policy, models::CreatePolicyRequest, models::UpdatePolicyRequest,
            models::User, models::CreateUserRequest, models::UpdateUserRequest,
            models::Category, models::EmailStatus, models::Priority, models::PolicyType,
            models::PolicyStatus, roles::Role,
            models::PresignedUrlRequest, models::PresignedUrlResponse,
            models::GroupCount, models::RecentEmail, models::DashboardSummary,
        )
    ),
    tags(
        (name = "claims-desk", description = "Insurance email and policy management API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Immutable container shared by every request: the document store, the object storage
/// client and the loaded configuration.
#[derive(Clone)]
pub struct AppState {
    pub store: StoreState,
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for StoreState {
    fn from_ref(app_state: &AppState) -> StoreState {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 before routing to a handler when `AuthUser` cannot be
/// resolved. Handlers extract `AuthUser` again to read the identity.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the route tree, the auth layer, and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .nest(
            "/admin",
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one HTTP request, keyed by the `x-request-id` set above so every log line of the
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
