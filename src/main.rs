use claims_desk::{
    AppState,
    config::{AppConfig, Env, StoreBackend},
    create_router,
    models::CreateUserRequest,
    repository::{MemoryStore, PostgresStore, StoreState},
    roles::Role,
    services,
    storage::{S3StorageClient, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, installs logging, opens the document store and object storage, and
/// serves the router.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    // Panics on missing production secrets.
    let config = AppConfig::load();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "claims_desk=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);
    if config.volatile_in_production() {
        tracing::warn!("STORE_BACKEND=memory in production; data will not persist");
    }

    let store: StoreState = match config.store {
        StoreBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&config.db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
            let store = PostgresStore::new(pool);
            store
                .migrate()
                .await
                .expect("FATAL: Failed to apply database migrations.");
            Arc::new(store) as StoreState
        }
        StoreBackend::Memory => {
            let store = Arc::new(MemoryStore::new());
            // An empty in-memory store has nobody to authenticate as.
            let admin = services::create_user(
                store.as_ref(),
                CreateUserRequest {
                    name: "Local Admin".to_string(),
                    email: "admin@claims-desk.local".to_string(),
                    role: Some(Role::Admin),
                },
            )
            .await
            .expect("FATAL: Failed to seed the in-memory store.");
            tracing::warn!(
                admin_id = %admin.id,
                "Using the in-memory store; data is lost on exit. Authenticate with x-user-id: {}",
                admin.id
            );
            store as StoreState
        }
    };

    let s3_client = S3StorageClient::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
    )
    .await;

    // MinIO in docker-compose starts without the bucket.
    if config.env == Env::Local {
        s3_client.ensure_bucket_exists().await;
    }

    let storage = Arc::new(s3_client) as StorageState;
    let port = config.port;

    let app = create_router(AppState {
        store,
        storage,
        config,
    });

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {}", addr);
    tracing::info!(
        "API Documentation (Swagger UI) available at: http://localhost:{}/swagger-ui",
        port
    );

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {:?}", e);
    }
}
