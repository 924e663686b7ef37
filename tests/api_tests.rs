use claims_desk::{
    AppConfig, AppState, MockStorageService, create_router,
    auth::issue_token,
    models::{CreateUserRequest, DashboardSummary, Email, Page, Policy, User},
    repository::{MemoryStore, StoreState},
    roles::Role,
    services,
    storage::StorageState,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub admin: Uuid,
    pub jwt_secret: String,
}

/// Serves the real router on an ephemeral port over an in-memory store holding one admin.
async fn spawn_app() -> TestApp {
    let store: StoreState = Arc::new(MemoryStore::new());
    let storage = Arc::new(MockStorageService::new()) as StorageState;
    let config = AppConfig::default();
    let jwt_secret = config.jwt_secret.clone();

    let admin = services::create_user(
        store.as_ref(),
        CreateUserRequest {
            name: "Desk Admin".to_string(),
            email: "admin@claims.test".to_string(),
            role: Some(Role::Admin),
        },
    )
    .await
    .expect("seed admin");

    let router = create_router(AppState {
        store,
        storage,
        config,
    });

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        admin: admin.id,
        jwt_secret,
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = reqwest::Client::new()
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_claims_desk_lifecycle() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = app.admin.to_string();

    // Onboard a customer.
    let response = client
        .post(format!("{}/admin/users", app.address))
        .header("x-user-id", &admin)
        .json(&serde_json::json!({"name": "Pat Customer", "email": "pat@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let customer: User = response.json().await.unwrap();
    assert_eq!(customer.role, Role::User);

    // Give them a policy.
    let response = client
        .post(format!("{}/policies", app.address))
        .header("x-user-id", &admin)
        .json(&serde_json::json!({
            "policyNumber": "HOME-0042",
            "policyType": "property",
            "coverageAmount": 250000,
            "premiumAmount": 38.5,
            "startDate": "2025-02-01",
            "endDate": "2026-02-01",
            "user": customer.id,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let policy: Policy = response.json().await.unwrap();

    // The customer writes in, authenticated with a bearer token.
    let token = issue_token(&app.jwt_secret, customer.id, chrono::Duration::minutes(10)).unwrap();
    let response = client
        .post(format!("{}/emails", app.address))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "subject": "Burst pipe",
            "emailBody": "Water everywhere in the kitchen.",
            "senderEmail": "pat@example.com",
            "category": "claim",
            "priority": "high",
            "policyId": policy.id,
            "policyNumber": policy.policy_number,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let email: Email = response.json().await.unwrap();
    assert_eq!(email.user, customer.id);
    assert_eq!(email.policy_id, Some(policy.id));

    // The desk picks it up and resolves it.
    for status in ["in_progress", "resolved"] {
        let response = client
            .patch(format!("{}/emails/{}", app.address, email.id))
            .header("x-user-id", &admin)
            .json(&serde_json::json!({"status": status}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    // The customer sees their own email with the final status.
    let page: Page<Email> = client
        .get(format!("{}/emails?category=claim", app.address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page.total_results, 1);
    assert_eq!(page.results[0].status.as_str(), "resolved");

    // But not the dashboard.
    let response = client
        .get(format!("{}/dashboard", app.address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let summary: DashboardSummary = client
        .get(format!("{}/dashboard", app.address))
        .header("x-user-id", &admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary.total_users, 2);
    assert_eq!(summary.pending_emails, 0);
    assert_eq!(summary.recent_emails[0].id, email.id);
}
