use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use claims_desk::{
    AppConfig, AppState, create_router,
    models::{CreateUserRequest, PresignedUrlRequest, PresignedUrlResponse},
    repository::{MemoryStore, StoreState},
    roles::Role,
    services,
    storage::MockStorageService,
};
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

/// Router over an in-memory store seeded with one `user`-role account.
async fn app(mock_storage: MockStorageService) -> (axum::Router, Uuid) {
    let store: StoreState = Arc::new(MemoryStore::new());
    let user = services::create_user(
        store.as_ref(),
        CreateUserRequest {
            name: "Uploader".to_string(),
            email: "uploader@claims.test".to_string(),
            role: Some(Role::User),
        },
    )
    .await
    .unwrap();

    let state = AppState {
        store,
        storage: Arc::new(mock_storage),
        config: AppConfig::default(),
    };
    (create_router(state), user.id)
}

fn presign_request(user_id: Option<Uuid>, payload: &PresignedUrlRequest) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/emails/attachments/presigned")
        .header("Content-Type", "application/json");
    if let Some(id) = user_id {
        builder = builder.header("x-user-id", id.to_string());
    }
    builder
        .body(Body::from(serde_json::to_string(payload).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn test_presigned_url_success() {
    let (app, user_id) = app(MockStorageService::new()).await;

    let payload = PresignedUrlRequest {
        filename: "accident_photo.jpg".to_string(),
        file_type: "image/jpeg".to_string(),
    };

    let response = app
        .oneshot(presign_request(Some(user_id), &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_json: PresignedUrlResponse = serde_json::from_slice(&body_bytes).unwrap();

    assert!(body_json.upload_url.contains("signature=fake"));
    assert!(body_json.upload_url.contains(&body_json.resource_key));
    assert!(body_json.resource_key.starts_with(&format!("attachments/{}/", user_id)));
    assert!(body_json.resource_key.ends_with("-accident_photo.jpg"));
}

#[tokio::test]
async fn test_presigned_url_sanitization() {
    let (app, user_id) = app(MockStorageService::new()).await;

    let payload = PresignedUrlRequest {
        filename: "../../etc/passwd.exe".to_string(),
        file_type: "application/octet-stream".to_string(),
    };

    let response = app
        .oneshot(presign_request(Some(user_id), &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_json: PresignedUrlResponse = serde_json::from_slice(&body_bytes).unwrap();

    assert!(body_json.resource_key.ends_with(".exe"));
    assert!(!body_json.resource_key.contains(".."));
}

#[tokio::test]
async fn test_presigned_url_requires_filename() {
    let (app, user_id) = app(MockStorageService::new()).await;

    let payload = PresignedUrlRequest {
        filename: "  ".to_string(),
        file_type: "image/png".to_string(),
    };
    let response = app
        .oneshot(presign_request(Some(user_id), &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_presigned_url_requires_auth() {
    let (app, _) = app(MockStorageService::new()).await;

    let payload = PresignedUrlRequest {
        filename: "valid.pdf".to_string(),
        file_type: "application/pdf".to_string(),
    };
    let response = app.oneshot(presign_request(None, &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_presigned_url_storage_failure() {
    let (app, user_id) = app(MockStorageService::new_failing()).await;

    let payload = PresignedUrlRequest {
        filename: "valid.pdf".to_string(),
        file_type: "application/pdf".to_string(),
    };
    let response = app
        .oneshot(presign_request(Some(user_id), &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(body["message"], "Failed to generate upload URL");
}
