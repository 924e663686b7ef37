use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use claims_desk::{
    AppState, ServiceError,
    auth::AuthUser,
    config::AppConfig,
    handlers,
    models::{
        Category, CreateEmailRequest, CreatePolicyRequest, CreateUserRequest, EmailStatus,
        PolicyType, Priority, UpdateEmailRequest,
    },
    repository::{MemoryStore, StoreState},
    roles::Role,
    services,
    storage::{self, MockStorageService},
};
use std::{collections::HashMap, sync::Arc};
use tokio::test;
use uuid::Uuid;

// --- Test State ---

fn create_test_state() -> AppState {
    AppState {
        store: Arc::new(MemoryStore::new()) as StoreState,
        storage: Arc::new(MockStorageService::new()),
        config: AppConfig::default(),
    }
}

async fn seed_user(state: &AppState, role: Role) -> AuthUser {
    let user = services::create_user(
        state.store.as_ref(),
        CreateUserRequest {
            name: format!("{:?} user", role),
            email: format!("{}@claims.test", Uuid::new_v4().simple()),
            role: Some(role),
        },
    )
    .await
    .unwrap();
    AuthUser { id: user.id, role: user.role }
}

fn email_request(subject: &str) -> CreateEmailRequest {
    CreateEmailRequest {
        subject: subject.to_string(),
        email_body: "My windscreen cracked on the motorway.".to_string(),
        sender_email: "driver@example.com".to_string(),
        ..CreateEmailRequest::default()
    }
}

fn status_of(err: ServiceError) -> StatusCode {
    err.into_response().status()
}

// --- Tests ---

#[test]
async fn test_create_email_applies_defaults() {
    let state = create_test_state();
    let caller = seed_user(&state, Role::User).await;

    let (status, Json(email)) = handlers::create_email(
        caller,
        State(state.clone()),
        Ok(Json(email_request("  Windscreen claim  "))),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(email.subject, "Windscreen claim");
    assert_eq!(email.status, EmailStatus::New);
    assert_eq!(email.category, Category::Others);
    assert_eq!(email.priority, Priority::Medium);
    assert_eq!(email.user, caller.id);
    assert!(!email.read_by_user);
    assert_eq!(email.created_at, email.updated_at);
}

#[test]
async fn test_user_cannot_file_on_behalf_of_others() {
    let state = create_test_state();
    let caller = seed_user(&state, Role::User).await;
    let other = Uuid::new_v4();

    let req = CreateEmailRequest {
        user: Some(other),
        ..email_request("Spoofed owner")
    };
    let (_, Json(email)) = handlers::create_email(caller, State(state.clone()), Ok(Json(req)))
        .await
        .unwrap();
    assert_eq!(email.user, caller.id);
}

#[test]
async fn test_admin_files_on_behalf_of_user() {
    let state = create_test_state();
    let admin = seed_user(&state, Role::Admin).await;
    let customer = seed_user(&state, Role::User).await;

    let req = CreateEmailRequest {
        user: Some(customer.id),
        ..email_request("Filed by the desk")
    };
    let (_, Json(email)) = handlers::create_email(admin, State(state.clone()), Ok(Json(req)))
        .await
        .unwrap();
    assert_eq!(email.user, customer.id);
}

#[test]
async fn test_create_email_rejects_bad_sender() {
    let state = create_test_state();
    let caller = seed_user(&state, Role::User).await;

    let req = CreateEmailRequest {
        sender_email: "not-an-address".to_string(),
        ..email_request("Bad sender")
    };
    let err = handlers::create_email(caller, State(state), Ok(Json(req)))
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
}

#[test]
async fn test_get_email_not_found() {
    let state = create_test_state();
    let caller = seed_user(&state, Role::Admin).await;

    let err = handlers::get_email(caller, State(state), Path(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(&err, ServiceError::NotFound(msg) if msg == "Email not found"));
    assert_eq!(status_of(err), StatusCode::NOT_FOUND);
}

#[test]
async fn test_update_email_rejects_invalid_transition() {
    let state = create_test_state();
    let caller = seed_user(&state, Role::User).await;
    let (_, Json(email)) =
        handlers::create_email(caller, State(state.clone()), Ok(Json(email_request("Lifecycle"))))
            .await
            .unwrap();

    let jump = UpdateEmailRequest {
        status: Some(EmailStatus::Resolved),
        ..UpdateEmailRequest::default()
    };
    let err = handlers::update_email(caller, State(state.clone()), Path(email.id), Ok(Json(jump)))
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::BAD_REQUEST);

    let start = UpdateEmailRequest {
        status: Some(EmailStatus::InProgress),
        ..UpdateEmailRequest::default()
    };
    let Json(updated) =
        handlers::update_email(caller, State(state), Path(email.id), Ok(Json(start)))
            .await
            .unwrap();
    assert_eq!(updated.status, EmailStatus::InProgress);
    assert_eq!(updated.subject, "Lifecycle");
    assert!(updated.updated_at >= updated.created_at);
}

#[test]
async fn test_update_email_requires_a_field() {
    let state = create_test_state();
    let caller = seed_user(&state, Role::User).await;

    let err = handlers::update_email(
        caller,
        State(state),
        Path(Uuid::new_v4()),
        Ok(Json(UpdateEmailRequest::default())),
    )
    .await
    .unwrap_err();
    assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
}

#[test]
async fn test_dynamic_fields_merge() {
    let state = create_test_state();
    let caller = seed_user(&state, Role::User).await;
    let req = CreateEmailRequest {
        dynamic_fields: Some(HashMap::from([
            ("vehicleReg".to_string(), serde_json::json!("AB12 CDE")),
            ("mileage".to_string(), serde_json::json!(42000)),
        ])),
        ..email_request("Extra data")
    };
    let (_, Json(email)) = handlers::create_email(caller, State(state.clone()), Ok(Json(req)))
        .await
        .unwrap();

    let patch = UpdateEmailRequest {
        dynamic_fields: Some(HashMap::from([
            ("mileage".to_string(), serde_json::Value::Null),
            ("garage".to_string(), serde_json::json!("Main St Motors")),
        ])),
        ..UpdateEmailRequest::default()
    };
    let Json(updated) = handlers::update_email(caller, State(state), Path(email.id), Ok(Json(patch)))
        .await
        .unwrap();

    assert_eq!(updated.dynamic_fields.len(), 2);
    assert_eq!(updated.dynamic_fields["vehicleReg"], "AB12 CDE");
    assert_eq!(updated.dynamic_fields["garage"], "Main St Motors");
    assert!(!updated.dynamic_fields.contains_key("mileage"));
}

#[test]
async fn test_user_attaches_only_own_uploads() {
    let state = create_test_state();
    let caller = seed_user(&state, Role::User).await;
    let other = seed_user(&state, Role::User).await;

    let own = storage::attachment_key(caller.id, "photo.jpg");
    let req = CreateEmailRequest {
        attachments: Some(vec![own.clone()]),
        ..email_request("With photo")
    };
    let (_, Json(email)) = handlers::create_email(caller, State(state.clone()), Ok(Json(req)))
        .await
        .unwrap();
    assert_eq!(email.attachments, vec![own.clone()]);

    let foreign = storage::attachment_key(other.id, "their-invoice.pdf");
    let escaping = format!("{}../{}/x.pdf", storage::owner_prefix(caller.id), other.id);
    for key in [foreign.clone(), escaping] {
        let req = CreateEmailRequest {
            attachments: Some(vec![own.clone(), key.clone()]),
            ..email_request("Borrowed file")
        };
        let err = handlers::create_email(caller, State(state.clone()), Ok(Json(req)))
            .await
            .unwrap_err();
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST, "accepted {key}");
    }

    let patch = UpdateEmailRequest {
        attachments: Some(vec![foreign.clone()]),
        ..UpdateEmailRequest::default()
    };
    let err = handlers::update_email(caller, State(state.clone()), Path(email.id), Ok(Json(patch)))
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::BAD_REQUEST);

    // The desk may attach anything, e.g. when filing on a customer's behalf.
    let admin = seed_user(&state, Role::Admin).await;
    let patch = UpdateEmailRequest {
        attachments: Some(vec![foreign.clone()]),
        ..UpdateEmailRequest::default()
    };
    let Json(updated) = handlers::update_email(admin, State(state), Path(email.id), Ok(Json(patch)))
        .await
        .unwrap();
    assert_eq!(updated.attachments, vec![foreign]);
}

#[test]
async fn test_mark_email_read() {
    let state = create_test_state();
    let caller = seed_user(&state, Role::User).await;
    let (_, Json(email)) =
        handlers::create_email(caller, State(state.clone()), Ok(Json(email_request("Unread"))))
            .await
            .unwrap();

    let Json(read) = handlers::mark_email_read(caller, State(state), Path(email.id))
        .await
        .unwrap();
    assert!(read.read_by_user);
    assert_eq!(read.status, EmailStatus::New);
}

#[test]
async fn test_list_emails_rejects_unknown_filter() {
    let state = create_test_state();
    let caller = seed_user(&state, Role::User).await;

    let params = HashMap::from([("colour".to_string(), "red".to_string())]);
    let err = handlers::list_emails(caller, State(state), Query(params))
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
}

#[test]
async fn test_user_cannot_manage_policies() {
    let state = create_test_state();
    let caller = seed_user(&state, Role::User).await;

    let req = CreatePolicyRequest {
        policy_number: "POL-100".to_string(),
        policy_type: PolicyType::Vehicle,
        coverage_amount: 10_000.0,
        premium_amount: 300.0,
        ..CreatePolicyRequest::default()
    };
    let err = handlers::create_policy(caller, State(state), Ok(Json(req)))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));
    assert_eq!(status_of(err), StatusCode::FORBIDDEN);
}

#[test]
async fn test_dashboard_forbidden_for_user() {
    let state = create_test_state();
    let caller = seed_user(&state, Role::User).await;

    let err = handlers::get_dashboard(caller, State(state)).await.unwrap_err();
    assert_eq!(status_of(err), StatusCode::FORBIDDEN);
}

#[test]
async fn test_admin_user_management() {
    let state = create_test_state();
    let admin = seed_user(&state, Role::Admin).await;

    let req = CreateUserRequest {
        name: "New Agent".to_string(),
        email: "Agent@Claims.Test".to_string(),
        role: None,
    };
    let (status, Json(user)) = handlers::create_user(admin, State(state.clone()), Ok(Json(req.clone())))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user.role, Role::User);
    assert_eq!(user.email, "agent@claims.test");

    // Same address, different case.
    let err = handlers::create_user(admin, State(state.clone()), Ok(Json(req)))
        .await
        .unwrap_err();
    assert!(matches!(&err, ServiceError::Conflict(msg) if msg == "Email already taken"));
    assert_eq!(status_of(err), StatusCode::BAD_REQUEST);

    let status = handlers::delete_user(admin, State(state.clone()), Path(user.id))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let err = handlers::get_user(admin, State(state), Path(user.id)).await.unwrap_err();
    assert_eq!(status_of(err), StatusCode::NOT_FOUND);
}
