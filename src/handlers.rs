use std::collections::HashMap;

use crate::{
    AppState,
    auth::AuthUser,
    dashboard,
    error::ServiceError,
    models::{
        CreateEmailRequest, CreatePolicyRequest, CreateUserRequest, DashboardSummary, Email, Page,
        Policy, PresignedUrlRequest, PresignedUrlResponse, UpdateEmailRequest,
        UpdatePolicyRequest, UpdateUserRequest, User,
    },
    query::ListQuery,
    roles::Right,
    services, storage, validation,
};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use uuid::Uuid;

/// Unwraps a JSON body, turning decode failures (unknown fields, bad enum values, wrong types)
/// into a 400 instead of axum's default 422.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ServiceError::Validation(rejection.body_text()))
}

fn list_query(params: &HashMap<String, String>, allowed: &[&str]) -> Result<ListQuery, ServiceError> {
    validation::list_params(params, allowed)?;
    Ok(ListQuery::from_params(params))
}

// --- Emails ---

/// create_email
///
/// [Authenticated Route] Files a new email. The owner is the caller unless an admin names
/// another user.
#[utoipa::path(
    post,
    path = "/emails",
    request_body = CreateEmailRequest,
    responses(
        (status = 201, description = "Created", body = Email),
        (status = 400, description = "Invalid body")
    )
)]
pub async fn create_email(
    caller: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateEmailRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Email>), ServiceError> {
    caller.require(Right::ManageEmails)?;
    let req = body(payload)?;
    validation::create_email(&req)?;
    let email = services::create_email(state.store.as_ref(), &caller, req).await?;
    Ok((StatusCode::CREATED, Json(email)))
}

/// list_emails
///
/// [Authenticated Route] Paginated listing. Query keys other than `limit`, `page` and `sortBy`
/// are exact-match filters. Callers with the `user` role only ever see their own emails.
#[utoipa::path(
    get,
    path = "/emails",
    params(
        ("limit" = Option<u64>, Query, description = "Page size, default 10"),
        ("page" = Option<u64>, Query, description = "1-based page, default 1"),
        ("sortBy" = Option<String>, Query, description = "field:asc|desc, default createdAt:desc"),
    ),
    responses((status = 200, description = "Page of emails", body = Page<Email>))
)]
pub async fn list_emails(
    caller: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<Email>>, ServiceError> {
    caller.require(Right::GetEmails)?;
    let query = list_query(&params, validation::EMAIL_FILTERS)?;
    Ok(Json(services::list_emails(state.store.as_ref(), &caller, query).await?))
}

#[utoipa::path(
    get,
    path = "/emails/{id}",
    params(("id" = Uuid, Path, description = "Email ID")),
    responses(
        (status = 200, description = "Found", body = Email),
        (status = 404, description = "Email not found")
    )
)]
pub async fn get_email(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Email>, ServiceError> {
    caller.require(Right::GetEmails)?;
    services::get_email(state.store.as_ref(), &caller, id)
        .await?
        .map(Json)
        .ok_or_else(|| ServiceError::NotFound("Email not found".to_string()))
}

/// update_email
///
/// [Authenticated Route] Partial update. Status changes must follow the email lifecycle.
#[utoipa::path(
    patch,
    path = "/emails/{id}",
    params(("id" = Uuid, Path, description = "Email ID")),
    request_body = UpdateEmailRequest,
    responses(
        (status = 200, description = "Updated", body = Email),
        (status = 400, description = "Invalid body or status transition"),
        (status = 404, description = "Email not found")
    )
)]
pub async fn update_email(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateEmailRequest>, JsonRejection>,
) -> Result<Json<Email>, ServiceError> {
    caller.require(Right::ManageEmails)?;
    let req = body(payload)?;
    validation::update_email(&req)?;
    Ok(Json(services::update_email(state.store.as_ref(), &caller, id, req).await?))
}

#[utoipa::path(
    patch,
    path = "/emails/{id}/read",
    params(("id" = Uuid, Path, description = "Email ID")),
    responses(
        (status = 200, description = "Marked as read", body = Email),
        (status = 404, description = "Email not found")
    )
)]
pub async fn mark_email_read(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Email>, ServiceError> {
    caller.require(Right::ManageEmails)?;
    Ok(Json(services::mark_email_read(state.store.as_ref(), &caller, id).await?))
}

#[utoipa::path(
    delete,
    path = "/emails/{id}",
    params(("id" = Uuid, Path, description = "Email ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Email not found")
    )
)]
pub async fn delete_email(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    caller.require(Right::ManageEmails)?;
    services::delete_email(state.store.as_ref(), &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// get_presigned_url
///
/// [Authenticated Route] Issues a short-lived upload URL for an email attachment. The file
/// goes straight to object storage; the returned `resourceKey` is what the client then
/// stores in the email's `attachments`.
#[utoipa::path(
    post,
    path = "/emails/attachments/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 500, description = "Storage unavailable")
    )
)]
pub async fn get_presigned_url(
    caller: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<PresignedUrlRequest>, JsonRejection>,
) -> Result<Json<PresignedUrlResponse>, ServiceError> {
    caller.require(Right::ManageEmails)?;
    let req = body(payload)?;
    if req.filename.trim().is_empty() || req.file_type.trim().is_empty() {
        return Err(ServiceError::Validation(
            "filename and fileType are required".to_string(),
        ));
    }

    let resource_key = storage::attachment_key(caller.id, &req.filename);
    let upload_url = state
        .storage
        .get_presigned_upload_url(&resource_key, &req.file_type)
        .await?;
    tracing::info!(user_id = %caller.id, key = %resource_key, "issued attachment upload url");

    Ok(Json(PresignedUrlResponse {
        upload_url,
        resource_key,
    }))
}

// --- Policies ---

#[utoipa::path(
    post,
    path = "/policies",
    request_body = CreatePolicyRequest,
    responses(
        (status = 201, description = "Created", body = Policy),
        (status = 400, description = "Invalid body or policy number already taken")
    )
)]
pub async fn create_policy(
    caller: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreatePolicyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Policy>), ServiceError> {
    caller.require(Right::ManagePolicies)?;
    let req = body(payload)?;
    validation::create_policy(&req)?;
    let policy = services::create_policy(state.store.as_ref(), &caller, req).await?;
    Ok((StatusCode::CREATED, Json(policy)))
}

#[utoipa::path(
    get,
    path = "/policies",
    params(
        ("limit" = Option<u64>, Query, description = "Page size, default 10"),
        ("page" = Option<u64>, Query, description = "1-based page, default 1"),
        ("sortBy" = Option<String>, Query, description = "field:asc|desc, default createdAt:desc"),
    ),
    responses((status = 200, description = "Page of policies", body = Page<Policy>))
)]
pub async fn list_policies(
    caller: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<Policy>>, ServiceError> {
    caller.require(Right::GetPolicies)?;
    let query = list_query(&params, validation::POLICY_FILTERS)?;
    Ok(Json(services::list_policies(state.store.as_ref(), &caller, query).await?))
}

#[utoipa::path(
    get,
    path = "/policies/{id}",
    params(("id" = Uuid, Path, description = "Policy ID")),
    responses(
        (status = 200, description = "Found", body = Policy),
        (status = 404, description = "Policy not found")
    )
)]
pub async fn get_policy(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Policy>, ServiceError> {
    caller.require(Right::GetPolicies)?;
    services::get_policy(state.store.as_ref(), &caller, id)
        .await?
        .map(Json)
        .ok_or_else(|| ServiceError::NotFound("Policy not found".to_string()))
}

#[utoipa::path(
    patch,
    path = "/policies/{id}",
    params(("id" = Uuid, Path, description = "Policy ID")),
    request_body = UpdatePolicyRequest,
    responses(
        (status = 200, description = "Updated", body = Policy),
        (status = 404, description = "Policy not found")
    )
)]
pub async fn update_policy(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdatePolicyRequest>, JsonRejection>,
) -> Result<Json<Policy>, ServiceError> {
    caller.require(Right::ManagePolicies)?;
    let req = body(payload)?;
    validation::update_policy(&req)?;
    Ok(Json(services::update_policy(state.store.as_ref(), &caller, id, req).await?))
}

#[utoipa::path(
    delete,
    path = "/policies/{id}",
    params(("id" = Uuid, Path, description = "Policy ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Policy not found")
    )
)]
pub async fn delete_policy(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    caller.require(Right::ManagePolicies)?;
    services::delete_policy(state.store.as_ref(), &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Dashboard ---

/// get_dashboard
///
/// [Authenticated Route] Aggregated counts across all emails and users. Requires
/// `viewDashboard`, which only admins hold.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Dashboard", body = DashboardSummary),
        (status = 500, description = "Failed to fetch dashboard data")
    )
)]
pub async fn get_dashboard(
    caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<DashboardSummary>, ServiceError> {
    caller.require(Right::ViewDashboard)?;
    Ok(Json(dashboard::dashboard_summary(state.store.as_ref()).await?))
}

// --- Users (admin) ---

#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = User),
        (status = 400, description = "Invalid body or email already taken"),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn create_user(
    caller: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ServiceError> {
    caller.require(Right::ManageUsers)?;
    let req = body(payload)?;
    validation::create_user(&req)?;
    let user = services::create_user(state.store.as_ref(), req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    params(
        ("limit" = Option<u64>, Query, description = "Page size, default 10"),
        ("page" = Option<u64>, Query, description = "1-based page, default 1"),
        ("sortBy" = Option<String>, Query, description = "field:asc|desc, default createdAt:desc"),
    ),
    responses(
        (status = 200, description = "Page of users", body = Page<User>),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn list_users(
    caller: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<User>>, ServiceError> {
    caller.require(Right::GetUsers)?;
    let query = list_query(&params, validation::USER_FILTERS)?;
    Ok(Json(services::list_users(state.store.as_ref(), query).await?))
}

#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ServiceError> {
    caller.require(Right::GetUsers)?;
    services::get_user(state.store.as_ref(), id)
        .await?
        .map(Json)
        .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
}

#[utoipa::path(
    patch,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<User>, ServiceError> {
    caller.require(Right::ManageUsers)?;
    let req = body(payload)?;
    validation::update_user(&req)?;
    Ok(Json(services::update_user(state.store.as_ref(), id, req).await?))
}

#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    caller.require(Right::ManageUsers)?;
    services::delete_user(state.store.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
