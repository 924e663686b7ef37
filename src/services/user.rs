use uuid::Uuid;

use super::{decode, encode};
use crate::{
    error::ServiceError,
    models::{self, CreateUserRequest, Page, UpdateUserRequest, User},
    pagination::paginate,
    query::{Filter, ListQuery},
    repository::{Collection, DocumentStore},
};

fn not_found() -> ServiceError {
    ServiceError::NotFound("User not found".to_string())
}

/// Emails are compared case-insensitively, so they are stored lower-cased.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn is_email_taken(
    store: &dyn DocumentStore,
    email: &str,
    exclude: Option<Uuid>,
) -> Result<bool, ServiceError> {
    let filter = Filter::new().eq("email", email);
    match store.find_one(Collection::Users, &filter).await? {
        Some(doc) => {
            let existing: User = decode(doc)?;
            Ok(Some(existing.id) != exclude)
        }
        None => Ok(false),
    }
}

pub async fn create_user(store: &dyn DocumentStore, req: CreateUserRequest) -> Result<User, ServiceError> {
    let email = normalize_email(&req.email);
    if is_email_taken(store, &email, None).await? {
        return Err(ServiceError::Conflict("Email already taken".to_string()));
    }

    let now = models::now();
    let user = User {
        id: Uuid::new_v4(),
        name: req.name.trim().to_string(),
        email,
        role: req.role.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };
    store.insert(Collection::Users, user.id, encode(&user)?).await?;
    tracing::info!(user_id = %user.id, role = ?user.role, "user created");
    Ok(user)
}

pub async fn list_users(store: &dyn DocumentStore, query: ListQuery) -> Result<Page<User>, ServiceError> {
    Ok(paginate(store, Collection::Users, &query).await?)
}

pub async fn get_user(store: &dyn DocumentStore, id: Uuid) -> Result<Option<User>, ServiceError> {
    match store.find_by_id(Collection::Users, id).await? {
        Some(doc) => Ok(Some(decode(doc)?)),
        None => Ok(None),
    }
}

pub async fn update_user(
    store: &dyn DocumentStore,
    id: Uuid,
    req: UpdateUserRequest,
) -> Result<User, ServiceError> {
    let mut user = get_user(store, id).await?.ok_or_else(not_found)?;

    if let Some(email) = req.email {
        let email = normalize_email(&email);
        if email != user.email {
            if is_email_taken(store, &email, Some(id)).await? {
                return Err(ServiceError::Conflict("Email already taken".to_string()));
            }
            user.email = email;
        }
    }
    if let Some(name) = req.name {
        user.name = name.trim().to_string();
    }
    if let Some(role) = req.role {
        user.role = role;
    }
    user.updated_at = models::now();

    if !store.replace(Collection::Users, id, encode(&user)?).await? {
        return Err(not_found());
    }
    tracing::info!(user_id = %id, "user updated");
    Ok(user)
}

pub async fn delete_user(store: &dyn DocumentStore, id: Uuid) -> Result<(), ServiceError> {
    get_user(store, id).await?.ok_or_else(not_found)?;
    if !store.remove(Collection::Users, id).await? {
        return Err(not_found());
    }
    tracing::info!(user_id = %id, "user deleted");
    Ok(())
}
