use uuid::Uuid;

use super::{decode, encode, trimmed};
use crate::{
    auth::AuthUser,
    error::ServiceError,
    models::{self, CreateEmailRequest, Email, EmailStatus, Page, UpdateEmailRequest},
    pagination::paginate,
    query::ListQuery,
    repository::{Collection, DocumentStore},
};

fn not_found() -> ServiceError {
    ServiceError::NotFound("Email not found".to_string())
}

/// Files a new email. Status always starts at `new`; category and priority fall back to
/// their defaults when omitted. Attachment keys must come from the caller's own uploads.
pub async fn create_email(
    store: &dyn DocumentStore,
    caller: &AuthUser,
    req: CreateEmailRequest,
) -> Result<Email, ServiceError> {
    let attachments = req.attachments.unwrap_or_default();
    caller.check_attachments(&attachments)?;

    let now = models::now();
    let email = Email {
        id: Uuid::new_v4(),
        subject: req.subject.trim().to_string(),
        email_body: req.email_body,
        sender_email: req.sender_email.trim().to_string(),
        user: caller.owner_for(req.user),
        policy_id: req.policy_id,
        policy_number: trimmed(req.policy_number),
        category: req.category.unwrap_or_default(),
        status: EmailStatus::New,
        priority: req.priority.unwrap_or_default(),
        attachments,
        read_by_user: false,
        dynamic_fields: req.dynamic_fields.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };

    store.insert(Collection::Emails, email.id, encode(&email)?).await?;
    tracing::info!(email_id = %email.id, owner = %email.user, "email created");
    Ok(email)
}

pub async fn list_emails(
    store: &dyn DocumentStore,
    caller: &AuthUser,
    query: ListQuery,
) -> Result<Page<Email>, ServiceError> {
    let query = ListQuery {
        filter: caller.scope_filter(query.filter.clone()),
        ..query
    };
    Ok(paginate(store, Collection::Emails, &query).await?)
}

/// Absence (including "exists but belongs to someone else") is `Ok(None)`, not an error.
pub async fn get_email(
    store: &dyn DocumentStore,
    caller: &AuthUser,
    id: Uuid,
) -> Result<Option<Email>, ServiceError> {
    let Some(doc) = store.find_by_id(Collection::Emails, id).await? else {
        return Ok(None);
    };
    let email: Email = decode(doc)?;
    Ok(caller.can_access(email.user).then_some(email))
}

/// Applies a partial update. Only the provided fields change; a status change must be an
/// allowed lifecycle move.
pub async fn update_email(
    store: &dyn DocumentStore,
    caller: &AuthUser,
    id: Uuid,
    req: UpdateEmailRequest,
) -> Result<Email, ServiceError> {
    let mut email = get_email(store, caller, id).await?.ok_or_else(not_found)?;

    if let Some(next) = req.status {
        if !email.status.can_transition_to(next) {
            return Err(ServiceError::Validation(format!(
                "Cannot move email from '{}' to '{}'",
                email.status.as_str(),
                next.as_str()
            )));
        }
        email.status = next;
    }
    if let Some(subject) = req.subject {
        email.subject = subject.trim().to_string();
    }
    if let Some(body) = req.email_body {
        email.email_body = body;
    }
    if let Some(sender) = req.sender_email {
        email.sender_email = sender.trim().to_string();
    }
    if let Some(number) = trimmed(req.policy_number) {
        email.policy_number = Some(number);
    }
    if let Some(policy_id) = req.policy_id {
        email.policy_id = Some(policy_id);
    }
    if let Some(category) = req.category {
        email.category = category;
    }
    if let Some(priority) = req.priority {
        email.priority = priority;
    }
    if let Some(attachments) = req.attachments {
        caller.check_attachments(&attachments)?;
        email.attachments = attachments;
    }
    if let Some(read) = req.read_by_user {
        email.read_by_user = read;
    }
    if let Some(fields) = req.dynamic_fields {
        for (key, value) in fields {
            if value.is_null() {
                email.dynamic_fields.remove(&key);
            } else {
                email.dynamic_fields.insert(key, value);
            }
        }
    }
    email.updated_at = models::now();

    if !store.replace(Collection::Emails, id, encode(&email)?).await? {
        // Removed between the read and the write.
        return Err(not_found());
    }
    tracing::info!(email_id = %id, status = email.status.as_str(), "email updated");
    Ok(email)
}

pub async fn mark_email_read(
    store: &dyn DocumentStore,
    caller: &AuthUser,
    id: Uuid,
) -> Result<Email, ServiceError> {
    let req = UpdateEmailRequest {
        read_by_user: Some(true),
        ..UpdateEmailRequest::default()
    };
    update_email(store, caller, id, req).await
}

pub async fn delete_email(
    store: &dyn DocumentStore,
    caller: &AuthUser,
    id: Uuid,
) -> Result<(), ServiceError> {
    get_email(store, caller, id).await?.ok_or_else(not_found)?;
    if !store.remove(Collection::Emails, id).await? {
        return Err(not_found());
    }
    tracing::info!(email_id = %id, "email deleted");
    Ok(())
}
