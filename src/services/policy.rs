use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{decode, encode};
use crate::{
    auth::AuthUser,
    error::ServiceError,
    models::{self, CreatePolicyRequest, Page, Policy, UpdatePolicyRequest},
    pagination::paginate,
    query::{Filter, ListQuery},
    repository::{Collection, DocumentStore},
};

fn not_found() -> ServiceError {
    ServiceError::NotFound("Policy not found".to_string())
}

/// Fails with `Conflict` if another policy already uses `number`.
async fn ensure_number_free(
    store: &dyn DocumentStore,
    number: &str,
    exclude: Option<Uuid>,
) -> Result<(), ServiceError> {
    let filter = Filter::new().eq("policyNumber", number);
    if let Some(doc) = store.find_one(Collection::Policies, &filter).await? {
        let existing: Policy = decode(doc)?;
        if Some(existing.id) != exclude {
            return Err(ServiceError::Conflict("Policy number already taken".to_string()));
        }
    }
    Ok(())
}

fn ensure_date_order(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ServiceError> {
    if start > end {
        return Err(ServiceError::Validation(
            "startDate must not be after endDate".to_string(),
        ));
    }
    Ok(())
}

pub async fn create_policy(
    store: &dyn DocumentStore,
    caller: &AuthUser,
    req: CreatePolicyRequest,
) -> Result<Policy, ServiceError> {
    let policy_number = req.policy_number.trim().to_string();
    ensure_date_order(req.start_date, req.end_date)?;
    ensure_number_free(store, &policy_number, None).await?;

    let now = models::now();
    let policy = Policy {
        id: Uuid::new_v4(),
        policy_number,
        policy_type: req.policy_type,
        coverage_amount: req.coverage_amount,
        premium_amount: req.premium_amount,
        start_date: req.start_date,
        end_date: req.end_date,
        status: req.status.unwrap_or_default(),
        user: caller.owner_for(req.user),
        created_at: now,
        updated_at: now,
    };

    // The unique index still guards against a concurrent insert of the same number.
    store.insert(Collection::Policies, policy.id, encode(&policy)?).await?;
    tracing::info!(policy_id = %policy.id, policy_number = %policy.policy_number, "policy created");
    Ok(policy)
}

pub async fn list_policies(
    store: &dyn DocumentStore,
    caller: &AuthUser,
    query: ListQuery,
) -> Result<Page<Policy>, ServiceError> {
    let query = ListQuery {
        filter: caller.scope_filter(query.filter.clone()),
        ..query
    };
    Ok(paginate(store, Collection::Policies, &query).await?)
}

pub async fn get_policy(
    store: &dyn DocumentStore,
    caller: &AuthUser,
    id: Uuid,
) -> Result<Option<Policy>, ServiceError> {
    let Some(doc) = store.find_by_id(Collection::Policies, id).await? else {
        return Ok(None);
    };
    let policy: Policy = decode(doc)?;
    Ok(caller.can_access(policy.user).then_some(policy))
}

pub async fn update_policy(
    store: &dyn DocumentStore,
    caller: &AuthUser,
    id: Uuid,
    req: UpdatePolicyRequest,
) -> Result<Policy, ServiceError> {
    let mut policy = get_policy(store, caller, id).await?.ok_or_else(not_found)?;

    if let Some(number) = req.policy_number {
        let number = number.trim().to_string();
        if number != policy.policy_number {
            ensure_number_free(store, &number, Some(id)).await?;
            policy.policy_number = number;
        }
    }
    if let Some(policy_type) = req.policy_type {
        policy.policy_type = policy_type;
    }
    if let Some(coverage) = req.coverage_amount {
        policy.coverage_amount = coverage;
    }
    if let Some(premium) = req.premium_amount {
        policy.premium_amount = premium;
    }
    if let Some(start) = req.start_date {
        policy.start_date = start;
    }
    if let Some(end) = req.end_date {
        policy.end_date = end;
    }
    if let Some(status) = req.status {
        policy.status = status;
    }
    ensure_date_order(policy.start_date, policy.end_date)?;
    policy.updated_at = models::now();

    if !store.replace(Collection::Policies, id, encode(&policy)?).await? {
        return Err(not_found());
    }
    tracing::info!(policy_id = %id, "policy updated");
    Ok(policy)
}

pub async fn delete_policy(
    store: &dyn DocumentStore,
    caller: &AuthUser,
    id: Uuid,
) -> Result<(), ServiceError> {
    get_policy(store, caller, id).await?.ok_or_else(not_found)?;
    if !store.remove(Collection::Policies, id).await? {
        return Err(not_found());
    }
    tracing::info!(policy_id = %id, "policy deleted");
    Ok(())
}
