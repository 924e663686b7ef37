use crate::{
    error::{ServiceError, StoreError},
    models::{DashboardSummary, EmailStatus, RecentEmail},
    query::{Direction, Filter, Sort},
    repository::{Collection, DocumentStore},
};

/// How many emails the "recent" feed shows.
pub const RECENT_EMAILS: u64 = 10;

/// dashboard_summary
///
/// Builds the dashboard from six independent reads over the email and user collections.
/// The reads run concurrently and are not a consistent snapshot. The first failure aborts the
/// whole report; callers only ever see `ServiceError::DashboardUnavailable`.
pub async fn dashboard_summary(store: &dyn DocumentStore) -> Result<DashboardSummary, ServiceError> {
    collect(store).await.map_err(|e| {
        tracing::error!("dashboard aggregation failed: {:?}", e);
        ServiceError::DashboardUnavailable
    })
}

async fn collect(store: &dyn DocumentStore) -> Result<DashboardSummary, StoreError> {
    let everything = Filter::new();
    let newest_first = Sort {
        field: "createdAt".to_string(),
        direction: Direction::Desc,
    };
    let pending = Filter::new().any_of("status", EmailStatus::PENDING.iter().map(|s| s.as_str()));

    let (emails_by_category, emails_by_status, emails_by_priority, recent, pending_emails, total_users) =
        tokio::try_join!(
            store.group_count(Collection::Emails, "category"),
            store.group_count(Collection::Emails, "status"),
            store.group_count(Collection::Emails, "priority"),
            store.find(Collection::Emails, &everything, &newest_first, 0, RECENT_EMAILS),
            store.count(Collection::Emails, &pending),
            store.count(Collection::Users, &everything),
        )?;

    let recent_emails = recent
        .into_iter()
        .map(serde_json::from_value::<RecentEmail>)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DashboardSummary {
        emails_by_category,
        emails_by_status,
        emails_by_priority,
        recent_emails,
        pending_emails,
        total_users,
    })
}
