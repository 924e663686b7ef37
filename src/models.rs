use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::roles::Role;

// --- Enumerations ---

/// Category
///
/// What an inbound email is about. Unset on create means `Others`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Category {
    Enquire,
    Claim,
    Feedback,
    #[default]
    Others,
}

/// EmailStatus
///
/// The single canonical lifecycle for an email. Moves are constrained by
/// [`EmailStatus::can_transition_to`]; staying in the same state is always allowed.
///
/// ```text
/// new ──> in_progress ──> resolved
///  │          │  ▲
///  │          ▼  │
///  ├──────> on_hold
///  └──> ignored / rejected   (both can be reopened)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum EmailStatus {
    #[default]
    New,
    InProgress,
    OnHold,
    Resolved,
    Rejected,
    Ignored,
}

impl EmailStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [EmailStatus; 6] = [
        EmailStatus::New,
        EmailStatus::InProgress,
        EmailStatus::OnHold,
        EmailStatus::Resolved,
        EmailStatus::Rejected,
        EmailStatus::Ignored,
    ];

    /// Statuses counted as "pending" on the dashboard.
    pub const PENDING: [EmailStatus; 2] = [EmailStatus::New, EmailStatus::InProgress];

    /// Wire representation, identical to the serde form.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::New => "new",
            EmailStatus::InProgress => "in_progress",
            EmailStatus::OnHold => "on_hold",
            EmailStatus::Resolved => "resolved",
            EmailStatus::Rejected => "rejected",
            EmailStatus::Ignored => "ignored",
        }
    }

    pub fn can_transition_to(&self, next: EmailStatus) -> bool {
        use EmailStatus::*;
        if *self == next {
            return true;
        }
        matches!(
            (*self, next),
            (New, InProgress | OnHold | Ignored | Rejected)
                | (InProgress, OnHold | Resolved | Rejected | Ignored)
                | (OnHold, InProgress | Rejected | Ignored)
                | (Resolved, InProgress)
                | (Rejected, InProgress)
                | (Ignored, New | InProgress)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PolicyType {
    Health,
    Vehicle,
    Life,
    Property,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PolicyStatus {
    #[default]
    Active,
    Expired,
    Cancelled,
}

// --- Stored Documents ---

/// Email
///
/// A support or inquiry message owned by a user and optionally tied to a policy.
/// Stored as a JSON document in the `emails` collection; the serde form below is both the
/// storage and the wire format.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Email {
    pub id: Uuid,
    pub subject: String,
    pub email_body: String,
    pub sender_email: String,
    // Owning user (weak reference, no cascade).
    pub user: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_number: Option<String>,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub status: EmailStatus,
    #[serde(default)]
    pub priority: Priority,
    // Object storage keys issued by the presigned upload flow.
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub read_by_user: bool,
    /// Open-ended extension data attached to the typed record.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    #[ts(type = "Record<string, unknown>")]
    #[schema(value_type = Object)]
    pub dynamic_fields: HashMap<String, serde_json::Value>,
    #[serde(with = "timestamp")]
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Policy
///
/// An insurance policy record. `policy_number` is unique across the collection.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Policy {
    pub id: Uuid,
    pub policy_number: String,
    pub policy_type: PolicyType,
    pub coverage_amount: f64,
    pub premium_amount: f64,
    #[serde(with = "timestamp")]
    #[ts(type = "string")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "timestamp")]
    #[ts(type = "string")]
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub status: PolicyStatus,
    pub user: Uuid,
    #[serde(with = "timestamp")]
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// User
///
/// Account record resolved by the auth extractor. `email` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(with = "timestamp")]
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads ---

/// CreateEmailRequest
///
/// Body of `POST /emails`. For callers with the `user` role the owner is always the caller;
/// admins may file on behalf of another user via `user`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[ts(export)]
pub struct CreateEmailRequest {
    pub subject: String,
    pub email_body: String,
    pub sender_email: String,
    #[serde(default)]
    pub user: Option<Uuid>,
    #[serde(default)]
    pub policy_number: Option<String>,
    #[serde(default)]
    pub policy_id: Option<Uuid>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub attachments: Option<Vec<String>>,
    #[serde(default)]
    #[ts(type = "Record<string, unknown> | null")]
    #[schema(value_type = Option<Object>)]
    pub dynamic_fields: Option<HashMap<String, serde_json::Value>>,
}

/// UpdateEmailRequest
///
/// Partial update for `PATCH /emails/{id}`. Only `Some` fields change. In `dynamic_fields`,
/// a `null` value removes the key; any other value overwrites it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[ts(export)]
pub struct UpdateEmailRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EmailStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_by_user: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "Record<string, unknown> | null")]
    #[schema(value_type = Option<Object>)]
    pub dynamic_fields: Option<HashMap<String, serde_json::Value>>,
}

impl UpdateEmailRequest {
    pub fn is_empty(&self) -> bool {
        self.subject.is_none()
            && self.email_body.is_none()
            && self.sender_email.is_none()
            && self.policy_number.is_none()
            && self.policy_id.is_none()
            && self.category.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.attachments.is_none()
            && self.read_by_user.is_none()
            && self.dynamic_fields.is_none()
    }
}

/// CreatePolicyRequest
///
/// Body of `POST /policies`. Dates accept RFC 3339 timestamps or plain `YYYY-MM-DD`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[ts(export)]
pub struct CreatePolicyRequest {
    pub policy_number: String,
    pub policy_type: PolicyType,
    pub coverage_amount: f64,
    pub premium_amount: f64,
    #[serde(with = "timestamp")]
    #[ts(type = "string")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "timestamp")]
    #[ts(type = "string")]
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub status: Option<PolicyStatus>,
    #[serde(default)]
    pub user: Option<Uuid>,
}

/// UpdatePolicyRequest
///
/// Partial update for `PATCH /policies/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[ts(export)]
pub struct UpdatePolicyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_type: Option<PolicyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premium_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "timestamp::option")]
    #[ts(type = "string | null")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "timestamp::option")]
    #[ts(type = "string | null")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PolicyStatus>,
}

impl UpdatePolicyRequest {
    pub fn is_empty(&self) -> bool {
        self.policy_number.is_none()
            && self.policy_type.is_none()
            && self.coverage_amount.is_none()
            && self.premium_amount.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.status.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[ts(export)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl UpdateUserRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.role.is_none()
    }
}

/// PresignedUrlRequest
///
/// Input for `POST /emails/attachments/presigned`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PresignedUrlRequest {
    #[schema(example = "claim_photo.jpg")]
    pub filename: String,
    #[schema(example = "image/jpeg")]
    pub file_type: String,
}

/// PresignedUrlResponse
///
/// `resource_key` is what the client later puts in an email's `attachments`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PresignedUrlResponse {
    pub upload_url: String,
    pub resource_key: String,
}

// --- Output Envelopes ---

/// Page
///
/// Result envelope of every list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
    pub total_results: u64,
}

/// GroupCount
///
/// One bucket of a grouped count. `value` is `None` for documents lacking the field.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[ts(export)]
pub struct GroupCount {
    pub value: Option<String>,
    pub count: u64,
}

/// RecentEmail
///
/// Reduced projection of an email for the dashboard feed. Read straight from the stored
/// document, so `status`, `category` and `priority` are kept as whatever text was stored,
/// including values outside the current enums. Besides the display fields it carries the
/// email `id` so the feed can link to the full record.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RecentEmail {
    pub id: Uuid,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender_email: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(with = "timestamp")]
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// DashboardSummary
///
/// Output of `GET /dashboard`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DashboardSummary {
    pub emails_by_category: Vec<GroupCount>,
    pub emails_by_status: Vec<GroupCount>,
    pub emails_by_priority: Vec<GroupCount>,
    pub recent_emails: Vec<RecentEmail>,
    /// Emails whose status is `new` or `in_progress`.
    pub pending_emails: u64,
    pub total_users: u64,
}

/// Current time truncated to microseconds, the precision timestamps are stored with.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

/// Timestamp serde
///
/// Writes RFC 3339 with a fixed six-digit fraction so that string order inside the document
/// store equals chronological order. Reads RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC).
pub mod timestamp {
    use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid date '{}'", raw)))
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer, de::Error};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(ts) => super::serialize(ts, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid date '{}'", raw))),
                None => Ok(None),
            }
        }
    }
}
