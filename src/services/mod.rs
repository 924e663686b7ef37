//! Resource services: the orchestration between handlers and the document store.
//!
//! Every operation takes the calling [`AuthUser`] so ownership scoping lives in one place:
//! admins see every record, everyone else only the records whose `user` is their own id.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

use crate::{auth::AuthUser, error::ServiceError, query::Filter, storage};

pub mod email;
pub mod policy;
pub mod user;

pub use email::{create_email, delete_email, get_email, list_emails, mark_email_read, update_email};
pub use policy::{create_policy, delete_policy, get_policy, list_policies, update_policy};
pub use user::{create_user, delete_user, get_user, list_users, update_user};

impl AuthUser {
    /// Whether this caller may see a record owned by `owner`.
    pub fn can_access(&self, owner: Uuid) -> bool {
        self.role.is_unscoped() || self.id == owner
    }

    /// Pins a list filter to the caller's own records unless the caller is unscoped.
    pub fn scope_filter(&self, filter: Filter) -> Filter {
        if self.role.is_unscoped() {
            filter
        } else {
            filter.restrict("user", self.id.to_string())
        }
    }

    /// Owner for a newly created record: scoped callers always own what they create.
    pub fn owner_for(&self, requested: Option<Uuid>) -> Uuid {
        match requested {
            Some(owner) if self.role.is_unscoped() => owner,
            _ => self.id,
        }
    }

    /// Scoped callers may only reference objects under their own attachment prefix.
    pub fn check_attachments(&self, keys: &[String]) -> Result<(), ServiceError> {
        if self.role.is_unscoped() {
            return Ok(());
        }
        let prefix = storage::owner_prefix(self.id);
        match keys
            .iter()
            .find(|key| !key.starts_with(&prefix) || storage::sanitize_key(key) != **key)
        {
            Some(key) => {
                tracing::warn!(user_id = %self.id, key = %key, "foreign attachment key rejected");
                Err(ServiceError::Validation(format!("Unknown attachment '{}'", key)))
            }
            None => Ok(()),
        }
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Value, ServiceError> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!("failed to encode document: {:?}", e);
        ServiceError::Storage("Internal storage error".to_string())
    })
}

pub(crate) fn decode<T: DeserializeOwned>(doc: Value) -> Result<T, ServiceError> {
    serde_json::from_value(doc).map_err(|e| {
        tracing::error!("failed to decode stored document: {:?}", e);
        ServiceError::Storage("Internal storage error".to_string())
    })
}

/// Trims a user-supplied string, treating blank as absent.
pub(crate) fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
