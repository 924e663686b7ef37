//! Request validation that serde alone cannot express.
//!
//! Shape errors (missing fields, unknown fields, bad enum values) are rejected while the
//! JSON body is being decoded. What remains here are the cross-field and content rules,
//! plus validation of list query strings.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::ServiceError,
    models::{
        Category, CreateEmailRequest, CreatePolicyRequest, CreateUserRequest, EmailStatus,
        PolicyStatus, PolicyType, Priority, UpdateEmailRequest, UpdatePolicyRequest,
        UpdateUserRequest,
    },
    query::RESERVED_KEYS,
    roles::Role,
};

/// Filter keys accepted on `GET /emails`.
pub const EMAIL_FILTERS: &[&str] = &[
    "subject",
    "category",
    "status",
    "priority",
    "user",
    "policyNumber",
    "readByUser",
];

/// Filter keys accepted on `GET /policies`.
pub const POLICY_FILTERS: &[&str] = &["policyNumber", "policyType", "status", "user"];

/// Filter keys accepted on `GET /admin/users`.
pub const USER_FILTERS: &[&str] = &["name", "email", "role"];

fn invalid(message: impl Into<String>) -> ServiceError {
    ServiceError::Validation(message.into())
}

fn require_text(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(invalid(format!("\"{}\" is not allowed to be empty", field)));
    }
    Ok(())
}

/// A deliberately loose address check: one `@`, something before it, a dotted domain after.
pub fn is_email_address(value: &str) -> bool {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !value.contains(char::is_whitespace)
                && domain.split('.').count() >= 2
                && domain.split('.').all(|part| !part.is_empty())
        }
        None => false,
    }
}

fn require_email(field: &str, value: &str) -> Result<(), ServiceError> {
    require_text(field, value)?;
    if !is_email_address(value) {
        return Err(invalid(format!("\"{}\" must be a valid email", field)));
    }
    Ok(())
}

fn require_amount(field: &str, value: f64) -> Result<(), ServiceError> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(format!(
            "\"{}\" must be a non-negative number",
            field
        )));
    }
    Ok(())
}

fn require_changes(is_empty: bool) -> Result<(), ServiceError> {
    if is_empty {
        return Err(invalid("Request body must contain at least one field"));
    }
    Ok(())
}

pub fn create_email(req: &CreateEmailRequest) -> Result<(), ServiceError> {
    require_text("subject", &req.subject)?;
    require_text("emailBody", &req.email_body)?;
    require_email("senderEmail", &req.sender_email)?;
    if let Some(number) = &req.policy_number {
        require_text("policyNumber", number)?;
    }
    Ok(())
}

pub fn update_email(req: &UpdateEmailRequest) -> Result<(), ServiceError> {
    require_changes(req.is_empty())?;
    if let Some(subject) = &req.subject {
        require_text("subject", subject)?;
    }
    if let Some(body) = &req.email_body {
        require_text("emailBody", body)?;
    }
    if let Some(sender) = &req.sender_email {
        require_email("senderEmail", sender)?;
    }
    if let Some(number) = &req.policy_number {
        require_text("policyNumber", number)?;
    }
    Ok(())
}

pub fn create_policy(req: &CreatePolicyRequest) -> Result<(), ServiceError> {
    require_text("policyNumber", &req.policy_number)?;
    require_amount("coverageAmount", req.coverage_amount)?;
    require_amount("premiumAmount", req.premium_amount)?;
    if req.start_date > req.end_date {
        return Err(invalid("startDate must not be after endDate"));
    }
    Ok(())
}

pub fn update_policy(req: &UpdatePolicyRequest) -> Result<(), ServiceError> {
    require_changes(req.is_empty())?;
    if let Some(number) = &req.policy_number {
        require_text("policyNumber", number)?;
    }
    if let Some(coverage) = req.coverage_amount {
        require_amount("coverageAmount", coverage)?;
    }
    if let Some(premium) = req.premium_amount {
        require_amount("premiumAmount", premium)?;
    }
    Ok(())
}

pub fn create_user(req: &CreateUserRequest) -> Result<(), ServiceError> {
    require_text("name", &req.name)?;
    require_email("email", &req.email)
}

pub fn update_user(req: &UpdateUserRequest) -> Result<(), ServiceError> {
    require_changes(req.is_empty())?;
    if let Some(name) = &req.name {
        require_text("name", name)?;
    }
    if let Some(email) = &req.email {
        require_email("email", email)?;
    }
    Ok(())
}

fn parses_as<T: DeserializeOwned>(value: &str) -> bool {
    serde_json::from_value::<T>(Value::String(value.to_string())).is_ok()
}

/// list_params
///
/// Checks a list endpoint's raw query string. Every key must be a pagination key or one of
/// `allowed`. Window values must be integers, and values for enum-typed or id-typed fields
/// must be well formed. Non-positive windows pass here and are clamped later.
pub fn list_params(params: &HashMap<String, String>, allowed: &[&str]) -> Result<(), ServiceError> {
    for (key, value) in params {
        let ok = match key.as_str() {
            "limit" | "page" => value.trim().parse::<i64>().is_ok(),
            "sortBy" => true,
            "user" => Uuid::parse_str(value).is_ok(),
            "readByUser" => value == "true" || value == "false",
            "category" => parses_as::<Category>(value),
            "priority" => parses_as::<Priority>(value),
            "policyType" => parses_as::<PolicyType>(value),
            "role" => parses_as::<Role>(value),
            // Same key, different enum per resource.
            "status" if allowed == EMAIL_FILTERS => parses_as::<EmailStatus>(value),
            "status" => parses_as::<PolicyStatus>(value),
            _ => true,
        };
        if !RESERVED_KEYS.contains(&key.as_str()) && !allowed.contains(&key.as_str()) {
            return Err(invalid(format!("\"{}\" is not allowed", key)));
        }
        if !ok {
            return Err(invalid(format!("\"{}\" has an invalid value", key)));
        }
    }
    Ok(())
}
