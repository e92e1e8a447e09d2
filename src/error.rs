//! Application error types.
//!
//! These errors are serializable so the HTTP layer can return them as
//! structured JSON, and typed so callers can branch on business-rule
//! violations without string matching.

use serde::Serialize;
use thiserror::Error;

/// Application-level errors returned by the directory, engine, store and API.
///
/// All variants serialize to a structured JSON object.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// Requested user, team or pull request does not exist.
    #[error("Not found: {resource}")]
    NotFound {
        resource: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Malformed, duplicate or empty input.
    #[error("Invalid payload: {message}")]
    InvalidPayload {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// A team or pull request with the same identifier already exists.
    #[error("{resource} {id} already exists")]
    AlreadyExists { resource: String, id: String },

    /// Mutation attempted on a merged pull request.
    #[error("Pull request {pull_request_id} is already merged")]
    PrMerged { pull_request_id: String },

    /// Reassignment target is not a reviewer of the pull request.
    #[error("User {user_id} is not assigned to pull request {pull_request_id}")]
    NotAssigned {
        pull_request_id: String,
        user_id: String,
    },

    /// No eligible replacement reviewer.
    #[error("No candidate reviewer available{}", scope_suffix(.pull_request_id))]
    NoCandidate {
        #[serde(skip_serializing_if = "Option::is_none")]
        pull_request_id: Option<String>,
    },

    /// Persistence layer failure.
    #[error("Store error: {message}")]
    Store {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        operation: Option<String>,
    },

    /// A component was used without the backing store it requires.
    #[error("{component} has no backing store configured")]
    NotConfigured { component: String },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn scope_suffix(pull_request_id: &Option<String>) -> String {
    match pull_request_id {
        Some(id) => format!(" for pull request {}", id),
        None => String::new(),
    }
}

impl AppError {
    /// Create a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: None,
        }
    }

    /// Create a not found error with ID.
    pub fn not_found_with_id(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.into()),
        }
    }

    /// Create an invalid payload error.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid payload error with field name.
    pub fn invalid_payload_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn already_exists(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn pr_merged(pull_request_id: impl Into<String>) -> Self {
        Self::PrMerged {
            pull_request_id: pull_request_id.into(),
        }
    }

    pub fn not_assigned(pull_request_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::NotAssigned {
            pull_request_id: pull_request_id.into(),
            user_id: user_id.into(),
        }
    }

    /// Create an unscoped no-candidate error (directory level).
    pub fn no_candidate() -> Self {
        Self::NoCandidate {
            pull_request_id: None,
        }
    }

    /// Create a no-candidate error scoped to a pull request.
    pub fn no_candidate_for(pull_request_id: impl Into<String>) -> Self {
        Self::NoCandidate {
            pull_request_id: Some(pull_request_id.into()),
        }
    }

    /// Create a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            operation: None,
        }
    }

    /// Create a store error with operation context.
    pub fn store_with_op(message: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            operation: Some(operation.into()),
        }
    }

    pub fn not_configured(component: impl Into<String>) -> Self {
        Self::NotConfigured {
            component: component.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this error is a business-rule violation rather than an
    /// infrastructure failure.
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            Self::InvalidPayload { .. }
                | Self::NotAssigned { .. }
                | Self::PrMerged { .. }
                | Self::NoCandidate { .. }
                | Self::AlreadyExists { .. }
        )
    }
}

// Conversions from common error types

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::store(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", err))
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(err: crate::db::DbError) -> Self {
        Self::store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = AppError::store("connection failed");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"type\":\"Store\""));
        assert!(json.contains("connection failed"));
    }

    #[test]
    fn test_not_found_with_id() {
        let err = AppError::not_found_with_id("PullRequest", "pr-1");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"resource\":\"PullRequest\""));
        assert!(json.contains("\"id\":\"pr-1\""));
    }

    #[test]
    fn test_optional_fields_not_serialized() {
        let err = AppError::store("error");
        let json = serde_json::to_string(&err).unwrap();
        assert!(!json.contains("operation"));
    }

    #[test]
    fn test_no_candidate_display() {
        assert_eq!(
            AppError::no_candidate().to_string(),
            "No candidate reviewer available"
        );
        assert_eq!(
            AppError::no_candidate_for("pr-5").to_string(),
            "No candidate reviewer available for pull request pr-5"
        );
    }

    #[test]
    fn test_business_rule_classification() {
        assert!(AppError::pr_merged("pr-1").is_business_rule());
        assert!(AppError::not_assigned("pr-1", "u1").is_business_rule());
        assert!(AppError::invalid_payload("empty").is_business_rule());
        assert!(!AppError::store("boom").is_business_rule());
        assert!(!AppError::not_configured("ReviewerDirectory").is_business_rule());
    }
}
