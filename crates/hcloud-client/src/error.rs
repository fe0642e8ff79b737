//! Hetzner Cloud client errors

use std::fmt;
use thiserror::Error;

/// Error codes returned by the Hetzner Cloud API in `error.code`.
///
/// Only the codes the reconcilers branch on get their own variant; everything
/// else is kept verbatim in [`ErrorCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// `not_found`
    NotFound,
    /// `rate_limit_exceeded`
    RateLimitExceeded,
    /// `load_balancer_already_attached`
    LoadBalancerAlreadyAttached,
    /// `uniqueness_error`
    UniquenessError,
    /// `conflict`
    Conflict,
    /// `invalid_input`
    InvalidInput,
    /// `unauthorized`
    Unauthorized,
    /// `forbidden`
    Forbidden,
    /// `locked`
    Locked,
    /// `protected`
    Protected,
    /// `service_error`
    ServiceError,
    /// Any code not listed above
    Other(String),
}

impl ErrorCode {
    /// Wire representation of the code
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NotFound => "not_found",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::LoadBalancerAlreadyAttached => "load_balancer_already_attached",
            Self::UniquenessError => "uniqueness_error",
            Self::Conflict => "conflict",
            Self::InvalidInput => "invalid_input",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Locked => "locked",
            Self::Protected => "protected",
            Self::ServiceError => "service_error",
            Self::Other(code) => code,
        }
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        match code {
            "not_found" => Self::NotFound,
            "rate_limit_exceeded" => Self::RateLimitExceeded,
            "load_balancer_already_attached" => Self::LoadBalancerAlreadyAttached,
            "uniqueness_error" => Self::UniquenessError,
            "conflict" => Self::Conflict,
            "invalid_input" => Self::InvalidInput,
            "unauthorized" => Self::Unauthorized,
            "forbidden" => Self::Forbidden,
            "locked" => Self::Locked,
            "protected" => Self::Protected,
            "service_error" => Self::ServiceError,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur when interacting with the Hetzner Cloud API
#[derive(Debug, Error)]
pub enum HCloudError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with an error object
    #[error("hcloud API error ({code}): {message}")]
    Api {
        /// Classified `error.code`
        code: ErrorCode,
        /// Human readable `error.message`
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid request (e.g., missing required fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A label selector could not be parsed
    #[error("Invalid label selector: {0}")]
    InvalidSelector(String),
}

impl HCloudError {
    /// Build an API error from a code and message
    pub fn api(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// The API error code, if this is an API error
    #[must_use]
    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// True if the API reported `not_found`
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code() == Some(&ErrorCode::NotFound)
    }

    /// True if the API reported `rate_limit_exceeded`
    #[must_use]
    pub fn is_rate_limit(&self) -> bool {
        self.code() == Some(&ErrorCode::RateLimitExceeded)
    }

    /// True if the API reported `load_balancer_already_attached`
    #[must_use]
    pub fn is_already_attached(&self) -> bool {
        self.code() == Some(&ErrorCode::LoadBalancerAlreadyAttached)
    }
}
