//! Error types for Hermes.
//!
//! [`DispatchError`] is the error every dispatch front, middleware and
//! operation speaks. Each variant belongs to an [`ErrorCategory`] which fixes
//! its HTTP status code and decides whether the message may be shown to the
//! caller.

use http::StatusCode;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`DispatchError`].
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Message surfaced to callers for internal failures.
pub const INTERNAL_MESSAGE: &str = "Internal server error";

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Startup defects: unresolved middleware, missing secrets.
    Configuration,
    /// Unknown unit, operation or verb.
    Routing,
    /// Input failed schema validation.
    Validation,
    /// Missing or invalid credentials.
    Authentication,
    /// Role or ownership check failed.
    Authorization,
    /// Referenced entity is absent.
    NotFound,
    /// Entity already exists.
    Conflict,
    /// Unexpected failure in a middleware or operation.
    Internal,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::Routing | Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Configuration | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` when messages of this category are safe to show callers.
    #[must_use]
    pub const fn is_client_visible(&self) -> bool {
        !matches!(self, Self::Configuration | Self::Internal)
    }
}

/// Standard error type for Hermes.
///
/// # Example
///
/// ```
/// use hermes_core::{DispatchError, ErrorCategory};
///
/// fn require_name(name: &str) -> Result<(), DispatchError> {
///     if name.is_empty() {
///         return Err(DispatchError::validation("name is required"));
///     }
///     Ok(())
/// }
///
/// let err = require_name("").unwrap_err();
/// assert_eq!(err.category(), ErrorCategory::Validation);
/// ```
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Fatal startup defect.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Human-readable error message.
        message: String,
    },

    /// Unknown unit, operation or verb.
    #[error("Routing error: {message}")]
    Routing {
        /// Human-readable error message.
        message: String,
    },

    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable error message.
        message: String,
        /// Field-specific validation errors.
        #[source]
        field_errors: Option<FieldErrors>,
    },

    /// Authentication failed.
    #[error("Authentication error: {message}")]
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// Authorization denied.
    #[error("Authorization denied: {message}")]
    Authorization {
        /// Human-readable error message.
        message: String,
    },

    /// Resource not found.
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
        /// The type of resource that was not found.
        resource_type: Option<String>,
        /// The identifier of the resource.
        resource_id: Option<String>,
    },

    /// Conflicting entity.
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable error message.
        message: String,
    },

    /// Internal error. The message and source are logged, never returned.
    #[error("Internal error: {message}")]
    Internal {
        /// Message for logs.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl DispatchError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a routing error.
    #[must_use]
    pub fn routing(message: impl Into<String>) -> Self {
        Self::Routing {
            message: message.into(),
        }
    }

    /// Routing error for an unknown unit.
    #[must_use]
    pub fn unit_not_found(unit: &str) -> Self {
        Self::routing(format!("Module {unit} not found"))
    }

    /// Routing error for an operation the unit does not expose under a verb.
    #[must_use]
    pub fn operation_not_found(unit: &str, operation: &str) -> Self {
        Self::routing(format!("Method {operation} not found for {unit}"))
    }

    /// Creates a validation error with a message.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: None,
        }
    }

    /// Creates a validation error with field-specific errors.
    #[must_use]
    pub fn validation_with_fields(message: impl Into<String>, field_errors: FieldErrors) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: Some(field_errors),
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates an authorization error.
    #[must_use]
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            resource_type: None,
            resource_id: None,
        }
    }

    /// Creates a not found error naming the resource and its id.
    #[must_use]
    pub fn not_found_resource(
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        let resource_type = resource_type.into();
        let resource_id = resource_id.into();
        Self::NotFound {
            message: format!("{resource_type} with ID {resource_id} not found"),
            resource_type: Some(resource_type),
            resource_id: Some(resource_id),
        }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Routing { .. } => ErrorCategory::Routing,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Authorization { .. } => ErrorCategory::Authorization,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }

    /// The bare message, without the category prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Configuration { message }
            | Self::Routing { message }
            | Self::Validation { message, .. }
            | Self::Authentication { message }
            | Self::Authorization { message }
            | Self::NotFound { message, .. }
            | Self::Conflict { message }
            | Self::Internal { message, .. } => message,
        }
    }

    /// The message a caller is allowed to see.
    ///
    /// Internal and configuration errors collapse to a generic message.
    #[must_use]
    pub fn client_message(&self) -> &str {
        if self.category().is_client_visible() {
            self.message()
        } else {
            INTERNAL_MESSAGE
        }
    }

    /// Field errors flattened to `"field: message"` strings.
    #[must_use]
    pub fn field_messages(&self) -> Vec<String> {
        match self {
            Self::Validation {
                field_errors: Some(errors),
                ..
            } => errors.to_messages(),
            _ => Vec::new(),
        }
    }
}

/// Field-specific validation errors, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("Field validation errors")]
pub struct FieldErrors {
    /// Map of field path to list of error messages.
    pub fields: IndexMap<String, Vec<String>>,
}

impl FieldErrors {
    /// Creates a new empty `FieldErrors`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an error for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Returns `true` if there are no field errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of fields with errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// One `"field: message"` entry per recorded error.
    #[must_use]
    pub fn to_messages(&self) -> Vec<String> {
        self.fields
            .iter()
            .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{field}: {m}")))
            .collect()
    }
}
