//! # Validation Module
//!
//! Structured error payloads for requests rejected before the handler ran.
//!
//! A [`DecodeError`] becomes a [`FieldError`] naming the field, the source
//! it was read from and the offending raw value; the router serializes the
//! collection as the body of a `400 Bad Request`.

use crate::error::{DecodeError, Error};
use crate::source::SourceKind;
use serde::Serialize;
use std::collections::HashMap;

/// Error code for categorizing validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    /// Value could not be converted to the field's type
    InvalidType,
    /// Body is not well-formed
    InvalidFormat,
    /// Body content type is not understood
    UnsupportedMediaType,
    /// Custom validation failed
    Custom,
}

/// A single validation error for a specific field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field path (e.g., "id", "page.number")
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Machine-readable error code
    pub code: ValidationCode,
    /// Source the value came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceKind>,
    /// Raw input that was rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl FieldError {
    /// Create a new field error
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: ValidationCode) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
            source: None,
            value: None,
        }
    }

    /// Create an "invalid type" error
    pub fn invalid_type(field: impl Into<String>, expected: &str) -> Self {
        let field_str = field.into();
        Self::new(
            field_str.clone(),
            format!("{field_str} must be {expected}"),
            ValidationCode::InvalidType,
        )
    }

    /// Attach the source the value came from
    #[must_use]
    pub const fn with_source(mut self, source: SourceKind) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach the rejected raw value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl From<&DecodeError> for FieldError {
    fn from(err: &DecodeError) -> Self {
        Self::invalid_type(err.field.as_str(), &err.expected)
            .with_source(err.source_kind)
            .with_value(err.raw.as_str())
    }
}

/// Collection of validation errors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    /// List of field-level errors
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty error collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload for a request-decoding failure; `None` for other errors
    #[must_use]
    pub fn from_error(err: &Error) -> Option<Self> {
        let field_error = match err {
            Error::Decode(d) => FieldError::from(d),
            Error::InvalidBody { reason } => {
                FieldError::new("body", reason.as_str(), ValidationCode::InvalidFormat)
            }
            Error::UnsupportedMediaType { content_type } => FieldError::new(
                "body",
                format!("unsupported content type {content_type}"),
                ValidationCode::UnsupportedMediaType,
            ),
            _ => return None,
        };
        let mut errors = Self::new();
        errors.add(field_error);
        Some(errors)
    }

    /// Add a field error
    pub fn add(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Check if there are any errors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Group errors by field
    #[must_use]
    pub fn by_field(&self) -> HashMap<String, Vec<&FieldError>> {
        let mut map: HashMap<String, Vec<&FieldError>> = HashMap::new();
        for error in &self.errors {
            map.entry(error.field.clone()).or_default().push(error);
        }
        map
    }
}
