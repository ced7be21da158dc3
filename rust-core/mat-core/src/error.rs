//! # Error Handling
//!
//! Centralized error types for mat core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Three failure families reach the caller of a handler:
//!
//! - **decode**: a bound field could not be converted, the body failed to read
//!   or parse, or the hydration hook rejected the request
//! - **handler**: the business function reported failure
//! - **write**: the typed result could not be serialized into the response

use crate::source::SourceKind;
use thiserror::Error;

/// Boxed error used for business-function and body-stream failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for mat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the mat runtime
#[derive(Error, Debug)]
pub enum Error {
    /// A bound field failed value conversion
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The request body could not be parsed into the request value
    #[error("Invalid request body: {reason}")]
    InvalidBody {
        /// Parser diagnostic
        reason: String,
    },

    /// Reading the request body stream failed
    #[error("Failed to read request body: {0}")]
    Body(#[source] BoxError),

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
    },

    /// The body carries a content type no reader understands
    #[error("Unsupported media type: {content_type}")]
    UnsupportedMediaType {
        /// Offending `Content-Type` value
        content_type: String,
    },

    /// The business function itself failed
    #[error("Handler failed: {0}")]
    Handler(#[source] BoxError),

    /// Serializing or writing the response failed
    #[error("Failed to write response: {reason}")]
    Write {
        /// Serializer diagnostic
        reason: String,
    },

    /// Context hydration hook failed
    #[error("Context hydration failed: {0}")]
    Hydrate(#[source] BoxError),

    /// Router failed to match the requested path
    #[error("No route found for {method} {path}")]
    RouteNotFound {
        /// Request method
        method: String,
        /// The path that wasn't matched
        path: String,
    },

    /// Invalid route pattern provided
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },
}

impl Error {
    /// Whether the failure happened while turning the request into a typed value
    ///
    /// These are the failures answered with `400 Bad Request`.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::InvalidBody { .. } | Self::Hydrate(_) | Self::Body(_)
        )
    }
}

/// A raw value that could not be converted into the field's type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot convert '{raw}' to {expected}")]
pub struct ConversionError {
    /// Raw input as it appeared in the source
    pub raw: String,
    /// Human-readable name of the expected type
    pub expected: String,
}

impl ConversionError {
    /// Create a conversion error for `raw` expected to be `expected`
    pub fn new(raw: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            expected: expected.into(),
        }
    }
}

/// Field-level decode failure with enough context for diagnostics
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{source_kind} key '{key}' for field '{field}': cannot convert '{raw}' to {expected}")]
pub struct DecodeError {
    /// Source the value came from
    pub source_kind: SourceKind,
    /// Key within the source
    pub key: String,
    /// Dotted path of the target field
    pub field: String,
    /// Raw input value
    pub raw: String,
    /// Human-readable name of the expected type
    pub expected: String,
}

impl DecodeError {
    /// Attach binding context to a conversion failure
    #[must_use]
    pub fn from_conversion(
        source_kind: SourceKind,
        key: &str,
        field: &str,
        err: ConversionError,
    ) -> Self {
        Self {
            source_kind,
            key: key.to_string(),
            field: field.to_string(),
            raw: err.raw,
            expected: err.expected,
        }
    }
}
