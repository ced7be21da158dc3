//! # Request Data Sources
//!
//! Uniform read-only key/value views over the four shapes of request data
//! a field can bind to.
//!
//! Every adapter borrows externally owned data and tolerates an absent
//! container: lookups on `None` behave exactly like lookups of a missing key.

use hyper::header::HeaderValue;
use hyper::HeaderMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Parsed query arguments, multi-valued and in arrival order per key
pub type QueryMap = HashMap<String, Vec<String>>;

/// Single-valued parameters (routed path parameters, synthesized values)
pub type ParamMap = HashMap<String, String>;

/// Category of request-derived key/value data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Routed path parameters
    Path,
    /// Query string arguments
    Query,
    /// Request header fields
    Header,
    /// Values synthesized per request (e.g. the client address)
    Param,
}

impl SourceKind {
    /// All source kinds in decode order
    pub const ALL: [Self; 4] = [Self::Path, Self::Query, Self::Header, Self::Param];

    /// Declaration name used in `#[bind(...)]`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Param => "param",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only key/value view over one kind of request data
pub trait Source {
    /// First value for `key`, or `""` when the key is absent
    fn get(&self, key: &str) -> &str;

    /// All values for `key` in order, empty when the key is absent
    fn values(&self, key: &str) -> Vec<&str>;
}

/// Query argument view
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryArgs<'a>(pub Option<&'a QueryMap>);

impl Source for QueryArgs<'_> {
    fn get(&self, key: &str) -> &str {
        self.0
            .and_then(|m| m.get(key))
            .and_then(|vs| vs.first())
            .map_or("", String::as_str)
    }

    fn values(&self, key: &str) -> Vec<&str> {
        self.0
            .and_then(|m| m.get(key))
            .map(|vs| vs.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// Header field view
///
/// Lookups are case-insensitive, following header name canonicalization.
/// Values are read as UTF-8 so `obs-text` bytes survive; values that are
/// not valid UTF-8 are skipped, and `get` returns the first readable value.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderFields<'a>(pub Option<&'a HeaderMap>);

fn utf8(value: &HeaderValue) -> Option<&str> {
    std::str::from_utf8(value.as_bytes()).ok()
}

impl Source for HeaderFields<'_> {
    fn get(&self, key: &str) -> &str {
        self.0
            .and_then(|h| h.get_all(key).iter().find_map(utf8))
            .unwrap_or("")
    }

    fn values(&self, key: &str) -> Vec<&str> {
        self.0
            .map(|h| h.get_all(key).iter().filter_map(utf8).collect())
            .unwrap_or_default()
    }
}

/// Single-valued parameter view, used for path and synthesized parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct Params<'a>(pub Option<&'a ParamMap>);

impl Source for Params<'_> {
    fn get(&self, key: &str) -> &str {
        self.0.and_then(|m| m.get(key)).map_or("", String::as_str)
    }

    fn values(&self, key: &str) -> Vec<&str> {
        self.0
            .and_then(|m| m.get(key))
            .map(|v| vec![v.as_str()])
            .unwrap_or_default()
    }
}
