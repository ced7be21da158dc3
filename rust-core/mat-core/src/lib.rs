//! # mat Core
//!
//! Request binding and handler adaptation for the mat HTTP toolkit.
//! Turns loosely-typed request data into typed request values, runs typed
//! business functions and writes their typed results back as responses.
//!
//! ## Architecture
//!
//! Bindings are declared at compile time (`#[derive(Bind)]` or
//! [`BindingTable`]) and discovered once per (type, source kind) into a
//! shared descriptor cache. Each adapted handler replays a fixed decode
//! plan over a pooled request value for every request.
//!
//! ## Modules
//!
//! - `source` - Read-only key/value views over request data
//! - `convert` - Scalar and multi-valued conversion rules
//! - `binding` - Field bindings, binding tables and descriptors
//! - `cache` - Process-wide descriptor cache
//! - `pool` - Reusable request-value pool
//! - `context` - Per-request context (request data and response writer)
//! - `decode` - Decode pipeline
//! - `handler` - Handler adapter and response customization
//! - `registry` - Handler diagnostics
//! - `router` - `matchit` registration and dispatch host
//! - `json` - High-performance JSON parsing with simd-json
//! - `validation` - Structured error payloads
//! - `config` - Runtime configuration
//! - `logging` - Tracing subscriber setup
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

extern crate self as mat_core;

pub mod binding;
pub mod cache;
pub mod config;
pub mod context;
pub mod convert;
pub mod decode;
pub mod error;
pub mod handler;
pub mod json;
pub mod logging;
pub mod pool;
pub mod registry;
pub mod router;
pub mod source;
pub mod validation;

pub use binding::{Bind, BindingTable, ContextAware, Descriptor, FieldBinding};
pub use cache::DescriptorCache;
pub use config::{Config, LogFormat};
pub use context::Context;
pub use convert::{DecodeSource, FromSource, Rule, Scalar, ScalarKind};
pub use decode::RequestDecoder;
pub use error::{BoxError, ConversionError, DecodeError, Error, Result};
pub use handler::{adapt, adapt_with_capacity, Endpoint, Handler, Reply, Respond};
pub use json::{parse_json_bytes, to_json_vec};
pub use logging::init_tracing;
pub use mat_macros::Bind;
pub use pool::{Pooled, RequestPool};
pub use registry::{HandlerId, HandlerRegistry};
pub use router::Router;
pub use source::{HeaderFields, ParamMap, Params, QueryArgs, QueryMap, Source, SourceKind};
pub use tokio_util::sync::CancellationToken;
pub use validation::{FieldError, ValidationCode, ValidationErrors};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
