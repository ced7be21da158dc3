//! # mat Macros
//!
//! Procedural macros for mat request binding.
//!
//! Provides `#[derive(Bind)]`, which turns field declarations into the
//! compile-time binding table consumed by `mat_core`'s descriptor cache.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod bind_derive;

/// Derives `mat_core::Bind` for a struct.
///
/// # Attributes
///
/// Field-level only; a `#[bind]` on the struct itself is rejected.
///
///
/// - `#[bind(path = "key")]` - Bind a routed path parameter
/// - `#[bind(query = "key")]` - Bind a query argument
/// - `#[bind(header = "Key")]` - Bind a header field (case-insensitive)
/// - `#[bind(param = "key")]` - Bind a synthesized parameter (`ip` is the client address)
/// - `#[bind(delegate)]` - Decode the field through its `DecodeSource` impl
/// - `#[bind(flatten)]` - Pull in the bindings of a nested `Bind` type
///
/// A field may bind to several sources; later phases overwrite earlier ones
/// when more than one source carries a value.
///
/// If the type implements `mat_core::ContextAware`, the generated `hydrate`
/// hook calls it after field decoding; otherwise the hook does nothing.
///
/// # Example
///
/// ```ignore
/// use mat_core::Bind;
///
/// #[derive(Default, Deserialize, Bind)]
/// #[serde(default)]
/// struct ListOrders {
///     #[bind(path = "customer")]
///     customer_id: u64,
///
///     #[bind(query = "status")]
///     statuses: Vec<String>,
///
///     #[bind(header = "X-Request-Id")]
///     request_id: Option<String>,
///
///     #[bind(param = "ip")]
///     client_ip: String,
///
///     #[bind(flatten)]
///     page: Pagination,
/// }
/// ```
///
/// This generates:
///
/// ```ignore
/// impl mat_core::Bind for ListOrders {
///     fn bindings(kind: mat_core::SourceKind) -> Vec<mat_core::FieldBinding<Self>> {
///         mat_core::BindingTable::<Self>::for_source(kind)
///             .field(mat_core::SourceKind::Path, "customer", "customer_id", |v: &mut Self| &mut v.customer_id)
///             .field(mat_core::SourceKind::Query, "status", "statuses", |v: &mut Self| &mut v.statuses)
///             .field(mat_core::SourceKind::Header, "X-Request-Id", "request_id", |v: &mut Self| &mut v.request_id)
///             .field(mat_core::SourceKind::Param, "ip", "client_ip", |v: &mut Self| &mut v.client_ip)
///             .flatten("page", |v: &mut Self| &mut v.page)
///             .build()
///     }
///
///     fn hydrate(&mut self, c: &mat_core::Context) -> Result<(), mat_core::BoxError> {
///         // forwards to `ContextAware::with_context` when implemented
///     }
/// }
/// ```
#[proc_macro_derive(Bind, attributes(bind))]
pub fn derive_bind(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    bind_derive::derive_bind_impl(&input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
