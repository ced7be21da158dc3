//! # Field Bindings
//!
//! Compile-time binding tables that map source keys onto request-value fields.
//!
//! A request type lists its bindings once per source kind, either through
//! `#[derive(Bind)]` or by hand with [`BindingTable`]. The resulting
//! [`Descriptor`] is immutable and shared by every request for that type.
//!
//! ```ignore
//! #[derive(Default, Deserialize, Bind)]
//! struct GetUser {
//!     #[bind(path = "id")]
//!     id: i64,
//!     #[bind(query = "fields")]
//!     fields: Vec<String>,
//!     #[bind(header = "X-Tenant")]
//!     tenant: String,
//! }
//! ```

use crate::context::Context;
use crate::convert::{DecodeSource, FromSource, Rule, ScalarKind};
use crate::error::{BoxError, ConversionError, DecodeError};
use crate::source::{Source, SourceKind};
use std::fmt;

type ApplyFn<T> = Box<dyn Fn(&mut T, &dyn Source, &str) -> Result<(), ConversionError> + Send + Sync>;

/// A request value that can be populated from request sources
pub trait Bind: Default + Send + 'static {
    /// Field bindings declared for `kind`, in declaration order
    ///
    /// Called at most once per source kind per process; see [`crate::cache`].
    fn bindings(kind: SourceKind) -> Vec<FieldBinding<Self>>;

    /// Hydration hook run after field decoding
    ///
    /// # Errors
    ///
    /// Any error aborts the decode pipeline.
    fn hydrate(&mut self, _c: &Context) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Request values that pull what they need straight from the context
///
/// `#[derive(Bind)]` picks up an implementation automatically and runs it as
/// the type's [`Bind::hydrate`] hook.
pub trait ContextAware {
    /// Populate `self` from the request context
    ///
    /// # Errors
    ///
    /// Any error aborts the decode pipeline.
    fn with_context(&mut self, c: &Context) -> Result<(), BoxError>;
}

/// Hook dispatch used by `#[derive(Bind)]`
///
/// `Hydrator(value).hydrate(c)` resolves to [`ContextAware::with_context`]
/// when `T` implements it, and to a no-op otherwise.
#[doc(hidden)]
pub mod dispatch {
    use super::ContextAware;
    use crate::context::Context;
    use crate::error::BoxError;

    pub struct Hydrator<'a, T>(pub &'a mut T);

    pub trait ViaContextAware {
        fn hydrate(self, c: &Context) -> Result<(), BoxError>;
    }

    impl<T: ContextAware> ViaContextAware for Hydrator<'_, T> {
        fn hydrate(self, c: &Context) -> Result<(), BoxError> {
            self.0.with_context(c)
        }
    }

    pub trait ViaNoop {
        fn hydrate(self, c: &Context) -> Result<(), BoxError>;
    }

    impl<T> ViaNoop for &Hydrator<'_, T> {
        fn hydrate(self, _c: &Context) -> Result<(), BoxError> {
            Ok(())
        }
    }
}

/// One source key mapped onto one field of `T`
pub struct FieldBinding<T> {
    key: String,
    field: String,
    rule: Rule,
    apply: ApplyFn<T>,
}

impl<T: 'static> FieldBinding<T> {
    /// Bind `key` to the field reached through `locate`, converted by `F`
    pub fn new<F: FromSource + 'static>(
        key: impl Into<String>,
        field: impl Into<String>,
        locate: fn(&mut T) -> &mut F,
    ) -> Self {
        Self {
            key: key.into(),
            field: field.into(),
            rule: F::RULE,
            apply: Box::new(move |target: &mut T, source: &dyn Source, key: &str| {
                if let Some(value) = F::from_source(source, key)? {
                    *locate(target) = value;
                }
                Ok(())
            }),
        }
    }

    /// Bind `key` to a field that decodes itself through [`DecodeSource`]
    pub fn delegate<F: DecodeSource + 'static>(
        key: impl Into<String>,
        field: impl Into<String>,
        locate: fn(&mut T) -> &mut F,
    ) -> Self {
        Self {
            key: key.into(),
            field: field.into(),
            rule: Rule::scalar(ScalarKind::Custom),
            apply: Box::new(move |target: &mut T, source: &dyn Source, key: &str| {
                locate(target).decode_source(source, key)
            }),
        }
    }

    /// Lift this binding into an outer type that embeds `T` at `prefix`
    pub fn nest<O: 'static>(self, prefix: &str, locate: fn(&mut O) -> &mut T) -> FieldBinding<O> {
        let inner = self.apply;
        FieldBinding {
            key: self.key,
            field: format!("{prefix}.{}", self.field),
            rule: self.rule,
            apply: Box::new(move |target: &mut O, source: &dyn Source, key: &str| {
                inner(locate(target), source, key)
            }),
        }
    }
}

impl<T> FieldBinding<T> {
    /// Key looked up in the source
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Dotted path of the target field
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Conversion rule
    #[must_use]
    pub const fn rule(&self) -> Rule {
        self.rule
    }
}

impl<T> fmt::Debug for FieldBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("key", &self.key)
            .field("field", &self.field)
            .field("rule", &self.rule)
            .finish_non_exhaustive()
    }
}

/// Builder collecting the bindings of one type for one source kind
///
/// Entries declared for other source kinds are ignored, so the same
/// declaration list can be replayed for every kind.
pub struct BindingTable<T> {
    kind: SourceKind,
    bindings: Vec<FieldBinding<T>>,
}

impl<T: 'static> BindingTable<T> {
    /// Start a table for `kind`
    #[must_use]
    pub const fn for_source(kind: SourceKind) -> Self {
        Self {
            kind,
            bindings: Vec::new(),
        }
    }

    /// Declare a converted field
    #[must_use]
    pub fn field<F: FromSource + 'static>(
        mut self,
        source: SourceKind,
        key: &str,
        field: &str,
        locate: fn(&mut T) -> &mut F,
    ) -> Self {
        if source == self.kind {
            self.bindings.push(FieldBinding::new(key, field, locate));
        }
        self
    }

    /// Declare a self-decoding field
    #[must_use]
    pub fn delegate<F: DecodeSource + 'static>(
        mut self,
        source: SourceKind,
        key: &str,
        field: &str,
        locate: fn(&mut T) -> &mut F,
    ) -> Self {
        if source == self.kind {
            self.bindings.push(FieldBinding::delegate(key, field, locate));
        }
        self
    }

    /// Pull in the bindings of an embedded [`Bind`] type
    #[must_use]
    pub fn flatten<U: Bind>(mut self, field: &str, locate: fn(&mut T) -> &mut U) -> Self {
        self.bindings.extend(
            U::bindings(self.kind)
                .into_iter()
                .map(|b| b.nest(field, locate)),
        );
        self
    }

    /// Finish the table
    #[must_use]
    pub fn build(self) -> Vec<FieldBinding<T>> {
        self.bindings
    }
}

/// Immutable, ordered bindings of one type for one source kind
pub struct Descriptor<T> {
    kind: SourceKind,
    bindings: Vec<FieldBinding<T>>,
}

impl<T> Descriptor<T> {
    /// Build a descriptor; `None` when no field binds to `kind`
    #[must_use]
    pub fn new(kind: SourceKind, bindings: Vec<FieldBinding<T>>) -> Option<Self> {
        if bindings.is_empty() {
            None
        } else {
            Some(Self { kind, bindings })
        }
    }

    /// Source kind this descriptor reads
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Bindings in declaration order
    #[must_use]
    pub fn bindings(&self) -> &[FieldBinding<T>] {
        &self.bindings
    }

    /// Apply every binding to `target`, stopping at the first failure
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` naming the field, key and raw value that failed.
    pub fn decode(&self, source: &dyn Source, target: &mut T) -> Result<(), DecodeError> {
        for binding in &self.bindings {
            (binding.apply)(target, source, &binding.key).map_err(|err| {
                DecodeError::from_conversion(self.kind, &binding.key, &binding.field, err)
            })?;
        }
        Ok(())
    }
}

impl<T> fmt::Debug for Descriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("kind", &self.kind)
            .field("bindings", &self.bindings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ParamMap, Params, QueryArgs, QueryMap};

    #[derive(Debug, Default, PartialEq)]
    struct Page {
        number: u32,
        size: u32,
    }

    impl Bind for Page {
        fn bindings(kind: SourceKind) -> Vec<FieldBinding<Self>> {
            BindingTable::for_source(kind)
                .field(SourceKind::Query, "page", "number", |p: &mut Self| &mut p.number)
                .field(SourceKind::Query, "size", "size", |p: &mut Self| &mut p.size)
                .build()
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Listing {
        owner: String,
        page: Page,
        tags: Vec<String>,
    }

    impl Bind for Listing {
        fn bindings(kind: SourceKind) -> Vec<FieldBinding<Self>> {
            BindingTable::for_source(kind)
                .field(SourceKind::Path, "owner", "owner", |l: &mut Self| &mut l.owner)
                .flatten("page", |l: &mut Self| &mut l.page)
                .field(SourceKind::Query, "tag", "tags", |l: &mut Self| &mut l.tags)
                .build()
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Range {
        from: u32,
        to: u32,
    }

    impl DecodeSource for Range {
        fn decode_source(&mut self, source: &dyn Source, key: &str) -> Result<(), ConversionError> {
            let raw = source.get(key);
            if raw.is_empty() {
                return Ok(());
            }
            let (from, to) = raw
                .split_once('-')
                .ok_or_else(|| ConversionError::new(raw, "range"))?;
            self.from = from.parse().map_err(|_| ConversionError::new(raw, "range"))?;
            self.to = to.parse().map_err(|_| ConversionError::new(raw, "range"))?;
            Ok(())
        }
    }

    fn query(pairs: &[(&str, &str)]) -> QueryMap {
        let mut q = QueryMap::new();
        for (k, v) in pairs {
            q.entry((*k).to_string()).or_default().push((*v).to_string());
        }
        q
    }

    #[test]
    fn test_table_filters_by_kind() {
        let path = Listing::bindings(SourceKind::Path);
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].key(), "owner");

        let header = Listing::bindings(SourceKind::Header);
        assert!(header.is_empty());
        assert!(Descriptor::new(SourceKind::Header, header).is_none());
    }

    #[test]
    fn test_flatten_prefixes_field_path() {
        let fields: Vec<_> = Listing::bindings(SourceKind::Query)
            .iter()
            .map(|b| (b.key().to_string(), b.field().to_string(), b.rule().multi))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("page".to_string(), "page.number".to_string(), false),
                ("size".to_string(), "page.size".to_string(), false),
                ("tag".to_string(), "tags".to_string(), true),
            ]
        );
    }

    #[test]
    fn test_descriptor_decode() {
        let q = query(&[("page", "2"), ("size", "50"), ("tag", "a"), ("tag", "b")]);
        let d = Descriptor::new(SourceKind::Query, Listing::bindings(SourceKind::Query)).unwrap();
        let mut v = Listing::default();
        d.decode(&QueryArgs(Some(&q)), &mut v).unwrap();
        assert_eq!(v.page, Page { number: 2, size: 50 });
        assert_eq!(v.tags, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_descriptor_decode_error_context() {
        let q = query(&[("size", "big")]);
        let d = Descriptor::new(SourceKind::Query, Listing::bindings(SourceKind::Query)).unwrap();
        let err = d.decode(&QueryArgs(Some(&q)), &mut Listing::default()).unwrap_err();
        assert_eq!(err.field, "page.size");
        assert_eq!(err.key, "size");
        assert_eq!(err.raw, "big");
        assert_eq!(err.source_kind, SourceKind::Query);
    }

    #[test]
    fn test_delegate_binding() {
        let bindings = vec![FieldBinding::delegate("r", "range", |v: &mut Range| v)];
        let d = Descriptor::new(SourceKind::Param, bindings).unwrap();
        let mut p = ParamMap::new();
        p.insert("r".to_string(), "3-9".to_string());
        let mut v = Range::default();
        d.decode(&Params(Some(&p)), &mut v).unwrap();
        assert_eq!(v, Range { from: 3, to: 9 });
        assert_eq!(d.bindings()[0].rule().kind, ScalarKind::Custom);

        p.insert("r".to_string(), "nine".to_string());
        let err = d.decode(&Params(Some(&p)), &mut v).unwrap_err();
        assert_eq!(err.raw, "nine");
        assert_eq!(err.expected, "range");
    }
}
