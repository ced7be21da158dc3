//! # Decode Pipeline
//!
//! Turns a request context into a populated request value.
//!
//! The phase plan is chosen once per handler from the descriptors the
//! request type declares, then replayed for every request:
//!
//! 1. body (non-GET/HEAD requests with a non-empty body)
//! 2. path parameters (when the route produced any)
//! 3. query arguments (when the query string is non-empty)
//! 4. header fields
//! 5. synthesized parameters (`ip`: the client address)
//! 6. context hydration
//!
//! A type with no source descriptors decodes the body only and then
//! hydrates. The first failing phase aborts the pipeline.

use crate::binding::{Bind, Descriptor};
use crate::cache::DescriptorCache;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::source::{ParamMap, Params, SourceKind};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::trace;

/// Key of the synthesized client address parameter
pub const CLIENT_IP_PARAM: &str = "ip";

enum Plan<T> {
    BodyOnly,
    Sourced {
        path: Option<Arc<Descriptor<T>>>,
        query: Option<Arc<Descriptor<T>>>,
        header: Option<Arc<Descriptor<T>>>,
        param: Option<Arc<Descriptor<T>>>,
    },
}

/// Per-type decode routine
pub struct RequestDecoder<T> {
    plan: Plan<T>,
}

impl<T: Bind + DeserializeOwned> RequestDecoder<T> {
    /// Build the decoder from the process-wide descriptor cache
    #[must_use]
    pub fn new() -> Self {
        Self::with_cache(DescriptorCache::global())
    }

    /// Build the decoder from a specific cache
    #[must_use]
    pub fn with_cache(cache: &DescriptorCache) -> Self {
        let path = cache.descriptor::<T>(SourceKind::Path);
        let query = cache.descriptor::<T>(SourceKind::Query);
        let header = cache.descriptor::<T>(SourceKind::Header);
        let param = cache.descriptor::<T>(SourceKind::Param);

        let plan = if path.is_none() && query.is_none() && header.is_none() && param.is_none() {
            Plan::BodyOnly
        } else {
            Plan::Sourced {
                path,
                query,
                header,
                param,
            }
        };

        let decoder = Self { plan };
        trace!(
            request_type = std::any::type_name::<T>(),
            phases = ?decoder.phases(),
            "decode plan built"
        );
        decoder
    }

    /// Whether only the body (and hydration) is decoded
    #[must_use]
    pub const fn is_body_only(&self) -> bool {
        matches!(self.plan, Plan::BodyOnly)
    }

    /// Source phases in execution order
    #[must_use]
    pub fn phases(&self) -> Vec<SourceKind> {
        match &self.plan {
            Plan::BodyOnly => Vec::new(),
            Plan::Sourced {
                path,
                query,
                header,
                param,
            } => [path, query, header, param]
                .into_iter()
                .flatten()
                .map(|d| d.kind())
                .collect(),
        }
    }

    /// Run the pipeline against `c`, populating `target`
    ///
    /// # Errors
    ///
    /// Returns the first phase failure: `Error::UnsupportedMediaType` or
    /// `Error::InvalidBody` from the body, `Error::Decode` from a source
    /// phase, `Error::Hydrate` from the hydration hook.
    pub fn decode(&self, c: &Context, target: &mut T) -> Result<()> {
        if c.carries_body() {
            *target = c.read::<T>()?;
        }

        if let Plan::Sourced {
            path,
            query,
            header,
            param,
        } = &self.plan
        {
            if let Some(d) = path {
                if !c.params().is_empty() {
                    d.decode(&c.path_source(), target)?;
                }
            }
            if let Some(d) = query {
                if c.query_string().is_some_and(|q| !q.is_empty()) {
                    d.decode(&c.query_source(), target)?;
                }
            }
            if let Some(d) = header {
                d.decode(&c.header_source(), target)?;
            }
            if let Some(d) = param {
                let mut synthesized = ParamMap::with_capacity(1);
                synthesized.insert(CLIENT_IP_PARAM.to_string(), c.real_ip());
                d.decode(&Params(Some(&synthesized)), target)?;
            }
        }

        target.hydrate(c).map_err(Error::Hydrate)
    }
}

impl<T: Bind + DeserializeOwned> Default for RequestDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for RequestDecoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let plan = match self.plan {
            Plan::BodyOnly => "body-only",
            Plan::Sourced { .. } => "sourced",
        };
        f.debug_struct("RequestDecoder").field("plan", &plan).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingTable, FieldBinding};
    use crate::error::BoxError;
    use hyper::Method;
    use serde::Deserialize;
    use std::net::SocketAddr;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Lookup {
        id: i64,
        page: u32,
        tenant: String,
        ip: String,
        note: String,
        hydrated: u32,
    }

    impl Bind for Lookup {
        fn bindings(kind: SourceKind) -> Vec<FieldBinding<Self>> {
            BindingTable::for_source(kind)
                .field(SourceKind::Path, "id", "id", |v: &mut Self| &mut v.id)
                .field(SourceKind::Query, "page", "page", |v: &mut Self| &mut v.page)
                .field(SourceKind::Header, "X-Tenant", "tenant", |v: &mut Self| &mut v.tenant)
                .field(SourceKind::Param, "ip", "ip", |v: &mut Self| &mut v.ip)
                .build()
        }

        fn hydrate(&mut self, _c: &Context) -> std::result::Result<(), BoxError> {
            self.hydrated += 1;
            Ok(())
        }
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Note {
        text: String,
        hydrated: bool,
    }

    impl Bind for Note {
        fn bindings(_kind: SourceKind) -> Vec<FieldBinding<Self>> {
            Vec::new()
        }

        fn hydrate(&mut self, c: &Context) -> std::result::Result<(), BoxError> {
            if c.header("x-reject").is_some() {
                return Err("rejected".into());
            }
            self.hydrated = true;
            Ok(())
        }
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct SharedKey {
        as_int: i64,
        as_flag: bool,
        as_text: String,
    }

    impl Bind for SharedKey {
        fn bindings(kind: SourceKind) -> Vec<FieldBinding<Self>> {
            BindingTable::for_source(kind)
                .field(SourceKind::Header, "v", "as_text", |s: &mut Self| &mut s.as_text)
                .field(SourceKind::Query, "v", "as_flag", |s: &mut Self| &mut s.as_flag)
                .field(SourceKind::Path, "v", "as_int", |s: &mut Self| &mut s.as_int)
                .build()
        }
    }

    fn peer() -> SocketAddr {
        "10.0.0.1:4000".parse().unwrap()
    }

    #[test]
    fn test_plan_selection() {
        let cache = DescriptorCache::new();
        let sourced = RequestDecoder::<Lookup>::with_cache(&cache);
        assert!(!sourced.is_body_only());
        assert_eq!(
            sourced.phases(),
            vec![SourceKind::Path, SourceKind::Query, SourceKind::Header, SourceKind::Param]
        );

        let body_only = RequestDecoder::<Note>::with_cache(&cache);
        assert!(body_only.is_body_only());
        assert!(body_only.phases().is_empty());
    }

    #[test]
    fn test_all_phases_populate() {
        let decoder = RequestDecoder::<Lookup>::new();
        let c = Context::new(Method::POST, "/items/7?page=3")
            .with_param("id", "7")
            .with_header("X-Tenant", "acme")
            .with_remote_addr(peer())
            .with_body(r#"{"note":"from body"}"#);

        let mut v = Lookup::default();
        decoder.decode(&c, &mut v).unwrap();
        assert_eq!(v.id, 7);
        assert_eq!(v.page, 3);
        assert_eq!(v.tenant, "acme");
        assert_eq!(v.ip, "10.0.0.1");
        assert_eq!(v.note, "from body");
        assert_eq!(v.hydrated, 1);
    }

    #[test]
    fn test_sources_override_body() {
        let decoder = RequestDecoder::<Lookup>::new();
        let c = Context::new(Method::PUT, "/items/9")
            .with_param("id", "9")
            .with_body(r#"{"id":1,"tenant":"body"}"#);

        let mut v = Lookup::default();
        decoder.decode(&c, &mut v).unwrap();
        assert_eq!(v.id, 9);
        assert_eq!(v.tenant, "body");
    }

    #[test]
    fn test_failing_query_stops_before_header() {
        let decoder = RequestDecoder::<Lookup>::new();
        let c = Context::new(Method::GET, "/items/1?page=abc")
            .with_param("id", "1")
            .with_header("X-Tenant", "acme");

        let mut v = Lookup::default();
        let err = decoder.decode(&c, &mut v).unwrap_err();
        match err {
            Error::Decode(d) => {
                assert_eq!(d.source_kind, SourceKind::Query);
                assert_eq!(d.field, "page");
                assert_eq!(d.raw, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(v.id, 1);
        assert_eq!(v.tenant, "");
        assert_eq!(v.hydrated, 0);
    }

    #[test]
    fn test_shared_key_phase_order() {
        let decoder = RequestDecoder::<SharedKey>::new();
        assert_eq!(
            decoder.phases(),
            vec![SourceKind::Path, SourceKind::Query, SourceKind::Header]
        );

        let c = Context::new(Method::GET, "/x/5?v=on")
            .with_param("v", "5")
            .with_header("v", "text");
        let mut v = SharedKey::default();
        decoder.decode(&c, &mut v).unwrap();
        assert_eq!((v.as_int, v.as_flag, v.as_text.as_str()), (5, true, "text"));

        let c = Context::new(Method::GET, "/x/5?v=maybe")
            .with_param("v", "5")
            .with_header("v", "text");
        let mut v = SharedKey::default();
        let err = decoder.decode(&c, &mut v).unwrap_err();
        assert!(matches!(err, Error::Decode(ref d) if d.field == "as_flag"));
        assert_eq!(v.as_int, 5);
        assert_eq!(v.as_text, "");
    }

    #[test]
    fn test_absent_sources_leave_zero_values() {
        let decoder = RequestDecoder::<Lookup>::new();
        let c = Context::new(Method::GET, "/items");
        let mut v = Lookup::default();
        decoder.decode(&c, &mut v).unwrap();
        assert_eq!(v.id, 0);
        assert_eq!(v.page, 0);
        assert_eq!(v.tenant, "");
        assert_eq!(v.ip, "");
        assert_eq!(v.hydrated, 1);
    }

    #[test]
    fn test_body_only_get_without_body() {
        let decoder = RequestDecoder::<Note>::new();
        let c = Context::new(Method::GET, "/notes");
        let mut v = Note::default();
        decoder.decode(&c, &mut v).unwrap();
        assert_eq!(v.text, "");
        assert!(v.hydrated);
    }

    #[test]
    fn test_body_only_decodes_body_then_hydrates() {
        let decoder = RequestDecoder::<Note>::new();
        let c = Context::new(Method::POST, "/notes").with_body(r#"{"text":"hi"}"#);
        let mut v = Note::default();
        decoder.decode(&c, &mut v).unwrap();
        assert_eq!(v.text, "hi");
        assert!(v.hydrated);
    }

    #[test]
    fn test_invalid_body() {
        let decoder = RequestDecoder::<Note>::new();
        let c = Context::new(Method::POST, "/notes").with_body("{not json");
        let err = decoder.decode(&c, &mut Note::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidBody { .. }));
        assert!(err.is_decode());
    }

    #[test]
    fn test_hydration_failure() {
        let decoder = RequestDecoder::<Note>::new();
        let c = Context::new(Method::GET, "/notes").with_header("X-Reject", "1");
        let err = decoder.decode(&c, &mut Note::default()).unwrap_err();
        assert!(matches!(err, Error::Hydrate(_)));
    }
}
