//! # Handler Adapter
//!
//! Wraps typed business functions into the uniform [`Handler`] contract.
//!
//! ```ignore
//! async fn get_user(_cancel: CancellationToken, req: GetUser) -> Result<User, BoxError> {
//!     Ok(User { id: req.id, name: "mat".into() })
//! }
//!
//! let registry = HandlerRegistry::new();
//! let handler = adapt(&registry, get_user);
//! handler.call(&mut context).await?;
//! ```
//!
//! Per invocation the adapter checks out a pooled request value, runs the
//! decode pipeline, calls the business function, applies the output's
//! [`Respond`] customizations and writes the output as JSON.

use crate::binding::Bind;
use crate::context::Context;
use crate::decode::RequestDecoder;
use crate::error::{BoxError, Error, Result};
use crate::pool::{RequestPool, DEFAULT_POOL_CAPACITY};
use crate::registry::{HandlerId, HandlerRegistry};
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Boxed future returned by [`Endpoint::call`]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Response customization capability
///
/// Both hooks are optional. Headers are merged into the response (first
/// value per name) and the status is applied before the body is written.
pub trait Respond: Serialize + Send {
    /// Status code to send instead of `200 OK`
    fn status_code(&self) -> Option<StatusCode> {
        None
    }

    /// Extra response headers
    fn headers(&self) -> Option<&HeaderMap> {
        None
    }
}

impl Respond for String {}
impl Respond for &'static str {}
impl Respond for serde_json::Value {}
impl<T: Serialize + Send> Respond for Vec<T> {}
impl<T: Serialize + Send> Respond for Option<T> {}

/// Output wrapper carrying an explicit status and headers
///
/// Serializes as its body.
#[derive(Debug, Clone)]
pub struct Reply<T> {
    body: T,
    status: Option<StatusCode>,
    headers: HeaderMap,
}

impl<T> Reply<T> {
    /// Wrap `body` without customization
    pub fn new(body: T) -> Self {
        Self {
            body,
            status: None,
            headers: HeaderMap::new(),
        }
    }

    /// Wrap `body` with `201 Created`
    pub fn created(body: T) -> Self {
        Self::new(body).with_status(StatusCode::CREATED)
    }

    /// Set the response status
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Add a response header
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Wrapped body
    pub const fn body(&self) -> &T {
        &self.body
    }

    /// Unwrap the body
    pub fn into_body(self) -> T {
        self.body
    }
}

impl<T: Serialize> Serialize for Reply<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.body.serialize(serializer)
    }
}

impl<T: Serialize + Send> Respond for Reply<T> {
    fn status_code(&self) -> Option<StatusCode> {
        self.status
    }

    fn headers(&self) -> Option<&HeaderMap> {
        if self.headers.is_empty() {
            None
        } else {
            Some(&self.headers)
        }
    }
}

/// Uniform dispatch contract: context in, completion out
pub trait Endpoint: Send + Sync {
    /// Handle one request
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, Result<()>>;
}

/// An adapted handler
#[derive(Clone)]
pub struct Handler {
    id: HandlerId,
    endpoint: Arc<dyn Endpoint>,
}

impl Handler {
    /// Wrap an endpoint, recording `name` in `registry`
    pub fn new(registry: &HandlerRegistry, name: &'static str, endpoint: impl Endpoint + 'static) -> Self {
        Self {
            id: registry.register(name),
            endpoint: Arc::new(endpoint),
        }
    }

    /// Identity recorded in the registry
    #[must_use]
    pub const fn id(&self) -> HandlerId {
        self.id
    }

    /// Handle one request
    ///
    /// # Errors
    ///
    /// Returns decode, handler or write failures; see [`Error`].
    pub async fn call(&self, c: &mut Context) -> Result<()> {
        self.endpoint.call(c).await
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("id", &self.id).finish_non_exhaustive()
    }
}

struct Adapted<T, F> {
    name: &'static str,
    pool: Arc<RequestPool<T>>,
    decoder: RequestDecoder<T>,
    func: F,
}

impl<T, F, Fut, O, E> Endpoint for Adapted<T, F>
where
    T: Bind + DeserializeOwned,
    F: Fn(CancellationToken, T) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<O, E>> + Send,
    O: Respond,
    E: Into<BoxError>,
{
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let request = {
                let mut slot = self.pool.checkout();
                if let Err(err) = self.decoder.decode(c, &mut slot) {
                    debug!(handler = self.name, error = %err, "request decode failed");
                    return Err(err);
                }
                slot.take()
            };

            let output = match (self.func)(c.cancellation().clone(), request).await {
                Ok(output) => output,
                Err(err) => {
                    let err = err.into();
                    warn!(handler = self.name, error = %err, "handler failed");
                    return Err(Error::Handler(err));
                }
            };

            respond(c, &output)
        })
    }
}

/// Apply the output's customizations, then write it
fn respond<O: Respond>(c: &mut Context, output: &O) -> Result<()> {
    if let Some(headers) = output.headers() {
        let target = c.response_headers_mut();
        for name in headers.keys() {
            if let Some(value) = headers.get(name) {
                target.append(name.clone(), value.clone());
            }
        }
    }
    if let Some(status) = output.status_code() {
        c.set_status(status);
    }
    c.write(output)
}

/// Adapt a business function with the default pool capacity
pub fn adapt<T, F, Fut, O, E>(registry: &HandlerRegistry, func: F) -> Handler
where
    T: Bind + DeserializeOwned,
    F: Fn(CancellationToken, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<O, E>> + Send + 'static,
    O: Respond + 'static,
    E: Into<BoxError> + 'static,
{
    adapt_with_capacity(registry, DEFAULT_POOL_CAPACITY, func)
}

/// Adapt a business function keeping at most `capacity` idle request values
pub fn adapt_with_capacity<T, F, Fut, O, E>(
    registry: &HandlerRegistry,
    capacity: usize,
    func: F,
) -> Handler
where
    T: Bind + DeserializeOwned,
    F: Fn(CancellationToken, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<O, E>> + Send + 'static,
    O: Respond + 'static,
    E: Into<BoxError> + 'static,
{
    let name = std::any::type_name::<F>();
    let adapted = Adapted {
        name,
        pool: RequestPool::new(capacity),
        decoder: RequestDecoder::<T>::new(),
        func,
    };
    Handler::new(registry, name, adapted)
}
