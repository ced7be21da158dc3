//! # Router
//!
//! Radix-trie based registration and dispatch host using `matchit`.
//!
//! The router is the place adapted handlers register themselves. It owns
//! the [`HandlerRegistry`] and the [`Config`], matches `(method, path)` to a
//! [`Handler`], builds the request [`Context`] and turns failures into
//! HTTP responses:
//!
//! | failure                          | status |
//! |----------------------------------|--------|
//! | decode (field, body, hydration)  | 400    |
//! | body over `max_body_size`        | 413    |
//! | unsupported body content type    | 415    |
//! | no matching route                | 404    |
//! | handler or response write        | 500    |

use crate::binding::Bind;
use crate::config::Config;
use crate::context::Context;
use crate::error::{BoxError, Error, Result};
use crate::handler::{adapt_with_capacity, Handler, Respond};
use crate::registry::{HandlerId, HandlerRegistry};
use crate::source::ParamMap;
use crate::validation::ValidationErrors;
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use matchit::Router as MatchitRouter;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Handler matched for a request, with its path parameters
#[derive(Debug)]
pub struct Match {
    /// Matched handler
    pub handler: Handler,
    /// Extracted path parameters
    pub params: ParamMap,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

/// HTTP router using one radix trie per method
#[derive(Clone)]
pub struct Router {
    method_routes: HashMap<Method, MatchitRouter<Handler>>,
    registry: Arc<HandlerRegistry>,
    config: Config,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a new empty router with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new empty router
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self {
            method_routes: HashMap::new(),
            registry: Arc::new(HandlerRegistry::new()),
            config,
        }
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Install the global tracing subscriber in the configured log format
    ///
    /// Returns `false` when a global subscriber was already installed.
    pub fn init_tracing(&self) -> bool {
        crate::logging::init_tracing(self.config.log_format)
    }

    /// Diagnostic registry of every handler adapted through this router
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Adapt `func` and register it for `method` and `path`
    ///
    /// Path parameters use `matchit` syntax: `/users/{id}`, `/files/{*path}`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed or conflicts
    /// with an existing route.
    pub fn route<T, F, Fut, O, E>(&mut self, method: Method, path: &str, func: F) -> Result<HandlerId>
    where
        T: Bind + DeserializeOwned,
        F: Fn(CancellationToken, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<O, E>> + Send + 'static,
        O: Respond + 'static,
        E: Into<BoxError> + 'static,
    {
        let handler = adapt_with_capacity(&self.registry, self.config.pool_capacity, func);
        self.route_handler(method, path, handler)
    }

    /// Register an already adapted handler
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed or conflicts
    /// with an existing route.
    pub fn route_handler(&mut self, method: Method, path: &str, handler: Handler) -> Result<HandlerId> {
        let id = handler.id();
        self.method_routes
            .entry(method)
            .or_default()
            .insert(path, handler)
            .map_err(|e| Error::InvalidRoutePattern {
                pattern: path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(id)
    }

    /// Match a request path against registered routes
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` if no matching route exists
    pub fn match_route(&self, method: &Method, path: &str) -> Result<Match> {
        let not_found = || Error::RouteNotFound {
            method: method.to_string(),
            path: path.to_string(),
        };

        let matched = self
            .method_routes
            .get(method)
            .ok_or_else(not_found)?
            .at(path)
            .map_err(|_| not_found())?;

        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Ok(Match {
            handler: matched.value.clone(),
            params,
        })
    }

    /// Convenience method to add a GET route
    ///
    /// # Errors
    ///
    /// See [`Router::route`].
    pub fn get<T, F, Fut, O, E>(&mut self, path: &str, func: F) -> Result<HandlerId>
    where
        T: Bind + DeserializeOwned,
        F: Fn(CancellationToken, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<O, E>> + Send + 'static,
        O: Respond + 'static,
        E: Into<BoxError> + 'static,
    {
        self.route(Method::GET, path, func)
    }

    /// Convenience method to add a POST route
    ///
    /// # Errors
    ///
    /// See [`Router::route`].
    pub fn post<T, F, Fut, O, E>(&mut self, path: &str, func: F) -> Result<HandlerId>
    where
        T: Bind + DeserializeOwned,
        F: Fn(CancellationToken, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<O, E>> + Send + 'static,
        O: Respond + 'static,
        E: Into<BoxError> + 'static,
    {
        self.route(Method::POST, path, func)
    }

    /// Convenience method to add a PUT route
    ///
    /// # Errors
    ///
    /// See [`Router::route`].
    pub fn put<T, F, Fut, O, E>(&mut self, path: &str, func: F) -> Result<HandlerId>
    where
        T: Bind + DeserializeOwned,
        F: Fn(CancellationToken, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<O, E>> + Send + 'static,
        O: Respond + 'static,
        E: Into<BoxError> + 'static,
    {
        self.route(Method::PUT, path, func)
    }

    /// Convenience method to add a DELETE route
    ///
    /// # Errors
    ///
    /// See [`Router::route`].
    pub fn delete<T, F, Fut, O, E>(&mut self, path: &str, func: F) -> Result<HandlerId>
    where
        T: Bind + DeserializeOwned,
        F: Fn(CancellationToken, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<O, E>> + Send + 'static,
        O: Respond + 'static,
        E: Into<BoxError> + 'static,
    {
        self.route(Method::DELETE, path, func)
    }

    /// Handle one request end to end
    ///
    /// Never fails: every error becomes an HTTP response.
    pub async fn dispatch<B>(&self, req: Request<B>, peer: SocketAddr) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let start = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let response = match self.serve(req, peer).await {
            Ok(response) => response,
            Err(err) => error_response(&err),
        };

        info!(
            remote = %peer,
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            elapsed_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX),
            "request"
        );
        response
    }

    async fn serve<B>(&self, req: Request<B>, peer: SocketAddr) -> Result<Response<Full<Bytes>>>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let Match { handler, params } = self.match_route(req.method(), req.uri().path())?;
        let mut c = Context::from_hyper(req, peer, &self.config).await?;
        c.set_params(params);
        handler.call(&mut c).await?;
        Ok(c.into_response())
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("methods", &self.method_routes.keys().collect::<Vec<_>>())
            .field("handlers", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Decode(_) | Error::InvalidBody { .. } | Error::Hydrate(_) | Error::Body(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        Error::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        Error::RouteNotFound { .. } => StatusCode::NOT_FOUND,
        Error::Handler(_) | Error::Write { .. } | Error::InvalidRoutePattern { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: &Error) -> Response<Full<Bytes>> {
    let status = status_for(err);
    if status.is_server_error() {
        error!(error = %err, status = status.as_u16(), "request failed");
    }

    let body = ValidationErrors::from_error(err).map_or_else(
        || {
            let message = if status.is_server_error() {
                status.canonical_reason().unwrap_or("Internal Server Error").to_string()
            } else {
                err.to_string()
            };
            serde_json::to_vec(&ErrorBody { error: &message })
        },
        |errors| serde_json::to_vec(&errors),
    );

    let mut response = Response::new(Full::new(Bytes::from(body.unwrap_or_default())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
