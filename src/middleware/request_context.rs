// ABOUTME: Request interceptor opening a child context scope for every inbound request
// ABOUTME: Registers the request in that scope and releases it when handling completes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Request Context Middleware
//!
//! For every request this middleware:
//! 1. forks the root [`Context`] so the request gets its own scope stack
//! 2. pushes a child scope
//! 3. registers a [`ScopedRequest`] into that scope
//! 4. hands the forked context to the handler through request extensions
//! 5. releases the child scope once the handler future completes or is dropped
//!
//! Handlers receive the context by extracting [`Context`]:
//!
//! ```rust,no_run
//! use scoped_web::context::Context;
//! use scoped_web::errors::AppResult;
//! use scoped_web::middleware::ScopedRequest;
//!
//! async fn whoami(ctx: Context) -> AppResult<String> {
//!     let request = ctx.lookup::<ScopedRequest>()?;
//!     Ok(request.request_id.clone())
//! }
//! ```

use crate::constants::headers;
use crate::context::{Context, Registrable, ScopeGuard, ScopeKey};
use crate::errors::AppError;
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, Method, Uri},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::{debug, Instrument};
use uuid::Uuid;

/// Snapshot of the inbound request registered in its scope
#[derive(Debug, Clone)]
pub struct ScopedRequest {
    /// Caller supplied `x-request-id`, or a generated one
    pub request_id: String,
    /// HTTP method
    pub method: Method,
    /// Request URI as routed
    pub uri: Uri,
    /// Request headers
    pub headers: HeaderMap,
    /// Peer address, when the server exposes connection info
    pub remote: Option<SocketAddr>,
}

impl ScopedRequest {
    /// Capture the parts of `req` handlers may need after the body is consumed
    #[must_use]
    pub fn from_request(req: &Request) -> Self {
        let request_id = req
            .headers()
            .get(headers::REQUEST_ID)
            .and_then(|value| value.to_str().ok())
            .map_or_else(
                || format!("req_{}", Uuid::new_v4().simple()),
                ToOwned::to_owned,
            );

        Self {
            request_id,
            method: req.method().clone(),
            uri: req.uri().clone(),
            headers: req.headers().clone(),
            remote: req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0),
        }
    }

    /// Request path
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Raw query string, if any
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }
}

impl Registrable for ScopedRequest {
    const KEY: ScopeKey = ScopeKey::Request;
}

/// Wrap the request in a fresh child scope of `root`
///
/// Scope push happens before registration, registration before dispatch and
/// release after the handler returns. Release is tied to a guard, so a
/// cancelled request (its future dropped mid-await) releases its scope too.
pub async fn request_context_middleware(
    State(root): State<Context>,
    mut req: Request,
    next: Next,
) -> Response {
    let ctx = root.fork();
    let guard = ctx.push_child();
    let request = ctx.register(ScopedRequest::from_request(&req));
    let scope = RequestScope {
        request_id: request.request_id.clone(),
        _guard: guard,
    };

    let span = tracing::debug_span!(
        "request_scope",
        request_id = %request.request_id,
        method = %request.method,
        path = %request.path(),
    );

    req.extensions_mut().insert(ctx);
    let response = next.run(req).instrument(span).await;

    debug!(
        request_id = %request.request_id,
        status = response.status().as_u16(),
        "Request handled"
    );
    drop(scope);
    response
}

/// Releases the request's child scope on drop, including when the request
/// future is dropped before completing
struct RequestScope {
    request_id: String,
    _guard: ScopeGuard,
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        debug!(request_id = %self.request_id, "Releasing request scope");
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| AppError::internal("request context middleware is not installed"))
    }
}
