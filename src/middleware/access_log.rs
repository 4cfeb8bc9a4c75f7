// ABOUTME: Best-effort access logging middleware emitting one record per request
// ABOUTME: Pluggable AccessLogger sinks; faults are swallowed and counted, never propagated
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Access logging
//!
//! Every request yields an [`AccessRecord`] (remote address, method, path,
//! elapsed time, status) handed to an [`AccessLogger`]. The default logger
//! writes a structured `Access` event through `tracing`; a custom one can be
//! registered in the root scope as an [`AccessLogSink`].
//!
//! Telemetry is best effort: a logger that errors or panics never affects
//! the response. Such faults are counted and exposed through
//! [`AccessLog::faults`].

use crate::constants::headers;
use crate::context::{Registrable, ScopeKey};
use crate::errors::AppResult;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// One handled request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessRecord {
    /// Peer address, when known
    pub remote: Option<SocketAddr>,
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Time spent producing the response
    pub time: Duration,
    /// Response status code
    pub status: u16,
    /// Value of `x-request-id`, when present
    pub request_id: Option<String>,
}

/// Destination for access records
pub trait AccessLogger: Send + Sync {
    /// Record one handled request
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be written. The error is
    /// swallowed by the middleware.
    fn log(&self, record: &AccessRecord) -> AppResult<()>;
}

/// Writes access records as `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAccessLogger;

impl AccessLogger for TracingAccessLogger {
    fn log(&self, record: &AccessRecord) -> AppResult<()> {
        let remote = record
            .remote
            .map_or_else(|| "-".to_owned(), |addr| addr.to_string());
        info!(
            target: "scoped_web::access",
            remote = %remote,
            method = %record.method,
            path = %record.path,
            time = record.time.as_secs_f64(),
            status = record.status,
            request_id = record.request_id.as_deref().unwrap_or("-"),
            "Access"
        );
        Ok(())
    }
}

/// Access logger registered in a scope, replacing [`TracingAccessLogger`]
#[derive(Clone)]
pub struct AccessLogSink(Arc<dyn AccessLogger>);

impl AccessLogSink {
    /// Wrap a logger for registration
    pub fn new(logger: impl AccessLogger + 'static) -> Self {
        Self(Arc::new(logger))
    }
}

impl Registrable for AccessLogSink {
    const KEY: ScopeKey = ScopeKey::AccessLog;
}

impl fmt::Debug for AccessLogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessLogSink")
    }
}

/// Middleware state: the active logger and its fault counter
#[derive(Clone)]
pub struct AccessLog {
    logger: Arc<dyn AccessLogger>,
    faults: Arc<AtomicU64>,
}

impl AccessLog {
    /// Log through `logger`
    #[must_use]
    pub fn new(logger: Arc<dyn AccessLogger>) -> Self {
        Self {
            logger,
            faults: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Log through a registered sink, or through `tracing` when none is given
    #[must_use]
    pub fn from_sink(sink: Option<&AccessLogSink>) -> Self {
        sink.map_or_else(
            || Self::new(Arc::new(TracingAccessLogger)),
            |sink| Self::new(Arc::clone(&sink.0)),
        )
    }

    /// Number of records lost to logger errors or panics
    #[must_use]
    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    /// Hand `record` to the logger, swallowing any fault
    pub fn emit(&self, record: &AccessRecord) {
        match catch_unwind(AssertUnwindSafe(|| self.logger.log(record))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.faults.fetch_add(1, Ordering::Relaxed);
                debug!(error = %e, path = %record.path, "Access log record dropped");
            }
            Err(_) => {
                self.faults.fetch_add(1, Ordering::Relaxed);
                debug!(path = %record.path, "Access logger panicked, record dropped");
            }
        }
    }
}

impl fmt::Debug for AccessLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLog")
            .field("faults", &self.faults())
            .finish_non_exhaustive()
    }
}

/// Time the request and emit an [`AccessRecord`] once a response exists
pub async fn access_log_middleware(
    State(log): State<AccessLog>,
    req: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let method = req.method().to_string();
    let path = req.uri().path().to_owned();
    let request_id = req
        .headers()
        .get(headers::REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned);

    let response = next.run(req).await;

    log.emit(&AccessRecord {
        remote,
        method,
        path,
        time: started.elapsed(),
        status: response.status().as_u16(),
        request_id,
    });
    response
}
