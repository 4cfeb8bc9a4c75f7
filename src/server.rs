// ABOUTME: Web server plugin registering the application and yielding the serve task
// ABOUTME: Builds the middleware stack with the request-scope interceptor closest to handlers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Web Server Plugin
//!
//! [`ServerPlugin::prepare`] runs, in order:
//! 1. resolve the `server` configuration section through the injected resolver
//! 2. construct the [`WebApplication`] and register it in the root scope
//! 3. log `Running web server` with the resolved host and port
//! 4. return one serve task, not yet started, to the supervisor
//!
//! Anything running later in the root scope or a descendant (tests, other
//! plugins) can look the application up and attach routes until the serve
//! task starts.
//!
//! ## Middleware order (outermost first)
//!
//! 1. trailing slash normalization (`normalize_path`)
//! 2. request id assignment and propagation
//! 3. access logging (`access_log`)
//! 4. request scope: child scope holding the [`ScopedRequest`](crate::middleware::ScopedRequest)
//! 5. routes

use crate::config::{self, ServerConfig};
use crate::context::{Context, Registrable, ScopeKey};
use crate::errors::{AppError, AppResult};
use crate::lifecycle::{Plugin, PluginTask};
use crate::middleware::{
    access_log_middleware, request_context_middleware, AccessLog, AccessLogSink,
};
use async_trait::async_trait;
use axum::{extract::Request, middleware, routing::MethodRouter, Router, ServiceExt};
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::util::{option_layer, Either};
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::info;

/// Fully layered HTTP service served by the application
pub type AppService = Either<NormalizePath<Router>, Router>;

struct Routes {
    router: Router,
    started: bool,
}

#[derive(Debug, Clone)]
enum Listener {
    Pending,
    Bound(SocketAddr),
    Failed(String),
}

/// The long-lived web application registered in the root scope
pub struct WebApplication {
    config: ServerConfig,
    context: Context,
    routes: Mutex<Routes>,
    access_log: Option<AccessLog>,
    listener: watch::Sender<Listener>,
}

impl WebApplication {
    /// Create an application whose requests get child scopes of `ctx`
    ///
    /// When access logging is enabled, an [`AccessLogSink`] registered in
    /// `ctx` replaces the default `tracing` logger.
    #[must_use]
    pub fn new(config: ServerConfig, ctx: &Context) -> Self {
        let access_log = config
            .access_log
            .then(|| AccessLog::from_sink(ctx.get::<AccessLogSink>().as_deref()));
        let (listener, _) = watch::channel(Listener::Pending);

        Self {
            config,
            context: ctx.fork(),
            routes: Mutex::new(Routes {
                router: Router::new(),
                started: false,
            }),
            access_log,
            listener,
        }
    }

    /// Resolved server configuration
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Attach a route
    ///
    /// # Errors
    ///
    /// Returns a `ResourceLocked` error once the serve task has started
    ///
    /// # Panics
    ///
    /// Panics like [`Router::route`] on an invalid or overlapping path
    pub fn route(&self, path: &str, method_router: MethodRouter) -> AppResult<()> {
        self.update(|router| router.route(path, method_router))
    }

    /// Merge a prebuilt router
    ///
    /// # Errors
    ///
    /// Returns a `ResourceLocked` error once the serve task has started
    pub fn merge(&self, other: Router) -> AppResult<()> {
        self.update(|router| router.merge(other))
    }

    fn update(&self, apply: impl FnOnce(Router) -> Router) -> AppResult<()> {
        let mut routes = self.lock_routes();
        if routes.started {
            return Err(AppError::locked(
                "routes cannot be added after the web server started",
            ));
        }
        let router = std::mem::take(&mut routes.router);
        routes.router = apply(router);
        Ok(())
    }

    /// Whether the serve task has started
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.lock_routes().started
    }

    /// Routes with every middleware layer applied
    ///
    /// Used by the serve task; tests can drive it in-process with
    /// `tower::ServiceExt::oneshot`.
    #[must_use]
    pub fn service(&self) -> AppService {
        let router = self.lock_routes().router.clone();
        self.build_service(router)
    }

    fn build_service(&self, router: Router) -> AppService {
        let router = router.layer(middleware::from_fn_with_state(
            self.context.clone(),
            request_context_middleware,
        ));
        let router = match &self.access_log {
            Some(log) => router.layer(middleware::from_fn_with_state(
                log.clone(),
                access_log_middleware,
            )),
            None => router,
        };
        let router = router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        option_layer(
            self.config
                .normalize_path
                .then(NormalizePathLayer::trim_trailing_slash),
        )
        .layer(router)
    }

    /// Records lost to access logger faults
    #[must_use]
    pub fn access_log_faults(&self) -> u64 {
        self.access_log.as_ref().map_or(0, AccessLog::faults)
    }

    /// Listener address, once the serve task has bound it
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match *self.listener.borrow() {
            Listener::Bound(addr) => Some(addr),
            Listener::Pending | Listener::Failed(_) => None,
        }
    }

    /// Wait until the serve task has bound its listener
    ///
    /// # Errors
    ///
    /// Returns a `ResourceUnavailable` error if binding failed
    pub async fn bound_addr(&self) -> AppResult<SocketAddr> {
        let mut listener = self.listener.subscribe();
        let state = listener
            .wait_for(|state| !matches!(state, Listener::Pending))
            .await
            .map(|state| state.clone())
            .map_err(|e| AppError::unavailable(format!("web server listener closed: {e}")))?;
        match state {
            Listener::Bound(addr) => Ok(addr),
            Listener::Failed(reason) => Err(AppError::unavailable(reason)),
            Listener::Pending => Err(AppError::unavailable("web server never bound a listener")),
        }
    }

    /// Long-running task binding the configured address and serving requests
    ///
    /// Nothing happens until the returned task is polled.
    #[must_use]
    pub fn serve_task(self: &Arc<Self>) -> PluginTask {
        let app = Arc::clone(self);
        PluginTask::new("web-server", async move { app.serve().await })
    }

    async fn serve(&self) -> AppResult<()> {
        if self.is_started() {
            return Err(AppError::locked("web server is already running"));
        }

        let address = self.config.bind_address();
        let listener = match TcpListener::bind(&address).await {
            Ok(listener) => listener,
            Err(e) => {
                let reason = format!("cannot bind web server to {address}: {e}");
                self.listener.send_replace(Listener::Failed(reason.clone()));
                return Err(AppError::unavailable(reason).with_source(e));
            }
        };
        let local_addr = listener.local_addr()?;

        // Routes freeze only after a successful bind
        let service = {
            let mut routes = self.lock_routes();
            if routes.started {
                return Err(AppError::locked("web server is already running"));
            }
            routes.started = true;
            let router = routes.router.clone();
            drop(routes);
            self.build_service(router)
        };

        self.listener.send_replace(Listener::Bound(local_addr));
        info!(address = %local_addr, "Web server listening");

        axum::serve(
            listener,
            ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(service),
        )
        .await?;
        Ok(())
    }

    fn lock_routes(&self) -> MutexGuard<'_, Routes> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Registrable for WebApplication {
    const KEY: ScopeKey = ScopeKey::Application;
}

impl fmt::Debug for WebApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebApplication")
            .field("config", &self.config)
            .field("started", &self.is_started())
            .field("local_addr", &self.local_addr())
            .finish_non_exhaustive()
    }
}

/// Plugin serving a [`WebApplication`] configured from the `server` section
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerPlugin;

impl ServerPlugin {
    /// Create the plugin
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Plugin for ServerPlugin {
    fn name(&self) -> &str {
        "web-server"
    }

    async fn prepare(&self, ctx: &Context) -> AppResult<Vec<PluginTask>> {
        let server_config = config::inject::<ServerConfig>(ctx).await?;
        let app = ctx.register(WebApplication::new(server_config, ctx));

        info!(
            host = %app.config().host,
            port = app.config().port,
            summary = %app.config().summary(),
            "Running web server"
        );

        Ok(vec![app.serve_task()])
    }
}
