// ABOUTME: Main library entry point for the scoped web server plugin
// ABOUTME: Provides hierarchical contexts, config injection, plugin lifecycle, and the HTTP server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![deny(unsafe_code)]

//! # Scoped Web
//!
//! An HTTP server plugin for an application framework built around
//! hierarchical, scoped contexts and dependency injection.
//!
//! ## Features
//!
//! - **Scoped contexts**: a stack of [`context::Scope`]s where lookups walk
//!   from the innermost scope outward
//! - **Config injection**: typed config sections resolved through a
//!   pluggable [`config::ConfigResolver`]
//! - **Per-request scopes**: every request gets its own child scope holding
//!   the request object, released however the handler ends
//! - **Access logging**: one best-effort record per request
//! - **Plugin lifecycle**: `prepare` hooks yield long-running tasks owned by
//!   a supervisor
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use scoped_web::context::Context;
//! use scoped_web::errors::AppResult;
//! use scoped_web::lifecycle::{ctrl_c_signal, PluginManager};
//! use scoped_web::server::ServerPlugin;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let mut manager = PluginManager::new(Context::new());
//!     manager.register(Box::new(ServerPlugin::new()));
//!     manager.run_until(ctrl_c_signal()).await
//! }
//! ```

/// Typed configuration sections and the resolvers they are loaded from
pub mod config;

/// System-wide constants
pub mod constants;

/// Hierarchical scoped contexts
pub mod context;

/// Unified error handling
pub mod errors;

/// Plugin preparation and task supervision
pub mod lifecycle;

/// Logging configuration
pub mod logging;

/// HTTP middleware
pub mod middleware;

/// Web application and server plugin
pub mod server;
