// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides quiet logging, recording access loggers, and in-process app helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `scoped_web`
//!
//! This module provides common test setup functions to reduce duplication
//! across integration tests.

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response, StatusCode};
use scoped_web::config::{ConfigHandle, StaticConfigResolver};
use scoped_web::context::Context;
use scoped_web::errors::AppResult;
use scoped_web::middleware::{AccessLogger, AccessRecord};
use scoped_web::server::WebApplication;
use serde_json::Value;
use std::sync::{Arc, Mutex, Once};
use tower::ServiceExt;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        // Check for TEST_LOG environment variable to control test logging level
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Access logger keeping every record in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingAccessLogger {
    records: Arc<Mutex<Vec<AccessRecord>>>,
}

impl RecordingAccessLogger {
    pub fn records(&self) -> Vec<AccessRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl AccessLogger for RecordingAccessLogger {
    fn log(&self, record: &AccessRecord) -> AppResult<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Root context whose resolver serves `document` (one object per section)
pub fn context_with_config(document: Value) -> Context {
    let ctx = Context::new();
    ctx.register(ConfigHandle::new(
        StaticConfigResolver::from_value(document).unwrap(),
    ));
    ctx
}

/// Drive one request through the fully layered application
pub async fn send(app: &WebApplication, request: Request<Body>) -> Response<Body> {
    app.service().oneshot(request).await.unwrap()
}

/// GET `uri` and return status and body text
pub async fn get_text(app: &WebApplication, uri: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = send(app, request).await;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}
