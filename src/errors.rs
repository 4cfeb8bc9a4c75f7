// ABOUTME: Unified error handling re-exported from the core crate
// ABOUTME: AppError, ErrorCode, and the JSON error response used by handlers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Unified Error Handling System
//!
//! The error types live in `scoped-core` so binaries and plugins built on
//! other crates share one taxonomy. `AppError` implements axum's
//! `IntoResponse`, so handlers can return `AppResult<T>` directly.

pub use scoped_core::errors::{
    AppError, AppResult, ErrorCode, ErrorContext, ErrorResponse, ErrorResponseDetails,
};
