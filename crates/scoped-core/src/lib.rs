// ABOUTME: Core types and constants for the scoped web server plugin
// ABOUTME: Foundation crate with error handling and configuration defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![deny(unsafe_code)]

//! # Scoped Core
//!
//! Foundation crate shared by the server plugin and its binaries. It is meant
//! to change infrequently so the main crate gets incremental compilation
//! benefits.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **constants**: Configuration defaults, section names and environment keys

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants and configuration defaults organized by domain
pub mod constants;
