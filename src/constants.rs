// ABOUTME: System-wide constants re-exported from the core crate
// ABOUTME: Server defaults, config section names, environment keys, and header names
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Constants Module
//!
//! Defaults live in `scoped-core`; this module keeps the `crate::constants`
//! paths stable for the rest of the crate.

pub use scoped_core::constants::{
    env_config, headers, sections, server_defaults, service_names, timeouts,
};
