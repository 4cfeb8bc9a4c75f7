// ABOUTME: System-wide constants and configuration defaults for the scoped web server
// ABOUTME: Contains server defaults, config section names, and environment variable keys
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Constants Module
//!
//! Hardcoded defaults grouped by the component that consumes them.

/// Defaults applied when the `server` section does not set a field
pub mod server_defaults {
    /// Interface the web server binds to
    pub const HOST: &str = "0.0.0.0";

    /// Port the web server binds to
    pub const PORT: u16 = 8080;

    /// Access logging is on unless disabled
    pub const ACCESS_LOG: bool = true;

    /// Trailing slashes are trimmed before routing unless disabled
    pub const NORMALIZE_PATH: bool = true;
}

/// Configuration section names
pub mod sections {
    /// Web server section
    pub const SERVER: &str = "server";
}

/// Environment variable conventions
pub mod env_config {
    /// Prefix for configuration values read from the environment.
    ///
    /// A field is read from `<PREFIX>_<SECTION>_<FIELD>`, upper-cased,
    /// e.g. `SCOPED_WEB_SERVER_PORT`.
    pub const CONFIG_PREFIX: &str = "SCOPED_WEB";

    /// Separator between prefix, section and field
    pub const SEPARATOR: char = '_';
}

/// Service identification used in structured logs
pub mod service_names {
    /// Service name reported at startup
    pub const SCOPED_WEB_SERVER: &str = "scoped-web-server";
}

/// HTTP header names
pub mod headers {
    /// Header carrying a caller supplied request identifier
    pub const REQUEST_ID: &str = "x-request-id";
}

/// Lifecycle timing
pub mod timeouts {
    /// Upper bound for a single plugin's `prepare` hook, in seconds
    pub const PLUGIN_PREPARE_TIMEOUT_SECS: u64 = 30;
}
