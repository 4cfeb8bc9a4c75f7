// ABOUTME: Web server configuration section with host, port, and access log settings
// ABOUTME: Defaults bind every interface on port 8080 with access logging enabled
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::ConfigSection;
use crate::constants::{sections, server_defaults};
use serde::{Deserialize, Serialize};

/// `server` configuration section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind; 0 lets the OS pick one
    pub port: u16,
    /// Emit an `Access` record per request
    pub access_log: bool,
    /// Trim trailing slashes before routing
    pub normalize_path: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: server_defaults::HOST.to_owned(),
            port: server_defaults::PORT,
            access_log: server_defaults::ACCESS_LOG,
            normalize_path: server_defaults::NORMALIZE_PATH,
        }
    }
}

impl ServerConfig {
    /// `host:port` string handed to the listener
    #[must_use]
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// One-line summary for startup logs
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "server {} (access_log: {}, normalize_path: {})",
            self.bind_address(),
            self.access_log,
            self.normalize_path
        )
    }
}

impl ConfigSection for ServerConfig {
    const SECTION: &'static str = sections::SERVER;
}
