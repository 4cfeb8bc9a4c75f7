// ABOUTME: Integration tests for configuration resolution and injection
// ABOUTME: Validates defaults, environment and file sources, layering, and invalid values
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use scoped_web::config::{
    self, ConfigHandle, EnvConfigResolver, FileConfigResolver, LayeredConfigResolver,
    ServerConfig, StaticConfigResolver,
};
use scoped_web::context::Context;
use scoped_web::errors::ErrorCode;
use serde_json::json;
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_defaults_without_any_source() {
    common::init_test_logging();
    let server = config::resolve::<ServerConfig, _>(&StaticConfigResolver::empty())
        .await
        .unwrap();

    assert_eq!(server.host, "0.0.0.0");
    assert_eq!(server.port, 8080);
    assert!(server.access_log);
    assert_eq!(server.bind_address(), "0.0.0.0:8080");
}

#[test]
fn test_summary_describes_listener_and_options() {
    let server = ServerConfig::default();
    assert_eq!(
        server.summary(),
        "server 0.0.0.0:8080 (access_log: true, normalize_path: true)"
    );
}

#[tokio::test]
#[serial]
async fn test_null_environment_value_keeps_default() {
    env::set_var("SCOPED_WEB_SERVER_HOST", "null");
    env::set_var("SCOPED_WEB_SERVER_PORT", "9400");

    let server = config::resolve::<ServerConfig, _>(&EnvConfigResolver::new())
        .await
        .unwrap();

    env::remove_var("SCOPED_WEB_SERVER_HOST");
    env::remove_var("SCOPED_WEB_SERVER_PORT");

    assert_eq!(server.host, "0.0.0.0");
    assert_eq!(server.port, 9400);
}

#[tokio::test]
async fn test_inject_without_registered_resolver_uses_defaults() {
    let ctx = Context::new();
    let server = config::inject::<ServerConfig>(&ctx).await.unwrap();
    assert_eq!(server, ServerConfig::default());
}

#[tokio::test]
async fn test_partial_section_keeps_other_defaults() {
    let ctx = common::context_with_config(json!({ "server": { "port": 9000 } }));
    let _child = ctx.push_child();

    let server = config::inject::<ServerConfig>(&ctx).await.unwrap();
    assert_eq!(server.host, "0.0.0.0");
    assert_eq!(server.port, 9000);
}

#[tokio::test]
async fn test_resolution_is_idempotent() {
    let handle = ConfigHandle::new(
        StaticConfigResolver::from_value(json!({ "server": { "host": "127.0.0.1" } })).unwrap(),
    );

    let first = handle.resolve::<ServerConfig>().await.unwrap();
    let second = handle.resolve::<ServerConfig>().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_wrong_type_is_config_invalid() {
    let resolver =
        StaticConfigResolver::from_value(json!({ "server": { "port": "not-a-port" } })).unwrap();
    let err = config::resolve::<ServerConfig, _>(&resolver)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigInvalid);
    assert!(err.message.contains("server"));
}

#[tokio::test]
async fn test_out_of_range_port_is_config_invalid() {
    let resolver =
        StaticConfigResolver::from_value(json!({ "server": { "port": 70000 } })).unwrap();
    let err = config::resolve::<ServerConfig, _>(&resolver)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigInvalid);
}

#[tokio::test]
#[serial]
async fn test_environment_variables_override_defaults() {
    env::set_var("SCOPED_WEB_SERVER_PORT", "9100");
    env::set_var("SCOPED_WEB_SERVER_ACCESS_LOG", "false");

    let server = config::resolve::<ServerConfig, _>(&EnvConfigResolver::new())
        .await
        .unwrap();

    env::remove_var("SCOPED_WEB_SERVER_PORT");
    env::remove_var("SCOPED_WEB_SERVER_ACCESS_LOG");

    assert_eq!(server.port, 9100);
    assert!(!server.access_log);
    assert_eq!(server.host, "0.0.0.0");
}

#[tokio::test]
async fn test_yaml_file_source() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "server:\n  host: 127.0.0.1\n  port: 8181\nother:\n  key: value").unwrap();

    let server = config::resolve::<ServerConfig, _>(&FileConfigResolver::new(file.path()))
        .await
        .unwrap();
    assert_eq!(server.bind_address(), "127.0.0.1:8181");
}

#[tokio::test]
async fn test_missing_file_is_config_missing() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = FileConfigResolver::new(dir.path().join("absent.yaml"));

    let err = config::resolve::<ServerConfig, _>(&resolver)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigMissing);
}

#[tokio::test]
async fn test_later_layers_override_per_field() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "server:\n  host: 10.0.0.1\n  port: 8000").unwrap();

    let layered = LayeredConfigResolver::new()
        .layer(FileConfigResolver::new(file.path()))
        .layer(EnvConfigResolver::from_vars(
            "SCOPED_WEB",
            [("SCOPED_WEB_SERVER_PORT", "9200")],
        ));
    assert_eq!(layered.len(), 2);

    let server = config::resolve::<ServerConfig, _>(&layered).await.unwrap();
    assert_eq!(server.host, "10.0.0.1");
    assert_eq!(server.port, 9200);
}

#[tokio::test]
async fn test_ipv6_host_is_bracketed() {
    let resolver =
        StaticConfigResolver::from_value(json!({ "server": { "host": "::1", "port": 80 } }))
            .unwrap();
    let server = config::resolve::<ServerConfig, _>(&resolver).await.unwrap();
    assert_eq!(server.bind_address(), "[::1]:80");
}
