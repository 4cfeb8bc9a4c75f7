// ABOUTME: Server binary running the web server plugin under the plugin supervisor
// ABOUTME: Layers YAML file, environment, and command line configuration before startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Scoped Web Server Binary
//!
//! Starts the web server plugin plus a small greeting plugin that attaches
//! its routes to the registered application.

use anyhow::Result;
use async_trait::async_trait;
use axum::{routing::get, Json};
use clap::Parser;
use scoped_web::{
    config::{
        ConfigHandle, EnvConfigResolver, FileConfigResolver, LayeredConfigResolver,
        SectionDocument, StaticConfigResolver,
    },
    constants::sections,
    context::Context,
    errors::AppResult,
    lifecycle::{ctrl_c_signal, Plugin, PluginManager, PluginTask},
    logging,
    middleware::ScopedRequest,
    server::{ServerPlugin, WebApplication},
};
use serde_json::{json, Value};
use tracing::info;

#[derive(Parser)]
#[command(name = "scoped-web-server")]
#[command(about = "HTTP server with per-request scoped contexts")]
pub struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Override the listening port
    #[arg(long)]
    port: Option<u16>,
}

/// Attaches the greeting routes once the application is registered
struct GreetingPlugin;

#[async_trait]
impl Plugin for GreetingPlugin {
    fn name(&self) -> &str {
        "greeting"
    }

    fn priority(&self) -> u8 {
        60
    }

    async fn prepare(&self, ctx: &Context) -> AppResult<Vec<PluginTask>> {
        let app = ctx.lookup::<WebApplication>()?;
        app.route("/", get(|| async { "Hello, world!" }))?;
        app.route("/whoami", get(whoami))?;
        Ok(Vec::new())
    }
}

async fn whoami(ctx: Context) -> AppResult<Json<Value>> {
    let request = ctx.lookup::<ScopedRequest>()?;
    Ok(Json(json!({
        "request_id": request.request_id,
        "method": request.method.as_str(),
        "path": request.path(),
        "scope_depth": ctx.depth(),
    })))
}

fn resolver(args: &Args) -> LayeredConfigResolver {
    let mut layered = LayeredConfigResolver::new();
    if let Some(path) = &args.config {
        layered = layered.layer(FileConfigResolver::new(path));
    }
    layered = layered.layer(EnvConfigResolver::new());
    if let Some(port) = args.port {
        let mut overrides = SectionDocument::new();
        overrides.insert("port".to_owned(), Value::from(port));
        layered = layered
            .layer(StaticConfigResolver::empty().with_section(sections::SERVER, overrides));
    }
    layered
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_from_env()?;

    let ctx = Context::new();
    ctx.register(ConfigHandle::new(resolver(&args)));

    let mut manager = PluginManager::new(ctx);
    manager.register(Box::new(ServerPlugin::new()));
    manager.register(Box::new(GreetingPlugin));

    manager.run_until(ctrl_c_signal()).await?;
    info!("Scoped web server stopped");
    Ok(())
}
