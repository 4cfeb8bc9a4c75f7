// ABOUTME: Plugin lifecycle management: ordered preparation and task supervision
// ABOUTME: Collects long-running tasks yielded by plugins and runs them until shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Plugin Lifecycle Management
//!
//! Plugins expose a `prepare` hook that performs one-time startup against the
//! root [`Context`] and returns zero or more [`PluginTask`]s. The
//! [`PluginManager`] is the supervisor:
//! - prepares plugins in priority order, each under a timeout
//! - treats a failed `prepare` as fatal for required plugins only
//! - runs every yielded task concurrently until a shutdown signal
//! - aborts the remaining tasks on shutdown

use crate::constants::timeouts;
use crate::context::Context;
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Boxed future of a long-running plugin task
pub type TaskFuture = Pin<Box<dyn Future<Output = AppResult<()>> + Send + 'static>>;

/// A long-running task produced by a plugin and owned by the supervisor
///
/// Creating a task does not start it; the wrapped future only runs once the
/// supervisor polls it.
pub struct PluginTask {
    name: String,
    future: TaskFuture,
}

impl PluginTask {
    /// Wrap `future` under a display name
    pub fn new(
        name: impl Into<String>,
        future: impl Future<Output = AppResult<()>> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            future: Box::pin(future),
        }
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl IntoFuture for PluginTask {
    type Output = AppResult<()>;
    type IntoFuture = TaskFuture;

    fn into_future(self) -> Self::IntoFuture {
        self.future
    }
}

impl fmt::Debug for PluginTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginTask")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Plugin lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginState {
    /// Registered, not prepared yet
    Registered,
    /// `prepare` is running
    Preparing,
    /// Prepared, tasks not started
    Ready,
    /// `prepare` failed or a task ended with an error
    Failed,
    /// Tasks are running
    Running,
    /// All tasks finished or were aborted
    Stopped,
}

/// Plugin with a preparation hook
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Get plugin name
    fn name(&self) -> &str;

    /// Get plugin preparation priority (lower = earlier, 0-100)
    fn priority(&self) -> u8 {
        50
    }

    /// Whether a failed `prepare` aborts the whole startup
    fn is_required(&self) -> bool {
        true
    }

    /// Perform one-time startup and return the tasks to supervise
    ///
    /// # Errors
    /// Returns an error if startup fails; no task of this plugin runs then
    async fn prepare(&self, ctx: &Context) -> AppResult<Vec<PluginTask>>;
}

/// Name and state of a registered plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginStatus {
    /// Plugin name
    pub name: String,
    /// Current state
    pub state: PluginState,
    /// Failure message, if any
    pub message: Option<String>,
}

struct PluginEntry {
    plugin: Box<dyn Plugin>,
    state: PluginState,
    message: Option<String>,
}

/// Supervisor preparing plugins and running their tasks
pub struct PluginManager {
    context: Context,
    plugins: Vec<PluginEntry>,
    prepare_timeout: Duration,
}

impl PluginManager {
    /// Create a manager preparing plugins in `context` (normally the root)
    #[must_use]
    pub fn new(context: Context) -> Self {
        Self {
            context,
            plugins: Vec::new(),
            prepare_timeout: Duration::from_secs(timeouts::PLUGIN_PREPARE_TIMEOUT_SECS),
        }
    }

    /// Override the per-plugin preparation timeout
    #[must_use]
    pub const fn with_prepare_timeout(mut self, timeout: Duration) -> Self {
        self.prepare_timeout = timeout;
        self
    }

    /// Context plugins are prepared in
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.context
    }

    /// Register a plugin
    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        info!("Registering plugin: {}", plugin.name());
        self.plugins.push(PluginEntry {
            plugin,
            state: PluginState::Registered,
            message: None,
        });
    }

    /// Current state of every plugin, in preparation order once prepared
    #[must_use]
    pub fn statuses(&self) -> Vec<PluginStatus> {
        self.plugins
            .iter()
            .map(|entry| PluginStatus {
                name: entry.plugin.name().to_owned(),
                state: entry.state,
                message: entry.message.clone(),
            })
            .collect()
    }

    /// Prepare all plugins in priority order and collect their tasks
    ///
    /// # Errors
    /// Returns the error of the first required plugin that fails or times out
    pub async fn prepare_all(&mut self) -> AppResult<Vec<PluginTask>> {
        info!("Preparing {} plugins", self.plugins.len());
        self.plugins.sort_by_key(|entry| entry.plugin.priority());

        let mut tasks = Vec::new();
        for entry in &mut self.plugins {
            let plugin_name = entry.plugin.name().to_owned();
            let is_required = entry.plugin.is_required();
            entry.state = PluginState::Preparing;

            info!(
                "Preparing plugin '{}' (priority: {}, required: {})",
                plugin_name,
                entry.plugin.priority(),
                is_required
            );

            let outcome =
                tokio::time::timeout(self.prepare_timeout, entry.plugin.prepare(&self.context))
                    .await
                    .unwrap_or_else(|_| {
                        Err(AppError::unavailable(format!(
                            "plugin '{plugin_name}' preparation timed out after {:?}",
                            self.prepare_timeout
                        )))
                    });

            match outcome {
                Ok(plugin_tasks) => {
                    info!(
                        "Plugin '{}' prepared {} task(s)",
                        plugin_name,
                        plugin_tasks.len()
                    );
                    entry.state = PluginState::Ready;
                    tasks.extend(plugin_tasks);
                }
                Err(e) => {
                    entry.state = PluginState::Failed;
                    entry.message = Some(e.to_string());
                    if is_required {
                        error!("Required plugin '{}' failed to prepare: {}", plugin_name, e);
                        return Err(e);
                    }
                    warn!("Optional plugin '{}' failed to prepare: {}", plugin_name, e);
                }
            }
        }

        Ok(tasks)
    }

    /// Prepare every plugin, then run all tasks until `shutdown` resolves
    ///
    /// Returns once `shutdown` resolves (remaining tasks are aborted) or every
    /// task has finished.
    ///
    /// # Errors
    /// Returns a preparation error, or the first task error when all tasks
    /// finished on their own
    pub async fn run_until<F>(&mut self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        let tasks = self.prepare_all().await?;
        self.transition(PluginState::Running);

        let mut running = JoinSet::new();
        for task in tasks {
            let name = task.name().to_owned();
            running.spawn(async move { (name, task.await) });
        }

        let mut first_error = None;
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested, aborting {} task(s)", running.len());
                    running.shutdown().await;
                    self.transition(PluginState::Stopped);
                    return Ok(());
                }
                joined = running.join_next() => {
                    match joined {
                        None => break,
                        Some(Ok((name, Ok(())))) => info!("Task '{}' finished", name),
                        Some(Ok((name, Err(e)))) => {
                            error!("Task '{}' failed: {}", name, e);
                            first_error.get_or_insert(e);
                        }
                        Some(Err(e)) => {
                            error!("Task panicked or was cancelled: {}", e);
                            first_error.get_or_insert_with(|| {
                                AppError::internal(format!("plugin task aborted: {e}"))
                            });
                        }
                    }
                }
            }
        }

        self.transition(PluginState::Stopped);
        first_error.map_or(Ok(()), Err)
    }

    fn transition(&mut self, state: PluginState) {
        for entry in &mut self.plugins {
            if entry.state != PluginState::Failed && entry.state != PluginState::Registered {
                entry.state = state;
            }
        }
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugins", &self.statuses())
            .field("prepare_timeout", &self.prepare_timeout)
            .finish_non_exhaustive()
    }
}

/// Resolve when the process receives Ctrl-C
pub async fn ctrl_c_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
