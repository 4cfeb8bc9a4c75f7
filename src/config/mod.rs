// ABOUTME: Typed configuration sections resolved asynchronously from layered sources
// ABOUTME: Defines ConfigSection, the ConfigResolver trait, and context-based injection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Configuration module
//!
//! A configuration section is a plain serde type with defaults for every
//! optional field. A [`ConfigResolver`] produces the raw key/value document
//! for a section; [`resolve`] turns that document into the typed section.
//!
//! - **sources**: static, environment, file and layered resolvers
//! - **server**: the `server` section consumed by the web server plugin
//!
//! Resolvers are themselves injected: register a [`ConfigHandle`] in the root
//! scope and call [`inject`] from anything running in a descendant scope.

/// Configuration sources (static, environment, file, layered)
pub mod sources;

/// Web server configuration section
pub mod server;

pub use server::ServerConfig;
pub use sources::{
    EnvConfigResolver, FileConfigResolver, LayeredConfigResolver, StaticConfigResolver,
};

use crate::context::{Context, Registrable, ScopeError, ScopeKey};
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Raw key/value document of one section
pub type SectionDocument = Map<String, Value>;

/// A typed configuration section
///
/// Fields without a value in any source must carry a serde default,
/// otherwise resolution fails with a configuration error.
pub trait ConfigSection: DeserializeOwned + Send + Sync + 'static {
    /// Section name the fields are read from
    const SECTION: &'static str;
}

/// Source of raw configuration documents
#[async_trait]
pub trait ConfigResolver: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Load the raw document for `section`
    ///
    /// Returns `Ok(None)` when this source does not define the section.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or is malformed
    async fn load_section(&self, section: &str) -> AppResult<Option<SectionDocument>>;
}

/// Resolve the typed section `S` from `resolver`
///
/// Missing fields take their defaults; a source that does not define the
/// section at all yields a fully defaulted value.
///
/// # Errors
///
/// Returns a `ConfigInvalid` error if a value has the wrong type or a field
/// without default is absent, and propagates source failures unchanged.
pub async fn resolve<S, R>(resolver: &R) -> AppResult<S>
where
    S: ConfigSection,
    R: ConfigResolver + ?Sized,
{
    let document = resolver.load_section(S::SECTION).await?;
    debug!(
        source = resolver.name(),
        section = S::SECTION,
        defined = document.is_some(),
        "Resolving configuration section"
    );
    from_document(S::SECTION, document.unwrap_or_default())
}

fn from_document<S: ConfigSection>(section: &str, document: SectionDocument) -> AppResult<S> {
    serde_json::from_value(Value::Object(document)).map_err(|e| {
        AppError::config_invalid(format!("section '{section}': {e}")).with_source(e)
    })
}

/// Configuration resolver registered in a scope
#[derive(Clone)]
pub struct ConfigHandle(Arc<dyn ConfigResolver>);

impl ConfigHandle {
    /// Wrap a resolver for registration
    pub fn new(resolver: impl ConfigResolver + 'static) -> Self {
        Self(Arc::new(resolver))
    }

    /// The wrapped resolver
    #[must_use]
    pub fn resolver(&self) -> &dyn ConfigResolver {
        self.0.as_ref()
    }

    /// Resolve section `S` with the wrapped resolver
    ///
    /// # Errors
    ///
    /// See [`resolve`]
    pub async fn resolve<S: ConfigSection>(&self) -> AppResult<S> {
        resolve(self.0.as_ref()).await
    }
}

impl fmt::Debug for ConfigHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConfigHandle").field(&self.0.name()).finish()
    }
}

impl Registrable for ConfigHandle {
    const KEY: ScopeKey = ScopeKey::Config;
}

/// Resolve section `S` through the resolver registered in `ctx`
///
/// Without a registered [`ConfigHandle`] every field takes its default.
///
/// # Errors
///
/// Returns a configuration error if the section cannot be resolved
pub async fn inject<S: ConfigSection>(ctx: &Context) -> AppResult<S> {
    match ctx.lookup::<ConfigHandle>() {
        Ok(handle) => handle.resolve::<S>().await,
        Err(ScopeError::NotFound { .. }) => {
            debug!(
                section = S::SECTION,
                "No configuration resolver registered, using defaults"
            );
            from_document(S::SECTION, SectionDocument::new())
        }
        Err(e) => Err(e.into()),
    }
}
