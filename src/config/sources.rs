// ABOUTME: Configuration sources backing the ConfigResolver trait
// ABOUTME: Static documents, environment variables, YAML files, and layered merging
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{ConfigResolver, SectionDocument};
use crate::constants::env_config;
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// In-memory configuration document, one object per section
#[derive(Debug, Clone, Default)]
pub struct StaticConfigResolver {
    document: Map<String, Value>,
}

impl StaticConfigResolver {
    /// A source defining no sections
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from a JSON object whose members are sections
    ///
    /// # Errors
    ///
    /// Returns a `ConfigInvalid` error if `value` is not an object
    pub fn from_value(value: Value) -> AppResult<Self> {
        match value {
            Value::Object(document) => Ok(Self { document }),
            other => Err(AppError::config_invalid(format!(
                "configuration document must be an object, got {other}"
            ))),
        }
    }

    /// Add or replace a section
    #[must_use]
    pub fn with_section(mut self, section: &str, fields: SectionDocument) -> Self {
        self.document
            .insert(section.to_owned(), Value::Object(fields));
        self
    }
}

#[async_trait]
impl ConfigResolver for StaticConfigResolver {
    fn name(&self) -> &str {
        "static"
    }

    async fn load_section(&self, section: &str) -> AppResult<Option<SectionDocument>> {
        section_from_document(&self.document, section)
    }
}

/// Configuration read from environment variables
///
/// A field is read from `<PREFIX>_<SECTION>_<FIELD>` (upper-case), so
/// `SCOPED_WEB_SERVER_PORT=9000` sets `server.port`. Values that parse as a
/// JSON number or boolean keep that type, `null` leaves the field at its
/// default, and everything else is a string.
#[derive(Debug, Clone)]
pub struct EnvConfigResolver {
    prefix: String,
    snapshot: Option<HashMap<String, String>>,
}

impl EnvConfigResolver {
    /// Read the live process environment with the default prefix
    #[must_use]
    pub fn new() -> Self {
        Self::with_prefix(env_config::CONFIG_PREFIX)
    }

    /// Read the live process environment with a custom prefix
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().to_uppercase(),
            snapshot: None,
        }
    }

    /// Read from a fixed set of variables instead of the process environment
    #[must_use]
    pub fn from_vars<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into().to_uppercase(),
            snapshot: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    fn section_prefix(&self, section: &str) -> String {
        let sep = env_config::SEPARATOR;
        format!("{}{sep}{}{sep}", self.prefix, section.to_uppercase())
    }

    fn collect<I>(&self, section: &str, vars: I) -> Option<SectionDocument>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let prefix = self.section_prefix(section);
        let fields: SectionDocument = vars
            .into_iter()
            .filter_map(|(key, raw)| {
                let field = key.strip_prefix(&prefix)?;
                if field.is_empty() {
                    return None;
                }
                parse_scalar(&raw).map(|value| (field.to_lowercase(), value))
            })
            .collect();
        (!fields.is_empty()).then_some(fields)
    }
}

impl Default for EnvConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigResolver for EnvConfigResolver {
    fn name(&self) -> &str {
        "environment"
    }

    async fn load_section(&self, section: &str) -> AppResult<Option<SectionDocument>> {
        Ok(match &self.snapshot {
            Some(vars) => self.collect(
                section,
                vars.iter().map(|(k, v)| (k.clone(), v.clone())),
            ),
            None => self.collect(section, env::vars()),
        })
    }
}

/// `null` leaves the field unset so its default applies
fn parse_scalar(raw: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Null) => None,
        Ok(value @ (Value::Number(_) | Value::Bool(_))) => Some(value),
        _ => Some(Value::String(raw.to_owned())),
    }
}

/// Configuration read from a YAML (or JSON) file
///
/// The file is read on every resolution, so edits are picked up the next
/// time a section is resolved.
#[derive(Debug, Clone)]
pub struct FileConfigResolver {
    path: PathBuf,
}

impl FileConfigResolver {
    /// Read sections from the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigResolver for FileConfigResolver {
    fn name(&self) -> &str {
        "file"
    }

    async fn load_section(&self, section: &str) -> AppResult<Option<SectionDocument>> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AppError::config_missing(format!(
                "cannot read configuration file {}: {e}",
                self.path.display()
            ))
            .with_source(e)
        })?;

        let document: Value = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::config_invalid(format!(
                "malformed configuration file {}: {e}",
                self.path.display()
            ))
            .with_source(e)
        })?;

        match document {
            // An empty file parses as null
            Value::Null => Ok(None),
            Value::Object(document) => section_from_document(&document, section),
            _ => Err(AppError::config_invalid(format!(
                "configuration file {} must contain a mapping of sections",
                self.path.display()
            ))),
        }
    }
}

/// Merge of several sources, later layers overriding earlier ones field by field
#[derive(Clone, Default)]
pub struct LayeredConfigResolver {
    layers: Vec<Arc<dyn ConfigResolver>>,
}

impl LayeredConfigResolver {
    /// A resolver with no layers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer that overrides every layer added before it
    #[must_use]
    pub fn layer(mut self, resolver: impl ConfigResolver + 'static) -> Self {
        self.layers.push(Arc::new(resolver));
        self
    }

    /// Number of layers
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether no layer was added
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[async_trait]
impl ConfigResolver for LayeredConfigResolver {
    fn name(&self) -> &str {
        "layered"
    }

    async fn load_section(&self, section: &str) -> AppResult<Option<SectionDocument>> {
        let mut merged: Option<SectionDocument> = None;
        for layer in &self.layers {
            if let Some(fields) = layer.load_section(section).await? {
                debug!(source = layer.name(), section, "Merging configuration layer");
                merged.get_or_insert_with(SectionDocument::new).extend(fields);
            }
        }
        Ok(merged)
    }
}

fn section_from_document(
    document: &Map<String, Value>,
    section: &str,
) -> AppResult<Option<SectionDocument>> {
    match document.get(section) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(fields)) => Ok(Some(fields.clone())),
        Some(other) => Err(AppError::config_invalid(format!(
            "section '{section}' must be a mapping, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalar_keeps_numbers_and_booleans() {
        assert_eq!(parse_scalar("8080"), Some(Value::from(8080)));
        assert_eq!(parse_scalar("false"), Some(Value::Bool(false)));
        assert_eq!(parse_scalar("0.0.0.0"), Some(Value::from("0.0.0.0")));
        assert_eq!(parse_scalar("localhost"), Some(Value::from("localhost")));
        assert_eq!(parse_scalar("null"), None);
    }

    #[tokio::test]
    async fn test_env_ignores_other_sections_and_prefixes() {
        let resolver = EnvConfigResolver::from_vars(
            "app",
            [
                ("APP_SERVER_PORT", "9000"),
                ("APP_SERVERLESS_PORT", "1"),
                ("APP_DATABASE_URL", "sqlite::memory:"),
                ("OTHER_SERVER_PORT", "2"),
                ("APP_SERVER_", "ignored"),
            ],
        );

        let fields = resolver.load_section("server").await.unwrap().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["port"], Value::from(9000));
    }

    #[tokio::test]
    async fn test_non_object_section_is_rejected() {
        let resolver =
            StaticConfigResolver::from_value(serde_json::json!({ "server": 42 })).unwrap();
        assert!(resolver.load_section("server").await.is_err());
    }
}
