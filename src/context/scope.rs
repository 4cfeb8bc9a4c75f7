// ABOUTME: Scope node of the context tree with type-keyed storage and parent fallback
// ABOUTME: Defines ScopeKey, the Registrable trait, and scope lookup errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::errors::{AppError, ErrorCode};
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use thiserror::Error;

/// Stable identifier for every type that can be stored in a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    /// The long-lived web application
    Application,
    /// The request currently being handled
    Request,
    /// The configuration resolver injected at startup
    Config,
    /// The sink receiving access log records
    AccessLog,
    /// Application-defined entries
    Named(&'static str),
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Application => f.write_str("application"),
            Self::Request => f.write_str("request"),
            Self::Config => f.write_str("config"),
            Self::AccessLog => f.write_str("access_log"),
            Self::Named(name) => write!(f, "named:{name}"),
        }
    }
}

/// A type that can be registered into a [`Scope`]
///
/// Each registrable type names the key it is stored under. Two types sharing
/// a key shadow each other; a lookup that finds a value of the wrong type
/// reports [`ScopeError::TypeMismatch`].
pub trait Registrable: Any + Send + Sync {
    /// Key this type is stored under
    const KEY: ScopeKey;
}

/// Errors raised by scope lookups
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// No scope from the current one up to the root holds the key
    #[error("no value registered for '{key}' in the current scope chain")]
    NotFound {
        /// Key that was looked up
        key: ScopeKey,
    },
    /// A value is registered under the key but has a different type
    #[error("value registered for '{key}' is not a {expected}")]
    TypeMismatch {
        /// Key that was looked up
        key: ScopeKey,
        /// Type the caller asked for
        expected: &'static str,
    },
}

impl From<ScopeError> for AppError {
    fn from(error: ScopeError) -> Self {
        let code = match error {
            ScopeError::NotFound { .. } => ErrorCode::ResourceNotFound,
            ScopeError::TypeMismatch { .. } => ErrorCode::InternalError,
        };
        Self::new(code, error.to_string()).with_source(error)
    }
}

type Entry = Arc<dyn Any + Send + Sync>;

/// A node in the context tree
///
/// The parent link is weak: a scope never keeps its ancestors alive. The
/// [`Context`](super::Context) stack owns every scope on the active chain.
pub struct Scope {
    depth: usize,
    parent: Weak<Self>,
    entries: RwLock<HashMap<ScopeKey, Entry>>,
}

impl Scope {
    pub(crate) fn root() -> Arc<Self> {
        Arc::new(Self {
            depth: 0,
            parent: Weak::new(),
            entries: RwLock::new(HashMap::new()),
        })
    }

    pub(crate) fn child_of(parent: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            depth: parent.depth + 1,
            parent: Arc::downgrade(parent),
            entries: RwLock::new(HashMap::new()),
        })
    }

    /// Distance from the root scope (the root is 0)
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Whether this is the root scope
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.depth == 0
    }

    /// Parent scope, if it is still alive
    #[must_use]
    pub fn parent(&self) -> Option<Arc<Self>> {
        self.parent.upgrade()
    }

    /// Store a value in this scope, replacing any previous value for its key
    pub fn insert<T: Registrable>(&self, value: Arc<T>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(T::KEY, value);
    }

    /// Whether this scope (ignoring ancestors) holds a value for `key`
    #[must_use]
    pub fn contains_local(&self, key: ScopeKey) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key)
    }

    /// Number of values held by this scope alone
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether this scope holds no values of its own
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the nearest value for `T`, walking from this scope to the root
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::NotFound`] when no scope in the chain holds
    /// `T::KEY`, or [`ScopeError::TypeMismatch`] when the nearest value has
    /// another type.
    pub fn find<T: Registrable>(&self) -> Result<Arc<T>, ScopeError> {
        if let Some(entry) = self.local_entry(T::KEY) {
            return entry.downcast::<T>().map_err(|_| ScopeError::TypeMismatch {
                key: T::KEY,
                expected: type_name::<T>(),
            });
        }

        let mut next = self.parent();
        while let Some(scope) = next {
            if let Some(entry) = scope.local_entry(T::KEY) {
                return entry.downcast::<T>().map_err(|_| ScopeError::TypeMismatch {
                    key: T::KEY,
                    expected: type_name::<T>(),
                });
            }
            next = scope.parent();
        }

        Err(ScopeError::NotFound { key: T::KEY })
    }

    fn local_entry(&self, key: ScopeKey) -> Option<Entry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<ScopeKey> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        f.debug_struct("Scope")
            .field("depth", &self.depth)
            .field("keys", &keys)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Marker(u32);

    impl Registrable for Marker {
        const KEY: ScopeKey = ScopeKey::Named("marker");
    }

    struct Impostor;

    impl Registrable for Impostor {
        const KEY: ScopeKey = ScopeKey::Named("marker");
    }

    #[test]
    fn test_find_walks_to_parent() {
        let root = Scope::root();
        root.insert(Arc::new(Marker(1)));
        let child = Scope::child_of(&root);

        assert_eq!(*child.find::<Marker>().unwrap(), Marker(1));
        assert!(!child.contains_local(ScopeKey::Named("marker")));
        assert_eq!(child.depth(), 1);
    }

    #[test]
    fn test_child_value_shadows_parent() {
        let root = Scope::root();
        root.insert(Arc::new(Marker(1)));
        let child = Scope::child_of(&root);
        child.insert(Arc::new(Marker(2)));

        assert_eq!(*child.find::<Marker>().unwrap(), Marker(2));
        assert_eq!(*root.find::<Marker>().unwrap(), Marker(1));
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let root = Scope::root();
        root.insert(Arc::new(Impostor));

        let err = root.find::<Marker>().unwrap_err();
        assert!(matches!(err, ScopeError::TypeMismatch { .. }));
    }

    #[test]
    fn test_dropped_parent_ends_chain() {
        let root = Scope::root();
        root.insert(Arc::new(Marker(1)));
        let child = Scope::child_of(&root);
        drop(root);

        assert!(child.parent().is_none());
        assert_eq!(
            child.find::<Marker>().unwrap_err(),
            ScopeError::NotFound {
                key: ScopeKey::Named("marker")
            }
        );
    }

    #[test]
    fn test_not_found_maps_to_app_error() {
        let err: AppError = ScopeError::NotFound {
            key: ScopeKey::Request,
        }
        .into();
        assert_eq!(err.code, ErrorCode::ResourceNotFound);
        assert!(err.message.contains("request"));
    }
}
