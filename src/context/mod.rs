// ABOUTME: Hierarchical request-scoped dependency injection context
// ABOUTME: Provides the Context handle, scope push/release guards, and type-keyed lookup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Request-scoped dependency injection context
//!
//! A [`Context`] is the handle one logical task uses to reach the scope tree.
//! It keeps a stack of scopes: the bottom entry is the root scope holding
//! process-lifetime singletons, the top entry is the scope that
//! [`Context::register`] writes into and [`Context::lookup`] starts from.
//!
//! # Architecture
//!
//! - `Scope`: one node of the tree, type-keyed storage with parent fallback
//! - `Context`: per-task stack of scopes; cheap to clone, clones share the stack
//! - `ScopeGuard`: returned by [`Context::push_child`], pops the child on drop
//!
//! Each inbound request works on its own [`Context::fork`], so concurrently
//! handled requests never observe each other's current scope.
//!
//! ```rust
//! use scoped_web::context::{Context, Registrable, ScopeKey};
//!
//! struct Tenant(&'static str);
//! impl Registrable for Tenant {
//!     const KEY: ScopeKey = ScopeKey::Named("tenant");
//! }
//!
//! let ctx = Context::new();
//! {
//!     let _scope = ctx.push_child();
//!     ctx.register(Tenant("acme"));
//!     assert_eq!(ctx.lookup::<Tenant>().map(|t| t.0).ok(), Some("acme"));
//! }
//! assert!(ctx.lookup::<Tenant>().is_err());
//! ```

/// Scope nodes, keys and lookup errors
pub mod scope;

pub use scope::{Registrable, Scope, ScopeError, ScopeKey};

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle to the active chain of scopes for one logical task
#[derive(Clone)]
pub struct Context {
    stack: Arc<Mutex<Vec<Arc<Scope>>>>,
}

impl Context {
    /// Create a context holding a fresh root scope
    #[must_use]
    pub fn new() -> Self {
        Self {
            stack: Arc::new(Mutex::new(vec![Scope::root()])),
        }
    }

    /// Create an independent context starting at this context's current scope
    ///
    /// The fork owns the same chain of scopes, so lookups see everything
    /// visible here, but pushes on either side are not seen by the other.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            stack: Arc::new(Mutex::new(self.lock().clone())),
        }
    }

    /// Scope active for this context
    #[must_use]
    pub fn current(&self) -> Arc<Scope> {
        let stack = self.lock();
        // The root is never popped, so the stack is never empty
        Arc::clone(&stack[stack.len() - 1])
    }

    /// Root scope of this context's chain
    #[must_use]
    pub fn root(&self) -> Arc<Scope> {
        Arc::clone(&self.lock()[0])
    }

    /// Number of scopes above the root
    #[must_use]
    pub fn depth(&self) -> usize {
        self.lock().len() - 1
    }

    /// Open a child of the current scope and make it current
    ///
    /// The child stays current until the returned guard is dropped, which
    /// restores the previous scope whether the enclosed work returned,
    /// failed, panicked, or was cancelled.
    #[must_use = "the child scope is released as soon as the guard is dropped"]
    pub fn push_child(&self) -> ScopeGuard {
        let mut stack = self.lock();
        let restore_len = stack.len();
        let child = Scope::child_of(&stack[restore_len - 1]);
        stack.push(Arc::clone(&child));
        drop(stack);

        ScopeGuard {
            context: self.clone(),
            restore_len,
            scope: child,
        }
    }

    /// Register a value in the current scope, replacing any previous value
    /// for its key in that scope only
    pub fn register<T: Registrable>(&self, value: T) -> Arc<T> {
        self.register_arc(Arc::new(value))
    }

    /// Register an already shared value in the current scope
    pub fn register_arc<T: Registrable>(&self, value: Arc<T>) -> Arc<T> {
        self.current().insert(Arc::clone(&value));
        value
    }

    /// Look up the nearest value for `T`, from the current scope to the root
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::NotFound`] if no scope in the chain holds `T`.
    pub fn lookup<T: Registrable>(&self) -> Result<Arc<T>, ScopeError> {
        self.current().find::<T>()
    }

    /// Look up `T`, returning `None` instead of an error when absent
    #[must_use]
    pub fn get<T: Registrable>(&self) -> Option<Arc<T>> {
        self.lookup::<T>().ok()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Scope>>> {
        self.stack.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("depth", &self.depth())
            .field("current", &self.current())
            .finish()
    }
}

/// Keeps a child scope current until dropped
///
/// Dropping the guard truncates the context stack back to the length it had
/// before the push. Guards dropped out of order are harmless: an outer guard
/// also releases every scope pushed after it.
#[must_use = "the child scope is released as soon as the guard is dropped"]
pub struct ScopeGuard {
    context: Context,
    restore_len: usize,
    scope: Arc<Scope>,
}

impl ScopeGuard {
    /// The scope opened by this guard
    #[must_use]
    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.context.lock().truncate(self.restore_len);
    }
}

impl fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("restore_len", &self.restore_len)
            .field("scope", &self.scope)
            .finish()
    }
}
