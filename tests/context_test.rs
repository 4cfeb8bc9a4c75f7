// ABOUTME: Integration tests for hierarchical scoped contexts
// ABOUTME: Validates lookup fallback, shadowing, release on every exit path, and fork isolation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use scoped_web::context::{Context, Registrable, ScopeError, ScopeKey};
use scoped_web::errors::{AppError, ErrorCode};
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, PartialEq, Eq)]
struct Tenant(&'static str);

impl Registrable for Tenant {
    const KEY: ScopeKey = ScopeKey::Named("tenant");
}

#[derive(Debug)]
struct Greeting(String);

impl Registrable for Greeting {
    const KEY: ScopeKey = ScopeKey::Named("greeting");
}

#[test]
fn test_child_sees_root_registrations() {
    common::init_test_logging();
    let ctx = Context::new();
    ctx.register(Tenant("acme"));

    let _child = ctx.push_child();
    let _grandchild = ctx.push_child();

    assert_eq!(ctx.depth(), 2);
    assert_eq!(*ctx.lookup::<Tenant>().unwrap(), Tenant("acme"));
}

#[test]
fn test_child_registration_shadows_only_inside_child() {
    let ctx = Context::new();
    ctx.register(Tenant("root"));

    {
        let _child = ctx.push_child();
        ctx.register(Tenant("child"));
        assert_eq!(ctx.lookup::<Tenant>().unwrap().0, "child");
    }

    assert_eq!(ctx.depth(), 0);
    assert_eq!(ctx.lookup::<Tenant>().unwrap().0, "root");
}

#[test]
fn test_second_registration_in_same_scope_replaces_first() {
    let ctx = Context::new();
    ctx.register(Tenant("root"));

    let _child = ctx.push_child();
    ctx.register(Tenant("a"));
    ctx.register(Tenant("b"));

    assert_eq!(ctx.lookup::<Tenant>().unwrap().0, "b");
    assert_eq!(ctx.current().len(), 1);
    assert_eq!(ctx.root().find::<Tenant>().unwrap().0, "root");
}

#[test]
fn test_missing_value_is_not_found() {
    let ctx = Context::new();
    let _child = ctx.push_child();

    let err = ctx.lookup::<Greeting>().unwrap_err();
    assert_eq!(
        err,
        ScopeError::NotFound {
            key: ScopeKey::Named("greeting")
        }
    );

    let app_err: AppError = err.into();
    assert_eq!(app_err.code, ErrorCode::ResourceNotFound);
}

#[test]
fn test_values_registered_in_released_scope_disappear() {
    let ctx = Context::new();
    {
        let _child = ctx.push_child();
        ctx.register(Greeting("hello".to_owned()));
        assert!(ctx.get::<Greeting>().is_some());
    }
    assert!(ctx.get::<Greeting>().is_none());
}

#[test]
fn test_scope_released_when_work_fails() {
    fn fallible(ctx: &Context) -> Result<(), AppError> {
        let _scope = ctx.push_child();
        ctx.register(Greeting("doomed".to_owned()));
        Err(AppError::internal("handler failed"))
    }

    let ctx = Context::new();
    assert!(fallible(&ctx).is_err());
    assert_eq!(ctx.depth(), 0);
    assert!(ctx.get::<Greeting>().is_none());
}

#[tokio::test]
async fn test_scope_released_when_future_is_cancelled() {
    let ctx = Context::new();
    let task_ctx = ctx.clone();

    let outcome = tokio::time::timeout(Duration::from_millis(20), async move {
        let _scope = task_ctx.push_child();
        task_ctx.register(Greeting("slow".to_owned()));
        tokio::time::sleep(Duration::from_secs(5)).await;
    })
    .await;

    assert!(outcome.is_err());
    assert_eq!(ctx.depth(), 0);
    assert!(ctx.get::<Greeting>().is_none());
}

#[tokio::test]
async fn test_concurrent_forks_do_not_observe_each_other() {
    let root = Context::new();
    root.register(Tenant("shared"));

    let (a_ready, a_wait) = oneshot::channel::<()>();
    let (b_ready, b_wait) = oneshot::channel::<()>();

    let first = {
        let ctx = root.fork();
        tokio::spawn(async move {
            let _scope = ctx.push_child();
            ctx.register(Greeting("first".to_owned()));
            a_ready.send(()).unwrap();
            b_wait.await.unwrap();
            (
                ctx.lookup::<Greeting>().unwrap().0.clone(),
                ctx.lookup::<Tenant>().unwrap().0,
            )
        })
    };
    let second = {
        let ctx = root.fork();
        tokio::spawn(async move {
            let _scope = ctx.push_child();
            a_wait.await.unwrap();
            ctx.register(Greeting("second".to_owned()));
            b_ready.send(()).unwrap();
            ctx.lookup::<Greeting>().unwrap().0.clone()
        })
    };

    assert_eq!(first.await.unwrap(), ("first".to_owned(), "shared"));
    assert_eq!(second.await.unwrap(), "second");
    assert_eq!(root.depth(), 0);
    assert!(root.get::<Greeting>().is_none());
}

#[test]
fn test_fork_keeps_ancestors_alive() {
    let ctx = Context::new();
    let forked = {
        let _scope = ctx.push_child();
        ctx.register(Greeting("inner".to_owned()));
        ctx.fork()
    };

    // The first context released its child; the fork still holds the chain
    assert!(ctx.get::<Greeting>().is_none());
    assert_eq!(forked.depth(), 1);
    assert_eq!(forked.lookup::<Greeting>().unwrap().0, "inner");
}
