// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use crate::credentials::MemoryCredentialStore;
use crate::sync::test_helpers::{mock_pair, project_tree, seed, wait_until, FakeServer, PROJECT, ROOT};
use crate::sync::ChangeKind;
use otfs_core::protocol::{ClientMessage, ServerMessage};
use otfs_core::{DocKind, Op};
use std::time::Duration;

fn registry(server: &FakeServer) -> Registry {
    Registry::new(
        Config::default(),
        Arc::new(MemoryCredentialStore::with_token("t0k")),
        server.factory(),
    )
}

fn snapshot_requests(server: &FakeServer) -> usize {
    server
        .frames()
        .iter()
        .filter(|f| matches!(f, ClientMessage::GetSnapshot { .. }))
        .count()
}

#[tokio::test]
async fn test_get_connects_once_and_takes_snapshot() {
    let server = FakeServer::with_project();
    let registry = registry(&server);

    let session = registry.get(PROJECT).await.unwrap();
    assert_eq!(session.root_id().as_deref(), Some(ROOT));
    assert_eq!(
        server.urls(),
        vec![format!("ws://localhost:7890/{PROJECT}/ot?authorization=t0k")]
    );

    let again = registry.get(PROJECT).await.unwrap();
    assert_eq!(again.root_id().as_deref(), Some(ROOT));
    assert_eq!(server.urls().len(), 1);
    assert_eq!(snapshot_requests(&server), 1);
}

#[tokio::test]
async fn test_concurrent_gets_share_one_connect() {
    let server = FakeServer::with_project();
    let registry = Arc::new(registry(&server));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.get(PROJECT).await.map(|s| s.version()) })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(server.urls().len(), 1);
}

#[tokio::test]
async fn test_projects_get_separate_sessions() {
    let server = FakeServer::with_project();
    let registry = registry(&server);

    registry.get("p-one").await.unwrap();
    registry.get("p-two").await.unwrap();
    assert_eq!(server.urls().len(), 2);
    assert!(registry.peek("p-one").is_some());
    assert!(registry.peek("p-three").is_none());
}

#[tokio::test]
async fn test_missing_token_is_not_authenticated() {
    let server = FakeServer::with_project();
    let registry = Registry::new(Config::default(), Arc::new(MemoryCredentialStore::new()), server.factory());

    let result = registry.get(PROJECT).await;
    assert!(matches!(result, Err(Error::NotAuthenticated)));
    assert!(server.urls().is_empty());
}

#[tokio::test]
async fn test_connect_timeout() {
    let config = Config {
        connect_timeout_secs: 0,
        ..Config::default()
    };
    let factory = Arc::new(|| {
        let (mut transport, _remote) = mock_pair();
        transport.set_connect_hang(true);
        Box::new(transport) as Box<dyn Transport>
    });
    let registry = Registry::new(config, Arc::new(MemoryCredentialStore::with_token("t")), factory);

    let result = registry.get(PROJECT).await;
    assert!(matches!(result, Err(Error::Timeout(_))));
}

#[tokio::test]
async fn test_connect_failure_is_retried_on_next_get() {
    let server = FakeServer::with_project();
    let failing = Arc::new(std::sync::atomic::AtomicBool::new(true));
    let factory = {
        let server = server.clone();
        let failing = Arc::clone(&failing);
        Arc::new(move || {
            let mut transport = server.transport();
            transport.set_connect_fail(failing.load(std::sync::atomic::Ordering::SeqCst));
            Box::new(transport) as Box<dyn Transport>
        })
    };
    let registry = Registry::new(Config::default(), Arc::new(MemoryCredentialStore::with_token("t")), factory);

    assert!(matches!(registry.get(PROJECT).await, Err(Error::Transport(_))));
    failing.store(false, std::sync::atomic::Ordering::SeqCst);
    registry.get(PROJECT).await.unwrap();
}

#[tokio::test]
async fn test_dead_session_is_replaced() {
    let server = FakeServer::with_project();
    let registry = registry(&server);

    let first = registry.get(PROJECT).await.unwrap();
    first.dispose();
    assert!(registry.peek(PROJECT).is_none());

    let second = registry.get(PROJECT).await.unwrap();
    assert!(!second.is_closed());
    assert_eq!(server.urls().len(), 2);
}

#[tokio::test]
async fn test_dispose_and_dispose_all() {
    let server = FakeServer::with_project();
    let registry = registry(&server);

    let one = registry.get("p-one").await.unwrap();
    let two = registry.get("p-two").await.unwrap();

    registry.dispose("p-one");
    assert!(one.is_closed());
    assert!(!two.is_closed());

    registry.dispose_all();
    assert!(two.is_closed());
    assert!(registry.peek("p-two").is_none());
}

#[tokio::test]
async fn test_watched_paths_primed_on_connect() {
    let mut tree = project_tree();
    seed(&mut tree, vec![
        Op::add(DocKind::Directory, "src", ROOT, "d-src"),
        Op::add(DocKind::File, "main.rs", "d-src", "f-main"),
    ]);
    let server = FakeServer::new(tree);
    let registry = registry(&server);

    let id = registry.add_watch(PROJECT, "/src/main.rs");
    registry.add_watch(PROJECT, "/missing");
    assert_eq!(registry.watched_paths(PROJECT), vec!["/src/main.rs", "/missing"]);

    let session = registry.get(PROJECT).await.unwrap();
    assert!(session.document("f-main").is_some());

    registry.remove_watch(PROJECT, id);
    assert_eq!(registry.watched_paths(PROJECT), vec!["/missing"]);
}

#[tokio::test]
async fn test_remote_changes_reach_subscribers() {
    let server = FakeServer::with_project();
    let registry = registry(&server);
    let mut changes = registry.subscribe();

    let session = registry.get(PROJECT).await.unwrap();
    session.resolve::<&str>(&[]).await.unwrap();
    server.push_remote(vec![Op::add(DocKind::File, "new.txt", ROOT, "f1")]);

    let change = tokio::time::timeout(Duration::from_secs(2), changes.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(change.project_id, PROJECT);
    assert_eq!(change.path, "/new.txt");
    assert_eq!(change.kind, ChangeKind::Created);
    wait_until(|| session.version() == 1).await;
}

#[tokio::test]
async fn test_dispose_during_connect_orphans_nothing() {
    let remotes = Arc::new(std::sync::Mutex::new(Vec::new()));
    let factory = {
        let remotes = Arc::clone(&remotes);
        Arc::new(move || {
            let (transport, remote) = mock_pair();
            remotes.lock().unwrap().push(remote);
            Box::new(transport) as Box<dyn Transport>
        })
    };
    let registry = Arc::new(Registry::new(
        Config::default(),
        Arc::new(MemoryCredentialStore::with_token("t")),
        factory,
    ));

    let pending = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.get(PROJECT).await })
    };
    wait_until(|| !remotes.lock().unwrap().is_empty()).await;
    let mut remote = remotes.lock().unwrap().pop().unwrap();
    assert!(matches!(remote.next_frame().await, ClientMessage::GetSnapshot { .. }));

    registry.dispose(PROJECT);
    remote.deliver(ServerMessage::snapshot(0, ROOT));

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(Error::ConnectionClosed(_))));
    assert!(registry.peek(PROJECT).is_none());

    // The orphaned channel is torn down.
    remote.wait_dropped().await;
}
