// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use crate::sync::session::SessionOptions;
use crate::sync::test_helpers::{project_tree, seed, seed_binary, FakeServer, ROOT};
use otfs_core::protocol::ClientMessage;
use std::sync::atomic::{AtomicU32, Ordering};

/// A session with the snapshot taken and the project directory loaded.
async fn connect(server: &FakeServer) -> Session {
    let session = Session::open("ws://fake/p/ot", Box::new(server.transport()), SessionOptions::default())
        .await
        .unwrap();
    session.resolve::<&str>(&[]).await.unwrap();
    session
}

fn child_id(session: &Session, parent_id: &str, name: &str) -> Option<String> {
    session.with_tree(|tree| tree.child(parent_id, name).map(|c| c.doc_id.clone()))
}

fn last_batch_ops(server: &FakeServer) -> Vec<Op> {
    server
        .frames()
        .into_iter()
        .rev()
        .find_map(|frame| match frame {
            ClientMessage::SubmitBatch { batch } => Some(batch.ops),
            _ => None,
        })
        .unwrap()
}

#[tokio::test]
async fn test_create_directory_applies_after_acceptance() {
    let server = FakeServer::with_project();
    let session = connect(&server).await;

    session.create_directory(ROOT, "src").await.unwrap();

    assert_eq!(session.version(), 1);
    let id = child_id(&session, ROOT, "src").unwrap();
    assert_eq!(id.len(), 32);
    assert!(session.document(&id).unwrap().is_directory());
    assert_eq!(session.path_of(&id).unwrap(), vec!["src".to_string()]);
    assert_eq!(server.with_tree(|t| t.child(ROOT, "src").cloned()).unwrap().doc_id, id);
}

#[tokio::test]
async fn test_create_file_sends_add_and_insert() {
    let server = FakeServer::with_project();
    let session = connect(&server).await;

    session.create_file(ROOT, "notes.md", "# hi").await.unwrap();

    let ops = last_batch_ops(&server);
    assert_eq!(ops.len(), 2);
    assert!(matches!(&ops[0], Op::Add { kind: DocKind::File, name, parent_id, .. } if name == "notes.md" && parent_id == ROOT));
    assert!(matches!(&ops[1], Op::Insert { position: 0, text, .. } if text == "# hi"));
    assert_eq!(ops[0].doc_id(), ops[1].doc_id());

    let id = child_id(&session, ROOT, "notes.md").unwrap();
    assert_eq!(session.document(&id).unwrap().text(), Some("# hi"));
}

#[tokio::test]
async fn test_create_file_redundant_after_remote_add() {
    let server = FakeServer::with_project();
    let session = connect(&server).await;

    server.push_remote(vec![Op::add(DocKind::File, "a.txt", ROOT, "remote-a")]);
    crate::sync::test_helpers::wait_until(|| session.version() == 1).await;

    session.create_file(ROOT, "a.txt", "mine").await.unwrap();
    assert_eq!(server.submissions(), 0);
    assert_eq!(child_id(&session, ROOT, "a.txt").as_deref(), Some("remote-a"));
}

#[tokio::test]
async fn test_create_over_other_kind_is_already_exists() {
    let mut tree = project_tree();
    seed(&mut tree, vec![Op::add(DocKind::File, "x", ROOT, "f1")]);
    let server = FakeServer::new(tree);
    let session = connect(&server).await;

    let result = session.create_directory(ROOT, "x").await;
    assert!(matches!(result, Err(Error::AlreadyExists(ref name)) if name == "x"));
    assert_eq!(server.submissions(), 0);
}

#[tokio::test]
async fn test_create_under_missing_parent_is_redundant() {
    let server = FakeServer::with_project();
    let session = connect(&server).await;

    session.create_directory("gone", "d").await.unwrap();
    assert_eq!(server.submissions(), 0);
    assert_eq!(session.version(), 0);
}

#[tokio::test]
async fn test_create_under_file_is_not_a_directory() {
    let mut tree = project_tree();
    seed(&mut tree, vec![Op::add(DocKind::File, "x", ROOT, "f1")]);
    let server = FakeServer::new(tree);
    let session = connect(&server).await;
    session.require_document("f1").await.unwrap();

    let result = session.create_file("f1", "y", "").await;
    assert!(matches!(result, Err(Error::NotADirectory(_))));
}

#[tokio::test]
async fn test_delete() {
    let mut tree = project_tree();
    seed(&mut tree, vec![Op::add(DocKind::Directory, "d", ROOT, "d1")]);
    let server = FakeServer::new(tree);
    let session = connect(&server).await;
    session.require_document("d1").await.unwrap();

    session.delete("d1").await.unwrap();
    assert!(child_id(&session, ROOT, "d").is_none());
    assert!(session.document("d1").is_none());

    // Already gone.
    session.delete("d1").await.unwrap();
    assert_eq!(server.submissions(), 1);
}

#[tokio::test]
async fn test_delete_below_deleted_directory_is_redundant() {
    let mut tree = project_tree();
    seed(&mut tree, vec![
        Op::add(DocKind::Directory, "d", ROOT, "d1"),
        Op::add(DocKind::File, "f.txt", "d1", "f1"),
    ]);
    let server = FakeServer::new(tree);
    let session = connect(&server).await;
    session.require_document("d1").await.unwrap();
    session.require_document("f1").await.unwrap();

    session.delete("d1").await.unwrap();
    assert!(session.document("f1").is_none());

    session.delete("f1").await.unwrap();
    assert_eq!(server.submissions(), 1);
}

#[tokio::test]
async fn test_delete_root_unsupported() {
    let server = FakeServer::with_project();
    let session = connect(&server).await;
    assert!(matches!(session.delete(ROOT).await, Err(Error::Unsupported(_))));
}

#[tokio::test]
async fn test_rename_prechecks() {
    let mut tree = project_tree();
    seed(&mut tree, vec![
        Op::add(DocKind::File, "a", ROOT, "f1"),
        Op::add(DocKind::File, "b", ROOT, "f2"),
        Op::add(DocKind::Directory, "d", ROOT, "d1"),
    ]);
    let server = FakeServer::new(tree);
    let session = connect(&server).await;
    for id in ["f1", "f2", "d1"] {
        session.require_document(id).await.unwrap();
    }

    // Already in place.
    session.rename("f1", ROOT, "a").await.unwrap();
    // Occupied by another document.
    assert!(matches!(session.rename("f1", ROOT, "b").await, Err(Error::AlreadyExists(_))));
    // Target parent not loaded, so nothing to do.
    session.rename("f1", "elsewhere", "a").await.unwrap();
    assert_eq!(server.submissions(), 0);

    session.rename("f1", "d1", "moved").await.unwrap();
    assert_eq!(session.path_of("f1").unwrap(), vec!["d".to_string(), "moved".to_string()]);
    assert!(child_id(&session, ROOT, "a").is_none());
}

#[tokio::test]
async fn test_replace_text_cases() {
    let cases = [("", "new"), ("old content", ""), ("short", "a much longer text"), ("héllo", "wörld")];
    for (i, (old, new)) in cases.into_iter().enumerate() {
        let mut tree = project_tree();
        let id = format!("f{i}");
        seed(&mut tree, vec![Op::add(DocKind::File, "t", ROOT, id.clone())]);
        if !old.is_empty() {
            seed(&mut tree, vec![Op::insert(id.clone(), 0, old)]);
        }
        let server = FakeServer::new(tree);
        let session = connect(&server).await;
        session.require_document(&id).await.unwrap();

        session.replace_text(&id, new).await.unwrap();
        assert_eq!(session.document(&id).unwrap().text(), Some(new), "case {old:?} -> {new:?}");
        assert_eq!(server.with_tree(|t| t.document(&id).unwrap().text().map(str::to_string)).as_deref(), Some(new));

        let ops = last_batch_ops(&server);
        assert!(matches!(&ops[0], Op::Remove { position: 0, text, .. } if text == old));
        assert!(matches!(&ops[1], Op::Insert { position: 0, text, .. } if text == new));
    }
}

#[tokio::test]
async fn test_replace_text_equal_content_is_redundant() {
    let mut tree = project_tree();
    seed(&mut tree, vec![Op::add(DocKind::File, "t", ROOT, "f1"), Op::insert("f1", 0, "same")]);
    let server = FakeServer::new(tree);
    let session = connect(&server).await;
    session.require_document("f1").await.unwrap();

    session.replace_text("f1", "same").await.unwrap();
    assert_eq!(server.submissions(), 0);
}

#[tokio::test]
async fn test_replace_binary_recreates_under_new_id() {
    let mut tree = project_tree();
    seed_binary(&mut tree, ROOT, "logo.png", "b1", &[0x89, 0x50, 0x4e, 0x47]);
    let server = FakeServer::new(tree);
    let session = connect(&server).await;
    assert!(session.require_document("b1").await.unwrap().is_binary());

    session.replace_binary("b1", "now text").await.unwrap();

    let ops = last_batch_ops(&server);
    assert_eq!(ops.len(), 3);
    assert_eq!(ops[0], Op::unlink("b1"));
    let new_id = child_id(&session, ROOT, "logo.png").unwrap();
    assert_ne!(new_id, "b1");
    assert_eq!(ops[1].doc_id(), new_id);
    assert_eq!(session.document(&new_id).unwrap().text(), Some("now text"));
    assert!(session.document("b1").is_none());
}

#[tokio::test]
async fn test_retry_rejected_reruns_template() {
    let mut tree = project_tree();
    seed(&mut tree, vec![Op::add(DocKind::File, "t", ROOT, "f1")]);
    let server = FakeServer::new(tree);
    let session = connect(&server).await;
    session.require_document("f1").await.unwrap();

    server.reject_next();
    let attempts = AtomicU32::new(0);
    retry_rejected(1, || {
        attempts.fetch_add(1, Ordering::SeqCst);
        session.replace_text("f1", "v2")
    })
    .await
    .unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(server.submissions(), 2);
    assert_eq!(session.document("f1").unwrap().text(), Some("v2"));
}

#[tokio::test]
async fn test_retry_rejected_gives_up() {
    let server = FakeServer::with_project();
    let session = connect(&server).await;

    server.reject_next();
    let result = retry_rejected(0, || session.create_directory(ROOT, "d")).await;
    assert!(matches!(result, Err(Error::Rejected(_))));
    assert_eq!(session.version(), 0);
}

#[tokio::test]
async fn test_retry_rejected_passes_other_errors_through() {
    let attempts = AtomicU32::new(0);
    let result: Result<()> = retry_rejected(3, || {
        attempts.fetch_add(1, Ordering::SeqCst);
        async { Err(Error::NotFound("x".into())) }
    })
    .await;
    assert!(matches!(result, Err(Error::NotFound(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}
