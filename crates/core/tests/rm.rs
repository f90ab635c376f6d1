//! Integration tests for the rm command

mod common;

use common::{bag, body, mkdir, names, upload_one};
use finder_core::acl::{Action, GrantTable, Resolver};
use finder_core::vfs::NodeId;

#[tokio::test]
async fn rm_removes_a_file_and_its_blob() {
    let (dispatcher, store, root) = common::setup().await;
    let user = common::alice();

    let file = upload_one(&dispatcher, root, &root.to_string(), "a.txt", b"abc", &user).await;
    let file_id: NodeId = file.parse().unwrap();
    let blob = *store.get(file_id).await.unwrap().kind.blob().unwrap();

    let mut request = bag(&[("cmd", "rm")]);
    request.add_target(&file);
    let out = body(dispatcher.dispatch(root, &request, &user).await);

    assert_eq!(out["removed"][0], file);
    assert!(store.get(file_id).await.is_err());
    assert!(store.blobs().get(blob.id).await.is_err());
}

#[tokio::test]
async fn rm_removes_a_whole_subtree() {
    let (dispatcher, store, root) = common::setup().await;
    let user = common::alice();

    let docs = mkdir(&dispatcher, root, &root.to_string(), "docs", &user).await;
    let inner = mkdir(&dispatcher, root, &docs, "inner", &user).await;
    let leaf = upload_one(&dispatcher, root, &inner, "leaf.txt", b"x", &user).await;

    let mut request = bag(&[("cmd", "rm")]);
    request.add_target(&docs);
    body(dispatcher.dispatch(root, &request, &user).await);

    for hash in [&docs, &inner, &leaf] {
        assert!(store.get(hash.parse().unwrap()).await.is_err());
    }
}

#[tokio::test]
async fn rm_skips_unknown_targets_and_keeps_going() {
    let (dispatcher, _, root) = common::setup().await;
    let user = common::alice();

    let keep = upload_one(&dispatcher, root, &root.to_string(), "keep.txt", b"x", &user).await;
    let ghost = NodeId::generate().to_string();

    let mut request = bag(&[("cmd", "rm")]);
    request.add_target(&ghost);
    request.add_target(&keep);
    let out = body(dispatcher.dispatch(root, &request, &user).await);

    let removed = out["removed"].as_array().unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0], keep);
}

#[tokio::test]
async fn rm_skips_targets_the_user_may_not_remove() {
    let policy = GrantTable::new()
        .allow_on_all_kinds(Action::Read, "alice")
        .allow_on_all_kinds(Action::Add, "alice");
    let (dispatcher, store, root) =
        common::setup_with(Resolver::new(std::sync::Arc::new(policy))).await;
    let user = common::alice();

    let file = upload_one(&dispatcher, root, &root.to_string(), "a.txt", b"x", &user).await;

    let mut request = bag(&[("cmd", "rm")]);
    request.add_target(&file);
    let out = body(dispatcher.dispatch(root, &request, &user).await);

    assert!(out["removed"].as_array().unwrap().is_empty());
    assert!(store.get(file.parse().unwrap()).await.is_ok());
}

#[tokio::test]
async fn a_root_target_is_skipped_and_the_batch_continues() {
    let (dispatcher, store, root) = common::setup().await;
    let user = common::alice();

    let file = upload_one(&dispatcher, root, &root.to_string(), "a.txt", b"x", &user).await;

    // the root comes first so a hard failure would abort the rest
    let mut request = bag(&[("cmd", "rm")]);
    request.add_target(&root.to_string());
    request.add_target(&file);
    let out = body(dispatcher.dispatch(root, &request, &user).await);

    let removed = out["removed"].as_array().unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0], file);
    assert!(store.get(root).await.is_ok());

    let remaining = body(dispatcher.dispatch(root, &bag(&[("cmd", "open")]), &user).await);
    assert_eq!(names(&remaining["files"]), Vec::<String>::new());
}
