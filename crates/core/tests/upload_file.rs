//! Integration tests for upload and the file content command

mod common;

use common::{bag, body, error, mkdir, upload_one};
use finder_core::connector::{Response, Upload};

#[tokio::test]
async fn upload_stores_content_and_guesses_the_mimetype() {
    let (dispatcher, store, root) = common::setup().await;
    let user = common::alice();

    let mut request = bag(&[("cmd", "upload"), ("target", &root.to_string())]);
    request.add_file(Upload::new("report.pdf", b"%PDF-1.4".to_vec()));
    request.add_file(Upload::new("notes.txt", vec![7u8; 120]));
    let out = body(dispatcher.dispatch(root, &request, &user).await);

    let added = out["added"].as_array().unwrap();
    assert_eq!(added.len(), 2);
    assert_eq!(added[0]["mime"], "application/pdf");
    assert_eq!(added[1]["name"], "notes.txt");
    assert_eq!(added[1]["size"], 120);
    assert_eq!(added[1]["mime"], "text/plain");

    let hash = added[1]["hash"].as_str().unwrap();
    let node = store.get(hash.parse().unwrap()).await.unwrap();
    let blob = node.kind.blob().unwrap();
    let bytes = store.blobs().get(blob.id).await.unwrap();
    assert_eq!(bytes.len(), 120);
    assert_eq!(node.owner.as_deref(), Some("alice"));
}

#[tokio::test]
async fn uploaded_images_carry_their_dimensions() {
    let (dispatcher, _, root) = common::setup().await;

    let mut request = bag(&[("cmd", "upload"), ("target", &root.to_string())]);
    request.add_file(Upload::new("photo.png", b"\x89PNG".to_vec()).with_dimensions(800, 600));
    let out = body(dispatcher.dispatch(root, &request, &common::alice()).await);

    let added = &out["added"][0];
    assert_eq!(added["mime"], "image/png");
    assert_eq!(added["dim"], "800x600");
}

#[tokio::test]
async fn upload_collision_persists_nothing() {
    let (dispatcher, _, root) = common::setup().await;
    let user = common::alice();
    let top = root.to_string();

    upload_one(&dispatcher, root, &top, "taken.txt", b"old", &user).await;

    let mut request = bag(&[("cmd", "upload"), ("target", &top)]);
    request.add_file(Upload::new("fresh.txt", b"1".to_vec()));
    request.add_file(Upload::new("taken.txt", b"2".to_vec()));
    let message = error(dispatcher.dispatch(root, &request, &user).await);
    assert_eq!(message, "'taken.txt' already exists in the destination folder");

    let out = body(dispatcher.dispatch(root, &bag(&[("cmd", "open")]), &user).await);
    assert_eq!(common::names(&out["files"]), vec!["taken.txt"]);
}

#[tokio::test]
async fn upload_rejects_duplicate_names_inside_the_batch() {
    let (dispatcher, _, root) = common::setup().await;

    let mut request = bag(&[("cmd", "upload"), ("target", &root.to_string())]);
    request.add_file(Upload::new("same.txt", b"1".to_vec()));
    request.add_file(Upload::new("same.txt", b"2".to_vec()));
    let message = error(dispatcher.dispatch(root, &request, &common::alice()).await);
    assert_eq!(message, "'same.txt' already exists in the destination folder");
}

#[tokio::test]
async fn file_resolves_blob_content_for_the_transport() {
    let (dispatcher, store, root) = common::setup().await;
    let user = common::alice();

    let hash = upload_one(&dispatcher, root, &root.to_string(), "a.txt", b"hello", &user).await;
    let request = bag(&[("cmd", "file"), ("target", &hash)]);

    match dispatcher.dispatch(root, &request, &user).await {
        Response::Content(content) => {
            assert_eq!(content.name, "a.txt");
            assert_eq!(content.mime, "text/plain");
            assert_eq!(content.blob.len, 5);
            let bytes = store.blobs().get(content.blob.id).await.unwrap();
            assert_eq!(&bytes[..], b"hello");
        }
        Response::Json(value) => panic!("expected content, got {value}"),
    }
}

#[tokio::test]
async fn file_on_a_folder_is_an_error() {
    let (dispatcher, _, root) = common::setup().await;
    let user = common::alice();

    let docs = mkdir(&dispatcher, root, &root.to_string(), "docs", &user).await;
    let message = error(
        dispatcher
            .dispatch(root, &bag(&[("cmd", "file"), ("target", &docs)]), &user)
            .await,
    );
    assert_eq!(message, "'docs' is not a file");
}
