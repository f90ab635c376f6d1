//! Shared test utilities for connector integration tests
#![allow(dead_code)]

use std::sync::Arc;

use serde_json::Value;

use finder_core::acl::{Resolver, User};
use finder_core::connector::{Dispatcher, Driver, ParamBag, Response, Upload};
use finder_core::vfs::{MemoryBlobs, MemoryRecords, NodeId, NodeStore, TypeRegistry};

/// Set up a fresh in-memory tree with an allow-everything policy.
pub async fn setup() -> (Dispatcher, NodeStore, NodeId) {
    setup_with(Resolver::allow_all()).await
}

pub async fn setup_with(resolver: Resolver) -> (Dispatcher, NodeStore, NodeId) {
    let store = NodeStore::init(
        Arc::new(MemoryRecords::new()),
        Arc::new(MemoryBlobs::new()),
        TypeRegistry::builtin(),
        "files",
    )
    .await
    .unwrap();
    let dispatcher = Dispatcher::new(Driver::new(store.clone(), resolver));
    (dispatcher, store, NodeId::root())
}

pub fn alice() -> User {
    User::new("alice")
}

pub fn admin() -> User {
    User::superuser("admin")
}

pub fn bag(pairs: &[(&str, &str)]) -> ParamBag {
    let mut bag = ParamBag::new();
    for (key, value) in pairs {
        bag.set(key, *value);
    }
    bag
}

/// Unwrap a json response, panicking on an `{"error": ...}` body.
pub fn body(response: Response) -> Value {
    match response {
        Response::Json(value) => {
            assert!(
                value.get("error").is_none(),
                "unexpected error body: {value}"
            );
            value
        }
        Response::Content(content) => {
            panic!("expected a json body, got content for '{}'", content.name)
        }
    }
}

/// Unwrap the error message out of an `{"error": ...}` body.
pub fn error(response: Response) -> String {
    match response {
        Response::Json(value) => value["error"]
            .as_str()
            .unwrap_or_else(|| panic!("expected an error body, got {value}"))
            .to_string(),
        Response::Content(content) => {
            panic!("expected an error body, got content for '{}'", content.name)
        }
    }
}

pub async fn mkdir(
    dispatcher: &Dispatcher,
    root: NodeId,
    parent: &str,
    name: &str,
    user: &User,
) -> String {
    let request = bag(&[("cmd", "mkdir"), ("target", parent), ("name", name)]);
    let added = body(dispatcher.dispatch(root, &request, user).await);
    added["added"][0]["hash"].as_str().unwrap().to_string()
}

pub async fn upload_one(
    dispatcher: &Dispatcher,
    root: NodeId,
    parent: &str,
    name: &str,
    content: &[u8],
    user: &User,
) -> String {
    let mut request = bag(&[("cmd", "upload"), ("target", parent)]);
    request.add_file(Upload::new(name, content.to_vec()));
    let added = body(dispatcher.dispatch(root, &request, user).await);
    added["added"][0]["hash"].as_str().unwrap().to_string()
}

/// Names in a descriptor array, for order-insensitive assertions.
pub fn names(descriptors: &Value) -> Vec<String> {
    let mut names: Vec<String> = descriptors
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    names
}
