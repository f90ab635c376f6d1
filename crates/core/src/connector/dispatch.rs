use std::collections::HashMap;

use serde_json::{json, Value};

use crate::acl::User;
use crate::vfs::NodeId;

use super::driver::{Driver, DriverError, FileContent, Upload};
use super::params::{self, ALLOWED_PARAMS};

/// A decoded request: scalar parameters plus the repeated `targets[]`
/// and `upload[]` fields.
///
/// Transports build one of these from whatever they speak (query
/// strings, multipart forms) and hand it to the dispatcher. Parameters
/// outside the protocol's allowed set are dropped on insert.
#[derive(Debug, Default, Clone)]
pub struct ParamBag {
    params: HashMap<String, String>,
    targets: Vec<String>,
    files: Vec<Upload>,
}

impl ParamBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        if ALLOWED_PARAMS.contains(&key) {
            self.params.insert(key.to_string(), value.into());
        } else {
            tracing::debug!("dropping unknown parameter '{}'", key);
        }
        self
    }

    pub fn add_target(&mut self, hash: impl Into<String>) -> &mut Self {
        self.targets.push(hash.into());
        self
    }

    pub fn add_file(&mut self, file: Upload) -> &mut Self {
        self.files.push(file);
        self
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    fn require(&self, key: &'static str) -> Result<&str, DriverError> {
        self.get(key).ok_or(DriverError::MissingParameter(key))
    }

    fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some("1") | Some("true"))
    }

    fn hash(&self, key: &'static str) -> Result<NodeId, DriverError> {
        parse_hash(self.require(key)?)
    }

    fn hashes(&self) -> Result<Vec<NodeId>, DriverError> {
        self.targets.iter().map(|h| parse_hash(h)).collect()
    }
}

fn parse_hash(raw: &str) -> Result<NodeId, DriverError> {
    raw.parse()
        .map_err(|_| DriverError::UnknownHash(raw.to_string()))
}

/// How the transport should answer: almost every command produces a
/// json body, except `file` which resolves to blob content.
#[derive(Debug)]
pub enum Response {
    Json(Value),
    Content(FileContent),
}

impl Response {
    fn error(message: impl std::fmt::Display) -> Self {
        Response::Json(json!({ "error": message.to_string() }))
    }
}

/// Stateless command front over a [`Driver`].
///
/// Each call carries the caller's declared root and identity; nothing
/// is remembered between requests. Failures never surface as transport
/// errors, they become an `{"error": ...}` body the client renders.
#[derive(Clone)]
pub struct Dispatcher {
    driver: Driver,
}

impl Dispatcher {
    pub fn new(driver: Driver) -> Self {
        Self { driver }
    }

    pub async fn dispatch(&self, root: NodeId, bag: &ParamBag, user: &User) -> Response {
        let cmd = match bag.get("cmd") {
            Some(cmd) => cmd.to_string(),
            None => return Response::error("no cmd parameter found in the request"),
        };
        tracing::debug!(%cmd, %root, user = %user.id, "dispatching");

        match self.run(&cmd, root, bag, user).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(%cmd, "command failed: {}", err);
                Response::error(err)
            }
        }
    }

    async fn run(
        &self,
        cmd: &str,
        root: NodeId,
        bag: &ParamBag,
        user: &User,
    ) -> Result<Response, DriverError> {
        let value = match cmd {
            "open" => {
                let target = match bag.get("target") {
                    Some(raw) => Some(parse_hash(raw)?),
                    None => None,
                };
                let mut body = self
                    .driver
                    .open(target, bag.flag("tree"), root, user)
                    .await?;
                if bag.flag("init") {
                    merge(&mut body, params::init_params());
                }
                body
            }
            "tree" => self.driver.tree(bag.hash("target")?, root, user).await?,
            "parents" => self.driver.parents(bag.hash("target")?, root, user).await?,
            "list" => self.driver.list(bag.hash("target")?, root, user).await?,
            "mkdir" => {
                self.driver
                    .mkdir(bag.require("name")?, bag.hash("target")?, root, user)
                    .await?
            }
            "mkfile" => {
                self.driver
                    .mkfile(bag.require("name")?, bag.hash("target")?, root, user)
                    .await?
            }
            "rename" => {
                self.driver
                    .rename(bag.require("name")?, bag.hash("target")?, root, user)
                    .await?
            }
            "rm" => self.driver.remove(&bag.hashes()?, user).await?,
            "paste" => {
                self.driver
                    .paste(
                        &bag.hashes()?,
                        bag.hash("src")?,
                        bag.hash("dst")?,
                        bag.flag("cut"),
                        root,
                        user,
                    )
                    .await?
            }
            "upload" => {
                self.driver
                    .upload(bag.hash("target")?, &bag.files, root, user)
                    .await?
            }
            "size" => self.driver.size(&bag.hashes()?, user).await?,
            "search" => {
                let scope = match bag.get("root") {
                    Some(raw) => parse_hash(raw)?,
                    None => root,
                };
                self.driver.search(bag.require("q")?, scope, user).await?
            }
            "file" => {
                let content = self.driver.file(bag.hash("target")?, user).await?;
                return Ok(Response::Content(content));
            }
            other => return Err(DriverError::UnknownCommand(other.to_string())),
        };
        Ok(Response::Json(value))
    }
}

/// Overlay `extra`'s top-level keys onto `body`; the command's own keys
/// win on conflict.
fn merge(body: &mut Value, extra: Value) {
    if let (Value::Object(body), Value::Object(extra)) = (body, extra) {
        for (key, value) in extra {
            body.entry(key).or_insert(value);
        }
    }
}
