//! Record stores: one-shot reads of the JSON value at a path.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::types::{SyncError, SyncResult};

/// Source of records. `read` returns the whole value at `path` in one shot,
/// or `None` when nothing is stored there.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn read(&self, path: &str) -> SyncResult<Option<Value>>;
}

/// Non-empty segments of a `/`-separated path.
fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// In-memory JSON tree.
pub struct MemoryStore {
    root: RwLock<Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_value(Value::Null)
    }

    pub fn from_value(root: Value) -> Self {
        Self {
            root: RwLock::new(root),
        }
    }

    /// Load the tree from a JSON file.
    pub fn from_file(path: &Path) -> SyncResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SyncError::StoreFailure(format!("failed to read {}: {e}", path.display()))
        })?;
        let root: Value = serde_json::from_str(&text).map_err(|e| {
            SyncError::StoreFailure(format!("failed to parse {}: {e}", path.display()))
        })?;
        tracing::info!("loaded record store from {}", path.display());
        Ok(Self::from_value(root))
    }

    /// Store `value` at `path`, creating intermediate objects.
    pub async fn set(&self, path: &str, value: Value) {
        let mut root = self.root.write().await;
        let mut node = &mut *root;
        for seg in segments(path) {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            node = &mut node[seg];
        }
        *node = value;
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read(&self, path: &str) -> SyncResult<Option<Value>> {
        let root = self.root.read().await;
        let mut node = &*root;
        for seg in segments(path) {
            let next = match node {
                Value::Object(map) => map.get(seg),
                Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match next {
                Some(v) => node = v,
                None => return Ok(None),
            }
        }
        Ok(match node {
            Value::Null => None,
            other => Some(other.clone()),
        })
    }
}

/// Firebase Realtime Database, read over its REST API.
///
/// `GET {database_url}/{path}.json[?auth=token]`; a `null` body means no value.
#[derive(Clone)]
pub struct RealtimeDbStore {
    client: reqwest::Client,
    database_url: String,
    auth_token: Option<String>,
}

impl RealtimeDbStore {
    pub fn new(database_url: &str, auth_token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sheet-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            database_url: database_url.trim_end_matches('/').to_string(),
            auth_token,
        }
    }

    /// REST URL of the value at `path`.
    pub fn url_for(&self, path: &str) -> SyncResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.database_url)
            .map_err(|e| SyncError::Config(format!("invalid database url: {e}")))?;
        {
            let mut segs = url
                .path_segments_mut()
                .map_err(|_| SyncError::Config("database url cannot have a path".into()))?;
            segs.pop_if_empty();
            let parts: Vec<&str> = segments(path).collect();
            match parts.split_last() {
                Some((last, rest)) => {
                    segs.extend(rest);
                    segs.push(&format!("{last}.json"));
                }
                None => {
                    segs.push(".json");
                }
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl RecordStore for RealtimeDbStore {
    async fn read(&self, path: &str) -> SyncResult<Option<Value>> {
        let url = self.url_for(path)?;
        tracing::debug!("GET {url}");

        let mut req = self.client.get(url);
        if let Some(ref token) = self.auth_token {
            req = req.query(&[("auth", token)]);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| SyncError::StoreFailure(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| SyncError::StoreFailure(e.to_string()))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(text);
            return Err(SyncError::StoreFailure(format!("HTTP {status}: {detail}")));
        }

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| SyncError::StoreFailure(format!("invalid JSON from store: {e}")))?;
        Ok(match value {
            Value::Null => None,
            other => Some(other),
        })
    }
}
