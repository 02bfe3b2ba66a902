//! Search-engine client seam.
//!
//! [`SearchEngine`] is the async boundary between the bridge and the engine:
//! index administration, per-document writes, refresh, and raw search.
//! Two implementations:
//!
//! - **[`EsClient`]** — Elasticsearch over HTTP (reqwest). Request/response,
//!   no retry: retry policy belongs to the caller.
//! - **[`MemoryEngine`]** — in-memory engine for tests. Models the one piece
//!   of engine behavior the bridge has to care about: documents written
//!   since the last refresh are invisible to search until `refresh` runs
//!   (GET by id stays realtime, as in Elasticsearch).
//!
//! Deleting an absent index or document is success on both implementations:
//! the desired end state already holds.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use crate::config::EngineConfig;

/// Engine operations the bridge depends on.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Create an index with its settings and mappings body. Fails if the
    /// index already exists.
    async fn create_index(&self, index: &str, body: Value) -> Result<()>;
    /// Delete an index. Deleting an absent index is success.
    async fn delete_index(&self, index: &str) -> Result<()>;
    /// Upsert one document (full replace, never a merge).
    async fn put_document(&self, index: &str, doc_type: &str, id: &str, doc: Value) -> Result<()>;
    /// Delete one document. "Not found" is success.
    async fn delete_document(&self, index: &str, doc_type: &str, id: &str) -> Result<()>;
    /// Fetch one document's source, realtime (independent of refresh).
    async fn get_document(&self, index: &str, doc_type: &str, id: &str) -> Result<Option<Value>>;
    /// Make all writes so far visible to search.
    async fn refresh(&self, index: &str) -> Result<()>;
    /// Execute a search body verbatim and return the raw engine response.
    async fn search(&self, index: &str, doc_type: &str, body: Value) -> Result<Value>;
}

// ============ Elasticsearch client ============

/// Elasticsearch REST client.
pub struct EsClient {
    http: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl EsClient {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, format!("{}/{}", self.base_url, path));
        if let Some(username) = &self.username {
            req = req.basic_auth(username, self.password.as_deref());
        }
        req
    }

    /// Surface a non-success response as an error carrying status and body.
    async fn check(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        bail!("engine error on {}: {} {}", context, status, body);
    }
}

#[async_trait]
impl SearchEngine for EsClient {
    async fn create_index(&self, index: &str, body: Value) -> Result<()> {
        let response = self
            .request(reqwest::Method::PUT, index)
            .json(&body)
            .send()
            .await?;
        Self::check(response, "create index").await?;
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let response = self.request(reqwest::Method::DELETE, index).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response, "delete index").await?;
        Ok(())
    }

    async fn put_document(&self, index: &str, doc_type: &str, id: &str, doc: Value) -> Result<()> {
        let path = format!("{}/{}/{}", index, doc_type, id);
        let response = self
            .request(reqwest::Method::PUT, &path)
            .json(&doc)
            .send()
            .await?;
        Self::check(response, "put document").await?;
        Ok(())
    }

    async fn delete_document(&self, index: &str, doc_type: &str, id: &str) -> Result<()> {
        let path = format!("{}/{}/{}", index, doc_type, id);
        let response = self.request(reqwest::Method::DELETE, &path).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response, "delete document").await?;
        Ok(())
    }

    async fn get_document(&self, index: &str, doc_type: &str, id: &str) -> Result<Option<Value>> {
        let path = format!("{}/{}/{}", index, doc_type, id);
        let response = self.request(reqwest::Method::GET, &path).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response, "get document").await?;
        let body: Value = response.json().await?;
        Ok(body.get("_source").cloned())
    }

    async fn refresh(&self, index: &str) -> Result<()> {
        let path = format!("{}/_refresh", index);
        let response = self.request(reqwest::Method::POST, &path).send().await?;
        Self::check(response, "refresh").await?;
        Ok(())
    }

    async fn search(&self, index: &str, doc_type: &str, body: Value) -> Result<Value> {
        let path = format!("{}/{}/_search", index, doc_type);
        let response = self
            .request(reqwest::Method::POST, &path)
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response, "search").await?;
        Ok(response.json().await?)
    }
}

// ============ In-memory engine ============

struct MemDoc {
    doc_type: String,
    source: Value,
    visible: bool,
}

struct MemIndex {
    body: Value,
    docs: HashMap<String, MemDoc>,
}

/// In-memory [`SearchEngine`] for tests.
#[derive(Default)]
pub struct MemoryEngine {
    indexes: RwLock<HashMap<String, MemIndex>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The settings+mappings body the index was created with, if it exists.
    pub fn index_body(&self, index: &str) -> Option<Value> {
        self.indexes
            .read()
            .unwrap()
            .get(index)
            .map(|i| i.body.clone())
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.indexes.read().unwrap().contains_key(index)
    }
}

#[async_trait]
impl SearchEngine for MemoryEngine {
    async fn create_index(&self, index: &str, body: Value) -> Result<()> {
        let mut indexes = self.indexes.write().unwrap();
        if indexes.contains_key(index) {
            bail!("index_already_exists_exception: {}", index);
        }
        indexes.insert(
            index.to_string(),
            MemIndex {
                body,
                docs: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        self.indexes.write().unwrap().remove(index);
        Ok(())
    }

    async fn put_document(&self, index: &str, doc_type: &str, id: &str, doc: Value) -> Result<()> {
        let mut indexes = self.indexes.write().unwrap();
        // Elasticsearch auto-creates indexes on first write.
        let entry = indexes.entry(index.to_string()).or_insert_with(|| MemIndex {
            body: Value::Object(serde_json::Map::new()),
            docs: HashMap::new(),
        });
        entry.docs.insert(
            id.to_string(),
            MemDoc {
                doc_type: doc_type.to_string(),
                source: doc,
                visible: false,
            },
        );
        Ok(())
    }

    async fn delete_document(&self, index: &str, _doc_type: &str, id: &str) -> Result<()> {
        if let Some(mem_index) = self.indexes.write().unwrap().get_mut(index) {
            mem_index.docs.remove(id);
        }
        Ok(())
    }

    async fn get_document(&self, index: &str, _doc_type: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .indexes
            .read()
            .unwrap()
            .get(index)
            .and_then(|i| i.docs.get(id))
            .map(|d| d.source.clone()))
    }

    async fn refresh(&self, index: &str) -> Result<()> {
        let mut indexes = self.indexes.write().unwrap();
        let Some(mem_index) = indexes.get_mut(index) else {
            bail!("index_not_found_exception: {}", index);
        };
        for doc in mem_index.docs.values_mut() {
            doc.visible = true;
        }
        Ok(())
    }

    async fn search(&self, index: &str, doc_type: &str, _body: Value) -> Result<Value> {
        let indexes = self.indexes.read().unwrap();
        let Some(mem_index) = indexes.get(index) else {
            bail!("index_not_found_exception: {}", index);
        };
        let mut hits: Vec<(&String, &MemDoc)> = mem_index
            .docs
            .iter()
            .filter(|(_, d)| d.visible && d.doc_type == doc_type)
            .collect();
        hits.sort_by_key(|(id, _)| id.as_str());
        let hits: Vec<Value> = hits
            .into_iter()
            .map(|(id, d)| {
                serde_json::json!({
                    "_index": index,
                    "_type": d.doc_type,
                    "_id": id,
                    "_source": d.source,
                })
            })
            .collect();
        Ok(serde_json::json!({
            "hits": { "total": hits.len(), "hits": hits }
        }))
    }
}
