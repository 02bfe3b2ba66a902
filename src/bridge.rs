//! Model bindings and the indexing dispatcher.
//!
//! A [`Bridge`] ties registered data models to a search engine. Registration
//! computes each model's engine-facing naming and compiles its mapping once;
//! both are immutable afterwards and read concurrently by any number of
//! mutation flows without locking.
//!
//! Record mutations follow a `pending → sent → acknowledged | failed`
//! lifecycle: one in-flight request per mutation, no automatic retry, and
//! the engine's last acknowledgment wins when two mutations for the same
//! identifier race. [`Bridge::dispatch_index`] and
//! [`Bridge::dispatch_remove`] spawn the request and hand back a oneshot
//! receiver as the completion signal; the `async` variants are awaited
//! directly. Administrative calls (create/delete index, refresh, search)
//! bypass the per-record lifecycle and complete when the engine responds —
//! callers refresh explicitly before expecting new documents in search
//! results.

use anyhow::{anyhow, bail, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::engine::SearchEngine;
use crate::mapping::{self, Mapping};
use crate::refs::RecordSource;
use crate::schema::{Schema, SchemaRegistry};
use crate::serialize;

/// Engine-facing naming for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOptions {
    pub index: String,
    pub doc_type: String,
}

/// Per-model overrides supplied at registration.
#[derive(Debug, Clone, Default)]
pub struct BindOptions {
    pub index: Option<String>,
    pub doc_type: Option<String>,
    /// Model-level index settings (the `analysis` section), merged into
    /// every index creation for this model.
    pub settings: Option<Value>,
}

struct ModelBinding {
    options: ModelOptions,
    settings: Option<Value>,
    mapping: Arc<Mapping>,
}

/// The kind of record mutation a completion signal reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationAction {
    Index,
    Remove,
}

/// Terminal outcome of one dispatched mutation, delivered over the oneshot
/// completion channel.
#[derive(Debug)]
pub struct IndexOutcome {
    pub id: String,
    pub action: MutationAction,
    pub result: Result<()>,
}

/// Bridge between registered models and one search engine.
pub struct Bridge {
    engine: Arc<dyn SearchEngine>,
    records: Option<Arc<dyn RecordSource>>,
    prefix: String,
    registry: SchemaRegistry,
    bindings: HashMap<String, Arc<ModelBinding>>,
}

impl Bridge {
    pub fn new(engine: Arc<dyn SearchEngine>) -> Self {
        Self {
            engine,
            records: None,
            prefix: String::new(),
            registry: SchemaRegistry::new(),
            bindings: HashMap::new(),
        }
    }

    /// Attach a record source for resolving raw reference identifiers.
    pub fn with_records(mut self, records: Arc<dyn RecordSource>) -> Self {
        self.records = Some(records);
        self
    }

    /// Prefix applied to every derived index name.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Register a model: derive its naming, compile its mapping, and freeze
    /// both. Fails on duplicate registration.
    pub fn register(&mut self, model: &str, schema: Schema, options: BindOptions) -> Result<()> {
        if self.bindings.contains_key(model) {
            bail!("model already registered: {}", model);
        }
        let doc_type = options
            .doc_type
            .unwrap_or_else(|| model.to_lowercase());
        let index = options
            .index
            .unwrap_or_else(|| format!("{}{}", self.prefix, pluralize(&doc_type)));

        self.registry.register(model, schema.clone());
        let mapping = mapping::compile(&schema, &self.registry);

        self.bindings.insert(
            model.to_string(),
            Arc::new(ModelBinding {
                options: ModelOptions { index, doc_type },
                settings: options.settings,
                mapping: Arc::new(mapping),
            }),
        );
        Ok(())
    }

    /// Read accessor for a model's engine-facing naming.
    pub fn options(&self, model: &str) -> Result<&ModelOptions> {
        Ok(&self.binding(model)?.options)
    }

    /// The engine handle, for administrative and test use.
    pub fn engine(&self) -> Arc<dyn SearchEngine> {
        Arc::clone(&self.engine)
    }

    /// The model's compiled mapping (cached at registration).
    pub fn mapping(&self, model: &str) -> Result<Arc<Mapping>> {
        Ok(Arc::clone(&self.binding(model)?.mapping))
    }

    /// Create the model's index with its mapping and settings.
    ///
    /// Model-level settings are merged with the call-time override, the
    /// override winning key by key.
    pub async fn create_index(&self, model: &str, settings: Option<Value>) -> Result<()> {
        let binding = self.binding(model)?;
        let mut body = Map::new();
        if let Some(settings) = merge_settings(binding.settings.as_ref(), settings.as_ref()) {
            body.insert("settings".to_string(), settings);
        }
        let mut mappings = Map::new();
        mappings.insert(binding.options.doc_type.clone(), binding.mapping.to_value());
        body.insert("mappings".to_string(), Value::Object(mappings));
        self.engine
            .create_index(&binding.options.index, Value::Object(body))
            .await
    }

    /// Delete the model's index. Deleting an absent index is success.
    pub async fn delete_index(&self, model: &str) -> Result<()> {
        let binding = self.binding(model)?;
        self.engine.delete_index(&binding.options.index).await
    }

    /// Refresh the model's index so earlier writes become searchable.
    pub async fn refresh(&self, model: &str) -> Result<()> {
        let binding = self.binding(model)?;
        self.engine.refresh(&binding.options.index).await
    }

    /// Execute a search body verbatim; the raw engine response comes back
    /// untransformed.
    pub async fn search(&self, model: &str, body: Value) -> Result<Value> {
        let binding = self.binding(model)?;
        self.engine
            .search(&binding.options.index, &binding.options.doc_type, body)
            .await
    }

    /// Serialize and upsert one record, keyed by its `_id`. Full replace.
    pub async fn index_record(&self, model: &str, record: &Value) -> Result<String> {
        let binding = self.binding(model)?;
        let id = record_id(record)?;
        let doc = serialize::serialize_record(record, &binding.mapping, self.records.as_deref());
        self.engine
            .put_document(&binding.options.index, &binding.options.doc_type, &id, doc)
            .await?;
        Ok(id)
    }

    /// Delete one record's document. Engine "not found" is a successful
    /// no-op.
    pub async fn remove_record(&self, model: &str, id: &str) -> Result<()> {
        let binding = self.binding(model)?;
        self.engine
            .delete_document(&binding.options.index, &binding.options.doc_type, id)
            .await
    }

    /// Spawn an upsert for `record` and return its completion signal.
    pub fn dispatch_index(&self, model: &str, record: Value) -> oneshot::Receiver<IndexOutcome> {
        let (tx, rx) = oneshot::channel();
        let binding = self.bindings.get(model).map(Arc::clone);
        let engine = Arc::clone(&self.engine);
        let records = self.records.clone();
        let model = model.to_string();
        tokio::spawn(async move {
            let outcome = match (binding, record_id(&record)) {
                (Some(binding), Ok(id)) => {
                    let doc =
                        serialize::serialize_record(&record, &binding.mapping, records.as_deref());
                    let result = engine
                        .put_document(&binding.options.index, &binding.options.doc_type, &id, doc)
                        .await;
                    IndexOutcome {
                        id,
                        action: MutationAction::Index,
                        result,
                    }
                }
                (Some(_), Err(err)) => IndexOutcome {
                    id: String::new(),
                    action: MutationAction::Index,
                    result: Err(err),
                },
                (None, id) => IndexOutcome {
                    id: id.unwrap_or_default(),
                    action: MutationAction::Index,
                    result: Err(anyhow!("model not registered: {}", model)),
                },
            };
            let _ = tx.send(outcome);
        });
        rx
    }

    /// Spawn a delete for `id` and return its completion signal.
    pub fn dispatch_remove(&self, model: &str, id: String) -> oneshot::Receiver<IndexOutcome> {
        let (tx, rx) = oneshot::channel();
        let binding = self.bindings.get(model).map(Arc::clone);
        let engine = Arc::clone(&self.engine);
        let model = model.to_string();
        tokio::spawn(async move {
            let result = match binding {
                Some(binding) => {
                    engine
                        .delete_document(&binding.options.index, &binding.options.doc_type, &id)
                        .await
                }
                None => Err(anyhow!("model not registered: {}", model)),
            };
            let _ = tx.send(IndexOutcome {
                id,
                action: MutationAction::Remove,
                result,
            });
        });
        rx
    }

    fn binding(&self, model: &str) -> Result<&Arc<ModelBinding>> {
        self.bindings
            .get(model)
            .ok_or_else(|| anyhow!("model not registered: {}", model))
    }
}

/// Extract a record's identifier from its `_id` field.
pub fn record_id(record: &Value) -> Result<String> {
    match record.get("_id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => bail!("record has no usable _id"),
    }
}

/// Naive plural used for derived index names (`user` → `users`).
fn pluralize(name: &str) -> String {
    if name.ends_with('s') {
        name.to_string()
    } else {
        format!("{}s", name)
    }
}

/// Deep-merge two settings objects; `over` wins key by key.
fn merge_settings(base: Option<&Value>, over: Option<&Value>) -> Option<Value> {
    match (base, over) {
        (None, None) => None,
        (Some(base), None) => Some(base.clone()),
        (None, Some(over)) => Some(over.clone()),
        (Some(base), Some(over)) => Some(merge_values(base, over)),
    }
}

fn merge_values(base: &Value, over: &Value) -> Value {
    match (base, over) {
        (Value::Object(base_obj), Value::Object(over_obj)) => {
            let mut out = base_obj.clone();
            for (key, value) in over_obj {
                let merged = match base_obj.get(key) {
                    Some(base_value) => merge_values(base_value, value),
                    None => value.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        _ => over.clone(),
    }
}
