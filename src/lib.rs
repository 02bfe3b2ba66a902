//! # Search Bridge
//!
//! A bridge between a document-oriented data model and a search engine's
//! index schema and document store.
//!
//! Search Bridge derives an index mapping from a model's field definitions
//! (honoring explicit per-field directives), keeps engine documents in sync
//! with the primary store as records are created, updated, or deleted, and
//! resolves cross-collection references into embedded sub-documents along
//! the way.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────┐   ┌───────────────┐
//! │  Schema    │──▶│  Mapping    │──▶│ mapping tree  │──▶ create index
//! │  tree      │   │  compiler   │   │ (per model,   │
//! └────────────┘   └─────────────┘   │  cached)      │
//!                                    └──────┬────────┘
//!                  ┌─────────────┐          │ write time
//! ┌────────────┐   │ Serializer  │◀─────────┘
//! │  record    │──▶│ + reference │──▶ document ──▶ dispatcher ──▶ engine
//! └────────────┘   │ resolver    │
//!                  └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`schema`] | Schema tree model and explicit mapping directives |
//! | [`mapping`] | Field type resolution and mapping compilation |
//! | [`serialize`] | Record → engine-document serialization |
//! | [`refs`] | Reference resolution and the `RecordSource` seam |
//! | [`engine`] | `SearchEngine` trait, Elasticsearch client, in-memory engine |
//! | [`bridge`] | Model bindings, admin operations, indexing dispatcher |
//! | [`config`] | TOML configuration parsing |

pub mod bridge;
pub mod config;
pub mod engine;
pub mod mapping;
pub mod refs;
pub mod schema;
pub mod serialize;
