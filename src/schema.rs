//! Schema tree model for the source data model.
//!
//! A [`Schema`] describes one collection's field tree: primitive fields,
//! arrays, typed embedded sub-schemas, plain (schema-less) nested objects,
//! and references to other collections. Each field carries an open bag of
//! directives controlling how it maps into the search index:
//!
//! - `es_indexed` — explicit inclusion/exclusion override.
//! - `es_type` — explicit engine type, either a literal type name or a
//!   nested [`Projection`] shape (used for reference fields).
//! - any other `es_`-prefixed key — passed through verbatim onto the
//!   compiled mapping node with the prefix stripped (`es_boost: 2` becomes
//!   `boost: 2`), with no allow-list so engine-specific options keep working.
//! - non-`es_` keys (e.g. `index = "2dsphere"`) belong to the data model and
//!   never reach the engine, though the compiler may consult them.
//!
//! Schemas can be built programmatically with the chained constructors or
//! deserialized from a JSON schema-description file, e.g.:
//!
//! ```json
//! {
//!   "User": {
//!     "fields": {
//!       "name": { "kind": "text", "directives": { "es_boost": 2 } },
//!       "age": { "kind": "double" },
//!       "company": {
//!         "kind": "reference",
//!         "target": "Company",
//!         "directives": { "es_type": { "name": { "es_type": "text" } } }
//!       }
//!     }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The field tree of one data model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub fields: BTreeMap<String, Field>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, chained builder style.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }
}

/// One node in the schema tree: a native kind plus search directives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Directives::is_empty")]
    pub directives: Directives,
}

/// The native kind of a schema field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Double,
    Boolean,
    Date,
    /// Primary-key / foreign-key identifier value.
    Id,
    Array {
        of: Box<FieldKind>,
    },
    /// A typed embedded sub-schema, reused inline within the parent.
    Embedded {
        schema: Schema,
    },
    /// A plain, schema-less nested object literal.
    Object {
        fields: BTreeMap<String, Field>,
    },
    /// A foreign key pointing at another registered model.
    Reference {
        target: String,
    },
}

/// Explicit search-mapping directives attached to a field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Directives {
    /// Explicit inclusion (`true`) or exclusion (`false`) override.
    #[serde(default, rename = "es_indexed", skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
    /// Explicit engine type: a literal name, or a projection shape for
    /// reference fields.
    #[serde(default, rename = "es_type", skip_serializing_if = "Option::is_none")]
    pub es_type: Option<TypeDirective>,
    /// Everything else. `es_`-prefixed keys are mapping options passed
    /// through verbatim (prefix stripped); other keys are data-model options.
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl Directives {
    pub fn is_empty(&self) -> bool {
        self.indexed.is_none() && self.es_type.is_none() && self.options.is_empty()
    }
}

/// An explicit `es_type` directive.
///
/// For a reference field a [`Projection`] takes the place of the referenced
/// model's own mapping: the projection shape alone drives what gets compiled
/// and serialized, and the target schema's field-level directives are never
/// consulted. A literal name simply forces the leaf type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeDirective {
    Name(String),
    Projection(Projection),
}

/// An author-specified nested mapping shape, keyed by sub-field name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Projection {
    pub fields: BTreeMap<String, ProjectionField>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, field: ProjectionField) -> Self {
        self.fields.insert(name.into(), field);
        self
    }
}

/// One entry of a [`Projection`]: an optional type directive (itself a name
/// or a deeper projection) plus passthrough options. An entry with no
/// directive compiles to a plain text leaf.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectionField {
    #[serde(default, rename = "es_type", skip_serializing_if = "Option::is_none")]
    pub es_type: Option<TypeDirective>,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl ProjectionField {
    /// Entry with a literal engine type.
    pub fn typed(name: impl Into<String>) -> Self {
        Self {
            es_type: Some(TypeDirective::Name(name.into())),
            options: Map::new(),
        }
    }

    /// Entry shaped by a deeper projection.
    pub fn shaped(projection: Projection) -> Self {
        Self {
            es_type: Some(TypeDirective::Projection(projection)),
            options: Map::new(),
        }
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

impl Field {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            directives: Directives::default(),
        }
    }

    pub fn text() -> Self {
        Self::new(FieldKind::Text)
    }

    pub fn double() -> Self {
        Self::new(FieldKind::Double)
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    pub fn date() -> Self {
        Self::new(FieldKind::Date)
    }

    pub fn id() -> Self {
        Self::new(FieldKind::Id)
    }

    pub fn array_of(kind: FieldKind) -> Self {
        Self::new(FieldKind::Array { of: Box::new(kind) })
    }

    pub fn embedded(schema: Schema) -> Self {
        Self::new(FieldKind::Embedded { schema })
    }

    pub fn object(fields: impl IntoIterator<Item = (String, Field)>) -> Self {
        Self::new(FieldKind::Object {
            fields: fields.into_iter().collect(),
        })
    }

    pub fn reference(target: impl Into<String>) -> Self {
        Self::new(FieldKind::Reference {
            target: target.into(),
        })
    }

    pub fn indexed(mut self, indexed: bool) -> Self {
        self.directives.indexed = Some(indexed);
        self
    }

    /// Force the engine type (`es_type` as a literal name).
    pub fn es_type(mut self, name: impl Into<String>) -> Self {
        self.directives.es_type = Some(TypeDirective::Name(name.into()));
        self
    }

    /// Shape the field with an explicit projection (`es_type` as a schema).
    pub fn projection(mut self, projection: Projection) -> Self {
        self.directives.es_type = Some(TypeDirective::Projection(projection));
        self
    }

    pub fn boost(self, boost: f64) -> Self {
        self.option("es_boost", boost)
    }

    pub fn analyzer(self, analyzer: &str) -> Self {
        self.option("es_analyzer", analyzer)
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.directives.options.insert(key.into(), value.into());
        self
    }
}

/// Read-only lookup table of model name → [`Schema`].
///
/// Compilation is a pure function of `(schema, registry)`; the registry is
/// always passed in explicitly, never held as a global.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaRegistry {
    pub schemas: BTreeMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, schema: Schema) {
        self.schemas.insert(name.into(), schema);
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    pub fn models(&self) -> impl Iterator<Item = (&String, &Schema)> {
        self.schemas.iter()
    }
}
