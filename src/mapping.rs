//! Mapping compiler: schema tree → search-index mapping tree.
//!
//! [`compile`] walks a [`Schema`] and produces the [`Mapping`] the engine
//! should be created with. Compilation never fails: fields that cannot or
//! should not be mapped are silently omitted, and unknown kinds degrade to a
//! text leaf, so mapping generation always completes even for
//! partially-annotated schemas.
//!
//! Inclusion rules, applied at every node:
//!
//! - Primitives and typed embedded sub-schemas are in unless the field says
//!   `es_indexed: false`.
//! - Plain (schema-less) nested objects are out unless the field says
//!   `es_indexed: true`. The asymmetry with embedded schemas is deliberate.
//! - References are out unless they carry an `es_type` directive — either a
//!   literal type name or a [`Projection`]. The referenced model's own
//!   schema is never introspected; the projection alone drives the shape.
//!
//! Arrays compile to their element's shape (the engine treats an array of a
//! type as that type); `es_type: "nested"` on an array of embedded documents
//! forces the node type to `nested` while keeping the same properties,
//! enabling per-element query semantics instead of flattening.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::schema::{Directives, Field, FieldKind, Projection, Schema, SchemaRegistry, TypeDirective};

/// A compiled index mapping for one model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    pub properties: BTreeMap<String, MappingNode>,
}

/// One node of the compiled mapping tree.
///
/// Leaves carry exactly one `es_type`; object-shaped nodes carry a non-empty
/// `properties` map (and may also carry a type, e.g. `nested`). Nodes
/// compiled from a reference projection record the target model so the
/// serializer can delegate them to reference resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingNode {
    pub es_type: Option<String>,
    pub properties: BTreeMap<String, MappingNode>,
    /// Passthrough mapping options (boost, analyzer, …), copied verbatim.
    pub options: Map<String, Value>,
    /// Target model name, set only for projection-shaped reference nodes.
    pub reference: Option<String>,
}

impl Mapping {
    /// Engine JSON for this mapping: `{"properties": {...}}`.
    pub fn to_value(&self) -> Value {
        Value::Object(nodes_to_value(&self.properties))
    }
}

impl MappingNode {
    fn leaf(es_type: impl Into<String>, options: Map<String, Value>) -> Self {
        Self {
            es_type: Some(es_type.into()),
            options,
            ..Self::default()
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.properties.is_empty()
    }

    /// Engine JSON for this node: `type`, `properties`, then passthrough
    /// options.
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        if let Some(t) = &self.es_type {
            out.insert("type".to_string(), Value::String(t.clone()));
        }
        if !self.properties.is_empty() {
            out.insert(
                "properties".to_string(),
                Value::Object(
                    self.properties
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_value()))
                        .collect(),
                ),
            );
        }
        for (k, v) in &self.options {
            out.insert(k.clone(), v.clone());
        }
        Value::Object(out)
    }
}

fn nodes_to_value(nodes: &BTreeMap<String, MappingNode>) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert(
        "properties".to_string(),
        Value::Object(nodes.iter().map(|(k, v)| (k.clone(), v.to_value())).collect()),
    );
    out
}

/// Compile a schema into its index mapping.
///
/// Pure function of `(schema, registry)`; deterministic, so compiling the
/// same schema twice yields structurally identical trees.
pub fn compile(schema: &Schema, registry: &SchemaRegistry) -> Mapping {
    Mapping {
        properties: compile_fields(&schema.fields, registry),
    }
}

fn compile_fields(
    fields: &BTreeMap<String, Field>,
    registry: &SchemaRegistry,
) -> BTreeMap<String, MappingNode> {
    fields
        .iter()
        .filter_map(|(name, field)| compile_field(field, registry).map(|n| (name.clone(), n)))
        .collect()
}

fn compile_field(field: &Field, registry: &SchemaRegistry) -> Option<MappingNode> {
    if field.directives.indexed == Some(false) {
        return None;
    }
    compile_kind(&field.kind, &field.directives, registry)
}

fn compile_kind(
    kind: &FieldKind,
    directives: &Directives,
    registry: &SchemaRegistry,
) -> Option<MappingNode> {
    match kind {
        FieldKind::Array { of } => {
            if explicit_type(directives).is_none() && is_geo_array(of, directives) {
                return Some(MappingNode::leaf("geo_point", passthrough(directives)));
            }
            compile_kind(of, directives, registry)
        }
        FieldKind::Embedded { schema } => {
            let properties = compile_fields(&schema.fields, registry);
            let es_type = explicit_type(directives).map(str::to_string);
            if properties.is_empty() && es_type.is_none() {
                return None;
            }
            Some(MappingNode {
                es_type,
                properties,
                options: passthrough(directives),
                reference: None,
            })
        }
        FieldKind::Object { fields } => {
            if directives.indexed != Some(true) {
                return None;
            }
            let properties = compile_fields(fields, registry);
            if properties.is_empty() {
                return None;
            }
            Some(MappingNode {
                es_type: explicit_type(directives).map(str::to_string),
                properties,
                options: passthrough(directives),
                reference: None,
            })
        }
        FieldKind::Reference { target } => match directives.es_type.as_ref()? {
            TypeDirective::Name(name) => {
                Some(MappingNode::leaf(name.clone(), passthrough(directives)))
            }
            TypeDirective::Projection(projection) => Some(MappingNode {
                es_type: None,
                properties: compile_projection(projection),
                options: passthrough(directives),
                reference: Some(target.clone()),
            }),
        },
        _ => Some(MappingNode::leaf(
            resolve_field_type(kind, directives),
            passthrough(directives),
        )),
    }
}

/// Resolve the engine type token for a primitive field.
///
/// An explicit `es_type` name wins unconditionally; otherwise the type is
/// inferred from the native kind. There is no error path — unknown kinds
/// fall back to `text` so an unsupported type never blocks mapping
/// generation.
pub fn resolve_field_type(kind: &FieldKind, directives: &Directives) -> String {
    if let Some(name) = explicit_type(directives) {
        return name.to_string();
    }
    infer_type(kind, directives)
}

fn infer_type(kind: &FieldKind, directives: &Directives) -> String {
    match kind {
        FieldKind::Text => "text".to_string(),
        FieldKind::Double => "double".to_string(),
        FieldKind::Boolean => "boolean".to_string(),
        FieldKind::Date => "date".to_string(),
        FieldKind::Id => "keyword".to_string(),
        FieldKind::Array { of } => {
            if is_geo_array(of, directives) {
                "geo_point".to_string()
            } else {
                infer_type(of, directives)
            }
        }
        _ => "text".to_string(),
    }
}

fn explicit_type(directives: &Directives) -> Option<&str> {
    match &directives.es_type {
        Some(TypeDirective::Name(name)) => Some(name),
        _ => None,
    }
}

/// A numeric array with geo indexing enabled on the data-model side maps to
/// a `geo_point`.
fn is_geo_array(element: &FieldKind, directives: &Directives) -> bool {
    matches!(element, FieldKind::Double)
        && directives.options.get("index").and_then(Value::as_str) == Some("2dsphere")
}

/// Copy `es_`-prefixed directive options onto the compiled node, prefix
/// stripped, values untouched.
fn passthrough(directives: &Directives) -> Map<String, Value> {
    directives
        .options
        .iter()
        .filter_map(|(k, v)| {
            k.strip_prefix("es_")
                .map(|stripped| (stripped.to_string(), v.clone()))
        })
        .collect()
}

fn compile_projection(projection: &Projection) -> BTreeMap<String, MappingNode> {
    projection
        .fields
        .iter()
        .map(|(name, field)| {
            let options: Map<String, Value> = field
                .options
                .iter()
                .filter_map(|(k, v)| {
                    k.strip_prefix("es_")
                        .map(|stripped| (stripped.to_string(), v.clone()))
                })
                .collect();
            let node = match &field.es_type {
                Some(TypeDirective::Name(name)) => MappingNode::leaf(name.clone(), options),
                Some(TypeDirective::Projection(inner)) => MappingNode {
                    es_type: None,
                    properties: compile_projection(inner),
                    options,
                    reference: None,
                },
                // Projection entries default to a text leaf.
                None => MappingNode::leaf("text", options),
            };
            (name.clone(), node)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, ProjectionField};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new()
    }

    fn user_schema() -> Schema {
        let deep = Schema::new().field("dn", Field::double());
        let embedded = Schema::new()
            .field("key", Field::text())
            .field("deep", Field::array_of(FieldKind::Embedded { schema: deep }));
        Schema::new()
            .field("name", Field::text())
            .field("age", Field::double())
            .field("joined", Field::date())
            .field("optin", Field::boolean())
            .field("tags", Field::array_of(FieldKind::Text))
            .field(
                "plain",
                Field::object([
                    ("x".to_string(), Field::text()),
                    ("y".to_string(), Field::double()),
                    ("z".to_string(), Field::boolean()),
                ]),
            )
            .field("embedded", Field::embedded(embedded))
    }

    #[test]
    fn test_implicit_mapping_includes_primitives_and_embedded() {
        let mapping = compile(&user_schema(), &registry());
        let keys: Vec<&str> = mapping.properties.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["age", "embedded", "joined", "name", "optin", "tags"]
        );

        assert_eq!(mapping.properties["name"].es_type.as_deref(), Some("text"));
        assert_eq!(mapping.properties["age"].es_type.as_deref(), Some("double"));
        assert_eq!(mapping.properties["joined"].es_type.as_deref(), Some("date"));
        assert_eq!(
            mapping.properties["optin"].es_type.as_deref(),
            Some("boolean")
        );
        // Array of a primitive is that primitive's type.
        assert_eq!(mapping.properties["tags"].es_type.as_deref(), Some("text"));

        let embedded = &mapping.properties["embedded"];
        assert!(embedded.es_type.is_none());
        assert_eq!(
            embedded.properties.keys().collect::<Vec<_>>(),
            ["deep", "key"]
        );
        assert_eq!(
            embedded.properties["deep"].properties["dn"].es_type.as_deref(),
            Some("double")
        );
    }

    #[test]
    fn test_plain_object_excluded_unless_opted_in() {
        let mapping = compile(&user_schema(), &registry());
        assert!(!mapping.properties.contains_key("plain"));

        let schema = Schema::new().field(
            "plain",
            Field::object([
                ("x".to_string(), Field::text()),
                ("y".to_string(), Field::double()),
            ])
            .indexed(true),
        );
        let mapping = compile(&schema, &registry());
        let plain = &mapping.properties["plain"];
        assert_eq!(plain.properties.keys().collect::<Vec<_>>(), ["x", "y"]);
        assert_eq!(plain.properties["x"].es_type.as_deref(), Some("text"));
    }

    #[test]
    fn test_explicit_opt_out_wins() {
        let schema = Schema::new()
            .field("name", Field::text())
            .field("secret", Field::text().indexed(false))
            .field(
                "embedded",
                Field::embedded(Schema::new().field("key", Field::text())).indexed(false),
            );
        let mapping = compile(&schema, &registry());
        assert_eq!(mapping.properties.keys().collect::<Vec<_>>(), ["name"]);
    }

    #[test]
    fn test_reference_excluded_without_directive() {
        let schema = Schema::new()
            .field("name", Field::text())
            .field("company", Field::reference("Company"));
        let mapping = compile(&schema, &registry());
        assert_eq!(mapping.properties.keys().collect::<Vec<_>>(), ["name"]);
    }

    #[test]
    fn test_reference_with_literal_type() {
        let schema = Schema::new().field("company", Field::reference("Company").es_type("keyword"));
        let mapping = compile(&schema, &registry());
        let company = &mapping.properties["company"];
        assert_eq!(company.es_type.as_deref(), Some("keyword"));
        assert!(company.reference.is_none());
    }

    #[test]
    fn test_reference_projection_three_levels() {
        let schema = Schema::new()
            .field("first", Field::text())
            .field("last", Field::text())
            .field(
                "company",
                Field::reference("Company").projection(
                    Projection::new()
                        .field("_id", ProjectionField::typed("text"))
                        .field("name", ProjectionField::typed("text"))
                        .field(
                            "city",
                            ProjectionField::shaped(
                                Projection::new()
                                    .field("_id", ProjectionField::typed("text"))
                                    .field("name", ProjectionField::typed("text"))
                                    .field(
                                        "tags",
                                        ProjectionField::shaped(
                                            Projection::new()
                                                .field("value", ProjectionField::typed("text")),
                                        ),
                                    ),
                            ),
                        ),
                ),
            );
        let mapping = compile(&schema, &registry());

        let company = &mapping.properties["company"];
        assert_eq!(company.reference.as_deref(), Some("Company"));
        assert_eq!(
            company.properties.keys().collect::<Vec<_>>(),
            ["_id", "city", "name"]
        );
        let city = &company.properties["city"];
        assert_eq!(
            city.properties.keys().collect::<Vec<_>>(),
            ["_id", "name", "tags"]
        );
        assert_eq!(
            city.properties["tags"].properties["value"].es_type.as_deref(),
            Some("text")
        );
    }

    #[test]
    fn test_nested_datatype() {
        let user = Schema::new()
            .field("first", Field::text())
            .field("last", Field::text());
        let schema = Schema::new()
            .field("group", Field::text())
            .field(
                "user",
                Field::array_of(FieldKind::Embedded { schema: user }).es_type("nested"),
            );
        let mapping = compile(&schema, &registry());

        let user = &mapping.properties["user"];
        assert_eq!(user.es_type.as_deref(), Some("nested"));
        assert_eq!(user.properties.keys().collect::<Vec<_>>(), ["first", "last"]);
        assert_eq!(user.properties["first"].es_type.as_deref(), Some("text"));
    }

    #[test]
    fn test_option_propagation_verbatim() {
        let schema = Schema::new()
            .field("name", Field::text().boost(2.0))
            .field("age", Field::double().es_type("integer").option("es_boost", 1.5))
            .field(
                "pos",
                Field::array_of(FieldKind::Double)
                    .option("index", "2dsphere")
                    .es_type("geo_point"),
            );
        let mapping = compile(&schema, &registry());

        assert_eq!(mapping.properties["name"].options["boost"], 2.0);
        assert_eq!(mapping.properties["age"].es_type.as_deref(), Some("integer"));
        assert_eq!(mapping.properties["age"].options["boost"], 1.5);
        assert_eq!(
            mapping.properties["pos"].es_type.as_deref(),
            Some("geo_point")
        );
        // Data-model options (no es_ prefix) never reach the engine.
        assert!(!mapping.properties["pos"].options.contains_key("index"));
    }

    #[test]
    fn test_geo_point_inferred_from_geo_indexed_numeric_array() {
        let schema = Schema::new().field(
            "pos",
            Field::array_of(FieldKind::Double).option("index", "2dsphere"),
        );
        let mapping = compile(&schema, &registry());
        assert_eq!(
            mapping.properties["pos"].es_type.as_deref(),
            Some("geo_point")
        );
    }

    #[test]
    fn test_analyzer_passthrough() {
        let schema = Schema::new().field("name", Field::text().analyzer("custom_french_analyzer"));
        let mapping = compile(&schema, &registry());
        assert_eq!(
            mapping.properties["name"].options["analyzer"],
            "custom_french_analyzer"
        );
    }

    #[test]
    fn test_compile_is_idempotent() {
        let schema = user_schema();
        let a = compile(&schema, &registry());
        let b = compile(&schema, &registry());
        assert_eq!(a, b);
        assert_eq!(a.to_value(), b.to_value());
    }

    #[test]
    fn test_empty_embedded_omitted() {
        let schema = Schema::new()
            .field("name", Field::text())
            .field("empty", Field::embedded(Schema::new()));
        let mapping = compile(&schema, &registry());
        assert_eq!(mapping.properties.keys().collect::<Vec<_>>(), ["name"]);
    }

    #[test]
    fn test_to_value_shape() {
        let schema = Schema::new()
            .field("name", Field::text().boost(2.0))
            .field(
                "user",
                Field::array_of(FieldKind::Embedded {
                    schema: Schema::new().field("first", Field::text()),
                })
                .es_type("nested"),
            );
        let value = compile(&schema, &registry()).to_value();
        assert_eq!(
            value,
            serde_json::json!({
                "properties": {
                    "name": { "type": "text", "boost": 2.0 },
                    "user": {
                        "type": "nested",
                        "properties": { "first": { "type": "text" } }
                    }
                }
            })
        );
    }
}
