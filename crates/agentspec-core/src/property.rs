// ABOUTME: Structural type descriptors for component inputs and outputs.
// ABOUTME: Parses JSON-schema-shaped trees, checks structural equality and one-way castability.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::naming::{is_dangerous_key, strip_dangerous_keys};

/// Characters that may never appear in a property title, since titles double
/// as template placeholder names.
const FORBIDDEN_TITLE_CHARS: [char; 8] = ['.', ',', '{', '}', '\'', '"', ' ', '\n'];

/// Keywords this crate reads itself; everything else is carried as `extra`.
const KNOWN_KEYWORDS: [&str; 8] = [
    "title",
    "description",
    "default",
    "type",
    "anyOf",
    "items",
    "properties",
    "additionalProperties",
];

/// Errors raised while building or parsing property descriptors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PropertyError {
    #[error("unsupported schema combinator: {0}")]
    UnsupportedCombinator(String),

    #[error("invalid property title {0:?}: titles must be non-empty and contain none of . , {{ }} ' \" space or newline")]
    InvalidTitle(String),

    #[error("property schema is missing a title")]
    MissingTitle,

    #[error("duplicate property title {title:?} in {list}")]
    DuplicateTitle { title: String, list: String },

    #[error("invalid property schema: {0}")]
    InvalidSchema(String),
}

/// The type part of a schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaType {
    /// No `type` keyword: any value is accepted.
    Any,
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array {
        items: Option<Box<Schema>>,
    },
    Object {
        properties: IndexMap<String, Schema>,
        additional_properties: Option<AdditionalProperties>,
    },
    AnyOf(Vec<Schema>),
}

/// The `additionalProperties` keyword of an object schema.
#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<Schema>),
}

/// One node of a schema tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub title: Option<String>,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub ty: SchemaType,
    /// Keywords not interpreted here (`enum`, `format`, ...), kept verbatim.
    pub extra: Map<String, Value>,
}

impl Schema {
    pub fn of(ty: SchemaType) -> Self {
        Self {
            title: None,
            description: None,
            default: None,
            ty,
            extra: Map::new(),
        }
    }

    pub fn any() -> Self {
        Self::of(SchemaType::Any)
    }

    pub fn string() -> Self {
        Self::of(SchemaType::String)
    }

    pub fn integer() -> Self {
        Self::of(SchemaType::Integer)
    }

    pub fn number() -> Self {
        Self::of(SchemaType::Number)
    }

    pub fn boolean() -> Self {
        Self::of(SchemaType::Boolean)
    }

    pub fn null() -> Self {
        Self::of(SchemaType::Null)
    }

    pub fn array(items: Schema) -> Self {
        Self::of(SchemaType::Array {
            items: Some(Box::new(items)),
        })
    }

    /// A closed object with the given named properties.
    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, Schema)>,
        K: Into<String>,
    {
        Self::of(SchemaType::Object {
            properties: properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            additional_properties: None,
        })
    }

    /// An open object whose values all follow `values`.
    pub fn map(values: Schema) -> Self {
        Self::of(SchemaType::Object {
            properties: IndexMap::new(),
            additional_properties: Some(AdditionalProperties::Schema(Box::new(values))),
        })
    }

    pub fn any_of(alternatives: Vec<Schema>) -> Self {
        Self::of(SchemaType::AnyOf(alternatives))
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Parse a schema tree. `allOf` and `oneOf` are rejected anywhere in the
    /// tree, and every nested title is validated.
    pub fn from_json(value: &Value) -> Result<Self, PropertyError> {
        let obj = value
            .as_object()
            .ok_or_else(|| PropertyError::InvalidSchema(format!("expected a mapping, got {value}")))?;

        for combinator in ["allOf", "oneOf"] {
            if obj.contains_key(combinator) {
                return Err(PropertyError::UnsupportedCombinator(combinator.to_string()));
            }
        }

        let title = match obj.get("title") {
            None | Some(Value::Null) => None,
            Some(Value::String(t)) => {
                validate_title(t)?;
                Some(t.clone())
            }
            Some(other) => {
                return Err(PropertyError::InvalidSchema(format!("title must be a string, got {other}")));
            }
        };

        let description = match obj.get("description") {
            None | Some(Value::Null) => None,
            Some(Value::String(d)) => Some(d.clone()),
            Some(other) => {
                return Err(PropertyError::InvalidSchema(format!(
                    "description must be a string, got {other}"
                )));
            }
        };

        let default = obj.get("default").cloned().map(|mut v| {
            strip_dangerous_keys(&mut v);
            v
        });

        let ty = if let Some(alternatives) = obj.get("anyOf") {
            let alternatives = alternatives
                .as_array()
                .ok_or_else(|| PropertyError::InvalidSchema("anyOf must be a list".to_string()))?;
            SchemaType::AnyOf(
                alternatives
                    .iter()
                    .map(Schema::from_json)
                    .collect::<Result<Vec<_>, _>>()?,
            )
        } else {
            match obj.get("type") {
                None => SchemaType::Any,
                Some(Value::String(name)) => parse_type(name, obj)?,
                Some(Value::Array(names)) => {
                    let alternatives = names
                        .iter()
                        .map(|n| {
                            let name = n.as_str().ok_or_else(|| {
                                PropertyError::InvalidSchema(format!("type entries must be strings, got {n}"))
                            })?;
                            parse_type(name, obj).map(Schema::of)
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    SchemaType::AnyOf(alternatives)
                }
                Some(other) => {
                    return Err(PropertyError::InvalidSchema(format!(
                        "type must be a string or a list, got {other}"
                    )));
                }
            }
        };

        let mut extra = Map::new();
        for (key, v) in obj {
            if KNOWN_KEYWORDS.contains(&key.as_str()) || is_dangerous_key(key) {
                continue;
            }
            let mut v = v.clone();
            strip_dangerous_keys(&mut v);
            extra.insert(key.clone(), v);
        }

        Ok(Self {
            title,
            description,
            default,
            ty,
            extra,
        })
    }

    /// Render the schema tree as a plain mapping.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        if let Some(title) = &self.title {
            obj.insert("title".to_string(), Value::String(title.clone()));
        }
        if let Some(description) = &self.description {
            obj.insert("description".to_string(), Value::String(description.clone()));
        }
        if let Some(default) = &self.default {
            obj.insert("default".to_string(), default.clone());
        }

        match &self.ty {
            SchemaType::Any => {}
            SchemaType::AnyOf(alternatives) => {
                obj.insert(
                    "anyOf".to_string(),
                    Value::Array(alternatives.iter().map(Schema::to_json).collect()),
                );
            }
            ty => {
                obj.insert("type".to_string(), Value::String(type_name(ty).to_string()));
            }
        }

        match &self.ty {
            SchemaType::Array { items: Some(items) } => {
                obj.insert("items".to_string(), items.to_json());
            }
            SchemaType::Object {
                properties,
                additional_properties,
            } => {
                if !properties.is_empty() {
                    let props = properties
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_json()))
                        .collect::<Map<_, _>>();
                    obj.insert("properties".to_string(), Value::Object(props));
                }
                match additional_properties {
                    None => {}
                    Some(AdditionalProperties::Allowed(b)) => {
                        obj.insert("additionalProperties".to_string(), Value::Bool(*b));
                    }
                    Some(AdditionalProperties::Schema(s)) => {
                        obj.insert("additionalProperties".to_string(), s.to_json());
                    }
                }
            }
            _ => {}
        }

        for (k, v) in &self.extra {
            obj.insert(k.clone(), v.clone());
        }

        Value::Object(obj)
    }

    /// Structural equality of the type part of two schemas. Titles,
    /// descriptions, defaults and extra keywords are ignored; unions compare
    /// as sets.
    pub fn same_type(&self, other: &Schema) -> bool {
        match (&self.ty, &other.ty) {
            (SchemaType::AnyOf(xs), SchemaType::AnyOf(ys)) => {
                xs.iter().all(|x| ys.iter().any(|y| x.same_type(y)))
                    && ys.iter().all(|y| xs.iter().any(|x| x.same_type(y)))
            }
            (SchemaType::Array { items: a }, SchemaType::Array { items: b }) => {
                items_or_any(a).same_type(&items_or_any(b))
            }
            (
                SchemaType::Object {
                    properties: pa,
                    additional_properties: aa,
                },
                SchemaType::Object {
                    properties: pb,
                    additional_properties: ab,
                },
            ) => {
                pa.len() == pb.len()
                    && pa
                        .iter()
                        .all(|(k, sa)| pb.get(k).is_some_and(|sb| sa.same_type(sb)))
                    && additional_same(aa.as_ref(), ab.as_ref())
            }
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }

    /// True if a value described by `self` may stand in where `target` is
    /// expected. The relation is one-directional.
    pub fn castable_to(&self, target: &Schema) -> bool {
        if self.same_type(target) {
            return true;
        }
        if matches!(target.ty, SchemaType::Any | SchemaType::String) {
            return true;
        }
        if let SchemaType::AnyOf(alternatives) = &self.ty {
            return alternatives.iter().all(|a| a.castable_to(target));
        }
        if let SchemaType::AnyOf(alternatives) = &target.ty {
            return alternatives.iter().any(|b| self.castable_to(b));
        }

        match (&self.ty, &target.ty) {
            (a, b) if is_scalar_numeric(a) && is_scalar_numeric(b) => true,
            (SchemaType::Array { items: a }, SchemaType::Array { items: b }) => {
                items_or_any(a).castable_to(&items_or_any(b))
            }
            (
                SchemaType::Object {
                    properties: pa,
                    additional_properties: aa,
                },
                SchemaType::Object {
                    properties: pb,
                    additional_properties: ab,
                },
            ) => {
                pb.iter()
                    .all(|(k, sb)| pa.get(k).is_some_and(|sa| sa.castable_to(sb)))
                    && additional_castable(aa.as_ref(), ab.as_ref())
            }
            _ => false,
        }
    }
}

/// A titled schema describing one input or output slot of a component.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    schema: Schema,
}

impl Property {
    /// Build a property from a title and a type. Fails if the title is invalid.
    pub fn new(title: impl Into<String>, ty: SchemaType) -> Result<Self, PropertyError> {
        Self::from_schema(Schema::of(ty).with_title(title))
    }

    /// Wrap a schema whose root carries the title. The title is required and
    /// validated, as are all nested titles.
    pub fn from_schema(schema: Schema) -> Result<Self, PropertyError> {
        let title = schema.title.as_deref().ok_or(PropertyError::MissingTitle)?;
        validate_title(title)?;
        validate_nested_titles(&schema)?;
        Ok(Self { schema })
    }

    pub fn string(title: impl Into<String>) -> Result<Self, PropertyError> {
        Self::new(title, SchemaType::String)
    }

    pub fn integer(title: impl Into<String>) -> Result<Self, PropertyError> {
        Self::new(title, SchemaType::Integer)
    }

    pub fn number(title: impl Into<String>) -> Result<Self, PropertyError> {
        Self::new(title, SchemaType::Number)
    }

    pub fn boolean(title: impl Into<String>) -> Result<Self, PropertyError> {
        Self::new(title, SchemaType::Boolean)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.schema.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, mut default: Value) -> Self {
        strip_dangerous_keys(&mut default);
        self.schema.default = Some(default);
        self
    }

    pub fn title(&self) -> &str {
        self.schema.title.as_deref().unwrap_or_default()
    }

    pub fn description(&self) -> Option<&str> {
        self.schema.description.as_deref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.schema.default.as_ref()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Parse a property from its schema tree. A missing title is an error,
    /// never a silently skipped entry.
    pub fn from_json_schema(value: &Value) -> Result<Self, PropertyError> {
        Self::from_schema(Schema::from_json(value)?)
    }

    pub fn to_json_schema(&self) -> Value {
        self.schema.to_json()
    }

    pub fn same_type(&self, other: &Property) -> bool {
        self.schema.same_type(&other.schema)
    }

    pub fn castable_to(&self, other: &Property) -> bool {
        self.schema.castable_to(&other.schema)
    }
}

/// Reject titles that are empty or contain placeholder-breaking characters.
pub fn validate_title(title: &str) -> Result<(), PropertyError> {
    if title.is_empty() || title.contains(FORBIDDEN_TITLE_CHARS) {
        return Err(PropertyError::InvalidTitle(title.to_string()));
    }
    Ok(())
}

/// Check that titles are unique within one input or output list.
pub fn validate_property_list(properties: &[Property], list: &str) -> Result<(), PropertyError> {
    let mut seen = std::collections::HashSet::new();
    for p in properties {
        if !seen.insert(p.title()) {
            return Err(PropertyError::DuplicateTitle {
                title: p.title().to_string(),
                list: list.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_nested_titles(schema: &Schema) -> Result<(), PropertyError> {
    let check = |s: &Schema| -> Result<(), PropertyError> {
        if let Some(t) = &s.title {
            validate_title(t)?;
        }
        validate_nested_titles(s)
    };

    match &schema.ty {
        SchemaType::Array { items: Some(items) } => check(items),
        SchemaType::AnyOf(alternatives) => alternatives.iter().try_for_each(check),
        SchemaType::Object {
            properties,
            additional_properties,
        } => {
            properties.values().try_for_each(check)?;
            match additional_properties {
                Some(AdditionalProperties::Schema(s)) => check(s),
                _ => Ok(()),
            }
        }
        _ => Ok(()),
    }
}

fn parse_type(name: &str, obj: &Map<String, Value>) -> Result<SchemaType, PropertyError> {
    Ok(match name {
        "null" => SchemaType::Null,
        "boolean" => SchemaType::Boolean,
        "integer" => SchemaType::Integer,
        "number" => SchemaType::Number,
        "string" => SchemaType::String,
        "array" => SchemaType::Array {
            items: obj
                .get("items")
                .map(Schema::from_json)
                .transpose()?
                .map(Box::new),
        },
        "object" => {
            let mut properties = IndexMap::new();
            if let Some(props) = obj.get("properties") {
                let props = props.as_object().ok_or_else(|| {
                    PropertyError::InvalidSchema("properties must be a mapping".to_string())
                })?;
                for (key, sub) in props {
                    if is_dangerous_key(key) {
                        continue;
                    }
                    properties.insert(key.clone(), Schema::from_json(sub)?);
                }
            }
            let additional_properties = match obj.get("additionalProperties") {
                None => None,
                Some(Value::Bool(b)) => Some(AdditionalProperties::Allowed(*b)),
                Some(sub) => Some(AdditionalProperties::Schema(Box::new(Schema::from_json(sub)?))),
            };
            SchemaType::Object {
                properties,
                additional_properties,
            }
        }
        other => {
            return Err(PropertyError::InvalidSchema(format!("unknown type {other:?}")));
        }
    })
}

fn type_name(ty: &SchemaType) -> &'static str {
    match ty {
        SchemaType::Null => "null",
        SchemaType::Boolean => "boolean",
        SchemaType::Integer => "integer",
        SchemaType::Number => "number",
        SchemaType::String => "string",
        SchemaType::Array { .. } => "array",
        SchemaType::Object { .. } => "object",
        SchemaType::Any | SchemaType::AnyOf(_) => "",
    }
}

fn items_or_any(items: &Option<Box<Schema>>) -> Schema {
    items.as_deref().cloned().unwrap_or_else(Schema::any)
}

fn is_scalar_numeric(ty: &SchemaType) -> bool {
    matches!(ty, SchemaType::Number | SchemaType::Integer | SchemaType::Boolean)
}

/// An absent `additionalProperties` is equivalent to `true`.
fn normalize_additional(a: Option<&AdditionalProperties>) -> AdditionalProperties {
    a.cloned().unwrap_or(AdditionalProperties::Allowed(true))
}

fn additional_same(a: Option<&AdditionalProperties>, b: Option<&AdditionalProperties>) -> bool {
    match (normalize_additional(a), normalize_additional(b)) {
        (AdditionalProperties::Allowed(x), AdditionalProperties::Allowed(y)) => x == y,
        (AdditionalProperties::Schema(x), AdditionalProperties::Schema(y)) => x.same_type(&y),
        _ => false,
    }
}

fn additional_castable(a: Option<&AdditionalProperties>, b: Option<&AdditionalProperties>) -> bool {
    match (normalize_additional(a), normalize_additional(b)) {
        (AdditionalProperties::Allowed(x), AdditionalProperties::Allowed(y)) => x == y,
        (AdditionalProperties::Schema(x), AdditionalProperties::Schema(y)) => x.castable_to(&y),
        // A closed source has no extra keys to check.
        (AdditionalProperties::Allowed(false), AdditionalProperties::Schema(_)) => true,
        (AdditionalProperties::Allowed(true), AdditionalProperties::Schema(y)) => {
            Schema::any().castable_to(&y)
        }
        (AdditionalProperties::Schema(_), AdditionalProperties::Allowed(open)) => open,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn property_round_trips_through_json_schema() {
        let value = json!({
            "title": "scores",
            "description": "per-user scores",
            "default": {},
            "type": "object",
            "additionalProperties": {"type": "number"}
        });
        let property = Property::from_json_schema(&value).unwrap();
        assert_eq!(property.title(), "scores");
        assert_eq!(property.to_json_schema(), value);
    }

    #[test]
    fn missing_title_is_rejected() {
        let err = Property::from_json_schema(&json!({"type": "string"})).unwrap_err();
        assert_eq!(err, PropertyError::MissingTitle);
    }

    #[test]
    fn invalid_titles_are_rejected() {
        for bad in ["", "a.b", "a b", "a,b", "{x}", "it's", "say\"", "line\nbreak"] {
            assert!(
                matches!(Property::string(bad), Err(PropertyError::InvalidTitle(_))),
                "title {bad:?} should be rejected"
            );
        }
        assert!(Property::string("user_query").is_ok());
    }

    #[test]
    fn nested_titles_are_validated() {
        let value = json!({
            "title": "outer",
            "type": "array",
            "items": {"title": "bad title", "type": "string"}
        });
        assert!(matches!(
            Property::from_json_schema(&value),
            Err(PropertyError::InvalidTitle(t)) if t == "bad title"
        ));

        let value = json!({
            "title": "outer",
            "anyOf": [{"type": "null"}, {"title": "x.y", "type": "string"}]
        });
        assert!(Property::from_json_schema(&value).is_err());

        let value = json!({
            "title": "outer",
            "type": "object",
            "additionalProperties": {"title": "", "type": "string"}
        });
        assert!(Property::from_json_schema(&value).is_err());
    }

    #[test]
    fn combinators_are_rejected_at_any_depth() {
        let value = json!({"title": "x", "allOf": [{"type": "string"}]});
        assert_eq!(
            Property::from_json_schema(&value).unwrap_err(),
            PropertyError::UnsupportedCombinator("allOf".to_string())
        );

        let value = json!({
            "title": "x",
            "type": "object",
            "properties": {"inner": {"oneOf": [{"type": "string"}]}}
        });
        assert_eq!(
            Property::from_json_schema(&value).unwrap_err(),
            PropertyError::UnsupportedCombinator("oneOf".to_string())
        );
    }

    #[test]
    fn duplicate_titles_in_a_list_are_rejected() {
        let list = vec![Property::string("a").unwrap(), Property::integer("a").unwrap()];
        assert!(matches!(
            validate_property_list(&list, "inputs"),
            Err(PropertyError::DuplicateTitle { .. })
        ));
    }

    #[test]
    fn type_list_parses_as_union() {
        let schema = Schema::from_json(&json!({"type": ["string", "null"]})).unwrap();
        assert!(schema.same_type(&Schema::any_of(vec![Schema::null(), Schema::string()])));
    }

    #[test]
    fn same_type_ignores_titles_and_compares_unions_as_sets() {
        let a = Schema::any_of(vec![Schema::string(), Schema::integer()]).with_title("a");
        let b = Schema::any_of(vec![Schema::integer(), Schema::string()]).with_title("b");
        assert!(a.same_type(&b));

        let c = Schema::any_of(vec![Schema::integer()]);
        assert!(!a.same_type(&c));
    }

    #[test]
    fn same_type_recurses_into_objects_and_arrays() {
        let a = Schema::object([("x", Schema::integer()), ("y", Schema::array(Schema::string()))]);
        let b = Schema::object([("y", Schema::array(Schema::string())), ("x", Schema::integer())]);
        assert!(a.same_type(&b));

        let c = Schema::object([("x", Schema::integer())]);
        assert!(!a.same_type(&c));
        assert!(!Schema::array(Schema::string()).same_type(&Schema::array(Schema::number())));
    }

    #[test]
    fn castability_is_asymmetric() {
        assert!(Schema::integer().castable_to(&Schema::string()));
        assert!(!Schema::string().castable_to(&Schema::integer()));
    }

    #[test]
    fn numeric_scalars_are_mutually_castable() {
        for a in [Schema::number(), Schema::integer(), Schema::boolean()] {
            for b in [Schema::number(), Schema::integer(), Schema::boolean()] {
                assert!(a.castable_to(&b));
            }
        }
        assert!(!Schema::null().castable_to(&Schema::integer()));
    }

    #[test]
    fn anything_casts_to_untyped_target() {
        let obj = Schema::object([("x", Schema::integer())]);
        assert!(obj.castable_to(&Schema::any()));
        assert!(!Schema::any().castable_to(&Schema::integer()));
    }

    #[test]
    fn union_castability_requires_every_source_alternative() {
        let source = Schema::any_of(vec![Schema::integer(), Schema::null()]);
        assert!(!source.castable_to(&Schema::integer()));
        assert!(source.castable_to(&Schema::any_of(vec![Schema::number(), Schema::null()])));
        assert!(Schema::integer().castable_to(&Schema::any_of(vec![Schema::null(), Schema::number()])));
    }

    #[test]
    fn array_castability_follows_items() {
        assert!(Schema::array(Schema::integer()).castable_to(&Schema::array(Schema::number())));
        assert!(!Schema::array(Schema::string()).castable_to(&Schema::array(Schema::number())));
    }

    #[test]
    fn object_castability_needs_every_target_property() {
        let wide = Schema::object([("x", Schema::integer()), ("y", Schema::string())]);
        let narrow = Schema::object([("x", Schema::number())]);
        assert!(wide.castable_to(&narrow));
        assert!(!narrow.castable_to(&wide));
    }

    #[test]
    fn object_castability_compares_additional_properties() {
        let open_ints = Schema::map(Schema::integer());
        let open_numbers = Schema::map(Schema::number());
        let open_strings = Schema::map(Schema::string());
        assert!(open_ints.castable_to(&open_numbers));
        assert!(open_ints.castable_to(&open_strings));
        assert!(!open_strings.castable_to(&open_ints));

        let closed = Schema::of(SchemaType::Object {
            properties: IndexMap::new(),
            additional_properties: Some(AdditionalProperties::Allowed(false)),
        });
        let open = Schema::of(SchemaType::Object {
            properties: IndexMap::new(),
            additional_properties: Some(AdditionalProperties::Allowed(true)),
        });
        assert!(!closed.castable_to(&open));
        assert!(closed.castable_to(&open_ints));
    }

    #[test]
    fn dangerous_keys_are_dropped_from_schemas() {
        let value = json!({
            "title": "x",
            "type": "object",
            "properties": {"__proto__": {"type": "string"}, "ok": {"type": "string"}},
            "default": {"constructor": 1, "kept": {"prototype": 2}},
            "prototype": {"polluted": true}
        });
        let property = Property::from_json_schema(&value).unwrap();
        let out = property.to_json_schema();
        assert!(out.get("prototype").is_none());
        assert!(out["properties"].get("__proto__").is_none());
        assert!(out["default"].get("constructor").is_none());
        assert!(out["default"]["kept"].get("prototype").is_none());
    }

    #[test]
    fn extra_keywords_are_preserved() {
        let value = json!({"title": "color", "type": "string", "enum": ["red", "blue"]});
        let property = Property::from_json_schema(&value).unwrap();
        assert_eq!(property.to_json_schema(), value);
    }
}
