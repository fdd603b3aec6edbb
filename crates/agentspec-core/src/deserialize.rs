// ABOUTME: Rebuilds typed component trees from plain documents, resolving references and sidecars.
// ABOUTME: Enforces size and depth limits, rejects circular references, strips dangerous keys.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};
use thiserror::Error;
use ulid::Ulid;

use crate::codec::{self, CodecError, DocumentFormat};
use crate::component::{Component, ComponentError, ComponentIo, FieldValue, Fields};
use crate::limits::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_INPUT_SIZE, encoded_size, exceeds_depth};
use crate::naming::{NamingMode, ProtocolFields, strip_dangerous_keys};
use crate::property::{Property, PropertyError};
use crate::registry::PluginRegistry;
use crate::version::AgentSpecVersion;

#[derive(Debug, Error)]
pub enum DeserializationError {
    #[error("input is {size} bytes, over the limit of {limit}")]
    InputTooLarge { size: usize, limit: usize },

    #[error("input nests deeper than the limit of {limit}")]
    TooDeep { limit: usize },

    #[error("expected a mapping, got {0}")]
    NotAMapping(String),

    #[error("record has no {0} field")]
    MissingComponentType(String),

    #[error("{0} must be a string")]
    InvalidComponentType(String),

    #[error("no plugin handles component type {0}")]
    UnknownComponentType(String),

    #[error("unknown agentspec version {0}")]
    UnknownVersion(String),

    #[error("malformed reference: {0}")]
    MalformedReference(String),

    #[error("malformed referenced components: {0}")]
    MalformedSidecar(String),

    #[error("component {0} is defined more than once")]
    DuplicateReferencedComponent(String),

    #[error("unresolved component references: {}", .0.join(", "))]
    MissingReferences(Vec<String>),

    #[error("circular reference through component {0}")]
    CircularReference(String),

    #[error("{component_type} is missing required field {field}")]
    MissingField { component_type: String, field: String },

    #[error("{component_type}.{field}: {reason}")]
    InvalidField {
        component_type: String,
        field: String,
        reason: String,
    },

    #[error("document only holds referenced components; load it as disaggregated components")]
    SidecarOnlyDocument,

    #[error(transparent)]
    Component(#[from] ComponentError),

    #[error(transparent)]
    Property(#[from] PropertyError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Components the document may reference without defining them.
    pub components: IndexMap<String, Arc<Component>>,
    pub naming: NamingMode,
    /// Accept a document that holds only referenced components.
    pub disaggregated_only: bool,
    pub max_input_size: usize,
    pub max_depth: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            components: IndexMap::new(),
            naming: NamingMode::default(),
            disaggregated_only: false,
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_naming(mut self, naming: NamingMode) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_components<I>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = (String, Arc<Component>)>,
    {
        self.components.extend(components);
        self
    }

    pub fn with_component(mut self, component: Arc<Component>) -> Self {
        self.components.insert(component.id.clone(), component);
        self
    }

    pub fn disaggregated_only(mut self) -> Self {
        self.disaggregated_only = true;
        self
    }

    pub fn with_max_input_size(mut self, max_input_size: usize) -> Self {
        self.max_input_size = max_input_size;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// What a document held.
#[derive(Debug, Clone)]
pub enum LoadedDocument {
    Component(Arc<Component>),
    /// A sidecar document: reference id to component.
    ReferencedComponents(IndexMap<String, Arc<Component>>),
}

impl LoadedDocument {
    pub fn into_component(self) -> Option<Arc<Component>> {
        match self {
            LoadedDocument::Component(c) => Some(c),
            LoadedDocument::ReferencedComponents(_) => None,
        }
    }
}

/// Guess the naming mode of a document from the spelling of its root
/// protocol fields.
pub fn detect_naming(document: &Value) -> Option<NamingMode> {
    let map = document.as_object()?;
    [NamingMode::Canonical, NamingMode::Alternate]
        .into_iter()
        .find(|mode| {
            let protocol = mode.protocol();
            map.contains_key(protocol.component_type)
                || map.contains_key(protocol.referenced_components)
        })
}

/// Turns plain documents into component trees. Every call builds a fresh
/// context.
#[derive(Debug, Clone)]
pub struct Deserializer {
    registry: Arc<PluginRegistry>,
}

impl Default for Deserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer {
    pub fn new() -> Self {
        Self::with_registry(PluginRegistry::builtin())
    }

    pub fn with_registry(registry: PluginRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn load(
        &self,
        document: &Value,
        options: &LoadOptions,
    ) -> Result<LoadedDocument, DeserializationError> {
        let size = encoded_size(document);
        if size > options.max_input_size {
            return Err(DeserializationError::InputTooLarge {
                size,
                limit: options.max_input_size,
            });
        }
        if exceeds_depth(document, options.max_depth) {
            return Err(DeserializationError::TooDeep {
                limit: options.max_depth,
            });
        }

        let mut document = document.clone();
        let dropped = strip_dangerous_keys(&mut document);
        if dropped > 0 {
            tracing::debug!("dropped {} dangerous keys from input", dropped);
        }

        let root = match &document {
            Value::Object(map) => map,
            other => return Err(DeserializationError::NotAMapping(kind_of(other).to_string())),
        };
        let protocol = options.naming.protocol();
        let version = read_version(root, protocol)?;

        let sidecar = scan_references(&document, protocol, &options.components)?;
        let mut ctx = DeserializationContext {
            registry: Arc::clone(&self.registry),
            naming: options.naming,
            version,
            max_depth: options.max_depth,
            depth: 0,
            preseeded: options.components.clone(),
            sidecar,
            resolution: HashMap::new(),
        };

        if root.contains_key(protocol.component_type) {
            let component = ctx.load_record(root)?;
            tracing::debug!(
                "loaded {} ({}) at {}: {} components",
                component.id,
                component.component_type(),
                version,
                ctx.resolution.len()
            );
            return Ok(LoadedDocument::Component(component));
        }

        let Some(entries) = root.get(protocol.referenced_components) else {
            return Err(DeserializationError::MissingComponentType(
                protocol.component_type.to_string(),
            ));
        };
        if !options.disaggregated_only {
            return Err(DeserializationError::SidecarOnlyDocument);
        }
        let ids: Vec<String> = entries
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        let mut components = IndexMap::new();
        for id in ids {
            let component = ctx.resolve_reference(&id)?;
            components.insert(id, component);
        }
        tracing::debug!("loaded {} referenced components at {}", components.len(), version);
        Ok(LoadedDocument::ReferencedComponents(components))
    }

    /// Load a document that must have a root component.
    pub fn load_component(
        &self,
        document: &Value,
        options: &LoadOptions,
    ) -> Result<Arc<Component>, DeserializationError> {
        self.load(document, options)?
            .into_component()
            .ok_or(DeserializationError::SidecarOnlyDocument)
    }

    /// Decode and load text. The size limit is applied to the raw text
    /// before it is parsed.
    pub fn load_str(
        &self,
        text: &str,
        format: DocumentFormat,
        options: &LoadOptions,
    ) -> Result<LoadedDocument, DeserializationError> {
        if text.len() > options.max_input_size {
            return Err(DeserializationError::InputTooLarge {
                size: text.len(),
                limit: options.max_input_size,
            });
        }
        let document = codec::decode(text, format)?;
        self.load(&document, options)
    }

    pub fn from_json(
        &self,
        text: &str,
        options: &LoadOptions,
    ) -> Result<Arc<Component>, DeserializationError> {
        self.load_str(text, DocumentFormat::Json, options)?
            .into_component()
            .ok_or(DeserializationError::SidecarOnlyDocument)
    }

    pub fn from_yaml(
        &self,
        text: &str,
        options: &LoadOptions,
    ) -> Result<Arc<Component>, DeserializationError> {
        self.load_str(text, DocumentFormat::Yaml, options)?
            .into_component()
            .ok_or(DeserializationError::SidecarOnlyDocument)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

/// The version the document was written at. The legacy field is read when
/// the current one is absent; a document without either is taken as current.
fn read_version(
    root: &Map<String, Value>,
    protocol: &ProtocolFields,
) -> Result<AgentSpecVersion, DeserializationError> {
    let raw = root
        .get(protocol.version)
        .or_else(|| root.get(protocol.legacy_version));
    match raw {
        None => {
            tracing::debug!("document has no version, reading as {}", AgentSpecVersion::CURRENT);
            Ok(AgentSpecVersion::CURRENT)
        }
        Some(Value::String(s)) => AgentSpecVersion::parse_document_version(s)
            .ok_or_else(|| DeserializationError::UnknownVersion(s.clone())),
        Some(other) => Err(DeserializationError::UnknownVersion(other.to_string())),
    }
}

/// Walk the whole document once before anything is built: collect every
/// sidecar entry and report every reference that nothing defines, as one
/// batch.
fn scan_references(
    document: &Value,
    protocol: &ProtocolFields,
    preseeded: &IndexMap<String, Arc<Component>>,
) -> Result<HashMap<String, Arc<Value>>, DeserializationError> {
    let mut defined: HashMap<String, Arc<Value>> = HashMap::new();
    let mut used: IndexSet<String> = IndexSet::new();
    let mut stack = vec![document];

    while let Some(value) = stack.pop() {
        match value {
            Value::Array(items) => stack.extend(items.iter().rev()),
            Value::Object(map) => {
                if let Some(target) = map.get(protocol.component_ref) {
                    let Value::String(id) = target else {
                        return Err(DeserializationError::MalformedReference(format!(
                            "{} must be a string, got {}",
                            protocol.component_ref,
                            kind_of(target)
                        )));
                    };
                    used.insert(id.clone());
                }
                if let Some(entries) = map.get(protocol.referenced_components) {
                    let Value::Object(entries) = entries else {
                        return Err(DeserializationError::MalformedSidecar(format!(
                            "{} must be a mapping, got {}",
                            protocol.referenced_components,
                            kind_of(entries)
                        )));
                    };
                    for (id, record) in entries {
                        if !record.is_object() {
                            return Err(DeserializationError::MalformedSidecar(format!(
                                "entry {} is {}, not a mapping",
                                id,
                                kind_of(record)
                            )));
                        }
                        if defined.contains_key(id) {
                            return Err(DeserializationError::DuplicateReferencedComponent(
                                id.clone(),
                            ));
                        }
                        if preseeded.contains_key(id) {
                            tracing::debug!("{} is supplied by the caller, ignoring its definition", id);
                        }
                        defined.insert(id.clone(), Arc::new(record.clone()));
                    }
                }
                stack.extend(map.values().rev());
            }
            _ => {}
        }
    }

    let missing: Vec<String> = used
        .into_iter()
        .filter(|id| !defined.contains_key(id) && !preseeded.contains_key(id))
        .collect();
    if !missing.is_empty() {
        return Err(DeserializationError::MissingReferences(missing));
    }
    Ok(defined)
}

fn holds_component(value: &Value, protocol: &ProtocolFields) -> bool {
    match value {
        Value::Object(map) => {
            map.contains_key(protocol.component_type)
                || map.contains_key(protocol.component_ref)
                || map.values().any(|v| holds_component(v, protocol))
        }
        Value::Array(items) => items.iter().any(|v| holds_component(v, protocol)),
        _ => false,
    }
}

const BASE_FIELDS: [&str; 4] = ["id", "name", "description", "metadata"];

/// One component record as seen by a plugin. Field lookups take internal
/// (camelCase) names and apply the document's naming mode.
pub struct Record<'a> {
    fields: &'a Map<String, Value>,
    naming: NamingMode,
    component_type: &'a str,
}

impl<'a> Record<'a> {
    pub fn component_type(&self) -> &'a str {
        self.component_type
    }

    /// The value of `field`, or `None` if absent or null.
    pub fn get(&self, field: &str) -> Option<&'a Value> {
        let key = self.naming.field_to_document(field);
        self.fields.get(&key).filter(|v| !v.is_null())
    }

    /// Kind-specific fields by internal name, excluding base and protocol
    /// fields.
    pub fn fields(&self) -> impl Iterator<Item = (String, &'a Value)> + '_ {
        self.fields_declared(&[])
    }

    /// Like [`Record::fields`], but a key written for one of `declared` comes
    /// back with that exact name. Other keys go through the naming inverse,
    /// which cannot restore acronym runs (`useMTLS` reads back as `useMtls`).
    pub fn fields_declared<'b>(
        &'b self,
        declared: &'b [String],
    ) -> impl Iterator<Item = (String, &'a Value)> + 'b {
        let protocol = self.naming.protocol();
        self.fields
            .iter()
            .filter(move |(k, _)| !protocol.contains(k) && !BASE_FIELDS.contains(&k.as_str()))
            .map(move |(k, v)| {
                let name = declared
                    .iter()
                    .find(|d| self.naming.field_to_document(d) == *k)
                    .cloned()
                    .unwrap_or_else(|| self.naming.field_from_document(k));
                (name, v)
            })
    }

    fn missing(&self, field: &str) -> DeserializationError {
        DeserializationError::MissingField {
            component_type: self.component_type.to_string(),
            field: field.to_string(),
        }
    }

    fn invalid(&self, field: &str, reason: impl Into<String>) -> DeserializationError {
        DeserializationError::InvalidField {
            component_type: self.component_type.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn required_str(&self, field: &str) -> Result<String, DeserializationError> {
        self.optional_str(field)?.ok_or_else(|| self.missing(field))
    }

    pub fn optional_str(&self, field: &str) -> Result<Option<String>, DeserializationError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.invalid(field, format!("expected a string, got {}", kind_of(other)))),
        }
    }

    pub fn optional_bool(&self, field: &str) -> Result<Option<bool>, DeserializationError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.invalid(field, format!("expected a boolean, got {}", kind_of(other)))),
        }
    }

    /// Opaque user data. Keys are kept as written.
    pub fn data_map(&self, field: &str) -> Result<Option<Map<String, Value>>, DeserializationError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map.clone())),
            Some(other) => Err(self.invalid(field, format!("expected a mapping, got {}", kind_of(other)))),
        }
    }

    /// A mapping whose values must all be strings. Absent means empty.
    pub fn string_map(&self, field: &str) -> Result<IndexMap<String, String>, DeserializationError> {
        let Some(map) = self.data_map(field)? else {
            return Ok(IndexMap::new());
        };
        map.into_iter()
            .map(|(k, v)| match v {
                Value::String(s) => Ok((k, s)),
                other => Err(self.invalid(
                    field,
                    format!("value for {k} must be a string, got {}", kind_of(&other)),
                )),
            })
            .collect()
    }

    /// A list of JSON schemas, each of which must carry a title. Absent
    /// means empty.
    pub fn properties(&self, field: &str) -> Result<Vec<Property>, DeserializationError> {
        match self.get(field) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items
                .iter()
                .map(Property::from_json_schema)
                .collect::<Result<_, _>>()?),
            Some(other) => Err(self.invalid(field, format!("expected a list, got {}", kind_of(other)))),
        }
    }

    pub fn io(&self) -> Result<ComponentIo, DeserializationError> {
        Ok(ComponentIo::new(
            self.properties("inputs")?,
            self.properties("outputs")?,
        )?)
    }
}

enum Resolution {
    InProgress,
    Resolved(Arc<Component>),
}

/// Per-load state: the sidecar entries found in the document, the
/// components the caller supplied, and every component built so far.
pub struct DeserializationContext {
    registry: Arc<PluginRegistry>,
    naming: NamingMode,
    version: AgentSpecVersion,
    max_depth: usize,
    depth: usize,
    preseeded: IndexMap<String, Arc<Component>>,
    sidecar: HashMap<String, Arc<Value>>,
    resolution: HashMap<String, Resolution>,
}

impl DeserializationContext {
    pub fn naming(&self) -> NamingMode {
        self.naming
    }

    /// The version the document declares.
    pub fn version(&self) -> AgentSpecVersion {
        self.version
    }

    /// A required component-valued field.
    pub fn component(
        &mut self,
        record: &Record<'_>,
        field: &str,
    ) -> Result<Arc<Component>, DeserializationError> {
        let value = record.get(field).ok_or_else(|| record.missing(field))?;
        self.component_value(value, record, field)
    }

    pub fn optional_component(
        &mut self,
        record: &Record<'_>,
        field: &str,
    ) -> Result<Option<Arc<Component>>, DeserializationError> {
        record
            .get(field)
            .map(|value| self.component_value(value, record, field))
            .transpose()
    }

    /// A list of components. Absent means empty.
    pub fn component_list(
        &mut self,
        record: &Record<'_>,
        field: &str,
    ) -> Result<Vec<Arc<Component>>, DeserializationError> {
        match record.get(field) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| self.component_value(item, record, field))
                .collect(),
            Some(other) => Err(record.invalid(field, format!("expected a list, got {}", kind_of(other)))),
        }
    }

    /// A list of two-element component lists.
    pub fn component_pairs(
        &mut self,
        record: &Record<'_>,
        field: &str,
    ) -> Result<Vec<(Arc<Component>, Arc<Component>)>, DeserializationError> {
        let Some(value) = record.get(field) else {
            return Ok(Vec::new());
        };
        let Value::Array(items) = value else {
            return Err(record.invalid(field, format!("expected a list, got {}", kind_of(value))));
        };
        items
            .iter()
            .map(|item| match item {
                Value::Array(pair) if pair.len() == 2 => Ok((
                    self.component_value(&pair[0], record, field)?,
                    self.component_value(&pair[1], record, field)?,
                )),
                _ => Err(record.invalid(field, "expected a pair of components")),
            })
            .collect()
    }

    /// Every kind-specific field of `record` as field values, for kinds
    /// that keep their fields as a bag. Nested component records and
    /// references become components; everything else stays data.
    pub fn generic_fields(
        &mut self,
        record: &Record<'_>,
        declared: &[String],
    ) -> Result<Fields, DeserializationError> {
        let mut fields = Fields::new();
        for (name, value) in record.fields_declared(declared) {
            let converted = self.generic_value(value, record, &name)?;
            fields.insert(name, converted);
        }
        Ok(fields)
    }

    fn generic_value(
        &mut self,
        value: &Value,
        record: &Record<'_>,
        field: &str,
    ) -> Result<FieldValue, DeserializationError> {
        let protocol = self.naming.protocol();
        match value {
            Value::Object(map)
                if map.contains_key(protocol.component_type) || map.contains_key(protocol.component_ref) =>
            {
                Ok(FieldValue::Component(self.component_value(value, record, field)?))
            }
            Value::Array(items) if holds_component(value, protocol) => items
                .iter()
                .map(|item| self.generic_value(item, record, field))
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::List),
            Value::Object(map) if holds_component(value, protocol) => {
                let mut entries = IndexMap::new();
                for (key, item) in map {
                    entries.insert(key.clone(), self.generic_value(item, record, field)?);
                }
                Ok(FieldValue::Map(entries))
            }
            other => Ok(FieldValue::Data(other.clone())),
        }
    }

    fn component_value(
        &mut self,
        value: &Value,
        record: &Record<'_>,
        field: &str,
    ) -> Result<Arc<Component>, DeserializationError> {
        let protocol = self.naming.protocol();
        let Value::Object(map) = value else {
            return Err(record.invalid(field, format!("expected a component, got {}", kind_of(value))));
        };
        match map.get(protocol.component_ref) {
            Some(_) if map.len() > 1 => Err(DeserializationError::MalformedReference(format!(
                "a {} record holds no other fields, got {}",
                protocol.component_ref,
                map.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
            ))),
            Some(Value::String(id)) => self.resolve_reference(id),
            Some(other) => Err(DeserializationError::MalformedReference(other.to_string())),
            None => self.load_record(map),
        }
    }

    /// Resolve a reference id. The id is marked in progress before its
    /// record is built, so re-entering it means the references form a cycle.
    fn resolve_reference(&mut self, id: &str) -> Result<Arc<Component>, DeserializationError> {
        match self.resolution.get(id) {
            Some(Resolution::InProgress) => {
                return Err(DeserializationError::CircularReference(id.to_string()));
            }
            Some(Resolution::Resolved(component)) => return Ok(Arc::clone(component)),
            None => {}
        }

        if let Some(component) = self.preseeded.get(id).cloned() {
            self.resolution
                .insert(id.to_string(), Resolution::Resolved(Arc::clone(&component)));
            return Ok(component);
        }

        let raw = self
            .sidecar
            .get(id)
            .cloned()
            .ok_or_else(|| DeserializationError::MissingReferences(vec![id.to_string()]))?;
        let Value::Object(map) = raw.as_ref() else {
            return Err(DeserializationError::MalformedSidecar(format!("entry {id} is not a mapping")));
        };

        self.resolution.insert(id.to_string(), Resolution::InProgress);
        let component = self.load_record(map)?;
        self.resolution
            .insert(id.to_string(), Resolution::Resolved(Arc::clone(&component)));
        Ok(component)
    }

    /// Build one component from its record. A record whose id was already
    /// built yields the existing component.
    fn load_record(&mut self, map: &Map<String, Value>) -> Result<Arc<Component>, DeserializationError> {
        if self.depth >= self.max_depth {
            return Err(DeserializationError::TooDeep {
                limit: self.max_depth,
            });
        }
        let protocol = self.naming.protocol();

        let component_type = match map.get(protocol.component_type) {
            None => {
                return Err(DeserializationError::MissingComponentType(
                    protocol.component_type.to_string(),
                ));
            }
            Some(Value::String(s)) => s.as_str(),
            Some(_) => {
                return Err(DeserializationError::InvalidComponentType(
                    protocol.component_type.to_string(),
                ));
            }
        };

        let plugin = self
            .registry
            .plugin_for(component_type)
            .cloned()
            .ok_or_else(|| DeserializationError::UnknownComponentType(component_type.to_string()))?;

        if let Some(Value::String(written)) = map.get(protocol.plugin_version)
            && written != plugin.plugin_version()
        {
            tracing::warn!(
                "{} was written by {} {}, loading with {}",
                component_type,
                plugin.plugin_name(),
                written,
                plugin.plugin_version()
            );
        }

        let record = Record {
            fields: map,
            naming: self.naming,
            component_type,
        };

        let id = match record.optional_str("id")? {
            Some(id) => id,
            None => Ulid::new().to_string(),
        };
        if let Some(Resolution::Resolved(existing)) = self.resolution.get(&id) {
            return Ok(Arc::clone(existing));
        }
        let name = record.required_str("name")?;
        let description = record.optional_str("description")?;
        let metadata = record.data_map("metadata")?.unwrap_or_default();

        self.depth += 1;
        let kind = plugin.deserialize(&record, self);
        self.depth -= 1;

        let component = Arc::new(Component {
            id: id.clone(),
            name,
            description,
            metadata,
            kind: kind?,
        });
        self.resolution
            .insert(id, Resolution::Resolved(Arc::clone(&component)));
        Ok(component)
    }
}
