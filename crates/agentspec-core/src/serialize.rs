// ABOUTME: Serializes a component tree into a plain document, placing shared components once.
// ABOUTME: Applies naming, version gates, sensitive-field exclusion and forced disaggregation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::codec::{self, CodecError, DocumentFormat};
use crate::component::{Component, FieldValue, Fields};
use crate::limits::{DEFAULT_MAX_DEPTH, depth_exceeding};
use crate::naming::{NamingMode, strip_dangerous_keys};
use crate::registry::PluginRegistry;
use crate::version::{AgentSpecVersion, SerializationPolicy};

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("no plugin handles component type {0}")]
    UnknownComponentType(String),

    #[error("document nests deeper than the maximum depth of {max_depth}")]
    DepthExceeded { max_depth: usize },

    #[error("root component {0} cannot be disaggregated")]
    CannotDisaggregateRoot(String),

    #[error("disaggregated component {0} is not reachable from the root")]
    UnknownDisaggregatedComponent(String),

    #[error("two different components share id {0}")]
    ConflictingId(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// A component that must always be written to the sidecar, optionally under
/// a different id.
#[derive(Debug, Clone, PartialEq)]
pub struct Disaggregation {
    pub component_id: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SaveOptions {
    pub target_version: AgentSpecVersion,
    pub naming: NamingMode,
    pub disaggregated: Vec<Disaggregation>,
    /// Return the sidecar of disaggregated components as a second document.
    pub export_sidecar: bool,
    pub max_depth: usize,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            target_version: AgentSpecVersion::CURRENT,
            naming: NamingMode::default(),
            disaggregated: Vec::new(),
            export_sidecar: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target_version(mut self, version: AgentSpecVersion) -> Self {
        self.target_version = version;
        self
    }

    pub fn with_naming(mut self, naming: NamingMode) -> Self {
        self.naming = naming;
        self
    }

    pub fn disaggregate(mut self, component_id: impl Into<String>) -> Self {
        self.disaggregated.push(Disaggregation {
            component_id: component_id.into(),
            alias: None,
        });
        self
    }

    pub fn disaggregate_as(mut self, component_id: impl Into<String>, alias: impl Into<String>) -> Self {
        self.disaggregated.push(Disaggregation {
            component_id: component_id.into(),
            alias: Some(alias.into()),
        });
        self
    }

    pub fn export_sidecar(mut self) -> Self {
        self.export_sidecar = true;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// The result of one save: the main document and, when requested, the
/// sidecar document holding disaggregated components.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedDocument {
    pub document: Value,
    pub sidecar: Option<Value>,
}

/// Turns component trees into plain documents. Holds the plugin registry and
/// the serialization policy; every call builds a fresh context.
#[derive(Debug, Clone)]
pub struct Serializer {
    registry: Arc<PluginRegistry>,
    policy: Arc<SerializationPolicy>,
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer {
    /// A serializer for the builtin catalog with the builtin policy.
    pub fn new() -> Self {
        Self::with_registry(PluginRegistry::builtin())
    }

    pub fn with_registry(registry: PluginRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            policy: Arc::new(SerializationPolicy::builtin()),
        }
    }

    pub fn with_policy(mut self, policy: SerializationPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn save(
        &self,
        root: &Arc<Component>,
        options: &SaveOptions,
    ) -> Result<SavedDocument, SerializationError> {
        let mut ctx = SerializationContext::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.policy),
            options,
        );
        ctx.save(root, options)
    }

    /// Save and encode the main document as JSON.
    pub fn to_json(
        &self,
        root: &Arc<Component>,
        options: &SaveOptions,
    ) -> Result<String, SerializationError> {
        let saved = self.save(root, options)?;
        Ok(codec::encode(&saved.document, DocumentFormat::Json)?)
    }

    /// Save and encode the main document as YAML.
    pub fn to_yaml(
        &self,
        root: &Arc<Component>,
        options: &SaveOptions,
    ) -> Result<String, SerializationError> {
        let saved = self.save(root, options)?;
        Ok(codec::encode(&saved.document, DocumentFormat::Yaml)?)
    }
}

/// Where a component's full record lives.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Placement {
    /// Inlined in the record of its only user.
    Inline(String),
    /// Written once in the sidecar of the given anchor and referenced elsewhere.
    Referenced(String),
}

type PlacementTable = IndexMap<String, Placement>;

/// Per-save state. Plugins receive it read-only to learn the target version
/// and naming mode.
pub struct SerializationContext {
    registry: Arc<PluginRegistry>,
    policy: Arc<SerializationPolicy>,
    version: AgentSpecVersion,
    naming: NamingMode,
    max_depth: usize,
    components: HashMap<String, Arc<Component>>,
    visible: HashMap<String, Arc<Fields>>,
    tables: HashMap<String, Arc<PlacementTable>>,
    records: HashMap<String, Map<String, Value>>,
    /// Anchor id to the ids whose records it hosts, in discovery order.
    anchored: HashMap<String, Vec<String>>,
    referenced: HashSet<String>,
    /// Disaggregated ids and the id their references use.
    aliases: IndexMap<String, String>,
    dropped_keys: usize,
}

impl SerializationContext {
    fn new(
        registry: Arc<PluginRegistry>,
        policy: Arc<SerializationPolicy>,
        options: &SaveOptions,
    ) -> Self {
        Self {
            registry,
            policy,
            version: options.target_version,
            naming: options.naming,
            max_depth: options.max_depth,
            components: HashMap::new(),
            visible: HashMap::new(),
            tables: HashMap::new(),
            records: HashMap::new(),
            anchored: HashMap::new(),
            referenced: HashSet::new(),
            aliases: IndexMap::new(),
            dropped_keys: 0,
        }
    }

    pub fn target_version(&self) -> AgentSpecVersion {
        self.version
    }

    pub fn naming(&self) -> NamingMode {
        self.naming
    }

    fn save(
        &mut self,
        root: &Arc<Component>,
        options: &SaveOptions,
    ) -> Result<SavedDocument, SerializationError> {
        let table = self.placement_table(root, 0)?;
        self.resolve_disaggregation(root, options)?;

        for (id, placement) in table.iter() {
            if let Placement::Referenced(anchor) = placement {
                if self.aliases.contains_key(id) {
                    continue;
                }
                self.referenced.insert(id.clone());
                self.anchored.entry(anchor.clone()).or_default().push(id.clone());
            }
        }

        let record = self.component_record(root, 0)?;
        let document = Value::Object(self.stamp_root(record));

        let sidecar = if options.export_sidecar && !self.aliases.is_empty() {
            Some(self.sidecar_document()?)
        } else {
            None
        };

        if self.dropped_keys > 0 {
            tracing::debug!("dropped {} dangerous keys from user data", self.dropped_keys);
        }
        tracing::debug!(
            "serialized {} ({}): {} components, {} referenced, {} disaggregated",
            root.id,
            root.component_type(),
            self.components.len(),
            self.referenced.len(),
            self.aliases.len()
        );

        Ok(SavedDocument { document, sidecar })
    }

    /// Fields of `component` that will be written at the target version:
    /// the plugin's fields minus version-gated and sensitive ones. A kind
    /// gated as a whole has no visible fields.
    fn visible_fields(&mut self, component: &Arc<Component>) -> Result<Arc<Fields>, SerializationError> {
        if let Some(fields) = self.visible.get(&component.id) {
            return Ok(Arc::clone(fields));
        }

        let ty = component.component_type();
        let plugin = self
            .registry
            .plugin_for(ty)
            .cloned()
            .ok_or_else(|| SerializationError::UnknownComponentType(ty.to_string()))?;

        let fields = if self.policy.kind_allowed(ty, self.version) {
            let mut fields = plugin.serialize(component, self)?;
            let policy = &self.policy;
            let version = self.version;
            fields.retain(|name, _| {
                policy.field_allowed(ty, name, version) && !policy.is_sensitive(ty, name)
            });
            fields
        } else {
            tracing::debug!(
                "{} requires {:?}, writing only its discriminator at {}",
                ty,
                self.policy.kind_minimum(ty),
                self.version
            );
            Fields::new()
        };

        let fields = Arc::new(fields);
        self.components.insert(component.id.clone(), Arc::clone(component));
        self.visible.insert(component.id.clone(), Arc::clone(&fields));
        Ok(fields)
    }

    /// Bottom-up lowest-common-ancestor placement for every component below
    /// `component`, memoized by id.
    ///
    /// A direct child is inlined here on first sight and referenced from here
    /// if it occurs again. Deeper entries are merged from each child's table;
    /// when two children disagree about an entry, this component becomes its
    /// anchor.
    fn placement_table(
        &mut self,
        component: &Arc<Component>,
        depth: usize,
    ) -> Result<Arc<PlacementTable>, SerializationError> {
        if depth > self.max_depth {
            return Err(SerializationError::DepthExceeded {
                max_depth: self.max_depth,
            });
        }
        if let Some(seen) = self.components.get(&component.id)
            && !Arc::ptr_eq(seen, component)
            && **seen != **component
        {
            return Err(SerializationError::ConflictingId(component.id.clone()));
        }
        if let Some(table) = self.tables.get(&component.id) {
            return Ok(Arc::clone(table));
        }

        let fields = self.visible_fields(component)?;
        let mut children = Vec::new();
        for value in fields.values() {
            value.collect_components(&mut children);
        }

        let here = component.id.clone();
        let mut table = PlacementTable::new();
        let mut unique: Vec<Arc<Component>> = Vec::new();
        for child in children {
            if table.contains_key(&child.id) {
                table.insert(child.id.clone(), Placement::Referenced(here.clone()));
            } else {
                table.insert(child.id.clone(), Placement::Inline(here.clone()));
                unique.push(child);
            }
        }

        for child in &unique {
            let child_table = self.placement_table(child, depth + 1)?;
            for (id, placement) in child_table.iter() {
                match table.get(id) {
                    None => {
                        table.insert(id.clone(), placement.clone());
                    }
                    Some(existing) if existing == placement => {}
                    Some(_) => {
                        table.insert(id.clone(), Placement::Referenced(here.clone()));
                    }
                }
            }
        }

        let table = Arc::new(table);
        self.tables.insert(here, Arc::clone(&table));
        Ok(table)
    }

    /// Validate forced disaggregation and pull along any referenced
    /// descendant of a disaggregated component whose anchor lies outside it,
    /// so the sidecar document is self-contained.
    fn resolve_disaggregation(
        &mut self,
        root: &Arc<Component>,
        options: &SaveOptions,
    ) -> Result<(), SerializationError> {
        for d in &options.disaggregated {
            if d.component_id == root.id {
                return Err(SerializationError::CannotDisaggregateRoot(root.id.clone()));
            }
            if !self.components.contains_key(&d.component_id) {
                return Err(SerializationError::UnknownDisaggregatedComponent(
                    d.component_id.clone(),
                ));
            }
            let reference = d.alias.clone().unwrap_or_else(|| d.component_id.clone());
            self.aliases.insert(d.component_id.clone(), reference);
        }
        if self.aliases.is_empty() {
            return Ok(());
        }

        let root_table = self.tables.get(&root.id).cloned().unwrap_or_default();
        let disaggregated: Vec<String> = self.aliases.keys().cloned().collect();
        for id in disaggregated {
            let below = self.descendants(&id);
            for (candidate, placement) in root_table.iter() {
                let Placement::Referenced(anchor) = placement else {
                    continue;
                };
                if below.contains(candidate)
                    && *anchor != id
                    && !below.contains(anchor)
                    && !self.aliases.contains_key(candidate)
                {
                    tracing::debug!(
                        "{} is shared outside disaggregated {}, moving it to the sidecar",
                        candidate,
                        id
                    );
                    self.aliases.insert(candidate.clone(), candidate.clone());
                }
            }
        }
        Ok(())
    }

    fn descendants(&self, id: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            let Some(fields) = self.visible.get(&current) else {
                continue;
            };
            let mut children = Vec::new();
            for value in fields.values() {
                value.collect_components(&mut children);
            }
            for child in children {
                if seen.insert(child.id.clone()) {
                    stack.push(child.id.clone());
                }
            }
        }
        seen
    }

    /// What the caller embeds for `component`: a reference record if the
    /// component lives in a sidecar, its full record otherwise.
    fn dump_component(
        &mut self,
        component: &Arc<Component>,
        depth: usize,
    ) -> Result<Value, SerializationError> {
        let record = self.component_record(component, depth)?;

        let reference = self
            .aliases
            .get(&component.id)
            .cloned()
            .or_else(|| self.referenced.contains(&component.id).then(|| component.id.clone()));

        Ok(match reference {
            Some(target) => {
                let mut r = Map::new();
                r.insert(
                    self.naming.protocol().component_ref.to_string(),
                    Value::String(target),
                );
                Value::Object(r)
            }
            None => Value::Object(record),
        })
    }

    /// The full record of `component`, computed once per id.
    fn component_record(
        &mut self,
        component: &Arc<Component>,
        depth: usize,
    ) -> Result<Map<String, Value>, SerializationError> {
        if let Some(record) = self.records.get(&component.id) {
            return Ok(record.clone());
        }
        if depth > self.max_depth {
            return Err(SerializationError::DepthExceeded {
                max_depth: self.max_depth,
            });
        }

        let fields = self.visible_fields(component)?;
        let ty = component.component_type().to_string();
        let protocol = self.naming.protocol();

        let mut record = Map::new();
        record.insert(protocol.component_type.to_string(), Value::String(ty.clone()));

        if let Some(plugin) = self.registry.plugin_for(&ty)
            && !self.registry.is_builtin(plugin)
        {
            record.insert(
                protocol.plugin_name.to_string(),
                Value::String(plugin.plugin_name().to_string()),
            );
            record.insert(
                protocol.plugin_version.to_string(),
                Value::String(plugin.plugin_version().to_string()),
            );
        }

        if self.policy.kind_allowed(&ty, self.version) {
            record.insert("id".to_string(), Value::String(component.id.clone()));
            record.insert("name".to_string(), Value::String(component.name.clone()));
            if let Some(description) = &component.description {
                record.insert("description".to_string(), Value::String(description.clone()));
            }
            if !component.metadata.is_empty() {
                let metadata = self.dump_data(&Value::Object(component.metadata.clone()), depth + 1)?;
                record.insert("metadata".to_string(), metadata);
            }

            for (name, value) in fields.iter() {
                let key = self.naming.field_to_document(name);
                let dumped = self.dump_field(value, depth + 1)?;
                record.insert(key, dumped);
            }

            let hosted = self.anchored.get(&component.id).cloned().unwrap_or_default();
            if !hosted.is_empty() {
                let mut sidecar = Map::new();
                for id in hosted {
                    let Some(child) = self.components.get(&id).cloned() else {
                        continue;
                    };
                    let child_record = self.component_record(&child, depth + 1)?;
                    sidecar.insert(id, Value::Object(child_record));
                }
                record.insert(
                    protocol.referenced_components.to_string(),
                    Value::Object(sidecar),
                );
            }
        }

        self.records.insert(component.id.clone(), record.clone());
        Ok(record)
    }

    fn dump_field(&mut self, value: &FieldValue, depth: usize) -> Result<Value, SerializationError> {
        if depth > self.max_depth {
            return Err(SerializationError::DepthExceeded {
                max_depth: self.max_depth,
            });
        }
        match value {
            FieldValue::Data(data) => self.dump_data(data, depth),
            FieldValue::Component(component) => self.dump_component(component, depth),
            FieldValue::Property(property) => Ok(property.to_json_schema()),
            FieldValue::List(items) => items
                .iter()
                .map(|item| self.dump_field(item, depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            FieldValue::Map(entries) => {
                let mut out = Map::new();
                for (key, item) in entries {
                    if crate::naming::is_dangerous_key(key) {
                        self.dropped_keys += 1;
                        continue;
                    }
                    out.insert(key.clone(), self.dump_field(item, depth + 1)?);
                }
                Ok(Value::Object(out))
            }
        }
    }

    /// Opaque user data keeps its keys; only dangerous keys are dropped.
    fn dump_data(&mut self, data: &Value, depth: usize) -> Result<Value, SerializationError> {
        let budget = self.max_depth.saturating_sub(depth);
        if depth_exceeding(data, budget) > budget {
            return Err(SerializationError::DepthExceeded {
                max_depth: self.max_depth,
            });
        }
        let mut data = data.clone();
        self.dropped_keys += strip_dangerous_keys(&mut data);
        Ok(data)
    }

    /// Add the version field and order the root keys: discriminator,
    /// version, id, name, description, then everything else as written.
    fn stamp_root(&self, mut record: Map<String, Value>) -> Map<String, Value> {
        let protocol = self.naming.protocol();
        let mut ordered = Map::new();

        if let Some(ty) = record.shift_remove(protocol.component_type) {
            ordered.insert(protocol.component_type.to_string(), ty);
        }
        ordered.insert(
            protocol.version.to_string(),
            Value::String(self.version.as_str().to_string()),
        );
        for key in ["id", "name", "description"] {
            if let Some(value) = record.shift_remove(key) {
                ordered.insert(key.to_string(), value);
            }
        }
        ordered.extend(record);
        ordered
    }

    /// `{version, sidecar-field: {reference id: record}}` for every
    /// disaggregated component.
    fn sidecar_document(&mut self) -> Result<Value, SerializationError> {
        let protocol = self.naming.protocol();
        let mut entries = Map::new();
        let aliases: Vec<(String, String)> = self
            .aliases
            .iter()
            .map(|(id, alias)| (id.clone(), alias.clone()))
            .collect();
        for (id, reference) in aliases {
            let Some(component) = self.components.get(&id).cloned() else {
                continue;
            };
            let record = self.component_record(&component, 1)?;
            entries.insert(reference, Value::Object(record));
        }

        let mut doc = Map::new();
        doc.insert(
            protocol.version.to_string(),
            Value::String(self.version.as_str().to_string()),
        );
        doc.insert(
            protocol.referenced_components.to_string(),
            Value::Object(entries),
        );
        Ok(Value::Object(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentIo;
    use crate::kinds::{Agent, LlmConfig, ManagerWorkers, Swarm, Tool};
    use crate::property::Property;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn llm(id: &str) -> Arc<Component> {
        Component::new("model", LlmConfig::vllm("http://localhost:8000", "llama"))
            .with_id(id)
            .into_arc()
    }

    fn agent(id: &str, llm: &Arc<Component>) -> Arc<Component> {
        Component::new(id, Agent::new(Arc::clone(llm), "help").unwrap())
            .with_id(id)
            .into_arc()
    }

    fn save(root: &Arc<Component>, options: &SaveOptions) -> SavedDocument {
        Serializer::new().save(root, options).unwrap()
    }

    #[test]
    fn root_keys_are_ordered_and_versioned() {
        let root = Component::new("model", LlmConfig::vllm("http://h", "m"))
            .with_id("cfg")
            .with_description("a model")
            .into_arc();
        let doc = save(&root, &SaveOptions::default()).document;
        let keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["component_type", "agentspec_version", "id", "name", "description", "url", "model_id"]
        );
        assert_eq!(doc["agentspec_version"], "26.1.0");
    }

    #[test]
    fn unshared_children_are_inlined() {
        let config = llm("cfg");
        let root = agent("a", &config);
        let doc = save(&root, &SaveOptions::default()).document;
        assert_eq!(doc["llm_config"]["id"], "cfg");
        assert!(doc.get("$referenced_components").is_none());
    }

    #[test]
    fn shared_component_is_anchored_at_lowest_common_ancestor() {
        let config = llm("cfg");
        let manager = agent("manager", &config);
        let worker = agent("worker", &config);
        let root = Component::new("team", ManagerWorkers::new(manager, vec![worker]).unwrap())
            .with_id("team")
            .into_arc();

        let doc = save(&root, &SaveOptions::default()).document;
        assert_eq!(doc["group_manager"]["llm_config"], json!({"$component_ref": "cfg"}));
        assert_eq!(doc["workers"][0]["llm_config"], json!({"$component_ref": "cfg"}));
        let sidecar = doc["$referenced_components"].as_object().unwrap();
        assert_eq!(sidecar.len(), 1);
        assert_eq!(sidecar["cfg"]["component_type"], "VllmConfig");
    }

    #[test]
    fn anchor_is_not_hoisted_past_the_common_ancestor() {
        let config = llm("cfg");
        let a = agent("a", &config);
        let b = agent("b", &config);
        let swarm = Component::new("swarm", Swarm::new(a.clone(), vec![(a, b)]).unwrap())
            .with_id("swarm")
            .into_arc();
        let other = agent("other", &llm("cfg2"));
        let root = Component::new("team", ManagerWorkers::new(other, vec![swarm]).unwrap())
            .with_id("team")
            .into_arc();

        let doc = save(&root, &SaveOptions::default()).document;
        assert!(doc.get("$referenced_components").is_none());
        let swarm_record = &doc["workers"][0];
        let hosted = swarm_record["$referenced_components"].as_object().unwrap();
        let mut ids: Vec<_> = hosted.keys().cloned().collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "cfg"]);
        assert_eq!(swarm_record["first_agent"], json!({"$component_ref": "a"}));
    }

    #[test]
    fn repeated_direct_child_is_referenced_from_its_parent() {
        let tool = Component::new("t", Tool::server(ComponentIo::default()))
            .with_id("t")
            .into_arc();
        let root = Component::new(
            "a",
            Agent::new(llm("cfg"), "help")
                .unwrap()
                .with_tools(vec![tool.clone(), tool])
                .unwrap(),
        )
        .into_arc();
        let doc = save(&root, &SaveOptions::default()).document;
        assert_eq!(doc["tools"][0], json!({"$component_ref": "t"}));
        assert_eq!(doc["tools"][1], json!({"$component_ref": "t"}));
        assert_eq!(doc["$referenced_components"]["t"]["id"], "t");
    }

    #[test]
    fn alternate_naming_keeps_field_names() {
        let config = llm("cfg");
        let root = agent("a", &config);
        let options = SaveOptions::default().with_naming(NamingMode::Alternate);
        let doc = save(&root, &options).document;
        assert_eq!(doc["componentType"], "Agent");
        assert_eq!(doc["agentspecVersion"], "26.1.0");
        assert_eq!(doc["llmConfig"]["modelId"], "llama");
        assert!(doc.get("system_prompt").is_none());
    }

    #[test]
    fn sensitive_fields_are_never_written() {
        let root = Component::new(
            "model",
            LlmConfig::open_ai_compatible("http://h", "m").with_api_key("secret"),
        )
        .into_arc();
        let doc = save(&root, &SaveOptions::default()).document;
        assert!(doc.get("api_key").is_none());
        assert!(!doc.to_string().contains("secret"));
    }

    #[test]
    fn gated_field_is_the_only_difference_across_versions() {
        let root = agent("a", &llm("cfg"));
        let old = save(&root, &SaveOptions::default().with_target_version(AgentSpecVersion::V25_4_1)).document;
        let new = save(&root, &SaveOptions::default().with_target_version(AgentSpecVersion::V25_4_2)).document;

        let mut old = old.as_object().unwrap().clone();
        let mut new = new.as_object().unwrap().clone();
        assert!(old.remove("human_in_the_loop").is_none());
        assert_eq!(new.remove("human_in_the_loop"), Some(json!(true)));
        old.remove("agentspec_version");
        new.remove("agentspec_version");
        assert_eq!(old, new);
    }

    #[test]
    fn gated_kind_writes_only_its_discriminator() {
        let config = llm("cfg");
        let root = Component::new(
            "team",
            ManagerWorkers::new(agent("m", &config), vec![agent("w", &config)]).unwrap(),
        )
        .into_arc();
        let options = SaveOptions::default().with_target_version(AgentSpecVersion::V25_4_2);
        let doc = save(&root, &options).document;
        assert_eq!(
            doc,
            json!({"component_type": "ManagerWorkers", "agentspec_version": "25.4.2"})
        );
    }

    #[test]
    fn properties_are_written_as_json_schema() {
        let io = ComponentIo::new(vec![Property::string("city").unwrap()], vec![]).unwrap();
        let root = Component::new("weather", Tool::client(io)).into_arc();
        let doc = save(&root, &SaveOptions::default()).document;
        assert_eq!(doc["inputs"][0], json!({"title": "city", "type": "string"}));
    }

    #[test]
    fn dangerous_keys_are_dropped_from_user_data() {
        let mut metadata = Map::new();
        metadata.insert("__proto__".to_string(), json!({"admin": true}));
        metadata.insert("owner".to_string(), json!({"constructor": 1, "team": "ml"}));
        let root = Component::new("model", LlmConfig::open_ai("gpt-4o"))
            .with_metadata(metadata)
            .into_arc();
        let doc = save(&root, &SaveOptions::default()).document;
        assert_eq!(doc["metadata"], json!({"owner": {"team": "ml"}}));
    }

    #[test]
    fn disaggregated_component_goes_to_the_exported_sidecar() {
        let config = llm("cfg");
        let root = agent("a", &config);
        let options = SaveOptions::default().disaggregate("cfg").export_sidecar();
        let saved = save(&root, &options);
        assert_eq!(saved.document["llm_config"], json!({"$component_ref": "cfg"}));
        let sidecar = saved.sidecar.unwrap();
        assert_eq!(sidecar["agentspec_version"], "26.1.0");
        assert_eq!(sidecar["$referenced_components"]["cfg"]["model_id"], "llama");
    }

    #[test]
    fn disaggregation_alias_renames_the_reference() {
        let root = agent("a", &llm("cfg"));
        let options = SaveOptions::default().disaggregate_as("cfg", "shared-model").export_sidecar();
        let saved = save(&root, &options);
        assert_eq!(saved.document["llm_config"], json!({"$component_ref": "shared-model"}));
        let sidecar = saved.sidecar.unwrap();
        assert_eq!(sidecar["$referenced_components"]["shared-model"]["id"], "cfg");
    }

    #[test]
    fn sidecar_is_not_returned_unless_requested() {
        let root = agent("a", &llm("cfg"));
        let saved = save(&root, &SaveOptions::default().disaggregate("cfg"));
        assert!(saved.sidecar.is_none());
        assert_eq!(saved.document["llm_config"], json!({"$component_ref": "cfg"}));
    }

    #[test]
    fn root_cannot_be_disaggregated() {
        let root = agent("a", &llm("cfg"));
        let err = Serializer::new()
            .save(&root, &SaveOptions::default().disaggregate("a"))
            .unwrap_err();
        assert!(matches!(err, SerializationError::CannotDisaggregateRoot(_)));
    }

    #[test]
    fn unknown_disaggregated_id_is_rejected() {
        let root = agent("a", &llm("cfg"));
        let err = Serializer::new()
            .save(&root, &SaveOptions::default().disaggregate("nope"))
            .unwrap_err();
        assert!(matches!(err, SerializationError::UnknownDisaggregatedComponent(_)));
    }

    #[test]
    fn descendant_shared_outside_a_disaggregated_component_follows_it() {
        let config = llm("cfg");
        let manager = agent("manager", &config);
        let worker = agent("worker", &config);
        let root = Component::new("team", ManagerWorkers::new(manager, vec![worker]).unwrap())
            .with_id("team")
            .into_arc();
        let options = SaveOptions::default().disaggregate("worker").export_sidecar();
        let saved = save(&root, &options);

        assert!(saved.document.get("$referenced_components").is_none());
        let sidecar = &saved.sidecar.unwrap()["$referenced_components"];
        assert!(sidecar.get("worker").is_some());
        assert!(sidecar.get("cfg").is_some());
    }

    #[test]
    fn depth_limit_is_enforced() {
        let root = agent("a", &llm("cfg"));
        let err = Serializer::new()
            .save(&root, &SaveOptions::default().with_max_depth(1))
            .unwrap_err();
        assert!(matches!(err, SerializationError::DepthExceeded { .. }));
    }

    #[test]
    fn distinct_components_with_one_id_are_rejected() {
        let a = llm("cfg");
        let b = Component::new("other", LlmConfig::open_ai("gpt-4o"))
            .with_id("cfg")
            .into_arc();
        let root = Component::new(
            "team",
            ManagerWorkers::new(agent("m", &a), vec![agent("w", &b)]).unwrap(),
        )
        .into_arc();
        let err = Serializer::new().save(&root, &SaveOptions::default()).unwrap_err();
        assert!(matches!(err, SerializationError::ConflictingId(id) if id == "cfg"));
    }

    #[test]
    fn unknown_extension_kind_is_an_error() {
        let root = Component::new("memory", crate::kinds::ExtensionComponent::new("Memory")).into_arc();
        let err = Serializer::new().save(&root, &SaveOptions::default()).unwrap_err();
        assert!(matches!(err, SerializationError::UnknownComponentType(t) if t == "Memory"));
    }
}
