// ABOUTME: The component base type, its kind sum type, and the field values plugins exchange.
// ABOUTME: Components are immutable once built and shared by Arc; identity is the string id.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;
use ulid::Ulid;

use crate::kinds::{
    Agent, ControlFlowEdge, DataFlowEdge, ExtensionComponent, Flow, LlmConfig, ManagerWorkers,
    Node, Swarm, Tool,
};
use crate::property::{Property, PropertyError, validate_property_list};

/// Errors raised by component constructors when the graph they describe is
/// structurally invalid.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ComponentError {
    #[error(transparent)]
    Property(#[from] PropertyError),

    #[error("{kind}.{field} expects {expected}, got {found} ({id})")]
    UnexpectedKind {
        kind: &'static str,
        field: &'static str,
        expected: &'static str,
        found: String,
        id: String,
    },

    #[error("node {node} has no {direction} titled {title:?}")]
    MissingEdgeProperty {
        node: String,
        direction: &'static str,
        title: String,
    },

    #[error("output {source_output:?} of {source_node} cannot be cast to input {destination_input:?} of {destination_node}")]
    IncompatibleEdgeTypes {
        source_node: String,
        source_output: String,
        destination_node: String,
        destination_input: String,
    },

    #[error("{kind}.{field}: {reason}")]
    InvalidField {
        kind: &'static str,
        field: &'static str,
        reason: String,
    },
}

/// An ordered bag of named fields, keyed by internal (camelCase) field name.
pub type Fields = IndexMap<String, FieldValue>;

/// A field value as exchanged between plugins and the engine.
///
/// The variants separate values that carry identity (`Component`) from opaque
/// user data (`Data`), so the engine never has to guess by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Scalars and opaque user data. Mapping keys are preserved as written.
    Data(Value),
    Component(Arc<Component>),
    Property(Property),
    List(Vec<FieldValue>),
    /// A plain mapping whose values may hold components.
    Map(IndexMap<String, FieldValue>),
}

impl FieldValue {
    pub fn components<'a, I>(components: I) -> Self
    where
        I: IntoIterator<Item = &'a Arc<Component>>,
    {
        FieldValue::List(
            components
                .into_iter()
                .map(|c| FieldValue::Component(Arc::clone(c)))
                .collect(),
        )
    }

    pub fn properties(properties: &[Property]) -> Self {
        FieldValue::List(properties.iter().cloned().map(FieldValue::Property).collect())
    }

    /// Push every component held directly by this value, walking through
    /// lists and mappings but not into the components themselves.
    pub fn collect_components(&self, out: &mut Vec<Arc<Component>>) {
        match self {
            FieldValue::Component(c) => out.push(Arc::clone(c)),
            FieldValue::List(items) => items.iter().for_each(|v| v.collect_components(out)),
            FieldValue::Map(entries) => entries.values().for_each(|v| v.collect_components(out)),
            FieldValue::Data(_) | FieldValue::Property(_) => {}
        }
    }

    pub fn as_component(&self) -> Option<&Arc<Component>> {
        match self {
            FieldValue::Component(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Data(Value::String(s)) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Data(Value::String(s.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Data(Value::String(s))
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Data(Value::Bool(b))
    }
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        FieldValue::Data(v)
    }
}

impl From<Map<String, Value>> for FieldValue {
    fn from(m: Map<String, Value>) -> Self {
        FieldValue::Data(Value::Object(m))
    }
}

impl From<Arc<Component>> for FieldValue {
    fn from(c: Arc<Component>) -> Self {
        FieldValue::Component(c)
    }
}

impl From<Property> for FieldValue {
    fn from(p: Property) -> Self {
        FieldValue::Property(p)
    }
}

/// Ordered input and output properties of a component. Titles are unique
/// within each list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComponentIo {
    inputs: Vec<Property>,
    outputs: Vec<Property>,
}

impl ComponentIo {
    pub fn new(inputs: Vec<Property>, outputs: Vec<Property>) -> Result<Self, PropertyError> {
        validate_property_list(&inputs, "inputs")?;
        validate_property_list(&outputs, "outputs")?;
        Ok(Self { inputs, outputs })
    }

    pub fn inputs(&self) -> &[Property] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Property] {
        &self.outputs
    }

    pub fn input(&self, title: &str) -> Option<&Property> {
        self.inputs.iter().find(|p| p.title() == title)
    }

    pub fn output(&self, title: &str) -> Option<&Property> {
        self.outputs.iter().find(|p| p.title() == title)
    }

    pub(crate) fn push_fields(&self, fields: &mut Fields) {
        fields.insert("inputs".to_string(), FieldValue::properties(&self.inputs));
        fields.insert("outputs".to_string(), FieldValue::properties(&self.outputs));
    }
}

/// The concrete kind of a component. Builtin kinds are variants; kinds
/// contributed by plugins use `Extension`.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
    LlmConfig(LlmConfig),
    Tool(Tool),
    Agent(Agent),
    Swarm(Swarm),
    ManagerWorkers(ManagerWorkers),
    Flow(Flow),
    Node(Node),
    ControlFlowEdge(ControlFlowEdge),
    DataFlowEdge(DataFlowEdge),
    Extension(ExtensionComponent),
}

impl ComponentKind {
    /// The discriminator written for this kind.
    pub fn component_type(&self) -> &str {
        match self {
            ComponentKind::LlmConfig(c) => c.provider.component_type(),
            ComponentKind::Tool(t) => t.component_type(),
            ComponentKind::Agent(_) => "Agent",
            ComponentKind::Swarm(_) => "Swarm",
            ComponentKind::ManagerWorkers(_) => "ManagerWorkers",
            ComponentKind::Flow(_) => "Flow",
            ComponentKind::Node(n) => n.component_type(),
            ComponentKind::ControlFlowEdge(_) => "ControlFlowEdge",
            ComponentKind::DataFlowEdge(_) => "DataFlowEdge",
            ComponentKind::Extension(e) => &e.component_type,
        }
    }

    /// Fields as the kind declares them, before naming, gating or
    /// sensitive-field exclusion.
    pub fn fields(&self) -> Fields {
        match self {
            ComponentKind::LlmConfig(c) => c.fields(),
            ComponentKind::Tool(t) => t.fields(),
            ComponentKind::Agent(a) => a.fields(),
            ComponentKind::Swarm(s) => s.fields(),
            ComponentKind::ManagerWorkers(m) => m.fields(),
            ComponentKind::Flow(f) => f.fields(),
            ComponentKind::Node(n) => n.fields(),
            ComponentKind::ControlFlowEdge(e) => e.fields(),
            ComponentKind::DataFlowEdge(e) => e.fields(),
            ComponentKind::Extension(e) => e.fields.clone(),
        }
    }

    /// Inputs and outputs, for kinds that declare them.
    pub fn io(&self) -> Option<&ComponentIo> {
        match self {
            ComponentKind::Tool(t) => Some(&t.io),
            ComponentKind::Agent(a) => Some(&a.io),
            ComponentKind::Flow(f) => Some(&f.io),
            ComponentKind::Node(n) => Some(&n.io),
            _ => None,
        }
    }
}

macro_rules! kind_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for ComponentKind {
                fn from(k: $variant) -> Self {
                    ComponentKind::$variant(k)
                }
            }
        )*
    };
}

kind_from!(
    LlmConfig,
    Tool,
    Agent,
    Swarm,
    ManagerWorkers,
    Flow,
    Node,
    ControlFlowEdge,
    DataFlowEdge,
);

impl From<ExtensionComponent> for ComponentKind {
    fn from(e: ExtensionComponent) -> Self {
        ComponentKind::Extension(e)
    }
}

/// A node of the component graph: identity, name, and a concrete kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub metadata: Map<String, Value>,
    pub kind: ComponentKind,
}

impl Component {
    /// Create a component with a freshly generated id.
    pub fn new(name: impl Into<String>, kind: impl Into<ComponentKind>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            name: name.into(),
            description: None,
            metadata: Map::new(),
            kind: kind.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn component_type(&self) -> &str {
        self.kind.component_type()
    }

    pub fn inputs(&self) -> &[Property] {
        self.kind.io().map(ComponentIo::inputs).unwrap_or_default()
    }

    pub fn outputs(&self) -> &[Property] {
        self.kind.io().map(ComponentIo::outputs).unwrap_or_default()
    }

    /// Every distinct component reachable from `self`, itself first, in
    /// depth-first order. Components are distinguished by id.
    pub fn reachable(self: &Arc<Self>) -> Vec<Arc<Component>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![Arc::clone(self)];
        while let Some(component) = stack.pop() {
            if !seen.insert(component.id.clone()) {
                continue;
            }
            let mut children = Vec::new();
            for value in component.kind.fields().values() {
                value.collect_components(&mut children);
            }
            stack.extend(children.into_iter().rev());
            out.push(component);
        }
        out
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn is_llm_config(&self) -> bool {
        matches!(self.kind, ComponentKind::LlmConfig(_))
    }

    pub fn is_tool(&self) -> bool {
        matches!(self.kind, ComponentKind::Tool(_))
    }

    /// Agents and agent groups: anything that can answer a conversation.
    pub fn is_agentic(&self) -> bool {
        matches!(
            self.kind,
            ComponentKind::Agent(_) | ComponentKind::Swarm(_) | ComponentKind::ManagerWorkers(_)
        )
    }

    pub fn is_agent(&self) -> bool {
        matches!(self.kind, ComponentKind::Agent(_))
    }

    pub fn is_flow(&self) -> bool {
        matches!(self.kind, ComponentKind::Flow(_))
    }

    pub fn as_node(&self) -> Option<&Node> {
        match &self.kind {
            ComponentKind::Node(n) => Some(n),
            _ => None,
        }
    }
}

/// Check that `component` satisfies `predicate`, or report which kind was
/// found instead.
pub(crate) fn expect_kind(
    component: Arc<Component>,
    kind: &'static str,
    field: &'static str,
    expected: &'static str,
    predicate: fn(&Component) -> bool,
) -> Result<Arc<Component>, ComponentError> {
    if predicate(&component) {
        Ok(component)
    } else {
        Err(ComponentError::UnexpectedKind {
            kind,
            field,
            expected,
            found: component.component_type().to_string(),
            id: component.id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::LlmConfig;

    fn llm() -> Arc<Component> {
        Component::new("model", LlmConfig::vllm("http://localhost:8000", "llama")).into_arc()
    }

    #[test]
    fn new_component_generates_distinct_ids() {
        let a = Component::new("a", LlmConfig::open_ai("gpt-4o"));
        let b = Component::new("b", LlmConfig::open_ai("gpt-4o"));
        assert_ne!(a.id, b.id);
        assert!(!a.id.is_empty());
    }

    #[test]
    fn component_type_follows_kind() {
        assert_eq!(llm().component_type(), "VllmConfig");
        let agent = Component::new("agent", Agent::new(llm(), "be helpful").unwrap());
        assert_eq!(agent.component_type(), "Agent");
    }

    #[test]
    fn io_rejects_duplicate_titles() {
        let err = ComponentIo::new(
            vec![Property::string("q").unwrap(), Property::string("q").unwrap()],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, PropertyError::DuplicateTitle { .. }));
    }

    #[test]
    fn collect_components_walks_lists_and_maps() {
        let a = llm();
        let b = llm();
        let mut entries = IndexMap::new();
        entries.insert("nested".to_string(), FieldValue::components([&b]));
        entries.insert("data".to_string(), FieldValue::Data(Value::Null));
        let value = FieldValue::List(vec![FieldValue::Component(a.clone()), FieldValue::Map(entries)]);

        let mut out = Vec::new();
        value.collect_components(&mut out);
        let ids: Vec<_> = out.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec![a.id.clone(), b.id.clone()]);
    }

    #[test]
    fn reachable_visits_shared_components_once() {
        let shared = llm();
        let worker = Component::new("w", Agent::new(shared.clone(), "work").unwrap()).into_arc();
        let manager = Component::new("m", Agent::new(shared.clone(), "lead").unwrap()).into_arc();
        let team = Component::new(
            "team",
            crate::kinds::ManagerWorkers::new(manager.clone(), vec![worker.clone()]).unwrap(),
        )
        .into_arc();

        let ids: Vec<_> = team.reachable().iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec![team.id.clone(), manager.id.clone(), shared.id.clone(), worker.id.clone()]);
    }

    #[test]
    fn expect_kind_reports_what_was_found() {
        let err = expect_kind(llm(), "Agent", "tools", "a tool", Component::is_tool).unwrap_err();
        assert!(err.to_string().contains("VllmConfig"));
    }
}
