// ABOUTME: Flow kinds: the flow graph itself, its node variants, and control/data edges.
// ABOUTME: A flow node embeds another flow, so flows nest to any depth.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::component::{Component, ComponentError, ComponentIo, FieldValue, Fields, expect_kind};
use crate::deserialize::{DeserializationContext, DeserializationError, Record};

fn is_node(c: &Component) -> bool {
    c.as_node().is_some()
}

fn is_start_node(c: &Component) -> bool {
    c.as_node().is_some_and(|n| matches!(n.kind, NodeKind::Start))
}

fn is_control_edge(c: &Component) -> bool {
    matches!(c.kind, crate::component::ComponentKind::ControlFlowEdge(_))
}

fn is_data_edge(c: &Component) -> bool {
    matches!(c.kind, crate::component::ComponentKind::DataFlowEdge(_))
}

/// A directed graph of nodes joined by control and data edges.
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub start_node: Arc<Component>,
    pub nodes: Vec<Arc<Component>>,
    pub control_flow_connections: Vec<Arc<Component>>,
    pub data_flow_connections: Vec<Arc<Component>>,
    pub io: ComponentIo,
}

impl Flow {
    /// The start node must be a `StartNode` and must also appear in `nodes`.
    pub fn new(
        start_node: Arc<Component>,
        nodes: Vec<Arc<Component>>,
    ) -> Result<Self, ComponentError> {
        let start_node = expect_kind(start_node, "Flow", "startNode", "a start node", is_start_node)?;
        let nodes: Vec<_> = nodes
            .into_iter()
            .map(|n| expect_kind(n, "Flow", "nodes", "a node", is_node))
            .collect::<Result<_, _>>()?;
        if !nodes.iter().any(|n| n.id == start_node.id) {
            return Err(ComponentError::InvalidField {
                kind: "Flow",
                field: "nodes",
                reason: format!("start node {} is not listed", start_node.id),
            });
        }
        Ok(Self {
            start_node,
            nodes,
            control_flow_connections: Vec::new(),
            data_flow_connections: Vec::new(),
            io: ComponentIo::default(),
        })
    }

    pub fn with_control_flow(mut self, edges: Vec<Arc<Component>>) -> Result<Self, ComponentError> {
        self.control_flow_connections = edges
            .into_iter()
            .map(|e| {
                expect_kind(e, "Flow", "controlFlowConnections", "a control flow edge", is_control_edge)
            })
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    pub fn with_data_flow(mut self, edges: Vec<Arc<Component>>) -> Result<Self, ComponentError> {
        self.data_flow_connections = edges
            .into_iter()
            .map(|e| expect_kind(e, "Flow", "dataFlowConnections", "a data flow edge", is_data_edge))
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    pub fn with_io(mut self, io: ComponentIo) -> Self {
        self.io = io;
        self
    }

    pub(crate) fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        self.io.push_fields(&mut fields);
        fields.insert("startNode".to_string(), Arc::clone(&self.start_node).into());
        fields.insert("nodes".to_string(), FieldValue::components(&self.nodes));
        fields.insert(
            "controlFlowConnections".to_string(),
            FieldValue::components(&self.control_flow_connections),
        );
        fields.insert(
            "dataFlowConnections".to_string(),
            FieldValue::components(&self.data_flow_connections),
        );
        fields
    }

    pub(crate) fn from_record(
        record: &Record<'_>,
        ctx: &mut DeserializationContext,
    ) -> Result<Self, DeserializationError> {
        let flow = Flow::new(ctx.component(record, "startNode")?, ctx.component_list(record, "nodes")?)?
            .with_control_flow(ctx.component_list(record, "controlFlowConnections")?)?
            .with_data_flow(ctx.component_list(record, "dataFlowConnections")?)?
            .with_io(record.io()?);
        Ok(flow)
    }
}

/// What a flow node does when control reaches it.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Start,
    End {
        branch_name: Option<String>,
    },
    Llm {
        llm_config: Arc<Component>,
        prompt_template: String,
    },
    Tool {
        tool: Arc<Component>,
    },
    Agent {
        agent: Arc<Component>,
    },
    Flow {
        subflow: Arc<Component>,
    },
    /// Routes control by matching an input value against `mapping` keys.
    Branching {
        mapping: IndexMap<String, String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub io: ComponentIo,
}

impl Node {
    pub fn start(io: ComponentIo) -> Self {
        Self {
            kind: NodeKind::Start,
            io,
        }
    }

    pub fn end(io: ComponentIo) -> Self {
        Self {
            kind: NodeKind::End { branch_name: None },
            io,
        }
    }

    pub fn end_branch(branch_name: impl Into<String>, io: ComponentIo) -> Self {
        Self {
            kind: NodeKind::End {
                branch_name: Some(branch_name.into()),
            },
            io,
        }
    }

    pub fn llm(
        llm_config: Arc<Component>,
        prompt_template: impl Into<String>,
        io: ComponentIo,
    ) -> Result<Self, ComponentError> {
        let llm_config = expect_kind(
            llm_config,
            "LlmNode",
            "llmConfig",
            "an LLM config",
            Component::is_llm_config,
        )?;
        Ok(Self {
            kind: NodeKind::Llm {
                llm_config,
                prompt_template: prompt_template.into(),
            },
            io,
        })
    }

    pub fn tool(tool: Arc<Component>, io: ComponentIo) -> Result<Self, ComponentError> {
        let tool = expect_kind(tool, "ToolNode", "tool", "a tool", Component::is_tool)?;
        Ok(Self {
            kind: NodeKind::Tool { tool },
            io,
        })
    }

    pub fn agent(agent: Arc<Component>, io: ComponentIo) -> Result<Self, ComponentError> {
        let agent = expect_kind(agent, "AgentNode", "agent", "an agent", Component::is_agentic)?;
        Ok(Self {
            kind: NodeKind::Agent { agent },
            io,
        })
    }

    pub fn flow(subflow: Arc<Component>, io: ComponentIo) -> Result<Self, ComponentError> {
        let subflow = expect_kind(subflow, "FlowNode", "subflow", "a flow", Component::is_flow)?;
        Ok(Self {
            kind: NodeKind::Flow { subflow },
            io,
        })
    }

    pub fn branching(mapping: IndexMap<String, String>, io: ComponentIo) -> Self {
        Self {
            kind: NodeKind::Branching { mapping },
            io,
        }
    }

    pub fn component_type(&self) -> &'static str {
        match self.kind {
            NodeKind::Start => "StartNode",
            NodeKind::End { .. } => "EndNode",
            NodeKind::Llm { .. } => "LlmNode",
            NodeKind::Tool { .. } => "ToolNode",
            NodeKind::Agent { .. } => "AgentNode",
            NodeKind::Flow { .. } => "FlowNode",
            NodeKind::Branching { .. } => "BranchingNode",
        }
    }

    pub(crate) fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        self.io.push_fields(&mut fields);
        match &self.kind {
            NodeKind::Start => {}
            NodeKind::End { branch_name } => {
                if let Some(branch) = branch_name {
                    fields.insert("branchName".to_string(), branch.clone().into());
                }
            }
            NodeKind::Llm {
                llm_config,
                prompt_template,
            } => {
                fields.insert("llmConfig".to_string(), Arc::clone(llm_config).into());
                fields.insert("promptTemplate".to_string(), prompt_template.clone().into());
            }
            NodeKind::Tool { tool } => {
                fields.insert("tool".to_string(), Arc::clone(tool).into());
            }
            NodeKind::Agent { agent } => {
                fields.insert("agent".to_string(), Arc::clone(agent).into());
            }
            NodeKind::Flow { subflow } => {
                fields.insert("subflow".to_string(), Arc::clone(subflow).into());
            }
            NodeKind::Branching { mapping } => {
                let mapping = mapping
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                fields.insert("mapping".to_string(), FieldValue::Data(Value::Object(mapping)));
            }
        }
        fields
    }

    pub(crate) fn from_record(
        record: &Record<'_>,
        ctx: &mut DeserializationContext,
    ) -> Result<Self, DeserializationError> {
        let io = record.io()?;
        let node = match record.component_type() {
            "StartNode" => Node::start(io),
            "EndNode" => match record.optional_str("branchName")? {
                Some(branch) => Node::end_branch(branch, io),
                None => Node::end(io),
            },
            "LlmNode" => Node::llm(
                ctx.component(record, "llmConfig")?,
                record.required_str("promptTemplate")?,
                io,
            )?,
            "ToolNode" => Node::tool(ctx.component(record, "tool")?, io)?,
            "AgentNode" => Node::agent(ctx.component(record, "agent")?, io)?,
            "FlowNode" => Node::flow(ctx.component(record, "subflow")?, io)?,
            "BranchingNode" => Node::branching(record.string_map("mapping")?, io),
            other => return Err(DeserializationError::UnknownComponentType(other.to_string())),
        };
        Ok(node)
    }
}

/// Transfers control from one node to the next, optionally only when the
/// source node exits through a named branch.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlFlowEdge {
    pub from_node: Arc<Component>,
    pub from_branch: Option<String>,
    pub to_node: Arc<Component>,
}

impl ControlFlowEdge {
    pub fn new(from_node: Arc<Component>, to_node: Arc<Component>) -> Result<Self, ComponentError> {
        Ok(Self {
            from_node: expect_kind(from_node, "ControlFlowEdge", "fromNode", "a node", is_node)?,
            from_branch: None,
            to_node: expect_kind(to_node, "ControlFlowEdge", "toNode", "a node", is_node)?,
        })
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.from_branch = Some(branch.into());
        self
    }

    pub(crate) fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("fromNode".to_string(), Arc::clone(&self.from_node).into());
        if let Some(branch) = &self.from_branch {
            fields.insert("fromBranch".to_string(), branch.clone().into());
        }
        fields.insert("toNode".to_string(), Arc::clone(&self.to_node).into());
        fields
    }

    pub(crate) fn from_record(
        record: &Record<'_>,
        ctx: &mut DeserializationContext,
    ) -> Result<Self, DeserializationError> {
        let mut edge = ControlFlowEdge::new(
            ctx.component(record, "fromNode")?,
            ctx.component(record, "toNode")?,
        )?;
        edge.from_branch = record.optional_str("fromBranch")?;
        Ok(edge)
    }
}

/// Carries one output of a node to one input of another.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFlowEdge {
    pub source_node: Arc<Component>,
    pub source_output: String,
    pub destination_node: Arc<Component>,
    pub destination_input: String,
}

impl DataFlowEdge {
    /// Both titles must exist on their nodes, and the output type must be
    /// castable to the input type.
    pub fn new(
        source_node: Arc<Component>,
        source_output: impl Into<String>,
        destination_node: Arc<Component>,
        destination_input: impl Into<String>,
    ) -> Result<Self, ComponentError> {
        let source_node = expect_kind(source_node, "DataFlowEdge", "sourceNode", "a node", is_node)?;
        let destination_node = expect_kind(
            destination_node,
            "DataFlowEdge",
            "destinationNode",
            "a node",
            is_node,
        )?;
        let source_output = source_output.into();
        let destination_input = destination_input.into();

        let output = source_node
            .outputs()
            .iter()
            .find(|p| p.title() == source_output)
            .ok_or_else(|| ComponentError::MissingEdgeProperty {
                node: source_node.id.clone(),
                direction: "output",
                title: source_output.clone(),
            })?;
        let input = destination_node
            .inputs()
            .iter()
            .find(|p| p.title() == destination_input)
            .ok_or_else(|| ComponentError::MissingEdgeProperty {
                node: destination_node.id.clone(),
                direction: "input",
                title: destination_input.clone(),
            })?;

        if !output.castable_to(input) {
            return Err(ComponentError::IncompatibleEdgeTypes {
                source_node: source_node.id.clone(),
                source_output,
                destination_node: destination_node.id.clone(),
                destination_input,
            });
        }

        Ok(Self {
            source_node,
            source_output,
            destination_node,
            destination_input,
        })
    }

    pub(crate) fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("sourceNode".to_string(), Arc::clone(&self.source_node).into());
        fields.insert("sourceOutput".to_string(), self.source_output.clone().into());
        fields.insert(
            "destinationNode".to_string(),
            Arc::clone(&self.destination_node).into(),
        );
        fields.insert(
            "destinationInput".to_string(),
            self.destination_input.clone().into(),
        );
        fields
    }

    pub(crate) fn from_record(
        record: &Record<'_>,
        ctx: &mut DeserializationContext,
    ) -> Result<Self, DeserializationError> {
        let edge = DataFlowEdge::new(
            ctx.component(record, "sourceNode")?,
            record.required_str("sourceOutput")?,
            ctx.component(record, "destinationNode")?,
            record.required_str("destinationInput")?,
        )?;
        Ok(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Property;

    fn io(inputs: Vec<Property>, outputs: Vec<Property>) -> ComponentIo {
        ComponentIo::new(inputs, outputs).unwrap()
    }

    fn node(name: &str, node: Node) -> Arc<Component> {
        Component::new(name, node).into_arc()
    }

    #[test]
    fn flow_requires_start_node_in_node_list() {
        let start = node("start", Node::start(ComponentIo::default()));
        let end = node("end", Node::end(ComponentIo::default()));
        let err = Flow::new(start, vec![end]).unwrap_err();
        assert!(matches!(err, ComponentError::InvalidField { field: "nodes", .. }));
    }

    #[test]
    fn flow_start_node_must_be_a_start_node() {
        let end = node("end", Node::end(ComponentIo::default()));
        let err = Flow::new(end.clone(), vec![end]).unwrap_err();
        assert!(matches!(err, ComponentError::UnexpectedKind { field: "startNode", .. }));
    }

    #[test]
    fn data_edge_checks_titles_exist() {
        let start = node("start", Node::start(io(vec![], vec![Property::string("q").unwrap()])));
        let end = node("end", Node::end(io(vec![Property::string("answer").unwrap()], vec![])));
        let err = DataFlowEdge::new(start, "missing", end, "answer").unwrap_err();
        assert!(matches!(
            err,
            ComponentError::MissingEdgeProperty { direction: "output", .. }
        ));
    }

    #[test]
    fn data_edge_checks_castability() {
        let start = node("start", Node::start(io(vec![], vec![Property::string("q").unwrap()])));
        let end = node("end", Node::end(io(vec![Property::integer("n").unwrap()], vec![])));
        let err = DataFlowEdge::new(start, "q", end, "n").unwrap_err();
        assert!(matches!(err, ComponentError::IncompatibleEdgeTypes { .. }));
    }

    #[test]
    fn data_edge_accepts_matching_types() {
        let start = node("start", Node::start(io(vec![], vec![Property::string("q").unwrap()])));
        let end = node("end", Node::end(io(vec![Property::string("q").unwrap()], vec![])));
        let edge = DataFlowEdge::new(start, "q", end, "q").unwrap();
        assert_eq!(edge.fields().len(), 4);
    }

    #[test]
    fn control_edge_omits_absent_branch() {
        let start = node("start", Node::start(ComponentIo::default()));
        let end = node("end", Node::end(ComponentIo::default()));
        let edge = ControlFlowEdge::new(start.clone(), end.clone()).unwrap();
        assert!(!edge.fields().contains_key("fromBranch"));
        let branched = edge.with_branch("yes");
        assert_eq!(branched.fields()["fromBranch"].as_str(), Some("yes"));
    }

    #[test]
    fn flow_node_nests_a_flow() {
        let start = node("start", Node::start(ComponentIo::default()));
        let inner = Component::new("inner", Flow::new(start.clone(), vec![start]).unwrap()).into_arc();
        let outer = Node::flow(inner.clone(), ComponentIo::default()).unwrap();
        assert_eq!(outer.component_type(), "FlowNode");
        assert!(Arc::ptr_eq(outer.fields()["subflow"].as_component().unwrap(), &inner));
    }

    #[test]
    fn branching_mapping_is_plain_data() {
        let mut mapping = IndexMap::new();
        mapping.insert("yes".to_string(), "approved".to_string());
        let fields = Node::branching(mapping, ComponentIo::default()).fields();
        assert_eq!(
            fields["mapping"],
            FieldValue::Data(serde_json::json!({"yes": "approved"}))
        );
    }
}
