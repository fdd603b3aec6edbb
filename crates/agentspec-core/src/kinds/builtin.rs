// ABOUTME: The builtin plugin: serializes and deserializes every kind in the builtin catalog.
// ABOUTME: It is always registered and always consulted after user plugins.

use crate::component::{Component, ComponentKind, Fields};
use crate::deserialize::{DeserializationContext, DeserializationError, Record};
use crate::kinds::{
    Agent, ControlFlowEdge, DataFlowEdge, Flow, LlmConfig, LlmProvider, ManagerWorkers, Node,
    Swarm, Tool,
};
use crate::registry::ComponentPlugin;
use crate::serialize::{SerializationContext, SerializationError};
use crate::version::AgentSpecVersion;

pub const BUILTIN_PLUGIN_NAME: &str = "agentspec-builtin";

const NODE_TYPES: [&str; 7] = [
    "StartNode",
    "EndNode",
    "LlmNode",
    "ToolNode",
    "AgentNode",
    "FlowNode",
    "BranchingNode",
];

const TOOL_TYPES: [&str; 3] = ["ServerTool", "ClientTool", "RemoteTool"];

/// Every discriminator the builtin catalog defines.
pub fn builtin_component_types() -> Vec<&'static str> {
    let mut types: Vec<&'static str> = LlmProvider::ALL.iter().map(|p| p.component_type()).collect();
    types.extend(TOOL_TYPES);
    types.extend(["Agent", "Swarm", "ManagerWorkers", "Flow"]);
    types.extend(NODE_TYPES);
    types.extend(["ControlFlowEdge", "DataFlowEdge"]);
    types
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPlugin;

impl ComponentPlugin for BuiltinPlugin {
    fn plugin_name(&self) -> &str {
        BUILTIN_PLUGIN_NAME
    }

    fn plugin_version(&self) -> &str {
        AgentSpecVersion::CURRENT.as_str()
    }

    fn component_types(&self) -> Vec<String> {
        builtin_component_types().into_iter().map(String::from).collect()
    }

    fn serialize(
        &self,
        component: &Component,
        _ctx: &SerializationContext,
    ) -> Result<Fields, SerializationError> {
        let fields = match &component.kind {
            ComponentKind::LlmConfig(c) => c.fields(),
            ComponentKind::Tool(t) => t.fields(),
            ComponentKind::Agent(a) => a.fields(),
            ComponentKind::Swarm(s) => s.fields(),
            ComponentKind::ManagerWorkers(m) => m.fields(),
            ComponentKind::Flow(f) => f.fields(),
            ComponentKind::Node(n) => n.fields(),
            ComponentKind::ControlFlowEdge(e) => e.fields(),
            ComponentKind::DataFlowEdge(e) => e.fields(),
            ComponentKind::Extension(e) => {
                return Err(SerializationError::UnknownComponentType(
                    e.component_type.clone(),
                ));
            }
        };
        Ok(fields)
    }

    fn deserialize(
        &self,
        record: &Record<'_>,
        ctx: &mut DeserializationContext,
    ) -> Result<ComponentKind, DeserializationError> {
        let ty = record.component_type();
        let kind = if LlmProvider::from_component_type(ty).is_some() {
            LlmConfig::from_record(record)?.into()
        } else if TOOL_TYPES.contains(&ty) {
            Tool::from_record(record)?.into()
        } else if NODE_TYPES.contains(&ty) {
            Node::from_record(record, ctx)?.into()
        } else {
            match ty {
                "Agent" => Agent::from_record(record, ctx)?.into(),
                "Swarm" => Swarm::from_record(record, ctx)?.into(),
                "ManagerWorkers" => ManagerWorkers::from_record(record, ctx)?.into(),
                "Flow" => Flow::from_record(record, ctx)?.into(),
                "ControlFlowEdge" => ControlFlowEdge::from_record(record, ctx)?.into(),
                "DataFlowEdge" => DataFlowEdge::from_record(record, ctx)?.into(),
                other => return Err(DeserializationError::UnknownComponentType(other.to_string())),
            }
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_no_duplicates() {
        let types = builtin_component_types();
        let mut sorted = types.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), types.len());
        assert!(types.contains(&"ManagerWorkers"));
        assert!(types.contains(&"OpenAiCompatibleConfig"));
    }
}
