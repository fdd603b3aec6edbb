// ABOUTME: The builtin component catalog: LLM configs, tools, agents, flows and their parts.
// ABOUTME: Each kind lists its own fields and rebuilds itself from a deserialization record.

mod agent;
mod builtin;
mod extension;
mod flow;
mod llm;
mod tool;

pub use agent::{Agent, ManagerWorkers, Swarm};
pub use builtin::{BUILTIN_PLUGIN_NAME, BuiltinPlugin, builtin_component_types};
pub use extension::{ExtensionComponent, GenericPlugin};
pub use flow::{ControlFlowEdge, DataFlowEdge, Flow, Node, NodeKind};
pub use llm::{LlmConfig, LlmProvider};
pub use tool::{RemoteEndpoint, Tool, ToolKind};
