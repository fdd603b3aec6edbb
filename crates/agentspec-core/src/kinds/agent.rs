// ABOUTME: Agentic kinds: a single LLM-backed agent, a swarm of peers, and a manager with workers.
// ABOUTME: Constructors check that every referenced component has the kind its field expects.

use std::sync::Arc;

use crate::component::{Component, ComponentError, ComponentIo, FieldValue, Fields, expect_kind};
use crate::deserialize::{DeserializationContext, DeserializationError, Record};

/// An LLM-backed conversational agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub llm_config: Arc<Component>,
    pub system_prompt: String,
    pub tools: Vec<Arc<Component>>,
    pub human_in_the_loop: bool,
    pub io: ComponentIo,
}

impl Agent {
    pub fn new(
        llm_config: Arc<Component>,
        system_prompt: impl Into<String>,
    ) -> Result<Self, ComponentError> {
        let llm_config = expect_kind(
            llm_config,
            "Agent",
            "llmConfig",
            "an LLM config",
            Component::is_llm_config,
        )?;
        Ok(Self {
            llm_config,
            system_prompt: system_prompt.into(),
            tools: Vec::new(),
            human_in_the_loop: true,
            io: ComponentIo::default(),
        })
    }

    pub fn with_tools(mut self, tools: Vec<Arc<Component>>) -> Result<Self, ComponentError> {
        self.tools = tools
            .into_iter()
            .map(|t| expect_kind(t, "Agent", "tools", "a tool", Component::is_tool))
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    pub fn with_io(mut self, io: ComponentIo) -> Self {
        self.io = io;
        self
    }

    pub fn with_human_in_the_loop(mut self, enabled: bool) -> Self {
        self.human_in_the_loop = enabled;
        self
    }

    pub(crate) fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        self.io.push_fields(&mut fields);
        fields.insert("llmConfig".to_string(), Arc::clone(&self.llm_config).into());
        fields.insert("systemPrompt".to_string(), self.system_prompt.clone().into());
        fields.insert("tools".to_string(), FieldValue::components(&self.tools));
        fields.insert("humanInTheLoop".to_string(), self.human_in_the_loop.into());
        fields
    }

    pub(crate) fn from_record(
        record: &Record<'_>,
        ctx: &mut DeserializationContext,
    ) -> Result<Self, DeserializationError> {
        let agent = Agent::new(
            ctx.component(record, "llmConfig")?,
            record.required_str("systemPrompt")?,
        )?
        .with_tools(ctx.component_list(record, "tools")?)?
        .with_io(record.io()?)
        .with_human_in_the_loop(record.optional_bool("humanInTheLoop")?.unwrap_or(true));
        Ok(agent)
    }
}

/// Peer agents that hand the conversation to each other along declared
/// relationships.
#[derive(Debug, Clone, PartialEq)]
pub struct Swarm {
    pub first_agent: Arc<Component>,
    /// Directed `(caller, recipient)` pairs.
    pub relationships: Vec<(Arc<Component>, Arc<Component>)>,
}

impl Swarm {
    pub fn new(
        first_agent: Arc<Component>,
        relationships: Vec<(Arc<Component>, Arc<Component>)>,
    ) -> Result<Self, ComponentError> {
        let first_agent = expect_kind(
            first_agent,
            "Swarm",
            "firstAgent",
            "an agent",
            Component::is_agentic,
        )?;
        let relationships = relationships
            .into_iter()
            .map(|(caller, recipient)| {
                Ok((
                    expect_kind(caller, "Swarm", "relationships", "an agent", Component::is_agentic)?,
                    expect_kind(recipient, "Swarm", "relationships", "an agent", Component::is_agentic)?,
                ))
            })
            .collect::<Result<_, ComponentError>>()?;
        Ok(Self {
            first_agent,
            relationships,
        })
    }

    pub(crate) fn fields(&self) -> Fields {
        let pairs = self
            .relationships
            .iter()
            .map(|(caller, recipient)| FieldValue::components([caller, recipient]))
            .collect();

        let mut fields = Fields::new();
        fields.insert("firstAgent".to_string(), Arc::clone(&self.first_agent).into());
        fields.insert("relationships".to_string(), FieldValue::List(pairs));
        fields
    }

    pub(crate) fn from_record(
        record: &Record<'_>,
        ctx: &mut DeserializationContext,
    ) -> Result<Self, DeserializationError> {
        let first_agent = ctx.component(record, "firstAgent")?;
        let relationships = ctx.component_pairs(record, "relationships")?;
        Ok(Swarm::new(first_agent, relationships)?)
    }
}

/// A manager agent that delegates to a fixed set of workers.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerWorkers {
    pub group_manager: Arc<Component>,
    pub workers: Vec<Arc<Component>>,
}

impl ManagerWorkers {
    pub fn new(
        group_manager: Arc<Component>,
        workers: Vec<Arc<Component>>,
    ) -> Result<Self, ComponentError> {
        let group_manager = expect_kind(
            group_manager,
            "ManagerWorkers",
            "groupManager",
            "an agent",
            Component::is_agent,
        )?;
        if workers.is_empty() {
            return Err(ComponentError::InvalidField {
                kind: "ManagerWorkers",
                field: "workers",
                reason: "at least one worker is required".to_string(),
            });
        }
        let workers = workers
            .into_iter()
            .map(|w| expect_kind(w, "ManagerWorkers", "workers", "an agent", Component::is_agentic))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            group_manager,
            workers,
        })
    }

    pub(crate) fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("groupManager".to_string(), Arc::clone(&self.group_manager).into());
        fields.insert("workers".to_string(), FieldValue::components(&self.workers));
        fields
    }

    pub(crate) fn from_record(
        record: &Record<'_>,
        ctx: &mut DeserializationContext,
    ) -> Result<Self, DeserializationError> {
        let group_manager = ctx.component(record, "groupManager")?;
        let workers = ctx.component_list(record, "workers")?;
        Ok(ManagerWorkers::new(group_manager, workers)?)
    }
}
