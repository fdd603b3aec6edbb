// ABOUTME: Tool kinds: server-side, client-side and remote HTTP tools with typed inputs/outputs.
// ABOUTME: Remote tools carry endpoint details; sensitive headers are never serialized.

use serde_json::{Map, Value};

use crate::component::{ComponentIo, FieldValue, Fields};
use crate::deserialize::{DeserializationError, Record};

/// Where a tool executes.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolKind {
    /// Executed by the runtime hosting the agent.
    Server,
    /// Executed by the client driving the conversation.
    Client,
    /// Executed by calling an HTTP endpoint.
    Remote(RemoteEndpoint),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEndpoint {
    pub url: String,
    pub http_method: String,
    pub api_headers: Map<String, Value>,
    pub sensitive_headers: Map<String, Value>,
    pub data: Map<String, Value>,
}

impl RemoteEndpoint {
    pub fn new(url: impl Into<String>, http_method: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http_method: http_method.into(),
            api_headers: Map::new(),
            sensitive_headers: Map::new(),
            data: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    pub kind: ToolKind,
    pub io: ComponentIo,
    pub requires_confirmation: bool,
}

impl Tool {
    pub fn server(io: ComponentIo) -> Self {
        Self {
            kind: ToolKind::Server,
            io,
            requires_confirmation: false,
        }
    }

    pub fn client(io: ComponentIo) -> Self {
        Self {
            kind: ToolKind::Client,
            io,
            requires_confirmation: false,
        }
    }

    pub fn remote(endpoint: RemoteEndpoint, io: ComponentIo) -> Self {
        Self {
            kind: ToolKind::Remote(endpoint),
            io,
            requires_confirmation: false,
        }
    }

    pub fn with_confirmation(mut self, requires_confirmation: bool) -> Self {
        self.requires_confirmation = requires_confirmation;
        self
    }

    pub fn component_type(&self) -> &'static str {
        match self.kind {
            ToolKind::Server => "ServerTool",
            ToolKind::Client => "ClientTool",
            ToolKind::Remote(_) => "RemoteTool",
        }
    }

    pub(crate) fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        self.io.push_fields(&mut fields);
        if let ToolKind::Remote(endpoint) = &self.kind {
            fields.insert("url".to_string(), endpoint.url.clone().into());
            fields.insert("httpMethod".to_string(), endpoint.http_method.clone().into());
            fields.insert(
                "apiHeaders".to_string(),
                FieldValue::from(endpoint.api_headers.clone()),
            );
            fields.insert(
                "sensitiveHeaders".to_string(),
                FieldValue::from(endpoint.sensitive_headers.clone()),
            );
            fields.insert("data".to_string(), FieldValue::from(endpoint.data.clone()));
        }
        fields.insert(
            "requiresConfirmation".to_string(),
            self.requires_confirmation.into(),
        );
        fields
    }

    pub(crate) fn from_record(record: &Record<'_>) -> Result<Self, DeserializationError> {
        let kind = match record.component_type() {
            "ServerTool" => ToolKind::Server,
            "ClientTool" => ToolKind::Client,
            "RemoteTool" => ToolKind::Remote(RemoteEndpoint {
                url: record.required_str("url")?,
                http_method: record
                    .optional_str("httpMethod")?
                    .unwrap_or_else(|| "GET".to_string()),
                api_headers: record.data_map("apiHeaders")?.unwrap_or_default(),
                sensitive_headers: record.data_map("sensitiveHeaders")?.unwrap_or_default(),
                data: record.data_map("data")?.unwrap_or_default(),
            }),
            other => return Err(DeserializationError::UnknownComponentType(other.to_string())),
        };

        Ok(Self {
            kind,
            io: record.io()?,
            requires_confirmation: record.optional_bool("requiresConfirmation")?.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Property;

    #[test]
    fn tool_type_follows_kind() {
        let io = ComponentIo::default();
        assert_eq!(Tool::server(io.clone()).component_type(), "ServerTool");
        assert_eq!(Tool::client(io.clone()).component_type(), "ClientTool");
        let remote = Tool::remote(RemoteEndpoint::new("https://api.example.com", "POST"), io);
        assert_eq!(remote.component_type(), "RemoteTool");
    }

    #[test]
    fn remote_fields_list_endpoint_details_after_io() {
        let io = ComponentIo::new(vec![Property::string("city").unwrap()], vec![]).unwrap();
        let tool = Tool::remote(RemoteEndpoint::new("https://api.example.com", "POST"), io);
        let names: Vec<_> = tool.fields().keys().cloned().collect();
        assert_eq!(
            names,
            vec![
                "inputs",
                "outputs",
                "url",
                "httpMethod",
                "apiHeaders",
                "sensitiveHeaders",
                "data",
                "requiresConfirmation"
            ]
        );
    }
}
