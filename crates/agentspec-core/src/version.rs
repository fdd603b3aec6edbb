// ABOUTME: Spec versions, pre-release remapping, and the per-kind serialization policy.
// ABOUTME: The policy holds version gates and sensitive-field exclusions as immutable tables.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A released version of the document format. Ordering follows release order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgentSpecVersion {
    #[serde(rename = "25.4.1")]
    V25_4_1,
    #[serde(rename = "25.4.2")]
    V25_4_2,
    #[serde(rename = "26.1.0")]
    V26_1_0,
}

/// Pre-release version strings that shipped in the wild, and the release they
/// are read as.
const PRE_RELEASE_REMAP: [(&str, AgentSpecVersion); 3] = [
    ("25.4.0", AgentSpecVersion::V25_4_1),
    ("25.4.2.dev0", AgentSpecVersion::V25_4_2),
    ("26.1.0.dev0", AgentSpecVersion::V26_1_0),
];

impl AgentSpecVersion {
    pub const CURRENT: AgentSpecVersion = AgentSpecVersion::V26_1_0;

    pub const ALL: [AgentSpecVersion; 3] = [
        AgentSpecVersion::V25_4_1,
        AgentSpecVersion::V25_4_2,
        AgentSpecVersion::V26_1_0,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentSpecVersion::V25_4_1 => "25.4.1",
            AgentSpecVersion::V25_4_2 => "25.4.2",
            AgentSpecVersion::V26_1_0 => "26.1.0",
        }
    }

    /// Parse a version string read from a document. Released versions parse
    /// directly; known pre-release strings are remapped to their release.
    pub fn parse_document_version(s: &str) -> Option<AgentSpecVersion> {
        if let Some(v) = Self::ALL.iter().find(|v| v.as_str() == s) {
            return Some(*v);
        }
        let remapped = PRE_RELEASE_REMAP
            .iter()
            .find(|(pre, _)| *pre == s)
            .map(|(_, v)| *v)?;
        tracing::warn!("pre-release version {} read as {}", s, remapped);
        Some(remapped)
    }
}

impl Default for AgentSpecVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for AgentSpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentSpecVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_document_version(s).ok_or_else(|| format!("unknown agentspec version: {s}"))
    }
}

/// Version gates and sensitive-field exclusions for every known kind.
///
/// Field names are the internal camelCase spellings. A serializer holds one
/// policy for its whole lifetime; the tables are never mutated during a call.
#[derive(Debug, Clone, Default)]
pub struct SerializationPolicy {
    kind_gates: HashMap<String, AgentSpecVersion>,
    field_gates: HashMap<(String, String), AgentSpecVersion>,
    sensitive: HashMap<String, HashSet<String>>,
}

impl SerializationPolicy {
    /// An empty policy: nothing gated, nothing sensitive.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The policy covering the builtin kind catalog.
    pub fn builtin() -> Self {
        use AgentSpecVersion::*;

        let mut policy = Self::empty()
            .with_kind_gate("Swarm", V25_4_2)
            .with_kind_gate("ManagerWorkers", V26_1_0)
            .with_field_gate("Agent", "humanInTheLoop", V25_4_2)
            .with_field_gate("OpenAiCompatibleConfig", "apiType", V26_1_0)
            .with_sensitive_field("OpenAiConfig", "apiKey")
            .with_sensitive_field("OpenAiCompatibleConfig", "apiKey")
            .with_sensitive_field("RemoteTool", "sensitiveHeaders");

        for tool in ["ServerTool", "ClientTool", "RemoteTool"] {
            policy = policy.with_field_gate(tool, "requiresConfirmation", V25_4_2);
        }

        policy
    }

    /// Require `min` before any non-discriminator field of `kind` is written.
    pub fn with_kind_gate(mut self, kind: &str, min: AgentSpecVersion) -> Self {
        self.kind_gates.insert(kind.to_string(), min);
        self
    }

    /// Require `min` before `field` of `kind` is written.
    pub fn with_field_gate(mut self, kind: &str, field: &str, min: AgentSpecVersion) -> Self {
        self.field_gates
            .insert((kind.to_string(), field.to_string()), min);
        self
    }

    /// Never write `field` of `kind`.
    pub fn with_sensitive_field(mut self, kind: &str, field: &str) -> Self {
        self.sensitive
            .entry(kind.to_string())
            .or_default()
            .insert(field.to_string());
        self
    }

    /// True if the whole kind may be written at `version`.
    pub fn kind_allowed(&self, kind: &str, version: AgentSpecVersion) -> bool {
        self.kind_gates
            .get(kind)
            .is_none_or(|min| version >= *min)
    }

    /// True if `field` of `kind` may be written at `version`.
    pub fn field_allowed(&self, kind: &str, field: &str, version: AgentSpecVersion) -> bool {
        self.field_gates
            .get(&(kind.to_string(), field.to_string()))
            .is_none_or(|min| version >= *min)
    }

    pub fn is_sensitive(&self, kind: &str, field: &str) -> bool {
        self.sensitive
            .get(kind)
            .is_some_and(|fields| fields.contains(field))
    }

    /// The minimum version at which `kind` may be written in full.
    pub fn kind_minimum(&self, kind: &str) -> Option<AgentSpecVersion> {
        self.kind_gates.get(kind).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_order_by_release() {
        assert!(AgentSpecVersion::V25_4_1 < AgentSpecVersion::V25_4_2);
        assert!(AgentSpecVersion::V25_4_2 < AgentSpecVersion::V26_1_0);
        assert_eq!(AgentSpecVersion::default(), AgentSpecVersion::CURRENT);
    }

    #[test]
    fn released_versions_parse() {
        for v in AgentSpecVersion::ALL {
            assert_eq!(AgentSpecVersion::parse_document_version(v.as_str()), Some(v));
        }
    }

    #[test]
    fn pre_release_versions_are_remapped() {
        assert_eq!(
            AgentSpecVersion::parse_document_version("25.4.0"),
            Some(AgentSpecVersion::V25_4_1)
        );
        assert_eq!(
            "26.1.0.dev0".parse::<AgentSpecVersion>().unwrap(),
            AgentSpecVersion::V26_1_0
        );
    }

    #[test]
    fn unknown_version_is_rejected() {
        assert!(AgentSpecVersion::parse_document_version("99.0.0").is_none());
        assert!("latest".parse::<AgentSpecVersion>().is_err());
    }

    #[test]
    fn builtin_policy_gates_fields_and_kinds() {
        let policy = SerializationPolicy::builtin();
        assert!(!policy.field_allowed("Agent", "humanInTheLoop", AgentSpecVersion::V25_4_1));
        assert!(policy.field_allowed("Agent", "humanInTheLoop", AgentSpecVersion::V25_4_2));
        assert!(policy.field_allowed("Agent", "systemPrompt", AgentSpecVersion::V25_4_1));
        assert!(!policy.kind_allowed("ManagerWorkers", AgentSpecVersion::V25_4_2));
        assert!(policy.kind_allowed("ManagerWorkers", AgentSpecVersion::V26_1_0));
        assert_eq!(policy.kind_minimum("Swarm"), Some(AgentSpecVersion::V25_4_2));
    }

    #[test]
    fn builtin_policy_marks_credentials_sensitive() {
        let policy = SerializationPolicy::builtin();
        assert!(policy.is_sensitive("OpenAiCompatibleConfig", "apiKey"));
        assert!(policy.is_sensitive("RemoteTool", "sensitiveHeaders"));
        assert!(!policy.is_sensitive("RemoteTool", "apiHeaders"));
    }
}
