// ABOUTME: Field naming modes and the protocol field spellings used by each mode.
// ABOUTME: Converts internal camelCase field names to canonical snake_case and back.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys that are dropped from every mapping on the way in and out, so a
/// document can never smuggle prototype-mutating keys to a JavaScript consumer.
pub const DANGEROUS_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Returns true if the key must be stripped from any mapping.
pub fn is_dangerous_key(key: &str) -> bool {
    DANGEROUS_KEYS.contains(&key)
}

/// Remove dangerous keys from every mapping nested in `value`, at any depth.
/// Returns how many keys were dropped.
pub fn strip_dangerous_keys(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => {
            let before = map.len();
            map.retain(|k, _| !is_dangerous_key(k));
            let mut dropped = before - map.len();
            for v in map.values_mut() {
                dropped += strip_dangerous_keys(v);
            }
            dropped
        }
        Value::Array(items) => items.iter_mut().map(strip_dangerous_keys).sum(),
        _ => 0,
    }
}

/// How field names are spelled in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingMode {
    /// Every field is written in lowercase-with-underscore form.
    #[default]
    Canonical,
    /// Field names are written exactly as the component kinds declare them.
    Alternate,
}

impl NamingMode {
    /// Spell an internal field name for a document in this mode.
    pub fn field_to_document(&self, internal: &str) -> String {
        match self {
            NamingMode::Canonical => to_canonical(internal),
            NamingMode::Alternate => internal.to_string(),
        }
    }

    /// Recover the internal field name from a document key in this mode.
    pub fn field_from_document(&self, key: &str) -> String {
        match self {
            NamingMode::Canonical => to_alternate(key),
            NamingMode::Alternate => key.to_string(),
        }
    }

    /// The protocol field spellings for this mode. Protocol fields are never
    /// passed through the renaming rules.
    pub fn protocol(&self) -> &'static ProtocolFields {
        match self {
            NamingMode::Canonical => &CANONICAL_PROTOCOL,
            NamingMode::Alternate => &ALTERNATE_PROTOCOL,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NamingMode::Canonical => "canonical",
            NamingMode::Alternate => "alternate",
        }
    }
}

impl fmt::Display for NamingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NamingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "canonical" => Ok(NamingMode::Canonical),
            "alternate" => Ok(NamingMode::Alternate),
            other => Err(format!("unknown naming mode: {other}")),
        }
    }
}

/// The reserved field names of the document protocol, spelled for one mode.
#[derive(Debug, PartialEq, Eq)]
pub struct ProtocolFields {
    pub component_type: &'static str,
    pub version: &'static str,
    pub legacy_version: &'static str,
    pub plugin_name: &'static str,
    pub plugin_version: &'static str,
    pub component_ref: &'static str,
    pub referenced_components: &'static str,
}

impl ProtocolFields {
    /// True if `key` is one of this mode's protocol fields.
    pub fn contains(&self, key: &str) -> bool {
        key == self.component_type
            || key == self.version
            || key == self.legacy_version
            || key == self.plugin_name
            || key == self.plugin_version
            || key == self.component_ref
            || key == self.referenced_components
    }
}

pub static CANONICAL_PROTOCOL: ProtocolFields = ProtocolFields {
    component_type: "component_type",
    version: "agentspec_version",
    legacy_version: "air_version",
    plugin_name: "component_plugin_name",
    plugin_version: "component_plugin_version",
    component_ref: "$component_ref",
    referenced_components: "$referenced_components",
};

pub static ALTERNATE_PROTOCOL: ProtocolFields = ProtocolFields {
    component_type: "componentType",
    version: "agentspecVersion",
    legacy_version: "airVersion",
    plugin_name: "componentPluginName",
    plugin_version: "componentPluginVersion",
    component_ref: "$componentRef",
    referenced_components: "$referencedComponents",
};

/// Convert a camelCase name to snake_case.
///
/// An underscore is inserted before an uppercase letter when it follows a
/// lowercase letter or digit (`modelId` -> `model_id`), or when it ends a run of
/// capitals and is itself followed by a lowercase letter (`mTLSConfig` ->
/// `m_tls_config`). The result is lowercased.
pub fn to_canonical(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let after_word = prev.is_ascii_lowercase() || prev.is_ascii_digit();
            let ends_acronym = prev.is_ascii_uppercase() && next_is_lower;
            if after_word || ends_acronym {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }

    out
}

/// Convert a snake_case name to camelCase. Inverse of [`to_canonical`] for
/// every name that does not contain an acronym run.
pub fn to_alternate(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;

    for c in name.chars() {
        if c == '_' && !out.is_empty() {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }

    if upper_next {
        out.push('_');
    }

    out
}
