// ABOUTME: Encodes and decodes plain document trees as JSON or YAML text.
// ABOUTME: Both formats map onto the same serde_json::Value tree, so the engine is format agnostic.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

/// Errors raised while turning text into a tree or back.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// The text formats a document can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    Json,
    #[default]
    Yaml,
}

impl DocumentFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Json => "json",
            DocumentFormat::Yaml => "yaml",
        }
    }

    /// Guess the format from a file extension (`.json`, `.yaml`, `.yml`).
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(DocumentFormat::Json),
            "yaml" | "yml" => Some(DocumentFormat::Yaml),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for DocumentFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(DocumentFormat::Json),
            "yaml" | "yml" => Ok(DocumentFormat::Yaml),
            other => Err(format!("unknown document format: {other}")),
        }
    }
}

/// Render a tree as text. JSON output is pretty-printed.
pub fn encode(value: &Value, format: DocumentFormat) -> Result<String, CodecError> {
    Ok(match format {
        DocumentFormat::Json => serde_json::to_string_pretty(value)?,
        DocumentFormat::Yaml => serde_yaml::to_string(value)?,
    })
}

/// Parse text into a tree. Size limits are the caller's concern and must be
/// checked on `text` before calling this.
pub fn decode(text: &str, format: DocumentFormat) -> Result<Value, CodecError> {
    Ok(match format {
        DocumentFormat::Json => serde_json::from_str(text)?,
        DocumentFormat::Yaml => serde_yaml::from_str(text)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_and_yaml_decode_to_the_same_tree() {
        let value = json!({
            "component_type": "Agent",
            "name": "helper",
            "tools": [],
            "metadata": {"owner": "team", "priority": 2}
        });
        for format in [DocumentFormat::Json, DocumentFormat::Yaml] {
            let text = encode(&value, format).unwrap();
            assert_eq!(decode(&text, format).unwrap(), value);
        }
    }

    #[test]
    fn yaml_preserves_key_order() {
        let value = json!({"component_type": "Agent", "agentspec_version": "26.1.0", "id": "a"});
        let text = encode(&value, DocumentFormat::Yaml).unwrap();
        let ct = text.find("component_type").unwrap();
        let ver = text.find("agentspec_version").unwrap();
        let id = text.find("id:").unwrap();
        assert!(ct < ver && ver < id, "unexpected order in:\n{text}");
    }

    #[test]
    fn format_is_guessed_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.yml")), Some(DocumentFormat::Yaml));
        assert_eq!(DocumentFormat::from_path(Path::new("a.json")), Some(DocumentFormat::Json));
        assert_eq!(DocumentFormat::from_path(Path::new("a.txt")), None);
    }

    #[test]
    fn malformed_text_is_a_codec_error() {
        assert!(matches!(decode("{", DocumentFormat::Json), Err(CodecError::Json(_))));
        assert!(matches!(decode("a: [", DocumentFormat::Yaml), Err(CodecError::Yaml(_))));
    }
}
