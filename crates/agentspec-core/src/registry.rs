// ABOUTME: The component plugin trait and the registry that routes each kind to its plugin.
// ABOUTME: Every component type maps to exactly one plugin; the builtin plugin is always last.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::component::{Component, ComponentKind, Fields};
use crate::deserialize::{DeserializationContext, DeserializationError, Record};
use crate::kinds::BuiltinPlugin;
use crate::serialize::{SerializationContext, SerializationError};

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("component type {component_type} is claimed by both {first} and {second}")]
    DuplicateComponentType {
        component_type: String,
        first: String,
        second: String,
    },
}

/// Converts components of the kinds it claims to and from field bags.
///
/// `serialize` lists a component's fields by internal name; the engine applies
/// naming, gating and placement. `deserialize` rebuilds the kind from a record,
/// resolving nested components through the context.
pub trait ComponentPlugin: Send + Sync {
    fn plugin_name(&self) -> &str;

    fn plugin_version(&self) -> &str;

    fn component_types(&self) -> Vec<String>;

    fn serialize(
        &self,
        component: &Component,
        ctx: &SerializationContext,
    ) -> Result<Fields, SerializationError>;

    fn deserialize(
        &self,
        record: &Record<'_>,
        ctx: &mut DeserializationContext,
    ) -> Result<ComponentKind, DeserializationError>;
}

/// Plugins indexed by the component types they claim.
#[derive(Clone)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn ComponentPlugin>>,
    by_type: HashMap<String, usize>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.plugins.iter().map(|p| p.plugin_name()).collect();
        f.debug_struct("PluginRegistry").field("plugins", &names).finish()
    }
}

impl PluginRegistry {
    /// A registry holding only the builtin plugin.
    pub fn builtin() -> Self {
        let builtin: Arc<dyn ComponentPlugin> = Arc::new(BuiltinPlugin);
        let by_type = builtin
            .component_types()
            .into_iter()
            .map(|ty| (ty, 0))
            .collect();
        Self {
            plugins: vec![builtin],
            by_type,
        }
    }

    /// A registry with `plugins` added beside the builtin plugin. No two
    /// plugins may claim the same type, builtin types included.
    pub fn with_plugins(mut plugins: Vec<Arc<dyn ComponentPlugin>>) -> Result<Self, RegistryError> {
        plugins.push(Arc::new(BuiltinPlugin));
        Self::index(plugins)
    }

    fn index(plugins: Vec<Arc<dyn ComponentPlugin>>) -> Result<Self, RegistryError> {
        let mut by_type: HashMap<String, usize> = HashMap::new();

        for (i, plugin) in plugins.iter().enumerate() {
            for ty in plugin.component_types() {
                match by_type.get(&ty) {
                    None => {
                        by_type.insert(ty, i);
                    }
                    Some(&first) => {
                        return Err(RegistryError::DuplicateComponentType {
                            component_type: ty,
                            first: plugins[first].plugin_name().to_string(),
                            second: plugin.plugin_name().to_string(),
                        });
                    }
                }
            }
        }

        Ok(Self { plugins, by_type })
    }

    /// The plugin responsible for `component_type`, if any.
    pub fn plugin_for(&self, component_type: &str) -> Option<&Arc<dyn ComponentPlugin>> {
        self.by_type
            .get(component_type)
            .and_then(|&i| self.plugins.get(i))
    }

    /// True if `plugin` is the builtin plugin. Builtin kinds are written
    /// without plugin name and version.
    pub fn is_builtin(&self, plugin: &Arc<dyn ComponentPlugin>) -> bool {
        self.plugins
            .last()
            .is_some_and(|builtin| Arc::ptr_eq(builtin, plugin))
    }

    pub fn plugins(&self) -> &[Arc<dyn ComponentPlugin>] {
        &self.plugins
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{BUILTIN_PLUGIN_NAME, GenericPlugin};

    #[test]
    fn builtin_registry_routes_catalog_types() {
        let registry = PluginRegistry::builtin();
        let plugin = registry.plugin_for("Agent").unwrap();
        assert_eq!(plugin.plugin_name(), BUILTIN_PLUGIN_NAME);
        assert!(registry.is_builtin(plugin));
        assert!(registry.plugin_for("Memory").is_none());
    }

    #[test]
    fn user_plugins_are_consulted_first() {
        let registry = PluginRegistry::with_plugins(vec![
            GenericPlugin::new("memory", "1.0", ["Memory"]).into_arc(),
        ])
        .unwrap();
        let plugin = registry.plugin_for("Memory").unwrap();
        assert_eq!(plugin.plugin_name(), "memory");
        assert!(!registry.is_builtin(plugin));
        assert_eq!(registry.plugins().len(), 2);
    }

    #[test]
    fn user_plugin_cannot_claim_a_builtin_type() {
        let err = PluginRegistry::with_plugins(vec![
            GenericPlugin::new("custom-agents", "0.1", ["Memory", "Agent"]).into_arc(),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateComponentType {
                component_type: "Agent".to_string(),
                first: "custom-agents".to_string(),
                second: BUILTIN_PLUGIN_NAME.to_string(),
            }
        );
    }

    #[test]
    fn two_user_plugins_cannot_claim_one_type() {
        let err = PluginRegistry::with_plugins(vec![
            GenericPlugin::new("a", "1", ["Memory"]).into_arc(),
            GenericPlugin::new("b", "1", ["Memory"]).into_arc(),
        ])
        .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateComponentType { .. }));
    }
}
