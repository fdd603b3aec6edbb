// ABOUTME: Plugin-contributed component kinds held as ordered field bags.
// ABOUTME: Includes a generic plugin that round-trips extension kinds without bespoke code.

use std::sync::Arc;

use crate::component::{Component, ComponentKind, FieldValue, Fields};
use crate::deserialize::{DeserializationContext, DeserializationError, Record};
use crate::registry::ComponentPlugin;
use crate::serialize::{SerializationContext, SerializationError};

/// A component whose kind is defined outside the builtin catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionComponent {
    pub component_type: String,
    pub fields: Fields,
}

impl ExtensionComponent {
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            fields: Fields::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// A plugin that stores its kinds as [`ExtensionComponent`] field bags.
///
/// Nested components are recognised on load by their discriminator or
/// reference key; everything else stays opaque data.
///
/// Field names containing acronym runs (`useMTLSConfig`) do not survive
/// canonical naming unless they are declared with
/// [`GenericPlugin::with_field_names`].
#[derive(Debug, Clone)]
pub struct GenericPlugin {
    name: String,
    version: String,
    component_types: Vec<String>,
    field_names: Vec<String>,
}

impl GenericPlugin {
    pub fn new<I, S>(name: impl Into<String>, version: impl Into<String>, component_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            version: version.into(),
            component_types: component_types.into_iter().map(Into::into).collect(),
            field_names: Vec::new(),
        }
    }

    /// Field names read back exactly as given.
    pub fn with_field_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn into_arc(self) -> Arc<dyn ComponentPlugin> {
        Arc::new(self)
    }
}

impl ComponentPlugin for GenericPlugin {
    fn plugin_name(&self) -> &str {
        &self.name
    }

    fn plugin_version(&self) -> &str {
        &self.version
    }

    fn component_types(&self) -> Vec<String> {
        self.component_types.clone()
    }

    fn serialize(
        &self,
        component: &Component,
        _ctx: &SerializationContext,
    ) -> Result<Fields, SerializationError> {
        match &component.kind {
            ComponentKind::Extension(ext) => Ok(ext.fields.clone()),
            _ => Err(SerializationError::UnknownComponentType(
                component.component_type().to_string(),
            )),
        }
    }

    fn deserialize(
        &self,
        record: &Record<'_>,
        ctx: &mut DeserializationContext,
    ) -> Result<ComponentKind, DeserializationError> {
        Ok(ComponentKind::Extension(ExtensionComponent {
            component_type: record.component_type().to_string(),
            fields: ctx.generic_fields(record, &self.field_names)?,
        }))
    }
}
