// ABOUTME: Core library for agentspec: the serialization engine and its structural type system.
// ABOUTME: Exposes components, the builtin kind catalog, plugins, and the save/load contexts.

pub mod codec;
pub mod component;
pub mod config;
pub mod deserialize;
pub mod kinds;
pub mod limits;
pub mod naming;
pub mod property;
pub mod registry;
pub mod serialize;
pub mod version;

pub use codec::{CodecError, DocumentFormat};
pub use component::{Component, ComponentError, ComponentIo, ComponentKind, FieldValue, Fields};
pub use config::{ConfigError, EngineConfig};
pub use deserialize::{
    DeserializationContext, DeserializationError, Deserializer, LoadOptions, LoadedDocument,
    Record, detect_naming,
};
pub use naming::NamingMode;
pub use property::{Property, PropertyError, Schema, SchemaType};
pub use registry::{ComponentPlugin, PluginRegistry, RegistryError};
pub use serialize::{
    Disaggregation, SaveOptions, SavedDocument, SerializationContext, SerializationError,
    Serializer,
};
pub use version::{AgentSpecVersion, SerializationPolicy};
