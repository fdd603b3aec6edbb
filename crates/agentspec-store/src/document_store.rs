// ABOUTME: Directory-backed store that saves a component tree as a document plus sidecar.
// ABOUTME: Writes with atomic rename for crash safety and loads the sidecar before the document.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agentspec_core::codec::{self, CodecError, DocumentFormat};
use agentspec_core::{
    Component, DeserializationError, Deserializer, LoadOptions, LoadedDocument, SaveOptions,
    SerializationError, Serializer,
};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("deserialization error: {0}")]
    Deserialization(#[from] DeserializationError),

    #[error("invalid document name: {0:?}")]
    InvalidName(String),

    #[error("no document named {0}")]
    NotFound(String),

    #[error("{0} holds only referenced components")]
    NoRootComponent(String),
}

/// Files written by one save.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPaths {
    pub document: PathBuf,
    pub sidecar: Option<PathBuf>,
}

const SIDECAR_SUFFIX: &str = ".components";

/// Documents stored as `<name>.<ext>`, with disaggregated components in
/// `<name>.components.<ext>`.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
    serializer: Serializer,
    deserializer: Deserializer,
}

impl DocumentStore {
    /// A store for the builtin catalog rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_engine(root, Serializer::new(), Deserializer::new())
    }

    pub fn with_engine(
        root: impl Into<PathBuf>,
        serializer: Serializer,
        deserializer: Deserializer,
    ) -> Self {
        Self {
            root: root.into(),
            serializer,
            deserializer,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Save `component` under `name`. The sidecar is written whenever
    /// `options` disaggregates anything; a stale sidecar from an earlier save
    /// is removed otherwise.
    pub fn save(
        &self,
        name: &str,
        component: &Arc<Component>,
        options: &SaveOptions,
        format: DocumentFormat,
    ) -> Result<StoredPaths, StoreError> {
        validate_name(name)?;
        fs::create_dir_all(&self.root)?;

        let mut options = options.clone();
        options.export_sidecar = !options.disaggregated.is_empty();
        let saved = self.serializer.save(component, &options)?;

        let document_path = self.document_path(name, format);
        write_atomic(&document_path, &codec::encode(&saved.document, format)?)?;

        let sidecar_path = self.sidecar_path(name, format);
        let sidecar = match &saved.sidecar {
            Some(sidecar) => {
                write_atomic(&sidecar_path, &codec::encode(sidecar, format)?)?;
                Some(sidecar_path)
            }
            None => {
                if sidecar_path.exists() {
                    fs::remove_file(&sidecar_path)?;
                }
                None
            }
        };

        tracing::info!(
            "saved {} ({}) to {}{}",
            component.id,
            component.component_type(),
            document_path.display(),
            if sidecar.is_some() { " with sidecar" } else { "" }
        );

        Ok(StoredPaths {
            document: document_path,
            sidecar,
        })
    }

    /// Load the document saved under `name`. Its sidecar, if present, is
    /// loaded first and its components are made available to the document.
    /// Components already in `options` take precedence.
    pub fn load(&self, name: &str, options: &LoadOptions) -> Result<Arc<Component>, StoreError> {
        validate_name(name)?;
        let (document_path, format) = self
            .find(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        let mut options = options.clone();
        let sidecar_path = self.sidecar_path(name, format);
        if sidecar_path.exists() {
            let text = fs::read_to_string(&sidecar_path)?;
            let sidecar_options = options.clone().disaggregated_only();
            if let LoadedDocument::ReferencedComponents(components) =
                self.deserializer.load_str(&text, format, &sidecar_options)?
            {
                for (id, component) in components {
                    options.components.entry(id).or_insert(component);
                }
            }
        }

        let text = fs::read_to_string(&document_path)?;
        match self.deserializer.load_str(&text, format, &options)? {
            LoadedDocument::Component(component) => Ok(component),
            LoadedDocument::ReferencedComponents(_) => Err(StoreError::NoRootComponent(name.to_string())),
        }
    }

    /// Names of the documents in the store, sorted.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if DocumentFormat::from_path(&path).is_none() {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && !stem.ends_with(SIDECAR_SUFFIX)
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn find(&self, name: &str) -> Option<(PathBuf, DocumentFormat)> {
        [DocumentFormat::Yaml, DocumentFormat::Json]
            .into_iter()
            .map(|format| (self.document_path(name, format), format))
            .find(|(path, _)| path.exists())
    }

    fn document_path(&self, name: &str, format: DocumentFormat) -> PathBuf {
        self.root.join(format!("{}.{}", name, format.extension()))
    }

    fn sidecar_path(&self, name: &str, format: DocumentFormat) -> PathBuf {
        self.root
            .join(format!("{}{}.{}", name, SIDECAR_SUFFIX, format.extension()))
    }
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.ends_with(SIDECAR_SUFFIX)
        && !name.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// Write to a temp file, fsync, then rename over `path`.
fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut file = File::create(&tmp_path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}
