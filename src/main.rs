// ABOUTME: Entry point for the agentspec binary.
// ABOUTME: Converts, checks and splits agentspec documents from the command line.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use agentspec_core::codec::{self, DocumentFormat};
use agentspec_core::{
    AgentSpecVersion, Component, Deserializer, EngineConfig, LoadOptions, LoadedDocument,
    NamingMode, Serializer, detect_naming,
};
use agentspec_store::DocumentStore;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Convert, validate and split agentspec documents
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Re-encode a document in another format, naming mode or version
    Convert {
        /// Document to read (.json, .yaml or .yml)
        input: PathBuf,

        /// Output format
        #[arg(long, value_name = "FORMAT")]
        to: DocumentFormat,

        /// Field naming of the output (defaults to AGENTSPEC_NAMING)
        #[arg(long)]
        naming: Option<NamingMode>,

        /// Version to write (defaults to AGENTSPEC_TARGET_VERSION)
        #[arg(long)]
        target_version: Option<AgentSpecVersion>,

        /// Sidecar holding components the document references
        #[arg(long)]
        components: Option<PathBuf>,

        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load a document and print a summary of its root component
    Check {
        /// Document to read (.json, .yaml or .yml)
        input: PathBuf,

        /// Sidecar holding components the document references
        #[arg(long)]
        components: Option<PathBuf>,
    },

    /// Move components out of a document into a sidecar next to it
    Split {
        /// Document to read (.json, .yaml or .yml)
        input: PathBuf,

        /// Id of a component to move to the sidecar (repeatable)
        #[arg(long = "disaggregate", value_name = "ID", required = true)]
        disaggregate: Vec<String>,

        /// Directory receiving the document and its sidecar
        #[arg(long)]
        out_dir: PathBuf,

        /// Output format (defaults to the input format)
        #[arg(long, value_name = "FORMAT")]
        to: Option<DocumentFormat>,
    },
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("agentspec=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = EngineConfig::from_env().context("invalid AGENTSPEC_* configuration")?;

    match cli.command {
        Commands::Convert {
            input,
            to,
            naming,
            target_version,
            components,
            output,
        } => {
            let root = read_component(&input, components.as_deref(), &config)?;
            let mut options = config.save_options();
            if let Some(naming) = naming {
                options = options.with_naming(naming);
            }
            if let Some(version) = target_version {
                options = options.with_target_version(version);
            }
            let saved = Serializer::new().save(&root, &options)?;
            let text = codec::encode(&saved.document, to)?;
            match output {
                Some(path) => {
                    fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
                    tracing::info!("wrote {}", path.display());
                }
                None => print!("{text}"),
            }
        }
        Commands::Check { input, components } => {
            let root = read_component(&input, components.as_deref(), &config)?;
            let count = root.reachable().len();
            println!(
                "{} {} {:?}: {} component{}",
                root.component_type(),
                root.id,
                root.name,
                count,
                if count == 1 { "" } else { "s" }
            );
        }
        Commands::Split {
            input,
            disaggregate,
            out_dir,
            to,
        } => {
            let root = read_component(&input, None, &config)?;
            let format = match to {
                Some(format) => format,
                None => format_of(&input)?,
            };
            let name = input
                .file_stem()
                .and_then(|s| s.to_str())
                .with_context(|| format!("{} has no usable file name", input.display()))?;

            let options = disaggregate
                .into_iter()
                .fold(config.save_options(), |options, id| options.disaggregate(id));
            let paths = DocumentStore::new(&out_dir).save(name, &root, &options, format)?;
            println!("{}", paths.document.display());
            if let Some(sidecar) = paths.sidecar {
                println!("{}", sidecar.display());
            }
        }
    }

    Ok(())
}

fn format_of(path: &Path) -> Result<DocumentFormat> {
    match DocumentFormat::from_path(path) {
        Some(format) => Ok(format),
        None => bail!("cannot tell the format of {}; use .json, .yaml or .yml", path.display()),
    }
}

/// Decode a file, refusing it before parsing if it is over the size limit.
fn read_tree(path: &Path, config: &EngineConfig) -> Result<(serde_json::Value, NamingMode)> {
    let format = format_of(path)?;
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if text.len() > config.max_input_size {
        bail!(
            "{} is {} bytes, over the limit of {}",
            path.display(),
            text.len(),
            config.max_input_size
        );
    }
    let tree = codec::decode(&text, format).with_context(|| format!("parsing {}", path.display()))?;
    let naming = detect_naming(&tree).unwrap_or(config.naming);
    Ok((tree, naming))
}

fn read_component(
    path: &Path,
    components: Option<&Path>,
    config: &EngineConfig,
) -> Result<Arc<Component>> {
    let deserializer = Deserializer::new();
    let mut options: LoadOptions = config.load_options();

    if let Some(sidecar) = components {
        let (tree, naming) = read_tree(sidecar, config)?;
        let sidecar_options = options.clone().with_naming(naming).disaggregated_only();
        match deserializer
            .load(&tree, &sidecar_options)
            .with_context(|| format!("loading {}", sidecar.display()))?
        {
            LoadedDocument::ReferencedComponents(found) => {
                options = options.with_components(found);
            }
            LoadedDocument::Component(root) => {
                options = options.with_component(root);
            }
        }
    }

    let (tree, naming) = read_tree(path, config)?;
    let options = options.with_naming(naming);
    let root = deserializer
        .load_component(&tree, &options)
        .with_context(|| format!("loading {}", path.display()))?;
    Ok(root)
}
