//! `archive-nav`: inspect archives on disk through the adaptor tree

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use nav_adaptor::{Adaptor, AdaptorKind, NavConfig, Session};
use nav_address::{Address, DataPath};
use nav_metainfo::{FsSchemaSource, PackageLocator, SchemaStore};
use nav_store::FsArchiveSource;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Deployment assigned to archives read from disk
const LOCAL_DEPLOYMENT: &str = "http://localhost/api/v1";

#[derive(Debug, Parser)]
#[command(name = "archive-nav", version, about = "Navigate archives through their schema")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the node reached by following keys from an archive root
    Show(ShowArgs),
    /// List the known specializations of a section
    Inheriting(InheritingArgs),
}

#[derive(Debug, Args)]
struct ShowArgs {
    /// Directory of `<entry>.json` archives
    #[arg(long)]
    archives: PathBuf,
    /// Directory of `<package>.json` schema packages
    #[arg(long)]
    schemas: PathBuf,
    #[arg(long)]
    entry: String,
    /// Session configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Child keys, e.g. `data samples:-1`
    keys: Vec<String>,
}

#[derive(Debug, Args)]
struct InheritingArgs {
    #[arg(long)]
    schemas: PathBuf,
    /// Qualified name of the base section
    section: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Show(args) => {
            let summary = show(&args).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Inheriting(args) => {
            for name in inheriting(&args).await? {
                println!("{name}");
            }
        }
    }
    Ok(())
}

async fn show(args: &ShowArgs) -> anyhow::Result<Value> {
    let config = match &args.config {
        Some(path) => NavConfig::load(path)?,
        None => NavConfig::default(),
    };
    let session = Session::builder(
        Arc::new(FsArchiveSource::new(&args.archives)),
        Arc::new(FsSchemaSource::new(&args.schemas)),
    )
    .config(config)
    .build();

    let root = Address::archive(LOCAL_DEPLOYMENT, None, args.entry.as_str(), DataPath::root());
    let node = session
        .open(&root)
        .await
        .with_context(|| format!("cannot open entry {}", args.entry))?
        .resolve_path(&args.keys)
        .await
        .with_context(|| format!("cannot resolve {}", args.keys.join(" ")))?;
    info!(address = %node.address(), "Resolved node");
    Ok(summary(&node))
}

async fn inheriting(args: &InheritingArgs) -> anyhow::Result<Vec<String>> {
    let source = FsSchemaSource::new(&args.schemas);
    let packages = source.package_names().await?;
    let schemas = SchemaStore::new(Arc::new(source));
    for package in packages {
        schemas.load_package(&PackageLocator::System(package)).await?;
    }
    let section = schemas.section(&args.section, None).await?;
    Ok(schemas
        .get_inheriting_sections(&section)
        .iter()
        .map(|section| section.qualified_name().to_string())
        .collect())
}

fn summary(node: &Adaptor) -> Value {
    let kind = match node.kind() {
        AdaptorKind::Section(_) => "section",
        AdaptorKind::Quantity { .. } => "quantity",
        AdaptorKind::Attribute(_) => "attribute",
        AdaptorKind::UnresolvedReference { .. } => "unresolved_reference",
        AdaptorKind::Metainfo(_) => "metainfo",
        AdaptorKind::RawFile(_) => "raw_file",
    };
    let mut summary = json!({
        "address": node.address().to_string(),
        "kind": kind,
        "definition": node.definition().name(),
        "editable": node.is_editable(),
        "value": node.value(),
    });
    match node.kind() {
        AdaptorKind::Section(section) => {
            summary["section"] = json!(section.qualified_name());
            let visible = section.visible_properties();
            let properties: Vec<&str> = visible.iter().map(|property| property.name()).collect();
            summary["properties"] = json!(properties);
        }
        AdaptorKind::UnresolvedReference { reason, .. } => {
            summary["reason"] = json!(reason.to_string());
        }
        AdaptorKind::RawFile(handle) => {
            summary["raw_file"] = json!(handle.address.to_string());
        }
        _ => {}
    }
    summary
}
