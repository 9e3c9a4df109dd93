use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use common::{
    SearchFilters, SearchRequest,
    config::AppConfig,
    snapshot::{CatalogSource, JsonSnapshotSource, write_json},
};
use llm::{AttributeExtractor, GeminiClient, RetryPolicy};
use search_core::{CatalogHandle, HybridSearcher, RetrievalDefaults, query_encoder};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "medisearch")]
#[command(about = "Medicine catalog search and inventory tools")]
struct Cli {
    /// TOML config file; missing file means defaults.
    #[arg(long, global = true, default_value = "medisearch.toml")]
    config: PathBuf,
    /// Catalog snapshot, overriding the configured path.
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one query through the hybrid search pipeline.
    Search(SearchArgs),
    /// Load the snapshot, build every index and report counts.
    Validate,
    /// Merge an inventory upload into the catalog.
    Reconcile {
        #[arg(long)]
        upload: PathBuf,
        /// Reconciled rows; stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Full catalog with the reconciled rows applied.
        #[arg(long)]
        catalog_out: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct SearchArgs {
    #[arg(default_value = "")]
    query: String,
    #[arg(long)]
    form: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    min_price: Option<f64>,
    #[arg(long)]
    max_price: Option<f64>,
    #[arg(long)]
    min_quantity: Option<u64>,
    #[arg(long)]
    max_quantity: Option<u64>,
    #[arg(long)]
    top_k: Option<usize>,
}

impl From<SearchArgs> for SearchRequest {
    fn from(args: SearchArgs) -> Self {
        Self {
            query: args.query,
            filters: SearchFilters {
                category: args.category,
                form: args.form,
                min_price: args.min_price,
                max_price: args.max_price,
                min_quantity: args.min_quantity,
                max_quantity: args.max_quantity,
            },
            top_k: args.top_k,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(&cli.config)?;
    if let Some(snapshot) = &cli.snapshot {
        config.snapshot_path = snapshot.display().to_string();
    }

    match cli.command {
        Commands::Search(args) => search(&config, args.into()),
        Commands::Validate => validate(&config),
        Commands::Reconcile {
            upload,
            out,
            catalog_out,
        } => run_reconcile(&config, &upload, out.as_deref(), catalog_out.as_deref()).await,
    }
}

fn load_handle(config: &AppConfig) -> anyhow::Result<CatalogHandle> {
    let source = JsonSnapshotSource::new(&config.snapshot_path, config.space_columns());
    CatalogHandle::load(&source, &config.spaces)
        .with_context(|| format!("failed loading catalog from {}", source.describe()))
}

fn search(config: &AppConfig, request: SearchRequest) -> anyhow::Result<()> {
    let handle = load_handle(config)?;
    let encoder = query_encoder(config, handle.current().vector_dimension());
    let searcher = HybridSearcher::new(handle, encoder, &config.spaces, RetrievalDefaults::from(config));
    let outcome = searcher.search(&request)?;
    for space in &outcome.degraded_spaces {
        eprintln!("warning: embedding space {space} unavailable for this query");
    }
    println!("{}", serde_json::to_string_pretty(&outcome.response)?);
    Ok(())
}

fn validate(config: &AppConfig) -> anyhow::Result<()> {
    let handle = load_handle(config)?;
    let snapshot = handle.current();
    let spaces = snapshot
        .spaces()
        .iter()
        .map(|space| {
            serde_json::json!({
                "name": space.config.name,
                "column": space.config.column,
                "k": space.config.k,
                "vectors": space.index.len(),
            })
        })
        .collect::<Vec<_>>();
    let output = serde_json::json!({
        "snapshot": config.snapshot_path,
        "records": snapshot.len(),
        "vector_dimension": snapshot.vector_dimension(),
        "unknown_forms": snapshot.records().iter().filter(|r| !r.has_known_form()).count(),
        "unknown_categories": snapshot.records().iter().filter(|r| !r.has_known_category()).count(),
        "spaces": spaces,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run_reconcile(
    config: &AppConfig,
    upload: &Path,
    out: Option<&Path>,
    catalog_out: Option<&Path>,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(upload)
        .with_context(|| format!("failed reading upload {}", upload.display()))?;
    let rows = reconcile::parse_upload(&raw)?;

    let source = JsonSnapshotSource::new(&config.snapshot_path, Vec::new());
    let mut catalog = source
        .load()
        .with_context(|| format!("failed loading catalog from {}", source.describe()))?
        .into_iter()
        .map(|row| row.record)
        .collect::<Vec<_>>();

    let extractor = match &config.genai_api_key {
        Some(key) => Some(AttributeExtractor::new(
            Arc::new(GeminiClient::new(key.clone())?),
            config.research_model.clone(),
            config.extraction_model.clone(),
            RetryPolicy {
                max_retries: config.extraction_max_retries,
                ..RetryPolicy::default()
            },
        )),
        None => {
            tracing::warn!("GENAI_API_KEY not set, new items get placeholder attributes");
            None
        }
    };

    let report = reconcile::reconcile(&catalog, &rows, extractor.as_ref()).await;
    match out {
        Some(path) => write_json(path, &report.rows)?,
        None => println!("{}", serde_json::to_string_pretty(&report.rows)?),
    }
    if let Some(path) = catalog_out {
        let applied = reconcile::apply_to_catalog(&mut catalog, &report);
        write_json(path, &catalog)?;
        eprintln!(
            "catalog written to {} (updated={}, inserted={})",
            path.display(),
            applied.updated,
            applied.inserted
        );
    }
    eprintln!(
        "reconciled {} rows (updated={}, added={}, fallbacks={})",
        report.rows.len(),
        report.updated(),
        report.added(),
        report.fallbacks
    );
    Ok(())
}
