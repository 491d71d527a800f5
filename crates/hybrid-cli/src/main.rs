//! Hybrid CLI - Command-line interface for hybrid rank-fusion retrieval.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hybrid_core::{
    EmbeddingProvider, HybridConfig, RetrievalResponse, SearchMode, SparseExpansionProvider,
};
use hybrid_elastic::{ElasticBackend, PipelineExpander};
use hybrid_embed::OnnxEmbedder;
use hybrid_query::{CachedRetriever, Retriever, RetrieverConfig};

/// Hybrid - lexical, dense and sparse retrieval fused with RRF
#[derive(Parser)]
#[command(name = "hybrid")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: user config dir, then ./hybrid-rag.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the index
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Search mode (lexical_only, dense_only, sparse_only, dense_lexical, full_hybrid)
        #[arg(short, long)]
        mode: Option<String>,

        /// Deadline for the whole search in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check search cluster health
    Health,

    /// Print the effective configuration
    Config,
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<HybridConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => HybridConfig::load(&path)?,
        None => HybridConfig::load_default()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Search {
            query,
            top_k,
            mode,
            timeout_ms,
            json,
        } => {
            let mode = match mode {
                Some(mode) => SearchMode::parse_or_default(&mode),
                None => config.search.default_mode,
            };
            let top_k = top_k.unwrap_or(config.search.default_top_k);
            let timeout = timeout_ms.map(Duration::from_millis);
            search(&config, &query, top_k, mode, timeout, json).await;
        }
        Commands::Health => {
            health(&config).await?;
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn build_retriever(
    config: &HybridConfig,
    timeout: Option<Duration>,
) -> Result<Retriever, Box<dyn std::error::Error>> {
    let backend = ElasticBackend::new(&config.backend)?;

    let embedder: Option<Arc<dyn EmbeddingProvider>> = if config.embedding.enabled {
        match OnnxEmbedder::from_config(&config.embedding) {
            Ok(embedder) => Some(Arc::new(embedder)),
            Err(e) => {
                warn!("Dense search unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    let expander: Option<Arc<dyn SparseExpansionProvider>> = if config.sparse.enabled {
        Some(Arc::new(PipelineExpander::new(
            backend.clone(),
            &config.sparse,
        )))
    } else {
        None
    };

    let mut retriever_config = RetrieverConfig::from(&config.search);
    if timeout.is_some() {
        retriever_config.timeout = timeout;
    }

    Ok(Retriever::new(
        Arc::new(backend),
        embedder,
        expander,
        retriever_config,
    ))
}

async fn search(
    config: &HybridConfig,
    query: &str,
    top_k: usize,
    mode: SearchMode,
    timeout: Option<Duration>,
    json: bool,
) {
    let retriever = match build_retriever(config, timeout) {
        Ok(retriever) => retriever,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = if config.cache.enabled {
        CachedRetriever::from_config(retriever, &config.cache)
            .search(query, top_k, mode)
            .await
    } else {
        retriever.search(query, top_k, mode).await
    };

    match result {
        Ok(response) if json => match serde_json::to_string_pretty(&response) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Ok(response) => print_response(&response),
        Err(e) => {
            eprintln!("Error [{}]: {}", e.error_code(), e);
            std::process::exit(if e.is_unavailable() { 3 } else { 1 });
        }
    }
}

fn print_response(response: &RetrievalResponse) {
    if response.results.is_empty() {
        println!("No results for: {}", response.query);
    } else {
        println!(
            "Found {} results for: {} (mode={}, {}ms)\n",
            response.results.len(),
            response.query,
            response.mode,
            response.latency_ms
        );
    }

    for result in &response.results {
        let record = &result.record;
        println!(
            "{}. [{:.4}] {} #{} ({})",
            result.rank, result.score, record.document_id, record.chunk_id, result.strategy
        );
        if record.source_url != hybrid_core::UNKNOWN {
            println!("   {}", record.source_url);
        }
        println!("   {}\n", snippet(&record.content, 200));
    }

    for report in &response.strategies {
        if report.outcome.is_degraded() {
            println!("Note: {} search degraded ({:?})", report.strategy, report.outcome);
        }
    }
}

fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat,
    }
}

async fn health(config: &HybridConfig) -> Result<(), Box<dyn std::error::Error>> {
    let backend = ElasticBackend::new(&config.backend)?;

    match backend.health().await {
        Ok(health) => {
            info!("Health check for index {}", backend.index());
            println!("Cluster: {}", health.cluster_name.as_deref().unwrap_or("-"));
            println!("Status:  {}", health.status);
            if let Some(nodes) = health.number_of_nodes {
                println!("Nodes:   {}", nodes);
            }
            println!("Index:   {}", backend.index());
            if !health.is_serving() {
                std::process::exit(3);
            }
        }
        Err(e) => {
            eprintln!("Error [{}]: {}", e.error_code(), e);
            std::process::exit(3);
        }
    }

    Ok(())
}
