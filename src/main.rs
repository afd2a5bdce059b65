//! `rouge`: query a Qdrant chunk collection and print budget-aware context.

mod render;

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use rouge_core::AppBuilder;
use rouge_memory::ScopeKey;
use rouge_retrieval::{RetrievalRequest, parse_top_k};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "rouge",
    version,
    about = "Adaptive retrieval and context assembly over a Qdrant chunk collection"
)]
struct Cli {
    /// Path to the TOML config. Falls back to `ROUGE_CONFIG`, then `config/default.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Retrieve and assemble context for a query.
    Retrieve {
        #[arg(long, short)]
        query: String,
        /// File name, or `domain:<name>`. Omit to search the whole collection.
        #[arg(long)]
        scope: Option<String>,
        /// Manual chunk count; still clamped by the token ceiling and the absolute cap.
        #[arg(long)]
        top_k: Option<String>,
        #[arg(long)]
        no_diversify: bool,
        #[arg(long)]
        score_threshold: Option<f32>,
        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show chunk statistics for the collection or one scope.
    Stats {
        #[arg(long)]
        scope: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// List file and domain scopes present in the collection.
    Scopes,
    /// Rescan the collection and save the scope statistics the other commands read.
    RefreshStats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();
    let cli = Cli::parse();

    match cli.command {
        Command::Retrieve {
            query,
            scope,
            top_k,
            no_diversify,
            score_threshold,
            json,
        } => {
            let mut request = RetrievalRequest::new(query).with_diversify(!no_diversify);
            if let Some(raw) = top_k.as_deref() {
                request = request.with_top_k(parse_top_k(raw)?);
            }
            if let Some(scope) = parse_scope(scope.as_deref())? {
                request = request.with_scope(scope);
            }
            if let Some(threshold) = score_threshold {
                request = request.with_score_threshold(threshold);
            }
            request.validate()?;
            retrieve(cli.config, &request, json).await
        }
        Command::Stats { scope, json } => {
            let scope = parse_scope(scope.as_deref())?;
            stats(cli.config, scope.as_ref(), json)
        }
        Command::Scopes => scopes(cli.config),
        Command::RefreshStats => refresh_stats(cli.config).await,
    }
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_scope(raw: Option<&str>) -> anyhow::Result<Option<ScopeKey>> {
    raw.map(|s| s.parse::<ScopeKey>().with_context(|| format!("invalid scope {s:?}")))
        .transpose()
}

async fn retrieve(
    config: Option<PathBuf>,
    request: &RetrievalRequest,
    json: bool,
) -> anyhow::Result<()> {
    let app = AppBuilder::from_path(config.as_deref())?;
    let retriever = app.build_retriever()?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        on_signal.cancel();
    });

    let result = retriever.retrieve_with_cancel(request, &cancel).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render::retrieval_report(&result));
    }
    Ok(())
}

fn stats(config: Option<PathBuf>, scope: Option<&ScopeKey>, json: bool) -> anyhow::Result<()> {
    let app = AppBuilder::from_path(config.as_deref())?;
    let retriever = app.build_retriever()?;

    let provider = retriever.stats();
    let stats = match scope {
        Some(scope) => provider.get_stats(scope),
        None => provider.collection_stats(),
    };
    let Some(stats) = stats else {
        match scope {
            Some(scope) => bail!("scope {scope} matches no stored chunks"),
            None => bail!(
                "no saved statistics for collection {}; run `rouge refresh-stats`",
                retriever.settings().collection
            ),
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&render::stats_json(&stats))?);
    } else {
        print!("{}", render::stats_report(&stats));
    }
    Ok(())
}

fn scopes(config: Option<PathBuf>) -> anyhow::Result<()> {
    let app = AppBuilder::from_path(config.as_deref())?;
    let retriever = app.build_retriever()?;

    let snapshot = retriever.stats().snapshot();
    if snapshot.skipped > 0 {
        tracing::warn!(skipped = snapshot.skipped, "malformed chunks left out of stats");
    }
    print!("{}", render::scopes_report(&snapshot));
    Ok(())
}

async fn refresh_stats(config: Option<PathBuf>) -> anyhow::Result<()> {
    let app = AppBuilder::from_path(config.as_deref())?;
    let snapshot = app.refresh_stats().await?;
    let chunks = snapshot.collection.as_ref().map_or(0, |s| s.total_chunk_count);
    println!(
        "stats v{}: {chunks} chunks, {} files, {} domains, {} skipped",
        snapshot.version,
        snapshot.files.len(),
        snapshot.domains.len(),
        snapshot.skipped
    );
    Ok(())
}
