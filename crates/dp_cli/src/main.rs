use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dp_core::config::{PipelineConfig, ProviderKind, ResponderConfig, StorageConfig, DEFAULT_REMOTE_MODEL, DEFAULT_REMOTE_URL};
use dp_core::{ContentKind, ContentStore};
use dp_feeds::HttpTransport;
use dp_inference::create_responder;
use dp_pipeline::Pipeline;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod logging;

#[derive(Parser, Debug)]
#[command(author, version, about = "Aggregate, summarize, edit and publish longevity content", long_about = None)]
struct Cli {
    /// Storage backend: memory or sqlite
    #[arg(long, global = true, default_value = "sqlite", env = "DAILYPRESS_STORAGE")]
    storage: String,
    /// SQLite database file
    #[arg(long, global = true, env = "DAILYPRESS_DB_PATH")]
    db_path: Option<PathBuf>,
    /// JSON pipeline configuration file
    #[arg(long, global = true, env = "DAILYPRESS_CONFIG")]
    config: Option<PathBuf>,
    /// JSON list of feeds replacing the configured ones
    #[arg(long, global = true, env = "DAILYPRESS_FEED_SOURCES", hide_env_values = true)]
    feed_sources: Option<String>,
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one pipeline and print its summary
    Run(RunArgs),
    /// Show the newest stored records
    List {
        #[arg(long, default_value = "article")]
        kind: ContentKind,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print the effective feed list
    Feeds,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    #[arg(long, default_value = "article")]
    kind: ContentKind,
    #[arg(long)]
    limit_per_feed: Option<usize>,
    /// Stop after this many publications
    #[arg(long, conflicts_with = "unlimited")]
    max_publishes: Option<usize>,
    /// Process every new candidate
    #[arg(long)]
    unlimited: bool,
    #[arg(long, default_value = "local")]
    summarizer: ProviderKind,
    #[arg(long, default_value = "local")]
    editor: ProviderKind,
    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "DAILYPRESS_MODEL_URL", default_value = DEFAULT_REMOTE_URL)]
    model_url: String,
    #[arg(long, env = "DAILYPRESS_MODEL", default_value = DEFAULT_REMOTE_MODEL)]
    model: String,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

impl RunArgs {
    fn responder_config(&self, provider: ProviderKind) -> ResponderConfig {
        ResponderConfig {
            provider,
            base_url: self.model_url.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            ..ResponderConfig::default()
        }
    }
}

fn load_config(cli: &Cli) -> dp_core::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(raw) = cli.feed_sources.as_deref().filter(|raw| !raw.trim().is_empty()) {
        config = config.with_feeds_json(raw)?;
    }
    Ok(config)
}

async fn open_storage(cli: &Cli) -> dp_core::Result<Arc<dyn ContentStore>> {
    let storage_config = StorageConfig::from_name(&cli.storage, cli.db_path.clone())?;
    dp_storage::create_storage(&storage_config).await
}

async fn run_pipeline(cli: &Cli, args: &RunArgs) -> anyhow::Result<()> {
    let mut config = load_config(cli)?;
    if let Some(limit) = args.limit_per_feed {
        config.limit_per_feed = limit;
    }
    if args.unlimited {
        config.max_publishes = None;
    } else if let Some(max) = args.max_publishes {
        config.max_publishes = Some(max);
    }
    config.validate()?;

    let storage = open_storage(cli).await?;
    let summarizer_config = args.responder_config(args.summarizer);
    let summarizer = create_responder(&summarizer_config)?;
    let editor = create_responder(&args.responder_config(args.editor))?;
    let transport = HttpTransport::new(config.timeouts.fetch(), &config.feed_headers)?;
    info!("📡 {} feed sources configured", config.feeds.len());

    let pipeline = Pipeline::new(args.kind, config, Arc::new(transport), storage, summarizer, editor)
        .with_max_length(summarizer_config.max_length);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interrupt received, finishing the current item");
            on_signal.cancel();
        }
    });

    let summary = pipeline.run(&cancel).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn list_records(cli: &Cli, kind: ContentKind, limit: usize) -> anyhow::Result<()> {
    let storage = open_storage(cli).await?;
    let records = storage
        .latest(kind, limit)
        .await
        .with_context(|| format!("Failed to list {}", kind.collection()))?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    match &cli.command {
        Commands::Run(args) => run_pipeline(&cli, args).await,
        Commands::List { kind, limit } => list_records(&cli, *kind, *limit).await,
        Commands::Feeds => {
            let config = load_config(&cli)?;
            println!("{}", serde_json::to_string_pretty(&config.feeds)?);
            Ok(())
        }
    }
}
