use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aoe2_overlay::api::state::AppState;
use aoe2_overlay::config::AppConfig;
use aoe2_overlay::fetch::Fetcher;
use aoe2_overlay::models::CIVILIZATIONS;
use aoe2_overlay::pipeline::{PipelineOutcome, PipelineSettings, StatsPipeline, StatsRequest};
use aoe2_overlay::retry::{cancel_pair, Retrier};
use aoe2_overlay::upstream::CompanionClient;

#[derive(Parser)]
#[command(name = "aoe2-overlay")]
#[command(about = "Age of Empires II player statistics overlay")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate a player's recent matches and print the report
    Report {
        /// Upstream profile id
        player_id: i64,

        /// Leaderboard id (e.g. "rm_1v1")
        #[arg(long)]
        leaderboard: Option<String>,

        /// Pages to fetch when no civilization filter is given
        #[arg(long)]
        pages: Option<u32>,

        /// Matches per page
        #[arg(long)]
        per_page: Option<u32>,

        /// Only matches where the player used this civilization
        #[arg(long)]
        civ: Option<String>,

        /// Only matches against this civilization
        #[arg(long)]
        opponent_civ: Option<String>,

        /// Overall time limit (e.g. "30m", "90s")
        #[arg(long)]
        timeout: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the API server
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Port number
        #[arg(long)]
        port: Option<u16>,
    },

    /// List known civilizations and their numbers
    Civs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    // Initialize tracing
    let log_level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting aoe2-overlay v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Report {
            player_id,
            leaderboard,
            pages,
            per_page,
            civ,
            opponent_civ,
            timeout,
            json,
        } => {
            let mut settings = config.pipeline_settings();
            if let Some(raw) = timeout {
                settings.overall_timeout = timeout_arg(&raw)?;
            }
            let pipeline = build_pipeline(&config, settings)?;

            let (handle, signal) = cancel_pair();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling run");
                    handle.cancel();
                }
            });

            let request = StatsRequest {
                player_id,
                leaderboard,
                per_page,
                pages,
                played_civ: civ,
                opponent_civ,
                ongoing: false,
            };

            match pipeline.run(&request, &signal).await? {
                PipelineOutcome::Report(report) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    } else {
                        print!("{}", report.to_console_text());
                    }
                }
                PipelineOutcome::NoMatches(none) => {
                    println!("{}", none.message());
                }
            }
        }
        Commands::Serve { host, port } => {
            let pipeline = build_pipeline(&config, config.pipeline_settings())?;
            let state = AppState {
                pipeline: Arc::new(pipeline),
            };
            let cors = aoe2_overlay::api::cors_layer(&config.server.cors_origin).with_context(|| {
                format!("invalid server.cors_origin {:?}", config.server.cors_origin)
            })?;
            let app = aoe2_overlay::api::build_router(state, cors);

            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Overlay API: http://{}", addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("Shutting down");
                })
                .await?;
        }
        Commands::Civs => {
            for (name, number) in CIVILIZATIONS {
                println!("{:>3}  {}", number, name);
            }
        }
    }

    Ok(())
}

/// `--timeout` must be a positive duration.
fn timeout_arg(raw: &str) -> Result<Duration> {
    let timeout = aoe2_overlay::parse_duration(raw)
        .with_context(|| format!("invalid --timeout value {:?}", raw))?;
    if timeout.is_zero() {
        bail!("--timeout must be greater than zero");
    }
    Ok(timeout)
}

fn build_pipeline(config: &AppConfig, settings: PipelineSettings) -> Result<StatsPipeline> {
    if config.cache.enabled {
        tracing::info!("Response cache enabled at {}", config.cache.dir.display());
    }
    let fetcher = Fetcher::new(config.fetcher_config())?;
    let client = CompanionClient::new(
        fetcher,
        &config.upstream.companion_base_url,
        &config.upstream.analysis_language,
    );
    Ok(StatsPipeline::new(
        Arc::new(client),
        Retrier::with_tokio(config.retry_policy()),
        settings,
    ))
}
