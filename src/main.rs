mod humanize;
mod policy;
mod rate;
mod server;
mod webhook;

use clap::{Parser, Subcommand};
use rate::RateTracker;
use atende_agent::OpenAiChat;
use atende_core::config;
use atende_evolution::{EvolutionClient, Transcriber};
use atende_store::Store;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "atende",
    version,
    about = "Atende — WhatsApp AI secretary for dental clinics"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server.
    Serve,
    /// Check configuration and service availability.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Serve => {
            let cfg = config::load(&cli.config)?;

            if cfg.server.webhook_api_key.is_empty() {
                anyhow::bail!(
                    "webhook_api_key is empty. Set it in {} before exposing the webhook.",
                    cli.config
                );
            }
            if cfg.openai.api_key.is_empty() {
                anyhow::bail!("openai.api_key is empty. Set it in {}.", cli.config);
            }

            let messenger = EvolutionClient::from_config(
                cfg.evolution.base_url.clone(),
                cfg.evolution.api_key.clone(),
            );
            let chat = OpenAiChat::from_config(
                cfg.openai.base_url.clone(),
                cfg.openai.api_key.clone(),
                cfg.openai.model.clone(),
            );
            let transcriber = Transcriber::new(cfg.openai.api_key.clone());
            let store = Store::new(&cfg.store).await?;

            let state = Arc::new(server::AppState {
                config: cfg,
                store,
                messenger: Arc::new(messenger),
                chat: Arc::new(chat),
                transcriber,
                rate: Arc::new(RateTracker::default()),
            });

            println!("Atende — starting webhook server...");
            server::serve(state).await?;
        }
        Commands::Status => {
            let cfg = config::load(&cli.config)?;
            println!("Atende — Status Check\n");
            println!("Config: {}", cli.config);
            println!("Evolution API: {}", cfg.evolution.base_url);
            println!("Model: {}", cfg.openai.model);
            println!();

            let chat = OpenAiChat::from_config(
                cfg.openai.base_url.clone(),
                cfg.openai.api_key.clone(),
                cfg.openai.model.clone(),
            );
            let available = chat.is_available().await;
            println!(
                "  openai: {}",
                if available { "available" } else { "not reachable" }
            );

            let store = Store::new(&cfg.store).await?;
            println!("  registered instances: {}", store.instance_count().await?);
        }
    }

    Ok(())
}
