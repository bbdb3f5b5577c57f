//! Parley chat backend: serves one configured agent over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use parley_core::{config::load_config_or_default, AgentFactory, AgentKind};
use parley_server::{shutdown_signal, ChatServer, ServerConfig, DEFAULT_BIND_ADDR};
use std::fs::OpenOptions;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Parley Server - serve a chat agent over HTTP")]
struct Cli {
    #[clap(long, short, default_value = "parley.yaml", help = "Configuration file; defaults are used when it does not exist")]
    config: String,

    #[clap(long, default_value = DEFAULT_BIND_ADDR)]
    bind_addr: String,

    #[clap(long, short, help = "Agent strategy: assistants, tool_calling, react, graph or crew")]
    kind: Option<String>,

    #[clap(long, short, help = "Log level; overrides logging.level from the configuration")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config_or_default(&cli.config).await?;

    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.logging.level)
        .parse()
        .unwrap_or(LevelFilter::Info);
    let mut logger = env_logger::Builder::new();
    logger.filter_level(level);
    if let Some(path) = &config.logging.file {
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        logger.target(env_logger::Target::Pipe(Box::new(log_file)));
    }
    logger.init();

    if let Some(kind) = &cli.kind {
        config.agent.kind = kind.parse::<AgentKind>()?;
    }
    log::info!(
        "Configuration loaded from {} for agent '{}' ({})",
        cli.config,
        config.agent.name,
        config.agent.kind
    );

    let agent = AgentFactory::create(&config).await?;
    log::info!("{} ready", agent.name());

    let server_config = ServerConfig::default()
        .with_bind_addr_str(&cli.bind_addr)?
        .with_logging(true);

    ChatServer::with_config(agent, server_config)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
