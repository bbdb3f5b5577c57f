use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use parley_cli::client::{ChatClient, LocalChatClient, RemoteChatClient};
use parley_cli::repl::Repl;
use parley_core::{config::load_config_or_default, AgentFactory, AgentKind, ParleyConfig};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

const LOG_FILE: &str = "parley.log";

#[derive(Parser, Debug)]
#[clap(author, version, about = "Parley - chat with an agent from the terminal")]
struct Cli {
    #[clap(long, short, default_value = "parley.yaml", help = "Configuration file for a local agent")]
    config: String,

    #[clap(long, short, help = "Talk to a running parley-server instead of a local agent")]
    server_url: Option<String>,

    #[clap(long, short, help = "Send a single message, print the reply and exit")]
    message: Option<String>,

    #[clap(long, short, help = "Agent strategy: assistants, tool_calling, react, graph or crew")]
    kind: Option<String>,

    #[clap(long, short, help = "Log level; overrides logging.level from the configuration")]
    log_level: Option<String>,
}

async fn build_client(cli: &Cli, mut config: ParleyConfig) -> Result<Box<dyn ChatClient>> {
    if let Some(url) = &cli.server_url {
        let client = RemoteChatClient::new(url.as_str());
        client
            .health_check()
            .await
            .with_context(|| format!("Cannot reach parley-server at {}", client.server_url()))?;
        log::info!("Connected to {}", client.server_url());
        return Ok(Box::new(client));
    }

    if let Some(kind) = &cli.kind {
        config.agent.kind = kind.parse::<AgentKind>()?;
    }
    log::info!("Building {} agent '{}'", config.agent.kind, config.agent.name);

    let agent = AgentFactory::create(&config).await?;
    Ok(Box::new(LocalChatClient::new(agent)))
}

async fn run_once(mut client: Box<dyn ChatClient>, message: &str) -> Result<()> {
    let reply = client.send_message(message).await?;
    println!("{}", reply);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config_or_default(&cli.config).await?;

    // Logs go to a file so they do not interleave with the conversation
    let log_path = config
        .logging
        .file
        .clone()
        .unwrap_or_else(|| PathBuf::from(LOG_FILE));
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open {}", log_path.display()))?;
    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.logging.level)
        .parse()
        .unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(level)
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    let client = build_client(&cli, config).await?;

    if let Some(message) = &cli.message {
        return run_once(client, message).await;
    }

    let mut repl = Repl::new(client);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    repl.run(stdin, &mut stdout).await?;
    stdout.flush()?;
    Ok(())
}
