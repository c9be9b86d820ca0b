mod app;
mod handler;
mod markdown;
mod theme;
mod tui;
mod ui;

use std::fs::{self, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use streamchat_core::{
    save_export, ChatClient, Config, FileStorage, MarkdownEngine, MarkdownRenderer, SettingsStore,
    Storage,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "streamchat")]
#[command(version, about = "Terminal client for streaming chat servers")]
struct Cli {
    /// Chat server base URL (overrides config.json)
    #[arg(short, long)]
    server: Option<String>,

    /// Directory holding config.json, storage.json and the log file
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Markdown engine for assistant replies: commonmark or basic
    #[arg(long)]
    markdown: Option<MarkdownEngine>,

    /// Write the effective server and markdown choices back to config.json
    #[arg(long)]
    save_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Download the server transcript into the download directory
    Export,
    /// Clear the server-side conversation
    Clear,
    /// Render Markdown from stdin to sanitized HTML
    Render,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = match &cli.config_dir {
        Some(dir) => dir.clone(),
        None => Config::config_dir()?,
    };
    let mut config = Config::load_from(&config_dir)
        .with_context(|| format!("reading config from {}", config_dir.display()))?;
    if let Some(server) = cli.server.clone() {
        config.server_url = Some(server);
    }
    if let Some(engine) = cli.markdown {
        config.markdown = Some(engine);
    }
    if cli.save_config {
        config
            .save_to(&config_dir)
            .with_context(|| format!("writing config to {}", config_dir.display()))?;
    }

    match cli.command {
        None => {
            init_file_logging(&config_dir)?;
            run_tui(config, &config_dir).await
        }
        Some(command) => {
            init_stderr_logging();
            run_command(command, config).await
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("STREAMCHAT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// The terminal belongs to the UI, so interactive runs log to a file.
fn init_file_logging(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    let path = dir.join("streamchat.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(io::stderr)
        .init();
}

fn build_client(config: &Config) -> Result<ChatClient> {
    let timeout = Duration::from_secs(config.request_timeout_secs());
    Ok(ChatClient::new(config.server_url(), timeout)?)
}

async fn run_command(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Export => {
            let client = build_client(&config)?;
            let export = match client.export().await {
                Ok(export) => export,
                Err(e) if e.is_not_found() => {
                    println!("No chat history to export.");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            let path = save_export(&config.download_dir(), &export)?;
            println!("Chat exported to {}", path.display());
        }
        Command::Clear => {
            build_client(&config)?.clear().await?;
            println!("Chat cleared.");
        }
        Command::Render => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            let rendered = MarkdownRenderer::new(config.markdown_engine()).render(&text);
            println!("{}", rendered.html);
        }
    }
    Ok(())
}

async fn run_tui(config: Config, config_dir: &Path) -> Result<()> {
    info!(server = config.server_url(), "streamchat v{} starting", env!("CARGO_PKG_VERSION"));

    let client = build_client(&config)?;
    let storage: Box<dyn Storage> = Box::new(FileStorage::in_dir(config_dir));
    let store = SettingsStore::new(storage);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new(None);
    let mut app = App::new(config, client, store, events.sender());
    // Tick period follows the stored animation speed
    events.set_tick_rate(app.tick_period());
    app.request_history();

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    if let Err(e) = &result {
        error!(error = %e, "event loop failed");
    }
    info!("streamchat exiting");
    result
}

async fn run_loop(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event).await?;

        if app.bell_pending {
            app.bell_pending = false;
            tui::bell();
        }
        if app.tick_changed {
            app.tick_changed = false;
            events.set_tick_rate(app.tick_period());
        }
    }
    Ok(())
}
