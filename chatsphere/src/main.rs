//! ChatSphere - a terminal AI chat client and the proxy it talks to.
//!
//! Architecture:
//! - `serve` runs an axum server exposing `POST /api/ask`, which forwards each
//!   message to an OpenAI-style upstream with a server-held API key
//! - The chat commands are thin clients: conversations are stored locally and
//!   every turn goes to the proxy over HTTP
//! - Without `--server`, the client auto-starts a local proxy in the background

mod cli;
mod client;
mod config;
mod models;
mod proxy;
mod server;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{execute, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);
    execute(cli).await
}

/// Log to stderr, filtered by `RUST_LOG`. The server is chattier by default
/// than the interactive commands, which share the terminal with the chat.
fn init_tracing(cli: &Cli) {
    let default_level = match cli.command {
        cli::Commands::Serve(_) => "info",
        _ => "warn",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
