//! CLI command execution.
//!
//! Chat commands are a thin client: messages go to a proxy over HTTP and chats
//! live in a local `FileStore`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::client::api::AskClient;
use crate::client::render::{HtmlTranscript, Renderer, TerminalRenderer};
use crate::client::store::FileStore;
use crate::client::{
    greeting_for, load_user_name, save_user_name, ChatManager, DEFAULT_USER_NAME,
};
use crate::config::ProxyConfig;
use crate::models::{ChatMessage, CreatorInfo, MessageRole};
use crate::server;

use super::args::{Cli, Commands};

type InputLines = Lines<BufReader<tokio::io::Stdin>>;

// === Command Execution ===

pub async fn execute(cli: Cli) -> Result<()> {
    let data_dir = cli.data_dir;

    match cli.command {
        Commands::Serve(args) => {
            let port = args.port;
            server::start_server(port, ProxyConfig::from(args)).await
        }
        Commands::Chat { chat, server } => run_chat(data_dir, chat, server).await,
        Commands::Ask {
            chat,
            server,
            message,
        } => {
            let message = message.join(" ");
            if message.trim().is_empty() {
                bail!("Message is required for ask command");
            }
            ask_once(data_dir, chat, server, &message).await
        }
        Commands::List => list_chats(data_dir),
        Commands::Show { id } => show_chat(data_dir, &id),
        Commands::Delete { id, yes } => delete_chat(data_dir, &id, yes).await,
        Commands::Export { id, out } => export_chat(data_dir, &id, out),
    }
}

fn open_store(data_dir: Option<PathBuf>) -> Result<FileStore> {
    let root = match data_dir {
        Some(dir) => dir,
        None => FileStore::default_root()?,
    };
    let store = FileStore::open(root)?;
    tracing::debug!(root = %store.root().display(), "opened chat storage");
    Ok(store)
}

/// Open the manager with the stored user name, or the default one.
fn open_manager(data_dir: Option<PathBuf>) -> Result<ChatManager<FileStore>> {
    let store = open_store(data_dir)?;
    let name = load_user_name(&store)?.unwrap_or_else(|| DEFAULT_USER_NAME.to_string());
    Ok(ChatManager::open(store, greeting_for(&name))?)
}

fn connect(server: Option<String>) -> Result<AskClient> {
    let base_url = match server {
        Some(url) => url,
        None => server::ensure_server_running()?,
    };
    let client = AskClient::new(&base_url);
    tracing::debug!(endpoint = client.endpoint(), "using proxy");
    Ok(client)
}

fn stdin_lines() -> InputLines {
    BufReader::new(tokio::io::stdin()).lines()
}

fn prompt(text: &str) {
    use std::io::Write;
    print!("{text}");
    let _ = std::io::stdout().flush();
}

async fn confirm<R: AsyncBufRead + Unpin>(lines: &mut Lines<R>, question: &str) -> Result<bool> {
    prompt(&format!("{question} [y/N] "));
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

// === Interactive Chat ===

async fn run_chat(
    data_dir: Option<PathBuf>,
    chat: Option<String>,
    server: Option<String>,
) -> Result<()> {
    let mut store = open_store(data_dir)?;
    let mut lines = stdin_lines();

    let name = if let Some(name) = load_user_name(&store)? {
        name
    } else {
        prompt("Welcome to ChatSphere! What should I call you? ");
        let answer = lines.next_line().await?.unwrap_or_default();
        save_user_name(&mut store, &answer)?
    };

    let client = connect(server)?;
    let mut manager = ChatManager::open(store, greeting_for(&name))?;
    if let Some(prefix) = chat {
        let id = manager.resolve_id(&prefix)?;
        manager.switch_chat(&id)?;
    }

    let mut renderer = TerminalRenderer;
    println!("ChatSphere - type /help for commands");
    manager.render_history(&mut renderer);

    loop {
        prompt("> ");
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        if let Some(command) = line.strip_prefix('/') {
            match run_slash_command(command, &mut manager, &mut renderer, &mut lines).await {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => {
                    eprintln!("Error: {e:#}");
                    continue;
                }
            }
        }

        manager.send(line, &client, &mut renderer).await?;
    }

    Ok(())
}

/// Handle one `/command`. Returns `false` when the session should end.
async fn run_slash_command(
    command: &str,
    manager: &mut ChatManager<FileStore>,
    renderer: &mut TerminalRenderer,
    lines: &mut InputLines,
) -> Result<bool> {
    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, arg)| (name, arg.trim()));

    match name {
        "quit" | "exit" => return Ok(false),
        "new" => {
            manager.start_new_chat()?;
            manager.render_history(renderer);
        }
        "list" => print_chat_table(manager)?,
        "switch" => {
            if arg.is_empty() {
                bail!("Usage: /switch <id>");
            }
            let id = manager.resolve_id(arg)?;
            manager.switch_chat(&id)?;
            manager.render_history(renderer);
        }
        "delete" => {
            if arg.is_empty() {
                bail!("Usage: /delete <id>");
            }
            let id = manager.resolve_id(arg)?;
            let title = manager.session(&id)?.map(|s| s.title).unwrap_or_default();
            if !confirm(lines, &format!("Delete chat \"{title}\"?")).await? {
                return Ok(true);
            }
            let was_current = id == manager.current_id();
            manager.delete_chat(&id)?;
            println!("Deleted {id}");
            if was_current {
                manager.render_history(renderer);
            }
        }
        "help" => print_help(),
        _ => println!("Unknown command /{name}. Type /help for commands."),
    }

    Ok(true)
}

fn print_help() {
    println!("Commands:");
    println!("  /new           Start a new chat");
    println!("  /list          List recent chats");
    println!("  /switch <ID>   Switch to a chat (id or unique prefix)");
    println!("  /delete <ID>   Delete a chat");
    println!("  /help          Show this help");
    println!("  /quit          Leave");
}

// === One-shot Commands ===

/// Prints only the assistant's side of a turn.
struct ReplyPrinter;

impl Renderer for ReplyPrinter {
    fn clear(&mut self) {}

    fn show_message(&mut self, message: &ChatMessage) {
        if message.role == MessageRole::Assistant {
            println!("{}", message.content);
        }
    }

    fn show_typing(&mut self) {}

    fn hide_typing(&mut self) {}

    fn show_creator_card(&mut self, creator: &CreatorInfo) {
        TerminalRenderer.show_creator_card(creator);
    }
}

async fn ask_once(
    data_dir: Option<PathBuf>,
    chat: Option<String>,
    server: Option<String>,
    message: &str,
) -> Result<()> {
    let mut manager = open_manager(data_dir)?;
    if let Some(prefix) = chat {
        let id = manager.resolve_id(&prefix)?;
        manager.switch_chat(&id)?;
    }

    let client = connect(server)?;
    manager.send(message, &client, &mut ReplyPrinter).await?;
    Ok(())
}

fn print_chat_table(manager: &ChatManager<FileStore>) -> Result<()> {
    let chats = manager.recent_chats()?;
    if chats.is_empty() {
        println!("No chats found.");
        return Ok(());
    }

    println!("{:<38} {:<34}", "ID", "TITLE");
    println!("{}", "-".repeat(72));
    for chat in chats {
        let marker = if chat.id == manager.current_id() { "*" } else { "" };
        println!("{:<38} {}{marker}", chat.id, chat.title);
    }
    Ok(())
}

fn list_chats(data_dir: Option<PathBuf>) -> Result<()> {
    let manager = open_manager(data_dir)?;
    print_chat_table(&manager)
}

fn show_chat(data_dir: Option<PathBuf>, prefix: &str) -> Result<()> {
    let manager = open_manager(data_dir)?;
    let id = manager.resolve_id(prefix)?;
    let session = manager
        .session(&id)?
        .with_context(|| format!("Chat {id} not found"))?;

    println!("{} ({})", session.title, session.id);
    let mut renderer = TerminalRenderer;
    renderer.clear();
    for message in &session.messages {
        renderer.show_message(message);
    }
    Ok(())
}

async fn delete_chat(data_dir: Option<PathBuf>, prefix: &str, yes: bool) -> Result<()> {
    let mut manager = open_manager(data_dir)?;
    let id = manager.resolve_id(prefix)?;

    if !yes {
        let title = manager.session(&id)?.map(|s| s.title).unwrap_or_default();
        if !confirm(&mut stdin_lines(), &format!("Delete chat \"{title}\"?")).await? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    if manager.delete_chat(&id)? {
        println!("Deleted {id}");
    } else {
        println!("Chat {id} had no stored messages.");
    }
    Ok(())
}

fn export_chat(data_dir: Option<PathBuf>, prefix: &str, out: Option<PathBuf>) -> Result<()> {
    let manager = open_manager(data_dir)?;
    let id = manager.resolve_id(prefix)?;
    let session = manager
        .session(&id)?
        .with_context(|| format!("Chat {id} not found"))?;

    let mut transcript = HtmlTranscript::new(&session.title);
    for message in &session.messages {
        transcript.show_message(message);
    }

    let path = out.unwrap_or_else(|| PathBuf::from(format!("chatsphere-{id}.html")));
    write_export(&path, &transcript.finish())?;
    println!("Exported to {}", path.display());
    Ok(())
}

fn write_export(path: &Path, html: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, html).with_context(|| format!("Failed to write {}", path.display()))
}
