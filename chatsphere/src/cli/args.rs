//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{
    ProxyConfig, ReplyStyle, DEFAULT_API_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
    DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT_SECS,
};
use crate::server::DEFAULT_PORT;

/// ChatSphere - a terminal AI chat client and its upstream proxy
#[derive(Parser, Debug)]
#[command(name = "chatsphere")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory where chats are stored (default: ~/.chatsphere/storage)
    #[arg(long, global = true, env = "CHATSPHERE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the /api/ask proxy server
    Serve(ServeArgs),

    /// Open an interactive chat
    Chat {
        /// Resume this chat (full id or unique prefix) instead of starting fresh
        #[arg(short, long)]
        chat: Option<String>,

        /// Proxy base URL (default: auto-start a local server)
        #[arg(short, long, env = "CHATSPHERE_SERVER")]
        server: Option<String>,
    },

    /// Send a single message and print the reply
    Ask {
        /// Continue this chat (full id or unique prefix)
        #[arg(short, long)]
        chat: Option<String>,

        /// Proxy base URL (default: auto-start a local server)
        #[arg(short, long, env = "CHATSPHERE_SERVER")]
        server: Option<String>,

        /// Message to send
        #[arg(trailing_var_arg = true, required = true)]
        message: Vec<String>,
    },

    /// List recent chats
    List,

    /// Print the messages of a chat
    Show {
        /// Chat id or unique prefix
        id: String,
    },

    /// Delete a chat
    Delete {
        /// Chat id or unique prefix
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Export a chat as a standalone HTML page
    Export {
        /// Chat id or unique prefix
        id: String,

        /// Output file (default: chatsphere-<id>.html)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

/// Options for `serve`
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "CHATSPHERE_PORT")]
    pub port: u16,

    /// Upstream API key
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Upstream chat-completions URL
    #[arg(long, default_value = DEFAULT_API_URL, env = "CHATSPHERE_API_URL")]
    pub api_url: String,

    /// Upstream model
    #[arg(short, long, default_value = DEFAULT_MODEL, env = "CHATSPHERE_MODEL")]
    pub model: String,

    #[arg(long, default_value_t = DEFAULT_TEMPERATURE, env = "CHATSPHERE_TEMPERATURE")]
    pub temperature: f32,

    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS, env = "CHATSPHERE_MAX_TOKENS")]
    pub max_tokens: u32,

    /// System prompt sent ahead of every conversation
    #[arg(long, default_value = DEFAULT_SYSTEM_PROMPT, env = "CHATSPHERE_SYSTEM_PROMPT")]
    pub system_prompt: String,

    /// Formatting instruction appended to each message
    #[arg(long, value_enum, default_value_t = ReplyStyle::Sections, env = "CHATSPHERE_REPLY_STYLE")]
    pub reply_style: ReplyStyle,

    /// Return upstream replies without cleanup
    #[arg(long, env = "CHATSPHERE_RAW_REPLIES")]
    pub raw_replies: bool,

    /// Seconds before an upstream call is abandoned
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, env = "CHATSPHERE_TIMEOUT_SECS")]
    pub timeout_secs: u64,
}

impl From<ServeArgs> for ProxyConfig {
    fn from(args: ServeArgs) -> Self {
        Self {
            api_key: args.api_key,
            api_url: args.api_url,
            model: args.model,
            temperature: args.temperature,
            max_tokens: args.max_tokens,
            system_prompt: args.system_prompt,
            reply_style: args.reply_style,
            clean_replies: !args.raw_replies,
            timeout_secs: args.timeout_secs,
            ..Self::default()
        }
    }
}
