mod actions;
mod node;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

const DEFAULT_CONFIG_PATH: &str = "~/.config/symmetry/server.yaml";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the hub's YAML config file.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the long-running hub process (default action).
    Start,
    /// Hard-delete a peer by key and exit, without starting any listener.
    DeletePeer {
        /// The peer's public key.
        key: String,
    },
}

impl Cli {
    pub async fn exec(self) -> eyre::Result<()> {
        let config_path = expand_tilde(&self.config);

        match self.command.unwrap_or(Command::Start) {
            Command::Start => actions::start(config_path).await,
            Command::DeletePeer { key } => actions::delete_peer(config_path, key).await,
        }
    }
}

pub async fn run() -> eyre::Result<()> {
    Cli::parse().exec().await
}

fn expand_tilde(path: &std::path::Path) -> PathBuf {
    let Ok(stripped) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(stripped),
        None => path.to_path_buf(),
    }
}
