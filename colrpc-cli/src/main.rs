//! colrpc-cli - Command-line client for colrpc servers
//!
//! Provides both a REPL and one-shot command execution.

mod commands;
mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use colrpc_client::{Client, ConnectionConfig};
use colrpc_protocol::types::ConsistencyLevel;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "colrpc-cli")]
#[command(about = "Command-line client for colrpc column-family servers")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, env = "COLRPC_SERVER", default_value = "127.0.0.1:9160")]
    server: SocketAddr,

    /// Keyspace to use for the session
    #[arg(short, long)]
    keyspace: Option<String>,

    /// Consistency level for reads and writes
    #[arg(short, long, default_value = "ONE", value_parser = commands::parse_consistency)]
    consistency: ConsistencyLevel,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub(crate) enum Commands {
    /// Start interactive REPL
    Repl,

    /// Show the interface version of the server
    Version,

    /// Show the cluster name
    ClusterName,

    /// List keyspaces
    Keyspaces,

    /// Describe a keyspace
    Keyspace {
        /// Keyspace name
        name: String,
    },

    /// Show the token ring of a keyspace
    Ring {
        /// Keyspace name
        keyspace: String,
    },

    /// Read a single column
    Get {
        /// Column family
        cf: String,
        /// Row key (0x-prefixed hex or text)
        key: String,
        /// Column name (0x-prefixed hex or text)
        column: String,
    },

    /// Write a single column
    Insert {
        /// Column family
        cf: String,
        /// Row key (0x-prefixed hex or text)
        key: String,
        /// Column name (0x-prefixed hex or text)
        column: String,
        /// Column value (0x-prefixed hex or text)
        value: String,
        /// Time to live in seconds
        #[arg(long)]
        ttl: Option<i32>,
    },

    /// Delete a row, or a single column of it
    Remove {
        /// Column family
        cf: String,
        /// Row key (0x-prefixed hex or text)
        key: String,
        /// Column name (0x-prefixed hex or text)
        column: Option<String>,
    },

    /// Count the columns of a row
    Count {
        /// Column family
        cf: String,
        /// Row key (0x-prefixed hex or text)
        key: String,
    },

    /// Remove all data from a column family
    Truncate {
        /// Column family
        cf: String,
    },

    /// Execute a CQL query
    Cql {
        /// Query text
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let client = Client::connect(ConnectionConfig::new(cli.server))
        .await
        .map_err(|e| {
            eprintln!("{}: {}", "Connection failed".red(), e);
            e
        })?;
    tracing::debug!("Connected to {}", cli.server);

    if let Some(ref keyspace) = cli.keyspace {
        client.set_keyspace(keyspace.clone()).await.map_err(|e| {
            eprintln!("{}: {}", "Cannot use keyspace".red(), e);
            e
        })?;
    }

    match cli.command {
        Some(Commands::Repl) | None => {
            repl::run(client, cli.server, cli.keyspace, cli.consistency).await?;
        }
        Some(cmd) => {
            let result = commands::execute(&client, cmd, cli.consistency).await;

            match result {
                Ok(output) => {
                    println!("{}", output);
                }
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    std::process::exit(1);
                }
            }

            client.close().await?;
        }
    }

    Ok(())
}
