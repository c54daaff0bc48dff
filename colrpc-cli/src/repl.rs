//! Interactive REPL.

use crate::commands;
use crate::Commands;
use colored::Colorize;
use colrpc_client::Client;
use colrpc_protocol::types::ConsistencyLevel;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use std::net::SocketAddr;

const HELP_TEXT: &str = r#"
Available commands:
  help                              Show this help
  version                           Show the server interface version
  cluster-name                      Show the cluster name

  keyspaces                         List keyspaces
  keyspace <name>                   Describe a keyspace
  use <keyspace>                    Switch the session keyspace
  ring <keyspace>                   Show the token ring

  get <cf> <key> <column>           Read a column
  insert <cf> <key> <column> <value> [ttl]
                                    Write a column
  remove <cf> <key> [column]        Delete a row or a column
  count <cf> <key>                  Count the columns of a row
  truncate <cf>                     Remove all data from a column family

  cql <query>                       Execute a CQL query
  consistency [level]               Show or set the consistency level

  Keys, columns and values are text, or hex with a 0x prefix.

  quit, exit                        Exit the REPL
"#;

/// Session state carried between REPL lines.
struct ReplState {
    keyspace: Option<String>,
    consistency: ConsistencyLevel,
}

impl ReplState {
    fn prompt(&self) -> String {
        match self.keyspace {
            Some(ref ks) => format!("{} ", format!("colrpc:{}>", ks).cyan()),
            None => format!("{} ", "colrpc>".cyan()),
        }
    }
}

/// What a REPL line asks for.
#[derive(Debug, PartialEq)]
enum Action {
    Run(Commands),
    Use(String),
    Consistency(Option<String>),
    Print(String),
    Quit,
}

pub async fn run(
    client: Client,
    addr: SocketAddr,
    keyspace: Option<String>,
    consistency: ConsistencyLevel,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "colrpc CLI".bold().cyan());
    println!("{} to {}", "Connected".green(), addr);

    // Create readline editor
    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(config)?;

    // Load history
    let history_path = std::env::var("HOME")
        .map(|h| std::path::PathBuf::from(h).join(".colrpc_history"))
        .unwrap_or_else(|_| ".colrpc_history".into());
    let _ = rl.load_history(&history_path);

    println!("Type 'help' for available commands.\n");

    let mut state = ReplState {
        keyspace,
        consistency,
    };

    loop {
        match rl.readline(&state.prompt()) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match execute_repl_command(&client, &mut state, line).await {
                    Ok(Some(output)) => println!("{}\n", output),
                    Ok(None) => break, // Exit command
                    Err(e) => println!("{}: {}\n", "Error".red(), e),
                }

                if !client.is_usable().await {
                    println!("{}", "Connection lost.".red());
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    // Save history
    let _ = rl.save_history(&history_path);

    // Disconnect
    let _ = client.close().await;
    println!("{}", "Disconnected.".dimmed());

    Ok(())
}

async fn execute_repl_command(
    client: &Client,
    state: &mut ReplState,
    line: &str,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    match parse_line(line) {
        Action::Quit => Ok(None),
        Action::Print(text) => Ok(Some(text)),
        Action::Run(cmd) => Ok(Some(commands::execute(client, cmd, state.consistency).await?)),
        Action::Use(keyspace) => {
            client.set_keyspace(keyspace.clone()).await?;
            let output = format!("{} {}", "Using".green(), keyspace.cyan());
            state.keyspace = Some(keyspace);
            Ok(Some(output))
        }
        Action::Consistency(None) => Ok(Some(state.consistency.to_string())),
        Action::Consistency(Some(name)) => {
            state.consistency = commands::parse_consistency(&name)?;
            Ok(Some(format!(
                "{} {}",
                "Consistency".green(),
                state.consistency
            )))
        }
    }
}

fn parse_line(line: &str) -> Action {
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };
    let cmd = cmd.to_lowercase();

    // CQL takes the rest of the line verbatim.
    if cmd == "cql" {
        if rest.is_empty() {
            return usage("cql <query>");
        }
        return Action::Run(Commands::Cql {
            query: rest.to_string(),
        });
    }

    let args: Vec<&str> = rest.split_whitespace().collect();
    let arg = |i: usize| args[i].to_string();

    match cmd.as_str() {
        "help" | "?" => Action::Print(HELP_TEXT.to_string()),

        "quit" | "exit" | "q" => Action::Quit,

        "version" => Action::Run(Commands::Version),

        "cluster-name" => Action::Run(Commands::ClusterName),

        "keyspaces" | "ks" => Action::Run(Commands::Keyspaces),

        "keyspace" => {
            if args.is_empty() {
                return usage("keyspace <name>");
            }
            Action::Run(Commands::Keyspace { name: arg(0) })
        }

        "use" => {
            if args.is_empty() {
                return usage("use <keyspace>");
            }
            Action::Use(arg(0))
        }

        "ring" => {
            if args.is_empty() {
                return usage("ring <keyspace>");
            }
            Action::Run(Commands::Ring { keyspace: arg(0) })
        }

        "get" | "g" => {
            if args.len() < 3 {
                return usage("get <cf> <key> <column>");
            }
            Action::Run(Commands::Get {
                cf: arg(0),
                key: arg(1),
                column: arg(2),
            })
        }

        "insert" | "set" => {
            if args.len() < 4 {
                return usage("insert <cf> <key> <column> <value> [ttl]");
            }
            let ttl = match args.get(4).map(|s| s.parse::<i32>()).transpose() {
                Ok(ttl) => ttl,
                Err(_) => return usage("insert <cf> <key> <column> <value> [ttl]"),
            };
            Action::Run(Commands::Insert {
                cf: arg(0),
                key: arg(1),
                column: arg(2),
                value: arg(3),
                ttl,
            })
        }

        "remove" | "del" => {
            if args.len() < 2 {
                return usage("remove <cf> <key> [column]");
            }
            Action::Run(Commands::Remove {
                cf: arg(0),
                key: arg(1),
                column: args.get(2).map(|s| s.to_string()),
            })
        }

        "count" => {
            if args.len() < 2 {
                return usage("count <cf> <key>");
            }
            Action::Run(Commands::Count {
                cf: arg(0),
                key: arg(1),
            })
        }

        "truncate" => {
            if args.is_empty() {
                return usage("truncate <cf>");
            }
            Action::Run(Commands::Truncate { cf: arg(0) })
        }

        "consistency" | "cl" => Action::Consistency(args.first().map(|s| s.to_string())),

        _ => Action::Print(format!(
            "Unknown command: {}. Type 'help' for help.",
            cmd
        )),
    }
}

fn usage(text: &str) -> Action {
    Action::Print(format!("Usage: {}", text))
}
