//! Command execution.

use crate::Commands;
use colored::Colorize;
use colrpc_client::Client;
use colrpc_protocol::types::{
    Column, ColumnOrSuperColumn, ColumnParent, ColumnPath, Compression, ConsistencyLevel,
    CqlResult, CqlResultType, KsDef, SlicePredicate, TokenRange,
};
use colrpc_protocol::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};

/// Columns counted by `count`.
const COUNT_LIMIT: i32 = i32::MAX;

/// Executes a command and returns the formatted output.
pub async fn execute(
    client: &Client,
    cmd: Commands,
    consistency: ConsistencyLevel,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Repl => unreachable!(),

        Commands::Version => Ok(client.describe_version().await?),

        Commands::ClusterName => Ok(client.describe_cluster_name().await?),

        Commands::Keyspaces => {
            let keyspaces = client.describe_keyspaces().await?;
            if keyspaces.is_empty() {
                return Ok("No keyspaces".yellow().to_string());
            }

            let mut output = String::new();
            for ks in &keyspaces {
                output.push_str(&format!(
                    "  {} [{}, {} column families]\n",
                    ks.name.cyan(),
                    short_class(&ks.strategy_class),
                    ks.cf_defs.len()
                ));
            }
            Ok(output)
        }

        Commands::Keyspace { name } => {
            let ks = client.describe_keyspace(name).await?;
            Ok(format_keyspace(&ks))
        }

        Commands::Ring { keyspace } => {
            let ranges = client.describe_ring(keyspace).await?;
            if ranges.is_empty() {
                return Ok("No token ranges".yellow().to_string());
            }
            Ok(ranges.iter().map(format_token_range).collect())
        }

        Commands::Get { cf, key, column } => {
            let path = ColumnPath::new(cf).with_column(parse_binary(&column)?);
            let result = client.get(parse_binary(&key)?, path, consistency).await?;
            Ok(format_column_or_super(&result))
        }

        Commands::Insert {
            cf,
            key,
            column,
            value,
            ttl,
        } => {
            let mut col = Column::new(parse_binary(&column)?, parse_binary(&value)?, timestamp());
            col.ttl = ttl;
            client
                .insert(parse_binary(&key)?, ColumnParent::new(&cf), col, consistency)
                .await?;
            Ok(format!("{} {}:{}", "Inserted".green(), cf.cyan(), key))
        }

        Commands::Remove { cf, key, column } => {
            let mut path = ColumnPath::new(&cf);
            if let Some(ref column) = column {
                path = path.with_column(parse_binary(column)?);
            }
            client
                .remove(parse_binary(&key)?, path, timestamp(), consistency)
                .await?;
            match column {
                Some(column) => Ok(format!(
                    "{} {}:{}:{}",
                    "Removed".green(),
                    cf.cyan(),
                    key,
                    column
                )),
                None => Ok(format!("{} {}:{}", "Removed".green(), cf.cyan(), key)),
            }
        }

        Commands::Count { cf, key } => {
            let count = client
                .get_count(
                    parse_binary(&key)?,
                    ColumnParent::new(cf),
                    SlicePredicate::range(Bytes::new(), Bytes::new(), COUNT_LIMIT),
                    consistency,
                )
                .await?;
            Ok(count.to_string())
        }

        Commands::Truncate { cf } => {
            client.truncate(cf.clone()).await?;
            Ok(format!("{} {}", "Truncated".green(), cf.cyan()))
        }

        Commands::Cql { query } => {
            let result = client
                .execute_cql_query(Bytes::from(query), Compression::NONE)
                .await?;
            Ok(format_cql_result(&result))
        }
    }
}

/// Parses a consistency level name such as `QUORUM` (case-insensitive).
pub fn parse_consistency(name: &str) -> Result<ConsistencyLevel, String> {
    ConsistencyLevel::from_name(name).ok_or_else(|| {
        let known: Vec<String> = ConsistencyLevel::VALUES
            .iter()
            .map(|level| level.to_string())
            .collect();
        format!(
            "unknown consistency level '{}' (expected one of {})",
            name,
            known.join(", ")
        )
    })
}

/// Parses a binary argument: `0x`-prefixed hex, otherwise the UTF-8 text itself.
pub fn parse_binary(arg: &str) -> Result<Bytes, hex::FromHexError> {
    match arg.strip_prefix("0x") {
        Some(digits) => hex::decode(digits).map(Bytes::from),
        None => Ok(Bytes::copy_from_slice(arg.as_bytes())),
    }
}

/// Renders bytes as text when printable, otherwise as `0x`-prefixed hex.
pub fn format_binary(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) if !text.is_empty() && !text.chars().any(char::is_control) => text.to_string(),
        _ => format!("0x{}", hex::encode(bytes)),
    }
}

/// Current time in microseconds, the conventional column timestamp.
fn timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

fn short_class(class: &str) -> &str {
    class.rsplit('.').next().unwrap_or(class)
}

fn format_keyspace(ks: &KsDef) -> String {
    let mut output = format!("{}\n", format!("Keyspace {}", ks.name.cyan()).bold());
    output.push_str(&format!("  Strategy: {}\n", ks.strategy_class));

    if let Some(ref options) = ks.strategy_options {
        for (key, value) in options {
            output.push_str(&format!("    {}: {}\n", key, value));
        }
    }
    if let Some(rf) = ks.replication_factor {
        output.push_str(&format!("  Replication factor: {}\n", rf));
    }
    output.push_str(&format!(
        "  Durable writes: {}\n",
        ks.durable_writes.unwrap_or(true)
    ));

    if ks.cf_defs.is_empty() {
        output.push_str(&format!("  {}\n", "No column families".yellow()));
    }
    for cf in &ks.cf_defs {
        output.push_str(&format!(
            "  {} ({}, comparator {})\n",
            cf.name.cyan(),
            cf.column_type.as_deref().unwrap_or("Standard"),
            short_class(cf.comparator_type.as_deref().unwrap_or("BytesType"))
        ));
    }
    output
}

fn format_token_range(range: &TokenRange) -> String {
    format!(
        "  ({}, {}] -> {}\n",
        range.start_token.yellow(),
        range.end_token.yellow(),
        range.endpoints.join(", ")
    )
}

fn format_column(column: &Column) -> String {
    let mut line = format!(
        "{} = {}",
        format_binary(&column.name).cyan(),
        column
            .value
            .as_deref()
            .map(format_binary)
            .unwrap_or_default()
    );
    if let Some(ts) = column.timestamp {
        line.push_str(&format!(" (timestamp: {}", ts));
        if let Some(ttl) = column.ttl {
            line.push_str(&format!(", ttl: {}", ttl));
        }
        line.push(')');
    }
    line
}

fn format_column_or_super(cosc: &ColumnOrSuperColumn) -> String {
    if let Some(ref column) = cosc.column {
        return format_column(column);
    }
    if let Some(ref counter) = cosc.counter_column {
        return format!("{} = {}", format_binary(&counter.name).cyan(), counter.value);
    }
    if let Some(ref sc) = cosc.super_column {
        let mut output = format!("{}\n", format_binary(&sc.name).bold());
        for column in &sc.columns {
            output.push_str(&format!("  {}\n", format_column(column)));
        }
        return output;
    }
    if let Some(ref sc) = cosc.counter_super_column {
        let mut output = format!("{}\n", format_binary(&sc.name).bold());
        for counter in &sc.columns {
            output.push_str(&format!(
                "  {} = {}\n",
                format_binary(&counter.name).cyan(),
                counter.value
            ));
        }
        return output;
    }
    "Empty result".yellow().to_string()
}

fn format_cql_result(result: &CqlResult) -> String {
    match result.result_type {
        CqlResultType::ROWS => {
            let rows = result.rows.as_deref().unwrap_or_default();
            if rows.is_empty() {
                return "No rows".yellow().to_string();
            }
            let mut output = String::new();
            for row in rows {
                output.push_str(&format!("{}\n", format_binary(&row.key).bold()));
                for column in &row.columns {
                    output.push_str(&format!("  {}\n", format_column(column)));
                }
            }
            output
        }
        CqlResultType::INT => result.num.unwrap_or_default().to_string(),
        _ => "OK".green().to_string(),
    }
}
