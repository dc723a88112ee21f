//! ccredis: a basic Redis CLI client
//!
//! Features:
//! - Commands sent as RESP2 multibulk requests
//! - Replies decoded incrementally from the socket, with a read timeout
//! - `help` backed by a `commands.json` command table
//! - Configuration via CLI arguments or TOML file

use ccredis::client::{Client, ClientError};
use ccredis::commands::CommandTable;
use ccredis::config::Config;
use ccredis::repl;
use std::io;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        read_timeout = ?config.read_timeout,
        max_depth = config.limits.max_depth,
        max_bulk_len = config.limits.max_bulk_len,
        "Starting ccredis"
    );

    let commands = match CommandTable::load(&config.commands_path) {
        Ok(table) => {
            info!(commands = table.len(), "Loaded command table");
            table
        }
        Err(e) => {
            warn!(error = %e, "Help is unavailable");
            CommandTable::default()
        }
    };

    let mut client = match Client::connect(&config) {
        Ok(client) => client,
        Err(ClientError::Connect { address, source }) => {
            warn!(error = %source, "Connect failed");
            println!("Could not connect to Redis server at {address}");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let prompt = format!("{}> ", client.address());
    let stdin = io::stdin();
    repl::run(
        &mut client,
        &commands,
        &prompt,
        stdin.lock(),
        &mut io::stdout(),
    )?;

    Ok(())
}
