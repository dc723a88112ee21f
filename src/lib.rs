//! ccredis: a small Redis command-line client.
//!
//! The interesting part is the RESP2 codec in [`protocols::resp`]: the
//! multibulk request encoder, the reply decoder, and the frame reader that
//! assembles replies from a blocking byte stream. The rest is the thin
//! client around it:
//! - `config`: CLI arguments and TOML configuration
//! - `client`: blocking TCP connection with read timeout
//! - `commands`: command metadata table for `help`
//! - `repl`: line loop and reply formatting

pub mod client;
pub mod commands;
pub mod config;
pub mod protocols;
pub mod repl;
