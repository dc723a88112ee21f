//! Line-oriented front end: read a command, send it, print the reply.

use crate::client::{Client, ClientError};
use crate::commands::CommandTable;
use crate::protocols::resp::Frame;
use std::io::{self, BufRead, Write};
use tracing::{debug, warn};

/// Something that can answer a command with a reply.
pub trait Connection {
    fn send(&mut self, tokens: &[&str]) -> Result<Frame, ClientError>;
}

impl Connection for Client {
    fn send(&mut self, tokens: &[&str]) -> Result<Frame, ClientError> {
        Client::send(self, tokens)
    }
}

/// What the loop should do after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Quit,
}

/// Split a typed line into command tokens.
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

/// Render a reply the way it is shown to the user.
pub fn format_reply(frame: &Frame) -> String {
    let mut out = String::new();
    write_reply(&mut out, frame, 0);
    out
}

fn write_reply(out: &mut String, frame: &Frame, indent: usize) {
    match frame {
        Frame::Array(Some(items)) if !items.is_empty() => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(&" ".repeat(indent));
                }
                let prefix = format!("{}) ", i + 1);
                out.push_str(&prefix);
                write_reply(out, item, indent + prefix.len());
            }
        }
        Frame::Array(Some(_)) => out.push_str("(empty array)\n"),
        Frame::Array(None) | Frame::Bulk(None) => out.push_str("(nil)\n"),
        Frame::Bulk(Some(data)) => {
            out.push_str(&String::from_utf8_lossy(data));
            out.push('\n');
        }
        Frame::Simple(s) => {
            out.push_str(s);
            out.push('\n');
        }
        Frame::Error(e) => {
            out.push_str("(error) ");
            out.push_str(e);
            out.push('\n');
        }
        Frame::Integer(n) => {
            out.push_str(&n.to_string());
            out.push('\n');
        }
    }
}

/// Handle one input line.
pub fn handle_line<C: Connection, W: Write>(
    conn: &mut C,
    commands: &CommandTable,
    line: &str,
    output: &mut W,
) -> io::Result<Outcome> {
    let tokens = tokenize(line);
    let Some(first) = tokens.first() else {
        return Ok(Outcome::Continue);
    };

    if first.eq_ignore_ascii_case("quit") {
        return Ok(Outcome::Quit);
    }

    if first.eq_ignore_ascii_case("help") {
        write!(output, "{}", commands.help(&tokens[1..]))?;
        return Ok(Outcome::Continue);
    }

    // `?prefix` stands in for tab completion and the hint toolbar.
    if let Some(prefix) = first.strip_prefix('?') {
        match commands.syntax_hint(prefix) {
            Some(hint) => writeln!(output, "{hint}")?,
            None => {
                for name in commands.completions(prefix) {
                    writeln!(output, "{name}")?;
                }
            }
        }
        return Ok(Outcome::Continue);
    }

    debug!(command = %first, args = tokens.len() - 1, "Sending");
    match conn.send(&tokens) {
        Ok(reply) => {
            write!(output, "{}", format_reply(&reply))?;
            Ok(Outcome::Continue)
        }
        Err(e) if !e.is_fatal() => {
            warn!(error = %e, "Protocol error");
            writeln!(output, "Protocol error: {e}")?;
            Ok(Outcome::Continue)
        }
        Err(e) => {
            warn!(error = %e, "Session ended");
            writeln!(output, "Unexpected error: {e}")?;
            Ok(Outcome::Quit)
        }
    }
}

/// Prompt, read and dispatch lines until `quit`, end of input, or a
/// fatal connection error.
pub fn run<C, R, W>(
    conn: &mut C,
    commands: &CommandTable,
    prompt: &str,
    mut input: R,
    output: &mut W,
) -> io::Result<()>
where
    C: Connection,
    R: BufRead,
    W: Write,
{
    let mut line = String::new();
    loop {
        write!(output, "{prompt}")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output, "\nGoodbye!")?;
            return Ok(());
        }

        if handle_line(conn, commands, &line, output)? == Outcome::Quit {
            return Ok(());
        }
    }
}
