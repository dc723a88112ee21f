//! Command metadata table used for `help` and syntax hints.
//!
//! The table is the `commands.json` format published with Redis: a map from
//! command name to its summary, group and argument list.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Command table loading errors
#[derive(Debug, Error)]
pub enum CommandsError {
    #[error("Cannot find {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read {path}: {err}", path = .0.display(), err = .1)]
    Read(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse {path}: {err}", path = .0.display(), err = .1)]
    Parse(PathBuf, #[source] serde_json::Error),
}

/// One argument of a command
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Argument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_text: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

impl Argument {
    fn syntax(&self) -> String {
        let text = self
            .display_text
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.name);
        if self.optional {
            format!("[{text}]")
        } else {
            text.to_string()
        }
    }
}

/// Metadata for one command
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CommandInfo {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub since: String,
    #[serde(default)]
    pub group: String,
    /// Absent for commands whose entry has no `arguments` key.
    #[serde(default)]
    pub arguments: Option<Vec<Argument>>,
}

impl CommandInfo {
    /// `NAME arg [optional]`
    pub fn syntax(&self) -> String {
        std::iter::once(self.name.clone())
            .chain(self.arguments.iter().flatten().map(Argument::syntax))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Command table keyed by upper-case name
#[derive(Debug, Default)]
pub struct CommandTable {
    commands: BTreeMap<String, CommandInfo>,
}

impl CommandTable {
    /// Load the table from a JSON file.
    pub fn load(path: &Path) -> Result<Self, CommandsError> {
        if !path.exists() {
            return Err(CommandsError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CommandsError::Read(path.to_path_buf(), e))?;
        Self::from_json(&contents).map_err(|e| CommandsError::Parse(path.to_path_buf(), e))
    }

    /// Parse the table from JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: BTreeMap<String, CommandInfo> = serde_json::from_str(json)?;
        let commands = raw
            .into_iter()
            .map(|(name, mut info)| {
                let name = name.to_uppercase();
                info.name = name.clone();
                (name, info)
            })
            .collect();
        Ok(Self { commands })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Look up a command, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&CommandInfo> {
        self.commands.get(&name.to_uppercase())
    }

    /// Syntax hint for the first word of a partially typed line.
    pub fn syntax_hint(&self, line: &str) -> Option<String> {
        let name = line.split_whitespace().next()?;
        self.get(name).map(CommandInfo::syntax)
    }

    /// Lower-case command names starting with `prefix`, sorted.
    pub fn completions(&self, prefix: &str) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        self.commands
            .keys()
            .map(|name| name.to_lowercase())
            .filter(|name| name.starts_with(&prefix))
            .collect()
    }

    /// Commands belonging to `group`, sorted by name.
    pub fn group(&self, group: &str) -> Vec<&CommandInfo> {
        self.commands
            .values()
            .filter(|info| info.group.eq_ignore_ascii_case(group))
            .collect()
    }

    /// Text shown for `help`, `help @group` and `help <command>`.
    ///
    /// `args` are the words after `help`.
    pub fn help(&self, args: &[&str]) -> String {
        let mut out = String::new();
        if args.is_empty() {
            out.push_str("To get help about Redis commands type:\n");
            out.push_str("  \"help @<group>\" to get a list of commands in <group>\n");
            out.push_str("  \"help <command>\" for help on <command>\n");
            out.push_str("  \"quit\" to exit\n");
            return out;
        }

        let keyword = args.join(" ").to_uppercase();
        if let Some(group) = keyword.strip_prefix('@') {
            let entries = self.group(group);
            if entries.is_empty() {
                let _ = writeln!(out, "No commands found in group '{group}'");
            }
            for info in entries {
                let _ = writeln!(out, "{}", info.name);
            }
            return out;
        }

        match self.commands.get(&keyword) {
            None => {
                let _ = writeln!(out, "No documentation found for command '{keyword}'");
            }
            Some(info) => {
                out.push('\n');
                if info.arguments.is_some() {
                    let _ = writeln!(out, "  {}", info.syntax());
                }
                let _ = writeln!(out, "  summary: {}", info.summary);
                let _ = writeln!(out, "  since: {}", info.since);
                let _ = writeln!(out, "  group: {}", info.group);
                out.push('\n');
            }
        }
        out
    }
}
