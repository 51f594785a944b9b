//! Command definitions
//!
//! A command is an ordered, non-empty sequence of command lines. The client
//! builds one per submitted link; the server reassembles one per connection.

use std::fmt;

use crate::error::{RelayError, Result};

/// First line of every download request: load the daemon's http module
pub const PREAMBLE: &str = "modprobe http";

/// Verb of the line that carries the link
pub const DOWNLOAD_VERB: &str = "do";

/// A single protocol instruction, guaranteed free of CR and LF
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandLine(String);

impl CommandLine {
    /// Validate and wrap one line of text
    ///
    /// Any CR or LF would let the text smuggle extra commands past the
    /// terminator, so both are rejected outright.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if let Some(pos) = text.find(|c: char| c == '\r' || c == '\n') {
            return Err(RelayError::InvalidCommand(format!(
                "line contains a terminator at byte {}",
                pos
            )));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First whitespace-separated token, if any
    pub fn verb(&self) -> Option<&str> {
        self.0.split_ascii_whitespace().next()
    }

    /// Tokens after the verb
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.0.split_ascii_whitespace().skip(1)
    }

    /// Everything after the verb, with surrounding whitespace trimmed
    pub fn rest(&self) -> &str {
        let trimmed = self.0.trim_start();
        match trimmed.find(|c: char| c.is_ascii_whitespace()) {
            Some(idx) => trimmed[idx..].trim(),
            None => "",
        }
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CommandLine {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An ordered sequence of one or more command lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    lines: Vec<CommandLine>,
}

impl Command {
    /// Build the two-line download request for `link`
    ///
    /// Fails with `InvalidCommand` if the link is empty or contains CR/LF.
    pub fn download(link: &str) -> Result<Self> {
        if link.trim().is_empty() {
            return Err(RelayError::InvalidCommand("link is empty".to_string()));
        }

        let link_line = CommandLine::new(format!("{} {}", DOWNLOAD_VERB, link))
            .map_err(|_| {
                RelayError::InvalidCommand("link contains a line terminator".to_string())
            })?;

        Ok(Self {
            lines: vec![CommandLine(PREAMBLE.to_string()), link_line],
        })
    }

    /// Build a command from arbitrary lines; at least one is required
    pub fn from_lines<I, S>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines = lines
            .into_iter()
            .map(CommandLine::new)
            .collect::<Result<Vec<_>>>()?;
        Self::from_command_lines(lines)
    }

    /// Build a command from already-validated lines
    pub fn from_command_lines(lines: Vec<CommandLine>) -> Result<Self> {
        if lines.is_empty() {
            return Err(RelayError::InvalidCommand(
                "command has no lines".to_string(),
            ));
        }
        Ok(Self { lines })
    }

    pub fn lines(&self) -> &[CommandLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Always false for a constructed command
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The link carried by the first `do` line, if present
    pub fn link(&self) -> Option<&str> {
        self.lines
            .iter()
            .find(|line| line.verb() == Some(DOWNLOAD_VERB))
            .map(|line| line.rest())
            .filter(|rest| !rest.is_empty())
    }
}

impl<'a> IntoIterator for &'a Command {
    type Item = &'a CommandLine;
    type IntoIter = std::slice::Iter<'a, CommandLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}
