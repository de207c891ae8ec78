//! IRC message parsing and serialization.
//!
//! A message is an optional prefix, a command token, and up to fifteen
//! parameters, the last of which may be a trailing parameter introduced
//! by `:` that swallows the rest of the line.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use thiserror::Error;

/// Maximum number of parameters in a single message.
pub const MAX_PARAMS: usize = 15;

/// The source of a message, serialized as the leading `:prefix`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Prefix {
    /// A server name.
    ServerName(String),
    /// `nick!user@host` of an end user.
    Nickname(String, String, String),
}

impl Prefix {
    /// Classify a raw prefix token: `nick!user@host` becomes a user
    /// prefix, anything else a server name.
    pub fn parse(s: &str) -> Prefix {
        if let Some((nick, rest)) = s.split_once('!') {
            if let Some((user, host)) = rest.split_once('@') {
                return Prefix::Nickname(nick.to_string(), user.to_string(), host.to_string());
            }
        }
        Prefix::ServerName(s.to_string())
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::ServerName(name) => write!(f, "{}", name),
            Prefix::Nickname(nick, user, host) => write!(f, "{}!{}@{}", nick, user, host),
        }
    }
}

/// A parsed IRC message.
///
/// The command token is folded to upper case during parsing so dispatch
/// can key on it directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Message source, if any. Ignored for client-originated traffic.
    pub prefix: Option<Prefix>,
    /// Upper-cased command token.
    pub command: String,
    /// Parameters, trailing parameter last.
    pub params: Vec<String>,
    /// Serialize the last parameter in `:`-trailing form even when the
    /// colon is not strictly required (one-word message texts keep
    /// their colon on the wire).
    pub force_trailing: bool,
}

impl Message {
    /// Construct a message with no prefix.
    pub fn new(command: &str, params: Vec<String>) -> Message {
        Message {
            prefix: None,
            command: command.to_string(),
            params,
            force_trailing: false,
        }
    }

    /// Construct a message carrying a source prefix.
    pub fn with_prefix(prefix: Prefix, command: &str, params: Vec<String>) -> Message {
        Message {
            prefix: Some(prefix),
            command: command.to_string(),
            params,
            force_trailing: false,
        }
    }

    /// Mark the last parameter as a trailing parameter.
    pub fn trailing(mut self) -> Message {
        self.force_trailing = true;
        self
    }

    /// Parameter at `n`, if present.
    pub fn arg(&self, n: usize) -> Option<&str> {
        self.params.get(n).map(String::as_str)
    }
}

/// Why a line failed to parse as a message.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MessageParseError {
    /// The line was empty after terminator removal.
    #[error("empty message")]
    Empty,
    /// The command token was neither letters nor a three-digit numeric.
    #[error("invalid command token: {0}")]
    InvalidCommand(String),
}

fn is_command_token(tok: &str) -> bool {
    (!tok.is_empty() && tok.bytes().all(|b| b.is_ascii_alphabetic()))
        || (tok.len() == 3 && tok.bytes().all(|b| b.is_ascii_digit()))
}

impl FromStr for Message {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Message, Self::Err> {
        let mut rest = s.trim_end_matches(['\r', '\n']).trim_start_matches(' ');
        if rest.is_empty() {
            return Err(MessageParseError::Empty);
        }

        let prefix = match rest.strip_prefix(':') {
            Some(tail) => {
                let (tok, after) = match tail.split_once(' ') {
                    Some((tok, after)) => (tok, after),
                    None => (tail, ""),
                };
                rest = after.trim_start_matches(' ');
                Some(Prefix::parse(tok))
            }
            None => None,
        };

        let (command, after) = match rest.split_once(' ') {
            Some((tok, after)) => (tok, after),
            None => (rest, ""),
        };
        if command.is_empty() {
            // A bare prefix with nothing after it.
            return Err(MessageParseError::Empty);
        }
        if !is_command_token(command) {
            return Err(MessageParseError::InvalidCommand(command.to_string()));
        }
        rest = after;

        let mut params = Vec::new();
        let mut had_trailing = false;
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                had_trailing = true;
                break;
            }
            if params.len() == MAX_PARAMS - 1 {
                // The fifteenth parameter absorbs whatever is left.
                params.push(rest.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((tok, tail)) => {
                    params.push(tok.to_string());
                    rest = tail;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Ok(Message {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
            force_trailing: had_trailing,
        })
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(ref prefix) = self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        write!(f, "{}", self.command)?;
        if let Some((last, middles)) = self.params.split_last() {
            for p in middles {
                write!(f, " {}", p)?;
            }
            if self.force_trailing
                || last.is_empty()
                || last.starts_with(':')
                || last.contains(' ')
            {
                write!(f, " :{}", last)?;
            } else {
                write!(f, " {}", last)?;
            }
        }
        write!(f, "\r\n")
    }
}
