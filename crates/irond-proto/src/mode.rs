//! Channel mode-string parsing.
//!
//! A mode string is read left to right with `+`/`-` toggling the
//! direction; flags that take an argument in the direction applied
//! consume the next argument token.

use thiserror::Error;

/// One requested change to a channel's modes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModeChange {
    /// `+i` / `-i` - invite-only.
    InviteOnly(bool),
    /// `+t` / `-t` - topic settable by operators only.
    TopicLock(bool),
    /// `+k <key>` - require a key to join.
    SetKey(String),
    /// `-k` - drop the key.
    ClearKey,
    /// `+l <n>` - member count limit.
    SetLimit(u32),
    /// `-l` - drop the limit.
    ClearLimit,
    /// `+o <nick>` / `-o <nick>` - grant or revoke operator.
    Oper(bool, String),
    /// `b` with no mask - ban list query.
    BanQuery,
}

/// Result of parsing a mode string: the changes to apply plus any
/// unrecognized flag characters (each of which earns a 472).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModeParse {
    /// Changes in the order they appeared.
    pub changes: Vec<ModeChange>,
    /// Unknown flag characters in the order they appeared.
    pub unknown: Vec<char>,
}

/// A mode string that cannot be applied at all.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ModeParseError {
    /// A flag needed an argument that was not supplied.
    #[error("mode '{0}' requires an argument")]
    MissingArg(char),
}

/// Parse `modestr` against its argument tokens.
///
/// `+l` with a non-numeric or zero argument is skipped rather than
/// rejected; surplus arguments are ignored.
pub fn parse_channel_modes(modestr: &str, args: &[&str]) -> Result<ModeParse, ModeParseError> {
    let mut adding = true;
    let mut args = args.iter().copied();
    let mut out = ModeParse::default();

    for c in modestr.chars() {
        match c {
            '+' => adding = true,
            '-' => adding = false,
            'i' => out.changes.push(ModeChange::InviteOnly(adding)),
            't' => out.changes.push(ModeChange::TopicLock(adding)),
            'k' => {
                if adding {
                    let key = args.next().ok_or(ModeParseError::MissingArg('k'))?;
                    if key.is_empty() {
                        return Err(ModeParseError::MissingArg('k'));
                    }
                    out.changes.push(ModeChange::SetKey(key.to_string()));
                } else {
                    out.changes.push(ModeChange::ClearKey);
                }
            }
            'l' => {
                if adding {
                    let arg = args.next().ok_or(ModeParseError::MissingArg('l'))?;
                    match arg.parse::<u32>() {
                        Ok(n) if n >= 1 => out.changes.push(ModeChange::SetLimit(n)),
                        _ => {}
                    }
                } else {
                    out.changes.push(ModeChange::ClearLimit);
                }
            }
            'o' => {
                let nick = args.next().ok_or(ModeParseError::MissingArg('o'))?;
                out.changes.push(ModeChange::Oper(adding, nick.to_string()));
            }
            'b' => out.changes.push(ModeChange::BanQuery),
            other => out.unknown.push(other),
        }
    }

    Ok(out)
}
