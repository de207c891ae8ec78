//! Handler-boundary error type.
//!
//! Handlers either succeed, fail with a variant that maps to exactly
//! one numeric reply, or fail with a variant the loop keeps to itself.
//! Nothing propagates past the dispatch boundary.

use irond_proto::{Message, Response};
use thiserror::Error;

/// Errors surfaced by command handlers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error("not enough parameters")]
    NeedMoreParams,

    #[error("not registered")]
    NotRegistered,

    #[error("already registered")]
    AlreadyRegistered,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("no such nick: {0}")]
    NoSuchNick(String),

    #[error("no such channel: {0}")]
    NoSuchChannel(String),

    #[error("not on channel: {0}")]
    NotOnChannel(String),

    /// The client vanished mid-dispatch; nothing to reply to.
    #[error("client is gone")]
    ClientGone,
}

impl HandlerError {
    /// Convert to the single numeric this failure earns, or `None` for
    /// failures with no client-visible reply.
    pub fn to_reply(&self, server: &str, nick: &str, cmd: &str) -> Option<Message> {
        let msg = match self {
            Self::NeedMoreParams => Response::ERR_NEEDMOREPARAMS.reply(
                server,
                vec![
                    nick.to_string(),
                    cmd.to_string(),
                    "Not enough parameters".to_string(),
                ],
            ),
            Self::NotRegistered => Response::ERR_NOTREGISTERED.reply(
                server,
                vec![nick.to_string(), "You have not registered".to_string()],
            ),
            Self::AlreadyRegistered => Response::ERR_ALREADYREGISTRED.reply(
                server,
                vec![
                    nick.to_string(),
                    "Unauthorized command (already registered)".to_string(),
                ],
            ),
            Self::UnknownCommand(token) => Response::ERR_UNKNOWNCOMMAND.reply(
                server,
                vec![
                    nick.to_string(),
                    token.clone(),
                    "Unknown command".to_string(),
                ],
            ),
            Self::NoSuchNick(target) => Response::ERR_NOSUCHNICK.reply(
                server,
                vec![
                    nick.to_string(),
                    target.clone(),
                    "No such nick/channel".to_string(),
                ],
            ),
            Self::NoSuchChannel(channel) => Response::ERR_NOSUCHCHANNEL.reply(
                server,
                vec![
                    nick.to_string(),
                    channel.clone(),
                    "No such channel".to_string(),
                ],
            ),
            Self::NotOnChannel(channel) => Response::ERR_NOTONCHANNEL.reply(
                server,
                vec![
                    nick.to_string(),
                    channel.clone(),
                    "You're not on that channel".to_string(),
                ],
            ),
            Self::ClientGone => return None,
        };
        Some(msg)
    }
}

/// Result type for command handlers.
pub type HandlerResult = Result<(), HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_single_numerics() {
        let reply = HandlerError::NeedMoreParams
            .to_reply("ircserver", "alice", "JOIN")
            .unwrap();
        assert_eq!(
            reply.to_string(),
            ":ircserver 461 alice JOIN :Not enough parameters\r\n"
        );

        let reply = HandlerError::UnknownCommand("BLORT".into())
            .to_reply("ircserver", "*", "BLORT")
            .unwrap();
        assert_eq!(reply.to_string(), ":ircserver 421 * BLORT :Unknown command\r\n");
    }

    #[test]
    fn silent_variants_produce_no_reply() {
        assert!(HandlerError::ClientGone.to_reply("s", "n", "C").is_none());
    }
}
