//! IRC command handlers.
//!
//! One handler per command, registered in a [`Registry`] keyed by the
//! upper-cased command token. The dispatcher enforces the
//! pre-registration allowlist before a handler runs; everything else a
//! handler needs it reaches through [`Context`].

mod channel;
mod connection;
mod messaging;
mod mode;

pub use channel::{InviteHandler, JoinHandler, KickHandler, NamesHandler, PartHandler, TopicHandler};
pub use connection::{
    CapHandler, MotdHandler, NickHandler, PassHandler, PingHandler, PongHandler, QuitHandler,
    UserHandler,
};
pub use messaging::{NoticeHandler, PrivmsgHandler};
pub use mode::ModeHandler;

use std::collections::HashMap;

use irond_proto::{Message, Response};

use crate::error::{HandlerError, HandlerResult};
use crate::state::{Client, Matrix};

/// Commands a client may issue before it is registered.
const PREREG_ALLOWED: &[&str] = &["PASS", "NICK", "USER", "CAP", "QUIT", "PING", "PONG"];

/// Handler context: the sending client's token plus mutable access to
/// all shared state for the duration of one dispatch.
pub struct Context<'a> {
    pub token: usize,
    pub matrix: &'a mut Matrix,
}

impl Context<'_> {
    pub fn client(&self) -> Result<&Client, HandlerError> {
        self.matrix.client(self.token).ok_or(HandlerError::ClientGone)
    }

    pub fn client_mut(&mut self) -> Result<&mut Client, HandlerError> {
        self.matrix
            .client_mut(self.token)
            .ok_or(HandlerError::ClientGone)
    }

    /// The sender's display nick, `*` until one is set.
    pub fn nick(&self) -> String {
        self.matrix
            .client(self.token)
            .map(|c| c.display_nick().to_string())
            .unwrap_or_else(|| "*".to_string())
    }
}

/// Trait implemented by all command handlers.
pub trait Handler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult;
}

/// Registry of command handlers.
pub struct Registry {
    handlers: HashMap<&'static str, Box<dyn Handler + Send>>,
}

impl Registry {
    /// Create a registry with every handler registered.
    pub fn new() -> Registry {
        let mut handlers: HashMap<&'static str, Box<dyn Handler + Send>> = HashMap::new();

        // Connection and registration
        handlers.insert("PASS", Box::new(PassHandler));
        handlers.insert("NICK", Box::new(NickHandler));
        handlers.insert("USER", Box::new(UserHandler));
        handlers.insert("PING", Box::new(PingHandler));
        handlers.insert("PONG", Box::new(PongHandler));
        handlers.insert("QUIT", Box::new(QuitHandler));
        handlers.insert("CAP", Box::new(CapHandler));
        handlers.insert("MOTD", Box::new(MotdHandler));

        // Channels
        handlers.insert("JOIN", Box::new(JoinHandler));
        handlers.insert("PART", Box::new(PartHandler));
        handlers.insert("TOPIC", Box::new(TopicHandler));
        handlers.insert("NAMES", Box::new(NamesHandler));
        handlers.insert("KICK", Box::new(KickHandler));
        handlers.insert("INVITE", Box::new(InviteHandler));
        handlers.insert("MODE", Box::new(ModeHandler));

        // Messaging
        handlers.insert("PRIVMSG", Box::new(PrivmsgHandler));
        handlers.insert("NOTICE", Box::new(NoticeHandler));

        Registry { handlers }
    }

    /// Dispatch one parsed message for the client behind `ctx.token`.
    pub fn dispatch(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let cmd = msg.command.as_str();

        let Some(handler) = self.handlers.get(cmd) else {
            return Err(HandlerError::UnknownCommand(cmd.to_string()));
        };

        let registered = ctx.client()?.is_registered();
        if !registered && !PREREG_ALLOWED.contains(&cmd) {
            return Err(HandlerError::NotRegistered);
        }

        handler.handle(ctx, msg)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Send the 353/366 names burst for one channel to one client.
pub(crate) fn send_names(matrix: &mut Matrix, token: usize, folded: &str) {
    let Some(chan) = matrix.channel(folded) else {
        return;
    };
    let display = chan.name.clone();
    let mut names = Vec::with_capacity(chan.members.len());
    for (member_token, modes) in &chan.members {
        if let Some(member) = matrix.client(*member_token) {
            if let Some(ref nick) = member.nick {
                match modes.prefix_char() {
                    Some(c) => names.push(format!("{}{}", c, nick)),
                    None => names.push(nick.clone()),
                }
            }
        }
    }
    matrix.reply_trailing(
        token,
        Response::RPL_NAMREPLY,
        vec!["=".to_string(), display.clone(), names.join(" ")],
    );
    matrix.reply(
        token,
        Response::RPL_ENDOFNAMES,
        vec![display, "End of /NAMES list".to_string()],
    );
}
