//! Connection and registration handlers: PASS, NICK, USER, PING, PONG,
//! QUIT, CAP, MOTD.

use irond_proto::{irc_to_lower, Message, NickExt, Prefix, Response};
use tracing::{debug, info};

use super::{Context, Handler};
use crate::error::{HandlerError, HandlerResult};
use crate::state::{ClientState, Matrix};

/// Handler for PASS.
pub struct PassHandler;

impl Handler for PassHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        if ctx.client()?.is_registered() {
            return Err(HandlerError::AlreadyRegistered);
        }
        let supplied = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?.to_string();

        match ctx.matrix.password.clone() {
            Some(expected) if supplied == expected => {
                let client = ctx.client_mut()?;
                client.password_ok = true;
                if client.state == ClientState::AwaitingPass {
                    client.state = ClientState::AwaitingNickUser;
                }
            }
            Some(_) => {
                debug!(token = ctx.token, "wrong password");
                fail_password(ctx)?;
            }
            None => {
                // No password configured; any PASS is accepted.
                let client = ctx.client_mut()?;
                if client.state == ClientState::AwaitingPass {
                    client.state = ClientState::AwaitingNickUser;
                }
            }
        }
        Ok(())
    }
}

/// Handler for NICK.
pub struct NickHandler;

impl Handler for NickHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Some(nick) = msg.arg(0) else {
            ctx.matrix.reply(
                ctx.token,
                Response::ERR_NONICKNAMEGIVEN,
                vec!["No nickname given".to_string()],
            );
            return Ok(());
        };
        let nick = nick.to_string();

        if !nick.as_str().is_valid_nick() {
            ctx.matrix.reply(
                ctx.token,
                Response::ERR_ERRONEUSNICKNAME,
                vec![nick, "Erroneous nickname".to_string()],
            );
            return Ok(());
        }

        let folded = irc_to_lower(&nick);
        if let Some(holder) = ctx.matrix.nicks.get(&folded) {
            if *holder != ctx.token {
                ctx.matrix.reply(
                    ctx.token,
                    Response::ERR_NICKNAMEINUSE,
                    vec![nick, "Nickname is already in use".to_string()],
                );
                return Ok(());
            }
        }

        let no_password = ctx.matrix.password.is_none();
        let client = ctx.client_mut()?;
        if client.state == ClientState::AwaitingPass && no_password {
            client.state = ClientState::AwaitingNickUser;
        }

        let old_nick = client.nick.clone();
        let old_prefix = client.prefix();
        let was_registered = client.is_registered();
        client.nick = Some(nick.clone());

        if let Some(ref old) = old_nick {
            let old_folded = irc_to_lower(old);
            if ctx.matrix.nicks.get(&old_folded) == Some(&ctx.token) {
                ctx.matrix.nicks.remove(&old_folded);
            }
        }
        ctx.matrix.nicks.insert(folded, ctx.token);
        debug!(token = ctx.token, nick = %nick, "nick set");

        if was_registered {
            // The sender sees its own change, as does everyone sharing
            // a channel with it.
            let echo = Message::with_prefix(old_prefix, "NICK", vec![nick]);
            ctx.matrix.send(ctx.token, &echo);
            for peer in ctx.matrix.channel_peers(ctx.token) {
                ctx.matrix.send(peer, &echo);
            }
        } else {
            try_complete_registration(ctx)?;
        }
        Ok(())
    }
}

/// Handler for USER.
pub struct UserHandler;

impl Handler for UserHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        if ctx.client()?.is_registered() {
            return Err(HandlerError::AlreadyRegistered);
        }
        if msg.params.len() < 4 {
            return Err(HandlerError::NeedMoreParams);
        }
        let user = msg.params[0].clone();
        let realname = msg.params[3].clone();

        let no_password = ctx.matrix.password.is_none();
        let client = ctx.client_mut()?;
        if client.state == ClientState::AwaitingPass && no_password {
            client.state = ClientState::AwaitingNickUser;
        }
        client.user = Some(user);
        client.realname = Some(realname);

        try_complete_registration(ctx)
    }
}

/// Handler for PING.
pub struct PingHandler;

impl Handler for PingHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let Some(origin) = msg.arg(0) else {
            ctx.matrix.reply(
                ctx.token,
                Response::ERR_NOORIGIN,
                vec!["No origin specified".to_string()],
            );
            return Ok(());
        };
        let server = ctx.matrix.server_name.clone();
        let pong = Message::with_prefix(
            Prefix::ServerName(server.clone()),
            "PONG",
            vec![server, origin.to_string()],
        )
        .trailing();
        ctx.matrix.send(ctx.token, &pong);
        Ok(())
    }
}

/// Handler for PONG.
pub struct PongHandler;

impl Handler for PongHandler {
    fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        // Any PONG settles the outstanding ping; the token is not
        // checked.
        ctx.client_mut()?.ping_sent_at = None;
        Ok(())
    }
}

/// Handler for QUIT.
pub struct QuitHandler;

impl Handler for QuitHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let reason = msg.arg(0).unwrap_or("Client Quit").to_string();
        let nick = ctx.nick();
        info!(token = ctx.token, nick = %nick, reason = %reason, "client quit");

        ctx.matrix.quit_client(ctx.token, &reason);

        let error = Message::new(
            "ERROR",
            vec![format!("Closing Link: {} ({})", nick, reason)],
        )
        .trailing();
        ctx.matrix.send(ctx.token, &error);
        ctx.client_mut()?.close_after_flush = true;
        Ok(())
    }
}

/// Handler for CAP.
///
/// No capabilities are offered; LS answers with an empty set and REQ
/// is refused wholesale. A pre-registration LS parks the welcome burst
/// until CAP END.
pub struct CapHandler;

impl Handler for CapHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let sub = msg
            .arg(0)
            .ok_or(HandlerError::NeedMoreParams)?
            .to_ascii_uppercase();
        let nick = ctx.nick();
        let server = ctx.matrix.server_name.clone();

        match sub.as_str() {
            "LS" => {
                let client = ctx.client_mut()?;
                if !client.is_registered() {
                    client.cap_negotiating = true;
                }
                let reply = Message::with_prefix(
                    Prefix::ServerName(server),
                    "CAP",
                    vec![nick, "LS".to_string(), String::new()],
                );
                ctx.matrix.send(ctx.token, &reply);
            }
            "LIST" => {
                let reply = Message::with_prefix(
                    Prefix::ServerName(server),
                    "CAP",
                    vec![nick, "LIST".to_string(), String::new()],
                );
                ctx.matrix.send(ctx.token, &reply);
            }
            "REQ" => {
                let caps = msg.arg(1).unwrap_or("").to_string();
                let reply = Message::with_prefix(
                    Prefix::ServerName(server),
                    "CAP",
                    vec![nick, "NAK".to_string(), caps],
                )
                .trailing();
                ctx.matrix.send(ctx.token, &reply);
            }
            "END" => {
                ctx.client_mut()?.cap_negotiating = false;
                try_complete_registration(ctx)?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Handler for MOTD.
pub struct MotdHandler;

impl Handler for MotdHandler {
    fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        send_motd(ctx.matrix, ctx.token);
        Ok(())
    }
}

/// Complete registration once NICK, USER, the password, and any CAP
/// negotiation have all settled.
pub(crate) fn try_complete_registration(ctx: &mut Context<'_>) -> HandlerResult {
    let client = ctx.client()?;
    if client.is_registered()
        || client.is_quitting()
        || client.nick.is_none()
        || client.user.is_none()
        || client.cap_negotiating
    {
        return Ok(());
    }
    if !client.password_ok {
        return fail_password(ctx);
    }

    let client = ctx.client_mut()?;
    client.state = ClientState::Registered;
    let nick = client.nick.clone().unwrap_or_default();
    let user = client.user.clone().unwrap_or_default();
    let host = client.host.clone();
    info!(token = ctx.token, nick = %nick, host = %host, "client registered");

    let server = ctx.matrix.server_name.clone();
    let created = ctx
        .matrix
        .created_at
        .format("%a %b %e %Y at %H:%M:%S UTC")
        .to_string();
    let version = format!("irond-{}", env!("CARGO_PKG_VERSION"));

    ctx.matrix.reply(
        ctx.token,
        Response::RPL_WELCOME,
        vec![format!(
            "Welcome to the Internet Relay Chat Network {}!{}@{}",
            nick, user, host
        )],
    );
    ctx.matrix.reply(
        ctx.token,
        Response::RPL_YOURHOST,
        vec![format!("Your host is {}, running version {}", server, version)],
    );
    ctx.matrix.reply(
        ctx.token,
        Response::RPL_CREATED,
        vec![format!("This server was created {}", created)],
    );
    ctx.matrix.reply(
        ctx.token,
        Response::RPL_MYINFO,
        vec![server, version, "o".to_string(), "itkol".to_string()],
    );
    send_motd(ctx.matrix, ctx.token);
    Ok(())
}

/// 464, then close once the reply has flushed.
fn fail_password(ctx: &mut Context<'_>) -> HandlerResult {
    ctx.matrix.reply(
        ctx.token,
        Response::ERR_PASSWDMISMATCH,
        vec!["Password incorrect".to_string()],
    );
    let nick = ctx.nick();
    ctx.matrix.quit_client(ctx.token, "Bad password");
    let error = Message::new(
        "ERROR",
        vec![format!("Closing Link: {} (Bad password)", nick)],
    )
    .trailing();
    ctx.matrix.send(ctx.token, &error);
    ctx.client_mut()?.close_after_flush = true;
    Ok(())
}

/// The MOTD burst, shared by registration and the MOTD command.
pub(crate) fn send_motd(matrix: &mut Matrix, token: usize) {
    if matrix.motd.is_empty() {
        matrix.reply(
            token,
            Response::ERR_NOMOTD,
            vec!["MOTD File is missing".to_string()],
        );
        return;
    }
    let server = matrix.server_name.clone();
    let lines = matrix.motd.clone();
    matrix.reply(
        token,
        Response::RPL_MOTDSTART,
        vec![format!("- {} Message of the day - ", server)],
    );
    for line in lines {
        matrix.reply(token, Response::RPL_MOTD, vec![format!("- {}", line)]);
    }
    matrix.reply(
        token,
        Response::RPL_ENDOFMOTD,
        vec!["End of /MOTD command".to_string()],
    );
}
