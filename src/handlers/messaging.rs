//! PRIVMSG and NOTICE.
//!
//! The two share one delivery path; the only difference is that NOTICE
//! never generates automatic replies, including its own error
//! numerics.

use irond_proto::{irc_to_lower, ChannelExt, Message, Response};

use super::{Context, Handler};
use crate::error::HandlerResult;

/// Handler for PRIVMSG.
pub struct PrivmsgHandler;

impl Handler for PrivmsgHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        relay(ctx, msg, "PRIVMSG", false)
    }
}

/// Handler for NOTICE.
pub struct NoticeHandler;

impl Handler for NoticeHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        relay(ctx, msg, "NOTICE", true)
    }
}

fn relay(ctx: &mut Context<'_>, msg: &Message, command: &str, silent: bool) -> HandlerResult {
    let Some(targets) = msg.arg(0).map(str::to_string) else {
        if !silent {
            ctx.matrix.reply(
                ctx.token,
                Response::ERR_NORECIPIENT,
                vec![format!("No recipient given ({})", command)],
            );
        }
        return Ok(());
    };
    let text = match msg.arg(1) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => {
            if !silent {
                ctx.matrix.reply(
                    ctx.token,
                    Response::ERR_NOTEXTTOSEND,
                    vec!["No text to send".to_string()],
                );
            }
            return Ok(());
        }
    };

    for target in targets.split(',') {
        if target.is_empty() {
            continue;
        }
        deliver(ctx, target, command, &text, silent)?;
    }
    Ok(())
}

fn deliver(
    ctx: &mut Context<'_>,
    target: &str,
    command: &str,
    text: &str,
    silent: bool,
) -> HandlerResult {
    let prefix = ctx.client()?.prefix();

    if target.is_channel_name() {
        let folded = irc_to_lower(target);
        let (display, is_member) = match ctx.matrix.channel(&folded) {
            Some(chan) => (chan.name.clone(), chan.is_member(ctx.token)),
            None => {
                if !silent {
                    ctx.matrix.reply(
                        ctx.token,
                        Response::ERR_NOSUCHNICK,
                        vec![target.to_string(), "No such nick/channel".to_string()],
                    );
                }
                return Ok(());
            }
        };
        if !is_member {
            if !silent {
                ctx.matrix.reply(
                    ctx.token,
                    Response::ERR_CANNOTSENDTOCHAN,
                    vec![display, "Cannot send to channel".to_string()],
                );
            }
            return Ok(());
        }
        let relayed =
            Message::with_prefix(prefix, command, vec![display, text.to_string()]).trailing();
        // The sender does not hear its own channel message.
        ctx.matrix
            .broadcast_channel(&folded, &relayed, Some(ctx.token));
        return Ok(());
    }

    match ctx.matrix.token_by_nick(target) {
        Some(recipient) => {
            let nick = ctx
                .matrix
                .client(recipient)
                .map(|c| c.display_nick().to_string())
                .unwrap_or_else(|| target.to_string());
            let relayed =
                Message::with_prefix(prefix, command, vec![nick, text.to_string()]).trailing();
            ctx.matrix.send(recipient, &relayed);
        }
        None => {
            if !silent {
                ctx.matrix.reply(
                    ctx.token,
                    Response::ERR_NOSUCHNICK,
                    vec![target.to_string(), "No such nick/channel".to_string()],
                );
            }
        }
    }
    Ok(())
}
