//! MODE handler and channel mode application.

use irond_proto::{
    irc_to_lower, parse_channel_modes, ChannelExt, Message, ModeChange, ModeParseError, Response,
};
use tracing::debug;

use super::{Context, Handler};
use crate::error::{HandlerError, HandlerResult};

/// Handler for MODE, both the channel and the (vestigial) user form.
pub struct ModeHandler;

impl Handler for ModeHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let target = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?.to_string();

        if target.as_str().is_channel_name() {
            channel_mode(ctx, msg, &target)
        } else {
            user_mode(ctx, msg, &target)
        }
    }
}

/// One applied change, kept for the MODE broadcast.
struct Applied {
    adding: bool,
    flag: char,
    arg: Option<String>,
}

fn channel_mode(ctx: &mut Context<'_>, msg: &Message, name: &str) -> HandlerResult {
    let folded = irc_to_lower(name);
    let (chan_display, is_member, is_op) = {
        let Some(chan) = ctx.matrix.channel(&folded) else {
            return Err(HandlerError::NoSuchChannel(name.to_string()));
        };
        (
            chan.name.clone(),
            chan.is_member(ctx.token),
            chan.is_op(ctx.token),
        )
    };

    let Some(modestr) = msg.arg(1).map(str::to_string) else {
        // Bare query: current modes.
        let (flags, mut args) = ctx
            .matrix
            .channel(&folded)
            .map(|c| c.modes.mode_string())
            .unwrap_or_default();
        let mut params = vec![chan_display, flags];
        params.append(&mut args);
        ctx.matrix.reply(ctx.token, Response::RPL_CHANNELMODEIS, params);
        return Ok(());
    };

    let args: Vec<&str> = msg.params.iter().skip(2).map(String::as_str).collect();
    let parsed = match parse_channel_modes(&modestr, &args) {
        Ok(parsed) => parsed,
        Err(ModeParseError::MissingArg(_)) => return Err(HandlerError::NeedMoreParams),
    };

    for flag in &parsed.unknown {
        ctx.matrix.reply(
            ctx.token,
            Response::ERR_UNKNOWNMODE,
            vec![flag.to_string(), "is unknown mode char to me".to_string()],
        );
    }

    let mutating = parsed
        .changes
        .iter()
        .any(|c| !matches!(c, ModeChange::BanQuery));
    let ban_query = parsed
        .changes
        .iter()
        .any(|c| matches!(c, ModeChange::BanQuery));

    if ban_query {
        // No ban lists are kept; the list is always empty.
        ctx.matrix.reply(
            ctx.token,
            Response::RPL_ENDOFBANLIST,
            vec![chan_display.clone(), "End of channel ban list".to_string()],
        );
    }
    if !mutating {
        return Ok(());
    }

    if !is_member {
        return Err(HandlerError::NotOnChannel(chan_display));
    }
    if !is_op {
        ctx.matrix.reply(
            ctx.token,
            Response::ERR_CHANOPRIVSNEEDED,
            vec![chan_display, "You're not channel operator".to_string()],
        );
        return Ok(());
    }

    let mut applied: Vec<Applied> = Vec::new();
    for change in parsed.changes {
        apply_change(ctx, &folded, &chan_display, change, &mut applied)?;
    }

    if applied.is_empty() {
        return Ok(());
    }

    // Canonical change string: signs grouped, arguments in order.
    let mut flags = String::new();
    let mut mode_args = Vec::new();
    let mut last_sign: Option<bool> = None;
    for item in &applied {
        if last_sign != Some(item.adding) {
            flags.push(if item.adding { '+' } else { '-' });
            last_sign = Some(item.adding);
        }
        flags.push(item.flag);
        if let Some(ref arg) = item.arg {
            mode_args.push(arg.clone());
        }
    }
    debug!(channel = %chan_display, modes = %flags, "modes changed");

    let mut params = vec![chan_display, flags];
    params.extend(mode_args);
    let prefix = ctx.client()?.prefix();
    let echo = Message::with_prefix(prefix, "MODE", params);
    ctx.matrix.broadcast_channel(&folded, &echo, None);
    Ok(())
}

fn apply_change(
    ctx: &mut Context<'_>,
    folded: &str,
    chan_display: &str,
    change: ModeChange,
    applied: &mut Vec<Applied>,
) -> HandlerResult {
    match change {
        ModeChange::InviteOnly(on) => {
            if let Some(chan) = ctx.matrix.channel_mut(folded) {
                chan.modes.invite_only = on;
            }
            applied.push(Applied { adding: on, flag: 'i', arg: None });
        }
        ModeChange::TopicLock(on) => {
            if let Some(chan) = ctx.matrix.channel_mut(folded) {
                chan.modes.topic_lock = on;
            }
            applied.push(Applied { adding: on, flag: 't', arg: None });
        }
        ModeChange::SetKey(key) => {
            if let Some(chan) = ctx.matrix.channel_mut(folded) {
                chan.modes.key = Some(key.clone());
            }
            applied.push(Applied { adding: true, flag: 'k', arg: Some(key) });
        }
        ModeChange::ClearKey => {
            if let Some(chan) = ctx.matrix.channel_mut(folded) {
                chan.modes.key = None;
            }
            applied.push(Applied { adding: false, flag: 'k', arg: None });
        }
        ModeChange::SetLimit(limit) => {
            if let Some(chan) = ctx.matrix.channel_mut(folded) {
                chan.modes.limit = Some(limit);
            }
            applied.push(Applied {
                adding: true,
                flag: 'l',
                arg: Some(limit.to_string()),
            });
        }
        ModeChange::ClearLimit => {
            if let Some(chan) = ctx.matrix.channel_mut(folded) {
                chan.modes.limit = None;
            }
            applied.push(Applied { adding: false, flag: 'l', arg: None });
        }
        ModeChange::Oper(adding, nick) => {
            let Some(member) = ctx.matrix.token_by_nick(&nick) else {
                ctx.matrix.reply(
                    ctx.token,
                    Response::ERR_NOSUCHNICK,
                    vec![nick, "No such nick/channel".to_string()],
                );
                return Ok(());
            };
            let on_channel = ctx
                .matrix
                .channel(folded)
                .is_some_and(|c| c.is_member(member));
            if !on_channel {
                ctx.matrix.reply(
                    ctx.token,
                    Response::ERR_USERNOTINCHANNEL,
                    vec![
                        nick,
                        chan_display.to_string(),
                        "They aren't on that channel".to_string(),
                    ],
                );
                return Ok(());
            }
            let member_nick = ctx
                .matrix
                .client(member)
                .map(|c| c.display_nick().to_string())
                .unwrap_or(nick);
            if let Some(chan) = ctx.matrix.channel_mut(folded) {
                if let Some(modes) = chan.members.get_mut(&member) {
                    modes.op = adding;
                }
            }
            applied.push(Applied {
                adding,
                flag: 'o',
                arg: Some(member_nick),
            });
        }
        ModeChange::BanQuery => {}
    }
    Ok(())
}

/// MODE on a nick. Only the self-query does anything: no user modes
/// are implemented, so the answer is always an empty mode string.
fn user_mode(ctx: &mut Context<'_>, msg: &Message, target: &str) -> HandlerResult {
    let Some(holder) = ctx.matrix.token_by_nick(target) else {
        return Err(HandlerError::NoSuchNick(target.to_string()));
    };
    if holder != ctx.token {
        return Ok(());
    }
    if msg.arg(1).is_none() {
        ctx.matrix
            .reply(ctx.token, Response::RPL_UMODEIS, vec!["+".to_string()]);
    }
    Ok(())
}
