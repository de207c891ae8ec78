//! Channel membership handlers: JOIN, PART, TOPIC, NAMES, KICK,
//! INVITE.
//!
//! Handlers check preconditions against an immutable borrow, release
//! it, then mutate; nothing holds a channel reference across a send.

use chrono::Utc;
use irond_proto::{irc_to_lower, ChannelExt, Message, Response};
use tracing::{debug, info};

use super::{send_names, Context, Handler};
use crate::error::{HandlerError, HandlerResult};
use crate::state::{Channel, MemberModes, Topic};

/// Most channels one client may occupy at once.
const MAX_CHANNELS_PER_CLIENT: usize = 20;

/// Handler for JOIN.
pub struct JoinHandler;

impl Handler for JoinHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let channels = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?.to_string();

        if channels == "0" {
            return leave_all_channels(ctx);
        }

        let names: Vec<&str> = channels.split(',').collect();
        let keys: Vec<Option<&str>> = match msg.arg(1) {
            Some(keys) => {
                // Keys pair with channels positionally; a list of the
                // wrong length is unanswerable.
                let list: Vec<Option<&str>> = keys
                    .split(',')
                    .map(|k| if k.is_empty() { None } else { Some(k) })
                    .collect();
                if list.len() != names.len() {
                    return Err(HandlerError::NeedMoreParams);
                }
                list
            }
            None => vec![None; names.len()],
        };

        for (i, name) in names.iter().copied().enumerate() {
            if name.is_empty() {
                continue;
            }
            join_channel(ctx, name, keys.get(i).copied().flatten())?;
        }
        Ok(())
    }
}

fn join_channel(ctx: &mut Context<'_>, name: &str, key: Option<&str>) -> HandlerResult {
    if !name.is_channel_name() {
        ctx.matrix.reply(
            ctx.token,
            Response::ERR_NOSUCHCHANNEL,
            vec![name.to_string(), "No such channel".to_string()],
        );
        return Ok(());
    }
    let folded = irc_to_lower(name);

    let client = ctx.client()?;
    if client.channels.contains(&folded) {
        return Ok(());
    }
    if client.channels.len() >= MAX_CHANNELS_PER_CLIENT {
        ctx.matrix.reply(
            ctx.token,
            Response::ERR_TOOMANYCHANNELS,
            vec![
                name.to_string(),
                "You have joined too many channels".to_string(),
            ],
        );
        return Ok(());
    }
    let prefix = client.prefix();

    let chan_display = match ctx.matrix.channel(&folded) {
        Some(chan) => {
            let chan_display = chan.name.clone();
            let denial = if chan.modes.invite_only && !chan.invited.contains(&ctx.token) {
                Some((Response::ERR_INVITEONLYCHAN, "Cannot join channel (+i)"))
            } else if chan
                .modes
                .key
                .as_deref()
                .is_some_and(|required| key != Some(required))
            {
                Some((Response::ERR_BADCHANNELKEY, "Cannot join channel (+k)"))
            } else if chan
                .modes
                .limit
                .is_some_and(|limit| chan.members.len() >= limit as usize)
            {
                Some((Response::ERR_CHANNELISFULL, "Cannot join channel (+l)"))
            } else {
                None
            };

            if let Some((response, text)) = denial {
                ctx.matrix
                    .reply(ctx.token, response, vec![chan_display, text.to_string()]);
                return Ok(());
            }

            if let Some(chan) = ctx.matrix.channel_mut(&folded) {
                chan.members.insert(ctx.token, MemberModes::default());
                chan.invited.remove(&ctx.token);
            }
            chan_display
        }
        None => {
            // First JOIN creates the channel; the creator operates it.
            let mut chan = Channel::new(name);
            chan.members.insert(ctx.token, MemberModes { op: true });
            ctx.matrix.channels.insert(folded.clone(), chan);
            info!(channel = %name, token = ctx.token, "channel created");
            name.to_string()
        }
    };

    let client = ctx.client_mut()?;
    client.channels.insert(folded.clone());
    client.invited_to.remove(&folded);
    debug!(token = ctx.token, channel = %chan_display, "joined");

    let echo = Message::with_prefix(prefix, "JOIN", vec![chan_display.clone()]);
    ctx.matrix.broadcast_channel(&folded, &echo, None);

    match ctx.matrix.channel(&folded).and_then(|c| c.topic.clone()) {
        Some(topic) => {
            ctx.matrix
                .reply_trailing(ctx.token, Response::RPL_TOPIC, vec![chan_display, topic.text])
        }
        None => ctx.matrix.reply(
            ctx.token,
            Response::RPL_NOTOPIC,
            vec![chan_display, "No topic is set".to_string()],
        ),
    }
    send_names(ctx.matrix, ctx.token, &folded);
    Ok(())
}

/// `JOIN 0` - leave everything, one PART per channel.
fn leave_all_channels(ctx: &mut Context<'_>) -> HandlerResult {
    let nick = ctx.nick();
    let joined: Vec<String> = ctx.client()?.channels.iter().cloned().collect();
    for folded in joined {
        part_channel(ctx, &folded, Some(&nick))?;
    }
    Ok(())
}

/// Handler for PART.
pub struct PartHandler;

impl Handler for PartHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let channels = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?.to_string();
        let reason = msg.arg(1).map(str::to_string);

        for name in channels.split(',') {
            if name.is_empty() {
                continue;
            }
            let folded = irc_to_lower(name);
            if ctx.matrix.channel(&folded).is_none() {
                ctx.matrix.reply(
                    ctx.token,
                    Response::ERR_NOSUCHCHANNEL,
                    vec![name.to_string(), "No such channel".to_string()],
                );
                continue;
            }
            if !ctx.client()?.channels.contains(&folded) {
                ctx.matrix.reply(
                    ctx.token,
                    Response::ERR_NOTONCHANNEL,
                    vec![name.to_string(), "You're not on that channel".to_string()],
                );
                continue;
            }
            part_channel(ctx, &folded, reason.as_deref())?;
        }
        Ok(())
    }
}

/// Broadcast the PART and take the sender out of one channel.
fn part_channel(ctx: &mut Context<'_>, folded: &str, reason: Option<&str>) -> HandlerResult {
    let Some(chan) = ctx.matrix.channel(folded) else {
        return Ok(());
    };
    let chan_display = chan.name.clone();
    let prefix = ctx.client()?.prefix();

    let part = match reason {
        Some(reason) => {
            Message::with_prefix(prefix, "PART", vec![chan_display.clone(), reason.to_string()])
                .trailing()
        }
        None => Message::with_prefix(prefix, "PART", vec![chan_display.clone()]),
    };
    ctx.matrix.broadcast_channel(folded, &part, None);

    if let Some(chan) = ctx.matrix.channel_mut(folded) {
        chan.members.remove(&ctx.token);
    }
    ctx.client_mut()?.channels.remove(folded);
    ctx.matrix.destroy_channel_if_empty(folded);
    ctx.matrix.ensure_operator(folded);
    debug!(token = ctx.token, channel = %chan_display, "parted");
    Ok(())
}

/// Handler for TOPIC.
pub struct TopicHandler;

impl Handler for TopicHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let name = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?.to_string();
        let folded = irc_to_lower(&name);

        let (chan_display, is_member, is_op, topic_lock, topic) = {
            let Some(chan) = ctx.matrix.channel(&folded) else {
                return Err(HandlerError::NoSuchChannel(name));
            };
            (
                chan.name.clone(),
                chan.is_member(ctx.token),
                chan.is_op(ctx.token),
                chan.modes.topic_lock,
                chan.topic.clone(),
            )
        };
        if !is_member {
            return Err(HandlerError::NotOnChannel(chan_display));
        }

        let Some(text) = msg.arg(1) else {
            // Query.
            match topic {
                Some(topic) => {
                    ctx.matrix
                        .reply_trailing(ctx.token, Response::RPL_TOPIC, vec![chan_display, topic.text])
                }
                None => ctx.matrix.reply(
                    ctx.token,
                    Response::RPL_NOTOPIC,
                    vec![chan_display, "No topic is set".to_string()],
                ),
            }
            return Ok(());
        };
        let text = text.to_string();

        if topic_lock && !is_op {
            ctx.matrix.reply(
                ctx.token,
                Response::ERR_CHANOPRIVSNEEDED,
                vec![chan_display, "You're not channel operator".to_string()],
            );
            return Ok(());
        }

        let nick = ctx.nick();
        let prefix = ctx.client()?.prefix();
        if let Some(chan) = ctx.matrix.channel_mut(&folded) {
            chan.topic = if text.is_empty() {
                None
            } else {
                Some(Topic {
                    text: text.clone(),
                    set_by: nick,
                    set_at: Utc::now().timestamp(),
                })
            };
        }

        let echo = Message::with_prefix(prefix, "TOPIC", vec![chan_display, text]).trailing();
        ctx.matrix.broadcast_channel(&folded, &echo, None);
        Ok(())
    }
}

/// Handler for NAMES.
pub struct NamesHandler;

impl Handler for NamesHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        match msg.arg(0).map(str::to_string) {
            Some(list) => {
                for name in list.split(',') {
                    let folded = irc_to_lower(name);
                    if ctx.matrix.channel(&folded).is_some() {
                        send_names(ctx.matrix, ctx.token, &folded);
                    } else {
                        ctx.matrix.reply(
                            ctx.token,
                            Response::RPL_ENDOFNAMES,
                            vec![name.to_string(), "End of /NAMES list".to_string()],
                        );
                    }
                }
            }
            None => {
                let joined: Vec<String> = ctx.client()?.channels.iter().cloned().collect();
                for folded in joined {
                    send_names(ctx.matrix, ctx.token, &folded);
                }
            }
        }
        Ok(())
    }
}

/// Handler for KICK.
pub struct KickHandler;

impl Handler for KickHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let name = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?.to_string();
        let target = msg.arg(1).ok_or(HandlerError::NeedMoreParams)?.to_string();
        let kicker = ctx.nick();
        let reason = msg.arg(2).unwrap_or(&kicker).to_string();

        let folded = irc_to_lower(&name);
        let (chan_display, is_member, is_op) = {
            let Some(chan) = ctx.matrix.channel(&folded) else {
                return Err(HandlerError::NoSuchChannel(name));
            };
            (
                chan.name.clone(),
                chan.is_member(ctx.token),
                chan.is_op(ctx.token),
            )
        };
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

        let Some(victim) = ctx.matrix.token_by_nick(&target) else {
            return Err(HandlerError::NoSuchNick(target));
        };
        let victim_is_member = ctx
            .matrix
            .channel(&folded)
            .is_some_and(|c| c.is_member(victim));
        if !victim_is_member {
            ctx.matrix.reply(
                ctx.token,
                Response::ERR_USERNOTINCHANNEL,
                vec![target, chan_display, "They aren't on that channel".to_string()],
            );
            return Ok(());
        }

        let victim_nick = ctx
            .matrix
            .client(victim)
            .map(|c| c.display_nick().to_string())
            .unwrap_or(target);
        let prefix = ctx.client()?.prefix();
        info!(channel = %chan_display, target = %victim_nick, by = %kicker, "kick");

        // The target sees its own eviction.
        let kick = Message::with_prefix(prefix, "KICK", vec![chan_display.clone(), victim_nick, reason])
            .trailing();
        ctx.matrix.broadcast_channel(&folded, &kick, None);

        if let Some(chan) = ctx.matrix.channel_mut(&folded) {
            chan.members.remove(&victim);
        }
        if let Some(client) = ctx.matrix.client_mut(victim) {
            client.channels.remove(&folded);
        }
        ctx.matrix.destroy_channel_if_empty(&folded);
        ctx.matrix.ensure_operator(&folded);
        Ok(())
    }
}

/// Handler for INVITE.
pub struct InviteHandler;

impl Handler for InviteHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let target = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?.to_string();
        let name = msg.arg(1).ok_or(HandlerError::NeedMoreParams)?.to_string();

        let Some(invitee) = ctx.matrix.token_by_nick(&target) else {
            return Err(HandlerError::NoSuchNick(target));
        };
        let folded = irc_to_lower(&name);
        let (chan_display, is_member, is_op, invite_only, invitee_on_channel) = {
            let Some(chan) = ctx.matrix.channel(&folded) else {
                return Err(HandlerError::NoSuchChannel(name));
            };
            (
                chan.name.clone(),
                chan.is_member(ctx.token),
                chan.is_op(ctx.token),
                chan.modes.invite_only,
                chan.is_member(invitee),
            )
        };
        if !is_member {
            return Err(HandlerError::NotOnChannel(chan_display));
        }
        if invite_only && !is_op {
            ctx.matrix.reply(
                ctx.token,
                Response::ERR_CHANOPRIVSNEEDED,
                vec![chan_display, "You're not channel operator".to_string()],
            );
            return Ok(());
        }
        if invitee_on_channel {
            ctx.matrix.reply(
                ctx.token,
                Response::ERR_USERONCHANNEL,
                vec![target, chan_display, "is already on channel".to_string()],
            );
            return Ok(());
        }

        let invitee_nick = ctx
            .matrix
            .client(invitee)
            .map(|c| c.display_nick().to_string())
            .unwrap_or(target);

        if let Some(chan) = ctx.matrix.channel_mut(&folded) {
            chan.invited.insert(invitee);
        }
        if let Some(client) = ctx.matrix.client_mut(invitee) {
            client.invited_to.insert(folded.clone());
        }
        debug!(channel = %chan_display, target = %invitee_nick, "invite recorded");

        ctx.matrix.reply(
            ctx.token,
            Response::RPL_INVITING,
            vec![invitee_nick.clone(), chan_display.clone()],
        );
        let prefix = ctx.client()?.prefix();
        let invite =
            Message::with_prefix(prefix, "INVITE", vec![invitee_nick, chan_display]).trailing();
        ctx.matrix.send(invitee, &invite);
        Ok(())
    }
}
