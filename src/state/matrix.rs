//! The Matrix - central registries and delivery primitives.
//!
//! All server state hangs off this struct and is owned by the event
//! loop; handlers borrow it mutably for the duration of one dispatch
//! and look entities up by token or case-folded name on every call
//! rather than holding references across dispatches.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use irond_proto::{irc_to_lower, Message, Prefix, Response};
use tracing::debug;

use crate::config::Config;
use crate::state::{Channel, Client, ClientState};

/// Soft cap on a client's pending output. Exceeding it costs the
/// connection.
pub const MAX_SENDQ_LEN: usize = 64 * 1024;

/// Central shared state: clients by token, nicks and channels by
/// case-folded name.
pub struct Matrix {
    pub server_name: String,
    pub password: Option<String>,
    pub motd: Vec<String>,
    pub created_at: DateTime<Utc>,

    pub clients: HashMap<usize, Client>,
    /// Case-folded nick → token. Covers non-quitting clients only.
    pub nicks: HashMap<String, usize>,
    /// Case-folded name → channel.
    pub channels: HashMap<String, Channel>,

    /// Tokens queued for destruction at the end of the iteration.
    removals: Vec<(usize, String)>,
}

impl Matrix {
    pub fn new(config: &Config) -> Matrix {
        Matrix {
            server_name: config.server_name.clone(),
            password: config.password.clone(),
            motd: config.motd.clone(),
            created_at: Utc::now(),
            clients: HashMap::new(),
            nicks: HashMap::new(),
            channels: HashMap::new(),
            removals: Vec::new(),
        }
    }

    pub fn client(&self, token: usize) -> Option<&Client> {
        self.clients.get(&token)
    }

    pub fn client_mut(&mut self, token: usize) -> Option<&mut Client> {
        self.clients.get_mut(&token)
    }

    /// Resolve a nick (any case) to its token.
    pub fn token_by_nick(&self, nick: &str) -> Option<usize> {
        self.nicks.get(&irc_to_lower(nick)).copied()
    }

    pub fn channel(&self, folded: &str) -> Option<&Channel> {
        self.channels.get(folded)
    }

    pub fn channel_mut(&mut self, folded: &str) -> Option<&mut Channel> {
        self.channels.get_mut(folded)
    }

    /// Append a message to a client's send queue.
    ///
    /// Overflowing the queue marks the recipient for disconnection; the
    /// message that would have overflowed is dropped.
    pub fn send(&mut self, token: usize, msg: &Message) {
        let line = msg.to_string();
        let overflowed = match self.clients.get_mut(&token) {
            Some(client) if !client.doomed => {
                if client.outbuf.len() + line.len() > MAX_SENDQ_LEN {
                    true
                } else {
                    client.outbuf.extend_from_slice(line.as_bytes());
                    false
                }
            }
            _ => return,
        };
        if overflowed {
            self.mark_for_removal(token, "SendQ exceeded");
        }
    }

    /// Send a numeric reply, injecting the recipient's chan_display nick as
    /// the first parameter.
    pub fn reply(&mut self, token: usize, response: Response, params: Vec<String>) {
        let Some(client) = self.clients.get(&token) else {
            return;
        };
        let mut full = Vec::with_capacity(params.len() + 1);
        full.push(client.display_nick().to_string());
        full.extend(params);
        let msg = response.reply(&self.server_name, full);
        self.send(token, &msg);
    }

    /// Like [`reply`](Self::reply) but with the last parameter in
    /// trailing form; for numerics whose final parameter is free text
    /// that may be a single word (topics, name lists).
    pub fn reply_trailing(&mut self, token: usize, response: Response, params: Vec<String>) {
        let Some(client) = self.clients.get(&token) else {
            return;
        };
        let mut full = Vec::with_capacity(params.len() + 1);
        full.push(client.display_nick().to_string());
        full.extend(params);
        let msg = response.reply(&self.server_name, full).trailing();
        self.send(token, &msg);
    }

    /// Queue a client for destruction at the end of the iteration.
    pub fn mark_for_removal(&mut self, token: usize, reason: &str) {
        if let Some(client) = self.clients.get_mut(&token) {
            if client.doomed {
                return;
            }
            client.doomed = true;
            debug!(token, reason, "marked for removal");
            self.removals.push((token, reason.to_string()));
        }
    }

    pub fn next_removal(&mut self) -> Option<(usize, String)> {
        self.removals.pop()
    }

    /// Deliver to every member of a channel, minus `exclude`.
    ///
    /// A recipient whose send queue overflows is marked for removal
    /// without aborting the rest of the broadcast.
    pub fn broadcast_channel(&mut self, folded: &str, msg: &Message, exclude: Option<usize>) {
        let Some(chan) = self.channels.get(folded) else {
            return;
        };
        let tokens = chan.member_tokens();
        for token in tokens {
            if Some(token) == exclude {
                continue;
            }
            self.send(token, msg);
        }
    }

    /// Every other client sharing at least one channel with `token`,
    /// deduplicated, in stable order.
    pub fn channel_peers(&self, token: usize) -> Vec<usize> {
        let Some(client) = self.clients.get(&token) else {
            return Vec::new();
        };
        let mut peers = BTreeSet::new();
        for folded in &client.channels {
            if let Some(chan) = self.channels.get(folded) {
                for t in chan.members.keys() {
                    if *t != token {
                        peers.insert(*t);
                    }
                }
            }
        }
        peers.into_iter().collect()
    }

    /// Take a client out of the shared state: broadcast its QUIT to
    /// every channel peer, drop all memberships (destroying channels
    /// that empty out), release its nick, and clear invites in both
    /// directions. Idempotent; the socket itself is the loop's to
    /// close.
    pub fn quit_client(&mut self, token: usize, reason: &str) {
        let Some(client) = self.clients.get_mut(&token) else {
            return;
        };
        if client.is_quitting() {
            return;
        }
        client.state = ClientState::Quitting;
        let prefix = client.prefix();
        let nick = client.nick.clone();
        let joined: Vec<String> = client.channels.drain().collect();
        let invited: Vec<String> = client.invited_to.drain().collect();

        if let Some(ref nick) = nick {
            self.nicks.remove(&irc_to_lower(nick));
        }

        for folded in &invited {
            if let Some(chan) = self.channels.get_mut(folded) {
                chan.invited.remove(&token);
            }
        }

        let mut peers = BTreeSet::new();
        for folded in &joined {
            if let Some(chan) = self.channels.get_mut(folded) {
                chan.members.remove(&token);
                for t in chan.members.keys() {
                    peers.insert(*t);
                }
            }
        }
        for folded in &joined {
            self.destroy_channel_if_empty(folded);
        }

        let msg = Message::with_prefix(prefix, "QUIT", vec![reason.to_string()]).trailing();
        for peer in peers {
            self.send(peer, &msg);
        }
        for folded in &joined {
            self.ensure_operator(folded);
        }
        debug!(token, nick = ?nick, reason, "client left shared state");
    }

    /// A non-empty channel keeps at least one operator: when the last
    /// op departs, the first remaining member in stable order is
    /// promoted and the promotion is announced as a server MODE.
    pub fn ensure_operator(&mut self, folded: &str) {
        let promote = match self.channels.get(folded) {
            Some(chan) if !chan.members.is_empty() && !chan.members.values().any(|m| m.op) => {
                chan.members.keys().next().copied()
            }
            _ => None,
        };
        let Some(token) = promote else {
            return;
        };

        let Some(chan) = self.channels.get_mut(folded) else {
            return;
        };
        if let Some(modes) = chan.members.get_mut(&token) {
            modes.op = true;
        }
        let chan_display = chan.name.clone();

        let Some(nick) = self.clients.get(&token).and_then(|c| c.nick.clone()) else {
            return;
        };
        debug!(channel = %chan_display, nick = %nick, "operator succession");
        let msg = Message::with_prefix(
            Prefix::ServerName(self.server_name.clone()),
            "MODE",
            vec![chan_display, "+o".to_string(), nick],
        );
        self.broadcast_channel(folded, &msg, None);
    }

    /// Drop a channel once its last member is gone, clearing any
    /// outstanding invites that pointed at it.
    pub fn destroy_channel_if_empty(&mut self, folded: &str) {
        let empty = self
            .channels
            .get(folded)
            .is_some_and(|chan| chan.members.is_empty());
        if !empty {
            return;
        }
        if let Some(chan) = self.channels.remove(folded) {
            for token in chan.invited {
                if let Some(client) = self.clients.get_mut(&token) {
                    client.invited_to.remove(folded);
                }
            }
            debug!(channel = %chan.name, "channel destroyed");
        }
    }
}
