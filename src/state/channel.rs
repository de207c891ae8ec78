//! Channel state.

use std::collections::{BTreeMap, HashSet};

/// Per-member channel privileges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemberModes {
    /// Channel operator (`@`).
    pub op: bool,
}

impl MemberModes {
    /// Prefix character shown in NAMES replies.
    pub fn prefix_char(&self) -> Option<char> {
        if self.op { Some('@') } else { None }
    }
}

/// Channel topic with its provenance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topic {
    pub text: String,
    pub set_by: String,
    pub set_at: i64,
}

/// Mode flags settable via MODE.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelModes {
    /// `+i` - JOIN requires a prior INVITE.
    pub invite_only: bool,
    /// `+t` - TOPIC restricted to operators.
    pub topic_lock: bool,
    /// `+k` - key required to JOIN. Non-empty when set.
    pub key: Option<String>,
    /// `+l` - member count cap. At least 1 when set.
    pub limit: Option<u32>,
}

impl ChannelModes {
    /// Render for RPL_CHANNELMODEIS: the flag string and its arguments.
    pub fn mode_string(&self) -> (String, Vec<String>) {
        let mut flags = String::from("+");
        let mut args = Vec::new();
        if self.invite_only {
            flags.push('i');
        }
        if self.topic_lock {
            flags.push('t');
        }
        if let Some(ref key) = self.key {
            flags.push('k');
            args.push(key.clone());
        }
        if let Some(limit) = self.limit {
            flags.push('l');
            args.push(limit.to_string());
        }
        (flags, args)
    }
}

/// A named conversation.
///
/// Members are keyed by client token in a `BTreeMap` so broadcast order
/// is stable. A channel with no members does not exist; the registry
/// destroys it on the last PART/KICK/QUIT.
pub struct Channel {
    /// Display-case name (`#` or `&` prefixed).
    pub name: String,
    pub topic: Option<Topic>,
    pub modes: ChannelModes,
    /// Token → membership privileges.
    pub members: BTreeMap<usize, MemberModes>,
    /// Tokens holding an outstanding invite.
    pub invited: HashSet<usize>,
}

impl Channel {
    pub fn new(name: &str) -> Channel {
        Channel {
            name: name.to_string(),
            topic: None,
            modes: ChannelModes::default(),
            members: BTreeMap::new(),
            invited: HashSet::new(),
        }
    }

    pub fn is_member(&self, token: usize) -> bool {
        self.members.contains_key(&token)
    }

    pub fn is_op(&self, token: usize) -> bool {
        self.members.get(&token).is_some_and(|m| m.op)
    }

    /// Member tokens in broadcast order.
    pub fn member_tokens(&self) -> Vec<usize> {
        self.members.keys().copied().collect()
    }
}
