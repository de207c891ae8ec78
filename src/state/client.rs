//! Per-connection client state.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Instant;

use bytes::BytesMut;
use irond_proto::{LineBuffer, Prefix};
use mio::net::TcpStream;

/// Where a connection stands in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    /// Connected; PASS not yet supplied.
    AwaitingPass,
    /// Password settled; waiting for NICK and USER.
    AwaitingNickUser,
    /// Fully registered.
    Registered,
    /// On the way out; no further commands are processed.
    Quitting,
}

/// One connected client.
///
/// The client owns its socket exclusively; the poller holds only the
/// token. Channel membership is tracked by case-folded channel *name*,
/// never by reference, so clients and channels cannot form cycles.
pub struct Client {
    pub stream: TcpStream,
    pub addr: SocketAddr,
    /// Hostname shown in this client's prefix; the peer address.
    pub host: String,

    pub state: ClientState,
    pub nick: Option<String>,
    pub user: Option<String>,
    pub realname: Option<String>,
    /// True once a correct PASS arrived, or from the start when the
    /// server has no password.
    pub password_ok: bool,
    /// CAP LS was seen before registration completed; the welcome burst
    /// waits for CAP END.
    pub cap_negotiating: bool,

    pub inbuf: LineBuffer,
    pub outbuf: BytesMut,
    /// Write offset tracking is implicit: flushed bytes are split off
    /// the front of `outbuf`.
    pub want_write: bool,

    pub last_recv_at: Instant,
    pub ping_sent_at: Option<Instant>,

    /// Case-folded names of joined channels.
    pub channels: HashSet<String>,
    /// Case-folded names of channels with an outstanding invite.
    pub invited_to: HashSet<String>,

    /// Close the socket once the outbuf drains.
    pub close_after_flush: bool,
    /// Already queued for removal; no further writes are enqueued.
    pub doomed: bool,
}

impl Client {
    pub fn new(stream: TcpStream, addr: SocketAddr, password_required: bool) -> Client {
        Client {
            stream,
            addr,
            host: addr.ip().to_string(),
            state: ClientState::AwaitingPass,
            nick: None,
            user: None,
            realname: None,
            password_ok: !password_required,
            cap_negotiating: false,
            inbuf: LineBuffer::new(),
            outbuf: BytesMut::new(),
            want_write: false,
            last_recv_at: Instant::now(),
            ping_sent_at: None,
            channels: HashSet::new(),
            invited_to: HashSet::new(),
            close_after_flush: false,
            doomed: false,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.state == ClientState::Registered
    }

    pub fn is_quitting(&self) -> bool {
        self.state == ClientState::Quitting
    }

    /// Nick for reply targets; `*` until one is set.
    pub fn display_nick(&self) -> &str {
        self.nick.as_deref().unwrap_or("*")
    }

    /// `nick!user@host` prefix for messages originated by this client.
    pub fn prefix(&self) -> Prefix {
        Prefix::Nickname(
            self.nick.clone().unwrap_or_else(|| "*".to_string()),
            self.user.clone().unwrap_or_else(|| "unknown".to_string()),
            self.host.clone(),
        )
    }

    /// Record inbound activity for the liveness tracker.
    pub fn touch(&mut self, now: Instant) {
        self.last_recv_at = now;
        self.ping_sent_at = None;
    }
}
