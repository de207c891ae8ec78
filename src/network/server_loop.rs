//! The event loop.
//!
//! Single-threaded and cooperative: the only suspension point is the
//! poller wait. Each iteration accepts, reads and dispatches, runs the
//! liveness tick, flushes pending output, and reaps clients marked for
//! removal.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use irond_proto::{LineOutcome, Message, MessageParseError, Response};
use mio::net::TcpListener;
use mio::{Interest, Token};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::handlers::{Context, Registry};
use crate::liveness::{self, LivenessAction};
use crate::network::Poller;
use crate::state::{Client, Matrix};

const LISTENER: Token = Token(0);
const READ_CHUNK: usize = 4096;

/// The server: listener, poller, shared state, and dispatch table.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    poller: Poller,
    matrix: Matrix,
    registry: Registry,
    next_token: usize,
    password_required: bool,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Bind the listening socket and set up the poller.
    pub fn bind(config: &Config, shutdown: Arc<AtomicBool>) -> io::Result<Server> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let mut listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        let mut poller = Poller::new()?;
        poller.add(&mut listener, LISTENER, Interest::READABLE)?;
        Ok(Server {
            listener,
            local_addr,
            poller,
            matrix: Matrix::new(config),
            registry: Registry::new(),
            next_token: 1,
            password_required: config.password_required(),
            shutdown,
        })
    }

    /// The bound address; useful when the configured port was 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Drive the loop until the shutdown flag is raised.
    pub fn run(&mut self) -> io::Result<()> {
        info!(addr = %self.local_addr, "listening");
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                info!("shutdown signal received");
                return Ok(());
            }

            let budget = self.wait_budget();
            let events = self.poller.wait(Some(budget))?;

            for event in events {
                if event.token == LISTENER {
                    self.accept_pending();
                    continue;
                }
                let token = event.token.0;
                if event.error {
                    self.matrix.mark_for_removal(token, "Connection error");
                    continue;
                }
                if event.readable {
                    self.read_client(token);
                }
                // Write readiness is consumed by the flush pass below.
            }

            self.liveness_tick();
            self.flush_all();
            self.reap();
        }
    }

    /// Poll-wait budget: the nearest liveness deadline, capped at one
    /// second.
    fn wait_budget(&self) -> Duration {
        let now = Instant::now();
        let mut budget = Duration::from_secs(1);
        for client in self.matrix.clients.values() {
            let deadline = liveness::next_deadline(client.last_recv_at, client.ping_sent_at);
            let until = deadline.saturating_duration_since(now);
            if until < budget {
                budget = until;
            }
        }
        budget
    }

    /// Accept until the listener would block.
    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    let token = self.next_token;
                    self.next_token += 1;
                    if let Err(e) = self.poller.add(&mut stream, Token(token), Interest::READABLE)
                    {
                        warn!(%addr, error = %e, "failed to register connection");
                        continue;
                    }
                    info!(%addr, token, "connection accepted");
                    self.matrix
                        .clients
                        .insert(token, Client::new(stream, addr, self.password_required));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    /// Drain the socket into the client's framer, then dispatch every
    /// complete line.
    fn read_client(&mut self, token: usize) {
        let mut chunk = [0u8; READ_CHUNK];
        let mut outcomes = Vec::new();
        let mut terminal: Option<String> = None;
        let now = Instant::now();

        {
            let Some(client) = self.matrix.client_mut(token) else {
                return;
            };
            loop {
                match client.stream.read(&mut chunk) {
                    Ok(0) => {
                        terminal = Some("Client closed connection".to_string());
                        break;
                    }
                    Ok(n) => {
                        client.inbuf.extend(&chunk[..n]);
                        client.touch(now);
                        // Drain after every chunk so the framer only
                        // ever buffers the line-in-progress.
                        while let Some(outcome) = client.inbuf.next_line() {
                            outcomes.push(outcome);
                        }
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        terminal = Some(format!("Read error: {}", e));
                        break;
                    }
                }
            }
        }

        for outcome in outcomes {
            // A line may have closed the connection; the rest of the
            // burst is void.
            let still_here = self
                .matrix
                .client(token)
                .is_some_and(|c| !c.is_quitting() && !c.doomed);
            if !still_here {
                return;
            }
            match outcome {
                LineOutcome::Oversize => {
                    self.matrix.reply(
                        token,
                        Response::ERR_INPUTTOOLONG,
                        vec!["Input line was too long".to_string()],
                    );
                }
                LineOutcome::Line(line) => self.dispatch_line(token, &line),
            }
        }

        if let Some(reason) = terminal {
            self.matrix.mark_for_removal(token, &reason);
        }
    }

    /// Parse one line and run its handler; map failures to numerics.
    fn dispatch_line(&mut self, token: usize, line: &str) {
        let msg: Message = match line.parse() {
            Ok(msg) => msg,
            Err(MessageParseError::Empty) => return,
            Err(MessageParseError::InvalidCommand(cmd)) => {
                debug!(token, command = %cmd, "unparseable command");
                self.matrix.reply(
                    token,
                    Response::ERR_UNKNOWNCOMMAND,
                    vec![cmd, "Unknown command".to_string()],
                );
                return;
            }
        };

        debug!(token, command = %msg.command, "dispatch");
        let mut ctx = Context {
            token,
            matrix: &mut self.matrix,
        };
        if let Err(e) = self.registry.dispatch(&mut ctx, &msg) {
            let nick = self
                .matrix
                .client(token)
                .map(|c| c.display_nick().to_string())
                .unwrap_or_else(|| "*".to_string());
            let server = self.matrix.server_name.clone();
            if let Some(reply) = e.to_reply(&server, &nick, &msg.command) {
                self.matrix.send(token, &reply);
            }
        }
    }

    /// Ping the silent, drop the unresponsive.
    fn liveness_tick(&mut self) {
        let now = Instant::now();
        let mut pings = Vec::new();
        let mut timeouts = Vec::new();
        for (token, client) in &self.matrix.clients {
            if client.doomed {
                continue;
            }
            if client.is_quitting() {
                // A closing client that cannot drain its outbuf does
                // not get to hold the slot forever.
                if now.duration_since(client.last_recv_at) > liveness::PING_GRACE {
                    timeouts.push(*token);
                }
                continue;
            }
            match liveness::decide(client.last_recv_at, client.ping_sent_at, now) {
                Some(LivenessAction::SendPing) => pings.push(*token),
                Some(LivenessAction::Timeout) => timeouts.push(*token),
                None => {}
            }
        }
        for token in pings {
            let ping_token = format!("{:x}", rand::random::<u64>());
            debug!(token, "liveness ping");
            let ping = Message::new("PING", vec![ping_token]).trailing();
            self.matrix.send(token, &ping);
            if let Some(client) = self.matrix.client_mut(token) {
                client.ping_sent_at = Some(now);
            }
        }
        for token in timeouts {
            info!(token, "ping timeout");
            self.matrix.mark_for_removal(token, "Ping timeout");
        }
    }

    /// Opportunistically flush every pending outbuf and keep write
    /// interest registered only while bytes remain.
    fn flush_all(&mut self) {
        let tokens: Vec<usize> = self.matrix.clients.keys().copied().collect();
        for token in tokens {
            self.flush_client(token);
        }
    }

    fn flush_client(&mut self, token: usize) {
        let Some(client) = self.matrix.client_mut(token) else {
            return;
        };
        let mut failed: Option<String> = None;

        while !client.outbuf.is_empty() {
            match client.stream.write(&client.outbuf) {
                Ok(0) => {
                    failed = Some("Write error: zero-length write".to_string());
                    break;
                }
                Ok(n) => {
                    let _ = client.outbuf.split_to(n);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    failed = Some(format!("Write error: {}", e));
                    break;
                }
            }
        }

        let want_write = !client.outbuf.is_empty() && failed.is_none();
        if want_write != client.want_write {
            client.want_write = want_write;
            let interest = if want_write {
                Interest::READABLE | Interest::WRITABLE
            } else {
                Interest::READABLE
            };
            if let Err(e) = self.poller.modify(&mut client.stream, Token(token), interest) {
                warn!(token, error = %e, "failed to adjust interest");
                failed.get_or_insert_with(|| format!("Poller error: {}", e));
            }
        }

        let drained = client.outbuf.is_empty();
        let close_after_flush = client.close_after_flush;
        if let Some(reason) = failed {
            self.matrix.mark_for_removal(token, &reason);
        } else if close_after_flush && drained {
            self.matrix.mark_for_removal(token, "Client quit");
        }
    }

    /// Destroy clients queued for removal. `quit_client` is idempotent,
    /// so clients that already said QUIT do not broadcast twice.
    fn reap(&mut self) {
        while let Some((token, reason)) = self.matrix.next_removal() {
            self.matrix.quit_client(token, &reason);
            if let Some(mut client) = self.matrix.clients.remove(&token) {
                if let Err(e) = self.poller.remove(&mut client.stream) {
                    debug!(token, error = %e, "deregister failed");
                }
                info!(token, reason = %reason, "connection closed");
            }
        }
    }
}
