//! Shared harness for integration tests: an in-process server on an
//! ephemeral port plus a blocking line-oriented test client.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use irond::config::Config;
use irond::network::Server;

/// The event loop running on a background thread.
pub struct TestServer {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Spawn with no password required.
    pub fn spawn() -> TestServer {
        Self::spawn_with_password(None)
    }

    /// Spawn with the given connection password.
    pub fn spawn_with_password(password: Option<&str>) -> TestServer {
        let mut config = Config::from_args(["0".to_string()]).expect("test config");
        config.password = password.map(str::to_string);

        let shutdown = Arc::new(AtomicBool::new(false));
        let mut server = Server::bind(&config, Arc::clone(&shutdown)).expect("bind test server");
        let addr = server.local_addr();
        let handle = std::thread::spawn(move || {
            let _ = server.run();
        });

        TestServer {
            addr,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Blocking client speaking raw protocol lines.
pub struct TestClient {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl TestClient {
    pub fn connect(server: &TestServer) -> TestClient {
        let stream = TcpStream::connect(server.addr()).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("read timeout");
        let _ = stream.set_nodelay(true);
        let reader = BufReader::new(stream.try_clone().expect("clone stream"));
        TestClient { stream, reader }
    }

    /// Send one line; the CRLF is appended here.
    pub fn send(&mut self, line: &str) {
        self.stream
            .write_all(line.as_bytes())
            .and_then(|_| self.stream.write_all(b"\r\n"))
            .expect("send line");
    }

    /// Send a line without caring whether the peer is still there.
    pub fn try_send(&mut self, line: &str) {
        let _ = self
            .stream
            .write_all(line.as_bytes())
            .and_then(|_| self.stream.write_all(b"\r\n"));
    }

    /// Receive one line, or `None` on timeout or EOF.
    pub fn recv(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end().to_string()),
            Err(_) => None,
        }
    }

    /// Read lines until one matches, returning it. Panics with the
    /// message on deadline.
    pub fn recv_until<F>(&mut self, what: &str, pred: F) -> String
    where
        F: Fn(&str) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(line) = self.recv() {
                if pred(&line) {
                    return line;
                }
            }
        }
        panic!("timed out waiting for {}", what);
    }

    /// Discard whatever is pending.
    pub fn drain(&mut self) -> Vec<String> {
        let _ = self
            .stream
            .set_read_timeout(Some(Duration::from_millis(150)));
        let mut lines = Vec::new();
        while let Some(line) = self.recv() {
            lines.push(line);
        }
        let _ = self.stream.set_read_timeout(Some(Duration::from_secs(2)));
        lines
    }

    /// True once the server closes the socket.
    pub fn wait_closed(&mut self) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut line = String::new();
        while Instant::now() < deadline {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return true,
                Ok(_) => continue,
                Err(_) => continue,
            }
        }
        false
    }

    /// NICK + USER, waiting out the welcome burst.
    pub fn register(&mut self, nick: &str) {
        self.send(&format!("NICK {}", nick));
        self.send(&format!("USER {} 0 * :{}", nick, nick));
        self.recv_until("end of MOTD", |l| l.contains(" 376 "));
    }

    /// PASS + NICK + USER, waiting out the welcome burst.
    pub fn register_with_pass(&mut self, nick: &str, password: &str) {
        self.send(&format!("PASS {}", password));
        self.register(nick);
    }

    /// JOIN and wait for the names burst.
    pub fn join(&mut self, channel: &str) {
        self.send(&format!("JOIN {}", channel));
        self.recv_until("end of NAMES", |l| l.contains(" 366 "));
    }
}
