#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, SocketAddrV4, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tickftp::Server;
use tickftp::config::ServerConfig;
use tickftp::storage::Storage;
use tickftp::transfer::parse_address_tuple;

/// A server engine ticking on a background thread.
pub struct TestServer {
    pub control: SocketAddr,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        bind_address: "127.0.0.1".to_string(),
        control_port: 0,
        passive_port: 0,
        ..ServerConfig::default()
    }
}

pub fn start_server<S: Storage + 'static>(storage: S, user: &str, pass: &str) -> TestServer {
    start_server_with(test_config(), storage, user, pass)
}

pub fn start_server_with<S: Storage + 'static>(
    config: ServerConfig,
    storage: S,
    user: &str,
    pass: &str,
) -> TestServer {
    let stop = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();
    let user = user.to_string();
    let pass = pass.to_string();

    let flag = Arc::clone(&stop);
    let handle = thread::spawn(move || {
        let mut server = Server::new(config, storage);
        server.begin(&user, &pass).unwrap();
        tx.send(server.control_addr().unwrap()).unwrap();
        while !flag.load(Ordering::SeqCst) {
            server.tick();
            thread::sleep(Duration::from_millis(1));
        }
        server.stop();
    });

    let control = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    TestServer {
        control,
        stop,
        handle: Some(handle),
    }
}

/// A raw FTP control connection.
pub struct Control {
    reader: BufReader<TcpStream>,
}

impl Control {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        Self {
            reader: BufReader::new(stream),
        }
    }

    /// Connects and consumes the greeting.
    pub fn open(addr: SocketAddr) -> Self {
        let mut control = Self::connect(addr);
        let greeting = control.read_reply();
        assert!(greeting.starts_with("220 "), "greeting: {greeting}");
        control
    }

    /// Connects to an open server and consumes greeting and login.
    pub fn login(addr: SocketAddr) -> Self {
        let mut control = Self::open(addr);
        assert_eq!(control.read_reply(), "230 Login successful.");
        control
    }

    pub fn send(&mut self, command: &str) {
        self.reader
            .get_mut()
            .write_all(format!("{}\r\n", command).as_bytes())
            .unwrap();
    }

    pub fn send_raw(&mut self, bytes: &[u8]) {
        self.reader.get_mut().write_all(bytes).unwrap();
    }

    /// Reads one reply, joining the lines of a multi-line reply with `\n`.
    pub fn read_reply(&mut self) -> String {
        let first = self.read_line();
        if first.len() < 4 || first.as_bytes()[3] != b'-' {
            return first;
        }
        let end = format!("{} ", &first[..3]);
        let mut reply = first;
        loop {
            let line = self.read_line();
            let done = line.starts_with(&end);
            reply.push('\n');
            reply.push_str(&line);
            if done {
                return reply;
            }
        }
    }

    fn read_line(&mut self) -> String {
        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).unwrap();
            assert!(n > 0, "control connection closed");
            let line = line.trim_end().to_string();
            if !line.is_empty() {
                return line;
            }
        }
    }

    pub fn command(&mut self, command: &str) -> String {
        self.send(command);
        self.read_reply()
    }

    /// Sends PASV and opens the advertised data connection.
    pub fn passive(&mut self) -> TcpStream {
        let reply = self.command("PASV");
        assert!(reply.starts_with("227 "), "PASV reply: {reply}");
        let open = reply.find('(').unwrap();
        let close = reply.find(')').unwrap();
        let addr: SocketAddrV4 = parse_address_tuple(&reply[open + 1..close]).unwrap();
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream
    }

    /// True once the server has closed the control connection.
    pub fn is_closed(&mut self) -> bool {
        let mut buf = [0u8; 64];
        matches!(self.reader.read(&mut buf), Ok(0))
    }
}

pub fn read_all(mut stream: TcpStream) -> Vec<u8> {
    let mut data = Vec::new();
    stream.read_to_end(&mut data).unwrap();
    data
}

/// Polls `check` for up to five seconds.
pub fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}
