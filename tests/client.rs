use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tickftp::error::ClientError;
use tickftp::storage::MemoryStorage;
use tickftp::{Credentials, Direction, FtpClient, TransferResult};

/// Plays the server side of a control session from a fixed script.
struct ScriptedServer {
    port: u16,
    handle: JoinHandle<Vec<String>>,
}

enum Step {
    /// Send a reply line.
    Reply(&'static str),
    /// Read one command line.
    Expect(&'static str),
    /// Send a 227 reply for a fresh data listener and keep the listener.
    Passive { zero_ip: bool },
    /// Accept the data connection and read it to the end.
    ReceiveData,
    /// Accept the data connection and send these bytes.
    SendData(Vec<u8>),
    /// Keep every connection open, silently, for a while.
    Hold(Duration),
}

fn scripted_server(script: Vec<Step>) -> ScriptedServer {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let mut reader = BufReader::new(stream);
        let mut data_listener: Option<TcpListener> = None;
        let mut log = Vec::new();

        for step in script {
            match step {
                Step::Reply(line) => {
                    reader
                        .get_mut()
                        .write_all(format!("{}\r\n", line).as_bytes())
                        .unwrap();
                }
                Step::Expect(prefix) => {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    let line = line.trim_end().to_string();
                    assert!(line.starts_with(prefix), "expected {prefix}, got {line}");
                    log.push(line);
                }
                Step::Passive { zero_ip } => {
                    let dl = TcpListener::bind("127.0.0.1:0").unwrap();
                    let p = dl.local_addr().unwrap().port();
                    let ip = if zero_ip { "0,0,0,0" } else { "127,0,0,1" };
                    let reply = format!(
                        "227 Entering Passive Mode ({},{},{}).\r\n",
                        ip,
                        p >> 8,
                        p & 255
                    );
                    reader.get_mut().write_all(reply.as_bytes()).unwrap();
                    data_listener = Some(dl);
                }
                Step::ReceiveData => {
                    let (mut data, _) = data_listener.as_ref().unwrap().accept().unwrap();
                    let mut received = Vec::new();
                    data.read_to_end(&mut received).unwrap();
                    log.push(format!("DATA {}", received.len()));
                    log.push(String::from_utf8_lossy(&received).into_owned());
                }
                Step::SendData(bytes) => {
                    let (mut data, _) = data_listener.as_ref().unwrap().accept().unwrap();
                    data.write_all(&bytes).unwrap();
                }
                Step::Hold(duration) => thread::sleep(duration),
            }
        }
        log
    });

    ScriptedServer { port, handle }
}

fn login_script() -> Vec<Step> {
    vec![
        Step::Reply("220 (fake)"),
        Step::Expect("USER tester"),
        Step::Reply("331 Please specify the password."),
        Step::Expect("PASS s3cret"),
        Step::Reply("230 Login successful."),
        Step::Expect("PASV"),
    ]
}

fn credentials(port: u16) -> Credentials {
    Credentials::new("tester", "s3cret", "127.0.0.1").with_port(port)
}

#[test]
fn test_blocking_put_against_scripted_server() {
    let content: String = (0..10_000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();

    let mut script = login_script();
    script.push(Step::Passive { zero_ip: false });
    script.push(Step::Expect("STOR remote.txt"));
    script.push(Step::ReceiveData);
    script.push(Step::Expect("QUIT"));
    let server = scripted_server(script);

    let storage = MemoryStorage::new();
    storage.insert_file("/local.txt", content.as_bytes());
    let mut client = FtpClient::new(storage);
    client.begin(credentials(server.port));

    let status = client.transfer("/local.txt", "remote.txt", Direction::Put).clone();
    assert_eq!(status.result, TransferResult::Ok, "{:?}", status);
    assert_eq!(client.bytes_transferred(), 10_000);

    let log = server.handle.join().unwrap();
    assert!(log.contains(&"DATA 10000".to_string()));
    assert!(log.contains(&content));
}

#[test]
fn test_non_blocking_get_with_zero_passive_address() {
    let mut script = login_script();
    script.push(Step::Passive { zero_ip: true });
    script.push(Step::Expect("RETR remote.bin"));
    script.push(Step::SendData(vec![9u8; 4000]));
    script.push(Step::Expect("QUIT"));
    let server = scripted_server(script);

    let storage = MemoryStorage::new();
    let mut client = FtpClient::new(storage.clone());
    client.begin(credentials(server.port));

    let status = client.transfer("/copy.bin", "remote.bin", Direction::GetNonBlocking);
    assert_eq!(status.result, TransferResult::InProgress);

    // a second request while busy is refused but the session carries on
    let again = client.transfer("/other.bin", "x", Direction::Get);
    assert_eq!(again.code, ClientError::AlreadyInProgress.code());
    assert_eq!(again.result, TransferResult::InProgress);

    for _ in 0..2000 {
        if client.check().result != TransferResult::InProgress {
            break;
        }
        client.tick();
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(client.check().result, TransferResult::Ok);
    assert_eq!(storage.read_file("/copy.bin"), Some(vec![9u8; 4000]));
    server.handle.join().unwrap();
}

#[test]
fn test_unexpected_reply_ends_in_error() {
    let server = scripted_server(vec![
        Step::Reply("220 (fake)"),
        Step::Expect("USER tester"),
        Step::Reply("530 Not allowed."),
    ]);

    let storage = MemoryStorage::new();
    storage.insert_file("/local.txt", b"data");
    let mut client = FtpClient::new(storage);
    client.begin(credentials(server.port));

    let status = client.transfer("/local.txt", "remote.txt", Direction::Put);
    assert_eq!(status.result, TransferResult::Error);
    assert_eq!(status.code, 530);
    assert_eq!(status.desc, "530 Not allowed.");
    server.handle.join().unwrap();
}

#[test]
fn test_unparseable_passive_reply() {
    let server = scripted_server(vec![
        Step::Reply("220 (fake)"),
        Step::Expect("USER"),
        Step::Reply("331 pw"),
        Step::Expect("PASS"),
        Step::Reply("230 ok"),
        Step::Expect("PASV"),
        Step::Reply("227 Entering Passive Mode (1,2,3)."),
    ]);

    let storage = MemoryStorage::new();
    storage.insert_file("/local.txt", b"data");
    let mut client = FtpClient::new(storage);
    client.begin(credentials(server.port));

    let status = client.transfer("/local.txt", "remote.txt", Direction::Put);
    assert_eq!(status.result, TransferResult::Error);
    assert_eq!(status.failure(), Some(ClientError::ServerResponse));
    server.handle.join().unwrap();
}

#[test]
fn test_stalled_download_times_out() {
    let mut script = login_script();
    script.push(Step::Passive { zero_ip: false });
    script.push(Step::Expect("RETR remote.bin"));
    script.push(Step::Hold(Duration::from_secs(2)));
    let server = scripted_server(script);

    let mut client = FtpClient::new(MemoryStorage::new());
    client.set_timeout(Duration::from_millis(300));
    client.begin(credentials(server.port));

    let status = client.transfer("/copy.bin", "remote.bin", Direction::Get);
    assert_eq!(status.result, TransferResult::Error);
    assert_eq!(status.failure(), Some(ClientError::Timeout));
    assert_eq!(status.desc, "No transfer progress");
    server.handle.join().unwrap();
}

#[test]
fn test_rejected_upload_ends_with_server_code() {
    let mut script = login_script();
    script.push(Step::Passive { zero_ip: false });
    script.push(Step::Expect("STOR remote.txt"));
    script.push(Step::Reply("451 Internal error. Not enough memory."));
    script.push(Step::Hold(Duration::from_millis(500)));
    let server = scripted_server(script);

    let storage = MemoryStorage::new();
    storage.insert_file("/local.txt", &vec![3u8; 8 * 1024 * 1024]);
    let mut client = FtpClient::new(storage);
    client.begin(credentials(server.port));

    let status = client.transfer("/local.txt", "remote.txt", Direction::Put);
    assert_eq!(status.result, TransferResult::Error);
    assert_eq!(status.code, 451);
    assert_eq!(status.desc, "451 Internal error. Not enough memory.");
    server.handle.join().unwrap();
}

#[test]
fn test_missing_greeting_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let storage = MemoryStorage::new();
    storage.insert_file("/local.txt", b"data");
    let mut client = FtpClient::new(storage);
    client.set_timeout(Duration::from_millis(200));
    client.begin(credentials(port));

    let status = client.transfer("/local.txt", "remote.txt", Direction::Put);
    assert_eq!(status.result, TransferResult::Error);
    assert_eq!(status.failure(), Some(ClientError::Timeout));
    assert_eq!(status.desc, "No server greeting");
    drop(listener);
}

#[test]
fn test_begin_not_called() {
    let storage = MemoryStorage::new();
    storage.insert_file("/local.txt", b"data");
    let mut client = FtpClient::new(storage);

    let status = client.transfer("/local.txt", "remote.txt", Direction::Put);
    assert_eq!(status.result, TransferResult::Error);
    assert_eq!(status.failure(), Some(ClientError::Uninitialized));
    assert_eq!(status.desc, "begin() not called");
}

#[test]
fn test_local_file_error() {
    let mut client = FtpClient::new(MemoryStorage::new());
    client.begin(credentials(21));

    let status = client.transfer("/missing.txt", "remote.txt", Direction::Put);
    assert_eq!(status.result, TransferResult::Error);
    assert_eq!(status.failure(), Some(ClientError::LocalFile));
}

#[test]
fn test_connection_refused() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let storage = MemoryStorage::new();
    storage.insert_file("/local.txt", b"data");
    let mut client = FtpClient::new(storage);
    client.begin(credentials(port));

    let status = client.transfer("/local.txt", "remote.txt", Direction::Put);
    assert_eq!(status.result, TransferResult::Error);
    assert_eq!(status.failure(), Some(ClientError::ConnectionFailed));
    assert_eq!(client.bytes_transferred(), 0);
}
