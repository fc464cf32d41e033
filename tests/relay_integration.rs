//! End-to-end tests over loopback TCP.
//!
//! Every test starts its own server on an ephemeral port and drives it
//! either with a raw session or with the interactive client loop.
#![cfg(unix)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shell_relay::execution::{ShellSpawner, Spawn, SpawnFailure};
use shell_relay::input::ScriptedInput;
use shell_relay::protocol::{ResponseTracker, FORK_FAILED};
use shell_relay::{
    Client, ClientExit, CommandExecutor, InputReader, InterruptFlag, Received, Server,
    ServerConfig, Session, CHUNK_SIZE,
};
use tokio::process::Child;
use tokio::task::JoinHandle;

const TIMEOUT: Duration = Duration::from_secs(10);

struct RunningServer {
    addr: SocketAddr,
    interrupt: InterruptFlag,
    handle: JoinHandle<shell_relay::Result<()>>,
}

impl RunningServer {
    async fn stop(self) -> shell_relay::Result<()> {
        self.interrupt.set();
        tokio::time::timeout(TIMEOUT, self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
    }
}

fn start(server: Server) -> RunningServer {
    let addr = server.local_addr().unwrap();
    let interrupt = InterruptFlag::new();
    let handle = tokio::spawn(server.run(interrupt.clone()));
    RunningServer {
        addr,
        interrupt,
        handle,
    }
}

fn loopback_server() -> Server {
    Server::bind(&ServerConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)).unwrap()
}

async fn request(session: &mut Session, command: &str) -> ResponseTracker {
    session.send_all(command.as_bytes()).await.unwrap();

    let mut tracker = ResponseTracker::new();
    tokio::time::timeout(TIMEOUT, async {
        loop {
            match session.recv_chunk(CHUNK_SIZE).await.unwrap() {
                Received::Data(bytes) => {
                    if tracker.push(&bytes) {
                        break;
                    }
                }
                Received::EndOfStream => panic!("server closed the session"),
            }
        }
    })
    .await
    .expect("no complete response");
    tracker
}

/// Fails with EAGAIN on the first spawn, then behaves like the shell.
struct FailOnceSpawner {
    failed: AtomicBool,
    shell: ShellSpawner,
}

impl Spawn for FailOnceSpawner {
    fn spawn(&self, command_line: &str) -> Result<Child, SpawnFailure> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            return Err(SpawnFailure::from_io(std::io::Error::from_raw_os_error(
                libc::EAGAIN,
            )));
        }
        self.shell.spawn(command_line)
    }
}

// ============================================================================
// Protocol
// ============================================================================

#[tokio::test]
async fn test_echo_hello() {
    let server = start(loopback_server());
    let mut session = Session::open(server.addr).await.unwrap();

    let response = request(&mut session, "echo hello").await;
    assert_eq!(response.output(), b"hello\n");
    assert!(!response.is_spawn_failure());

    session.close().await;
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_sequential_commands_keep_order() {
    let server = start(loopback_server());
    let mut session = Session::open(server.addr).await.unwrap();

    let first = request(&mut session, "echo a").await;
    let second = request(&mut session, "echo b").await;
    assert_eq!(first.output(), b"a\n");
    assert_eq!(second.output(), b"b\n");

    session.close().await;
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_stderr_is_not_relayed() {
    let server = start(loopback_server());
    let mut session = Session::open(server.addr).await.unwrap();

    let response = request(&mut session, "echo out; echo err 1>&2; exit 4").await;
    assert_eq!(response.output(), b"out\n");

    session.close().await;
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_fork_failure_then_session_continues() {
    let spawner = FailOnceSpawner {
        failed: AtomicBool::new(false),
        shell: ShellSpawner::default(),
    };
    let server = start(loopback_server().with_executor(CommandExecutor::new(Arc::new(spawner))));
    let mut session = Session::open(server.addr).await.unwrap();

    let failed = request(&mut session, "echo first").await;
    assert!(failed.is_spawn_failure());
    assert_eq!(failed.output(), FORK_FAILED);

    let next = request(&mut session, "echo second").await;
    assert_eq!(next.output(), b"second\n");

    session.close().await;
    server.stop().await.unwrap();
}

// ============================================================================
// Connection lifecycle
// ============================================================================

#[tokio::test]
async fn test_reconnect_after_disconnect() {
    let server = start(loopback_server());

    let mut first = Session::open(server.addr).await.unwrap();
    request(&mut first, "true").await;
    first.close().await;

    let mut second = Session::open(server.addr).await.unwrap();
    let response = request(&mut second, "echo again").await;
    assert_eq!(response.output(), b"again\n");

    second.close().await;
    server.stop().await.unwrap();
}

/// In-memory log sink shared with the fmt subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_peer_disconnect_is_not_logged_as_error() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    // Current-thread test runtime, so the server task logs through this default.
    let _guard = tracing::subscriber::set_default(subscriber);

    let server = start(loopback_server());

    let mut session = Session::open(server.addr).await.unwrap();
    request(&mut session, "echo hi").await;
    session.close().await;

    // The loop is back to accepting after the disconnect.
    let mut again = Session::open(server.addr).await.unwrap();
    request(&mut again, "true").await;
    again.close().await;

    tokio::time::timeout(TIMEOUT, async {
        while logs.contents().matches("Client disconnected").count() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("server never saw both disconnects");
    server.stop().await.unwrap();

    let logs = logs.contents();
    assert!(!logs.contains("ERROR"), "{logs}");
}

#[tokio::test]
async fn test_interrupt_while_connected() {
    let server = start(loopback_server());
    let mut session = Session::open(server.addr).await.unwrap();
    request(&mut session, "true").await;

    // Server is now blocked waiting for the next line.
    let addr = server.addr;
    server.stop().await.unwrap();

    let received = tokio::time::timeout(TIMEOUT, session.recv_chunk(CHUNK_SIZE))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, Received::EndOfStream);

    // The listener is gone with the server.
    assert!(Session::open(addr).await.is_err());
}

#[tokio::test]
async fn test_interrupt_during_command() {
    let server = start(loopback_server());
    let mut session = Session::open(server.addr).await.unwrap();
    session.send_all(b"sleep 30").await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    server.stop().await.unwrap();
}

// ============================================================================
// Interactive client
// ============================================================================

#[tokio::test]
async fn test_client_session_output() {
    let server = start(loopback_server());

    let mut client = Client::connect(server.addr, Vec::new()).await.unwrap();
    let mut input = InputReader::spawn(|| {
        Ok(ScriptedInput::new(["echo hello", "", "echo world", "quit"]))
    })
    .await
    .unwrap();

    let exit = tokio::time::timeout(TIMEOUT, client.run(&mut input, &InterruptFlag::new()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exit, ClientExit::Quit);
    input.close().await;

    let out = String::from_utf8(client.into_output()).unwrap();
    let hello = out
        .find("Received: hello\nCommand executed.\n")
        .expect("missing first response");
    let world = out
        .find("Received: world\nCommand executed.\n")
        .expect("missing second response");
    assert!(hello < world);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_client_stays_in_step_after_failure_lookalike_output() {
    let server = start(loopback_server());

    let mut client = Client::connect(server.addr, Vec::new()).await.unwrap();
    let mut input = InputReader::spawn(|| {
        Ok(ScriptedInput::new(["printf 'Fork failed'", "echo next", "quit"]))
    })
    .await
    .unwrap();

    let exit = tokio::time::timeout(TIMEOUT, client.run(&mut input, &InterruptFlag::new()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exit, ClientExit::Quit);
    input.close().await;

    let out = String::from_utf8(client.into_output()).unwrap();
    assert!(out.starts_with("Received: Fork failed"));
    assert!(out.ends_with("Received: next\nCommand executed.\n"));
    assert_eq!(out.matches("Command executed.\n").count(), 2);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_client_sees_server_shutdown() {
    let server = start(loopback_server());
    let mut client = Client::connect(server.addr, Vec::new()).await.unwrap();
    let mut input = InputReader::spawn(|| Ok(ScriptedInput::new(["echo one", "echo two"])))
        .await
        .unwrap();

    // Let the client connect before shutting the server down.
    tokio::time::sleep(Duration::from_millis(50)).await;
    server.stop().await.unwrap();

    let result = tokio::time::timeout(TIMEOUT, client.run(&mut input, &InterruptFlag::new()))
        .await
        .unwrap();
    match result {
        // Closed connection observed on receive.
        Ok(exit) => assert_eq!(exit, ClientExit::ServerDisconnected),
        // Or the send hit the reset socket.
        Err(e) => assert!(e.is_transport()),
    }
}

#[tokio::test]
async fn test_client_interrupt_while_waiting_for_input() {
    struct Blocked;

    impl shell_relay::LineSource for Blocked {
        fn read_line(&mut self, _prompt: &str) -> shell_relay::Result<shell_relay::InputEvent> {
            std::thread::sleep(Duration::from_secs(60));
            Ok(shell_relay::InputEvent::EndOfInput)
        }
    }

    let server = start(loopback_server());
    let mut client = Client::connect(server.addr, Vec::new()).await.unwrap();
    let mut input = InputReader::spawn(|| Ok(Blocked)).await.unwrap();

    let interrupt = InterruptFlag::new();
    let setter = interrupt.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        setter.set();
    });

    let exit = tokio::time::timeout(TIMEOUT, client.run(&mut input, &interrupt))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exit, ClientExit::Interrupted);
    input.close().await;

    server.stop().await.unwrap();
}
