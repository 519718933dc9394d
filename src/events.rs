//! Shell hook protocol: line parsing, the inbound queue and the Unix socket
//! listener that feeds it.
//!
//! Lines look like `START <id> <command…>` or `END <id> <exit_code>`. The
//! listener only parses and enqueues; the tick loop drains the queue and is
//! the only thing that touches game state.

use crossbeam_channel::{Receiver, Sender, unbounded};
use std::io::{self, BufRead, BufReader};
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Default socket path the shell hook writes to.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/stack-game.sock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
    Start { id: u64, command: String },
    End { id: u64, exit_code: i32 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty line")]
    Empty,
    #[error("unknown verb `{0}`")]
    UnknownVerb(String),
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("invalid run id `{0}`")]
    InvalidId(String),
    #[error("invalid exit code `{0}`")]
    InvalidExitCode(String),
    #[error("unexpected trailing data `{0}`")]
    TrailingFields(String),
}

/// Split off the first whitespace-delimited field; the rest keeps its inner spacing.
fn next_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(i) => Some((&s[..i], &s[i..])),
        None => Some((s, "")),
    }
}

impl FromStr for CommandEvent {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (verb, rest) = next_field(line).ok_or(ProtocolError::Empty)?;
        match verb {
            "START" => {
                let (id, command) = next_field(rest).ok_or(ProtocolError::MissingField("id"))?;
                let id = id
                    .parse::<u64>()
                    .map_err(|_| ProtocolError::InvalidId(id.to_string()))?;
                let command = command.trim();
                if command.is_empty() {
                    return Err(ProtocolError::MissingField("command"));
                }
                Ok(Self::Start {
                    id,
                    command: command.to_string(),
                })
            }
            "END" => {
                let (id, rest) = next_field(rest).ok_or(ProtocolError::MissingField("id"))?;
                let id = id
                    .parse::<u64>()
                    .map_err(|_| ProtocolError::InvalidId(id.to_string()))?;
                let (code, rest) =
                    next_field(rest).ok_or(ProtocolError::MissingField("exit code"))?;
                let exit_code = code
                    .parse::<i32>()
                    .map_err(|_| ProtocolError::InvalidExitCode(code.to_string()))?;
                let rest = rest.trim();
                if !rest.is_empty() {
                    return Err(ProtocolError::TrailingFields(rest.to_string()));
                }
                Ok(Self::End { id, exit_code })
            }
            other => Err(ProtocolError::UnknownVerb(other.to_string())),
        }
    }
}

/// Receiving end of the inbound event queue. Owned by the tick loop.
#[derive(Debug)]
pub struct EventQueue {
    receiver: Receiver<CommandEvent>,
}

impl EventQueue {
    /// Sender/queue pair. Senders may live on any thread.
    pub fn channel() -> (Sender<CommandEvent>, Self) {
        let (sender, receiver) = unbounded();
        (sender, Self { receiver })
    }

    /// Everything queued so far, in arrival order. Never blocks.
    pub fn drain(&self) -> Vec<CommandEvent> {
        self.receiver.try_iter().collect()
    }
}

/// Handle for the socket listener; removes the socket file when dropped.
#[derive(Debug)]
pub struct EventListener {
    path: PathBuf,
}

impl EventListener {
    /// Bind `path` (replacing a stale socket file) and start accepting hook
    /// connections on a background thread. Each connection gets its own
    /// reader thread.
    pub fn spawn(path: &Path) -> io::Result<(Self, EventQueue)> {
        remove_stale_socket(path)?;
        let listener = UnixListener::bind(path)?;
        let (sender, queue) = EventQueue::channel();
        thread::Builder::new()
            .name("hook-listener".into())
            .spawn(move || accept_loop(&listener, &sender))?;
        info!(path = %path.display(), "listening for shell hook events");
        Ok((
            Self {
                path: path.to_path_buf(),
            },
            queue,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), %err, "failed to remove socket");
            }
        }
    }
}

/// Remove a leftover socket at `path`. Anything that is not a socket, or a
/// socket something still listens on, is left alone and reported as an error.
fn remove_stale_socket(path: &Path) -> io::Result<()> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if !meta.file_type().is_socket() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists and is not a socket", path.display()),
        ));
    }
    if UnixStream::connect(path).is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AddrInUse,
            format!("another process is listening on {}", path.display()),
        ));
    }
    std::fs::remove_file(path)?;
    debug!(path = %path.display(), "removed stale socket");
    Ok(())
}

fn accept_loop(listener: &UnixListener, sender: &Sender<CommandEvent>) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                debug!("hook connected");
                let sender = sender.clone();
                let spawned = thread::Builder::new()
                    .name("hook-client".into())
                    .spawn(move || handle_client(stream, &sender));
                if let Err(err) = spawned {
                    error!(%err, "failed to spawn hook reader");
                }
            }
            Err(err) => warn!(%err, "error accepting hook connection"),
        }
    }
}

fn handle_client(stream: UnixStream, sender: &Sender<CommandEvent>) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(%err, "hook read error");
                break;
            }
        }
        // Command text may not be UTF-8; decode lossily so the line still parses.
        let line = String::from_utf8_lossy(&buf);
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<CommandEvent>() {
            Ok(event) => {
                debug!(?event, "hook event");
                if sender.send(event).is_err() {
                    // Tick loop is gone; nothing left to deliver to.
                    break;
                }
            }
            Err(err) => warn!(%err, line = %line, "dropping malformed hook line"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::{Duration, Instant};

    #[test]
    fn parses_start_with_spaces_in_command() {
        let ev: CommandEvent = "START 12 git commit -m  fix\n".parse().unwrap();
        assert_eq!(
            ev,
            CommandEvent::Start {
                id: 12,
                command: "git commit -m  fix".into()
            }
        );
    }

    #[test]
    fn parses_end() {
        assert_eq!(
            "END 12 0".parse::<CommandEvent>().unwrap(),
            CommandEvent::End { id: 12, exit_code: 0 }
        );
        assert_eq!(
            "END 3 -1\r\n".parse::<CommandEvent>().unwrap(),
            CommandEvent::End { id: 3, exit_code: -1 }
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        let cases = [
            ("", ProtocolError::Empty),
            ("HELLO 1", ProtocolError::UnknownVerb("HELLO".into())),
            ("START", ProtocolError::MissingField("id")),
            ("START 7", ProtocolError::MissingField("command")),
            ("START x ls", ProtocolError::InvalidId("x".into())),
            ("START -1 ls", ProtocolError::InvalidId("-1".into())),
            ("END 1", ProtocolError::MissingField("exit code")),
            ("END one 0", ProtocolError::InvalidId("one".into())),
            ("END 1 ok", ProtocolError::InvalidExitCode("ok".into())),
            ("END 1 0 extra", ProtocolError::TrailingFields("extra".into())),
        ];
        for (line, expected) in cases {
            assert_eq!(line.parse::<CommandEvent>().unwrap_err(), expected, "{line:?}");
        }
    }

    #[test]
    fn queue_drains_in_arrival_order() {
        let (tx, queue) = EventQueue::channel();
        tx.send(CommandEvent::Start { id: 1, command: "ls".into() }).unwrap();
        tx.send(CommandEvent::End { id: 1, exit_code: 0 }).unwrap();
        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], CommandEvent::Start { id: 1, .. }));
        assert!(matches!(drained[1], CommandEvent::End { id: 1, exit_code: 0 }));
        assert!(queue.drain().is_empty());
    }

    fn collect_events(queue: &EventQueue, want: usize) -> Vec<CommandEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while events.len() < want && Instant::now() < deadline {
            events.extend(queue.drain());
            std::thread::sleep(Duration::from_millis(10));
        }
        events
    }

    #[test]
    fn non_utf8_line_does_not_end_the_connection() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hook.sock");
        let (_listener, queue) = EventListener::spawn(&path).expect("bind");

        let mut client = UnixStream::connect(&path).expect("connect");
        client.write_all(b"START 1 cat caf\xe9.txt\n").unwrap();
        client.write_all(b"START 2 ls\nEND 2 0\nEND 1 0\n").unwrap();
        drop(client);

        let events = collect_events(&queue, 4);
        assert_eq!(
            events,
            vec![
                CommandEvent::Start { id: 1, command: "cat caf\u{FFFD}.txt".into() },
                CommandEvent::Start { id: 2, command: "ls".into() },
                CommandEvent::End { id: 2, exit_code: 0 },
                CommandEvent::End { id: 1, exit_code: 0 },
            ]
        );
    }

    #[test]
    fn refuses_to_replace_a_regular_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "keep me").unwrap();
        let err = EventListener::spawn(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");
    }

    #[test]
    fn refuses_a_socket_that_is_still_listening() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hook.sock");
        let (_first, queue) = EventListener::spawn(&path).expect("bind");
        let err = EventListener::spawn(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);

        let mut client = UnixStream::connect(&path).expect("connect");
        writeln!(client, "END 3 0").unwrap();
        drop(client);
        assert_eq!(collect_events(&queue, 1), vec![CommandEvent::End { id: 3, exit_code: 0 }]);
    }

    #[test]
    fn replaces_a_stale_socket() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hook.sock");
        drop(UnixListener::bind(&path).expect("bind stale"));
        assert!(path.exists());
        assert!(EventListener::spawn(&path).is_ok());
    }

    #[test]
    fn socket_lines_arrive_as_events() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hook.sock");
        let (listener, queue) = EventListener::spawn(&path).expect("bind");

        let mut client = UnixStream::connect(&path).expect("connect");
        writeln!(client, "START 4 cargo test").unwrap();
        writeln!(client, "garbage line").unwrap();
        writeln!(client, "END 4 101").unwrap();
        drop(client);

        assert_eq!(
            collect_events(&queue, 2),
            vec![
                CommandEvent::Start { id: 4, command: "cargo test".into() },
                CommandEvent::End { id: 4, exit_code: 101 },
            ]
        );

        drop(listener);
        assert!(!path.exists());
    }
}
