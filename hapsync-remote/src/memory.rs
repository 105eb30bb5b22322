//! In-memory remote host.
//!
//! Emulates the handful of commands the synchronizer issues (`mkdir -p`,
//! `find`, `sha256sum`, `cat`, here-document redirects) against a map of
//! files, and records every operation in a journal. Used by tests and for
//! offline rehearsals; any other shell command is recorded and succeeds.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use hapsync_core::fingerprint::fingerprint;

use crate::error::RemoteError;
use crate::session::{Connector, RemoteSession};
use crate::shell;

#[derive(Debug, Default)]
struct HostState {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    journal: Vec<String>,
    failures: Vec<String>,
    delays: Vec<(String, Duration)>,
    refuse_connections: bool,
    generation: u64,
    connects: usize,
}

/// Shared handle to a fake host. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    state: Arc<Mutex<HostState>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a file (and its parent directory) without journaling.
    pub fn put_file(&self, path: &str, content: impl Into<Vec<u8>>) {
        let mut state = self.lock();
        if let Some((dir, _)) = path.rsplit_once('/') {
            state.dirs.insert(dir.to_string());
        }
        state.files.insert(path.to_string(), content.into());
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.lock()
            .files
            .get(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn paths(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    /// Every operation issued since creation, in order.
    pub fn journal(&self) -> Vec<String> {
        self.lock().journal.clone()
    }

    /// Number of journal entries starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.lock()
            .journal
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }

    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }

    /// Make every operation whose journal entry starts with `prefix` fail.
    pub fn fail_when(&self, prefix: impl Into<String>) {
        self.lock().failures.push(prefix.into());
    }

    /// Make uploads whose journal entry starts with `prefix` take `delay`.
    ///
    /// The target is truncated when the upload starts and filled when it
    /// finishes, like `cat > path`, so an abandoned upload leaves it empty.
    pub fn delay_when(&self, prefix: impl Into<String>, delay: Duration) {
        self.lock().delays.push((prefix.into(), delay));
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.lock().refuse_connections = refuse;
    }

    /// Invalidate every open session, as if the network dropped.
    pub fn drop_sessions(&self) {
        self.lock().generation += 1;
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }
}

#[async_trait]
impl Connector for MemoryHost {
    async fn connect(&self) -> Result<Arc<dyn RemoteSession>, RemoteError> {
        let mut state = self.lock();
        if state.refuse_connections {
            return Err(RemoteError::Connect {
                host: "memory".to_string(),
                reason: "connection refused".to_string(),
            });
        }
        state.connects += 1;
        Ok(Arc::new(MemorySession {
            host: self.clone(),
            generation: state.generation,
            closed: AtomicBool::new(false),
        }))
    }
}

/// A session on a [`MemoryHost`].
pub struct MemorySession {
    host: MemoryHost,
    generation: u64,
    closed: AtomicBool,
}

impl MemorySession {
    /// Check liveness, journal `entry`, and apply injected failures.
    fn begin(&self, entry: &str) -> Result<MutexGuard<'_, HostState>, RemoteError> {
        let mut state = self.host.lock();
        if self.closed.load(Ordering::SeqCst) || state.generation != self.generation {
            return Err(RemoteError::Disconnected);
        }
        state.journal.push(entry.to_string());
        if state.failures.iter().any(|prefix| entry.starts_with(prefix)) {
            return Err(failed(entry, 1, "injected failure"));
        }
        Ok(state)
    }
}

#[async_trait]
impl RemoteSession for MemorySession {
    async fn exec(&self, program: &str, args: &[&str]) -> Result<String, RemoteError> {
        let line = shell::join_argv(program, args);
        let mut state = self.begin(&line)?;
        match (program, args) {
            ("mkdir", ["-p", dir]) => {
                state.dirs.insert(dir.trim_end_matches('/').to_string());
                Ok(String::new())
            }
            ("find", [dir]) => {
                let dir = dir.trim_end_matches('/');
                let prefix = format!("{dir}/");
                let children: Vec<&String> = state
                    .files
                    .keys()
                    .filter(|path| path.starts_with(&prefix))
                    .collect();
                if !state.dirs.contains(dir) && children.is_empty() {
                    return Err(failed(&line, 1, "No such file or directory"));
                }
                let mut out = format!("{dir}\n");
                for path in children {
                    out.push_str(path);
                    out.push('\n');
                }
                Ok(out)
            }
            ("sha256sum", [path]) => match state.files.get(*path) {
                Some(bytes) => Ok(format!("{}  {path}\n", fingerprint(bytes))),
                None => Err(failed(&line, 1, "No such file or directory")),
            },
            ("cat", [path]) => match state.files.get(*path) {
                Some(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
                None => Err(failed(&line, 1, "No such file or directory")),
            },
            _ => Err(failed(&line, 127, "command not found")),
        }
    }

    async fn exec_shell(&self, command: &str) -> Result<String, RemoteError> {
        let mut state = self.begin(command)?;
        if let Some((path, bytes)) = parse_heredoc(command) {
            state.files.insert(path, bytes);
        }
        Ok(String::new())
    }

    async fn upload(&self, path: &str, content: &[u8]) -> Result<(), RemoteError> {
        let entry = format!("upload {path}");
        let delay = {
            let mut state = self.begin(&entry)?;
            let delay = state
                .delays
                .iter()
                .find(|(prefix, _)| entry.starts_with(prefix.as_str()))
                .map(|(_, delay)| *delay);
            match delay {
                Some(_) => state.files.insert(path.to_string(), Vec::new()),
                None => state.files.insert(path.to_string(), content.to_vec()),
            };
            delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
            self.host.lock().files.insert(path.to_string(), content.to_vec());
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), RemoteError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.host.lock().journal.push("close".to_string());
        }
        Ok(())
    }
}

fn failed(command: &str, status: i32, stderr: &str) -> RemoteError {
    RemoteError::CommandFailed {
        command: command.to_string(),
        status,
        stderr: stderr.to_string(),
    }
}

/// Understands the two redirect forms written by a here-document writer:
///
/// ```text
/// cat <<'DELIM' > '<path>'\n<content>DELIM
/// head -c <len> <<'DELIM' > '<path>'\n<content>\nDELIM
/// ```
fn parse_heredoc(command: &str) -> Option<(String, Vec<u8>)> {
    let (header, body) = command.split_once('\n')?;
    let (head, rest) = header.split_once(" <<'")?;
    let (delimiter, target) = rest.split_once("' > ")?;
    let body = body.strip_suffix(delimiter)?;
    let path = unquote(target)?;

    let bytes = if head == "cat" {
        body.as_bytes().to_vec()
    } else {
        let len: usize = head.strip_prefix("head -c ")?.parse().ok()?;
        body.as_bytes().get(..len)?.to_vec()
    };
    Some((path, bytes))
}

fn unquote(word: &str) -> Option<String> {
    if !word.starts_with('\'') {
        return Some(word.to_string());
    }
    let inner = word.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace(r"'\''", "'"))
}
