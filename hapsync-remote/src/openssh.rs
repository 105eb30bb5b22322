//! Session backed by the system OpenSSH client.
//!
//! `connect` starts a ControlMaster in the background; every later command
//! and upload is multiplexed over that master's socket, so authentication
//! happens once per session. Password authentication goes through `sshpass`
//! (reading `SSHPASS` from the environment); without a password the client
//! runs in batch mode and relies on keys or an agent.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use hapsync_core::RemoteConfig;

use crate::error::{io_err, RemoteError, SSH_FAILURE_STATUS};
use crate::session::{Connector, RemoteSession};
use crate::shell;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection parameters for [`OpenSshConnector`].
#[derive(Debug, Clone)]
pub struct SshSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub connect_timeout: Duration,
}

impl From<&RemoteConfig> for SshSettings {
    fn from(remote: &RemoteConfig) -> Self {
        SshSettings {
            host: remote.host.clone(),
            port: remote.port,
            username: remote.username.clone(),
            password: remote.password.clone(),
            identity_file: remote.identity_file.clone(),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

impl SshSettings {
    fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }
}

pub struct OpenSshConnector {
    settings: SshSettings,
    ssh_program: PathBuf,
}

impl OpenSshConnector {
    pub fn new(settings: SshSettings) -> Self {
        Self {
            settings,
            ssh_program: PathBuf::from("ssh"),
        }
    }

    /// Use a specific `ssh` binary instead of the one on `$PATH`.
    pub fn with_ssh_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.ssh_program = program.into();
        self
    }

    fn master_command(&self, control_path: &Path) -> Command {
        let s = &self.settings;
        let mut cmd = match &s.password {
            Some(password) => {
                let mut cmd = Command::new("sshpass");
                cmd.arg("-e").arg(&self.ssh_program).env("SSHPASS", password);
                cmd
            }
            None => {
                let mut cmd = Command::new(&self.ssh_program);
                cmd.args(["-o", "BatchMode=yes"]);
                cmd
            }
        };
        cmd.args(["-o", "ControlMaster=yes", "-o", "ControlPersist=yes"])
            .arg("-o")
            .arg(format!("ControlPath={}", control_path.display()))
            .arg("-o")
            .arg(format!("ConnectTimeout={}", s.connect_timeout.as_secs()))
            .arg("-p")
            .arg(s.port.to_string());
        if let Some(identity) = &s.identity_file {
            cmd.arg("-i").arg(identity);
        }
        cmd.args(["-f", "-N"]).arg(s.destination());
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Connector for OpenSshConnector {
    async fn connect(&self) -> Result<Arc<dyn RemoteSession>, RemoteError> {
        let control_dir = tempfile::Builder::new()
            .prefix("hapsync-ssh-")
            .tempdir()
            .map_err(|e| io_err("creating ssh control directory", e))?;
        let control_path = control_dir.path().join("master");
        // The backgrounded master inherits stdio; a pipe here would never reach EOF.
        let log_path = control_dir.path().join("connect.log");
        let log = std::fs::File::create(&log_path)
            .map_err(|e| io_err("creating ssh connect log", e))?;

        tracing::debug!("starting ssh control master for {}", self.settings.host);
        let status = self
            .master_command(&control_path)
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .status()
            .await
            .map_err(|e| RemoteError::Connect {
                host: self.settings.host.clone(),
                reason: format!("cannot spawn ssh client: {e}"),
            })?;
        if !status.success() {
            let reason = std::fs::read_to_string(&log_path).unwrap_or_default();
            return Err(RemoteError::Connect {
                host: self.settings.host.clone(),
                reason: reason.trim().to_string(),
            });
        }

        tracing::info!(
            "connected to {}:{} as {}",
            self.settings.host,
            self.settings.port,
            self.settings.username
        );
        Ok(Arc::new(OpenSshSession {
            settings: self.settings.clone(),
            ssh_program: self.ssh_program.clone(),
            control_path,
            closed: AtomicBool::new(false),
            _control_dir: control_dir,
        }))
    }
}

/// One ControlMaster connection.
///
/// Call [`close`](RemoteSession::close) when done. Dropping an open session
/// still stops the master: inside a tokio runtime the `ssh -O exit` is
/// spawned and left to the runtime to reap, elsewhere it runs to completion.
pub struct OpenSshSession {
    settings: SshSettings,
    ssh_program: PathBuf,
    control_path: PathBuf,
    closed: AtomicBool,
    _control_dir: TempDir,
}

impl OpenSshSession {
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.ssh_program);
        cmd.args(["-o", "ControlMaster=no", "-o", "BatchMode=yes"])
            .arg("-o")
            .arg(format!("ControlPath={}", self.control_path.display()))
            .arg("-p")
            .arg(self.settings.port.to_string())
            .arg(self.settings.destination())
            .arg("--")
            .kill_on_drop(true);
        cmd
    }

    fn ensure_open(&self) -> Result<(), RemoteError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RemoteError::Disconnected);
        }
        Ok(())
    }

    fn check(&self, command: &str, output: std::process::Output) -> Result<String, RemoteError> {
        match output.status.code() {
            Some(0) => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
            Some(SSH_FAILURE_STATUS) | None => Err(RemoteError::Disconnected),
            Some(status) => Err(RemoteError::CommandFailed {
                command: command.to_string(),
                status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    fn exit_command(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.ssh_program);
        cmd.arg("-o")
            .arg(format!("ControlPath={}", self.control_path.display()))
            .args(["-O", "exit"])
            .arg(self.settings.destination())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

#[async_trait]
impl RemoteSession for OpenSshSession {
    async fn exec_shell(&self, command: &str) -> Result<String, RemoteError> {
        self.ensure_open()?;
        tracing::debug!("exec: {}", command.lines().next().unwrap_or_default());
        let output = self
            .command()
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| io_err("spawning ssh", e))?;
        self.check(command, output)
    }

    async fn upload(&self, path: &str, content: &[u8]) -> Result<(), RemoteError> {
        self.ensure_open()?;
        let command = format!("cat > {}", shell::quote(path));
        let mut child = self
            .command()
            .arg(&command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| io_err("spawning ssh", e))?;

        let Some(mut stdin) = child.stdin.take() else {
            return Err(io_err(
                "opening upload stream",
                std::io::Error::other("ssh stdin unavailable"),
            ));
        };
        let mut streamed = stdin.write_all(content).await;
        if streamed.is_ok() {
            streamed = stdin.shutdown().await;
        }
        drop(stdin);

        // A remote `cat` that exits early breaks the pipe; its status explains why.
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| io_err(format!("waiting for upload of {path}"), e))?;
        self.check(&command, output)?;
        streamed.map_err(|e| io_err(format!("streaming {path}"), e))
    }

    async fn close(&self) -> Result<(), RemoteError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let status = Command::from(self.exit_command())
            .status()
            .await
            .map_err(|e| io_err("stopping ssh control master", e))?;
        if !status.success() {
            tracing::debug!("ssh control master for {} was already gone", self.settings.host);
        }
        tracing::info!("disconnected from {}", self.settings.host);
        Ok(())
    }
}

impl Drop for OpenSshSession {
    fn drop(&mut self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if tokio::runtime::Handle::try_current().is_ok() {
            if let Err(err) = Command::from(self.exit_command()).spawn() {
                tracing::debug!("could not stop ssh control master: {err}");
            }
        } else {
            let _ = self.exit_command().status();
        }
    }
}
