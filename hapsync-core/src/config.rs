//! Reconciliation configuration and YAML loading.
//!
//! # Storage layout
//!
//! ```text
//! ~/.hapsync/
//!   config.yaml     (remote host, ports, reload command)
//!   topology.yaml   (services, routes, nodes)
//! ```
//!
//! # API pattern
//!
//! Every loader has two forms:
//! - `fn_at(path: &Path)`: explicit file; used in tests with `TempDir`
//! - `fn()`: derives the path from `dirs::home_dir()`, delegates to `_at`

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::Topology;

/// Environment variable that overrides `remote.password` when set.
pub const PASSWORD_ENV: &str = "HAPSYNC_PASSWORD";

// ---------------------------------------------------------------------------
// 1. Types
// ---------------------------------------------------------------------------

/// Absolute directory on the remote host that holds every generated artifact.
///
/// Trailing slashes are stripped on construction so that `join` never yields
/// `//` and the directory compares equal to the first line printed by `find`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteDir(String);

impl RemoteDir {
    pub fn new(raw: impl Into<String>) -> Result<Self, String> {
        let raw = raw.into();
        let trimmed = raw.trim_end_matches('/');
        if !raw.starts_with('/') {
            return Err(format!("remote directory '{raw}' must be absolute"));
        }
        if trimmed.is_empty() {
            return Err("remote directory must not be the filesystem root".to_string());
        }
        if trimmed.contains('\n') {
            return Err("remote directory must be a single line".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<dir>/<name>`: pure string join, the remote host may not share our OS.
    pub fn join(&self, name: &str) -> String {
        format!("{}/{}", self.0, name)
    }
}

impl TryFrom<String> for RemoteDir {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RemoteDir> for String {
    fn from(dir: RemoteDir) -> Self {
        dir.0
    }
}

impl fmt::Display for RemoteDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How changed artifacts are transferred to the remote host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Stream bytes through the session's file-upload primitive.
    #[default]
    Stream,
    /// Redirect a here-document into the target path with a shell command.
    Heredoc,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Stream => write!(f, "stream"),
            WriteMode::Heredoc => write!(f, "heredoc"),
        }
    }
}

/// Connection settings for the single remote host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<PathBuf>,
    /// Directory holding the generated artifacts.
    pub directory: RemoteDir,
}

fn default_ssh_port() -> u16 {
    22
}

/// Every recognised configuration value. Read-only for the duration of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    pub remote: RemoteConfig,
    pub http_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_port: Option<u16>,
    #[serde(default)]
    pub force_https: bool,
    /// Directory holding `<domain>/<domain>.pem` bundles on the remote host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_dir: Option<String>,
    pub reload_command: String,
    #[serde(default)]
    pub write_mode: WriteMode,
    /// Local directory of `.tera` files overriding the embedded stanzas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,
}

impl ReconcileConfig {
    /// `true` when plain HTTP only redirects and routing lives on the TLS frontend.
    pub fn redirects_to_https(&self) -> bool {
        self.https_port.is_some() && self.force_https
    }

    /// Semantic validation. serde has already handled syntax.
    ///
    /// Collects all issues so the operator can fix them in one go.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut issues = Vec::new();
        if self.remote.host.trim().is_empty() {
            issues.push("remote.host must not be empty".to_string());
        }
        if self.remote.username.trim().is_empty() {
            issues.push("remote.username must not be empty".to_string());
        }
        if self.remote.port == 0 {
            issues.push("remote.port must be non-zero".to_string());
        }
        if self.http_port == 0 {
            issues.push("http_port must be non-zero".to_string());
        }
        match self.https_port {
            Some(0) => issues.push("https_port must be non-zero".to_string()),
            Some(port) if port == self.http_port => {
                issues.push(format!("https_port {port} collides with http_port"))
            }
            _ => {}
        }
        if self.force_https && self.https_port.is_none() {
            issues.push("force_https requires https_port".to_string());
        }
        if self.reload_command.trim().is_empty() {
            issues.push("reload_command must not be empty".to_string());
        }
        if let Some(dir) = &self.certificate_dir {
            if dir.trim().is_empty() || dir.chars().any(char::is_whitespace) {
                issues.push(format!("certificate_dir '{dir}' is not a usable path"));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }

    /// Apply environment overrides (currently only [`PASSWORD_ENV`]).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            if !password.is_empty() {
                self.remote.password = Some(password);
            }
        }
        self
    }
}

// ---------------------------------------------------------------------------
// 2. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.hapsync/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".hapsync").join("config.yaml")
}

/// `<home>/.hapsync/topology.yaml`: pure, no I/O.
pub fn topology_path_at(home: &Path) -> PathBuf {
    home.join(".hapsync").join("topology.yaml")
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Load, apply env overrides to, and validate a configuration file.
pub fn load_config_at(path: &Path) -> Result<ReconcileConfig, ConfigError> {
    let config: ReconcileConfig = read_yaml(path)?;
    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

/// `load_config_at` convenience wrapper for `~/.hapsync/config.yaml`.
pub fn load_config() -> Result<ReconcileConfig, ConfigError> {
    load_config_at(&config_path_at(&home()?))
}

/// Load a topology file. Structural checks happen at render time.
pub fn load_topology_at(path: &Path) -> Result<Topology, ConfigError> {
    read_yaml(path)
}

/// `load_topology_at` convenience wrapper for `~/.hapsync/topology.yaml`.
pub fn load_topology() -> Result<Topology, ConfigError> {
    load_topology_at(&topology_path_at(&home()?))
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ReconcileConfig {
        ReconcileConfig {
            remote: RemoteConfig {
                host: "lb.internal".to_string(),
                port: 22,
                username: "deploy".to_string(),
                password: None,
                identity_file: None,
                directory: RemoteDir::new("/etc/haproxy/conf.d").unwrap(),
            },
            http_port: 80,
            https_port: None,
            force_https: false,
            certificate_dir: None,
            reload_command: "systemctl reload haproxy".to_string(),
            write_mode: WriteMode::Stream,
            template_dir: None,
        }
    }

    #[test]
    fn remote_dir_strips_trailing_slashes() {
        let dir = RemoteDir::new("/etc/haproxy/conf.d//").unwrap();
        assert_eq!(dir.as_str(), "/etc/haproxy/conf.d");
        assert_eq!(dir.join("frontend.cfg"), "/etc/haproxy/conf.d/frontend.cfg");
    }

    #[test]
    fn remote_dir_rejects_relative_and_root() {
        assert!(RemoteDir::new("conf.d").is_err());
        assert!(RemoteDir::new("/").is_err());
    }

    #[test]
    fn valid_config_passes() {
        config().validate().expect("valid");
    }

    #[test]
    fn validation_reports_every_issue() {
        let mut cfg = config();
        cfg.remote.host = String::new();
        cfg.reload_command = "  ".to_string();
        cfg.force_https = true;
        let err = cfg.validate().unwrap_err();
        let ConfigError::Invalid(issues) = err else {
            panic!("expected Invalid, got {err:?}");
        };
        assert_eq!(issues.len(), 3, "got: {issues:?}");
    }

    #[test]
    fn https_port_must_differ_from_http_port() {
        let mut cfg = config();
        cfg.https_port = Some(80);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn redirect_requires_both_flags() {
        let mut cfg = config();
        cfg.force_https = true;
        assert!(!cfg.redirects_to_https());
        cfg.https_port = Some(443);
        assert!(cfg.redirects_to_https());
    }

    #[test]
    fn write_mode_defaults_to_stream() {
        let yaml = r#"
remote:
  host: lb.internal
  username: deploy
  directory: /etc/haproxy/conf.d/
http_port: 80
reload_command: systemctl reload haproxy
"#;
        let cfg: ReconcileConfig = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(cfg.write_mode, WriteMode::Stream);
        assert_eq!(cfg.remote.port, 22);
        assert_eq!(cfg.remote.directory.as_str(), "/etc/haproxy/conf.d");
    }

    #[test]
    fn config_path_is_correct() {
        let path = config_path_at(Path::new("/home/ops"));
        assert!(path.ends_with(".hapsync/config.yaml"));
    }
}
