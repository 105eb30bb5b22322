//! Error types for hapsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating a configuration or topology file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// One or more semantic checks failed. Every issue is reported, not just the first.
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.hapsync/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Errors in the desired-state topology that would produce an ambiguous or
/// colliding set of artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("service '{0}' is declared more than once")]
    DuplicateService(String),

    #[error("service '{service}' has more than one route with order {order}")]
    DuplicateOrder { service: String, order: u32 },

    #[error("service '{service}' route {order} targets unknown port alias '{alias}'")]
    UnknownPort {
        service: String,
        order: u32,
        alias: String,
    },

    #[error("invalid service name '{0}'; allowed characters are [A-Za-z0-9_.-]")]
    InvalidName(String),

    #[error("service '{service}' has an invalid {field} value '{value}'")]
    InvalidValue {
        service: String,
        field: &'static str,
        value: String,
    },

    #[error("two artifacts resolve to the same path {0}")]
    DuplicateArtifact(String),
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
