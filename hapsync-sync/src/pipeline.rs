//! Shared entrypoint used by the CLI and the watch daemon.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hapsync_core::config::{
    config_path_at, load_config_at, load_topology_at, topology_path_at,
};
use hapsync_core::{ConfigError, ReconcileConfig, Topology};
use hapsync_remote::{OpenSshConnector, SshSettings};

use crate::error::SyncError;
use crate::reconcile::Synchronizer;

/// Where the config and topology files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPaths {
    pub config: PathBuf,
    pub topology: PathBuf,
}

impl InputPaths {
    /// Explicit paths win; otherwise `~/.hapsync/{config,topology}.yaml`.
    pub fn resolve(config: Option<PathBuf>, topology: Option<PathBuf>) -> Result<Self, SyncError> {
        let home = match (&config, &topology) {
            (Some(_), Some(_)) => PathBuf::new(),
            _ => dirs::home_dir().ok_or(ConfigError::HomeNotFound)?,
        };
        Ok(Self::resolve_at(&home, config, topology))
    }

    pub fn resolve_at(home: &Path, config: Option<PathBuf>, topology: Option<PathBuf>) -> Self {
        InputPaths {
            config: config.unwrap_or_else(|| config_path_at(home)),
            topology: topology.unwrap_or_else(|| topology_path_at(home)),
        }
    }

    /// Load and validate the configuration, then load the topology.
    pub fn load(&self) -> Result<(ReconcileConfig, Topology), SyncError> {
        let config = load_config_at(&self.config)?;
        let topology = load_topology_at(&self.topology)?;
        Ok((config, topology))
    }
}

/// A [`Synchronizer`] talking to the configured host through OpenSSH.
pub fn openssh_synchronizer(config: ReconcileConfig) -> Result<Synchronizer, SyncError> {
    let connector = OpenSshConnector::new(SshSettings::from(&config.remote));
    Synchronizer::new(config, Arc::new(connector))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_paths_override_defaults() {
        let home = Path::new("/home/ops");
        let paths = InputPaths::resolve_at(home, Some(PathBuf::from("/srv/hap.yaml")), None);
        assert_eq!(paths.config, PathBuf::from("/srv/hap.yaml"));
        assert_eq!(paths.topology, PathBuf::from("/home/ops/.hapsync/topology.yaml"));
    }

    #[test]
    fn load_reports_missing_config_first() {
        let dir = TempDir::new().unwrap();
        let paths = InputPaths::resolve_at(dir.path(), None, None);
        let err = paths.load().unwrap_err();
        assert!(matches!(err, SyncError::Config(ConfigError::Io { .. })), "got: {err}");
    }

    #[test]
    fn load_reads_both_files() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.yaml");
        let topology = dir.path().join("topology.yaml");
        std::fs::write(
            &config,
            "remote:\n  host: lb.internal\n  username: deploy\n  directory: /etc/haproxy/conf.d\n\
             http_port: 80\nreload_command: systemctl reload haproxy\n",
        )
        .unwrap();
        std::fs::write(&topology, "services: []\n").unwrap();

        let paths = InputPaths::resolve_at(dir.path(), Some(config), Some(topology));
        let (config, topology) = paths.load().unwrap();
        assert_eq!(config.remote.host, "lb.internal");
        assert!(topology.services.is_empty());
    }
}
