//! Reconciliation pass.
//!
//! ## Pass structure
//!
//! 1. Build every artifact locally (validates topology and config; no I/O).
//! 2. Acquire the session.
//! 3. Ensure the remote directory exists and take its inventory. Planning
//!    only lists it, so a missing directory reads as empty.
//! 4. Per artifact, concurrently: compare fingerprints, write if needed.
//!    Every write settles before the first failure is reported; completed
//!    writes are kept.
//! 5. Run the reload command once if anything was written.
//!
//! A connection-class failure at any step drops the cached session so the
//! next pass reconnects.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;

use hapsync_core::{ReconcileConfig, Topology};
use hapsync_remote::{Connector, RemoteSession};
use hapsync_renderer::{Artifact, ArtifactSet, ConfigBuilder};

use crate::connection::ConnectionManager;
use crate::diff::{remote_diff, should_write, FileDiff};
use crate::error::SyncError;
use crate::inventory::RemoteInventory;
use crate::writer::{writer_for, ArtifactWriter, WriteResult};

/// Summary of one pass.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub started_at: DateTime<Utc>,
    /// Frontend first, then backends in build order.
    pub writes: Vec<WriteResult>,
    pub reloaded: bool,
    /// Remote entries in the directory that this pass did not produce.
    pub orphans: Vec<String>,
    pub duration_ms: u64,
}

impl ReconcileReport {
    pub fn written(&self) -> usize {
        self.writes.iter().filter(|w| w.is_written()).count()
    }

    /// Whether applying this pass would change anything on the host.
    pub fn has_changes(&self) -> bool {
        self.writes
            .iter()
            .any(|w| !matches!(w, WriteResult::Unchanged { .. }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Apply,
    Plan,
}

/// Drives passes against one remote host.
pub struct Synchronizer {
    config: ReconcileConfig,
    builder: ConfigBuilder,
    writer: Box<dyn ArtifactWriter>,
    connections: ConnectionManager,
}

impl Synchronizer {
    pub fn new(config: ReconcileConfig, connector: Arc<dyn Connector>) -> Result<Self, SyncError> {
        Ok(Self {
            builder: ConfigBuilder::for_config(&config)?,
            writer: writer_for(config.write_mode),
            connections: ConnectionManager::new(connector),
            config,
        })
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Render artifacts without touching the remote host.
    pub fn render(&self, topology: &Topology) -> Result<ArtifactSet, SyncError> {
        Ok(self.builder.build(topology, &self.config)?)
    }

    /// Bring the remote directory in line with `topology`, reloading once if
    /// anything changed.
    pub async fn reconcile(&self, topology: &Topology) -> Result<ReconcileReport, SyncError> {
        self.run(topology, Mode::Apply).await
    }

    /// Same as [`reconcile`](Self::reconcile) but reports
    /// [`WriteResult::WouldWrite`] instead of writing, and never reloads.
    pub async fn plan(&self, topology: &Topology) -> Result<ReconcileReport, SyncError> {
        self.run(topology, Mode::Plan).await
    }

    /// Unified diffs of every artifact whose remote copy differs.
    pub async fn diff(&self, topology: &Topology) -> Result<Vec<FileDiff>, SyncError> {
        let artifacts = self.render(topology)?;
        let result = self.collect_diffs(&artifacts).await;
        self.discard_if_broken(result).await
    }

    /// Close the session, if one is open.
    pub async fn release(&self) -> Result<(), SyncError> {
        Ok(self.connections.release().await?)
    }

    async fn run(&self, topology: &Topology, mode: Mode) -> Result<ReconcileReport, SyncError> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let artifacts = self.render(topology)?;
        tracing::debug!(
            "built {} artifacts for {} services",
            artifacts.backends.len() + 1,
            topology.services.len()
        );

        let result = self.sync(&artifacts, mode).await;
        let (writes, reloaded, orphans) = self.discard_if_broken(result).await?;

        let report = ReconcileReport {
            started_at,
            writes,
            reloaded,
            orphans,
            duration_ms: clock.elapsed().as_millis() as u64,
        };
        tracing::info!(
            "pass finished: {} written, {} unchanged, reloaded={} in {}ms",
            report.written(),
            report
                .writes
                .iter()
                .filter(|w| matches!(w, WriteResult::Unchanged { .. }))
                .count(),
            report.reloaded,
            report.duration_ms
        );
        Ok(report)
    }

    async fn sync(
        &self,
        artifacts: &ArtifactSet,
        mode: Mode,
    ) -> Result<(Vec<WriteResult>, bool, Vec<String>), SyncError> {
        let session = self.connections.acquire().await?;
        let dir = &self.config.remote.directory;
        let inventory = match mode {
            Mode::Apply => RemoteInventory::scan(session.as_ref(), dir).await?,
            Mode::Plan => RemoteInventory::list(session.as_ref(), dir).await?,
        };

        let writes = settle_all(
            artifacts
                .iter()
                .map(|a| self.apply(session.as_ref(), a, &inventory, mode)),
        )
        .await?;

        let mut reloaded = false;
        if writes.iter().any(WriteResult::is_written) {
            tracing::info!("reloading: {}", self.config.reload_command);
            session.exec_shell(&self.config.reload_command).await?;
            reloaded = true;
        }

        let orphans = inventory.remaining();
        for orphan in &orphans {
            tracing::warn!("not managed by this pass: {orphan}");
        }
        Ok((writes, reloaded, orphans))
    }

    async fn collect_diffs(&self, artifacts: &ArtifactSet) -> Result<Vec<FileDiff>, SyncError> {
        let session = self.connections.acquire().await?;
        let inventory =
            RemoteInventory::list(session.as_ref(), &self.config.remote.directory).await?;
        let diffs = settle_all(
            artifacts
                .iter()
                .map(|a| remote_diff(session.as_ref(), a, &inventory)),
        )
        .await?;
        Ok(diffs.into_iter().flatten().collect())
    }

    async fn apply(
        &self,
        session: &dyn RemoteSession,
        artifact: &Artifact,
        inventory: &RemoteInventory,
        mode: Mode,
    ) -> Result<WriteResult, SyncError> {
        let path = artifact.path.clone();
        if !should_write(session, artifact, inventory).await? {
            return Ok(WriteResult::Unchanged { path });
        }
        if mode == Mode::Plan {
            tracing::info!("[plan] would write: {path}");
            return Ok(WriteResult::WouldWrite { path });
        }
        self.writer.write(session, artifact).await?;
        tracing::info!("wrote: {path}");
        Ok(WriteResult::Written { path })
    }

    async fn discard_if_broken<T>(&self, result: Result<T, SyncError>) -> Result<T, SyncError> {
        if let Err(err) = &result {
            if err.is_connection() {
                self.connections.discard().await;
            }
        }
        result
    }
}

/// Await every future, then return the first failure in input order.
/// In-flight writes are never dropped.
async fn settle_all<T, F>(futures: impl IntoIterator<Item = F>) -> Result<Vec<T>, SyncError>
where
    F: Future<Output = Result<T, SyncError>>,
{
    join_all(futures).await.into_iter().collect()
}
