//! # hapsync-sync
//!
//! Fingerprint-gated reconciliation of rendered HAProxy artifacts against a
//! remote directory.
//!
//! Build a [`Synchronizer`] from a config and a
//! [`Connector`](hapsync_remote::Connector), then call
//! [`Synchronizer::reconcile`] once per pass. Only artifacts whose remote
//! `sha256sum` differs are written, and the reload command runs at most once.

pub mod connection;
pub mod diff;
pub mod error;
pub mod inventory;
pub mod pipeline;
pub mod reconcile;
pub mod writer;

pub use connection::ConnectionManager;
pub use diff::FileDiff;
pub use error::SyncError;
pub use inventory::RemoteInventory;
pub use pipeline::{openssh_synchronizer, InputPaths};
pub use reconcile::{ReconcileReport, Synchronizer};
pub use writer::{ArtifactWriter, HeredocWriter, StreamWriter, WriteResult};
