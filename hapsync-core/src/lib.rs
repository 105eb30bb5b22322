//! hapsync core library: topology types, configuration loading, fingerprints, errors.
//!
//! - [`types`]: services, routes, nodes
//! - [`config`]: [`ReconcileConfig`] and YAML loaders
//! - [`fingerprint`]: the one content hash used on both sides of a comparison
//! - [`error`]: [`ConfigError`], [`TopologyError`]

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod types;

pub use config::{ReconcileConfig, RemoteConfig, RemoteDir, WriteMode};
pub use error::{ConfigError, TopologyError};
pub use fingerprint::fingerprint;
pub use types::{Node, PortAlias, RoutingConstraint, Service, ServiceName, Topology};
