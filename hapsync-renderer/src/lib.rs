//! # hapsync-renderer
//!
//! Deterministic generation of HAProxy frontend/backend stanzas from a
//! [`Topology`](hapsync_core::Topology).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hapsync_core::{ReconcileConfig, Topology};
//! use hapsync_renderer::ConfigBuilder;
//!
//! fn render_all(topology: &Topology, config: &ReconcileConfig) {
//!     if let Ok(builder) = ConfigBuilder::for_config(config) {
//!         if let Ok(artifacts) = builder.build(topology, config) {
//!             for artifact in artifacts.iter() {
//!                 println!("{}: {} bytes", artifact.path, artifact.content.len());
//!             }
//!         }
//!     }
//! }
//! ```

pub mod artifact;
pub mod context;
pub mod engine;
pub mod error;

pub use artifact::{Artifact, ArtifactKind, ArtifactSet};
pub use engine::{ConfigBuilder, TemplateEngine};
pub use error::RenderError;
