//! Watch runtime: reconcile on startup, on config/topology edits, and on an
//! optional interval.

mod error;
pub mod paths;
mod runtime;

pub use error::DaemonError;
pub use runtime::{run, run_with, start_blocking, Processor, SynchronizerFactory, WatchOptions};
