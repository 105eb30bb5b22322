//! Remote host access for hapsync.
//!
//! [`Connector`] and [`RemoteSession`] are the seam between reconciliation
//! and the network. [`OpenSshConnector`] drives the system `ssh` client over
//! a multiplexed control connection; [`MemoryHost`] is an in-process stand-in.

pub mod error;
pub mod memory;
pub mod openssh;
pub mod session;
pub mod shell;

pub use error::RemoteError;
pub use memory::MemoryHost;
pub use openssh::{OpenSshConnector, SshSettings};
pub use session::{Connector, RemoteSession};
