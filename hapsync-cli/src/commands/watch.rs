//! `hapsync watch`: foreground reconcile loop.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use hapsync_daemon::{start_blocking, WatchOptions};

use super::InputArgs;

/// Arguments for `hapsync watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Also run a pass every SECS seconds.
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,
}

impl WatchArgs {
    pub fn run(self, inputs: &InputArgs) -> Result<()> {
        let options = WatchOptions {
            inputs: inputs.paths()?,
            interval: self.interval.map(Duration::from_secs),
        };
        start_blocking(options).context("watch exited with error")
    }
}
