//! `hapsync sync`: write changed artifacts and reload once.

use anyhow::{Context, Result};
use clap::Args;

use super::{print_report, with_synchronizer, InputArgs};

/// Arguments for `hapsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Emit the pass report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self, inputs: &InputArgs) -> Result<()> {
        let (config, topology) = inputs.load()?;
        let report =
            with_synchronizer(config, |sync| async move { sync.reconcile(&topology).await })?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report")?
            );
        } else {
            print_report(&report);
        }
        Ok(())
    }
}
