//! `hapsync diff`: unified diffs of what `sync` would change.

use anyhow::Result;
use clap::Args;

use super::{with_synchronizer, InputArgs};

/// Arguments for `hapsync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {}

impl DiffArgs {
    pub fn run(self, inputs: &InputArgs) -> Result<()> {
        let (config, topology) = inputs.load()?;
        let diffs = with_synchronizer(config, |sync| async move { sync.diff(&topology).await })?;

        if diffs.is_empty() {
            println!("No differences.");
            return Ok(());
        }

        for diff in diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }
        Ok(())
    }
}
