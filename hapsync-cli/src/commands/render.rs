//! `hapsync render`: print rendered artifacts without connecting.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use hapsync_renderer::ConfigBuilder;

use super::InputArgs;

/// Arguments for `hapsync render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl RenderArgs {
    pub fn run(self, inputs: &InputArgs) -> Result<()> {
        let (config, topology) = inputs.load()?;
        let artifacts = ConfigBuilder::for_config(&config)
            .and_then(|builder| builder.build(&topology, &config))
            .context("failed to render artifacts")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&artifacts).context("failed to serialize artifacts")?
            );
            return Ok(());
        }

        for artifact in artifacts.iter() {
            println!("{}", format!("# {}", artifact.path).bold());
            print!("{}", artifact.content);
            if !artifact.content.ends_with('\n') {
                println!();
            }
            println!();
        }
        Ok(())
    }
}
