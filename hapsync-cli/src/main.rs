//! hapsync: reconcile HAProxy configuration on a remote host.
//!
//! # Usage
//!
//! ```text
//! hapsync [--config FILE] [--topology FILE] render [--json]
//! hapsync plan [--json]
//! hapsync sync [--json]
//! hapsync diff
//! hapsync watch [--interval SECS]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    diff::DiffArgs, plan::PlanArgs, render::RenderArgs, sync::SyncArgs, watch::WatchArgs,
    InputArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "hapsync",
    version,
    about = "Render HAProxy configuration from a service topology and sync it to a remote host",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    inputs: InputArgs,

    /// Log progress to stderr (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the artifacts the topology implies, without connecting.
    Render(RenderArgs),

    /// Show which artifacts a sync would write, without writing.
    Plan(PlanArgs),

    /// Write changed artifacts and reload the proxy if anything changed.
    Sync(SyncArgs),

    /// Show unified diffs between remote files and rendered artifacts.
    Diff(DiffArgs),

    /// Keep the remote host in sync as the config or topology change.
    Watch(WatchArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    if !matches!(cli.command, Commands::Watch(_)) {
        commands::init_tracing(cli.verbose);
    }
    match cli.command {
        Commands::Render(args) => args.run(&cli.inputs),
        Commands::Plan(args) => args.run(&cli.inputs),
        Commands::Sync(args) => args.run(&cli.inputs),
        Commands::Diff(args) => args.run(&cli.inputs),
        Commands::Watch(args) => args.run(&cli.inputs),
    }
}
