pub mod diff;
pub mod plan;
pub mod render;
pub mod sync;
pub mod watch;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use hapsync_core::{ReconcileConfig, Topology};
use hapsync_sync::{InputPaths, ReconcileReport, SyncError, Synchronizer, WriteResult};

/// Input file locations shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// Configuration file [default: ~/.hapsync/config.yaml].
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Topology file [default: ~/.hapsync/topology.yaml].
    #[arg(long, global = true, value_name = "FILE")]
    pub topology: Option<PathBuf>,
}

impl InputArgs {
    pub fn paths(&self) -> Result<InputPaths> {
        InputPaths::resolve(self.config.clone(), self.topology.clone())
            .context("could not locate input files")
    }

    pub fn load(&self) -> Result<(ReconcileConfig, Topology)> {
        let paths = self.paths()?;
        paths.load().with_context(|| {
            format!(
                "failed to load {} / {}",
                paths.config.display(),
                paths.topology.display()
            )
        })
    }
}

pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run `f` against an OpenSSH-backed synchronizer, closing the session afterwards.
pub fn with_synchronizer<T, F, Fut>(config: ReconcileConfig, f: F) -> Result<T>
where
    F: FnOnce(Arc<Synchronizer>) -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let host = config.remote.host.clone();
    runtime.block_on(async move {
        let synchronizer = Arc::new(
            hapsync_sync::openssh_synchronizer(config).context("failed to prepare synchronizer")?,
        );
        let result = f(Arc::clone(&synchronizer)).await;
        let closed = synchronizer.release().await;
        let value = result.with_context(|| format!("pass against {host} failed"))?;
        closed.context("failed to close remote session")?;
        Ok::<T, anyhow::Error>(value)
    })
}

fn summary(report: &ReconcileReport) -> String {
    let written = report.written();
    let unchanged = report.writes.len() - written;
    if written == 0 {
        format!("up to date ({unchanged} unchanged)")
    } else {
        format!("{written} written, {unchanged} unchanged")
    }
}

pub fn print_report(report: &ReconcileReport) {
    println!("{} {}", "✓".green(), summary(report));

    for write in &report.writes {
        match write {
            WriteResult::Written { path } => println!("  {}  {path}", "✎".green()),
            WriteResult::WouldWrite { path } => println!("  {}  {path}", "~".yellow()),
            WriteResult::Unchanged { path } => {
                println!("  {}  {}", "·".bright_black(), path.bright_black())
            }
        }
    }
    for orphan in &report.orphans {
        println!("  {}  {orphan} (not managed)", "?".magenta());
    }
    if report.reloaded {
        println!("{}", "reloaded".bold());
    }
}
