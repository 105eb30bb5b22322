//! `hapsync plan`: report what `sync` would write.

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use hapsync_sync::{ReconcileReport, WriteResult};

use super::{with_synchronizer, InputArgs};

/// Arguments for `hapsync plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Action")]
    action: &'static str,
    #[tabled(rename = "Path")]
    path: String,
}

impl PlanArgs {
    pub fn run(self, inputs: &InputArgs) -> Result<()> {
        let (config, topology) = inputs.load()?;
        let report = with_synchronizer(config, |sync| async move { sync.plan(&topology).await })?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize plan")?
            );
            return Ok(());
        }
        print_table(&report);
        Ok(())
    }
}

fn print_table(report: &ReconcileReport) {
    let rows: Vec<PlanRow> = report
        .writes
        .iter()
        .map(|write| PlanRow {
            action: match write {
                WriteResult::WouldWrite { .. } | WriteResult::Written { .. } => "write",
                WriteResult::Unchanged { .. } => "keep",
            },
            path: write.path().to_string(),
        })
        .chain(report.orphans.iter().map(|orphan| PlanRow {
            action: "unmanaged",
            path: orphan.clone(),
        }))
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if report.has_changes() {
        println!("Run 'hapsync sync' to apply and reload.");
    } else {
        println!("Nothing to do.");
    }
}
