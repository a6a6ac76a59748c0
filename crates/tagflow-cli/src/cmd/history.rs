use anyhow::Context;
use clap::Subcommand;
use std::path::Path;
use tagflow_core::Project;
use uuid::Uuid;

use crate::output::{print_json, print_report, print_table};

#[derive(Subcommand)]
pub enum HistorySubcommand {
    /// List recent runs, newest first
    List {
        /// Maximum number of runs to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show one run in full
    Show {
        /// Run id
        id: String,
    },
}

pub fn run(root: &Path, subcmd: HistorySubcommand, json: bool) -> anyhow::Result<()> {
    let project = Project::open(root).context("failed to open project")?;
    let log = project.open_run_log().context("failed to open run log")?;

    match subcmd {
        HistorySubcommand::List { limit } => {
            let runs = log.list_recent(limit)?;
            if json {
                return print_json(&runs);
            }
            if runs.is_empty() {
                println!("No runs recorded.");
                return Ok(());
            }
            let rows = runs
                .iter()
                .map(|r| {
                    vec![
                        r.run_id.to_string(),
                        r.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        r.request.action.to_string(),
                        r.request.expression.mode_name().to_string(),
                        r.status.as_str().to_string(),
                        r.matched
                            .as_ref()
                            .map(|m| m.count().to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        format!("{}ms", r.elapsed_ms),
                    ]
                })
                .collect();
            print_table(
                &["RUN", "STARTED", "ACTION", "MODE", "STATUS", "MATCHED", "ELAPSED"],
                rows,
            );
        }
        HistorySubcommand::Show { id } => {
            let run_id = Uuid::parse_str(&id).with_context(|| format!("invalid run id '{id}'"))?;
            let report = log.get(run_id)?;
            if json {
                print_json(&report)?;
            } else {
                print_report(&report);
            }
        }
    }
    Ok(())
}
