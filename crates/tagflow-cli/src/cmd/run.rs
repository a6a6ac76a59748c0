use anyhow::Context;
use std::path::Path;
use tagflow_core::{Project, RunReport};
use tracing::warn;

use super::{runtime, PayloadArgs};
use crate::output::{print_json, print_report};

pub fn run(root: &Path, input: &PayloadArgs, json: bool) -> anyhow::Result<()> {
    let payload = input.read()?;
    let project = Project::open(root).context("failed to open project")?;
    let controller = project.controller();

    // Settle before the runtime drops so a timed-out run's dispatch finishes.
    let report = runtime()?
        .block_on(async {
            let report = controller.run_payload(&payload).await;
            controller.settle().await;
            report
        })
        .context("invalid trigger payload")?;

    let recorded = record(&project, &report);
    if let Err(e) = &recorded {
        warn!(run_id = %report.run_id, error = %format!("{e:#}"), "run was not recorded");
    }

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    recorded.with_context(|| format!("run {} finished but was not recorded", report.run_id))?;
    if !report.status.is_ok() {
        anyhow::bail!("run {} {}", report.run_id, report.status);
    }
    Ok(())
}

fn record(project: &Project, report: &RunReport) -> anyhow::Result<()> {
    let log = project.open_run_log().context("failed to open run log")?;
    project
        .record_run(&log, report)
        .context("failed to record run")
}
