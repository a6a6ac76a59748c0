use anyhow::Context;
use std::path::Path;
use tagflow_core::request::parse_expression;
use tagflow_core::Project;

use super::{runtime, PayloadArgs};
use crate::output::print_json;

pub fn run(root: &Path, input: &PayloadArgs, json: bool) -> anyhow::Result<()> {
    let payload = input.read()?;
    let expression = parse_expression(&payload).context("invalid trigger payload")?;
    let project = Project::open(root).context("failed to open project")?;

    let matched = runtime()?
        .block_on(project.controller().resolve(&expression))
        .context("failed to resolve tag filter")?;

    if json {
        return print_json(&matched);
    }
    if matched.is_empty() {
        println!("No instances match.");
        return Ok(());
    }
    println!("{} instance(s) match:", matched.count());
    for id in matched.ids() {
        println!("  {id}");
    }
    Ok(())
}
