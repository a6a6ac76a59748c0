use anyhow::Context;
use clap::Subcommand;
use std::path::Path;
use tagflow_core::Project;

use super::runtime;
use crate::output::{print_json, print_table};

#[derive(Subcommand)]
pub enum FleetSubcommand {
    /// List instances with their state and tags
    List,
}

pub fn run(root: &Path, subcmd: FleetSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        FleetSubcommand::List => list(root, json),
    }
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let project = Project::open(root).context("failed to open project")?;
    let fleet = runtime()?
        .block_on(project.fleet().snapshot())
        .context("failed to read fleet")?;

    if json {
        return print_json(&fleet);
    }
    let source = project.fleet().path();
    let source = source.strip_prefix(project.root()).unwrap_or(source);
    if fleet.instances.is_empty() {
        println!("Fleet is empty ({}).", source.display());
        return Ok(());
    }
    println!("Fleet: {}\n", source.display());
    let rows = fleet
        .instances
        .iter()
        .map(|i| {
            let tags: Vec<String> = i.tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
            vec![i.id.to_string(), i.state.to_string(), tags.join(", ")]
        })
        .collect();
    print_table(&["ID", "STATE", "TAGS"], rows);
    Ok(())
}
