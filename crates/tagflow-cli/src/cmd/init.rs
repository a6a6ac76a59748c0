use anyhow::Context;
use std::path::Path;
use tagflow_core::{paths, Project};

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing tagflow in: {}", root.display());

    let written = Project::init(root).context("failed to initialize project")?;
    for file in [paths::CONFIG_FILE, paths::FLEET_FILE] {
        let created = written.iter().any(|p| p.ends_with(file));
        let label = if created { "created:" } else { "exists: " };
        println!("  {label} {file}");
    }

    println!("\nTry: tagflow resolve --payload '{{\"Tags\":{{\"or\":[{{\"Key\":\"Instance\",\"Values\":[\"Instance A\"]}}]}}}}'");
    Ok(())
}
