pub mod config;
pub mod fleet;
pub mod history;
pub mod init;
pub mod resolve;
pub mod run;
pub mod serve;
pub mod validate;

use anyhow::Context;
use clap::Args;
use std::io::Read;
use std::path::PathBuf;

/// Where a trigger payload comes from. Reads stdin when neither is given.
#[derive(Args, Debug)]
#[group(multiple = false)]
pub struct PayloadArgs {
    /// Read the payload from a JSON file
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Inline JSON payload
    #[arg(long, short = 'p')]
    pub payload: Option<String>,
}

impl PayloadArgs {
    pub fn read(&self) -> anyhow::Result<String> {
        if let Some(payload) = &self.payload {
            return Ok(payload.clone());
        }
        if let Some(path) = &self.file {
            return std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()));
        }
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read payload from stdin")?;
        Ok(buf)
    }
}

/// Runtime for commands that drive async project work.
pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start async runtime")
}
