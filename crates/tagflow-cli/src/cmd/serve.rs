use anyhow::Context;
use std::path::{Path, PathBuf};
use tagflow_core::config::Config;

use super::runtime;

pub fn run(root: &Path, port: Option<u16>) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let port = port.unwrap_or(config.server.port);
    runtime()?.block_on(serve(root.to_path_buf(), port))
}

async fn serve(root: PathBuf, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    let actual_port = listener.local_addr()?.port();
    println!("tagflow trigger for {} → http://localhost:{actual_port}", root.display());

    tokio::select! {
        res = tagflow_server::serve_on(root, listener) => res,
        _ = tokio::signal::ctrl_c() => Ok(()),
    }
}
