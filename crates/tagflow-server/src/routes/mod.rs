pub mod config;
pub mod fleet;
pub mod health;
pub mod resolve;
pub mod runs;

use crate::error::AppError;
use tagflow_core::TagflowError;

/// Run blocking project work (config, fleet file, run log) off the runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, TagflowError> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(result)
}
