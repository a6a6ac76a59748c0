use axum::extract::State;
use axum::Json;
use tagflow_core::config::Config;

use super::blocking;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/config — the project's `.tagflow/config.yaml` with its
/// validation warnings.
///
/// Read fresh from disk; the running server keeps the config it started with.
pub async fn get_config(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = blocking(move || {
        let config = Config::load(&root)?;
        let warnings = config.validate();
        Ok(serde_json::json!({
            "config": serde_json::to_value(&config)?,
            "warnings": warnings,
        }))
    })
    .await?;
    Ok(Json(result))
}
