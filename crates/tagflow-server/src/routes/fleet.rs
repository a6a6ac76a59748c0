use axum::extract::State;
use axum::Json;
use tagflow_core::fleet::FleetFile;

use super::blocking;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/fleet — current instances with their state and tags.
pub async fn get_fleet(State(app): State<AppState>) -> Result<Json<FleetFile>, AppError> {
    let project = blocking(move || app.project()).await?;
    let fleet = project.fleet().snapshot().await?;
    Ok(Json(fleet))
}
